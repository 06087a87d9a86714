//! Database configuration module for the points ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.

use crate::entities::{Customer, LotConsumption, PointLot, Sequence, Transaction};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/points_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Opens a connection pool to the given database URL.
#[instrument]
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    let db = Database::connect(database_url).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates all ledger tables if they do not already exist.
///
/// Tables are created parents first because `SQLite` enforces the foreign keys
/// generated from the entity relations.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut customer_table = schema.create_table_from_entity(Customer);
    let mut transaction_table = schema.create_table_from_entity(Transaction);
    let mut lot_table = schema.create_table_from_entity(PointLot);
    let mut consumption_table = schema.create_table_from_entity(LotConsumption);
    let mut sequence_table = schema.create_table_from_entity(Sequence);

    for table in [
        customer_table.if_not_exists(),
        transaction_table.if_not_exists(),
        lot_table.if_not_exists(),
        consumption_table.if_not_exists(),
        sequence_table.if_not_exists(),
    ] {
        db.execute(builder.build(&*table)).await?;
    }

    debug!("Ledger tables ensured");
    Ok(())
}
