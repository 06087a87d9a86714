//! Shared test utilities for the points ledger.
//!
//! This module provides helpers for setting up test databases and creating
//! customers, transactions and lots with sensible defaults.

use crate::{
    config::LedgerConfig,
    core::{
        clock::ManualClock,
        customer::{self, AggregateDeltas, NewCustomer},
        engine::LedgerEngine,
        recorder::{self, NewTransaction},
    },
    entities::{self, Customer, LotKind, TransactionKind},
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use std::sync::Arc;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Fixed instant tests treat as "now".
#[allow(clippy::unwrap_used)]
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
}

/// Engine over a fresh database with default policy, clock frozen at [`test_now`].
pub async fn setup_engine() -> Result<(LedgerEngine, Arc<ManualClock>)> {
    setup_engine_with(LedgerConfig::default()).await
}

/// Engine over a fresh database with custom policy.
pub async fn setup_engine_with(config: LedgerConfig) -> Result<(LedgerEngine, Arc<ManualClock>)> {
    let db = setup_test_db().await?;
    let clock = Arc::new(ManualClock::new(test_now()));
    let engine = LedgerEngine::with_clock(db, config, Arc::<ManualClock>::clone(&clock));
    Ok((engine, clock))
}

/// Registers an active customer.
///
/// # Defaults
/// * name: "Test Customer"
/// * no email, Aadhaar or passport
pub async fn create_test_customer(
    db: &DatabaseConnection,
    phone: &str,
) -> Result<entities::customer::Model> {
    customer::register_customer(
        db,
        &LedgerConfig::default(),
        NewCustomer {
            name: "Test Customer".to_string(),
            phone: phone.to_string(),
            email: None,
            aadhar_number: None,
            passport_number: None,
        },
        test_now(),
    )
    .await
}

/// Records a bare PURCHASE that lots can point back to.
/// Aggregates are not touched.
pub async fn create_test_origin_transaction(
    db: &DatabaseConnection,
    customer_id: i64,
) -> Result<entities::transaction::Model> {
    recorder::record(
        db,
        NewTransaction {
            customer_id,
            kind: TransactionKind::Purchase,
            bill_amount_paise: 500_000,
            points_earned: 100,
            points_redeemed: 0,
            discount_amount_paise: 0,
            final_amount_paise: 500_000,
            invoice_number: None,
            created_by: "test".to_string(),
            created_at: test_now(),
        },
    )
    .await
}

/// Inserts an already active EARNED lot, leaving the aggregates alone.
/// Use this to simulate drift or to test the lot store on its own.
pub async fn insert_active_lot(
    db: &DatabaseConnection,
    customer_id: i64,
    points: i64,
    expiry_time: DateTime<Utc>,
) -> Result<entities::point_lot::Model> {
    let origin = create_test_origin_transaction(db, customer_id).await?;
    let lot = entities::point_lot::ActiveModel {
        customer_id: Set(customer_id),
        kind: Set(LotKind::Earned),
        points: Set(points),
        remaining: Set(points),
        is_active: Set(true),
        is_expired: Set(false),
        activation_time: Set(Some(test_now())),
        expiry_time: Set(Some(expiry_time)),
        created_at: Set(test_now()),
        origin_transaction_id: Set(origin.id),
        ..Default::default()
    };
    Ok(lot.insert(db).await?)
}

/// Gives a customer spendable points with matching aggregates.
pub async fn grant_available_points(
    db: &DatabaseConnection,
    customer_id: i64,
    points: i64,
    expiry_time: DateTime<Utc>,
) -> Result<entities::point_lot::Model> {
    let lot = insert_active_lot(db, customer_id, points, expiry_time).await?;
    customer::apply_aggregate_deltas(
        db,
        customer_id,
        AggregateDeltas {
            earned: points,
            available: points,
            redeemed: 0,
        },
        test_now(),
    )
    .await?;
    Ok(lot)
}

/// Overwrites the cached available balance without touching lots.
pub async fn force_available_points(
    db: &DatabaseConnection,
    customer_id: i64,
    available: i64,
) -> Result<()> {
    Customer::update_many()
        .col_expr(
            entities::customer::Column::AvailablePoints,
            Expr::value(available),
        )
        .filter(entities::customer::Column::Id.eq(customer_id))
        .exec(db)
        .await?;
    Ok(())
}
