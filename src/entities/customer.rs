//! Customer entity - Identity plus the cached point aggregates.
//!
//! `total_points_earned`, `available_points` and `total_points_redeemed` are
//! derived from the point lots. Only the ledger engine and the sweepers write
//! them, always inside the same database transaction as the lot mutation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether a customer may still transact
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CustomerStatus {
    /// Normal state after registration
    #[sea_orm(string_value = "active")]
    Active,
    /// Soft-deactivated; history is kept, new transactions are refused
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Customer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Stable internal identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable code assigned from a monotonic sequence (e.g. `MGP000001`)
    #[sea_orm(unique)]
    pub sequential_code: String,
    /// Full name
    pub name: String,
    /// 10-digit mobile number
    #[sea_orm(unique)]
    pub phone: String,
    /// Optional email address
    pub email: Option<String>,
    /// Optional 12-digit Aadhaar number
    #[sea_orm(unique)]
    pub aadhar_number: Option<String>,
    /// Optional passport number
    pub passport_number: Option<String>,
    /// Active or soft-deactivated
    pub status: CustomerStatus,
    /// Lifetime points granted, including points still pending
    pub total_points_earned: i64,
    /// Points spendable right now
    pub available_points: i64,
    /// Lifetime points redeemed
    pub total_points_redeemed: i64,
    /// Registration time
    pub created_at: DateTimeUtc,
    /// Last aggregate or status change
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Customer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One customer has many point lots
    #[sea_orm(has_many = "super::point_lot::Entity")]
    PointLots,
    /// One customer has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::point_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointLots.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
