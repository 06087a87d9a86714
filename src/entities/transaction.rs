//! Transaction entity - Immutable audit record of one purchase or redemption.
//!
//! Money columns are stored in paise so that the earn-rate division is exact.
//! Rows are inserted once by the transaction recorder and never updated.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What kind of ledger event this transaction records
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TransactionKind {
    /// Bill paid in full; earns points
    #[sea_orm(string_value = "PURCHASE")]
    Purchase,
    /// Points spent as a bill discount; the remainder may earn points
    #[sea_orm(string_value = "REDEMPTION")]
    Redemption,
}

/// Lifecycle status of a recorded transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TransactionStatus {
    /// Committed together with its lot and aggregate effects
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer the transaction belongs to
    pub customer_id: i64,
    /// PURCHASE or REDEMPTION
    pub kind: TransactionKind,
    /// Bill before any discount, in paise
    pub bill_amount_paise: i64,
    /// Points granted (pending) by this transaction
    pub points_earned: i64,
    /// Points spent by this transaction
    pub points_redeemed: i64,
    /// Discount applied to the bill, in paise
    pub discount_amount_paise: i64,
    /// Amount payable after discount, in paise
    pub final_amount_paise: i64,
    /// Optional shop invoice reference
    pub invoice_number: Option<String>,
    /// Always `Completed` once the row exists
    pub status: TransactionStatus,
    /// Operator who recorded the transaction
    pub created_by: String,
    /// When the transaction was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// Lots created by this transaction
    #[sea_orm(has_many = "super::point_lot::Entity")]
    PointLots,
    /// Consumption rows recorded by a redemption
    #[sea_orm(has_many = "super::lot_consumption::Entity")]
    LotConsumptions,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::point_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointLots.def()
    }
}

impl Related<super::lot_consumption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LotConsumptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
