//! Point lot entity - One grant (EARNED) or consumption (REDEEMED) of points.
//!
//! EARNED lots move through pending -> active -> expired and carry a
//! `remaining` balance that redemptions draw down. REDEEMED lots are audit
//! entries and are never mutated after insert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a lot
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum LotKind {
    /// Points granted by a purchase or by the re-earn step of a redemption
    #[sea_orm(string_value = "EARNED")]
    Earned,
    /// Points spent by a redemption
    #[sea_orm(string_value = "REDEEMED")]
    Redeemed,
}

/// Point lot database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "point_lots")]
pub struct Model {
    /// Unique identifier for the lot
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning customer
    pub customer_id: i64,
    /// EARNED or REDEEMED
    pub kind: LotKind,
    /// Magnitude of the grant or consumption, always positive
    pub points: i64,
    /// Unconsumed part of an EARNED lot; zero for REDEEMED lots
    pub remaining: i64,
    /// Set by the activation sweep once `activation_time` has passed
    pub is_active: bool,
    /// Set by the expiry sweep once `expiry_time` has passed
    pub is_expired: bool,
    /// When the lot becomes spendable (EARNED only)
    pub activation_time: Option<DateTimeUtc>,
    /// When the lot stops being spendable (EARNED only)
    pub expiry_time: Option<DateTimeUtc>,
    /// Insert time
    pub created_at: DateTimeUtc,
    /// Transaction that produced this lot
    pub origin_transaction_id: i64,
}

impl Model {
    /// A lot may fund a redemption iff it is an active, unexpired EARNED lot with points left.
    #[must_use]
    pub fn is_spendable(&self) -> bool {
        self.kind == LotKind::Earned && self.is_active && !self.is_expired && self.remaining > 0
    }
}

/// Defines relationships between PointLot and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each lot belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// Each lot was produced by one transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::OriginTransactionId",
        to = "super::transaction::Column::Id"
    )]
    OriginTransaction,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OriginTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
