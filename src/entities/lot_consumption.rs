//! Lot consumption entity - Which EARNED lot funded how much of a redemption.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lot consumption database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lot_consumptions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// REDEMPTION transaction that consumed the points
    pub transaction_id: i64,
    /// EARNED lot the points were taken from
    pub lot_id: i64,
    /// Points taken from the lot
    pub points: i64,
}

/// Defines relationships between LotConsumption and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each row belongs to one redemption transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
    /// Each row draws from one lot
    #[sea_orm(
        belongs_to = "super::point_lot::Entity",
        from = "Column::LotId",
        to = "super::point_lot::Column::Id"
    )]
    PointLot,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::point_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointLot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
