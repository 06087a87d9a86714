//! Sequence entity - Named monotonic counters.
//! Used to hand out customer sequential codes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sequence database model - one row per named counter
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sequences")]
pub struct Model {
    /// Counter name (e.g. `"customer_code"`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    /// Last value handed out
    pub value: i64,
}

/// `Sequence` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
