//! Entity module - Contains all SeaORM entity definitions for the ledger database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod customer;
pub mod lot_consumption;
pub mod point_lot;
pub mod sequence;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use customer::{
    Column as CustomerColumn, CustomerStatus, Entity as Customer, Model as CustomerModel,
};
pub use lot_consumption::{
    Column as LotConsumptionColumn, Entity as LotConsumption, Model as LotConsumptionModel,
};
pub use point_lot::{Column as PointLotColumn, Entity as PointLot, LotKind, Model as PointLotModel};
pub use sequence::{Column as SequenceColumn, Entity as Sequence, Model as SequenceModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind, TransactionStatus,
};
