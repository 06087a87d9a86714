/// Rupee amounts, paise conversion and points arithmetic
pub mod amounts;

/// Balance projection, customer profile and aggregate audit
pub mod balance;

/// Time source abstraction
pub mod clock;

/// Customer registry and cached point aggregates
pub mod customer;

/// Purchase and redemption orchestration
pub mod engine;

/// Per-customer serialization of balance-affecting work
pub mod locks;

/// Point lot store
pub mod lots;

/// Append-only transaction log
pub mod recorder;

/// Activation and expiry sweeps
pub mod sweeper;

pub use balance::{CustomerProfile, PointBalance};
pub use engine::{
    LedgerEngine, PurchaseReceipt, PurchaseRequest, RedemptionReceipt, RedemptionRequest,
};
pub use sweeper::{SweepReport, run_sweeper};
