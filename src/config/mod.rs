/// Database connection and table creation
pub mod database;

/// Ledger policy configuration loading from ledger.toml
pub mod ledger;

pub use ledger::{LedgerConfig, load_config, load_default_config};
