//! Balance projector - Read-facing balance shapes built from the lot store.
//!
//! Available, pending and expiring-soon come from the lots. Lifetime earned and
//! redeemed come from the customer's monotonic counters, because expiry keeps
//! lot `remaining` values around and recomputing would not stay monotonic.
//! Nothing in this module writes.

use crate::{
    config::LedgerConfig,
    entities::{customer, transaction},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use super::{customer::get_customer, lots, recorder};

/// Number of transactions shown on a customer profile
pub const PROFILE_TRANSACTION_LIMIT: u64 = 10;

/// Balance partitions and lifetime counters of one customer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointBalance {
    /// Spendable now
    pub available: i64,
    /// Earned, not yet activated
    pub pending: i64,
    /// Spendable but expiring within the configured horizon
    pub expiring_soon: i64,
    /// Lifetime points earned
    pub total_earned: i64,
    /// Lifetime points redeemed
    pub total_redeemed: i64,
}

/// Customer profile as shown to staff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    /// The customer record
    pub customer: customer::Model,
    /// Current balance
    pub points: PointBalance,
    /// Most recent transactions, newest first
    pub recent_transactions: Vec<transaction::Model>,
}

/// Cached aggregates compared against the values the lots imply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateAudit {
    /// Customer audited
    pub customer_id: i64,
    /// `(cached, computed)` lifetime earned
    pub total_earned: (i64, i64),
    /// `(cached, computed)` available
    pub available: (i64, i64),
    /// `(cached, computed)` lifetime redeemed
    pub total_redeemed: (i64, i64),
}

impl AggregateAudit {
    /// Whether every cached counter matches its computed value
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.total_earned.0 == self.total_earned.1
            && self.available.0 == self.available.1
            && self.total_redeemed.0 == self.total_redeemed.1
    }
}

/// Projects the balance of a customer at `now`.
pub async fn project_balance<C>(
    db: &C,
    config: &LedgerConfig,
    customer_id: i64,
    now: DateTime<Utc>,
) -> Result<PointBalance>
where
    C: ConnectionTrait,
{
    let customer = get_customer(db, customer_id).await?;
    let totals = lots::sum_by_state(db, customer_id, now, config.expiring_soon()).await?;

    Ok(PointBalance {
        available: totals.available,
        pending: totals.pending,
        expiring_soon: totals.expiring_soon,
        total_earned: customer.total_points_earned,
        total_redeemed: customer.total_points_redeemed,
    })
}

/// Customer, balance and recent transactions in one read.
pub async fn customer_profile<C>(
    db: &C,
    config: &LedgerConfig,
    customer_id: i64,
    now: DateTime<Utc>,
) -> Result<CustomerProfile>
where
    C: ConnectionTrait,
{
    let customer = get_customer(db, customer_id).await?;
    let points = project_balance(db, config, customer_id, now).await?;
    let recent_transactions =
        recorder::transactions_for_customer(db, customer_id, PROFILE_TRANSACTION_LIMIT).await?;

    Ok(CustomerProfile {
        customer,
        points,
        recent_transactions,
    })
}

/// Recomputes the cached aggregates from the lots and reports any drift.
pub async fn audit_customer<C>(db: &C, customer_id: i64, now: DateTime<Utc>) -> Result<AggregateAudit>
where
    C: ConnectionTrait,
{
    let customer = get_customer(db, customer_id).await?;
    let lifetime = lots::sum_lifetime(db, customer_id).await?;
    let totals = lots::sum_by_state(db, customer_id, now, chrono::Duration::zero()).await?;

    Ok(AggregateAudit {
        customer_id,
        total_earned: (customer.total_points_earned, lifetime.earned),
        available: (customer.available_points, totals.available),
        total_redeemed: (customer.total_points_redeemed, lifetime.redeemed),
    })
}
