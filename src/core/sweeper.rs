//! Activation and expiry sweeps.
//!
//! Both sweeps are idempotent: they work customer by customer, and each
//! customer's lot flips and aggregate update commit together under that
//! customer's lock. A failed customer leaves its lots untouched, the other
//! customers are still swept, and the next pass picks it up again.

use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use std::{future::Future, time::Duration};
use tracing::{debug, info, instrument, warn};

use super::{
    customer::{AggregateDeltas, apply_aggregate_deltas},
    engine::{LedgerEngine, Staged},
    lots::{self, SweepOutcome},
};

/// Result of one activation plus expiry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Lots that became spendable
    pub activated: u64,
    /// Lots that expired
    pub expired: u64,
}

#[derive(Debug, Clone, Copy)]
enum Sweep {
    Activation,
    Expiry,
}

impl LedgerEngine {
    /// Activates every pending lot whose activation time is at or before `now`.
    ///
    /// Returns the number of lots activated; rerunning with the same `now`
    /// returns 0. A customer whose sweep fails is logged and skipped, and
    /// the next pass retries it.
    ///
    /// # Errors
    /// Fails only if the due customers cannot be listed.
    #[instrument(skip(self))]
    pub async fn activate_pending(&self, now: DateTime<Utc>) -> Result<u64> {
        let customers = lots::customers_due_for_activation(&*self.db, now).await?;
        let activated = self.sweep_customers(Sweep::Activation, customers, now).await;
        if activated > 0 {
            info!(activated, "Activated pending lots");
        }
        Ok(activated)
    }

    /// Expires every active lot whose expiry time is at or before `now`.
    ///
    /// # Errors
    /// Same as [`LedgerEngine::activate_pending`].
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let customers = lots::customers_due_for_expiry(&*self.db, now).await?;
        let expired = self.sweep_customers(Sweep::Expiry, customers, now).await;
        if expired > 0 {
            info!(expired, "Expired stale lots");
        }
        Ok(expired)
    }

    /// Activation then expiry at the engine's current time.
    ///
    /// # Errors
    /// Same as [`LedgerEngine::activate_pending`].
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.now();
        let activated = self.activate_pending(now).await?;
        let expired = self.expire_stale(now).await?;
        Ok(SweepReport { activated, expired })
    }

    async fn sweep_customers(&self, sweep: Sweep, customers: Vec<i64>, now: DateTime<Utc>) -> u64 {
        let mut lots = 0;
        let mut failed = 0_usize;
        for customer_id in customers {
            match self.sweep_customer(sweep, customer_id, now).await {
                Ok(outcome) => lots += outcome.lots,
                Err(e) => {
                    failed += 1;
                    warn!(customer_id, ?sweep, error = %e, "Skipping customer in sweep");
                }
            }
        }
        if failed > 0 {
            warn!(?sweep, failed, "Sweep left customers for the next pass");
        }
        lots
    }

    async fn sweep_customer(
        &self,
        sweep: Sweep,
        customer_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SweepOutcome> {
        let staged = self
            .within_deadline(async {
                let guard = self.lock_customer(customer_id).await;
                let txn = self.db.begin().await?;

                let outcome = match sweep {
                    Sweep::Activation => lots::activate_due(&txn, customer_id, now).await?,
                    Sweep::Expiry => lots::expire_due(&txn, customer_id, now).await?,
                };
                if outcome.lots > 0 {
                    apply_aggregate_deltas(&txn, customer_id, deltas(sweep, outcome), now).await?;
                }
                Ok::<_, Error>(Staged::new(guard, txn, outcome))
            })
            .await?;

        let outcome = staged.commit().await?;
        debug!(customer_id, ?sweep, lots = outcome.lots, points = outcome.points, "Swept customer");
        Ok(outcome)
    }
}

const fn deltas(sweep: Sweep, outcome: SweepOutcome) -> AggregateDeltas {
    match sweep {
        Sweep::Activation => AggregateDeltas {
            earned: 0,
            available: outcome.points,
            redeemed: 0,
        },
        Sweep::Expiry => AggregateDeltas {
            earned: 0,
            available: -outcome.points,
            redeemed: 0,
        },
    }
}

/// Runs [`LedgerEngine::sweep_once`] every `interval` until `shutdown` resolves.
///
/// A failed pass is logged and retried on the next tick.
pub async fn run_sweeper<F>(engine: LedgerEngine, interval: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(interval_secs = interval.as_secs(), "Sweeper started");
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => match engine.sweep_once().await {
                Ok(report) if report != SweepReport::default() => {
                    info!(activated = report.activated, expired = report.expired, "Sweep finished");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Sweep failed"),
            },
        }
    }
    info!("Sweeper stopped");
}
