//! Ledger engine - Purchases and redemptions as single atomic units.
//!
//! Each operation takes the customer's lock, opens one database transaction,
//! and commits lot changes, the transaction record and the aggregate update
//! together. Any error before commit drops the transaction, which rolls it
//! back. Everything up to the commit, lock wait included, runs under the
//! configured timeout. The commit itself runs outside it, so a timeout
//! surfaces as [`Error::Transient`] only when nothing was written.

use crate::{
    config::LedgerConfig,
    entities::TransactionKind,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::Serialize;
use std::{future::Future, sync::Arc};
use tracing::{debug, info, instrument, warn};

use super::{
    amounts,
    clock::{Clock, SystemClock},
    customer::{AggregateDeltas, apply_aggregate_deltas, get_active_customer},
    locks::{CustomerGuard, CustomerLocks},
    lots::{self, LotSchedule},
    recorder::{self, NewTransaction},
};

/// A purchase to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Customer making the purchase
    pub customer_id: i64,
    /// Bill amount in rupees
    pub bill_amount: Decimal,
    /// Optional invoice reference
    pub invoice_number: Option<String>,
    /// Authenticated operator recording the purchase
    pub operator_id: String,
}

/// Outcome of a recorded purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    /// Id of the PURCHASE transaction
    pub transaction_id: i64,
    /// Points granted, pending until activation
    pub points_earned: i64,
    /// When the points become spendable
    pub activation_time: DateTime<Utc>,
    /// When the points expire
    pub expiry_time: DateTime<Utc>,
}

/// A redemption to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionRequest {
    /// Customer redeeming
    pub customer_id: i64,
    /// Bill amount in rupees, before discount
    pub bill_amount: Decimal,
    /// Points to convert into discount
    pub points_to_redeem: i64,
    /// Optional invoice reference
    pub invoice_number: Option<String>,
    /// Authenticated operator applying the redemption
    pub operator_id: String,
}

/// Outcome of an applied redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionReceipt {
    /// Id of the REDEMPTION transaction
    pub transaction_id: i64,
    /// Points spent
    pub points_redeemed: i64,
    /// Discount in rupees
    pub discount_amount: Decimal,
    /// Amount payable after discount
    pub final_bill: Decimal,
    /// Points earned on the discounted remainder, pending
    pub new_points_earned: i64,
    /// Available balance after the redemption
    pub new_balance: i64,
}

/// Orchestrates the lot store, recorder and aggregates
#[derive(Clone)]
pub struct LedgerEngine {
    pub(super) db: Arc<DatabaseConnection>,
    pub(super) config: Arc<LedgerConfig>,
    pub(super) locks: Arc<CustomerLocks>,
    pub(super) clock: Arc<dyn Clock>,
}

/// Writes made under a customer lock, waiting for commit.
///
/// Dropping it rolls the writes back and releases the lock.
pub(super) struct Staged<T> {
    _guard: CustomerGuard,
    txn: DatabaseTransaction,
    output: T,
}

impl<T> Staged<T> {
    pub(super) fn new(guard: CustomerGuard, txn: DatabaseTransaction, output: T) -> Self {
        Self {
            _guard: guard,
            txn,
            output,
        }
    }

    /// Commits the writes and releases the customer lock.
    pub(super) async fn commit(self) -> Result<T> {
        self.txn.commit().await?;
        Ok(self.output)
    }
}

impl LedgerEngine {
    /// Creates an engine reading wall-clock time.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    /// Creates an engine reading time from `clock`.
    #[must_use]
    pub fn with_clock(db: DatabaseConnection, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            locks: Arc::new(CustomerLocks::new()),
            clock,
        }
    }

    /// Underlying database connection, for read-only queries
    #[must_use]
    pub fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Policy the engine runs with
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current time as the engine sees it
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(super) async fn lock_customer(&self, customer_id: i64) -> CustomerGuard {
        self.locks.acquire(customer_id).await
    }

    /// Runs `stage` under the operation timeout. Commit is left to the
    /// caller so a timeout can only ever drop uncommitted writes.
    pub(super) async fn within_deadline<T>(
        &self,
        stage: impl Future<Output = Result<Staged<T>>>,
    ) -> Result<Staged<T>> {
        tokio::time::timeout(self.config.operation_timeout(), stage)
            .await
            .unwrap_or_else(|elapsed| Err(elapsed.into()))
    }

    /// Records a qualifying purchase and grants pending points.
    ///
    /// `points_earned = floor(bill / points_divisor)`. Only
    /// `total_points_earned` moves; `available_points` waits for activation.
    ///
    /// # Errors
    /// [`Error::BelowMinimumAmount`], [`Error::AmountOutOfRange`],
    /// [`Error::InvalidAmount`], [`Error::NotFound`],
    /// [`Error::CustomerInactive`], [`Error::Transient`], [`Error::Database`].
    #[instrument(skip(self, request), fields(customer_id = request.customer_id, bill = %request.bill_amount))]
    pub async fn record_purchase(&self, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        let staged = self
            .within_deadline(self.stage_purchase(request))
            .await
            .inspect_err(|e| warn!("Purchase rejected: {e}"))?;
        let receipt = staged.commit().await?;

        info!(
            transaction_id = receipt.transaction_id,
            points = receipt.points_earned,
            "Recorded purchase, points pending until {}",
            receipt.activation_time
        );
        Ok(receipt)
    }

    async fn stage_purchase(&self, request: PurchaseRequest) -> Result<Staged<PurchaseReceipt>> {
        let (bill_paise, points) = amounts::qualifying_purchase(request.bill_amount, &self.config)?;
        let operator = operator(&request.operator_id)?;

        let guard = self.lock_customer(request.customer_id).await;
        let now = self.clock.now();
        let schedule = LotSchedule::starting_at(now, &self.config)?;
        let txn = self.db.begin().await?;

        get_active_customer(&txn, request.customer_id).await?;

        let record = recorder::record(
            &txn,
            NewTransaction {
                customer_id: request.customer_id,
                kind: TransactionKind::Purchase,
                bill_amount_paise: bill_paise,
                points_earned: points,
                points_redeemed: 0,
                discount_amount_paise: 0,
                final_amount_paise: bill_paise,
                invoice_number: request.invoice_number,
                created_by: operator,
                created_at: now,
            },
        )
        .await?;

        lots::create_earned_lot(&txn, request.customer_id, points, schedule, record.id, now)
            .await?;

        apply_aggregate_deltas(
            &txn,
            request.customer_id,
            AggregateDeltas {
                earned: points,
                ..AggregateDeltas::default()
            },
            now,
        )
        .await?;

        Ok(Staged::new(
            guard,
            txn,
            PurchaseReceipt {
                transaction_id: record.id,
                points_earned: points,
                activation_time: schedule.activation_time,
                expiry_time: schedule.expiry_time,
            },
        ))
    }

    /// Converts available points into a bill discount, one point per rupee.
    ///
    /// The discounted remainder earns points at the standard rate as a new
    /// pending lot. The balance check, lot consumption and aggregate update
    /// happen under the customer lock in one database transaction.
    ///
    /// # Errors
    /// [`Error::InvalidAmount`], [`Error::AmountOutOfRange`],
    /// [`Error::InsufficientPoints`], [`Error::NotFound`],
    /// [`Error::CustomerInactive`], [`Error::Transient`], [`Error::Database`].
    #[instrument(skip(self, request), fields(customer_id = request.customer_id, points = request.points_to_redeem))]
    pub async fn redeem_points(&self, request: RedemptionRequest) -> Result<RedemptionReceipt> {
        let staged = self
            .within_deadline(self.stage_redemption(request))
            .await
            .inspect_err(|e| warn!("Redemption rejected: {e}"))?;
        let receipt = staged.commit().await?;

        info!(
            transaction_id = receipt.transaction_id,
            new_points = receipt.new_points_earned,
            new_balance = receipt.new_balance,
            "Redeemed points"
        );
        Ok(receipt)
    }

    async fn stage_redemption(
        &self,
        request: RedemptionRequest,
    ) -> Result<Staged<RedemptionReceipt>> {
        let points = request.points_to_redeem;
        if points < 1 {
            return Err(Error::InvalidAmount {
                amount: Decimal::from(points),
            });
        }
        let bill_paise = amounts::bounded_bill(request.bill_amount, &self.config)?;
        let operator = operator(&request.operator_id)?;

        let guard = self.lock_customer(request.customer_id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await?;

        let customer = get_active_customer(&txn, request.customer_id).await?;
        if points > customer.available_points {
            return Err(Error::InsufficientPoints {
                available: customer.available_points,
                requested: points,
            });
        }

        let discount_paise = points.checked_mul(100).ok_or(Error::InvalidAmount {
            amount: Decimal::from(points),
        })?;
        let final_paise = (bill_paise - discount_paise).max(0);
        let new_points = amounts::points_for_paise(final_paise, &self.config);

        let record = recorder::record(
            &txn,
            NewTransaction {
                customer_id: request.customer_id,
                kind: TransactionKind::Redemption,
                bill_amount_paise: bill_paise,
                points_earned: new_points,
                points_redeemed: points,
                discount_amount_paise: discount_paise,
                final_amount_paise: final_paise,
                invoice_number: request.invoice_number,
                created_by: operator,
                created_at: now,
            },
        )
        .await?;

        let draws = lots::consume(&txn, request.customer_id, points).await?;
        recorder::record_consumptions(&txn, record.id, &draws).await?;
        lots::create_redeemed_lot(&txn, request.customer_id, points, record.id, now).await?;
        debug!(transaction_id = record.id, lots_drawn = draws.len(), "Consumed lots");

        if new_points > 0 {
            let schedule = LotSchedule::starting_at(now, &self.config)?;
            lots::create_earned_lot(&txn, request.customer_id, new_points, schedule, record.id, now)
                .await?;
        }

        apply_aggregate_deltas(
            &txn,
            request.customer_id,
            AggregateDeltas {
                earned: new_points,
                available: -points,
                redeemed: points,
            },
            now,
        )
        .await?;

        Ok(Staged::new(
            guard,
            txn,
            RedemptionReceipt {
                transaction_id: record.id,
                points_redeemed: points,
                discount_amount: amounts::from_paise(discount_paise),
                final_bill: amounts::from_paise(final_paise),
                new_points_earned: new_points,
                new_balance: customer.available_points - points,
            },
        ))
    }
}

impl LedgerEngine {
    /// Registers a customer at the engine's current time.
    pub async fn register_customer(
        &self,
        form: super::customer::NewCustomer,
    ) -> Result<crate::entities::CustomerModel> {
        super::customer::register_customer(&self.db, &self.config, form, self.clock.now()).await
    }

    /// Current balance of a customer.
    pub async fn balance(&self, customer_id: i64) -> Result<super::balance::PointBalance> {
        super::balance::project_balance(&*self.db, &self.config, customer_id, self.clock.now())
            .await
    }

    /// Customer record, balance and recent transactions.
    pub async fn profile(&self, customer_id: i64) -> Result<super::balance::CustomerProfile> {
        super::balance::customer_profile(&*self.db, &self.config, customer_id, self.clock.now())
            .await
    }

    /// Cached aggregates compared with the lot store.
    pub async fn audit(&self, customer_id: i64) -> Result<super::balance::AggregateAudit> {
        super::balance::audit_customer(&*self.db, customer_id, self.clock.now()).await
    }
}

fn operator(operator_id: &str) -> Result<String> {
    let operator_id = operator_id.trim();
    if operator_id.is_empty() {
        return Err(Error::InvalidInput {
            message: "operator id is required".to_string(),
        });
    }
    Ok(operator_id.to_string())
}
