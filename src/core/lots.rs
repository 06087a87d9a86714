//! Point lot store - Durable state machine over individual point grants.
//!
//! EARNED lots are created pending, flipped to active by the activation sweep,
//! drawn down by redemptions and flipped to expired by the expiry sweep.
//! REDEEMED lots are inserted once per redemption and never touched again.
//! Functions take any [`ConnectionTrait`] so the engine can run them inside
//! its database transaction.

use crate::{
    config::LedgerConfig,
    entities::{LotKind, PointLot, point_lot},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use tracing::debug;

/// Activation and expiry instants for a newly earned lot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotSchedule {
    /// When the lot becomes spendable
    pub activation_time: DateTime<Utc>,
    /// When the lot stops being spendable
    pub expiry_time: DateTime<Utc>,
}

impl LotSchedule {
    /// Schedule for a lot earned at `now`: activation after the configured
    /// delay, expiry the configured number of years after activation.
    ///
    /// Fails with [`Error::Config`] if the policy pushes either instant past
    /// the representable calendar.
    pub fn starting_at(now: DateTime<Utc>, config: &LedgerConfig) -> Result<Self> {
        let out_of_range = || Error::Config {
            message: "activation delay or expiry window is out of range".to_string(),
        };
        let activation_time = config
            .activation_delay()
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(out_of_range)?;
        let expiry_time = activation_time
            .checked_add_months(config.expiry_months())
            .ok_or_else(out_of_range)?;
        Ok(Self {
            activation_time,
            expiry_time,
        })
    }
}

/// Points taken from one lot by a consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotDraw {
    /// Lot drawn from
    pub lot_id: i64,
    /// Points taken
    pub points: i64,
}

/// Balance partitions computed from a customer's lots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LotTotals {
    /// Remaining points in active, unexpired EARNED lots
    pub available: i64,
    /// Remaining points in inactive, unexpired EARNED lots
    pub pending: i64,
    /// Subset of `available` expiring within the horizon
    pub expiring_soon: i64,
}

/// Lifetime sums over all of a customer's lots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifetimeTotals {
    /// Sum of `points` over EARNED lots
    pub earned: i64,
    /// Sum of `points` over REDEEMED lots
    pub redeemed: i64,
}

/// Lots flipped by one sweep step for one customer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Number of lots whose flag changed
    pub lots: u64,
    /// Sum of `remaining` over those lots
    pub points: i64,
}

/// Inserts a pending EARNED lot.
///
/// Fails with [`Error::InvalidAmount`] unless `points` is positive.
pub async fn create_earned_lot<C>(
    db: &C,
    customer_id: i64,
    points: i64,
    schedule: LotSchedule,
    origin_transaction_id: i64,
    now: DateTime<Utc>,
) -> Result<point_lot::Model>
where
    C: ConnectionTrait,
{
    if points <= 0 {
        return Err(Error::InvalidAmount {
            amount: Decimal::from(points),
        });
    }

    let lot = point_lot::ActiveModel {
        customer_id: Set(customer_id),
        kind: Set(LotKind::Earned),
        points: Set(points),
        remaining: Set(points),
        is_active: Set(false),
        is_expired: Set(false),
        activation_time: Set(Some(schedule.activation_time)),
        expiry_time: Set(Some(schedule.expiry_time)),
        created_at: Set(now),
        origin_transaction_id: Set(origin_transaction_id),
        ..Default::default()
    };

    lot.insert(db).await.map_err(Into::into)
}

/// Inserts the REDEEMED audit lot for a redemption.
pub async fn create_redeemed_lot<C>(
    db: &C,
    customer_id: i64,
    points: i64,
    origin_transaction_id: i64,
    now: DateTime<Utc>,
) -> Result<point_lot::Model>
where
    C: ConnectionTrait,
{
    if points <= 0 {
        return Err(Error::InvalidAmount {
            amount: Decimal::from(points),
        });
    }

    let lot = point_lot::ActiveModel {
        customer_id: Set(customer_id),
        kind: Set(LotKind::Redeemed),
        points: Set(points),
        remaining: Set(0),
        is_active: Set(false),
        is_expired: Set(false),
        activation_time: Set(None),
        expiry_time: Set(None),
        created_at: Set(now),
        origin_transaction_id: Set(origin_transaction_id),
        ..Default::default()
    };

    lot.insert(db).await.map_err(Into::into)
}

/// Spendable lots of a customer in draw-down order: soonest expiry first,
/// then oldest activation.
pub async fn spendable_lots<C>(db: &C, customer_id: i64) -> Result<Vec<point_lot::Model>>
where
    C: ConnectionTrait,
{
    PointLot::find()
        .filter(point_lot::Column::CustomerId.eq(customer_id))
        .filter(point_lot::Column::Kind.eq(LotKind::Earned))
        .filter(point_lot::Column::IsActive.eq(true))
        .filter(point_lot::Column::IsExpired.eq(false))
        .filter(point_lot::Column::Remaining.gt(0))
        .order_by_asc(point_lot::Column::ExpiryTime)
        .order_by_asc(point_lot::Column::ActivationTime)
        .order_by_asc(point_lot::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Draws `amount` points from the customer's spendable lots.
///
/// All-or-nothing: if the spendable lots hold less than `amount`, fails with
/// [`Error::InsufficientPoints`] before any lot is touched.
pub async fn consume<C>(db: &C, customer_id: i64, amount: i64) -> Result<Vec<LotDraw>>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: Decimal::from(amount),
        });
    }

    let lots = spendable_lots(db, customer_id).await?;
    let available: i64 = lots.iter().map(|lot| lot.remaining).sum();
    if available < amount {
        return Err(Error::InsufficientPoints {
            available,
            requested: amount,
        });
    }

    let mut outstanding = amount;
    let mut draws = Vec::new();
    for lot in lots {
        if outstanding == 0 {
            break;
        }
        let take = lot.remaining.min(outstanding);

        let result = PointLot::update_many()
            .col_expr(
                point_lot::Column::Remaining,
                Expr::col(point_lot::Column::Remaining).sub(take),
            )
            .filter(point_lot::Column::Id.eq(lot.id))
            .filter(point_lot::Column::Remaining.gte(take))
            .exec(db)
            .await?;

        if result.rows_affected != 1 {
            return Err(Error::Transient {
                message: format!("lot {} changed during consumption", lot.id),
            });
        }

        debug!(lot_id = lot.id, take, "Drew points from lot");
        draws.push(LotDraw {
            lot_id: lot.id,
            points: take,
        });
        outstanding -= take;
    }

    Ok(draws)
}

/// Computes available, pending and expiring-soon totals from the lots.
pub async fn sum_by_state<C>(
    db: &C,
    customer_id: i64,
    now: DateTime<Utc>,
    expiring_within: Duration,
) -> Result<LotTotals>
where
    C: ConnectionTrait,
{
    let lots = PointLot::find()
        .filter(point_lot::Column::CustomerId.eq(customer_id))
        .filter(point_lot::Column::Kind.eq(LotKind::Earned))
        .filter(point_lot::Column::IsExpired.eq(false))
        .filter(point_lot::Column::Remaining.gt(0))
        .all(db)
        .await?;

    let horizon = now + expiring_within;
    Ok(lots.iter().fold(LotTotals::default(), |mut totals, lot| {
        if lot.is_active {
            totals.available += lot.remaining;
            if lot.expiry_time.is_some_and(|expiry| expiry <= horizon) {
                totals.expiring_soon += lot.remaining;
            }
        } else {
            totals.pending += lot.remaining;
        }
        totals
    }))
}

/// Sums granted and redeemed points over every lot the customer has.
pub async fn sum_lifetime<C>(db: &C, customer_id: i64) -> Result<LifetimeTotals>
where
    C: ConnectionTrait,
{
    let lots = PointLot::find()
        .filter(point_lot::Column::CustomerId.eq(customer_id))
        .all(db)
        .await?;

    Ok(lots
        .iter()
        .fold(LifetimeTotals::default(), |mut totals, lot| {
            match lot.kind {
                LotKind::Earned => totals.earned += lot.points,
                LotKind::Redeemed => totals.redeemed += lot.points,
            }
            totals
        }))
}

/// All lots of a customer, newest first.
pub async fn lots_for_customer<C>(db: &C, customer_id: i64) -> Result<Vec<point_lot::Model>>
where
    C: ConnectionTrait,
{
    PointLot::find()
        .filter(point_lot::Column::CustomerId.eq(customer_id))
        .order_by_desc(point_lot::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Customers owning at least one pending lot whose activation time has passed.
pub async fn customers_due_for_activation<C>(db: &C, now: DateTime<Utc>) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    PointLot::find()
        .select_only()
        .column(point_lot::Column::CustomerId)
        .distinct()
        .filter(point_lot::Column::Kind.eq(LotKind::Earned))
        .filter(point_lot::Column::IsActive.eq(false))
        .filter(point_lot::Column::IsExpired.eq(false))
        .filter(point_lot::Column::ActivationTime.lte(now))
        .order_by_asc(point_lot::Column::CustomerId)
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Customers owning at least one active lot with points left past its expiry time.
pub async fn customers_due_for_expiry<C>(db: &C, now: DateTime<Utc>) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    PointLot::find()
        .select_only()
        .column(point_lot::Column::CustomerId)
        .distinct()
        .filter(point_lot::Column::Kind.eq(LotKind::Earned))
        .filter(point_lot::Column::IsActive.eq(true))
        .filter(point_lot::Column::IsExpired.eq(false))
        .filter(point_lot::Column::Remaining.gt(0))
        .filter(point_lot::Column::ExpiryTime.lte(now))
        .order_by_asc(point_lot::Column::CustomerId)
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Flips every due pending lot of one customer to active.
///
/// Each flip is conditional on the lot still being inactive, so a lot is
/// counted at most once even if two sweeps overlap.
pub async fn activate_due<C>(db: &C, customer_id: i64, now: DateTime<Utc>) -> Result<SweepOutcome>
where
    C: ConnectionTrait,
{
    let due = PointLot::find()
        .filter(point_lot::Column::CustomerId.eq(customer_id))
        .filter(point_lot::Column::Kind.eq(LotKind::Earned))
        .filter(point_lot::Column::IsActive.eq(false))
        .filter(point_lot::Column::IsExpired.eq(false))
        .filter(point_lot::Column::ActivationTime.lte(now))
        .all(db)
        .await?;

    let mut outcome = SweepOutcome::default();
    for lot in due {
        let result = PointLot::update_many()
            .col_expr(point_lot::Column::IsActive, Expr::value(true))
            .filter(point_lot::Column::Id.eq(lot.id))
            .filter(point_lot::Column::IsActive.eq(false))
            .exec(db)
            .await?;
        if result.rows_affected == 1 {
            outcome.lots += 1;
            outcome.points += lot.remaining;
        }
    }
    Ok(outcome)
}

/// Flips every active lot of one customer that is past expiry and still
/// holds points to expired. `remaining` is kept as the amount lost to expiry.
pub async fn expire_due<C>(db: &C, customer_id: i64, now: DateTime<Utc>) -> Result<SweepOutcome>
where
    C: ConnectionTrait,
{
    let due = PointLot::find()
        .filter(point_lot::Column::CustomerId.eq(customer_id))
        .filter(point_lot::Column::Kind.eq(LotKind::Earned))
        .filter(point_lot::Column::IsActive.eq(true))
        .filter(point_lot::Column::IsExpired.eq(false))
        .filter(point_lot::Column::Remaining.gt(0))
        .filter(point_lot::Column::ExpiryTime.lte(now))
        .all(db)
        .await?;

    let mut outcome = SweepOutcome::default();
    for lot in due {
        let result = PointLot::update_many()
            .col_expr(point_lot::Column::IsExpired, Expr::value(true))
            .filter(point_lot::Column::Id.eq(lot.id))
            .filter(point_lot::Column::IsExpired.eq(false))
            .exec(db)
            .await?;
        if result.rows_affected == 1 {
            outcome.lots += 1;
            outcome.points += lot.remaining;
        }
    }
    Ok(outcome)
}
