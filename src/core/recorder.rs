//! Transaction recorder - Append-only log of purchases and redemptions.
//!
//! The only write exposed here is [`record`]. There is no update or delete:
//! corrections are new, offsetting transactions. The read functions serve
//! transaction history and the redemption breakdown.

use crate::{
    entities::{
        LotConsumption, Transaction, TransactionKind, TransactionStatus, lot_consumption,
        transaction,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};

use super::lots::LotDraw;

/// Everything needed to append one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Customer the transaction belongs to
    pub customer_id: i64,
    /// PURCHASE or REDEMPTION
    pub kind: TransactionKind,
    /// Bill before discount, in paise
    pub bill_amount_paise: i64,
    /// Points granted (pending)
    pub points_earned: i64,
    /// Points spent
    pub points_redeemed: i64,
    /// Discount, in paise
    pub discount_amount_paise: i64,
    /// Payable after discount, in paise
    pub final_amount_paise: i64,
    /// Optional invoice reference
    pub invoice_number: Option<String>,
    /// Operator recording the transaction
    pub created_by: String,
    /// Record time
    pub created_at: DateTime<Utc>,
}

/// Filter for [`list_transactions`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Only this customer
    pub customer_id: Option<i64>,
    /// Only this kind
    pub kind: Option<TransactionKind>,
    /// Created at or after
    pub from: Option<DateTime<Utc>>,
    /// Created strictly before
    pub until: Option<DateTime<Utc>>,
    /// At most this many rows
    pub limit: Option<u64>,
}

/// Appends one transaction and returns it with its generated id.
pub async fn record<C>(db: &C, entry: NewTransaction) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let model = transaction::ActiveModel {
        customer_id: Set(entry.customer_id),
        kind: Set(entry.kind),
        bill_amount_paise: Set(entry.bill_amount_paise),
        points_earned: Set(entry.points_earned),
        points_redeemed: Set(entry.points_redeemed),
        discount_amount_paise: Set(entry.discount_amount_paise),
        final_amount_paise: Set(entry.final_amount_paise),
        invoice_number: Set(entry.invoice_number),
        status: Set(TransactionStatus::Completed),
        created_by: Set(entry.created_by),
        created_at: Set(entry.created_at),
        ..Default::default()
    };

    model.insert(db).await.map_err(Into::into)
}

/// Stores which lots funded a redemption.
pub async fn record_consumptions<C>(db: &C, transaction_id: i64, draws: &[LotDraw]) -> Result<()>
where
    C: ConnectionTrait,
{
    if draws.is_empty() {
        return Ok(());
    }

    let rows = draws.iter().map(|draw| lot_consumption::ActiveModel {
        transaction_id: Set(transaction_id),
        lot_id: Set(draw.lot_id),
        points: Set(draw.points),
        ..Default::default()
    });
    LotConsumption::insert_many(rows).exec(db).await?;
    Ok(())
}

/// Retrieves a transaction by id.
pub async fn get_transaction<C>(db: &C, transaction_id: i64) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("transaction", transaction_id))
}

/// Most recent transactions of a customer, newest first.
pub async fn transactions_for_customer<C>(
    db: &C,
    customer_id: i64,
    limit: u64,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    list_transactions(
        db,
        &TransactionFilter {
            customer_id: Some(customer_id),
            limit: Some(limit),
            ..TransactionFilter::default()
        },
    )
    .await
}

/// Transactions matching `filter`, newest first.
pub async fn list_transactions<C>(
    db: &C,
    filter: &TransactionFilter,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Transaction::find();
    if let Some(customer_id) = filter.customer_id {
        query = query.filter(transaction::Column::CustomerId.eq(customer_id));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(transaction::Column::Kind.eq(kind));
    }
    if let Some(from) = filter.from {
        query = query.filter(transaction::Column::CreatedAt.gte(from));
    }
    if let Some(until) = filter.until {
        query = query.filter(transaction::Column::CreatedAt.lt(until));
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    query
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lot draws recorded for a redemption, in draw order.
pub async fn consumptions_for_transaction<C>(
    db: &C,
    transaction_id: i64,
) -> Result<Vec<lot_consumption::Model>>
where
    C: ConnectionTrait,
{
    LotConsumption::find()
        .filter(lot_consumption::Column::TransactionId.eq(transaction_id))
        .order_by_asc(lot_consumption::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn entry(customer_id: i64, kind: TransactionKind, at: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            customer_id,
            kind,
            bill_amount_paise: 1_000_000,
            points_earned: 200,
            points_redeemed: 0,
            discount_amount_paise: 0,
            final_amount_paise: 1_000_000,
            invoice_number: Some("INV-001".to_string()),
            created_by: "staff1".to_string(),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_get_transaction_not_found() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<transaction::Model>::new()])
            .into_connection();

        let result = get_transaction(&db, 999).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "transaction",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_and_read_back() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "9000000001").await?;
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();

        let recorded = record(&db, entry(customer.id, TransactionKind::Purchase, at)).await?;
        assert_eq!(recorded.status, TransactionStatus::Completed);
        assert_eq!(recorded.invoice_number.as_deref(), Some("INV-001"));
        assert_eq!(recorded.created_by, "staff1");

        let fetched = get_transaction(&db, recorded.id).await?;
        assert_eq!(fetched, recorded);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_transactions_filters() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_customer(&db, "9000000002").await?;
        let second = create_test_customer(&db, "9000000003").await?;
        let day = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();

        record(&db, entry(first.id, TransactionKind::Purchase, day)).await?;
        let newest = record(
            &db,
            entry(first.id, TransactionKind::Redemption, day + Duration::days(2)),
        )
        .await?;
        record(&db, entry(second.id, TransactionKind::Purchase, day)).await?;

        let for_first = transactions_for_customer(&db, first.id, 10).await?;
        assert_eq!(for_first.len(), 2);
        assert_eq!(for_first[0], newest);

        let redemptions = list_transactions(
            &db,
            &TransactionFilter {
                kind: Some(TransactionKind::Redemption),
                ..TransactionFilter::default()
            },
        )
        .await?;
        assert_eq!(redemptions, vec![newest]);

        let window = list_transactions(
            &db,
            &TransactionFilter {
                from: Some(day),
                until: Some(day + Duration::days(1)),
                ..TransactionFilter::default()
            },
        )
        .await?;
        assert_eq!(window.len(), 2);

        let limited = transactions_for_customer(&db, first.id, 1).await?;
        assert_eq!(limited.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_consumptions_empty_is_noop() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        record_consumptions(&db, 1, &[]).await?;
        Ok(())
    }
}
