//! Customer registry - Registration, lookup and soft deactivation.
//!
//! Registration assigns a human-readable sequential code from the `sequences`
//! table inside the same database transaction as the insert. Aggregates start
//! at zero and are never written here; only the ledger engine and the
//! sweepers move them.

use crate::{
    config::LedgerConfig,
    entities::{Customer, CustomerStatus, Sequence, customer, sequence},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{info, instrument};

const CUSTOMER_CODE_SEQUENCE: &str = "customer_code";

/// Registration form as handed over by the collaborating UI layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCustomer {
    /// Full name
    pub name: String,
    /// 10-digit mobile number
    pub phone: String,
    /// Optional email address
    pub email: Option<String>,
    /// Optional 12-digit Aadhaar number
    pub aadhar_number: Option<String>,
    /// Optional passport number
    pub passport_number: Option<String>,
}

impl NewCustomer {
    /// Trims the fields, drops empty optionals and checks their shape.
    fn normalized(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.chars().count() < 2 || name.chars().count() > 255 {
            return Err(invalid("name must be between 2 and 255 characters"));
        }

        let phone = self.phone.trim().to_string();
        if !is_digits(&phone, 10) {
            return Err(invalid("phone number must be exactly 10 digits"));
        }

        let email = non_empty(self.email);
        if email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(invalid("invalid email address"));
        }

        let aadhar_number = non_empty(self.aadhar_number);
        if aadhar_number.as_deref().is_some_and(|a| !is_digits(a, 12)) {
            return Err(invalid("Aadhaar number must be exactly 12 digits"));
        }

        let passport_number = non_empty(self.passport_number);
        if passport_number
            .as_deref()
            .is_some_and(|p| p.chars().count() > 20)
        {
            return Err(invalid("passport number must be at most 20 characters"));
        }

        Ok(Self {
            name,
            phone,
            email,
            aadhar_number,
            passport_number,
        })
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput {
        message: message.to_string(),
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Formats a sequence number as a customer code, e.g. `MGP000001`.
#[must_use]
pub fn format_customer_code(config: &LedgerConfig, sequence: i64) -> String {
    format!(
        "{}{:0width$}",
        config.customer_code_prefix,
        sequence,
        width = config.customer_code_width
    )
}

/// Registers a customer with zeroed aggregates.
///
/// Fails with [`Error::Conflict`] when the phone or Aadhaar number is
/// already registered.
#[instrument(skip(db, config, form), fields(phone = %form.phone))]
pub async fn register_customer(
    db: &DatabaseConnection,
    config: &LedgerConfig,
    form: NewCustomer,
    now: DateTime<Utc>,
) -> Result<customer::Model> {
    let form = form.normalized()?;
    let txn = db.begin().await?;

    let phone_taken = Customer::find()
        .filter(customer::Column::Phone.eq(form.phone.as_str()))
        .one(&txn)
        .await?
        .is_some();
    if phone_taken {
        return Err(Error::Conflict {
            field: "phone".to_string(),
        });
    }

    if let Some(aadhar) = form.aadhar_number.as_deref() {
        let aadhar_taken = Customer::find()
            .filter(customer::Column::AadharNumber.eq(aadhar))
            .one(&txn)
            .await?
            .is_some();
        if aadhar_taken {
            return Err(Error::Conflict {
                field: "aadhar_number".to_string(),
            });
        }
    }

    let sequence = next_sequence_value(&txn, CUSTOMER_CODE_SEQUENCE).await?;
    let customer = customer::ActiveModel {
        sequential_code: Set(format_customer_code(config, sequence)),
        name: Set(form.name),
        phone: Set(form.phone),
        email: Set(form.email),
        aadhar_number: Set(form.aadhar_number),
        passport_number: Set(form.passport_number),
        status: Set(CustomerStatus::Active),
        total_points_earned: Set(0),
        available_points: Set(0),
        total_points_redeemed: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(code = %customer.sequential_code, "Registered customer");
    Ok(customer)
}

/// Increments and returns the named counter, creating it at 1.
async fn next_sequence_value<C>(db: &C, name: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let bumped = Sequence::update_many()
        .col_expr(
            sequence::Column::Value,
            Expr::col(sequence::Column::Value).add(1),
        )
        .filter(sequence::Column::Name.eq(name))
        .exec(db)
        .await?;

    if bumped.rows_affected == 0 {
        sequence::ActiveModel {
            name: Set(name.to_string()),
            value: Set(1),
        }
        .insert(db)
        .await?;
        return Ok(1);
    }

    Sequence::find_by_id(name.to_string())
        .one(db)
        .await?
        .map(|row| row.value)
        .ok_or_else(|| Error::not_found("sequence", name))
}

/// Retrieves a customer by id, failing with [`Error::NotFound`].
pub async fn get_customer<C>(db: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    Customer::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("customer", customer_id))
}

/// Retrieves a customer that may transact: exists and is active.
pub async fn get_active_customer<C>(db: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    let customer = get_customer(db, customer_id).await?;
    if customer.status == CustomerStatus::Inactive {
        return Err(Error::CustomerInactive {
            code: customer.sequential_code,
        });
    }
    Ok(customer)
}

/// Looks a customer up by sequential code.
pub async fn find_customer_by_code(
    db: &DatabaseConnection,
    code: &str,
) -> Result<Option<customer::Model>> {
    Customer::find()
        .filter(customer::Column::SequentialCode.eq(code))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Substring search over name, phone and sequential code, alphabetical by name.
pub async fn search_customers(
    db: &DatabaseConnection,
    query: &str,
    limit: u64,
) -> Result<Vec<customer::Model>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    Customer::find()
        .filter(
            Condition::any()
                .add(customer::Column::Name.contains(query))
                .add(customer::Column::Phone.contains(query))
                .add(customer::Column::SequentialCode.contains(query)),
        )
        .order_by_asc(customer::Column::Name)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Soft status change; customers are never deleted.
pub async fn set_customer_status(
    db: &DatabaseConnection,
    customer_id: i64,
    status: CustomerStatus,
    now: DateTime<Utc>,
) -> Result<customer::Model> {
    let customer = get_customer(db, customer_id).await?;
    let mut active: customer::ActiveModel = customer.into();
    active.status = Set(status);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Adds the given deltas to the cached aggregates in one atomic update.
///
/// Callers must hold the customer lock and run inside the same database
/// transaction as the lot mutation the deltas describe.
pub(crate) async fn apply_aggregate_deltas<C>(
    db: &C,
    customer_id: i64,
    deltas: AggregateDeltas,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Customer::update_many()
        .col_expr(
            customer::Column::TotalPointsEarned,
            Expr::col(customer::Column::TotalPointsEarned).add(deltas.earned),
        )
        .col_expr(
            customer::Column::AvailablePoints,
            Expr::col(customer::Column::AvailablePoints).add(deltas.available),
        )
        .col_expr(
            customer::Column::TotalPointsRedeemed,
            Expr::col(customer::Column::TotalPointsRedeemed).add(deltas.redeemed),
        )
        .col_expr(customer::Column::UpdatedAt, Expr::value(now))
        .filter(customer::Column::Id.eq(customer_id))
        .filter(customer::Column::AvailablePoints.gte(-deltas.available))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let customer = get_customer(db, customer_id).await?;
    Err(Error::InsufficientPoints {
        available: customer.available_points,
        requested: -deltas.available,
    })
}

/// Signed changes to the three cached aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AggregateDeltas {
    pub earned: i64,
    pub available: i64,
    pub redeemed: i64,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn form(phone: &str) -> NewCustomer {
        NewCustomer {
            name: "Asha Verma".to_string(),
            phone: phone.to_string(),
            email: Some("asha@example.com".to_string()),
            aadhar_number: None,
            passport_number: None,
        }
    }

    #[test]
    fn test_format_customer_code() {
        let config = LedgerConfig::default();
        assert_eq!(format_customer_code(&config, 1), "MGP000001");
        assert_eq!(format_customer_code(&config, 1_234_567), "MGP1234567");
    }

    #[tokio::test]
    async fn test_register_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let config = LedgerConfig::default();

        let short_phone = NewCustomer {
            phone: "12345".to_string(),
            ..form("")
        };
        let result = register_customer(&db, &config, short_phone, test_now()).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let bad_aadhar = NewCustomer {
            aadhar_number: Some("1234".to_string()),
            ..form("9876543210")
        };
        let result = register_customer(&db, &config, bad_aadhar, test_now()).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let no_name = NewCustomer {
            name: " ".to_string(),
            ..form("9876543210")
        };
        let result = register_customer(&db, &config, no_name, test_now()).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_codes() -> Result<()> {
        let db = setup_test_db().await?;
        let config = LedgerConfig::default();

        let first = register_customer(&db, &config, form("9876543210"), test_now()).await?;
        let second = register_customer(&db, &config, form("9876543211"), test_now()).await?;

        assert_eq!(first.sequential_code, "MGP000001");
        assert_eq!(second.sequential_code, "MGP000002");
        assert_eq!(first.status, CustomerStatus::Active);
        assert_eq!(first.total_points_earned, 0);
        assert_eq!(first.available_points, 0);
        assert_eq!(first.total_points_redeemed, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_duplicate_phone_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let config = LedgerConfig::default();
        register_customer(&db, &config, form("9876543210"), test_now()).await?;

        let result = register_customer(&db, &config, form("9876543210"), test_now()).await;
        assert!(matches!(result, Err(Error::Conflict { field }) if field == "phone"));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_duplicate_aadhar_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let config = LedgerConfig::default();
        let with_aadhar = |phone: &str| NewCustomer {
            aadhar_number: Some("123456789012".to_string()),
            ..form(phone)
        };
        register_customer(&db, &config, with_aadhar("9876543210"), test_now()).await?;

        let result = register_customer(&db, &config, with_aadhar("9876543211"), test_now()).await;
        assert!(matches!(result, Err(Error::Conflict { field }) if field == "aadhar_number"));

        // the failed registration must not burn a code
        let next = register_customer(&db, &config, form("9876543212"), test_now()).await?;
        assert_eq!(next.sequential_code, "MGP000002");
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_and_search() -> Result<()> {
        let db = setup_test_db().await?;
        let config = LedgerConfig::default();
        let asha = register_customer(&db, &config, form("9876543210"), test_now()).await?;

        let by_code = find_customer_by_code(&db, "MGP000001").await?;
        assert_eq!(by_code, Some(asha.clone()));

        assert_eq!(search_customers(&db, "Asha", 10).await?, vec![asha.clone()]);
        assert_eq!(search_customers(&db, "543210", 10).await?, vec![asha]);
        assert!(search_customers(&db, "Nobody", 10).await?.is_empty());
        assert!(search_customers(&db, "  ", 10).await?.is_empty());

        let missing = get_customer(&db, 42).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_deactivated_customer_cannot_transact() -> Result<()> {
        let db = setup_test_db().await?;
        let config = LedgerConfig::default();
        let customer = register_customer(&db, &config, form("9876543210"), test_now()).await?;

        let updated =
            set_customer_status(&db, customer.id, CustomerStatus::Inactive, test_now()).await?;
        assert_eq!(updated.status, CustomerStatus::Inactive);

        let result = get_active_customer(&db, customer.id).await;
        assert!(matches!(result, Err(Error::CustomerInactive { code }) if code == "MGP000001"));
        Ok(())
    }

    #[tokio::test]
    async fn test_aggregate_deltas_refuse_negative_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "9876543210").await?;

        let result = apply_aggregate_deltas(
            &db,
            customer.id,
            AggregateDeltas {
                available: -1,
                redeemed: 1,
                ..AggregateDeltas::default()
            },
            test_now(),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientPoints {
                available: 0,
                requested: 1
            })
        ));

        let unchanged = get_customer(&db, customer.id).await?;
        assert_eq!(unchanged.total_points_redeemed, 0);
        Ok(())
    }
}
