use std::str::FromStr;

use payroll_core::RepositoryError;
use rust_decimal::Decimal;
use sqlx::{Row, TypeInfo, ValueRef};

/// Get a decimal value from a row.
///
/// Amounts are written as TEXT; INTEGER and REAL values (hand-written seeds,
/// older rows) are accepted too.
pub fn get_decimal(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    let type_info = value_ref.type_info();
    let type_name = type_info.name();

    match type_name {
        "TEXT" => {
            let val: String = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get TEXT from '{}': {}", column, e))
            })?;
            Decimal::from_str(val.trim()).map_err(|e| {
                RepositoryError::Database(format!(
                    "Invalid decimal '{}' in column '{}': {}",
                    val, column, e
                ))
            })
        }
        "INTEGER" => {
            let val: i64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!(
                    "Failed to get INTEGER from '{}': {}",
                    column, e
                ))
            })?;
            Ok(Decimal::from(val))
        }
        "REAL" => {
            let val: f64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get REAL from '{}': {}", column, e))
            })?;
            Decimal::try_from(val).map_err(|e| {
                RepositoryError::Database(format!("Failed to convert {} to Decimal: {}", val, e))
            })
        }
        "NULL" => Ok(Decimal::ZERO),
        _ => Err(RepositoryError::Database(format!(
            "Unexpected type '{}' for column '{}'",
            type_name, column
        ))),
    }
}

/// Get an optional decimal value from a row, returning None for NULL values.
pub fn get_optional_decimal(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    if value_ref.is_null() {
        return Ok(None);
    }

    get_decimal(row, column).map(Some)
}

/// Canonical TEXT form used for every stored amount.
pub fn decimal_to_text(d: Decimal) -> String {
    d.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn setup_test_db() -> sqlx::sqlite::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::query(
            "CREATE TABLE amounts (
                id INTEGER PRIMARY KEY,
                int_value INTEGER,
                real_value REAL,
                text_value TEXT,
                null_value TEXT
            )",
        )
        .execute(&pool)
        .await
        .expect("Failed to create test table");

        pool
    }

    async fn fetch(
        pool: &sqlx::sqlite::SqlitePool,
        insert: &str,
        select: &str,
    ) -> sqlx::sqlite::SqliteRow {
        sqlx::query(insert)
            .execute(pool)
            .await
            .expect("Failed to insert test data");
        sqlx::query(select)
            .fetch_one(pool)
            .await
            .expect("Failed to fetch row")
    }

    #[tokio::test]
    async fn reads_text_amount_exactly() {
        let pool = setup_test_db().await;
        let row = fetch(
            &pool,
            "INSERT INTO amounts (id, text_value) VALUES (1, '25813.75')",
            "SELECT text_value FROM amounts WHERE id = 1",
        )
        .await;

        assert_eq!(get_decimal(&row, "text_value"), Ok(dec!(25813.75)));
    }

    #[tokio::test]
    async fn reads_integer_amount() {
        let pool = setup_test_db().await;
        let row = fetch(
            &pool,
            "INSERT INTO amounts (id, int_value) VALUES (1, -99999)",
            "SELECT int_value FROM amounts WHERE id = 1",
        )
        .await;

        assert_eq!(get_decimal(&row, "int_value"), Ok(dec!(-99999)));
    }

    #[tokio::test]
    async fn reads_real_amount() {
        let pool = setup_test_db().await;
        let row = fetch(
            &pool,
            "INSERT INTO amounts (id, real_value) VALUES (1, 123.45)",
            "SELECT real_value FROM amounts WHERE id = 1",
        )
        .await;

        assert_eq!(get_decimal(&row, "real_value"), Ok(dec!(123.45)));
    }

    #[tokio::test]
    async fn null_reads_as_zero_or_none() {
        let pool = setup_test_db().await;
        let row = fetch(
            &pool,
            "INSERT INTO amounts (id) VALUES (1)",
            "SELECT null_value FROM amounts WHERE id = 1",
        )
        .await;

        assert_eq!(get_decimal(&row, "null_value"), Ok(Decimal::ZERO));
        assert_eq!(get_optional_decimal(&row, "null_value"), Ok(None));
    }

    #[tokio::test]
    async fn rejects_non_numeric_text() {
        let pool = setup_test_db().await;
        let row = fetch(
            &pool,
            "INSERT INTO amounts (id, text_value) VALUES (1, 'not a number')",
            "SELECT text_value FROM amounts WHERE id = 1",
        )
        .await;

        let result = get_decimal(&row, "text_value");

        assert!(matches!(result, Err(RepositoryError::Database(msg)) if msg.starts_with("Invalid decimal 'not a number'")));
    }

    #[tokio::test]
    async fn missing_column_is_reported() {
        let pool = setup_test_db().await;
        let row = fetch(
            &pool,
            "INSERT INTO amounts (id) VALUES (1)",
            "SELECT id FROM amounts WHERE id = 1",
        )
        .await;

        let result = get_optional_decimal(&row, "nonexistent_column");

        assert!(matches!(result, Err(RepositoryError::Database(msg)) if msg.starts_with("Column 'nonexistent_column' not found:")));
    }

    #[test]
    fn decimal_to_text_drops_trailing_zeros() {
        assert_eq!(decimal_to_text(dec!(1200.00)), "1200");
        assert_eq!(decimal_to_text(dec!(0.50)), "0.5");
        assert_eq!(decimal_to_text(dec!(-789.012)), "-789.012");
    }
}
