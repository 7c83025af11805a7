//! Price table lookups

use rust_decimal::Decimal;
use shared_types::{default_price_rules, normalize_extension, PriceRule};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::ServiceError;
use crate::models::DbPriceRule;

/// Per-KB price for `extension`; NotFound when the type is not priced
pub async fn price_per_unit(
    conn: &mut SqliteConnection,
    extension: &str,
) -> Result<Decimal, ServiceError> {
    let extension = normalize_extension(extension);
    let row: Option<DbPriceRule> = sqlx::query_as(
        "SELECT file_extension, price_per_unit FROM price_rules WHERE file_extension = ?",
    )
    .bind(&extension)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(PriceRule::try_from(row)?.price_per_unit),
        None => Err(ServiceError::not_found(format!(
            "No price is configured for .{} files.",
            extension
        ))),
    }
}

/// Insert or overwrite one rule
pub async fn upsert_rule(pool: &SqlitePool, rule: &PriceRule) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        INSERT INTO price_rules (file_extension, price_per_unit) VALUES (?, ?)
        ON CONFLICT(file_extension) DO UPDATE SET price_per_unit = excluded.price_per_unit
        "#,
    )
    .bind(normalize_extension(&rule.file_extension))
    .bind(rule.price_per_unit.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Install the default table; returns the rules written
pub async fn install_defaults(pool: &SqlitePool) -> Result<Vec<PriceRule>, ServiceError> {
    let rules = default_price_rules();
    for rule in &rules {
        upsert_rule(pool, rule).await?;
    }
    Ok(rules)
}

pub async fn list_rules(pool: &SqlitePool) -> Result<Vec<PriceRule>, ServiceError> {
    let rows: Vec<DbPriceRule> = sqlx::query_as(
        "SELECT file_extension, price_per_unit FROM price_rules ORDER BY file_extension",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| PriceRule::try_from(row).map_err(ServiceError::from))
        .collect()
}
