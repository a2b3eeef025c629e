//! Atomic sequence allocation for display numbers
//!
//! Movement numbers, generated product codes, and generated batch numbers all
//! need a gap-tolerant, race-free counter. The upsert bumps and returns the
//! counter in one statement; concurrent writers on the same (scope, period)
//! serialize on the counter row, so a number is never handed out twice.

use crate::error::AppResult;

/// Fetch the next value of the counter identified by (scope, period).
///
/// Works against a pool or inside an open transaction; when called inside a
/// transaction the counter row stays locked until commit, which also makes
/// the numbering dense per prefix.
pub(crate) async fn next_value<'e, E>(executor: E, scope: &str, period: &str) -> AppResult<i64>
where
    E: sqlx::PgExecutor<'e>,
{
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequence_counters (scope, period, next_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (scope, period)
        DO UPDATE SET next_value = sequence_counters.next_value + 1
        RETURNING next_value
        "#,
    )
    .bind(scope)
    .bind(period)
    .fetch_one(executor)
    .await?;

    Ok(value)
}
