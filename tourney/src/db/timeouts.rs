//! Timeout helpers for units of work.
//!
//! A unit of work that overruns its deadline is dropped, which rolls back
//! every effect issued through it.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::store::StoreError;

/// Default timeout for a single query (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a whole unit of work (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `future` with a deadline.
///
/// On expiry the future is dropped and [`StoreError::Timeout`] is converted
/// into the caller's error type.
///
/// # Example
///
/// ```no_run
/// use tourney::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// use tourney::db::StoreError;
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), StoreError> {
///
/// let row = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
///     Ok::<_, StoreError>(sqlx::query("SELECT 1").fetch_one(pool).await?)
/// })
/// .await?;
/// # let _ = row;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(duration).into()),
    }
}
