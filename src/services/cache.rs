//! Per-year cache of authoritative end dates.
//!
//! The last day with data for a year only moves while that year is still
//! being logged, so a short TTL is enough to pick up new readings.
//!
//! | Lookup | Behaviour |
//! |--------|-----------|
//! | cached year | served from memory |
//! | uncached year | `/get_end_date`, stored on success |
//! | failed lookup | not stored; the next lookup retries |

use chrono::NaiveDate;
use moka::future::Cache;
use std::time::Duration;

use crate::backend::Backend;
use crate::error::AppResult;

/// Years are few; the bound only guards against runaway input.
const MAX_YEARS: u64 = 64;

#[derive(Clone)]
pub struct EndDateCache {
    entries: Cache<i32, NaiveDate>,
}

impl EndDateCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_YEARS)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }

    /// End date for `year`, from cache or the backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend error on a miss; failures are not cached.
    pub async fn lookup<B: Backend>(&self, backend: &B, year: i32) -> AppResult<NaiveDate> {
        if let Some(end) = self.entries.get(&year).await {
            tracing::debug!(year, end_date = %end, "cache_hit");
            return Ok(end);
        }

        tracing::debug!(year, "cache_miss");
        let end = backend.fetch_end_date(year).await?;
        self.entries.insert(year, end).await;
        tracing::debug!(year, end_date = %end, "cache_stored");
        Ok(end)
    }

    /// Drop the cached end date of `year`.
    pub async fn invalidate(&self, year: i32) {
        self.entries.invalidate(&year).await;
        tracing::debug!(year, "cache_invalidated");
    }

    /// Entries currently held, after pending maintenance has run.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
