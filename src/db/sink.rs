use crate::logs::LogFormat;

use super::LogRow;

/// Where parsed log lines end up.
///
/// Implementations have to deduplicate on `(time_local, vhost, remote_addr,
/// method, url)` with missing values as `''`: inserting a row that already
/// exists is not an error, it just doesn't add anything.
#[allow(async_fn_in_trait)]
pub trait StorageSink {
    /// Create the `logs` table and its indexes if they don't exist yet.
    async fn ensure_schema(&mut self, format: LogFormat) -> anyhow::Result<()>;

    /// Insert a row unless a row with the same identity exists.
    ///
    /// Returns the number of rows that were actually added, `0` or `1`.
    async fn insert(&mut self, row: &LogRow) -> anyhow::Result<u64>;

    /// Persist everything inserted since the last commit.
    async fn commit(&mut self) -> anyhow::Result<()>;

    /// Let the query planner know about the new data. Failing here must not
    /// affect rows that were already committed.
    async fn refresh_statistics(&mut self) -> anyhow::Result<()>;
}
