use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::{LogRow, StorageSink};
use crate::logs::LogFormat;

/// SQLite database holding the `logs` table.
///
/// There is only ever one writer, so the pool holds a single connection.
/// Every statement runs inside a transaction that is started on demand and
/// ended by [`StorageSink::commit`]. Work that wasn't committed is rolled
/// back when the database is dropped or closed.
pub struct Database {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl Database {
    pub async fn open_in_memory() -> anyhow::Result<Database> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("parse in-memory sqlite url")?;
        Self::connect(options).await.context("open sqlite in memory")
    }

    /// Open the database file at `path`, creating it if it doesn't exist.
    pub async fn open(path: &Path) -> anyhow::Result<Database> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options)
            .await
            .with_context(|| format!("open sqlite database {}", path.display()))
    }

    async fn connect(options: SqliteConnectOptions) -> anyhow::Result<Database> {
        // an in-memory database is gone once its last connection is closed
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("connect to sqlite")?;

        Ok(Database { pool, tx: None })
    }

    /// Roll back everything that wasn't committed and close the connection.
    pub async fn close(mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.rollback().await {
                log::warn!("couldn't roll back transaction: {:?}", err);
            }
        }
        self.pool.close().await;
    }

    /// The connection of the current transaction, a new one is started if
    /// there is none.
    async fn conn(&mut self) -> anyhow::Result<&mut SqliteConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await.context("begin transaction")?,
        };
        Ok(&mut **self.tx.insert(tx))
    }
}

impl StorageSink for Database {
    async fn ensure_schema(&mut self, format: LogFormat) -> anyhow::Result<()> {
        let conn = self.conn().await?;

        sqlx::query(
            r#"
        CREATE TABLE IF NOT EXISTS "logs"
        (
            "vhost"           TEXT NULL,
            "remote_addr"     TEXT NOT NULL,
            "time_local"      TEXT NOT NULL,
            "method"          TEXT NULL,
            "url"             TEXT NULL,
            "protocol"        TEXT NULL,
            "status"          INTEGER NOT NULL,
            "body_bytes_sent" INTEGER NOT NULL,
            "referer"         TEXT NULL,
            "user_agent"      TEXT NULL
        )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("create logs table")?;

        // Log timestamps only have second granularity, a client repeating
        // the same request within one second is recorded once.
        //
        // `time_local` comes first so that time ranges can use the index.
        sqlx::query(
            r#"
        CREATE UNIQUE INDEX IF NOT EXISTS "ix_unique_visit" ON "logs"
        (
            "time_local",
            IFNULL("vhost", ''),
            "remote_addr",
            IFNULL("method", ''),
            IFNULL("url", '')
        )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("create unique visit index")?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS "ix_url" ON "logs" ("url")"#)
            .execute(&mut *conn)
            .await
            .context("create url index")?;

        if !format.has_vhost() {
            sqlx::query(r#"CREATE INDEX IF NOT EXISTS "ix_time_local" ON "logs" ("time_local")"#)
                .execute(&mut *conn)
                .await
                .context("create time_local index")?;
        }

        Ok(())
    }

    async fn insert(&mut self, row: &LogRow) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
        INSERT OR IGNORE INTO "logs"
        (
            "vhost",
            "remote_addr",
            "time_local",
            "method",
            "url",
            "protocol",
            "status",
            "body_bytes_sent",
            "referer",
            "user_agent"
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&row.vhost)
        .bind(&row.remote_addr)
        .bind(&row.time_local)
        .bind(&row.method)
        .bind(&row.url)
        .bind(&row.protocol)
        .bind(row.status)
        .bind(row.body_bytes_sent)
        .bind(&row.referer)
        .bind(&row.user_agent)
        .execute(self.conn().await?)
        .await
        .context("insert log")?;

        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.context("commit transaction")?;
        }
        Ok(())
    }

    /// Runs outside of a transaction, pending work is committed first. A
    /// failing `ANALYZE` leaves nothing behind to commit or roll back.
    async fn refresh_statistics(&mut self) -> anyhow::Result<()> {
        self.commit().await?;
        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("analyze")?;
        Ok(())
    }
}

/// Queries for checking what ended up in the database
#[cfg(test)]
impl Database {
    pub async fn logs_count(&mut self) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "logs""#)
            .fetch_one(self.conn().await?)
            .await
            .context("count logs")?;
        Ok(count)
    }

    /// All rows, oldest first.
    pub async fn select_logs(&mut self) -> anyhow::Result<Vec<LogRow>> {
        sqlx::query_as::<_, LogRow>(
            r#"
        SELECT "vhost",
               "remote_addr",
               "time_local",
               "method",
               "url",
               "protocol",
               "status",
               "body_bytes_sent",
               "referer",
               "user_agent"
        FROM "logs"
        ORDER BY "time_local" ASC, "rowid" ASC
            "#,
        )
        .fetch_all(self.conn().await?)
        .await
        .context("fetch logs")
    }

    /// Names of the indexes on the `logs` table.
    pub async fn index_names(&mut self) -> anyhow::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
        SELECT "name" FROM "sqlite_master"
        WHERE "type" = 'index' AND "tbl_name" = 'logs'
        ORDER BY "name"
            "#,
        )
        .fetch_all(self.conn().await?)
        .await
        .context("list indexes")
    }
}
