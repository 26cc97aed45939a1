//! Helpers shared by the tests, and tests against a real SQLite database.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::Write;
use std::rc::Rc;

use crate::db::{LogRow, StorageSink};
use crate::logs::LogFormat;


/// A combined log line with everything but the interesting parts fixed.
pub fn line(remote_addr: &str, time_local: &str, request: &str) -> String {
    format!("{remote_addr} - - [{time_local}] \"{request}\" 200 1024 \"-\" \"curl/7.58.0\"\n")
}

/// `(time_local, vhost, remote_addr, method, url)`, missing values are `""`
pub type VisitIdentity = (String, String, String, String, String);

/// What `ix_unique_visit` compares.
///
/// `NULL` is distinct from every value inside a unique constraint, even
/// from another `NULL`, so missing values take part as the empty string.
pub fn identity(row: &LogRow) -> VisitIdentity {
    let or_empty = |value: &Option<String>| value.clone().unwrap_or_default();
    (
        row.time_local.clone(),
        or_empty(&row.vhost),
        row.remote_addr.clone(),
        or_empty(&row.method),
        or_empty(&row.url),
    )
}

/// Bytes written through a boxed writer, still readable by the test
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Keeps rows in memory and records which methods were called
#[derive(Default)]
pub struct MemorySink {
    pub calls: Vec<&'static str>,
    pub committed: Vec<LogRow>,
    pub pending: Vec<LogRow>,
    pub seen: HashSet<VisitIdentity>,
    pub fail_commit: bool,
    pub fail_statistics: bool,
}

impl StorageSink for MemorySink {
    async fn ensure_schema(&mut self, _format: LogFormat) -> anyhow::Result<()> {
        self.calls.push("ensure_schema");
        Ok(())
    }

    async fn insert(&mut self, row: &LogRow) -> anyhow::Result<u64> {
        self.calls.push("insert");
        if !self.seen.insert(identity(row)) {
            return Ok(0);
        }
        self.pending.push(row.clone());
        Ok(1)
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        self.calls.push("commit");
        if self.fail_commit {
            anyhow::bail!("disk full");
        }
        self.committed.append(&mut self.pending);
        Ok(())
    }

    async fn refresh_statistics(&mut self) -> anyhow::Result<()> {
        self.calls.push("refresh_statistics");
        if self.fail_statistics {
            anyhow::bail!("no statistics today");
        }
        Ok(())
    }
}
