use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::Serialize;
use thiserror::Error;

use crate::logs::MalformedLine;

/// What to do with lines that can't be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Count them and move on
    Skip,
    /// Count them, log a warning and move on
    #[default]
    Warn,
    /// Stop the whole run
    Abort,
}

#[derive(Debug, Error)]
#[error("unknown malformed line policy `{0}`, expected skip, warn or abort")]
pub struct ParseMalformedPolicyError(String);

impl FromStr for MalformedPolicy {
    type Err = ParseMalformedPolicyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(MalformedPolicy::Skip),
            "warn" => Ok(MalformedPolicy::Warn),
            "abort" => Ok(MalformedPolicy::Abort),
            _ => Err(ParseMalformedPolicyError(s.to_string())),
        }
    }
}

impl Display for MalformedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedPolicy::Skip => write!(f, "skip"),
            MalformedPolicy::Warn => write!(f, "warn"),
            MalformedPolicy::Abort => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Serialize)]
struct Rejected<'a> {
    line_number: u64,
    offset: usize,
    reason: String,
    line: &'a str,
}

/// Malformed lines written as JSON lines, for looking at them later
pub struct RejectLog {
    out: Box<dyn Write>,
}

impl RejectLog {
    /// Append to the file at `path`, creating it if it doesn't exist.
    pub fn append(path: &Path) -> anyhow::Result<RejectLog> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open reject log {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }

    pub fn new(out: impl Write + 'static) -> RejectLog {
        RejectLog { out: Box::new(out) }
    }

    pub fn write(&mut self, line_number: u64, malformed: &MalformedLine) -> anyhow::Result<()> {
        let rejected = Rejected {
            line_number,
            offset: malformed.offset,
            reason: malformed.reason.to_string(),
            line: malformed.line.trim_end_matches(['\r', '\n']),
        };
        serde_json::to_writer(&mut self.out, &rejected).context("serialize rejected line")?;
        self.out.write_all(b"\n").context("write reject log")?;
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.out.flush().context("flush reject log")
    }
}
