//! Settings that aren't command line arguments, read from the environment
//! (or a `.env` file).

use std::fmt::Display;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;

use crate::ingest::{MalformedPolicy, Progress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// `INGEST_ON_MALFORMED`
    pub on_malformed: MalformedPolicy,
    /// `INGEST_PROGRESS_EVERY`
    pub progress_every: NonZeroU64,
    /// `INGEST_COMMIT_EVERY`, only commit at the end if unset
    pub commit_every: Option<NonZeroU64>,
    /// `INGEST_REJECTS_PATH`
    pub rejects_path: Option<PathBuf>,
    /// `INGEST_LOG_LEVEL`
    pub log_level: LevelFilter,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            on_malformed: MalformedPolicy::default(),
            progress_every: NonZeroU64::new(Progress::DEFAULT_EVERY).unwrap_or(NonZeroU64::MIN),
            commit_every: None,
            rejects_path: None,
            log_level: LevelFilter::Info,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| anyhow::anyhow!("couldn't parse {}=`{}`: {}", key, value, err))
}

impl IngestConfig {
    /// Unset variables keep their default.
    pub fn try_from_env() -> anyhow::Result<IngestConfig> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<IngestConfig> {
        let default = IngestConfig::default();

        Ok(IngestConfig {
            on_malformed: parse_var(&lookup, "INGEST_ON_MALFORMED")?
                .unwrap_or(default.on_malformed),
            progress_every: parse_var(&lookup, "INGEST_PROGRESS_EVERY")?
                .unwrap_or(default.progress_every),
            commit_every: parse_var(&lookup, "INGEST_COMMIT_EVERY")?,
            rejects_path: parse_var::<PathBuf>(&lookup, "INGEST_REJECTS_PATH")?
                .filter(|path| !path.as_os_str().is_empty()),
            log_level: parse_var(&lookup, "INGEST_LOG_LEVEL")?.unwrap_or(default.log_level),
        })
    }
}
