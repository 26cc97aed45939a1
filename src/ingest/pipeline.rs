use std::fmt::Display;
use std::num::NonZeroU64;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use super::{MalformedPolicy, Progress, RejectLog};
use crate::config::IngestConfig;
use crate::db::{LogRow, StorageSink};
use crate::logs::{LogFormat, LogLine, MalformedLine};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("storage unavailable")]
    StorageUnavailable(#[source] anyhow::Error),
    #[error("couldn't read input")]
    Input(#[from] std::io::Error),
    #[error("line {line_number} is malformed")]
    Malformed {
        line_number: u64,
        #[source]
        source: MalformedLine,
    },
}

/// Counters of a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Every line read from the input, malformed ones included
    pub lines_read: u64,
    /// Lines that became a new row
    pub rows_inserted: u64,
    pub lines_malformed: u64,
}

impl Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read {} lines, inserted {}.",
            self.lines_read, self.rows_inserted
        )?;
        if self.lines_malformed > 0 {
            write!(f, " Skipped {} malformed.", self.lines_malformed)?;
        }
        Ok(())
    }
}

/// Reads log lines, parses them and inserts them into a [`StorageSink`].
pub struct Pipeline {
    format: LogFormat,
    policy: MalformedPolicy,
    progress: Progress,
    /// Commit in between, the final commit happens regardless
    commit_every: Option<NonZeroU64>,
    rejects: Option<RejectLog>,
    /// Set to `true` from the outside to stop, even while waiting for input
    stop: Option<watch::Receiver<bool>>,
}

impl Pipeline {
    pub fn new(format: LogFormat) -> Pipeline {
        Pipeline {
            format,
            policy: MalformedPolicy::default(),
            progress: Progress::stdout(Progress::DEFAULT_EVERY),
            commit_every: None,
            rejects: None,
            stop: None,
        }
    }

    pub fn from_config(format: LogFormat, config: &IngestConfig) -> anyhow::Result<Pipeline> {
        let rejects = match config.rejects_path.as_deref() {
            Some(path) => Some(RejectLog::append(path)?),
            None => None,
        };

        Ok(Pipeline::new(format)
            .with_policy(config.on_malformed)
            .with_progress(Progress::stdout(config.progress_every.get()))
            .with_commit_every(config.commit_every)
            .with_rejects(rejects))
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }
    pub fn with_commit_every(mut self, commit_every: Option<NonZeroU64>) -> Self {
        self.commit_every = commit_every;
        self
    }
    pub fn with_rejects(mut self, rejects: Option<RejectLog>) -> Self {
        self.rejects = rejects;
        self
    }
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stopped(&self) -> bool {
        self.stop.as_ref().map_or(false, |stop| *stop.borrow())
    }

    /// Read the next line into `buf`, `None` if the run was stopped first.
    ///
    /// A partially read line is dropped when stopped.
    async fn next_line<R>(
        &mut self,
        input: &mut R,
        buf: &mut Vec<u8>,
    ) -> std::io::Result<Option<usize>>
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(stop) = self.stop.as_mut() else {
            return input.read_until(b'\n', buf).await.map(Some);
        };

        tokio::select! {
            read = input.read_until(b'\n', buf) => read.map(Some),
            // a dropped sender never stops the run
            Ok(_) = stop.wait_for(|stop| *stop) => Ok(None),
        }
    }

    /// Ingest every line of `input`, in order.
    ///
    /// The schema is created and committed before the first line is read.
    /// After the input ends everything is committed, then the statistics
    /// are refreshed and committed as well.
    pub async fn run<R, S>(&mut self, mut input: R, sink: &mut S) -> Result<IngestStats, IngestError>
    where
        R: AsyncBufRead + Unpin,
        S: StorageSink,
    {
        use IngestError::StorageUnavailable;

        sink.ensure_schema(self.format)
            .await
            .map_err(StorageUnavailable)?;
        sink.commit().await.map_err(StorageUnavailable)?;
        log::info!("ensured schema for {} logs", self.format);

        let mut stats = IngestStats::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = if self.stopped() {
                None
            } else {
                self.next_line(&mut input, &mut buf).await?
            };
            let Some(read) = read else {
                self.progress
                    .suspend(|| log::warn!("stopping early after {} lines", stats.lines_read));
                break;
            };
            if read == 0 {
                break;
            }
            stats.lines_read += 1;

            let line = String::from_utf8_lossy(&buf);
            match LogLine::parse(self.format, &line) {
                Ok(parsed) => {
                    let row = LogRow::from(parsed);
                    stats.rows_inserted += sink.insert(&row).await.map_err(StorageUnavailable)?;
                }
                Err(malformed) => self.reject(&mut stats, malformed)?,
            }

            if let Some(commit_every) = self.commit_every {
                if stats.lines_read % commit_every.get() == 0 {
                    sink.commit().await.map_err(StorageUnavailable)?;
                    log::debug!("committed after {} lines", stats.lines_read);
                }
            }

            self.progress.tick(&stats);
        }

        sink.commit().await.map_err(StorageUnavailable)?;
        self.progress.finish(&stats);

        if let Some(rejects) = self.rejects.as_mut() {
            if let Err(err) = rejects.flush() {
                log::warn!("{:?}", err);
            }
        }

        match sink.refresh_statistics().await {
            Ok(()) => log::info!("refreshed query planner statistics"),
            Err(err) => log::warn!("couldn't refresh statistics: {:?}", err),
        }
        sink.commit().await.map_err(StorageUnavailable)?;

        Ok(stats)
    }

    fn reject(&mut self, stats: &mut IngestStats, malformed: MalformedLine) -> Result<(), IngestError> {
        let line_number = stats.lines_read;
        stats.lines_malformed += 1;

        if let Some(rejects) = self.rejects.as_mut() {
            if let Err(err) = rejects.write(line_number, &malformed) {
                self.progress.suspend(|| {
                    log::warn!("couldn't record malformed line {}: {:?}", line_number, err)
                });
            }
        }

        match self.policy {
            MalformedPolicy::Skip => Ok(()),
            MalformedPolicy::Warn => {
                self.progress
                    .suspend(|| log::warn!("skipping line {}: {}", line_number, malformed));
                Ok(())
            }
            MalformedPolicy::Abort => Err(IngestError::Malformed {
                line_number,
                source: malformed,
            }),
        }
    }
}
