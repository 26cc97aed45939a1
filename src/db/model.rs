use super::util::format_time_local;
use crate::logs::LogLine;

/// A row of the `logs` table.
///
/// Rows are the same visit if `time_local`, `vhost`, `remote_addr`, `method`
/// and `url` are equal, missing values compare as `''`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LogRow {
    pub vhost: Option<String>,
    pub remote_addr: String,
    pub time_local: String,
    pub method: Option<String>,
    pub url: Option<String>,
    pub protocol: Option<String>,
    pub status: i64,
    pub body_bytes_sent: i64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl From<LogLine> for LogRow {
    fn from(value: LogLine) -> Self {
        let (method, url, protocol) = match value.request {
            Some(request) => (
                Some(request.method),
                Some(request.url),
                Some(request.protocol),
            ),
            None => (None, None, None),
        };

        LogRow {
            vhost: value.vhost,
            remote_addr: value.remote_addr,
            time_local: format_time_local(&value.time_local),
            method,
            url,
            protocol,
            status: value.status,
            body_bytes_sent: value.body_bytes_sent,
            referer: value.referer,
            user_agent: value.user_agent,
        }
    }
}
