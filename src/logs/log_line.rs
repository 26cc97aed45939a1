use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use super::cursor::Cursor;
use super::time_local::{parse_time_local, TimestampError};

/// The two supported Nginx `log_format`s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFormat {
    /// The default `combined` format
    Combined,
    /// `combined` prefixed with `"$host: "`
    VCombined,
}

impl LogFormat {
    pub const VARIANTS: [&'static str; 2] = ["COMBINED", "VCOMBINED"];

    pub fn has_vhost(self) -> bool {
        matches!(self, LogFormat::VCombined)
    }
}

#[derive(Debug, Error)]
#[error("unknown log format `{0}`, expected COMBINED or VCOMBINED")]
pub struct ParseLogFormatError(String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMBINED" => Ok(LogFormat::Combined),
            "VCOMBINED" => Ok(LogFormat::VCombined),
            other => Err(ParseLogFormatError(other.to_string())),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Combined => write!(f, "COMBINED"),
            LogFormat::VCombined => write!(f, "VCOMBINED"),
        }
    }
}

/// The fields of a log line, in the order they appear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Vhost,
    RemoteAddr,
    RemoteUser,
    TimeLocal,
    Request,
    Status,
    BodyBytesSent,
    Referer,
    UserAgent,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Vhost => "vhost",
            Field::RemoteAddr => "remote_addr",
            Field::RemoteUser => "remote_user",
            Field::TimeLocal => "time_local",
            Field::Request => "request",
            Field::Status => "status",
            Field::BodyBytesSent => "body_bytes_sent",
            Field::Referer => "referer",
            Field::UserAgent => "user_agent",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reason {
    #[error("missing {delimiter:?} after {field}")]
    MissingDelimiter {
        field: Field,
        delimiter: &'static str,
    },
    #[error("missing opening quote of {0}")]
    MissingQuote(Field),
    #[error("trailing characters after user_agent")]
    TrailingGarbage,
    #[error("invalid time_local: {0}")]
    Timestamp(#[from] TimestampError),
    #[error("{0} is not a non-negative integer")]
    NotNumeric(Field),
}

/// A line that doesn't follow the structure of the log format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed log line at byte {offset}: {reason}")]
pub struct MalformedLine {
    /// The offending line, as it was read
    pub line: String,
    /// Byte offset of the field that couldn't be parsed
    pub offset: usize,
    pub reason: Reason,
}

/// A well formed request line, e.g. `GET /index.html HTTP/1.1`.
///
/// Either all three parts are known or the request is garbage, there is
/// nothing in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub protocol: String,
}

impl Request {
    /// Scanners and broken clients send all kinds of things, only requests
    /// with exactly three space separated parts are split up.
    pub fn parse(request: &str) -> Option<Request> {
        if request.matches(' ').count() != 2 {
            return None;
        }
        let (method, rest) = request.split_once(' ')?;
        let (url, protocol) = rest.rsplit_once(' ')?;

        Some(Request {
            method: method.to_string(),
            url: url.to_string(),
            protocol: protocol.to_string(),
        })
    }
}

/// A single parsed access log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub vhost: Option<String>,
    pub remote_addr: String,
    pub time_local: DateTime<FixedOffset>,
    /// `None` if the request line was garbage
    pub request: Option<Request>,
    pub status: i64,
    pub body_bytes_sent: i64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

/// Nginx logs unknown values as a dash.
fn dash_to_none(s: &str) -> Option<String> {
    match s {
        "-" => None,
        s => Some(s.to_string()),
    }
}

fn parse_count(s: &str, field: Field) -> Result<i64, Reason> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Reason::NotNumeric(field));
    }
    i64::from_str(s).map_err(|_| Reason::NotNumeric(field))
}

fn strip_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(line) => line.strip_suffix('\r').unwrap_or(line),
        None => line,
    }
}

impl LogLine {
    /// Parse one line, with or without its line terminator.
    pub fn parse(format: LogFormat, line: &str) -> Result<LogLine, MalformedLine> {
        let mut cursor = Cursor::new(strip_terminator(line));
        Self::parse_fields(format, &mut cursor).map_err(|reason| MalformedLine {
            line: line.to_string(),
            offset: cursor.field_start(),
            reason,
        })
    }

    fn parse_fields(format: LogFormat, cursor: &mut Cursor<'_>) -> Result<LogLine, Reason> {
        let vhost = match format {
            LogFormat::VCombined => Some(cursor.take_until(": ", Field::Vhost)?.to_string()),
            LogFormat::Combined => None,
        };

        let remote_addr = cursor.take_until(" - ", Field::RemoteAddr)?;
        // $remote_user is not kept
        let _ = cursor.take_until(" [", Field::RemoteUser)?;
        let time_local = parse_time_local(cursor.take_until("] ", Field::TimeLocal)?)?;

        cursor.expect("\"", Field::Request)?;
        let request = cursor.take_until("\" ", Field::Request)?;

        let status = parse_count(cursor.take_until(" ", Field::Status)?, Field::Status)?;
        let body_bytes_sent = parse_count(
            cursor.take_until(" ", Field::BodyBytesSent)?,
            Field::BodyBytesSent,
        )?;

        cursor.expect("\"", Field::Referer)?;
        let referer = cursor.take_until("\" \"", Field::Referer)?;
        let user_agent = cursor.take_until("\"", Field::UserAgent)?;
        cursor.finish()?;

        Ok(LogLine {
            vhost,
            remote_addr: remote_addr.to_string(),
            time_local,
            request: Request::parse(request),
            status,
            body_bytes_sent,
            referer: dash_to_none(referer),
            user_agent: dash_to_none(user_agent),
        })
    }
}
