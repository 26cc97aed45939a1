mod cursor;

mod log_line;
pub use log_line::{Field, LogFormat, LogLine, MalformedLine, ParseLogFormatError, Reason, Request};

mod time_local;
pub use time_local::{parse_time_local, TimestampError};
