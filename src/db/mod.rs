mod connection;
pub use connection::*;

mod model;
pub use model::*;

mod sink;
pub use sink::StorageSink;

pub mod util {
    use chrono::{DateTime, FixedOffset};

    /// Save a timestamp to the database.
    ///
    /// Timestamps are saved as `YYYY-MM-DD HH:MM:SS+HH:MM` in the offset they
    /// were logged with, so that string order is time order for a single
    /// server.
    pub fn format_time_local(time_local: &DateTime<FixedOffset>) -> String {
        time_local.format("%Y-%m-%d %H:%M:%S%:z").to_string()
    }
}
