use std::ops::Range;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// `dd/Mon/yyyy:HH:MM:SS +ZZZZ`
const TIME_LOCAL_LEN: usize = 26;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const SEPARATORS: [(usize, u8); 6] = [
    (2, b'/'),
    (6, b'/'),
    (11, b':'),
    (14, b':'),
    (17, b':'),
    (20, b' '),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("expected 26 characters, found {0}")]
    Length(usize),
    #[error("contains non-ascii characters")]
    NotAscii,
    #[error("expected `{expected}` at position {position}")]
    Separator { position: usize, expected: char },
    #[error("expected digits at position {0}")]
    Digits(usize),
    #[error("unknown month `{0}`")]
    Month(String),
    #[error("date, time or offset out of range")]
    OutOfRange,
}

fn digits(s: &str, range: Range<usize>) -> Result<u32, TimestampError> {
    let start = range.start;
    let part = &s[range];
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampError::Digits(start));
    }
    part.parse().map_err(|_| TimestampError::Digits(start))
}

/// Parse the bracketed Nginx `$time_local`, e.g. `03/Jun/2019:14:22:01 +0200`.
///
/// The format is matched by fixed-width slicing, every separator has to be
/// exactly where it is expected.
pub fn parse_time_local(s: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    if s.len() != TIME_LOCAL_LEN {
        return Err(TimestampError::Length(s.len()));
    }
    if !s.is_ascii() {
        return Err(TimestampError::NotAscii);
    }

    let bytes = s.as_bytes();
    for (position, expected) in SEPARATORS {
        if bytes[position] != expected {
            return Err(TimestampError::Separator {
                position,
                expected: char::from(expected),
            });
        }
    }

    let day = digits(s, 0..2)?;
    let month = MONTHS
        .iter()
        .position(|&name| name == &s[3..6])
        .ok_or_else(|| TimestampError::Month(s[3..6].to_string()))?;
    let year = digits(s, 7..11)?;
    let hour = digits(s, 12..14)?;
    let minute = digits(s, 15..17)?;
    let second = digits(s, 18..20)?;

    let sign = match bytes[21] {
        b'+' => 1,
        b'-' => -1,
        _ => {
            return Err(TimestampError::Separator {
                position: 21,
                expected: '+',
            })
        }
    };
    let offset_hours = digits(s, 22..24)?;
    let offset_minutes = digits(s, 24..26)?;
    if offset_minutes >= 60 {
        return Err(TimestampError::OutOfRange);
    }

    // at most 99 * 3600 + 59 * 60, fits easily
    let offset_seconds = (offset_hours * 3600 + offset_minutes * 60) as i32;
    let offset = FixedOffset::east_opt(sign * offset_seconds).ok_or(TimestampError::OutOfRange)?;

    let date = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, day)
        .ok_or(TimestampError::OutOfRange)?;
    // a leap second is the 59th second running into its 1000th millisecond
    let time = match second {
        60 => NaiveTime::from_hms_milli_opt(hour, minute, 59, 1_000),
        second => NaiveTime::from_hms_opt(hour, minute, second),
    }
    .ok_or(TimestampError::OutOfRange)?;

    NaiveDateTime::new(date, time)
        .and_local_timezone(offset)
        .single()
        .ok_or(TimestampError::OutOfRange)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn parses_positive_offset() {
        let dt = parse_time_local("03/Jun/2019:14:22:01 +0200").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2019, 6, 3));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (14, 22, 1));
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn parses_negative_offset() {
        let dt = parse_time_local("31/Dec/2018:23:59:59 -0530").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(dt.day(), 31);
    }

    #[test]
    fn accepts_leap_second() {
        let dt = parse_time_local("30/Jun/2015:23:59:60 +0000").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2015, 6, 30));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (23, 59, 59));
        assert_eq!(dt.format("%H:%M:%S").to_string(), "23:59:60");

        assert_eq!(
            parse_time_local("30/Jun/2015:23:59:61 +0000"),
            Err(TimestampError::OutOfRange)
        );
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            parse_time_local("3/Jun/2019:14:22:01 +0200"),
            Err(TimestampError::Length(25))
        );
        assert_eq!(parse_time_local(""), Err(TimestampError::Length(0)));
    }

    #[test]
    fn rejects_misplaced_separator() {
        assert_eq!(
            parse_time_local("03-Jun/2019:14:22:01 +0200"),
            Err(TimestampError::Separator {
                position: 2,
                expected: '/'
            })
        );
        assert_eq!(
            parse_time_local("03/Jun/2019 14:22:01 +0200"),
            Err(TimestampError::Separator {
                position: 11,
                expected: ':'
            })
        );
        assert_eq!(
            parse_time_local("03/Jun/2019:14:22:01 02000"),
            Err(TimestampError::Separator {
                position: 21,
                expected: '+'
            })
        );
    }

    #[test]
    fn rejects_unknown_month() {
        assert_eq!(
            parse_time_local("03/jun/2019:14:22:01 +0200"),
            Err(TimestampError::Month("jun".to_string()))
        );
        assert_eq!(
            parse_time_local("03/Jux/2019:14:22:01 +0200"),
            Err(TimestampError::Month("Jux".to_string()))
        );
    }

    #[test]
    fn rejects_non_digits_and_invalid_dates() {
        assert_eq!(
            parse_time_local("0x/Jun/2019:14:22:01 +0200"),
            Err(TimestampError::Digits(0))
        );
        assert_eq!(
            parse_time_local("31/Jun/2019:14:22:01 +0200"),
            Err(TimestampError::OutOfRange)
        );
        assert_eq!(
            parse_time_local("03/Jun/2019:24:00:00 +0200"),
            Err(TimestampError::OutOfRange)
        );
        assert_eq!(
            parse_time_local("03/Jun/2019:14:22:01 +0260"),
            Err(TimestampError::OutOfRange)
        );
    }

    #[test]
    fn rejects_non_ascii() {
        // 26 bytes, but not 26 ascii characters
        assert_eq!(
            parse_time_local("03/Jün/2019:14:22:01 +020"),
            Err(TimestampError::NotAscii)
        );
    }
}
