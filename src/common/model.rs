use chrono::{FixedOffset, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::lexer::datetime_parts;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum TransactionStatus {
    Pending,
    Cleared,
}

impl TransactionStatus {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(TransactionStatus::Cleared),
            '!' => Some(TransactionStatus::Pending),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            TransactionStatus::Pending => '!',
            TransactionStatus::Cleared => '*',
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

///
/// Exact quantity of a single commodity, e.g. `-230.10 USD`.
///
/// The decimal keeps the scale it was written with, so `100.0` and `100.00`
/// render back exactly as they were read.
///
#[derive(PartialEq, Eq, Clone, Serialize)]
pub struct Amount {
    pub quantity: Decimal,
    pub commodity: String,
}

impl Amount {
    pub fn new(quantity: Decimal, commodity: impl Into<String>) -> Self {
        Amount {
            quantity,
            commodity: commodity.into(),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.commodity)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt::Display::fmt(self, f)
    }
}

///
/// Metadata element: `key:value` or a bare token.
///
/// `txn:<id>` is the reserved key carrying a transaction's unique identifier.
///
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Tag {
    Pair { key: String, value: String },
    Bare(String),
}

pub const TXN_TAG: &str = "txn";

impl Tag {
    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag::Pair {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Reads a `key:rest` path-like token. The key must be an identifier,
    /// otherwise the whole token is a bare path.
    pub fn from_path_like(text: &str) -> Self {
        match text.split_once(':') {
            Some((key, value)) if is_identifier(key) => Tag::pair(key, value),
            _ => Tag::Bare(text.to_string()),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Tag::Pair { key, .. } => Some(key),
            Tag::Bare(_) => None,
        }
    }

    pub fn txn_id(&self) -> Option<&str> {
        match self {
            Tag::Pair { key, value } if key == TXN_TAG && !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

///
/// Transaction or lot timestamp: a date, optionally with a time of day
/// (up to microsecond precision) and an offset from UTC.
///
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LedgerDateTime {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub offset: Option<FixedOffset>,
}

impl LedgerDateTime {
    pub fn from_date(date: NaiveDate) -> Self {
        LedgerDateTime {
            date,
            time: None,
            offset: None,
        }
    }

    /// `YYYY-MM-DD`, the display form used for listings.
    pub fn display_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for LedgerDateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;

        if let Some(time) = self.time {
            write!(f, "T{}", time.format("%H:%M:%S%.f"))?;

            if let Some(offset) = self.offset {
                let seconds = offset.local_minus_utc();
                if seconds == 0 {
                    write!(f, "Z")?;
                } else {
                    let sign = if seconds < 0 { '-' } else { '+' };
                    let seconds = seconds.abs();
                    write!(f, "{}{:02}:{:02}", sign, seconds / 3600, seconds % 3600 / 60)?;
                }
            }
        }

        Ok(())
    }
}

impl FromStr for LedgerDateTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid date: {}", s);

        let parts = match datetime_parts(s) {
            Ok(("", parts)) => parts,
            _ => return Err(invalid()),
        };

        let date = NaiveDate::from_ymd_opt(parts.year, parts.month, parts.day).ok_or_else(invalid)?;

        let time = match parts.time {
            Some(t) => {
                // Fraction digits are right-padded: ".5" is 500ms, ".000123" is 123µs.
                let micros = match t.fraction {
                    Some(digits) => {
                        let padded = format!("{:0<6}", digits);
                        padded.parse::<u32>().map_err(|_| invalid())?
                    }
                    None => 0,
                };
                Some(
                    NaiveTime::from_hms_micro_opt(t.hour, t.minute, t.second, micros)
                        .ok_or_else(invalid)?,
                )
            }
            None => None,
        };

        let offset = match parts.time.and_then(|t| t.offset) {
            Some(seconds) => Some(FixedOffset::east_opt(seconds).ok_or_else(invalid)?),
            None => None,
        };

        Ok(LedgerDateTime { date, time, offset })
    }
}

impl Serialize for LedgerDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn display_transaction_status() {
        assert_eq!(format!("{}", TransactionStatus::Pending), "!");
        assert_eq!(format!("{}", TransactionStatus::Cleared), "*");
        assert_eq!(
            TransactionStatus::from_char('*'),
            Some(TransactionStatus::Cleared)
        );
        assert_eq!(TransactionStatus::from_char('x'), None);
    }

    #[test]
    fn display_amount() {
        assert_eq!(
            format!("{}", Amount::new(Decimal::new(-23010, 2), "USD")),
            "-230.10 USD"
        );
        assert_eq!(
            format!("{}", Amount::new(Decimal::new(1000, 1), "AUD")),
            "100.0 AUD"
        );
    }

    #[test]
    fn tag_from_path_like() {
        assert_eq!(Tag::from_path_like("txn:01J2N9R9"), Tag::pair("txn", "01J2N9R9"));
        assert_eq!(
            Tag::from_path_like("src:binance:order:999"),
            Tag::pair("src", "binance:order:999")
        );
        assert_eq!(
            Tag::from_path_like("2026-q1:review"),
            Tag::Bare("2026-q1:review".to_string())
        );
        assert_eq!(Tag::pair("txn", "abc").txn_id(), Some("abc"));
        assert_eq!(Tag::pair("src", "abc").txn_id(), None);
    }

    #[test]
    fn parse_plain_date() {
        let dt: LedgerDateTime = "2026-01-15".parse().unwrap();
        assert_eq!(
            dt,
            LedgerDateTime::from_date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        );
        assert_eq!(dt.to_string(), "2026-01-15");
    }

    #[test]
    fn parse_datetime_with_fraction_and_offset() {
        let dt: LedgerDateTime = "2026-01-15T10:30:05.5+05:30".parse().unwrap();
        assert_eq!(
            dt.time,
            Some(NaiveTime::from_hms_micro_opt(10, 30, 5, 500_000).unwrap())
        );
        assert_eq!(dt.offset, FixedOffset::east_opt(5 * 3600 + 30 * 60));
        assert_eq!(dt.to_string(), "2026-01-15T10:30:05.500+05:30");
        assert_eq!(dt.display_date(), "2026-01-15");
    }

    #[test]
    fn parse_datetime_utc() {
        let dt: LedgerDateTime = "2026-02-01T00:00:00Z".parse().unwrap();
        assert_eq!(dt.offset, FixedOffset::east_opt(0));
        assert_eq!(dt.to_string(), "2026-02-01T00:00:00Z");

        let reparsed: LedgerDateTime = dt.to_string().parse().unwrap();
        assert_eq!(reparsed, dt);
    }

    #[test]
    fn parse_non_existing_date() {
        assert_eq!(
            "2026-13-24".parse::<LedgerDateTime>(),
            Err("invalid date: 2026-13-24".to_string())
        );
        assert_eq!(
            "2026-01-15T25:00:00".parse::<LedgerDateTime>(),
            Err("invalid date: 2026-01-15T25:00:00".to_string())
        );
    }
}
