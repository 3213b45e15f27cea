use crate::common::LedgerDateTime;
use crate::error::StoreError;
use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Calendar month, written `YYYYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (0..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month of the local clock.
    pub fn current() -> Self {
        YearMonth::of(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidMonth(s.to_string());
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = s[..4].parse().map_err(|_| invalid())?;
        let month = s[4..].parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

const MONTH_KEY: &str = "month:";

/// Leading directive recording which month an active file belongs to.
pub fn month_directive(month: YearMonth) -> String {
    format!("; {}{}\n", MONTH_KEY, month)
}

/// Month an active file belongs to: its `; month:YYYYMM` directive, or else the
/// date of its first transaction header.
pub fn recorded_month(contents: &str) -> Option<YearMonth> {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix(';') {
            if let Some(month) = comment.trim().strip_prefix(MONTH_KEY) {
                if let Ok(month) = month.trim().parse() {
                    return Some(month);
                }
            }
            continue;
        }
        return line
            .split_whitespace()
            .next()
            .and_then(|first| first.parse::<LedgerDateTime>().ok())
            .map(|datetime| YearMonth::of(datetime.date));
    }
    None
}
