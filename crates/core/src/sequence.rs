//! Human-readable document numbers: `PREFIX` + `YYYYMMDD` + 4-digit sequence.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{DomainError, DomainResult};

const MAX_PER_DAY: u32 = 9_999;

/// Generator for daily-numbered documents (orders, complaints).
///
/// Numbers are strictly increasing: the sequence restarts at 1 on a new day,
/// and a clock that moves backwards keeps counting on the last day seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySequence {
    prefix: String,
    last: Option<(NaiveDate, u32)>,
}

impl DailySequence {
    pub fn new(prefix: impl Into<String>) -> DomainResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty()
            || prefix.len() > 8
            || !prefix.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(DomainError::validation(
                "number prefix must be 1 to 8 upper-case letters or digits",
            ));
        }
        Ok(Self { prefix, last: None })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next number for the day of `now`.
    pub fn next(&mut self, now: DateTime<Utc>) -> DomainResult<String> {
        let today = now.date_naive();
        let (date, seq) = match self.last {
            Some((last_date, last_seq)) if last_date >= today => (last_date, last_seq + 1),
            _ => (today, 1),
        };
        if seq > MAX_PER_DAY {
            return Err(DomainError::conflict(format!(
                "{} sequence exhausted for {}",
                self.prefix,
                date.format("%Y-%m-%d")
            )));
        }
        self.last = Some((date, seq));
        Ok(self.format(date, seq))
    }

    /// Feed an already-issued number back in (e.g. when rebuilding state), so
    /// `next` never reissues it. Numbers with another prefix are ignored.
    pub fn observe(&mut self, number: &str) {
        let Some((date, seq)) = self.parse(number) else {
            return;
        };
        if self.last.is_none_or(|last| (date, seq) > last) {
            self.last = Some((date, seq));
        }
    }

    fn parse(&self, number: &str) -> Option<(NaiveDate, u32)> {
        let rest = number.strip_prefix(&self.prefix)?;
        if rest.len() != 12 || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let date = NaiveDate::parse_from_str(&rest[..8], "%Y%m%d").ok()?;
        let seq = rest[8..].parse().ok()?;
        Some((date, seq))
    }

    fn format(&self, date: NaiveDate, seq: u32) -> String {
        format!("{}{}{:04}", self.prefix, date.format("%Y%m%d"), seq)
    }
}
