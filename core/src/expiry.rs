//! Expiry classification for display.
//!
//! Dates are calendar dates compared against a local "today"; there is no
//! time-of-day component, so "today" means the whole local day.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Local, NaiveDate};

/// Items due within this many days count as "due soon".
pub const DUE_SOON_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    NoDate,
    Expired,
    DueToday,
    /// Due in 1..=3 days.
    DueSoon(i64),
    Fresh(i64),
}

impl ExpiryStatus {
    pub fn classify(expiry: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(date) = expiry else {
            return ExpiryStatus::NoDate;
        };
        match days_until(date, today) {
            n if n < 0 => ExpiryStatus::Expired,
            0 => ExpiryStatus::DueToday,
            n if n <= DUE_SOON_DAYS => ExpiryStatus::DueSoon(n),
            n => ExpiryStatus::Fresh(n),
        }
    }

    /// Needs the user's attention: expired or due within the soon window.
    pub fn is_urgent(self) -> bool {
        matches!(
            self,
            ExpiryStatus::Expired | ExpiryStatus::DueToday | ExpiryStatus::DueSoon(_)
        )
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryStatus::NoDate => write!(f, "-"),
            ExpiryStatus::Expired => write!(f, "Expired"),
            ExpiryStatus::DueToday => write!(f, "Today"),
            ExpiryStatus::DueSoon(n) | ExpiryStatus::Fresh(n) => write!(f, "in {n}d"),
        }
    }
}

pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    date.signed_duration_since(today).num_days()
}

/// Today's date in the local timezone.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Ascending order with undated items after every dated one.
pub fn compare_expiry(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
