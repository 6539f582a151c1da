//! Quota windows and their calendar reset boundaries.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trailing window a usage count is taken over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWindow {
    Daily,
    Weekly,
    Monthly,
}

impl QuotaWindow {
    /// Coarsest first, the order limits are checked in
    pub const CHECK_ORDER: [QuotaWindow; 3] =
        [QuotaWindow::Monthly, QuotaWindow::Weekly, QuotaWindow::Daily];

    /// Length of the trailing window
    pub fn span(&self) -> Duration {
        match self {
            QuotaWindow::Daily => Duration::days(1),
            QuotaWindow::Weekly => Duration::days(7),
            QuotaWindow::Monthly => Duration::days(30),
        }
    }

    /// When a blocked quota next becomes available.
    ///
    /// Daily: tomorrow at midnight. Weekly: the next Sunday at midnight (a
    /// Sunday rolls over to the following one). Monthly: the first of next
    /// month at midnight. All in UTC.
    pub fn next_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let next = match self {
            QuotaWindow::Daily => today.checked_add_days(Days::new(1)),
            QuotaWindow::Weekly => {
                let days_to_sunday = 7 - u64::from(today.weekday().num_days_from_sunday());
                today.checked_add_days(Days::new(days_to_sunday))
            }
            QuotaWindow::Monthly => first_of_next_month(today),
        };

        next.and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .unwrap_or_else(|| now + self.span())
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuotaWindow::Daily => "Daily",
            QuotaWindow::Weekly => "Weekly",
            QuotaWindow::Monthly => "Monthly",
        };
        f.write_str(label)
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}
