use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

pub mod add;
pub mod category;
pub mod r#do;
pub mod fail;
pub mod forecast;
pub mod import;
pub mod list;
pub mod missed;
pub mod sweep;

/// Per-invocation settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub user_id: Uuid,
    pub timezone: Tz,
    pub now: DateTime<Utc>,
    pub default_filters: Vec<String>,
    pub default_failure_reason: String,
}

impl Context {
    pub fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.timezone).date_naive()
    }

    /// Inclusive local date range covering `days` days from today.
    pub fn days_ahead(&self, days: u32) -> (NaiveDate, NaiveDate) {
        let start = self.today();
        let end = start + chrono::Duration::days(i64::from(days.max(1)) - 1);
        (start, end)
    }
}
