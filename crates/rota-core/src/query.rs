use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::models::{InstanceStatus, InstanceView};
use crate::timezone::{local_date, resolve_local};

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Filter(Filter),
    Not(Box<Query>),
    Binary {
        op: Operator,
        left: Box<Query>,
        right: Box<Query>,
    },
}

impl Query {
    pub fn and(left: Query, right: Query) -> Query {
        Query::Binary {
            op: Operator::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: Query, right: Query) -> Query {
        Query::Binary {
            op: Operator::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(query: Query) -> Query {
        Query::Not(Box::new(query))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Status(InstanceStatus),
    Category(String),
    Important(bool),
    Due(DueDate),
}

/// Due-date filters, evaluated on local calendar dates.
#[derive(Debug, Clone, PartialEq)]
pub enum DueDate {
    Today,
    Tomorrow,
    /// Open and already past its deadline.
    Overdue,
    Before(NaiveDate),
    After(NaiveDate),
    On(NaiveDate),
}

/// The clock and zone a query's relative dates are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext {
    pub now: DateTime<Utc>,
    pub timezone: Tz,
}

impl QueryContext {
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self { now, timezone }
    }

    pub fn today(&self) -> NaiveDate {
        local_date(self.now, &self.timezone)
    }

    /// UTC bounds `[start, end)` of a local calendar day.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = resolve_local(date, NaiveTime::MIN, &self.timezone);
        let end = date
            .succ_opt()
            .map(|next| resolve_local(next, NaiveTime::MIN, &self.timezone))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }

    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        self.day_bounds(date).0
    }
}

impl Query {
    /// Evaluates the query against an in-memory occurrence, e.g. a forecast.
    pub fn matches(&self, view: &InstanceView, ctx: &QueryContext) -> bool {
        match self {
            Query::Filter(filter) => filter.matches(view, ctx),
            Query::Not(inner) => !inner.matches(view, ctx),
            Query::Binary { op, left, right } => match op {
                Operator::And => left.matches(view, ctx) && right.matches(view, ctx),
                Operator::Or => left.matches(view, ctx) || right.matches(view, ctx),
            },
        }
    }
}

impl Filter {
    fn matches(&self, view: &InstanceView, ctx: &QueryContext) -> bool {
        match self {
            Filter::Status(status) => view.status == *status,
            Filter::Category(name) => view
                .category_name
                .as_deref()
                .map_or(false, |c| c.eq_ignore_ascii_case(name)),
            Filter::Important(important) => view.important == *important,
            Filter::Due(due) => {
                let date = local_date(view.scheduled_at, &ctx.timezone);
                let today = ctx.today();
                match due {
                    DueDate::Today => date == today,
                    DueDate::Tomorrow => today.succ_opt() == Some(date),
                    DueDate::Overdue => view.status == InstanceStatus::Open && view.scheduled_at < ctx.now,
                    DueDate::Before(bound) => date < *bound,
                    DueDate::After(bound) => date > *bound,
                    DueDate::On(day) => date == *day,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstanceKey, OccurrenceKind};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn view(title: &str, category: Option<&str>, important: bool, at: DateTime<Utc>) -> InstanceView {
        InstanceView {
            key: InstanceKey::Forecast(format!("fc-{}", title)),
            kind: OccurrenceKind::Single,
            task_id: Uuid::nil(),
            title: title.to_string(),
            category_name: category.map(str::to_string),
            important,
            scheduled_at: at,
            time_specified: true,
            status: InstanceStatus::Open,
            completed_at: None,
            failure_reason: None,
            actions_left: None,
            actions_target: None,
        }
    }

    #[test]
    fn test_matches_combined_filters() {
        let ctx = QueryContext::new(Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(), Tz::UTC);
        let gym = view("Gym", Some("Health"), true, Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0).unwrap());

        let query = Query::and(
            Query::Filter(Filter::Category("health".to_string())),
            Query::Filter(Filter::Due(DueDate::Tomorrow)),
        );
        assert!(query.matches(&gym, &ctx));
        assert!(!Query::negate(query).matches(&gym, &ctx));

        let either = Query::or(
            Query::Filter(Filter::Important(false)),
            Query::Filter(Filter::Due(DueDate::Today)),
        );
        assert!(!either.matches(&gym, &ctx));
    }

    #[test]
    fn test_overdue_requires_open_and_past() {
        let ctx = QueryContext::new(Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(), Tz::UTC);
        let mut late = view("Late", None, false, Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap());
        let overdue = Query::Filter(Filter::Due(DueDate::Overdue));
        assert!(overdue.matches(&late, &ctx));

        late.status = InstanceStatus::Completed;
        assert!(!overdue.matches(&late, &ctx));
        assert!(!Query::Filter(Filter::Category("Work".to_string())).matches(&late, &ctx));
    }

    #[test]
    fn test_day_bounds_follow_timezone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let ctx = QueryContext::new(Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(), tz);
        let (start, end) = ctx.day_bounds(ctx.today());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 16, 4, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 10, 17, 4, 0, 0).unwrap());
    }
}
