//! Read-only projection of future occurrences for calendar previews.
//!
//! The projector walks the same [`RecurrenceManager`] the generator uses and,
//! like the generator, continues from a task's latest stored occurrence, so a
//! preview and the instance that is eventually materialized agree on dates and
//! times. Nothing here touches storage.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;
use uuid::Uuid;

use crate::models::{ForecastInstance, RecurringTask, SchedulerConfig, DEFAULT_FORECAST_LIMIT, DEFAULT_MAX_STEPS};
use crate::recurrence::RecurrenceManager;
use crate::timezone::local_date;

#[derive(Debug, Clone)]
pub struct ForecastProjector {
    timezone: Tz,
    /// Occurrences projected per task
    limit: usize,
    max_steps: u32,
}

impl Default for ForecastProjector {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            limit: DEFAULT_FORECAST_LIMIT,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ForecastProjector {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            timezone: config.timezone,
            limit: config.forecast_limit,
            max_steps: config.max_steps,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Projects occurrences of `tasks` whose local date lies in `range_start..=range_end`.
    ///
    /// `existing` holds `(task_id, scheduled_at)` of stored occurrences; a
    /// projection on the same local day as one of them is suppressed. Tasks
    /// whose rule fails validation are skipped. The result is sorted by due time.
    pub fn project<I>(
        &self,
        tasks: &[RecurringTask],
        range_start: NaiveDate,
        range_end: NaiveDate,
        existing: I,
        now: DateTime<Utc>,
    ) -> Vec<ForecastInstance>
    where
        I: IntoIterator<Item = (Uuid, DateTime<Utc>)>,
    {
        let covered: HashSet<(Uuid, NaiveDate)> = existing
            .into_iter()
            .map(|(task_id, at)| (task_id, local_date(at, &self.timezone)))
            .collect();

        let mut projected = Vec::new();
        for recurring in tasks {
            let manager = match RecurrenceManager::new(recurring.rule.clone(), self.timezone) {
                Ok(manager) => manager.with_max_steps(self.max_steps),
                Err(e) => {
                    debug!(task_id = %recurring.task.id, error = %e, "skipping task with invalid rule");
                    continue;
                }
            };

            let before = projected.len();
            if recurring.rule.is_counter_mode() {
                self.project_periods(recurring, &manager, range_start, range_end, &covered, now, &mut projected);
            } else {
                self.project_dates(recurring, &manager, range_start, range_end, &covered, now, &mut projected);
            }
            debug!(
                task_id = %recurring.task.id,
                count = projected.len() - before,
                "projected forecast occurrences"
            );
        }

        projected.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then_with(|| a.title.cmp(&b.title)));
        projected
    }

    #[allow(clippy::too_many_arguments)]
    fn project_dates(
        &self,
        recurring: &RecurringTask,
        manager: &RecurrenceManager,
        range_start: NaiveDate,
        range_end: NaiveDate,
        covered: &HashSet<(Uuid, NaiveDate)>,
        now: DateTime<Utc>,
        out: &mut Vec<ForecastInstance>,
    ) {
        // Continue from the stored series so the preview follows its phase.
        let candidates = match recurring.last_scheduled_at {
            Some(last) => manager.candidates_after(local_date(last, &self.timezone), now),
            None => manager.candidates(now),
        };

        let mut emitted = 0;
        for candidate in candidates {
            if candidate.date > range_end || emitted >= self.limit {
                break;
            }
            if candidate.date < range_start || covered.contains(&(recurring.task.id, candidate.date)) {
                continue;
            }
            out.push(self.instance(recurring, candidate.date, candidate.scheduled_at, candidate.time_specified, None));
            emitted += 1;
        }
    }

    /// One projection per counter period, due at the period deadline.
    #[allow(clippy::too_many_arguments)]
    fn project_periods(
        &self,
        recurring: &RecurringTask,
        manager: &RecurrenceManager,
        range_start: NaiveDate,
        range_end: NaiveDate,
        covered: &HashSet<(Uuid, NaiveDate)>,
        now: DateTime<Utc>,
        out: &mut Vec<ForecastInstance>,
    ) {
        let target = recurring.rule.occurrences_per_period.map(i64::from);
        let mut period = manager.period_containing(now);
        let mut emitted = 0;
        let mut steps = 0;

        while let Some(current) = period {
            if current.end > range_end || emitted >= self.limit || steps >= self.max_steps {
                break;
            }
            steps += 1;

            if current.end >= range_start && !covered.contains(&(recurring.task.id, current.end)) {
                out.push(self.instance(recurring, current.end, current.deadline, false, target));
                emitted += 1;
            }
            period = manager.period_after(&current);
        }
    }

    fn instance(
        &self,
        recurring: &RecurringTask,
        date: NaiveDate,
        scheduled_at: DateTime<Utc>,
        time_specified: bool,
        actions_target: Option<i64>,
    ) -> ForecastInstance {
        ForecastInstance {
            synthetic_id: synthetic_id(recurring.task.id, date),
            task_id: recurring.task.id,
            title: recurring.task.title.clone(),
            category_name: recurring.category_name.clone(),
            important: recurring.task.important,
            scheduled_at,
            time_specified,
            actions_target,
        }
    }
}

/// Identifier of a projected occurrence, stable for a task and local date.
pub fn synthetic_id(task_id: Uuid, date: NaiveDate) -> String {
    format!("fc-{}-{}", task_id.simple(), date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DaysOfWeek, Frequency, PreferredTime, RecurrenceRule, Task};
    use chrono::{Datelike, TimeZone, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recurring(title: &str, rule: RecurrenceRule) -> RecurringTask {
        let task = Task {
            title: title.to_string(),
            ..Default::default()
        };
        RecurringTask {
            rule: RecurrenceRule {
                task_id: task.id,
                ..rule
            },
            task,
            category_name: Some("Health".to_string()),
            last_scheduled_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        // Friday morning
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_projects_weekday_rule_within_range() {
        let gym = recurring(
            "Gym",
            RecurrenceRule {
                frequency: Frequency::Weekly,
                days_of_week: DaysOfWeek::from_iso([1, 3, 5]).unwrap(),
                preferred_time: Some(PreferredTime::parse("06:00").unwrap()),
                ..Default::default()
            },
        );
        let later = Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();

        let projected = ForecastProjector::default().project(
            &[gym],
            date(2026, 10, 16),
            date(2026, 10, 25),
            Vec::new(),
            later,
        );

        let days: Vec<NaiveDate> = projected.iter().map(|f| f.scheduled_at.date_naive()).collect();
        assert_eq!(
            days,
            vec![date(2026, 10, 16), date(2026, 10, 19), date(2026, 10, 21), date(2026, 10, 23)]
        );
        assert!(projected.iter().all(|f| f.time_specified));
        assert!(projected.iter().all(|f| f.synthetic_id.starts_with("fc-")));
        assert_eq!(projected[0].category_name.as_deref(), Some("Health"));
    }

    #[test]
    fn test_existing_instance_suppresses_same_day() {
        let daily = recurring("Water plants", RecurrenceRule::default());
        let task_id = daily.task.id;
        // Stored at noon; the projection for the same day is due at 23:59:59.
        let stored = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();

        let projected = ForecastProjector::default().project(
            &[daily],
            date(2026, 10, 16),
            date(2026, 10, 19),
            vec![(task_id, stored)],
            now(),
        );

        let days: Vec<NaiveDate> = projected.iter().map(|f| f.scheduled_at.date_naive()).collect();
        assert_eq!(days, vec![date(2026, 10, 16), date(2026, 10, 18), date(2026, 10, 19)]);
    }

    #[test]
    fn test_projection_follows_the_stored_weekday() {
        let mut review = recurring(
            "Weekly review",
            RecurrenceRule {
                frequency: Frequency::Weekly,
                ..Default::default()
            },
        );
        // The open instance is on a Wednesday; today is a Friday.
        let stored = Utc.with_ymd_and_hms(2026, 10, 21, 23, 59, 59).unwrap();
        review.last_scheduled_at = Some(stored);
        let task_id = review.task.id;

        let projected = ForecastProjector::default().project(
            &[review],
            date(2026, 10, 16),
            date(2026, 11, 5),
            vec![(task_id, stored)],
            now(),
        );

        let days: Vec<NaiveDate> = projected.iter().map(|f| f.scheduled_at.date_naive()).collect();
        assert_eq!(days, vec![date(2026, 10, 28), date(2026, 11, 4)]);
        assert!(projected.iter().all(|f| f.scheduled_at.weekday() == Weekday::Wed));
    }

    #[test]
    fn test_suppression_is_per_task() {
        let first = recurring("A", RecurrenceRule::default());
        let second = recurring("B", RecurrenceRule::default());
        let stored = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();

        let projected = ForecastProjector::default().project(
            &[first.clone(), second],
            date(2026, 10, 16),
            date(2026, 10, 16),
            vec![(first.task.id, stored)],
            now(),
        );

        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].title, "B");
    }

    #[test]
    fn test_limit_bounds_each_task() {
        let daily = recurring("Stretch", RecurrenceRule::default());
        let projected = ForecastProjector::default().with_limit(5).project(
            &[daily],
            date(2026, 10, 16),
            date(2026, 12, 31),
            Vec::new(),
            now(),
        );
        assert_eq!(projected.len(), 5);
    }

    #[test]
    fn test_counter_rule_projects_period_deadlines() {
        let reading = recurring(
            "Read",
            RecurrenceRule {
                frequency: Frequency::Weekly,
                occurrences_per_period: Some(3),
                ..Default::default()
            },
        );

        let projected = ForecastProjector::default().project(
            &[reading],
            date(2026, 10, 16),
            date(2026, 11, 1),
            Vec::new(),
            now(),
        );

        assert_eq!(projected.len(), 3);
        for forecast in &projected {
            assert_eq!(forecast.scheduled_at.date_naive().weekday(), Weekday::Sun);
            assert_eq!(forecast.actions_target, Some(3));
            assert!(!forecast.time_specified);
        }
    }

    #[test]
    fn test_results_are_sorted_across_tasks() {
        let evening = recurring(
            "Evening",
            RecurrenceRule {
                preferred_time: Some(PreferredTime::parse("20:00").unwrap()),
                ..Default::default()
            },
        );
        let morning = recurring(
            "Morning",
            RecurrenceRule {
                preferred_time: Some(PreferredTime::parse("09:00").unwrap()),
                ..Default::default()
            },
        );

        let projected = ForecastProjector::default().project(
            &[evening, morning],
            date(2026, 10, 16),
            date(2026, 10, 17),
            Vec::new(),
            now(),
        );

        let titles: Vec<&str> = projected.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Morning", "Evening", "Morning", "Evening"]);
        assert!(projected.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));
    }
}
