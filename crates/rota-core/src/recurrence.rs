//! Occurrence logic shared by the generator and the forecast projector.
//!
//! Everything here is pure: the caller supplies `now`, and calendar dates are
//! evaluated in the scheduler's timezone.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::models::{Frequency, PreferredTime, RecurrenceRule, SchedulerConfig, DEFAULT_MAX_STEPS};
use crate::timezone::{local_date, resolve_local};

/// Due time used when a rule or task has no preferred time.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Resolve a local date plus optional time to its due instant.
///
/// Returns the instant and whether the time component was given explicitly.
pub fn due_instant(date: NaiveDate, time: Option<PreferredTime>, tz: &Tz) -> (DateTime<Utc>, bool) {
    match time {
        Some(time) => (resolve_local(date, time.time(), tz), true),
        None => (resolve_local(date, end_of_day(), tz), false),
    }
}

/// Due instant for a one-time task.
///
/// A missing date means today. An instant that has already elapsed today rolls
/// to tomorrow; a date before today is rejected.
pub fn schedule_one_time(
    due_on: Option<NaiveDate>,
    due_time: Option<PreferredTime>,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, bool), CoreError> {
    let today = local_date(now, tz);
    let date = due_on.unwrap_or(today);
    if date < today {
        return Err(CoreError::validation(
            "due_on",
            format!("{} is already in the past", date),
        ));
    }

    let (at, time_specified) = due_instant(date, due_time, tz);
    if at > now {
        return Ok((at, time_specified));
    }

    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| CoreError::validation("due_on", "date is out of range"))?;
    Ok(due_instant(tomorrow, due_time, tz))
}

/// Decides whether `date` qualifies as an occurrence date under `rule`.
///
/// `anchor` is the date generation started from; monthly rules without a
/// `day_of_month` repeat on the anchor's day. Intervals are not checked here,
/// they are applied by the stepper.
pub fn matches(rule: &RecurrenceRule, date: NaiveDate, anchor: NaiveDate) -> bool {
    match rule.frequency {
        Frequency::Daily => true,
        Frequency::Weekly if rule.days_of_week.is_empty() => true,
        Frequency::Weekly => rule.days_of_week.contains(date.weekday()),
        Frequency::Monthly => match rule.day_of_month {
            Some(day) => date.day() == day,
            None => date.day() == anchor.day(),
        },
    }
}

/// A date selected by a rule, with the instant it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub date: NaiveDate,
    pub scheduled_at: DateTime<Utc>,
    pub time_specified: bool,
}

/// The window an "N times per period" rule counts actions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Local end of `end`, 23:59:59.
    pub deadline: DateTime<Utc>,
}

/// RecurrenceManager: evaluates one rule in one timezone.
///
/// Responsibilities:
/// 1. Pick the date generation starts from, given `now`
/// 2. Walk candidate dates with the rule's stepping increments, bounded by `max_steps`
/// 3. Stop the series at `end_date`
/// 4. Compute counter periods and their deadlines
#[derive(Debug, Clone)]
pub struct RecurrenceManager {
    rule: RecurrenceRule,
    timezone: Tz,
    max_steps: u32,
}

impl RecurrenceManager {
    /// Creates a manager after validating the rule.
    pub fn new(rule: RecurrenceRule, timezone: Tz) -> Result<Self, CoreError> {
        rule.validate()?;
        Ok(Self {
            rule,
            timezone,
            max_steps: DEFAULT_MAX_STEPS,
        })
    }

    pub fn from_config(rule: RecurrenceRule, config: &SchedulerConfig) -> Result<Self, CoreError> {
        Ok(Self::new(rule, config.timezone)?.with_max_steps(config.max_steps))
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn matches(&self, date: NaiveDate, anchor: NaiveDate) -> bool {
        matches(&self.rule, date, anchor)
    }

    /// Due instant of an occurrence on `date`.
    pub fn scheduled_at(&self, date: NaiveDate) -> DateTime<Utc> {
        self.candidate(date).scheduled_at
    }

    pub fn candidate(&self, date: NaiveDate) -> Candidate {
        let (scheduled_at, time_specified) = due_instant(date, self.rule.preferred_time, &self.timezone);
        Candidate {
            date,
            scheduled_at,
            time_specified,
        }
    }

    /// Today, or tomorrow when today's due instant is not after `now`.
    pub fn start_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = local_date(now, &self.timezone);
        if self.candidate(today).scheduled_at > now {
            today
        } else {
            today.succ_opt().unwrap_or(today)
        }
    }

    /// Candidate occurrences from `now` forward, in order.
    ///
    /// The iterator ends after `max_steps` stepping increments or once a
    /// candidate would fall after the rule's `end_date`.
    pub fn candidates(&self, now: DateTime<Utc>) -> Candidates<'_> {
        let start = self.start_date(now);
        let interval = self.rule.interval();

        let cursor = match self.rule.frequency {
            Frequency::Daily => Cursor::Days {
                date: start,
                step: i64::from(interval),
            },
            Frequency::Weekly if self.rule.days_of_week.is_empty() => Cursor::Days {
                date: start,
                step: 7 * i64::from(interval),
            },
            Frequency::Weekly => Cursor::Weekdays {
                date: start,
                skip_weeks: i64::from(interval) - 1,
            },
            Frequency::Monthly => Cursor::Months {
                first: first_of_month(start),
                offset: 0,
                step: interval,
                day: self.rule.day_of_month.unwrap_or_else(|| start.day()),
            },
        };

        Candidates {
            manager: self,
            start,
            anchor: start,
            cursor,
            steps: 0,
        }
    }

    /// Candidate occurrences that continue a series whose latest stored
    /// occurrence fell on `anchor`.
    ///
    /// Stepping keeps the phase of `anchor`: day and week intervals count from
    /// it, interval weeks are the anchor's ISO week plus multiples of the
    /// interval, and monthly rules without `day_of_month` keep its day. Only
    /// dates after `anchor` whose due instant is after `now` are yielded.
    pub fn candidates_after(&self, anchor: NaiveDate, now: DateTime<Utc>) -> Candidates<'_> {
        let start = self.start_date(now).max(anchor.succ_opt().unwrap_or(anchor));
        let interval = self.rule.interval();

        let cursor = match self.rule.frequency {
            Frequency::Daily => {
                let step = i64::from(interval);
                Cursor::Days {
                    date: first_step_on_or_after(anchor, start, step),
                    step,
                }
            }
            Frequency::Weekly if self.rule.days_of_week.is_empty() => {
                let step = 7 * i64::from(interval);
                Cursor::Days {
                    date: first_step_on_or_after(anchor, start, step),
                    step,
                }
            }
            Frequency::Weekly => {
                let interval = i64::from(interval);
                let week = monday_of(start);
                let behind = (week - monday_of(anchor)).num_weeks().rem_euclid(interval);
                Cursor::Weekdays {
                    date: if behind == 0 { start } else { week + Duration::weeks(interval - behind) },
                    skip_weeks: interval - 1,
                }
            }
            Frequency::Monthly => {
                let first = first_of_month(anchor);
                let elapsed = months_between(first, first_of_month(start));
                Cursor::Months {
                    first,
                    offset: elapsed.div_ceil(interval) * interval,
                    step: interval,
                    day: self.rule.day_of_month.unwrap_or_else(|| anchor.day()),
                }
            }
        };

        Candidates {
            manager: self,
            start,
            anchor,
            cursor,
            steps: 0,
        }
    }

    /// Up to `count` upcoming candidates.
    pub fn preview(&self, now: DateTime<Utc>, count: usize) -> Vec<Candidate> {
        self.candidates(now).take(count).collect()
    }

    /// The counter period containing `at`, or `None` once the period starts after `end_date`.
    pub fn period_containing(&self, at: DateTime<Utc>) -> Option<Period> {
        let today = local_date(at, &self.timezone);
        let (start, end) = match self.rule.frequency {
            Frequency::Daily => (today, today),
            Frequency::Weekly => {
                let monday = monday_of(today);
                (monday, monday + Duration::days(6))
            }
            Frequency::Monthly => {
                let first = first_of_month(today);
                (first, last_of_month(first))
            }
        };

        if self.rule.end_date.map_or(false, |end_date| start > end_date) {
            return None;
        }

        Some(Period {
            start,
            end,
            deadline: resolve_local(end, end_of_day(), &self.timezone),
        })
    }

    /// Deadline of the counter period containing `at`.
    pub fn period_deadline(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.period_containing(at).map(|period| period.deadline)
    }

    /// The period immediately after `period`.
    pub fn period_after(&self, period: &Period) -> Option<Period> {
        let next_day = period.end.succ_opt()?;
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
        self.period_containing(resolve_local(next_day, noon, &self.timezone))
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    u32::try_from(months).unwrap_or(0)
}

/// The first date `anchor + k * step` (k >= 1) that is not before `start`.
fn first_step_on_or_after(anchor: NaiveDate, start: NaiveDate, step: i64) -> NaiveDate {
    let behind = (start - anchor).num_days().max(1);
    let steps = (behind + step - 1) / step;
    anchor + Duration::days(steps * step)
}

fn last_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone)]
enum Cursor {
    /// Fixed day increments: daily rules and weekly rules without weekdays.
    Days { date: NaiveDate, step: i64 },
    /// Day-by-day walk for weekly rules with weekdays; entering a new ISO week
    /// skips `skip_weeks` further weeks.
    Weekdays { date: NaiveDate, skip_weeks: i64 },
    /// Month-by-month walk; months without `day` produce no date.
    Months {
        first: NaiveDate,
        offset: u32,
        step: u32,
        day: u32,
    },
}

enum Position {
    Date(NaiveDate),
    /// A month that has no target day.
    Gap { month_first: NaiveDate },
}

impl Cursor {
    fn position(&self) -> Option<Position> {
        match self {
            Cursor::Days { date, .. } | Cursor::Weekdays { date, .. } => Some(Position::Date(*date)),
            Cursor::Months {
                first, offset, day, ..
            } => {
                let month_first = first.checked_add_months(Months::new(*offset))?;
                Some(match month_first.with_day(*day) {
                    Some(date) => Position::Date(date),
                    None => Position::Gap { month_first },
                })
            }
        }
    }

    /// Moves to the next stepping position. Returns false when the calendar runs out.
    fn advance(&mut self) -> bool {
        match self {
            Cursor::Days { date, step } => match date.checked_add_signed(Duration::days(*step)) {
                Some(next) => {
                    *date = next;
                    true
                }
                None => false,
            },
            Cursor::Weekdays { date, skip_weeks } => {
                let Some(mut next) = date.succ_opt() else {
                    return false;
                };
                if *skip_weeks > 0 && next.weekday() == Weekday::Mon {
                    match next.checked_add_signed(Duration::weeks(*skip_weeks)) {
                        Some(skipped) => next = skipped,
                        None => return false,
                    }
                }
                *date = next;
                true
            }
            Cursor::Months { offset, step, .. } => match offset.checked_add(*step) {
                Some(next) => {
                    *offset = next;
                    true
                }
                None => false,
            },
        }
    }
}

/// Iterator over a rule's candidate occurrences. See [`RecurrenceManager::candidates`].
pub struct Candidates<'a> {
    manager: &'a RecurrenceManager,
    start: NaiveDate,
    /// Date the series is measured from; see [`matches`].
    anchor: NaiveDate,
    cursor: Cursor,
    steps: u32,
}

impl Candidates<'_> {
    /// Stepping increments consumed so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    fn exhaust(&mut self) {
        self.steps = self.manager.max_steps;
    }
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        let end_date = self.manager.rule.end_date;

        while self.steps < self.manager.max_steps {
            self.steps += 1;

            let Some(position) = self.cursor.position() else {
                self.exhaust();
                return None;
            };
            if !self.cursor.advance() {
                self.exhaust();
            }

            let date = match position {
                Position::Date(date) => date,
                Position::Gap { month_first } => {
                    if end_date.map_or(false, |end| month_first > end) {
                        self.exhaust();
                        return None;
                    }
                    continue;
                }
            };

            if end_date.map_or(false, |end| date > end) {
                self.exhaust();
                return None;
            }

            // The first month of a monthly walk can target a day before the start.
            if date < self.start || !self.manager.matches(date, self.anchor) {
                continue;
            }

            return Some(self.manager.candidate(date));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DaysOfWeek;
    use chrono::{TimeZone, Timelike};
    use proptest::prelude::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn manager(rule: RecurrenceRule) -> RecurrenceManager {
        RecurrenceManager::new(rule, Tz::UTC).unwrap()
    }

    fn dates(manager: &RecurrenceManager, now: DateTime<Utc>, count: usize) -> Vec<NaiveDate> {
        manager.preview(now, count).into_iter().map(|c| c.date).collect()
    }

    mod predicate_tests {
        use super::*;

        #[rstest]
        #[case(date(2026, 10, 12), true)] // Monday
        #[case(date(2026, 10, 13), false)]
        #[case(date(2026, 10, 14), true)]
        #[case(date(2026, 10, 15), false)]
        #[case(date(2026, 10, 16), true)]
        #[case(date(2026, 10, 17), false)]
        #[case(date(2026, 10, 18), false)]
        fn test_weekly_with_days(#[case] day: NaiveDate, #[case] expected: bool) {
            let rule = RecurrenceRule {
                frequency: Frequency::Weekly,
                days_of_week: DaysOfWeek::from_iso([1, 3, 5]).unwrap(),
                ..Default::default()
            };
            assert_eq!(matches(&rule, day, date(2026, 10, 12)), expected);
        }

        #[test]
        fn test_daily_and_plain_weekly_match_everything() {
            let daily = RecurrenceRule::default();
            let weekly = RecurrenceRule {
                frequency: Frequency::Weekly,
                ..Default::default()
            };
            for offset in 0..14 {
                let day = date(2026, 10, 1) + Duration::days(offset);
                assert!(matches(&daily, day, date(2026, 10, 1)));
                assert!(matches(&weekly, day, date(2026, 10, 1)));
            }
        }

        #[test]
        fn test_monthly_day_of_month_and_anchor() {
            let on_31st = RecurrenceRule {
                frequency: Frequency::Monthly,
                day_of_month: Some(31),
                ..Default::default()
            };
            assert!(matches(&on_31st, date(2026, 1, 31), date(2026, 1, 5)));
            assert!(!matches(&on_31st, date(2026, 2, 28), date(2026, 1, 5)));

            let anchored = RecurrenceRule {
                frequency: Frequency::Monthly,
                ..Default::default()
            };
            assert!(matches(&anchored, date(2026, 3, 5), date(2026, 1, 5)));
            assert!(!matches(&anchored, date(2026, 3, 6), date(2026, 1, 5)));
        }
    }

    mod stepping_tests {
        use super::*;

        #[test]
        fn test_daily_interval_two_from_monday() {
            let m = manager(RecurrenceRule {
                interval_value: 2,
                ..Default::default()
            });
            let monday_morning = at(2026, 10, 12, 8, 0, 0);
            assert_eq!(
                dates(&m, monday_morning, 3),
                vec![date(2026, 10, 12), date(2026, 10, 14), date(2026, 10, 16)]
            );
        }

        #[test]
        fn test_weekly_without_days_jumps_whole_intervals() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                interval_value: 2,
                ..Default::default()
            });
            assert_eq!(
                dates(&m, at(2026, 10, 14, 9, 0, 0), 3),
                vec![date(2026, 10, 14), date(2026, 10, 28), date(2026, 11, 11)]
            );
        }

        #[test]
        fn test_weekly_days_with_interval_skips_weeks() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                interval_value: 2,
                days_of_week: DaysOfWeek::from_iso([1, 3]).unwrap(),
                ..Default::default()
            });
            assert_eq!(
                dates(&m, at(2026, 10, 14, 9, 0, 0), 4),
                vec![
                    date(2026, 10, 14),
                    date(2026, 10, 26),
                    date(2026, 10, 28),
                    date(2026, 11, 9)
                ]
            );
        }

        #[test]
        fn test_monthly_31st_skips_short_months() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                day_of_month: Some(31),
                ..Default::default()
            });
            assert_eq!(
                dates(&m, at(2026, 1, 15, 9, 0, 0), 4),
                vec![date(2026, 1, 31), date(2026, 3, 31), date(2026, 5, 31), date(2026, 7, 31)]
            );
            // From February, the next 31st is in March.
            assert_eq!(dates(&m, at(2026, 2, 1, 9, 0, 0), 1), vec![date(2026, 3, 31)]);
        }

        #[test]
        fn test_monthly_day_already_passed_moves_to_next_month() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                day_of_month: Some(10),
                ..Default::default()
            });
            assert_eq!(dates(&m, at(2026, 10, 16, 9, 0, 0), 2), vec![date(2026, 11, 10), date(2026, 12, 10)]);
        }

        #[test]
        fn test_monthly_anchor_does_not_drift_after_short_month() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                ..Default::default()
            });
            assert_eq!(
                dates(&m, at(2026, 1, 31, 9, 0, 0), 3),
                vec![date(2026, 1, 31), date(2026, 3, 31), date(2026, 5, 31)]
            );
        }

        #[test]
        fn test_step_budget_bounds_the_walk() {
            let m = manager(RecurrenceRule::default()).with_max_steps(10);
            let mut candidates = m.candidates(at(2026, 10, 16, 9, 0, 0));
            assert_eq!(candidates.by_ref().count(), 10);
            assert_eq!(candidates.steps(), 10);

            // A 31st-of-month rule needs more than a handful of steps.
            let sparse = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                day_of_month: Some(31),
                ..Default::default()
            })
            .with_max_steps(1);
            assert!(sparse.candidates(at(2026, 2, 1, 9, 0, 0)).next().is_none());
        }

        #[test]
        fn test_end_date_in_past_yields_nothing() {
            let m = manager(RecurrenceRule {
                end_date: Some(date(2026, 10, 1)),
                ..Default::default()
            });
            assert!(m.candidates(at(2026, 10, 16, 9, 0, 0)).next().is_none());
        }

        #[test]
        fn test_end_date_is_inclusive() {
            let m = manager(RecurrenceRule {
                end_date: Some(date(2026, 10, 18)),
                ..Default::default()
            });
            assert_eq!(
                dates(&m, at(2026, 10, 16, 9, 0, 0), 10),
                vec![date(2026, 10, 16), date(2026, 10, 17), date(2026, 10, 18)]
            );
        }
    }

    mod continuation_tests {
        use super::*;

        fn continued(m: &RecurrenceManager, anchor: NaiveDate, now: DateTime<Utc>, count: usize) -> Vec<NaiveDate> {
            m.candidates_after(anchor, now).take(count).map(|c| c.date).collect()
        }

        #[test]
        fn test_plain_weekly_keeps_its_weekday_after_a_miss() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                ..Default::default()
            });
            // Missed on Monday, picked up again on Tuesday.
            assert_eq!(
                continued(&m, date(2026, 10, 12), at(2026, 10, 13, 8, 0, 0), 2),
                vec![date(2026, 10, 19), date(2026, 10, 26)]
            );
        }

        #[test]
        fn test_early_completion_steps_from_the_stored_date() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                ..Default::default()
            });
            assert_eq!(
                continued(&m, date(2026, 10, 21), at(2026, 10, 16, 8, 0, 0), 1),
                vec![date(2026, 10, 28)]
            );
        }

        #[rstest]
        #[case(1, date(2026, 10, 16))]
        #[case(3, date(2026, 10, 18))]
        fn test_daily_interval_counts_from_anchor(#[case] interval: u32, #[case] expected: NaiveDate) {
            let m = manager(RecurrenceRule {
                interval_value: interval,
                ..Default::default()
            });
            assert_eq!(
                continued(&m, date(2026, 10, 12), at(2026, 10, 16, 8, 0, 0), 1),
                vec![expected]
            );
        }

        #[test]
        fn test_biweekly_days_stay_in_the_anchor_weeks() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                interval_value: 2,
                days_of_week: DaysOfWeek::from_iso([1, 3]).unwrap(),
                ..Default::default()
            });
            let anchor = date(2026, 10, 14);
            let expected = vec![date(2026, 10, 26), date(2026, 10, 28), date(2026, 11, 9)];
            assert_eq!(continued(&m, anchor, at(2026, 10, 16, 8, 0, 0), 3), expected);
            // Resuming inside an off week jumps to the next on week.
            assert_eq!(continued(&m, anchor, at(2026, 10, 19, 8, 0, 0), 3), expected);
        }

        #[test]
        fn test_monthly_keeps_the_anchor_day() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                ..Default::default()
            });
            assert_eq!(
                continued(&m, date(2026, 1, 15), at(2026, 3, 20, 8, 0, 0), 2),
                vec![date(2026, 4, 15), date(2026, 5, 15)]
            );
        }

        #[test]
        fn test_long_idle_series_fast_forwards_within_budget() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                ..Default::default()
            })
            .with_max_steps(1);
            assert_eq!(
                continued(&m, date(2024, 1, 1), at(2026, 10, 13, 8, 0, 0), 1),
                vec![date(2026, 10, 19)]
            );
        }
    }

    mod time_tests {
        use super::*;

        #[test]
        fn test_preferred_time_already_elapsed_rolls_to_tomorrow() {
            let m = manager(RecurrenceRule {
                preferred_time: Some(PreferredTime::parse("23:59").unwrap()),
                ..Default::default()
            });
            let first = m.preview(at(2026, 10, 16, 23, 59, 30), 1)[0];
            assert_eq!(first.date, date(2026, 10, 17));
            assert_eq!(first.scheduled_at, at(2026, 10, 17, 23, 59, 0));
            assert!(first.time_specified);
        }

        #[test]
        fn test_missing_time_defaults_to_end_of_day() {
            let m = manager(RecurrenceRule::default());
            let first = m.preview(at(2026, 10, 16, 8, 0, 0), 1)[0];
            assert_eq!(first.scheduled_at, at(2026, 10, 16, 23, 59, 59));
            assert!(!first.time_specified);
        }

        #[test]
        fn test_preferred_time_in_local_zone() {
            let tz: Tz = "Europe/Berlin".parse().unwrap();
            let m = RecurrenceManager::new(
                RecurrenceRule {
                    preferred_time: Some(PreferredTime::parse("06:00").unwrap()),
                    ..Default::default()
                },
                tz,
            )
            .unwrap();
            // 03:00 UTC is 05:00 in Berlin (CEST), so today's 06:00 is still ahead.
            let first = m.preview(at(2026, 10, 16, 3, 0, 0), 1)[0];
            assert_eq!(first.scheduled_at, at(2026, 10, 16, 4, 0, 0));
            assert_eq!(first.scheduled_at.with_timezone(&tz).hour(), 6);
        }

        #[test]
        fn test_one_time_rolls_elapsed_time_to_tomorrow() {
            let time = PreferredTime::parse("23:59").unwrap();
            let now = at(2026, 10, 16, 23, 59, 30);
            let (due, specified) = schedule_one_time(Some(date(2026, 10, 16)), Some(time), &Tz::UTC, now).unwrap();
            assert_eq!(due, at(2026, 10, 17, 23, 59, 0));
            assert!(specified);
        }

        #[test]
        fn test_one_time_defaults_to_end_of_today() {
            let now = at(2026, 10, 16, 10, 0, 0);
            let (due, specified) = schedule_one_time(None, None, &Tz::UTC, now).unwrap();
            assert_eq!(due, at(2026, 10, 16, 23, 59, 59));
            assert!(!specified);
        }

        #[test]
        fn test_one_time_rejects_past_dates() {
            let now = at(2026, 10, 16, 10, 0, 0);
            let err = schedule_one_time(Some(date(2026, 10, 15)), None, &Tz::UTC, now).unwrap_err();
            assert!(matches!(err, CoreError::Validation { field: "due_on", .. }));
        }
    }

    mod period_tests {
        use super::*;

        #[rstest]
        #[case(at(2026, 10, 14, 9, 0, 0))] // Wednesday
        #[case(at(2026, 10, 12, 0, 0, 0))] // Monday
        #[case(at(2026, 10, 18, 23, 0, 0))] // Sunday
        fn test_weekly_period_ends_sunday(#[case] now: DateTime<Utc>) {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                occurrences_per_period: Some(4),
                ..Default::default()
            });
            let period = m.period_containing(now).unwrap();
            assert_eq!(period.start, date(2026, 10, 12));
            assert_eq!(period.end, date(2026, 10, 18));
            assert_eq!(period.deadline, at(2026, 10, 18, 23, 59, 59));
        }

        #[test]
        fn test_monthly_period_handles_leap_february() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                occurrences_per_period: Some(2),
                ..Default::default()
            });
            let period = m.period_containing(at(2028, 2, 10, 12, 0, 0)).unwrap();
            assert_eq!(period.start, date(2028, 2, 1));
            assert_eq!(period.deadline, at(2028, 2, 29, 23, 59, 59));

            let next = m.period_after(&period).unwrap();
            assert_eq!(next.start, date(2028, 3, 1));
            assert_eq!(next.end, date(2028, 3, 31));
        }

        #[test]
        fn test_daily_period_is_today() {
            let m = manager(RecurrenceRule {
                occurrences_per_period: Some(3),
                ..Default::default()
            });
            let period = m.period_containing(at(2026, 10, 16, 7, 0, 0)).unwrap();
            assert_eq!(period.start, period.end);
            assert_eq!(period.deadline, at(2026, 10, 16, 23, 59, 59));
        }

        #[test]
        fn test_period_after_end_date_is_none() {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                occurrences_per_period: Some(2),
                end_date: Some(date(2026, 10, 14)),
                ..Default::default()
            });
            let period = m.period_containing(at(2026, 10, 14, 9, 0, 0)).unwrap();
            assert!(m.period_after(&period).is_none());
        }
    }

    proptest! {
        #[test]
        fn prop_weekday_rule_never_selects_other_days(offset in 0i64..3650, hour in 0u32..24) {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Weekly,
                days_of_week: DaysOfWeek::from_iso([1, 3, 5]).unwrap(),
                ..Default::default()
            });
            let start = date(2025, 1, 1) + Duration::days(offset);
            let now = Utc.from_utc_datetime(&start.and_hms_opt(hour, 0, 0).unwrap());
            for candidate in m.candidates(now).take(40) {
                prop_assert!(matches!(
                    candidate.date.weekday(),
                    Weekday::Mon | Weekday::Wed | Weekday::Fri
                ));
                prop_assert!(candidate.scheduled_at > now);
            }
        }

        #[test]
        fn prop_day_of_month_always_lands_on_that_day(day in 1u32..=31, offset in 0i64..1500) {
            let m = manager(RecurrenceRule {
                frequency: Frequency::Monthly,
                day_of_month: Some(day),
                ..Default::default()
            });
            let now = Utc.from_utc_datetime(&(date(2025, 1, 1) + Duration::days(offset)).and_hms_opt(12, 0, 0).unwrap());
            for candidate in m.candidates(now).take(12) {
                prop_assert_eq!(candidate.date.day(), day);
            }
        }
    }
}
