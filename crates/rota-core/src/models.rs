use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub category_id: Option<Uuid>,
    pub important: bool,
    /// The free-text instruction the task was created from, if any.
    pub instruction: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            title: "".to_string(),
            category_id: None,
            important: false,
            instruction: None,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Recurrence rule value types
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Singular noun for the period this frequency repeats over.
    pub fn period_noun(self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// A set of ISO weekdays (1 = Monday .. 7 = Sunday) stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const fn empty() -> Self {
        DaysOfWeek(0)
    }

    /// Builds a set from ISO weekday numbers, rejecting anything outside 1..=7.
    pub fn from_iso<I>(days: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut mask = 0u8;
        for day in days {
            if !(1..=7).contains(&day) {
                return Err(CoreError::validation(
                    "days_of_week",
                    format!("{} is not an ISO weekday (1 = Monday .. 7 = Sunday)", day),
                ));
            }
            mask |= 1 << (day - 1);
        }
        Ok(DaysOfWeek(mask))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.contains_iso(weekday.number_from_monday() as u8)
    }

    pub fn contains_iso(&self, day: u8) -> bool {
        (1..=7).contains(&day) && self.0 & (1 << (day - 1)) != 0
    }

    /// ISO weekday numbers in ascending order.
    pub fn iso_days(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=7u8).filter(move |d| self.contains_iso(*d))
    }
}

impl TryFrom<Vec<u8>> for DaysOfWeek {
    type Error = CoreError;

    fn try_from(days: Vec<u8>) -> Result<Self, Self::Error> {
        DaysOfWeek::from_iso(days)
    }
}

impl From<DaysOfWeek> for Vec<u8> {
    fn from(days: DaysOfWeek) -> Self {
        days.iso_days().collect()
    }
}

impl fmt::Display for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .iso_days()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

impl FromStr for DaysOfWeek {
    type Err = CoreError;

    /// Parses the storage form, e.g. `"1,3,5"`. The empty string is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut days = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = part.parse::<u8>().map_err(|_| {
                CoreError::validation("days_of_week", format!("'{}' is not a weekday number", part))
            })?;
            days.push(day);
        }
        DaysOfWeek::from_iso(days)
    }
}

/// Time of day an occurrence is due, written `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PreferredTime(NaiveTime);

impl PreferredTime {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |message: String| CoreError::validation("preferred_time", message);

        let parts: Vec<&str> = input.trim().split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(invalid(format!("'{}' is not in HH:MM or HH:MM:SS form", input)));
        }

        let mut fields = [0u32; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(format!("'{}' is not in HH:MM or HH:MM:SS form", input)));
            }
            *slot = part.parse().map_err(|_| invalid(format!("'{}' is not a number", part)))?;
        }

        let [hours, minutes, seconds] = fields;
        if hours > 23 {
            return Err(invalid(format!("hour {} is out of range 0-23", hours)));
        }
        if minutes > 59 {
            return Err(invalid(format!("minute {} is out of range 0-59", minutes)));
        }
        if seconds > 59 {
            return Err(invalid(format!("second {} is out of range 0-59", seconds)));
        }

        NaiveTime::from_hms_opt(hours, minutes, seconds)
            .map(PreferredTime)
            .ok_or_else(|| invalid(format!("'{}' is not a valid time", input)))
    }

    pub fn from_time(time: NaiveTime) -> Self {
        PreferredTime(time.with_nanosecond(0).unwrap_or(time))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Twelve-hour clock rendering, e.g. `7:05 AM`.
    pub fn to_12h(&self) -> String {
        let hour = self.0.hour();
        let meridiem = if hour >= 12 { "PM" } else { "AM" };
        let display_hour = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", display_hour, self.0.minute(), meridiem)
    }
}

impl fmt::Display for PreferredTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.second() == 0 {
            write!(f, "{}", self.0.format("%H:%M"))
        } else {
            write!(f, "{}", self.0.format("%H:%M:%S"))
        }
    }
}

impl FromStr for PreferredTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PreferredTime::parse(s)
    }
}

impl TryFrom<String> for PreferredTime {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PreferredTime::parse(&value)
    }
}

impl From<PreferredTime> for String {
    fn from(time: PreferredTime) -> Self {
        time.to_string()
    }
}

// ============================================================================
// Recurrence rules
// ============================================================================

/// Normalized repetition parameters attached to a task.
///
/// `occurrences_per_period > 1` selects period-counter mode; otherwise the
/// rule is evaluated date by date with `days_of_week` / `day_of_month`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub task_id: Uuid,
    pub frequency: Frequency,
    pub interval_value: u32,
    pub occurrences_per_period: Option<u32>,
    pub days_of_week: DaysOfWeek,
    pub day_of_month: Option<u32>,
    pub preferred_time: Option<PreferredTime>,
    pub end_date: Option<NaiveDate>,
    pub end_after_occurrences: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id: Uuid::nil(),
            frequency: Frequency::Daily,
            interval_value: 1,
            occurrences_per_period: None,
            days_of_week: DaysOfWeek::empty(),
            day_of_month: None,
            preferred_time: None,
            end_date: None,
            end_after_occurrences: None,
            created_at: Utc::now(),
        }
    }
}

impl RecurrenceRule {
    /// True when the rule counts N actions per period instead of matching dates.
    pub fn is_counter_mode(&self) -> bool {
        self.occurrences_per_period.map_or(false, |n| n > 1)
    }

    /// The interval, never less than one.
    pub fn interval(&self) -> u32 {
        self.interval_value.max(1)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval_value == 0 {
            return Err(CoreError::validation("interval_value", "must be at least 1"));
        }
        if self.occurrences_per_period == Some(0) {
            return Err(CoreError::validation("occurrences_per_period", "must be at least 1"));
        }
        if self.end_after_occurrences == Some(0) {
            return Err(CoreError::validation("end_after_occurrences", "must be at least 1"));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(CoreError::validation(
                    "day_of_month",
                    format!("{} is out of range 1-31", day),
                ));
            }
            if self.frequency != Frequency::Monthly {
                return Err(CoreError::validation("day_of_month", "only applies to monthly rules"));
            }
        }
        if !self.days_of_week.is_empty() && self.frequency != Frequency::Weekly {
            return Err(CoreError::validation("days_of_week", "only applies to weekly rules"));
        }
        if self.is_counter_mode() && (!self.days_of_week.is_empty() || self.day_of_month.is_some()) {
            return Err(CoreError::validation(
                "occurrences_per_period",
                "cannot be combined with days_of_week or day_of_month",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for RecurrenceRule {
    /// Human-readable description, e.g. "Every 2 weeks on Monday, Friday at 7:00 AM".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = self.frequency.period_noun();
        match self.occurrences_per_period {
            Some(n) if n > 1 => write!(f, "{} times per {}", n, noun)?,
            _ if self.interval() > 1 => write!(f, "Every {} {}s", self.interval(), noun)?,
            _ => write!(f, "Every {}", noun)?,
        }

        if !self.days_of_week.is_empty() {
            let names = self
                .days_of_week
                .iso_days()
                .map(iso_weekday_name)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " on {}", names)?;
        }

        if let Some(day) = self.day_of_month {
            write!(f, " on the {}{}", day, ordinal_suffix(day))?;
        }

        if let Some(time) = self.preferred_time {
            write!(f, " at {}", time.to_12h())?;
        }

        if let Some(end) = self.end_date {
            write!(f, " until {}", end.format("%b %-d, %Y"))
        } else if let Some(count) = self.end_after_occurrences {
            write!(f, " for {} occurrences", count)
        } else {
            write!(f, " (repeats indefinitely)")
        }
    }
}

fn iso_weekday_name(day: u8) -> &'static str {
    match day {
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Sunday",
    }
}

/// Ordinal suffix for a day number: 1st, 2nd, 3rd, 11th, 22nd ...
pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Storage form of a recurrence rule.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecurrenceRuleRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub frequency: Frequency,
    pub interval_value: i64,
    pub occurrences_per_period: Option<i64>,
    pub days_of_week: Option<String>,
    pub day_of_month: Option<i64>,
    pub preferred_time: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub end_after_occurrences: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RecurrenceRuleRow> for RecurrenceRule {
    type Error = CoreError;

    fn try_from(row: RecurrenceRuleRow) -> Result<Self, Self::Error> {
        let to_u32 = |field: &'static str, value: i64| {
            u32::try_from(value)
                .map_err(|_| CoreError::validation(field, format!("{} is out of range", value)))
        };

        Ok(RecurrenceRule {
            id: row.id,
            task_id: row.task_id,
            frequency: row.frequency,
            interval_value: to_u32("interval_value", row.interval_value)?,
            occurrences_per_period: row
                .occurrences_per_period
                .map(|v| to_u32("occurrences_per_period", v))
                .transpose()?,
            days_of_week: row
                .days_of_week
                .as_deref()
                .map(DaysOfWeek::from_str)
                .transpose()?
                .unwrap_or_default(),
            day_of_month: row.day_of_month.map(|v| to_u32("day_of_month", v)).transpose()?,
            preferred_time: row.preferred_time.as_deref().map(PreferredTime::parse).transpose()?,
            end_date: row.end_date,
            end_after_occurrences: row
                .end_after_occurrences
                .map(|v| to_u32("end_after_occurrences", v))
                .transpose()?,
            created_at: row.created_at,
        })
    }
}

/// Recurrence parameters as supplied at task creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecurrenceRule {
    pub frequency: Frequency,
    pub interval_value: u32,
    pub occurrences_per_period: Option<u32>,
    pub days_of_week: DaysOfWeek,
    pub day_of_month: Option<u32>,
    pub preferred_time: Option<PreferredTime>,
    pub end_date: Option<NaiveDate>,
    pub end_after_occurrences: Option<u32>,
}

impl NewRecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval_value: 1,
            occurrences_per_period: None,
            days_of_week: DaysOfWeek::empty(),
            day_of_month: None,
            preferred_time: None,
            end_date: None,
            end_after_occurrences: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.clone().into_rule(Uuid::nil(), DateTime::<Utc>::MIN_UTC).validate()
    }

    pub fn into_rule(self, task_id: Uuid, created_at: DateTime<Utc>) -> RecurrenceRule {
        RecurrenceRule {
            id: Uuid::now_v7(),
            task_id,
            frequency: self.frequency,
            interval_value: self.interval_value,
            occurrences_per_period: self.occurrences_per_period,
            days_of_week: self.days_of_week,
            day_of_month: self.day_of_month,
            preferred_time: self.preferred_time,
            end_date: self.end_date,
            end_after_occurrences: self.end_after_occurrences,
            created_at,
        }
    }
}

/// A task together with its rule and denormalized category name.
#[derive(Debug, Clone)]
pub struct RecurringTask {
    pub task: Task,
    pub rule: RecurrenceRule,
    pub category_name: Option<String>,
    /// Due instant of the latest stored single occurrence, if any.
    pub last_scheduled_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Instances
// ============================================================================

/// One concrete, time-stamped occurrence of a task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskInstance {
    pub id: Uuid,
    pub task_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    /// False when the rule had no preferred time and the end-of-day default was used.
    pub time_specified: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskInstance {
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from_flags(self.completed_at.is_some(), self.cancelled)
    }

    pub fn is_open(&self) -> bool {
        self.status() == InstanceStatus::Open
    }
}

/// One row per period for "N times per period" rules.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CounterInstance {
    pub id: Uuid,
    pub task_id: Uuid,
    pub period_start: NaiveDate,
    /// The period deadline.
    pub scheduled_at: DateTime<Utc>,
    pub actions_target: i64,
    pub actions_left: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CounterInstance {
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from_flags(self.completed_at.is_some(), self.cancelled_at.is_some())
    }

    pub fn is_open(&self) -> bool {
        self.status() == InstanceStatus::Open
    }

    pub fn actions_done(&self) -> i64 {
        self.actions_target - self.actions_left
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Open,
    Completed,
    Failed,
}

impl InstanceStatus {
    fn from_flags(completed: bool, cancelled: bool) -> Self {
        if cancelled {
            InstanceStatus::Failed
        } else if completed {
            InstanceStatus::Completed
        } else {
            InstanceStatus::Open
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Open => write!(f, "open"),
            InstanceStatus::Completed => write!(f, "completed"),
            InstanceStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid instance status: {0}")]
pub struct ParseInstanceStatusError(String);

impl FromStr for InstanceStatus {
    type Err = ParseInstanceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" | "pending" => Ok(InstanceStatus::Open),
            "completed" | "done" => Ok(InstanceStatus::Completed),
            "failed" | "cancelled" => Ok(InstanceStatus::Failed),
            _ => Err(ParseInstanceStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceKind {
    Single,
    Counter,
}

/// Identifies a listed occurrence: a stored row, or a synthetic forecast id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "lowercase")]
pub enum InstanceKey {
    Persisted(Uuid),
    Forecast(String),
}

impl InstanceKey {
    pub fn is_forecast(&self) -> bool {
        matches!(self, InstanceKey::Forecast(_))
    }

    pub fn persisted_id(&self) -> Option<Uuid> {
        match self {
            InstanceKey::Persisted(id) => Some(*id),
            InstanceKey::Forecast(_) => None,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Persisted(id) => write!(f, "{}", id),
            InstanceKey::Forecast(id) => f.write_str(id),
        }
    }
}

/// A listed occurrence with the task and category fields needed for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceView {
    pub key: InstanceKey,
    pub kind: OccurrenceKind,
    pub task_id: Uuid,
    pub title: String,
    pub category_name: Option<String>,
    pub important: bool,
    pub scheduled_at: DateTime<Utc>,
    pub time_specified: bool,
    pub status: InstanceStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub actions_left: Option<i64>,
    pub actions_target: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct InstanceRow {
    pub id: Uuid,
    pub kind: OccurrenceKind,
    pub task_id: Uuid,
    pub title: String,
    pub category_name: Option<String>,
    pub important: bool,
    pub scheduled_at: DateTime<Utc>,
    pub time_specified: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub failure_reason: Option<String>,
    pub actions_left: Option<i64>,
    pub actions_target: Option<i64>,
}

impl From<InstanceRow> for InstanceView {
    fn from(row: InstanceRow) -> Self {
        InstanceView {
            key: InstanceKey::Persisted(row.id),
            kind: row.kind,
            task_id: row.task_id,
            title: row.title,
            category_name: row.category_name,
            important: row.important,
            scheduled_at: row.scheduled_at,
            time_specified: row.time_specified,
            status: InstanceStatus::from_flags(row.completed_at.is_some(), row.cancelled),
            completed_at: row.completed_at,
            failure_reason: row.failure_reason,
            actions_left: row.actions_left,
            actions_target: row.actions_target,
        }
    }
}

/// A projected, never-persisted occurrence used for calendar previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInstance {
    pub synthetic_id: String,
    pub task_id: Uuid,
    pub title: String,
    pub category_name: Option<String>,
    pub important: bool,
    pub scheduled_at: DateTime<Utc>,
    pub time_specified: bool,
    /// Set for counter-mode rules: the actions the projected period will ask for.
    pub actions_target: Option<i64>,
}

impl From<ForecastInstance> for InstanceView {
    fn from(forecast: ForecastInstance) -> Self {
        let kind = if forecast.actions_target.is_some() {
            OccurrenceKind::Counter
        } else {
            OccurrenceKind::Single
        };
        InstanceView {
            key: InstanceKey::Forecast(forecast.synthetic_id),
            kind,
            task_id: forecast.task_id,
            title: forecast.title,
            category_name: forecast.category_name,
            important: forecast.important,
            scheduled_at: forecast.scheduled_at,
            time_specified: forecast.time_specified,
            status: InstanceStatus::Open,
            completed_at: None,
            failure_reason: None,
            actions_left: forecast.actions_target,
            actions_target: forecast.actions_target,
        }
    }
}

// ============================================================================
// Data Transfer Objects
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub user_id: Uuid,
    pub title: String,
    pub category_name: Option<String>, // Kept for CLI convenience
    pub category_id: Option<Uuid>,
    pub important: bool,
    pub instruction: Option<String>,
    /// Due date of a one-time task. Ignored when `recurrence` is set.
    pub due_on: Option<NaiveDate>,
    pub due_time: Option<PreferredTime>,
    pub recurrence: Option<NewRecurrenceRule>,
}

#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub task: Task,
    pub rule: Option<RecurrenceRule>,
    /// The first materialized occurrence, `None` if the series is already exhausted.
    pub first_occurrence: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum CompletionResult {
    Single(TaskInstance),
    Recurring {
        completed: TaskInstance,
        /// `None` when the series has no further occurrence.
        next: Option<TaskInstance>,
    },
}

impl CompletionResult {
    pub fn completed(&self) -> &TaskInstance {
        match self {
            CompletionResult::Single(instance) => instance,
            CompletionResult::Recurring { completed, .. } => completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed,
}

/// A complete/fail command issued by the user-facing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceCommand {
    pub instance_id: Uuid,
    pub outcome: Outcome,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug)]
pub enum CommandResult {
    Completed(CompletionResult),
    Failed(TaskInstance),
}

#[derive(Debug)]
pub struct CounterActionResult {
    pub counter: CounterInstance,
    /// The following period's counter, created when this action satisfied the period.
    pub next: Option<CounterInstance>,
}

impl CounterActionResult {
    pub fn period_satisfied(&self) -> bool {
        self.counter.completed_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub cancelled_instances: u64,
    pub expired_counters: u64,
    /// Overdue instances kept open for an interactive decision.
    pub held_for_prompt: u64,
    pub rearmed_series: u64,
}

impl std::ops::AddAssign for SweepSummary {
    fn add_assign(&mut self, other: Self) {
        self.cancelled_instances += other.cancelled_instances;
        self.expired_counters += other.expired_counters;
        self.held_for_prompt += other.held_for_prompt;
        self.rearmed_series += other.rearmed_series;
    }
}

/// An overdue instance of an important task awaiting the user's decision.
#[derive(Debug, Clone)]
pub struct MissedDeadline {
    pub instance: InstanceView,
    pub overdue_by: Duration,
}

// ============================================================================
// Scheduler configuration
// ============================================================================

/// What happens to open instances whose deadline has passed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Every overdue instance is cancelled with the default failure reason.
    AutoCancel,
    /// Overdue instances of important tasks stay open and are surfaced one at a
    /// time; everything else is cancelled as under `AutoCancel`.
    #[default]
    Prompt,
}

impl fmt::Display for DeadlinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlinePolicy::AutoCancel => write!(f, "auto_cancel"),
            DeadlinePolicy::Prompt => write!(f, "prompt"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid deadline policy: {0}")]
pub struct ParseDeadlinePolicyError(String);

impl FromStr for DeadlinePolicy {
    type Err = ParseDeadlinePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "auto_cancel" | "auto" | "cancel" => Ok(DeadlinePolicy::AutoCancel),
            "prompt" | "interactive" => Ok(DeadlinePolicy::Prompt),
            _ => Err(ParseDeadlinePolicyError(s.to_string())),
        }
    }
}

pub const DEFAULT_MAX_STEPS: u32 = 365;
pub const DEFAULT_FORECAST_LIMIT: usize = 60;
pub const DEFAULT_FAILURE_REASON: &str = "Deadline passed";

/// Configuration for generation and deadline handling - core version.
/// This is separate from the CLI config to allow for type differences.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Zone in which calendar dates, weekdays and preferred times are evaluated
    pub timezone: Tz,
    /// Candidate dates examined before a series counts as exhausted
    pub max_steps: u32,
    /// Upper bound on forecast occurrences per task
    pub forecast_limit: usize,
    pub deadline_policy: DeadlinePolicy,
    /// Reason recorded on instances cancelled by the sweep
    pub default_failure_reason: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            max_steps: DEFAULT_MAX_STEPS,
            forecast_limit: DEFAULT_FORECAST_LIMIT,
            deadline_policy: DeadlinePolicy::default(),
            default_failure_reason: DEFAULT_FAILURE_REASON.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("06:00", 6, 0, 0)]
    #[case("23:59", 23, 59, 0)]
    #[case("7:05", 7, 5, 0)]
    #[case("00:00:30", 0, 0, 30)]
    fn test_preferred_time_parses(#[case] input: &str, #[case] h: u32, #[case] m: u32, #[case] s: u32) {
        let time = PreferredTime::parse(input).unwrap();
        assert_eq!(time.time(), NaiveTime::from_hms_opt(h, m, s).unwrap());
    }

    #[rstest]
    #[case("24:00")]
    #[case("12:60")]
    #[case("12")]
    #[case("12:00:00:00")]
    #[case("ab:cd")]
    #[case("")]
    #[case("-1:30")]
    fn test_preferred_time_rejects(#[case] input: &str) {
        let err = PreferredTime::parse(input).unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "preferred_time", .. }));
    }

    #[test]
    fn test_preferred_time_display_and_12h() {
        let morning = PreferredTime::parse("07:05").unwrap();
        assert_eq!(morning.to_string(), "07:05");
        assert_eq!(morning.to_12h(), "7:05 AM");

        let midnight = PreferredTime::parse("00:00:15").unwrap();
        assert_eq!(midnight.to_string(), "00:00:15");
        assert_eq!(midnight.to_12h(), "12:00 AM");

        assert_eq!(PreferredTime::parse("14:30").unwrap().to_12h(), "2:30 PM");
    }

    #[test]
    fn test_days_of_week_round_trip_storage() {
        let days: DaysOfWeek = "5,1,3".parse().unwrap();
        assert_eq!(days.to_string(), "1,3,5");
        assert!(days.contains(Weekday::Mon));
        assert!(!days.contains(Weekday::Tue));
        assert!(days.contains(Weekday::Fri));
        assert!("".parse::<DaysOfWeek>().unwrap().is_empty());
    }

    #[test]
    fn test_days_of_week_rejects_out_of_range() {
        assert!(DaysOfWeek::from_iso([0]).is_err());
        assert!(DaysOfWeek::from_iso([8]).is_err());
        assert!("1,x".parse::<DaysOfWeek>().is_err());
    }

    #[test]
    fn test_rule_validation() {
        let mut rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            occurrences_per_period: Some(4),
            ..Default::default()
        };
        assert!(rule.validate().is_ok());
        assert!(rule.is_counter_mode());

        rule.days_of_week = DaysOfWeek::from_iso([1]).unwrap();
        assert!(matches!(
            rule.validate(),
            Err(CoreError::Validation { field: "occurrences_per_period", .. })
        ));

        let monthly_on_weekly = RecurrenceRule {
            frequency: Frequency::Weekly,
            day_of_month: Some(3),
            ..Default::default()
        };
        assert!(matches!(
            monthly_on_weekly.validate(),
            Err(CoreError::Validation { field: "day_of_month", .. })
        ));

        let zero_interval = RecurrenceRule {
            interval_value: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(CoreError::Validation { field: "interval_value", .. })
        ));
    }

    #[test]
    fn test_single_occurrence_per_period_is_not_counter_mode() {
        let rule = RecurrenceRule {
            occurrences_per_period: Some(1),
            ..Default::default()
        };
        assert!(!rule.is_counter_mode());
    }

    #[test]
    fn test_rule_description() {
        let rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            interval_value: 2,
            days_of_week: DaysOfWeek::from_iso([1, 5]).unwrap(),
            preferred_time: Some(PreferredTime::parse("07:00").unwrap()),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31),
            ..Default::default()
        };
        assert_eq!(
            rule.to_string(),
            "Every 2 weeks on Monday, Friday at 7:00 AM until Dec 31, 2026"
        );

        let counter = RecurrenceRule {
            frequency: Frequency::Weekly,
            occurrences_per_period: Some(3),
            ..Default::default()
        };
        assert_eq!(counter.to_string(), "3 times per week (repeats indefinitely)");

        let monthly = RecurrenceRule {
            frequency: Frequency::Monthly,
            day_of_month: Some(22),
            end_after_occurrences: Some(6),
            ..Default::default()
        };
        assert_eq!(monthly.to_string(), "Every month on the 22nd for 6 occurrences");
    }

    #[rstest]
    #[case(1, "st")]
    #[case(2, "nd")]
    #[case(3, "rd")]
    #[case(4, "th")]
    #[case(11, "th")]
    #[case(12, "th")]
    #[case(13, "th")]
    #[case(21, "st")]
    #[case(31, "st")]
    fn test_ordinal_suffix(#[case] day: u32, #[case] suffix: &str) {
        assert_eq!(ordinal_suffix(day), suffix);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("open".parse::<InstanceStatus>().unwrap(), InstanceStatus::Open);
        assert_eq!("DONE".parse::<InstanceStatus>().unwrap(), InstanceStatus::Completed);
        assert_eq!("cancelled".parse::<InstanceStatus>().unwrap(), InstanceStatus::Failed);
        assert!("archived".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn test_deadline_policy_parsing() {
        assert_eq!("auto-cancel".parse::<DeadlinePolicy>().unwrap(), DeadlinePolicy::AutoCancel);
        assert_eq!("prompt".parse::<DeadlinePolicy>().unwrap(), DeadlinePolicy::Prompt);
        assert_eq!(DeadlinePolicy::default(), DeadlinePolicy::Prompt);
    }
}
