//! Structured task input, as produced by a form or an upstream text parser.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString, OneOrMany};

use crate::error::CoreError;
use crate::models::{DaysOfWeek, Frequency, NewRecurrenceRule, NewTaskData, PreferredTime};

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "importance")]
    pub important: bool,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default, alias = "due_at")]
    pub due_on: Option<NaiveDate>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default)]
    pub recurrence: Option<RecurrencePayload>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrencePayload {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval_value: u32,
    #[serde(default)]
    pub occurrences_per_period: Option<u32>,
    /// A single ISO weekday or a list of them.
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_after_occurrences: Option<u32>,
}

fn default_interval() -> u32 {
    1
}

impl TryFrom<RecurrencePayload> for NewRecurrenceRule {
    type Error = CoreError;

    fn try_from(payload: RecurrencePayload) -> Result<Self, Self::Error> {
        let rule = NewRecurrenceRule {
            frequency: payload.frequency,
            interval_value: payload.interval_value,
            occurrences_per_period: payload.occurrences_per_period,
            days_of_week: DaysOfWeek::from_iso(payload.days_of_week)?,
            day_of_month: payload.day_of_month,
            preferred_time: payload
                .preferred_time
                .as_deref()
                .map(PreferredTime::parse)
                .transpose()?,
            end_date: payload.end_date,
            end_after_occurrences: payload.end_after_occurrences,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Converts a payload into task data. `user_id` is left nil for the caller to fill in.
impl TryFrom<TaskPayload> for NewTaskData {
    type Error = CoreError;

    fn try_from(payload: TaskPayload) -> Result<Self, Self::Error> {
        let title = payload.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }

        Ok(NewTaskData {
            title,
            category_name: payload.category.filter(|c| !c.trim().is_empty()),
            important: payload.important,
            instruction: payload.instruction,
            due_on: payload.due_on,
            due_time: payload.due_time.as_deref().map(PreferredTime::parse).transpose()?,
            recurrence: payload.recurrence.map(NewRecurrenceRule::try_from).transpose()?,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<NewTaskData, CoreError> {
        let payload: TaskPayload = serde_json::from_str(json).unwrap();
        NewTaskData::try_from(payload)
    }

    #[test]
    fn test_recurring_payload() {
        let data = parse(
            r#"{
                "title": "Gym",
                "category": "Health",
                "importance": true,
                "recurrence": {
                    "frequency": "weekly",
                    "days_of_week": [1, 3, 5],
                    "preferred_time": "06:00"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(data.title, "Gym");
        assert_eq!(data.category_name.as_deref(), Some("Health"));
        assert!(data.important);
        let rule = data.recurrence.unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval_value, 1);
        assert_eq!(rule.days_of_week.to_string(), "1,3,5");
        assert_eq!(rule.preferred_time.unwrap().to_string(), "06:00");
    }

    #[test]
    fn test_single_weekday_and_empty_time() {
        let data = parse(
            r#"{
                "title": "Team sync",
                "recurrence": { "frequency": "weekly", "interval_value": 2, "days_of_week": 4, "preferred_time": "" }
            }"#,
        )
        .unwrap();
        let rule = data.recurrence.unwrap();
        assert_eq!(rule.days_of_week.to_string(), "4");
        assert_eq!(rule.interval_value, 2);
        assert!(rule.preferred_time.is_none());
    }

    #[test]
    fn test_one_time_payload() {
        let data = parse(r#"{ "title": "Dentist", "due_at": "2026-10-20", "due_time": "14:30" }"#).unwrap();
        assert!(data.recurrence.is_none());
        assert_eq!(data.due_on, NaiveDate::from_ymd_opt(2026, 10, 20));
        assert_eq!(data.due_time.unwrap().to_12h(), "2:30 PM");
    }

    #[test]
    fn test_invalid_fields_are_named() {
        let err = parse(
            r#"{ "title": "Run", "recurrence": { "frequency": "daily", "preferred_time": "25:00" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "preferred_time", .. }));

        let err = parse(
            r#"{ "title": "Run", "recurrence": { "frequency": "daily", "occurrences_per_period": 3, "day_of_month": 4 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "day_of_month", .. }));

        let err = parse(r#"{ "title": "   " }"#).unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "title", .. }));
    }
}
