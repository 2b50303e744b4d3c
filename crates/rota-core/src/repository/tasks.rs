use std::collections::HashMap;

use crate::error::CoreError;
use crate::models::{
    CreatedTask, NewTaskData, RecurrenceRule, RecurrenceRuleRow, RecurringTask, Task, TaskInstance,
};
use crate::recurrence::schedule_one_time;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct TaskWithCategory {
    #[sqlx(flatten)]
    task: Task,
    category_name: Option<String>,
    last_scheduled_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData, now: DateTime<Utc>) -> Result<CreatedTask, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        if let Some(recurrence) = &data.recurrence {
            recurrence.validate()?;
        }

        let mut tx = self.pool().begin().await?;
        let recurrence = data.recurrence.clone();
        let (due_on, due_time) = (data.due_on, data.due_time);
        let task = Self::add_task_in_transaction(&mut tx, data, now).await?;

        let created = match recurrence {
            Some(new_rule) => {
                let rule = new_rule.into_rule(task.id, now);
                Self::insert_rule_in_transaction(&mut tx, &rule).await?;
                let first_occurrence = Self::generate_next_in_transaction(&mut tx, &rule, self.config(), now)
                    .await?
                    .map(|next| next.scheduled_at());
                info!(
                    task_id = %task.id,
                    rule = %rule,
                    first_occurrence = ?first_occurrence,
                    "created recurring task"
                );
                CreatedTask {
                    task,
                    rule: Some(rule),
                    first_occurrence,
                }
            }
            None => {
                let (scheduled_at, time_specified) =
                    schedule_one_time(due_on, due_time, &self.config().timezone, now)?;
                let instance =
                    Self::insert_instance_in_transaction(&mut tx, task.id, scheduled_at, time_specified, now)
                        .await?
                        .ok_or_else(|| CoreError::InvalidInput("Duplicate instance for a new task".to_string()))?;
                info!(task_id = %task.id, scheduled_at = %instance.scheduled_at, "created one-time task");
                CreatedTask {
                    task,
                    rule: None,
                    first_occurrence: Some(instance.scheduled_at),
                }
            }
        };

        tx.commit().await?;
        Ok(created)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_rule_for_task(&self, task_id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let row: Option<RecurrenceRuleRow> = sqlx::query_as("SELECT * FROM recurrence_rules WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(RecurrenceRule::try_from).transpose()
    }

    async fn find_recurring_tasks(&self, user_id: Uuid) -> Result<Vec<RecurringTask>, CoreError> {
        let tasks: Vec<TaskWithCategory> = sqlx::query_as(
            r#"SELECT t.*, c.name AS category_name,
                (SELECT i.scheduled_at FROM task_instances i
                 WHERE i.task_id = t.id
                 ORDER BY i.scheduled_at DESC
                 LIMIT 1) AS last_scheduled_at
            FROM tasks t
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = $1 AND EXISTS (SELECT 1 FROM recurrence_rules r WHERE r.task_id = t.id)
            ORDER BY t.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let rows: Vec<RecurrenceRuleRow> = sqlx::query_as(
            r#"SELECT r.* FROM recurrence_rules r
            JOIN tasks t ON t.id = r.task_id
            WHERE t.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut rules = HashMap::with_capacity(rows.len());
        for row in rows {
            let rule = RecurrenceRule::try_from(row)?;
            rules.insert(rule.task_id, rule);
        }

        Ok(tasks
            .into_iter()
            .filter_map(|row| {
                let rule = rules.remove(&row.task.id)?;
                Some(RecurringTask {
                    task: row.task,
                    rule,
                    category_name: row.category_name,
                    last_scheduled_at: row.last_scheduled_at,
                })
            })
            .collect())
    }
}

impl SqliteRepository {
    /// Add a task within an existing transaction, resolving its category by name.
    pub(crate) async fn add_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        mut data: NewTaskData,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        if data.category_id.is_none() {
            if let Some(category_name) = &data.category_name {
                let category =
                    Self::ensure_category_in_transaction(&mut *tx, data.user_id, category_name, now).await?;
                data.category_id = Some(category.id);
            }
        }

        let task: Task = sqlx::query_as(
            r#"INSERT INTO tasks (id, user_id, title, category_id, important, instruction, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(data.title.trim())
        .bind(data.category_id)
        .bind(data.important)
        .bind(&data.instruction)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(task)
    }

    pub(crate) async fn insert_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        let days = (!rule.days_of_week.is_empty()).then(|| rule.days_of_week.to_string());

        sqlx::query(
            r#"INSERT INTO recurrence_rules (id, task_id, frequency, interval_value, occurrences_per_period,
                days_of_week, day_of_month, preferred_time, end_date, end_after_occurrences, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(rule.id)
        .bind(rule.task_id)
        .bind(rule.frequency)
        .bind(i64::from(rule.interval_value))
        .bind(rule.occurrences_per_period.map(i64::from))
        .bind(days)
        .bind(rule.day_of_month.map(i64::from))
        .bind(rule.preferred_time.map(|t| t.to_string()))
        .bind(rule.end_date)
        .bind(rule.end_after_occurrences.map(i64::from))
        .bind(rule.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub(crate) async fn find_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
    ) -> Result<Option<RecurrenceRule>, CoreError> {
        let row: Option<RecurrenceRuleRow> = sqlx::query_as("SELECT * FROM recurrence_rules WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&mut **tx)
            .await?;
        row.map(RecurrenceRule::try_from).transpose()
    }

    /// Inserts an instance unless one already exists at the same instant.
    ///
    /// Returns `None` on conflict; the unique `(task_id, scheduled_at)` index
    /// makes the check and the write a single statement.
    pub(crate) async fn insert_instance_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
        scheduled_at: DateTime<Utc>,
        time_specified: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskInstance>, CoreError> {
        let instance = sqlx::query_as(
            r#"INSERT INTO task_instances (id, task_id, scheduled_at, time_specified, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (task_id, scheduled_at) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(scheduled_at)
        .bind(time_specified)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(instance)
    }
}
