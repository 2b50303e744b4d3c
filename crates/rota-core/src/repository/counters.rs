use crate::error::CoreError;
use crate::models::{CounterActionResult, CounterInstance, RecurrenceRule, SchedulerConfig};
use crate::recurrence::{Period, RecurrenceManager};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
impl super::CounterRepository for SqliteRepository {
    async fn generate_counter(&self, task_id: Uuid, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CoreError> {
        let mut tx = self.pool().begin().await?;

        let rule = Self::find_rule_in_transaction(&mut tx, task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence rule for task {}", task_id)))?;
        if !rule.is_counter_mode() {
            return Err(CoreError::validation(
                "occurrences_per_period",
                "counters require more than one occurrence per period",
            ));
        }

        let counter = Self::generate_counter_in_transaction(&mut tx, &rule, self.config(), now).await?;
        tx.commit().await?;
        Ok(counter.map(|c| c.scheduled_at))
    }

    async fn record_counter_action(&self, counter_id: Uuid, now: DateTime<Utc>) -> Result<CounterActionResult, CoreError> {
        let mut tx = self.pool().begin().await?;

        // Decrement and completion happen in one statement so concurrent actions
        // can never take the counter below zero.
        let counter: Option<CounterInstance> = sqlx::query_as(
            r#"UPDATE counter_instances
            SET actions_left = actions_left - 1,
                completed_at = CASE WHEN actions_left - 1 = 0 THEN $1 ELSE completed_at END
            WHERE id = $2 AND completed_at IS NULL AND cancelled_at IS NULL AND actions_left > 0
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(counter_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(counter) = counter else {
            let existing = Self::find_counter_in_transaction(&mut tx, counter_id).await?;
            return Err(match existing {
                Some(_) => CoreError::InstanceClosed(counter_id),
                None => CoreError::NotFound(format!("Counter {}", counter_id)),
            });
        };

        let mut next = None;
        if counter.completed_at.is_some() {
            if let Some(rule) = Self::find_rule_in_transaction(&mut tx, counter.task_id).await? {
                let manager = RecurrenceManager::from_config(rule.clone(), self.config())?;
                if let Some(following) = manager
                    .period_containing(counter.scheduled_at)
                    .and_then(|period| manager.period_after(&period))
                {
                    next = Self::counter_for_period_in_transaction(&mut tx, &rule, &following, now)
                        .await?
                        .filter(CounterInstance::is_open);
                }
            }
            info!(
                counter_id = %counter.id,
                next_deadline = ?next.as_ref().map(|c| c.scheduled_at),
                "counter period satisfied"
            );
        } else {
            debug!(counter_id = %counter.id, actions_left = counter.actions_left, "counter action recorded");
        }

        tx.commit().await?;
        Ok(CounterActionResult { counter, next })
    }

    async fn find_open_counter(&self, task_id: Uuid) -> Result<Option<CounterInstance>, CoreError> {
        let counter = sqlx::query_as(
            r#"SELECT * FROM counter_instances
            WHERE task_id = $1 AND completed_at IS NULL AND cancelled_at IS NULL
            ORDER BY scheduled_at
            LIMIT 1
            "#,
        )
        .bind(task_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(counter)
    }

    async fn find_counter_by_id(&self, id: Uuid) -> Result<Option<CounterInstance>, CoreError> {
        let counter = sqlx::query_as("SELECT * FROM counter_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(counter)
    }
}

impl SqliteRepository {
    /// Returns the open counter for the period containing `now`, creating it if
    /// needed. When that period's counter is already closed, the following
    /// period is used instead.
    pub(crate) async fn generate_counter_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<CounterInstance>, CoreError> {
        let manager = RecurrenceManager::from_config(rule.clone(), config)?;
        let Some(current) = manager.period_containing(now) else {
            info!(task_id = %rule.task_id, "counter series has ended");
            return Ok(None);
        };

        if let Some(counter) = Self::counter_for_period_in_transaction(&mut *tx, rule, &current, now).await? {
            if counter.is_open() {
                return Ok(Some(counter));
            }
        }

        let Some(following) = manager.period_after(&current) else {
            return Ok(None);
        };
        Ok(Self::counter_for_period_in_transaction(&mut *tx, rule, &following, now)
            .await?
            .filter(CounterInstance::is_open))
    }

    /// The counter row for `period`, inserting it when absent.
    ///
    /// Returns `None` only when the rule's occurrence limit forbids a new row.
    pub(crate) async fn counter_for_period_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
        period: &Period,
        now: DateTime<Utc>,
    ) -> Result<Option<CounterInstance>, CoreError> {
        if let Some(existing) = Self::find_counter_for_deadline(&mut *tx, rule.task_id, period.deadline).await? {
            return Ok(Some(existing));
        }

        if let Some(limit) = rule.end_after_occurrences {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM counter_instances WHERE task_id = $1")
                .bind(rule.task_id)
                .fetch_one(&mut **tx)
                .await?;
            if count >= i64::from(limit) {
                info!(task_id = %rule.task_id, limit, "counter series reached its occurrence limit");
                return Ok(None);
            }
        }

        let target = i64::from(rule.occurrences_per_period.unwrap_or(1));
        let inserted: Option<CounterInstance> = sqlx::query_as(
            r#"INSERT INTO counter_instances (id, task_id, period_start, scheduled_at, actions_target, actions_left, created_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            ON CONFLICT (task_id, scheduled_at) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rule.task_id)
        .bind(period.start)
        .bind(period.deadline)
        .bind(target)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        match inserted {
            Some(counter) => {
                info!(
                    task_id = %rule.task_id,
                    deadline = %counter.scheduled_at,
                    actions = counter.actions_target,
                    "created counter"
                );
                Ok(Some(counter))
            }
            None => Self::find_counter_for_deadline(&mut *tx, rule.task_id, period.deadline).await,
        }
    }

    async fn find_counter_for_deadline<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
        deadline: DateTime<Utc>,
    ) -> Result<Option<CounterInstance>, CoreError> {
        let counter = sqlx::query_as("SELECT * FROM counter_instances WHERE task_id = $1 AND scheduled_at = $2")
            .bind(task_id)
            .bind(deadline)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(counter)
    }

    async fn find_counter_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<Option<CounterInstance>, CoreError> {
        let counter = sqlx::query_as("SELECT * FROM counter_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(counter)
    }
}
