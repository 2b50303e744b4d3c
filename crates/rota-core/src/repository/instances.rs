use crate::error::CoreError;
use crate::models::{
    CommandResult, CompletionResult, CounterInstance, InstanceCommand, InstanceRow, InstanceView, Outcome,
    RecurrenceRule, SchedulerConfig, TaskInstance,
};
use crate::query::Query;
use crate::recurrence::RecurrenceManager;
use crate::timezone::local_date;
use crate::repository::query_builder::SqlQueryBuilder;
use crate::repository::{SqliteRepository, SweepRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stored occurrences of both kinds, joined with task and category fields.
/// Callers append conditions after the `WHERE t.user_id = ?` clause.
pub(crate) const OCCURRENCES_SELECT: &str = r#"WITH occurrences AS (
        SELECT i.id, 'single' AS kind, i.task_id, i.scheduled_at, i.time_specified, i.completed_at,
            i.cancelled, i.failure_reason, NULL AS actions_left, NULL AS actions_target
        FROM task_instances i
        UNION ALL
        SELECT ci.id, 'counter' AS kind, ci.task_id, ci.scheduled_at, 0 AS time_specified, ci.completed_at,
            CASE WHEN ci.cancelled_at IS NULL THEN 0 ELSE 1 END AS cancelled, ci.failure_reason,
            ci.actions_left, ci.actions_target
        FROM counter_instances ci
    )
    SELECT o.id, o.kind, o.task_id, t.title, c.name AS category_name, t.important, o.scheduled_at,
        o.time_specified, o.completed_at, o.cancelled, o.failure_reason, o.actions_left, o.actions_target
    FROM occurrences o
    JOIN tasks t ON t.id = o.task_id
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE t.user_id = "#;

#[async_trait]
impl super::InstanceRepository for SqliteRepository {
    async fn generate_next(&self, task_id: Uuid, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CoreError> {
        let mut tx = self.pool().begin().await?;

        let rule = Self::find_rule_in_transaction(&mut tx, task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence rule for task {}", task_id)))?;
        let next = Self::generate_next_in_transaction(&mut tx, &rule, self.config(), now).await?;

        tx.commit().await?;
        Ok(next.map(|n| n.scheduled_at()))
    }

    async fn complete_instance(&self, id: Uuid, now: DateTime<Utc>) -> Result<CompletionResult, CoreError> {
        let mut tx = self.pool().begin().await?;

        let completed: Option<TaskInstance> = sqlx::query_as(
            r#"UPDATE task_instances
            SET completed_at = $1
            WHERE id = $2 AND completed_at IS NULL AND cancelled = 0
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(completed) = completed else {
            return Err(Self::unmatched_instance_error(&mut tx, id).await?);
        };

        let result = match Self::find_rule_in_transaction(&mut tx, completed.task_id).await? {
            Some(rule) => {
                // The next occurrence is produced in the same transaction as the completion.
                let next = Self::generate_next_in_transaction(&mut tx, &rule, self.config(), now)
                    .await?
                    .and_then(NextOccurrence::into_instance);
                info!(
                    instance_id = %completed.id,
                    next = ?next.as_ref().map(|n| n.scheduled_at),
                    "completed recurring instance"
                );
                CompletionResult::Recurring { completed, next }
            }
            None => {
                info!(instance_id = %completed.id, "completed instance");
                CompletionResult::Single(completed)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    async fn fail_instance(
        &self,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TaskInstance, CoreError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.config().default_failure_reason.clone());

        let mut tx = self.pool().begin().await?;
        let failed: Option<TaskInstance> = sqlx::query_as(
            r#"UPDATE task_instances
            SET cancelled = 1, failure_reason = $1
            WHERE id = $2 AND completed_at IS NULL AND cancelled = 0
            RETURNING *
            "#,
        )
        .bind(&reason)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(failed) = failed else {
            return Err(Self::unmatched_instance_error(&mut tx, id).await?);
        };
        tx.commit().await?;

        info!(instance_id = %failed.id, reason = %reason, at = %now, "instance failed");
        Ok(failed)
    }

    async fn apply_command(&self, command: InstanceCommand, now: DateTime<Utc>) -> Result<CommandResult, CoreError> {
        match command.outcome {
            Outcome::Completed => Ok(CommandResult::Completed(
                self.complete_instance(command.instance_id, now).await?,
            )),
            Outcome::Failed => Ok(CommandResult::Failed(
                self.fail_instance(command.instance_id, command.failure_reason, now).await?,
            )),
        }
    }

    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        let instance = sqlx::query_as("SELECT * FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(instance)
    }

    async fn find_instances_by_short_id_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
    ) -> Result<Vec<InstanceView>, CoreError> {
        let mut pattern: String = prefix
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if pattern.is_empty() || !pattern.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidInput(format!("'{}' is not an id prefix", prefix)));
        }
        pattern.push('%');

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(OCCURRENCES_SELECT);
        qb.push_bind(user_id);
        qb.push(" AND lower(hex(o.id)) LIKE ");
        qb.push_bind(pattern);
        qb.push(" ORDER BY o.scheduled_at");

        let rows: Vec<InstanceRow> = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(rows.into_iter().map(InstanceView::from).collect())
    }

    async fn list_instances(
        &self,
        user_id: Uuid,
        query: Option<&Query>,
        now: DateTime<Utc>,
    ) -> Result<Vec<InstanceView>, CoreError> {
        // Listing is one of the triggers for the deadline sweep.
        self.sweep(user_id, now).await?;

        let ctx = self.query_context(now);
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(OCCURRENCES_SELECT);
        qb.push_bind(user_id);
        if let Some(query) = query {
            qb.push(" AND (");
            SqlQueryBuilder::build_sql_where_clause(query, &ctx, &mut qb);
            qb.push(")");
        }
        qb.push(" ORDER BY o.scheduled_at, t.title");

        let rows: Vec<InstanceRow> = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(rows.into_iter().map(InstanceView::from).collect())
    }
}

/// What the generator stored for a series.
#[derive(Debug)]
pub(crate) enum NextOccurrence {
    Instance(TaskInstance),
    Counter(CounterInstance),
}

impl NextOccurrence {
    pub(crate) fn scheduled_at(&self) -> DateTime<Utc> {
        match self {
            NextOccurrence::Instance(instance) => instance.scheduled_at,
            NextOccurrence::Counter(counter) => counter.scheduled_at,
        }
    }

    pub(crate) fn into_instance(self) -> Option<TaskInstance> {
        match self {
            NextOccurrence::Instance(instance) => Some(instance),
            NextOccurrence::Counter(_) => None,
        }
    }
}

impl SqliteRepository {
    /// Produces the next occurrence for a rule: a dated instance, or the
    /// current period's counter in counter mode.
    ///
    /// Task creation, completion, `generate_next` and the sweep's re-arm all
    /// come through here.
    pub(crate) async fn generate_next_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<NextOccurrence>, CoreError> {
        if rule.is_counter_mode() {
            let counter = Self::generate_counter_in_transaction(tx, rule, config, now).await?;
            return Ok(counter.map(NextOccurrence::Counter));
        }

        let instance = Self::materialize_next_in_transaction(tx, rule, config, now).await?;
        Ok(instance.map(NextOccurrence::Instance))
    }

    /// Walks the rule's candidates and inserts the first one not already stored.
    ///
    /// A series with stored instances continues after the latest of them,
    /// keeping its phase; a new series starts from `now`.
    async fn materialize_next_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskInstance>, CoreError> {
        if let Some(limit) = rule.end_after_occurrences {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_instances WHERE task_id = $1")
                .bind(rule.task_id)
                .fetch_one(&mut **tx)
                .await?;
            if count >= i64::from(limit) {
                info!(task_id = %rule.task_id, limit, "series reached its occurrence limit");
                return Ok(None);
            }
        }

        let latest = Self::latest_instance_at_in_transaction(&mut *tx, rule.task_id).await?;
        let manager = RecurrenceManager::from_config(rule.clone(), config)?;
        let candidates = match latest {
            Some(latest) => manager.candidates_after(local_date(latest, &config.timezone), now),
            None => manager.candidates(now),
        };

        for candidate in candidates {
            if latest.map_or(false, |latest| candidate.scheduled_at <= latest) {
                continue;
            }

            let inserted = Self::insert_instance_in_transaction(
                &mut *tx,
                rule.task_id,
                candidate.scheduled_at,
                candidate.time_specified,
                now,
            )
            .await?;

            match inserted {
                Some(instance) => {
                    info!(task_id = %rule.task_id, scheduled_at = %instance.scheduled_at, "materialized instance");
                    return Ok(Some(instance));
                }
                None => debug!(
                    task_id = %rule.task_id,
                    scheduled_at = %candidate.scheduled_at,
                    "candidate already materialized"
                ),
            }
        }

        warn!(task_id = %rule.task_id, max_steps = config.max_steps, "no further occurrence found");
        Ok(None)
    }

    async fn latest_instance_at_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let latest: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT scheduled_at FROM task_instances WHERE task_id = $1 ORDER BY scheduled_at DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(latest.map(|(at,)| at))
    }

    /// Explains why a guarded update matched no row: the instance is closed or does not exist.
    async fn unmatched_instance_error<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<CoreError, CoreError> {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(match existing {
            Some(_) => CoreError::InstanceClosed(id),
            None => CoreError::NotFound(format!("Instance {}", id)),
        })
    }
}
