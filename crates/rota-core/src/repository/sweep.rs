use crate::error::CoreError;
use crate::models::{DeadlinePolicy, InstanceRow, InstanceView, MissedDeadline, RecurrenceRule, RecurrenceRuleRow, SweepSummary};
use crate::repository::instances::OCCURRENCES_SELECT;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{info, warn};
use uuid::Uuid;

#[async_trait]
impl super::SweepRepository for SqliteRepository {
    /// Closes out overdue occurrences and re-arms recurring tasks left without one.
    ///
    /// Under [`DeadlinePolicy::Prompt`] overdue instances of important tasks are
    /// left open for [`next_missed_deadline`](super::SweepRepository::next_missed_deadline);
    /// everything else is cancelled with the configured failure reason.
    async fn sweep(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<SweepSummary, CoreError> {
        let config = self.config();
        let hold_important = config.deadline_policy == DeadlinePolicy::Prompt;
        let mut tx = self.pool().begin().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "UPDATE task_instances SET cancelled = 1, failure_reason = ",
        );
        qb.push_bind(config.default_failure_reason.clone());
        qb.push(" WHERE completed_at IS NULL AND cancelled = 0 AND scheduled_at < ");
        qb.push_bind(now);
        qb.push(" AND task_id IN (SELECT id FROM tasks WHERE user_id = ");
        qb.push_bind(user_id);
        if hold_important {
            qb.push(" AND important = 0");
        }
        qb.push(")");
        let cancelled_instances = qb.build().execute(&mut *tx).await?.rows_affected();

        let expired_counters = sqlx::query(
            r#"UPDATE counter_instances
            SET cancelled_at = $1, failure_reason = $2
            WHERE completed_at IS NULL AND cancelled_at IS NULL AND scheduled_at < $1
              AND task_id IN (SELECT id FROM tasks WHERE user_id = $3)
            "#,
        )
        .bind(now)
        .bind(&config.default_failure_reason)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let held_for_prompt = if hold_important {
            let (held,): (i64,) = sqlx::query_as(
                r#"SELECT COUNT(*) FROM task_instances i
                JOIN tasks t ON t.id = i.task_id
                WHERE t.user_id = $1 AND t.important = 1
                  AND i.completed_at IS NULL AND i.cancelled = 0 AND i.scheduled_at < $2
                "#,
            )
            .bind(user_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            u64::try_from(held).unwrap_or_default()
        } else {
            0
        };

        let idle: Vec<RecurrenceRuleRow> = sqlx::query_as(
            r#"SELECT r.* FROM recurrence_rules r
            JOIN tasks t ON t.id = r.task_id
            WHERE t.user_id = $1
              AND NOT EXISTS (
                SELECT 1 FROM task_instances i
                WHERE i.task_id = r.task_id AND i.completed_at IS NULL AND i.cancelled = 0
              )
              AND NOT EXISTS (
                SELECT 1 FROM counter_instances ci
                WHERE ci.task_id = r.task_id AND ci.completed_at IS NULL AND ci.cancelled_at IS NULL
              )
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut rearmed_series = 0;
        for row in idle {
            let rule = match RecurrenceRule::try_from(row) {
                Ok(rule) => rule,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable recurrence rule");
                    continue;
                }
            };
            // Continues after the series' latest stored occurrence, not from today.
            if Self::generate_next_in_transaction(&mut tx, &rule, config, now)
                .await?
                .is_some()
            {
                rearmed_series += 1;
            }
        }

        tx.commit().await?;

        let summary = SweepSummary {
            cancelled_instances,
            expired_counters,
            held_for_prompt,
            rearmed_series,
        };
        if summary != SweepSummary::default() {
            info!(
                user_id = %user_id,
                cancelled = summary.cancelled_instances,
                expired = summary.expired_counters,
                held = summary.held_for_prompt,
                rearmed = summary.rearmed_series,
                "sweep finished"
            );
        }
        Ok(summary)
    }

    async fn sweep_all(&self, now: DateTime<Utc>) -> Result<SweepSummary, CoreError> {
        let users: Vec<(Uuid,)> = sqlx::query_as("SELECT DISTINCT user_id FROM tasks")
            .fetch_all(self.pool())
            .await?;

        let mut total = SweepSummary::default();
        for (user_id,) in users {
            total += self.sweep(user_id, now).await?;
        }
        Ok(total)
    }

    async fn next_missed_deadline(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Option<MissedDeadline>, CoreError> {
        if self.config().deadline_policy != DeadlinePolicy::Prompt {
            return Ok(None);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(OCCURRENCES_SELECT);
        qb.push_bind(user_id);
        qb.push(" AND o.kind = 'single' AND t.important = 1 AND o.completed_at IS NULL AND o.cancelled = 0");
        qb.push(" AND o.scheduled_at < ");
        qb.push_bind(now);
        qb.push(" ORDER BY o.scheduled_at LIMIT 1");

        let row: Option<InstanceRow> = qb.build_query_as().fetch_optional(self.pool()).await?;
        Ok(row.map(|row| {
            let instance = InstanceView::from(row);
            MissedDeadline {
                overdue_by: now - instance.scheduled_at,
                instance,
            }
        }))
    }
}
