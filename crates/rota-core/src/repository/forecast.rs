use crate::error::CoreError;
use crate::forecast::ForecastProjector;
use crate::models::{ForecastInstance, InstanceView};
use crate::query::Query;
use crate::repository::{InstanceRepository, SqliteRepository, TaskRepository};
use crate::timezone::local_date;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::ForecastRepository for SqliteRepository {
    async fn forecast(
        &self,
        user_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<ForecastInstance>, CoreError> {
        if range_end < range_start {
            return Err(CoreError::InvalidInput(format!(
                "Forecast range ends ({}) before it starts ({})",
                range_end, range_start
            )));
        }

        let tasks = self.find_recurring_tasks(user_id).await?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let ctx = self.query_context(now);
        let (window_start, _) = ctx.day_bounds(range_start);
        let (_, window_end) = ctx.day_bounds(range_end);

        let existing: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT o.task_id, o.scheduled_at FROM (
                SELECT task_id, scheduled_at FROM task_instances
                UNION ALL
                SELECT task_id, scheduled_at FROM counter_instances
            ) o
            JOIN tasks t ON t.id = o.task_id
            WHERE t.user_id = $1 AND o.scheduled_at >= $2 AND o.scheduled_at < $3
            "#,
        )
        .bind(user_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(self.pool())
        .await?;

        let projected = ForecastProjector::new(self.config()).project(&tasks, range_start, range_end, existing, now);
        debug!(user_id = %user_id, count = projected.len(), "forecast projected");
        Ok(projected)
    }

    async fn list_with_forecast(
        &self,
        user_id: Uuid,
        query: Option<&Query>,
        range_start: NaiveDate,
        range_end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<InstanceView>, CoreError> {
        let tz = self.config().timezone;
        let in_range = |view: &InstanceView| {
            let date = local_date(view.scheduled_at, &tz);
            date >= range_start && date <= range_end
        };

        let mut views: Vec<InstanceView> = self
            .list_instances(user_id, query, now)
            .await?
            .into_iter()
            .filter(|view| in_range(view))
            .collect();

        let ctx = self.query_context(now);
        views.extend(
            self.forecast(user_id, range_start, range_end, now)
                .await?
                .into_iter()
                .map(InstanceView::from)
                .filter(|view| query.map_or(true, |q| q.matches(view, &ctx))),
        );

        views.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then_with(|| a.title.cmp(&b.title)));
        Ok(views)
    }
}
