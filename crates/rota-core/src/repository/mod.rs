use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    Category, CommandResult, CompletionResult, CounterActionResult, CounterInstance, CreatedTask,
    ForecastInstance, InstanceCommand, InstanceView, MissedDeadline, NewTaskData, RecurrenceRule,
    RecurringTask, SchedulerConfig, SweepSummary, Task, TaskInstance,
};
use crate::query::{Query, QueryContext};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

// Re-export domain modules
pub mod categories;
pub mod counters;
pub mod forecast;
pub mod instances;
pub mod query_builder;
pub mod sweep;
pub mod tasks;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for task operations
#[async_trait]
pub trait TaskRepository {
    /// Stores a task (and its rule) and materializes its first occurrence in one transaction.
    async fn add_task(&self, data: NewTaskData, now: DateTime<Utc>) -> Result<CreatedTask, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_rule_for_task(&self, task_id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_recurring_tasks(&self, user_id: Uuid) -> Result<Vec<RecurringTask>, CoreError>;
}

/// Domain-specific trait for single-occurrence instances
#[async_trait]
pub trait InstanceRepository {
    /// Materializes the next occurrence of a recurring task.
    ///
    /// Returns `None` when the series has no further occurrence.
    async fn generate_next(&self, task_id: Uuid, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CoreError>;
    async fn complete_instance(&self, id: Uuid, now: DateTime<Utc>) -> Result<CompletionResult, CoreError>;
    async fn fail_instance(
        &self,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TaskInstance, CoreError>;
    async fn apply_command(&self, command: InstanceCommand, now: DateTime<Utc>) -> Result<CommandResult, CoreError>;
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError>;
    /// Instances and counters of `user_id` whose id starts with `prefix` (hex, dashes ignored).
    async fn find_instances_by_short_id_prefix(
        &self,
        user_id: Uuid,
        prefix: &str,
    ) -> Result<Vec<InstanceView>, CoreError>;
    /// Sweeps, then lists stored occurrences matching `query`.
    async fn list_instances(
        &self,
        user_id: Uuid,
        query: Option<&Query>,
        now: DateTime<Utc>,
    ) -> Result<Vec<InstanceView>, CoreError>;
}

/// Domain-specific trait for "N times per period" counters
#[async_trait]
pub trait CounterRepository {
    /// Returns the deadline of the open counter for the current period, creating it if needed.
    async fn generate_counter(&self, task_id: Uuid, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CoreError>;
    async fn record_counter_action(&self, counter_id: Uuid, now: DateTime<Utc>) -> Result<CounterActionResult, CoreError>;
    async fn find_open_counter(&self, task_id: Uuid) -> Result<Option<CounterInstance>, CoreError>;
    async fn find_counter_by_id(&self, id: Uuid) -> Result<Option<CounterInstance>, CoreError>;
}

/// Domain-specific trait for deadline handling
#[async_trait]
pub trait SweepRepository {
    async fn sweep(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<SweepSummary, CoreError>;
    async fn sweep_all(&self, now: DateTime<Utc>) -> Result<SweepSummary, CoreError>;
    /// The oldest overdue instance held open for a decision, if any.
    async fn next_missed_deadline(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Option<MissedDeadline>, CoreError>;
}

/// Domain-specific trait for read-only previews
#[async_trait]
pub trait ForecastRepository {
    async fn forecast(
        &self,
        user_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<ForecastInstance>, CoreError>;
    /// Stored occurrences in the range merged with forecast ones, sorted by due time.
    async fn list_with_forecast(
        &self,
        user_id: Uuid,
        query: Option<&Query>,
        range_start: NaiveDate,
        range_end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<InstanceView>, CoreError>;
}

/// Domain-specific trait for category operations
#[async_trait]
pub trait CategoryRepository {
    async fn add_category(&self, user_id: Uuid, name: String, now: DateTime<Utc>) -> Result<Category, CoreError>;
    async fn find_category_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Category>, CoreError>;
    async fn find_categories(&self, user_id: Uuid) -> Result<Vec<Category>, CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository:
    TaskRepository
    + InstanceRepository
    + CounterRepository
    + SweepRepository
    + ForecastRepository
    + CategoryRepository
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    config: SchedulerConfig,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, config: SchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub(crate) fn query_context(&self, now: DateTime<Utc>) -> QueryContext {
        QueryContext::new(now, self.config.timezone)
    }
}

impl Repository for SqliteRepository {}
