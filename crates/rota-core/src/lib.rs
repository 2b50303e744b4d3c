//! # Rota Core Library
//!
//! Recurrence rules and instance scheduling for a personal task manager.
//!
//! A task carries an optional [`models::RecurrenceRule`]. Rather than expanding
//! the whole series, the scheduler keeps exactly one open occurrence per task:
//! the next one is materialized when the current one is completed, or by the
//! deadline sweep when the series has fallen behind. Rules of the form
//! "N times per period" are tracked with one counter row per period.
//!
//! ## Core Modules
//!
//! - [`recurrence`]: Date predicate, stepping and period logic shared by everything below
//! - [`forecast`]: Read-only projection of future occurrences for calendar previews
//! - [`repository`]: SQLite persistence, generation, completion and sweep
//! - [`models`]: Core data structures and transfer objects
//! - [`payload`]: Structured task input with validation
//! - [`query`]: Listing filters
//! - [`timezone`]: Local-time resolution and IANA zone parsing
//! - [`db`]: Database connection and migration management
//! - [`error`]: Error type
//!
//! All operations that depend on the current time take it as a parameter.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use rota_core::{
//!     db,
//!     models::{DaysOfWeek, Frequency, NewRecurrenceRule, NewTaskData, PreferredTime, SchedulerConfig},
//!     repository::{SqliteRepository, TaskRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::establish_connection("rota.db").await?;
//!     let repo = SqliteRepository::new(pool, SchedulerConfig::default());
//!
//!     let mut rule = NewRecurrenceRule::new(Frequency::Weekly);
//!     rule.days_of_week = DaysOfWeek::from_iso([1, 3, 5])?;
//!     rule.preferred_time = Some(PreferredTime::parse("06:00")?);
//!
//!     let created = repo
//!         .add_task(
//!             NewTaskData {
//!                 title: "Gym".to_string(),
//!                 recurrence: Some(rule),
//!                 ..Default::default()
//!             },
//!             Utc::now(),
//!         )
//!         .await?;
//!     println!("First occurrence: {:?}", created.first_occurrence);
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod forecast;
pub mod models;
pub mod payload;
pub mod query;
pub mod recurrence;
pub mod repository;
pub mod timezone;
