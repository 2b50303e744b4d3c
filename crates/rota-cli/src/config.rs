use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rota_core::error::CoreError;
use rota_core::models::{
    DeadlinePolicy, SchedulerConfig, DEFAULT_FAILURE_REASON, DEFAULT_FORECAST_LIMIT, DEFAULT_MAX_STEPS,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::timezone::{detect_system_timezone, normalize_timezone_input};

pub const CONFIG_FILE: &str = "rota.toml";

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    /// Owner of everything this CLI creates and lists
    pub user_id: Uuid,
    pub default_filters: Vec<String>,
    pub scheduler: SchedulerSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "rota.db".to_string(),
            user_id: Uuid::nil(),
            default_filters: vec![],
            scheduler: SchedulerSection::default(),
        }
    }
}

/// `[scheduler]` section of `rota.toml`
#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct SchedulerSection {
    /// IANA zone; the system zone when absent
    pub timezone: Option<String>,
    pub deadline_policy: DeadlinePolicy,
    pub default_failure_reason: String,
    pub forecast_limit: usize,
    pub max_steps: u32,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            timezone: None,
            deadline_policy: DeadlinePolicy::default(),
            default_failure_reason: DEFAULT_FAILURE_REASON.to_string(),
            forecast_limit: DEFAULT_FORECAST_LIMIT,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Config {
    /// Loads `rota.toml`, then `ROTA_`-prefixed environment variables.
    /// Nested keys use a double underscore: `ROTA_SCHEDULER__TIMEZONE`.
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("ROTA_").split("__"))
            .extract()
    }

    pub fn timezone(&self) -> Result<Tz, CoreError> {
        match &self.scheduler.timezone {
            Some(tz) => normalize_timezone_input(tz),
            None => normalize_timezone_input(&detect_system_timezone()),
        }
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, CoreError> {
        if self.scheduler.max_steps == 0 {
            return Err(CoreError::validation("max_steps", "must be at least 1"));
        }
        Ok(SchedulerConfig {
            timezone: self.timezone()?,
            max_steps: self.scheduler.max_steps,
            forecast_limit: self.scheduler.forecast_limit,
            deadline_policy: self.scheduler.deadline_policy,
            default_failure_reason: self.scheduler.default_failure_reason.clone(),
        })
    }
}
