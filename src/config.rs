// src/config.rs
use std::{env, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

fn default_fetch_limit() -> usize {
    10
}
fn default_max_publishes() -> u32 {
    1
}
fn default_interval_secs() -> u64 {
    3 * 3600
}
fn default_startup_grace_secs() -> u64 {
    120
}
fn default_poll_secs() -> u64 {
    60
}
fn default_deviation_band() -> f64 {
    0.25
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_secs() -> u64 {
    60
}
fn default_half_open_successes() -> u32 {
    1
}
fn default_state_dir() -> String {
    "state".to_string()
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_health_interval_secs() -> u64 {
    300
}
fn default_webhook_retries() -> u32 {
    3
}
fn default_history_cap() -> usize {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Feed channels to poll, without the leading `@`.
    pub channels: Vec<String>,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_max_publishes")]
    pub max_publishes_per_cycle: u32,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_history_cap")]
    pub history_capacity: usize,
    #[serde(default = "default_health_interval_secs")]
    pub health_check_interval_secs: u64,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub breakers: BreakersConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_startup_grace_secs")]
    pub startup_grace_secs: u64,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_deviation_band")]
    pub deviation_band: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            startup_grace_secs: default_startup_grace_secs(),
            poll_secs: default_poll_secs(),
            deviation_band: default_deviation_band(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakersConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_secs")]
    pub recovery_timeout_secs: u64,
    #[serde(default = "default_half_open_successes")]
    pub half_open_success_threshold: u32,
}

impl Default for BreakersConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_secs(),
            half_open_success_threshold: default_half_open_successes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// "ENV" means: read from TELEGRAM_BOT_TOKEN.
    #[serde(default)]
    pub telegram_bot_token: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub openai_model: Option<String>,
    /// "ENV" means: read from DISCORD_WEBHOOK_URL.
    #[serde(default)]
    pub discord_webhook_url: String,
    #[serde(default = "default_webhook_retries")]
    pub discord_max_retries: u32,
}

impl RelayConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| {
            RelayError::Config(format!("reading {}: {e}", path.as_ref().display()))
        })?;
        let mut cfg: RelayConfig =
            toml::from_str(&data).map_err(|e| RelayError::Config(format!("parsing config: {e}")))?;
        cfg.resolve_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_env(&mut self) -> Result<(), RelayError> {
        resolve_secret(
            &mut self.providers.telegram_bot_token,
            "TELEGRAM_BOT_TOKEN",
        )?;
        resolve_secret(&mut self.providers.openai_api_key, "OPENAI_API_KEY")?;
        resolve_secret(
            &mut self.providers.discord_webhook_url,
            "DISCORD_WEBHOOK_URL",
        )?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.channels.is_empty() {
            return Err(RelayError::Config("no feed channels configured".into()));
        }
        if self.providers.telegram_bot_token.is_empty() {
            return Err(RelayError::Config("telegram bot token missing".into()));
        }
        if self.providers.discord_webhook_url.is_empty() {
            return Err(RelayError::Config("discord webhook url missing".into()));
        }
        if self.max_publishes_per_cycle == 0 {
            return Err(RelayError::Config(
                "max_publishes_per_cycle must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.schedule.deviation_band) {
            return Err(RelayError::Config(
                "schedule.deviation_band must be within 0.0..=1.0".into(),
            ));
        }
        if self.schedule.interval_secs == 0 {
            return Err(RelayError::Config("schedule.interval_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }
}

/// Secrets may be inlined, set to "ENV" to force an env lookup, or left
/// empty to fall back to the env var when present.
fn resolve_secret(slot: &mut String, var: &str) -> Result<(), RelayError> {
    if slot.trim().eq_ignore_ascii_case("env") {
        *slot = env::var(var).map_err(|_| RelayError::Config(format!("missing {var} env var")))?;
    } else if slot.is_empty() {
        if let Ok(v) = env::var(var) {
            *slot = v;
        }
    }
    Ok(())
}
