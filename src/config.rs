//! Configuration loading and management.
//!
//! Resolution order: explicit `--config` path, `./dashboard.yaml`,
//! `~/.schedule-dashboard/config.yaml`, then built-in defaults. Environment
//! variables are applied on top of whichever file was used.
//!
//! ## Environment Variables
//! - `PORT` - Listen port
//! - `BASIC_USER` / `BASIC_PASS` - Dashboard credentials
//! - `DASHBOARD_TASKS_PATH` - Task store JSON file
//! - `DASHBOARD_PUBLIC_DIR` - Static files directory

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::export::DEFAULT_EXPORT_SLUG;
use crate::schedule::years::YearBuckets;
use crate::types::ValidationPolicy;

/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = "dashboard.yaml";

/// Dashboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the task store JSON file.
    #[serde(default = "default_tasks_path")]
    pub tasks_path: PathBuf,

    /// Directory served as static files.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Realm announced in the Basic authentication challenge.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Reload the task store when the file changes.
    #[serde(default = "default_true")]
    pub watch: bool,

    /// Debounce window for store reloads, in milliseconds.
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            tasks_path: default_tasks_path(),
            public_dir: default_public_dir(),
            realm: default_realm(),
            watch: true,
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_tasks_path() -> PathBuf {
    PathBuf::from("tasks.json")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_realm() -> String {
    "Westmere Factory Development Dashboard".to_string()
}

fn default_true() -> bool {
    true
}

fn default_watch_debounce_ms() -> u64 {
    500
}

/// Basic authentication credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_username() -> String {
    "westmere".to_string()
}

fn default_password() -> String {
    "sfc-vietnam-2025".to_string()
}

/// Client-side session settings (refresh cadence, fetch retry policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Extra fetch attempts before falling back to placeholder data.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            fetch_retries: default_fetch_retries(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_multiplier: default_retry_multiplier(),
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

fn default_refresh_interval() -> u64 {
    300 // 5 minutes
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_retry_initial_ms() -> u64 {
    1000
}

fn default_retry_jitter_ms() -> u64 {
    250
}

fn default_retry_max_ms() -> u64 {
    8000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

/// Schedule interpretation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Clamp out-of-range progress instead of rejecting the store.
    #[serde(default)]
    pub clamp_progress: bool,

    /// Calendar year to display bucket.
    #[serde(default)]
    pub year_buckets: YearBuckets,

    /// File-name stem for CSV exports.
    #[serde(default = "default_export_slug")]
    pub export_slug: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            clamp_progress: false,
            year_buckets: YearBuckets::default(),
            export_slug: default_export_slug(),
        }
    }
}

impl ScheduleConfig {
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            clamp_progress: self.clamp_progress,
        }
    }
}

fn default_export_slug() -> String {
    DEFAULT_EXPORT_SLUG.to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load from the explicit path (which must exist), or from the default
    /// locations, then apply environment overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::discover(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn discover() -> Self {
        let user_config = dirs::home_dir().map(|h| h.join(".schedule-dashboard/config.yaml"));
        let candidates = std::iter::once(PathBuf::from(PROJECT_CONFIG_FILE)).chain(user_config);

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => warn!("Ignoring config {}: {:#}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value {:?}", port),
            }
        }
        if let Some(user) = lookup("BASIC_USER").filter(|v| !v.is_empty()) {
            self.auth.username = user;
        }
        if let Some(pass) = lookup("BASIC_PASS").filter(|v| !v.is_empty()) {
            self.auth.password = pass;
        }
        if let Some(path) = lookup("DASHBOARD_TASKS_PATH") {
            self.server.tasks_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("DASHBOARD_PUBLIC_DIR") {
            self.server.public_dir = PathBuf::from(dir);
        }
    }
}
