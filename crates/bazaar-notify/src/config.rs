//! # Dispatcher Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAZAAR_DATABASE_PATH=/var/lib/bazaar/bazaar.db                     │
//! │     BAZAAR_MAX_ATTEMPTS=5                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/bazaar/notify.toml (Linux)                               │
//! │     ~/Library/Application Support/com.bazaar.bazaar/notify.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./bazaar_dev.db"
//!
//! [dispatch]
//! poll_interval_secs = 5
//! batch_size = 50
//! max_attempts = 3
//! retry_delay_secs = 3
//! cleanup_after_days = 30
//!
//! [mail]
//! from_email = "Bazaar Marketplace <noreply@bazaar.local>"
//! domain = "127.0.0.1:8000"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, NotifyResult};

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./bazaar_dev.db")
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

/// Polling and retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Seconds between outbox polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Entries delivered per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Attempts before an entry is left undelivered for good.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay; the n-th failure waits `n * retry_delay_secs`.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Delivered entries older than this are deleted. 0 keeps them forever.
    #[serde(default = "default_cleanup_after_days")]
    pub cleanup_after_days: u32,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_batch_size() -> u32 {
    50
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    3
}
fn default_cleanup_after_days() -> u32 {
    30
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay(),
            cleanup_after_days: default_cleanup_after_days(),
        }
    }
}

/// Sender identity and the site links point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_from_email() -> String {
    "Bazaar Marketplace <noreply@bazaar.local>".to_string()
}

fn default_domain() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for MailSettings {
    fn default() -> Self {
        MailSettings {
            from_email: default_from_email(),
            domain: default_domain(),
        }
    }
}

// =============================================================================
// NotifyConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub mail: MailSettings,
}

impl NotifyConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (notify.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> NotifyResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading notify config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> NotifyResult<()> {
        if self.dispatch.batch_size == 0 {
            return Err(NotifyError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.dispatch.max_attempts == 0 {
            return Err(NotifyError::InvalidConfig(
                "max_attempts must be greater than 0".into(),
            ));
        }

        if self.dispatch.poll_interval_secs == 0 {
            return Err(NotifyError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if !self.mail.from_email.contains('@') {
            return Err(NotifyError::InvalidConfig(format!(
                "from_email must contain an address, got: {}",
                self.mail.from_email
            )));
        }

        Ok(())
    }

    /// Applies `BAZAAR_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BAZAAR_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        override_number(&lookup, "BAZAAR_POLL_INTERVAL_SECS", &mut self.dispatch.poll_interval_secs);
        override_number(&lookup, "BAZAAR_BATCH_SIZE", &mut self.dispatch.batch_size);
        override_number(&lookup, "BAZAAR_MAX_ATTEMPTS", &mut self.dispatch.max_attempts);
        override_number(&lookup, "BAZAAR_RETRY_DELAY_SECS", &mut self.dispatch.retry_delay_secs);

        if let Some(from) = lookup("BAZAAR_FROM_EMAIL") {
            self.mail.from_email = from;
        }

        if let Some(domain) = lookup("BAZAAR_DOMAIN") {
            self.mail.domain = domain;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bazaar", "bazaar")
            .map(|dirs| dirs.config_dir().join("notify.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch.poll_interval_secs)
    }

    /// Wait before the next try of an entry that has now failed `attempts` times.
    pub fn retry_delay(&self, attempts: i64) -> chrono::Duration {
        let secs = self.dispatch.retry_delay_secs as i64;
        chrono::Duration::seconds(secs.saturating_mul(attempts.max(1)))
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, value = %raw, "Ignoring non-numeric override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NotifyConfig::default();
        assert_eq!(config.dispatch.max_attempts, 3);
        assert_eq!(config.dispatch.retry_delay_secs, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: NotifyConfig = toml::from_str(
            r#"
            [dispatch]
            batch_size = 10

            [mail]
            domain = "bazaar.example"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.batch_size, 10);
        assert_eq!(config.dispatch.max_attempts, 3);
        assert_eq!(config.mail.domain, "bazaar.example");
        assert_eq!(config.database.path, PathBuf::from("./bazaar_dev.db"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = NotifyConfig::default();
        config.apply_overrides(env(&[
            ("BAZAAR_DATABASE_PATH", "/tmp/b.db"),
            ("BAZAAR_MAX_ATTEMPTS", "7"),
            ("BAZAAR_BATCH_SIZE", "lots"),
            ("BAZAAR_FROM_EMAIL", "orders@bazaar.example"),
        ]));

        assert_eq!(config.database.path, PathBuf::from("/tmp/b.db"));
        assert_eq!(config.dispatch.max_attempts, 7);
        // unparseable value ignored
        assert_eq!(config.dispatch.batch_size, 50);
        assert_eq!(config.mail.from_email, "orders@bazaar.example");
    }

    #[test]
    fn test_config_validation() {
        let mut config = NotifyConfig::default();

        config.dispatch.batch_size = 0;
        assert!(config.validate().is_err());
        config.dispatch.batch_size = 1;

        config.dispatch.max_attempts = 0;
        assert!(config.validate().is_err());
        config.dispatch.max_attempts = 1;

        config.mail.from_email = "foodOnline Marketplace".to_string();
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let path = std::env::temp_dir().join(format!("notify-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[dispatch]\nretry_delay_secs = 9\n").unwrap();

        let config = NotifyConfig::load(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.dispatch.retry_delay_secs, 9);
    }

    #[test]
    fn test_retry_delay_grows_with_attempts() {
        let config = NotifyConfig::default();
        assert_eq!(config.retry_delay(1).num_seconds(), 3);
        assert_eq!(config.retry_delay(2).num_seconds(), 6);
        assert_eq!(config.retry_delay(0).num_seconds(), 3);
    }
}
