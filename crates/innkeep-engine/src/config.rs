//! # Hotel Configuration
//!
//! Loaded once at startup, then shared read-only behind an `Arc`.
//!
//! ## Load Order (later wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. HotelConfig::default()                                             │
//! │       │                                                                 │
//! │  2. innkeep.toml  (--config path, else ProjectDirs config dir)         │
//! │       │                                                                 │
//! │  3. system_settings rows  (with_settings, once the DB is open)         │
//! │       │                                                                 │
//! │  4. INNKEEP_* environment variables                                    │
//! │       │                                                                 │
//! │  5. validate()                                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! [deposit]
//! percent = 30
//!
//! [bank]
//! bank_id = "VCB"
//! account_no = "0123456789"
//! account_name = "KHACH SAN AN BINH"
//!
//! [scheduler]
//! interval_secs = 60
//! auto_confirm_grace_minutes = 10
//! batch_size = 50
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use innkeep_core::pricing::PricingPolicy;
use innkeep_core::qr::BankAccount;
use innkeep_core::validation::validate_percent;
use innkeep_core::ValidationError;

/// Environment variable prefix. `INNKEEP_DEPOSIT_PERCENT` overrides the
/// `deposit_percent` setting, and so on.
pub const ENV_PREFIX: &str = "INNKEEP_";

/// Keys accepted from `system_settings` and the environment.
pub const SETTING_KEYS: &[&str] = &[
    "deposit_percent",
    "hourly_rate_percent",
    "late_grace_minutes",
    "bank_id",
    "bank_account_no",
    "bank_account_name",
    "session_ttl_secs",
    "auto_confirm_grace_minutes",
    "scheduler_interval_secs",
    "scheduler_batch_size",
];

// =============================================================================
// Errors
// =============================================================================

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidSetting { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Defaults to `innkeep.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSettings {
    /// Share of the projected room charge collected up front.
    #[serde(default = "default_deposit_percent")]
    pub percent: u32,
}

fn default_deposit_percent() -> u32 {
    innkeep_core::DEFAULT_DEPOSIT_PERCENT
}

impl Default for DepositSettings {
    fn default() -> Self {
        DepositSettings {
            percent: default_deposit_percent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Hourly rate as a share of the nightly base price.
    #[serde(default = "default_hourly_rate_percent")]
    pub hourly_rate_percent: u32,

    /// Minutes after scheduled check-out before late penalties start.
    #[serde(default)]
    pub late_grace_minutes: i64,
}

fn default_hourly_rate_percent() -> u32 {
    innkeep_core::DEFAULT_HOURLY_RATE_PERCENT
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            hourly_rate_percent: default_hourly_rate_percent(),
            late_grace_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
}

fn default_session_ttl_secs() -> i64 {
    innkeep_core::PAYMENT_SESSION_TTL_SECS
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// A pending QR booking must be at least this old before the scheduler
    /// confirms it. Read through [`HotelConfig::auto_confirm_grace`].
    #[serde(default = "default_grace_minutes")]
    pub auto_confirm_grace_minutes: i64,

    /// Upper bound on bookings confirmed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_grace_minutes() -> i64 {
    10
}

fn default_batch_size() -> u32 {
    50
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            enabled: true,
            interval_secs: default_interval_secs(),
            auto_confirm_grace_minutes: default_grace_minutes(),
            batch_size: default_batch_size(),
        }
    }
}

// =============================================================================
// HotelConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotelConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub deposit: DepositSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    /// Receiving account for QR deposits. QR deposits fail until it is set.
    #[serde(default)]
    pub bank: BankAccount,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl HotelConfig {
    /// Defaults, then the TOML file (if present), then the environment.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading hotel config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        if !config.bank.is_configured() {
            warn!("Bank account not configured; QR deposits will be refused");
        }

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Layers `system_settings` rows on top, then re-applies the environment
    /// so it keeps the last word.
    pub fn with_settings(mut self, rows: &HashMap<String, String>) -> ConfigResult<Self> {
        for (key, value) in rows {
            if SETTING_KEYS.contains(&key.as_str()) {
                self.apply_setting(key, value)?;
                debug!(key = %key, "Setting applied from database");
            } else {
                debug!(key = %key, "Ignoring unrelated system setting");
            }
        }
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    /// Applies one named setting.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let value = value.trim();
        match key {
            "deposit_percent" => self.deposit.percent = parse(key, value)?,
            "hourly_rate_percent" => self.pricing.hourly_rate_percent = parse(key, value)?,
            "late_grace_minutes" => self.pricing.late_grace_minutes = parse(key, value)?,
            "bank_id" => self.bank.bank_id = value.to_string(),
            "bank_account_no" => self.bank.account_no = value.to_string(),
            "bank_account_name" => self.bank.account_name = value.to_string(),
            "session_ttl_secs" => self.payment.session_ttl_secs = parse(key, value)?,
            "auto_confirm_grace_minutes" => {
                self.scheduler.auto_confirm_grace_minutes = parse(key, value)?
            }
            "scheduler_interval_secs" => self.scheduler.interval_secs = parse(key, value)?,
            "scheduler_batch_size" => self.scheduler.batch_size = parse(key, value)?,
            other => {
                return Err(ConfigError::InvalidSetting {
                    key: other.to_string(),
                    value: value.to_string(),
                })
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(format!("{}DATABASE_PATH", ENV_PREFIX)) {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        for key in SETTING_KEYS {
            let var = format!("{}{}", ENV_PREFIX, key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                match self.apply_setting(key, &value) {
                    Ok(()) => debug!(var = %var, "Overriding setting from environment"),
                    Err(e) => warn!(var = %var, error = %e, "Ignoring invalid environment override"),
                }
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_percent("deposit_percent", self.deposit.percent)?;
        validate_percent("hourly_rate_percent", self.pricing.hourly_rate_percent)?;

        if self.pricing.late_grace_minutes < 0 {
            return Err(ConfigError::Invalid(
                "late_grace_minutes must not be negative".into(),
            ));
        }
        if self.payment.session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "session_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler interval_secs must be greater than 0".into(),
            ));
        }
        if self.scheduler.auto_confirm_grace_minutes < 0 {
            return Err(ConfigError::Invalid(
                "auto_confirm_grace_minutes must not be negative".into(),
            ));
        }
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "scheduler batch_size must be greater than 0".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "innkeep", "innkeep")
            .map(|dirs| dirs.config_dir().join("innkeep.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Configured database path, else the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "innkeep", "innkeep")
                .map(|dirs| dirs.data_dir().join("innkeep.db"))
                .unwrap_or_else(|| PathBuf::from("innkeep.db"))
        })
    }

    pub fn policy(&self) -> PricingPolicy {
        PricingPolicy {
            deposit_percent: self.deposit.percent,
            hourly_rate_percent: self.pricing.hourly_rate_percent,
            late_grace_minutes: self.pricing.late_grace_minutes,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.payment.session_ttl_secs)
    }

    pub fn auto_confirm_grace(&self) -> Duration {
        Duration::minutes(self.scheduler.auto_confirm_grace_minutes)
    }

    pub fn scheduler_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scheduler.interval_secs)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HotelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.deposit.percent, 30);
        assert_eq!(config.session_ttl(), Duration::seconds(300));
        assert_eq!(config.auto_confirm_grace(), Duration::minutes(10));
        assert_eq!(config.scheduler.batch_size, 50);
        assert_eq!(config.scheduler_interval(), std::time::Duration::from_secs(60));
        assert_eq!(config.policy(), PricingPolicy::default());
        assert!(!config.bank.is_configured());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HotelConfig::from_toml(
            r#"
            [deposit]
            percent = 50

            [bank]
            bank_id = "VCB"
            account_no = "0123456789"
            account_name = "KHACH SAN AN BINH"
            "#,
        )
        .unwrap();

        assert_eq!(config.deposit.percent, 50);
        assert!(config.bank.is_configured());
        assert_eq!(config.payment.session_ttl_secs, 300);
        assert_eq!(config.scheduler.interval_secs, 60);
    }

    #[test]
    fn test_settings_rows_override_file() {
        let rows: HashMap<String, String> = [
            ("deposit_percent", "40"),
            ("bank_id", "TCB"),
            ("auto_confirm_grace_minutes", "15"),
            ("site_title", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = HotelConfig::default().with_settings(&rows).unwrap();
        assert_eq!(config.deposit.percent, 40);
        assert_eq!(config.bank.bank_id, "TCB");
        assert_eq!(config.auto_confirm_grace(), Duration::minutes(15));
    }

    #[test]
    fn test_bad_setting_value_is_rejected() {
        let mut config = HotelConfig::default();
        let err = config.apply_setting("deposit_percent", "thirty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));

        config.apply_setting("deposit_percent", "130").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = HotelConfig::default();
        config.payment.session_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = HotelConfig::default();
        config.scheduler.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let mut config = HotelConfig::default();
        config.database.path = Some(PathBuf::from("/var/lib/innkeep/test.db"));
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/innkeep/test.db"));
    }
}
