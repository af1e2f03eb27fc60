//! Configuration loading, validation, and management for the intake desk.
//!
//! Loads configuration from `~/.intake/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.intake/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix of synthesized application request ids
    #[serde(default = "default_request_id_prefix")]
    pub request_id_prefix: String,

    /// Front-line rate gate
    #[serde(default)]
    pub gate: GateConfig,

    /// Input validation rules for data-entry states
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Session lifetime settings
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Application types offered in the type menu
    #[serde(default = "default_application_types")]
    pub application_types: Vec<ApplicationTypeConfig>,

    /// Local CLI identity
    #[serde(default)]
    pub cli: CliConfig,

    /// Telegram transport
    #[serde(default)]
    pub telegram: TelegramSettings,
}

fn default_request_id_prefix() -> String {
    "REQ".into()
}

fn default_application_types() -> Vec<ApplicationTypeConfig> {
    [
        ("consultation", "Consultation"),
        ("installation", "Installation"),
        ("repair", "Repair"),
        ("maintenance", "Maintenance"),
    ]
    .into_iter()
    .map(|(code, label)| ApplicationTypeConfig {
        code: code.into(),
        label: label.into(),
    })
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum spacing between two admitted events from one actor
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Warning count at which the hard lockout message replaces the soft wait
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,
}

fn default_cooldown_ms() -> u64 {
    1500
}
fn default_lockout_threshold() -> u32 {
    5
}

impl GateConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            lockout_threshold: default_lockout_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum raw length of a phone entry, before normalization
    #[serde(default = "default_phone_min_len")]
    pub phone_min_len: usize,

    /// Country calling code (digits only) a normalized phone must carry.
    /// Empty accepts any `+` prefixed international number.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Upper bound on digits in a normalized phone
    #[serde(default = "default_phone_max_digits")]
    pub phone_max_digits: usize,

    #[serde(default = "default_name_min_len")]
    pub name_min_len: usize,

    #[serde(default = "default_new_client_name_min_len")]
    pub new_client_name_min_len: usize,

    #[serde(default = "default_details_min_len")]
    pub details_min_len: usize,

    #[serde(default = "default_details_max_len")]
    pub details_max_len: usize,
}

fn default_phone_min_len() -> usize {
    10
}
fn default_country_code() -> String {
    "998".into()
}
fn default_phone_max_digits() -> usize {
    15
}
fn default_name_min_len() -> usize {
    2
}
fn default_new_client_name_min_len() -> usize {
    3
}
fn default_details_min_len() -> usize {
    5
}
fn default_details_max_len() -> usize {
    1000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            phone_min_len: default_phone_min_len(),
            country_code: default_country_code(),
            phone_max_digits: default_phone_max_digits(),
            name_min_len: default_name_min_len(),
            new_client_name_min_len: default_new_client_name_min_len(),
            details_min_len: default_details_min_len(),
            details_max_len: default_details_max_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Reset sessions idle longer than this. 0 disables the sweep.
    #[serde(default)]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 0,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// One entry of the application type menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTypeConfig {
    /// Stable code, sent back as `type:<code>`
    pub code: String,
    /// Label shown on the button
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Actor id used for the local CLI session
    #[serde(default = "default_cli_actor_id")]
    pub actor_id: i64,

    #[serde(default = "default_cli_actor_name")]
    pub actor_name: String,
}

fn default_cli_actor_id() -> i64 {
    1
}
fn default_cli_actor_name() -> String {
    "Local operator".into()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            actor_id: default_cli_actor_id(),
            actor_name: default_cli_actor_name(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("enabled", &self.enabled)
            .field(
                "bot_token",
                &match self.bot_token {
                    Some(_) => "[REDACTED]",
                    None => "None",
                },
            )
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.intake/config.toml).
    ///
    /// Environment overrides:
    /// - `INTAKE_GATE_COOLDOWN_MS`
    /// - `INTAKE_TELEGRAM_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(raw) = std::env::var("INTAKE_GATE_COOLDOWN_MS") {
            config.gate.cooldown_ms = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "INTAKE_GATE_COOLDOWN_MS must be an integer, got '{raw}'"
                ))
            })?;
        }

        if config.telegram.bot_token.is_none() {
            config.telegram.bot_token = std::env::var("INTAKE_TELEGRAM_TOKEN").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".intake")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate.cooldown_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gate.cooldown_ms must be > 0".into(),
            ));
        }

        if self.gate.lockout_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "gate.lockout_threshold must be > 0".into(),
            ));
        }

        if self.request_id_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "request_id_prefix must not be empty".into(),
            ));
        }

        let v = &self.validation;
        if v.phone_min_len == 0 || v.name_min_len == 0 || v.new_client_name_min_len == 0 {
            return Err(ConfigError::ValidationError(
                "validation minimum lengths must be > 0".into(),
            ));
        }
        if v.details_min_len > v.details_max_len {
            return Err(ConfigError::ValidationError(format!(
                "validation.details_min_len ({}) exceeds details_max_len ({})",
                v.details_min_len, v.details_max_len
            )));
        }
        if !v.country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::ValidationError(format!(
                "validation.country_code must be digits only, got '{}'",
                v.country_code
            )));
        }

        if self.application_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one application type is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for ty in &self.application_types {
            if ty.code.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "application type code must not be empty".into(),
                ));
            }
            if !seen.insert(ty.code.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate application type code '{}'",
                    ty.code
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            request_id_prefix: default_request_id_prefix(),
            gate: GateConfig::default(),
            validation: ValidationConfig::default(),
            sessions: SessionConfig::default(),
            application_types: default_application_types(),
            cli: CliConfig::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
