//! Process-level configuration.
//!
//! Read once at startup from three layers, each overriding the last:
//! built-in defaults, an optional config.toml, then environment
//! variables carrying the CORREGEDORIA_ prefix. Secrets stay in the
//! environment; the file holds tunables that are safe to commit.

use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub security: SecurityConfig,
    pub limits: LimitsConfig,
}

/// Deployment identity shown in page chrome and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub description: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Corregedoria".to_string(),
            description: "Internal affairs case tracking".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Login and session policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Password misses allowed before the account locks.
    pub max_failed_logins: u32,
    /// How long a lock holds, in minutes.
    pub lockout_duration_minutes: u32,
    /// Idle session lifetime, in minutes.
    pub session_timeout_minutes: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lockout_duration_minutes: 15,
            session_timeout_minutes: 1440,
        }
    }
}

/// Row caps for the listing queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_list_rows: u64,
    pub audit_log_rows: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_list_rows: 200,
            audit_log_rows: 100,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Build the layered configuration, reading the TOML file at `path`
    /// if it exists.
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // CORREGEDORIA_SITE_NAME, CORREGEDORIA_SECURITY_MAX_FAILED_LOGINS and so on.
            .add_source(
                Environment::with_prefix("CORREGEDORIA")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Force the lazy load during startup so a bad file surfaces in the logs
/// before the first request needs a value.
pub fn init() {
    let config = APP_CONFIG.read().unwrap();
    log::info!("Configuration loaded: site.name = {}", config.site.name);
}

fn read() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn site() -> SiteConfig {
    read().site
}

pub fn security() -> SecurityConfig {
    read().security
}

pub fn limits() -> LimitsConfig {
    read().limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.name, "Corregedoria");
        assert_eq!(config.security.max_failed_logins, 5);
        assert_eq!(config.security.session_timeout_minutes, 1440);
        assert_eq!(config.limits.max_list_rows, 200);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Tracker"
description = "A test deployment"
base_url = "https://test.example.com"

[security]
max_failed_logins = 10
lockout_duration_minutes = 30

[limits]
max_list_rows = 50
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Tracker");
        assert_eq!(config.site.base_url, "https://test.example.com");
        assert_eq!(config.security.max_failed_logins, 10);
        assert_eq!(config.security.lockout_duration_minutes, 30);
        assert_eq!(config.limits.max_list_rows, 50);
        // Layers the file leaves out fall back to the defaults.
        assert_eq!(config.security.session_timeout_minutes, 1440);
        assert_eq!(config.limits.audit_log_rows, 100);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Corregedoria");
        assert_eq!(config.security.max_failed_logins, 5);
    }
}
