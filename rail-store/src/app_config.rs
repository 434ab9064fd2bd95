use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub reservations: ReservationRules,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a `url` the service runs on the in-process store.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: default_max_connections() }
    }
}

fn default_max_connections() -> u32 { 10 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    /// Unpaid orders older than this are cancelled by the reaper.
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_minutes: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            pending_ttl_minutes: default_pending_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_pending_ttl() -> i64 { 15 }
fn default_sweep_interval() -> u64 { 60 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_seconds: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_seconds: default_reset_timeout(),
        }
    }
}

fn default_failure_threshold() -> u32 { 5 }
fn default_reset_timeout() -> u64 { 30 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `RAIL__SERVER__PORT=8080` sets `server.port`
            .add_source(config::Environment::with_prefix("RAIL").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would stop the reaper or make it cancel every
    /// fresh order.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.reservations.sweep_interval_seconds < 1 {
            return Err(config::ConfigError::Message(
                "reservations.sweep_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.reservations.pending_ttl_minutes < 1 {
            return Err(config::ConfigError::Message(
                "reservations.pending_ttl_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_overrides(overrides: &[(&str, i64)]) -> Config {
        let mut builder = config::Config::builder()
            .set_override("server.port", 3000)
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let cfg = with_overrides(&[]);

        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.reservations.pending_ttl_minutes, 15);
        assert_eq!(cfg.reservations.sweep_interval_seconds, 60);
        assert!(!cfg.seed.enabled);
        assert_eq!(cfg.payments.failure_threshold, 5);
    }

    #[test]
    fn test_reaper_settings_are_validated() {
        assert!(with_overrides(&[]).validate().is_ok());

        let zero_interval = with_overrides(&[("reservations.sweep_interval_seconds", 0)]);
        assert!(matches!(zero_interval.validate(), Err(config::ConfigError::Message(_))));

        let negative_ttl = with_overrides(&[("reservations.pending_ttl_minutes", -5)]);
        assert!(negative_ttl.validate().is_err());

        let zero_ttl = with_overrides(&[("reservations.pending_ttl_minutes", 0)]);
        assert!(zero_ttl.validate().is_err());
    }
}
