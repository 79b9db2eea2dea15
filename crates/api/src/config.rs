//! Dashboard configuration
//!
//! Loaded from an optional TOML file and `BELIMO__*` environment variables,
//! e.g. `BELIMO__LISTEN_ADDR=127.0.0.1:9000`. Scalar keys and nested tables
//! (`BELIMO__RATE_LIMIT__BURST_SIZE=3`) can be overridden from the
//! environment; the `actuators` list is a list of tables and is only read
//! from the file.

use crate::error::ApiError;
use crate::rate_limit::RateLimitConfig;
use belimo_protocol::ActuatorEndpoint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Longest accepted live window (one day)
pub const MAX_LIVE_WINDOW_SECS: u64 = 86_400;

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// HTTP listen address
    pub listen_addr: String,
    /// Monitored actuators
    pub actuators: Vec<ActuatorEndpoint>,
    /// Pause between polling cycles
    pub poll_interval_ms: u64,
    /// Timeout of each Modbus step
    pub request_timeout_ms: u64,
    /// Failures before an actuator is reported unhealthy
    pub max_consecutive_failures: u32,
    /// Span of the live view, measured back from the newest reading
    pub live_window_secs: u64,
    /// Retention bound of the reading log
    pub max_records: usize,
    /// Retained alarm transitions
    pub alarm_history: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Rate limit of valve write commands
    pub rate_limit: RateLimitConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            actuators: vec![ActuatorEndpoint::new("192.168.0.11")],
            poll_interval_ms: 2000,
            request_timeout_ms: 3000,
            max_consecutive_failures: 3,
            live_window_secs: 10,
            max_records: storage::DEFAULT_MAX_RECORDS,
            alarm_history: 1000,
            log_level: "info".to_string(),
            log_json: false,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from `path` (if given) and the environment
    pub fn load(path: Option<&str>) -> Result<Self, ApiError> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit set of environment variables instead of the
    /// process environment
    fn load_with_env(
        path: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ApiError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("BELIMO")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let loaded: Self = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ApiError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations the dashboard cannot run with
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.actuators.is_empty() {
            return Err(ApiError::Config("at least one actuator is required".into()));
        }

        let mut seen = HashSet::new();
        for actuator in &self.actuators {
            if !seen.insert(actuator.ip.as_str()) {
                return Err(ApiError::Config(format!(
                    "actuator {} configured twice",
                    actuator.ip
                )));
            }
        }

        if self.poll_interval_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ApiError::Config(
                "poll_interval_ms and request_timeout_ms must be positive".into(),
            ));
        }
        if self.live_window_secs == 0 || self.live_window_secs > MAX_LIVE_WINDOW_SECS {
            return Err(ApiError::Config(format!(
                "live_window_secs must be between 1 and {}",
                MAX_LIVE_WINDOW_SECS
            )));
        }
        if self.max_records == 0 {
            return Err(ApiError::Config("max_records must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.actuators.len(), 1);
        assert_eq!(config.actuators[0].ip, "192.168.0.11");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.live_window_secs, 10);
        assert_eq!(config.max_records, 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_actuator_rejected() {
        let config = DashboardConfig {
            actuators: vec![
                ActuatorEndpoint::new("10.0.0.1"),
                ActuatorEndpoint::new("10.0.0.1"),
            ],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));
    }

    #[test]
    fn test_live_window_bounds() {
        let config = DashboardConfig {
            live_window_secs: 10_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));

        let config = DashboardConfig {
            live_window_secs: MAX_LIVE_WINDOW_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_actuators_rejected() {
        let config = DashboardConfig {
            actuators: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("belimo-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "127.0.0.1:9000"
poll_interval_ms = 500

[[actuators]]
ip = "10.0.0.5"
port = 1502

[[actuators]]
ip = "10.0.0.6"

[rate_limit]
per_second = 1
burst_size = 3
"#,
        )
        .unwrap();

        let config = DashboardConfig::load(path.to_str()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.actuators.len(), 2);
        assert_eq!(config.actuators[0].port, 1502);
        assert_eq!(config.actuators[1].port, 502);
        assert_eq!(config.actuators[1].unit_id, 1);
        assert_eq!(config.rate_limit.burst_size, 3);
        assert_eq!(config.request_timeout_ms, 3000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = std::env::temp_dir().join(format!("belimo-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard.toml");
        std::fs::write(
            &path,
            r#"
poll_interval_ms = 500

[[actuators]]
ip = "10.0.0.5"
"#,
        )
        .unwrap();

        let env = config::Map::from([
            ("BELIMO__POLL_INTERVAL_MS".to_string(), "750".to_string()),
            ("BELIMO__RATE_LIMIT__BURST_SIZE".to_string(), "2".to_string()),
        ]);
        let config = DashboardConfig::load_with_env(path.to_str(), Some(env)).unwrap();
        assert_eq!(config.poll_interval_ms, 750);
        assert_eq!(config.rate_limit.burst_size, 2);
        assert_eq!(config.actuators, vec![ActuatorEndpoint::new("10.0.0.5")]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
