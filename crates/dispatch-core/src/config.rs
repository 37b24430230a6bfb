//! Configuration loading and typed config structures for the dispatch
//! engine.
//!
//! The canonical configuration lives in `dispatch-config.yaml` at the
//! project root. Every field has a default, so a missing file, an empty
//! file, or a file naming only a few keys are all valid.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dispatch_types::{DispatchConfig, VehicleKind};
use serde::Deserialize;

use crate::clock::VirtualClock;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `dispatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Business parameters (deadlines, inactivity, speeds, depot).
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Virtual clock settings.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Autonomous simulator settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Sample data settings.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DISPATCH_LOG_LEVEL` overrides `logging.level`
    /// - `DISPATCH_MINUTES_PER_TICK` overrides `simulator.minutes_per_tick`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    ///
    /// Environment overrides apply in both cases.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override values from an arbitrary variable lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(level) = lookup("DISPATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw) = lookup("DISPATCH_MINUTES_PER_TICK") {
            self.simulator.minutes_per_tick = raw.trim().parse().map_err(|err| {
                invalid("simulator.minutes_per_tick", format!("{raw:?}: {err}"))
            })?;
        }
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dispatch(&self.dispatch)?;
        if self.simulator.minutes_per_tick == 0 {
            return Err(invalid("simulator.minutes_per_tick", "must be positive"));
        }
        if self.simulator.tick_interval_ms == 0 {
            return Err(invalid("simulator.tick_interval_ms", "must be positive"));
        }
        Ok(())
    }

    /// The virtual clock described by the `clock` section.
    pub fn virtual_clock(&self) -> VirtualClock {
        self.clock
            .start
            .map_or_else(VirtualClock::starting_now, VirtualClock::new)
    }
}

/// Check a business configuration.
///
/// Durations must be positive, the risk window must fit inside the
/// delivery window, and every vehicle speed must be a positive number.
pub fn validate_dispatch(config: &DispatchConfig) -> Result<(), ConfigError> {
    if config.max_delivery_minutes == 0 {
        return Err(invalid("dispatch.max_delivery_minutes", "must be positive"));
    }
    if config.risk_range_minutes == 0 {
        return Err(invalid("dispatch.risk_range_minutes", "must be positive"));
    }
    if config.risk_range_minutes > config.max_delivery_minutes {
        return Err(invalid(
            "dispatch.risk_range_minutes",
            format!(
                "{} exceeds the {} minute delivery window",
                config.risk_range_minutes, config.max_delivery_minutes
            ),
        ));
    }
    if config.inactivity_minutes == 0 {
        return Err(invalid("dispatch.inactivity_minutes", "must be positive"));
    }
    for vehicle in [
        VehicleKind::Car,
        VehicleKind::Motorcycle,
        VehicleKind::Bicycle,
        VehicleKind::OnFoot,
    ] {
        let speed = config.speed_kmh(vehicle);
        if !(speed.is_finite() && speed > 0.0) {
            return Err(invalid(
                "dispatch speeds",
                format!("{vehicle:?} speed must be positive, got {speed}"),
            ));
        }
    }
    if let Some(range) = config.max_range_km {
        if !(range.is_finite() && range > 0.0) {
            return Err(invalid("dispatch.max_range_km", format!("must be positive, got {range}")));
        }
    }
    Ok(())
}

/// Virtual clock configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Start (and reset) time of the virtual clock, RFC 3339. Defaults to
    /// the wall-clock minute at startup.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
}

/// Simulator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulatorConfig {
    /// Virtual minutes added per tick.
    #[serde(default = "default_minutes_per_tick")]
    pub minutes_per_tick: u32,

    /// Wall-clock time between ticks in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Start the simulator when the engine starts.
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    /// Stop the engine after this many wall-clock seconds (0 = run until
    /// interrupted).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl SimulatorConfig {
    /// Wall-clock time between ticks.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            minutes_per_tick: default_minutes_per_tick(),
            tick_interval_ms: default_tick_interval_ms(),
            autostart: default_autostart(),
            max_real_time_seconds: 0,
        }
    }
}

/// Sample data configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// Populate the store with sample data at startup.
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,

    /// Random seed for the sample data.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_seed_enabled(),
            seed: default_seed(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_minutes_per_tick() -> u32 {
    1
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_autostart() -> bool {
    true
}

const fn default_seed_enabled() -> bool {
    true
}

const fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn no_env(_key: &str) -> Option<String> {
        None
    }

    fn parse_without_env(yaml: &str) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = serde_yml::from_str(yaml)?;
        config.apply_overrides(no_env)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulator.minutes_per_tick, 1);
        assert_eq!(config.simulator.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.dispatch.max_delivery_minutes, 120);
        assert_eq!(config.seed.seed, 42);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
dispatch:
  max_delivery_minutes: 90
  risk_range_minutes: 20
  inactivity_minutes: 1440
  car_speed_kmh: 25.0
  max_range_km: 12.5

clock:
  start: "2025-06-01T08:00:00Z"

simulator:
  minutes_per_tick: 5
  tick_interval_ms: 250
  autostart: false
  max_real_time_seconds: 60

seed:
  enabled: false
  seed: 7

logging:
  level: "debug"
  json: true
"#;
        let config = parse_without_env(yaml).unwrap();
        assert_eq!(config.dispatch.max_delivery_minutes, 90);
        assert_eq!(config.dispatch.max_range_km, Some(12.5));
        // Unlisted speeds keep their defaults.
        assert!((config.dispatch.foot_speed_kmh - 5.0).abs() < f64::EPSILON);
        assert_eq!(
            config.clock.start,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(config.simulator.minutes_per_tick, 5);
        assert!(!config.simulator.autostart);
        assert!(!config.seed.enabled);
        assert!(config.logging.json);
        assert_eq!(config.virtual_clock().now(), config.clock.start.unwrap());
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = parse_without_env("seed:\n  seed: 9\n").unwrap();
        assert_eq!(config.seed.seed, 9);
        assert!(config.seed.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn risk_window_longer_than_deadline_is_rejected() {
        let yaml = "dispatch:\n  max_delivery_minutes: 10\n  risk_range_minutes: 30\n";
        assert!(matches!(
            parse_without_env(yaml),
            Err(ConfigError::Invalid { field: "dispatch.risk_range_minutes", .. })
        ));
    }

    #[test]
    fn zero_speed_is_rejected() {
        let config = DispatchConfig {
            bicycle_speed_kmh: 0.0,
            ..DispatchConfig::default()
        };
        assert!(validate_dispatch(&config).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| match key {
                "DISPATCH_LOG_LEVEL" => Some("trace".to_owned()),
                "DISPATCH_MINUTES_PER_TICK" => Some(" 15 ".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.simulator.minutes_per_tick, 15);

        let bad = config.apply_overrides(|key| {
            (key == "DISPATCH_MINUTES_PER_TICK").then(|| "fast".to_owned())
        });
        assert!(matches!(bad, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("dispatch-config.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }

    #[test]
    fn project_config_uses_default_business_values() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("dispatch-config.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path).unwrap();
            // The sample only adds a company-wide range on top of the defaults.
            assert_eq!(config.dispatch.max_range_km, Some(25.0));
            let dispatch = DispatchConfig {
                max_range_km: None,
                ..config.dispatch
            };
            assert_eq!(dispatch, DispatchConfig::default());
        }
    }
}
