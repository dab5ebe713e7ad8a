//! Sensor settings.
//!
//! Loaded from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Config file given by path or `CONFIG_PATH`
//! 3. Environment variables prefixed with `SENSOR__` (highest priority)

mod sensor;
mod timing;
pub use sensor::*;
pub use timing::*;


//---
use std::env;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SensorSettings {
    /// Identity of this sensor and the prefix it publishes under
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Liveness and debounce intervals
    #[serde(default)]
    pub timing: TimingConfig,
}

impl SensorSettings {
    /// Defaults overlaid with `CONFIG_PATH` (if set) and `SENSOR__*` variables.
    ///
    /// Validation is deferred to [`SensorSettings::validate`].
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(Self::environment());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Merges an additional config file on top of the current values.
    /// Environment variables are re-applied so they keep the highest priority.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Convenience entry point: defaults, optional file, env, then validation.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut settings = Self::new()?;
        if let Some(p) = path {
            tracing::info!("with_override_config from: {}", p);
            settings = settings.with_override_config(p)?;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.sensor.validate()?;
        self.timing.validate()?;
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.timing.heartbeat_interval_in_ms)
    }

    pub fn redeploy_delay(&self) -> Duration {
        Duration::from_millis(self.timing.redeploy_delay_in_ms)
    }

    fn environment() -> Environment {
        Environment::with_prefix("SENSOR")
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true)
    }
}
