use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimingConfig {
    /// Interval between sensor heartbeats and datasource liveness checks
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_in_ms: u64,

    /// Debounce window between a config change and the redeploy it triggers
    #[serde(default = "default_redeploy_delay")]
    pub redeploy_delay_in_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_in_ms: default_heartbeat_interval(),
            redeploy_delay_in_ms: default_redeploy_delay(),
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "heartbeat_interval_in_ms must be greater than 0".into(),
            )));
        }
        if self.redeploy_delay_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "redeploy_delay_in_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

// in ms
fn default_heartbeat_interval() -> u64 {
    10_000
}
// in ms
fn default_redeploy_delay() -> u64 {
    2_000
}
