use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Identity of the sensor and the gNMI addressing used for its subtrees.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SensorConfig {
    /// Sensor id; keys both `datasource/config/sensor[id=..]` and
    /// `datasource/state/sensor[id=..]`
    #[serde(default)]
    pub id: String,

    /// Published in sensor status on resync
    #[serde(default)]
    pub hostname: String,

    /// Published in sensor status on resync
    #[serde(default)]
    pub ip: String,

    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_target")]
    pub target: String,

    /// Upper bound on datasources running at once; 0 means unlimited.
    /// Datasources over the limit wait until a running one stops.
    #[serde(default)]
    pub datasource_run_limit: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            hostname: String::new(),
            ip: String::new(),
            origin: default_origin(),
            target: default_target(),
            datasource_run_limit: 0,
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "sensor id must not be empty".into(),
            )));
        }
        if self.id.contains(['[', ']', '/']) {
            return Err(Error::Config(ConfigError::Message(format!(
                "sensor id {:?} contains reserved path characters",
                self.id
            ))));
        }
        Ok(())
    }
}

fn default_origin() -> String {
    "arista".to_string()
}
fn default_target() -> String {
    "cv".to_string()
}
