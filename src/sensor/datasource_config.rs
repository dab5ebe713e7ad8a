use std::collections::HashMap;
use std::fmt;

use tracing::error;

use super::ConfigField;
use crate::LogLevel;
use crate::TypedValue;

/// Desired configuration of one datasource, as assembled from config
/// notifications.
///
/// Equality covers every field except `log_level`, so any other difference
/// (including a bumped `force_update`) is a reason to redeploy.
#[derive(Debug, Clone, Default, Eq)]
pub struct DatasourceConfig {
    pub name: String,
    pub device_type: String,
    pub enabled: bool,
    pub options: HashMap<String, String>,
    pub credentials: HashMap<String, String>,
    pub force_update: i64,
    /// Changed in place on the running datasource
    pub log_level: LogLevel,
}

impl PartialEq for DatasourceConfig {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.name == other.name
            && self.device_type == other.device_type
            && self.enabled == other.enabled
            && self.options == other.options
            && self.credentials == other.credentials
            && self.force_update == other.force_update
    }
}

impl DatasourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Writes `value` into the field addressed by `field`.
    ///
    /// Returns false for structural markers and unknown leaves, which carry
    /// no configuration.
    pub fn apply(
        &mut self,
        field: &ConfigField,
        value: &TypedValue,
    ) -> bool {
        match field {
            ConfigField::Type => self.device_type = value.as_str().to_string(),
            ConfigField::Enabled => self.enabled = value.as_bool(),
            ConfigField::Option(key) => {
                self.options.insert(key.clone(), value.as_str().to_string());
            }
            ConfigField::Credential(key) => {
                self.credentials.insert(key.clone(), value.as_str().to_string());
            }
            ConfigField::ForceUpdate => self.force_update = value.as_int(),
            ConfigField::LogLevel => {
                let raw = value.as_str();
                self.log_level = LogLevel::from_config(raw).unwrap_or_else(|| {
                    error!(
                        "unknown datasource loglevel for {}: {}, setting it to INFO level",
                        self.name, raw
                    );
                    LogLevel::Info
                });
            }
            ConfigField::Marker | ConfigField::Ignored => return false,
        }
        true
    }
}

impl fmt::Display for DatasourceConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        // Credentials stay out of logs
        let mut options: Vec<_> = self.options.iter().collect();
        options.sort();
        write!(
            f,
            "name: {}, type: {}, enabled: {}, option: {:?}, credentials: {}, loglevel: {}, forceupdate: {}",
            self.name,
            self.device_type,
            self.enabled,
            options,
            self.credentials.len(),
            self.log_level,
            self.force_update
        )
    }
}

/// Options overlaid with resolved credentials. Credentials win on collision.
pub(crate) fn merge_options(
    options: &HashMap<String, String>,
    credentials: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = options.clone();
    merged.extend(credentials);
    merged
}
