use std::collections::HashMap;
use std::time::Duration;

use crate::DatasourceError;
use crate::Result;

/// Schema entry for one option a device type accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOption {
    pub description: String,
    pub default: String,
    pub required: bool,
}

impl DeviceOption {
    pub fn required(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            default: String::new(),
            required: true,
        }
    }

    pub fn optional(
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            default: default.into(),
            required: false,
        }
    }
}

/// Checks `config` against `schema`: unknown keys and missing required keys
/// are errors, absent optional keys take their defaults.
pub fn sanitized_options(
    device_type: &str,
    schema: &HashMap<String, DeviceOption>,
    config: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut sanitized = HashMap::with_capacity(schema.len());

    for (k, v) in config {
        if !schema.contains_key(k) {
            return Err(DatasourceError::BadOption {
                option: k.clone(),
                device_type: device_type.to_string(),
            }
            .into());
        }
        sanitized.insert(k.clone(), v.clone());
    }

    for (k, opt) in schema {
        if sanitized.contains_key(k) {
            continue;
        }
        if opt.required {
            return Err(DatasourceError::MissingOption { option: k.clone() }.into());
        }
        sanitized.insert(k.clone(), opt.default.clone());
    }

    Ok(sanitized)
}

/// Help lines `key: description (default x)`, sorted by key.
pub fn option_help(schema: &HashMap<String, DeviceOption>) -> Vec<String> {
    let mut lines: Vec<String> = schema
        .iter()
        .map(|(k, opt)| {
            if opt.default.is_empty() {
                format!("{}: {}", k, opt.description)
            } else {
                format!("{}: {} (default {})", k, opt.description, opt.default)
            }
        })
        .collect();
    lines.sort();
    lines
}

pub fn string_option(
    name: &str,
    options: &HashMap<String, String>,
) -> Result<String> {
    options.get(name).cloned().ok_or_else(|| {
        DatasourceError::MissingOption {
            option: name.to_string(),
        }
        .into()
    })
}

pub fn bool_option(
    name: &str,
    options: &HashMap<String, String>,
) -> Result<bool> {
    let raw = string_option(name, options)?;
    raw.trim().parse::<bool>().map_err(|_| {
        DatasourceError::InvalidOption {
            option: name.to_string(),
            value: raw.clone(),
        }
        .into()
    })
}

/// Option holding a whole number of seconds.
pub fn duration_option(
    name: &str,
    options: &HashMap<String, String>,
) -> Result<Duration> {
    let raw = string_option(name, options)?;
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| {
            DatasourceError::InvalidOption {
                option: name.to_string(),
                value: raw.clone(),
            }
            .into()
        })
}
