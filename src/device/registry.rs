use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::option_help;
use super::sanitized_options;
use super::Device;
use super::DeviceOption;
use crate::DatasourceError;
use crate::Result;

/// Builds a device from sanitized options.
pub type DeviceCreator = Arc<dyn Fn(HashMap<String, String>) -> Result<Arc<dyn Device>> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    creator: DeviceCreator,
    options: HashMap<String, DeviceOption>,
}

/// Device type name → constructor and option schema.
///
/// An explicit, cloneable handle instead of process-wide state, so every
/// sensor (and every test) owns the set of types it can build.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    inner: Arc<RwLock<HashMap<String, Registration>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device_type`, replacing any previous registration.
    pub fn register<F>(
        &self,
        device_type: impl Into<String>,
        options: HashMap<String, DeviceOption>,
        creator: F,
    ) where
        F: Fn(HashMap<String, String>) -> Result<Arc<dyn Device>> + Send + Sync + 'static,
    {
        let device_type = device_type.into();
        debug!("register device type: {}", device_type);
        self.inner.write().insert(
            device_type,
            Registration {
                creator: Arc::new(creator),
                options,
            },
        );
    }

    pub fn unregister(
        &self,
        device_type: &str,
    ) -> bool {
        self.inner.write().remove(device_type).is_some()
    }

    pub fn contains(
        &self,
        device_type: &str,
    ) -> bool {
        self.inner.read().contains_key(device_type)
    }

    pub fn device_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.inner.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn help(
        &self,
        device_type: &str,
    ) -> Option<Vec<String>> {
        self.inner
            .read()
            .get(device_type)
            .map(|r| option_help(&r.options))
    }

    /// Sanitizes `config` against the type's schema and constructs the device.
    pub fn create(
        &self,
        device_type: &str,
        config: &HashMap<String, String>,
    ) -> Result<Arc<dyn Device>> {
        // Clone out so the constructor never runs under the lock
        let registration = self.inner.read().get(device_type).cloned().ok_or_else(|| {
            DatasourceError::DeviceNotFound {
                device_type: device_type.to_string(),
            }
        })?;

        let sanitized = sanitized_options(device_type, &registration.options, config)?;
        (registration.creator)(sanitized)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("device_types", &self.device_types())
            .finish()
    }
}
