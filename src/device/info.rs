use std::collections::HashMap;
use std::sync::Arc;

use super::Device;
use super::DeviceRegistry;
use crate::DatasourceError;
use crate::Result;

/// A constructed device together with its resolved identity.
#[derive(Clone)]
pub struct DeviceInfo {
    pub id: String,
    pub device_type: String,
    pub options: HashMap<String, String>,
    pub device: Arc<dyn Device>,
}

impl DeviceInfo {
    /// Creates the device through `registry` and resolves its id.
    pub async fn new(
        registry: &DeviceRegistry,
        device_type: &str,
        options: HashMap<String, String>,
    ) -> Result<Self> {
        let device = registry.create(device_type, &options)?;
        let id = device
            .device_id()
            .await
            .map_err(|e| DatasourceError::DeviceId(e.to_string()))?;

        Ok(Self {
            id,
            device_type: device_type.to_string(),
            options,
            device,
        })
    }
}

impl std::fmt::Debug for DeviceInfo {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DeviceInfo")
            .field("id", &self.id)
            .field("device_type", &self.device_type)
            .finish()
    }
}
