use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;

use super::DeviceInfo;
use crate::BackendClient;
use crate::Result;

/// Set of devices maintained by a [`super::Manager`].
#[cfg_attr(test, automock)]
pub trait Inventory: Send + Sync + 'static {
    fn add(
        &self,
        info: DeviceInfo,
    ) -> Result<()>;

    fn delete(
        &self,
        id: &str,
    ) -> Result<()>;

    fn get(
        &self,
        id: &str,
    ) -> Option<DeviceInfo>;

    fn list(&self) -> Vec<DeviceInfo>;
}

/// Inventory owned by one datasource run. Every change is mirrored to the
/// backend as the sorted list of managed device ids.
pub struct DatasourceInventory {
    client: Arc<dyn BackendClient>,
    devices: RwLock<HashMap<String, DeviceInfo>>,
}

impl DatasourceInventory {
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        Self {
            client,
            devices: RwLock::new(HashMap::new()),
        }
    }

    fn managed_ids(devices: &HashMap<String, DeviceInfo>) -> Vec<String> {
        let mut ids: Vec<String> = devices.values().map(|d| d.id.clone()).collect();
        ids.sort();
        ids
    }
}

impl Inventory for DatasourceInventory {
    fn add(
        &self,
        info: DeviceInfo,
    ) -> Result<()> {
        let mut devices = self.devices.write();
        if !devices.contains_key(&info.id) {
            devices.insert(info.id.clone(), info);
            self.client.set_managed_devices(Self::managed_ids(&devices));
        }
        Ok(())
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<()> {
        let mut devices = self.devices.write();
        devices.remove(id);
        self.client.set_managed_devices(Self::managed_ids(&devices));
        Ok(())
    }

    fn get(
        &self,
        id: &str,
    ) -> Option<DeviceInfo> {
        self.devices.read().get(id).cloned()
    }

    fn list(&self) -> Vec<DeviceInfo> {
        self.devices.read().values().cloned().collect()
    }
}
