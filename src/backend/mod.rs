//! Per-device client used to register devices with the backend and
//! report their liveness.

mod gnmi_backend_client;
pub use gnmi_backend_client::*;


//---
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::DeviceInfo;
use crate::GnmiClient;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    /// Registers the device. A datasource run does not start its providers
    /// until this succeeds.
    async fn send_device_metadata(&self) -> Result<()>;

    async fn send_heartbeat(
        &self,
        alive: bool,
    ) -> Result<()>;

    /// Ids of the sub-devices currently managed through this device.
    fn set_managed_devices(
        &self,
        ids: Vec<String>,
    );
}

/// Builds one backend client per constructed device, sharing the transport.
pub type BackendClientFactory =
    Arc<dyn Fn(Arc<dyn GnmiClient>, &DeviceInfo) -> Arc<dyn BackendClient> + Send + Sync>;
