use std::sync::Arc;

use parking_lot::RwLock;
use tonic::async_trait;
use tracing::debug;

use super::BackendClient;
use super::BackendClientFactory;
use crate::utils::time::now_unix_nanos;
use crate::DeviceInfo;
use crate::GnmiClient;
use crate::Path;
use crate::Result;
use crate::SetRequest;

pub const NETWORK_ELEMENT: &str = "DEVICE_TYPE_NETWORK_ELEMENT";
pub const DEVICE_MANAGER: &str = "DEVICE_TYPE_DEVICE_MANAGER";

const METADATA_PREFIX: &str = "device-metadata/state/metadata";

pub(crate) const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend client that publishes device metadata through the shared
/// gNMI client, targeted at the device id.
pub struct GnmiBackendClient {
    gnmi: Arc<dyn GnmiClient>,
    device_id: String,
    device_type: String,
    ip_addr: Option<String>,
    origin: String,
    managed: RwLock<Vec<String>>,
}

impl GnmiBackendClient {
    pub fn new(
        gnmi: Arc<dyn GnmiClient>,
        info: &DeviceInfo,
    ) -> Self {
        let device_type = if info.device.manager().is_some() {
            DEVICE_MANAGER
        } else {
            NETWORK_ELEMENT
        };
        Self {
            gnmi,
            device_id: info.id.clone(),
            device_type: device_type.to_string(),
            ip_addr: info.device.ip_addr(),
            origin: "arista".to_string(),
            managed: RwLock::new(Vec::new()),
        }
    }

    /// Factory suitable for [`crate::SensorBuilder::client_factory`].
    pub fn factory() -> BackendClientFactory {
        Arc::new(|gnmi, info| Arc::new(GnmiBackendClient::new(gnmi, info)) as Arc<dyn BackendClient>)
    }

    fn prefix(&self) -> Path {
        Path::parse(METADATA_PREFIX)
            .with_origin(self.origin.clone())
            .with_target(self.device_id.clone())
    }

    pub(crate) fn metadata_request(&self) -> SetRequest {
        let mut req = SetRequest::new(self.prefix())
            .update("type", self.device_type.as_str())
            .update(
                "collector-version",
                format!("Collector version: {}", COLLECTOR_VERSION),
            );
        if let Some(ip) = &self.ip_addr {
            req = req.update("ip-addr", ip.as_str());
        }
        let managed = self.managed.read();
        if !managed.is_empty() {
            req = req.update("managed-devices", managed.join(","));
        }
        req
    }
}

#[async_trait]
impl BackendClient for GnmiBackendClient {
    async fn send_device_metadata(&self) -> Result<()> {
        let req = self.metadata_request();
        debug!("sending device metadata for {}", self.device_id);
        self.gnmi.set(req).await
    }

    async fn send_heartbeat(
        &self,
        alive: bool,
    ) -> Result<()> {
        if !alive {
            return Ok(());
        }
        let req = SetRequest::new(self.prefix()).update("last-seen", now_unix_nanos());
        self.gnmi.set(req).await
    }

    fn set_managed_devices(
        &self,
        ids: Vec<String>,
    ) {
        *self.managed.write() = ids;
    }
}
