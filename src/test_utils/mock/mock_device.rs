use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;

use crate::BackendClient;
use crate::BackendClientFactory;
use crate::Device;
use crate::DeviceOption;
use crate::DeviceRegistry;
use crate::Error;
use crate::GnmiProvider;
use crate::Inventory;
use crate::Manager;
use crate::Provider;
use crate::Result;

pub const MOCK_TYPE: &str = "mock";

/// Shared counters observed by every `mock` device a registry builds.
#[derive(Default)]
pub struct DeviceScript {
    /// Device ids in construction order
    pub created: Mutex<Vec<String>>,
    /// Device ids passed to `send_device_metadata`, in call order
    pub metadata: Mutex<Vec<String>>,
    /// Providers currently inside `run`, keyed by device id
    pub active: Mutex<HashMap<String, i64>>,
    /// Highest number of simultaneously running providers seen
    pub max_active: AtomicI64,
    pub heartbeats: AtomicUsize,
    pub reject_metadata: AtomicBool,
    /// Extra time a provider keeps running after cancellation
    pub stop_delay: Mutex<Duration>,
    /// How long the first liveness check recorded here takes
    pub first_alive_delay: Mutex<Duration>,
    /// Start time of every liveness check
    pub alive_calls: Mutex<Vec<tokio::time::Instant>>,
}

impl DeviceScript {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn metadata(&self) -> Vec<String> {
        self.metadata.lock().clone()
    }

    pub fn active_total(&self) -> i64 {
        self.active.lock().values().sum()
    }

    pub fn active_for(
        &self,
        id: &str,
    ) -> i64 {
        self.active.lock().get(id).copied().unwrap_or(0)
    }

    fn enter(
        &self,
        id: &str,
    ) {
        let mut active = self.active.lock();
        *active.entry(id.to_string()).or_insert(0) += 1;
        let total: i64 = active.values().sum();
        self.max_active.fetch_max(total, Ordering::SeqCst);
    }

    fn exit(
        &self,
        id: &str,
    ) {
        if let Some(n) = self.active.lock().get_mut(id) {
            *n -= 1;
        }
    }
}

/// Device built for type `mock`.
///
/// Options: `id` (required), `manage` (`""`, `"run"`, `"panic"` or
/// `"error"`), `alive` (`"true"`/`"false"`), `provider` (`"run"` or
/// `"fail"`).
pub struct TestDevice {
    id: String,
    options: HashMap<String, String>,
    script: Arc<DeviceScript>,
}

#[async_trait]
impl Device for TestDevice {
    async fn device_id(&self) -> Result<String> {
        Ok(self.id.clone())
    }

    async fn alive(&self) -> Result<bool> {
        let first = {
            let mut calls = self.script.alive_calls.lock();
            calls.push(tokio::time::Instant::now());
            calls.len() == 1
        };
        let delay = *self.script.first_alive_delay.lock();
        if first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.options.get("alive").map(String::as_str) != Some("false"))
    }

    fn providers(&self) -> Result<Vec<Provider>> {
        Ok(vec![Provider::Gnmi(Box::new(TestProvider {
            id: self.id.clone(),
            fail: self.options.get("provider").map(String::as_str) == Some("fail"),
            script: self.script.clone(),
            client: None,
        }))])
    }

    fn manager(&self) -> Option<Arc<dyn Manager>> {
        match self.options.get("manage").map(String::as_str) {
            None | Some("") => None,
            Some(behavior) => Some(Arc::new(TestManager {
                behavior: behavior.to_string(),
            })),
        }
    }

    fn ip_addr(&self) -> Option<String> {
        Some("192.0.2.1".to_string())
    }
}

pub struct TestProvider {
    id: String,
    fail: bool,
    script: Arc<DeviceScript>,
    client: Option<Arc<dyn BackendClient>>,
}

#[async_trait]
impl GnmiProvider for TestProvider {
    fn init_gnmi(
        &mut self,
        client: Arc<dyn BackendClient>,
    ) {
        self.client = Some(client);
    }

    async fn run(
        &self,
        token: CancellationToken,
    ) -> Result<()> {
        assert!(self.client.is_some(), "provider run before init");
        if self.fail {
            return Err(Error::Fatal("provider failed on purpose".to_string()));
        }
        self.script.enter(&self.id);
        token.cancelled().await;
        let delay = *self.script.stop_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.script.exit(&self.id);
        Ok(())
    }
}

pub struct TestManager {
    behavior: String,
}

#[async_trait]
impl Manager for TestManager {
    async fn manage(
        &self,
        token: CancellationToken,
        _inventory: Arc<dyn Inventory>,
    ) -> Result<()> {
        match self.behavior.as_str() {
            "panic" => panic!("manager exploded"),
            "error" => Err(Error::Fatal("manager gave up".to_string())),
            _ => {
                token.cancelled().await;
                Ok(())
            }
        }
    }
}

/// Registry with the `mock` device type bound to `script`.
pub fn mock_registry(script: Arc<DeviceScript>) -> DeviceRegistry {
    let registry = DeviceRegistry::new();
    let options = HashMap::from([
        ("id".to_string(), DeviceOption::required("Device id")),
        (
            "manage".to_string(),
            DeviceOption::optional("Manager behavior", ""),
        ),
        (
            "alive".to_string(),
            DeviceOption::optional("Liveness answer", "true"),
        ),
        (
            "provider".to_string(),
            DeviceOption::optional("Provider behavior", "run"),
        ),
    ]);
    registry.register(MOCK_TYPE, options, move |options| {
        let id = options.get("id").cloned().unwrap_or_default();
        script.created.lock().push(id.clone());
        Ok(Arc::new(TestDevice {
            id,
            options,
            script: script.clone(),
        }) as Arc<dyn Device>)
    });
    registry
}

/// Backend client that records registrations into a [`DeviceScript`].
pub struct RecordingBackend {
    device_id: String,
    script: Arc<DeviceScript>,
    managed: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn factory(script: Arc<DeviceScript>) -> BackendClientFactory {
        Arc::new(move |_gnmi, info| {
            Arc::new(RecordingBackend {
                device_id: info.id.clone(),
                script: script.clone(),
                managed: Mutex::new(Vec::new()),
            }) as Arc<dyn BackendClient>
        })
    }
}

#[async_trait]
impl BackendClient for RecordingBackend {
    async fn send_device_metadata(&self) -> Result<()> {
        if self.script.reject_metadata.load(Ordering::SeqCst) {
            return Err(Error::Fatal("backend rejected device".to_string()));
        }
        self.script.metadata.lock().push(self.device_id.clone());
        Ok(())
    }

    async fn send_heartbeat(
        &self,
        _alive: bool,
    ) -> Result<()> {
        self.script.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_managed_devices(
        &self,
        ids: Vec<String>,
    ) {
        *self.managed.lock() = ids;
    }
}
