//! Assembles a [`Sensor`] from settings and collaborators.
//!
//! Only the gNMI client is mandatory. Everything else falls back to a
//! default: an empty [`DeviceRegistry`], [`GnmiBackendClient::factory`],
//! [`PassthroughResolver`], [`NoopMetricTracker`] and
//! [`NoopLogLevelControl`].
//!
//! ```ignore
//! let mut sensor = SensorBuilder::new(settings)
//!     .gnmi_client(client)
//!     .registry(registry)
//!     .build()?;
//! sensor.run(token).await?;
//! ```

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;

use super::DatasourceDeps;
use super::Sensor;
use crate::BackendClientFactory;
use crate::CredentialResolver;
use crate::DeviceRegistry;
use crate::Error;
use crate::GnmiBackendClient;
use crate::GnmiClient;
use crate::LogLevelControl;
use crate::MetricTracker;
use crate::NoopLogLevelControl;
use crate::NoopMetricTracker;
use crate::PassthroughResolver;
use crate::Result;
use crate::SensorSettings;

pub struct SensorBuilder {
    settings: SensorSettings,
    gnmi: Option<Arc<dyn GnmiClient>>,
    registry: DeviceRegistry,
    client_factory: Option<BackendClientFactory>,
    resolver: Arc<dyn CredentialResolver>,
    metrics: Arc<dyn MetricTracker>,
    log_levels: Arc<dyn LogLevelControl>,
    channel: Option<Channel>,
}

impl SensorBuilder {
    pub fn new(settings: SensorSettings) -> Self {
        Self {
            settings,
            gnmi: None,
            registry: DeviceRegistry::new(),
            client_factory: None,
            resolver: Arc::new(PassthroughResolver),
            metrics: Arc::new(NoopMetricTracker),
            log_levels: Arc::new(NoopLogLevelControl),
            channel: None,
        }
    }

    /// Control-channel client used for subscriptions and status.
    pub fn gnmi_client(
        mut self,
        gnmi: Arc<dyn GnmiClient>,
    ) -> Self {
        self.gnmi = Some(gnmi);
        self
    }

    pub fn registry(
        mut self,
        registry: DeviceRegistry,
    ) -> Self {
        self.registry = registry;
        self
    }

    pub fn client_factory(
        mut self,
        factory: BackendClientFactory,
    ) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn credential_resolver(
        mut self,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn metric_tracker(
        mut self,
        metrics: Arc<dyn MetricTracker>,
    ) -> Self {
        self.metrics = metrics;
        self
    }

    /// Receives per-datasource `log-level` changes, e.g. the control
    /// returned by [`crate::init_observability`].
    pub fn log_level_control(
        mut self,
        log_levels: Arc<dyn LogLevelControl>,
    ) -> Self {
        self.log_levels = log_levels;
        self
    }

    /// Connection handed to raw gRPC providers.
    pub fn grpc_channel(
        mut self,
        channel: Channel,
    ) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn build(self) -> Result<Sensor> {
        self.settings.validate()?;
        let gnmi = self
            .gnmi
            .ok_or_else(|| Error::Fatal("sensor requires a gNMI client".to_string()))?;

        let heartbeat_interval = self.settings.heartbeat_interval();
        let redeploy_delay = self.settings.redeploy_delay();
        let sensor = self.settings.sensor;
        let (stopped_tx, stopped_rx) = mpsc::unbounded_channel();
        let deps = DatasourceDeps {
            sensor_id: sensor.id.clone(),
            origin: sensor.origin.clone(),
            target: sensor.target.clone(),
            gnmi,
            registry: self.registry,
            client_factory: self.client_factory.unwrap_or_else(GnmiBackendClient::factory),
            resolver: self.resolver,
            metrics: self.metrics,
            channel: self.channel,
            heartbeat_interval,
            log_levels: self.log_levels,
            running_total: Arc::new(AtomicUsize::new(0)),
            stopped_tx,
        };
        let (redeploy_tx, redeploy_rx) = mpsc::unbounded_channel();

        Ok(Sensor {
            redeploy_delay,
            run_limit: sensor.datasource_run_limit,
            config: sensor,
            deps: Arc::new(deps),
            configs: HashMap::new(),
            datasources: HashMap::new(),
            state_names: HashSet::new(),
            synced: false,
            scope: CancellationToken::new(),
            redeploy_tx,
            redeploy_rx,
            stopped_rx,
            heartbeat: None,
        })
    }
}
