//! Lifecycle of one configured datasource.
//!
//! A [`Datasource`] is driven exclusively by the sensor loop: `deploy`,
//! `stop`, `schedule_restart` and `terminate` are never called concurrently
//! for the same name, so its mutable fields need no locking. The run itself
//! executes in a [`TaskGroup`] whose scope is a child of the sensor's.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::trace;
use tracing::warn;
use tracing::Instrument;

use super::merge_options;
use super::DatasourceConfig;
use crate::utils::catch_panic;
use crate::utils::time::now_unix_nanos;
use crate::utils::RedeployTimer;
use crate::utils::TaskGroup;
use crate::BackendClient;
use crate::BackendClientFactory;
use crate::CredentialResolver;
use crate::DatasourceError;
use crate::DatasourceInventory;
use crate::Device;
use crate::DeviceInfo;
use crate::DeviceRegistry;
use crate::Error;
use crate::GnmiClient;
use crate::Inventory;
use crate::LogLevelControl;
use crate::MetricTracker;
use crate::Path;
use crate::PathElem;
use crate::Provider;
use crate::Result;
use crate::SetRequest;
use crate::Update;

pub(crate) const LAST_ERROR: &str = "last-error";
pub(crate) const LAST_SEEN: &str = "last-seen";

/// Error kind counted when the run limit keeps a datasource from starting.
pub(crate) const MAX_LIMIT_REACHED: &str = "maxLimitReached";

/// Collaborators shared by every datasource of one sensor.
#[derive(Clone)]
pub(crate) struct DatasourceDeps {
    pub(crate) sensor_id: String,
    pub(crate) origin: String,
    pub(crate) target: String,
    pub(crate) gnmi: Arc<dyn GnmiClient>,
    pub(crate) registry: DeviceRegistry,
    pub(crate) client_factory: BackendClientFactory,
    pub(crate) resolver: Arc<dyn CredentialResolver>,
    pub(crate) metrics: Arc<dyn MetricTracker>,
    pub(crate) channel: Option<Channel>,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) log_levels: Arc<dyn LogLevelControl>,
    /// Runs currently holding a [`RunGuard`]
    pub(crate) running_total: Arc<AtomicUsize>,
    /// Names of datasources whose run ended without being cancelled
    pub(crate) stopped_tx: mpsc::UnboundedSender<String>,
}

impl DatasourceDeps {
    /// `datasource/state/sensor[id=..]/source[name=..]`
    pub(crate) fn state_prefix(
        &self,
        name: &str,
    ) -> Path {
        Path::new(vec![
            PathElem::new("datasource"),
            PathElem::new("state"),
            PathElem::keyed("sensor", "id", self.sensor_id.as_str()),
            PathElem::keyed("source", "name", name),
        ])
        .with_origin(self.origin.as_str())
        .with_target(self.target.as_str())
    }
}

/// Publishes status leaves under one datasource's state prefix.
#[derive(Clone)]
pub(crate) struct StatusWriter {
    gnmi: Arc<dyn GnmiClient>,
    prefix: Path,
}

impl StatusWriter {
    pub(crate) fn new(
        gnmi: Arc<dyn GnmiClient>,
        prefix: Path,
    ) -> Self {
        Self { gnmi, prefix }
    }

    pub(crate) async fn submit(
        &self,
        updates: Vec<Update>,
    ) -> Result<()> {
        trace!("submitting updates: {:?}", updates);
        let mut req = SetRequest::new(self.prefix.clone());
        req.updates = updates;
        self.gnmi.set(req).await
    }

    /// Sets `last-error`, logging instead of failing.
    pub(crate) async fn message(
        &self,
        message: &str,
    ) {
        if let Err(e) = self.submit(vec![Update::new(LAST_ERROR, message)]).await {
            error!("Failed to publish datasource message: {}. Reason: {}", message, e);
        }
    }

    /// Removes the whole status subtree.
    pub(crate) async fn delete_all(&self) -> Result<()> {
        let req = SetRequest::new(Path::default()).delete(self.prefix.clone());
        self.gnmi.set(req).await
    }
}

pub struct Datasource {
    name: String,
    deps: Arc<DatasourceDeps>,
    status: StatusWriter,
    parent: CancellationToken,

    /// Last config handed to `deploy`, running or not
    applied: Option<DatasourceConfig>,
    /// Scope and tasks of the active run
    group: Option<TaskGroup>,
    /// Set while a launched run has not returned
    running: Arc<AtomicBool>,
    timer: RedeployTimer,
}

/// Marks a datasource as running for as long as its run is alive.
struct RunGuard {
    running: Arc<AtomicBool>,
    total: Arc<AtomicUsize>,
}

impl RunGuard {
    fn new(
        running: Arc<AtomicBool>,
        total: Arc<AtomicUsize>,
    ) -> Self {
        running.store(true, Ordering::SeqCst);
        total.fetch_add(1, Ordering::SeqCst);
        Self { running, total }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.total.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Datasource {
    pub(crate) fn new(
        name: &str,
        deps: Arc<DatasourceDeps>,
        parent: CancellationToken,
        redeploy_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        let status = StatusWriter::new(deps.gnmi.clone(), deps.state_prefix(name));
        Self {
            name: name.to_string(),
            deps,
            status,
            parent,
            applied: None,
            group: None,
            running: Arc::new(AtomicBool::new(false)),
            timer: RedeployTimer::new(name, redeploy_tx),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn applied(&self) -> Option<&DatasourceConfig> {
        self.applied.as_ref()
    }

    pub fn state_prefix(&self) -> &Path {
        &self.status.prefix
    }

    /// True while a run has been launched and not stopped. A run that ended
    /// on its own still counts until the next `stop`.
    pub fn is_deployed(&self) -> bool {
        self.group.is_some()
    }

    /// True from launch until the run returns, whether it was stopped or
    /// ended on its own.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_restart_pending(&self) -> bool {
        self.timer.is_armed()
    }

    /// Brings the datasource in line with `config`.
    ///
    /// A config equal to the applied one is ignored. Otherwise the current
    /// run is stopped and fully joined before anything new starts.
    pub async fn deploy(
        &mut self,
        config: &DatasourceConfig,
    ) -> bool {
        trace!("Trying to deploy config: {}. Current: {:?}", config, self.applied);
        if self.applied.as_ref() == Some(config) {
            info!("Deploy requested with the same config, ignoring request.");
            return false;
        }

        self.stop().await;
        self.applied = Some(config.clone());

        if !config.enabled {
            info!("Data source {} disabled", self.name);
            let updates = vec![
                Update::new("enabled", false),
                Update::new(LAST_ERROR, "Data source disabled"),
            ];
            if let Err(e) = self.status.submit(updates).await {
                error!("Failed to publish disabled status: {}", e);
            }
            return true;
        }

        info!("Starting run");
        self.deps.metrics.track_deploys(&config.device_type);

        let guard = RunGuard::new(self.running.clone(), self.deps.running_total.clone());
        let mut group = TaskGroup::new(&self.parent);
        let run = DatasourceRun {
            config: config.clone(),
            deps: self.deps.clone(),
            status: self.status.clone(),
        };
        let span = info_span!(
            "datasource",
            sensor = %self.deps.sensor_id,
            datasource = %self.name
        );
        group.spawn(run.supervise(group.token(), guard).instrument(span));
        self.group = Some(group);
        true
    }

    /// Reports that `config` was not started because `limit` datasources are
    /// already running.
    pub(crate) async fn reject_over_limit(
        &self,
        config: &DatasourceConfig,
        limit: usize,
    ) {
        let message = format!(
            "unable to run datasource, max number of datasources already running, limit={}",
            limit
        );
        warn!("{}: {}", self.name, message);
        self.deps
            .metrics
            .track_errors(&config.device_type, MAX_LIMIT_REACHED);
        self.status.message(&message).await;
    }

    /// Disarms the restart timer, cancels the active run and waits until all
    /// of its tasks have returned. No-op when nothing is running.
    pub async fn stop(&mut self) {
        self.timer.stop();
        let Some(group) = self.group.take() else {
            return;
        };
        group.token().cancel();
        if let Err(e) = group.wait().await {
            error!("Stop encountered error: {}", e);
        }
    }

    /// (Re)arms the debounce timer. On expiry the sensor loop redeploys.
    pub fn schedule_restart(
        &mut self,
        delay: Duration,
    ) {
        self.timer.reset(delay);
        let device_type = self
            .applied
            .as_ref()
            .map(|c| c.device_type.as_str())
            .unwrap_or_default();
        self.deps.metrics.track_restarts(device_type);
    }

    /// Stops the datasource and removes its status subtree.
    pub async fn terminate(mut self) {
        debug!("Removing datasource: {}", self.name);
        self.stop().await;
        if let Err(e) = self.status.delete_all().await {
            error!("Failed to delete state for {}: {}", self.name, e);
        }
        info!("Datasource removed: {}", self.name);
    }
}

impl std::fmt::Debug for Datasource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Datasource")
            .field("name", &self.name)
            .field("applied", &self.applied)
            .field("deployed", &self.is_deployed())
            .finish()
    }
}

/// One instantiation of a datasource config.
struct DatasourceRun {
    config: DatasourceConfig,
    deps: Arc<DatasourceDeps>,
    status: StatusWriter,
}

impl DatasourceRun {
    /// Runs the instance and turns its outcome into status. Never fails:
    /// errors stay inside the datasource.
    async fn supervise(
        self,
        token: CancellationToken,
        guard: RunGuard,
    ) -> Result<()> {
        let result = self.run(token.clone()).await;

        if token.is_cancelled() {
            if let Err(e) = result {
                info!("Data source stopped due to cancel request. Returned: {}", e);
            }
            return Ok(());
        }

        match result {
            Ok(()) => self.status.message("Data source stopped").await,
            Err(e) => {
                error!("Data source stopped: {}", e);
                self.deps
                    .metrics
                    .track_errors(&self.config.device_type, e.kind());
                self.status.message(&format!("Data source stopped: {}", e)).await;
            }
        }

        // Free the slot before the sensor looks for a waiting datasource
        drop(guard);
        if self.deps.stopped_tx.send(self.config.name.clone()).is_err() {
            debug!("sensor loop gone, not reporting stop of {}", self.config.name);
        }
        Ok(())
    }

    async fn run(
        &self,
        token: CancellationToken,
    ) -> Result<()> {
        // Published before the slow part so observers can tell "starting"
        // from "never configured"
        self.status
            .submit(vec![
                Update::new(LAST_ERROR, "Datasource started"),
                Update::new("type", self.config.device_type.as_str()),
                Update::new("enabled", true),
                Update::new("streaming-start", now_unix_nanos()),
            ])
            .await?;

        let credentials = self.resolve_credentials().await?;
        let info = DeviceInfo::new(
            &self.deps.registry,
            &self.config.device_type,
            merge_options(&self.config.options, credentials),
        )
        .await?;
        let client = (self.deps.client_factory)(self.deps.gnmi.clone(), &info);

        if !info.id.is_empty() {
            self.status
                .submit(vec![Update::new("source-id", info.id.as_str())])
                .await?;
        }

        // Registration is a precondition for running any provider
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            sent = client.send_device_metadata() => {
                sent.map_err(|e| DatasourceError::Metadata {
                    device_id: info.id.clone(),
                    device_type: info.device_type.clone(),
                    reason: e.to_string(),
                })?;
            }
        }

        let mut group = TaskGroup::new(&token);
        self.spawn_providers(&mut group, &info, &client)?;

        group.spawn(
            Liveness {
                device: info.device.clone(),
                client: client.clone(),
                status: self.status.clone(),
                interval: self.deps.heartbeat_interval,
            }
            .run(group.token()),
        );

        if let Some(manager) = info.device.manager() {
            let inventory: Arc<dyn Inventory> = Arc::new(DatasourceInventory::new(client.clone()));
            let manage_token = group.token();
            group.spawn(async move {
                catch_panic("Manage", async move {
                    manager
                        .manage(manage_token, inventory)
                        .await
                        .map_err(|e| Error::from(DatasourceError::Manage(e.to_string())))
                })
                .await
            });
        }

        group.wait().await
    }

    async fn resolve_credentials(&self) -> Result<HashMap<String, String>> {
        let mut resolved = HashMap::with_capacity(self.config.credentials.len());
        for (key, reference) in &self.config.credentials {
            let secret = self.deps.resolver.resolve(reference).await.map_err(|e| {
                DatasourceError::Credential {
                    key: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            resolved.insert(key.clone(), secret);
        }
        Ok(resolved)
    }

    fn spawn_providers(
        &self,
        group: &mut TaskGroup,
        info: &DeviceInfo,
        client: &Arc<dyn BackendClient>,
    ) -> Result<()> {
        let providers = info.device.providers()?;
        debug!("starting {} providers for device {:?}", providers.len(), info.id);

        for provider in providers {
            let provider = match provider {
                Provider::Gnmi(mut p) => {
                    p.init_gnmi(client.clone());
                    Provider::Gnmi(p)
                }
                Provider::Grpc(mut p) => {
                    let channel = self.deps.channel.clone().ok_or_else(|| {
                        DatasourceError::NoGrpcConnection {
                            device_id: info.id.clone(),
                        }
                    })?;
                    p.init_grpc(channel);
                    Provider::Grpc(p)
                }
            };

            let token = group.token();
            group.spawn(async move {
                let kind = provider.kind();
                provider.run(token).await.map_err(|e| {
                    Error::from(DatasourceError::Provider(format!("{} provider: {}", kind, e)))
                })
            });
        }
        Ok(())
    }
}

/// Periodic device liveness check, published as `last-seen`/`unreachable`
/// and forwarded to the backend as a heartbeat.
struct Liveness {
    device: Arc<dyn Device>,
    client: Arc<dyn BackendClient>,
    status: StatusWriter,
    interval: Duration,
}

impl Liveness {
    async fn run(
        self,
        token: CancellationToken,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Only report the transition, not every failed check
        let mut was_failing = false;

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            match self.device.alive().await {
                Ok(true) => {
                    let mut updates = vec![Update::new(LAST_SEEN, now_unix_nanos())];
                    if was_failing {
                        info!("Device is back alive");
                        was_failing = false;
                        updates.push(Update::new(LAST_ERROR, "Device is back alive"));
                    }
                    updates.push(Update::new("unreachable", false));
                    if let Err(e) = self.status.submit(updates).await {
                        error!("Publish status failed: {}", e);
                    }
                    if let Err(e) = self.client.send_heartbeat(true).await {
                        error!("Error sending heartbeat: {}", e);
                    }
                }
                outcome if !was_failing => {
                    let message = match outcome {
                        Err(e) => format!("Device not alive: {}", e),
                        _ => "Device not alive".to_string(),
                    };
                    warn!("{}", message);
                    let updates = vec![
                        Update::new(LAST_ERROR, message.as_str()),
                        Update::new("unreachable", true),
                    ];
                    if let Err(e) = self.status.submit(updates).await {
                        error!("Publish status failed: {}", e);
                    }
                    was_failing = true;
                }
                _ => {}
            }
        }
    }
}
