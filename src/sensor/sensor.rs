use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::decode_config_path;
use super::ConfigField;
use super::Datasource;
use super::DatasourceConfig;
use super::DatasourceDeps;
use super::LAST_ERROR;
use super::LAST_SEEN;
use crate::backend::COLLECTOR_VERSION;
use crate::datasource_name;
use crate::utils::time::now_unix_nanos;
use crate::GnmiClient;
use crate::LogLevel;
use crate::Notification;
use crate::Path;
use crate::PathElem;
use crate::Result;
use crate::SensorConfig;
use crate::SetRequest;
use crate::SubscribeMode;
use crate::SubscribeRequest;
use crate::SubscribeResponse;
use crate::SubscribeStream;

/// Orchestrates every datasource configured for one sensor id.
///
/// The config map and the datasource map are touched only from
/// [`Sensor::run`]; redeploy timers hand names back to it over a channel.
pub struct Sensor {
    pub(super) config: SensorConfig,
    pub(super) deps: Arc<DatasourceDeps>,
    pub(super) redeploy_delay: Duration,
    /// Maximum concurrently running datasources; 0 means unlimited
    pub(super) run_limit: usize,

    pub(super) configs: HashMap<String, DatasourceConfig>,
    pub(super) datasources: HashMap<String, Datasource>,
    /// Names found under the status subtree during resync
    pub(super) state_names: HashSet<String>,
    pub(super) synced: bool,

    pub(super) scope: CancellationToken,
    pub(super) redeploy_tx: mpsc::UnboundedSender<String>,
    pub(super) redeploy_rx: mpsc::UnboundedReceiver<String>,
    pub(super) stopped_rx: mpsc::UnboundedReceiver<String>,
    pub(super) heartbeat: Option<JoinHandle<()>>,
}

impl Sensor {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn configs(&self) -> &HashMap<String, DatasourceConfig> {
        &self.configs
    }

    pub fn datasource(
        &self,
        name: &str,
    ) -> Option<&Datasource> {
        self.datasources.get(name)
    }

    /// `datasource/config/sensor[id=..]`
    pub fn config_root(&self) -> Path {
        self.sensor_path("config")
    }

    /// `datasource/state/sensor[id=..]`
    pub fn state_root(&self) -> Path {
        self.sensor_path("state")
    }

    fn sensor_path(
        &self,
        subtree: &str,
    ) -> Path {
        Path::new(vec![
            PathElem::new("datasource"),
            PathElem::new(subtree),
            PathElem::keyed("sensor", "id", self.config.id.as_str()),
        ])
        .with_origin(self.config.origin.as_str())
        .with_target(self.config.target.as_str())
    }

    /// Resyncs state, then follows the config subscription until `token` is
    /// cancelled, the subscription ends, or the control channel fails.
    ///
    /// Every datasource has been stopped and joined when this returns.
    pub async fn run(
        &mut self,
        token: CancellationToken,
    ) -> Result<()> {
        info!("Running sensor {:?}, version {}", self.config.id, COLLECTOR_VERSION);
        self.scope = token.child_token();

        let result = self.reconcile().await;
        if let Err(e) = &result {
            info!("Config subscription returned: error: {}", e);
        }

        self.scope.cancel();
        if let Some(heartbeat) = self.heartbeat.take() {
            let _ = heartbeat.await;
        }

        info!("Terminating {} datasources...", self.datasources.len());
        for datasource in self.datasources.values_mut() {
            datasource.stop().await;
        }
        info!("All datasources closed");

        result
    }

    async fn reconcile(&mut self) -> Result<()> {
        let scope = self.scope.clone();

        let state_stream = self.open(self.state_root(), SubscribeMode::Once).await?;
        tokio::select! {
            _ = scope.cancelled() => return Ok(()),
            resynced = self.resync(state_stream) => resynced?,
        }

        let mut config_stream = self.open(self.config_root(), SubscribeMode::Stream).await?;
        loop {
            tokio::select! {
                biased;
                _ = scope.cancelled() => return Ok(()),
                Some(name) = self.stopped_rx.recv() => {
                    self.run_waiting_datasource(&name);
                }
                Some(name) = self.redeploy_rx.recv() => {
                    self.run_datasource_config(&name).await;
                }
                resp = config_stream.next() => match resp {
                    None => {
                        info!("Config subscription closed");
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(e),
                    Some(Ok(SubscribeResponse::Update(notification))) => {
                        trace!("Got response: {:?}", notification);
                        self.handle_config_update(&notification).await;
                    }
                    Some(Ok(SubscribeResponse::SyncResponse)) => {
                        self.handle_config_sync().await?;
                    }
                },
            }
        }
    }

    async fn open(
        &self,
        path: Path,
        mode: SubscribeMode,
    ) -> Result<SubscribeStream> {
        debug!("subscribe: {} ({:?})", path, mode);
        self.deps.gnmi.subscribe(SubscribeRequest { path, mode }).await
    }

    /// Collects every datasource name that has any status.
    async fn resync(
        &mut self,
        mut stream: SubscribeStream,
    ) -> Result<()> {
        while let Some(resp) = stream.next().await {
            match resp? {
                SubscribeResponse::Update(notification) => {
                    for update in &notification.updates {
                        let full = notification.prefix.join(&update.path);
                        if let Some(name) = datasource_name(&full) {
                            self.state_names.insert(name.to_string());
                        }
                    }
                }
                SubscribeResponse::SyncResponse => info!("state sync complete"),
            }
        }
        debug!("syncState found states: {:?}", self.state_names);
        Ok(())
    }

    /// Applies one config notification to the config map.
    ///
    /// Before the sync marker nothing is deployed; afterwards each touched
    /// datasource gets its debounce timer (re)armed. A `log-level` change is
    /// applied in place and only restarts the datasource when other fields
    /// changed with it.
    pub(super) async fn handle_config_update(
        &mut self,
        notification: &Notification,
    ) {
        for path in &notification.deletes {
            let full = notification.prefix.join(path);
            match full.leaf_name() {
                Some("id") | Some("sensor") => {
                    // Teardown follows from the datasource-level deletes
                    info!("Sensor deleted: {}", full);
                }
                Some("name") | Some("source") => {
                    if let Some(decoded) = decode_config_path(&full) {
                        self.remove_datasource(&decoded.name).await;
                    }
                }
                _ => trace!("ignoring delete of {}", full),
            }
        }

        let mut touched = BTreeSet::new();
        let mut relevelled = BTreeSet::new();
        for update in &notification.updates {
            let full = notification.prefix.join(&update.path);
            if full.leaf_name() == Some("id") {
                info!("Sensor added: {}", full);
            }
            let Some(decoded) = decode_config_path(&full) else {
                continue;
            };

            let config = self.configs.entry(decoded.name.clone()).or_insert_with(|| {
                self.deps.metrics.track_datasources(1);
                DatasourceConfig::new(decoded.name.as_str())
            });
            if !config.apply(&decoded.field, &update.val) {
                continue;
            }
            if decoded.field == ConfigField::LogLevel {
                relevelled.insert(decoded.name);
            } else {
                touched.insert(decoded.name);
            }
        }

        if !self.synced {
            return;
        }
        for name in relevelled {
            if let Some(level) = self.configs.get(&name).map(|c| c.log_level) {
                self.apply_log_level(&name, level);
            }
        }
        let delay = self.redeploy_delay;
        for name in touched {
            self.datasource_mut(&name).schedule_restart(delay);
        }
    }

    async fn handle_config_sync(&mut self) -> Result<()> {
        self.synced = true;
        self.sync_state().await?;

        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        for name in names {
            self.run_datasource_config(&name).await;
        }

        if self.heartbeat.is_none() {
            self.heartbeat = Some(self.spawn_heartbeat());
        }
        info!("Config sync complete");
        Ok(())
    }

    /// Deletes status of datasources found during resync that are no longer
    /// configured and republishes sensor status. Deleted names are drained,
    /// so repeating the call deletes nothing new.
    pub(super) async fn sync_state(&mut self) -> Result<()> {
        let orphans: BTreeMap<String, Path> = self
            .state_names
            .iter()
            .filter(|name| !self.configs.contains_key(*name))
            .map(|name| {
                (
                    name.clone(),
                    Path::new(vec![PathElem::keyed("source", "name", name.as_str())]),
                )
            })
            .collect();

        info!("Resyncing state. Deleting: {:?}", orphans.keys().collect::<Vec<_>>());
        let ts = now_unix_nanos();
        let mut req = SetRequest::new(self.state_root())
            .update("version", COLLECTOR_VERSION)
            .update("hostname", self.config.hostname.as_str())
            .update("ip", self.config.ip.as_str())
            .update("streaming-start", ts)
            .update(LAST_SEEN, ts)
            .update(LAST_ERROR, "Sensor started");
        req.deletes = orphans.values().cloned().collect();
        self.deps.gnmi.set(req).await?;

        self.state_names.retain(|name| !orphans.contains_key(name));
        Ok(())
    }

    async fn run_datasource_config(
        &mut self,
        name: &str,
    ) {
        let Some(config) = self.configs.get(name).cloned() else {
            warn!("redeploy failed: config not found: {}", name);
            return;
        };
        self.apply_log_level(name, config.log_level);

        if !config.enabled {
            if self.datasource_mut(name).deploy(&config).await {
                self.run_waiting_datasource(name);
            }
            return;
        }

        let limit = self.run_limit;
        let running = self.datasources.get(name).is_some_and(|d| d.is_running());
        if limit > 0 && !running && self.deps.running_total.load(Ordering::SeqCst) >= limit {
            self.datasource_mut(name).reject_over_limit(&config, limit).await;
            return;
        }
        self.datasource_mut(name).deploy(&config).await;
    }

    /// With a run limit, schedules the first enabled datasource (other than
    /// `skip`) that is waiting for a slot: not running and not yet deployed
    /// with its current config.
    fn run_waiting_datasource(
        &mut self,
        skip: &str,
    ) {
        if self.run_limit == 0 || !self.synced {
            return;
        }
        let next = self
            .configs
            .iter()
            .filter(|(name, config)| name.as_str() != skip && config.enabled)
            .filter(|(name, config)| match self.datasources.get(name.as_str()) {
                Some(ds) => !ds.is_running() && ds.applied() != Some(*config),
                None => true,
            })
            .map(|(name, _)| name.clone())
            .min();

        if let Some(name) = next {
            debug!("Scheduling waiting datasource {}", name);
            let delay = self.redeploy_delay;
            self.datasource_mut(&name).schedule_restart(delay);
        }
    }

    async fn remove_datasource(
        &mut self,
        name: &str,
    ) {
        if self.configs.remove(name).is_some() {
            self.deps.metrics.track_datasources(-1);
        }
        // Its status is deleted below; the next sync must not see an orphan
        self.state_names.remove(name);
        if let Err(e) = self.deps.log_levels.set_datasource_level(name, None) {
            error!("Failed to clear log level for {}: {}", name, e);
        }
        if let Some(datasource) = self.datasources.remove(name) {
            datasource.terminate().await;
            self.run_waiting_datasource(name);
        }
    }

    /// `Info` follows the process filter; other levels override it for the
    /// datasource's span.
    fn apply_log_level(
        &self,
        name: &str,
        level: LogLevel,
    ) {
        let level = (level != LogLevel::default()).then_some(level);
        if let Err(e) = self.deps.log_levels.set_datasource_level(name, level) {
            error!("Failed to set log level for {}: {}", name, e);
        }
    }

    fn datasource_mut(
        &mut self,
        name: &str,
    ) -> &mut Datasource {
        let deps = &self.deps;
        let scope = &self.scope;
        let tx = &self.redeploy_tx;
        self.datasources.entry(name.to_string()).or_insert_with(|| {
            info!("New datasource: {}", name);
            Datasource::new(name, deps.clone(), scope.clone(), tx.clone())
        })
    }

    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let gnmi = self.deps.gnmi.clone();
        let prefix = self.state_root();
        let interval = self.deps.heartbeat_interval;
        let token = self.scope.clone();
        tokio::spawn(heartbeat_loop(gnmi, prefix, interval, token))
    }
}

/// Publishes the sensor's `last-seen` every `interval` until cancelled.
async fn heartbeat_loop(
    gnmi: Arc<dyn GnmiClient>,
    prefix: Path,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                let req = SetRequest::new(prefix.clone()).update(LAST_SEEN, now_unix_nanos());
                if let Err(e) = gnmi.set(req).await {
                    error!("Failed to publish heartbeat: {}", e);
                }
            }
        }
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("id", &self.config.id)
            .field("configs", &self.configs.len())
            .field("datasources", &self.datasources.len())
            .field("synced", &self.synced)
            .finish()
    }
}
