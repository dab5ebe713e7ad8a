use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::mock_registry;
use super::ConfigFeed;
use super::DeviceScript;
use super::FakeGnmi;
use super::LogLevelRecorder;
use super::RecordingBackend;
use crate::test_utils::enable_logger;
use crate::test_utils::test_settings;
use crate::Result;
use crate::Sensor;
use crate::SensorBuilder;
use crate::SensorSettings;

/// Builder preloaded with the fake transport, the `mock` device type and
/// the recording backend.
pub fn mock_sensor_builder(
    gnmi: Arc<FakeGnmi>,
    script: Arc<DeviceScript>,
) -> SensorBuilder {
    mock_sensor_builder_with(test_settings(), gnmi, script)
}

pub fn mock_sensor_builder_with(
    settings: SensorSettings,
    gnmi: Arc<FakeGnmi>,
    script: Arc<DeviceScript>,
) -> SensorBuilder {
    SensorBuilder::new(settings)
        .gnmi_client(gnmi)
        .registry(mock_registry(script.clone()))
        .client_factory(RecordingBackend::factory(script))
}

/// A sensor running on its own task against in-memory collaborators.
pub struct SensorHarness {
    pub gnmi: Arc<FakeGnmi>,
    pub feed: ConfigFeed,
    pub script: Arc<DeviceScript>,
    pub log_levels: Arc<LogLevelRecorder>,
    pub token: CancellationToken,
    handle: JoinHandle<(Sensor, Result<()>)>,
}

impl SensorHarness {
    pub fn start() -> Self {
        Self::start_with(|_, _| {})
    }

    /// Lets the test seed state or tweak the script before the sensor runs.
    pub fn start_with<F>(prepare: F) -> Self
    where
        F: FnOnce(&FakeGnmi, &DeviceScript),
    {
        Self::start_configured(test_settings(), prepare)
    }

    /// Runs with custom settings, e.g. a datasource run limit.
    pub fn start_configured<F>(
        settings: SensorSettings,
        prepare: F,
    ) -> Self
    where
        F: FnOnce(&FakeGnmi, &DeviceScript),
    {
        enable_logger();
        let (gnmi, feed) = FakeGnmi::new();
        let script = DeviceScript::new();
        let log_levels = Arc::new(LogLevelRecorder::default());
        prepare(gnmi.as_ref(), script.as_ref());

        let mut sensor = mock_sensor_builder_with(settings, gnmi.clone(), script.clone())
            .log_level_control(log_levels.clone())
            .build()
            .expect("valid test settings");
        let token = CancellationToken::new();
        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            let result = sensor.run(run_token).await;
            (sensor, result)
        });

        Self {
            gnmi,
            feed,
            script,
            log_levels,
            token,
            handle,
        }
    }

    /// Cancels the sensor and returns it once `run` has fully returned.
    pub async fn shutdown(self) -> (Sensor, Result<()>) {
        self.token.cancel();
        self.handle.await.expect("sensor task panicked")
    }

    /// Waits for `run` to return on its own.
    pub async fn join(self) -> (Sensor, Result<()>) {
        self.handle.await.expect("sensor task panicked")
    }
}
