use std::time::Duration;

use crate::Notification;
use crate::Path;
use crate::SensorSettings;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub const SENSOR_ID: &str = "sensor1";
pub const REDEPLOY_DELAY: Duration = Duration::from_millis(100);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

pub fn test_settings() -> SensorSettings {
    let mut settings = SensorSettings::default();
    settings.sensor.id = SENSOR_ID.to_string();
    settings.sensor.hostname = "collector-0".to_string();
    settings.sensor.ip = "10.0.0.1".to_string();
    settings.timing.redeploy_delay_in_ms = REDEPLOY_DELAY.as_millis() as u64;
    settings.timing.heartbeat_interval_in_ms = HEARTBEAT_INTERVAL.as_millis() as u64;
    settings
}

/// `datasource/config/sensor[id=SENSOR_ID]`
pub fn config_prefix() -> Path {
    Path::parse(&format!("datasource/config/sensor[id={}]", SENSOR_ID))
}

/// `datasource/state/sensor[id=SENSOR_ID]`
pub fn state_prefix() -> Path {
    Path::parse(&format!("datasource/state/sensor[id={}]", SENSOR_ID))
}

/// Full config notification for one datasource, leaf by leaf.
pub fn datasource_notification(
    name: &str,
    device_type: &str,
    enabled: bool,
    options: &[(&str, &str)],
) -> Notification {
    let mut n = Notification::new(config_prefix())
        .update(format!("source[name={}]/name", name).as_str(), name)
        .update(format!("source[name={}]/type", name).as_str(), device_type)
        .update(format!("source[name={}]/enabled", name).as_str(), enabled);
    for (k, v) in options {
        n = n.update(
            format!("source[name={}]/option[key={}]/value", name, k).as_str(),
            *v,
        );
    }
    n
}

/// Single option leaf change.
pub fn option_notification(
    name: &str,
    key: &str,
    value: &str,
) -> Notification {
    Notification::new(config_prefix()).update(
        format!("source[name={}]/option[key={}]/value", name, key).as_str(),
        value,
    )
}

/// Polls `cond` on virtual time until it holds, panicking after ~5s.
pub async fn wait_until<F>(
    what: &str,
    mut cond: F,
) where
    F: FnMut() -> bool,
{
    for _ in 0..5_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Lets spawned tasks run without moving the clock far.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
