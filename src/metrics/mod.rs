//! Datasource lifecycle metrics.
//!
//! The sensor reports through a [`MetricTracker`] so embedders can route
//! counters to whatever registry they already expose.


use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;

use crate::Error;
use crate::Result;

pub trait MetricTracker: Send + Sync + 'static {
    /// Adjusts the number of datasources currently known to the sensor.
    fn track_datasources(
        &self,
        delta: i64,
    );

    /// A datasource of `device_type` entered the running state.
    fn track_deploys(
        &self,
        device_type: &str,
    );

    /// A running datasource of `device_type` was torn down for a redeploy.
    fn track_restarts(
        &self,
        device_type: &str,
    );

    /// A datasource run of `device_type` ended with an error of `kind`.
    fn track_errors(
        &self,
        device_type: &str,
        kind: &str,
    );
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricTracker;

impl MetricTracker for NoopMetricTracker {
    fn track_datasources(
        &self,
        _delta: i64,
    ) {
    }

    fn track_deploys(
        &self,
        _device_type: &str,
    ) {
    }

    fn track_restarts(
        &self,
        _device_type: &str,
    ) {
    }

    fn track_errors(
        &self,
        _device_type: &str,
        _kind: &str,
    ) {
    }
}

/// Tracker backed by prometheus collectors registered on a caller-owned
/// [`Registry`].
#[derive(Clone)]
pub struct PrometheusMetricTracker {
    pub datasources: IntGauge,
    pub deploys: IntCounterVec,
    pub restarts: IntCounterVec,
    pub errors: IntCounterVec,
}

impl PrometheusMetricTracker {
    pub fn new(registry: &Registry) -> Result<Self> {
        let datasources = IntGauge::with_opts(Opts::new(
            "sensor_datasources",
            "Number of datasources known to the sensor",
        ))
        .map_err(metric_error)?;
        let deploys = IntCounterVec::new(
            Opts::new("sensor_datasource_deploys", "Datasource runs started"),
            &["type"],
        )
        .map_err(metric_error)?;
        let restarts = IntCounterVec::new(
            Opts::new(
                "sensor_datasource_restarts",
                "Running datasources stopped for a redeploy",
            ),
            &["type"],
        )
        .map_err(metric_error)?;
        let errors = IntCounterVec::new(
            Opts::new("sensor_datasource_errors", "Datasource runs ended by an error"),
            &["type", "kind"],
        )
        .map_err(metric_error)?;

        registry
            .register(Box::new(datasources.clone()))
            .map_err(metric_error)?;
        registry.register(Box::new(deploys.clone())).map_err(metric_error)?;
        registry.register(Box::new(restarts.clone())).map_err(metric_error)?;
        registry.register(Box::new(errors.clone())).map_err(metric_error)?;

        Ok(Self {
            datasources,
            deploys,
            restarts,
            errors,
        })
    }
}

fn metric_error(e: prometheus::Error) -> Error {
    Error::Fatal(format!("metric can not be created: {}", e))
}

impl MetricTracker for PrometheusMetricTracker {
    fn track_datasources(
        &self,
        delta: i64,
    ) {
        self.datasources.add(delta);
    }

    fn track_deploys(
        &self,
        device_type: &str,
    ) {
        self.deploys.with_label_values(&[device_type]).inc();
    }

    fn track_restarts(
        &self,
        device_type: &str,
    ) {
        self.restarts.with_label_values(&[device_type]).inc();
    }

    fn track_errors(
        &self,
        device_type: &str,
        kind: &str,
    ) {
        self.errors.with_label_values(&[device_type, kind]).inc();
    }
}
