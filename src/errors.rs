//! Sensor Error Hierarchy
//!
//! Errors are split by blast radius: transport failures break the control
//! channel and end the sensor loop, datasource failures are contained in a
//! single datasource and surface only as published status.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Publish/subscribe channel failures. Fatal to the sensor loop.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Failures scoped to one datasource run
    #[error(transparent)]
    Datasource(#[from] DatasourceError),

    /// Settings loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening a subscription failed
    #[error("Subscribe to {path} failed: {reason}")]
    Subscribe { path: String, reason: String },

    /// A Set request was rejected or could not be delivered
    #[error("Set request failed: {0}")]
    Set(String),

    /// The subscription stream reported an error mid-flight
    #[error("Subscription stream error: {0}")]
    Stream(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DatasourceError {
    /// No device constructor is registered for the configured type
    #[error("device type {device_type:?} not found")]
    DeviceNotFound { device_type: String },

    /// Option key that the device schema does not declare
    #[error("bad option {option:?} for device {device_type:?}")]
    BadOption { option: String, device_type: String },

    /// Required option absent from the merged options
    #[error("required option {option:?} not provided")]
    MissingOption { option: String },

    /// Option present but not parseable as the requested kind
    #[error("invalid value {value:?} for option {option:?}")]
    InvalidOption { option: String, value: String },

    /// Device constructor rejected the configuration
    #[error("device construction failed: {0}")]
    Construction(String),

    /// Credential reference could not be resolved
    #[error("unable to resolve credential for {key}: {reason}")]
    Credential { key: String, reason: String },

    /// Device identity lookup failed
    #[error("failed to resolve device id: {0}")]
    DeviceId(String),

    /// Backend refused the device registration
    #[error("error sending device metadata for device {device_id:?} ({device_type}): {reason}")]
    Metadata {
        device_id: String,
        device_type: String,
        reason: String,
    },

    /// A raw-connection provider was requested but no channel is configured
    #[error("no gRPC connection available for provider of device {device_id:?}")]
    NoGrpcConnection { device_id: String },

    /// A provider returned an error
    #[error("provider exiting with error: {0}")]
    Provider(String),

    /// The device management loop returned an error
    #[error("error in Manage: {0}")]
    Manage(String),

    /// A panic caught at a task boundary
    #[error("fatal error in {context}: {message}")]
    Panic { context: String, message: String },
}

impl Error {
    /// True for errors that invalidate the control channel itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Short label used when counting datasource failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::Datasource(e) => e.kind(),
            Error::Config(_) => "config",
            Error::TaskFailed(_) => "taskFailed",
            Error::Fatal(_) => "fatal",
        }
    }
}

impl DatasourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            DatasourceError::DeviceNotFound { .. }
            | DatasourceError::BadOption { .. }
            | DatasourceError::MissingOption { .. }
            | DatasourceError::InvalidOption { .. }
            | DatasourceError::Construction(_)
            | DatasourceError::Credential { .. } => "badConfig",
            DatasourceError::DeviceId(_) => "deviceId",
            DatasourceError::Metadata { .. } => "metadata",
            DatasourceError::NoGrpcConnection { .. } => "noGrpcConnection",
            DatasourceError::Provider(_) => "provider",
            DatasourceError::Manage(_) => "manage",
            DatasourceError::Panic { .. } => "panic",
        }
    }
}
