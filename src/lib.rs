//! Core of a telemetry sensor agent.
//!
//! A [`Sensor`] subscribes to its slice of remotely pushed datasource
//! configuration, keeps one supervised [`Datasource`] runtime per configured
//! name, and reports status and liveness back over the same
//! publish/subscribe channel. Device implementations plug in through a
//! [`DeviceRegistry`]; the wire transport plugs in through [`GnmiClient`].

mod backend;
mod config;
mod device;
mod errors;
mod gnmi;
mod metrics;
mod sensor;
pub mod utils;

pub use backend::*;
pub use config::*;
pub use device::*;
pub use errors::*;
pub use gnmi::*;
pub use metrics::*;
pub use sensor::*;
pub use utils::init_observability;
pub use utils::LogLevel;
pub use utils::LogLevelControl;
pub use utils::NoopLogLevelControl;
pub use utils::ReloadLogLevelControl;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
