//! In-memory collaborators for exercising the sensor without a transport.
//!
//! - [`FakeGnmi`] serves the status resync from seeded notifications, feeds
//!   the config subscription from a [`ConfigFeed`] and records every `Set`.
//! - [`DeviceScript`] and [`mock_registry`] provide a `mock` device type whose
//!   construction, provider activity and backend registration are counted.
//! - [`LogLevelRecorder`] captures per-datasource `log-level` changes.
//! - [`SensorHarness`] wires all of them into a running [`crate::Sensor`].

mod mock_builder;
mod mock_device;
mod mock_gnmi;
mod mock_log_levels;

pub use mock_builder::*;
pub use mock_device::*;
pub use mock_gnmi::*;
pub use mock_log_levels::*;
