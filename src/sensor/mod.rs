//! Reconciliation of remotely pushed datasource configuration.
//!
//! [`Sensor`] follows `datasource/config/sensor[id=..]`, folds each
//! notification into a [`DatasourceConfig`] through the path decoder and
//! drives one [`Datasource`] runtime per configured name. Status flows back
//! under `datasource/state/sensor[id=..]`.

mod builder;
mod config_path;
mod datasource;
mod datasource_config;
#[allow(clippy::module_inception)]
mod sensor;

pub use builder::*;
pub use config_path::*;
pub use datasource::*;
pub use datasource_config::*;
pub use sensor::*;
