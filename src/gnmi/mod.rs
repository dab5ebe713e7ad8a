//! Minimal path-addressed publish/subscribe model.
//!
//! Mirrors the subset of gNMI the sensor speaks: keyed hierarchical paths,
//! typed scalar values, `Subscribe` in once/stream mode with a sync marker,
//! and `Set` carrying updates and deletes. The transport behind
//! [`GnmiClient`] is supplied by the embedding application.

mod client;
mod path;
mod value;

pub use client::*;
pub use path::*;
pub use value::*;
