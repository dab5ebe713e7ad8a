//! Device capability set consumed by a datasource.
//!
//! A [`Device`] is built from `(type, options)` through a
//! [`DeviceRegistry`], exposes identity and liveness, and enumerates the
//! [`Provider`]s that do the actual collection. A device that fans out to
//! further devices also exposes a [`Manager`].

mod info;
mod inventory;
mod option;
mod registry;

pub use info::*;
pub use inventory::*;
pub use option::*;
pub use registry::*;

#[cfg(test)]
mod inventory_test;

//---
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;
use tonic::transport::Channel;

use crate::BackendClient;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Device: Send + Sync + 'static {
    /// Stable identity the backend knows the device by.
    async fn device_id(&self) -> Result<String>;

    /// Liveness script, polled once per heartbeat interval.
    async fn alive(&self) -> Result<bool>;

    /// Collection units to run for this device. Called once per run.
    fn providers(&self) -> Result<Vec<Provider>>;

    /// Management capability, for devices that fan out to sub-devices.
    fn manager(&self) -> Option<Arc<dyn Manager>> {
        None
    }

    /// Management address reported with the device metadata.
    fn ip_addr(&self) -> Option<String> {
        None
    }
}

/// Adds and removes sub-devices through an [`Inventory`] until cancelled.
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    async fn manage(
        &self,
        token: CancellationToken,
        inventory: Arc<dyn Inventory>,
    ) -> Result<()>;
}

/// Provider that publishes through a per-device backend client.
#[async_trait]
pub trait GnmiProvider: Send + Sync + 'static {
    fn init_gnmi(
        &mut self,
        client: Arc<dyn BackendClient>,
    );

    async fn run(
        &self,
        token: CancellationToken,
    ) -> Result<()>;
}

/// Provider that talks over a raw gRPC connection.
#[async_trait]
pub trait GrpcProvider: Send + Sync + 'static {
    fn init_grpc(
        &mut self,
        channel: Channel,
    );

    async fn run(
        &self,
        token: CancellationToken,
    ) -> Result<()>;
}

/// Initialisation style of a provider, decided once at startup.
pub enum Provider {
    Gnmi(Box<dyn GnmiProvider>),
    Grpc(Box<dyn GrpcProvider>),
}

impl Provider {
    pub fn kind(&self) -> &'static str {
        match self {
            Provider::Gnmi(_) => "gnmi",
            Provider::Grpc(_) => "grpc",
        }
    }

    pub async fn run(
        self,
        token: CancellationToken,
    ) -> Result<()> {
        match self {
            Provider::Gnmi(p) => p.run(token).await,
            Provider::Grpc(p) => p.run(token).await,
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Provider({})", self.kind())
    }
}

/// Turns a credential reference from config into the secret itself.
#[async_trait]
pub trait CredentialResolver: Send + Sync + 'static {
    async fn resolve(
        &self,
        reference: &str,
    ) -> Result<String>;
}

/// Treats the reference as the credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughResolver;

#[async_trait]
impl CredentialResolver for PassthroughResolver {
    async fn resolve(
        &self,
        reference: &str,
    ) -> Result<String> {
        Ok(reference.to_string())
    }
}
