use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use super::SetRequest;
use super::SubscribeRequest;
use super::SubscribeResponse;
use crate::Result;

/// Responses of one subscription. The stream ends when the server closes it.
pub type SubscribeStream = BoxStream<'static, Result<SubscribeResponse>>;

/// Control-channel client. Implementations own the wire transport; the
/// sensor only reads through this handle and never mutates it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GnmiClient: Send + Sync + 'static {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<SubscribeStream>;

    async fn set(
        &self,
        request: SetRequest,
    ) -> Result<()>;
}
