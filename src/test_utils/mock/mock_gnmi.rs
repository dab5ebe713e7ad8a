use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::async_trait;

use crate::GnmiClient;
use crate::Notification;
use crate::Path;
use crate::Result;
use crate::SetRequest;
use crate::SubscribeMode;
use crate::SubscribeRequest;
use crate::SubscribeResponse;
use crate::SubscribeStream;
use crate::TransportError;
use crate::TypedValue;

/// Pushes responses into the config subscription of a [`FakeGnmi`].
#[derive(Clone)]
pub struct ConfigFeed {
    tx: mpsc::UnboundedSender<Result<SubscribeResponse>>,
}

impl ConfigFeed {
    pub fn update(
        &self,
        notification: Notification,
    ) {
        let _ = self.tx.send(Ok(SubscribeResponse::Update(notification)));
    }

    pub fn sync(&self) {
        let _ = self.tx.send(Ok(SubscribeResponse::SyncResponse));
    }

    pub fn fail(
        &self,
        reason: &str,
    ) {
        let _ = self
            .tx
            .send(Err(TransportError::Stream(reason.to_string()).into()));
    }
}

#[derive(Default)]
pub struct FakeGnmi {
    state: Mutex<Vec<Notification>>,
    config_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<SubscribeResponse>>>>,
    subscriptions: Mutex<Vec<SubscribeRequest>>,
    sets: Mutex<Vec<SetRequest>>,
}

impl FakeGnmi {
    pub fn new() -> (Arc<Self>, ConfigFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fake = Self {
            config_rx: Mutex::new(Some(rx)),
            ..Default::default()
        };
        (Arc::new(fake), ConfigFeed { tx })
    }

    /// Seeds the status subtree returned by the one-shot subscription.
    pub fn seed_state(
        &self,
        notification: Notification,
    ) {
        self.state.lock().push(notification);
    }

    pub fn subscriptions(&self) -> Vec<SubscribeRequest> {
        self.subscriptions.lock().clone()
    }

    pub fn sets(&self) -> Vec<SetRequest> {
        self.sets.lock().clone()
    }

    /// Every `(full path, value)` published so far.
    pub fn updates(&self) -> Vec<(Path, TypedValue)> {
        self.sets
            .lock()
            .iter()
            .flat_map(|req| {
                req.updates
                    .iter()
                    .map(|u| (req.prefix.join(&u.path), u.val.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Every full path deleted so far.
    pub fn deletes(&self) -> Vec<Path> {
        self.sets
            .lock()
            .iter()
            .flat_map(|req| {
                req.deletes
                    .iter()
                    .map(|d| req.prefix.join(d))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Values published to `leaf` in the status of datasource `name`, oldest
    /// first.
    pub fn status_values(
        &self,
        name: &str,
        leaf: &str,
    ) -> Vec<TypedValue> {
        self.updates()
            .into_iter()
            .filter(|(path, _)| {
                crate::datasource_name(path) == Some(name) && path.leaf_name() == Some(leaf)
            })
            .map(|(_, val)| val)
            .collect()
    }

    pub fn last_errors(
        &self,
        name: &str,
    ) -> Vec<String> {
        self.status_values(name, "last-error")
            .iter()
            .map(|v| v.as_str().to_string())
            .collect()
    }

    /// Deletes of the whole status subtree of datasource `name`.
    pub fn state_deletes(
        &self,
        name: &str,
    ) -> usize {
        self.deletes()
            .iter()
            .filter(|p| p.leaf_name() == Some("source") && crate::datasource_name(p) == Some(name))
            .count()
    }
}

#[async_trait]
impl GnmiClient for FakeGnmi {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<SubscribeStream> {
        self.subscriptions.lock().push(request.clone());
        match request.mode {
            SubscribeMode::Once => {
                let mut responses: Vec<Result<SubscribeResponse>> = self
                    .state
                    .lock()
                    .iter()
                    .cloned()
                    .map(|n| Ok(SubscribeResponse::Update(n)))
                    .collect();
                responses.push(Ok(SubscribeResponse::SyncResponse));
                Ok(futures::stream::iter(responses).boxed())
            }
            SubscribeMode::Stream => {
                let rx = self.config_rx.lock().take().ok_or_else(|| TransportError::Subscribe {
                    path: request.path.to_string(),
                    reason: "config stream already taken".to_string(),
                })?;
                Ok(UnboundedReceiverStream::new(rx).boxed())
            }
        }
    }

    async fn set(
        &self,
        request: SetRequest,
    ) -> Result<()> {
        self.sets.lock().push(request);
        Ok(())
    }
}
