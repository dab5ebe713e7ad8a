use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::DatasourceError;
use crate::Error;
use crate::Result;

/// Runs `fut`, turning a panic inside it into [`DatasourceError::Panic`].
pub(crate) async fn catch_panic<F, T>(
    context: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(r) => r,
        Err(payload) => Err(DatasourceError::Panic {
            context: context.to_string(),
            message: panic_message(payload.as_ref()),
        }
        .into()),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Group of tasks sharing one cancellation scope.
///
/// The first task to fail cancels the scope; [`TaskGroup::wait`] joins every
/// task and returns that first error.
pub(crate) struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<Result<()>>,
}

impl TaskGroup {
    /// New group whose scope is a child of `parent`.
    pub(crate) fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: JoinSet::new(),
        }
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn spawn<F>(
        &mut self,
        fut: F,
    ) where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tasks.spawn(fut);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) async fn wait(mut self) -> Result<()> {
        let mut first_err: Option<Error> = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(join_error(e)));
            if let Err(e) = result {
                if first_err.is_none() {
                    self.token.cancel();
                    first_err = Some(e);
                } else {
                    debug!("suppressed error after group cancellation: {}", e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn join_error(e: JoinError) -> Error {
    if e.is_panic() {
        let payload = e.into_panic();
        DatasourceError::Panic {
            context: "task".to_string(),
            message: panic_message(payload.as_ref()),
        }
        .into()
    } else {
        Error::TaskFailed(e)
    }
}
