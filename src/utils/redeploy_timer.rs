use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One-shot, re-armable debounce timer.
///
/// On expiry it sends its datasource name to the sensor loop rather than
/// touching any state itself. Created disarmed.
pub(crate) struct RedeployTimer {
    name: String,
    tx: mpsc::UnboundedSender<String>,
    handle: Option<JoinHandle<()>>,
}

impl RedeployTimer {
    pub(crate) fn new(
        name: impl Into<String>,
        tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tx,
            handle: None,
        }
    }

    /// (Re)arms the timer to fire after `delay`. A pending expiry is dropped.
    pub(crate) fn reset(
        &mut self,
        delay: Duration,
    ) {
        self.stop();
        let name = self.name.clone();
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the sensor loop has exited
            let _ = tx.send(name);
        }));
    }

    /// Disarms the timer. Returns whether an expiry was still pending.
    pub(crate) fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RedeployTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
