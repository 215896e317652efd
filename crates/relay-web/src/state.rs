//! Application state.

use relay_core::Broadcaster;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
    pub heartbeat_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// `shutdown` flips to `true` when the server is stopping; push
    /// channels end their streams when it does.
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        heartbeat_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            broadcaster,
            heartbeat_interval,
            shutdown,
        }
    }

    /// Resolves once shutdown has been requested.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        wait_for_shutdown(self.shutdown.clone())
    }
}

/// Wait until the shutdown flag is set. A dropped sender means shutdown can
/// no longer be requested, so this then never resolves.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
