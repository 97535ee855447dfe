pub mod view;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::transport::http::{HttpApi, TransportError};
use crate::transport::StateDelta;

/// Receives the outcome of every poll tick.
///
/// `on_delta` gets the entire delta once per successful poll; iterating
/// the relevant keys and ignoring the rest is the handler's job.
pub trait UpdateHandler: Send + Sync + 'static {
    fn on_delta(&self, delta: &StateDelta);

    /// The server requested a full resync (`page` key).
    fn on_reload(&self) {}

    /// The server recorded a new event (`new_event` key).
    fn on_new_event(&self) {}

    fn on_poll_error(&self, _error: &TransportError) {}
}

/// Polls `GET /update` and feeds deltas to a handler.
///
/// Two states: idle (no poll task) and polling. `stop` returns the client
/// to idle and is safe to call any number of times; `start` while polling
/// is a logged no-op. Ticks are serialized: the next poll is not issued
/// until the previous response has been fully handled, so a slow response
/// can never be applied after a newer one.
pub struct SyncClient {
    api: Arc<HttpApi>,
    poll_interval: Duration,
    max_backoff: Duration,
    poller: Option<JoinHandle<()>>,
}

impl SyncClient {
    pub fn new(api: Arc<HttpApi>, poll_interval: Duration, max_backoff: Duration) -> Self {
        Self {
            api,
            poll_interval,
            max_backoff: max_backoff.max(poll_interval),
            poller: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    pub fn start<H: UpdateHandler>(&mut self, handler: H) {
        if self.poller.is_some() {
            warn!("start called while already polling, ignoring");
            return;
        }

        let api = self.api.clone();
        let interval = self.poll_interval;
        let max_backoff = self.max_backoff;
        info!(
            base_url = %api.base_url(),
            interval_ms = interval.as_millis() as u64,
            "poller starting"
        );

        self.poller = Some(tokio::spawn(poll_loop(api, interval, max_backoff, handler)));
    }

    /// Stop polling. An in-flight request is cancelled at its next await
    /// point. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
            let _ = handle.await; // Ignore cancellation errors
            info!("poller stopped");
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
        }
    }
}

async fn poll_loop<H: UpdateHandler>(
    api: Arc<HttpApi>,
    interval: Duration,
    max_backoff: Duration,
    handler: H,
) {
    let mut delay = interval;
    loop {
        sleep(delay).await;

        match api.fetch_update().await {
            Ok(delta) => {
                if delay > interval {
                    debug!("poll recovered, resetting backoff");
                }
                delay = interval;

                handler.on_delta(&delta);
                if delta.has_new_event() {
                    handler.on_new_event();
                }
                if delta.reload_requested() {
                    handler.on_reload();
                }
            }
            Err(e) => {
                handler.on_poll_error(&e);
                delay = (delay * 2).min(max_backoff);
                warn!(
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "poll failed, backing off"
                );
            }
        }
    }
}
