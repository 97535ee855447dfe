use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use crate::client::config::Config;
use crate::sync::view::FleetView;
use crate::sync::{SyncClient, UpdateHandler};
use crate::transport::http::{HttpApi, TransportError};
use crate::transport::StateDelta;

/// Applies deltas to a shared `FleetView` and narrates them to the log,
/// standing in for the dashboard DOM.
pub struct ViewHandler {
    view: Arc<Mutex<FleetView>>,
}

impl ViewHandler {
    pub fn new(view: Arc<Mutex<FleetView>>) -> Self {
        Self { view }
    }

    fn view(&self) -> MutexGuard<'_, FleetView> {
        match self.view.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl UpdateHandler for ViewHandler {
    fn on_delta(&self, delta: &StateDelta) {
        if delta.is_empty() {
            return;
        }

        let mut view = self.view();
        let summary = view.apply(delta);
        for id in &summary.devices_touched {
            if let Some(device) = view.device(id) {
                info!(
                    node = %id,
                    last_updated = device.last_updated.as_deref().unwrap_or("-"),
                    images = device.images.iter().filter(|i| i.is_some()).count(),
                    "device updated"
                );
            }
        }
    }

    fn on_reload(&self) {
        // The apply pass already dropped the cache
        info!("server requested a full resync");
    }

    fn on_new_event(&self) {
        info!("new event recorded on the server");
    }

    fn on_poll_error(&self, error: &TransportError) {
        warn!(error = %error, "poll failed");
    }
}

/// Watch the fleet until Ctrl+C, then stop the poller.
pub async fn run(config: Config) -> Result<()> {
    let api = Arc::new(HttpApi::new(&config.base_url, config.request_timeout())?);
    info!(
        base_url = %config.base_url,
        interval_ms = config.poll_interval_ms,
        "console starting"
    );

    let view = Arc::new(Mutex::new(FleetView::new()));
    let mut client = SyncClient::new(api, config.poll_interval(), config.max_backoff());
    client.start(ViewHandler::new(view.clone()));

    signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received, stopping console");

    client.stop().await;

    let view = match view.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    info!(
        devices = view.devices().count(),
        resyncs = view.resync_count(),
        events = view.event_count(),
        "final view state"
    );

    Ok(())
}
