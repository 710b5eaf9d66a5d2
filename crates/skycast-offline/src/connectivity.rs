//! Connectivity monitoring.
//!
//! Replaces the browser's online/offline events: current state lives
//! in a watch channel, flipped either manually or by a probe loop
//! against the weather API host.

use std::time::Duration;
use tokio::sync::watch;

const PROBE_TIMEOUT_SECS: u64 = 5;

/// Publishes online/offline state to any number of subscribers.
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Start with an assumed state; the first probe corrects it.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state }
    }

    /// Receiver tracking the current state. `changed()` fires on
    /// every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record an observation. Only actual transitions wake subscribers.
    pub fn set_online(&self, online: bool) {
        publish(&self.state, online);
    }

    /// Probe `url` every `interval` and publish the result.
    /// Runs until the monitor is dropped.
    pub fn spawn_probe(&self, url: String, interval: Duration) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();

        tokio::spawn(async move {
            let client = match reqwest::Client::builder()
                .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
                .build()
            {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Connectivity probe disabled: {}", e);
                    return;
                }
            };

            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let online = match client.head(&url).send().await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::debug!("Connectivity probe failed: {}", e);
                        false
                    }
                };
                publish(&state, online);
                if state.is_closed() {
                    break;
                }
            }
        })
    }
}

/// Publish an observation; returns whether it was a transition.
fn publish(state: &watch::Sender<bool>, online: bool) -> bool {
    let transitioned = state.send_if_modified(|current| {
        if *current == online {
            false
        } else {
            *current = online;
            true
        }
    });
    if transitioned {
        tracing::info!(online, "Connectivity changed");
    }
    transitioned
}
