//! The offline request queue.
//!
//! City lookups that fail while offline land here; a connectivity
//! transition or a periodic timer drains the queue. Persistence,
//! fetching, and notification are injected so tests run against
//! in-memory fakes.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use skycast_weather::client::WeatherError;
use skycast_weather::{WeatherClient, WeatherQuery, WeatherReport};

use crate::messages::{AppEvent, SyncSource};
use crate::notify::{Notification, Notifier};
use crate::store::{SharedStore, StoreError, KEY_PENDING_REQUESTS};

/// Kind tag carried by every queued request.
///
/// Only weather lookups exist today; the tag keeps the persisted shape
/// extensible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    #[default]
    Weather,
}

/// A lookup waiting for connectivity.
///
/// Persisted as JSON under `pendingWeatherRequests`; field names keep
/// the store format readable (`cityName`, `type`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    #[serde(rename = "cityName")]
    pub city_name: String,
    /// Milliseconds since the epoch, at queue time
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: RequestKind,
}

impl QueuedRequest {
    /// New weather request stamped with the current time.
    /// Ids are not unique by construction; duplicates may coexist.
    pub fn weather(city_name: &str) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self {
            id: format!("{}-{}", city_name, timestamp),
            city_name: city_name.to_string(),
            timestamp,
            kind: RequestKind::Weather,
        }
    }
}

/// Network seam for the queue: fetch current weather for a city.
#[async_trait]
pub trait WeatherFetch: Send + Sync {
    async fn fetch_city(&self, city_name: &str) -> Result<WeatherReport, WeatherError>;
}

#[async_trait]
impl WeatherFetch for WeatherClient {
    async fn fetch_city(&self, city_name: &str) -> Result<WeatherReport, WeatherError> {
        self.current(&WeatherQuery::city(city_name)).await
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainOutcome {
    pub succeeded: usize,
    pub requeued: usize,
}

/// The offline request queue.
///
/// Loads any persisted requests on construction, so the queue survives
/// restarts. Use through an `Arc`.
pub struct OfflineQueue {
    store: SharedStore,
    fetcher: Arc<dyn WeatherFetch>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<AppEvent>,
    online: watch::Receiver<bool>,
    pending: Mutex<Vec<QueuedRequest>>,
}

impl OfflineQueue {
    pub fn new(
        store: SharedStore,
        fetcher: Arc<dyn WeatherFetch>,
        notifier: Arc<dyn Notifier>,
        online: watch::Receiver<bool>,
    ) -> Result<Self, StoreError> {
        let pending = store.get_list::<QueuedRequest>(KEY_PENDING_REQUESTS)?;
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Loaded persisted offline queue");
        }
        let (events, _) = broadcast::channel(32);

        Ok(Self {
            store,
            fetcher,
            notifier,
            events,
            online,
            pending: Mutex::new(pending),
        })
    }

    /// Subscribe to events raised for successfully processed requests.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Whether the last connectivity observation was online.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Number of requests currently waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Snapshot of the requests currently waiting, in queue order.
    pub fn pending(&self) -> Vec<QueuedRequest> {
        self.pending.lock().clone()
    }

    /// Drop every pending request.
    pub fn clear_pending(&self) -> Result<(), StoreError> {
        self.pending.lock().clear();
        self.persist_snapshot()
    }

    /// Append a request and persist the full list. If currently
    /// online, an immediate drain is scheduled.
    pub fn queue_request(self: &Arc<Self>, city_name: &str) -> Result<QueuedRequest, StoreError> {
        let request = QueuedRequest::weather(city_name);
        {
            let mut pending = self.pending.lock();
            pending.push(request.clone());
        }
        self.persist_snapshot()?;
        tracing::info!(city = %request.city_name, id = %request.id, "Request queued");

        if self.is_online() {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = queue.process_pending().await {
                    tracing::error!("Immediate drain failed: {}", e);
                }
            });
        }

        Ok(request)
    }

    /// Drain the queue: no-op when offline or empty. The in-memory
    /// queue is swapped for an empty one before processing, so requests
    /// queued mid-drain are preserved; failures are pushed back onto
    /// the live queue and retried on the next trigger, not this pass.
    pub async fn process_pending(self: &Arc<Self>) -> Result<DrainOutcome, StoreError> {
        if !self.is_online() {
            return Ok(DrainOutcome::default());
        }

        let captured = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                return Ok(DrainOutcome::default());
            }
            std::mem::take(&mut *pending)
        };
        // Persist the (now mostly empty) live queue before the pass;
        // a crash from here on can lose at most the captured batch.
        self.persist_snapshot()?;

        tracing::info!(count = captured.len(), "Processing pending requests");

        let mut outcome = DrainOutcome::default();
        for request in captured {
            match self.process_request(&request).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    tracing::warn!(city = %request.city_name, "Requeueing failed request: {}", e);
                    self.pending.lock().push(request);
                    outcome.requeued += 1;
                }
            }
        }

        self.persist_snapshot()?;
        Ok(outcome)
    }

    /// Periodically and on every offline→online transition, drain the
    /// queue. Runs until the connectivity channel closes.
    pub fn spawn_triggers(
        self: &Arc<Self>,
        refresh_every: Option<Duration>,
    ) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        let mut online = self.online.clone();

        tokio::spawn(async move {
            let mut ticker = refresh_every.map(tokio::time::interval);
            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *online.borrow_and_update() {
                            tracing::debug!("Back online, draining queue");
                            if let Err(e) = queue.process_pending().await {
                                tracing::error!("Drain after reconnect failed: {}", e);
                            }
                        }
                    }
                    _ = tick_or_never(&mut ticker) => {
                        if let Err(e) = queue.process_pending().await {
                            tracing::error!("Periodic drain failed: {}", e);
                        }
                    }
                }
            }
        })
    }

    async fn process_request(&self, request: &QueuedRequest) -> Result<(), WeatherError> {
        let report = self.fetcher.fetch_city(&request.city_name).await?;

        let _ = self.events.send(AppEvent::WeatherReceived {
            request: request.clone(),
            report,
            source: SyncSource::QueueDrain,
        });

        self.notifier
            .show_if_granted(&Notification::weather_update(&request.city_name));

        tracing::info!(city = %request.city_name, "Request processed");
        Ok(())
    }

    fn persist_snapshot(&self) -> Result<(), StoreError> {
        let snapshot = self.pending.lock().clone();
        self.store.put(KEY_PENDING_REQUESTS, &snapshot)
    }
}

async fn tick_or_never(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
