//! Background sync: tag registry and the weather sync pass.
//!
//! A failed weather fetch registers the `weather-sync` tag; once
//! connectivity is back, the bridge replays the pending list from the
//! shared store, broadcasting each result to connected clients.
//! Failures are re-queued, matching the main queue's policy.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

use skycast_offline::{
    ClientMessage, Notification, Notifier, QueuedRequest, SharedStore, StoreError, WeatherFetch,
    WorkerMessage, KEY_PENDING_REQUESTS,
};

use crate::clients::ClientRegistry;

/// Sync tag for queued weather lookups.
pub const SYNC_TAG_WEATHER: &str = "weather-sync";

/// Registered sync tags waiting for connectivity.
#[derive(Default)]
pub struct SyncRegistry {
    tags: Mutex<BTreeSet<String>>,
    changed: Notify,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag; returns false if it was already pending.
    /// Registration is idempotent, like the platform API it mirrors.
    pub fn register(&self, tag: &str) -> bool {
        let inserted = self.tags.lock().insert(tag.to_string());
        if inserted {
            tracing::debug!(tag, "Sync registered");
            self.changed.notify_one();
        }
        inserted
    }

    /// Tags currently pending, in sorted order.
    pub fn pending(&self) -> Vec<String> {
        self.tags.lock().iter().cloned().collect()
    }

    /// Take every pending tag.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.tags.lock()).into_iter().collect()
    }

    /// Wait until a tag has been registered since the last wait.
    pub async fn notified(&self) {
        self.changed.notified().await;
    }
}

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    pub synced: usize,
    pub requeued: usize,
}

/// Replays pending weather requests for the worker context.
pub struct SyncBridge {
    store: SharedStore,
    fetcher: Arc<dyn WeatherFetch>,
    notifier: Arc<dyn Notifier>,
    clients: Arc<ClientRegistry>,
    registry: Arc<SyncRegistry>,
}

impl SyncBridge {
    pub fn new(
        store: SharedStore,
        fetcher: Arc<dyn WeatherFetch>,
        notifier: Arc<dyn Notifier>,
        clients: Arc<ClientRegistry>,
        registry: Arc<SyncRegistry>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            clients,
            registry,
        }
    }

    pub fn registry(&self) -> Arc<SyncRegistry> {
        self.registry.clone()
    }

    /// Handle a message from an app context.
    pub fn handle_message(&self, message: WorkerMessage) -> Result<(), StoreError> {
        match message {
            WorkerMessage::QueueWeatherRequest(request) => {
                let mut pending: Vec<QueuedRequest> = self.store.get_list(KEY_PENDING_REQUESTS)?;
                tracing::info!(city = %request.city_name, "Worker queueing request");
                pending.push(request);
                self.store.put(KEY_PENDING_REQUESTS, &pending)?;
                self.registry.register(SYNC_TAG_WEATHER);
                Ok(())
            }
        }
    }

    /// Handle a fired sync event. Unknown tags are ignored.
    pub async fn handle_sync(&self, tag: &str) -> Result<SyncOutcome, StoreError> {
        if tag != SYNC_TAG_WEATHER {
            tracing::debug!(tag, "Ignoring unknown sync tag");
            return Ok(SyncOutcome::default());
        }
        self.sync_weather_requests().await
    }

    /// Replay the pending list: clear it up front, attempt every
    /// request, and append the failures back onto the stored list so
    /// the next trigger retries them.
    async fn sync_weather_requests(&self) -> Result<SyncOutcome, StoreError> {
        let pending: Vec<QueuedRequest> = self.store.get_list(KEY_PENDING_REQUESTS)?;
        if pending.is_empty() {
            return Ok(SyncOutcome::default());
        }

        tracing::info!(count = pending.len(), "Background sync replaying requests");
        self.store
            .put(KEY_PENDING_REQUESTS, &Vec::<QueuedRequest>::new())?;

        let mut outcome = SyncOutcome::default();
        let mut failed = Vec::new();

        for request in pending {
            match self.fetcher.fetch_city(&request.city_name).await {
                Ok(report) => {
                    self.clients.broadcast(&ClientMessage::WeatherDataSynced {
                        request: request.clone(),
                        report,
                    });
                    self.notifier
                        .show_if_granted(&Notification::weather_update(&request.city_name));
                    outcome.synced += 1;
                }
                Err(e) => {
                    tracing::warn!(city = %request.city_name, "Sync fetch failed: {}", e);
                    failed.push(request);
                }
            }
        }

        if !failed.is_empty() {
            outcome.requeued = failed.len();
            let mut current: Vec<QueuedRequest> = self.store.get_list(KEY_PENDING_REQUESTS)?;
            current.extend(failed);
            self.store.put(KEY_PENDING_REQUESTS, &current)?;
        }

        Ok(outcome)
    }

    /// Run the sync loop: whenever a tag is registered (or connectivity
    /// returns) while online, fire the pending sync events. Ends when
    /// the connectivity channel closes.
    pub fn spawn_sync_loop(
        self: &Arc<Self>,
        mut online: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let bridge = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = bridge.registry.notified() => {}
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                if !*online.borrow_and_update() {
                    continue;
                }

                for tag in bridge.registry.drain() {
                    match bridge.handle_sync(&tag).await {
                        Ok(outcome) if outcome.synced + outcome.requeued > 0 => {
                            tracing::info!(?outcome, %tag, "Sync pass finished");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(%tag, "Sync pass failed: {}", e),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use async_trait::async_trait;
    use skycast_offline::{NotificationPermission, RecordingNotifier};
    use skycast_weather::client::WeatherError;
    use skycast_weather::WeatherReport;
    use std::collections::HashSet;

    struct FakeFetcher {
        failing: HashSet<String>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                failing: HashSet::new(),
            }
        }

        fn fail_for(mut self, city: &str) -> Self {
            self.failing.insert(city.to_string());
            self
        }
    }

    fn report_for(city: &str) -> WeatherReport {
        serde_json::from_value(serde_json::json!({
            "location": {
                "name": city, "region": "", "country": "Testland",
                "lat": 0.0, "lon": 0.0
            },
            "current": {
                "temp_c": 20.0, "temp_f": 68.0,
                "condition": {"text": "Clear", "icon": "", "code": 1000},
                "humidity": 50, "pressure_mb": 1013.0, "vis_km": 10.0
            }
        }))
        .unwrap()
    }

    #[async_trait]
    impl WeatherFetch for FakeFetcher {
        async fn fetch_city(&self, city_name: &str) -> Result<WeatherReport, WeatherError> {
            if self.failing.contains(city_name) {
                return Err(WeatherError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(report_for(city_name))
        }
    }

    struct Harness {
        bridge: Arc<SyncBridge>,
        store: SharedStore,
        notifier: Arc<RecordingNotifier>,
        clients: Arc<ClientRegistry>,
        registry: Arc<SyncRegistry>,
    }

    fn harness(fetcher: FakeFetcher) -> Harness {
        let store = SharedStore::in_memory().unwrap();
        let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
        let clients = Arc::new(ClientRegistry::new());
        let registry = Arc::new(SyncRegistry::new());
        let bridge = Arc::new(SyncBridge::new(
            store.clone(),
            Arc::new(fetcher),
            notifier.clone(),
            clients.clone(),
            registry.clone(),
        ));
        Harness {
            bridge,
            store,
            notifier,
            clients,
            registry,
        }
    }

    fn seed(store: &SharedStore, cities: &[&str]) {
        let pending: Vec<QueuedRequest> =
            cities.iter().map(|c| QueuedRequest::weather(c)).collect();
        store.put(KEY_PENDING_REQUESTS, &pending).unwrap();
    }

    #[tokio::test]
    async fn test_queue_message_persists_and_registers() {
        let h = harness(FakeFetcher::new());

        h.bridge
            .handle_message(WorkerMessage::QueueWeatherRequest(QueuedRequest::weather(
                "Paris",
            )))
            .unwrap();

        let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(h.registry.pending(), vec![SYNC_TAG_WEATHER.to_string()]);
    }

    #[tokio::test]
    async fn test_sync_replays_and_clears() {
        let h = harness(FakeFetcher::new());
        seed(&h.store, &["Paris", "Tokyo"]);
        let (_id, mut rx) = h.clients.connect("/");

        let outcome = h.bridge.handle_sync(SYNC_TAG_WEATHER).await.unwrap();

        assert_eq!(outcome, SyncOutcome { synced: 2, requeued: 0 });
        let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
        assert!(stored.is_empty());

        // Broadcasts arrive in request order
        let ClientMessage::WeatherDataSynced { request, .. } = rx.recv().await.unwrap();
        assert_eq!(request.city_name, "Paris");
        let ClientMessage::WeatherDataSynced { request, .. } = rx.recv().await.unwrap();
        assert_eq!(request.city_name, "Tokyo");

        assert_eq!(h.notifier.shown().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_requeues_failures() {
        let h = harness(FakeFetcher::new().fail_for("Atlantis"));
        seed(&h.store, &["Paris", "Atlantis"]);

        let outcome = h.bridge.handle_sync(SYNC_TAG_WEATHER).await.unwrap();

        assert_eq!(outcome, SyncOutcome { synced: 1, requeued: 1 });
        // Only the failed request is left for the next trigger
        let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].city_name, "Atlantis");
    }

    #[tokio::test]
    async fn test_unknown_tag_is_ignored() {
        let h = harness(FakeFetcher::new());
        seed(&h.store, &["Paris"]);

        let outcome = h.bridge.handle_sync("something-else").await.unwrap();

        assert_eq!(outcome, SyncOutcome::default());
        let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_with_empty_list_is_noop() {
        let h = harness(FakeFetcher::new());
        let outcome = h.bridge.handle_sync(SYNC_TAG_WEATHER).await.unwrap();
        assert_eq!(outcome, SyncOutcome::default());
        assert!(h.notifier.shown().is_empty());
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = SyncRegistry::new();
        assert!(registry.register(SYNC_TAG_WEATHER));
        assert!(!registry.register(SYNC_TAG_WEATHER));
        assert_eq!(registry.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_loop_fires_on_registration_when_online() {
        let h = harness(FakeFetcher::new());
        let (online_tx, online_rx) = watch::channel(true);
        let handle = h.bridge.spawn_sync_loop(online_rx);

        h.bridge
            .handle_message(WorkerMessage::QueueWeatherRequest(QueuedRequest::weather(
                "Paris",
            )))
            .unwrap();

        let mut waited = 0;
        loop {
            let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
            if stored.is_empty() || waited >= 100 {
                assert!(stored.is_empty(), "sync loop never drained the store");
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            waited += 1;
        }

        assert_eq!(h.notifier.shown().len(), 1);
        drop(online_tx);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_sync_loop_waits_for_connectivity() {
        let h = harness(FakeFetcher::new());
        let (online_tx, online_rx) = watch::channel(false);
        let handle = h.bridge.spawn_sync_loop(online_rx);

        h.bridge
            .handle_message(WorkerMessage::QueueWeatherRequest(QueuedRequest::weather(
                "Paris",
            )))
            .unwrap();

        // Offline: nothing must happen
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
        assert_eq!(stored.len(), 1);

        // Reconnect: the pending tag fires
        online_tx.send(true).unwrap();
        let mut waited = 0;
        while !h.store.get_list::<QueuedRequest>(KEY_PENDING_REQUESTS).unwrap().is_empty()
            && waited < 100
        {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            waited += 1;
        }
        let stored: Vec<QueuedRequest> = h.store.get_list(KEY_PENDING_REQUESTS).unwrap();
        assert!(stored.is_empty());

        drop(online_tx);
        let _ = handle.await;
    }
}
