//! Wires the subsystems together for the CLI entry points.

use anyhow::{Context, Result};
use std::sync::Arc;

use skycast_core::Config;
use skycast_offline::{
    AppEvent, ConnectivityMonitor, LogNotifier, Notifier, OfflineQueue, QueuedRequest,
    RecentSearches, SharedStore, WorkerMessage,
};
use skycast_weather::client::WeatherError;
use skycast_weather::{LocationProvider, TemperatureUnit, WeatherClient, WeatherQuery};
use skycast_worker::{AssetCache, ClientRegistry, PushHandler, SyncBridge, SyncRegistry};

use crate::reminder;

pub struct App {
    config: Config,
    client: WeatherClient,
    recent: RecentSearches,
    queue: Arc<OfflineQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    bridge: Arc<SyncBridge>,
    sync_registry: Arc<SyncRegistry>,
    clients: Arc<ClientRegistry>,
    notifier: Arc<dyn Notifier>,
    push: PushHandler,
    location: Option<LocationProvider>,
    unit: TemperatureUnit,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api_key = config.api.resolved_key().unwrap_or_default();
        let client = WeatherClient::new(&config.api.base_url, &api_key)
            .context("Failed to build weather client")?;

        let store = SharedStore::open(config.storage.data_dir().join("store.db"))
            .context("Failed to open shared store")?;
        let recent = RecentSearches::new(store.clone());

        let notifier: Arc<dyn Notifier> =
            Arc::new(LogNotifier::new(config.notifications.enabled));
        let connectivity = Arc::new(ConnectivityMonitor::new(true));

        let queue = Arc::new(OfflineQueue::new(
            store.clone(),
            Arc::new(client.clone()),
            notifier.clone(),
            connectivity.subscribe(),
        )?);

        let clients = Arc::new(ClientRegistry::new());
        let sync_registry = Arc::new(SyncRegistry::new());
        let bridge = Arc::new(SyncBridge::new(
            store.clone(),
            Arc::new(client.clone()),
            notifier.clone(),
            clients.clone(),
            sync_registry.clone(),
        ));

        let push = PushHandler::new(notifier.clone(), clients.clone());

        let unit = match config.weather.temperature_unit {
            skycast_core::TemperatureUnit::Fahrenheit => TemperatureUnit::Fahrenheit,
            _ => TemperatureUnit::Celsius,
        };

        Ok(Self {
            config,
            client,
            recent,
            queue,
            connectivity,
            bridge,
            sync_registry,
            clients,
            notifier,
            push,
            location: LocationProvider::platform_default(),
            unit,
        })
    }

    /// Interactive city lookup. While offline the request is queued
    /// for replay instead.
    pub async fn search(&self, city: &str) -> Result<()> {
        if !self.connectivity.is_online() {
            let request = self.queue.queue_request(city)?;
            println!(
                "Offline - queued \"{}\" for when connectivity returns.",
                request.city_name
            );
            return Ok(());
        }

        match self.client.current(&WeatherQuery::city(city)).await {
            Ok(report) => {
                self.recent.record(&report.location.name)?;
                println!("{}", report.summary(self.unit));
                Ok(())
            }
            Err(WeatherError::Network(e)) => {
                tracing::warn!("Interactive fetch failed: {}", e);
                self.connectivity.set_online(false);
                let request = self.queue.queue_request(city)?;
                println!(
                    "Network error - queued \"{}\" for when connectivity returns.",
                    request.city_name
                );
                Ok(())
            }
            Err(e) => {
                // Stale weather output is suppressed; only the message shows
                println!("{}", e.user_message());
                Ok(())
            }
        }
    }

    /// Look up weather for the device's current position.
    pub async fn locate(&self) -> Result<()> {
        let Some(provider) = &self.location else {
            println!("Location services are not available on this system.");
            return Ok(());
        };

        let position = match provider.current_position().await {
            Ok(position) => position,
            Err(e) => {
                println!("{}", e.user_message());
                return Ok(());
            }
        };

        let query = WeatherQuery::coords(position.latitude, position.longitude);
        match self.client.current(&query).await {
            Ok(report) => {
                self.recent.record(&report.location.name)?;
                println!("{}", report.summary(self.unit));
            }
            Err(e) => println!("{}", e.user_message()),
        }
        Ok(())
    }

    /// Hand a lookup to the background worker, the way a page posts
    /// a queue message to its service worker.
    pub fn queue_via_worker(&self, city: &str) -> Result<()> {
        let request = QueuedRequest::weather(city);
        self.bridge
            .handle_message(WorkerMessage::QueueWeatherRequest(request))?;
        println!("Handed \"{}\" to the background worker.", city);
        Ok(())
    }

    /// Render a push delivery (payload may be absent or malformed).
    pub fn deliver_push(&self, payload: Option<&str>) -> Result<()> {
        let notification = self.push.handle_push(payload.map(str::as_bytes));
        println!("{}: {}", notification.title, notification.body);
        Ok(())
    }

    pub fn show_recent(&self) -> Result<()> {
        let searches = self.recent.list()?;
        if searches.is_empty() {
            println!("No recent searches.");
        } else {
            for city in searches {
                println!("{}", city);
            }
        }
        Ok(())
    }

    pub fn show_pending(&self) -> Result<()> {
        let pending = self.queue.pending();
        if pending.is_empty() {
            println!("No pending lookups.");
        } else {
            for request in pending {
                println!("{}  (queued at {})", request.city_name, request.timestamp);
            }
        }
        Ok(())
    }

    /// Run the background worker: connectivity probing, queue drain
    /// triggers, the sync loop, the asset cache, and the daily
    /// reminder, until interrupted.
    pub async fn run_daemon(&self) -> Result<()> {
        let _probe = self.connectivity.spawn_probe(
            self.config.api.base_url.clone(),
            std::time::Duration::from_secs(30),
        );

        let refresh = (self.config.weather.refresh_minutes > 0).then(|| {
            std::time::Duration::from_secs(u64::from(self.config.weather.refresh_minutes) * 60)
        });
        let _triggers = self.queue.spawn_triggers(refresh);
        let _sync_loop = self.bridge.spawn_sync_loop(self.connectivity.subscribe());
        let _reminder = reminder::spawn(self.config.reminder.clone(), self.notifier.clone());

        if let Some(origin) = self.config.assets.origin.clone() {
            let cache = AssetCache::new(
                &self.config.storage.data_dir().join("assets"),
                &origin,
                host_of(&self.config.api.base_url),
                self.sync_registry.clone(),
            )?;
            match cache.install().await {
                Ok(()) => {
                    let removed = cache.activate()?;
                    tracing::info!(removed, "Asset cache active");
                }
                Err(e) => tracing::warn!("Asset cache install failed: {}", e),
            }
        }

        // Surface drained queue results
        let mut events = self.queue.subscribe();
        let unit = self.unit;
        tokio::spawn(async move {
            while let Ok(AppEvent::WeatherReceived { report, source, .. }) = events.recv().await {
                println!("[{:?}] {}", source, report.summary(unit));
            }
        });

        // Surface background sync results, like a page listening for
        // worker messages
        let (_client_id, mut messages) = self.clients.connect("/");
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                let skycast_offline::ClientMessage::WeatherDataSynced { report, .. } = message;
                println!("[synced] {}", report.summary(unit));
            }
        });

        println!(
            "skycast daemon running ({} pending lookups). Ctrl-C to stop.",
            self.queue.pending_count()
        );
        tokio::signal::ctrl_c().await?;
        println!("Shutting down.");
        Ok(())
    }
}

fn host_of(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://api.weatherapi.com"), "api.weatherapi.com");
        assert_eq!(host_of("http://localhost:8080/base"), "localhost:8080");
    }
}
