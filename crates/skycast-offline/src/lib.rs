//! Offline support for Skycast
//!
//! The pieces that keep the app useful without a network: a persisted
//! store shared by the app and the background worker, the offline
//! request queue, the recent-search list, a connectivity monitor, and
//! the typed messages the two contexts exchange.

pub mod connectivity;
pub mod messages;
pub mod notify;
pub mod queue;
pub mod recent;
pub mod store;

pub use connectivity::ConnectivityMonitor;
pub use messages::{AppEvent, ClientMessage, SyncSource, WorkerMessage};
pub use notify::{LogNotifier, Notification, NotificationPermission, Notifier, RecordingNotifier};
pub use queue::{DrainOutcome, OfflineQueue, QueuedRequest, RequestKind, WeatherFetch};
pub use recent::{RecentSearches, MAX_RECENT_SEARCHES};
pub use store::{SharedStore, StoreError, KEY_PENDING_REQUESTS, KEY_RECENT_SEARCHES};
