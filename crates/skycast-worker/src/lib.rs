//! Background worker for Skycast
//!
//! The counterpart of the browser service worker: a generation-named
//! asset cache with an offline fallback page, a sync bridge replaying
//! queued lookups, push payload handling, and the registry of
//! connected app clients.

pub mod assets;
pub mod clients;
pub mod push;
pub mod sync;

pub use assets::{
    AssetCache, CacheError, Served, WorkerState, CACHE_GENERATION, OFFLINE_PAGE, PRECACHE_MANIFEST,
};
pub use clients::{ClickAction, ClientId, ClientRegistry};
pub use push::{PushHandler, DEFAULT_PUSH_BODY, DEFAULT_PUSH_TITLE};
pub use sync::{SyncBridge, SyncOutcome, SyncRegistry, SYNC_TAG_WEATHER};
