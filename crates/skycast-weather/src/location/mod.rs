//! Device location lookup.
//!
//! The platform position source sits behind a trait so the provider can
//! be exercised with an in-memory fake. Real backends: GeoClue over
//! D-Bus on Linux, Windows.Devices.Geolocation on Windows.

#[cfg(target_os = "linux")]
mod geoclue;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
pub use geoclue::GeoClueSource;
#[cfg(windows)]
pub use windows::WindowsSource;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default lookup timeout, matching the 10 s the UI is willing to wait.
const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// A geographic position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Location permission state, as far as the platform reveals it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Permission will be requested on first use
    Prompt,
    #[default]
    Unknown,
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

impl LocationError {
    /// Human-readable message for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location access denied by user.",
            Self::PositionUnavailable => "Location information is unavailable.",
            Self::ServiceUnavailable => "Location services are not available on this system.",
            Self::Timeout => "Location request timed out.",
            Self::Other(_) => "An unknown error occurred while retrieving location.",
        }
    }
}

/// Platform seam: something that can produce a position fix.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Obtain a single position fix. May block on a permission prompt.
    async fn current_position(&self) -> Result<Position, LocationError>;

    /// Whether the backing service is reachable at all.
    async fn is_available(&self) -> bool;
}

/// Wraps a position source with a timeout, permission tracking,
/// and a polling watch.
#[derive(Clone)]
pub struct LocationProvider {
    source: Arc<dyn PositionSource>,
    timeout: Duration,
    permission: Arc<Mutex<PermissionState>>,
}

impl LocationProvider {
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self {
            source,
            timeout: Duration::from_secs(LOOKUP_TIMEOUT_SECS),
            permission: Arc::new(Mutex::new(PermissionState::Prompt)),
        }
    }

    /// Override the lookup timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider over the platform's native position source, if this
    /// platform has one.
    pub fn platform_default() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            return Some(Self::new(Arc::new(GeoClueSource::new())));
        }
        #[cfg(windows)]
        {
            return Some(Self::new(Arc::new(WindowsSource::new())));
        }
        #[cfg(not(any(target_os = "linux", windows)))]
        {
            return None;
        }
    }

    /// Obtain a single position fix, bounded by the configured timeout.
    pub async fn current_position(&self) -> Result<Position, LocationError> {
        let result = lookup_with_timeout(&self.source, self.timeout).await;
        self.record_permission(&result);
        result
    }

    /// Whether a position source is reachable.
    pub async fn is_available(&self) -> bool {
        self.source.is_available().await
    }

    /// Last observed permission state.
    pub fn permission_state(&self) -> PermissionState {
        *self.permission.lock()
    }

    /// Start a continuous watch polling the source at `interval`.
    /// The first fix is attempted immediately.
    pub fn watch(&self, interval: Duration) -> PositionWatch {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let source = self.source.clone();
        let permission = self.permission.clone();
        let timeout = self.timeout;
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = lookup_with_timeout(&source, timeout).await;
                        record_permission_in(&permission, &result);
                        if tx.send(result).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        PositionWatch { rx, cancel }
    }

    fn record_permission(&self, result: &Result<Position, LocationError>) {
        record_permission_in(&self.permission, result);
    }
}

fn record_permission_in(
    permission: &Mutex<PermissionState>,
    result: &Result<Position, LocationError>,
) {
    match result {
        Ok(_) => *permission.lock() = PermissionState::Granted,
        Err(LocationError::PermissionDenied) => *permission.lock() = PermissionState::Denied,
        Err(_) => {}
    }
}

async fn lookup_with_timeout(
    source: &Arc<dyn PositionSource>,
    timeout: Duration,
) -> Result<Position, LocationError> {
    match tokio::time::timeout(timeout, source.current_position()).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Handle for a continuous position watch.
///
/// Dropping the handle stops the watch task.
pub struct PositionWatch {
    rx: mpsc::Receiver<Result<Position, LocationError>>,
    cancel: CancellationToken,
}

impl PositionWatch {
    /// Next position fix or error. `None` after the watch is stopped.
    pub async fn next(&mut self) -> Option<Result<Position, LocationError>> {
        self.rx.recv().await
    }

    /// Stop the watch.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
