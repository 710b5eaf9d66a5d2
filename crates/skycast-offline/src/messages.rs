//! Typed messages between the app context and the worker context.
//!
//! The wire-level string constants (`QUEUE_WEATHER_REQUEST`,
//! `WEATHER_DATA_SYNCED`, `weatherDataReceived`) become enum variants;
//! channels carry them directly.

use serde::{Deserialize, Serialize};
use skycast_weather::WeatherReport;

use crate::queue::QueuedRequest;

/// Where a delivered weather report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    /// Direct user-triggered lookup
    Interactive,
    /// Drained from the offline queue
    QueueDrain,
    /// Replayed by the background worker's sync pass
    BackgroundSync,
}

/// App → worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerMessage {
    /// Enqueue a request for the worker's sync pass.
    QueueWeatherRequest(QueuedRequest),
}

/// Worker → app(s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// A queued request was replayed successfully in the background.
    WeatherDataSynced {
        request: QueuedRequest,
        report: WeatherReport,
    },
}

/// Events the queue raises toward whatever is displaying weather.
#[derive(Debug, Clone)]
pub enum AppEvent {
    WeatherReceived {
        request: QueuedRequest,
        report: WeatherReport,
        source: SyncSource,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_worker_message_roundtrip() {
        let msg = WorkerMessage::QueueWeatherRequest(QueuedRequest::weather("Paris"));
        let json = serde_json::to_string(&msg).unwrap();
        let back: WorkerMessage = serde_json::from_str(&json).unwrap();
        let WorkerMessage::QueueWeatherRequest(req) = back;
        assert_eq!(req.city_name, "Paris");
    }

    #[test]
    fn test_sync_source_serializes_snake_case() {
        let json = serde_json::to_string(&SyncSource::BackgroundSync).unwrap();
        assert_eq!(json, "\"background_sync\"");
    }
}
