//! HTTP client for the weather API's `current.json` endpoint.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

use crate::types::{WeatherQuery, WeatherReport};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Weather lookup errors
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No matching location for: {0}")]
    CityNotFound(String),

    #[error("Invalid or missing API key")]
    InvalidApiKey,

    #[error("Weather API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl WeatherError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Network error. Check your connection.",
            Self::CityNotFound(_) => "City not found. Please try again.",
            Self::InvalidApiKey => "Weather API key is invalid. Check settings.",
            Self::Api { status, .. } if *status >= 500 => {
                "Weather service unavailable. Please try again later."
            }
            Self::Api { .. } => "Weather service error. Please try again.",
            Self::Decode(_) => "Received an unexpected response. Please try again.",
        }
    }

    /// Whether a background retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_)) || matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}

/// Error envelope the weather API returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: i32,
    message: String,
}

/// Client for the weather API.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    /// Create a client against the given base URL.
    ///
    /// The key is sent as the `key` query parameter on every request;
    /// it is never logged.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Fetch current conditions for a city name or coordinate pair.
    #[instrument(skip(self), level = "info")]
    pub async fn current(&self, query: &WeatherQuery) -> Result<WeatherReport, WeatherError> {
        let url = format!("{}/v1/current.json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query.as_param()), ("key", self.api_key.clone())])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let report = response
                .json::<WeatherReport>()
                .await
                .map_err(|e| WeatherError::Decode(e.to_string()))?;
            tracing::debug!(location = %report.location.name, "Weather fetched");
            return Ok(report);
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(WeatherError::InvalidApiKey);
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorBody>(&text) {
            // 1006: no matching location found
            Ok(body) if body.error.code == 1006 => Err(WeatherError::CityNotFound(query.as_param())),
            // 1002/2006/2008: key missing, invalid, or disabled
            Ok(body) if matches!(body.error.code, 1002 | 2006 | 2008) => {
                Err(WeatherError::InvalidApiKey)
            }
            Ok(body) => Err(WeatherError::Api {
                status: status.as_u16(),
                message: body.error.message,
            }),
            Err(_) => Err(WeatherError::Api {
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}
