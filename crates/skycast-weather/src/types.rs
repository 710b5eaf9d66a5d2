use serde::{Deserialize, Serialize};

/// Resolved temperature unit for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Unit suffix for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// What to look up: a city by name, or a coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeatherQuery {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl WeatherQuery {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    pub fn coords(lat: f64, lon: f64) -> Self {
        Self::Coords { lat, lon }
    }

    /// The `q` parameter value the weather API expects.
    pub fn as_param(&self) -> String {
        match self {
            Self::City(name) => name.clone(),
            Self::Coords { lat, lon } => format!("{},{}", lat, lon),
        }
    }
}

impl std::fmt::Display for WeatherQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_param())
    }
}

/// Location block of a weather API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportLocation {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub localtime: Option<String>,
}

impl ReportLocation {
    /// "Paris, Ile-de-France, France" style display name,
    /// skipping empty segments the API sometimes returns.
    pub fn display_name(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if !self.region.is_empty() {
            parts.push(self.region.as_str());
        }
        if !self.country.is_empty() {
            parts.push(self.country.as_str());
        }
        parts.join(", ")
    }
}

/// Condition descriptor (text plus the API's icon and numeric code)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub code: i32,
}

/// Current conditions block of a weather API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition: Condition,
    pub humidity: u8,
    pub pressure_mb: f64,
    pub vis_km: f64,
    #[serde(default)]
    pub wind_kph: f64,
    #[serde(default)]
    pub feelslike_c: f64,
    #[serde(default)]
    pub feelslike_f: f64,
    #[serde(default)]
    pub last_updated_epoch: Option<i64>,
}

/// Complete current-weather response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: ReportLocation,
    pub current: CurrentConditions,
}

impl CurrentConditions {
    /// When the API last refreshed these conditions, if it said.
    pub fn last_updated(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.last_updated_epoch
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
    }
}

impl WeatherReport {
    /// Temperature in the requested unit
    pub fn temperature(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.current.temp_c,
            TemperatureUnit::Fahrenheit => self.current.temp_f,
        }
    }

    /// Feels-like temperature in the requested unit
    pub fn feels_like(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.current.feelslike_c,
            TemperatureUnit::Fahrenheit => self.current.feelslike_f,
        }
    }

    /// One-line summary for logs and terminal output
    pub fn summary(&self, unit: TemperatureUnit) -> String {
        format!(
            "{}: {:.1} {} | {} | humidity {}% | pressure {} mb | visibility {} km",
            self.location.display_name(),
            self.temperature(unit),
            unit.label(),
            self.current.condition.text,
            self.current.humidity,
            self.current.pressure_mb,
            self.current.vis_km,
        )
    }
}
