use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Environment variable that overrides the configured weather API key.
pub const API_KEY_ENV: &str = "SKYCAST_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather API endpoint and credentials
    #[serde(default)]
    pub api: ApiConfig,

    /// Weather display settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Static asset cache settings
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Notification settings
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Daily weather reminder settings
    #[serde(default)]
    pub reminder: ReminderConfig,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

/// Weather API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for the weather API
    pub base_url: String,

    /// API key. Prefer setting SKYCAST_API_KEY in the environment;
    /// storing the key in the config file keeps it on disk in plain text.
    pub key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weatherapi.com".to_string(),
            key: std::env::var(API_KEY_ENV).ok(),
        }
    }
}

impl ApiConfig {
    /// Resolve the API key: environment variable wins over the config file.
    pub fn resolved_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV).ok().or_else(|| self.key.clone())
    }

    /// Check if an API key is available from any source
    pub fn is_configured(&self) -> bool {
        self.resolved_key().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Temperature unit preference
    pub temperature_unit: TemperatureUnit,

    /// Queue drain / refresh interval in minutes
    pub refresh_minutes: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Auto,
            refresh_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the shared store and the asset cache
    #[serde(default = "default_data_dir_str")]
    pub data_dir: String,
}

fn default_data_dir_str() -> String {
    default_data_dir().to_string_lossy().into_owned()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("skycast"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_str(),
        }
    }
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssetsConfig {
    /// Origin the static asset manifest is fetched from.
    /// Asset caching is skipped when unset.
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationsConfig {
    /// Whether local notifications may be shown.
    /// Mirrors a granted notification permission; defaults to off.
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Whether the daily reminder is active
    #[serde(default)]
    pub enabled: bool,

    /// Local hour (0-23) for the reminder
    #[serde(default = "default_reminder_hour")]
    pub hour: u8,

    /// Local minute (0-59) for the reminder
    #[serde(default)]
    pub minute: u8,
}

fn default_reminder_hour() -> u8 {
    8
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: default_reminder_hour(),
            minute: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            api: ApiConfig::default(),
            weather: WeatherConfig::default(),
            storage: StorageConfig::default(),
            assets: AssetsConfig::default(),
            notifications: NotificationsConfig::default(),
            reminder: ReminderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        if !validation.warnings.is_empty() {
            for warning in &validation.warnings {
                tracing::warn!("Config warning: {}", warning);
            }
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if let Some(origin) = &self.assets.origin {
            self.validate_url(origin, "assets.origin", &mut result);
        }

        if !self.api.is_configured() {
            result.add_warning(
                "api.key",
                format!(
                    "No weather API key configured - set {} or api.key; lookups will fail",
                    API_KEY_ENV
                ),
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Periodic queue drain disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Refresh interval is more than 24 hours",
            );
        }

        if self.storage.data_dir.is_empty() {
            result.add_error("storage.data_dir", "Data directory must not be empty");
        }

        if self.reminder.hour > 23 {
            result.add_error("reminder.hour", "Hour must be between 0 and 23");
        }
        if self.reminder.minute > 59 {
            result.add_error("reminder.minute", "Minute must be between 0 and 59");
        }
        if self.reminder.enabled && !self.notifications.enabled {
            result.add_warning(
                "reminder.enabled",
                "Reminder is enabled but notifications are not; it will never fire",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}
