//! Weather service for Skycast
//!
//! Provides current conditions via the WeatherAPI HTTP service, with
//! system location detection behind a pluggable position source.

pub mod client;
pub mod location;
pub mod types;

pub use client::{WeatherClient, WeatherError};
pub use location::{
    LocationError, LocationProvider, PermissionState, Position, PositionSource, PositionWatch,
};
pub use types::*;
