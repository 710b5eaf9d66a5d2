//! Windows position source (Windows.Devices.Geolocation).

use async_trait::async_trait;
use windows::Devices::Geolocation::{GeolocationAccessStatus, Geolocator, PositionStatus};

use super::{LocationError, Position, PositionSource};

pub struct WindowsSource;

impl WindowsSource {
    pub fn new() -> Self {
        Self
    }

    // WinRT async operations are waited on a blocking thread; the
    // provider's own timeout bounds the overall call.
    fn blocking_fetch() -> Result<Position, LocationError> {
        let access = Geolocator::RequestAccessAsync()
            .and_then(|op| op.get())
            .map_err(|e| LocationError::Other(e.message().to_string()))?;
        if access == GeolocationAccessStatus::Denied {
            return Err(LocationError::PermissionDenied);
        }

        let locator =
            Geolocator::new().map_err(|e| LocationError::Other(e.message().to_string()))?;
        match locator.LocationStatus() {
            Ok(PositionStatus::Disabled) => return Err(LocationError::PermissionDenied),
            Ok(PositionStatus::NotAvailable) => return Err(LocationError::ServiceUnavailable),
            _ => {}
        }

        let geoposition = locator
            .GetGeopositionAsync()
            .and_then(|op| op.get())
            .map_err(|_| LocationError::PositionUnavailable)?;

        let coordinate = geoposition
            .Coordinate()
            .map_err(|_| LocationError::PositionUnavailable)?;
        let point = coordinate
            .Point()
            .map_err(|_| LocationError::PositionUnavailable)?;
        let basic = point
            .Position()
            .map_err(|_| LocationError::PositionUnavailable)?;

        Ok(Position {
            latitude: basic.Latitude,
            longitude: basic.Longitude,
            accuracy_meters: coordinate.Accuracy().ok(),
        })
    }
}

#[async_trait]
impl PositionSource for WindowsSource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        tokio::task::spawn_blocking(Self::blocking_fetch)
            .await
            .map_err(|e| LocationError::Other(e.to_string()))?
    }

    async fn is_available(&self) -> bool {
        Geolocator::new().is_ok()
    }
}
