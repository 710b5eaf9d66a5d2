//! GeoClue2 position source (Linux, over the system D-Bus).

use async_trait::async_trait;
use futures_util::StreamExt;
use zbus::zvariant::OwnedObjectPath;
use zbus::{Connection, Proxy};

use super::{LocationError, Position, PositionSource};

const BUS_NAME: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_IFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_IFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_IFACE: &str = "org.freedesktop.GeoClue2.Location";

/// GCLUE_ACCURACY_LEVEL_EXACT
const ACCURACY_EXACT: u32 = 8;

pub struct GeoClueSource {
    desktop_id: String,
}

impl GeoClueSource {
    pub fn new() -> Self {
        Self {
            desktop_id: "skycast".to_string(),
        }
    }

    async fn fetch(&self) -> Result<Position, LocationError> {
        let conn = Connection::system()
            .await
            .map_err(|_| LocationError::ServiceUnavailable)?;

        let manager = Proxy::new(&conn, BUS_NAME, MANAGER_PATH, MANAGER_IFACE)
            .await
            .map_err(|_| LocationError::ServiceUnavailable)?;

        let client_path: OwnedObjectPath =
            manager.call("GetClient", &()).await.map_err(translate)?;

        let client = Proxy::new(&conn, BUS_NAME, client_path.as_str(), CLIENT_IFACE)
            .await
            .map_err(translate)?;

        client
            .set_property("DesktopId", self.desktop_id.as_str())
            .await
            .map_err(translate)?;
        client
            .set_property("RequestedAccuracyLevel", ACCURACY_EXACT)
            .await
            .map_err(translate)?;

        // Subscribe before Start so the first fix is not missed.
        let mut updates = client
            .receive_signal("LocationUpdated")
            .await
            .map_err(translate)?;

        client
            .call::<_, _, ()>("Start", &())
            .await
            .map_err(translate)?;

        let msg = updates
            .next()
            .await
            .ok_or(LocationError::PositionUnavailable)?;
        let (_old, new_path): (OwnedObjectPath, OwnedObjectPath) =
            msg.body().deserialize().map_err(translate)?;

        let location = Proxy::new(&conn, BUS_NAME, new_path.as_str(), LOCATION_IFACE)
            .await
            .map_err(translate)?;

        let latitude: f64 = location.get_property("Latitude").await.map_err(translate)?;
        let longitude: f64 = location
            .get_property("Longitude")
            .await
            .map_err(translate)?;
        let accuracy: f64 = location.get_property("Accuracy").await.unwrap_or(0.0);

        let _ = client.call::<_, _, ()>("Stop", &()).await;

        Ok(Position {
            latitude,
            longitude,
            accuracy_meters: (accuracy > 0.0).then_some(accuracy),
        })
    }
}

#[async_trait]
impl PositionSource for GeoClueSource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        self.fetch().await
    }

    async fn is_available(&self) -> bool {
        let Ok(conn) = Connection::system().await else {
            return false;
        };
        let Ok(manager) = Proxy::new(&conn, BUS_NAME, MANAGER_PATH, MANAGER_IFACE).await else {
            return false;
        };
        manager.get_property::<bool>("InUse").await.is_ok()
    }
}

/// Map D-Bus failures onto the location error taxonomy.
fn translate<E: std::fmt::Display>(err: E) -> LocationError {
    let msg = err.to_string();
    if msg.contains("AccessDenied") || msg.contains("not authorized") {
        LocationError::PermissionDenied
    } else if msg.contains("ServiceUnknown") || msg.contains("NameHasNoOwner") {
        LocationError::ServiceUnavailable
    } else {
        LocationError::Other(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_access_denied() {
        let err = translate("org.freedesktop.DBus.Error.AccessDenied: Geolocation disabled");
        assert!(matches!(err, LocationError::PermissionDenied));
    }

    #[test]
    fn test_translate_missing_service() {
        let err = translate("org.freedesktop.DBus.Error.ServiceUnknown: no GeoClue");
        assert!(matches!(err, LocationError::ServiceUnavailable));
    }

    #[test]
    fn test_translate_other() {
        let err = translate("something else entirely");
        assert!(matches!(err, LocationError::Other(_)));
    }
}
