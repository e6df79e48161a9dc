//! Device location port.

use async_trait::async_trait;

use crate::types::{Coordinates, LocationError};

#[async_trait]
pub trait DeviceLocation: Send + Sync {
    /// Whether the user granted coarse location access.
    fn permission_granted(&self) -> bool;

    /// Last known coarse position.
    async fn last_known(&self) -> Result<Coordinates, LocationError>;
}

/// A location pinned in configuration.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    coordinates: Option<Coordinates>,
}

impl FixedLocation {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        let coordinates = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Self { coordinates }
    }
}

#[async_trait]
impl DeviceLocation for FixedLocation {
    fn permission_granted(&self) -> bool {
        self.coordinates.is_some()
    }

    async fn last_known(&self) -> Result<Coordinates, LocationError> {
        self.coordinates.ok_or(LocationError::PermissionDenied)
    }
}
