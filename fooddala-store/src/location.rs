use crate::local_storage::{load_json, save_json, LocalStorage};
use fooddala_core::geo::{AddressResolver, GeoPoint, ResolvedAddress};
use fooddala_core::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLocation {
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub full_address: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

impl Default for DeliveryLocation {
    fn default() -> Self {
        Self {
            address: String::new(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            full_address: None,
            coordinates: None,
        }
    }
}

impl DeliveryLocation {
    pub fn from_resolved(resolved: &ResolvedAddress) -> Self {
        let address = if resolved.area.is_empty() {
            resolved.city.clone()
        } else {
            format!("{}, {}", resolved.area, resolved.city)
        };
        Self {
            address,
            city: resolved.city.clone(),
            state: resolved.state.clone(),
            full_address: Some(resolved.display_name.clone()),
            coordinates: Some(resolved.point),
        }
    }

    /// Only a location with an address line is worth remembering.
    pub fn is_set(&self) -> bool {
        !self.address.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not fetch your location: {0}")]
    Lookup(#[from] CoreError),
}

/// Last known delivery location, independent of the cart.
pub struct LocationStore {
    location: watch::Sender<DeliveryLocation>,
    loading: AtomicBool,
    storage: Arc<dyn LocalStorage>,
    lookup_timeout: Duration,
}

/// Clears the loading flag however the lookup ends, including when the caller drops the future.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LocationStore {
    pub const STORAGE_KEY: &'static str = "userLocation";

    pub fn hydrate(storage: Arc<dyn LocalStorage>, lookup_timeout: Duration) -> Self {
        let location = load_json::<DeliveryLocation>(&*storage, Self::STORAGE_KEY).unwrap_or_default();
        let (tx, _) = watch::channel(location);
        Self {
            location: tx,
            loading: AtomicBool::new(false),
            storage,
            lookup_timeout,
        }
    }

    pub fn current(&self) -> DeliveryLocation {
        self.location.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeliveryLocation> {
        self.location.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn set_manual(&self, address: &str, city: &str, state: &str) {
        let address = if address.trim().is_empty() { city } else { address };
        self.replace(DeliveryLocation {
            address: address.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            full_address: None,
            coordinates: None,
        });
    }

    pub fn clear(&self) {
        self.location.send_replace(DeliveryLocation {
            address: String::new(),
            city: String::new(),
            state: String::new(),
            full_address: None,
            coordinates: None,
        });
        if let Err(e) = self.storage.remove(Self::STORAGE_KEY) {
            warn!("Failed to drop stored location: {}", e);
        }
    }

    /// Resolve a device position into a delivery location.
    ///
    /// Bounded by the configured timeout; on failure the previous location is kept.
    /// Dropping the returned future cancels the lookup.
    pub async fn locate(&self, resolver: &dyn AddressResolver, point: GeoPoint) -> Result<DeliveryLocation, LocationError> {
        self.loading.store(true, Ordering::SeqCst);
        let _guard = LoadingGuard(&self.loading);

        let resolved = tokio::time::timeout(self.lookup_timeout, resolver.reverse(point))
            .await
            .map_err(|_| {
                warn!("Location lookup for {},{} timed out", point.lat, point.lng);
                LocationError::Timeout(self.lookup_timeout)
            })??;

        let location = DeliveryLocation::from_resolved(&resolved);
        info!("Delivery location set to {}", location.address);
        self.replace(location.clone());
        Ok(location)
    }

    fn replace(&self, location: DeliveryLocation) {
        let storage = &*self.storage;
        self.location.send_modify(|current| {
            *current = location;
            if current.is_set() {
                save_json(storage, Self::STORAGE_KEY, current);
            }
        });
    }
}
