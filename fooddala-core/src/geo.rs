use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Structured result of reverse geocoding a point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAddress {
    /// Street line for a delivery address: suburb, neighbourhood and road, most general first
    pub street: String,
    /// Short locality name shown in the location bar
    pub area: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub display_name: String,
    pub point: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressCandidate {
    pub display_name: String,
    pub point: GeoPoint,
    pub importance: f64,
}

#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn reverse(&self, point: GeoPoint) -> CoreResult<ResolvedAddress>;

    /// Candidates ordered best first
    async fn search(&self, query: &str) -> CoreResult<Vec<AddressCandidate>>;
}

// ============================================================================
// Nominatim
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NominatimAddress {
    road: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    importance: f64,
}

/// Reverse and forward geocoding against an OpenStreetMap Nominatim instance.
pub struct NominatimResolver {
    client: Client,
    base_url: String,
}

impl NominatimResolver {
    pub const DEFAULT_URL: &'static str = "https://nominatim.openstreetmap.org";

    pub fn new(base_url: &str, timeout: Duration) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fooddala/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

pub(crate) fn resolve_reverse(response: NominatimReverse, point: GeoPoint) -> Option<ResolvedAddress> {
    let address = response.address?;
    let display_name = response.display_name.unwrap_or_default();

    let mut street = address.road.clone().unwrap_or_default();
    for part in [&address.neighbourhood, &address.suburb].into_iter().flatten() {
        street = if street.is_empty() { part.clone() } else { format!("{}, {}", part, street) };
    }
    if street.is_empty() && !display_name.is_empty() {
        street = display_name.split(',').take(2).map(str::trim).collect::<Vec<_>>().join(", ");
    }

    let area = address
        .suburb
        .clone()
        .or_else(|| address.neighbourhood.clone())
        .or_else(|| address.road.clone())
        .unwrap_or_default();

    let city = address
        .city
        .or(address.town)
        .or(address.village)
        .or(address.county)
        .unwrap_or_default();

    Some(ResolvedAddress {
        street,
        area,
        city,
        state: address.state.unwrap_or_default(),
        pincode: address.postcode.unwrap_or_default(),
        display_name,
        point,
    })
}

#[async_trait]
impl AddressResolver for NominatimResolver {
    async fn reverse(&self, point: GeoPoint) -> CoreResult<ResolvedAddress> {
        let response: NominatimReverse = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", point.lat.to_string()),
                ("lon", point.lng.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let resolved = resolve_reverse(response, point).ok_or_else(|| {
            warn!("No address found for {},{}", point.lat, point.lng);
            CoreError::ValidationError("no address found for this location".to_string())
        })?;
        info!("Resolved {},{} to {}", point.lat, point.lng, resolved.city);
        Ok(resolved)
    }

    async fn search(&self, query: &str) -> CoreResult<Vec<AddressCandidate>> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("q", query), ("limit", "5")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rank_candidates(places))
    }
}

fn rank_candidates(places: Vec<NominatimPlace>) -> Vec<AddressCandidate> {
    let mut candidates: Vec<AddressCandidate> = places
        .into_iter()
        .filter_map(|place| {
            let lat = place.lat.parse().ok()?;
            let lng = place.lon.parse().ok()?;
            Some(AddressCandidate {
                display_name: place.display_name,
                point: GeoPoint { lat, lng },
                importance: place.importance,
            })
        })
        .collect();
    candidates.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    candidates
}
