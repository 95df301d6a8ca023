//! Place-name resolution through a geocoding service.
//!
//! [`GeocodingService`] is the raw lookup (Google Geocoding by default).
//! [`Geocoder`] applies the status and precision rules on top of it: only
//! `OK` responses count, and only rooftop matches become coordinate records.
use crate::post::{CoordinateRecord, LocationPrecision};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

pub const GOOGLE_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// One lookup: the place string plus its region and language hints.
#[derive(Debug, Clone, Copy)]
pub struct GeocodeQuery<'a> {
    pub address: &'a str,
    pub region: Option<&'a str>,
    pub language: &'a str,
}

/// Raw response body of a geocoding lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeMatch>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeMatch {
    pub formatted_address: String,
    pub geometry: Geometry,
    pub place_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
    pub location_type: LocationPrecision,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Address-in, matches-out lookup. `Err` means the lookup itself failed
/// (transport, undecodable body); "not found" is a status, not an error.
pub trait GeocodingService {
    fn lookup(&self, query: &GeocodeQuery<'_>) -> Result<GeocodeResponse>;
}

/// Blocking Google Geocoding API client.
#[derive(Clone)]
pub struct GoogleGeocodingClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocodingClient {
    pub fn new(api_key: String, endpoint: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

impl GeocodingService for GoogleGeocodingClient {
    fn lookup(&self, query: &GeocodeQuery<'_>) -> Result<GeocodeResponse> {
        let mut request = self
            .agent
            .get(&self.endpoint)
            .query("address", query.address)
            .query("key", &self.api_key)
            .query("language", query.language);
        if let Some(region) = query.region {
            request = request.query("region", region);
        }
        let mut response = request
            .call()
            .with_context(|| format!("geocode request for {:?}", query.address))?;
        response
            .body_mut()
            .read_json()
            .with_context(|| format!("parse geocode response for {:?}", query.address))
    }
}

/// Resolves candidate places to rooftop-precision coordinates.
pub struct Geocoder {
    service: Box<dyn GeocodingService>,
}

impl Geocoder {
    pub fn new(service: Box<dyn GeocodingService>) -> Self {
        Self { service }
    }

    /// Rooftop matches for `candidate`; empty when the service reports any
    /// status other than `OK`. Lookup failures are returned to the caller.
    pub fn resolve(
        &self,
        candidate: &str,
        region: Option<&str>,
        language: &str,
    ) -> Result<Vec<CoordinateRecord>> {
        let response = self.service.lookup(&GeocodeQuery {
            address: candidate,
            region,
            language,
        })?;

        if response.status != "OK" {
            tracing::debug!(
                candidate,
                status = %response.status,
                error_message = response.error_message.as_deref().unwrap_or(""),
                "geocode returned no usable result"
            );
            return Ok(Vec::new());
        }

        let total = response.results.len();
        let records = rooftop_records(response.results);
        tracing::debug!(candidate, total, kept = records.len(), "geocode matches");
        Ok(records)
    }
}

fn rooftop_records(matches: Vec<GeocodeMatch>) -> Vec<CoordinateRecord> {
    matches
        .into_iter()
        .filter(|item| {
            let keep = item.geometry.location_type.is_finest();
            if !keep {
                tracing::trace!(
                    place_id = %item.place_id,
                    location_type = item.geometry.location_type.as_str(),
                    "dropping coarse match"
                );
            }
            keep
        })
        .map(|item| CoordinateRecord {
            formatted_address: item.formatted_address,
            lat: item.geometry.location.lat,
            lng: item.geometry.location.lng,
            place_id: item.place_id,
            location_type: item.geometry.location_type,
        })
        .collect()
}
