use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};

use super::client::Geocoder;

/// Coordinates are first snapped to micro-degrees to shed float noise.
const MICRO_SCALE: f64 = 1_000_000.0;
/// Micro-degrees per 4-decimal cell, roughly 11 m at the equator.
const MICROS_PER_CELL: i64 = 100;

type CellKey = (i64, i64);

/// Memoizes reverse-geocoding results for the life of the process.
///
/// Coordinates are truncated to 4 decimals, so nearby readings share an
/// entry. Failures are never cached; the caller gets a plain coordinate
/// string instead.
pub struct GeocodeCache {
    geocoder: Arc<dyn Geocoder>,
    entries: Mutex<HashMap<CellKey, String>>,
}

impl GeocodeCache {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve_address(&self, latitude: f64, longitude: f64) -> String {
        let key = cell_key(latitude, longitude);
        let cached = self.lock().get(&key).cloned();
        if let Some(hit) = cached {
            return hit;
        }

        match self.geocoder.reverse(latitude, longitude).await {
            Ok(resolved) => {
                debug!("Geocoded {latitude}, {longitude} -> {}", resolved.address);
                self.lock()
                    .entry(key)
                    .or_insert(resolved.address)
                    .clone()
            }
            Err(err) => {
                warn!("Reverse geocoding failed for {latitude}, {longitude}: {err}");
                format_coordinates(latitude, longitude)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CellKey, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.6}, {longitude:.6}")
}

fn cell_key(latitude: f64, longitude: f64) -> CellKey {
    (cell_index(latitude), cell_index(longitude))
}

/// Truncates toward zero in integer space; `0.0003 * 1e4` is just below 3.
fn cell_index(degrees: f64) -> i64 {
    (degrees * MICRO_SCALE).round() as i64 / MICROS_PER_CELL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockGeocoder;

    #[tokio::test]
    async fn test_nearby_coordinates_share_entry() {
        let geocoder = Arc::new(MockGeocoder::answering("12 Nguyen Hue"));
        let cache = GeocodeCache::new(geocoder.clone());

        let first = cache.resolve_address(10.123456, 106.654321).await;
        let second = cache.resolve_address(10.123449, 106.654319).await;

        assert_eq!(first, "12 Nguyen Hue");
        assert_eq!(second, first);
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cell_index_ignores_float_noise() {
        assert_eq!(cell_index(0.0003), 3);
        assert_eq!(cell_index(0.00035), 3);
        assert_eq!(cell_index(0.00025), 2);
        assert_eq!(cell_index(10.123456), 101234);
        assert_eq!(cell_index(10.123449), 101234);
        assert_eq!(cell_index(-0.0003), -3);
    }

    #[tokio::test]
    async fn test_cell_boundary_keys_are_exact() {
        let geocoder = Arc::new(MockGeocoder::answering("corner"));
        let cache = GeocodeCache::new(geocoder.clone());

        cache.resolve_address(10.0, 0.0003).await;
        cache.resolve_address(10.0, 0.00035).await;
        assert_eq!(geocoder.calls(), 1);

        cache.resolve_address(10.0, 0.00025).await;
        assert_eq!(geocoder.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_distinct_cells_miss() {
        let geocoder = Arc::new(MockGeocoder::answering("somewhere"));
        let cache = GeocodeCache::new(geocoder.clone());

        cache.resolve_address(10.1234, 106.6543).await;
        cache.resolve_address(10.1244, 106.6543).await;

        assert_eq!(geocoder.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_falls_back_and_is_not_cached() {
        let geocoder = Arc::new(MockGeocoder::failing());
        let cache = GeocodeCache::new(geocoder.clone());

        let address = cache.resolve_address(10.123456, 106.654321).await;
        assert_eq!(address, "10.123456, 106.654321");
        assert!(cache.is_empty());

        cache.resolve_address(10.123456, 106.654321).await;
        assert_eq!(geocoder.calls(), 2);
    }

    #[test]
    fn test_cell_key_handles_negative_coordinates() {
        assert_eq!(cell_key(-33.86881, 151.20929), (-338688, 1512092));
        assert_eq!(cell_key(-33.86889, 151.20921), (-338688, 1512092));
    }
}
