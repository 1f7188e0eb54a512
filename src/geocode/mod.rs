pub mod cache;
pub mod client;

pub use cache::{format_coordinates, GeocodeCache};
pub use client::{GeocodeError, GeocodedAddress, Geocoder, HttpGeocoder};
