//! Geocoding and route-distance collaborator.
//!
//! Distances are informational: they decorate deliveries and order
//! listings but never feed status derivation. The coordinator always calls
//! a [`RouteService`] outside its global lock, so an implementation is free
//! to block on the network.

use std::collections::BTreeMap;

use dispatch_types::{GeoPoint, VehicleKind};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Errors returned by a [`RouteService`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    /// The address could not be resolved to coordinates.
    #[error("unknown address: {address:?}")]
    UnknownAddress {
        /// The address as given.
        address: String,
    },

    /// The routing backend could not produce a route.
    #[error("route unavailable: {reason}")]
    RouteUnavailable {
        /// Backend-provided reason.
        reason: String,
    },
}

/// Address lookup and route distances.
pub trait RouteService: Send + Sync {
    /// Resolve an address to coordinates.
    fn geocode(&self, address: &str) -> Result<GeoPoint, GeoError>;

    /// Travel distance in kilometres between two points for a vehicle.
    fn route_distance(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        vehicle: VehicleKind,
    ) -> Result<f64, GeoError>;
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// How much longer a road route is than the straight line, per vehicle.
const fn detour_factor(vehicle: VehicleKind) -> f64 {
    match vehicle {
        VehicleKind::Car => 1.35,
        VehicleKind::Motorcycle => 1.25,
        VehicleKind::Bicycle => 1.2,
        VehicleKind::OnFoot => 1.1,
    }
}

/// A route service that needs no network.
///
/// Addresses resolve through a fixed table (case and surrounding
/// whitespace are ignored). Route distances are the great-circle distance
/// stretched by a per-vehicle detour factor.
#[derive(Debug, Clone, Default)]
pub struct OfflineRoutes {
    addresses: BTreeMap<String, GeoPoint>,
}

impl OfflineRoutes {
    /// Create a service with no known addresses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service preloaded with the sample Jerusalem addresses used
    /// by seeded databases.
    pub fn with_sample_addresses() -> Self {
        let mut routes = Self::new();
        for (address, lat, lon) in SAMPLE_ADDRESSES {
            routes.add_address(address, GeoPoint::new(*lat, *lon));
        }
        routes
    }

    /// Register (or replace) an address.
    pub fn add_address(&mut self, address: &str, point: GeoPoint) {
        self.addresses.insert(normalize(address), point);
    }

    /// Builder form of [`OfflineRoutes::add_address`].
    #[must_use]
    pub fn address(mut self, address: &str, point: GeoPoint) -> Self {
        self.add_address(address, point);
        self
    }

    /// Every known address, normalized.
    pub fn known_addresses(&self) -> impl Iterator<Item = &str> {
        self.addresses.keys().map(String::as_str)
    }
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

impl RouteService for OfflineRoutes {
    fn geocode(&self, address: &str) -> Result<GeoPoint, GeoError> {
        self.addresses
            .get(&normalize(address))
            .copied()
            .ok_or_else(|| GeoError::UnknownAddress {
                address: address.to_owned(),
            })
    }

    fn route_distance(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        vehicle: VehicleKind,
    ) -> Result<f64, GeoError> {
        let distance = haversine_km(from, to) * detour_factor(vehicle);
        if distance.is_finite() {
            Ok(distance)
        } else {
            Err(GeoError::RouteUnavailable {
                reason: format!("no finite route between {from:?} and {to:?}"),
            })
        }
    }
}

/// Addresses known to [`OfflineRoutes::with_sample_addresses`].
pub const SAMPLE_ADDRESSES: &[(&str, f64, f64)] = &[
    ("Jaffa Rd 1, Jerusalem", 31.7857, 35.2007),
    ("King George St 10, Jerusalem", 31.7800, 35.2170),
    ("Emek Refaim 20, Jerusalem", 31.7628, 35.2196),
    ("Herzl Blvd 5, Jerusalem", 31.7856, 35.1892),
    ("Agripas St 40, Jerusalem", 31.7846, 35.2118),
    ("Ben Yehuda St 12, Jerusalem", 31.7820, 35.2160),
    ("Bezalel St 8, Jerusalem", 31.7794, 35.2110),
    ("HaNeviim St 30, Jerusalem", 31.7835, 35.2200),
    ("Keren HaYesod St 15, Jerusalem", 31.7720, 35.2220),
    ("Malha Mall, Jerusalem", 31.7510, 35.1870),
    ("Givat Ram Campus, Jerusalem", 31.7750, 35.1980),
    ("Mount Scopus Campus, Jerusalem", 31.7940, 35.2430),
];
