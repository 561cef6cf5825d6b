use tracing::{debug, info, warn};

use crate::models::City;
use crate::repository::EventRepository;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationFix {
    Unsupported,
    Denied,
    Position(Coordinates),
}

pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// On ties the earliest city wins. Cities whose distance is not finite are
/// skipped.
pub fn closest_city(cities: &[City], point: Coordinates) -> Option<&City> {
    let mut best: Option<(&City, f64)> = None;
    for city in cities {
        let distance = haversine_km(point, Coordinates::new(city.latitude, city.longitude));
        if !distance.is_finite() {
            continue;
        }
        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((city, distance)),
        }
    }
    best.map(|(city, _)| city)
}

pub struct GeoResolver<'a> {
    default_city: &'a str,
}

impl<'a> GeoResolver<'a> {
    pub fn new(default_city: &'a str) -> Self {
        Self { default_city }
    }

    pub async fn resolve_city<R: EventRepository>(&self, repo: &R, fix: LocationFix) -> String {
        match fix {
            LocationFix::Unsupported => {
                info!(city = %self.default_city, "geolocation unsupported; using default city");
                self.default_city.to_string()
            }
            LocationFix::Denied => {
                info!(city = %self.default_city, "geolocation denied; using default city");
                self.default_city.to_string()
            }
            LocationFix::Position(point) => self.find_closest_city(repo, point).await,
        }
    }

    pub async fn find_closest_city<R: EventRepository>(&self, repo: &R, point: Coordinates) -> String {
        let Some(session) = repo.authenticate().await else {
            warn!("no session for closest city lookup; using default city");
            return self.default_city.to_string();
        };

        let cities = match repo.list_cities(&session).await {
            Ok(cities) => cities,
            Err(err) => {
                warn!(%err, "city lookup failed; using default city");
                return self.default_city.to_string();
            }
        };
        debug!(candidates = cities.len(), "scanning cities");

        match closest_city(&cities, point) {
            Some(city) => {
                info!(
                    lat = point.latitude,
                    lon = point.longitude,
                    city = %city.greater_city,
                    "closest city resolved"
                );
                city.greater_city.clone()
            }
            None => {
                warn!("no known cities; using default city");
                self.default_city.to_string()
            }
        }
    }
}
