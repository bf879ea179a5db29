use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("latitude {0} outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside -180..=180")]
    LongitudeOutOfRange(f64),

    #[error("coordinate is not a finite number")]
    NonFinite,
}

/// Unchecked wire form of a [`Coordinate`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// A finite, in-range latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LatLon", into = "LatLon")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub const SAN_FRANCISCO: Self = Self {
        lat: 37.7749,
        lon: -122.4194,
    };

    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !(lat.is_finite() && lon.is_finite()) {
            Err(CoordinateError::NonFinite)
        } else if lat.abs() > 90.0 {
            Err(CoordinateError::LatitudeOutOfRange(lat))
        } else if lon.abs() > 180.0 {
            Err(CoordinateError::LongitudeOutOfRange(lon))
        } else {
            Ok(Self { lat, lon })
        }
    }

    /// Strictly closer than `radius_m` meters to `center`.
    #[must_use]
    pub fn is_within(self, center: Self, radius_m: f64) -> bool {
        haversine_distance(self, center) < radius_m
    }
}

impl TryFrom<LatLon> for Coordinate {
    type Error = CoordinateError;

    fn try_from(LatLon { lat, lon }: LatLon) -> Result<Self, Self::Error> {
        Self::new(lat, lon)
    }
}

impl From<Coordinate> for LatLon {
    fn from(Coordinate { lat, lon }: Coordinate) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance in meters between two points.
#[must_use]
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }

    let (phi1, phi2) = (from.lat.to_radians(), to.lat.to_radians());
    let half_dphi = (to.lat - from.lat).to_radians() / 2.0;
    let half_dlambda = (to.lon - from.lon).to_radians() / 2.0;

    // Rounding can push h a hair outside [0, 1] for antipodal points.
    let h = (half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2))
        .clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_edges_are_valid() {
        for (lat, lon) in [(0.0, 0.0), (90.0, 180.0), (-90.0, -180.0)] {
            assert!(Coordinate::new(lat, lon).is_ok(), "{lat},{lon}");
        }
    }

    #[test]
    fn out_of_range_and_non_finite_are_rejected() {
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            Coordinate::new(0.0, -181.0),
            Err(CoordinateError::LongitudeOutOfRange(-181.0))
        );
        assert_eq!(Coordinate::new(f64::NAN, 0.0), Err(CoordinateError::NonFinite));
        assert_eq!(Coordinate::new(0.0, f64::INFINITY), Err(CoordinateError::NonFinite));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let sf = Coordinate::SAN_FRANCISCO;
        assert_eq!(haversine_distance(sf, sf), 0.0);
    }

    #[test]
    fn antipodes_are_half_the_circumference_apart() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(0.0, 180.0).unwrap();
        let expected = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((haversine_distance(a, b) - expected).abs() < 1.0);
    }

    #[test]
    fn mission_is_near_and_oakland_is_not() {
        let oakland = Coordinate::new(37.8044, -122.2712).unwrap();
        let distance = haversine_distance(Coordinate::SAN_FRANCISCO, oakland);
        assert!(distance > 10_000.0 && distance < 20_000.0);

        let mission = Coordinate::new(37.7599, -122.4148).unwrap();
        assert!(mission.is_within(Coordinate::SAN_FRANCISCO, 10_000.0));
        assert!(!oakland.is_within(Coordinate::SAN_FRANCISCO, 10_000.0));
    }

    #[test]
    fn null_island_is_far_from_san_francisco() {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        assert!(haversine_distance(origin, Coordinate::SAN_FRANCISCO) > 12_000_000.0);
    }

    #[test]
    fn deserializing_validates_the_range() {
        let ok: Coordinate = serde_json::from_str(r#"{"lat": 1.5, "lon": 2.5}"#).unwrap();
        assert_eq!(LatLon::from(ok), LatLon { lat: 1.5, lon: 2.5 });
        assert!(serde_json::from_str::<Coordinate>(r#"{"lat": 95.0, "lon": 0.0}"#).is_err());
    }
}
