//! Day/night and auroral-oval geometry used by the map and the aviation briefing.
//! Simple solar-position approximations, good to about a degree.

use crate::models::GeoPoint;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

/// Geomagnetic north pole used for map overlays.
pub const GEOMAGNETIC_POLE: GeoPoint = GeoPoint { lat: 80.37, lng: -72.62 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Country {
    pub name: &'static str,
    pub bounds: Bounds,
}

impl Country {
    /// Bounding-box test. A box with `west > east` straddles the antimeridian.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let b = &self.bounds;
        if lat < b.south || lat > b.north {
            return false;
        }
        if b.west <= b.east {
            b.west <= lng && lng <= b.east
        } else {
            lng >= b.west || lng <= b.east
        }
    }
}

/// Northern regions whose airspace sits under the auroral oval in a storm.
pub const COUNTRIES: [Country; 8] = [
    Country { name: "Canada", bounds: Bounds { north: 83.11, south: 41.68, west: -141.00, east: -52.64 } },
    Country { name: "United States (Alaska)", bounds: Bounds { north: 71.41, south: 54.78, west: -179.78, east: -129.99 } },
    Country { name: "Greenland", bounds: Bounds { north: 83.63, south: 59.78, west: -73.04, east: -12.21 } },
    Country { name: "Iceland", bounds: Bounds { north: 66.54, south: 63.40, west: -24.54, east: -13.50 } },
    Country { name: "Norway", bounds: Bounds { north: 71.18, south: 57.98, west: 4.65, east: 31.29 } },
    Country { name: "Sweden", bounds: Bounds { north: 69.06, south: 55.34, west: 11.11, east: 24.17 } },
    Country { name: "Finland", bounds: Bounds { north: 70.09, south: 59.81, west: 20.55, east: 31.59 } },
    Country { name: "Russia (Siberia & Arctic)", bounds: Bounds { north: 81.86, south: 49.00, west: 60.00, east: -169.05 } },
];

fn fractional_hour(t: &DateTime<Utc>) -> f64 {
    t.hour() as f64 + t.minute() as f64 / 60.0
}

fn wrap_longitude(mut lng: f64) -> f64 {
    while lng > 180.0 {
        lng -= 360.0;
    }
    while lng < -180.0 {
        lng += 360.0;
    }
    lng
}

/// Sunset side of the day/night boundary, one point every 2 degrees of
/// latitude. Latitudes in polar day or night have no crossing and are skipped.
pub fn solar_terminator(t: DateTime<Utc>) -> Vec<GeoPoint> {
    let day_of_year = t.ordinal() as f64;
    let hour_angle = 15.0 * (fractional_hour(&t) - 12.0);
    let declination = (0.39795 * (0.98563 * (day_of_year - 173.0) * PI / 180.0).cos()).asin();

    (-90..=90)
        .step_by(2)
        .filter_map(|lat| {
            let cos_hour_angle = -(lat as f64).to_radians().tan() * declination.tan();
            if !cos_hour_angle.is_finite() || cos_hour_angle.abs() > 1.0 {
                return None;
            }
            let sunrise_hour_angle = cos_hour_angle.acos().to_degrees();
            Some(GeoPoint { lat: lat as f64, lng: wrap_longitude(hour_angle - sunrise_hour_angle) })
        })
        .collect()
}

/// The oval approximated as a circle of latitude, sampled every 10 degrees.
pub fn aurora_oval(geomagnetic_latitude: f64) -> Vec<GeoPoint> {
    (-180..=180)
        .step_by(10)
        .map(|lng| GeoPoint { lat: geomagnetic_latitude, lng: lng as f64 })
        .collect()
}

/// True when the sun is below the horizon at this point and time.
pub fn is_on_night_side(lat: f64, lng: f64, t: DateTime<Utc>) -> bool {
    let day_of_year = t.ordinal() as f64;
    let declination = 23.44 * (360.0 / 365.0 * (day_of_year + 10.0)).to_radians().cos();

    let solar_time = lng / 15.0 + fractional_hour(&t);
    let hour_angle = 15.0 * (solar_time - 12.0);

    let lat_rad = lat.to_radians();
    let decl_rad = declination.to_radians();
    let elevation = (lat_rad.sin() * decl_rad.sin()
        + lat_rad.cos() * decl_rad.cos() * hour_angle.to_radians().cos())
        .asin()
        .to_degrees();

    elevation < 0.0
}
