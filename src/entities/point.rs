use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{malformed_coordinate_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        let point = Self {
            latitude,
            longitude,
        };

        if !point.is_valid() {
            return Err(malformed_coordinate_error());
        }

        Ok(point)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn within(&self, bounds: &Rect<f64>) -> bool {
        let min = bounds.min();
        let max = bounds.max();

        self.longitude >= min.x
            && self.longitude <= max.x
            && self.latitude >= min.y
            && self.latitude <= max.y
    }
}

impl From<Point> for Coord<f64> {
    fn from(point: Point) -> Self {
        Coord {
            x: point.longitude,
            y: point.latitude,
        }
    }
}

impl From<Point> for geo_types::Point<f64> {
    fn from(point: Point) -> Self {
        geo_types::Point::new(point.longitude, point.latitude)
    }
}

impl From<Coord<f64>> for Point {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            latitude: coord.y,
            longitude: coord.x,
        }
    }
}

#[test]
fn point_range_test() {
    assert!(Point::new(-6.2088, 106.8456).is_ok());
    assert!(Point::new(90.0, -180.0).is_ok());
    assert!(Point::new(90.5, 0.0).is_err());
    assert!(Point::new(0.0, 181.0).is_err());
    assert!(Point::new(f64::NAN, 0.0).is_err());
    assert!(Point::new(0.0, f64::INFINITY).is_err());
}

#[test]
fn point_geo_axis_order_test() {
    let point = Point::new(-6.2, 106.8).unwrap();
    let coord: Coord<f64> = point.into();

    assert_eq!(coord.x, 106.8);
    assert_eq!(coord.y, -6.2);
    assert_eq!(Point::from(coord), point);
}
