use serde::{Deserialize, Serialize};

use crate::codec;
use crate::entities::Point;
use crate::error::Error;

/// The textual `coordinates` form is kept verbatim: persisted data may be
/// corrupt and is only decoded when drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub id: Option<i64>,
    pub ordering: i64,
    pub coordinates: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatePayload {
    pub ordering: i64,
    pub coordinates: String,
}

impl Coordinate {
    pub fn new(ordering: i64, point: Point) -> Self {
        Self {
            id: None,
            ordering,
            coordinates: codec::format(&point),
        }
    }

    pub fn persisted(id: i64, ordering: i64, coordinates: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            ordering,
            coordinates: coordinates.into(),
        }
    }

    pub fn point(&self) -> Result<Point, Error> {
        codec::parse(&self.coordinates)
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
}

impl From<&Coordinate> for CoordinatePayload {
    fn from(coordinate: &Coordinate) -> Self {
        Self {
            ordering: coordinate.ordering,
            coordinates: coordinate.coordinates.clone(),
        }
    }
}

#[test]
fn new_coordinate_is_transient_test() {
    let point = Point::new(-6.2, 106.8).unwrap();
    let coordinate = Coordinate::new(3, point);

    assert!(!coordinate.is_saved());
    assert_eq!(coordinate.coordinates, "-6.200000,106.800000");
    assert_eq!(coordinate.point().unwrap(), point);
}

#[test]
fn corrupt_persisted_text_fails_on_decode_test() {
    let coordinate = Coordinate::persisted(9, 0, "not-a-point");

    assert!(coordinate.is_saved());
    assert_eq!(
        coordinate.point().unwrap_err().code,
        crate::error::MALFORMED_COORDINATE
    );
}
