use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Coordinate, CoordinatePayload, Unit};
use crate::error::{
    insufficient_geometry_error, invalid_field_error, malformed_point_error, Error,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub unit_id: i64,
    pub unit: Option<Unit>,
    pub length_km: f64,
    pub start_marker: String,
    pub end_marker: String,
    pub active: bool,
    pub coordinates: Vec<Coordinate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub id: i64,
    pub name: String,
    pub unit_id: i64,
    pub length_km: f64,
    pub start_marker: String,
    pub end_marker: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePage {
    pub items: Vec<RouteSummary>,
    pub total_pages: u32,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteForm {
    pub unit_id: i64,
    pub name: String,
    pub length_km: f64,
    pub start_marker: String,
    pub end_marker: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteDraft {
    pub unit_id: i64,
    pub name: String,
    pub length_km: f64,
    pub start_marker: String,
    pub end_marker: String,
    pub active: bool,
    pub coordinates: Vec<CoordinatePayload>,
}

impl Route {
    pub fn sorted_coordinates(&self) -> Vec<Coordinate> {
        let mut sorted = self.coordinates.clone();
        sorted.sort_by_key(|c| c.ordering);
        sorted
    }

    pub fn unit_name(&self) -> &str {
        self.unit.as_ref().map(|u| u.name.as_str()).unwrap_or("-")
    }

    pub fn status_label(&self) -> &'static str {
        match self.active {
            true => "Active",
            false => "Inactive",
        }
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            id: self.id,
            name: self.name.clone(),
            unit_id: self.unit_id,
            length_km: self.length_km,
            start_marker: self.start_marker.clone(),
            end_marker: self.end_marker.clone(),
            active: self.active,
        }
    }

    pub fn form(&self) -> RouteForm {
        RouteForm {
            unit_id: self.unit_id,
            name: self.name.clone(),
            length_km: self.length_km,
            start_marker: self.start_marker.clone(),
            end_marker: self.end_marker.clone(),
            active: self.active,
        }
    }
}

impl From<RouteSummary> for Route {
    fn from(summary: RouteSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            unit_id: summary.unit_id,
            unit: None,
            length_km: summary.length_km,
            start_marker: summary.start_marker,
            end_marker: summary.end_marker,
            active: summary.active,
            coordinates: vec![],
            created_at: None,
            updated_at: None,
        }
    }
}

impl RouteForm {
    pub fn validate(&self) -> Result<(), Error> {
        if self.unit_id == 0 {
            return Err(invalid_field_error("unit_id", "a unit must be selected"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid_field_error("name", "route name is required"));
        }
        if !(self.length_km > 0.0) {
            return Err(invalid_field_error("length_km", "length must be greater than 0"));
        }
        if self.start_marker.trim().is_empty() {
            return Err(invalid_field_error("start_marker", "start marker is required"));
        }
        if self.end_marker.trim().is_empty() {
            return Err(invalid_field_error("end_marker", "end marker is required"));
        }

        Ok(())
    }
}

impl RouteDraft {
    /// Only decodable points count toward the two-point minimum, which is
    /// checked before the form. Orderings are renumbered `0..n`.
    pub fn new(form: RouteForm, snapshot: &[Coordinate]) -> Result<Self, Error> {
        let corrupt: Vec<usize> = snapshot
            .iter()
            .enumerate()
            .filter(|(_, c)| c.point().is_err())
            .map(|(i, _)| i + 1)
            .collect();

        let decodable = snapshot.len() - corrupt.len();
        if decodable < 2 {
            return Err(insufficient_geometry_error(decodable));
        }

        if let Some(position) = corrupt.first() {
            return Err(malformed_point_error(*position));
        }

        form.validate()?;

        let coordinates = snapshot
            .iter()
            .enumerate()
            .map(|(i, c)| CoordinatePayload {
                ordering: i as i64,
                coordinates: c.coordinates.clone(),
            })
            .collect();

        Ok(Self {
            unit_id: form.unit_id,
            name: form.name.trim().to_string(),
            length_km: form.length_km,
            start_marker: form.start_marker.trim().to_string(),
            end_marker: form.end_marker.trim().to_string(),
            active: form.active,
            coordinates,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_form() -> RouteForm {
    RouteForm {
        unit_id: 1,
        name: "Jakarta Bogor Ciawi".into(),
        length_km: 34.0,
        start_marker: "1".into(),
        end_marker: "34".into(),
        active: true,
    }
}

#[test]
fn sorted_coordinates_does_not_mutate_test() {
    let route = Route {
        coordinates: vec![
            Coordinate::persisted(1, 2, "-6.3,106.9"),
            Coordinate::persisted(2, 0, "-6.1,106.7"),
        ],
        ..Route::from(sample_form_summary())
    };

    let sorted = route.sorted_coordinates();

    assert_eq!(sorted[0].ordering, 0);
    assert_eq!(route.coordinates[0].ordering, 2);
}

#[cfg(test)]
fn sample_form_summary() -> RouteSummary {
    RouteSummary {
        id: 7,
        name: "Jakarta Bogor Ciawi".into(),
        unit_id: 1,
        length_km: 34.0,
        start_marker: "1".into(),
        end_marker: "34".into(),
        active: true,
    }
}

#[test]
fn draft_rejects_single_point_before_form_test() {
    let mut form = sample_form();
    form.name = "".into();

    let snapshot = vec![Coordinate::persisted(1, 0, "-6.1,106.7")];
    let err = RouteDraft::new(form, &snapshot).unwrap_err();

    assert_eq!(err.code, crate::error::INSUFFICIENT_GEOMETRY);
}

#[test]
fn draft_renumbers_orderings_test() {
    let snapshot = vec![
        Coordinate::persisted(1, 4, "-6.1,106.7"),
        Coordinate::persisted(2, 9, "-6.2,106.8"),
    ];

    let draft = RouteDraft::new(sample_form(), &snapshot).unwrap();

    assert_eq!(draft.coordinates[0].ordering, 0);
    assert_eq!(draft.coordinates[1].ordering, 1);
    assert_eq!(draft.coordinates[1].coordinates, "-6.2,106.8");
}

#[test]
fn form_validation_test() {
    let mut form = sample_form();
    assert!(form.validate().is_ok());

    form.length_km = 0.0;
    assert!(form.validate().unwrap_err().message.starts_with("length_km"));

    form = sample_form();
    form.unit_id = 0;
    assert!(form.validate().unwrap_err().message.starts_with("unit_id"));

    form = sample_form();
    form.end_marker = "  ".into();
    assert!(form.validate().unwrap_err().message.starts_with("end_marker"));
}

#[test]
fn draft_counts_only_decodable_points_test() {
    use crate::error::{INSUFFICIENT_GEOMETRY, MALFORMED_COORDINATE};

    let snapshot = vec![
        Coordinate::persisted(1, 0, "-6.1,106.7"),
        Coordinate::persisted(2, 1, "garbage"),
    ];
    let err = RouteDraft::new(sample_form(), &snapshot).unwrap_err();
    assert_eq!(err.code, INSUFFICIENT_GEOMETRY);

    let snapshot = vec![
        Coordinate::persisted(1, 0, "-6.1,106.7"),
        Coordinate::persisted(2, 1, "garbage"),
        Coordinate::persisted(3, 2, "-6.2,106.8"),
    ];
    let err = RouteDraft::new(sample_form(), &snapshot).unwrap_err();
    assert_eq!(err.code, MALFORMED_COORDINATE);
    assert!(err.message.starts_with("point 2"));
}
