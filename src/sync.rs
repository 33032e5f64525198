use std::collections::HashMap;

use geo_types::{Coord, LineString};

use crate::codec;
use crate::entities::{Coordinate, Point};
use crate::error::Error;
use crate::surface::{
    LineStyle, MapBackend, MapSurface, Marker, MarkerIcon, Overlay, OverlayHandle, Polyline,
    Popup, PopupAction,
};
use crate::viewport::{Frame, ViewportFitter};

pub struct OverlaySynchronizer {
    markers: HashMap<OverlayHandle, usize>,
    polyline: Option<OverlayHandle>,
    line_style: LineStyle,
    removable: bool,
    fitter: ViewportFitter,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reconciled {
    pub markers: usize,
    pub polyline: bool,
    pub skipped: usize,
    pub frame: Option<Frame>,
}

impl OverlaySynchronizer {
    pub fn new(line_style: LineStyle, removable: bool, fitter: ViewportFitter) -> Self {
        Self {
            markers: HashMap::new(),
            polyline: None,
            line_style,
            removable,
            fitter,
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn has_polyline(&self) -> bool {
        self.polyline.is_some()
    }

    pub fn overlay_count(&self) -> usize {
        self.markers.len() + self.polyline.iter().count()
    }

    pub fn set_line_style(&mut self, line_style: LineStyle) {
        self.line_style = line_style;
    }

    #[tracing::instrument(skip_all, fields(points = snapshot.len()))]
    pub fn reconcile<B: MapBackend>(
        &mut self,
        surface: &mut MapSurface<B>,
        snapshot: &[Coordinate],
    ) -> Result<Reconciled, Error> {
        self.clear(surface);

        let mut drawn: Vec<Point> = Vec::with_capacity(snapshot.len());
        let mut skipped = 0;

        for (index, coordinate) in snapshot.iter().enumerate() {
            let point = match coordinate.point() {
                Ok(point) => point,
                Err(_) => {
                    tracing::warn!(
                        index,
                        text = %coordinate.coordinates,
                        "skipping undecodable coordinate"
                    );
                    skipped += 1;
                    continue;
                }
            };

            let handle = surface.draw(Overlay::Marker(self.point_marker(index, point)))?;
            self.markers.insert(handle, index);
            drawn.push(point);
        }

        if drawn.len() >= 2 {
            let polyline = Polyline {
                path: LineString::from(drawn.iter().map(|p| Coord::from(*p)).collect::<Vec<_>>()),
                style: self.line_style,
                popup: None,
                clickable: false,
            };
            self.polyline = Some(surface.draw(Overlay::Polyline(polyline))?);
        }

        let frame = match drawn.is_empty() {
            true => None,
            false => self.fitter.fit(surface, &drawn)?,
        };

        tracing::debug!(markers = self.markers.len(), skipped, "overlays reconciled");

        Ok(Reconciled {
            markers: self.markers.len(),
            polyline: self.polyline.is_some(),
            skipped,
            frame,
        })
    }

    pub fn clear<B: MapBackend>(&mut self, surface: &mut MapSurface<B>) {
        for (handle, _) in self.markers.drain() {
            surface.erase(handle);
        }

        if let Some(handle) = self.polyline.take() {
            surface.erase(handle);
        }
    }

    /// Returns `None` when the marker that raised it is no longer drawn,
    /// which is how queued actions from a previous redraw are dropped.
    pub fn resolve(&self, handle: OverlayHandle, action: PopupAction) -> Option<usize> {
        let drawn_index = *self.markers.get(&handle)?;

        match action {
            PopupAction::RemovePoint { index } if index == drawn_index => Some(index),
            PopupAction::RemovePoint { index: _ } => None,
        }
    }

    fn point_marker(&self, index: usize, point: Point) -> Marker {
        let label = index + 1;
        let mut popup =
            Popup::new(format!("Point {}", label)).line("Coordinates", codec::format(&point));

        if self.removable {
            popup = popup.with_action(PopupAction::RemovePoint { index });
        }

        Marker {
            position: point,
            icon: MarkerIcon::Numbered { label },
            popup: Some(popup),
        }
    }
}

#[cfg(test)]
fn surface() -> MapSurface<crate::surface::HeadlessMap> {
    use crate::surface::{HeadlessMap, Size};

    let backend = HeadlessMap::new().with_container("map", Size::new(800, 600));
    let mut surface = MapSurface::new(backend, "map");
    surface.create(Point::new(-6.2088, 106.8456).unwrap(), 10.0).unwrap();
    surface
}

#[test]
fn reconcile_draws_numbered_markers_and_line_test() {
    let mut surface = surface();
    let mut sync = OverlaySynchronizer::new(LineStyle::editing(), true, ViewportFitter::default());

    let snapshot = vec![
        Coordinate::new(0, Point::new(-6.2, 106.8).unwrap()),
        Coordinate::new(1, Point::new(-6.21, 106.82).unwrap()),
        Coordinate::new(2, Point::new(-6.19, 106.85).unwrap()),
    ];

    let result = sync.reconcile(&mut surface, &snapshot).unwrap();

    assert_eq!(result.markers, 3);
    assert!(result.polyline);
    assert!(result.frame.is_some());

    let backend = surface.backend();
    let labels: Vec<MarkerIcon> = backend.markers("map").iter().map(|(_, m)| m.icon).collect();
    assert_eq!(
        labels,
        vec![
            MarkerIcon::Numbered { label: 1 },
            MarkerIcon::Numbered { label: 2 },
            MarkerIcon::Numbered { label: 3 },
        ]
    );

    let polylines = backend.polylines("map");
    assert_eq!(polylines.len(), 1);
    assert_eq!(polylines[0].1.points()[1], Point::new(-6.21, 106.82).unwrap());
}

#[test]
fn reconcile_replaces_previous_overlays_test() {
    let mut surface = surface();
    let mut sync = OverlaySynchronizer::new(LineStyle::editing(), true, ViewportFitter::default());

    let two = vec![
        Coordinate::new(0, Point::new(1.0, 1.0).unwrap()),
        Coordinate::new(1, Point::new(2.0, 2.0).unwrap()),
    ];
    sync.reconcile(&mut surface, &two).unwrap();
    sync.reconcile(&mut surface, &two[..1]).unwrap();

    assert_eq!(sync.marker_count(), 1);
    assert!(!sync.has_polyline());
    assert_eq!(surface.overlay_count(), 1);
    assert_eq!(surface.backend().overlay_count("map"), 1);
}

#[test]
fn empty_snapshot_keeps_viewport_test() {
    let mut surface = surface();
    let mut sync = OverlaySynchronizer::new(LineStyle::editing(), true, ViewportFitter::default());

    let two = vec![
        Coordinate::new(0, Point::new(1.0, 1.0).unwrap()),
        Coordinate::new(1, Point::new(2.0, 2.0).unwrap()),
    ];
    sync.reconcile(&mut surface, &two).unwrap();
    let fitted = surface.view();

    let result = sync.reconcile(&mut surface, &[]).unwrap();

    assert_eq!(result.frame, None);
    assert_eq!(surface.view(), fitted);
    assert_eq!(surface.overlay_count(), 0);
}

#[test]
fn corrupt_point_is_skipped_test() {
    let mut surface = surface();
    let mut sync =
        OverlaySynchronizer::new(LineStyle::for_status(true), false, ViewportFitter::default());

    let snapshot = vec![
        Coordinate::persisted(1, 0, "-6.1,106.7"),
        Coordinate::persisted(2, 1, "garbage"),
        Coordinate::persisted(3, 2, "-6.3,106.9"),
    ];

    let result = sync.reconcile(&mut surface, &snapshot).unwrap();

    assert_eq!(result.markers, 2);
    assert_eq!(result.skipped, 1);
    assert!(result.polyline);

    let labels: Vec<MarkerIcon> = surface
        .backend()
        .markers("map")
        .iter()
        .map(|(_, m)| m.icon)
        .collect();
    assert_eq!(
        labels,
        vec![MarkerIcon::Numbered { label: 1 }, MarkerIcon::Numbered { label: 3 }]
    );
}

#[test]
fn read_only_markers_have_no_action_test() {
    let mut surface = surface();
    let mut sync =
        OverlaySynchronizer::new(LineStyle::for_status(false), false, ViewportFitter::default());

    sync.reconcile(&mut surface, &[Coordinate::new(0, Point::new(1.0, 1.0).unwrap())])
        .unwrap();

    let (handle, marker) = surface.backend().markers("map")[0];
    assert_eq!(marker.popup.as_ref().unwrap().action, None);
    assert!(!surface.backend().press_popup_action("map", handle));
}

#[test]
fn resolve_rejects_stale_handles_test() {
    let mut surface = surface();
    let mut sync = OverlaySynchronizer::new(LineStyle::editing(), true, ViewportFitter::default());

    let snapshot = vec![
        Coordinate::new(0, Point::new(1.0, 1.0).unwrap()),
        Coordinate::new(1, Point::new(2.0, 2.0).unwrap()),
    ];
    sync.reconcile(&mut surface, &snapshot).unwrap();

    let (handle, _) = surface.backend().markers("map")[1];
    let action = PopupAction::RemovePoint { index: 1 };
    assert_eq!(sync.resolve(handle, action), Some(1));

    sync.reconcile(&mut surface, &snapshot).unwrap();
    assert_eq!(sync.resolve(handle, action), None);
}
