use std::collections::HashMap;

use geo_types::{Coord, LineString};

use crate::entities::{Point, Route};
use crate::error::Error;
use crate::surface::{
    LineStyle, MapBackend, MapSurface, Marker, MarkerIcon, Overlay, OverlayHandle, Polyline,
    Popup,
};
use crate::viewport::{Frame, ViewportFitter};

pub struct RouteRenderer {
    routes: Vec<Route>,
    drawn: HashMap<i64, RouteOverlays>,
    polylines: HashMap<OverlayHandle, usize>,
    fitter: ViewportFitter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteOverlays {
    pub polyline: OverlayHandle,
    pub start: OverlayHandle,
    pub end: Option<OverlayHandle>,
}

impl RouteOverlays {
    fn handles(&self) -> impl Iterator<Item = OverlayHandle> {
        [Some(self.polyline), Some(self.start), self.end]
            .into_iter()
            .flatten()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderSummary {
    pub routes: usize,
    pub polylines: usize,
    pub markers: usize,
    pub skipped_points: usize,
    pub frame: Option<Frame>,
}

impl RouteRenderer {
    pub fn new(fitter: ViewportFitter) -> Self {
        Self {
            routes: vec![],
            drawn: HashMap::new(),
            polylines: HashMap::new(),
            fitter,
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn overlays_for(&self, route_id: i64) -> Option<RouteOverlays> {
        self.drawn.get(&route_id).copied()
    }

    pub fn route_for(&self, handle: OverlayHandle) -> Option<&Route> {
        self.polylines.get(&handle).and_then(|i| self.routes.get(*i))
    }

    pub fn overlay_count(&self) -> usize {
        self.drawn.values().map(|o| o.handles().count()).sum()
    }

    #[tracing::instrument(skip_all, fields(routes = routes.len()))]
    pub fn render<B: MapBackend>(
        &mut self,
        surface: &mut MapSurface<B>,
        routes: Vec<Route>,
    ) -> Result<RenderSummary, Error> {
        self.clear(surface);
        self.routes = routes;

        let mut summary = RenderSummary::default();
        let mut all_points: Vec<Point> = vec![];

        for index in 0..self.routes.len() {
            let route = &self.routes[index];
            let mut points = Vec::with_capacity(route.coordinates.len());

            for coordinate in route.sorted_coordinates() {
                match coordinate.point() {
                    Ok(point) => points.push(point),
                    Err(_) => {
                        tracing::warn!(
                            route_id = route.id,
                            text = %coordinate.coordinates,
                            "skipping undecodable coordinate"
                        );
                        summary.skipped_points += 1;
                    }
                }
            }

            if points.is_empty() {
                continue;
            }

            if self.drawn.contains_key(&route.id) {
                tracing::warn!(route_id = route.id, "route listed twice, drawing once");
                continue;
            }

            let overlays = draw_route(surface, route, &points)?;

            summary.routes += 1;
            summary.polylines += 1;
            summary.markers += 1 + overlays.end.iter().count();

            self.polylines.insert(overlays.polyline, index);
            self.drawn.insert(route.id, overlays);
            all_points.extend(points);
        }

        summary.frame = self.fitter.fit(surface, &all_points)?;

        tracing::info!(
            routes = summary.routes,
            skipped_points = summary.skipped_points,
            "routes rendered"
        );

        Ok(summary)
    }

    pub fn clear<B: MapBackend>(&mut self, surface: &mut MapSurface<B>) {
        for (_, overlays) in self.drawn.drain() {
            for handle in overlays.handles() {
                surface.erase(handle);
            }
        }

        self.polylines.clear();
        self.routes.clear();
    }
}

fn draw_route<B: MapBackend>(
    surface: &mut MapSurface<B>,
    route: &Route,
    points: &[Point],
) -> Result<RouteOverlays, Error> {
    let path: Vec<Coord<f64>> = points.iter().map(|p| Coord::from(*p)).collect();

    let polyline = surface.draw(Overlay::Polyline(Polyline {
        path: LineString::from(path),
        style: LineStyle::for_status(route.active),
        popup: Some(route_popup(route)),
        clickable: true,
    }))?;

    let first = points[0];
    let start = surface.draw(Overlay::Marker(Marker {
        position: first,
        icon: MarkerIcon::Start,
        popup: Some(endpoint_popup("Start point", route, &route.start_marker, first)),
    }))?;

    let end = match points.len() >= 2 {
        true => {
            let last = points[points.len() - 1];
            Some(surface.draw(Overlay::Marker(Marker {
                position: last,
                icon: MarkerIcon::End,
                popup: Some(endpoint_popup("End point", route, &route.end_marker, last)),
            }))?)
        }
        false => None,
    };

    Ok(RouteOverlays {
        polyline,
        start,
        end,
    })
}

fn route_popup(route: &Route) -> Popup {
    Popup::new(route.name.clone())
        .line("Unit", route.unit_name())
        .line("Length", format!("{} km", route.length_km))
        .line("KM", format!("{} - {}", route.start_marker, route.end_marker))
        .line("Status", route.status_label())
}

fn endpoint_popup(title: &str, route: &Route, marker_label: &str, point: Point) -> Popup {
    Popup::new(title)
        .line("Route", route.name.clone())
        .line("KM", marker_label)
        .line(
            "Coordinates",
            format!("{:.6}, {:.6}", point.latitude, point.longitude),
        )
}

#[cfg(test)]
pub(crate) fn sample_route(id: i64, active: bool, texts: &[&str]) -> Route {
    use crate::entities::Coordinate;

    Route {
        id,
        name: format!("Route {}", id),
        unit_id: 1,
        unit: None,
        length_km: 12.5,
        start_marker: "0".into(),
        end_marker: "12".into(),
        active,
        coordinates: texts
            .iter()
            .enumerate()
            .map(|(i, t)| Coordinate::persisted(id * 100 + i as i64, i as i64, *t))
            .collect(),
        created_at: None,
        updated_at: None,
    }
}

#[cfg(test)]
fn surface() -> MapSurface<crate::surface::HeadlessMap> {
    use crate::surface::{HeadlessMap, Size};

    let backend = HeadlessMap::new().with_container("dashboard", Size::new(1024, 768));
    let mut surface = MapSurface::new(backend, "dashboard");
    surface.create(Point::new(-6.2088, 106.8456).unwrap(), 10.0).unwrap();
    surface
}

#[test]
fn rerender_leaves_no_stale_overlays_test() {
    use crate::surface::{ACTIVE_COLOR, INACTIVE_COLOR};

    let mut surface = surface();
    let mut renderer = RouteRenderer::new(ViewportFitter::default());

    let first = vec![
        sample_route(1, true, &["-6.1,106.7", "-6.2,106.8"]),
        sample_route(2, false, &["-6.3,106.9", "-6.4,107.0"]),
    ];
    let summary = renderer.render(&mut surface, first).unwrap();

    assert_eq!(summary.polylines, 2);
    assert_eq!(summary.markers, 4);

    let colors: Vec<&str> = surface
        .backend()
        .polylines("dashboard")
        .iter()
        .map(|(_, p)| p.style.color)
        .collect();
    assert!(colors.contains(&ACTIVE_COLOR));
    assert!(colors.contains(&INACTIVE_COLOR));

    let second = vec![sample_route(2, true, &["-6.3,106.9", "-6.4,107.0"])];
    renderer.render(&mut surface, second).unwrap();

    let backend = surface.backend();
    assert_eq!(backend.polylines("dashboard").len(), 1);
    assert_eq!(backend.markers("dashboard").len(), 2);
    assert_eq!(backend.overlay_count("dashboard"), 3);
    assert_eq!(renderer.overlay_count(), 3);
    assert!(renderer.overlays_for(1).is_none());
}

#[test]
fn single_point_route_has_no_end_marker_test() {
    let mut surface = surface();
    let mut renderer = RouteRenderer::new(ViewportFitter::default());
    let before = surface.view();

    let summary = renderer
        .render(&mut surface, vec![sample_route(5, true, &["-6.1,106.7"])])
        .unwrap();

    assert_eq!(summary.routes, 1);
    assert_eq!(summary.markers, 1);
    assert!(renderer.overlays_for(5).unwrap().end.is_none());
    assert_eq!(summary.frame, None);
    assert_eq!(surface.view(), before);
}

#[test]
fn routes_without_geometry_are_skipped_test() {
    let mut surface = surface();
    let mut renderer = RouteRenderer::new(ViewportFitter::default());
    let before = surface.view();

    let summary = renderer
        .render(
            &mut surface,
            vec![sample_route(1, true, &[]), sample_route(2, true, &["bad", "worse"])],
        )
        .unwrap();

    assert_eq!(summary.routes, 0);
    assert_eq!(summary.skipped_points, 2);
    assert_eq!(surface.backend().overlay_count("dashboard"), 0);
    assert_eq!(surface.view(), before);
}

#[test]
fn render_uses_sorted_geometry_and_fits_union_test() {
    let mut surface = surface();
    let mut renderer = RouteRenderer::new(ViewportFitter::default());

    let mut route = sample_route(3, true, &[]);
    route.coordinates = vec![
        crate::entities::Coordinate::persisted(1, 2, "-6.3,106.9"),
        crate::entities::Coordinate::persisted(2, 0, "-6.1,106.7"),
        crate::entities::Coordinate::persisted(3, 1, "-6.2,106.8"),
    ];
    let other = sample_route(4, true, &["-7.0,110.0", "-7.1,110.1"]);

    let summary = renderer.render(&mut surface, vec![route, other]).unwrap();

    let overlays = renderer.overlays_for(3).unwrap();
    let start = surface.backend().overlay(surface.container(), overlays.start).unwrap();
    match start {
        Overlay::Marker(marker) => assert_eq!(marker.position, Point::new(-6.1, 106.7).unwrap()),
        _ => panic!("start handle is not a marker"),
    }

    let frame = summary.frame.unwrap();
    assert!(frame.contains(&Point::new(-6.3, 106.9).unwrap()));
    assert!(frame.contains(&Point::new(-7.1, 110.1).unwrap()));

    let visible = surface.backend().visible_bounds("dashboard").unwrap();
    assert!(Point::new(-7.1, 110.1).unwrap().within(&visible));
    assert!(Point::new(-6.1, 106.7).unwrap().within(&visible));
}

#[test]
fn polyline_handle_maps_to_route_test() {
    let mut surface = surface();
    let mut renderer = RouteRenderer::new(ViewportFitter::default());

    renderer
        .render(
            &mut surface,
            vec![sample_route(8, true, &["-6.1,106.7", "-6.2,106.8"])],
        )
        .unwrap();

    let overlays = renderer.overlays_for(8).unwrap();

    assert_eq!(renderer.route_for(overlays.polyline).map(|r| r.id), Some(8));
    assert!(renderer.route_for(overlays.start).is_none());
}
