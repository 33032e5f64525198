use std::collections::HashMap;
use std::f64::consts::PI;

use async_channel::Sender;
use geo_types::{coord, Rect};
use serde::Serialize;

use super::{
    MapBackend, Marker, Overlay, OverlayHandle, Polyline, Size, SurfaceEvent, TileLayer, View,
};
use crate::entities::Point;
use crate::error::{surface_already_active_error, Error};

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

#[derive(Default)]
pub struct HeadlessMap {
    containers: HashMap<String, Container>,
    viewports: HashMap<String, Viewport>,
}

struct Container {
    size: Size,
    pending_polls: u32,
}

struct Viewport {
    view: View,
    size: Size,
    max_zoom: u8,
    overlays: Vec<(OverlayHandle, Overlay)>,
    last_fit: Option<Rect<f64>>,
    events: Sender<SurfaceEvent>,
}

#[derive(Debug, Serialize)]
pub struct ViewportSnapshot<'a> {
    pub view: View,
    pub size: Size,
    pub overlays: Vec<&'a Overlay>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(mut self, name: &str, size: Size) -> Self {
        self.resize_container(name, size);
        self
    }

    /// A container whose layout only settles after `polls` size queries.
    pub fn with_late_container(mut self, name: &str, size: Size, polls: u32) -> Self {
        self.containers.insert(
            name.into(),
            Container {
                size,
                pending_polls: polls,
            },
        );
        self
    }

    pub fn resize_container(&mut self, name: &str, size: Size) {
        self.containers.insert(
            name.into(),
            Container {
                size,
                pending_polls: 0,
            },
        );
    }

    pub fn is_attached(&self, container: &str) -> bool {
        self.viewports.contains_key(container)
    }

    pub fn overlay_count(&self, container: &str) -> usize {
        self.viewports
            .get(container)
            .map(|v| v.overlays.len())
            .unwrap_or(0)
    }

    pub fn overlay(&self, container: &str, handle: OverlayHandle) -> Option<&Overlay> {
        self.viewports
            .get(container)?
            .overlays
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, o)| o)
    }

    pub fn markers(&self, container: &str) -> Vec<(OverlayHandle, &Marker)> {
        self.overlays(container)
            .filter_map(|(h, o)| match o {
                Overlay::Marker(marker) => Some((*h, marker)),
                _ => None,
            })
            .collect()
    }

    pub fn polylines(&self, container: &str) -> Vec<(OverlayHandle, &Polyline)> {
        self.overlays(container)
            .filter_map(|(h, o)| match o {
                Overlay::Polyline(polyline) => Some((*h, polyline)),
                _ => None,
            })
            .collect()
    }

    pub fn last_fit(&self, container: &str) -> Option<Rect<f64>> {
        self.viewports.get(container)?.last_fit
    }

    pub fn snapshot(&self, container: &str) -> Option<ViewportSnapshot<'_>> {
        let viewport = self.viewports.get(container)?;

        Some(ViewportSnapshot {
            view: viewport.view,
            size: viewport.size,
            overlays: viewport.overlays.iter().map(|(_, o)| o).collect(),
        })
    }

    pub fn visible_bounds(&self, container: &str) -> Option<Rect<f64>> {
        let viewport = self.viewports.get(container)?;
        let (cx, cy) = project(viewport.view.center, viewport.view.zoom);
        let half_w = f64::from(viewport.size.width) / 2.0;
        let half_h = f64::from(viewport.size.height) / 2.0;

        let north_west = unproject(cx - half_w, cy - half_h, viewport.view.zoom);
        let south_east = unproject(cx + half_w, cy + half_h, viewport.view.zoom);

        Some(Rect::new(
            coord! { x: north_west.longitude, y: south_east.latitude },
            coord! { x: south_east.longitude, y: north_west.latitude },
        ))
    }

    pub fn click(&self, container: &str, point: Point) -> bool {
        self.emit(container, SurfaceEvent::Click(point))
    }

    pub fn press_popup_action(&self, container: &str, handle: OverlayHandle) -> bool {
        let action = match self.overlay(container, handle) {
            Some(Overlay::Marker(Marker {
                popup: Some(popup), ..
            })) => popup.action,
            Some(Overlay::Polyline(Polyline {
                popup: Some(popup), ..
            })) => popup.action,
            _ => None,
        };

        match action {
            Some(action) => self.emit(container, SurfaceEvent::PopupAction { handle, action }),
            None => false,
        }
    }

    pub fn click_overlay(&self, container: &str, handle: OverlayHandle) -> bool {
        match self.overlay(container, handle) {
            Some(Overlay::Polyline(polyline)) if polyline.clickable => {
                self.emit(container, SurfaceEvent::OverlayClick(handle))
            }
            _ => false,
        }
    }

    fn overlays(&self, container: &str) -> impl Iterator<Item = &(OverlayHandle, Overlay)> {
        self.viewports
            .get(container)
            .into_iter()
            .flat_map(|v| v.overlays.iter())
    }

    fn emit(&self, container: &str, event: SurfaceEvent) -> bool {
        match self.viewports.get(container) {
            Some(viewport) => viewport.events.try_send(event).is_ok(),
            None => false,
        }
    }
}

impl MapBackend for HeadlessMap {
    fn container_size(&mut self, container: &str) -> Option<Size> {
        let state = self.containers.get_mut(container)?;

        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Some(Size::new(0, 0));
        }

        Some(state.size)
    }

    fn attach(
        &mut self,
        container: &str,
        view: View,
        tiles: &TileLayer,
        events: Sender<SurfaceEvent>,
    ) -> Result<(), Error> {
        if self.viewports.contains_key(container) {
            return Err(surface_already_active_error());
        }

        let size = self
            .containers
            .get(container)
            .map(|c| c.size)
            .unwrap_or(Size::new(0, 0));

        self.viewports.insert(
            container.into(),
            Viewport {
                view,
                size,
                max_zoom: tiles.max_zoom,
                overlays: vec![],
                last_fit: None,
                events,
            },
        );

        Ok(())
    }

    fn detach(&mut self, container: &str) {
        self.viewports.remove(container);
    }

    fn invalidate_size(&mut self, container: &str) -> Size {
        let size = self
            .containers
            .get(container)
            .map(|c| c.size)
            .unwrap_or(Size::new(0, 0));

        if let Some(viewport) = self.viewports.get_mut(container) {
            viewport.size = size;
        }

        size
    }

    fn view(&self, container: &str) -> Option<View> {
        self.viewports.get(container).map(|v| v.view)
    }

    fn add_overlay(&mut self, container: &str, overlay: Overlay) -> OverlayHandle {
        let handle = OverlayHandle::new();

        if let Some(viewport) = self.viewports.get_mut(container) {
            viewport.overlays.push((handle, overlay));
        }

        handle
    }

    fn remove_overlay(&mut self, container: &str, handle: OverlayHandle) -> bool {
        match self.viewports.get_mut(container) {
            Some(viewport) => {
                let before = viewport.overlays.len();
                viewport.overlays.retain(|(h, _)| *h != handle);
                viewport.overlays.len() != before
            }
            None => false,
        }
    }

    fn fit_bounds(&mut self, container: &str, bounds: Rect<f64>, padding: f64) {
        let viewport = match self.viewports.get_mut(container) {
            Some(viewport) => viewport,
            None => return,
        };

        let south_west = Point {
            latitude: bounds.min().y,
            longitude: bounds.min().x,
        };
        let north_east = Point {
            latitude: bounds.max().y,
            longitude: bounds.max().x,
        };

        let (x0, y0) = project(south_west, 0.0);
        let (x1, y1) = project(north_east, 0.0);
        let dx = (x1 - x0).abs();
        let dy = (y0 - y1).abs();

        let available_w = (f64::from(viewport.size.width) - 2.0 * padding).max(1.0);
        let available_h = (f64::from(viewport.size.height) - 2.0 * padding).max(1.0);
        let max_zoom = f64::from(viewport.max_zoom);

        let scale = match (dx > 0.0, dy > 0.0) {
            (false, false) => f64::INFINITY,
            (true, false) => available_w / dx,
            (false, true) => available_h / dy,
            (true, true) => (available_w / dx).min(available_h / dy),
        };

        let zoom = match scale.is_finite() {
            true => scale.log2().floor().clamp(0.0, max_zoom),
            false => max_zoom,
        };

        viewport.view = View {
            center: unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0, 0.0),
            zoom,
        };
        viewport.last_fit = Some(bounds);
    }
}

fn project(point: Point, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let latitude = point.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    let x = (point.longitude + 180.0) / 360.0 * scale;
    let y = (1.0 - (latitude.tan() + 1.0 / latitude.cos()).ln() / PI) / 2.0 * scale;

    (x, y)
}

fn unproject(x: f64, y: f64, zoom: f64) -> Point {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let n = PI - 2.0 * PI * y / scale;

    Point {
        latitude: n.sinh().atan().to_degrees(),
        longitude: x / scale * 360.0 - 180.0,
    }
}

#[test]
fn projection_round_trip_test() {
    let point = Point::new(-6.2088, 106.8456).unwrap();
    let (x, y) = project(point, 12.0);
    let back = unproject(x, y, 12.0);

    assert!((back.latitude - point.latitude).abs() < 1e-9);
    assert!((back.longitude - point.longitude).abs() < 1e-9);
}

#[test]
fn fit_bounds_contains_points_test() {
    let (tx, _rx) = async_channel::unbounded();
    let mut map = HeadlessMap::new().with_container("map", Size::new(800, 600));
    let start = View {
        center: Point::new(0.0, 0.0).unwrap(),
        zoom: 3.0,
    };
    map.attach("map", start, &TileLayer::default(), tx).unwrap();

    let bounds = Rect::new(coord! { x: 106.8, y: -6.21 }, coord! { x: 106.85, y: -6.19 });
    map.fit_bounds("map", bounds, 50.0);

    let view = map.view("map").unwrap();
    let visible = map.visible_bounds("map").unwrap();

    assert!(view.zoom >= 1.0 && view.zoom <= 19.0);
    assert_eq!(view.zoom, view.zoom.floor());
    assert!(visible.min().x <= 106.8 && visible.max().x >= 106.85);
    assert!(visible.min().y <= -6.21 && visible.max().y >= -6.19);
    assert_eq!(map.last_fit("map"), Some(bounds));
}

#[test]
fn second_attach_on_container_fails_test() {
    let (tx, _rx) = async_channel::unbounded();
    let mut map = HeadlessMap::new().with_container("map", Size::new(800, 600));
    let view = View {
        center: Point::new(0.0, 0.0).unwrap(),
        zoom: 3.0,
    };

    map.attach("map", view, &TileLayer::default(), tx.clone()).unwrap();
    let err = map.attach("map", view, &TileLayer::default(), tx).unwrap_err();

    assert_eq!(err.code, crate::error::SURFACE_ALREADY_ACTIVE);
}
