mod headless;
mod overlay;

pub use headless::HeadlessMap;
pub use overlay::{
    LineStyle, Marker, MarkerIcon, Overlay, OverlayHandle, Polyline, Popup, PopupAction,
    SurfaceEvent, ACTIVE_COLOR, EDITING_COLOR, END_COLOR, INACTIVE_COLOR, START_COLOR,
};

use std::collections::HashSet;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use geo_types::Rect;
use serde::Serialize;

use crate::entities::Point;
use crate::error::{
    container_not_ready_error, invalid_state_error, surface_already_active_error, Error,
    CONTAINER_NOT_READY,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct View {
    pub center: Point,
    pub zoom: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "&copy; OpenStreetMap contributors".into(),
            max_zoom: 19,
        }
    }
}

pub trait MapBackend {
    /// `None` when the container does not exist.
    fn container_size(&mut self, container: &str) -> Option<Size>;

    fn attach(
        &mut self,
        container: &str,
        view: View,
        tiles: &TileLayer,
        events: Sender<SurfaceEvent>,
    ) -> Result<(), Error>;

    fn detach(&mut self, container: &str);

    fn invalidate_size(&mut self, container: &str) -> Size;

    fn view(&self, container: &str) -> Option<View>;

    fn add_overlay(&mut self, container: &str, overlay: Overlay) -> OverlayHandle;

    fn remove_overlay(&mut self, container: &str, handle: OverlayHandle) -> bool;

    fn fit_bounds(&mut self, container: &str, bounds: Rect<f64>, padding: f64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SurfaceState {
    Uninitialized,
    Ready,
    Disposed,
}

pub struct MapSurface<B: MapBackend> {
    backend: B,
    container: String,
    tiles: TileLayer,
    state: SurfaceState,
    needs_layout: bool,
    size: Size,
    owned: HashSet<OverlayHandle>,
    events: Option<(Sender<SurfaceEvent>, Receiver<SurfaceEvent>)>,
    click_handlers: Vec<Box<dyn FnMut(Point)>>,
}

impl<B: MapBackend> MapSurface<B> {
    pub fn new(backend: B, container: impl Into<String>) -> Self {
        Self {
            backend,
            container: container.into(),
            tiles: TileLayer::default(),
            state: SurfaceState::Uninitialized,
            needs_layout: true,
            size: Size::new(0, 0),
            owned: HashSet::new(),
            events: None,
            click_handlers: vec![],
        }
    }

    pub fn with_tiles(mut self, tiles: TileLayer) -> Self {
        self.tiles = tiles;
        self
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[tracing::instrument(skip(self))]
    pub fn create(&mut self, center: Point, zoom: f64) -> Result<(), Error> {
        match self.state {
            SurfaceState::Uninitialized => (),
            SurfaceState::Ready => {
                tracing::warn!("map surface created twice");
                return Err(surface_already_active_error());
            }
            SurfaceState::Disposed => return Err(invalid_state_error()),
        }

        let size = self
            .backend
            .container_size(&self.container)
            .ok_or_else(container_not_ready_error)?;

        if size.is_empty() {
            return Err(container_not_ready_error());
        }

        let (tx, rx) = async_channel::unbounded();
        let view = View { center, zoom };

        if let Err(err) = self.backend.attach(&self.container, view, &self.tiles, tx.clone()) {
            tracing::warn!("backend refused to attach: {}", err);
            return Err(err);
        }

        self.events = Some((tx, rx));
        self.size = size;
        self.needs_layout = true;
        self.state = SurfaceState::Ready;

        tracing::info!(width = size.width, height = size.height, "map surface ready");

        Ok(())
    }

    pub async fn create_when_ready(
        &mut self,
        center: Point,
        zoom: f64,
        attempts: u32,
        delay: Duration,
    ) -> Result<(), Error> {
        let mut attempt = 1;

        loop {
            match self.create(center, zoom) {
                Err(err) if err.code == CONTAINER_NOT_READY && attempt < attempts => {
                    tracing::debug!(attempt, "container not laid out, retrying");
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    pub fn invalidate_size(&mut self) -> Result<Size, Error> {
        if !self.is_ready() {
            return Err(invalid_state_error());
        }

        self.size = self.backend.invalidate_size(&self.container);
        self.needs_layout = false;

        Ok(self.size)
    }

    pub fn layout_changed(&mut self) {
        self.needs_layout = true;
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn view(&self) -> Option<View> {
        match self.is_ready() {
            true => self.backend.view(&self.container),
            false => None,
        }
    }

    pub fn on_click(&mut self, handler: impl FnMut(Point) + 'static) {
        if self.state == SurfaceState::Disposed {
            return;
        }

        self.click_handlers.push(Box::new(handler));
    }

    /// Drains pending user input. Click handlers run before the events are
    /// returned to the caller.
    pub fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        if !self.is_ready() {
            return vec![];
        }

        let mut events = vec![];

        if let Some((_, rx)) = &self.events {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }

        for event in &events {
            if let SurfaceEvent::Click(point) = event {
                for handler in self.click_handlers.iter_mut() {
                    handler(*point);
                }
            }
        }

        events
    }

    pub fn draw(&mut self, overlay: Overlay) -> Result<OverlayHandle, Error> {
        if !self.is_ready() {
            return Err(invalid_state_error());
        }

        let handle = self.backend.add_overlay(&self.container, overlay);
        self.owned.insert(handle);

        Ok(handle)
    }

    pub fn erase(&mut self, handle: OverlayHandle) -> bool {
        if !self.owned.remove(&handle) {
            return false;
        }

        self.backend.remove_overlay(&self.container, handle)
    }

    pub fn overlay_count(&self) -> usize {
        self.owned.len()
    }

    pub fn fit_bounds(&mut self, bounds: Rect<f64>, padding: f64) -> Result<(), Error> {
        if !self.is_ready() {
            return Err(invalid_state_error());
        }

        if self.needs_layout {
            self.invalidate_size()?;
        }

        self.backend.fit_bounds(&self.container, bounds, padding);

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn dispose(&mut self) {
        if self.state == SurfaceState::Disposed {
            return;
        }

        if self.state == SurfaceState::Ready {
            for handle in self.owned.drain() {
                self.backend.remove_overlay(&self.container, handle);
            }
            self.backend.detach(&self.container);

            if let Some((tx, _)) = self.events.take() {
                tx.close();
            }

            tracing::info!("map surface disposed");
        }

        self.click_handlers.clear();
        self.state = SurfaceState::Disposed;
    }
}

impl<B: MapBackend> Drop for MapSurface<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
fn ready_surface() -> MapSurface<HeadlessMap> {
    let backend = HeadlessMap::new().with_container("map", Size::new(800, 600));
    let mut surface = MapSurface::new(backend, "map");
    surface.create(Point::new(-6.2088, 106.8456).unwrap(), 10.0).unwrap();
    surface
}

#[test]
fn create_twice_fails_test() {
    let mut surface = ready_surface();

    let err = surface
        .create(Point::new(0.0, 0.0).unwrap(), 5.0)
        .unwrap_err();

    assert_eq!(err.code, crate::error::SURFACE_ALREADY_ACTIVE);
    assert!(surface.is_ready());
}

#[test]
fn zero_size_container_is_guarded_test() {
    let backend = HeadlessMap::new().with_container("map", Size::new(0, 0));
    let mut surface = MapSurface::new(backend, "map");

    let err = surface
        .create(Point::new(0.0, 0.0).unwrap(), 5.0)
        .unwrap_err();

    assert_eq!(err.code, CONTAINER_NOT_READY);
    assert_eq!(surface.state(), SurfaceState::Uninitialized);
}

#[test]
fn create_when_ready_waits_for_layout_test() {
    let backend = HeadlessMap::new().with_late_container("map", Size::new(640, 480), 3);
    let mut surface = MapSurface::new(backend, "map");

    tokio_test::block_on(surface.create_when_ready(
        Point::new(0.0, 0.0).unwrap(),
        5.0,
        10,
        Duration::from_millis(1),
    ))
    .unwrap();

    assert!(surface.is_ready());
    assert_eq!(surface.size(), Size::new(640, 480));
}

#[test]
fn create_when_ready_gives_up_test() {
    let backend = HeadlessMap::new().with_late_container("map", Size::new(640, 480), 50);
    let mut surface = MapSurface::new(backend, "map");

    let result = tokio_test::block_on(surface.create_when_ready(
        Point::new(0.0, 0.0).unwrap(),
        5.0,
        3,
        Duration::from_millis(1),
    ));

    assert_eq!(result.unwrap_err().code, CONTAINER_NOT_READY);
}

#[test]
fn dispose_removes_overlays_and_is_idempotent_test() {
    let mut surface = ready_surface();
    let marker = Overlay::Marker(Marker {
        position: Point::new(-6.2, 106.8).unwrap(),
        icon: MarkerIcon::Start,
        popup: None,
    });

    surface.draw(marker.clone()).unwrap();
    surface.draw(marker).unwrap();
    assert_eq!(surface.backend().overlay_count("map"), 2);

    surface.dispose();
    surface.dispose();

    assert_eq!(surface.state(), SurfaceState::Disposed);
    assert_eq!(surface.overlay_count(), 0);
    assert!(!surface.backend().is_attached("map"));
}

#[test]
fn disposed_surface_cannot_be_recreated_test() {
    let mut surface = ready_surface();
    surface.dispose();

    let err = surface
        .create(Point::new(0.0, 0.0).unwrap(), 5.0)
        .unwrap_err();

    assert_eq!(err.code, 100);
}

#[test]
fn click_handlers_receive_points_test() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut surface = ready_surface();
    let seen = Rc::new(RefCell::new(vec![]));
    let sink = seen.clone();

    surface.on_click(move |point| sink.borrow_mut().push(point));

    let point = Point::new(-6.2, 106.8).unwrap();
    surface.backend_mut().click("map", point);

    let events = surface.poll_events();

    assert_eq!(events, vec![SurfaceEvent::Click(point)]);
    assert_eq!(*seen.borrow(), vec![point]);

    surface.dispose();
    surface.on_click(|_| panic!("handler registered after dispose"));
    surface.backend_mut().click("map", point);
    assert!(surface.poll_events().is_empty());
}

#[test]
fn layout_change_reruns_invalidate_before_fit_test() {
    use geo_types::coord;

    let mut surface = ready_surface();
    let bounds = Rect::new(coord! { x: 106.8, y: -6.21 }, coord! { x: 106.85, y: -6.19 });

    surface.fit_bounds(bounds, 50.0).unwrap();
    assert_eq!(surface.size(), Size::new(800, 600));

    surface.backend_mut().resize_container("map", Size::new(400, 300));
    surface.fit_bounds(bounds, 50.0).unwrap();
    assert_eq!(surface.size(), Size::new(800, 600));

    surface.layout_changed();
    surface.fit_bounds(bounds, 50.0).unwrap();
    assert_eq!(surface.size(), Size::new(400, 300));
    assert_eq!(surface.backend().snapshot("map").unwrap().size, Size::new(400, 300));
}
