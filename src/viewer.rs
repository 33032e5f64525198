use futures::future::join_all;

use crate::api::RouteAPI;
use crate::config::MapConfig;
use crate::entities::Route;
use crate::error::Error;
use crate::renderer::{RenderSummary, RouteRenderer};
use crate::surface::{MapBackend, MapSurface, SurfaceEvent};
use crate::viewport::ViewportFitter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailFallback {
    Exclude,
    UseSummary,
}

impl Default for DetailFallback {
    fn default() -> Self {
        DetailFallback::Exclude
    }
}

#[tracing::instrument(skip(api))]
pub async fn load_dashboard_routes<A>(
    api: &A,
    page_size: u32,
    fallback: DetailFallback,
) -> Result<Vec<Route>, Error>
where
    A: RouteAPI + ?Sized,
{
    let page = api.fetch_route_list(1, page_size).await?;

    let active: Vec<_> = page.items.into_iter().filter(|s| s.active).collect();
    let details = join_all(active.iter().map(|s| api.fetch_route_detail(s.id))).await;

    let mut routes = Vec::with_capacity(active.len());

    for (summary, detail) in active.into_iter().zip(details) {
        match (detail, fallback) {
            (Ok(route), _) => routes.push(route),
            (Err(err), DetailFallback::Exclude) => {
                tracing::warn!(route_id = summary.id, "dropping route, detail failed: {}", err);
            }
            (Err(err), DetailFallback::UseSummary) => {
                tracing::warn!(route_id = summary.id, "using summary, detail failed: {}", err);
                routes.push(Route::from(summary));
            }
        }
    }

    tracing::info!(routes = routes.len(), total = page.total, "dashboard routes loaded");

    Ok(routes)
}

pub struct RouteViewer<B: MapBackend> {
    surface: MapSurface<B>,
    renderer: RouteRenderer,
    listeners: Vec<Box<dyn FnMut(&Route)>>,
}

impl<B: MapBackend> RouteViewer<B> {
    pub fn open(mut surface: MapSurface<B>, config: &MapConfig) -> Result<Self, Error> {
        if !surface.is_ready() {
            surface.create(config.center, config.zoom)?;
        }
        surface.invalidate_size()?;

        Ok(Self {
            surface,
            renderer: RouteRenderer::new(ViewportFitter::new(config.fit_padding)),
            listeners: vec![],
        })
    }

    pub fn surface(&self) -> &MapSurface<B> {
        &self.surface
    }

    pub fn renderer(&self) -> &RouteRenderer {
        &self.renderer
    }

    pub fn render_routes(&mut self, routes: Vec<Route>) -> Result<RenderSummary, Error> {
        self.renderer.render(&mut self.surface, routes)
    }

    pub fn on_route_selected(&mut self, listener: impl FnMut(&Route) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn process_events(&mut self) -> usize {
        let mut selected = 0;

        for event in self.surface.poll_events() {
            let handle = match event {
                SurfaceEvent::OverlayClick(handle) => handle,
                _ => continue,
            };

            let route = match self.renderer.route_for(handle) {
                Some(route) => route,
                None => continue,
            };

            tracing::debug!(route_id = route.id, "route selected");

            for listener in self.listeners.iter_mut() {
                listener(route);
            }
            selected += 1;
        }

        selected
    }

    pub fn close(mut self) -> MapSurface<B> {
        self.renderer.clear(&mut self.surface);
        self.surface.dispose();
        self.surface
    }
}

#[cfg(test)]
fn surface() -> MapSurface<crate::surface::HeadlessMap> {
    use crate::surface::{HeadlessMap, Size};

    let backend = HeadlessMap::new().with_container("dashboard", Size::new(1024, 768));
    MapSurface::new(backend, "dashboard")
}

#[test]
fn dashboard_loads_active_routes_only_test() {
    use crate::api::fake::MemoryAPI;
    use crate::renderer::sample_route;

    let api = MemoryAPI::with_routes(vec![
        sample_route(1, true, &["-6.1,106.7", "-6.2,106.8"]),
        sample_route(2, false, &["-6.3,106.9", "-6.4,107.0"]),
        sample_route(3, true, &["-7.0,110.0", "-7.1,110.1"]),
    ]);

    let routes =
        tokio_test::block_on(load_dashboard_routes(&api, 100, DetailFallback::Exclude)).unwrap();

    let ids: Vec<i64> = routes.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(routes.iter().all(|r| r.coordinates.len() == 2));
}

#[test]
fn failed_detail_follows_fallback_test() {
    use crate::api::fake::MemoryAPI;
    use crate::renderer::sample_route;

    let mut api = MemoryAPI::with_routes(vec![
        sample_route(1, true, &["-6.1,106.7", "-6.2,106.8"]),
        sample_route(2, true, &["-6.3,106.9", "-6.4,107.0"]),
    ]);
    api.broken_details = vec![2];

    let excluded =
        tokio_test::block_on(load_dashboard_routes(&api, 100, DetailFallback::Exclude)).unwrap();
    assert_eq!(excluded.len(), 1);

    let kept =
        tokio_test::block_on(load_dashboard_routes(&api, 100, DetailFallback::UseSummary)).unwrap();
    assert_eq!(kept.len(), 2);
    assert!(kept[1].coordinates.is_empty());

    let mut viewer = RouteViewer::open(surface(), &MapConfig::default()).unwrap();
    let summary = viewer.render_routes(kept).unwrap();
    assert_eq!(summary.routes, 1);
}

#[test]
fn clicking_polyline_selects_route_test() {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::renderer::sample_route;

    let mut viewer = RouteViewer::open(surface(), &MapConfig::default()).unwrap();
    viewer
        .render_routes(vec![
            sample_route(1, true, &["-6.1,106.7", "-6.2,106.8"]),
            sample_route(2, false, &["-6.3,106.9", "-6.4,107.0"]),
        ])
        .unwrap();

    let selected = Rc::new(RefCell::new(vec![]));
    let sink = selected.clone();
    viewer.on_route_selected(move |route| sink.borrow_mut().push(route.id));

    let overlays = viewer.renderer().overlays_for(2).unwrap();
    let backend = viewer.surface().backend();
    assert!(backend.click_overlay("dashboard", overlays.polyline));
    assert!(!backend.click_overlay("dashboard", overlays.start));

    assert_eq!(viewer.process_events(), 1);
    assert_eq!(*selected.borrow(), vec![2]);
}

#[test]
fn close_removes_all_overlays_test() {
    use crate::renderer::sample_route;
    use crate::surface::SurfaceState;

    let mut viewer = RouteViewer::open(surface(), &MapConfig::default()).unwrap();
    viewer
        .render_routes(vec![sample_route(1, true, &["-6.1,106.7", "-6.2,106.8"])])
        .unwrap();
    assert_eq!(viewer.surface().backend().overlay_count("dashboard"), 3);

    let surface = viewer.close();

    assert_eq!(surface.state(), SurfaceState::Disposed);
    assert!(!surface.backend().is_attached("dashboard"));
}
