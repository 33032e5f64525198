use crate::api::RouteAPI;
use crate::codec;
use crate::config::MapConfig;
use crate::entities::{Coordinate, Point, Route, RouteDraft, RouteForm};
use crate::error::{invalid_state_error, Error};
use crate::store::GeometryStore;
use crate::surface::{LineStyle, MapBackend, MapSurface, SurfaceEvent};
use crate::sync::OverlaySynchronizer;
use crate::viewport::ViewportFitter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    Create,
    Edit { active: bool },
    View { active: bool },
}

impl SessionMode {
    pub fn accepts_input(&self) -> bool {
        !matches!(self, SessionMode::View { .. })
    }

    pub fn line_style(&self) -> LineStyle {
        match self {
            SessionMode::Create => LineStyle::editing(),
            SessionMode::Edit { active } | SessionMode::View { active } => {
                LineStyle::for_status(*active)
            }
        }
    }
}

pub struct RouteEditor<B: MapBackend> {
    surface: MapSurface<B>,
    store: GeometryStore,
    sync: OverlaySynchronizer,
    mode: SessionMode,
    route_id: Option<i64>,
    listeners: Vec<Box<dyn FnMut(&[Coordinate])>>,
}

impl<B: MapBackend> RouteEditor<B> {
    #[tracing::instrument(skip_all, fields(mode = ?mode))]
    pub fn open(
        mut surface: MapSurface<B>,
        mode: SessionMode,
        route: Option<&Route>,
        config: &MapConfig,
    ) -> Result<Self, Error> {
        if !surface.is_ready() {
            surface.create(config.center, config.zoom)?;
        }
        surface.invalidate_size()?;

        let sync = OverlaySynchronizer::new(
            mode.line_style(),
            mode.accepts_input(),
            ViewportFitter::new(config.fit_padding),
        );

        let store = match route {
            Some(route) => GeometryStore::hydrated(route.coordinates.clone()),
            None => GeometryStore::new(),
        };

        let mut editor = Self {
            surface,
            store,
            sync,
            mode,
            route_id: route.map(|r| r.id),
            listeners: vec![],
        };
        editor.refresh()?;

        tracing::info!(points = editor.store.len(), "editor session opened");

        Ok(editor)
    }

    pub fn create(surface: MapSurface<B>, config: &MapConfig) -> Result<Self, Error> {
        Self::open(surface, SessionMode::Create, None, config)
    }

    pub fn edit(surface: MapSurface<B>, route: &Route, config: &MapConfig) -> Result<Self, Error> {
        let mode = SessionMode::Edit {
            active: route.active,
        };
        Self::open(surface, mode, Some(route), config)
    }

    pub fn view(surface: MapSurface<B>, route: &Route, config: &MapConfig) -> Result<Self, Error> {
        let mode = SessionMode::View {
            active: route.active,
        };
        Self::open(surface, mode, Some(route), config)
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn route_id(&self) -> Option<i64> {
        self.route_id
    }

    pub fn surface(&self) -> &MapSurface<B> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut MapSurface<B> {
        &mut self.surface
    }

    pub fn synchronizer(&self) -> &OverlaySynchronizer {
        &self.sync
    }

    pub fn get_current_geometry(&self) -> Vec<Coordinate> {
        self.store.snapshot()
    }

    pub fn on_geometry_changed(&mut self, listener: impl FnMut(&[Coordinate]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn reset_geometry(&mut self, initial: Option<Vec<Coordinate>>) -> Result<(), Error> {
        match initial {
            Some(coordinates) => self.store.hydrate(coordinates),
            None => self.store.clear(),
        }
        self.refresh()
    }

    pub fn add_point(&mut self, point: Point) -> Result<Coordinate, Error> {
        let coordinate = self.store.append(point);
        self.refresh()?;
        Ok(coordinate)
    }

    /// Blank input is ignored. A malformed entry leaves the geometry untouched.
    pub fn add_coordinate_text(&mut self, text: &str) -> Result<Option<Coordinate>, Error> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let point = codec::parse(text)?;
        self.add_point(point).map(Some)
    }

    pub fn remove_point(&mut self, index: usize) -> Result<Option<Coordinate>, Error> {
        match self.store.remove_at(index) {
            Some(removed) => {
                self.refresh()?;
                Ok(Some(removed))
            }
            None => Ok(None),
        }
    }

    pub fn clear_points(&mut self) -> Result<(), Error> {
        self.store.clear();
        self.refresh()
    }

    pub fn process_events(&mut self) -> Result<usize, Error> {
        let mut changes = 0;

        for event in self.surface.poll_events() {
            match event {
                SurfaceEvent::Click(point) if self.mode.accepts_input() => {
                    self.add_point(point)?;
                    changes += 1;
                }
                SurfaceEvent::PopupAction { handle, action } => {
                    let index = match self.sync.resolve(handle, action) {
                        Some(index) => index,
                        None => {
                            tracing::debug!("dropping action from a stale marker");
                            continue;
                        }
                    };

                    if self.remove_point(index)?.is_some() {
                        changes += 1;
                    }
                }
                _ => (),
            }
        }

        Ok(changes)
    }

    pub fn draft(&self, form: RouteForm) -> Result<RouteDraft, Error> {
        RouteDraft::new(form, &self.store.snapshot())
    }

    /// Creates or updates the route. Geometry is left untouched on failure
    /// so the operator can retry.
    #[tracing::instrument(skip_all, fields(route_id = ?self.route_id))]
    pub async fn save<A>(&mut self, api: &A, form: RouteForm) -> Result<Route, Error>
    where
        A: RouteAPI + ?Sized,
    {
        if !self.mode.accepts_input() {
            return Err(invalid_state_error());
        }

        let draft = self.draft(form)?;

        let saved = match self.route_id {
            Some(id) => api.update_route(id, draft).await,
            None => api.create_route(draft).await,
        };

        let route = match saved {
            Ok(route) => route,
            Err(err) => {
                tracing::warn!("saving route failed: {}", err);
                return Err(err);
            }
        };

        self.route_id = Some(route.id);
        self.mode = SessionMode::Edit {
            active: route.active,
        };
        self.sync.set_line_style(self.mode.line_style());
        self.refresh()?;

        tracing::info!(route_id = route.id, "route saved");

        Ok(route)
    }

    pub fn close(mut self) -> MapSurface<B> {
        self.sync.clear(&mut self.surface);
        self.surface.dispose();
        self.surface
    }

    fn refresh(&mut self) -> Result<(), Error> {
        let snapshot = self.store.snapshot();
        self.sync.reconcile(&mut self.surface, &snapshot)?;

        for listener in self.listeners.iter_mut() {
            listener(&snapshot);
        }

        Ok(())
    }
}

#[cfg(test)]
fn surface() -> MapSurface<crate::surface::HeadlessMap> {
    use crate::surface::{HeadlessMap, Size};

    let backend = HeadlessMap::new().with_container("editor", Size::new(800, 600));
    MapSurface::new(backend, "editor")
}

#[cfg(test)]
fn point(lat: f64, lng: f64) -> Point {
    Point::new(lat, lng).unwrap()
}

#[test]
fn clicks_build_numbered_route_test() {
    use crate::surface::{MarkerIcon, EDITING_COLOR};

    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();

    let backend = editor.surface().backend();
    backend.click("editor", point(-6.2, 106.8));
    backend.click("editor", point(-6.21, 106.82));
    backend.click("editor", point(-6.19, 106.85));

    assert_eq!(editor.process_events().unwrap(), 3);

    let backend = editor.surface().backend();
    let icons: Vec<MarkerIcon> = backend.markers("editor").iter().map(|(_, m)| m.icon).collect();
    assert_eq!(
        icons,
        vec![
            MarkerIcon::Numbered { label: 1 },
            MarkerIcon::Numbered { label: 2 },
            MarkerIcon::Numbered { label: 3 },
        ]
    );

    let polylines = backend.polylines("editor");
    assert_eq!(polylines.len(), 1);
    assert_eq!(polylines[0].1.style.color, EDITING_COLOR);
    assert_eq!(
        polylines[0].1.points(),
        vec![point(-6.2, 106.8), point(-6.21, 106.82), point(-6.19, 106.85)]
    );

    let visible = backend.visible_bounds("editor").unwrap();
    assert!(editor
        .get_current_geometry()
        .iter()
        .all(|c| c.point().unwrap().within(&visible)));
}

#[test]
fn double_remove_removes_one_point_test() {
    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();
    editor.add_point(point(1.0, 1.0)).unwrap();
    editor.add_point(point(2.0, 2.0)).unwrap();
    editor.add_point(point(3.0, 3.0)).unwrap();

    let backend = editor.surface().backend();
    let (handle, _) = backend.markers("editor")[1];
    assert!(backend.press_popup_action("editor", handle));
    assert!(backend.press_popup_action("editor", handle));

    assert_eq!(editor.process_events().unwrap(), 1);

    let texts: Vec<String> = editor
        .get_current_geometry()
        .into_iter()
        .map(|c| c.coordinates)
        .collect();
    assert_eq!(texts, vec!["1.000000,1.000000", "3.000000,3.000000"]);
    assert_eq!(editor.surface().backend().markers("editor").len(), 2);
}

#[test]
fn manual_entry_rejects_malformed_text_test() {
    use crate::error::MALFORMED_COORDINATE;

    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();

    let err = editor.add_coordinate_text("6.2088").unwrap_err();
    assert_eq!(err.code, MALFORMED_COORDINATE);
    assert!(err.is_user_facing());
    assert!(editor.get_current_geometry().is_empty());

    assert_eq!(editor.add_coordinate_text("   ").unwrap(), None);
    assert!(editor.get_current_geometry().is_empty());

    editor.add_coordinate_text(" -6.2088 , 106.8456 ").unwrap();
    assert_eq!(editor.get_current_geometry()[0].coordinates, "-6.208800,106.845600");
}

#[test]
fn listeners_see_every_change_test() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let seen = Rc::new(RefCell::new(vec![]));
    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();

    let sink = seen.clone();
    editor.on_geometry_changed(move |snapshot| sink.borrow_mut().push(snapshot.len()));

    editor.add_point(point(1.0, 1.0)).unwrap();
    editor.add_point(point(2.0, 2.0)).unwrap();
    editor.remove_point(7).unwrap();
    editor.remove_point(0).unwrap();
    editor.reset_geometry(None).unwrap();

    assert_eq!(*seen.borrow(), vec![1, 2, 1, 0]);
}

#[test]
fn view_mode_ignores_clicks_test() {
    use crate::renderer::sample_route;
    use crate::surface::INACTIVE_COLOR;

    let route = sample_route(4, false, &["-6.1,106.7", "-6.2,106.8"]);
    let mut editor = RouteEditor::view(surface(), &route, &MapConfig::default()).unwrap();

    editor.surface().backend().click("editor", point(0.0, 0.0));
    assert_eq!(editor.process_events().unwrap(), 0);
    assert_eq!(editor.get_current_geometry().len(), 2);

    let backend = editor.surface().backend();
    assert_eq!(backend.polylines("editor")[0].1.style.color, INACTIVE_COLOR);
    let (handle, _) = backend.markers("editor")[0];
    assert!(!backend.press_popup_action("editor", handle));
}

#[test]
fn save_single_point_makes_no_call_test() {
    use crate::api::fake::MemoryAPI;
    use crate::entities::sample_form;
    use crate::error::INSUFFICIENT_GEOMETRY;

    let api = MemoryAPI::default();
    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();
    editor.add_point(point(-6.2, 106.8)).unwrap();

    let err = tokio_test::block_on(editor.save(&api, sample_form())).unwrap_err();

    assert_eq!(err.code, INSUFFICIENT_GEOMETRY);
    assert!(api.calls().is_empty());
}

#[test]
fn save_creates_then_updates_test() {
    use crate::api::fake::MemoryAPI;
    use crate::entities::sample_form;

    let api = MemoryAPI::default();
    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();
    editor.add_point(point(-6.2, 106.8)).unwrap();
    editor.add_point(point(-6.21, 106.82)).unwrap();

    let created = tokio_test::block_on(editor.save(&api, sample_form())).unwrap();
    assert_eq!(created.coordinates.len(), 2);
    assert_eq!(editor.route_id(), Some(created.id));
    assert_eq!(editor.mode(), SessionMode::Edit { active: true });

    editor.add_point(point(-6.19, 106.85)).unwrap();
    let updated = tokio_test::block_on(editor.save(&api, sample_form())).unwrap();

    assert_eq!(updated.coordinates.len(), 3);
    assert_eq!(api.calls(), vec!["create".to_string(), format!("update {}", created.id)]);
}

#[test]
fn failed_save_keeps_geometry_test() {
    use crate::api::fake::MemoryAPI;

    let api = MemoryAPI::failing();
    let route = crate::renderer::sample_route(9, true, &["-6.1,106.7", "-6.2,106.8"]);
    let mut editor = RouteEditor::edit(surface(), &route, &MapConfig::default()).unwrap();
    editor.add_point(point(-6.3, 106.9)).unwrap();
    let before = editor.get_current_geometry();

    let err = tokio_test::block_on(editor.save(&api, route.form())).unwrap_err();

    assert_eq!(err.code, 4);
    assert_eq!(editor.get_current_geometry(), before);
    assert_eq!(editor.route_id(), Some(9));
    assert_eq!(api.calls(), vec!["update 9".to_string()]);
}

#[test]
fn close_disposes_surface_test() {
    use crate::surface::SurfaceState;

    let mut editor = RouteEditor::create(surface(), &MapConfig::default()).unwrap();
    editor.add_point(point(1.0, 1.0)).unwrap();
    editor.add_point(point(2.0, 2.0)).unwrap();
    assert_eq!(editor.surface().backend().overlay_count("editor"), 3);

    let surface = editor.close();

    assert_eq!(surface.state(), SurfaceState::Disposed);
    assert_eq!(surface.overlay_count(), 0);
    assert!(!surface.backend().is_attached("editor"));
}
