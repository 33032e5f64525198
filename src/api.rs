use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::{Route, RouteDraft, RoutePage, Unit};
use crate::error::Error;

#[async_trait]
pub trait RouteAPI {
    async fn fetch_route_list(&self, page: u32, page_size: u32) -> Result<RoutePage, Error>;
    async fn fetch_route_detail(&self, id: i64) -> Result<Route, Error>;
    async fn create_route(&self, draft: RouteDraft) -> Result<Route, Error>;
    async fn update_route(&self, id: i64, draft: RouteDraft) -> Result<Route, Error>;
    async fn delete_route(&self, id: i64) -> Result<(), Error>;
}

#[async_trait]
pub trait UnitAPI {
    async fn fetch_units(&self) -> Result<Vec<Unit>, Error>;
}

pub trait API: RouteAPI + UnitAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{RouteAPI, UnitAPI, API};
    use crate::entities::{Coordinate, Route, RouteDraft, RoutePage, Unit};
    use crate::error::{not_found_error, upstream_error, Error};

    #[derive(Default)]
    pub struct MemoryAPI {
        pub routes: Mutex<Vec<Route>>,
        pub calls: Mutex<Vec<String>>,
        pub failing: bool,
        pub broken_details: Vec<i64>,
    }

    impl MemoryAPI {
        pub fn with_routes(routes: Vec<Route>) -> Self {
            Self {
                routes: Mutex::new(routes),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn store(&self, id: i64, draft: RouteDraft) -> Route {
            let route = Route {
                id,
                name: draft.name,
                unit_id: draft.unit_id,
                unit: None,
                length_km: draft.length_km,
                start_marker: draft.start_marker,
                end_marker: draft.end_marker,
                active: draft.active,
                coordinates: draft
                    .coordinates
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| Coordinate::persisted(i as i64 + 1, c.ordering, c.coordinates))
                    .collect(),
                created_at: None,
                updated_at: None,
            };

            let mut routes = self.routes.lock().unwrap();
            routes.retain(|r| r.id != id);
            routes.push(route.clone());
            route
        }
    }

    #[async_trait]
    impl RouteAPI for MemoryAPI {
        async fn fetch_route_list(&self, _: u32, _: u32) -> Result<RoutePage, Error> {
            let items: Vec<_> = self.routes.lock().unwrap().iter().map(|r| r.summary()).collect();
            Ok(RoutePage {
                total: items.len() as u64,
                total_pages: 1,
                items,
            })
        }

        async fn fetch_route_detail(&self, id: i64) -> Result<Route, Error> {
            if self.broken_details.contains(&id) {
                return Err(upstream_error());
            }

            self.routes
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(not_found_error)
        }

        async fn create_route(&self, draft: RouteDraft) -> Result<Route, Error> {
            self.calls.lock().unwrap().push("create".into());
            if self.failing {
                return Err(upstream_error());
            }
            let id = self.routes.lock().unwrap().len() as i64 + 1;
            Ok(self.store(id, draft))
        }

        async fn update_route(&self, id: i64, draft: RouteDraft) -> Result<Route, Error> {
            self.calls.lock().unwrap().push(format!("update {}", id));
            if self.failing {
                return Err(upstream_error());
            }
            Ok(self.store(id, draft))
        }

        async fn delete_route(&self, id: i64) -> Result<(), Error> {
            self.calls.lock().unwrap().push(format!("delete {}", id));
            self.routes.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }
    }

    #[async_trait]
    impl UnitAPI for MemoryAPI {
        async fn fetch_units(&self) -> Result<Vec<Unit>, Error> {
            Ok(vec![Unit {
                id: 1,
                name: "Jasamarga Metropolitan".into(),
                active: true,
            }])
        }
    }

    impl API for MemoryAPI {}
}
