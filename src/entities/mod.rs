mod coordinate;
mod point;
mod route;
mod unit;

pub use coordinate::{Coordinate, CoordinatePayload};
pub use point::Point;
pub use route::{Route, RouteDraft, RouteForm, RoutePage, RouteSummary};
pub use unit::Unit;

#[cfg(test)]
pub(crate) use route::sample_form;
