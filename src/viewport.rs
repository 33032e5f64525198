use geo_types::{Coord, Rect};

use crate::entities::Point;
use crate::error::Error;
use crate::surface::{MapBackend, MapSurface};

pub const DEFAULT_PADDING: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub bounds: Rect<f64>,
    pub padding: f64,
}

impl Frame {
    pub fn contains(&self, point: &Point) -> bool {
        point.within(&self.bounds)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportFitter {
    pub padding: f64,
}

impl Default for ViewportFitter {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

impl ViewportFitter {
    pub fn new(padding: f64) -> Self {
        Self { padding }
    }

    pub fn fit<B: MapBackend>(
        &self,
        surface: &mut MapSurface<B>,
        points: &[Point],
    ) -> Result<Option<Frame>, Error> {
        let frame = match bounding_frame(points, self.padding) {
            Some(frame) => frame,
            None => return Ok(None),
        };

        surface.fit_bounds(frame.bounds, frame.padding)?;

        tracing::debug!(points = points.len(), "viewport fitted");

        Ok(Some(frame))
    }
}

/// The minimal box around `points`, or `None` for fewer than two points.
/// Negative or non-finite padding is treated as zero.
pub fn bounding_frame(points: &[Point], padding: f64) -> Option<Frame> {
    if points.len() < 2 {
        return None;
    }

    let first: Coord<f64> = points[0].into();

    let (min, max) = points.iter().skip(1).fold((first, first), |(min, max), p| {
        let c: Coord<f64> = (*p).into();
        (
            Coord {
                x: min.x.min(c.x),
                y: min.y.min(c.y),
            },
            Coord {
                x: max.x.max(c.x),
                y: max.y.max(c.y),
            },
        )
    });

    let padding = match padding.is_finite() {
        true => padding.max(0.0),
        false => 0.0,
    };

    Some(Frame {
        bounds: Rect::new(min, max),
        padding,
    })
}

#[cfg(test)]
fn points(raw: &[(f64, f64)]) -> Vec<Point> {
    raw.iter()
        .map(|(lat, lng)| Point::new(*lat, *lng).unwrap())
        .collect()
}

#[test]
fn frame_contains_every_point_test() {
    let input = points(&[(-6.2, 106.8), (-6.21, 106.82), (-6.19, 106.85)]);
    let frame = bounding_frame(&input, 50.0).unwrap();

    assert!(input.iter().all(|p| frame.contains(p)));
    assert_eq!(frame.bounds.min().x, 106.8);
    assert_eq!(frame.bounds.max().x, 106.85);
    assert_eq!(frame.bounds.min().y, -6.21);
    assert_eq!(frame.bounds.max().y, -6.19);
    assert_eq!(frame.padding, 50.0);
}

#[test]
fn frame_needs_two_points_test() {
    assert!(bounding_frame(&[], 50.0).is_none());
    assert!(bounding_frame(&points(&[(1.0, 1.0)]), 50.0).is_none());
}

#[test]
fn frame_padding_is_non_negative_test() {
    let input = points(&[(1.0, 1.0), (2.0, 2.0)]);

    assert_eq!(bounding_frame(&input, -10.0).unwrap().padding, 0.0);
    assert_eq!(bounding_frame(&input, f64::NAN).unwrap().padding, 0.0);
}

#[test]
fn fit_leaves_view_for_single_point_test() {
    use crate::surface::{HeadlessMap, Size};

    let backend = HeadlessMap::new().with_container("map", Size::new(800, 600));
    let mut surface = MapSurface::new(backend, "map");
    surface.create(Point::new(-6.2088, 106.8456).unwrap(), 10.0).unwrap();
    let before = surface.view();

    let fitter = ViewportFitter::default();

    assert_eq!(fitter.fit(&mut surface, &[]).unwrap(), None);
    assert_eq!(fitter.fit(&mut surface, &points(&[(1.0, 1.0)])).unwrap(), None);
    assert_eq!(surface.view(), before);
}

#[test]
fn fit_is_deterministic_test() {
    use crate::surface::{HeadlessMap, Size};

    let input = points(&[(-6.3, 106.9), (-6.1, 106.7), (-6.2, 106.8)]);
    let mut views = vec![];

    for _ in 0..2 {
        let backend = HeadlessMap::new().with_container("map", Size::new(800, 600));
        let mut surface = MapSurface::new(backend, "map");
        surface.create(Point::new(0.0, 0.0).unwrap(), 3.0).unwrap();
        ViewportFitter::default().fit(&mut surface, &input).unwrap();
        views.push(surface.view());
    }

    assert_eq!(views[0], views[1]);
}
