//! Pluggable edge routing strategies.
//!
//! A router turns two terminal anchor points and optional waypoints into
//! the ordered point list an edge is drawn with. Routers are selected per
//! edge by the `edgeStyle` style key; edges without one route directly.

use kurbo::Point;
use std::collections::HashMap;
use std::fmt;

/// Style value selecting [`OrthogonalRouter`].
pub const ORTHOGONAL: &str = "orthogonal";

/// Computes the drawn point list for an edge.
pub trait EdgeRouter {
    /// `source` and `target` are resolved anchor points; `waypoints` are
    /// the edge's explicit intermediate points, already in scene
    /// coordinates. The result includes both endpoints.
    fn route(&self, source: Point, target: Point, waypoints: &[Point]) -> Vec<Point>;
}

/// Straight polyline through the waypoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRouter;

impl EdgeRouter for DirectRouter {
    fn route(&self, source: Point, target: Point, waypoints: &[Point]) -> Vec<Point> {
        let mut points = Vec::with_capacity(waypoints.len() + 2);
        points.push(source);
        points.extend_from_slice(waypoints);
        points.push(target);
        points
    }
}

/// Axis-aligned routing: every segment runs horizontal or vertical, with
/// a horizontal-first corner inserted wherever two consecutive points
/// differ in both coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthogonalRouter;

impl EdgeRouter for OrthogonalRouter {
    fn route(&self, source: Point, target: Point, waypoints: &[Point]) -> Vec<Point> {
        let through = DirectRouter.route(source, target, waypoints);
        let mut points = Vec::with_capacity(through.len() * 2);
        for pair in through.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            points.push(a);
            if a.x != b.x && a.y != b.y {
                points.push(Point::new(b.x, a.y));
            }
        }
        if let Some(&last) = through.last() {
            points.push(last);
        }
        points
    }
}

/// Routers keyed by `edgeStyle` name. Unregistered names (and edges
/// without an `edgeStyle`) fall back to direct routing.
pub struct RouterRegistry {
    routers: HashMap<String, Box<dyn EdgeRouter>>,
    fallback: DirectRouter,
}

impl Default for RouterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterRegistry {
    /// Create a registry with the built-in orthogonal router.
    pub fn new() -> Self {
        let mut registry = Self {
            routers: HashMap::new(),
            fallback: DirectRouter,
        };
        registry.register(ORTHOGONAL, OrthogonalRouter);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, router: impl EdgeRouter + 'static) {
        self.routers.insert(name.into(), Box::new(router));
    }

    pub fn get(&self, name: &str) -> Option<&dyn EdgeRouter> {
        self.routers.get(name).map(|r| r.as_ref())
    }

    /// Route with the named router, falling back to direct.
    pub fn route(
        &self,
        name: Option<&str>,
        source: Point,
        target: Point,
        waypoints: &[Point],
    ) -> Vec<Point> {
        match name.and_then(|n| self.get(n)) {
            Some(router) => router.route(source, target, waypoints),
            None => self.fallback.route(source, target, waypoints),
        }
    }
}

impl fmt::Debug for RouterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterRegistry")
            .field("routers", &self.routers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_route_includes_waypoints() {
        let points = DirectRouter.route(
            Point::new(0.0, 0.0),
            Point::new(100.0, 100.0),
            &[Point::new(50.0, 20.0)],
        );
        assert_eq!(
            points,
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 20.0),
                Point::new(100.0, 100.0)
            ]
        );
    }

    #[test]
    fn test_orthogonal_inserts_corners() {
        let points =
            OrthogonalRouter.route(Point::new(0.0, 0.0), Point::new(100.0, 50.0), &[]);
        assert_eq!(
            points,
            vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 50.0)
            ]
        );
    }

    #[test]
    fn test_orthogonal_keeps_aligned_segments() {
        let points =
            OrthogonalRouter.route(Point::new(0.0, 0.0), Point::new(100.0, 0.0), &[]);
        assert_eq!(points, vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
    }

    #[test]
    fn test_registry_fallback_is_direct() {
        let registry = RouterRegistry::new();
        let points = registry.route(
            Some("unknown"),
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            &[],
        );
        assert_eq!(points.len(), 2);

        let routed = registry.route(
            Some(ORTHOGONAL),
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            &[],
        );
        assert_eq!(routed.len(), 3);
    }
}
