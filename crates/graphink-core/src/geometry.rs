//! Geometry value type for cells.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Policy for geometry with negative width or height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryPolicy {
    /// Clamp negative extents to zero.
    #[default]
    Clamp,
    /// Reject the mutation.
    Reject,
}

/// Position and size information owned by a cell.
///
/// For vertices the rectangle is the cell's bounds, in the coordinate
/// system of its parent (or, when `relative` is set, as fractions of the
/// parent's size plus `offset`). For edges the rectangle is unused and the
/// point fields describe the route: `points` are explicit waypoints, and
/// `source_point`/`target_point` fix an endpoint when the corresponding
/// terminal reference is dangling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Bounds relative to the parent coordinate system.
    pub rect: Rect,
    /// Interpret `rect.origin()` as fractions of the parent size.
    #[serde(default)]
    pub relative: bool,
    /// Absolute offset applied after relative positioning.
    #[serde(default)]
    pub offset: Option<Vec2>,
    /// Explicit edge waypoints, in absolute (unscaled) coordinates.
    #[serde(default)]
    pub points: Vec<Point>,
    /// Fixed source endpoint for a dangling edge.
    #[serde(default)]
    pub source_point: Option<Point>,
    /// Fixed target endpoint for a dangling edge.
    #[serde(default)]
    pub target_point: Option<Point>,
}

impl Geometry {
    /// Create a vertex geometry from position and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            rect: Rect::new(x, y, x + width, y + height),
            relative: false,
            offset: None,
            points: Vec::new(),
            source_point: None,
            target_point: None,
        }
    }

    /// Create an empty edge geometry (route derived from terminals).
    pub fn for_edge() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Mark this geometry as parent-relative.
    pub fn as_relative(mut self) -> Self {
        self.relative = true;
        self
    }

    /// Set explicit waypoints.
    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    /// Fix the endpoint used when the given end is dangling.
    pub fn with_terminal_point(mut self, point: Point, source: bool) -> Self {
        if source {
            self.source_point = Some(point);
        } else {
            self.target_point = Some(point);
        }
        self
    }

    pub fn x(&self) -> f64 {
        self.rect.x0
    }

    pub fn y(&self) -> f64 {
        self.rect.y0
    }

    pub fn width(&self) -> f64 {
        self.rect.x1 - self.rect.x0
    }

    pub fn height(&self) -> f64 {
        self.rect.y1 - self.rect.y0
    }

    /// The fixed endpoint for one edge end, if any.
    pub fn terminal_point(&self, source: bool) -> Option<Point> {
        if source { self.source_point } else { self.target_point }
    }

    /// True if width or height is negative.
    pub fn has_negative_extent(&self) -> bool {
        self.width() < 0.0 || self.height() < 0.0
    }

    /// Copy with negative extents clamped to zero.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        out.rect = Rect::new(
            self.rect.x0,
            self.rect.y0,
            self.rect.x1.max(self.rect.x0),
            self.rect.y1.max(self.rect.y0),
        );
        out
    }

    /// Copy translated by a delta. Waypoints and fixed terminal points
    /// move with the geometry.
    pub fn translated(&self, delta: Vec2) -> Self {
        let mut out = self.clone();
        out.rect = self.rect + delta;
        out.points = self.points.iter().map(|p| *p + delta).collect();
        out.source_point = self.source_point.map(|p| p + delta);
        out.target_point = self.target_point.map(|p| p + delta);
        out
    }

    /// Copy with new bounds, keeping route data.
    pub fn with_rect(&self, rect: Rect) -> Self {
        let mut out = self.clone();
        out.rect = rect;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_geometry() {
        let geo = Geometry::new(10.0, 20.0, 80.0, 30.0);
        assert_eq!(geo.x(), 10.0);
        assert_eq!(geo.y(), 20.0);
        assert_eq!(geo.width(), 80.0);
        assert_eq!(geo.height(), 30.0);
        assert!(!geo.has_negative_extent());
    }

    #[test]
    fn test_negative_extent_clamp() {
        let geo = Geometry::new(10.0, 10.0, -5.0, 30.0);
        assert!(geo.has_negative_extent());
        let clamped = geo.clamped();
        assert_eq!(clamped.width(), 0.0);
        assert_eq!(clamped.height(), 30.0);
        assert_eq!(clamped.x(), 10.0);
    }

    #[test]
    fn test_translated_moves_route_data() {
        let geo = Geometry::new(0.0, 0.0, 10.0, 10.0)
            .with_points(vec![Point::new(5.0, 5.0)])
            .with_terminal_point(Point::new(1.0, 1.0), true);
        let moved = geo.translated(Vec2::new(3.0, 4.0));
        assert_eq!(moved.x(), 3.0);
        assert_eq!(moved.points[0], Point::new(8.0, 9.0));
        assert_eq!(moved.source_point, Some(Point::new(4.0, 5.0)));
    }
}
