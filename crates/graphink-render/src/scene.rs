//! Scene snapshots handed from the view to renderers.

use graphink_core::style::keys;
use graphink_core::{CellId, CellKind, Graph, RedrawBatch, RgbaColor};
use kurbo::{Point, Rect};

/// Drawable snapshot of one cell: resolved bounds, route, and the style
/// properties renderers need, detached from the live view cache.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCell {
    pub id: CellId,
    pub kind: CellKind,
    pub bounds: Rect,
    /// Routed points; empty for vertices and groups.
    pub points: Vec<Point>,
    pub fill: Option<RgbaColor>,
    pub stroke: Option<RgbaColor>,
    pub stroke_width: f64,
    pub dashed: bool,
    pub rounded: bool,
    pub opacity: f64,
    /// Label text extracted from the cell value, if any.
    pub label: Option<String>,
    pub label_bounds: Option<Rect>,
}

/// One batched update: everything that changed since the last one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneUpdate {
    pub updated: Vec<SceneCell>,
    pub removed: Vec<CellId>,
}

impl SceneUpdate {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    /// Snapshot the states a redraw batch refers to.
    pub fn from_batch(graph: &Graph, batch: &RedrawBatch) -> Self {
        let updated = batch
            .updated
            .iter()
            .filter_map(|&id| {
                let state = graph.view().state(id)?;
                let label = graph
                    .model()
                    .cell(id)
                    .and_then(|c| c.value())
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    });
                Some(SceneCell {
                    id,
                    kind: state.kind,
                    bounds: state.bounds,
                    points: state.absolute_points.clone(),
                    fill: state.style.color(keys::FILL_COLOR),
                    stroke: state.style.color(keys::STROKE_COLOR),
                    stroke_width: state.style.number(keys::STROKE_WIDTH).unwrap_or(1.0),
                    dashed: state.style.flag(keys::DASHED, false),
                    rounded: state.style.flag(keys::ROUNDED, false),
                    opacity: state.style.number(keys::OPACITY).unwrap_or(1.0),
                    label,
                    label_bounds: state.label_bounds,
                })
            })
            .collect();
        Self {
            updated,
            removed: batch.removed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphink_core::Geometry;

    #[test]
    fn test_snapshot_carries_resolved_style() {
        let mut graph = Graph::new();
        let a = graph
            .insert_vertex(
                None,
                Geometry::new(0.0, 0.0, 80.0, 30.0),
                Some("fillColor=#ff0000;strokeWidth=2"),
                Some(serde_json::json!("Start")),
            )
            .unwrap();

        let batch = graph.take_redraw();
        let update = SceneUpdate::from_batch(&graph, &batch);
        let cell = update.updated.iter().find(|c| c.id == a).unwrap();
        assert_eq!(cell.fill, Some(RgbaColor::new(255, 0, 0, 255)));
        assert_eq!(cell.stroke_width, 2.0);
        assert_eq!(cell.label.as_deref(), Some("Start"));
        assert_eq!(cell.bounds, Rect::new(0.0, 0.0, 80.0, 30.0));
    }

    #[test]
    fn test_removed_cells_pass_through() {
        let mut graph = Graph::new();
        let a = graph
            .insert_vertex(None, Geometry::new(0.0, 0.0, 80.0, 30.0), None, None)
            .unwrap();
        graph.take_redraw();

        graph.remove_cells(&[a]).unwrap();
        let batch = graph.take_redraw();
        let update = SceneUpdate::from_batch(&graph, &batch);
        assert!(update.removed.contains(&a));
        assert!(update.updated.is_empty());
    }
}
