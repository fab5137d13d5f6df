//! Geometry reported to the segment planner

use crate::planner::{ContentGeometry, SplitMode};
use crate::rendering::layout::{ElementType, Layout, LayoutNode};

/// Anything that can report its content height and the boundary elements a
/// split mode cares about.
pub trait GeometryProvider {
    /// Full scrollable height of the content
    fn total_height(&self) -> f64;

    /// Candidate boundaries for `mode`, ordered by `top`. Empty for
    /// [`SplitMode::Fixed`].
    fn measures(&self, mode: SplitMode) -> Vec<ContentGeometry>;
}

impl GeometryProvider for Layout {
    fn total_height(&self) -> f64 {
        self.height as f64
    }

    fn measures(&self, mode: SplitMode) -> Vec<ContentGeometry> {
        match mode {
            SplitMode::Fixed => Vec::new(),
            SplitMode::HorizontalRule => rule_measures(&self.nodes),
            SplitMode::Auto => block_measures(&self.nodes),
        }
    }
}

/// Every horizontal rule with its own extent.
pub fn rule_measures(nodes: &[LayoutNode]) -> Vec<ContentGeometry> {
    nodes
        .iter()
        .filter(|n| n.elem_type == ElementType::Rule)
        .map(|n| ContentGeometry::new(n.lb.rect.y as f64, n.lb.rect.height as f64))
        .collect()
}

/// Every splittable block. A block's height runs to the top of the next
/// block, so the margin between them belongs to the first; the last block
/// keeps its own height.
pub fn block_measures(nodes: &[LayoutNode]) -> Vec<ContentGeometry> {
    let tops: Vec<(f64, f64)> = nodes
        .iter()
        .filter(|n| n.elem_type.is_split_candidate())
        .map(|n| (n.lb.rect.y as f64, n.lb.rect.height as f64))
        .collect();

    tops.iter()
        .enumerate()
        .map(|(i, &(top, height))| match tops.get(i + 1) {
            Some(&(next_top, _)) => ContentGeometry::new(top, next_top - top),
            None => ContentGeometry::new(top, height),
        })
        .collect()
}
