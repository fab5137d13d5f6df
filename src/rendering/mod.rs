//! Software content model
//!
//! Stands in for the host's rendered DOM: `layout` turns card HTML into
//! stacked blocks, `measure` reports their geometry to the planner, `paint`
//! builds a display list with decorations and `raster` encodes any vertical
//! window of that display list.

pub mod layout;
pub mod measure;
pub mod paint;
pub mod raster;

pub use layout::{layout_document, split_cards, ElementType, Layout, LayoutNode};
pub use measure::GeometryProvider;
pub use paint::{build_display_list, Decorations, DisplayList, PaintCommand};
pub use raster::render_window;

/// Encoded capture of one window of content
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
