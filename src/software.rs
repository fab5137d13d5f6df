//! Software backend: lays out card HTML in-process and rasterizes windows of
//! it without a browser.

use futures::future::BoxFuture;
use log::debug;
use scraper::Html;

use crate::export::{ClipTarget, RasterRequest, Rasterizer};
use crate::planner::{ContentGeometry, SplitMode, SplitPosition};
use crate::rendering::measure::GeometryProvider;
use crate::rendering::paint::{build_display_list, Decorations, DisplayList};
use crate::rendering::{layout_document, render_window, Layout};
use crate::{Error, ExportConfig, Result};

/// A laid-out card with an optional clip window
pub struct SoftwareTarget {
    layout: Layout,
    display: DisplayList,
    clip: Option<SplitPosition>,
}

impl SoftwareTarget {
    /// Lay out `html` at the configured width and paint it with the
    /// configured decorations.
    pub fn from_html(html: &str, config: &ExportConfig) -> Result<Self> {
        if config.width == 0 {
            return Err(Error::LayoutError("card width must be positive".into()));
        }
        let document = Html::parse_document(html);
        let mut layout = layout_document(&document, config.width);
        if let Some(author) = config.author.as_ref().filter(|a| !a.name.trim().is_empty()) {
            layout.append_footer(&author.name);
        }
        let deco = Decorations::from_config(config)?;
        let display = build_display_list(&layout, &deco);
        debug!(
            "laid out {} block(s), {}x{}px",
            layout.nodes.len(),
            layout.width,
            layout.height
        );
        Ok(Self {
            layout,
            display,
            clip: None,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.display
    }

    /// Current clip window, `None` when unclipped
    pub fn clip(&self) -> Option<SplitPosition> {
        self.clip
    }
}

impl ClipTarget for SoftwareTarget {
    fn content_width(&self) -> f64 {
        self.layout.width as f64
    }

    fn set_clip(&mut self, window: SplitPosition) -> Result<()> {
        let total = self.layout.height as f64;
        if window.start_y < 0.0 || window.height <= 0.0 || window.end() > total + 0.5 {
            return Err(Error::RenderError(format!(
                "window [{}, {}) is outside the content (0..{})",
                window.start_y,
                window.end(),
                total
            )));
        }
        self.clip = Some(window);
        Ok(())
    }

    fn reset_clip(&mut self) {
        self.clip = None;
    }
}

impl GeometryProvider for SoftwareTarget {
    fn total_height(&self) -> f64 {
        self.layout.total_height()
    }

    fn measures(&self, mode: SplitMode) -> Vec<ContentGeometry> {
        self.layout.measures(mode)
    }
}

/// Rasterizes the clipped window of a [`SoftwareTarget`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareRasterizer;

impl Rasterizer<SoftwareTarget> for SoftwareRasterizer {
    fn rasterize<'a>(
        &'a self,
        target: &'a SoftwareTarget,
        request: &'a RasterRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let window = target
                .clip
                .ok_or_else(|| Error::RenderError("target is not clipped".into()))?;
            let shot = render_window(
                &target.display,
                window,
                request.scale,
                request.format,
                request.jpeg_quality,
            )?;
            Ok(shot.data)
        })
    }
}
