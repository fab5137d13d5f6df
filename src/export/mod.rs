//! Slice export
//!
//! Runs a plan against a clip-able content target: for every slice the
//! content is clipped to the slice window, given a moment to settle, captured
//! by a [`Rasterizer`] and restored. Slices are captured strictly one after
//! another because they all mutate the same clip state.
//!
//! The result is all-or-nothing. The first failing slice aborts the export
//! with [`Error::RasterizationFailure`] and nothing is packaged.

use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info};

use crate::planner::{plan_checked, validate_plan, SplitPosition};
use crate::rendering::measure::GeometryProvider;
use crate::{Error, ExportConfig, ExportFormat, Result};

pub mod package;
mod session;

pub use package::{package, ExportArtifact, ExportSlice};
pub use session::Exporter;

/// Content whose visible window can be narrowed to one vertical band.
pub trait ClipTarget {
    /// Width of the content in CSS pixels
    fn content_width(&self) -> f64;

    /// Expose exactly `window` at the top-left of the capture viewport.
    fn set_clip(&mut self, window: SplitPosition) -> Result<()>;

    /// Return to the unclipped state. Must be safe to call at any time.
    fn reset_clip(&mut self);
}

/// Holds a target clipped to one window; the clip is released on drop,
/// whether or not the capture succeeded.
pub struct ClipGuard<'a, T: ClipTarget + ?Sized> {
    target: &'a mut T,
}

impl<'a, T: ClipTarget + ?Sized> ClipGuard<'a, T> {
    pub fn acquire(target: &'a mut T, window: SplitPosition) -> Result<Self> {
        if let Err(e) = target.set_clip(window) {
            target.reset_clip();
            return Err(e);
        }
        Ok(Self { target })
    }

    pub fn target(&self) -> &T {
        &*self.target
    }
}

impl<T: ClipTarget + ?Sized> Drop for ClipGuard<'_, T> {
    fn drop(&mut self) {
        self.target.reset_clip();
    }
}

/// Pixel box and encoding for one capture
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRequest {
    /// Viewport width in CSS pixels
    pub width: f64,
    /// Viewport height in CSS pixels (the slice height)
    pub height: f64,
    pub scale: f64,
    pub format: ExportFormat,
    pub jpeg_quality: u8,
}

/// Turns the currently exposed window of a target into encoded image bytes.
pub trait Rasterizer<T: ?Sized> {
    fn rasterize<'a>(&'a self, target: &'a T, request: &'a RasterRequest) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// `{base}.{ext}` for a single slice, `{base}_{n}.{ext}` (1-based) otherwise.
pub fn slice_filename(base: &str, index: usize, count: usize, format: ExportFormat) -> String {
    if count == 1 {
        format!("{}.{}", base, format.extension())
    } else {
        format!("{}_{}.{}", base, index + 1, format.extension())
    }
}

/// File stem for card `index` (0-based) of the note `stem`.
pub fn card_basename(stem: &str, index: usize) -> String {
    format!("{}-card-{}", stem, index + 1)
}

/// Capture every window in `positions` and package the slices.
pub async fn export_slices<T, R>(
    content: &mut T,
    positions: &[SplitPosition],
    rasterizer: &R,
    config: &ExportConfig,
    base_name: &str,
) -> Result<ExportArtifact>
where
    T: ClipTarget + ?Sized,
    R: Rasterizer<T> + ?Sized,
{
    validate_plan(positions)?;
    let count = positions.len();
    let mut slices = Vec::with_capacity(count);

    for (index, window) in positions.iter().enumerate() {
        let data = capture_slice(content, *window, rasterizer, config)
            .await
            .map_err(|e| Error::RasterizationFailure {
                index,
                reason: e.to_string(),
            })?;
        debug!(
            "captured slice {}/{} [{}, {}) ({} bytes)",
            index + 1,
            count,
            window.start_y,
            window.end(),
            data.len()
        );
        slices.push(ExportSlice {
            filename: slice_filename(base_name, index, count, config.format),
            data,
        });
    }

    package(slices, base_name)
}

async fn capture_slice<T, R>(
    content: &mut T,
    window: SplitPosition,
    rasterizer: &R,
    config: &ExportConfig,
) -> Result<Vec<u8>>
where
    T: ClipTarget + ?Sized,
    R: Rasterizer<T> + ?Sized,
{
    let guard = ClipGuard::acquire(content, window)?;

    if config.settle_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.settle_delay_ms)).await;
    }

    let request = RasterRequest {
        width: guard.target().content_width(),
        height: window.height,
        scale: config.scale,
        format: config.format,
        jpeg_quality: config.jpeg_quality,
    };

    let capture = rasterizer.rasterize(guard.target(), &request);
    let data = if config.slice_timeout_ms > 0 {
        tokio::time::timeout(Duration::from_millis(config.slice_timeout_ms), capture)
            .await
            .map_err(|_| Error::RenderError(format!("capture timed out after {}ms", config.slice_timeout_ms)))??
    } else {
        capture.await?
    };

    if data.is_empty() {
        return Err(Error::RenderError("rasterizer returned an empty image".into()));
    }
    Ok(data)
}

/// Measure `target` and plan its slices with `config`'s split settings.
pub fn plan_card<T>(target: &T, config: &ExportConfig) -> Result<Vec<SplitPosition>>
where
    T: GeometryProvider + ?Sized,
{
    let policy = config.split_policy(target.total_height());
    let geometry = target.measures(policy.mode);
    plan_checked(&policy, &geometry)
}

/// Measure, plan and export one card.
pub async fn export_card<T, R>(
    target: &mut T,
    rasterizer: &R,
    config: &ExportConfig,
    base_name: &str,
) -> Result<ExportArtifact>
where
    T: ClipTarget + GeometryProvider + ?Sized,
    R: Rasterizer<T> + ?Sized,
{
    config.validate()?;
    let positions = plan_card(&*target, config)?;
    info!(
        "exporting '{}': {} slice(s), mode {}, {}px tall",
        base_name,
        positions.len(),
        config.split.mode,
        target.total_height()
    );
    let artifact = export_slices(target, &positions, rasterizer, config, base_name).await?;
    info!("exported '{}' ({} bytes)", artifact.filename(), artifact.data().len());
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        clipped: Option<SplitPosition>,
        resets: usize,
        fail_set: bool,
    }

    impl ClipTarget for Counter {
        fn content_width(&self) -> f64 {
            100.0
        }

        fn set_clip(&mut self, window: SplitPosition) -> Result<()> {
            self.clipped = Some(window);
            if self.fail_set {
                return Err(Error::RenderError("cannot clip".into()));
            }
            Ok(())
        }

        fn reset_clip(&mut self) {
            self.clipped = None;
            self.resets += 1;
        }
    }

    #[test]
    fn slice_filenames() {
        assert_eq!(slice_filename("note-card-1", 0, 1, ExportFormat::Png), "note-card-1.png");
        assert_eq!(slice_filename("note-card-1", 2, 3, ExportFormat::Png), "note-card-1_3.png");
        assert_eq!(slice_filename("n", 0, 2, ExportFormat::Jpeg), "n_1.jpg");
        assert_eq!(card_basename("note", 0), "note-card-1");
    }

    #[test]
    fn clip_guard_releases_on_drop() {
        let mut t = Counter { clipped: None, resets: 0, fail_set: false };
        {
            let guard = ClipGuard::acquire(&mut t, SplitPosition::new(5.0, 10.0)).unwrap();
            assert_eq!(guard.target().clipped, Some(SplitPosition::new(5.0, 10.0)));
        }
        assert_eq!(t.clipped, None);
        assert_eq!(t.resets, 1);
    }

    struct Recorder(std::sync::Mutex<Vec<RasterRequest>>);

    impl Rasterizer<Counter> for Recorder {
        fn rasterize<'a>(&'a self, target: &'a Counter, request: &'a RasterRequest) -> BoxFuture<'a, Result<Vec<u8>>> {
            assert!(target.clipped.is_some());
            self.0.lock().unwrap().push(request.clone());
            Box::pin(async { Ok(vec![1]) })
        }
    }

    #[tokio::test]
    async fn request_carries_window_and_encoding() {
        let mut t = Counter { clipped: None, resets: 0, fail_set: false };
        let config = ExportConfig {
            scale: 2.0,
            format: ExportFormat::Jpeg,
            jpeg_quality: 80,
            settle_delay_ms: 0,
            ..Default::default()
        };
        let recorder = Recorder(std::sync::Mutex::new(Vec::new()));
        capture_slice(&mut t, SplitPosition::new(40.0, 25.0), &recorder, &config)
            .await
            .unwrap();

        let requests = recorder.0.into_inner().unwrap();
        assert_eq!(
            requests,
            vec![RasterRequest {
                width: 100.0,
                height: 25.0,
                scale: 2.0,
                format: ExportFormat::Jpeg,
                jpeg_quality: 80,
            }]
        );
        assert_eq!(t.clipped, None);
    }

    #[test]
    fn failed_clip_is_reset_immediately() {
        let mut t = Counter { clipped: None, resets: 0, fail_set: true };
        assert!(ClipGuard::acquire(&mut t, SplitPosition::new(0.0, 10.0)).is_err());
        assert_eq!(t.clipped, None);
        assert_eq!(t.resets, 1);
    }
}
