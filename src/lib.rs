//! Cardshot
//!
//! Export rendered Markdown note cards as images, slicing tall cards into
//! several images and bundling them into a zip archive when needed.
//!
//! # Features
//!
//! - **Segment planner**: pure, deterministic slicing by fixed height, at
//!   horizontal rules, or between paragraphs ([`planner`])
//! - **Slice export**: clip, capture and package every slice, all-or-nothing
//!   ([`export`])
//! - **Swappable backends**: a software renderer ([`software`], default) and a
//!   headless Chrome backend (`cdp` feature)
//!
//! # Example
//!
//! ```no_run
//! use cardshot::software::{SoftwareRasterizer, SoftwareTarget};
//! use cardshot::{ExportConfig, Exporter};
//!
//! # async fn run() -> cardshot::Result<()> {
//! let config = ExportConfig::default();
//! let exporter = Exporter::new(config)?;
//!
//! let html = "<h2>Card</h2><p>Hello</p><hr><p>World</p>";
//! let mut target = SoftwareTarget::from_html(html, exporter.config())?;
//! let artifact = exporter.export(&mut target, &SoftwareRasterizer, "note-card-1").await?;
//! artifact.write_to("exports")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod planner;
pub use planner::{ContentGeometry, SplitMode, SplitPolicy, SplitPosition};

// Software content model: layout, geometry, paint and raster
pub mod rendering;

pub mod export;
pub use export::{ExportArtifact, ExportSlice, Exporter};

pub mod software;

// Headless Chrome backend
#[cfg(feature = "cdp")]
pub mod cdp;

/// Encoded output format of each slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Svg,
}

impl ExportFormat {
    /// File extension used for slice names
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::Svg => "svg",
        };
        f.write_str(s)
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            "svg" => Ok(ExportFormat::Svg),
            other => Err(Error::ConfigError(format!("unknown export format '{}'", other))),
        }
    }
}

/// Splitting settings as the user configures them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    pub mode: SplitMode,
    /// Target slice height in pixels
    pub height: f64,
    /// Overlap between fixed-mode slices in pixels
    pub overlap: f64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            mode: SplitMode::Fixed,
            height: 1200.0,
            overlap: 50.0,
        }
    }
}

/// Corner a watermark is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    #[serde(default)]
    pub position: WatermarkPosition,
    /// Defaults to `#888888`
    #[serde(default)]
    pub color: Option<String>,
}

/// Author shown in the card footer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

/// Configuration for one export
///
/// The defaults match what a user gets without touching any setting: PNG at
/// 2x, fixed 1200px slices with 50px overlap, on a white, rounded card.
///
/// # Examples
///
/// ```
/// let cfg = cardshot::ExportConfig::default();
/// assert_eq!(cfg.split.height, 1200.0);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// Pixel density multiplier (>= 1)
    pub scale: f64,
    pub split: SplitSettings,
    pub background_color: String,
    pub border_radius: u32,
    pub border: bool,
    pub border_color: String,
    /// Card width in CSS pixels
    pub width: u32,
    pub watermark: Option<Watermark>,
    pub author: Option<Author>,
    pub theme_name: Option<String>,
    /// Wait before each capture so layout and paint settle
    pub settle_delay_ms: u64,
    /// Per-slice capture timeout in milliseconds (0 => disabled)
    pub slice_timeout_ms: u64,
    /// JPEG quality, 1..=100
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            scale: 2.0,
            split: SplitSettings::default(),
            background_color: "#ffffff".to_string(),
            border_radius: 12,
            border: false,
            border_color: "#e0e0e0".to_string(),
            width: 800,
            watermark: None,
            author: None,
            theme_name: None,
            settle_delay_ms: 20,
            slice_timeout_ms: 0,
            jpeg_quality: 92,
        }
    }
}

impl ExportConfig {
    /// Parse a JSON settings document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(format!("invalid settings JSON: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Reject settings no export could honour.
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale < 1.0 {
            return Err(Error::ConfigError(format!("scale must be >= 1, got {}", self.scale)));
        }
        if !self.split.height.is_finite() || self.split.height <= 0.0 {
            return Err(Error::ConfigError(format!(
                "split height must be positive, got {}",
                self.split.height
            )));
        }
        if !self.split.overlap.is_finite() || self.split.overlap < 0.0 {
            return Err(Error::ConfigError(format!(
                "split overlap must be zero or positive, got {}",
                self.split.overlap
            )));
        }
        if self.width == 0 {
            return Err(Error::ConfigError("width must be positive".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::ConfigError(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        rendering::paint::parse_color(&self.background_color)?;
        rendering::paint::parse_color(&self.border_color)?;
        if let Some(color) = self.watermark.as_ref().and_then(|w| w.color.as_deref()) {
            rendering::paint::parse_color(color)?;
        }
        Ok(())
    }

    /// Planner inputs for content of `total_height` pixels
    pub fn split_policy(&self, total_height: f64) -> SplitPolicy {
        SplitPolicy {
            mode: self.split.mode,
            target_height: self.split.height,
            overlap: self.split.overlap,
            total_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.format, ExportFormat::Png);
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.split.mode, SplitMode::Fixed);
        assert_eq!(config.split.overlap, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_partial_json_keeps_defaults() {
        let cfg = ExportConfig::from_json(
            r#"{ "format": "jpg", "split": { "mode": "hr" }, "watermark": { "text": "me" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.format, ExportFormat::Jpeg);
        assert_eq!(cfg.split.mode, SplitMode::HorizontalRule);
        assert_eq!(cfg.split.height, 1200.0);
        assert_eq!(cfg.width, 800);
        let wm = cfg.watermark.unwrap();
        assert_eq!(wm.position, WatermarkPosition::BottomRight);
    }

    #[test]
    fn config_rejects_bad_values() {
        let cfg = ExportConfig { scale: 0.5, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));

        let cfg = ExportConfig { background_color: "not-a-colour".into(), ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = ExportConfig { jpeg_quality: 0, ..Default::default() };
        assert!(cfg.validate().is_err());

        assert!(ExportConfig::from_json("{ nope").is_err());
    }

    #[test]
    fn format_extensions() {
        assert_eq!(ExportFormat::Jpeg.extension(), "jpg");
        assert_eq!("JPG".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
