//! Error types for card export

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning, rasterizing or packaging an export
#[derive(Error, Debug)]
pub enum Error {
    /// The planner was handed a plan it cannot honour (non-positive height, etc.)
    #[error("Invalid split plan: {0}")]
    PlanningPrecondition(String),

    /// A slice could not be captured. `index` is 0-based.
    #[error("Rasterization failed on slice {}: {reason}", .index + 1)]
    RasterizationFailure { index: usize, reason: String },

    /// Building the output archive failed
    #[error("Packaging failed: {0}")]
    PackagingFailure(String),

    /// A backend failed to capture or encode a region
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The content could not be laid out
    #[error("Layout failed: {0}")]
    LayoutError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error while writing artifacts or reading input
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::PackagingFailure(err.to_string())
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
