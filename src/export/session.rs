use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use crate::export::{export_card, ClipTarget, ExportArtifact, Rasterizer};
use crate::rendering::measure::GeometryProvider;
use crate::{ExportConfig, Result};

/// A shareable export handle.
///
/// Every clone shares one in-flight slot, so exports started from different
/// tasks run one at a time instead of interleaving clip changes on a shared
/// surface. A second export waits for the first to finish.
#[derive(Clone)]
pub struct Exporter {
    config: Arc<ExportConfig>,
    in_flight: Arc<Mutex<()>>,
}

impl Exporter {
    /// Create an exporter after validating `config`.
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            in_flight: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// True while an export holds the in-flight slot.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Measure, plan, capture and package `target`.
    pub async fn export<T, R>(&self, target: &mut T, rasterizer: &R, base_name: &str) -> Result<ExportArtifact>
    where
        T: ClipTarget + GeometryProvider + ?Sized,
        R: Rasterizer<T> + ?Sized,
    {
        if self.is_busy() {
            debug!("export '{}' waiting for the previous export", base_name);
        }
        let _slot = self.in_flight.lock().await;
        export_card(target, rasterizer, &self.config, base_name).await
    }
}
