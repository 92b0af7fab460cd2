//! Tile source construction.

use std::sync::Arc;

use tracing::info;

use super::listener::TileSourceListener;
use super::state::LoadingState;
use super::tile_source::{SourceCore, TileSource};
use crate::config::SourceConfig;
use crate::error::ConfigError;
use crate::layer::{CoordinateConverter, DefaultCoordinateConverter, LayerConfig};
use crate::loader::TileLoader;
use crate::scheduler::Scheduler;
use crate::tile::sort_zoom_levels;

/// Builder for [`TileSource`].
///
/// ```text
/// TileSourceBuilder::new(layer, loader, scheduler)
///     .with_config(config)        // defaults: SourceConfig::default()
///     .with_listener(listener)    // default: none
///     .with_converter(converter)  // default: DefaultCoordinateConverter
///     .build()?
/// ```
pub struct TileSourceBuilder<P> {
    layer: Arc<dyn LayerConfig>,
    loader: Arc<dyn TileLoader<P>>,
    scheduler: Arc<dyn Scheduler>,
    converter: Arc<dyn CoordinateConverter>,
    listener: Option<Arc<dyn TileSourceListener>>,
    config: SourceConfig,
}

impl<P: Send + Sync + 'static> TileSourceBuilder<P> {
    /// Starts a builder from the three required collaborators.
    ///
    /// # Arguments
    ///
    /// * `layer` - Zoom table and tile key formatting
    /// * `loader` - Performs the actual tile loads
    /// * `scheduler` - Runs the mailbox, loader futures and retry timers
    pub fn new(
        layer: Arc<dyn LayerConfig>,
        loader: Arc<dyn TileLoader<P>>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            layer,
            loader,
            scheduler,
            converter: Arc::new(DefaultCoordinateConverter),
            listener: None,
            config: SourceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers the observer notified when the resident set changes.
    pub fn with_listener(mut self, listener: impl TileSourceListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn CoordinateConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Validates the configuration and creates the source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the configuration fails
    /// [`SourceConfig::validate`].
    pub fn build(self) -> Result<TileSource<P>, ConfigError> {
        self.config.validate()?;

        let mut levels = self.layer.zoom_levels();
        sort_zoom_levels(&mut levels);

        info!(
            layer = %self.layer.layer_name(),
            levels = levels.len(),
            max_concurrent_loads = self.config.max_concurrent_loads,
            min_backoff_ms = self.config.min_backoff.as_millis() as u64,
            max_backoff_ms = self.config.max_backoff.as_millis() as u64,
            "Tile source created"
        );

        let core = SourceCore::new(
            self.layer,
            self.loader,
            self.converter,
            self.listener,
            self.scheduler,
            levels,
            self.config.priority_buckets,
            LoadingState::from_config(&self.config),
        );
        Ok(TileSource::from_core(core))
    }
}
