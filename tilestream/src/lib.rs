//! TileStream - viewport-driven map tile streaming.
//!
//! A [`TileSource`](source::TileSource) watches the visible bounds of a map
//! view, works out which tiles of a layer cover them, and loads those tiles
//! through a pluggable [`TileLoader`](loader::TileLoader) with bounded
//! concurrency, distance-based priorities, retry backoff and cancellation of
//! tiles that scroll out of view.
//!
//! # Modules
//!
//! - [`scheduler`]: task execution (`TokioScheduler`, deterministic `ManualScheduler`)
//! - [`actor`]: mailbox-serialized actors on top of a scheduler
//! - [`tile`]: coordinates, zoom tables and grid computation
//! - [`layer`]: layer configurations and coordinate conversion
//! - [`loader`]: the loader collaborator and load outcomes
//! - [`source`]: loading state machine and the tile source itself
//! - [`config`]: tunables and INI loading
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tilestream::layer::WebMercatorLayerConfig;
//! use tilestream::loader::TileLoadResult;
//! use tilestream::scheduler::ManualScheduler;
//! use tilestream::source::TileSourceBuilder;
//! use tilestream::tile::TileCoordinate;
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let layer = WebMercatorLayerConfig::new("osm", "https://tile.example/{z}/{x}/{y}.png").unwrap();
//! let loader = |_tile: TileCoordinate, key: String| async move { TileLoadResult::Loaded(key) };
//!
//! let source = TileSourceBuilder::<String>::new(Arc::new(layer), Arc::new(loader), scheduler.clone())
//!     .build()
//!     .unwrap();
//!
//! source.on_visible_bounds_changed(WebMercatorLayerConfig::world_bounds(), 300_000_000.0);
//! scheduler.drain();
//! assert_eq!(source.current_tiles().len(), 4);
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod layer;
pub mod loader;
pub mod scheduler;
pub mod source;
pub mod tile;
