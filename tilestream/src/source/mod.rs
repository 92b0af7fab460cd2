//! Tile source: loading state, retry backoff and viewport orchestration.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      TileSource<P>                        │
//! │   (public handle: messages and conversations only)        │
//! └─────────────────────────────┬─────────────────────────────┘
//!                               │ Actor / Mailbox
//!                               ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                      SourceCore<P>                        │
//! │                                                           │
//! │  LayerConfig ─► compute_visible_tiles ─► LoadingState     │
//! │                                            │   ▲          │
//! │                          next_dispatch ────┘   │ complete │
//! │                                ▼               │          │
//! │                           TileLoader ──────────┘          │
//! │                                                           │
//! │  BackoffPolicy (retry delays)   TileSourceListener        │
//! └───────────────────────────────────────────────────────────┘
//! ```

mod backoff;
mod builder;
mod listener;
mod state;
mod tile_source;

pub use backoff::{BackoffPolicy, ErrorRecord};
pub use builder::TileSourceBuilder;
pub use listener::TileSourceListener;
pub use state::{Completion, LoadingState, ResidentTile, StateSnapshot, VisibleUpdate};
pub use tile_source::TileSource;
