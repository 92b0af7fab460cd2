//! Loader collaborator.
//!
//! A loader turns a tile and its key (usually a URL from the layer config)
//! into a [`TileLoadResult`]. Transport, decoding and timeouts are entirely
//! the loader's business; the tile source only sees the outcome value.
//!
//! Any `Fn(TileCoordinate, String) -> impl Future<Output = TileLoadResult<P>>`
//! closure is a loader:
//!
//! ```
//! use tilestream::loader::{TileLoadResult, TileLoader};
//! use tilestream::tile::TileCoordinate;
//!
//! fn assert_loader<L: TileLoader<Vec<u8>>>(_: &L) {}
//!
//! let loader = |_tile: TileCoordinate, key: String| async move {
//!     TileLoadResult::Loaded(key.into_bytes())
//! };
//! assert_loader(&loader);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::tile::TileCoordinate;

/// Boxed future returned by [`TileLoader::load`].
pub type LoadFuture<P> = Pin<Box<dyn Future<Output = TileLoadResult<P>> + Send + 'static>>;

/// Transient load failures. All of them are retried with backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileLoadError {
    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status other than 400/404.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Anything else, e.g. a decoding failure.
    #[error("Load failed: {0}")]
    Other(String),
}

/// Outcome of one tile load.
pub enum TileLoadResult<P> {
    /// The tile was loaded; the payload is opaque to the tile source.
    Loaded(P),
    /// The source definitively has no data for this tile. Never retried.
    NotFound,
    /// A transient failure. Retried after backoff.
    Failed(TileLoadError),
}

impl<P> TileLoadResult<P> {
    /// Classifies an HTTP response.
    ///
    /// 2xx yields [`Loaded`](Self::Loaded) with the payload produced by
    /// `payload`, 400 and 404 yield [`NotFound`](Self::NotFound), every other
    /// status is a transient [`TileLoadError::Status`].
    pub fn from_http_status(status: u16, payload: impl FnOnce() -> P) -> Self {
        match status {
            200..=299 => Self::Loaded(payload()),
            400 | 404 => Self::NotFound,
            other => Self::Failed(TileLoadError::Status(other)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Maps the payload, keeping the outcome.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> TileLoadResult<Q> {
        match self {
            Self::Loaded(payload) => TileLoadResult::Loaded(f(payload)),
            Self::NotFound => TileLoadResult::NotFound,
            Self::Failed(error) => TileLoadResult::Failed(error),
        }
    }
}

impl<P> From<TileLoadError> for TileLoadResult<P> {
    fn from(error: TileLoadError) -> Self {
        Self::Failed(error)
    }
}

impl<P> fmt::Debug for TileLoadResult<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(_) => f.write_str("Loaded(..)"),
            Self::NotFound => f.write_str("NotFound"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// Asynchronous tile loader.
pub trait TileLoader<P>: Send + Sync + 'static {
    /// Starts loading `tile`. `key` is the layer's key for the tile.
    fn load(&self, tile: TileCoordinate, key: String) -> LoadFuture<P>;

    /// Hint that a load started earlier is no longer wanted.
    ///
    /// The result of the load is discarded on arrival regardless, so the
    /// default does nothing.
    fn cancel(&self, _tile: &TileCoordinate, _key: &str) {}
}

impl<P, F, Fut> TileLoader<P> for F
where
    F: Fn(TileCoordinate, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TileLoadResult<P>> + Send + 'static,
{
    fn load(&self, tile: TileCoordinate, key: String) -> LoadFuture<P> {
        Box::pin(self(tile, key))
    }
}
