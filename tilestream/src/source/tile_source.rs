//! Viewport-driven tile source.
//!
//! # Message flow
//!
//! ```text
//!  render thread                 mailbox (serialized)              scheduler
//!  ─────────────                 ────────────────────              ─────────
//!  on_visible_bounds_changed ──► update_tileset
//!                                  convert bounds
//!                                  compute_visible_tiles
//!                                  LoadingState::update_visible
//!                                  dispatch ───────────────────────► loader future
//!                                                                        │
//!                                on_tile_loaded ◄──── WeakActor::message ┘
//!                                  LoadingState::complete
//!                                  publish snapshot
//!                                  dispatch / schedule retry ──────► delayed retry_failed
//!                                flush_notification
//!                                  listener.on_tiles_updated()
//!  current_tiles() ◄─── published snapshot (RwLock, never the mailbox)
//! ```
//!
//! Completions that arrive back to back share one `flush_notification`
//! message queued behind them, so the listener fires once per batch.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use super::listener::TileSourceListener;
use super::state::{Completion, LoadingState, ResidentTile, StateSnapshot};
use crate::actor::{Actor, DuplicationStrategy, Mailbox, WeakActor};
use crate::layer::{CoordinateConverter, LayerConfig};
use crate::loader::{TileLoadResult, TileLoader};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::tile::{
    compute_visible_tiles, GridRequest, PrioritizedTileRequest, RectCoord, TileCoordinate, ZoomInfo,
    ZoomLevelInfo,
};

/// Published resident set, shared with readers outside the mailbox.
type PublishedTiles<P> = Arc<RwLock<Arc<Vec<ResidentTile<P>>>>>;

const UPDATE_TILESET: &str = "TileSource::update_tileset";

// =============================================================================
// Public Handle
// =============================================================================

/// Streams the tiles of one layer for a moving viewport.
///
/// All methods return immediately. State changes run later, in order, on the
/// source's mailbox; queries that need that state return a
/// [`oneshot::Receiver`]. Dropping the source turns outstanding loader
/// completions and retry timers into no-ops.
///
/// Build one with [`TileSourceBuilder`](super::TileSourceBuilder).
pub struct TileSource<P> {
    actor: Actor<SourceCore<P>>,
    published: PublishedTiles<P>,
    layer_name: String,
}

impl<P: Send + Sync + 'static> TileSource<P> {
    pub(crate) fn from_core(core: SourceCore<P>) -> Self {
        let published = Arc::clone(&core.published);
        let layer_name = core.layer.layer_name().to_string();
        let mailbox = Mailbox::new(Arc::clone(&core.scheduler));
        let actor = Actor::new(mailbox, core);

        let weak = actor.weak_actor();
        actor.inspect(move |core| core.handle = Some(weak));

        Self {
            actor,
            published,
            layer_name,
        }
    }

    /// Requests a recomputation for new visible bounds.
    ///
    /// Bounds may be in any coordinate system the converter understands.
    /// A request still waiting in the mailbox is replaced by this one.
    pub fn on_visible_bounds_changed(&self, bounds: RectCoord, zoom: f64) {
        self.actor
            .message_with(DuplicationStrategy::ReplaceNewest, UPDATE_TILESET, move |core| {
                core.update_tileset(bounds, zoom)
            });
    }

    /// Snapshot of the resident tiles, in tile order.
    ///
    /// Reads the last published set without going through the mailbox.
    pub fn current_tiles(&self) -> Arc<Vec<ResidentTile<P>>> {
        Arc::clone(&self.published.read())
    }

    /// Stops dispatching new loads and drops the pending queue.
    ///
    /// Loads already in flight still complete and their results are stored,
    /// but the listener is not notified until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.actor.message("TileSource::pause", SourceCore::pause);
    }

    /// Recomputes from the last visible bounds and resumes dispatching.
    pub fn resume(&self) {
        self.actor.message("TileSource::resume", SourceCore::resume);
    }

    /// Drops resident tiles and backoff records, then reloads the view.
    ///
    /// Tiles known to be missing stay missing.
    pub fn force_reload(&self) {
        self.actor
            .message("TileSource::force_reload", SourceCore::force_reload);
    }

    /// Skips zoom levels whose identifier is below `identifier`.
    pub fn set_min_zoom_level_identifier(&self, identifier: Option<i32>) {
        self.actor
            .message("TileSource::set_min_zoom_level_identifier", move |core| {
                core.min_zoom_identifier = identifier;
                core.refresh();
            });
    }

    /// Skips zoom levels whose identifier is above `identifier`.
    pub fn set_max_zoom_level_identifier(&self, identifier: Option<i32>) {
        self.actor
            .message("TileSource::set_max_zoom_level_identifier", move |core| {
                core.max_zoom_identifier = identifier;
                core.refresh();
            });
    }

    /// Whether `tile` is part of the current visible set.
    pub fn is_tile_visible(&self, tile: TileCoordinate) -> oneshot::Receiver<bool> {
        self.actor
            .converse("TileSource::is_tile_visible", move |core| core.state.is_visible(&tile))
    }

    /// Last visible bounds, converted into the layer's coordinate system.
    pub fn current_view_bounds(&self) -> oneshot::Receiver<Option<RectCoord>> {
        self.actor
            .converse("TileSource::current_view_bounds", |core| core.view_bounds)
    }

    /// Copy of the loading state, for diagnostics and tests.
    pub fn state_snapshot(&self) -> oneshot::Receiver<StateSnapshot> {
        self.actor
            .converse("TileSource::state_snapshot", |core| core.state.snapshot())
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }
}

impl<P> fmt::Debug for TileSource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSource")
            .field("layer", &self.layer_name)
            .field("resident", &self.published.read().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Mailbox-owned Core
// =============================================================================

/// Everything the tile source mutates. Only touched from inside its mailbox.
pub(crate) struct SourceCore<P> {
    layer: Arc<dyn LayerConfig>,
    loader: Arc<dyn TileLoader<P>>,
    converter: Arc<dyn CoordinateConverter>,
    listener: Option<Arc<dyn TileSourceListener>>,
    scheduler: Arc<dyn Scheduler>,
    /// Zoom table, coarsest first.
    levels: Vec<ZoomLevelInfo>,
    zoom_info: ZoomInfo,
    priority_buckets: u32,
    min_zoom_identifier: Option<i32>,
    max_zoom_identifier: Option<i32>,
    state: LoadingState<P>,
    published: PublishedTiles<P>,
    handle: Option<WeakActor<SourceCore<P>>>,
    paused: bool,
    /// Last requested bounds and zoom, as given by the caller.
    last_request: Option<(RectCoord, f64)>,
    view_bounds: Option<RectCoord>,
    /// Resident set changed since the listener was last notified.
    dirty: bool,
    notify_scheduled: bool,
    retry_timer_at: Option<Instant>,
}

impl<P: Send + Sync + 'static> SourceCore<P> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        layer: Arc<dyn LayerConfig>,
        loader: Arc<dyn TileLoader<P>>,
        converter: Arc<dyn CoordinateConverter>,
        listener: Option<Arc<dyn TileSourceListener>>,
        scheduler: Arc<dyn Scheduler>,
        levels: Vec<ZoomLevelInfo>,
        priority_buckets: u32,
        state: LoadingState<P>,
    ) -> Self {
        let zoom_info = layer.zoom_info();
        Self {
            layer,
            loader,
            converter,
            listener,
            scheduler,
            levels,
            zoom_info,
            priority_buckets,
            min_zoom_identifier: None,
            max_zoom_identifier: None,
            state,
            published: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            handle: None,
            paused: false,
            last_request: None,
            view_bounds: None,
            dirty: false,
            notify_scheduled: false,
            retry_timer_at: None,
        }
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    fn update_tileset(&mut self, bounds: RectCoord, zoom: f64) {
        self.last_request = Some((bounds, zoom));
        if self.paused {
            trace!(layer = %self.layer.layer_name(), "Paused, deferring tile set update");
            return;
        }
        self.recompute();
    }

    fn on_tile_loaded(&mut self, tile: TileCoordinate, result: TileLoadResult<P>) {
        let error = match &result {
            TileLoadResult::Failed(error) => error.to_string(),
            _ => String::new(),
        };

        match self.state.complete(tile, result, self.scheduler.now()) {
            Completion::Stored => {
                debug!(tile = %tile, "Tile loaded");
                self.publish();
                self.mark_dirty();
            }
            Completion::Discarded => {
                debug!(tile = %tile, "Discarding result of cancelled load");
            }
            Completion::NotFound => {
                debug!(tile = %tile, "Tile not found, will not retry");
            }
            Completion::Failed {
                delay, failures, ..
            } => {
                warn!(
                    tile = %tile,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    failures,
                    "Tile load failed, backing off"
                );
            }
            Completion::Unknown => {
                debug!(tile = %tile, "Ignoring result for a load that is not in flight");
            }
        }

        self.dispatch();
        self.schedule_retry();
    }

    fn retry_failed(&mut self) {
        self.retry_timer_at = None;
        if self.paused {
            return;
        }
        let queued = self.state.enqueue_due_retries(self.scheduler.now());
        if queued > 0 {
            debug!(layer = %self.layer.layer_name(), queued, "Retrying failed tiles");
        }
        self.dispatch();
        self.schedule_retry();
    }

    fn flush_notification(&mut self) {
        self.notify_scheduled = false;
        self.notify_if_dirty();
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        let dropped = self.state.clear_queue();
        info!(
            layer = %self.layer.layer_name(),
            dropped,
            in_flight = self.state.in_flight_count(),
            "Tile source paused"
        );
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        info!(layer = %self.layer.layer_name(), "Tile source resumed");
        if self.last_request.is_some() {
            self.recompute();
        } else {
            self.notify_if_dirty();
        }
    }

    fn force_reload(&mut self) {
        info!(layer = %self.layer.layer_name(), "Forcing tile reload");
        if self.state.reset_for_reload() {
            self.publish();
            self.dirty = true;
        }
        // An armed retry timer stays armed; it finds nothing due and re-arms.
        self.refresh();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Recomputes from the last request unless paused.
    fn refresh(&mut self) {
        if !self.paused && self.last_request.is_some() {
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        let Some((bounds, zoom)) = self.last_request else {
            return;
        };

        let tiles = match self
            .converter
            .convert_rect(self.layer.coordinate_system(), &bounds)
        {
            Ok(converted) => {
                self.view_bounds = Some(converted);
                compute_visible_tiles(&GridRequest {
                    visible_bounds: converted,
                    zoom,
                    levels: &self.levels,
                    zoom_info: self.zoom_info,
                    priority_buckets: self.priority_buckets,
                    min_zoom_identifier: self.min_zoom_identifier,
                    max_zoom_identifier: self.max_zoom_identifier,
                })
            }
            Err(error) => {
                warn!(
                    layer = %self.layer.layer_name(),
                    bounds = %bounds,
                    error = %error,
                    "Cannot convert visible bounds, showing no tiles"
                );
                self.view_bounds = None;
                Vec::new()
            }
        };

        let update = self.state.update_visible(tiles, self.scheduler.now());
        for tile in &update.cancelled {
            self.loader.cancel(tile, &self.layer.tile_key(tile));
        }
        debug!(
            layer = %self.layer.layer_name(),
            visible = self.state.visible_count(),
            enqueued = update.enqueued,
            dequeued = update.dequeued,
            evicted = update.evicted,
            cancelled = update.cancelled.len(),
            "Tile set updated"
        );

        if update.resident_changed() {
            self.publish();
            self.dirty = true;
        }

        self.dispatch();
        self.schedule_retry();
        self.notify_if_dirty();
    }

    fn dispatch(&mut self) {
        if self.paused {
            return;
        }
        while let Some(request) = self.state.next_dispatch() {
            self.spawn_load(request);
        }
    }

    fn spawn_load(&self, request: PrioritizedTileRequest) {
        let tile = request.tile;
        let key = self.layer.tile_key(&tile);
        debug!(
            tile = %tile,
            priority = request.priority,
            in_flight = self.state.in_flight_count(),
            queued = self.state.queued_count(),
            "Dispatching tile load"
        );

        let load = self.loader.load(tile, key);
        let handle = self.handle.clone();
        self.scheduler.spawn(
            "tile_load",
            Box::pin(async move {
                let result = load.await;
                if let Some(handle) = handle {
                    handle.message("TileSource::on_tile_loaded", move |core| {
                        core.on_tile_loaded(tile, result)
                    });
                }
            }),
        );
    }

    /// Arms a timer for the earliest pending retry, unless one fires sooner.
    fn schedule_retry(&mut self) {
        if self.paused {
            return;
        }
        let Some(retry_at) = self.state.next_retry_at() else {
            return;
        };
        if self.retry_timer_at.is_some_and(|armed| armed <= retry_at) {
            return;
        }
        let Some(handle) = self.handle.clone() else {
            return;
        };

        let delay = retry_at.saturating_duration_since(self.scheduler.now());
        trace!(delay_ms = delay.as_millis() as u64, "Arming retry timer");
        self.retry_timer_at = Some(retry_at);
        self.scheduler
            .add_task(ScheduledTask::delayed("tile_retry", delay, move || {
                handle.message("TileSource::retry_failed", SourceCore::retry_failed);
            }));
    }

    fn publish(&self) {
        *self.published.write() = Arc::new(self.state.resident_tiles());
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        if self.paused || self.notify_scheduled {
            return;
        }
        if let Some(handle) = &self.handle {
            self.notify_scheduled = true;
            handle.message("TileSource::flush_notification", SourceCore::flush_notification);
        }
    }

    fn notify_if_dirty(&mut self) {
        if self.paused || !self.dirty {
            return;
        }
        self.dirty = false;
        if let Some(listener) = &self.listener {
            trace!(
                layer = %self.layer.layer_name(),
                resident = self.state.resident_count(),
                "Notifying listener"
            );
            listener.on_tiles_updated();
        }
    }
}
