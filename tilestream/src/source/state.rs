//! Loading queue and dedup state machine.
//!
//! # Tile states
//!
//! ```text
//!                 visible, not resident/in-flight/not-found,
//!                 backoff elapsed
//!   absent ─────────────────────────────────────► pending
//!     ▲                                              │ next_dispatch
//!     │ leaves the view                              ▼ (slot free)
//!     │ (pending: dropped,                       in-flight
//!     │  in-flight: cancelled, result ignored)       │ complete
//!     │                        ┌─────────────────────┼──────────────────┐
//!     │                        ▼                     ▼                  ▼
//!     └──────────────── resident               failed (backoff)     not-found
//!                                               └─► pending once      (never
//!                                                   retry is due       retried)
//! ```
//!
//! `LoadingState` is plain data: it never spawns, sleeps or logs. The tile
//! source drives it from inside its mailbox and turns the returned values
//! into loader calls, retry timers and listener notifications.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backoff::{BackoffPolicy, ErrorRecord};
use crate::config::SourceConfig;
use crate::loader::TileLoadResult;
use crate::tile::{PrioritizedTileRequest, RectCoord, TileCoordinate, VisibleTile};

// =============================================================================
// Public Types
// =============================================================================

/// A loaded tile, owned by the tile source while it stays visible.
pub struct ResidentTile<P> {
    pub tile: TileCoordinate,
    /// Placement of the tile in the layer's coordinate system.
    pub bounds: RectCoord,
    pub payload: Arc<P>,
}

impl<P> Clone for ResidentTile<P> {
    fn clone(&self) -> Self {
        Self {
            tile: self.tile,
            bounds: self.bounds,
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<P> fmt::Debug for ResidentTile<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidentTile")
            .field("tile", &self.tile)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// What a visible-set update changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleUpdate {
    /// Requests added to the queue.
    pub enqueued: usize,
    /// Queued requests dropped because their tile left the view.
    pub dequeued: usize,
    /// Resident tiles evicted.
    pub evicted: usize,
    /// In-flight tiles newly marked cancelled.
    pub cancelled: Vec<TileCoordinate>,
}

impl VisibleUpdate {
    pub fn resident_changed(&self) -> bool {
        self.evicted > 0
    }
}

/// Outcome of [`LoadingState::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The payload is now resident.
    Stored,
    /// The load was cancelled or the tile is no longer visible.
    Discarded,
    /// The tile was added to the not-found set.
    NotFound,
    /// The tile will be eligible again at `retry_at`.
    Failed {
        retry_at: Instant,
        delay: Duration,
        failures: u32,
    },
    /// No load for this tile was in flight.
    Unknown,
}

#[derive(Debug, Clone, Copy)]
struct VisibleEntry {
    priority: u32,
    bounds: RectCoord,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    cancelled: bool,
}

// =============================================================================
// Loading State
// =============================================================================

/// Pending queue, in-flight set, resident map and error bookkeeping.
///
/// # Invariants
///
/// - A tile is in at most one of queued, in-flight and resident.
/// - Queued tiles are visible and not in the not-found set.
/// - The in-flight count (cancelled loads included, their task is still
///   running) never exceeds `max_concurrent_loads`.
pub struct LoadingState<P> {
    max_concurrent_loads: usize,
    backoff: BackoffPolicy,
    visible: HashMap<TileCoordinate, VisibleEntry>,
    queue: BTreeSet<PrioritizedTileRequest>,
    queued: HashMap<TileCoordinate, u32>,
    in_flight: HashMap<TileCoordinate, InFlight>,
    resident: BTreeMap<TileCoordinate, ResidentTile<P>>,
    errors: HashMap<TileCoordinate, ErrorRecord>,
    not_found: HashSet<TileCoordinate>,
}

impl<P> LoadingState<P> {
    /// Creates an empty state.
    ///
    /// `max_concurrent_loads` is raised to 1 if zero.
    pub fn new(max_concurrent_loads: usize, backoff: BackoffPolicy) -> Self {
        Self {
            max_concurrent_loads: max_concurrent_loads.max(1),
            backoff,
            visible: HashMap::new(),
            queue: BTreeSet::new(),
            queued: HashMap::new(),
            in_flight: HashMap::new(),
            resident: BTreeMap::new(),
            errors: HashMap::new(),
            not_found: HashSet::new(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.max_concurrent_loads, BackoffPolicy::from(config))
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Replaces the visible set and diffs the state against it.
    ///
    /// Resident tiles outside the new set are evicted, queued ones are
    /// dropped, in-flight ones are marked cancelled. An in-flight tile that
    /// was cancelled and is visible again is un-cancelled. Every visible tile
    /// that is neither resident, in flight, not found, nor waiting out a
    /// backoff is queued with its new priority.
    pub fn update_visible<I>(&mut self, tiles: I, now: Instant) -> VisibleUpdate
    where
        I: IntoIterator<Item = VisibleTile>,
    {
        let visible: HashMap<_, _> = tiles
            .into_iter()
            .map(|tile| {
                (
                    tile.request.tile,
                    VisibleEntry {
                        priority: tile.request.priority,
                        bounds: tile.bounds,
                    },
                )
            })
            .collect();

        let mut update = VisibleUpdate::default();

        let before = self.resident.len();
        self.resident.retain(|tile, _| visible.contains_key(tile));
        update.evicted = before - self.resident.len();

        // Drop queued requests that left the view or changed priority; the
        // latter are re-queued below.
        let stale: Vec<PrioritizedTileRequest> = self
            .queued
            .iter()
            .filter(|(tile, priority)| visible.get(*tile).map(|e| e.priority) != Some(**priority))
            .map(|(tile, priority)| PrioritizedTileRequest::new(*tile, *priority))
            .collect();
        for request in stale {
            self.dequeue(&request);
            if !visible.contains_key(&request.tile) {
                update.dequeued += 1;
            }
        }

        for (tile, flight) in self.in_flight.iter_mut() {
            let wanted = visible.contains_key(tile);
            if !wanted && !flight.cancelled {
                flight.cancelled = true;
                update.cancelled.push(*tile);
            } else if wanted && flight.cancelled {
                flight.cancelled = false;
            }
        }
        update.cancelled.sort();

        self.visible = visible;

        let mut candidates: Vec<PrioritizedTileRequest> = self
            .visible
            .iter()
            .map(|(tile, entry)| PrioritizedTileRequest::new(*tile, entry.priority))
            .collect();
        candidates.sort();
        for request in candidates {
            if self.enqueue(request, now) {
                update.enqueued += 1;
            }
        }

        update
    }

    /// Moves the most urgent queued request to in-flight, if a slot is free.
    pub fn next_dispatch(&mut self) -> Option<PrioritizedTileRequest> {
        if self.in_flight.len() >= self.max_concurrent_loads {
            return None;
        }
        let request = self.queue.pop_first()?;
        self.queued.remove(&request.tile);
        self.in_flight.insert(request.tile, InFlight { cancelled: false });
        Some(request)
    }

    /// Applies a loader outcome and frees the tile's slot.
    pub fn complete(&mut self, tile: TileCoordinate, result: TileLoadResult<P>, now: Instant) -> Completion {
        let Some(flight) = self.in_flight.remove(&tile) else {
            return Completion::Unknown;
        };
        if flight.cancelled {
            return Completion::Discarded;
        }

        match result {
            TileLoadResult::Loaded(payload) => match self.visible.get(&tile) {
                Some(entry) => {
                    self.errors.remove(&tile);
                    self.resident.insert(
                        tile,
                        ResidentTile {
                            tile,
                            bounds: entry.bounds,
                            payload: Arc::new(payload),
                        },
                    );
                    Completion::Stored
                }
                None => Completion::Discarded,
            },
            TileLoadResult::NotFound => {
                self.errors.remove(&tile);
                self.not_found.insert(tile);
                Completion::NotFound
            }
            TileLoadResult::Failed(_) => {
                let record = self.backoff.record_failure(self.errors.get(&tile), now);
                self.errors.insert(tile, record);
                Completion::Failed {
                    retry_at: record.retry_at(),
                    delay: record.delay,
                    failures: record.failures,
                }
            }
        }
    }

    /// Queues every visible failed tile whose backoff has elapsed.
    ///
    /// Returns the number of requests queued.
    pub fn enqueue_due_retries(&mut self, now: Instant) -> usize {
        let mut due: Vec<PrioritizedTileRequest> = self
            .errors
            .iter()
            .filter(|(_, record)| record.is_retry_due(now))
            .filter_map(|(tile, _)| {
                self.visible
                    .get(tile)
                    .map(|entry| PrioritizedTileRequest::new(*tile, entry.priority))
            })
            .collect();
        due.sort();
        due.into_iter()
            .filter(|request| self.enqueue(*request, now))
            .count()
    }

    /// Earliest retry instant of a visible failed tile that is waiting.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.errors
            .iter()
            .filter(|(tile, _)| {
                self.visible.contains_key(*tile)
                    && !self.queued.contains_key(*tile)
                    && !self.in_flight.contains_key(*tile)
            })
            .map(|(_, record)| record.retry_at())
            .min()
    }

    /// Drops every queued request. Returns how many were dropped.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.queued.clear();
        dropped
    }

    /// Forgets resident tiles, error records and queued requests.
    ///
    /// In-flight loads and the not-found set are kept. Returns true if any
    /// resident tile was dropped.
    pub fn reset_for_reload(&mut self) -> bool {
        let had_resident = !self.resident.is_empty();
        self.resident.clear();
        self.errors.clear();
        self.clear_queue();
        had_resident
    }

    fn enqueue(&mut self, request: PrioritizedTileRequest, now: Instant) -> bool {
        let tile = request.tile;
        if self.queued.contains_key(&tile)
            || self.in_flight.contains_key(&tile)
            || self.resident.contains_key(&tile)
            || self.not_found.contains(&tile)
        {
            return false;
        }
        if self
            .errors
            .get(&tile)
            .is_some_and(|record| !record.is_retry_due(now))
        {
            return false;
        }
        self.queue.insert(request);
        self.queued.insert(tile, request.priority);
        true
    }

    fn dequeue(&mut self, request: &PrioritizedTileRequest) {
        self.queue.remove(request);
        self.queued.remove(&request.tile);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn max_concurrent_loads(&self) -> usize {
        self.max_concurrent_loads
    }

    pub fn is_visible(&self, tile: &TileCoordinate) -> bool {
        self.visible.contains_key(tile)
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn is_not_found(&self, tile: &TileCoordinate) -> bool {
        self.not_found.contains(tile)
    }

    pub fn error_record(&self, tile: &TileCoordinate) -> Option<&ErrorRecord> {
        self.errors.get(tile)
    }

    /// Resident tiles in tile order.
    pub fn resident_tiles(&self) -> Vec<ResidentTile<P>> {
        self.resident.values().cloned().collect()
    }

    /// Copies the bookkeeping for inspection.
    pub fn snapshot(&self) -> StateSnapshot {
        let mut in_flight: Vec<_> = self.in_flight.keys().copied().collect();
        in_flight.sort();
        let mut cancelled: Vec<_> = self
            .in_flight
            .iter()
            .filter(|(_, flight)| flight.cancelled)
            .map(|(tile, _)| *tile)
            .collect();
        cancelled.sort();
        let mut failed: Vec<_> = self.errors.keys().copied().collect();
        failed.sort();
        let mut not_found: Vec<_> = self.not_found.iter().copied().collect();
        not_found.sort();

        StateSnapshot {
            max_concurrent_loads: self.max_concurrent_loads,
            visible: self.visible.len(),
            queued: self.queue.iter().copied().collect(),
            in_flight,
            cancelled,
            resident: self.resident.keys().copied().collect(),
            failed,
            not_found,
        }
    }
}

impl<P> fmt::Debug for LoadingState<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingState")
            .field("visible", &self.visible.len())
            .field("queued", &self.queue.len())
            .field("in_flight", &self.in_flight.len())
            .field("resident", &self.resident.len())
            .field("failed", &self.errors.len())
            .field("not_found", &self.not_found.len())
            .finish()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Point-in-time copy of a [`LoadingState`]. All lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub max_concurrent_loads: usize,
    pub visible: usize,
    /// Queued requests in dispatch order.
    pub queued: Vec<PrioritizedTileRequest>,
    /// All in-flight tiles, cancelled ones included.
    pub in_flight: Vec<TileCoordinate>,
    pub cancelled: Vec<TileCoordinate>,
    pub resident: Vec<TileCoordinate>,
    /// Tiles with an error record.
    pub failed: Vec<TileCoordinate>,
    pub not_found: Vec<TileCoordinate>,
}

impl StateSnapshot {
    pub fn is_queued(&self, tile: &TileCoordinate) -> bool {
        self.queued.iter().any(|request| request.tile == *tile)
    }

    pub fn is_in_flight(&self, tile: &TileCoordinate) -> bool {
        self.in_flight.binary_search(tile).is_ok()
    }

    pub fn is_resident(&self, tile: &TileCoordinate) -> bool {
        self.resident.binary_search(tile).is_ok()
    }

    /// Describes every broken state-machine invariant. Empty when consistent.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.in_flight.len() > self.max_concurrent_loads {
            violations.push(format!(
                "{} loads in flight, cap is {}",
                self.in_flight.len(),
                self.max_concurrent_loads
            ));
        }
        for request in &self.queued {
            let tile = &request.tile;
            if self.is_in_flight(tile) {
                violations.push(format!("{} is queued and in flight", tile));
            }
            if self.is_resident(tile) {
                violations.push(format!("{} is queued and resident", tile));
            }
            if self.not_found.binary_search(tile).is_ok() {
                violations.push(format!("{} is queued and not found", tile));
            }
        }
        for tile in &self.in_flight {
            if self.is_resident(tile) {
                violations.push(format!("{} is in flight and resident", tile));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TileLoadError;
    use crate::tile::Coord;
    use proptest::prelude::*;

    fn tile(x: i32, y: i32) -> TileCoordinate {
        TileCoordinate::new(x, y, 4, 100.0)
    }

    fn visible(x: i32, y: i32, priority: u32) -> VisibleTile {
        let left = f64::from(x) * 10.0;
        let top = f64::from(y) * 10.0;
        VisibleTile {
            request: PrioritizedTileRequest::new(tile(x, y), priority),
            bounds: RectCoord::new(Coord::new(0, left, top), Coord::new(0, left + 10.0, top + 10.0)),
        }
    }

    fn state(cap: usize) -> LoadingState<&'static str> {
        LoadingState::new(cap, BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(8)))
    }

    fn failure() -> TileLoadResult<&'static str> {
        TileLoadResult::Failed(TileLoadError::Timeout)
    }

    #[test]
    fn test_update_queues_visible_tiles_in_priority_order() {
        let mut state = state(8);
        let now = Instant::now();
        let update = state.update_visible(vec![visible(0, 0, 5), visible(1, 0, 0), visible(2, 0, 5)], now);

        assert_eq!(update.enqueued, 3);
        let order: Vec<_> = std::iter::from_fn(|| state.next_dispatch()).map(|r| r.tile.x).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_dispatch_respects_cap() {
        let mut state = state(2);
        state.update_visible((0..5).map(|x| visible(x, 0, 0)), Instant::now());

        assert!(state.next_dispatch().is_some());
        assert!(state.next_dispatch().is_some());
        assert!(state.next_dispatch().is_none());
        assert_eq!(state.in_flight_count(), 2);
        assert_eq!(state.queued_count(), 3);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut state = state(1);
        let now = Instant::now();
        let tiles = vec![visible(0, 0, 0), visible(1, 0, 1)];
        state.update_visible(tiles.clone(), now);
        let first = state.snapshot();
        let update = state.update_visible(tiles, now);

        assert_eq!(update, VisibleUpdate::default());
        assert_eq!(state.snapshot(), first);
    }

    #[test]
    fn test_tile_leaving_view_is_dequeued_before_dispatch() {
        let mut state = state(1);
        let now = Instant::now();
        state.update_visible(vec![visible(0, 0, 0), visible(1, 0, 1)], now);
        let update = state.update_visible(vec![visible(0, 0, 0)], now);

        assert_eq!(update.dequeued, 1);
        assert!(!state.snapshot().is_queued(&tile(1, 0)));
    }

    #[test]
    fn test_priority_change_requeues() {
        let mut state = state(1);
        let now = Instant::now();
        state.update_visible(vec![visible(0, 0, 0), visible(1, 0, 9)], now);
        let update = state.update_visible(vec![visible(0, 0, 9), visible(1, 0, 0)], now);

        assert_eq!(update.dequeued, 0);
        assert_eq!(state.next_dispatch().map(|r| r.tile), Some(tile(1, 0)));
    }

    #[test]
    fn test_cancelled_in_flight_result_is_discarded() {
        let mut state = state(4);
        let now = Instant::now();
        state.update_visible(vec![visible(0, 0, 0)], now);
        state.next_dispatch();

        let update = state.update_visible(Vec::new(), now);
        assert_eq!(update.cancelled, vec![tile(0, 0)]);
        assert_eq!(state.in_flight_count(), 1);

        let completion = state.complete(tile(0, 0), TileLoadResult::Loaded("data"), now);
        assert_eq!(completion, Completion::Discarded);
        assert_eq!(state.resident_count(), 0);
        assert_eq!(state.in_flight_count(), 0);
    }

    #[test]
    fn test_cancelled_tile_visible_again_is_uncancelled() {
        let mut state = state(4);
        let now = Instant::now();
        state.update_visible(vec![visible(0, 0, 0)], now);
        state.next_dispatch();
        state.update_visible(Vec::new(), now);
        let update = state.update_visible(vec![visible(0, 0, 0)], now);

        assert_eq!(update.enqueued, 0);
        assert!(state.snapshot().cancelled.is_empty());
        assert_eq!(state.complete(tile(0, 0), TileLoadResult::Loaded("data"), now), Completion::Stored);
        assert_eq!(*state.resident_tiles()[0].payload, "data");
    }

    #[test]
    fn test_success_becomes_resident_and_evicts_on_exit() {
        let mut state = state(4);
        let now = Instant::now();
        state.update_visible(vec![visible(3, 3, 0)], now);
        state.next_dispatch();
        assert_eq!(state.complete(tile(3, 3), TileLoadResult::Loaded("x"), now), Completion::Stored);

        let resident = state.resident_tiles();
        assert_eq!(resident.len(), 1);
        assert_eq!(resident[0].bounds, visible(3, 3, 0).bounds);

        let update = state.update_visible(vec![visible(4, 4, 0)], now);
        assert!(update.resident_changed());
        assert_eq!(state.resident_count(), 0);
    }

    #[test]
    fn test_not_found_is_never_requeued() {
        let mut state = state(4);
        let now = Instant::now();
        state.update_visible(vec![visible(0, 0, 0)], now);
        state.next_dispatch();
        assert_eq!(state.complete(tile(0, 0), TileLoadResult::NotFound, now), Completion::NotFound);

        let update = state.update_visible(vec![visible(0, 0, 0)], now);
        assert_eq!(update.enqueued, 0);
        assert!(state.next_dispatch().is_none());
        assert!(state.is_not_found(&tile(0, 0)));
    }

    #[test]
    fn test_failed_tile_waits_for_backoff() {
        let mut state = state(4);
        let t0 = Instant::now();
        state.update_visible(vec![visible(0, 0, 0)], t0);
        state.next_dispatch();

        let completion = state.complete(tile(0, 0), failure(), t0);
        assert_eq!(
            completion,
            Completion::Failed {
                retry_at: t0 + Duration::from_secs(1),
                delay: Duration::from_secs(1),
                failures: 1,
            }
        );

        // Not yet due: neither an update nor a retry pass queues it.
        state.update_visible(vec![visible(0, 0, 0)], t0 + Duration::from_millis(500));
        assert_eq!(state.enqueue_due_retries(t0 + Duration::from_millis(999)), 0);
        assert_eq!(state.next_retry_at(), Some(t0 + Duration::from_secs(1)));

        assert_eq!(state.enqueue_due_retries(t0 + Duration::from_secs(1)), 1);
        assert!(state.next_retry_at().is_none());
        assert_eq!(state.next_dispatch().map(|r| r.tile), Some(tile(0, 0)));
    }

    #[test]
    fn test_second_failure_doubles_delay_and_success_clears() {
        let mut state = state(4);
        let t0 = Instant::now();
        state.update_visible(vec![visible(0, 0, 0)], t0);
        state.next_dispatch();
        state.complete(tile(0, 0), failure(), t0);

        let t1 = t0 + Duration::from_secs(1);
        state.enqueue_due_retries(t1);
        state.next_dispatch();
        let completion = state.complete(tile(0, 0), failure(), t1);
        assert!(matches!(
            completion,
            Completion::Failed { retry_at, failures: 2, .. } if retry_at == t1 + Duration::from_secs(2)
        ));

        let t2 = t1 + Duration::from_secs(2);
        state.enqueue_due_retries(t2);
        state.next_dispatch();
        state.complete(tile(0, 0), TileLoadResult::Loaded("ok"), t2);
        assert!(state.error_record(&tile(0, 0)).is_none());
    }

    #[test]
    fn test_error_records_survive_leaving_the_view() {
        let mut state = state(4);
        let t0 = Instant::now();
        state.update_visible(vec![visible(0, 0, 0)], t0);
        state.next_dispatch();
        state.complete(tile(0, 0), failure(), t0);

        state.update_visible(Vec::new(), t0);
        assert!(state.error_record(&tile(0, 0)).is_some());

        // Back in view after the backoff elapsed: queued directly.
        let update = state.update_visible(vec![visible(0, 0, 0)], t0 + Duration::from_secs(2));
        assert_eq!(update.enqueued, 1);
    }

    #[test]
    fn test_reset_for_reload_keeps_not_found_and_in_flight() {
        let mut state = state(4);
        let now = Instant::now();
        state.update_visible(vec![visible(0, 0, 0), visible(1, 0, 1), visible(2, 0, 2)], now);
        state.next_dispatch();
        state.next_dispatch();
        state.complete(tile(0, 0), TileLoadResult::Loaded("a"), now);
        state.complete(tile(1, 0), TileLoadResult::NotFound, now);
        state.next_dispatch();

        assert!(state.reset_for_reload());
        assert_eq!(state.resident_count(), 0);
        assert_eq!(state.in_flight_count(), 1);
        assert!(state.is_not_found(&tile(1, 0)));

        let update = state.update_visible(vec![visible(0, 0, 0), visible(1, 0, 1), visible(2, 0, 2)], now);
        assert_eq!(update.enqueued, 1);
    }

    #[test]
    fn test_unknown_completion() {
        let mut state = state(4);
        assert_eq!(
            state.complete(tile(9, 9), TileLoadResult::Loaded("?"), Instant::now()),
            Completion::Unknown
        );
    }

    #[test]
    fn test_violations_detects_overlap() {
        let snapshot = StateSnapshot {
            max_concurrent_loads: 1,
            visible: 1,
            queued: vec![PrioritizedTileRequest::new(tile(0, 0), 0)],
            in_flight: vec![tile(0, 0), tile(1, 1)],
            resident: vec![tile(1, 1)],
            ..StateSnapshot::default()
        };
        assert_eq!(snapshot.violations().len(), 3);
    }

    // -------------------------------------------------------------------------
    // Random operation traces
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Update(Vec<(i32, u32)>),
        Dispatch,
        Complete { index: usize, outcome: u8 },
        Advance(u64),
        Retry,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec((0..6i32, 0..4u32), 0..8).prop_map(Op::Update),
            Just(Op::Dispatch),
            (0..8usize, 0..3u8).prop_map(|(index, outcome)| Op::Complete { index, outcome }),
            (0..3000u64).prop_map(Op::Advance),
            Just(Op::Retry),
        ]
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_over_random_traces(
            cap in 1usize..4,
            ops in prop::collection::vec(op(), 1..60),
        ) {
            let mut state = state(cap);
            let mut now = Instant::now();

            for op in ops {
                match op {
                    Op::Update(tiles) => {
                        let mut seen = HashSet::new();
                        let tiles: Vec<_> = tiles
                            .into_iter()
                            .filter(|(x, _)| seen.insert(*x))
                            .map(|(x, priority)| visible(x, 0, priority))
                            .collect();
                        let update = state.update_visible(tiles, now);
                        let snapshot = state.snapshot();
                        for tile in &update.cancelled {
                            prop_assert!(snapshot.cancelled.contains(tile));
                        }
                        for request in &snapshot.queued {
                            prop_assert!(state.is_visible(&request.tile));
                        }
                    }
                    Op::Dispatch => {
                        while state.next_dispatch().is_some() {}
                    }
                    Op::Complete { index, outcome } => {
                        let in_flight = state.snapshot().in_flight;
                        if let Some(tile) = in_flight.get(index % in_flight.len().max(1)).copied() {
                            let result = match outcome {
                                0 => TileLoadResult::Loaded("p"),
                                1 => TileLoadResult::NotFound,
                                _ => failure(),
                            };
                            state.complete(tile, result, now);
                        }
                    }
                    Op::Advance(ms) => now += Duration::from_millis(ms),
                    Op::Retry => {
                        state.enqueue_due_retries(now);
                    }
                }

                let snapshot = state.snapshot();
                prop_assert!(snapshot.violations().is_empty(), "{:?}", snapshot.violations());
                prop_assert!(snapshot.in_flight.len() <= cap);
            }
        }
    }
}
