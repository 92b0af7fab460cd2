//! `simulate` command: pans a viewport over a synthetic tile server.
//!
//! ```text
//! ┌──────────────┐ on_visible_bounds_changed ┌────────────┐  load   ┌──────────────┐
//! │ pan loop     │ ────────────────────────► │ TileSource │ ──────► │ synthetic    │
//! │ (interval)   │                           │            │ ◄────── │ loader       │
//! └──────────────┘ ◄──── listener (mpsc) ─── └────────────┘ result  │ latency/fail │
//!                                                                   └──────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Args;
use tilestream::layer::{WebMercatorLayerConfig, BASE_TILE_WIDTH, MAX_ZOOM_LEVEL};
use tilestream::loader::{LoadFuture, TileLoadError, TileLoadResult};
use tilestream::scheduler::TokioScheduler;
use tilestream::source::{TileSource, TileSourceBuilder};
use tilestream::tile::{systems, Coord, RectCoord, TileCoordinate};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::common::load_config;
use crate::error::CliError;

/// Arguments of the `simulate` command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of viewport moves
    #[arg(long, default_value_t = 20)]
    pub steps: u32,

    /// Probability that a load fails transiently (0.0 - 1.0)
    #[arg(long, default_value_t = 0.1)]
    pub failure_rate: f64,

    /// Simulated latency of every load
    #[arg(long, default_value_t = 50)]
    pub latency_ms: u64,

    /// Pause between viewport moves
    #[arg(long, default_value_t = 250)]
    pub interval_ms: u64,

    /// Web Mercator level to view
    #[arg(long, default_value_t = 6)]
    pub level: i32,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err(CliError::InvalidArgument(format!(
            "--failure-rate must be within 0..=1, got {}",
            args.failure_rate
        )));
    }
    if !(0..=MAX_ZOOM_LEVEL).contains(&args.level) {
        return Err(CliError::InvalidArgument(format!(
            "--level must be within 0..={}, got {}",
            MAX_ZOOM_LEVEL, args.level
        )));
    }

    let config = load_config(args.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tilestream-worker")
        .build()
        .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    let scheduler = Arc::new(TokioScheduler::new(runtime.handle().clone()));
    let layer = WebMercatorLayerConfig::new("synthetic", "synthetic://{z}/{x}/{y}")?
        .with_zoom_range(0, args.level)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let source = TileSourceBuilder::<Bytes>::new(
        Arc::new(layer),
        Arc::new(synthetic_loader(args.failure_rate, Duration::from_millis(args.latency_ms))),
        scheduler.clone(),
    )
    .with_config(config)
    .with_listener(move || {
        let _ = tx.send(());
    })
    .build()?;

    let result = runtime.block_on(pan(&source, rx, &args));
    scheduler.shutdown();
    result
}

/// Loader answering every request after a fixed latency.
fn synthetic_loader(
    failure_rate: f64,
    latency: Duration,
) -> impl Fn(TileCoordinate, String) -> LoadFuture<Bytes> + Send + Sync + 'static {
    move |_tile: TileCoordinate, key: String| -> LoadFuture<Bytes> {
        let fail = rand::random::<f64>() < failure_rate;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if fail {
                TileLoadResult::Failed(TileLoadError::Network("simulated failure".to_string()))
            } else {
                TileLoadResult::Loaded(Bytes::from(key.into_bytes()))
            }
        })
    }
}

async fn pan(
    source: &TileSource<Bytes>,
    mut updates: mpsc::UnboundedReceiver<()>,
    args: &SimulateArgs,
) -> Result<(), CliError> {
    let tile_width = BASE_TILE_WIDTH / 2f64.powi(args.level);
    let zoom = WebMercatorLayerConfig::zoom_for_level(args.level);
    let mut center = Coord::new(systems::EPSG_3857, 0.0, 0.0);

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut step = 0;
    let mut notifications = 0u64;

    info!(
        layer = source.layer_name(),
        level = args.level,
        steps = args.steps,
        "Starting simulation"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
            Some(()) = updates.recv() => {
                notifications += 1;
                println!(
                    "step {:>3}  resident {:>4}",
                    step,
                    source.current_tiles().len()
                );
            }
            _ = ticker.tick() => {
                if step >= args.steps {
                    break;
                }
                step += 1;
                center.x += tile_width * 0.75;
                source.on_visible_bounds_changed(viewport(center, tile_width), zoom);
            }
        }
    }

    // Let in-flight loads for the last viewport settle.
    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while updates.recv().await.is_some() {
            notifications += 1;
        }
    })
    .await;

    let snapshot = source.state_snapshot().await.unwrap_or_default();
    println!();
    println!("Simulation finished after {} steps", step);
    println!("  notifications: {}", notifications);
    println!("  visible:       {}", snapshot.visible);
    println!("  resident:      {}", snapshot.resident.len());
    println!("  in flight:     {}", snapshot.in_flight.len());
    println!("  backing off:   {}", snapshot.failed.len());
    Ok(())
}

/// A viewport 4 tiles wide and 3 tiles high around `center`.
fn viewport(center: Coord, tile_width: f64) -> RectCoord {
    let half_width = tile_width * 2.0;
    let half_height = tile_width * 1.5;
    RectCoord::from_corners(
        center.system_id,
        center.x - half_width,
        center.y + half_height,
        center.x + half_width,
        center.y - half_height,
    )
}
