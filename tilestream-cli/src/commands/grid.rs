//! `grid` command: prints the tiles a viewport would request.

use clap::Args;
use tilestream::config::DEFAULT_PRIORITY_BUCKETS;
use tilestream::layer::{
    CoordinateConverter, DefaultCoordinateConverter, LayerConfig, WebMercatorLayerConfig,
    DEFAULT_MAX_ZOOM_LEVEL,
};
use tilestream::tile::{compute_visible_tiles, sort_zoom_levels, systems, GridRequest, ZoomInfo};

use super::common::{parse_bounds, parse_level_range, parse_system, Bounds};
use crate::error::CliError;

const TEMPLATE: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Arguments of the `grid` command.
#[derive(Debug, Args)]
pub struct GridArgs {
    /// Visible bounds as minx,miny,maxx,maxy
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    pub bounds: Bounds,

    /// Viewport zoom as a scale denominator (e.g. 70000 for street level)
    #[arg(long)]
    pub zoom: f64,

    /// Coordinate system of --bounds (4326 or 3857)
    #[arg(long, default_value = "4326", value_parser = parse_system)]
    pub system: i32,

    /// Inclusive range of Web Mercator levels to serve, e.g. 0..18
    #[arg(long, value_parser = parse_level_range)]
    pub levels: Option<(i32, i32)>,

    /// Coarser levels to include below the target level
    #[arg(long, default_value_t = 0)]
    pub previous_layers: usize,

    /// Distance buckets per zoom level
    #[arg(long, default_value_t = DEFAULT_PRIORITY_BUCKETS)]
    pub buckets: u32,

    /// Key template used to print tile URLs
    #[arg(long, default_value = TEMPLATE)]
    pub template: String,
}

/// Run the grid command.
pub fn run(args: GridArgs) -> Result<(), CliError> {
    let (min_level, max_level) = args.levels.unwrap_or((0, DEFAULT_MAX_ZOOM_LEVEL));
    let layer = WebMercatorLayerConfig::new("grid", args.template)?
        .with_zoom_range(min_level, max_level)?
        .with_zoom_info(ZoomInfo::default().with_previous_layers(args.previous_layers));

    let visible = DefaultCoordinateConverter
        .convert_rect(systems::EPSG_3857, &args.bounds.to_rect(args.system))
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let mut levels = layer.zoom_levels();
    sort_zoom_levels(&mut levels);

    let mut tiles = compute_visible_tiles(&GridRequest {
        visible_bounds: visible,
        zoom: args.zoom,
        levels: &levels,
        zoom_info: layer.zoom_info(),
        priority_buckets: args.buckets.max(1),
        min_zoom_identifier: None,
        max_zoom_identifier: None,
    });
    tiles.sort_by_key(|tile| tile.request);

    println!("Visible bounds (EPSG:3857): {}", visible);
    if tiles.is_empty() {
        println!("No tiles cover the given bounds");
        return Ok(());
    }

    println!("{:>8}  {:<14}  KEY", "PRIORITY", "TILE");
    for tile in &tiles {
        println!(
            "{:>8}  {:<14}  {}",
            tile.priority(),
            tile.tile().to_string(),
            layer.tile_key(&tile.tile())
        );
    }
    println!();
    println!("{} tiles", tiles.len());
    Ok(())
}
