//! Argument parsing and configuration helpers shared across commands.

use std::path::{Path, PathBuf};

use tilestream::config::SourceConfig;
use tilestream::tile::{systems, RectCoord};
use tracing::{debug, info};

use crate::error::CliError;

/// Axis-aligned bounds as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Rectangle with the north-west corner first, as map layers expect.
    pub fn to_rect(self, system_id: i32) -> RectCoord {
        RectCoord::from_corners(system_id, self.min_x, self.max_y, self.max_x, self.min_y)
    }
}

/// Parses `minx,miny,maxx,maxy`.
pub fn parse_bounds(s: &str) -> Result<Bounds, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("'{}': {}", part.trim(), e))
        })
        .collect::<Result<_, _>>()?;

    let [min_x, min_y, max_x, max_y] = values[..] else {
        return Err(format!("expected 4 comma-separated values, got {}", values.len()));
    };
    if min_x >= max_x || min_y >= max_y {
        return Err("min values must be below max values".to_string());
    }
    Ok(Bounds {
        min_x,
        min_y,
        max_x,
        max_y,
    })
}

/// Parses an inclusive level range `min..max`.
pub fn parse_level_range(s: &str) -> Result<(i32, i32), String> {
    let (min, max) = s
        .split_once("..")
        .ok_or_else(|| format!("expected <min>..<max>, got '{}'", s))?;
    let min = min.trim().parse::<i32>().map_err(|e| format!("'{}': {}", min, e))?;
    let max = max
        .trim()
        .trim_start_matches('=')
        .parse::<i32>()
        .map_err(|e| format!("'{}': {}", max, e))?;
    Ok((min, max))
}

/// Parses a coordinate system identifier (`4326` or `3857`).
pub fn parse_system(s: &str) -> Result<i32, String> {
    match s.trim().to_ascii_uppercase().trim_start_matches("EPSG:") {
        "4326" => Ok(systems::EPSG_4326),
        "3857" => Ok(systems::EPSG_3857),
        other => Err(format!("unsupported coordinate system '{}'", other)),
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tilestream").join("config.ini"))
}

/// Resolves the source configuration.
///
/// An explicit path must exist. Without one, the default location is used if
/// a file is there, otherwise built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<SourceConfig, CliError> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "Loading configuration");
        return Ok(SourceConfig::from_ini_file(path)?);
    }

    match default_config_path().filter(|path| path.exists()) {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Ok(SourceConfig::from_ini_file(&path)?)
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok(SourceConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_bounds() {
        let bounds = parse_bounds("8.4, 47.3, 8.6,47.4").unwrap();
        assert_eq!(bounds.min_x, 8.4);
        assert_eq!(bounds.max_y, 47.4);

        let rect = bounds.to_rect(systems::EPSG_4326);
        assert_eq!(rect.top_left.y, 47.4);
        assert_eq!(rect.bottom_right.x, 8.6);
    }

    #[test]
    fn test_parse_bounds_rejects_bad_input() {
        assert!(parse_bounds("1,2,3").is_err());
        assert!(parse_bounds("1,2,x,4").is_err());
        assert!(parse_bounds("3,2,1,4").is_err());
    }

    #[test]
    fn test_parse_level_range() {
        assert_eq!(parse_level_range("2..14"), Ok((2, 14)));
        assert_eq!(parse_level_range("0..=20"), Ok((0, 20)));
        assert!(parse_level_range("5").is_err());
    }

    #[test]
    fn test_parse_system() {
        assert_eq!(parse_system("EPSG:3857"), Ok(systems::EPSG_3857));
        assert_eq!(parse_system("4326"), Ok(systems::EPSG_4326));
        assert!(parse_system("2056").is_err());
    }

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[source]\nmax_concurrent_loads = 2").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.max_concurrent_loads, 2);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("missing.ini")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
