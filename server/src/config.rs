use std::time::Duration;

use frontline_shared::colors::parse_hex_argb;
use frontline_shared::grid::{GRID_SIZE, GridSpec, MAX_GRID_SIZE, MAX_REGION_EDGE, REGION_EDGE};

pub const DEFAULT_DATABASE_PATH: &str = "frontline.db";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_WORLD_NAME: &str = "world";
pub const DEFAULT_WORLD_SURFACE_Y: i32 = 64;

pub const DEFAULT_MAP_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAP_POLL_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_MAP_REFRESH_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_NEUTRAL_COLOR: u32 = 0x8080_8080;
pub const DEFAULT_RED_HOME_COLOR: u32 = 0xFFE5_3935;
pub const DEFAULT_BLUE_HOME_COLOR: u32 = 0xFF1E_88E5;

pub const MARKER_SET_ID: &str = "frontline-regions";
pub const MARKER_SET_LABEL: &str = "Regions";
pub const AREA_MARKER_ALTITUDE: f64 = 64.0;
pub const LABEL_MARKER_RISE: f64 = 16.0;

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

fn env_color(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| parse_hex_argb(&value))
        .unwrap_or(default)
}

fn env_secs(key: &str, default: u64) -> Duration {
    env_parsed::<u64>(key)
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

pub fn database_path() -> String {
    std::env::var("DATABASE_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
}

pub fn db_max_connections() -> u32 {
    env_parsed::<u32>("DB_MAX_CONNECTIONS")
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

pub fn server_port() -> u16 {
    env_parsed::<u16>("SERVER_PORT")
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn world_name() -> String {
    std::env::var("WORLD_NAME")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_WORLD_NAME.to_string())
}

pub fn world_surface_y() -> i32 {
    env_parsed::<i32>("WORLD_SURFACE_Y").unwrap_or(DEFAULT_WORLD_SURFACE_Y)
}

/// Edge length must be even so cell centers stay on whole blocks, and at most
/// `MAX_REGION_EDGE`.
pub fn grid_spec() -> GridSpec {
    let edge = env_parsed::<i32>("REGION_EDGE_LENGTH")
        .filter(|value| (1..=MAX_REGION_EDGE).contains(value) && value % 2 == 0)
        .unwrap_or(REGION_EDGE);
    let size = env_parsed::<i32>("REGION_GRID_SIZE")
        .filter(|value| (1..=MAX_GRID_SIZE).contains(value))
        .unwrap_or(GRID_SIZE);
    GridSpec::new(edge, size)
}

/// Round to open at startup when no external round manager is present.
pub fn round_id() -> Option<String> {
    std::env::var("ROUND_ID")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Team capacity applied to bootstrapped teams; 0 means unlimited.
pub fn team_capacity() -> u32 {
    env_parsed::<u32>("TEAM_CAPACITY").unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapPalette {
    pub neutral: u32,
    pub red_home: u32,
    pub blue_home: u32,
}

impl Default for MapPalette {
    fn default() -> Self {
        Self {
            neutral: DEFAULT_NEUTRAL_COLOR,
            red_home: DEFAULT_RED_HOME_COLOR,
            blue_home: DEFAULT_BLUE_HOME_COLOR,
        }
    }
}

pub fn map_palette() -> MapPalette {
    MapPalette {
        neutral: env_color("MAP_NEUTRAL_COLOR", DEFAULT_NEUTRAL_COLOR),
        red_home: env_color("RED_HOME_COLOR", DEFAULT_RED_HOME_COLOR),
        blue_home: env_color("BLUE_HOME_COLOR", DEFAULT_BLUE_HOME_COLOR),
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub world: String,
    pub grid: GridSpec,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub refresh_interval: Duration,
    pub palette: MapPalette,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            world: DEFAULT_WORLD_NAME.to_string(),
            grid: GridSpec::default(),
            poll_interval: Duration::from_secs(DEFAULT_MAP_POLL_INTERVAL_SECS),
            max_polls: DEFAULT_MAP_POLL_MAX_ATTEMPTS,
            refresh_interval: Duration::from_secs(DEFAULT_MAP_REFRESH_INTERVAL_SECS),
            palette: MapPalette::default(),
        }
    }
}

pub fn render_config() -> RenderConfig {
    RenderConfig {
        world: world_name(),
        grid: grid_spec(),
        poll_interval: env_secs("MAP_POLL_INTERVAL_SECS", DEFAULT_MAP_POLL_INTERVAL_SECS),
        max_polls: env_parsed::<u32>("MAP_POLL_MAX_ATTEMPTS")
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAP_POLL_MAX_ATTEMPTS),
        refresh_interval: env_secs(
            "MAP_REFRESH_INTERVAL_SECS",
            DEFAULT_MAP_REFRESH_INTERVAL_SECS,
        ),
        palette: map_palette(),
    }
}
