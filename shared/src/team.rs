use serde::{Deserialize, Serialize};

use crate::grid::{GridCellId, GridSpec};

pub const RED_TEAM_ID: &str = "red";
pub const BLUE_TEAM_ID: &str = "blue";

/// Fixed home block coordinates `(x, z)` per team id.
const HOME_COORDS: &[(&str, i32, i32)] = &[(RED_TEAM_ID, -768, -768), (BLUE_TEAM_ID, 768, 768)];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub display_name: String,
    /// ARGB-packed color used only for map styling.
    pub color: u32,
    /// Maximum members; 0 means unlimited.
    #[serde(default)]
    pub capacity: u32,
}

impl Team {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, color: u32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            color,
            capacity: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub const fn is_full(&self, members: usize) -> bool {
        self.capacity > 0 && members >= self.capacity as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Location {
    pub fn block_x(&self) -> i32 {
        self.x.floor() as i32
    }

    pub fn block_z(&self) -> i32 {
        self.z.floor() as i32
    }
}

/// Terrain height lookup for a world.
pub trait HeightSource {
    /// Y of the highest solid block at the given column.
    fn highest_block_y(&self, x: i32, z: i32) -> i32;
}

/// Flat terrain with a constant surface height.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain(pub i32);

impl HeightSource for FlatTerrain {
    fn highest_block_y(&self, _x: i32, _z: i32) -> i32 {
        self.0
    }
}

pub fn home_block(team_id: &str) -> Option<(i32, i32)> {
    HOME_COORDS
        .iter()
        .find(|(id, _, _)| *id == team_id)
        .map(|&(_, x, z)| (x, z))
}

/// Spawn point on top of the terrain at the team's fixed home column, facing yaw 0.
pub fn hardcoded_team_spawn<H: HeightSource + ?Sized>(
    heights: &H,
    world: &str,
    team_id: &str,
) -> Option<Location> {
    let (x, z) = home_block(team_id)?;
    let y = heights.highest_block_y(x, z) + 1;
    Some(Location {
        world: world.to_string(),
        x: f64::from(x) + 0.5,
        y: f64::from(y),
        z: f64::from(z) + 0.5,
        yaw: 0.0,
        pitch: 0.0,
    })
}

/// Lettered cell containing the team's home column, if it lies inside the grid.
pub fn home_cell(grid: &GridSpec, team_id: &str) -> Option<GridCellId> {
    let (x, z) = home_block(team_id)?;
    grid.grid_cell_for_block(x, z)
}
