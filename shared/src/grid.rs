use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Edge length of a region cell in blocks.
pub const REGION_EDGE: i32 = 512;
/// Width and height of the lettered grid, in cells.
pub const GRID_SIZE: i32 = 4;
/// Lettered ids run `A..Z`, which caps the grid at 26 rows.
pub const MAX_GRID_SIZE: i32 = 26;
/// Largest accepted edge length; `MAX_GRID_SIZE` of these still fit in an `i32`.
pub const MAX_REGION_EDGE: i32 = 1 << 24;

/// Corner of a region cell. Always a multiple of the edge length it was computed with.
///
/// Wider than block coordinates: the corner of a block near `i32::MIN` can lie below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub corner_x: i64,
    pub corner_z: i64,
}

impl RegionKey {
    pub const fn new(corner_x: i64, corner_z: i64) -> Self {
        Self { corner_x, corner_z }
    }
}

/// Axis-aligned rectangle in block coordinates, `min` inclusive and `max` exclusive.
///
/// Stored as `i64` so the cell touching `i32::MAX` still has a representable far edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [i64; 2],
    pub max: [i64; 2],
}

impl Bounds {
    pub const fn width(&self) -> i64 {
        self.max[0] - self.min[0]
    }

    pub const fn height(&self) -> i64 {
        self.max[1] - self.min[1]
    }

    pub const fn midpoint_x(&self) -> i64 {
        self.min[0] + self.width() / 2
    }

    pub const fn midpoint_z(&self) -> i64 {
        self.min[1] + self.height() / 2
    }

    pub const fn contains(&self, x: i64, z: i64) -> bool {
        x >= self.min[0] && x < self.max[0] && z >= self.min[1] && z < self.max[1]
    }

    /// Outline vertices in winding order, starting at the min corner.
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (x0, z0) = (self.min[0] as f64, self.min[1] as f64);
        let (x1, z1) = (self.max[0] as f64, self.max[1] as f64);
        [(x0, z0), (x1, z0), (x1, z1), (x0, z1)]
    }
}

/// Derived, never-persisted view of a [`RegionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub key: RegionKey,
    pub bounds: Bounds,
    pub center: [i64; 2],
    /// `"<gridX>,<gridZ>"` using floor-divided grid indices.
    pub id: String,
    pub default_name: String,
}

/// Lettered cell id such as `A1`: row letter from the z index, number from the x index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCellId {
    pub row: u8,
    pub col: u8,
}

impl GridCellId {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn letter(&self) -> char {
        char::from(b'A' + self.row)
    }
}

impl fmt::Display for GridCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter(), u32::from(self.col) + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGridCellError(String);

impl fmt::Display for ParseGridCellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid grid cell id: {:?}", self.0)
    }
}

impl std::error::Error for ParseGridCellError {}

impl FromStr for GridCellId {
    type Err = ParseGridCellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseGridCellError(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(err());
        }
        let number: u32 = chars.as_str().parse().map_err(|_| err())?;
        if number == 0 || number > MAX_GRID_SIZE as u32 {
            return Err(err());
        }
        Ok(Self {
            row: letter as u8 - b'A',
            col: (number - 1) as u8,
        })
    }
}

impl Serialize for GridCellId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridCellId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One cell of the lettered grid together with its geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub id: GridCellId,
    pub bounds: Bounds,
}

impl GridCell {
    pub const fn center(&self) -> [i64; 2] {
        [self.bounds.midpoint_x(), self.bounds.midpoint_z()]
    }
}

/// Grid geometry. Two indexing schemes live side by side here:
///
/// - [`RegionKey`]/[`RegionInfo`] cover the whole world and use floor division, so
///   negative coordinates land in the cell that actually contains them.
/// - The lettered grid is a `size × size` window centered on the origin and indexes with
///   truncating division after shifting by the half extent. Blocks up to one edge length
///   west or north of the window therefore still truncate to row/column 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub edge: i32,
    pub size: i32,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::new(REGION_EDGE, GRID_SIZE)
    }
}

impl GridSpec {
    pub const fn new(edge: i32, size: i32) -> Self {
        Self { edge, size }
    }

    pub const fn half_extent(&self) -> i64 {
        self.edge as i64 * self.size as i64 / 2
    }

    pub const fn region_key_for_block(&self, x: i32, z: i32) -> RegionKey {
        let edge = self.edge as i64;
        RegionKey {
            corner_x: (x as i64).div_euclid(edge) * edge,
            corner_z: (z as i64).div_euclid(edge) * edge,
        }
    }

    pub fn region_info(&self, key: RegionKey) -> RegionInfo {
        let edge = i64::from(self.edge);
        let (cx, cz) = (key.corner_x, key.corner_z);
        let grid_x = cx.div_euclid(edge);
        let grid_z = cz.div_euclid(edge);
        let id = format!("{grid_x},{grid_z}");
        RegionInfo {
            key,
            bounds: Bounds {
                min: [cx, cz],
                max: [cx + edge, cz + edge],
            },
            center: [cx + edge / 2, cz + edge / 2],
            default_name: format!("Region {id}"),
            id,
        }
    }

    pub fn region_contains_block(&self, key: RegionKey, x: i32, z: i32) -> bool {
        let edge = i64::from(self.edge);
        let (x, z) = (i64::from(x), i64::from(z));
        let (cx, cz) = (key.corner_x, key.corner_z);
        x >= cx && x < cx + edge && z >= cz && z < cz + edge
    }

    pub fn grid_cell_for_block(&self, x: i32, z: i32) -> Option<GridCellId> {
        let half = self.half_extent();
        let edge = i64::from(self.edge);
        let grid_x = (i64::from(x) + half) / edge;
        let grid_z = (i64::from(z) + half) / edge;
        let size = i64::from(self.size);
        if !(0..size).contains(&grid_x) || !(0..size).contains(&grid_z) {
            return None;
        }
        Some(GridCellId::new(grid_z as u8, grid_x as u8))
    }

    pub fn contains_cell(&self, id: GridCellId) -> bool {
        i32::from(id.row) < self.size && i32::from(id.col) < self.size
    }

    pub fn cell(&self, id: GridCellId) -> Option<GridCell> {
        if !self.contains_cell(id) {
            return None;
        }
        let edge = i64::from(self.edge);
        let half = self.half_extent();
        let min_x = i64::from(id.col) * edge - half;
        let min_z = i64::from(id.row) * edge - half;
        Some(GridCell {
            id,
            bounds: Bounds {
                min: [min_x, min_z],
                max: [min_x + edge, min_z + edge],
            },
        })
    }

    /// Every lettered cell, row-major (`A1, A2, .., B1, ..`).
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        let size = self.size.clamp(0, MAX_GRID_SIZE) as u8;
        (0..size)
            .flat_map(move |row| (0..size).map(move |col| GridCellId::new(row, col)))
            .filter_map(|id| self.cell(id))
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn region_key_uses_floor_division_for_negative_coordinates() {
        let grid = GridSpec::default();
        assert_eq!(
            grid.region_key_for_block(-767, -767),
            RegionKey::new(-1024, -1024)
        );
        assert_eq!(grid.region_key_for_block(-1, 0), RegionKey::new(-512, 0));
        assert_eq!(grid.region_key_for_block(511, 512), RegionKey::new(0, 512));
    }

    #[test]
    fn large_edges_keep_corners_and_extent_exact() {
        let grid = GridSpec::new(1000, 4);
        let key = grid.region_key_for_block(i32::MIN, i32::MAX);
        assert_eq!(key.corner_x, -2_147_484_000);
        assert_eq!(key.corner_z, 2_147_483_000);
        assert!(grid.region_contains_block(key, i32::MIN, i32::MAX));

        let wide = GridSpec::new(MAX_REGION_EDGE, MAX_GRID_SIZE);
        assert_eq!(wide.half_extent(), 218_103_808);
        let last = wide.cells().last().expect("last cell");
        assert_eq!(last.bounds.max, [218_103_808, 218_103_808]);
    }

    #[test]
    fn region_key_contains_its_block_across_the_whole_range() {
        let grid = GridSpec::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let extremes = [i32::MIN, i32::MIN + 1, -513, -512, -1, 0, 1, 511, 512, i32::MAX];

        let mut samples: Vec<(i32, i32)> = extremes
            .iter()
            .flat_map(|&x| extremes.iter().map(move |&z| (x, z)))
            .collect();
        samples.extend((0..5_000).map(|_| (rng.r#gen::<i32>(), rng.r#gen::<i32>())));

        for (x, z) in samples {
            let key = grid.region_key_for_block(x, z);
            assert!(grid.region_contains_block(key, x, z), "({x}, {z}) -> {key:?}");
            assert_eq!(key.corner_x.rem_euclid(i64::from(REGION_EDGE)), 0);
            assert_eq!(key.corner_z.rem_euclid(i64::from(REGION_EDGE)), 0);
            let info = grid.region_info(key);
            assert!(info.bounds.contains(i64::from(x), i64::from(z)));
        }
    }

    #[test]
    fn region_contains_block_is_half_open() {
        let grid = GridSpec::default();
        let key = RegionKey::new(0, 0);
        assert!(grid.region_contains_block(key, 0, 0));
        assert!(grid.region_contains_block(key, 511, 511));
        assert!(!grid.region_contains_block(key, 512, 0));
        assert!(!grid.region_contains_block(key, 0, -1));
    }

    #[test]
    fn region_info_derives_geometry_and_names() {
        let grid = GridSpec::default();
        let info = grid.region_info(RegionKey::new(-1024, 512));
        assert_eq!(info.bounds.min, [-1024, 512]);
        assert_eq!(info.bounds.max, [-512, 1024]);
        assert_eq!(info.center, [-768, 768]);
        assert_eq!(info.id, "-2,1");
        assert_eq!(info.default_name, "Region -2,1");
    }

    #[test]
    fn grid_cell_lookup_rejects_blocks_outside_the_window() {
        let grid = GridSpec::default();
        // (0 + 1024) / 512 = 2, (-2000 + 1024) / 512 truncates to -1.
        assert_eq!(grid.grid_cell_for_block(0, -2000), None);
        assert_eq!(grid.grid_cell_for_block(1024, 0), None);
        assert_eq!(grid.grid_cell_for_block(0, 1024), None);
    }

    #[test]
    fn grid_cell_lookup_letters_rows_by_z_and_numbers_columns_by_x() {
        let grid = GridSpec::default();
        assert_eq!(
            grid.grid_cell_for_block(-1024, -1024).map(|c| c.to_string()),
            Some("A1".to_string())
        );
        assert_eq!(
            grid.grid_cell_for_block(600, -100).map(|c| c.to_string()),
            Some("B4".to_string())
        );
        assert_eq!(
            grid.grid_cell_for_block(1023, 1023).map(|c| c.to_string()),
            Some("D4".to_string())
        );
    }

    #[test]
    fn grid_cell_lookup_keeps_truncating_division_near_the_west_edge() {
        let grid = GridSpec::default();
        // (-1500 + 1024) / 512 truncates to 0, unlike the floor-division region key.
        assert_eq!(
            grid.grid_cell_for_block(-1500, 0).map(|c| c.to_string()),
            Some("C1".to_string())
        );
        assert_eq!(grid.region_key_for_block(-1500, 0).corner_x, -1536);
    }

    #[test]
    fn cells_cover_the_window_row_major() {
        let grid = GridSpec::default();
        let cells: Vec<GridCell> = grid.cells().collect();
        assert_eq!(cells.len(), 16);
        assert_eq!(cells[0].id.to_string(), "A1");
        assert_eq!(cells[1].id.to_string(), "A2");
        assert_eq!(cells[4].id.to_string(), "B1");
        assert_eq!(cells[15].id.to_string(), "D4");
        assert_eq!(cells[0].bounds.min, [-1024, -1024]);
        assert_eq!(cells[15].bounds.max, [1024, 1024]);

        for cell in &cells {
            let [cx, cz] = cell.center();
            assert_eq!(
                grid.grid_cell_for_block(cx as i32, cz as i32),
                Some(cell.id)
            );
        }
    }

    #[test]
    fn grid_cell_id_parses_and_displays() {
        let id: GridCellId = "c2".parse().expect("lowercase id should parse");
        assert_eq!(id, GridCellId::new(2, 1));
        assert_eq!(id.to_string(), "C2");
        assert!("".parse::<GridCellId>().is_err());
        assert!("A0".parse::<GridCellId>().is_err());
        assert!("1A".parse::<GridCellId>().is_err());
        assert!("A".parse::<GridCellId>().is_err());
    }
}
