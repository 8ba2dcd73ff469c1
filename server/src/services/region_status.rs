use dashmap::DashMap;
use frontline_shared::{GridSpec, RegionKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionState {
    Neutral,
    Owned,
    Contested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStatus {
    pub owner: Option<String>,
    pub state: RegionState,
}

impl RegionStatus {
    pub fn owned_by(team_id: impl Into<String>) -> Self {
        Self {
            owner: Some(team_id.into()),
            state: RegionState::Owned,
        }
    }
}

/// Live ownership authority, queried by lettered cell id.
pub trait RegionStatusSource: Send + Sync {
    fn region_status(&self, cell_id: &str) -> Option<RegionStatus>;
}

/// In-memory ownership board, seeded from durable region claims.
#[derive(Debug, Default)]
pub struct ClaimBoard {
    statuses: DashMap<String, RegionStatus>,
}

impl ClaimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each claim lands on the lettered cell containing its region's center; claims whose
    /// center falls outside the lettered grid are skipped.
    pub fn seed_from_claims(grid: &GridSpec, claims: &[(RegionKey, String)]) -> Self {
        let board = Self::new();
        for (key, team_id) in claims {
            let info = grid.region_info(*key);
            let cell = i32::try_from(info.center[0])
                .ok()
                .zip(i32::try_from(info.center[1]).ok())
                .and_then(|(x, z)| grid.grid_cell_for_block(x, z));
            match cell {
                Some(cell) => {
                    board.set_status(&cell.to_string(), RegionStatus::owned_by(team_id.clone()));
                }
                None => warn!(region = %info.id, team_id, "claim outside the lettered grid"),
            }
        }
        info!(claims = claims.len(), seeded = board.len(), "region ownership seeded");
        board
    }

    pub fn set_status(&self, cell_id: &str, status: RegionStatus) {
        self.statuses.insert(cell_id.to_string(), status);
    }

    pub fn clear(&self, cell_id: &str) {
        self.statuses.remove(cell_id);
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

impl RegionStatusSource for ClaimBoard {
    fn region_status(&self, cell_id: &str) -> Option<RegionStatus> {
        self.statuses.get(cell_id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_seed_the_cell_containing_the_region_center() {
        let grid = GridSpec::default();
        let claims = vec![
            (RegionKey::new(-1024, -1024), "red".to_string()),
            (RegionKey::new(512, 0), "blue".to_string()),
            (RegionKey::new(4096, 4096), "blue".to_string()),
        ];
        let board = ClaimBoard::seed_from_claims(&grid, &claims);

        assert_eq!(board.len(), 2);
        assert_eq!(
            board.region_status("A1"),
            Some(RegionStatus::owned_by("red"))
        );
        assert_eq!(
            board.region_status("C4"),
            Some(RegionStatus::owned_by("blue"))
        );
        assert_eq!(board.region_status("B2"), None);
    }

    #[test]
    fn statuses_can_be_overwritten_and_cleared() {
        let board = ClaimBoard::new();
        board.set_status("B2", RegionStatus::owned_by("red"));
        board.set_status(
            "B2",
            RegionStatus {
                owner: None,
                state: RegionState::Contested,
            },
        );
        assert_eq!(
            board.region_status("B2").map(|status| status.state),
            Some(RegionState::Contested)
        );
        board.clear("B2");
        assert!(board.is_empty());
    }
}
