use std::sync::Arc;

use frontline_shared::GridSpec;

use crate::config::RenderConfig;
use crate::services::marker_board::MarkerBoard;
use crate::services::region_status::ClaimBoard;
use crate::services::render_sync::RenderSync;
use crate::services::round_store::RoundStore;
use crate::services::team_registry::TeamRegistry;

#[derive(Clone)]
pub struct AppState {
    pub grid: GridSpec,
    pub teams: Arc<TeamRegistry>,
    pub claims: Arc<ClaimBoard>,
    /// In-process map service; its marker sets are what `/api/maps` serves.
    pub board: Arc<MarkerBoard>,
    pub render: Arc<RenderSync>,
}

impl AppState {
    pub fn new(
        config: RenderConfig,
        teams: Arc<TeamRegistry>,
        claims: Arc<ClaimBoard>,
        rounds: Arc<dyn RoundStore>,
    ) -> Self {
        let board = Arc::new(MarkerBoard::new());
        board.add_surface(&config.world, &config.world);
        let grid = config.grid;
        let render = Arc::new(RenderSync::new(
            config,
            board.clone(),
            rounds,
            claims.clone(),
            teams.clone(),
        ));
        Self {
            grid,
            teams,
            claims,
            board,
            render,
        }
    }
}
