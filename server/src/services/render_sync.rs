use std::collections::HashSet;
use std::sync::Arc;

use frontline_shared::colors::{darken, fallback_team_color, with_alpha};
use frontline_shared::names::generate_distinct_name;
use frontline_shared::{
    BLUE_TEAM_ID, GridCell, GridCellId, HtmlMarker, Marker, MarkerSetSpec, RED_TEAM_ID,
    ShapeMarker, escape_html, home_cell,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{
    AREA_MARKER_ALTITUDE, LABEL_MARKER_RISE, MARKER_SET_ID, MARKER_SET_LABEL, RenderConfig,
};
use crate::services::marker_board::{MapService, MapSurface};
use crate::services::region_status::{RegionState, RegionStatusSource};
use crate::services::round_store::{RegionNames, Round, RoundStore};
use crate::services::team_registry::TeamRegistry;

const FILL_ALPHA: u8 = 0x60;
const OUTLINE_DARKEN: f64 = 0.7;
const OUTLINE_WIDTH: u32 = 2;
const LABEL_MAX_DISTANCE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    Polling { attempts: u32 },
    Active { map_id: String },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Rendered { cells: usize },
    /// Not active yet, or polling gave up.
    Inactive,
    /// Another refresh for this world is running.
    InFlight,
    MapUnavailable,
}

/// Region names of the round they were loaded for.
#[derive(Debug, Default)]
struct NameBook {
    round_id: Option<String>,
    names: RegionNames,
    /// Stored names for `round_id` were read successfully.
    loaded: bool,
    /// Names exist that storage has not seen yet.
    pending: bool,
}

impl NameBook {
    fn used_names(&self) -> HashSet<String> {
        self.names.values().cloned().collect()
    }
}

struct RenderState {
    book: NameBook,
    rng: ChaCha8Rng,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CellStyle {
    color: u32,
    caption: String,
}

/// Keeps the map service's region markers in step with names and ownership for one world.
///
/// Polls until the map service offers a surface for the world, then refreshes on a fixed
/// interval. Only one timer runs at a time. Refreshes are single-flight: a refresh that finds
/// another one running returns [`RefreshOutcome::InFlight`] without doing anything.
pub struct RenderSync {
    config: RenderConfig,
    map: Arc<dyn MapService>,
    rounds: Arc<dyn RoundStore>,
    status: Arc<dyn RegionStatusSource>,
    teams: Arc<TeamRegistry>,
    phase: RwLock<SyncPhase>,
    render: Mutex<RenderState>,
}

impl RenderSync {
    pub fn new(
        config: RenderConfig,
        map: Arc<dyn MapService>,
        rounds: Arc<dyn RoundStore>,
        status: Arc<dyn RegionStatusSource>,
        teams: Arc<TeamRegistry>,
    ) -> Self {
        Self {
            config,
            map,
            rounds,
            status,
            teams,
            phase: RwLock::new(SyncPhase::Polling { attempts: 0 }),
            render: Mutex::new(RenderState {
                book: NameBook::default(),
                rng: ChaCha8Rng::from_entropy(),
            }),
        }
    }

    /// Fixes the name generator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.render.get_mut().rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn world(&self) -> &str {
        &self.config.world
    }

    pub async fn phase(&self) -> SyncPhase {
        self.phase.read().await.clone()
    }

    /// Current round id and the names held in memory for it.
    pub async fn region_names(&self) -> (Option<String>, RegionNames) {
        let render = self.render.lock().await;
        (render.book.round_id.clone(), render.book.names.clone())
    }

    pub async fn run(self: Arc<Self>) {
        info!(
            world = %self.config.world,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_polls = self.config.max_polls,
            "waiting for map service"
        );

        let mut poll = tokio::time::interval(self.config.poll_interval);
        loop {
            poll.tick().await;
            match self.poll_once().await {
                SyncPhase::Polling { .. } => {}
                SyncPhase::Active { .. } => break,
                SyncPhase::Disabled => return,
            }
        }
        drop(poll);

        let mut refresh = tokio::time::interval(self.config.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately, giving the activation refresh.
        loop {
            refresh.tick().await;
            match self.refresh().await {
                RefreshOutcome::Rendered { cells } => debug!(cells, "region markers refreshed"),
                RefreshOutcome::InFlight => debug!("region refresh already running, skipped"),
                RefreshOutcome::MapUnavailable => {
                    warn!(world = %self.config.world, "map service unavailable during refresh");
                }
                RefreshOutcome::Inactive => return,
            }
        }
    }

    /// One availability check while polling. Returns the phase after the check; phases other
    /// than polling are returned unchanged.
    pub async fn poll_once(&self) -> SyncPhase {
        let mut phase = self.phase.write().await;
        let attempts = match &*phase {
            SyncPhase::Polling { attempts } => *attempts,
            other => return other.clone(),
        };

        if let Some(surface) = self.find_surface() {
            self.prepare_marker_set(&surface.id);
            info!(
                map_id = %surface.id,
                world = %self.config.world,
                attempts = attempts + 1,
                "map service ready, region rendering active"
            );
            *phase = SyncPhase::Active { map_id: surface.id };
            return phase.clone();
        }

        let attempts = attempts + 1;
        if logs_poll_attempt(attempts) {
            info!(
                attempt = attempts,
                max_polls = self.config.max_polls,
                world = %self.config.world,
                "map service not ready yet"
            );
        }
        *phase = if attempts >= self.config.max_polls {
            warn!(
                attempts,
                world = %self.config.world,
                "map service never became available; region rendering disabled"
            );
            SyncPhase::Disabled
        } else {
            SyncPhase::Polling { attempts }
        };
        phase.clone()
    }

    fn find_surface(&self) -> Option<MapSurface> {
        if !self.map.is_available() {
            return None;
        }
        let surfaces = self.map.map_surfaces();
        if let Some(surface) = surfaces
            .iter()
            .find(|surface| surface.world.eq_ignore_ascii_case(&self.config.world))
        {
            return Some(surface.clone());
        }
        let fallback = surfaces.into_iter().next()?;
        warn!(
            world = %self.config.world,
            map_id = %fallback.id,
            "no map surface for world, using another surface"
        );
        Some(fallback)
    }

    /// Creates the marker set and drops markers left from an earlier session.
    fn prepare_marker_set(&self, map_id: &str) {
        let spec = marker_set_spec();
        let result = self
            .map
            .ensure_marker_set(map_id, &spec)
            .and_then(|()| self.map.clear_markers(map_id, MARKER_SET_ID));
        if let Err(e) = result {
            warn!(map_id, error = %e, "failed to prepare region marker set");
        }
    }

    /// Re-renders every lettered cell. Safe to call at any time.
    pub async fn refresh(&self) -> RefreshOutcome {
        let map_id = match &*self.phase.read().await {
            SyncPhase::Active { map_id } => map_id.clone(),
            _ => return RefreshOutcome::Inactive,
        };
        let Ok(mut render) = self.render.try_lock() else {
            return RefreshOutcome::InFlight;
        };
        if !self.map.is_available() {
            return RefreshOutcome::MapUnavailable;
        }
        let spec = marker_set_spec();
        if let Err(e) = self.map.ensure_marker_set(&map_id, &spec) {
            warn!(%map_id, error = %e, "region marker set unavailable");
            return RefreshOutcome::MapUnavailable;
        }

        // An unreadable round store leaves the name book untouched for this pass.
        let round = self.current_round().await;
        if let Ok(round) = &round {
            self.sync_round_names(&mut render, round.as_ref()).await;
        }

        let homes = self.home_cells();
        let mut cells = 0;
        for cell in self.config.grid.cells() {
            let cell_id = cell.id.to_string();
            let style = self.cell_style(&cell_id, cell.id, &homes).await;
            let name = self.resolve_name(&mut render, &cell_id).await;
            for (marker_id, marker) in cell_markers(&cell, &cell_id, &name, &style) {
                if let Err(e) = self
                    .map
                    .put_marker(&map_id, MARKER_SET_ID, &marker_id, marker)
                {
                    warn!(%map_id, %marker_id, error = %e, "failed to place region marker");
                }
            }
            cells += 1;
        }

        if round.is_ok() {
            self.save_names(&mut render).await;
        }
        RefreshOutcome::Rendered { cells }
    }

    /// Out-of-band refresh request. Does nothing unless rendering is active.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        let outcome = self.refresh().await;
        info!(world = %self.config.world, ?outcome, "region refresh requested");
        outcome
    }

    /// Loads, fills and persists names for the current round without rendering.
    pub async fn prepare_names(&self) {
        let Ok(round) = self.current_round().await else {
            return;
        };
        let mut render = self.render.lock().await;
        self.sync_round_names(&mut render, round.as_ref()).await;
    }

    async fn current_round(&self) -> Result<Option<Round>, String> {
        self.rounds.current_round().await.inspect_err(|e| {
            warn!(error = %e, "failed to read current round; keeping region names in memory");
        })
    }

    /// Brings the name book in line with `round`: a new round id clears memory and loads
    /// that round's stored names, then every cell still missing a name gets one distinct
    /// from all names in use. New names are persisted only while a round is active.
    async fn sync_round_names(&self, render: &mut RenderState, round: Option<&Round>) {
        let round_id = round.map(|round| round.id.clone());
        let book = &mut render.book;

        if book.round_id != round_id {
            info!(
                from = ?book.round_id,
                to = ?round_id,
                "round changed, clearing region names"
            );
            *book = NameBook {
                round_id: round_id.clone(),
                ..NameBook::default()
            };
        }

        if let Some(id) = &round_id
            && !book.loaded
        {
            match self.rounds.region_names(id).await {
                Ok(stored) => {
                    info!(round_id = %id, names = stored.len(), "loaded region names");
                    // Stored names win; memory-only names survive where they do not clash.
                    let taken: HashSet<&String> = stored.values().collect();
                    let carried: RegionNames = book
                        .names
                        .drain()
                        .filter(|(cell, name)| !stored.contains_key(cell) && !taken.contains(name))
                        .collect();
                    book.pending = !carried.is_empty();
                    book.names = stored;
                    book.names.extend(carried);
                    book.loaded = true;
                }
                Err(e) => {
                    warn!(
                        round_id = %id,
                        error = %e,
                        "failed to load region names; keeping names in memory only"
                    );
                }
            }
        }

        let mut used = book.used_names();
        let mut generated = 0;
        for cell in self.config.grid.cells() {
            let cell_id = cell.id.to_string();
            if book.names.contains_key(&cell_id) {
                continue;
            }
            let name = generate_distinct_name(&mut render.rng, &used)
                .unwrap_or_else(|| fallback_name(&cell_id));
            used.insert(name.clone());
            book.names.insert(cell_id, name);
            generated += 1;
        }
        if generated > 0 {
            book.pending = true;
            info!(generated, round_id = ?round_id, "generated region names");
        }

        self.save_names(render).await;
    }

    /// Name for one cell: memory first, then the round's stored names, then a fresh name
    /// queued for the next save.
    async fn resolve_name(&self, render: &mut RenderState, cell_id: &str) -> String {
        if let Some(name) = render.book.names.get(cell_id) {
            return name.clone();
        }

        if let Some(round_id) = render.book.round_id.clone() {
            match self.rounds.region_names(&round_id).await {
                Ok(stored) => {
                    if let Some(name) = stored.get(cell_id) {
                        render
                            .book
                            .names
                            .insert(cell_id.to_string(), name.clone());
                        return name.clone();
                    }
                }
                Err(e) => warn!(%round_id, cell_id, error = %e, "failed to look up region name"),
            }
        }

        let used = render.book.used_names();
        let name = generate_distinct_name(&mut render.rng, &used)
            .unwrap_or_else(|| fallback_name(cell_id));
        render
            .book
            .names
            .insert(cell_id.to_string(), name.clone());
        render.book.pending = true;
        name
    }

    /// Writes the whole name map when it has unsaved names, a round is active and that
    /// round's stored names were read. Failures keep the names pending for the next save.
    async fn save_names(&self, render: &mut RenderState) {
        let book = &mut render.book;
        if !book.pending {
            return;
        }
        let Some(round_id) = book.round_id.as_deref() else {
            debug!("no active round; region names kept in memory only");
            return;
        };
        if !book.loaded {
            return;
        }
        match self.rounds.set_region_names(round_id, &book.names).await {
            Ok(()) => {
                info!(round_id, names = book.names.len(), "saved region names");
                book.pending = false;
            }
            Err(e) => warn!(round_id, error = %e, "failed to save region names"),
        }
    }

    fn home_cells(&self) -> Vec<(GridCellId, &'static str)> {
        [RED_TEAM_ID, BLUE_TEAM_ID]
            .into_iter()
            .filter_map(|team_id| home_cell(&self.config.grid, team_id).map(|cell| (cell, team_id)))
            .collect()
    }

    async fn cell_style(
        &self,
        cell_id: &str,
        cell: GridCellId,
        homes: &[(GridCellId, &'static str)],
    ) -> CellStyle {
        if let Some(&(_, team_id)) = homes.iter().find(|(home, _)| *home == cell) {
            let (color, name) = self.team_style(team_id).await;
            return CellStyle {
                color,
                caption: format!("{name} home"),
            };
        }

        match self.status.region_status(cell_id) {
            Some(status) if status.state == RegionState::Contested => CellStyle {
                color: self.config.palette.neutral,
                caption: "Contested".to_string(),
            },
            Some(status) => match status.owner {
                Some(owner) => {
                    let (color, name) = self.team_style(&owner).await;
                    CellStyle {
                        color,
                        caption: name,
                    }
                }
                None => self.neutral_style(),
            },
            None => self.neutral_style(),
        }
    }

    fn neutral_style(&self) -> CellStyle {
        CellStyle {
            color: self.config.palette.neutral,
            caption: "Unclaimed".to_string(),
        }
    }

    async fn team_style(&self, team_id: &str) -> (u32, String) {
        if let Some(team) = self.teams.get_team(team_id).await {
            return (team.color, team.display_name);
        }
        let color = match team_id {
            RED_TEAM_ID => self.config.palette.red_home,
            BLUE_TEAM_ID => self.config.palette.blue_home,
            other => fallback_team_color(other),
        };
        (color, team_id.to_string())
    }
}

/// First attempt and every tenth after it.
fn logs_poll_attempt(attempt: u32) -> bool {
    attempt == 1 || attempt % 10 == 0
}

fn marker_set_spec() -> MarkerSetSpec {
    MarkerSetSpec {
        id: MARKER_SET_ID.to_string(),
        label: MARKER_SET_LABEL.to_string(),
        toggleable: true,
        default_hidden: false,
    }
}

fn fallback_name(cell_id: &str) -> String {
    format!("Region {cell_id}")
}

pub fn area_marker_id(cell_id: &str) -> String {
    format!("region-area-{cell_id}")
}

pub fn label_marker_id(cell_id: &str) -> String {
    format!("region-label-{cell_id}")
}

fn cell_markers(
    cell: &GridCell,
    cell_id: &str,
    name: &str,
    style: &CellStyle,
) -> [(String, Marker); 2] {
    let [center_x, center_z] = cell.center();
    let area = ShapeMarker {
        label: format!("{name} ({cell_id})"),
        shape: cell.bounds.corners().to_vec(),
        altitude: AREA_MARKER_ALTITUDE,
        line_color: darken(with_alpha(style.color, 0xFF), OUTLINE_DARKEN),
        line_width: OUTLINE_WIDTH,
        fill_color: with_alpha(style.color, FILL_ALPHA),
        depth_test: false,
    };
    let label = HtmlMarker {
        label: name.to_string(),
        position: [
            center_x as f64,
            AREA_MARKER_ALTITUDE + LABEL_MARKER_RISE,
            center_z as f64,
        ],
        html: format!(
            "<div class=\"frontline-region\"><strong>{}</strong><br/><span>{} &middot; {}</span></div>",
            escape_html(name),
            escape_html(cell_id),
            escape_html(&style.caption),
        ),
        anchor: [0, 0],
        min_distance: 0.0,
        max_distance: LABEL_MAX_DISTANCE,
        listed: false,
    };
    [
        (area_marker_id(cell_id), Marker::Shape(area)),
        (label_marker_id(cell_id), Marker::Html(label)),
    ]
}
