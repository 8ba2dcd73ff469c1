use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use frontline_shared::colors::to_hex_rgb;
use frontline_shared::{BLUE_TEAM_ID, Bounds, GridCellId, Location, RED_TEAM_ID, home_cell};
use serde::Serialize;

use crate::services::marker_board::MapService;
use crate::services::region_status::{RegionState, RegionStatusSource};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct TeamView {
    id: String,
    display_name: String,
    color: String,
    capacity: u32,
    members: usize,
    spawn: Option<Location>,
}

#[derive(Debug, Serialize)]
pub struct MembersView {
    team_id: String,
    members: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RegionView {
    id: GridCellId,
    name: Option<String>,
    owner: Option<String>,
    state: RegionState,
    home_team: Option<&'static str>,
    bounds: Bounds,
}

#[derive(Debug, Serialize)]
struct RegionsResponse {
    round_id: Option<String>,
    regions: Vec<RegionView>,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let teams = state.teams.list_teams().await.len();
    let open_team = state.teams.smallest_team().await.map(|team| team.id);
    Json(serde_json::json!({
        "status": "ok",
        "world": state.render.world(),
        "map_available": state.board.is_available(),
        "render": state.render.phase().await,
        "teams": teams,
        "open_team": open_team,
        "claimed_regions": state.claims.len(),
    }))
}

pub async fn get_teams(State(state): State<AppState>) -> impl IntoResponse {
    let mut views = Vec::new();
    for team in state.teams.list_teams().await {
        let members = state.teams.count_team_members(&team.id).await;
        let spawn = state.teams.team_spawn(&team.id).await;
        views.push(TeamView {
            color: to_hex_rgb(team.color),
            capacity: team.capacity,
            members,
            spawn,
            id: team.id,
            display_name: team.display_name,
        });
    }
    Json(views)
}

pub async fn get_team_members(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Result<Json<MembersView>, StatusCode> {
    state
        .teams
        .get_team(&team_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    let members = state.teams.team_members(&team_id).await;
    Ok(Json(MembersView { team_id, members }))
}

pub async fn get_regions(State(state): State<AppState>) -> impl IntoResponse {
    let (round_id, names) = state.render.region_names().await;
    let homes: Vec<(GridCellId, &'static str)> = [RED_TEAM_ID, BLUE_TEAM_ID]
        .into_iter()
        .filter_map(|team_id| home_cell(&state.grid, team_id).map(|cell| (cell, team_id)))
        .collect();

    let regions = state
        .grid
        .cells()
        .map(|cell| {
            let cell_id = cell.id.to_string();
            let status = state.claims.region_status(&cell_id);
            RegionView {
                id: cell.id,
                name: names.get(&cell_id).cloned(),
                owner: status.as_ref().and_then(|status| status.owner.clone()),
                state: status.map_or(RegionState::Neutral, |status| status.state),
                home_team: homes
                    .iter()
                    .find(|(home, _)| *home == cell.id)
                    .map(|(_, team_id)| *team_id),
                bounds: cell.bounds,
            }
        })
        .collect();

    Json(RegionsResponse { round_id, regions })
}

pub async fn refresh_regions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.render.request_refresh().await)
}

pub async fn get_maps(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.board.map_surfaces())
}

pub async fn get_map_markers(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> Result<Response, StatusCode> {
    let json = state
        .board
        .marker_sets_json(&map_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(json_bytes_response(json, "no-cache"))
}

fn json_bytes_response(body: Bytes, cache_control: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    response
}
