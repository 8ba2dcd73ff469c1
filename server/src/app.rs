use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    // Web map front ends on other origins read the marker JSON directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    let read_only = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/teams", get(routes::api::get_teams))
        .route(
            "/api/teams/{team_id}/members",
            get(routes::api::get_team_members),
        )
        .route("/api/regions", get(routes::api::get_regions))
        .route("/api/maps", get(routes::api::get_maps))
        .route(
            "/api/maps/{map_id}/markers",
            get(routes::api::get_map_markers),
        )
        .layer(cors);

    Router::new()
        .merge(read_only)
        .route(
            "/api/regions/refresh",
            post(routes::api::refresh_regions),
        )
        .layer(CompressionLayer::new())
        .with_state(state)
}
