mod app;
mod config;
mod db_migrations;
mod db_sqlx;
mod routes;
mod services;
mod state;

extern crate self as sqlx;
pub use crate::db_sqlx::{Error, SqlitePool, query, query_as, sqlite};

use std::sync::Arc;

use frontline_shared::FlatTerrain;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::services::region_status::ClaimBoard;
use crate::services::round_store::SqliteRoundStore;
use crate::services::team_registry::TeamRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_path = config::database_path();
    let db_max_connections = config::db_max_connections();
    tracing::info!(%database_path, db_max_connections, "Opening SQLite database...");
    let options = SqliteConnectOptions::new()
        .filename(&database_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let db = match SqlitePoolOptions::new()
        .max_connections(db_max_connections)
        .connect_with(options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, %database_path, "failed to open SQLite database");
            return;
        }
    };
    if let Err(e) = db_migrations::run(&db).await {
        tracing::error!(error = %e, "failed to run migrations");
        return;
    }
    tracing::info!("Database opened and migrations applied");

    let render_config = config::render_config();
    let teams = match TeamRegistry::load(db.clone()).await {
        Ok(teams) => teams,
        Err(e) => {
            tracing::error!(error = %e, "failed to load team registry");
            return;
        }
    };
    let terrain = FlatTerrain(config::world_surface_y());
    if let Err(e) = teams
        .bootstrap_defaults(
            &render_config.world,
            &terrain,
            &render_config.palette,
            config::team_capacity(),
        )
        .await
    {
        tracing::error!(error = %e, "failed to create default teams");
        return;
    }

    let claims = ClaimBoard::seed_from_claims(&render_config.grid, &teams.region_claims().await);
    let rounds = SqliteRoundStore::new(db);
    if let Some(round_id) = config::round_id() {
        match rounds.ensure_round(&round_id).await {
            Ok(round) => tracing::info!(round_id = %round.id, "round active"),
            Err(e) => {
                tracing::error!(error = %e, %round_id, "failed to open round");
                return;
            }
        }
    }
    let state = AppState::new(
        render_config,
        Arc::new(teams),
        Arc::new(claims),
        Arc::new(rounds),
    );

    let app = app::build_app(state.clone());

    let addr = format!("0.0.0.0:{}", config::server_port());
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    tracing::info!("Frontline server listening on {addr}");

    // The marker board only serves once the listener is up.
    state.board.set_available(true);
    tokio::spawn(state.render.clone().run());

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
