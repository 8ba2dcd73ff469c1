use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use frontline_shared::{
    BLUE_TEAM_ID, HeightSource, Location, RED_TEAM_ID, RegionKey, Team, hardcoded_team_spawn,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::MapPalette;

#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    #[error("invalid input: {0} must not be empty")]
    InvalidInput(&'static str),
    #[error("team storage failed: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("corrupt team row: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinReason {
    Command,
    AutoAssign,
    Admin,
}

impl fmt::Display for JoinReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::AutoAssign => "auto_assign",
            Self::Admin => "admin",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    TeamNotFound,
    TeamFull,
    AlreadyInTeam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotInTeam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Swapped,
    /// Already on the target team; nothing was written.
    Unchanged,
    NotInTeam,
    TeamNotFound,
    TeamFull,
}

#[derive(Debug, Default)]
struct TeamCache {
    teams: HashMap<String, Team>,
    /// player id -> team id
    memberships: HashMap<String, String>,
    spawns: HashMap<String, Location>,
    claims: HashMap<RegionKey, String>,
}

impl TeamCache {
    fn member_count(&self, team_id: &str) -> usize {
        self.memberships
            .values()
            .filter(|member_team| member_team.as_str() == team_id)
            .count()
    }

    fn is_full(&self, team: &Team) -> bool {
        team.is_full(self.member_count(&team.id))
    }
}

type TeamRow = (String, String, i64, i64);
type SpawnRow = (String, String, f64, f64, f64, f64, f64);
type ClaimRow = (i64, i64, String);

/// Teams, memberships, spawns and region claims.
///
/// The cache is loaded wholesale once and afterwards only follows successful writes: every
/// mutation writes sqlite first and touches the cache only after the write returned `Ok`.
/// The cache mutex is held across the write so membership checks and the write that depends
/// on them cannot interleave.
pub struct TeamRegistry {
    pool: SqlitePool,
    cache: Mutex<TeamCache>,
}

fn require<'a>(value: &'a str, what: &'static str) -> Result<&'a str, TeamError> {
    if value.trim().is_empty() {
        return Err(TeamError::InvalidInput(what));
    }
    Ok(value)
}

impl TeamRegistry {
    pub async fn load(pool: SqlitePool) -> Result<Self, TeamError> {
        let cache = read_all(&pool).await?;
        info!(
            teams = cache.teams.len(),
            memberships = cache.memberships.len(),
            spawns = cache.spawns.len(),
            claims = cache.claims.len(),
            "team registry loaded"
        );
        Ok(Self {
            pool,
            cache: Mutex::new(cache),
        })
    }

    pub async fn get_team(&self, team_id: &str) -> Option<Team> {
        self.cache.lock().await.teams.get(team_id).cloned()
    }

    /// All teams sorted by id.
    pub async fn list_teams(&self) -> Vec<Team> {
        let cache = self.cache.lock().await;
        let mut teams: Vec<Team> = cache.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.id.cmp(&b.id));
        teams
    }

    pub async fn player_team(&self, player_id: &str) -> Option<String> {
        self.cache.lock().await.memberships.get(player_id).cloned()
    }

    pub async fn count_team_members(&self, team_id: &str) -> usize {
        self.cache.lock().await.member_count(team_id)
    }

    pub async fn team_members(&self, team_id: &str) -> Vec<String> {
        let cache = self.cache.lock().await;
        let mut members: Vec<String> = cache
            .memberships
            .iter()
            .filter(|(_, member_team)| member_team.as_str() == team_id)
            .map(|(player, _)| player.clone())
            .collect();
        members.sort();
        members
    }

    /// Team with the fewest members that still has room, ties broken by id.
    pub async fn smallest_team(&self) -> Option<Team> {
        let cache = self.cache.lock().await;
        cache
            .teams
            .values()
            .filter(|team| !cache.is_full(team))
            .min_by(|a, b| {
                cache
                    .member_count(&a.id)
                    .cmp(&cache.member_count(&b.id))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned()
    }

    pub async fn join_team(
        &self,
        player_id: &str,
        team_id: &str,
        reason: JoinReason,
    ) -> Result<JoinOutcome, TeamError> {
        let player_id = require(player_id, "player id")?;
        let team_id = require(team_id, "team id")?;

        let mut cache = self.cache.lock().await;
        if cache.memberships.contains_key(player_id) {
            return Ok(JoinOutcome::AlreadyInTeam);
        }
        let Some(team) = cache.teams.get(team_id) else {
            return Ok(JoinOutcome::TeamNotFound);
        };
        if cache.is_full(team) {
            return Ok(JoinOutcome::TeamFull);
        }

        sqlx::query("INSERT INTO memberships (player_id, team_id, joined_at) VALUES (?, ?, ?)")
            .bind(player_id)
            .bind(team_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        cache
            .memberships
            .insert(player_id.to_string(), team_id.to_string());
        info!(player_id, team_id, %reason, "player joined team");
        Ok(JoinOutcome::Joined)
    }

    pub async fn leave_team(&self, player_id: &str) -> Result<LeaveOutcome, TeamError> {
        let player_id = require(player_id, "player id")?;

        let mut cache = self.cache.lock().await;
        if !cache.memberships.contains_key(player_id) {
            return Ok(LeaveOutcome::NotInTeam);
        }

        sqlx::query("DELETE FROM memberships WHERE player_id = ?")
            .bind(player_id)
            .execute(&self.pool)
            .await?;

        if let Some(team_id) = cache.memberships.remove(player_id) {
            info!(player_id, team_id = %team_id, "player left team");
        }
        Ok(LeaveOutcome::Left)
    }

    pub async fn swap_team(
        &self,
        player_id: &str,
        to_team_id: &str,
    ) -> Result<SwapOutcome, TeamError> {
        let player_id = require(player_id, "player id")?;
        let to_team_id = require(to_team_id, "team id")?;

        let mut cache = self.cache.lock().await;
        let Some(current) = cache.memberships.get(player_id) else {
            return Ok(SwapOutcome::NotInTeam);
        };
        if current == to_team_id {
            return Ok(SwapOutcome::Unchanged);
        }
        let from_team_id = current.clone();
        let Some(target) = cache.teams.get(to_team_id) else {
            return Ok(SwapOutcome::TeamNotFound);
        };
        if cache.is_full(target) {
            return Ok(SwapOutcome::TeamFull);
        }

        sqlx::query("UPDATE memberships SET team_id = ?, joined_at = ? WHERE player_id = ?")
            .bind(to_team_id)
            .bind(Utc::now())
            .bind(player_id)
            .execute(&self.pool)
            .await?;

        cache
            .memberships
            .insert(player_id.to_string(), to_team_id.to_string());
        info!(
            player_id,
            from = %from_team_id,
            to = to_team_id,
            "player swapped team"
        );
        Ok(SwapOutcome::Swapped)
    }

    pub async fn team_spawn(&self, team_id: &str) -> Option<Location> {
        self.cache.lock().await.spawns.get(team_id).cloned()
    }

    /// Returns `false` when the team does not exist.
    pub async fn set_team_spawn(
        &self,
        team_id: &str,
        location: Location,
    ) -> Result<bool, TeamError> {
        let team_id = require(team_id, "team id")?;
        require(&location.world, "spawn world")?;

        let mut cache = self.cache.lock().await;
        if !cache.teams.contains_key(team_id) {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO team_spawns (team_id, world, x, y, z, yaw, pitch) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (team_id) DO UPDATE SET \
             world = excluded.world, x = excluded.x, y = excluded.y, z = excluded.z, \
             yaw = excluded.yaw, pitch = excluded.pitch",
        )
        .bind(team_id)
        .bind(&location.world)
        .bind(location.x)
        .bind(location.y)
        .bind(location.z)
        .bind(f64::from(location.yaw))
        .bind(f64::from(location.pitch))
        .execute(&self.pool)
        .await?;

        info!(
            team_id,
            world = %location.world,
            x = location.x,
            y = location.y,
            z = location.z,
            "team spawn set"
        );
        cache.spawns.insert(team_id.to_string(), location);
        Ok(true)
    }

    /// Returns `false` when a team with the same id already exists.
    pub async fn create_team(&self, team: Team) -> Result<bool, TeamError> {
        require(&team.id, "team id")?;
        require(&team.display_name, "team display name")?;

        let mut cache = self.cache.lock().await;
        if cache.teams.contains_key(&team.id) {
            return Ok(false);
        }

        sqlx::query("INSERT INTO teams (id, display_name, color, capacity) VALUES (?, ?, ?, ?)")
            .bind(&team.id)
            .bind(&team.display_name)
            .bind(i64::from(team.color))
            .bind(i64::from(team.capacity))
            .execute(&self.pool)
            .await?;

        info!(team_id = %team.id, capacity = team.capacity, "team created");
        cache.teams.insert(team.id.clone(), team);
        Ok(true)
    }

    /// Deletes the team with its memberships, spawn and region claims.
    pub async fn delete_team(&self, team_id: &str) -> Result<bool, TeamError> {
        let team_id = require(team_id, "team id")?;

        let mut cache = self.cache.lock().await;
        if !cache.teams.contains_key(team_id) {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        for statement in [
            "DELETE FROM memberships WHERE team_id = ?",
            "DELETE FROM team_spawns WHERE team_id = ?",
            "DELETE FROM region_claims WHERE team_id = ?",
            "DELETE FROM teams WHERE id = ?",
        ] {
            sqlx::query(statement)
                .bind(team_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        cache.teams.remove(team_id);
        cache.spawns.remove(team_id);
        cache
            .memberships
            .retain(|_, member_team| member_team.as_str() != team_id);
        cache
            .claims
            .retain(|_, claim_team| claim_team.as_str() != team_id);
        info!(team_id, "team deleted");
        Ok(true)
    }

    /// Clears every membership. Teams, spawns and claims stay.
    pub async fn reset_all_teams(&self) -> Result<u64, TeamError> {
        let mut cache = self.cache.lock().await;
        let removed = sqlx::query("DELETE FROM memberships")
            .execute(&self.pool)
            .await?
            .rows_affected();
        cache.memberships.clear();
        info!(removed, "all team memberships reset");
        Ok(removed)
    }

    /// Records the team owning a region at seed time. Returns `false` when the team is unknown.
    pub async fn claim_region(&self, key: RegionKey, team_id: &str) -> Result<bool, TeamError> {
        let team_id = require(team_id, "team id")?;

        let mut cache = self.cache.lock().await;
        if !cache.teams.contains_key(team_id) {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO region_claims (corner_x, corner_z, team_id) VALUES (?, ?, ?) \
             ON CONFLICT (corner_x, corner_z) DO UPDATE SET team_id = excluded.team_id",
        )
        .bind(key.corner_x)
        .bind(key.corner_z)
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        cache.claims.insert(key, team_id.to_string());
        Ok(true)
    }

    /// Claims sorted by region key.
    pub async fn region_claims(&self) -> Vec<(RegionKey, String)> {
        let cache = self.cache.lock().await;
        let mut claims: Vec<(RegionKey, String)> = cache
            .claims
            .iter()
            .map(|(key, team_id)| (*key, team_id.clone()))
            .collect();
        claims.sort();
        claims
    }

    /// Creates the red and blue teams and their hardcoded spawns when missing.
    pub async fn bootstrap_defaults<H: HeightSource + ?Sized>(
        &self,
        world: &str,
        heights: &H,
        palette: &MapPalette,
        capacity: u32,
    ) -> Result<(), TeamError> {
        let defaults = [
            (RED_TEAM_ID, "Red", palette.red_home),
            (BLUE_TEAM_ID, "Blue", palette.blue_home),
        ];
        for (team_id, display_name, color) in defaults {
            if self.get_team(team_id).await.is_none() {
                let team = Team::new(team_id, display_name, color).with_capacity(capacity);
                self.create_team(team).await?;
            }
            if self.team_spawn(team_id).await.is_none() {
                match hardcoded_team_spawn(heights, world, team_id) {
                    Some(spawn) => {
                        self.set_team_spawn(team_id, spawn).await?;
                    }
                    None => warn!(team_id, "no hardcoded spawn for default team"),
                }
            }
        }
        Ok(())
    }
}

async fn read_all(pool: &SqlitePool) -> Result<TeamCache, TeamError> {
    let mut cache = TeamCache::default();

    let teams: Vec<TeamRow> =
        sqlx::query_as("SELECT id, display_name, color, capacity FROM teams")
            .fetch_all(pool)
            .await?;
    for (id, display_name, color, capacity) in teams {
        let color = u32::try_from(color)
            .map_err(|_| TeamError::CorruptRow(format!("team {id} has color {color}")))?;
        let capacity = u32::try_from(capacity)
            .map_err(|_| TeamError::CorruptRow(format!("team {id} has capacity {capacity}")))?;
        cache.teams.insert(
            id.clone(),
            Team {
                id,
                display_name,
                color,
                capacity,
            },
        );
    }

    let memberships: Vec<(String, String)> =
        sqlx::query_as("SELECT player_id, team_id FROM memberships")
            .fetch_all(pool)
            .await?;
    cache.memberships.extend(memberships);

    let spawns: Vec<SpawnRow> =
        sqlx::query_as("SELECT team_id, world, x, y, z, yaw, pitch FROM team_spawns")
            .fetch_all(pool)
            .await?;
    for (team_id, world, x, y, z, yaw, pitch) in spawns {
        cache.spawns.insert(
            team_id,
            Location {
                world,
                x,
                y,
                z,
                yaw: yaw as f32,
                pitch: pitch as f32,
            },
        );
    }

    let claims: Vec<ClaimRow> =
        sqlx::query_as("SELECT corner_x, corner_z, team_id FROM region_claims")
            .fetch_all(pool)
            .await?;
    for (corner_x, corner_z, team_id) in claims {
        cache
            .claims
            .insert(RegionKey::new(corner_x, corner_z), team_id);
    }

    Ok(cache)
}
