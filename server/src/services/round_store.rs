use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Region names keyed by lettered cell id.
pub type RegionNames = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Round {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

/// Round bookkeeping owned by whoever runs the round lifecycle. Region names are stored per
/// round id.
pub trait RoundStore: Send + Sync {
    fn current_round(&self) -> StoreFuture<'_, Option<Round>>;

    fn region_names<'a>(&'a self, round_id: &'a str) -> StoreFuture<'a, RegionNames>;

    /// Replaces every stored name of the round with `names`.
    fn set_region_names<'a>(
        &'a self,
        round_id: &'a str,
        names: &'a RegionNames,
    ) -> StoreFuture<'a, ()>;
}

#[derive(Clone)]
pub struct SqliteRoundStore {
    pool: SqlitePool,
}

impl SqliteRoundStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ends any open round and starts `round_id`. An earlier round with the same id is reopened
    /// with a fresh start time and keeps its stored region names.
    pub async fn open_round(&self, round_id: &str) -> Result<Round, String> {
        if round_id.trim().is_empty() {
            return Err("round id must not be empty".to_string());
        }
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| format!("begin transaction: {e}"))?;
        sqlx::query("UPDATE rounds SET ended_at = ? WHERE ended_at IS NULL")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| format!("close open rounds: {e}"))?;
        sqlx::query(
            "INSERT INTO rounds (id, started_at) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET started_at = excluded.started_at, ended_at = NULL",
        )
        .bind(round_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("open round {round_id}: {e}"))?;
        tx.commit()
            .await
            .map_err(|e| format!("commit round {round_id}: {e}"))?;

        info!(round_id, "round opened");
        Ok(Round {
            id: round_id.to_string(),
            started_at: now,
        })
    }

    /// Keeps the open round when it already has `round_id`, otherwise opens it.
    pub async fn ensure_round(&self, round_id: &str) -> Result<Round, String> {
        match self.load_current_round().await? {
            Some(current) if current.id == round_id => Ok(current),
            _ => self.open_round(round_id).await,
        }
    }

    async fn load_current_round(&self) -> Result<Option<Round>, String> {
        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, started_at FROM rounds WHERE ended_at IS NULL \
             ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("load current round: {e}"))?;
        Ok(row.map(|(id, started_at)| Round { id, started_at }))
    }

    async fn load_region_names(&self, round_id: &str) -> Result<RegionNames, String> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT cell_id, name FROM round_region_names WHERE round_id = ?")
                .bind(round_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| format!("load region names for round {round_id}: {e}"))?;
        Ok(rows.into_iter().collect())
    }

    async fn store_region_names(&self, round_id: &str, names: &RegionNames) -> Result<(), String> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| format!("begin transaction: {e}"))?;
        sqlx::query("DELETE FROM round_region_names WHERE round_id = ?")
            .bind(round_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| format!("clear region names for round {round_id}: {e}"))?;
        for (cell_id, name) in names {
            sqlx::query("INSERT INTO round_region_names (round_id, cell_id, name) VALUES (?, ?, ?)")
                .bind(round_id)
                .bind(cell_id)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| format!("insert region name {cell_id}: {e}"))?;
        }
        tx.commit()
            .await
            .map_err(|e| format!("commit region names for round {round_id}: {e}"))
    }
}

impl RoundStore for SqliteRoundStore {
    fn current_round(&self) -> StoreFuture<'_, Option<Round>> {
        Box::pin(self.load_current_round())
    }

    fn region_names<'a>(&'a self, round_id: &'a str) -> StoreFuture<'a, RegionNames> {
        Box::pin(self.load_region_names(round_id))
    }

    fn set_region_names<'a>(
        &'a self,
        round_id: &'a str,
        names: &'a RegionNames,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.store_region_names(round_id, names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_migrations::memory_pool;

    #[tokio::test]
    async fn no_round_is_current_until_one_opens() {
        let store = SqliteRoundStore::new(memory_pool().await);
        assert_eq!(store.current_round().await.expect("query"), None);

        let round = store.open_round("round-1").await.expect("open");
        assert_eq!(round.id, "round-1");
        let current = store.current_round().await.expect("query");
        assert_eq!(current.map(|r| r.id), Some("round-1".to_string()));
    }

    #[tokio::test]
    async fn ensure_round_reuses_the_open_round() {
        let store = SqliteRoundStore::new(memory_pool().await);
        let first = store.ensure_round("round-1").await.expect("ensure");
        let again = store.ensure_round("round-1").await.expect("ensure again");
        assert_eq!(first.id, again.id);
        assert_eq!(first.started_at.timestamp(), again.started_at.timestamp());

        store.ensure_round("round-2").await.expect("ensure next");
        assert_eq!(
            store.current_round().await.expect("query").map(|r| r.id),
            Some("round-2".to_string())
        );
    }

    #[tokio::test]
    async fn opening_a_round_ends_the_previous_one() {
        let store = SqliteRoundStore::new(memory_pool().await);
        store.open_round("round-1").await.expect("open");
        store.open_round("round-2").await.expect("open");
        assert_eq!(
            store.current_round().await.expect("query").map(|r| r.id),
            Some("round-2".to_string())
        );
        assert!(store.open_round(" ").await.is_err());
    }

    #[tokio::test]
    async fn ensuring_an_ended_round_reopens_it_with_its_names() {
        let store = SqliteRoundStore::new(memory_pool().await);
        store.ensure_round("round-1").await.expect("ensure round 1");
        let names: RegionNames = [("C3".to_string(), "Ashford".to_string())]
            .into_iter()
            .collect();
        store
            .set_region_names("round-1", &names)
            .await
            .expect("save round 1");
        store.ensure_round("round-2").await.expect("ensure round 2");

        let reopened = store.ensure_round("round-1").await.expect("reopen round 1");
        assert_eq!(reopened.id, "round-1");
        let current = store.current_round().await.expect("query").expect("open round");
        assert_eq!(current.id, "round-1");
        assert_eq!(current.started_at.timestamp(), reopened.started_at.timestamp());
        assert_eq!(store.region_names("round-1").await.expect("load"), names);

        let (open,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM rounds WHERE ended_at IS NULL")
                .fetch_one(&store.pool)
                .await
                .expect("count open rounds");
        assert_eq!(open, 1);
    }

    #[tokio::test]
    async fn region_names_are_scoped_to_their_round_and_replaced_wholesale() {
        let store = SqliteRoundStore::new(memory_pool().await);
        store.open_round("round-1").await.expect("open");
        store.open_round("round-2").await.expect("open");

        let first: RegionNames = [("A1", "Ashford"), ("A2", "Coldmere")]
            .into_iter()
            .map(|(cell, name)| (cell.to_string(), name.to_string()))
            .collect();
        store
            .set_region_names("round-1", &first)
            .await
            .expect("save round 1");
        assert_eq!(
            store.region_names("round-1").await.expect("load"),
            first
        );
        assert!(store.region_names("round-2").await.expect("load").is_empty());

        let replacement: RegionNames = [("B1".to_string(), "Frostwick".to_string())]
            .into_iter()
            .collect();
        store
            .set_region_names("round-1", &replacement)
            .await
            .expect("replace round 1");
        assert_eq!(
            store.region_names("round-1").await.expect("load"),
            replacement
        );
    }
}
