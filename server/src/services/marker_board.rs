use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use frontline_shared::{Marker, MarkerSetSpec};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapServiceError {
    #[error("map service is not available")]
    Unavailable,
    #[error("unknown map surface {0}")]
    UnknownMap(String),
    #[error("unknown marker set {0}")]
    UnknownMarkerSet(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapSurface {
    pub id: String,
    pub world: String,
}

/// External visualization service: map surfaces holding marker sets, markers keyed by id.
pub trait MapService: Send + Sync {
    fn is_available(&self) -> bool;

    fn map_surfaces(&self) -> Vec<MapSurface>;

    /// Creates the marker set if missing; an existing set keeps its markers.
    fn ensure_marker_set(&self, map_id: &str, spec: &MarkerSetSpec)
    -> Result<(), MapServiceError>;

    fn clear_markers(&self, map_id: &str, set_id: &str) -> Result<(), MapServiceError>;

    /// Inserts or replaces the marker stored under `marker_id`.
    fn put_marker(
        &self,
        map_id: &str,
        set_id: &str,
        marker_id: &str,
        marker: Marker,
    ) -> Result<(), MapServiceError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerSet {
    #[serde(flatten)]
    pub spec: MarkerSetSpec,
    pub markers: BTreeMap<String, Marker>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct SurfaceState {
    world: String,
    sets: BTreeMap<String, MarkerSet>,
}

/// In-process [`MapService`] whose marker sets are served read-only over HTTP.
#[derive(Debug, Default)]
pub struct MarkerBoard {
    available: AtomicBool,
    surfaces: DashMap<String, SurfaceState>,
}

impl MarkerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Registers a surface for `world`. Re-registering keeps existing marker sets.
    pub fn add_surface(&self, map_id: &str, world: &str) {
        self.surfaces
            .entry(map_id.to_string())
            .and_modify(|state| state.world = world.to_string())
            .or_insert_with(|| SurfaceState {
                world: world.to_string(),
                sets: BTreeMap::new(),
            });
    }

    pub fn marker_sets(&self, map_id: &str) -> Option<Vec<MarkerSet>> {
        self.surfaces
            .get(map_id)
            .map(|state| state.sets.values().cloned().collect())
    }

    pub fn marker_count(&self, map_id: &str, set_id: &str) -> usize {
        self.surfaces
            .get(map_id)
            .and_then(|state| state.sets.get(set_id).map(|set| set.markers.len()))
            .unwrap_or(0)
    }

    pub fn marker(&self, map_id: &str, set_id: &str, marker_id: &str) -> Option<Marker> {
        self.surfaces.get(map_id).and_then(|state| {
            state
                .sets
                .get(set_id)
                .and_then(|set| set.markers.get(marker_id).cloned())
        })
    }

    pub fn marker_sets_json(&self, map_id: &str) -> Option<Bytes> {
        let sets = self.marker_sets(map_id)?;
        match serde_json::to_vec(&sets) {
            Ok(json) => Some(Bytes::from(json)),
            Err(e) => {
                warn!(map_id, "failed to serialize marker sets: {e}");
                None
            }
        }
    }

    fn check_available(&self) -> Result<(), MapServiceError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(MapServiceError::Unavailable)
        }
    }

    fn with_set<T>(
        &self,
        map_id: &str,
        set_id: &str,
        f: impl FnOnce(&mut MarkerSet) -> T,
    ) -> Result<T, MapServiceError> {
        self.check_available()?;
        let mut state = self
            .surfaces
            .get_mut(map_id)
            .ok_or_else(|| MapServiceError::UnknownMap(map_id.to_string()))?;
        let set = state
            .sets
            .get_mut(set_id)
            .ok_or_else(|| MapServiceError::UnknownMarkerSet(set_id.to_string()))?;
        let result = f(set);
        set.updated_at = Utc::now();
        Ok(result)
    }
}

impl MapService for MarkerBoard {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn map_surfaces(&self) -> Vec<MapSurface> {
        let mut surfaces: Vec<MapSurface> = self
            .surfaces
            .iter()
            .map(|entry| MapSurface {
                id: entry.key().clone(),
                world: entry.value().world.clone(),
            })
            .collect();
        surfaces.sort_by(|a, b| a.id.cmp(&b.id));
        surfaces
    }

    fn ensure_marker_set(
        &self,
        map_id: &str,
        spec: &MarkerSetSpec,
    ) -> Result<(), MapServiceError> {
        self.check_available()?;
        let mut state = self
            .surfaces
            .get_mut(map_id)
            .ok_or_else(|| MapServiceError::UnknownMap(map_id.to_string()))?;
        state
            .sets
            .entry(spec.id.clone())
            .or_insert_with(|| MarkerSet {
                spec: spec.clone(),
                markers: BTreeMap::new(),
                updated_at: Utc::now(),
            });
        Ok(())
    }

    fn clear_markers(&self, map_id: &str, set_id: &str) -> Result<(), MapServiceError> {
        self.with_set(map_id, set_id, |set| set.markers.clear())
    }

    fn put_marker(
        &self,
        map_id: &str,
        set_id: &str,
        marker_id: &str,
        marker: Marker,
    ) -> Result<(), MapServiceError> {
        self.with_set(map_id, set_id, |set| {
            set.markers.insert(marker_id.to_string(), marker);
        })
    }
}

#[cfg(test)]
mod tests {
    use frontline_shared::HtmlMarker;

    use super::*;

    fn spec() -> MarkerSetSpec {
        MarkerSetSpec {
            id: "regions".to_string(),
            label: "Regions".to_string(),
            toggleable: true,
            default_hidden: false,
        }
    }

    fn label(text: &str) -> Marker {
        Marker::Html(HtmlMarker {
            label: text.to_string(),
            position: [0.0, 80.0, 0.0],
            html: text.to_string(),
            anchor: [0, 0],
            min_distance: 0.0,
            max_distance: 1_000.0,
            listed: false,
        })
    }

    #[test]
    fn unavailable_board_rejects_writes() {
        let board = MarkerBoard::new();
        board.add_surface("world", "world");
        assert_eq!(
            board.ensure_marker_set("world", &spec()),
            Err(MapServiceError::Unavailable)
        );
    }

    #[test]
    fn put_marker_overwrites_by_id() {
        let board = MarkerBoard::new();
        board.add_surface("world", "world");
        board.set_available(true);
        board.ensure_marker_set("world", &spec()).expect("create set");

        board
            .put_marker("world", "regions", "label-A1", label("first"))
            .expect("put");
        board
            .put_marker("world", "regions", "label-A1", label("second"))
            .expect("put again");

        assert_eq!(board.marker_count("world", "regions"), 1);
        assert_eq!(
            board
                .marker("world", "regions", "label-A1")
                .map(|marker| marker.label().to_string()),
            Some("second".to_string())
        );

        board.ensure_marker_set("world", &spec()).expect("reuse set");
        assert_eq!(board.marker_count("world", "regions"), 1);

        board.clear_markers("world", "regions").expect("clear");
        assert_eq!(board.marker_count("world", "regions"), 0);
    }

    #[test]
    fn unknown_map_and_set_are_reported() {
        let board = MarkerBoard::new();
        board.set_available(true);
        assert_eq!(
            board.ensure_marker_set("nether", &spec()),
            Err(MapServiceError::UnknownMap("nether".to_string()))
        );
        board.add_surface("world", "world");
        assert_eq!(
            board.put_marker("world", "missing", "m", label("x")),
            Err(MapServiceError::UnknownMarkerSet("missing".to_string()))
        );
    }

    #[test]
    fn surfaces_are_listed_sorted_with_their_world() {
        let board = MarkerBoard::new();
        board.add_surface("world_nether", "world_nether");
        board.add_surface("overworld", "World");
        assert_eq!(
            board.map_surfaces(),
            vec![
                MapSurface {
                    id: "overworld".to_string(),
                    world: "World".to_string(),
                },
                MapSurface {
                    id: "world_nether".to_string(),
                    world: "world_nether".to_string(),
                },
            ]
        );
    }
}
