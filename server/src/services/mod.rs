pub mod marker_board;
pub mod region_status;
pub mod render_sync;
pub mod round_store;
pub mod team_registry;
