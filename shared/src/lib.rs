pub mod colors;
pub mod grid;
pub mod markers;
pub mod names;
pub mod team;

pub use grid::*;
pub use markers::*;
pub use team::*;
