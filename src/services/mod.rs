//! Service implementations for the megaverse API.
//!
//! `ObjectService` places and removes objects; `MapService` reads the goal
//! and the current state of the grid.

mod map;
mod objects;

pub use map::MapService;
pub use objects::ObjectService;
