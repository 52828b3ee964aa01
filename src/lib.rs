pub mod city;
pub mod config;
pub mod economy;
pub mod engine;
pub mod events;
pub mod grid;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod systems;

pub use city::{City, PlacementError};
pub use config::SimConfig;
pub use engine::{Engine, EngineBuilder, EngineSettings, TickSummary};
pub use events::CityEvent;
pub use grid::{Grid, Tile, TileKind, TilePos};
pub use scenario::Scenario;
