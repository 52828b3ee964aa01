use thiserror::Error;

use crate::config::EconomyConfig;
use crate::economy::Economy;
use crate::events::CollapseCause;
use crate::grid::{Grid, TileKind, TilePos};
use crate::systems::Demand;

/// Why a placement request was refused. The city is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("({x}, {y}) is outside the map")]
    OutOfBounds { x: i32, y: i32 },
    #[error("({x}, {y}) is rubble and must be bulldozed first")]
    Rubble { x: i32, y: i32 },
    #[error("cost {cost} exceeds treasury {available}")]
    InsufficientFunds { cost: i64, available: i64 },
}

/// Things that happened during the current tick, consumed by the event monitor.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickLedger {
    pub collapsed: Vec<(TilePos, CollapseCause)>,
    pub fires_started: u32,
    pub fires_extinguished: u32,
    pub income: i64,
    pub upkeep: i64,
}

/// Everything the simulation mutates: the grid plus city-wide state.
#[derive(Debug, Clone)]
pub struct City {
    tick: u64,
    pub(crate) grid: Grid,
    pub(crate) economy: Economy,
    pub(crate) demand: Demand,
    pub(crate) ledger: TickLedger,
}

impl City {
    pub fn new(width: usize, height: usize, rules: EconomyConfig) -> Self {
        Self::from_parts(Grid::new(width, height), Economy::new(rules), 0)
    }

    pub(crate) fn from_parts(grid: Grid, economy: Economy, tick: u64) -> Self {
        Self {
            tick,
            grid,
            economy,
            demand: Demand::default(),
            ledger: TickLedger::default(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    pub fn economy_mut(&mut self) -> &mut Economy {
        &mut self.economy
    }

    pub fn demand(&self) -> Demand {
        self.demand
    }

    pub fn ledger(&self) -> &TickLedger {
        &self.ledger
    }

    pub fn total_population(&self) -> u64 {
        self.grid.total_population()
    }

    /// Pays for and places a tile. Placing grass bulldozes.
    pub fn place(&mut self, x: i32, y: i32, kind: TileKind) -> Result<i64, PlacementError> {
        let tile = self.grid.get(x, y).ok_or(PlacementError::OutOfBounds { x, y })?;
        if tile.is_burned && kind != TileKind::Grass {
            return Err(PlacementError::Rubble { x, y });
        }
        let cost = self.economy.placement_cost(kind);
        if !self.economy.deduct_cost(kind) {
            return Err(PlacementError::InsufficientFunds {
                cost,
                available: self.economy.money(),
            });
        }
        self.grid.set_type(x, y, kind);
        Ok(cost)
    }

    /// Adds or removes a power line. Adding is charged, removal is free.
    pub fn toggle_power_line(&mut self, x: i32, y: i32) -> Result<i64, PlacementError> {
        let tile = self.grid.get(x, y).ok_or(PlacementError::OutOfBounds { x, y })?;
        let cost = if tile.has_power_line {
            0
        } else {
            self.economy.power_line_cost()
        };
        if !self.economy.spend(cost) {
            return Err(PlacementError::InsufficientFunds {
                cost,
                available: self.economy.money(),
            });
        }
        self.grid.toggle_power_line(x, y);
        Ok(cost)
    }
}
