use std::any::Any;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    city::City,
    engine::{System, SystemContext},
    grid::{Grid, TileKind},
    rng::SystemRng,
};

/// City-wide RCI demand, each index in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub residential: f64,
    pub commercial: f64,
    pub industrial: f64,
}

/// Population and zone counts per zone kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneCensus {
    pub residential_pop: u64,
    pub commercial_pop: u64,
    pub industrial_pop: u64,
    pub residential_zones: u64,
    pub commercial_zones: u64,
    pub industrial_zones: u64,
}

impl ZoneCensus {
    pub fn count(grid: &Grid) -> Self {
        let mut census = Self::default();
        for tile in grid.tiles() {
            let population = u64::from(tile.population);
            match tile.kind {
                TileKind::Residential => {
                    census.residential_pop += population;
                    census.residential_zones += 1;
                }
                TileKind::Commercial => {
                    census.commercial_pop += population;
                    census.commercial_zones += 1;
                }
                TileKind::Industrial => {
                    census.industrial_pop += population;
                    census.industrial_zones += 1;
                }
                _ => {}
            }
        }
        census
    }

    /// Ratio-driven demand, then the empty-city bootstrap overrides.
    pub fn demand(&self) -> Demand {
        let residents = self.residential_pop as f64;
        let shops = self.commercial_pop as f64;
        let factories = self.industrial_pop as f64;

        let mut residential = if self.residential_pop == 0 {
            0.5
        } else {
            ((shops + factories) / residents - 1.0).clamp(-1.0, 1.0)
        };
        let mut commercial = if self.residential_pop == 0 {
            -0.5
        } else {
            ((0.3 - shops / residents) * 3.0).clamp(-1.0, 1.0)
        };
        let mut industrial = if self.commercial_pop == 0 {
            0.3
        } else {
            ((0.5 - factories / shops) * 2.0).clamp(-1.0, 1.0)
        };

        if self.residential_zones == 0 {
            residential = 1.0;
        }
        if self.commercial_zones == 0 && self.residential_pop > 5 {
            commercial = 0.8;
        }
        if self.industrial_zones == 0 && self.commercial_pop > 3 {
            industrial = 0.8;
        }

        Demand {
            residential,
            commercial,
            industrial,
        }
    }
}

pub fn compute(grid: &Grid) -> Demand {
    ZoneCensus::count(grid).demand()
}

pub struct DemandSystem;

impl DemandSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DemandSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DemandSystem {
    fn name(&self) -> &'static str {
        "demand"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext<'_>,
        city: &mut City,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        city.demand = compute(&city.grid);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
