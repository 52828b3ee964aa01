use std::any::Any;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    city::{City, TickLedger},
    config::DecayConfig,
    economy::{Economy, Service},
    engine::{System, SystemContext},
    events::CollapseCause,
    grid::{Grid, Tile},
    rng::SystemRng,
};

/// Operational state of a structure, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingStatus {
    Collapsed,
    NonFunctional,
    Degraded,
    Functional,
}

pub fn building_status(tile: &Tile, rules: &DecayConfig) -> BuildingStatus {
    if tile.is_burned || tile.building_health <= 0.0 {
        BuildingStatus::Collapsed
    } else if tile.building_health < rules.functional_threshold {
        BuildingStatus::NonFunctional
    } else if tile.building_health < rules.critical_threshold {
        BuildingStatus::Degraded
    } else {
        BuildingStatus::Functional
    }
}

pub fn is_functional(tile: &Tile, rules: &DecayConfig) -> bool {
    !tile.is_burned && tile.building_health >= rules.functional_threshold
}

/// Service funding levels read from the treasury at the start of an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Funding {
    pub police: f64,
    pub fire: f64,
}

impl Funding {
    pub fn from_economy(economy: &Economy) -> Self {
        Self {
            police: economy.funding(Service::Police),
            fire: economy.funding(Service::Fire),
        }
    }
}

pub struct DecaySystem;

impl DecaySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DecaySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DecaySystem {
    fn name(&self) -> &'static str {
        "decay"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let funding = Funding::from_economy(&city.economy);
        apply(&mut city.grid, funding, &ctx.config.decay, &mut city.ledger);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decay_rate(tile: &Tile, funding: Funding, rules: &DecayConfig) -> f64 {
    let mut rate = 0.0;
    if funding.police < 1.0 && tile.crime_level > rules.crime_threshold {
        rate += rules.base_rate * (1.0 - funding.police) * tile.crime_level;
    }
    if funding.fire < 1.0 {
        rate += rules.base_rate * (1.0 - funding.fire) * rules.fire_underfunding_factor;
    }
    rate
}

/// Erodes underfunded buildings, repairs funded ones, then collapses any
/// structure whose health ran out.
pub fn apply(grid: &mut Grid, funding: Funding, rules: &DecayConfig, ledger: &mut TickLedger) {
    for tile in grid
        .tiles_mut()
        .filter(|tile| !tile.is_burned && tile.kind.is_building())
    {
        let rate = decay_rate(tile, funding, rules);
        if rate > 0.0 {
            tile.building_health = (tile.building_health - rate).max(0.0);
        }
    }

    if funding.police >= rules.repair_funding_floor && funding.fire >= rules.repair_funding_floor {
        let repair = rules.repair_rate * funding.police.min(funding.fire);
        for tile in grid.tiles_mut().filter(|tile| {
            !tile.is_burned && tile.building_health > 0.0 && tile.building_health < 1.0
        }) {
            tile.building_health = (tile.building_health + repair).min(1.0);
        }
    }

    let mut collapsed = 0;
    for tile in grid
        .tiles_mut()
        .filter(|tile| !tile.is_burned && tile.kind.is_building() && tile.building_health <= 0.0)
    {
        tile.collapse();
        ledger.collapsed.push((tile.pos, CollapseCause::Decay));
        collapsed += 1;
    }
    if collapsed > 0 {
        debug!(collapsed, "buildings collapsed from neglect");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{TileKind, TilePos};

    const FULL: Funding = Funding {
        police: 1.0,
        fire: 1.0,
    };
    const NONE: Funding = Funding {
        police: 0.0,
        fire: 0.0,
    };

    fn building(grid: &mut Grid, health: f64, crime: f64) {
        grid.set_type(1, 1, TileKind::Residential);
        let tile = grid.get_mut(1, 1).unwrap();
        tile.building_health = health;
        tile.crime_level = crime;
        tile.population = 5;
    }

    fn health(grid: &Grid) -> f64 {
        grid.get(1, 1).unwrap().building_health
    }

    #[test]
    fn full_funding_never_decays() {
        let mut grid = Grid::new(3, 3);
        building(&mut grid, 1.0, 0.9);
        apply(&mut grid, FULL, &DecayConfig::default(), &mut TickLedger::default());
        assert_eq!(health(&grid), 1.0);
    }

    #[test]
    fn unfunded_services_erode_health() {
        let mut grid = Grid::new(3, 3);
        building(&mut grid, 1.0, 0.8);
        apply(&mut grid, NONE, &DecayConfig::default(), &mut TickLedger::default());
        let expected = 1.0 - (0.001 * 0.8 + 0.001 * 0.5);
        assert!((health(&grid) - expected).abs() < 1e-12);
    }

    #[test]
    fn low_crime_ignores_police_funding() {
        let mut grid = Grid::new(3, 3);
        building(&mut grid, 1.0, 0.3);
        let funding = Funding {
            police: 0.0,
            fire: 1.0,
        };
        apply(&mut grid, funding, &DecayConfig::default(), &mut TickLedger::default());
        assert_eq!(health(&grid), 1.0);
    }

    #[test]
    fn funded_services_repair() {
        let mut grid = Grid::new(3, 3);
        building(&mut grid, 0.5, 0.0);
        apply(&mut grid, FULL, &DecayConfig::default(), &mut TickLedger::default());
        assert!((health(&grid) - 0.505).abs() < 1e-12);
    }

    #[test]
    fn repair_needs_both_services_half_funded() {
        let mut grid = Grid::new(3, 3);
        building(&mut grid, 0.5, 0.0);
        let funding = Funding {
            police: 1.0,
            fire: 0.4,
        };
        apply(&mut grid, funding, &DecayConfig::default(), &mut TickLedger::default());
        assert!(health(&grid) < 0.5);
    }

    #[test]
    fn exhausted_buildings_collapse() {
        let mut grid = Grid::new(3, 3);
        building(&mut grid, 0.0002, 0.9);
        let mut ledger = TickLedger::default();
        apply(&mut grid, NONE, &DecayConfig::default(), &mut ledger);

        let tile = grid.get(1, 1).unwrap();
        assert!(tile.is_burned);
        assert_eq!(tile.population, 0);
        assert_eq!(tile.building_health, 0.0);
        assert_eq!(ledger.collapsed, vec![(TilePos::new(1, 1), CollapseCause::Decay)]);
    }

    #[test]
    fn service_buildings_collapse_like_zones() {
        let mut grid = Grid::new(3, 1);
        grid.set_type(0, 0, TileKind::PowerPlant);
        grid.set_type(2, 0, TileKind::FireStation);
        for x in [0, 2] {
            let tile = grid.get_mut(x, 0).unwrap();
            tile.building_health = 0.0002;
            tile.crime_level = 0.9;
        }
        let mut ledger = TickLedger::default();
        apply(&mut grid, NONE, &DecayConfig::default(), &mut ledger);

        assert!(grid.get(0, 0).unwrap().is_burned);
        assert!(grid.get(2, 0).unwrap().is_burned);
        assert_eq!(grid.get(0, 0).unwrap().kind, TileKind::PowerPlant);
        assert_eq!(ledger.collapsed.len(), 2);
    }

    #[test]
    fn roads_and_grass_do_not_decay() {
        let mut grid = Grid::new(3, 3);
        grid.set_type(0, 0, TileKind::Road);
        apply(&mut grid, NONE, &DecayConfig::default(), &mut TickLedger::default());
        assert!(grid.tiles().all(|tile| tile.building_health == 1.0));
    }

    #[test]
    fn status_classification() {
        let rules = DecayConfig::default();
        let mut tile = Tile::new(TilePos::new(0, 0));
        tile.kind = TileKind::Commercial;

        tile.building_health = 0.9;
        assert_eq!(building_status(&tile, &rules), BuildingStatus::Functional);
        tile.building_health = 0.4;
        assert_eq!(building_status(&tile, &rules), BuildingStatus::Degraded);
        assert!(is_functional(&tile, &rules));
        tile.building_health = 0.1;
        assert_eq!(building_status(&tile, &rules), BuildingStatus::NonFunctional);
        assert!(!is_functional(&tile, &rules));
        tile.building_health = 0.0;
        assert_eq!(building_status(&tile, &rules), BuildingStatus::Collapsed);
        tile.building_health = 0.8;
        tile.is_burned = true;
        assert_eq!(building_status(&tile, &rules), BuildingStatus::Collapsed);
    }
}
