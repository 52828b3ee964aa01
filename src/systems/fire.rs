use std::any::Any;
use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rand::Rng;
use tracing::debug;

use crate::{
    city::{City, TickLedger},
    config::FireConfig,
    engine::{System, SystemContext},
    events::CollapseCause,
    grid::{Grid, Tile, TileKind, TilePos},
    rng::SystemRng,
};

/// Fire ignition, spread, damage and extinguishing.
///
/// Owns the burn-duration counter of every burning tile and a cache of fire
/// station positions. Both are rebuilt at the start of each update, so edits
/// made to the grid between ticks are always picked up.
#[derive(Debug, Default)]
pub struct FireSystem {
    burn_ticks: HashMap<TilePos, u32>,
    stations: Vec<TilePos>,
    active_fires: Vec<TilePos>,
}

impl FireSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire_count(&self) -> usize {
        self.active_fires.len()
    }

    pub fn active_fires(&self) -> &[TilePos] {
        &self.active_fires
    }

    /// Consecutive ticks the tile has been burning.
    pub fn burn_ticks(&self, pos: TilePos) -> Option<u32> {
        self.burn_ticks.get(&pos).copied()
    }

    pub fn is_covered(&self, pos: TilePos, rules: &FireConfig) -> bool {
        self.stations
            .iter()
            .any(|station| station.manhattan(pos) <= rules.station_radius)
    }

    /// Every in-bounds tile within Manhattan reach of a fire station.
    pub fn coverage_tiles(&self, grid: &Grid, rules: &FireConfig) -> HashSet<TilePos> {
        self.stations
            .iter()
            .flat_map(|&station| {
                grid.window(station, rules.station_radius)
                    .filter(move |pos| station.manhattan(*pos) <= rules.station_radius)
            })
            .collect()
    }

    /// Sets a tile alight. Returns false if it is already burning, rubble,
    /// or out of bounds.
    pub fn ignite(&mut self, grid: &mut Grid, pos: TilePos, rules: &FireConfig) -> bool {
        match grid.tile_mut(pos) {
            Some(tile) if !tile.is_on_fire && !tile.is_burned => {
                tile.is_on_fire = true;
                tile.fire_intensity = rules.start_intensity;
                self.burn_ticks.insert(pos, 0);
                self.active_fires.push(pos);
                true
            }
            _ => false,
        }
    }

    pub fn update(
        &mut self,
        grid: &mut Grid,
        rules: &FireConfig,
        rng: &mut impl Rng,
        ledger: &mut TickLedger,
    ) {
        self.refresh_caches(grid);
        ledger.fires_started += self.try_ignite(grid, rules, rng);
        ledger.fires_started += self.spread(grid, rules, rng);
        self.apply_damage(grid, rules, ledger);
        ledger.fires_extinguished += self.try_extinguish(grid, rules);
        self.active_fires = burning(grid);
    }

    /// Drops every burn counter and rebuilds the caches from `grid`.
    /// Fires already burning there start counting from zero.
    pub fn reset(&mut self, grid: &Grid) {
        self.burn_ticks.clear();
        self.refresh_caches(grid);
    }

    fn refresh_caches(&mut self, grid: &Grid) {
        self.stations = grid.positions_of(TileKind::FireStation);
        self.burn_ticks
            .retain(|pos, _| grid.tile(*pos).is_some_and(|tile| tile.is_on_fire));
        self.active_fires = burning(grid);
    }

    fn try_ignite(&mut self, grid: &mut Grid, rules: &FireConfig, rng: &mut impl Rng) -> u32 {
        let candidates: Vec<_> = grid
            .tiles()
            .filter(|tile| !tile.is_on_fire && !tile.is_burned)
            .filter_map(|tile| {
                let chance = rules.ignition_chance.get(tile.kind)
                    + tile.crime_level * rules.arson_chance;
                (chance > 0.0).then_some((tile.pos, chance))
            })
            .collect();

        let mut started = 0;
        for (pos, chance) in candidates {
            if rng.gen::<f64>() < chance && self.ignite(grid, pos, rules) {
                debug!(x = pos.x, y = pos.y, "fire broke out");
                started += 1;
            }
        }
        started
    }

    fn spread_chance(source: &Tile, target: &Tile, rules: &FireConfig) -> f64 {
        let flammability = rules.flammability.get(target.kind);
        if flammability <= 0.0 {
            return 0.0;
        }
        rules.spread_base_chance * flammability
            + source.fire_intensity * rules.spread_intensity_multiplier
    }

    /// One hop only: new fires are collected during the scan and lit after it.
    fn spread(&mut self, grid: &mut Grid, rules: &FireConfig, rng: &mut impl Rng) -> u32 {
        let mut new_fires = Vec::new();
        for source in grid.tiles().filter(|tile| tile.is_on_fire) {
            for pos in grid.neighbors(source.pos) {
                let Some(target) = grid.tile(pos) else {
                    continue;
                };
                if target.is_on_fire || target.is_burned {
                    continue;
                }
                let mut chance = Self::spread_chance(source, target, rules);
                if self.is_covered(pos, rules) {
                    chance *= rules.covered_spread_factor;
                }
                if chance > 0.0 && rng.gen::<f64>() < chance {
                    new_fires.push(pos);
                }
            }
        }

        let mut started = 0;
        for pos in new_fires {
            if self.ignite(grid, pos, rules) {
                started += 1;
            }
        }
        started
    }

    fn apply_damage(&mut self, grid: &mut Grid, rules: &FireConfig, ledger: &mut TickLedger) {
        for tile in grid.tiles_mut().filter(|tile| tile.is_on_fire) {
            tile.fire_intensity = (tile.fire_intensity + rules.intensity_growth).min(1.0);
            tile.building_health -= rules.damage_per_tick * tile.fire_intensity;
            if tile.building_health <= 0.0 {
                tile.collapse();
                self.burn_ticks.remove(&tile.pos);
                ledger.collapsed.push((tile.pos, CollapseCause::Fire));
            }
        }
    }

    fn try_extinguish(&mut self, grid: &mut Grid, rules: &FireConfig) -> u32 {
        let mut put_out = Vec::new();
        for tile in grid.tiles().filter(|tile| tile.is_on_fire) {
            let ticks = self.burn_ticks.entry(tile.pos).or_insert(0);
            *ticks += 1;
            let covered = self
                .stations
                .iter()
                .any(|station| station.manhattan(tile.pos) <= rules.station_radius);
            let threshold = if covered {
                Some(rules.extinguish_ticks_covered)
            } else {
                rules.extinguish_ticks_uncovered
            };
            if threshold.is_some_and(|limit| *ticks >= limit) {
                put_out.push(tile.pos);
            }
        }

        for pos in &put_out {
            if let Some(tile) = grid.tile_mut(*pos) {
                tile.is_on_fire = false;
                tile.fire_intensity = 0.0;
            }
            self.burn_ticks.remove(pos);
        }
        put_out.len() as u32
    }
}

fn burning(grid: &Grid) -> Vec<TilePos> {
    grid.tiles()
        .filter(|tile| tile.is_on_fire)
        .map(|tile| tile.pos)
        .collect()
}

impl System for FireSystem {
    fn name(&self) -> &'static str {
        "fire"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        self.update(&mut city.grid, &ctx.config.fire, rng, &mut city.ledger);
        Ok(())
    }

    fn reset_derived(&mut self, city: &City) {
        self.reset(city.grid());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// Every `gen::<f64>()` returns the same value.
    struct FixedDraw(u64);

    impl FixedDraw {
        fn at(value: f64) -> Self {
            Self(((value * (1u64 << 53) as f64) as u64) << 11)
        }
    }

    impl RngCore for FixedDraw {
        fn next_u32(&mut self) -> u32 {
            (self.0 >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let bytes = self.0.to_le_bytes();
            for chunk in dest.chunks_mut(8) {
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    /// No spontaneous ignition and no spread.
    fn quiet() -> FireConfig {
        let mut rules = FireConfig::default();
        rules.ignition_chance.industrial = 0.0;
        rules.ignition_chance.power_plant = 0.0;
        rules.arson_chance = 0.0;
        rules.spread_base_chance = 0.0;
        rules.spread_intensity_multiplier = 0.0;
        rules
    }

    fn step(fire: &mut FireSystem, grid: &mut Grid, rules: &FireConfig, rng: &mut ChaCha8Rng) {
        let mut ledger = TickLedger::default();
        fire.update(grid, rules, rng, &mut ledger);
    }

    fn row_of_houses(len: i32) -> Grid {
        let mut grid = Grid::new(len as usize, 1);
        for x in 0..len {
            grid.set_type(x, 0, TileKind::Residential);
        }
        grid
    }

    #[test]
    fn ignition_sets_start_state() {
        let rules = quiet();
        let mut grid = row_of_houses(3);
        let mut fire = FireSystem::new();

        assert!(fire.ignite(&mut grid, TilePos::new(1, 0), &rules));
        assert!(!fire.ignite(&mut grid, TilePos::new(1, 0), &rules));
        assert!(!fire.ignite(&mut grid, TilePos::new(9, 0), &rules));

        let tile = grid.get(1, 0).unwrap();
        assert!(tile.is_on_fire);
        assert_eq!(tile.fire_intensity, 0.3);
        assert_eq!(fire.burn_ticks(TilePos::new(1, 0)), Some(0));
    }

    #[test]
    fn industry_ignites_spontaneously() {
        let mut rules = quiet();
        rules.ignition_chance.industrial = 1.0;
        let mut grid = Grid::new(3, 1);
        grid.set_type(0, 0, TileKind::Residential);
        grid.set_type(1, 0, TileKind::Industrial);
        grid.set_type(2, 0, TileKind::PowerPlant);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(21);

        fire.refresh_caches(&grid);
        assert_eq!(fire.try_ignite(&mut grid, &rules, &mut rng), 1);

        let tile = grid.get(1, 0).unwrap();
        assert!(tile.is_on_fire);
        assert_eq!(tile.fire_intensity, 0.3);
        assert_eq!(fire.burn_ticks(TilePos::new(1, 0)), Some(0));
        assert!(!grid.get(0, 0).unwrap().is_on_fire);
        assert!(!grid.get(2, 0).unwrap().is_on_fire);
    }

    #[test]
    fn arson_needs_crime() {
        let mut rules = quiet();
        rules.arson_chance = 1.0;
        let mut grid = row_of_houses(3);
        grid.get_mut(0, 0).unwrap().crime_level = 0.5;
        let mut fire = FireSystem::new();
        fire.refresh_caches(&grid);

        // Draw 0.75 is above the 0.5 arson chance of the crime-ridden house.
        assert_eq!(fire.try_ignite(&mut grid, &rules, &mut FixedDraw::at(0.75)), 0);

        assert_eq!(fire.try_ignite(&mut grid, &rules, &mut FixedDraw::at(0.25)), 1);
        assert!(grid.get(0, 0).unwrap().is_on_fire);
        assert!(!grid.get(1, 0).unwrap().is_on_fire);
        assert!(!grid.get(2, 0).unwrap().is_on_fire);
    }

    #[test]
    fn station_coverage_halves_spread() {
        let mut rules = quiet();
        rules.spread_intensity_multiplier = 1.0;
        rules.station_radius = 2;
        let layout = || {
            let mut grid = row_of_houses(12);
            grid.set_type(0, 0, TileKind::FireStation);
            grid
        };
        let light = |fire: &mut FireSystem, grid: &mut Grid| {
            for x in [1, 8] {
                fire.ignite(grid, TilePos::new(x, 0), &rules);
                grid.get_mut(x, 0).unwrap().fire_intensity = 1.0;
            }
            fire.refresh_caches(grid);
        };

        // Uncovered chance is 1.0, covered chance 0.5.
        let mut grid = layout();
        let mut fire = FireSystem::new();
        light(&mut fire, &mut grid);
        assert_eq!(fire.spread(&mut grid, &rules, &mut FixedDraw::at(0.75)), 2);
        assert!(grid.get(7, 0).unwrap().is_on_fire);
        assert!(grid.get(9, 0).unwrap().is_on_fire);
        assert!(!grid.get(0, 0).unwrap().is_on_fire);
        assert!(!grid.get(2, 0).unwrap().is_on_fire);

        let mut grid = layout();
        let mut fire = FireSystem::new();
        light(&mut fire, &mut grid);
        assert_eq!(fire.spread(&mut grid, &rules, &mut FixedDraw::at(0.25)), 4);
        assert!(grid.get(0, 0).unwrap().is_on_fire);
        assert!(grid.get(2, 0).unwrap().is_on_fire);
    }

    #[test]
    fn reset_forgets_burn_counters() {
        let rules = quiet();
        let mut grid = row_of_houses(4);
        grid.set_type(3, 0, TileKind::FireStation);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let pos = TilePos::new(0, 0);
        fire.ignite(&mut grid, pos, &rules);
        step(&mut fire, &mut grid, &rules, &mut rng);
        step(&mut fire, &mut grid, &rules, &mut rng);
        assert_eq!(fire.burn_ticks(pos), Some(2));

        fire.reset(&grid);
        assert_eq!(fire.burn_ticks(pos), None);
        assert_eq!(fire.fire_count(), 1);

        step(&mut fire, &mut grid, &rules, &mut rng);
        assert!(grid.get(0, 0).unwrap().is_on_fire);
        assert_eq!(fire.burn_ticks(pos), Some(1));
    }

    #[test]
    fn spread_is_one_hop_per_tick() {
        let mut rules = quiet();
        rules.spread_base_chance = 2.0;
        let mut grid = row_of_houses(4);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        fire.ignite(&mut grid, TilePos::new(0, 0), &rules);

        step(&mut fire, &mut grid, &rules, &mut rng);

        assert!(grid.get(1, 0).unwrap().is_on_fire);
        assert!(!grid.get(2, 0).unwrap().is_on_fire);
        assert_eq!(fire.fire_count(), 2);
    }

    #[test]
    fn roads_never_catch_spreading_fire() {
        let mut rules = quiet();
        rules.spread_base_chance = 2.0;
        rules.spread_intensity_multiplier = 5.0;
        let mut grid = Grid::new(3, 1);
        grid.set_type(0, 0, TileKind::Residential);
        grid.set_type(1, 0, TileKind::Road);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        fire.ignite(&mut grid, TilePos::new(0, 0), &rules);

        for _ in 0..10 {
            step(&mut fire, &mut grid, &rules, &mut rng);
        }

        assert!(!grid.get(1, 0).unwrap().is_on_fire);
    }

    #[test]
    fn destroyed_buildings_become_rubble() {
        let mut rules = quiet();
        rules.damage_per_tick = 10.0;
        let mut grid = row_of_houses(2);
        grid.get_mut(0, 0).unwrap().population = 6;
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        fire.ignite(&mut grid, TilePos::new(0, 0), &rules);

        let mut ledger = TickLedger::default();
        fire.update(&mut grid, &rules, &mut rng, &mut ledger);

        let tile = grid.get(0, 0).unwrap();
        assert!(tile.is_burned);
        assert!(!tile.is_on_fire);
        assert_eq!(tile.building_health, 0.0);
        assert_eq!(tile.fire_intensity, 0.0);
        assert_eq!(tile.population, 0);
        assert_eq!(fire.burn_ticks(TilePos::new(0, 0)), None);
        assert_eq!(fire.fire_count(), 0);
        assert_eq!(ledger.collapsed, vec![(TilePos::new(0, 0), CollapseCause::Fire)]);
    }

    #[test]
    fn covered_fires_are_put_out_after_threshold() {
        let rules = quiet();
        let mut grid = row_of_houses(6);
        grid.set_type(5, 0, TileKind::FireStation);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        fire.ignite(&mut grid, TilePos::new(0, 0), &rules);

        step(&mut fire, &mut grid, &rules, &mut rng);
        step(&mut fire, &mut grid, &rules, &mut rng);
        assert!(grid.get(0, 0).unwrap().is_on_fire);
        assert_eq!(fire.burn_ticks(TilePos::new(0, 0)), Some(2));

        step(&mut fire, &mut grid, &rules, &mut rng);
        let tile = grid.get(0, 0).unwrap();
        assert!(!tile.is_on_fire);
        assert_eq!(tile.fire_intensity, 0.0);
        assert!(tile.building_health < 1.0);
        assert!(!tile.is_burned);
    }

    #[test]
    fn uncovered_fires_burn_until_destroyed() {
        let rules = quiet();
        let mut grid = row_of_houses(3);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(15);
        fire.ignite(&mut grid, TilePos::new(1, 0), &rules);

        for _ in 0..20 {
            step(&mut fire, &mut grid, &rules, &mut rng);
        }
        assert!(grid.get(1, 0).unwrap().is_on_fire);

        for _ in 0..100 {
            step(&mut fire, &mut grid, &rules, &mut rng);
        }
        let tile = grid.get(1, 0).unwrap();
        assert!(tile.is_burned);
        assert!(!tile.is_on_fire);
    }

    #[test]
    fn uncovered_threshold_can_be_enabled() {
        let mut rules = quiet();
        rules.extinguish_ticks_uncovered = Some(6);
        let mut grid = row_of_houses(3);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(16);
        fire.ignite(&mut grid, TilePos::new(1, 0), &rules);

        for _ in 0..5 {
            step(&mut fire, &mut grid, &rules, &mut rng);
        }
        assert!(grid.get(1, 0).unwrap().is_on_fire);
        step(&mut fire, &mut grid, &rules, &mut rng);
        assert!(!grid.get(1, 0).unwrap().is_on_fire);
    }

    #[test]
    fn bulldozed_fires_are_forgotten() {
        let rules = quiet();
        let mut grid = row_of_houses(3);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        fire.ignite(&mut grid, TilePos::new(2, 0), &rules);
        step(&mut fire, &mut grid, &rules, &mut rng);

        grid.set_type(2, 0, TileKind::Grass);
        step(&mut fire, &mut grid, &rules, &mut rng);

        assert_eq!(fire.burn_ticks(TilePos::new(2, 0)), None);
        assert_eq!(fire.fire_count(), 0);
    }

    #[test]
    fn coverage_uses_manhattan_distance() {
        let rules = FireConfig::default();
        let mut grid = Grid::new(30, 30);
        grid.set_type(15, 15, TileKind::FireStation);
        let mut fire = FireSystem::new();
        let mut rng = ChaCha8Rng::seed_from_u64(18);
        step(&mut fire, &mut grid, &quiet(), &mut rng);

        let covered = fire.coverage_tiles(&grid, &rules);
        // Diamond of radius 8: 2r^2 + 2r + 1 tiles.
        assert_eq!(covered.len(), 145);
        assert!(covered.contains(&TilePos::new(23, 15)));
        assert!(covered.contains(&TilePos::new(19, 19)));
        assert!(!covered.contains(&TilePos::new(20, 19)));
        assert!(fire.is_covered(TilePos::new(11, 11), &rules));
    }

    #[test]
    fn spread_chance_combines_flammability_and_intensity() {
        let rules = FireConfig::default();
        let mut grid = row_of_houses(2);
        let source = {
            let tile = grid.get_mut(0, 0).unwrap();
            tile.is_on_fire = true;
            tile.fire_intensity = 0.5;
            tile.clone()
        };
        let target = grid.get(1, 0).unwrap().clone();

        let chance = FireSystem::spread_chance(&source, &target, &rules);
        assert!((chance - (0.03 * 0.8 + 0.5 * 0.1)).abs() < 1e-12);
    }
}
