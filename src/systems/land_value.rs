use std::any::Any;

use anyhow::Result;

use crate::{
    city::City,
    config::LandValueConfig,
    engine::{System, SystemContext},
    grid::{Grid, TilePos},
    rng::SystemRng,
};

pub struct LandValueSystem;

impl LandValueSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LandValueSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for LandValueSystem {
    fn name(&self) -> &'static str {
        "land_value"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        update_land_value(&mut city.grid, &ctx.config.land_value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sum of neighbor modifiers within the radius, each divided by distance.
/// The tile itself is excluded.
fn neighbor_modifier(grid: &Grid, pos: TilePos, rules: &LandValueConfig) -> f64 {
    grid.window(pos, rules.radius)
        .filter(|&other| other != pos)
        .filter_map(|other| {
            let modifier = rules.modifier.get(grid.tile(other)?.kind);
            (modifier != 0.0).then(|| modifier / pos.euclidean(other).max(1.0))
        })
        .sum()
}

/// Recomputes land value for every tile. Reads this tick's crime levels.
pub fn update_land_value(grid: &mut Grid, rules: &LandValueConfig) {
    let values: Vec<u8> = grid
        .tiles()
        .map(|tile| {
            let value = rules.base_value + neighbor_modifier(grid, tile.pos, rules)
                - tile.crime_level * rules.crime_penalty;
            // Truncate toward zero before clamping.
            (value.trunc() as i64).clamp(0, 100) as u8
        })
        .collect();
    for (tile, value) in grid.tiles_mut().zip(values) {
        tile.land_value = value;
    }
}
