use std::any::Any;

use anyhow::Result;
use rand::Rng;

use crate::{
    city::City,
    config::GrowthConfig,
    engine::{System, SystemContext},
    grid::{Grid, TileKind},
    rng::SystemRng,
};

pub struct GrowthSystem;

impl GrowthSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GrowthSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for GrowthSystem {
    fn name(&self) -> &'static str {
        "growth"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        grow(&mut city.grid, &ctx.config.growth, rng);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

enum Outlook {
    Thriving,
    Stranded,
    Blackout,
}

/// One growth step per zone tile. Exactly one branch applies per tile:
/// powered with road access grows, powered without a road declines, and
/// unpowered declines at its own rate.
pub fn grow(grid: &mut Grid, rules: &GrowthConfig, rng: &mut impl Rng) {
    let zones: Vec<_> = grid
        .tiles()
        .filter(|tile| tile.kind.is_zone() && !tile.is_burned)
        .map(|tile| {
            let outlook = if !tile.is_powered {
                Outlook::Blackout
            } else if grid.has_adjacent(tile.pos, TileKind::Road) {
                Outlook::Thriving
            } else {
                Outlook::Stranded
            };
            (tile.pos, outlook)
        })
        .collect();

    for (pos, outlook) in zones {
        let Some(tile) = grid.tile_mut(pos) else {
            continue;
        };
        match outlook {
            Outlook::Thriving => {
                if rng.gen::<f64>() < rules.grow_chance {
                    tile.population = tile.population.saturating_add(1).min(rules.max_population);
                }
            }
            Outlook::Stranded => {
                if rng.gen::<f64>() < rules.no_road_decline_chance {
                    tile.population = tile.population.saturating_sub(1);
                }
            }
            Outlook::Blackout => {
                if rng.gen::<f64>() < rules.no_power_decline_chance {
                    tile.population = tile.population.saturating_sub(1);
                }
            }
        }
    }
}
