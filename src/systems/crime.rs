use std::any::Any;

use anyhow::Result;

use crate::{
    city::City,
    config::CrimeConfig,
    engine::{System, SystemContext},
    grid::{Grid, TileKind},
    rng::SystemRng,
};

pub struct CrimeSystem;

impl CrimeSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CrimeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for CrimeSystem {
    fn name(&self) -> &'static str {
        "crime"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        update_crime(&mut city.grid, &ctx.config.crime);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Police coverage per tile (row-major), each in `0.0..=1.0`. Stations add
/// a linear falloff `1 - d/R` to every tile within Euclidean radius `R`.
pub fn police_coverage(grid: &Grid, rules: &CrimeConfig) -> Vec<f64> {
    let mut coverage = vec![0.0; grid.tile_count()];
    if rules.police_radius <= 0 {
        return coverage;
    }
    let radius = f64::from(rules.police_radius);
    let width = grid.width();
    for station in grid.positions_of(TileKind::Police) {
        for pos in grid.window(station, rules.police_radius) {
            let distance = station.euclidean(pos);
            if distance > radius {
                continue;
            }
            let idx = pos.y as usize * width + pos.x as usize;
            coverage[idx] = (coverage[idx] + (1.0 - distance / radius)).min(1.0);
        }
    }
    coverage
}

/// Uncovered crime at each tile: populated crime sources within the source
/// radius, each weighted by population and divided by distance.
pub fn base_crime(grid: &Grid, rules: &CrimeConfig) -> Vec<f64> {
    let sources: Vec<_> = grid
        .tiles()
        .filter_map(|tile| {
            let rate = rules.base_rate.get(tile.kind);
            (rate > 0.0 && tile.population > 0)
                .then(|| (tile.pos, rate * f64::from(tile.population) / 10.0))
        })
        .collect();

    grid.tiles()
        .map(|tile| {
            let total: f64 = sources
                .iter()
                .filter(|(source, _)| {
                    (source.x - tile.pos.x).abs() <= rules.source_radius
                        && (source.y - tile.pos.y).abs() <= rules.source_radius
                })
                .map(|(source, weight)| weight / tile.pos.euclidean(*source).max(1.0))
                .sum();
            total.min(1.0)
        })
        .collect()
}

/// Recomputes every tile's crime level from scratch.
pub fn update_crime(grid: &mut Grid, rules: &CrimeConfig) {
    let coverage = police_coverage(grid, rules);
    let base = base_crime(grid, rules);
    for (idx, tile) in grid.tiles_mut().enumerate() {
        let level = base[idx] * (1.0 - coverage[idx] * rules.max_suppression);
        tile.crime_level = level.clamp(0.0, 1.0);
    }
}
