use std::any::Any;
use std::collections::VecDeque;

use anyhow::Result;

use crate::{
    city::City,
    engine::{System, SystemContext},
    grid::{Grid, Tile, TileKind},
    rng::SystemRng,
};

pub struct PowerSystem;

impl PowerSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PowerSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for PowerSystem {
    fn name(&self) -> &'static str {
        "power"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext<'_>,
        city: &mut City,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        propagate(&mut city.grid);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Relays power onward: a power-line overlay, a plant, or any zone.
fn conducts(tile: &Tile) -> bool {
    tile.has_power_line
        || matches!(
            tile.kind,
            TileKind::PowerPlant | TileKind::Residential | TileKind::Commercial | TileKind::Industrial
        )
}

/// Recomputes `is_powered` for every tile by breadth-first search from all
/// power plants. Roads take power but never pass it on.
pub fn propagate(grid: &mut Grid) {
    for tile in grid.tiles_mut() {
        tile.is_powered = false;
    }

    let width = grid.width();
    let index = |x: i32, y: i32| y as usize * width + x as usize;
    let mut visited = vec![false; grid.tile_count()];
    let mut queue = VecDeque::new();

    for pos in grid.positions_of(TileKind::PowerPlant) {
        visited[index(pos.x, pos.y)] = true;
        if let Some(tile) = grid.tile_mut(pos) {
            tile.is_powered = true;
        }
        queue.push_back(pos);
    }

    while let Some(pos) = queue.pop_front() {
        let neighbors: Vec<_> = grid.neighbors(pos).collect();
        for next in neighbors {
            let idx = index(next.x, next.y);
            if visited[idx] {
                continue;
            }
            let Some(tile) = grid.tile_mut(next) else {
                continue;
            };
            if conducts(tile) {
                tile.is_powered = true;
                visited[idx] = true;
                queue.push_back(next);
            } else if tile.kind == TileKind::Road {
                tile.is_powered = true;
            }
        }
    }
}
