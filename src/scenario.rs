use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::{
    city::City,
    config::SimConfig,
    grid::{Grid, TileKind},
};

fn default_span() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default)]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default)]
    pub power_lines: Vec<Span>,
}

/// A rectangle of one tile kind, placed for free during setup.
#[derive(Debug, Clone, Deserialize)]
pub struct Placement {
    pub kind: TileKind,
    #[serde(flatten)]
    pub area: Span,
    #[serde(default)]
    pub population: Option<u8>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Span {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_span")]
    pub w: u32,
    #[serde(default = "default_span")]
    pub h: u32,
}

impl Span {
    fn cells(self) -> impl Iterator<Item = (i32, i32)> {
        (0..self.h as i32)
            .flat_map(move |dy| (0..self.w as i32).map(move |dx| (self.x + dx, self.y + dy)))
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    /// Lays out the starting city. Setup placements do not touch the treasury.
    pub fn build_city(&self) -> Result<City> {
        if self.width == 0 || self.height == 0 {
            bail!(
                "scenario '{}' has an empty {}x{} map",
                self.name,
                self.width,
                self.height
            );
        }
        if !Grid::fits(self.width, self.height) {
            bail!(
                "scenario '{}' map {}x{} exceeds {} tiles",
                self.name,
                self.width,
                self.height,
                Grid::MAX_TILES
            );
        }
        let mut city = City::new(self.width, self.height, self.config.economy.clone());
        let max_population = self.config.growth.max_population;

        for placement in &self.placements {
            if let Some(population) = placement.population {
                if !placement.kind.is_zone() && population > 0 {
                    bail!(
                        "{} at ({}, {}) cannot start with population",
                        placement.kind.as_str(),
                        placement.area.x,
                        placement.area.y
                    );
                }
            }
            for (x, y) in placement.area.cells() {
                if !city.grid_mut().set_type(x, y, placement.kind) {
                    bail!(
                        "placement of {} at ({x}, {y}) is outside the {}x{} map",
                        placement.kind.as_str(),
                        self.width,
                        self.height
                    );
                }
                if let Some(population) = placement.population {
                    if let Some(tile) = city.grid_mut().get_mut(x, y) {
                        tile.population = population.min(max_population);
                    }
                }
            }
        }

        for line in &self.power_lines {
            for (x, y) in line.cells() {
                let tile = city
                    .grid_mut()
                    .get_mut(x, y)
                    .with_context(|| format!("power line at ({x}, {y}) is off the map"))?;
                tile.has_power_line = true;
            }
        }

        Ok(city)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(120)
    }
}
