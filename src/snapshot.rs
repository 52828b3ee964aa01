use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    city::City,
    config::SimConfig,
    economy::{Economy, Service},
    grid::{Grid, TileKind, TilePos},
};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("snapshot rejected: {0}")]
    Invalid(String),
}

fn default_funding() -> f64 {
    1.0
}

/// Persisted state of one tile. Derived fields (power, crime, land value)
/// are recomputed after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    pub kind: TileKind,
    #[serde(default)]
    pub has_power_line: bool,
    #[serde(default)]
    pub population: u8,
    #[serde(default)]
    pub is_on_fire: bool,
    #[serde(default)]
    pub fire_intensity: f64,
    #[serde(default)]
    pub is_burned: bool,
    #[serde(default = "default_funding")]
    pub building_health: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyRecord {
    pub money: i64,
    pub tax_rate: u8,
    #[serde(default = "default_funding")]
    pub police_funding: f64,
    #[serde(default = "default_funding")]
    pub fire_funding: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub format_version: u32,
    pub tick: u64,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    pub width: usize,
    pub height: usize,
    /// Only tiles that differ from untouched grass.
    pub tiles: Vec<TileRecord>,
    pub economy: EconomyRecord,
}

fn invalid(reason: impl Into<String>) -> SnapshotError {
    SnapshotError::Invalid(reason.into())
}

fn check_fraction(value: f64, what: &str, pos: TilePos) -> Result<(), SnapshotError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!(
            "{what} {value} at ({}, {}) is outside 0..=1",
            pos.x, pos.y
        )))
    }
}

impl City {
    pub fn snapshot(&self) -> CitySnapshot {
        let tiles = self
            .grid
            .tiles()
            .filter(|tile| !tile.is_default())
            .map(|tile| TileRecord {
                x: tile.pos.x,
                y: tile.pos.y,
                kind: tile.kind,
                has_power_line: tile.has_power_line,
                population: tile.population,
                is_on_fire: tile.is_on_fire,
                fire_intensity: tile.fire_intensity,
                is_burned: tile.is_burned,
                building_health: tile.building_health,
            })
            .collect();

        CitySnapshot {
            format_version: FORMAT_VERSION,
            tick: self.tick(),
            saved_at: None,
            width: self.grid.width(),
            height: self.grid.height(),
            tiles,
            economy: EconomyRecord {
                money: self.economy.money(),
                tax_rate: self.economy.tax_rate(),
                police_funding: self.economy.funding(Service::Police),
                fire_funding: self.economy.funding(Service::Fire),
            },
        }
    }

    /// Builds a city from a snapshot, validating every record first.
    pub fn from_snapshot(
        snapshot: &CitySnapshot,
        config: &SimConfig,
    ) -> Result<City, SnapshotError> {
        if snapshot.format_version != FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported format version {}",
                snapshot.format_version
            )));
        }
        if snapshot.width == 0 || snapshot.height == 0 {
            return Err(invalid("grid dimensions must be positive"));
        }
        if !Grid::fits(snapshot.width, snapshot.height) {
            return Err(invalid(format!(
                "grid {}x{} exceeds {} tiles",
                snapshot.width,
                snapshot.height,
                Grid::MAX_TILES
            )));
        }

        let mut grid = Grid::new(snapshot.width, snapshot.height);
        let mut seen = HashSet::new();
        for record in &snapshot.tiles {
            let pos = TilePos::new(record.x, record.y);
            if !seen.insert(pos) {
                return Err(invalid(format!("duplicate tile ({}, {})", pos.x, pos.y)));
            }
            let tile = grid
                .tile_mut(pos)
                .ok_or_else(|| invalid(format!("tile ({}, {}) is off the map", pos.x, pos.y)))?;

            if record.population > 0 && !record.kind.is_zone() {
                return Err(invalid(format!(
                    "{} at ({}, {}) cannot hold population",
                    record.kind.as_str(),
                    pos.x,
                    pos.y
                )));
            }
            if record.population > config.growth.max_population {
                return Err(invalid(format!(
                    "population {} at ({}, {}) exceeds {}",
                    record.population, pos.x, pos.y, config.growth.max_population
                )));
            }
            check_fraction(record.building_health, "building health", pos)?;
            check_fraction(record.fire_intensity, "fire intensity", pos)?;
            if record.is_burned && (record.is_on_fire || record.population > 0) {
                return Err(invalid(format!(
                    "rubble at ({}, {}) cannot burn or hold population",
                    pos.x, pos.y
                )));
            }

            tile.kind = record.kind;
            tile.has_power_line = record.has_power_line;
            tile.population = record.population;
            tile.is_on_fire = record.is_on_fire;
            tile.fire_intensity = record.fire_intensity;
            tile.is_burned = record.is_burned;
            tile.building_health = record.building_health;
        }

        let rules = &config.economy;
        let record = &snapshot.economy;
        if !(rules.min_tax_rate..=rules.max_tax_rate).contains(&record.tax_rate) {
            return Err(invalid(format!(
                "tax rate {} outside {}..={}",
                record.tax_rate, rules.min_tax_rate, rules.max_tax_rate
            )));
        }
        for (service, funding) in [
            (Service::Police, record.police_funding),
            (Service::Fire, record.fire_funding),
        ] {
            if !(0.0..=1.0).contains(&funding) {
                return Err(invalid(format!(
                    "{service:?} funding {funding} outside 0..=1"
                )));
            }
        }

        let mut economy = Economy::new(rules.clone());
        economy.set_money(record.money);
        economy.set_tax_rate(record.tax_rate);
        economy.set_funding(Service::Police, record.police_funding);
        economy.set_funding(Service::Fire, record.fire_funding);

        Ok(City::from_parts(grid, economy, snapshot.tick))
    }

    /// Replaces this city with the snapshot's state. On rejection the city
    /// is left exactly as it was.
    pub fn restore(
        &mut self,
        snapshot: &CitySnapshot,
        config: &SimConfig,
    ) -> Result<(), SnapshotError> {
        match City::from_snapshot(snapshot, config) {
            Ok(city) => {
                *self = city;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "snapshot rejected; city unchanged");
                Err(err)
            }
        }
    }
}

pub fn save_json(path: impl AsRef<Path>, snapshot: &CitySnapshot) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_json(path: impl AsRef<Path>) -> Result<CitySnapshot, SnapshotError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Periodic autosave into `<dir>/<scenario>/tick_NNNNNN.json`.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: &Path, interval: u64) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            interval,
        }
    }

    pub fn maybe_write(
        &self,
        city: &City,
        scenario_name: &str,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        let tick = city.tick();
        if self.interval == 0 || tick == 0 || tick % self.interval != 0 {
            return Ok(None);
        }

        let path = self
            .output_dir
            .join(scenario_name)
            .join(format!("tick_{tick:06}.json"));
        let mut snapshot = city.snapshot();
        snapshot.saved_at = Some(Utc::now());
        save_json(&path, &snapshot)?;
        info!(tick, path = %path.display(), "snapshot written");
        Ok(Some(path))
    }
}
