//! Tunable constants for every simulation system.
//!
//! Defaults reproduce the reference city rules. A scenario file may override
//! any group; per-kind tables must then name every tile kind.

use serde::{Deserialize, Serialize};

use crate::grid::TileKind;

/// One value per tile kind. Lookups are exhaustive over [`TileKind`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindTable<T> {
    pub grass: T,
    pub road: T,
    pub residential: T,
    pub commercial: T,
    pub industrial: T,
    pub power_plant: T,
    pub police: T,
    pub fire_station: T,
}

impl<T: Copy> KindTable<T> {
    pub fn uniform(value: T) -> Self {
        Self {
            grass: value,
            road: value,
            residential: value,
            commercial: value,
            industrial: value,
            power_plant: value,
            police: value,
            fire_station: value,
        }
    }

    pub fn get(&self, kind: TileKind) -> T {
        match kind {
            TileKind::Grass => self.grass,
            TileKind::Road => self.road,
            TileKind::Residential => self.residential,
            TileKind::Commercial => self.commercial,
            TileKind::Industrial => self.industrial,
            TileKind::PowerPlant => self.power_plant,
            TileKind::Police => self.police,
            TileKind::FireStation => self.fire_station,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_money: i64,
    pub placement_cost: KindTable<i64>,
    pub power_line_cost: i64,
    /// Monthly upkeep per service building.
    pub upkeep: KindTable<i64>,
    pub ticks_per_month: i64,
    /// Income per resident per tick at the baseline tax rate.
    pub base_tax: KindTable<f64>,
    pub baseline_tax_rate: u8,
    pub min_tax_rate: u8,
    pub max_tax_rate: u8,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_money: 20_000,
            placement_cost: KindTable {
                grass: 1,
                road: 10,
                residential: 100,
                commercial: 100,
                industrial: 100,
                power_plant: 3_000,
                police: 500,
                fire_station: 500,
            },
            power_line_cost: 5,
            upkeep: KindTable {
                grass: 0,
                road: 0,
                residential: 0,
                commercial: 0,
                industrial: 0,
                power_plant: 200,
                police: 100,
                fire_station: 100,
            },
            ticks_per_month: 60,
            base_tax: KindTable {
                grass: 0.0,
                road: 0.0,
                residential: 0.5,
                commercial: 2.0,
                industrial: 1.5,
                power_plant: 0.0,
                police: 0.0,
                fire_station: 0.0,
            },
            baseline_tax_rate: 7,
            min_tax_rate: 1,
            max_tax_rate: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub grow_chance: f64,
    pub no_road_decline_chance: f64,
    pub no_power_decline_chance: f64,
    pub max_population: u8,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            grow_chance: 0.01,
            no_road_decline_chance: 0.05,
            no_power_decline_chance: 0.1,
            max_population: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrimeConfig {
    pub police_radius: i32,
    pub source_radius: i32,
    pub base_rate: KindTable<f64>,
    /// Largest fraction of crime full police coverage can remove.
    pub max_suppression: f64,
}

impl Default for CrimeConfig {
    fn default() -> Self {
        Self {
            police_radius: 8,
            source_radius: 6,
            base_rate: KindTable {
                grass: 0.0,
                road: 0.0,
                residential: 0.05,
                commercial: 0.1,
                industrial: 0.3,
                power_plant: 0.0,
                police: 0.0,
                fire_station: 0.0,
            },
            max_suppression: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandValueConfig {
    pub base_value: f64,
    pub radius: i32,
    pub modifier: KindTable<f64>,
    pub crime_penalty: f64,
}

impl Default for LandValueConfig {
    fn default() -> Self {
        Self {
            base_value: 50.0,
            radius: 4,
            modifier: KindTable {
                grass: 0.0,
                road: 5.0,
                residential: 3.0,
                commercial: 5.0,
                industrial: -10.0,
                power_plant: -15.0,
                police: 15.0,
                fire_station: 0.0,
            },
            crime_penalty: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireConfig {
    /// Spontaneous ignition chance per tick.
    pub ignition_chance: KindTable<f64>,
    /// Extra ignition chance per unit of crime (arson).
    pub arson_chance: f64,
    pub start_intensity: f64,
    pub spread_base_chance: f64,
    pub spread_intensity_multiplier: f64,
    /// Spread chance multiplier for targets inside station coverage.
    pub covered_spread_factor: f64,
    pub flammability: KindTable<f64>,
    pub intensity_growth: f64,
    pub damage_per_tick: f64,
    /// Manhattan radius of a fire station.
    pub station_radius: i32,
    pub extinguish_ticks_covered: u32,
    /// `None` keeps uncovered fires burning until the structure is destroyed.
    pub extinguish_ticks_uncovered: Option<u32>,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            ignition_chance: KindTable {
                grass: 0.0,
                road: 0.0,
                residential: 0.0,
                commercial: 0.0,
                industrial: 0.0001,
                power_plant: 0.00005,
                police: 0.0,
                fire_station: 0.0,
            },
            arson_chance: 0.00005,
            start_intensity: 0.3,
            spread_base_chance: 0.03,
            spread_intensity_multiplier: 0.1,
            covered_spread_factor: 0.5,
            flammability: KindTable {
                grass: 0.1,
                road: 0.0,
                residential: 0.8,
                commercial: 0.7,
                industrial: 0.6,
                power_plant: 0.4,
                police: 0.5,
                fire_station: 0.3,
            },
            intensity_growth: 0.03,
            damage_per_tick: 0.02,
            station_radius: 8,
            extinguish_ticks_covered: 3,
            extinguish_ticks_uncovered: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub base_rate: f64,
    pub repair_rate: f64,
    /// Crime level above which underfunded policing erodes buildings.
    pub crime_threshold: f64,
    pub fire_underfunding_factor: f64,
    /// Both services must be funded at least this much for repairs.
    pub repair_funding_floor: f64,
    pub functional_threshold: f64,
    pub critical_threshold: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.001,
            repair_rate: 0.005,
            crime_threshold: 0.3,
            fire_underfunding_factor: 0.5,
            repair_funding_floor: 0.5,
            functional_threshold: 0.25,
            critical_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub fire_cooldown_ticks: u32,
    pub budget_cooldown_ticks: u32,
    pub low_treasury: i64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            fire_cooldown_ticks: 5,
            budget_cooldown_ticks: 10,
            low_treasury: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub economy: EconomyConfig,
    pub growth: GrowthConfig,
    pub crime: CrimeConfig,
    pub land_value: LandValueConfig,
    pub fire: FireConfig,
    pub decay: DecayConfig,
    pub events: EventConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_table_lookup_is_exhaustive() {
        let config = SimConfig::default();
        for kind in TileKind::ALL {
            let flammability = config.fire.flammability.get(kind);
            assert!((0.0..=1.0).contains(&flammability), "{}", kind.as_str());
        }
        assert_eq!(config.economy.upkeep.get(TileKind::Police), 100);
        assert_eq!(config.economy.placement_cost.get(TileKind::PowerPlant), 3_000);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "growth:\n  grow_chance: 0.5\nfire:\n  station_radius: 4\n";
        let config: SimConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.growth.grow_chance, 0.5);
        assert_eq!(config.growth.max_population, 10);
        assert_eq!(config.fire.station_radius, 4);
        assert_eq!(config.fire.extinguish_ticks_covered, 3);
        assert_eq!(config.crime, CrimeConfig::default());
    }

    #[test]
    fn incomplete_table_is_rejected() {
        let yaml = "crime:\n  base_rate:\n    industrial: 0.9\n";
        let parsed: Result<SimConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn config_yaml_round_trip() {
        let config = SimConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: SimConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, loaded);
    }
}
