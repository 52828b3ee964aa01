use serde::{Deserialize, Serialize};

use crate::config::EconomyConfig;
use crate::grid::{Grid, TileKind};

/// City services with an adjustable funding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Police,
    Fire,
}

/// City treasury: balance, tax rate and service funding.
#[derive(Debug, Clone, PartialEq)]
pub struct Economy {
    money: i64,
    tax_rate: u8,
    police_funding: f64,
    fire_funding: f64,
    last_upkeep: i64,
    rules: EconomyConfig,
}

impl Economy {
    pub fn new(rules: EconomyConfig) -> Self {
        Self {
            money: rules.starting_money,
            tax_rate: rules.baseline_tax_rate,
            police_funding: 1.0,
            fire_funding: 1.0,
            last_upkeep: 0,
            rules,
        }
    }

    pub fn rules(&self) -> &EconomyConfig {
        &self.rules
    }

    pub fn money(&self) -> i64 {
        self.money
    }

    pub(crate) fn set_money(&mut self, money: i64) {
        self.money = money;
    }

    pub fn tax_rate(&self) -> u8 {
        self.tax_rate
    }

    /// Sets the tax rate, clamped to the configured bounds. Returns the
    /// rate actually applied.
    pub fn set_tax_rate(&mut self, rate: u8) -> u8 {
        self.tax_rate = rate.clamp(self.rules.min_tax_rate, self.rules.max_tax_rate);
        self.tax_rate
    }

    pub fn funding(&self, service: Service) -> f64 {
        match service {
            Service::Police => self.police_funding,
            Service::Fire => self.fire_funding,
        }
    }

    /// Sets a funding fraction, clamped to `0.0..=1.0`.
    pub fn set_funding(&mut self, service: Service, fraction: f64) -> f64 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            1.0
        };
        match service {
            Service::Police => self.police_funding = fraction,
            Service::Fire => self.fire_funding = fraction,
        }
        fraction
    }

    pub fn last_upkeep(&self) -> i64 {
        self.last_upkeep
    }

    pub fn placement_cost(&self, kind: TileKind) -> i64 {
        self.rules.placement_cost.get(kind)
    }

    pub fn power_line_cost(&self) -> i64 {
        self.rules.power_line_cost
    }

    pub fn can_afford(&self, kind: TileKind) -> bool {
        self.money >= self.placement_cost(kind)
    }

    /// Deducts the placement cost. Re-checks affordability, so a failed
    /// call leaves the balance untouched.
    pub fn deduct_cost(&mut self, kind: TileKind) -> bool {
        self.spend(self.placement_cost(kind))
    }

    pub(crate) fn spend(&mut self, amount: i64) -> bool {
        if self.money >= amount {
            self.money -= amount;
            true
        } else {
            false
        }
    }

    /// Collects taxes from powered, populated tiles and returns the income.
    pub fn collect_taxes(&mut self, grid: &Grid) -> i64 {
        let multiplier = f64::from(self.tax_rate) / f64::from(self.rules.baseline_tax_rate.max(1));
        let raw: f64 = grid
            .tiles()
            .filter(|tile| tile.is_powered && tile.population > 0)
            .map(|tile| f64::from(tile.population) * self.rules.base_tax.get(tile.kind) * multiplier)
            .sum();
        // Rounded once so fractional income does not drift across tiles.
        let income = raw.round_ties_even() as i64;
        self.money += income;
        income
    }

    /// Monthly upkeep of every service building on the grid.
    pub fn monthly_upkeep(&self, grid: &Grid) -> i64 {
        grid.tiles().map(|tile| self.rules.upkeep.get(tile.kind)).sum()
    }

    /// Deducts this tick's share of monthly upkeep. Fractions are dropped.
    pub fn pay_upkeep(&mut self, grid: &Grid) -> i64 {
        let per_tick = self.monthly_upkeep(grid) / self.rules.ticks_per_month.max(1);
        self.money -= per_tick;
        self.last_upkeep = per_tick;
        per_tick
    }
}

impl Default for Economy {
    fn default() -> Self {
        Self::new(EconomyConfig::default())
    }
}
