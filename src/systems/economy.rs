use std::any::Any;

use anyhow::Result;
use tracing::debug;

use crate::{
    city::City,
    engine::{System, SystemContext},
    rng::SystemRng,
};

/// Collects taxes then pays this tick's share of service upkeep.
pub struct EconomySystem;

impl EconomySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EconomySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EconomySystem {
    fn name(&self) -> &'static str {
        "economy"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let income = city.economy.collect_taxes(&city.grid);
        let upkeep = city.economy.pay_upkeep(&city.grid);
        city.ledger.income = income;
        city.ledger.upkeep = upkeep;
        debug!(
            tick = ctx.tick,
            income,
            upkeep,
            money = city.economy.money(),
            "treasury updated"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EconomyConfig, SimConfig};
    use crate::grid::TileKind;
    use crate::rng::RngManager;

    fn run_once(city: &mut City) {
        let config = SimConfig::default();
        let ctx = SystemContext {
            tick: 1,
            config: &config,
        };
        let mut rngs = RngManager::new(1);
        EconomySystem::new()
            .run(&ctx, city, &mut rngs.stream("economy"))
            .unwrap();
    }

    #[test]
    fn taxes_then_upkeep() {
        let mut city = City::new(6, 6, EconomyConfig::default());
        city.grid_mut().set_type(0, 0, TileKind::Commercial);
        city.grid_mut().set_type(5, 5, TileKind::FireStation);
        {
            let shop = city.grid_mut().get_mut(0, 0).unwrap();
            shop.population = 5;
            shop.is_powered = true;
        }

        run_once(&mut city);

        // 5 * 2.0 income, 100 / 60 upkeep
        assert_eq!(city.ledger().income, 10);
        assert_eq!(city.ledger().upkeep, 1);
        assert_eq!(city.economy().money(), 20_009);
    }

    #[test]
    fn upkeep_can_drive_treasury_negative() {
        let mut city = City::new(6, 6, EconomyConfig::default());
        city.grid_mut().set_type(0, 0, TileKind::PowerPlant);
        city.economy_mut().set_money(2);

        run_once(&mut city);

        assert_eq!(city.economy().money(), -1);
    }
}
