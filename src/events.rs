use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{city::City, config::EventConfig, grid::TilePos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseCause {
    Fire,
    Decay,
}

/// Something noteworthy that happened to the city during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CityEvent {
    FireReported,
    FireSpreading { count: usize },
    FiresExtinguished,
    BuildingCollapsed { pos: TilePos, cause: CollapseCause },
    TreasuryLow { money: i64 },
    Bankrupt { money: i64 },
}

impl fmt::Display for CityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CityEvent::FireReported => write!(f, "fire reported in the city"),
            CityEvent::FireSpreading { count } => {
                write!(f, "fire is spreading ({count} tiles burning)")
            }
            CityEvent::FiresExtinguished => write!(f, "all fires extinguished"),
            CityEvent::BuildingCollapsed { pos, cause } => {
                let cause = match cause {
                    CollapseCause::Fire => "fire",
                    CollapseCause::Decay => "neglect",
                };
                write!(f, "building at ({}, {}) collapsed from {cause}", pos.x, pos.y)
            }
            CityEvent::TreasuryLow { money } => write!(f, "treasury is running low ({money})"),
            CityEvent::Bankrupt { money } => write!(f, "city is bankrupt ({money})"),
        }
    }
}

/// Edge-triggered event detection. Fire and budget alerts each have their
/// own cooldown so a persistent condition is not reported every tick.
#[derive(Debug, Default, Clone)]
pub struct EventMonitor {
    last_fire_count: usize,
    fire_cooldown: u32,
    budget_cooldown: u32,
}

impl EventMonitor {
    pub fn observe(
        &mut self,
        rules: &EventConfig,
        fire_count: usize,
        city: &City,
    ) -> Vec<CityEvent> {
        self.fire_cooldown = self.fire_cooldown.saturating_sub(1);
        self.budget_cooldown = self.budget_cooldown.saturating_sub(1);

        let mut events = Vec::new();

        if fire_count > 0 && self.last_fire_count == 0 {
            if self.fire_cooldown == 0 {
                events.push(CityEvent::FireReported);
                self.fire_cooldown = rules.fire_cooldown_ticks;
            }
        } else if fire_count > 3 && fire_count > self.last_fire_count + 2 {
            if self.fire_cooldown == 0 {
                events.push(CityEvent::FireSpreading { count: fire_count });
                self.fire_cooldown = rules.fire_cooldown_ticks;
            }
        } else if fire_count == 0 && self.last_fire_count > 0 {
            events.push(CityEvent::FiresExtinguished);
        }
        self.last_fire_count = fire_count;

        let money = city.economy().money();
        if self.budget_cooldown == 0 {
            if money > 0 && money < rules.low_treasury {
                events.push(CityEvent::TreasuryLow { money });
                self.budget_cooldown = rules.budget_cooldown_ticks;
            } else if money <= 0 {
                events.push(CityEvent::Bankrupt { money });
                self.budget_cooldown = rules.budget_cooldown_ticks;
            }
        }

        events.extend(
            city.ledger()
                .collapsed
                .iter()
                .map(|&(pos, cause)| CityEvent::BuildingCollapsed { pos, cause }),
        );
        events
    }
}
