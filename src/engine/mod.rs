use std::any::Any;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    city::{City, TickLedger},
    config::SimConfig,
    events::{CityEvent, EventMonitor},
    grid::{Grid, TilePos},
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    systems::{
        self, CrimeSystem, DecaySystem, DemandSystem, EconomySystem, FireSystem, GrowthSystem,
        LandValueSystem, PowerSystem,
    },
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub config: SimConfig,
    /// Autosave interval; 0 disables autosave.
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

impl EngineSettings {
    pub fn new(scenario_name: impl Into<String>, seed: u64, config: SimConfig) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            seed,
            config,
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    /// The tick pipeline in its load-bearing order. Growth needs this
    /// tick's power, land value and fire read this tick's crime, and decay
    /// reads crime plus the funding levels the economy stage is about to
    /// charge for.
    pub fn standard(settings: EngineSettings) -> Self {
        Self::new(settings)
            .with_system(PowerSystem::new())
            .with_system(GrowthSystem::new())
            .with_system(DemandSystem::new())
            .with_system(CrimeSystem::new())
            .with_system(LandValueSystem::new())
            .with_system(FireSystem::new())
            .with_system(DecaySystem::new())
            .with_system(EconomySystem::new())
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            monitor: EventMonitor::default(),
            settings: self.settings,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: &'static str,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct TickSummary {
    pub tick: u64,
    pub system_reports: Vec<SystemRunReport>,
    pub income: i64,
    pub upkeep: i64,
    pub fire_count: usize,
    pub events: Vec<CityEvent>,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    monitor: EventMonitor,
    settings: EngineSettings,
}

impl Engine {
    pub fn config(&self) -> &SimConfig {
        &self.settings.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    /// One full pass of every system, in order, against the city.
    pub fn tick(&mut self, city: &mut City) -> Result<TickSummary> {
        city.ledger = TickLedger::default();
        let tick = city.tick() + 1;
        let ctx = SystemContext {
            tick,
            config: &self.settings.config,
        };

        let mut system_reports = Vec::with_capacity(self.systems.len());
        for system in &mut self.systems {
            let mut rng = self.rng.stream(system.name());
            let start = Instant::now();
            system
                .run(&ctx, city, &mut rng)
                .with_context(|| format!("system '{}' failed on tick {tick}", system.name()))?;
            system_reports.push(SystemRunReport {
                name: system.name(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }
        city.advance_tick();

        let fire_count = self.fire_count();
        let events = self
            .monitor
            .observe(&self.settings.config.events, fire_count, city);
        for event in &events {
            info!(tick, "{event}");
        }

        let snapshot_path = self
            .snapshot_writer
            .maybe_write(city, &self.settings.scenario_name)?;

        debug!(
            tick,
            income = city.ledger.income,
            upkeep = city.ledger.upkeep,
            money = city.economy().money(),
            fire_count,
            population = city.total_population(),
            "tick complete"
        );

        Ok(TickSummary {
            tick,
            system_reports,
            income: city.ledger.income,
            upkeep: city.ledger.upkeep,
            fire_count,
            events,
            snapshot_path,
        })
    }

    pub fn run(&mut self, city: &mut City, ticks: u64) -> Result<()> {
        self.run_with_hook(city, ticks, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, city: &mut City, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&TickSummary),
    {
        for _ in 0..ticks {
            let summary = self.tick(city)?;
            hook(&summary);
        }
        Ok(())
    }

    /// Recomputes derived state (power connectivity, demand) without
    /// advancing time and drops per-system state kept from the previous
    /// city. Run once after restoring a snapshot.
    pub fn refresh_derived(&mut self, city: &mut City) {
        systems::power::propagate(&mut city.grid);
        city.demand = systems::demand::compute(&city.grid);
        for system in &mut self.systems {
            system.reset_derived(city);
        }
        self.monitor = EventMonitor::default();
    }

    pub fn system<T: System>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|system| system.as_any().downcast_ref::<T>())
    }

    pub fn fire_count(&self) -> usize {
        self.system::<FireSystem>()
            .map(FireSystem::fire_count)
            .unwrap_or(0)
    }

    pub fn fire_coverage(&self, grid: &Grid) -> HashSet<TilePos> {
        self.system::<FireSystem>()
            .map(|fire| fire.coverage_tiles(grid, &self.settings.config.fire))
            .unwrap_or_default()
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub config: &'a SimConfig,
}

pub trait System: Any {
    fn name(&self) -> &'static str;
    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        city: &mut City,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
    /// Forget state carried over from an earlier city, rebuilding it from `city`.
    fn reset_derived(&mut self, _city: &City) {}
    fn as_any(&self) -> &dyn Any;
}
