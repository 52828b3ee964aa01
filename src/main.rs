use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tilecity::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    snapshot, City,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Tile city simulation runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/riverside.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Start from a saved city instead of the scenario layout
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write the final city to this file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;

    let mut city = match &cli.load {
        Some(path) => {
            let saved = snapshot::load_json(path)
                .with_context(|| format!("Failed to load save {}", path.display()))?;
            City::from_snapshot(&saved, &scenario.config)?
        }
        None => scenario.build_city()?,
    };

    let mut settings = EngineSettings::new(
        scenario.name.clone(),
        cli.seed.unwrap_or(scenario.seed),
        scenario.config.clone(),
    );
    settings.snapshot_interval_ticks = cli
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_ticks);
    if let Some(dir) = cli.snapshot_dir {
        settings.snapshot_dir = dir;
    }

    let mut engine = EngineBuilder::standard(settings).build();
    if cli.load.is_some() {
        engine.refresh_derived(&mut city);
        info!(tick = city.tick(), "resumed from save");
    }

    let ticks = scenario.ticks(cli.ticks);
    let mut event_count = 0;
    engine.run_with_hook(&mut city, ticks, |summary| event_count += summary.events.len())?;

    if let Some(path) = &cli.save {
        snapshot::save_json(path, &city.snapshot())
            .with_context(|| format!("Failed to save city to {}", path.display()))?;
        info!(path = %path.display(), "city saved");
    }

    let demand = city.demand();
    println!(
        "Scenario '{}' completed {} ticks (now at tick {}).",
        scenario.name,
        ticks,
        city.tick()
    );
    println!(
        "Money: {}  Population: {}  Fires: {}  Events: {}",
        city.economy().money(),
        city.total_population(),
        engine.fire_count(),
        event_count
    );
    println!(
        "Demand R {:+.2}  C {:+.2}  I {:+.2}",
        demand.residential, demand.commercial, demand.industrial
    );
    Ok(())
}
