// CLI entry point for the headless Stonehold simulation.
//
// Carves a procedural cavern out of solid rock, spawns a population of units
// with default behavior enabled, and drives `World::advance_time` at a fixed
// step. Prints a summary of what happened: cave-ins, loot, fights, deaths,
// and who is left standing in each faction.
//
// Usage:
//   stonehold [OPTIONS]
//     --seed <N>        World seed (default: 42)
//     --size <X,Y,Z>    Cavern dimensions (default: 32,32,12)
//     --units <N>       Units to spawn (default: 20)
//     --seconds <S>     Simulated time to run (default: 300)
//     --dt <S>          Fixed time step (default: 0.2)
//     --config <PATH>   JSON SimConfig overrides
//     -v, --verbose     Debug logging (RUST_LOG still wins when set)

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use stonehold_sim::config::SimConfig;
use stonehold_sim::event::{CombatOutcome, SimEventKind};
use stonehold_sim::prng::SimRng;
use stonehold_sim::types::TerrainType;
use stonehold_sim::world::World;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stonehold", about = "Run a headless cave-in simulation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// World seed; the same seed replays the same history
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Cavern dimensions as X,Y,Z
    #[arg(long, value_parser = parse_size, default_value = "32,32,12")]
    size: (usize, usize, usize),

    /// Number of units to spawn
    #[arg(long, default_value = "20")]
    units: usize,

    /// Seconds of simulated time
    #[arg(long, default_value = "300")]
    seconds: f64,

    /// Fixed time step in seconds
    #[arg(long, default_value = "0.2")]
    dt: f64,

    /// JSON file with SimConfig overrides
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_size(s: &str) -> Result<(usize, usize, usize), String> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [x, y, z] if x >= 3 && y >= 3 && z >= 3 => Ok((x, y, z)),
        [_, _, _] => Err("every dimension must be at least 3".into()),
        _ => Err("expected X,Y,Z".into()),
    }
}

/// Tally of the events a run produced.
#[derive(Default)]
struct Summary {
    terrain_changes: usize,
    loot: usize,
    spawned: usize,
    deaths: Vec<String>,
    level_ups: usize,
    workshop_upgrades: usize,
    hits: usize,
    blocks: usize,
    dodges: usize,
}

impl Summary {
    fn record(&mut self, kind: SimEventKind) {
        match kind {
            SimEventKind::TerrainChanged { .. } => self.terrain_changes += 1,
            SimEventKind::ItemDropped { .. } => self.loot += 1,
            SimEventKind::UnitSpawned { .. } => self.spawned += 1,
            SimEventKind::UnitDied { name, .. } => self.deaths.push(name),
            SimEventKind::LevelUp { .. } => self.level_ups += 1,
            SimEventKind::Workshop { .. } => self.workshop_upgrades += 1,
            SimEventKind::CombatResolved { outcome, .. } => match outcome {
                CombatOutcome::Hit { .. } => self.hits += 1,
                CombatOutcome::Blocked => self.blocks += 1,
                CombatOutcome::Dodged { .. } => self.dodges += 1,
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SimConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if !(cli.dt > 0.0 && cli.dt <= config.max_time_step) {
        bail!("--dt must lie in (0, {}]", config.max_time_step);
    }

    let codes = carve_cavern(cli.size, cli.seed);
    let mut world = World::from_codes(&codes, config, cli.seed).context("building the cavern")?;
    for _ in 0..cli.units {
        world.spawn_unit().context("spawning units")?;
    }
    tracing::info!(
        size = ?cli.size,
        units = cli.units,
        factions = world.active_factions().len(),
        "cavern ready"
    );

    let mut summary = Summary::default();
    let steps = (cli.seconds / cli.dt).ceil() as u64;
    for _ in 0..steps {
        world.advance_time(cli.dt)?;
        for event in world.drain_events() {
            summary.record(event.kind);
        }
    }

    print_summary(&world, &summary);
    Ok(())
}

/// Solid rock with chambers carved by random walks, wood roots hanging from
/// the ceiling, and a few workshops on chamber floors. The bottom layer is
/// left whole so everything carved has ground to stand on.
fn carve_cavern((sx, sy, sz): (usize, usize, usize), seed: u64) -> Vec<Vec<Vec<i32>>> {
    let mut rng = SimRng::new(seed ^ 0x5707_E401D);
    let mut codes = vec![vec![vec![TerrainType::Rock.code(); sz]; sy]; sx];
    let air = TerrainType::Air.code();

    let chambers = (sx * sy / 64).max(2);
    for _ in 0..chambers {
        let mut x = rng.range_usize(1, sx - 1);
        let mut y = rng.range_usize(1, sy - 1);
        let floor = rng.range_usize(1, (sz - 1).max(2));
        for _ in 0..(sx + sy) * 2 {
            let height = rng.range_usize(1, 4);
            for z in floor..(floor + height).min(sz - 1) {
                codes[x][y][z] = air;
            }
            x = (x as i32 + rng.range_i32(-1, 2)).clamp(1, sx as i32 - 2) as usize;
            y = (y as i32 + rng.range_i32(-1, 2)).clamp(1, sy as i32 - 2) as usize;
        }
    }

    for x in 1..sx - 1 {
        for y in 1..sy - 1 {
            for z in 1..sz - 1 {
                if codes[x][y][z] != air {
                    continue;
                }
                let ceiling = codes[x][y][z + 1] == TerrainType::Rock.code();
                let ground = codes[x][y][z - 1] == TerrainType::Rock.code();
                if ceiling && rng.chance(0.08) {
                    codes[x][y][z] = TerrainType::Wood.code();
                } else if ground && rng.chance(0.01) {
                    codes[x][y][z] = TerrainType::Workshop.code();
                }
            }
        }
    }
    codes
}

fn print_summary(world: &World, summary: &Summary) {
    println!(
        "Simulated {:.1} s with {} spawned units",
        world.time(),
        summary.spawned
    );
    println!(
        "Terrain: {} voxel changes, {} loot drops, {} cave-ins pending",
        summary.terrain_changes,
        summary.loot,
        world.pending_collapses().count()
    );
    println!(
        "Combat: {} hits, {} blocks, {} dodges",
        summary.hits, summary.blocks, summary.dodges
    );
    println!(
        "Growth: {} level-ups, {} workshop upgrades",
        summary.level_ups, summary.workshop_upgrades
    );
    if summary.deaths.is_empty() {
        println!("Nobody died.");
    } else {
        println!("Fallen: {}", summary.deaths.join(", "));
    }

    let mut survivors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for unit in world.units() {
        survivors
            .entry(unit.faction.to_string())
            .or_default()
            .push(format!("{} ({:.0} hp)", unit.name, unit.health));
    }
    for (faction, members) in survivors {
        println!("{faction}: {}", members.join(", "));
    }
    println!("Items lying around: {}", world.items().count());
}
