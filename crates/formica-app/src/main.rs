use anyhow::{Context, Result};
use clap::Parser;
use formica_core::{DisplayMode, FormicaConfig, Vec2, World};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Headless ant colony foraging run.
#[derive(Debug, Parser)]
#[command(name = "formica", about = "Run an ant colony foraging simulation")]
struct Args {
    /// JSON world configuration; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ants spawned at the colony before the run.
    #[arg(long, default_value_t = 100)]
    ants: usize,
    /// Food sources scattered across the domain.
    #[arg(long, default_value_t = 4)]
    food_sources: usize,
    /// Supply units per food source.
    #[arg(long, default_value_t = 100)]
    food_supply: u32,
    /// Ticks to simulate.
    #[arg(long, default_value_t = 2_000)]
    ticks: u64,
    /// Simulation rate in ticks per second.
    #[arg(long, default_value_t = 60.0)]
    hz: f32,
    /// Overrides the configured RNG seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Ticks between progress log lines; 0 silences them.
    #[arg(long, default_value_t = 120)]
    log_interval: u64,
    /// Write a PPM snapshot of the field here at the end of the run.
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Intensity scale applied when rendering the snapshot.
    #[arg(long, default_value_t = 0.2)]
    snapshot_scale: f32,
}

#[derive(Debug, Error)]
enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => FormicaConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.rng_seed = Some(seed);
    }

    let mut world = World::new(config);
    scatter_food(&mut world, args.food_sources, args.food_supply);
    world.populate(args.ants);
    info!(
        ants = args.ants,
        food_sources = args.food_sources,
        ticks = args.ticks,
        "starting foraging run"
    );

    let dt = 1.0 / args.hz.max(1.0);
    let mut last = None;
    for _ in 0..args.ticks {
        let summary = world.step(dt);
        if args.log_interval > 0 && summary.tick.0.is_multiple_of(args.log_interval) {
            info!(
                tick = summary.tick.0,
                searching = summary.searching,
                returning = summary.returning,
                collected = summary.food_collected,
                remaining = summary.food_remaining,
                deposits = summary.deposits,
                "progress"
            );
        }
        last = Some(summary);
    }

    if let Some(summary) = last {
        info!(
            ticks = summary.tick.0,
            collected = summary.food_collected,
            remaining = summary.food_remaining,
            mean_to_food = summary.mean_to_food,
            mean_to_home = summary.mean_to_home,
            "run finished"
        );
    }

    if let Some(path) = &args.snapshot {
        write_snapshot(&world, path, args.snapshot_scale)?;
        info!(path = %path.display(), "field snapshot written");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(path: &Path) -> Result<FormicaConfig, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Places food sources at seed-derived positions, inset from the walls so
/// they stay reachable. Deriving the placement RNG from the world seed
/// keeps whole runs reproducible.
fn scatter_food(world: &mut World, count: usize, supply: u32) {
    let seed = world.config().rng_seed.unwrap_or(0x00C0_FFEE);
    let mut rng = SmallRng::seed_from_u64(seed ^ 0x5EED_F00D);
    let bounds = world.config().bounds;
    let inset = Vec2::new(bounds.size.x * 0.1, bounds.size.y * 0.1);
    let lo = bounds.origin + inset;
    let hi = bounds.max() - inset;
    for _ in 0..count {
        let position = if lo.x < hi.x && lo.y < hi.y {
            Vec2::new(rng.random_range(lo.x..hi.x), rng.random_range(lo.y..hi.y))
        } else {
            bounds.center()
        };
        world.add_food_source(position, supply);
    }
}

fn write_snapshot(world: &World, path: &Path, scale: f32) -> Result<()> {
    let field = world.field();
    let width = field.settings().width;
    let height = field.settings().height;
    let rgba = field.snapshot_rgba(DisplayMode::BlendRgb, scale);

    let mut out = Vec::with_capacity(rgba.len() / 4 * 3 + 32);
    out.extend_from_slice(format!("P6\n{width} {height}\n255\n").as_bytes());
    for pixel in rgba.chunks_exact(4) {
        out.extend_from_slice(&pixel[..3]);
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}
