use std::collections::HashSet;
use std::f64::consts::TAU;
use std::io;
use std::path::{Path, PathBuf};

use bubble_arena_server::constants::{
    BALL_RADIUS, DEFAULT_HEIGHT, DEFAULT_WIDTH, GENRE_COUNT, TICK_RATE,
};
use bubble_arena_server::registry::SessionRegistry;
use bubble_arena_server::types::{Bounds, Vec2};
use bubble_arena_server::zones::ZoneOccupancy;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONTAINMENT_EPSILON: f64 = 1e-6;

/// Runs the arena without any network clients and checks the physics
/// invariants on every tick.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 12)]
    bots: usize,
    #[arg(long, default_value_t = 60 * TICK_RATE as u64)]
    ticks: u64,
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: f64,
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: f64,
    #[arg(long)]
    seed: Option<u64>,
    /// Ticks between random steering nudges for every bot.
    #[arg(long, default_value_t = 30)]
    nudge_every: u64,
    /// Print the summary as a single JSON line on stdout.
    #[arg(long)]
    json: bool,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct Scenario {
    bots: usize,
    ticks: u64,
    bounds: Bounds,
    seed: u64,
    nudge_every: u64,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct SimulationSummary {
    seed: u64,
    ticks: u64,
    bodies: usize,
    bounds: Bounds,
    #[serde(rename = "maxSpeed")]
    max_speed: f64,
    #[serde(rename = "containmentViolations")]
    containment_violations: usize,
    #[serde(rename = "zoneCounts")]
    zone_counts: [usize; GENRE_COUNT],
    #[serde(rename = "zonePercentages")]
    zone_percentages: [f64; GENRE_COUNT],
    anomalies: Vec<String>,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let bounds = Bounds::new(cli.width, cli.height);
    if !bounds.is_valid() {
        error!(
            width = cli.width,
            height = cli.height,
            "arena must be finite and fit one body on both axes"
        );
        std::process::exit(2);
    }

    let scenario = Scenario {
        bots: cli.bots,
        ticks: cli.ticks,
        bounds,
        seed: cli.seed.unwrap_or_else(rand::random),
        nudge_every: cli.nudge_every.max(1),
    };
    info!(
        bots = scenario.bots,
        ticks = scenario.ticks,
        seed = scenario.seed,
        "simulation started"
    );

    let summary = run_simulation(&scenario);
    for anomaly in &summary.anomaly_records {
        warn!(tick = anomaly.tick, message = %anomaly.message, "anomaly detected");
    }

    if cli.json {
        match serde_json::to_string(&summary) {
            Ok(line) => println!("{line}"),
            Err(error) => error!(%error, "failed to serialize summary"),
        }
    }

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            error!(path = %path.display(), %error, "failed to write summary");
            std::process::exit(2);
        }
    }

    info!(
        max_speed = summary.max_speed,
        containment_violations = summary.containment_violations,
        zone_counts = ?summary.zone_counts,
        anomalies = summary.anomalies.len(),
        "simulation finished"
    );

    if !summary.anomalies.is_empty() {
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_simulation(scenario: &Scenario) -> SimulationSummary {
    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let mut registry = SessionRegistry::new();
    for _ in 0..scenario.bots {
        registry.spawn_bot(scenario.bounds, &mut rng);
    }
    let bot_ids: Vec<String> = registry.bodies().iter().map(|body| body.id.clone()).collect();

    let mut max_speed = 0.0f64;
    let mut containment_violations = 0usize;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();

    for tick in 1..=scenario.ticks {
        if tick % scenario.nudge_every == 1 || scenario.nudge_every == 1 {
            for id in &bot_ids {
                registry.apply_move_input(id, random_direction(&mut rng));
            }
        }
        registry.step(scenario.bounds);

        for body in registry.bodies() {
            max_speed = max_speed.max(body.velocity.length());
            if !body.position.is_finite() || !body.velocity.is_finite() {
                push_anomaly(
                    &mut anomalies,
                    &mut anomaly_records,
                    &mut anomaly_seen,
                    tick,
                    format!("non-finite state: {}", body.id),
                );
                continue;
            }
            if !is_contained(body.position, scenario.bounds) {
                containment_violations += 1;
            }
            if !is_inside_arena(body.position, scenario.bounds) {
                push_anomaly(
                    &mut anomalies,
                    &mut anomaly_records,
                    &mut anomaly_seen,
                    tick,
                    format!("body escaped the arena: {}", body.id),
                );
            }
        }
    }

    let occupancy = ZoneOccupancy::measure(registry.bodies(), scenario.bounds);
    SimulationSummary {
        seed: scenario.seed,
        ticks: scenario.ticks,
        bodies: registry.len(),
        bounds: scenario.bounds,
        max_speed,
        containment_violations,
        zone_counts: occupancy.counts,
        zone_percentages: occupancy.percentages(),
        anomalies,
        anomaly_records,
    }
}

fn random_direction<R: Rng>(rng: &mut R) -> Vec2 {
    let angle = rng.random_range(0.0..TAU);
    Vec2::new(angle.cos(), angle.sin())
}

/// Whether the whole body lies inside the walls.
fn is_contained(position: Vec2, bounds: Bounds) -> bool {
    position.x >= BALL_RADIUS - CONTAINMENT_EPSILON
        && position.x <= bounds.width - BALL_RADIUS + CONTAINMENT_EPSILON
        && position.y >= BALL_RADIUS - CONTAINMENT_EPSILON
        && position.y <= bounds.height - BALL_RADIUS + CONTAINMENT_EPSILON
}

/// Collision separation may nudge a body past the wall for one tick, but its
/// center must never leave the arena.
fn is_inside_arena(position: Vec2, bounds: Bounds) -> bool {
    (0.0..=bounds.width).contains(&position.x) && (0.0..=bounds.height).contains(&position.y)
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn write_summary(path: &Path, summary: &SimulationSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(bots: usize, ticks: u64) -> Scenario {
        Scenario {
            bots,
            ticks,
            bounds: Bounds::default(),
            seed: 42,
            nudge_every: 30,
        }
    }

    #[test]
    fn bots_stay_inside_the_arena() {
        let summary = run_simulation(&scenario(12, 600));
        assert_eq!(summary.bodies, 12);
        assert!(summary.anomalies.is_empty(), "{:?}", summary.anomalies);
        assert!(summary.max_speed.is_finite());
        assert_eq!(summary.zone_counts.iter().sum::<usize>(), 12);
    }

    #[test]
    fn empty_arena_reports_nothing() {
        let summary = run_simulation(&scenario(0, 10));
        assert_eq!(summary.bodies, 0);
        assert_eq!(summary.max_speed, 0.0);
        assert_eq!(summary.zone_percentages, [0.0; GENRE_COUNT]);
    }

    #[test]
    fn containment_checks_radius_inset() {
        let bounds = Bounds::new(500.0, 500.0);
        assert!(is_contained(Vec2::new(30.0, 470.0), bounds));
        assert!(!is_contained(Vec2::new(29.0, 250.0), bounds));
        assert!(is_inside_arena(Vec2::new(29.0, 250.0), bounds));
        assert!(!is_inside_arena(Vec2::new(-1.0, 250.0), bounds));
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("bubble-arena-missing-{}", rand::random::<u64>()))
            .join("summary.json");
        let summary = run_simulation(&scenario(1, 1));
        assert!(write_summary(&target, &summary).is_err());
    }
}
