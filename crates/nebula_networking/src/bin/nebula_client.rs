//! # Nebula Headless Client
//!
//! Drives a [`SyncClient`] against the scripted world at a fixed frame rate
//! and reports how well the local view tracks the authoritative one.
//!
//! ## Usage
//!
//! ```bash
//! nebula_client --seconds 20 --conditions average --config sync.toml
//! ```
//!
//! Time is simulated; the run finishes as fast as the machine allows.

use std::time::{Duration, Instant};

use nebula_core::Vec2;
use nebula_networking::protocol::events;
use nebula_networking::{
    NetworkConditions, RecordingTransport, RecordingViews, ScriptedWorld, SyncClient, SyncConfig,
    WorldConfig, FRAME_DURATION_MS, FRAME_RATE,
};
use tracing_subscriber::EnvFilter;

/// Virtual screen the pointer moves on.
const SCREEN: Vec2 = Vec2::new(1280.0, 720.0);

/// Pointer distance from the screen centre (pixels).
const POINTER_RADIUS: f32 = 200.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         NEBULA HEADLESS CLIENT                                   ║");
    println!("║         PREDICT. RECONCILE. SMOOTH.                              ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let mut seconds = 10u32;
    let mut config_path: Option<String> = None;
    let mut conditions_name = String::from("good");
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seconds" | "-s" => {
                if i + 1 < args.len() {
                    seconds = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--conditions" | "-n" => {
                if i + 1 < args.len() {
                    conditions_name = args[i + 1].to_lowercase();
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    seed = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: nebula_client [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --seconds <SECS>       Simulated run time (default: 10)");
                println!("  -c, --config <FILE>        Sync configuration (TOML)");
                println!("  -n, --conditions <NAME>    perfect | good | average | poor (default: good)");
                println!("      --seed <SEED>          World RNG seed");
                println!("  -h, --help                 Show this help");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => match SyncConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => SyncConfig::default(),
    };

    let Some(conditions) = NetworkConditions::preset(&conditions_name) else {
        eprintln!("Unknown network conditions '{conditions_name}'");
        std::process::exit(1);
    };

    let mut world_config = WorldConfig::default();
    if let Some(seed) = seed {
        world_config.seed = seed;
    }

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Duration:           {} seconds (simulated)", seconds);
    println!("│ Frame Rate:         {} Hz", FRAME_RATE);
    println!(
        "│ Network:            {} ({}ms ± {}ms, {}% loss)",
        conditions_name, conditions.base_latency_ms, conditions.jitter_ms, conditions.loss_percent
    );
    println!("│ Throttle:           {} ms", config.throttle_interval_ms);
    println!("│ True Speed:         {} u/s", world_config.true_speed);
    println!("│ Seed:               {:#x}", world_config.seed);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut world = ScriptedWorld::new(world_config, conditions);
    let mut client = match SyncClient::new(
        config,
        RecordingViews::lifecycle_only(),
        RecordingTransport::new(),
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = client.init(*world.bounds()).and_then(|()| client.start()) {
        eprintln!("Lifecycle error: {e}");
        std::process::exit(1);
    }
    client.join(world.local_id());

    let inbound = client.inbound_sender();
    for message in world.join_messages() {
        // The receiver lives inside `client`; sends cannot fail here.
        let _ = inbound.send(message);
    }

    let frame = Duration::from_millis(FRAME_DURATION_MS);
    let total_frames = u64::from(seconds) * u64::from(FRAME_RATE);
    let report_every = u64::from(FRAME_RATE) * 5;
    let origin = Instant::now();
    let mut worst_error = 0.0f32;

    for tick in 0..total_frames {
        let now = origin + frame * (tick as u32);

        world.step(FRAME_DURATION_MS as f64);
        for message in world.drain_due() {
            let _ = inbound.send(message);
        }

        // Sweep the pointer round the screen centre so every quadrant and the
        // ±180° seam get exercised.
        let angle = tick as f32 * 0.01;
        let pointer = SCREEN * 0.5 + Vec2::new(angle.cos(), angle.sin()) * POINTER_RADIUS;
        if let Err(e) = client.direct_pointer(now, pointer, SCREEN) {
            tracing::debug!("Control not sent: {}", e);
        }

        client.update(now, frame);

        for (event, payload) in client.transport_mut().take() {
            if event == events::PLAYER_MOVE {
                world.receive_move(&payload);
            }
        }

        if let Some(me) = client.engine().registry().local_player() {
            worst_error = worst_error.max(me.position.distance(world.local_position()));
        }

        if (tick + 1) % report_every == 0 {
            let stats = client.stats();
            let registry = client.engine().registry();
            println!("┌─ CLIENT STATUS (Frame {}) ─────────────────────────────────────", tick + 1);
            println!("│ World Clock:        {:.1}s", world.clock_ms() / 1000.0);
            println!("│ Entities:           {}", registry.len());
            println!(
                "│ Speed Estimate:     {:.1} u/s (true {:.1})",
                client.estimator().estimate(),
                world.true_speed()
            );
            println!("│ Ticks Applied:      {}", stats.ticks_applied);
            println!("│ Moves Sent:         {}", stats.moves_sent);
            println!("│ Evicted:            {}", stats.entities_evicted);
            println!("│ Dropped Records:    {}", stats.records_dropped);
            println!("│ Worst Local Error:  {:.2} u", worst_error);
            println!("└──────────────────────────────────────────────────────────────────");
            println!();
        }
    }

    let stats = client.stats();
    let world_stats = world.stats();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                         FINAL REPORT                             ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║ Frames:             {}", total_frames);
    println!("║ Live Views:         {}", client.views().live());
    println!("║ Speed Estimate:     {:.1} u/s", client.estimator().estimate());
    println!(
        "║ Velocity Samples:   {} accepted, {} rejected",
        stats.velocity_samples_accepted, stats.velocity_samples_rejected
    );
    println!(
        "║ Moves:              {} sent, {} received",
        stats.moves_sent, world_stats.moves_received
    );
    println!(
        "║ Server Messages:    {} sent, {} retransmitted",
        world_stats.messages_sent, world_stats.messages_retransmitted
    );
    println!("║ Feeds Consumed:     {}", world_stats.feeds_consumed);
    println!("║ Worst Local Error:  {:.2} u", worst_error);
    println!("╚══════════════════════════════════════════════════════════════════╝");
}
