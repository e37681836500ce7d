//! Headless rewind driver.
//!
//! Runs the demo machine for a number of frames, capturing into a
//! [`RewindManager`] at a fixed cadence, then:
//!
//! - prints history statistics (anchors, deltas, compression ratio)
//! - restores every retained capture and checks it against a reference copy
//! - rewinds to a chosen position and reports where emulation resumes
//!
//! Logging goes through `tracing`; set `RUST_LOG` or pass `--debug`.

mod machine;

use machine::DemoMachine;
use rewind_core::{BincodeSerializer, RewindConfig, RewindError, RewindManager, SnapshotKind};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Serializer format version of [`DemoMachine`].
const DEMO_FORMAT_VERSION: u32 = 1;

fn arg_value<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage(program: &str) {
    eprintln!("Rewind history driver v0.1.0");
    eprintln!("Usage: {} [options]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --frames N           Run N frames (default 600)");
    eprintln!("  --every N            Capture every N frames (default 1)");
    eprintln!("  --capacity N         History capacity in captures (default 300)");
    eprintln!("  --interval N         Captures between full anchors (default 30)");
    eprintln!("  --level N            Deflate level 0-10 (default 1)");
    eprintln!("  --rewind P           Rewind to capture position P (default: oldest retained)");
    eprintln!("  --grow F             Grow the data space by 64 bytes at frame F");
    eprintln!("  --seed N             Demo machine RNG seed (default 1)");
    eprintln!("  --debug              Log every capture and eviction");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(&args[0]);
        return;
    }
    init_logging(args.iter().any(|a| a == "--debug"));

    let defaults = RewindConfig::default();
    let config = RewindConfig {
        capacity: arg_value(&args, "--capacity").unwrap_or(defaults.capacity),
        anchor_interval: arg_value(&args, "--interval").unwrap_or(defaults.anchor_interval),
        compression_level: arg_value(&args, "--level").unwrap_or(defaults.compression_level),
    };
    let frames: u32 = arg_value(&args, "--frames").unwrap_or(600);
    let every: u32 = arg_value::<u32>(&args, "--every").unwrap_or(1).max(1);
    let grow_frame: Option<u32> = arg_value(&args, "--grow");
    let seed: u32 = arg_value(&args, "--seed").unwrap_or(1);

    let mut rewind = match RewindManager::with_deflate(config, BincodeSerializer::<DemoMachine>::new(DEMO_FORMAT_VERSION)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let mut machine = DemoMachine::new(seed);
    let mut reference: BTreeMap<u64, DemoMachine> = BTreeMap::new();
    let (mut anchors, mut deltas, mut anchor_bytes, mut delta_bytes) = (0usize, 0usize, 0usize, 0usize);

    info!(frames, every, capacity = config.capacity, interval = config.anchor_interval, "running");
    for _ in 0..frames {
        machine.run_frame();
        if grow_frame == Some(machine.frame) {
            machine.extend_data(64);
            info!(frame = machine.frame, "data space grown");
        }
        rewind.advance(1);
        if machine.frame % every != 0 {
            continue;
        }
        match rewind.capture(&machine) {
            Ok(h) => {
                match h.kind {
                    SnapshotKind::Anchor => { anchors += 1; anchor_bytes += h.compressed_len; }
                    SnapshotKind::Delta => { deltas += 1; delta_bytes += h.compressed_len; }
                }
                reference.insert(h.position, machine.clone());
            }
            Err(e) => {
                error!(frame = machine.frame, error = %e, "capture failed");
                std::process::exit(1);
            }
        }
    }

    let stats = rewind.stats();
    let h = &stats.history;
    println!("Captured: {} anchors (avg {} B), {} deltas (avg {} B)",
        anchors, anchor_bytes / anchors.max(1), deltas, delta_bytes / deltas.max(1));
    println!("Retained: {} records [{}..={}], {} anchors, {} deltas{}",
        h.records, rewind.history().oldest_position(),
        rewind.history().newest_position().unwrap_or(0), h.anchors, h.deltas,
        if h.pinned_anchor { " (+1 pinned anchor)" } else { "" });
    println!("Bytes:    {} raw -> {} stored ({:.2}%), ~{} KB in memory",
        h.raw_bytes, h.compressed_bytes, h.compression_ratio() * 100.0,
        rewind.history().memory_usage() / 1024);
    println!("Elapsed:  {} frames covered, {} length mismatches",
        h.elapsed_units, stats.length_mismatches);

    // Verify every retained capture restores to exactly what was captured.
    let mut failures = 0;
    let mut scratch = DemoMachine::new(seed);
    for record in rewind.history().iter() {
        let p = record.position();
        match rewind.restore(&mut scratch, p) {
            Ok(()) if reference.get(&p) == Some(&scratch) => {}
            Ok(()) => { failures += 1; error!(position = p, "restored state differs"); }
            Err(e) => { failures += 1; error!(position = p, error = %e, "restore failed"); }
        }
    }
    println!("Verify:   {}/{} positions restored exactly", rewind.history_size() - failures, rewind.history_size());

    let target = arg_value(&args, "--rewind").unwrap_or(rewind.history().oldest_position());
    match rewind.rewind_to(&mut machine, target) {
        Ok(()) => println!("Rewind:   position {} -> frame {} (history now {} records)",
            target, machine.frame, rewind.history_size()),
        Err(e @ RewindError::OutOfRange { .. }) => println!("Rewind:   {}", e),
        Err(e) => { eprintln!("Error: {}", e); std::process::exit(1); }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
