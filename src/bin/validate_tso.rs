// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Local validation binary for the TSO pipeline.
//!
//! Runs an in-process server, drives it from several client threads, and
//! reports throughput, decision mix, and monotonicity.
//!
//! Usage:
//!   ./validate_tso [--clients N] [--ops N] [--dir PATH]

use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use cesiumtso::{MpscReplyChannel, Reply, TsoConfig, TsoServer, WaitStrategy};

struct Options {
    clients: usize,
    ops: u64,
    dir: String,
}

fn parse_args() -> Options {
    let mut options = Options {
        clients: 4,
        ops: 100_000,
        dir: "./tso-validate".to_string(),
    };

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                if let Some(value) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                    options.clients = value;
                }
                i += 2;
            }
            "--ops" => {
                if let Some(value) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                    options.ops = value;
                }
                i += 2;
            }
            "--dir" => {
                if let Some(value) = args.get(i + 1) {
                    options.dir = value.clone();
                }
                i += 2;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }
    options
}

fn recv(rx: &Receiver<Reply>) -> Reply {
    rx.recv_timeout(Duration::from_secs(10))
        .expect("no reply within 10s")
}

fn main() {
    let options = parse_args();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  CesiumTSO Pipeline Validation");
    println!("═══════════════════════════════════════════════════════════════\n");
    println!(
        "  clients: {}   ops/client: {}   data dir: {}\n",
        options.clients, options.ops, options.dir
    );

    let config = TsoConfig::new(&options.dir).with_wait_strategy(WaitStrategy::Yield);
    let server = match TsoServer::start(config) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("failed to start server: {err}");
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let workers: Vec<_> = (0..options.clients)
        .map(|c| {
            let handle = server.handle();
            let ops = options.ops;
            std::thread::spawn(move || {
                let (client, rx) = MpscReplyChannel::new();
                let mut commits = 0u64;
                let mut aborts = 0u64;
                let mut monotonic = true;
                let mut last_ts = 0u64;

                for i in 0..ops {
                    handle.timestamp_request(client.clone());
                    let Reply::Timestamp { ts } = recv(&rx) else {
                        panic!("expected timestamp reply");
                    };
                    if ts <= last_ts {
                        monotonic = false;
                    }
                    last_ts = ts;

                    let row = (c as u64) << 48 | i % 4096;
                    handle.commit_request(ts, &[row], false, client.clone());
                    match recv(&rx) {
                        Reply::Commit { commit_ts, .. } => {
                            if commit_ts <= last_ts {
                                monotonic = false;
                            }
                            last_ts = commit_ts;
                            commits += 1;
                        }
                        Reply::Abort { .. } => aborts += 1,
                        other => panic!("unexpected reply {other:?}"),
                    }
                }
                (commits, aborts, monotonic)
            })
        })
        .collect();

    let mut commits = 0u64;
    let mut aborts = 0u64;
    let mut monotonic = true;
    for worker in workers {
        let (c, a, m) = worker.join().expect("client thread panicked");
        commits += c;
        aborts += a;
        monotonic &= m;
    }
    let elapsed = start.elapsed();

    let total_requests = options.clients as u64 * options.ops * 2;
    println!("── Results ─────────────────────────────────────────────────────\n");
    println!("  requests:    {}", total_requests);
    println!("  commits:     {}", commits);
    println!("  aborts:      {}", aborts);
    println!("  elapsed:     {:.2}s", elapsed.as_secs_f64());
    println!(
        "  throughput:  {:.0} req/s",
        total_requests as f64 / elapsed.as_secs_f64()
    );
    if monotonic {
        println!("  ✓ per-client timestamps strictly increasing");
    } else {
        println!("  ✗ monotonicity violation detected!");
    }

    println!("\n{}", server.metrics().report());
    server.shutdown();

    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  Validation Complete");
    println!("═══════════════════════════════════════════════════════════════");

    if !monotonic {
        std::process::exit(1);
    }
}
