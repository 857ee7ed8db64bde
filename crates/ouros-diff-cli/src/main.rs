//! Replays stored fuzz inputs through the differential harness for triage.

use std::{env, fs, process::ExitCode, time::Instant};

use ouros_diff::{Harness, HarnessConfig};
use ouros_diff_cli::init_tracing;

fn main() -> ExitCode {
    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: ouros-diff <input>...");
        return ExitCode::FAILURE;
    }
    if let Err(err) = init_tracing() {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut harness = Harness::from_config(&config);

    let mut failed = false;
    for path in &paths {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) => {
                eprintln!("error reading {path}: {err}");
                failed = true;
                continue;
            }
        };

        let start = Instant::now();
        match harness.check(&raw) {
            Ok(verdict) => {
                let elapsed = start.elapsed();
                println!("{path}: {verdict} ({elapsed:?})");
            }
            Err(report) => {
                let elapsed = start.elapsed();
                println!("{path}: divergence ({elapsed:?})\n{report}");
                failed = true;
            }
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
