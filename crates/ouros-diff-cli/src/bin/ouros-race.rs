//! Re-executes a corpus of accepted programs concurrently, forever or for a
//! fixed number of rounds, so a race detector can watch shared interpreter state.
//!
//! Usage: `ouros-race [corpus-dir] [--rounds N]`

use std::{env, process::ExitCode};

use ouros_diff::{HarnessConfig, OurosInterpreter, RaceHarness, race};
use ouros_diff_cli::init_tracing;

const DEFAULT_CORPUS: &str = "./corpus";

fn main() -> ExitCode {
    let (corpus, rounds) = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}\nusage: ouros-race [corpus-dir] [--rounds N]");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_tracing() {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let setup = HarnessConfig::from_env().and_then(|config| {
        let programs = race::load_corpus(&corpus)?;
        Ok(RaceHarness::new(OurosInterpreter::new(config.predeclared), programs))
    });
    let harness = match setup {
        Ok(harness) => harness,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match rounds {
        Some(rounds) => match harness.run(rounds) {
            Ok(summary) => {
                eprintln!(
                    "{} executions, {} accepted, across {} programs",
                    summary.executions,
                    summary.accepted,
                    harness.programs().len()
                );
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        None => match harness.run_forever() {
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(String, Option<usize>), String> {
    let mut corpus = None;
    let mut rounds = None;
    while let Some(arg) = args.next() {
        if arg == "--rounds" {
            let value = args.next().ok_or("--rounds needs a value")?;
            let parsed = value
                .parse::<usize>()
                .map_err(|err| format!("invalid --rounds value {value:?}: {err}"))?;
            rounds = Some(parsed);
        } else if corpus.is_none() {
            corpus = Some(arg);
        } else {
            return Err(format!("unexpected argument {arg:?}"));
        }
    }
    Ok((corpus.unwrap_or_else(|| DEFAULT_CORPUS.to_owned()), rounds))
}
