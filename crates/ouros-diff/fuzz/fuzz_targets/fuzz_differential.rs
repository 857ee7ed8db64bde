//! Fuzz target: differential check of Ouros against the configured reference
//! interpreters.
//!
//! Inputs that are skipped or dismissed are rejected from the corpus; inputs
//! that Ouros and an oracle both accept are kept. An unclassified divergence
//! panics with the full report so libFuzzer saves the input as a crash.
//!
//! Configuration is read once from `OUROS_DIFF_CONFIG` / `OUROS_DIFF_PROFILE`.

#![no_main]

use std::cell::RefCell;

use libfuzzer_sys::{Corpus, fuzz_target};
use ouros_diff::{Harness, HarnessConfig};
use tracing_subscriber::EnvFilter;

thread_local! {
    static HARNESS: RefCell<Harness> = RefCell::new(new_harness());
}

fn new_harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("OUROS_DIFF_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
    let config = HarnessConfig::from_env().unwrap_or_else(|err| panic!("invalid harness configuration: {err}"));
    Harness::from_config(&config)
}

fuzz_target!(|data: &[u8]| -> Corpus {
    let outcome = HARNESS.with_borrow_mut(|harness| harness.check(data));
    match outcome {
        Ok(verdict) if verdict.is_interesting() => Corpus::Keep,
        Ok(_) => Corpus::Reject,
        Err(report) => panic!("{report}"),
    }
});
