//! Tests for corpus loading and the race-stress harness.

use std::{
    collections::BTreeSet,
    fs,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use ouros_diff::{
    Deadline, Dialect, ExecutionResult, FrozenModule, HarnessError, Interpreter, OurosInterpreter, RaceHarness,
    RaceSummary, race::load_corpus,
};
use pretty_assertions::assert_eq;

fn corpus_dir(entries: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, data) in entries {
        fs::write(dir.path().join(name), data).unwrap();
    }
    dir
}

// =============================================================================
// 1. Corpus loading
// =============================================================================

#[test]
fn corpus_entries_lose_their_header_byte() {
    let dir = corpus_dir(&[("b", "\x3fy = 2"), ("a", "\x00x = 1"), ("c", "")]);
    fs::create_dir(dir.path().join("nested")).unwrap();

    let programs = load_corpus(dir.path()).unwrap();
    assert_eq!(programs, [b"x = 1".to_vec(), b"y = 2".to_vec(), Vec::new()]);
}

#[test]
fn missing_corpus_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_corpus(dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, HarnessError::Corpus { .. }), "{err}");
}

#[test]
fn empty_corpus_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_corpus(dir.path()).unwrap_err();
    assert!(matches!(err, HarnessError::EmptyCorpus(_)), "{err}");
}

// =============================================================================
// 2. Concurrent execution
// =============================================================================

/// Accepts everything and records which dialect and thread ran it.
#[derive(Default)]
struct Recording {
    executions: AtomicUsize,
    dialects: Mutex<BTreeSet<u8>>,
    threads: Mutex<BTreeSet<String>>,
}

impl Interpreter for Recording {
    fn execute(&self, _source: &[u8], dialect: Dialect, _deadline: Deadline) -> ExecutionResult {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.dialects.lock().unwrap().insert(dialect.header());
        let name = thread::current().name().unwrap_or_default().to_owned();
        self.threads.lock().unwrap().insert(name);
        ExecutionResult::accepted(String::new(), FrozenModule::default())
    }
}

#[test]
fn every_program_runs_every_round_on_its_own_thread() {
    let programs = vec![b"x = 1".to_vec(), b"y = 2".to_vec(), b"z = 3".to_vec()];
    let harness = RaceHarness::new(Recording::default(), programs);
    let summary = harness.run(4).unwrap();
    assert_eq!(
        summary,
        RaceSummary {
            executions: 12,
            accepted: 12,
        }
    );
}

#[test]
fn workers_share_one_interpreter() {
    let recording = Recording::default();
    let harness = RaceHarness::new(&recording, vec![b"x = 1".to_vec(), b"y = 2".to_vec()]);
    harness.run(2).unwrap();

    assert_eq!(recording.executions.load(Ordering::Relaxed), 4);
    let threads = recording.threads.lock().unwrap().clone();
    assert_eq!(threads, BTreeSet::from(["race-0".to_owned(), "race-1".to_owned()]));
}

/// Every optional feature is on for race runs; recursion stays off.
#[test]
fn race_runs_enable_every_feature() {
    let recording = Recording::default();
    let harness = RaceHarness::new(&recording, vec![b"x = 1".to_vec()]);
    assert_eq!(harness.dialect(), Dialect::all_features());
    assert!(!harness.dialect().recursion);

    harness.run(1).unwrap();
    assert_eq!(*recording.dialects.lock().unwrap(), BTreeSet::from([0b0011_1111]));
}

#[test]
fn zero_rounds_runs_nothing() {
    let harness = RaceHarness::new(Recording::default(), vec![b"x = 1".to_vec()]);
    assert_eq!(harness.run(0).unwrap(), RaceSummary::default());
}

#[test]
fn ouros_runs_a_corpus_concurrently() {
    let dir = corpus_dir(&[
        ("accepted-1", "\x00x = [1, 2]\nprint(len(x))"),
        ("accepted-2", "\x01y = 1.5 / 2"),
        ("broken", "\x00x = ("),
    ]);
    let programs = load_corpus(dir.path()).unwrap();
    let harness = RaceHarness::new(OurosInterpreter::default(), programs);
    let summary = harness.run(3).unwrap();
    assert_eq!(
        summary,
        RaceSummary {
            executions: 9,
            accepted: 6,
        }
    );
}
