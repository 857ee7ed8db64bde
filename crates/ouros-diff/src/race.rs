//! Concurrency stress over a corpus of known-accepted programs.
//!
//! Every corpus entry is executed over and over on its own thread, all threads
//! sharing one interpreter value. There is no verdict: the point is to give a
//! data-race detector (or a sanitizer build) concurrent executions to watch.

use std::{
    convert::Infallible,
    fs, io,
    path::Path,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use crate::{deadline::Deadline, dialect::Dialect, error::HarnessError, executor::Interpreter};

/// Deadline for a single execution of a corpus entry.
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads every regular file in `dir`, sorted by file name, stripping the first
/// byte of each as leftover dialect-header framing.
///
/// # Errors
/// Fails if the directory or any entry cannot be read, or if it holds no files.
pub fn load_corpus(dir: impl AsRef<Path>) -> Result<Vec<Vec<u8>>, HarnessError> {
    let dir = dir.as_ref();
    let corpus_error = |path: &Path| {
        let path = path.to_owned();
        move |source: io::Error| HarnessError::Corpus { path, source }
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(corpus_error(dir))? {
        let entry = entry.map_err(corpus_error(dir))?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut programs = Vec::with_capacity(paths.len());
    for path in &paths {
        let mut data = fs::read(path).map_err(corpus_error(path))?;
        if !data.is_empty() {
            data.remove(0);
        }
        programs.push(data);
    }

    if programs.is_empty() {
        return Err(HarnessError::EmptyCorpus(dir.to_owned()));
    }
    Ok(programs)
}

/// Counts from a finite race run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaceSummary {
    pub executions: usize,
    pub accepted: usize,
}

/// Runs a corpus concurrently against one shared interpreter.
#[derive(Debug)]
pub struct RaceHarness<I> {
    interpreter: I,
    programs: Vec<Vec<u8>>,
    dialect: Dialect,
}

impl<I: Interpreter + Sync> RaceHarness<I> {
    /// Every optional feature is enabled except recursion.
    #[must_use]
    pub fn new(interpreter: I, programs: Vec<Vec<u8>>) -> Self {
        Self {
            interpreter,
            programs,
            dialect: Dialect::all_features(),
        }
    }

    #[must_use]
    pub fn programs(&self) -> &[Vec<u8>] {
        &self.programs
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Executes every program `rounds` times, each program on its own thread.
    ///
    /// # Errors
    /// Fails if a worker thread cannot be started. Workers already running stop
    /// after their current execution.
    pub fn run(&self, rounds: usize) -> Result<RaceSummary, HarnessError> {
        self.drive(Some(rounds))
    }

    /// Executes every program on its own thread until the process is killed.
    ///
    /// # Errors
    /// Only returns if a worker thread cannot be started.
    pub fn run_forever(&self) -> Result<Infallible, HarnessError> {
        loop {
            self.drive(None)?;
        }
    }

    fn drive(&self, rounds: Option<usize>) -> Result<RaceSummary, HarnessError> {
        tracing::info!(
            programs = self.programs.len(),
            dialect = %self.dialect,
            rounds = ?rounds,
            "race harness starting"
        );
        let stop = AtomicBool::new(false);
        let executions = AtomicUsize::new(0);
        let accepted = AtomicUsize::new(0);

        thread::scope(|scope| {
            for (index, program) in self.programs.iter().enumerate() {
                let (stop, executions, accepted) = (&stop, &executions, &accepted);
                let worker = move || {
                    let mut round = 0;
                    while rounds.is_none_or(|rounds| round < rounds) && !stop.load(Ordering::Relaxed) {
                        let deadline = Deadline::after(EXECUTION_TIMEOUT);
                        let result = self.interpreter.execute(program, self.dialect, deadline);
                        executions.fetch_add(1, Ordering::Relaxed);
                        if result.is_accepted() {
                            accepted.fetch_add(1, Ordering::Relaxed);
                        }
                        round += 1;
                    }
                };
                if let Err(err) = thread::Builder::new()
                    .name(format!("race-{index}"))
                    .spawn_scoped(scope, worker)
                {
                    stop.store(true, Ordering::Relaxed);
                    return Err(HarnessError::Spawn(err));
                }
            }
            Ok(())
        })?;

        Ok(RaceSummary {
            executions: executions.into_inner(),
            accepted: accepted.into_inner(),
        })
    }
}
