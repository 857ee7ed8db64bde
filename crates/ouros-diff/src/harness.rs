//! The differential fuzz entry point.
//!
//! [`Harness::check`] takes one raw fuzz input and returns either a
//! [`Verdict`] the fuzzing engine can keep going with, or a
//! [`DivergenceReport`] that should stop the run.

use std::{fmt, time::Duration};

use crate::{
    classify::{self, Case},
    config::HarnessConfig,
    deadline::Deadline,
    dialect::{self, Dialect},
    executor::{Interpreter, OurosInterpreter, Status},
    filter::{InputFilter, Screen, SkipReason},
    oracle::{self, Consensus, Oracle, OracleVerdict},
    report::DivergenceReport,
};

/// Why an input that passed the filter still turned out uninteresting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    /// Ouros rejected the program at compile time, dialect gate included.
    CompileError,
    /// Ouros compiled the program but it raised while running.
    RuntimeError,
    /// Ouros did not finish before the primary deadline.
    PrimaryTimeout,
    /// An oracle did not finish before the outer deadline.
    OracleTimeout,
    /// Every oracle that ran rejected, but at least one could not be started.
    OracleUnavailable,
}

impl fmt::Display for Dismissal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CompileError => "compile error",
            Self::RuntimeError => "runtime error",
            Self::PrimaryTimeout => "primary timed out",
            Self::OracleTimeout => "oracle timed out",
            Self::OracleUnavailable => "oracle unavailable",
        })
    }
}

/// Non-fatal outcome of one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Rejected by the input filter or the left-shift guard; nothing was run.
    Skip(SkipReason),
    /// Reached Ouros but is of no use for cross-validation.
    Uninteresting(Dismissal),
    /// Ouros and at least one oracle accepted the program.
    Interesting,
    /// Every oracle rejected, matching the named suppression rule.
    Suppressed(&'static str),
}

impl Verdict {
    /// Whether the fuzzing engine should keep this input in its corpus.
    #[must_use]
    pub fn is_interesting(&self) -> bool {
        matches!(self, Self::Interesting | Self::Suppressed(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip(reason) => write!(f, "skipped: {reason}"),
            Self::Uninteresting(dismissal) => write!(f, "uninteresting: {dismissal}"),
            Self::Interesting => f.write_str("interesting"),
            Self::Suppressed(rule) => write!(f, "known divergence: {rule}"),
        }
    }
}

/// Runs raw fuzz inputs through filter, dialect, Ouros, oracles and classifier.
///
/// The harness remembers the dialect decoded from the last non-empty input so an
/// empty input runs under it, but each iteration otherwise derives its dialect
/// from its own header byte.
pub struct Harness<I = OurosInterpreter> {
    filter: InputFilter,
    interpreter: I,
    oracles: Vec<Box<dyn Oracle>>,
    primary_timeout: Duration,
    oracle_timeout: Duration,
    dialect_mask: u8,
    dialect: Dialect,
}

impl Harness<OurosInterpreter> {
    /// Builds a harness around a fresh [`OurosInterpreter`] and the configured oracles.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::with_interpreter(config, OurosInterpreter::new(config.predeclared.clone()))
    }
}

impl<I: Interpreter> Harness<I> {
    #[must_use]
    pub fn with_interpreter(config: &HarnessConfig, interpreter: I) -> Self {
        let oracles = config
            .oracles
            .iter()
            .map(|spec| Box::new(spec.build()) as Box<dyn Oracle>)
            .collect();
        Self::with_parts(config, interpreter, oracles)
    }

    /// Builds a harness from explicit parts. The oracle list in `config` is ignored.
    #[must_use]
    pub fn with_parts(config: &HarnessConfig, interpreter: I, oracles: Vec<Box<dyn Oracle>>) -> Self {
        Self {
            filter: InputFilter::new(config.known_gaps.clone()),
            interpreter,
            oracles,
            primary_timeout: config.primary_timeout(),
            oracle_timeout: config.oracle_timeout(),
            dialect_mask: config.dialect_mask,
            dialect: Dialect::default(),
        }
    }

    /// The dialect the most recent non-empty input selected.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Runs one fuzz iteration.
    ///
    /// # Errors
    /// Returns a [`DivergenceReport`] when Ouros accepted a program that every
    /// oracle rejected and no suppression rule recognised the rejection.
    pub fn check(&mut self, raw: &[u8]) -> Result<Verdict, DivergenceReport> {
        if let Screen::Skip(reason) = self.filter.screen(raw) {
            tracing::trace!(%reason, "input skipped");
            return Ok(Verdict::Skip(reason));
        }

        let configured = dialect::configure(raw, self.dialect, self.dialect_mask);
        self.dialect = configured.dialect;
        if configured.left_shift_guard() {
            tracing::trace!(dialect = %configured.dialect, "input skipped: left shift");
            return Ok(Verdict::Skip(SkipReason::LeftShift));
        }

        // the oracle deadline encloses the primary one
        let outer = Deadline::after(self.oracle_timeout);
        let primary = self
            .interpreter
            .execute(configured.source, configured.dialect, outer.child(self.primary_timeout));
        let dismissal = match primary.status {
            Status::Accepted => None,
            Status::CompileError => Some(Dismissal::CompileError),
            Status::RuntimeError => Some(Dismissal::RuntimeError),
            Status::TimedOut => Some(Dismissal::PrimaryTimeout),
        };
        if let Some(dismissal) = dismissal {
            tracing::trace!(%dismissal, error = ?primary.error, "ouros did not accept");
            return Ok(Verdict::Uninteresting(dismissal));
        }

        if self.oracles.is_empty() {
            return Ok(Verdict::Interesting);
        }

        let results = match oracle::consult(&self.oracles, configured.source, outer) {
            Consensus::Accepted(result) => {
                tracing::trace!(oracle = %result.oracle, "accepted by ouros and oracle");
                return Ok(Verdict::Interesting);
            }
            Consensus::DontCare(results) => {
                let dismissal = if results.iter().any(|result| result.verdict == OracleVerdict::TimedOut) {
                    Dismissal::OracleTimeout
                } else {
                    Dismissal::OracleUnavailable
                };
                tracing::trace!(%dismissal, "oracle stage inconclusive");
                return Ok(Verdict::Uninteresting(dismissal));
            }
            Consensus::Rejected(results) => results,
        };

        let case = Case::new(configured.source, &primary, &results);
        if let Some(rule) = classify::classify(&case) {
            tracing::debug!(rule = rule.name, "known divergence suppressed");
            return Ok(Verdict::Suppressed(rule.name));
        }

        let report = DivergenceReport::new(raw, configured.dialect, primary, results);
        tracing::error!(summary = %report.summary(), "unclassified divergence");
        Err(report)
    }
}

impl<I: fmt::Debug> fmt::Debug for Harness<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let oracles: Vec<&str> = self.oracles.iter().map(|oracle| oracle.name()).collect();
        f.debug_struct("Harness")
            .field("interpreter", &self.interpreter)
            .field("oracles", &oracles)
            .field("primary_timeout", &self.primary_timeout)
            .field("oracle_timeout", &self.oracle_timeout)
            .field("dialect_mask", &self.dialect_mask)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}
