#![doc = include_str!("../../../README.md")]
//!
//! # Pipeline
//!
//! Every fuzz iteration flows strictly forward through the same stages:
//!
//! 1. [`filter`] rejects structurally uninteresting inputs before any parsing.
//! 2. [`dialect`] decodes the header byte into feature flags and strips it.
//! 3. [`executor`] compiles and runs the program in Ouros under a short deadline.
//! 4. [`oracle`] runs the reference interpreters as subprocesses under a longer,
//!    enclosing deadline, but only when Ouros accepted the program.
//! 5. [`classify`] matches unanimous rejections against known divergences, and
//!    anything unmatched becomes a [`DivergenceReport`].
//!
//! [`harness::Harness`] wires the stages together; [`race`] is the separate
//! concurrency-stress entry point.

pub mod classify;
pub mod config;
pub mod deadline;
pub mod dialect;
mod error;
pub mod executor;
pub mod filter;
pub mod harness;
pub mod oracle;
pub mod race;
mod report;

pub use crate::{
    classify::{Case, RULES, SuppressionRule},
    config::{HarnessConfig, OracleSpec, Profile},
    deadline::Deadline,
    dialect::{Configured, Dialect, DialectError},
    error::HarnessError,
    executor::{ExecutionResult, FrozenModule, Interpreter, OurosInterpreter, Status},
    filter::{InputFilter, Screen, SkipReason},
    harness::{Dismissal, Harness, Verdict},
    oracle::{CommandOracle, Consensus, Oracle, OracleResult, OracleVerdict, SourceMode},
    race::{RaceHarness, RaceSummary},
    report::DivergenceReport,
};
