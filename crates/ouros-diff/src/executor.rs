//! The primary executor: compiles and runs a program in the interpreter under test.
//!
//! The interpreter is a black box behind [`Interpreter`]. The harness only needs
//! to know whether the program compiled, whether it ran to completion before its
//! deadline, and what it printed.

use std::fmt;

use ouros::{CollectStringPrint, ExcType, LimitedTracker, Object, ReplError, ReplSession, ResourceError, ResourceLimits};

use crate::{
    deadline::Deadline,
    dialect::{self, Dialect},
};

/// Script name reported in interpreter error messages.
pub const SCRIPT_NAME: &str = "fuzzy.py";

/// Heap limit for one execution. Programs that exceed it fail with a resource
/// error, which is uninteresting in the same way a timeout is.
pub const MAX_MEMORY: usize = 256 * 1024 * 1024;

/// How far one program got through the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Compiled, resolved and ran to completion.
    Accepted,
    /// Rejected before execution started: syntax, dialect or resolution.
    CompileError,
    /// Compiled, then raised an error while running.
    RuntimeError,
    /// The enclosing deadline expired before execution finished.
    TimedOut,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::CompileError => "compile error",
            Self::RuntimeError => "runtime error",
            Self::TimedOut => "timed out",
        })
    }
}

/// Outcome of running one program through the interpreter under test.
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: Status,
    /// Everything the program printed before it finished or failed.
    pub output: String,
    /// The failure detail, opaque to the harness.
    pub error: Option<String>,
    /// The frozen top-level environment, present only when the program was accepted.
    pub module: Option<FrozenModule>,
}

impl ExecutionResult {
    #[must_use]
    pub fn accepted(output: String, module: FrozenModule) -> Self {
        Self {
            status: Status::Accepted,
            output,
            error: None,
            module: Some(module),
        }
    }

    #[must_use]
    pub fn compile_error(error: String) -> Self {
        Self {
            status: Status::CompileError,
            output: String::new(),
            error: Some(error),
            module: None,
        }
    }

    #[must_use]
    pub fn runtime_error(output: String, error: String) -> Self {
        Self {
            status: Status::RuntimeError,
            output,
            error: Some(error),
            module: None,
        }
    }

    #[must_use]
    pub fn timed_out(output: String) -> Self {
        Self {
            status: Status::TimedOut,
            output,
            error: None,
            module: None,
        }
    }

    /// Whether compile, resolve and execute all succeeded.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == Status::Accepted
    }

    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.status == Status::TimedOut
    }
}

/// Read-only snapshot of a program's top-level environment after it ran.
///
/// Built once from the session and never mutated again; the session itself is
/// dropped straight after freezing.
#[derive(Debug, Default)]
pub struct FrozenModule {
    globals: Box<[(String, Object)]>,
}

impl FrozenModule {
    /// Snapshots every defined global of `session`, sorted by name.
    #[must_use]
    pub fn freeze(session: &ReplSession) -> Self {
        let globals = session
            .list_variables()
            .into_iter()
            .filter_map(|(name, _type_name)| session.get_variable(&name).map(|value| (name, value)))
            .collect();
        Self { globals }
    }

    /// Returns the value bound to `name`, if the program defined it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.globals
            .iter()
            .find_map(|(global, value)| (global == name).then_some(value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(|(name, _)| name.as_str())
    }
}

/// The interpreter under test, as seen by the harness.
///
/// Implementations compile `source` under `dialect`, resolve it against their
/// predeclared globals, and run it with output captured in memory. They must
/// report [`Status::TimedOut`] rather than block past `deadline`.
pub trait Interpreter {
    fn execute(&self, source: &[u8], dialect: Dialect, deadline: Deadline) -> ExecutionResult;
}

impl<T: Interpreter + ?Sized> Interpreter for &T {
    fn execute(&self, source: &[u8], dialect: Dialect, deadline: Deadline) -> ExecutionResult {
        (**self).execute(source, dialect, deadline)
    }
}

/// [`Interpreter`] backed by a fresh Ouros [`ReplSession`] per program.
#[derive(Debug, Clone)]
pub struct OurosInterpreter {
    /// Global names the program may reference without defining them.
    predeclared: Vec<String>,
}

impl Default for OurosInterpreter {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl OurosInterpreter {
    #[must_use]
    pub fn new(predeclared: Vec<String>) -> Self {
        Self { predeclared }
    }

    #[must_use]
    pub fn predeclared(&self) -> &[String] {
        &self.predeclared
    }
}

impl Interpreter for OurosInterpreter {
    fn execute(&self, source: &[u8], dialect: Dialect, deadline: Deadline) -> ExecutionResult {
        let source = match std::str::from_utf8(source) {
            Ok(source) => source,
            Err(err) => return ExecutionResult::compile_error(format!("source is not valid UTF-8: {err}")),
        };
        if let Err(err) = dialect::check(source, dialect) {
            return ExecutionResult::compile_error(err.to_string());
        }
        let Some(remaining) = deadline.remaining() else {
            return ExecutionResult::timed_out(String::new());
        };

        let mut session = ReplSession::new_with_resource_limits(
            self.predeclared.clone(),
            SCRIPT_NAME,
            ResourceLimits::new().max_memory(MAX_MEMORY),
        );
        let tracker = LimitedTracker::new(ResourceLimits::new().max_duration(remaining));
        let mut print = CollectStringPrint::new();
        let result = session.execute_with_limits(source, tracker, &mut print);
        let output = print.into_output();

        match result {
            Ok(_) => {
                let module = FrozenModule::freeze(&session);
                ExecutionResult::accepted(output, module)
            }
            Err(err @ (ReplError::Parse(_) | ReplError::Compile(_))) => ExecutionResult::compile_error(err.to_string()),
            Err(err) if deadline.expired() || is_time_limit(&err) => ExecutionResult::timed_out(output),
            Err(err) => ExecutionResult::runtime_error(output, err.to_string()),
        }
    }
}

fn is_time_limit(err: &ReplError) -> bool {
    match err {
        ReplError::Resource(ResourceError::Time { .. }) => true,
        ReplError::Runtime(exc) => exc.exc_type() == ExcType::TimeoutError,
        _ => false,
    }
}
