//! Reference interpreters run as external processes.
//!
//! An oracle only reports an exit status and its combined output. Nothing
//! outside [`classify`](crate::classify) ever looks at what the output says.

#[cfg(unix)]
use std::os::unix::process::CommandExt as _;
use std::{
    ffi::OsString,
    fmt,
    io::{self, Read, Write as _},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::Duration,
};

use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::deadline::Deadline;

/// How often a running oracle is polled for exit or deadline expiry.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How an oracle receives the program source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// As the final command-line argument, e.g. `python3 -c <source>`.
    #[default]
    Inline,
    /// As the path of a temporary file holding the source, e.g. `python3 <path>`.
    TempFile,
}

/// What one oracle said about a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleVerdict {
    /// Exited successfully.
    Accepted,
    /// Exited unsuccessfully. `code` is `None` when killed by a signal.
    Rejected { code: Option<i32> },
    /// Still running when the deadline expired, and was killed.
    TimedOut,
    /// Could not be started at all.
    Unavailable(String),
}

impl fmt::Display for OracleVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected { code: Some(code) } => write!(f, "rejected (exit status {code})"),
            Self::Rejected { code: None } => f.write_str("rejected (terminated by signal)"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

/// One oracle's identity, verdict and captured stdout followed by stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    pub oracle: String,
    pub verdict: OracleVerdict,
    pub output: Vec<u8>,
}

impl OracleResult {
    #[must_use]
    pub fn new(oracle: impl Into<String>, verdict: OracleVerdict, output: impl Into<Vec<u8>>) -> Self {
        Self {
            oracle: oracle.into(),
            verdict,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// A reference interpreter.
pub trait Oracle {
    /// Declared identity, e.g. `python3`.
    fn name(&self) -> &str;

    /// Runs `source` to completion or until `deadline`, whichever comes first.
    fn run(&self, source: &[u8], deadline: Deadline) -> OracleResult;
}

/// An [`Oracle`] invoked as `program [args...] <source-or-path>`.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    name: String,
    program: OsString,
    args: Vec<OsString>,
    source_mode: SourceMode,
}

impl CommandOracle {
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            source_mode: SourceMode::Inline,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn source_mode(mut self, source_mode: SourceMode) -> Self {
        self.source_mode = source_mode;
        self
    }

    /// Writes `source` to a fresh temporary file. The file is removed when the
    /// returned handle drops, on every exit path.
    fn write_temp_file(source: &[u8]) -> io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new().prefix("ouros-diff-").suffix(".py").tempfile()?;
        file.write_all(source)?;
        file.flush()?;
        Ok(file)
    }

    fn result(&self, verdict: OracleVerdict, output: Vec<u8>) -> OracleResult {
        OracleResult::new(self.name.clone(), verdict, output)
    }
}

impl Oracle for CommandOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, source: &[u8], deadline: Deadline) -> OracleResult {
        if deadline.expired() {
            return self.result(OracleVerdict::TimedOut, Vec::new());
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // its own process group, so a timeout can kill everything it started
        #[cfg(unix)]
        command.process_group(0);

        // must outlive the child
        let _temp_file = match self.source_mode {
            SourceMode::Inline => {
                command.arg(String::from_utf8_lossy(source).into_owned());
                None
            }
            SourceMode::TempFile => match Self::write_temp_file(source) {
                Ok(file) => {
                    command.arg(file.path());
                    Some(file)
                }
                Err(err) => {
                    let reason = format!("failed to write temporary source file: {err}");
                    tracing::warn!(oracle = %self.name, %reason, "oracle unavailable");
                    return self.result(OracleVerdict::Unavailable(reason), Vec::new());
                }
            },
        };

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                let reason = format!("failed to spawn {:?}: {err}", self.program);
                tracing::warn!(oracle = %self.name, %reason, "oracle unavailable");
                return self.result(OracleVerdict::Unavailable(reason), Vec::new());
            }
        };

        let (sender, receiver) = mpsc::channel();
        drain(Pipe::Stdout, child.stdout.take(), sender.clone());
        drain(Pipe::Stderr, child.stderr.take(), sender);

        match wait_until(&mut child, deadline) {
            Ok(Some(status)) => {
                // background descendants would otherwise keep the pipes open
                kill_group(&child);
                let output = collect(&receiver, deadline);
                let verdict = if status.success() {
                    OracleVerdict::Accepted
                } else {
                    OracleVerdict::Rejected { code: status.code() }
                };
                self.result(verdict, output)
            }
            // the whole group was killed, so the readers see the pipes close
            // shortly; their output is discarded
            Ok(None) => self.result(OracleVerdict::TimedOut, Vec::new()),
            Err(err) => {
                let reason = format!("failed to wait for {:?}: {err}", self.program);
                tracing::warn!(oracle = %self.name, %reason, "oracle unavailable");
                self.result(OracleVerdict::Unavailable(reason), Vec::new())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Reads a child pipe to the end on a separate thread so neither pipe can fill
/// up and block the child. The contents are sent once the pipe closes.
fn drain(pipe: Pipe, reader: Option<impl Read + Send + 'static>, sender: Sender<(Pipe, Vec<u8>)>) {
    let Some(mut reader) = reader else {
        let _ = sender.send((pipe, Vec::new()));
        return;
    };
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        let _ = sender.send((pipe, buffer));
    });
}

/// Gathers stdout followed by stderr. A pipe still open at `deadline`
/// contributes nothing.
fn collect(receiver: &Receiver<(Pipe, Vec<u8>)>, deadline: Deadline) -> Vec<u8> {
    let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
    for _ in 0..2 {
        let message = match deadline.remaining() {
            Some(remaining) => receiver.recv_timeout(remaining).ok(),
            None => receiver.try_recv().ok(),
        };
        match message {
            Some((Pipe::Stdout, data)) => stdout = data,
            Some((Pipe::Stderr, data)) => stderr = data,
            None => break,
        }
    }
    stdout.extend(stderr);
    stdout
}

/// Waits for `child` to exit. Returns `Ok(None)` when the deadline expired
/// first, in which case the child has been killed and reaped.
fn wait_until(child: &mut Child, deadline: Deadline) -> io::Result<Option<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(err) => {
                terminate_and_reap(child);
                return Err(err);
            }
        }
        let Some(remaining) = deadline.remaining() else {
            terminate_and_reap(child);
            return Ok(None);
        };
        thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

fn terminate_and_reap(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Kills every process left in the oracle's process group.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::{
        sys::signal::{self, Signal},
        unistd::Pid,
    };

    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = signal::killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Combined verdict of the ordered oracle list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consensus {
    /// Some oracle accepted the program. Later oracles were not consulted.
    Accepted(OracleResult),
    /// Every configured oracle ran and rejected the program.
    Rejected(Vec<OracleResult>),
    /// A deadline expired, an oracle could not run, or no oracle is configured.
    DontCare(Vec<OracleResult>),
}

/// Consults `oracles` in order under the shared `deadline`.
///
/// The first acceptance ends the consultation. A timeout makes the whole stage
/// "don't care". An oracle that cannot be started has no vote, so escalation
/// requires every configured oracle to have actually run and rejected.
pub fn consult<O: Oracle + ?Sized>(oracles: &[Box<O>], source: &[u8], deadline: Deadline) -> Consensus {
    let mut results = Vec::with_capacity(oracles.len());
    let mut unanimous = !oracles.is_empty();
    for oracle in oracles {
        let result = oracle.run(source, deadline);
        match result.verdict {
            OracleVerdict::Accepted => return Consensus::Accepted(result),
            OracleVerdict::Rejected { .. } => results.push(result),
            OracleVerdict::TimedOut => {
                results.push(result);
                return Consensus::DontCare(results);
            }
            OracleVerdict::Unavailable(_) => {
                unanimous = false;
                results.push(result);
            }
        }
    }
    if unanimous {
        Consensus::Rejected(results)
    } else {
        Consensus::DontCare(results)
    }
}
