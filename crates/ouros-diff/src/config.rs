//! Harness configuration: deadlines, oracles, dialect mask and known gaps.
//!
//! Two built-in profiles cover the usual setups. A JSON file can override any
//! field; fields it leaves out keep their differential-profile values.

use std::{env, fmt, fs, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;

use crate::{
    error::HarnessError,
    oracle::{CommandOracle, SourceMode},
};

/// Names a JSON configuration file. Takes precedence over [`PROFILE_ENV`].
pub const CONFIG_ENV: &str = "OUROS_DIFF_CONFIG";

/// Selects a built-in profile when no configuration file is given.
pub const PROFILE_ENV: &str = "OUROS_DIFF_PROFILE";

/// A built-in configuration preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Profile {
    /// Long deadlines, inline `python3` then `pypy3`, every dialect flag reachable.
    #[default]
    Differential,
    /// Short deadlines, one `python3` reading a temporary file, core language only.
    Interactive,
}

impl Profile {
    #[must_use]
    pub fn config(self) -> HarnessConfig {
        match self {
            Self::Differential => HarnessConfig::differential(),
            Self::Interactive => HarnessConfig::interactive(),
        }
    }
}

impl FromStr for Profile {
    type Err = HarnessError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim() {
            "differential" => Ok(Self::Differential),
            "interactive" => Ok(Self::Interactive),
            other => Err(HarnessError::UnknownProfile(other.to_owned())),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Differential => "differential",
            Self::Interactive => "interactive",
        })
    }
}

/// One reference interpreter, as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleSpec {
    pub name: String,
    pub program: String,
    /// Arguments placed before the source argument, e.g. `["-c"]`.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub source: SourceMode,
}

impl OracleSpec {
    #[must_use]
    pub fn inline(name: &str, program: &str) -> Self {
        Self {
            name: name.to_owned(),
            program: program.to_owned(),
            args: vec!["-c".to_owned()],
            source: SourceMode::Inline,
        }
    }

    #[must_use]
    pub fn temp_file(name: &str, program: &str) -> Self {
        Self {
            name: name.to_owned(),
            program: program.to_owned(),
            args: Vec::new(),
            source: SourceMode::TempFile,
        }
    }

    #[must_use]
    pub fn build(&self) -> CommandOracle {
        self.args
            .iter()
            .fold(CommandOracle::new(&self.name, &self.program), |oracle, arg| oracle.arg(arg))
            .source_mode(self.source)
    }
}

/// Everything a [`Harness`](crate::Harness) needs besides the interpreter itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Deadline for the Ouros execution, in milliseconds.
    pub primary_timeout_ms: u64,
    /// Deadline for the whole oracle stage, in milliseconds. Encloses the primary deadline.
    pub oracle_timeout_ms: u64,
    /// Reference interpreters, consulted in this order.
    pub oracles: Vec<OracleSpec>,
    /// Global names programs may use without defining them.
    pub predeclared: Vec<String>,
    /// ANDed with the header byte before it is decoded.
    pub dialect_mask: u8,
    /// Substring groups whose joint presence marks an already-known gap.
    pub known_gaps: Vec<Vec<String>>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::differential()
    }
}

impl HarnessConfig {
    #[must_use]
    pub fn differential() -> Self {
        Self {
            primary_timeout_ms: 5_000,
            oracle_timeout_ms: 10_000,
            oracles: vec![OracleSpec::inline("python3", "python3"), OracleSpec::inline("pypy3", "pypy3")],
            predeclared: Vec::new(),
            dialect_mask: u8::MAX,
            known_gaps: default_known_gaps(),
        }
    }

    #[must_use]
    pub fn interactive() -> Self {
        Self {
            primary_timeout_ms: 1_000,
            oracle_timeout_ms: 5_000,
            oracles: vec![OracleSpec::temp_file("python3", "python3")],
            dialect_mask: 0,
            ..Self::differential()
        }
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| HarnessError::ConfigParse {
            path: path.to_owned(),
            source,
        })
    }

    /// Resolves configuration from the process environment.
    ///
    /// `OUROS_DIFF_CONFIG` names a JSON file; otherwise `OUROS_DIFF_PROFILE`
    /// picks a built-in profile, defaulting to differential.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarnessError> {
        if let Some(path) = lookup(CONFIG_ENV).filter(|path| !path.is_empty()) {
            return Self::load(path);
        }
        match lookup(PROFILE_ENV) {
            Some(name) if !name.is_empty() => Ok(name.parse::<Profile>()?.config()),
            _ => Ok(Self::differential()),
        }
    }

    #[must_use]
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    #[must_use]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

fn default_known_gaps() -> Vec<Vec<String>> {
    vec![vec!["getattr".to_owned(), "elems".to_owned()]]
}
