use std::{fmt, io, path::PathBuf};

/// Error type for harness setup, separating failures by what was being loaded.
///
/// Nothing in a fuzz iteration itself produces a `HarnessError`: per-iteration
/// failures are verdicts, and an unclassified divergence is a
/// [`DivergenceReport`](crate::DivergenceReport). These errors only come from
/// configuration, corpus loading and thread start-up.
#[derive(Debug)]
pub enum HarnessError {
    /// A configuration file could not be read.
    ConfigRead { path: PathBuf, source: io::Error },
    /// A configuration file was read but is not valid harness configuration.
    ConfigParse { path: PathBuf, source: serde_json::Error },
    /// `OUROS_DIFF_PROFILE` named a profile that does not exist.
    UnknownProfile(String),
    /// The race-stress corpus directory or one of its entries could not be read.
    Corpus { path: PathBuf, source: io::Error },
    /// The race-stress corpus contained no usable programs.
    EmptyCorpus(PathBuf),
    /// A race-stress worker thread could not be started.
    Spawn(io::Error),
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigRead { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            Self::UnknownProfile(name) => {
                write!(f, "unknown profile {name:?}, expected \"differential\" or \"interactive\"")
            }
            Self::Corpus { path, source } => {
                write!(f, "failed to read corpus entry {}: {source}", path.display())
            }
            Self::EmptyCorpus(path) => write!(f, "corpus {} has no usable programs", path.display()),
            Self::Spawn(source) => write!(f, "failed to spawn race worker: {source}"),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigRead { source, .. } | Self::Corpus { source, .. } | Self::Spawn(source) => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            Self::UnknownProfile(_) | Self::EmptyCorpus(_) => None,
        }
    }
}
