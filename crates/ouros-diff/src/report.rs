use std::fmt::{self, Write as _};

use crate::{dialect::Dialect, executor::ExecutionResult, oracle::OracleResult};

/// An unclassified divergence: Ouros accepted a program that every reference
/// interpreter rejected, and no suppression rule recognised the failure.
///
/// This is the fatal outcome of an iteration. The `Display` output is the full
/// triage dump: the raw input, the decoded dialect, and every captured output.
#[derive(Debug)]
pub struct DivergenceReport {
    /// The raw fuzz input, header byte included, so it can be replayed as-is.
    pub input: Vec<u8>,
    pub dialect: Dialect,
    pub primary: ExecutionResult,
    pub oracles: Vec<OracleResult>,
}

impl DivergenceReport {
    #[must_use]
    pub fn new(input: &[u8], dialect: Dialect, primary: ExecutionResult, oracles: Vec<OracleResult>) -> Self {
        Self {
            input: input.to_vec(),
            dialect,
            primary,
            oracles,
        }
    }

    /// The program source as the interpreters saw it.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        self.input.get(1..).unwrap_or_default()
    }

    /// One-line summary suitable for a log event.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!("ouros accepted {} bytes under [{}], rejected by", self.source().len(), self.dialect);
        for (index, result) in self.oracles.iter().enumerate() {
            let separator = if index == 0 { " " } else { ", " };
            let _ = write!(summary, "{separator}{} ({})", result.oracle, result.verdict);
        }
        summary
    }
}

impl fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ouros accepted but every reference interpreter rejected")?;
        writeln!(f, "input: b\"{}\"", self.input.escape_ascii())?;
        writeln!(f, "dialect: {}", self.dialect)?;
        writeln!(f, "source:")?;
        writeln!(f, "{}", String::from_utf8_lossy(self.source()))?;
        writeln!(f, "ouros ({}):", self.primary.status)?;
        write_block(f, &self.primary.output)?;
        if let Some(error) = &self.primary.error {
            writeln!(f, "ouros error: {error}")?;
        }
        for result in &self.oracles {
            writeln!(f, "{} ({}):", result.oracle, result.verdict)?;
            write_block(f, &result.output_lossy())?;
        }
        Ok(())
    }
}

impl std::error::Error for DivergenceReport {}

fn write_block(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if text.is_empty() {
        writeln!(f, "    <no output>")
    } else {
        text.lines().try_for_each(|line| writeln!(f, "    {line}"))
    }
}
