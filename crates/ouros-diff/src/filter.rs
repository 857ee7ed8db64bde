//! Cheap, pure rejection of input shapes that only ever produce uninteresting failures.
//!
//! Every rule here trades fuzzing coverage for throughput. A new exclusion must
//! only ever cover a shape whose failures are already understood; it must never
//! hide a new bug class.

use std::{fmt, sync::LazyLock};

use regex::bytes::Regex;

/// Three or more hex-looking digits in a row. Inputs like this tend to build huge
/// integers, which time out for predictable reasons instead of finding logic bugs.
static HEX_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9a-fA-F]{3,}").expect("hex run pattern is a valid regex"));

/// Why an input was skipped before reaching any interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The program contains a NUL byte.
    Nul,
    /// The program contains a run of at least three hex-looking digits.
    HexRun,
    /// The program contains a `*` operator.
    Multiplication,
    /// The program mentions every name of a known-gap group.
    KnownGap(Vec<String>),
    /// Bitwise operators are enabled and the program contains `<<`.
    LeftShift,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nul => f.write_str("contains a NUL byte"),
            Self::HexRun => f.write_str("contains a run of hex digits"),
            Self::Multiplication => f.write_str("contains multiplication"),
            Self::KnownGap(group) => write!(f, "matches known gap [{}]", group.join(", ")),
            Self::LeftShift => f.write_str("contains a left shift with bitwise operators enabled"),
        }
    }
}

/// Result of screening one raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Proceed,
    Skip(SkipReason),
}

/// The input filter, holding the configurable known-gap groups.
///
/// A known-gap group is a set of substrings that, when all present together,
/// reliably trigger a divergence that is intentional or already tracked.
#[derive(Debug, Clone, Default)]
pub struct InputFilter {
    known_gaps: Vec<Vec<String>>,
}

impl InputFilter {
    #[must_use]
    pub fn new(known_gaps: Vec<Vec<String>>) -> Self {
        let known_gaps = known_gaps.into_iter().filter(|group| !group.is_empty()).collect();
        Self { known_gaps }
    }

    /// Screens a raw fuzz input.
    ///
    /// Only the program body is inspected: the leading header byte selects dialect
    /// flags and never reaches an interpreter, so its value cannot cause any of the
    /// failures these rules exist to avoid.
    #[must_use]
    pub fn screen(&self, raw: &[u8]) -> Screen {
        let program = raw.get(1..).unwrap_or_default();

        if program.contains(&0) {
            return Screen::Skip(SkipReason::Nul);
        }
        if HEX_RUN.is_match(program) {
            return Screen::Skip(SkipReason::HexRun);
        }
        if program.contains(&b'*') {
            return Screen::Skip(SkipReason::Multiplication);
        }
        if let Some(group) = self
            .known_gaps
            .iter()
            .find(|group| group.iter().all(|needle| contains(program, needle.as_bytes())))
        {
            return Screen::Skip(SkipReason::KnownGap(group.clone()));
        }
        Screen::Proceed
    }
}

/// Byte-substring search. Inputs are small, so a windowed scan is enough.
#[must_use]
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
