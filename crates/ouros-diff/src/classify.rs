//! Recognition of already-triaged divergences.
//!
//! This is the only place that reads what a reference interpreter printed. Every
//! rule couples to the exact wording of some CPython-family error message, so a
//! rule that stops matching after an oracle upgrade shows up as a fresh
//! divergence report rather than as silent data loss.
//!
//! Rules are evaluated in declaration order and the first match wins.

use std::fmt;

use crate::{executor::ExecutionResult, filter::contains, oracle::OracleResult};

/// Oracle name the Python 2 rules are scoped to. Its print statement and
/// ASCII-only identifiers are not shared by Python 3 interpreters, so those
/// rules never look at any other oracle's output.
pub const PYTHON2: &str = "python2";

/// Everything a suppression rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct Case<'a> {
    /// The program source, without its dialect header.
    pub input: &'a [u8],
    /// What Ouros did with the program. Always accepted by the time rules run.
    pub primary: &'a ExecutionResult,
    /// Every oracle result, in consultation order. All of them rejected.
    pub oracles: &'a [OracleResult],
}

impl<'a> Case<'a> {
    #[must_use]
    pub fn new(input: &'a [u8], primary: &'a ExecutionResult, oracles: &'a [OracleResult]) -> Self {
        Self { input, primary, oracles }
    }

    /// Whether the program text contains `needle` anywhere, identifiers included.
    #[must_use]
    pub fn input_contains(&self, needle: &str) -> bool {
        contains(self.input, needle.as_bytes())
    }

    /// Whether any oracle printed `needle` on stdout or stderr.
    #[must_use]
    pub fn any_output_contains(&self, needle: &str) -> bool {
        self.oracles
            .iter()
            .any(|result| contains(&result.output, needle.as_bytes()))
    }

    /// Whether the oracle named `oracle` printed `needle`.
    #[must_use]
    pub fn output_of(&self, oracle: &str, needle: &str) -> bool {
        self.oracles
            .iter()
            .any(|result| result.oracle == oracle && contains(&result.output, needle.as_bytes()))
    }

    #[must_use]
    pub fn input_is_ascii(&self) -> bool {
        self.input.is_ascii()
    }
}

/// A named predicate recognising one known divergence.
pub struct SuppressionRule {
    pub name: &'static str,
    predicate: fn(&Case<'_>) -> bool,
}

impl SuppressionRule {
    const fn new(name: &'static str, predicate: fn(&Case<'_>) -> bool) -> Self {
        Self { name, predicate }
    }

    #[must_use]
    pub fn matches(&self, case: &Case<'_>) -> bool {
        (self.predicate)(case)
    }
}

impl fmt::Debug for SuppressionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SuppressionRule").field(&self.name).finish()
    }
}

impl fmt::Display for SuppressionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The ordered suppression list.
pub static RULES: &[SuppressionRule] = &[
    // CPython evaluates `enumerate` lazily, so `enumerate(())[:]` is rejected
    // there and accepted here.
    SuppressionRule::new("lazy-enumerate", |case| case.input_contains("enumerate")),
    // getattr on string iteration helpers returns a different kind of object.
    SuppressionRule::new("introspection", |case| {
        case.input_contains("getattr") && (case.input_contains("elems") || case.input_contains("codepoints"))
    }),
    // `sorted` takes a second positional argument here, and the oracles reject
    // some uses of len/int/dir/print eagerly.
    SuppressionRule::new("sorted-positional", |case| {
        case.input_contains("sorted") && ["len", "int", "dir", "print"].iter().any(|name| case.input_contains(name))
    }),
    // Python 2 parses `print` as a statement.
    SuppressionRule::new("print-syntax", |case| {
        case.input_contains("print") && case.output_of(PYTHON2, "SyntaxError: invalid syntax")
    }),
    // Arbitrary-precision integers convert to float without an upper bound.
    SuppressionRule::new("big-int-to-float", |case| {
        case.input_contains("int") && case.any_output_contains("int too large to convert to float")
    }),
    SuppressionRule::new("non-ascii-identifier", |case| {
        !case.input_is_ascii() && case.output_of(PYTHON2, "invalid syntax")
    }),
    // The oracles' UTF-8 encoder refuses lone surrogates.
    SuppressionRule::new("unicode-surrogates", |case| case.any_output_contains("surrogates not allowed")),
    SuppressionRule::new("unhashable-membership", |case| {
        case.input_contains("in") && case.any_output_contains("unhashable")
    }),
    SuppressionRule::new("reversed-iterator", |case| {
        case.any_output_contains("'reversed' object is not subscriptable") || case.any_output_contains("is not reversible")
    }),
    SuppressionRule::new("int-literal-base", |case| case.output_of(PYTHON2, "invalid literal for int")),
];

/// Returns the first rule in [`RULES`] that recognises `case`.
#[must_use]
pub fn classify(case: &Case<'_>) -> Option<&'static SuppressionRule> {
    RULES.iter().find(|rule| rule.matches(case))
}
