//! Fuzz target: the dialect gate alone, under every header.
//!
//! The gate walks arbitrary syntax trees with a depth budget; findings here are
//! panics or stack overflows in that walk, or a program that a wider dialect
//! rejects.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ouros_diff::dialect::{self, Dialect};

fuzz_target!(|data: &[u8]| {
    let configured = dialect::configure(data, Dialect::default(), u8::MAX);
    let Ok(source) = std::str::from_utf8(configured.source) else {
        return;
    };
    if source.len() > 4096 {
        return;
    }

    // enabling features can only ever accept more programs
    if dialect::check(source, configured.dialect).is_ok() {
        let wider = dialect::check(source, Dialect::all_features());
        assert!(wider.is_ok(), "accepted under [{}] but not with every feature: {wider:?}", configured.dialect);
    }
});
