//! Tests for header decoding and the dialect gate.

use ouros_diff::dialect::{self, Configured, Dialect, DialectError, Violation};
use pretty_assertions::assert_eq;

fn violation(source: &str, dialect: Dialect) -> Option<Violation> {
    dialect::check(source, dialect).err().map(|err| err.violation)
}

fn core() -> Dialect {
    Dialect::default()
}

fn with(configure: impl FnOnce(&mut Dialect)) -> Dialect {
    let mut dialect = Dialect::default();
    configure(&mut dialect);
    dialect
}

// =============================================================================
// 1. Header decoding
// =============================================================================

#[test]
fn header_bits_map_to_features() {
    assert_eq!(
        Dialect::from_header(0b0001_0001),
        Dialect {
            float: true,
            bitwise: true,
            ..Dialect::default()
        }
    );
    assert_eq!(
        Dialect::from_header(0b0010_0110),
        Dialect {
            set: true,
            lambda: true,
            global_reassign: true,
            ..Dialect::default()
        }
    );
    assert!(Dialect::from_header(0b0000_1000).nested_def);
}

#[test]
fn top_two_bits_are_ignored() {
    assert_eq!(Dialect::from_header(0b1100_0000), Dialect::default());
}

#[test]
fn recursion_is_never_enabled_by_a_header() {
    for bits in 0..=u8::MAX {
        assert!(!Dialect::from_header(bits).recursion, "header {bits:#010b}");
    }
    assert!(!Dialect::all_features().recursion);
}

#[test]
fn header_encodes_the_low_six_bits() {
    for bits in 0..=u8::MAX {
        assert_eq!(Dialect::from_header(bits).header(), bits & 0b0011_1111);
    }
}

#[test]
fn display_lists_enabled_features() {
    assert_eq!(core().to_string(), "core");
    assert_eq!(Dialect::from_header(0b0000_0011).to_string(), "float+set");
}

// =============================================================================
// 2. Configuring from raw input
// =============================================================================

#[test]
fn configure_strips_the_header() {
    let configured = dialect::configure(b"\x01x = 1.5", core(), u8::MAX);
    assert_eq!(
        configured,
        Configured {
            dialect: Dialect::from_header(1),
            source: b"x = 1.5",
        }
    );
}

#[test]
fn empty_input_keeps_prior_dialect() {
    let prior = Dialect::from_header(0b0001_0100);
    let configured = dialect::configure(b"", prior, u8::MAX);
    assert_eq!(configured.dialect, prior);
    assert_eq!(configured.source, b"");
}

#[test]
fn header_only_input_is_an_empty_program() {
    let configured = dialect::configure(b"\x3f", core(), u8::MAX);
    assert_eq!(configured.dialect, Dialect::from_header(0x3f));
    assert!(configured.source.is_empty());
}

#[test]
fn mask_pins_features_off() {
    let configured = dialect::configure(b"\xffTrue", core(), 0);
    assert_eq!(configured.dialect, core());
    let configured = dialect::configure(b"\xffTrue", core(), 0b0000_0001);
    assert_eq!(configured.dialect, Dialect::from_header(1));
}

#[test]
fn left_shift_guard_needs_bitwise() {
    assert!(dialect::configure(b"\x10x = 1 << 2", core(), u8::MAX).left_shift_guard());
    assert!(!dialect::configure(b"\x00x = 1 << 2", core(), u8::MAX).left_shift_guard());
    assert!(!dialect::configure(b"\x10x = 1 >> 2", core(), u8::MAX).left_shift_guard());
}

// =============================================================================
// 3. The gate
// =============================================================================

#[test]
fn core_language_is_always_accepted() {
    for source in ["True", "", "x = 1\nprint(x)", "y = [1, 2][0] + len('ab')", "z = {'a': 1}"] {
        assert_eq!(dialect::check(source, core()), Ok(()), "{source:?}");
    }
}

#[test]
fn syntax_errors_are_violations() {
    assert!(matches!(violation("x = (", core()), Some(Violation::Syntax(_))));
}

#[test]
fn floats_need_the_float_flag() {
    assert_eq!(
        dialect::check("x = 1.5", core()),
        Err(DialectError {
            violation: Violation::Float,
            offset: 4,
        })
    );
    assert_eq!(violation("x = 1 / 2", core()), Some(Violation::Float));
    assert_eq!(violation("x = float(1)", core()), Some(Violation::Float));
    assert_eq!(violation("x = 2j", core()), Some(Violation::Float));
    assert_eq!(violation("x = 7 // 2", core()), None);

    let float = with(|d| d.float = true);
    assert_eq!(violation("x = 1.5", float), None);
    assert_eq!(violation("x = 1 / 2", float), None);
}

#[test]
fn augmented_true_division_needs_the_float_flag() {
    let source = "def f(y):\n    y /= 2\n    return y\n";
    assert_eq!(violation(source, core()), Some(Violation::Float));
    assert_eq!(violation(source, with(|d| d.float = true)), None);
}

#[test]
fn sets_need_the_set_flag() {
    assert_eq!(violation("s = {1, 2}", core()), Some(Violation::Set));
    assert_eq!(violation("s = set()", core()), Some(Violation::Set));
    assert_eq!(violation("s = frozenset()", core()), Some(Violation::Set));
    assert_eq!(violation("s = {x for x in [1]}", core()), Some(Violation::Set));
    assert_eq!(violation("d = {1: 2}", core()), None);
    assert_eq!(violation("s = {1, 2}", with(|d| d.set = true)), None);
}

#[test]
fn lambda_needs_the_lambda_flag() {
    assert_eq!(violation("f = lambda: 1", core()), Some(Violation::Lambda));
    assert_eq!(violation("f = lambda: 1", with(|d| d.lambda = true)), None);
}

#[test]
fn nested_def_needs_the_nested_def_flag() {
    let source = "def f():\n    def g():\n        return 1\n    return g()\n";
    assert_eq!(
        dialect::check(source, core()),
        Err(DialectError {
            violation: Violation::NestedDef,
            offset: 13,
        })
    );
    assert_eq!(violation(source, with(|d| d.nested_def = true)), None);
}

#[test]
fn bitwise_operators_need_the_bitwise_flag() {
    for source in ["x = 1 | 2", "x = 1 & 2", "x = 1 ^ 2", "x = 1 >> 2", "x = 1 << 2", "x = ~1"] {
        assert_eq!(violation(source, core()), Some(Violation::Bitwise), "{source:?}");
        assert_eq!(violation(source, with(|d| d.bitwise = true)), None, "{source:?}");
    }
    assert_eq!(violation("def f(y):\n    y |= 1\n    return y\n", core()), Some(Violation::Bitwise));
    assert_eq!(violation("x = 1 < 2 or 3 > 4", core()), None);
}

#[test]
fn top_level_rebinding_needs_global_reassign() {
    assert_eq!(
        dialect::check("x = 1\nx = 2", core()),
        Err(DialectError {
            violation: Violation::Reassign("x".to_owned()),
            offset: 6,
        })
    );
    assert_eq!(violation("x = 1\nx += 1", core()), Some(Violation::Reassign("x".to_owned())));
    assert_eq!(violation("a, b = 1, 2\nb = 3", core()), Some(Violation::Reassign("b".to_owned())));
    assert_eq!(violation("import os\nos = 1", core()), Some(Violation::Reassign("os".to_owned())));
    assert_eq!(violation("x = 1\ny = 2", core()), None);
    assert_eq!(violation("x = 1\nx = 2", with(|d| d.global_reassign = true)), None);
}

#[test]
fn local_rebinding_is_always_allowed() {
    let source = "def f():\n    x = 1\n    x = 2\n    return x\n";
    assert_eq!(violation(source, core()), None);
}

#[test]
fn top_level_control_flow_needs_global_reassign() {
    assert_eq!(violation("if True:\n    pass\n", core()), Some(Violation::TopLevelStatement("if")));
    assert_eq!(violation("for i in [1]:\n    pass\n", core()), Some(Violation::TopLevelStatement("for")));
    assert_eq!(violation("while False:\n    pass\n", core()), Some(Violation::TopLevelStatement("while")));
    assert_eq!(violation("if True:\n    pass\n", with(|d| d.global_reassign = true)), None);

    let inside = "def f():\n    for i in [1]:\n        pass\n    return 1\n";
    assert_eq!(violation(inside, core()), None);
}

#[test]
fn direct_recursion_is_always_rejected() {
    let source = "def f(n):\n    return f(n)\n";
    assert_eq!(violation(source, core()), Some(Violation::Recursion("f".to_owned())));
    assert_eq!(
        violation(source, Dialect::all_features()),
        Some(Violation::Recursion("f".to_owned()))
    );
}

#[test]
fn calling_an_earlier_function_is_not_recursion() {
    let source = "def f(n):\n    return n\n\ndef g(n):\n    return f(n)\n";
    assert_eq!(violation(source, core()), None);
}

/// A parameter or local that shadows the function's own name is not a self-call.
#[test]
fn shadowed_function_name_is_not_recursion() {
    assert_eq!(violation("def f(f):\n    return f()\n", core()), None);
    assert_eq!(violation("def f(*f):\n    return f[0]()\n", core()), None);

    let rebound = "def g():\n    return 1\n\ndef f():\n    f = g\n    return f()\n";
    assert_eq!(violation(rebound, core()), None);

    let lambda = with(|d| d.lambda = true);
    let source = "def f(n):\n    h = lambda f: f()\n    return h(n)\n";
    assert_eq!(violation(source, lambda), None);
}

#[test]
fn recursion_through_nested_functions_is_rejected() {
    let nested = with(|d| d.nested_def = true);

    let inner = "def f():\n    def g():\n        return g()\n    return g()\n";
    assert_eq!(violation(inner, nested), Some(Violation::Recursion("g".to_owned())));

    let outer = "def f():\n    def g():\n        return f()\n    return g()\n";
    assert_eq!(violation(outer, nested), Some(Violation::Recursion("f".to_owned())));

    let sibling = "def f():\n    def g():\n        return 1\n    def h():\n        return g()\n    return h()\n";
    assert_eq!(violation(sibling, nested), None);
}

#[test]
fn first_violation_in_source_order_wins() {
    assert_eq!(violation("x = 1.5\ny = {1}", core()), Some(Violation::Float));
    assert_eq!(violation("y = {1}\nx = 1.5", core()), Some(Violation::Set));
}

#[test]
fn deep_nesting_is_cut_off() {
    let depth = usize::from(dialect::MAX_NESTING_DEPTH) + 10;
    let source = format!("x = {}1{}", "[".repeat(depth), "]".repeat(depth));
    assert_eq!(violation(&source, Dialect::all_features()), Some(Violation::TooDeep));

    let shallow = format!("x = {}1{}", "[".repeat(20), "]".repeat(20));
    assert_eq!(violation(&shallow, core()), None);
}

#[test]
fn error_display_names_construct_and_offset() {
    let err = dialect::check("x = 1.5", core()).unwrap_err();
    assert_eq!(err.to_string(), "dialect does not support floating point at byte 4");
}
