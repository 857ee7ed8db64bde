//! Dialect flags: optional language features toggled per iteration by the header byte.
//!
//! Ouros itself accepts the full language it implements, so the dialect is
//! enforced as a static pass over the syntax tree before Ouros ever sees the
//! program. With a flag off, any use of the matching construct is a compile
//! error, exactly as if the resolver did not know the feature.
//!
//! The dialect is a plain value threaded into every compile call. Nothing here
//! is process-wide state.

use std::fmt;

use ruff_python_ast::{
    self as ast, Expr, ExprContext, Number, Operator, Stmt, UnaryOp,
    visitor::{Visitor, walk_expr, walk_stmt},
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::filter::contains;

/// Maximum nesting depth of statements and expressions the gate will walk.
///
/// The walker recurses once per level, so deeply nested fuzz output such as
/// `((((x,),),),)` must be cut off before it exhausts the stack.
pub const MAX_NESTING_DEPTH: u16 = 200;

const FLOAT_BIT: u8 = 1 << 0;
const SET_BIT: u8 = 1 << 1;
const LAMBDA_BIT: u8 = 1 << 2;
const NESTED_DEF_BIT: u8 = 1 << 3;
const BITWISE_BIT: u8 = 1 << 4;
const GLOBAL_REASSIGN_BIT: u8 = 1 << 5;

/// The optional language features enabled for one program.
///
/// `recursion` exists so the gate can name the feature, but no header bit turns
/// it on: unbounded recursion only ever finds stack exhaustion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[expect(clippy::struct_excessive_bools, reason = "one flag per optional feature")]
pub struct Dialect {
    /// Float literals, the `float` builtin and true division.
    pub float: bool,
    /// The `set`/`frozenset` builtins, set displays and set comprehensions.
    pub set: bool,
    /// `lambda` expressions.
    pub lambda: bool,
    /// `def` statements inside function bodies.
    pub nested_def: bool,
    /// `& | ^ << >> ~` and their augmented assignments.
    pub bitwise: bool,
    /// Rebinding top-level names, and `if`/`for`/`while` at top level.
    pub global_reassign: bool,
    /// Functions that call themselves.
    pub recursion: bool,
}

impl Dialect {
    /// Decodes a header byte. Bits 6 and 7 are ignored.
    #[must_use]
    pub const fn from_header(bits: u8) -> Self {
        Self {
            float: bits & FLOAT_BIT != 0,
            set: bits & SET_BIT != 0,
            lambda: bits & LAMBDA_BIT != 0,
            nested_def: bits & NESTED_DEF_BIT != 0,
            bitwise: bits & BITWISE_BIT != 0,
            global_reassign: bits & GLOBAL_REASSIGN_BIT != 0,
            recursion: false,
        }
    }

    /// Encodes the flags back into a header byte.
    #[must_use]
    pub const fn header(self) -> u8 {
        let mut bits = 0;
        if self.float {
            bits |= FLOAT_BIT;
        }
        if self.set {
            bits |= SET_BIT;
        }
        if self.lambda {
            bits |= LAMBDA_BIT;
        }
        if self.nested_def {
            bits |= NESTED_DEF_BIT;
        }
        if self.bitwise {
            bits |= BITWISE_BIT;
        }
        if self.global_reassign {
            bits |= GLOBAL_REASSIGN_BIT;
        }
        bits
    }

    /// Every optional feature except recursion, as used by the race-stress harness.
    #[must_use]
    pub const fn all_features() -> Self {
        Self::from_header(u8::MAX)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            ("float", self.float),
            ("set", self.set),
            ("lambda", self.lambda),
            ("nested_def", self.nested_def),
            ("bitwise", self.bitwise),
            ("global_reassign", self.global_reassign),
            ("recursion", self.recursion),
        ];
        let enabled: Vec<&str> = flags.iter().filter(|(_, on)| *on).map(|(name, _)| *name).collect();
        if enabled.is_empty() {
            f.write_str("core")
        } else {
            f.write_str(&enabled.join("+"))
        }
    }
}

/// A raw input split into its dialect and program source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configured<'a> {
    pub dialect: Dialect,
    pub source: &'a [u8],
}

impl Configured<'_> {
    /// Left shift with user-controlled operands is a reliable source of huge
    /// numbers, so such iterations are skipped outright.
    #[must_use]
    pub fn left_shift_guard(&self) -> bool {
        self.dialect.bitwise && contains(self.source, b"<<")
    }
}

/// Consumes the header byte of `raw` as a dialect bitfield.
///
/// `mask` is applied to the header first, letting a profile pin features off.
/// An empty input keeps the `prior` dialect and yields an empty program.
#[must_use]
pub fn configure(raw: &[u8], prior: Dialect, mask: u8) -> Configured<'_> {
    match raw.split_first() {
        Some((&bits, source)) => Configured {
            dialect: Dialect::from_header(bits & mask),
            source,
        },
        None => Configured {
            dialect: prior,
            source: &[],
        },
    }
}

/// What the gate rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The program is not valid syntax at all.
    Syntax(String),
    Float,
    Set,
    Lambda,
    NestedDef,
    Bitwise,
    /// A top-level name was bound twice.
    Reassign(String),
    /// An `if`, `for` or `while` statement at top level.
    TopLevelStatement(&'static str),
    /// A function calls itself by name.
    Recursion(String),
    /// Nesting exceeded [`MAX_NESTING_DEPTH`].
    TooDeep,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(message) => write!(f, "syntax error: {message}"),
            Self::Float => f.write_str("dialect does not support floating point"),
            Self::Set => f.write_str("dialect does not support sets"),
            Self::Lambda => f.write_str("dialect does not support lambda"),
            Self::NestedDef => f.write_str("dialect does not support nested def"),
            Self::Bitwise => f.write_str("dialect does not support bitwise operators"),
            Self::Reassign(name) => write!(f, "cannot reassign global {name}"),
            Self::TopLevelStatement(keyword) => write!(f, "{keyword} statement not within a function"),
            Self::Recursion(name) => write!(f, "function {name} called recursively"),
            Self::TooDeep => f.write_str("too many nested expressions"),
        }
    }
}

/// A dialect rejection with the byte offset of the offending construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectError {
    pub violation: Violation,
    pub offset: usize,
}

impl DialectError {
    fn new(violation: Violation, range: TextRange) -> Self {
        Self {
            violation,
            offset: range.start().to_usize(),
        }
    }
}

impl fmt::Display for DialectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.violation, self.offset)
    }
}

impl std::error::Error for DialectError {}

/// Parses `source` and checks it against `dialect`.
///
/// Returns the first violation in source order.
pub fn check(source: &str, dialect: Dialect) -> Result<(), DialectError> {
    let parsed = parse_module(source).map_err(|e| DialectError::new(Violation::Syntax(e.to_string()), e.range()))?;
    let module = parsed.into_syntax();

    let mut gate = Gate::new(dialect);
    let mut globals: Vec<&str> = Vec::new();
    for stmt in &module.body {
        if !dialect.global_reassign {
            if let Some(keyword) = control_flow_keyword(stmt) {
                return Err(DialectError::new(Violation::TopLevelStatement(keyword), stmt.range()));
            }
            for name in top_level_bindings(stmt) {
                if globals.contains(&name) {
                    return Err(DialectError::new(Violation::Reassign(name.to_owned()), stmt.range()));
                }
                globals.push(name);
            }
        }
        gate.visit_stmt(stmt);
        if let Some(error) = gate.error.take() {
            return Err(error);
        }
    }
    Ok(())
}

fn control_flow_keyword(stmt: &Stmt) -> Option<&'static str> {
    match stmt {
        Stmt::If(_) => Some("if"),
        Stmt::For(_) => Some("for"),
        Stmt::While(_) => Some("while"),
        _ => None,
    }
}

/// Names bound by a top-level statement.
fn top_level_bindings(stmt: &Stmt) -> Vec<&str> {
    let mut names = Vec::new();
    match stmt {
        Stmt::Assign(ast::StmtAssign { targets, .. }) => {
            for target in targets {
                target_names(target, &mut names);
            }
        }
        Stmt::AugAssign(ast::StmtAugAssign { target, .. }) => target_names(target, &mut names),
        Stmt::AnnAssign(ast::StmtAnnAssign {
            target, value: Some(_), ..
        }) => target_names(target, &mut names),
        Stmt::FunctionDef(ast::StmtFunctionDef { name, .. }) | Stmt::ClassDef(ast::StmtClassDef { name, .. }) => {
            names.push(name.id.as_str());
        }
        Stmt::Import(ast::StmtImport { names: aliases, .. })
        | Stmt::ImportFrom(ast::StmtImportFrom { names: aliases, .. }) => {
            for alias in aliases {
                let bound = alias.asname.as_ref().unwrap_or(&alias.name);
                // `import a.b` binds `a`
                let bound = bound.id.as_str().split('.').next().unwrap_or_default();
                if bound != "*" {
                    names.push(bound);
                }
            }
        }
        _ => {}
    }
    names
}

fn target_names<'a>(target: &'a Expr, names: &mut Vec<&'a str>) {
    match target {
        Expr::Name(ast::ExprName { id, .. }) => names.push(id.as_str()),
        Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
            for elt in elts {
                target_names(elt, names);
            }
        }
        Expr::Starred(ast::ExprStarred { value, .. }) => target_names(value, names),
        _ => {}
    }
}

fn is_bitwise(op: Operator) -> bool {
    matches!(
        op,
        Operator::BitAnd | Operator::BitOr | Operator::BitXor | Operator::LShift | Operator::RShift
    )
}

/// A function body being walked.
struct Scope<'a> {
    /// `None` for a lambda.
    name: Option<&'a str>,
    /// Parameters and every name the body binds.
    locals: Vec<&'a str>,
}

impl<'a> Scope<'a> {
    fn function(function: &'a ast::StmtFunctionDef) -> Self {
        let mut locals: Vec<&str> = parameter_names(&function.parameters).collect();
        let mut bindings = Bindings::default();
        for stmt in &function.body {
            bindings.visit_stmt(stmt);
        }
        locals.extend(bindings.names);
        Self {
            name: Some(function.name.id.as_str()),
            locals,
        }
    }

    fn lambda(parameters: Option<&'a ast::Parameters>) -> Self {
        Self {
            name: None,
            locals: parameters.into_iter().flat_map(parameter_names).collect(),
        }
    }
}

fn parameter_names(parameters: &ast::Parameters) -> impl Iterator<Item = &str> {
    parameters
        .posonlyargs
        .iter()
        .chain(&parameters.args)
        .chain(&parameters.kwonlyargs)
        .map(|param| param.parameter.name.id.as_str())
        .chain(
            parameters
                .vararg
                .iter()
                .chain(&parameters.kwarg)
                .map(|param| param.name.id.as_str()),
        )
}

/// Collects the names a function body binds, without entering nested function
/// or class bodies.
struct Bindings<'a> {
    names: Vec<&'a str>,
    depth_remaining: u16,
}

impl Default for Bindings<'_> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            depth_remaining: MAX_NESTING_DEPTH,
        }
    }
}

impl<'a> Visitor<'a> for Bindings<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        if self.depth_remaining == 0 {
            return;
        }
        match stmt {
            Stmt::FunctionDef(ast::StmtFunctionDef { name, .. }) | Stmt::ClassDef(ast::StmtClassDef { name, .. }) => {
                self.names.push(name.id.as_str());
            }
            Stmt::Import(_) | Stmt::ImportFrom(_) => self.names.extend(top_level_bindings(stmt)),
            _ => {
                self.depth_remaining -= 1;
                walk_stmt(self, stmt);
                self.depth_remaining += 1;
            }
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if self.depth_remaining == 0 {
            return;
        }
        match expr {
            Expr::Name(ast::ExprName {
                id,
                ctx: ExprContext::Store,
                ..
            }) => self.names.push(id.as_str()),
            Expr::Lambda(_) => {}
            _ => {
                self.depth_remaining -= 1;
                walk_expr(self, expr);
                self.depth_remaining += 1;
            }
        }
    }
}

/// Walks the tree recording the first feature the dialect does not allow.
struct Gate<'a> {
    dialect: Dialect,
    error: Option<DialectError>,
    depth_remaining: u16,
    /// Enclosing function bodies, lambdas included, innermost last.
    scopes: Vec<Scope<'a>>,
}

impl<'a> Gate<'a> {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            error: None,
            depth_remaining: MAX_NESTING_DEPTH,
            scopes: Vec::new(),
        }
    }

    /// Whether calling `name` from the innermost scope reaches an enclosing function.
    fn calls_enclosing(&self, name: &str) -> bool {
        for (index, scope) in self.scopes.iter().enumerate().rev() {
            if scope.locals.contains(&name) {
                // a nested `def` binds its name in the scope around it
                return self
                    .scopes
                    .get(index + 1)
                    .is_some_and(|inner| inner.name == Some(name));
            }
        }
        self.scopes.first().is_some_and(|outer| outer.name == Some(name))
    }

    fn reject(&mut self, violation: Violation, range: TextRange) {
        if self.error.is_none() {
            self.error = Some(DialectError::new(violation, range));
        }
    }

    /// Takes one level of depth budget, recording `TooDeep` when it runs out.
    fn descend(&mut self, range: TextRange) -> bool {
        if self.error.is_some() {
            return false;
        }
        if self.depth_remaining == 0 {
            self.reject(Violation::TooDeep, range);
            return false;
        }
        self.depth_remaining -= 1;
        true
    }

    fn check_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::FunctionDef(function) => {
                if !self.scopes.is_empty() && !self.dialect.nested_def {
                    self.reject(Violation::NestedDef, stmt.range());
                    return;
                }
                self.scopes.push(Scope::function(function));
                walk_stmt(self, stmt);
                self.scopes.pop();
            }
            Stmt::AugAssign(ast::StmtAugAssign { op, .. }) => {
                if *op == Operator::Div && !self.dialect.float {
                    self.reject(Violation::Float, stmt.range());
                } else if is_bitwise(*op) && !self.dialect.bitwise {
                    self.reject(Violation::Bitwise, stmt.range());
                } else {
                    walk_stmt(self, stmt);
                }
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn check_expr(&mut self, expr: &'a Expr) {
        let range = expr.range();
        match expr {
            Expr::NumberLiteral(ast::ExprNumberLiteral {
                value: Number::Float(_) | Number::Complex { .. },
                ..
            }) if !self.dialect.float => self.reject(Violation::Float, range),
            Expr::BinOp(ast::ExprBinOp { op: Operator::Div, .. }) if !self.dialect.float => {
                self.reject(Violation::Float, range);
            }
            Expr::BinOp(ast::ExprBinOp { op, .. }) if is_bitwise(*op) && !self.dialect.bitwise => {
                self.reject(Violation::Bitwise, range);
            }
            Expr::UnaryOp(ast::ExprUnaryOp {
                op: UnaryOp::Invert, ..
            }) if !self.dialect.bitwise => self.reject(Violation::Bitwise, range),
            Expr::Set(_) | Expr::SetComp(_) if !self.dialect.set => self.reject(Violation::Set, range),
            Expr::Name(ast::ExprName {
                id,
                ctx: ExprContext::Load,
                ..
            }) => match id.as_str() {
                "float" if !self.dialect.float => self.reject(Violation::Float, range),
                "set" | "frozenset" if !self.dialect.set => self.reject(Violation::Set, range),
                _ => {}
            },
            Expr::Lambda(ast::ExprLambda { parameters, .. }) => {
                if !self.dialect.lambda {
                    self.reject(Violation::Lambda, range);
                    return;
                }
                self.scopes.push(Scope::lambda(parameters.as_deref()));
                walk_expr(self, expr);
                self.scopes.pop();
            }
            Expr::Call(ast::ExprCall { func, .. }) => {
                if !self.dialect.recursion
                    && let Expr::Name(ast::ExprName { id, .. }) = func.as_ref()
                    && self.calls_enclosing(id.as_str())
                {
                    self.reject(Violation::Recursion(id.as_str().to_owned()), range);
                    return;
                }
                walk_expr(self, expr);
            }
            _ => walk_expr(self, expr),
        }
    }
}

impl<'a> Visitor<'a> for Gate<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        if !self.descend(stmt.range()) {
            return;
        }
        self.check_stmt(stmt);
        self.depth_remaining += 1;
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if !self.descend(expr.range()) {
            return;
        }
        self.check_expr(expr);
        self.depth_remaining += 1;
    }
}
