//! The AST adapter (spec §4.1).
//!
//! Wraps the external parser (`ruff_python_parser`) and exposes a narrow,
//! kind-tagged view of the input parse tree. The lowerer dispatches on
//! `Stmt`/`Expr` directly; this module only supplies the bits that are
//! awkward to spell inline at every call site: parsing, kind names for
//! diagnostics, and the CPS-callee heuristic.

use ruff_python_ast::{self as ast, Expr, ModModule};
use ruff_python_parser::{Mode, ParseOptions, parse_unchecked};

use crate::error::TransformError;

/// Parses a whole module of surface source. Parse failures become a fatal
/// `TransformError::parse`, naming the first diagnostic ruff reports.
pub fn parse_source(source: &str) -> Result<ModModule, TransformError> {
    let parsed = parse_unchecked(source, ParseOptions::from(Mode::Module));
    if let Some(error) = parsed.errors().first() {
        return Err(TransformError::parse(format!("{error}")));
    }
    match parsed.into_syntax() {
        ast::Mod::Module(module) => Ok(module),
        ast::Mod::Expression(_) => Err(TransformError::parse("expected a module, found a bare expression")),
    }
}

/// The kind name used in `UnsupportedConstruct` diagnostics (spec §4.1, S6).
pub fn stmt_kind(stmt: &ast::Stmt) -> &'static str {
    match stmt {
        ast::Stmt::FunctionDef(_) => "FunctionDef",
        ast::Stmt::ClassDef(_) => "ClassDef",
        ast::Stmt::Return(_) => "Return",
        ast::Stmt::Delete(_) => "Delete",
        ast::Stmt::Assign(_) => "Assign",
        ast::Stmt::AugAssign(_) => "AugAssign",
        ast::Stmt::AnnAssign(_) => "AnnAssign",
        ast::Stmt::TypeAlias(_) => "TypeAlias",
        ast::Stmt::For(_) => "for",
        ast::Stmt::While(_) => "While",
        ast::Stmt::If(_) => "If",
        ast::Stmt::With(_) => "with",
        ast::Stmt::Match(_) => "match",
        ast::Stmt::Raise(_) => "raise",
        ast::Stmt::Try(_) => "try",
        ast::Stmt::Assert(_) => "assert",
        ast::Stmt::Import(_) => "Import",
        ast::Stmt::ImportFrom(_) => "ImportFrom",
        ast::Stmt::Global(_) => "global",
        ast::Stmt::Nonlocal(_) => "nonlocal",
        ast::Stmt::Expr(_) => "Expr",
        ast::Stmt::Pass(_) => "Pass",
        ast::Stmt::Break(_) => "break",
        ast::Stmt::Continue(_) => "continue",
        ast::Stmt::IpyEscapeCommand(_) => "IpyEscapeCommand",
    }
}

/// The kind name used in `UnsupportedConstruct` diagnostics for expressions.
pub fn expr_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::BoolOp(_) => "BoolOp",
        Expr::Named(_) => "named expression (`:=`)",
        Expr::BinOp(_) => "BinOp",
        Expr::UnaryOp(_) => "UnaryOp",
        Expr::Lambda(_) => "lambda",
        Expr::If(_) => "conditional expression",
        Expr::Dict(_) => "dict literal",
        Expr::Set(_) => "set literal",
        Expr::ListComp(_) => "list comprehension",
        Expr::SetComp(_) => "set comprehension",
        Expr::DictComp(_) => "dict comprehension",
        Expr::Generator(_) => "generator expression",
        Expr::Await(_) => "await",
        Expr::Yield(_) => "yield",
        Expr::YieldFrom(_) => "yield from",
        Expr::Compare(_) => "Compare",
        Expr::Call(_) => "Call",
        Expr::FString(_) => "f-string",
        Expr::StringLiteral(_) => "string literal",
        Expr::BytesLiteral(_) => "bytes literal",
        Expr::NumberLiteral(_) => "Num",
        Expr::BooleanLiteral(_) => "boolean literal",
        Expr::NoneLiteral(_) => "None literal",
        Expr::EllipsisLiteral(_) => "ellipsis literal",
        Expr::Attribute(_) => "Attribute",
        Expr::Subscript(_) => "subscript",
        Expr::Starred(_) => "starred expression",
        Expr::Name(_) => "Name",
        Expr::List(_) => "list literal",
        Expr::Tuple(_) => "tuple literal",
        Expr::Slice(_) => "slice",
        Expr::IpyEscapeCommand(_) => "IpyEscapeCommand",
    }
}

/// A call's callee is a "CPS call" (spec §4.2.1) iff, spelled syntactically
/// as a bare name or the final attribute of a chain, it starts with
/// `prefix`. No type- or binding-based analysis is performed — a variable
/// that happens to be bound to a CPS function at runtime but is invoked
/// through an unprefixed name is silently treated as a plain call. This is
/// a deliberate design simplification the source preserves, not a bug.
pub fn callee_is_cps(callee: &Expr, prefix: &str) -> bool {
    match callee {
        Expr::Name(name) => name.id.as_str().starts_with(prefix),
        Expr::Attribute(attr) => attr.attr.as_str().starts_with(prefix),
        _ => false,
    }
}

/// True for an unqualified call to the surface language's `print`, which is
/// lowered to the dedicated `Print` IR node rather than a plain `Call`
/// (spec_full.md §2, "print as a distinguished IR kind").
pub fn callee_is_print(callee: &Expr) -> bool {
    matches!(callee, Expr::Name(name) if name.id.as_str() == "print")
}

/// True when a decorator expression is the bare name `cps_manual`.
pub fn is_cps_manual_decorator(expr: &Expr) -> bool {
    matches!(expr, Expr::Name(name) if name.id.as_str() == "cps_manual")
}
