//! Minimal Yul IR for generated routines.
//!
//! Routine bodies are built as trees and only turned into text at the very
//! end ([`Block::to_lines`]), so the interpreter in `sol_abi_reflect` can run
//! exactly what gets rendered.

use crate::codegen::lines::Lines;
use alloy_primitives::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Not,
    Lt,
    Gt,
    Eq,
    IsZero,
    Byte,
    SignExtend,
    MLoad,
    MStore,
    MStore8,
    MCopy,
    CalldataLoad,
    CalldataCopy,
    CalldataSize,
    SLoad,
    SStore,
    Revert,
    Pop,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Sub => "sub",
            Builtin::Mul => "mul",
            Builtin::Div => "div",
            Builtin::Shl => "shl",
            Builtin::Shr => "shr",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Xor => "xor",
            Builtin::Not => "not",
            Builtin::Lt => "lt",
            Builtin::Gt => "gt",
            Builtin::Eq => "eq",
            Builtin::IsZero => "iszero",
            Builtin::Byte => "byte",
            Builtin::SignExtend => "signextend",
            Builtin::MLoad => "mload",
            Builtin::MStore => "mstore",
            Builtin::MStore8 => "mstore8",
            Builtin::MCopy => "mcopy",
            Builtin::CalldataLoad => "calldataload",
            Builtin::CalldataCopy => "calldatacopy",
            Builtin::CalldataSize => "calldatasize",
            Builtin::SLoad => "sload",
            Builtin::SStore => "sstore",
            Builtin::Revert => "revert",
            Builtin::Pop => "pop",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::CalldataSize => 0,
            Builtin::Not
            | Builtin::IsZero
            | Builtin::MLoad
            | Builtin::CalldataLoad
            | Builtin::SLoad
            | Builtin::Pop => 1,
            Builtin::MCopy | Builtin::CalldataCopy => 3,
            _ => 2,
        }
    }

    /// Whether the builtin leaves a value on the stack.
    pub fn returns_value(self) -> bool {
        !matches!(
            self,
            Builtin::MStore
                | Builtin::MStore8
                | Builtin::MCopy
                | Builtin::CalldataCopy
                | Builtin::SStore
                | Builtin::Revert
                | Builtin::Pop
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(U256),
    Ident(String),
    /// Reference to a named constant registered with the sink.
    Constant(String),
    Builtin(Builtin, Vec<Expr>),
    /// Call of another generated routine.
    Call(String, Vec<Expr>),
}

pub fn lit(value: u64) -> Expr {
    Expr::Literal(U256::from(value))
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call(name.into(), args)
}

pub fn op(builtin: Builtin, args: Vec<Expr>) -> Expr {
    Expr::Builtin(builtin, args)
}

/* Folding helpers: keep the emitted code free of `add(x, 0)` noise */

pub fn add(a: Expr, b: Expr) -> Expr {
    match (a.as_literal(), b.as_literal()) {
        (_, Some(y)) if y.is_zero() => a,
        (Some(x), _) if x.is_zero() => b,
        (Some(x), Some(y)) => Expr::Literal(x.wrapping_add(y)),
        _ => op(Builtin::Add, vec![a, b]),
    }
}

pub fn sub(a: Expr, b: Expr) -> Expr {
    match b.as_literal() {
        Some(y) if y.is_zero() => a,
        _ => op(Builtin::Sub, vec![a, b]),
    }
}

pub fn mul(a: Expr, b: Expr) -> Expr {
    match (a.as_literal(), b.as_literal()) {
        (_, Some(y)) if y == U256::from(1) => a,
        (Some(x), _) if x == U256::from(1) => b,
        (Some(x), Some(y)) => Expr::Literal(x.wrapping_mul(y)),
        _ => op(Builtin::Mul, vec![a, b]),
    }
}

pub fn shl(bits: Expr, value: Expr) -> Expr {
    match bits.as_literal() {
        Some(b) if b.is_zero() => value,
        _ => op(Builtin::Shl, vec![bits, value]),
    }
}

pub fn shr(bits: Expr, value: Expr) -> Expr {
    match bits.as_literal() {
        Some(b) if b.is_zero() => value,
        _ => op(Builtin::Shr, vec![bits, value]),
    }
}

pub fn and(a: Expr, b: Expr) -> Expr {
    op(Builtin::And, vec![a, b])
}

pub fn or(a: Expr, b: Expr) -> Expr {
    op(Builtin::Or, vec![a, b])
}

pub fn not(a: Expr) -> Expr {
    op(Builtin::Not, vec![a])
}

pub fn lt(a: Expr, b: Expr) -> Expr {
    op(Builtin::Lt, vec![a, b])
}

pub fn gt(a: Expr, b: Expr) -> Expr {
    op(Builtin::Gt, vec![a, b])
}

pub fn eq(a: Expr, b: Expr) -> Expr {
    op(Builtin::Eq, vec![a, b])
}

pub fn iszero(a: Expr) -> Expr {
    op(Builtin::IsZero, vec![a])
}

/// Sign-extends `value` from its low `bytes + 1` bytes.
pub fn signextend(bytes: Expr, value: Expr) -> Expr {
    op(Builtin::SignExtend, vec![bytes, value])
}

pub fn mload(ptr: Expr) -> Expr {
    op(Builtin::MLoad, vec![ptr])
}

pub fn calldatasize() -> Expr {
    op(Builtin::CalldataSize, Vec::new())
}

pub fn calldataload(ptr: Expr) -> Expr {
    op(Builtin::CalldataLoad, vec![ptr])
}

pub fn sload(slot: Expr) -> Expr {
    op(Builtin::SLoad, vec![slot])
}

impl Expr {
    pub fn as_literal(&self) -> Option<U256> {
        match self {
            Expr::Literal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Expr::Literal(v) => render_literal(*v),
            Expr::Ident(name) | Expr::Constant(name) => name.clone(),
            Expr::Builtin(b, args) => render_call(b.name(), args),
            Expr::Call(name, args) => render_call(name, args),
        }
    }
}

fn render_call(name: &str, args: &[Expr]) -> String {
    let args: Vec<String> = args.iter().map(Expr::render).collect();
    format!("{name}({})", args.join(", "))
}

pub fn render_literal(v: U256) -> String {
    if v < U256::from(10) { v.to_string() } else { format!("0x{v:x}") }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `let a, b := value`; no value declares zero-initialised variables.
    Let(Vec<String>, Option<Expr>),
    Assign(Vec<String>, Expr),
    Expr(Expr),
    If(Expr, Block),
    For {
        init: Block,
        cond: Expr,
        post: Block,
        body: Block,
    },
    Leave,
}

impl Stmt {
    pub fn let_(name: impl Into<String>, value: Expr) -> Stmt {
        Stmt::Let(vec![name.into()], Some(value))
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Stmt {
        Stmt::Assign(vec![name.into()], value)
    }

    pub fn mstore(ptr: Expr, value: Expr) -> Stmt {
        Stmt::Expr(op(Builtin::MStore, vec![ptr, value]))
    }

    pub fn mstore8(ptr: Expr, value: Expr) -> Stmt {
        Stmt::Expr(op(Builtin::MStore8, vec![ptr, value]))
    }

    pub fn sstore(slot: Expr, value: Expr) -> Stmt {
        Stmt::Expr(op(Builtin::SStore, vec![slot, value]))
    }

    pub fn mcopy(dst: Expr, src: Expr, len: Expr) -> Stmt {
        Stmt::Expr(op(Builtin::MCopy, vec![dst, src, len]))
    }

    pub fn calldatacopy(dst: Expr, src: Expr, len: Expr) -> Stmt {
        Stmt::Expr(op(Builtin::CalldataCopy, vec![dst, src, len]))
    }

    pub fn revert_empty() -> Stmt {
        Stmt::Expr(op(Builtin::Revert, vec![lit(0), lit(0)]))
    }

    /// Counting loop `for { let i := 0 } lt(i, len) { i := add(i, 1) }`.
    pub fn count(var: &str, len: Expr, body: Block) -> Stmt {
        Stmt::For {
            init: Block(vec![Stmt::let_(var, lit(0))]),
            cond: lt(ident(var), len),
            post: Block(vec![Stmt::assign(var, add(ident(var), lit(1)))]),
            body,
        }
    }

    /// Single-line rendering, used for `for` headers.
    fn render_inline(&self) -> String {
        let mut lines = Lines::new();
        self.push_lines(&mut lines);
        lines.flatten().join(" ")
    }

    fn push_lines(&self, out: &mut Lines) {
        match self {
            Stmt::Let(names, None) => out.line(format!("let {}", names.join(", "))),
            Stmt::Let(names, Some(value)) => out.line(format!("let {} := {}", names.join(", "), value.render())),
            Stmt::Assign(names, value) => out.line(format!("{} := {}", names.join(", "), value.render())),
            Stmt::Expr(e) => out.line(e.render()),
            Stmt::If(cond, body) => {
                out.line(format!("if {} {{", cond.render()));
                out.nest(body.to_lines());
                out.line("}");
            }
            Stmt::For { init, cond, post, body } => {
                out.line(format!(
                    "for {{ {} }} {} {{ {} }} {{",
                    init.render_inline(),
                    cond.render(),
                    post.render_inline()
                ));
                out.nest(body.to_lines());
                out.line("}");
            }
            Stmt::Leave => out.line("leave"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block(pub Vec<Stmt>);

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.0.push(stmt);
    }

    pub fn extend(&mut self, other: Block) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.0
    }

    pub fn to_lines(&self) -> Lines {
        let mut out = Lines::new();
        for stmt in &self.0 {
            stmt.push_lines(&mut out);
        }
        out
    }

    fn render_inline(&self) -> String {
        self.0.iter().map(Stmt::render_inline).collect::<Vec<_>>().join(" ")
    }
}

impl From<Vec<Stmt>> for Block {
    fn from(stmts: Vec<Stmt>) -> Self {
        Block(stmts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn folding_drops_identities() {
        assert_eq!(add(ident("p"), lit(0)), ident("p"));
        assert_eq!(add(lit(32), lit(32)), lit(64));
        assert_eq!(mul(ident("n"), lit(1)), ident("n"));
        assert_eq!(shl(lit(0), ident("v")), ident("v"));
        assert_eq!(add(ident("p"), lit(32)).render(), "add(p, 0x20)");
    }

    #[test]
    fn loops_render_headers_inline() {
        let body = Block(vec![Stmt::mstore(ident("i"), lit(1))]);
        let rendered = Block(vec![Stmt::count("i", ident("n"), body)]).to_lines().render("  ");
        assert_eq!(
            rendered,
            "for { let i := 0 } lt(i, n) { i := add(i, 1) } {\n  mstore(i, 1)\n}\n"
        );
    }
}
