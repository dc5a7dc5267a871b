//! Raw S-expression AST produced by the parser.
//!
//! The parser is deliberately untyped: every form is a [`Expr::Call`] and
//! every leaf an [`Expr::Atom`]. Quoted strings are stripped of their outer
//! quotes at parse time, so `"Pending"` and `Pending` both bind as atoms.
//! Section recognition happens in the binder, which dispatches on the head
//! atom of each call.

use serde::{Deserialize, Serialize};

/// A node in the parsed S-expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Function call form: `(head arg1 arg2 ...)`
    Call(String, Vec<Expr>),
    /// Atomic value: identifier, percent literal, or unquoted string content
    Atom(String),
}

impl Expr {
    /// The head atom of a call, or `None` for a bare atom.
    pub fn head(&self) -> Option<&str> {
        match self {
            Expr::Call(name, _) => Some(name),
            Expr::Atom(_) => None,
        }
    }

    /// Arguments of a call, or an empty slice for a bare atom.
    pub fn args(&self) -> &[Expr] {
        match self {
            Expr::Call(_, args) => args,
            Expr::Atom(_) => &[],
        }
    }

    /// The atom text, if this node is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Expr::Atom(s) => Some(s),
            Expr::Call(_, _) => None,
        }
    }

    /// First argument as an atom, the common shape for `(section VALUE)`.
    pub fn first_atom(&self) -> Option<&str> {
        self.args().first().and_then(Expr::as_atom)
    }
}

/// A single `(kyc-case NAME body…)` form with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub name: String,
    pub body: Vec<Expr>,
    pub line: usize,
}
