use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

/// Stable identity of a variable reference, assigned at parse time.
///
/// The resolver's side-table is keyed by this id, so resolution survives any
/// later move or clone of the node itself.  Ids are drawn from a process-wide
/// counter so successive prompt lines never collide.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);

        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal: the token is one of NUMBER, STRING, TRUE, FALSE, NULL.
    Literal(Token),

    /// Parenthesized expression.
    Grouping(Box<Expr>),

    /// `!x`, `not x`, `-x`.
    Unary { op: Token, right: Box<Expr> },

    /// Arithmetic, comparison, equality and `..` concatenation.
    Binary {
        left: Box<Expr>,
        op: Token,
        right: Box<Expr>,
    },

    /// `and` / `or` with short-circuit evaluation.
    Logical {
        left: Box<Expr>,
        op: Token,
        right: Box<Expr>,
    },

    /// A variable read.
    Variable { id: ExprId, name: Token },

    /// `name = value`.
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// A call; `paren` is the closing parenthesis, kept for error lines.
    Call {
        callee: Box<Expr>,
        paren: Token,
        args: Vec<Expr>,
    },
}
