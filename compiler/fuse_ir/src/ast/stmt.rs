//! Statement Types
//!
//! Statements own their children. Variable declarations refer to the
//! [`Var`](crate::Var) arena so that later symbol references share one id.

use crate::VarId;

use super::expr::Expr;

/// A brace-delimited statement list that opens a scope.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }
}

/// One `case v1: case v2: body` group of a switch.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Case {
    pub values: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// Statement kinds.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stmt {
    Block(Block),
    /// Expression evaluated for its effect.
    Expr(Expr),
    /// Local variable declaration; the initializer lives on the `Var`.
    Var(VarId),
    If {
        cond: Expr,
        on_true: Box<Stmt>,
        on_false: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        advance: Option<Expr>,
        body: Box<Stmt>,
    },
    /// Iteration over the indices of a fixed-length array.
    Foreach {
        element: VarId,
        collection: Expr,
        body: Box<Stmt>,
    },
    Switch {
        value: Expr,
        cases: Vec<Case>,
        default: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    /// Signal failure with a message.
    Throw(Expr),
    Break,
    Continue,
}

impl Stmt {
    /// Wrap statements in a block statement.
    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block(Block::new(stmts))
    }

    pub fn if_then(cond: Expr, on_true: Stmt, on_false: Option<Stmt>) -> Self {
        Stmt::If {
            cond,
            on_true: Box::new(on_true),
            on_false: on_false.map(Box::new),
        }
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Self {
        Stmt::While {
            cond,
            body: Box::new(body),
        }
    }

    /// Whether this is a `while`, `do`, `for` or `foreach`.
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::Foreach { .. }
        )
    }
}
