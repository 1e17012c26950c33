//! Reachability queries over statements.
//!
//! Backends need two facts the type checker already knows but does not
//! record on the tree: whether control can fall off the end of a statement,
//! and whether a loop or switch body contains a jump that targets it.

use crate::ast::{Expr, Literal, Stmt};

/// Whether control can reach the point right after `stmt`.
pub fn completes_normally(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Block(block) => list_completes_normally(&block.stmts),
        Stmt::Expr(_) | Stmt::Var(_) | Stmt::Foreach { .. } => true,
        Stmt::If {
            on_true, on_false, ..
        } => match on_false {
            None => true,
            Some(on_false) => completes_normally(on_true) || completes_normally(on_false),
        },
        Stmt::While { cond, body } => !is_true_literal(cond) || has_break(body),
        Stmt::DoWhile { body, cond } => {
            has_break(body)
                || (!is_true_literal(cond) && (completes_normally(body) || has_continue(body)))
        }
        Stmt::For { cond, body, .. } => match cond {
            Some(cond) if !is_true_literal(cond) => true,
            _ => has_break(body),
        },
        Stmt::Switch { cases, default, .. } => match default {
            None => true,
            Some(default) => cases
                .iter()
                .map(|case| case.body.as_slice())
                .chain(std::iter::once(default.as_slice()))
                .any(|body| list_completes_normally(body) || body.iter().any(has_break)),
        },
        Stmt::Return(_) | Stmt::Throw(_) | Stmt::Break | Stmt::Continue => false,
    }
}

/// Whether control can fall off the end of a statement list.
pub fn list_completes_normally(stmts: &[Stmt]) -> bool {
    stmts.iter().all(completes_normally)
}

/// Whether `stmt` contains a `break` that leaves the statement enclosing it.
///
/// Does not descend into nested loops or switches, whose breaks target
/// themselves.
pub fn has_break(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Break => true,
        Stmt::Block(block) => block.stmts.iter().any(has_break),
        Stmt::If {
            on_true, on_false, ..
        } => has_break(on_true) || on_false.as_deref().is_some_and(has_break),
        _ => false,
    }
}

/// Whether `stmt` contains a `continue` for the loop enclosing it.
///
/// Descends into switches, whose `continue` targets the enclosing loop,
/// but not into nested loops.
pub fn has_continue(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Continue => true,
        Stmt::Block(block) => block.stmts.iter().any(has_continue),
        Stmt::If {
            on_true, on_false, ..
        } => has_continue(on_true) || on_false.as_deref().is_some_and(has_continue),
        Stmt::Switch { cases, default, .. } => {
            cases.iter().flat_map(|case| &case.body).any(has_continue)
                || default.iter().flatten().any(has_continue)
        }
        _ => false,
    }
}

fn is_true_literal(expr: &Expr) -> bool {
    matches!(expr.as_literal(), Some(Literal::Bool(true)))
}

#[cfg(test)]
mod tests;
