//! The traversal contract every backend implements.
//!
//! A backend implements one `visit_*` handler per expression and statement
//! kind; [`Lowering::accept_expr`] and [`Lowering::accept_stmt`] dispatch to
//! them. Expression handlers receive the [`Priority`] of their syntactic
//! parent and parenthesize themselves when the parent binds tighter.
//!
//! The IR is immutable. A handler that needs a rewritten node builds it
//! locally and visits that instead.

use fuse_ir::{
    Block, Builtin, BinaryOp, Callee, Case, Expr, ExprKind, InterpolatedPart, Literal, Program,
    Property, Stmt, Symbol, Type, UnaryOp, VarId,
};

use crate::error::{CodegenError, Result};
use crate::writer::CodeWriter;

/// Binding strength of an expression context, loosest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Statement,
    Argument,
    Assign,
    Select,
    CondOr,
    CondAnd,
    Or,
    Xor,
    And,
    Equality,
    Rel,
    Shift,
    Add,
    Mul,
    Primary,
}

impl Priority {
    /// Priority of an infix operator in C-family syntax.
    pub const fn of(op: BinaryOp) -> Priority {
        match op {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => Priority::Mul,
            BinaryOp::Add | BinaryOp::Sub => Priority::Add,
            BinaryOp::Shl | BinaryOp::Shr => Priority::Shift,
            BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual => Priority::Rel,
            BinaryOp::Equal | BinaryOp::NotEqual => Priority::Equality,
            BinaryOp::BitAnd => Priority::And,
            BinaryOp::BitXor => Priority::Xor,
            BinaryOp::BitOr => Priority::Or,
            BinaryOp::CondAnd => Priority::CondAnd,
            BinaryOp::CondOr => Priority::CondOr,
            BinaryOp::Index => Priority::Primary,
            BinaryOp::Assign
            | BinaryOp::AddAssign
            | BinaryOp::SubAssign
            | BinaryOp::MulAssign
            | BinaryOp::DivAssign
            | BinaryOp::ModAssign
            | BinaryOp::ShlAssign
            | BinaryOp::ShrAssign
            | BinaryOp::AndAssign
            | BinaryOp::OrAssign
            | BinaryOp::XorAssign => Priority::Assign,
        }
    }

    /// The next tighter level; `Primary` is its own successor.
    pub const fn tighter(self) -> Priority {
        match self {
            Priority::Statement => Priority::Argument,
            Priority::Argument => Priority::Assign,
            Priority::Assign => Priority::Select,
            Priority::Select => Priority::CondOr,
            Priority::CondOr => Priority::CondAnd,
            Priority::CondAnd => Priority::Or,
            Priority::Or => Priority::Xor,
            Priority::Xor => Priority::And,
            Priority::And => Priority::Equality,
            Priority::Equality => Priority::Rel,
            Priority::Rel => Priority::Shift,
            Priority::Shift => Priority::Add,
            Priority::Add => Priority::Mul,
            Priority::Mul | Priority::Primary => Priority::Primary,
        }
    }
}

/// Whether an infix expression of `op` needs parentheses under `parent`.
///
/// `&&` directly under `||` is parenthesized as well, which compilers
/// otherwise warn about.
pub fn needs_parens(op: BinaryOp, parent: Priority) -> bool {
    let own = Priority::of(op);
    parent > own || (op == BinaryOp::CondAnd && parent == Priority::CondOr)
}

/// One handler per IR node kind.
pub trait Lowering<'a> {
    fn program(&self) -> &'a Program;

    fn out(&mut self) -> &mut CodeWriter;

    /// Name of the class or method being generated, for diagnostics.
    fn context_symbol(&self) -> String;

    fn unsupported(&self, construct: &str) -> CodegenError {
        CodegenError::unsupported(construct, self.context_symbol())
    }

    // Expressions

    fn accept_expr(&mut self, expr: &Expr, parent: Priority) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(literal) => self.visit_literal(expr, literal),
            ExprKind::Symbol { left, symbol } => {
                self.visit_symbol(expr, left.as_deref(), *symbol, parent)
            }
            ExprKind::Call { obj, callee, args } => match callee {
                Callee::Method(_) => self.visit_call(expr, obj.as_deref(), args, parent),
                Callee::Builtin(builtin) => {
                    self.visit_builtin(expr, obj.as_deref(), *builtin, args, parent)
                }
            },
            ExprKind::Property { obj, property } => self.visit_property(obj, *property, parent),
            ExprKind::Unary { op, inner } => self.visit_unary(expr, *op, inner, parent),
            ExprKind::Binary { op, left, right } => {
                self.visit_binary(expr, *op, left, right, parent)
            }
            ExprKind::Cond {
                cond,
                on_true,
                on_false,
            } => self.visit_cond(expr, cond, on_true, on_false, parent),
            ExprKind::Interpolated { parts, suffix } => {
                self.visit_interpolated(parts, suffix, parent)
            }
            ExprKind::Collection(items) => self.visit_collection(expr, items),
            ExprKind::New { element, length } => {
                self.visit_new(element, length.as_deref(), parent)
            }
            ExprKind::Resource(name) => self.visit_resource(name),
        }
    }

    fn visit_literal(&mut self, expr: &Expr, literal: &Literal) -> Result<()>;

    fn visit_symbol(
        &mut self,
        expr: &Expr,
        left: Option<&Expr>,
        symbol: Symbol,
        parent: Priority,
    ) -> Result<()>;

    /// Call of a user method.
    fn visit_call(
        &mut self,
        expr: &Expr,
        obj: Option<&Expr>,
        args: &[Expr],
        parent: Priority,
    ) -> Result<()>;

    fn visit_builtin(
        &mut self,
        expr: &Expr,
        obj: Option<&Expr>,
        builtin: Builtin,
        args: &[Expr],
        parent: Priority,
    ) -> Result<()>;

    fn visit_property(&mut self, obj: &Expr, property: Property, parent: Priority)
        -> Result<()>;

    fn visit_unary(&mut self, _expr: &Expr, op: UnaryOp, inner: &Expr, _parent: Priority)
        -> Result<()> {
        self.write_unary(op, inner)
    }

    fn visit_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        parent: Priority,
    ) -> Result<()>;

    fn visit_cond(
        &mut self,
        expr: &Expr,
        cond: &Expr,
        on_true: &Expr,
        on_false: &Expr,
        parent: Priority,
    ) -> Result<()>;

    fn visit_interpolated(
        &mut self,
        parts: &[InterpolatedPart],
        suffix: &str,
        parent: Priority,
    ) -> Result<()>;

    fn visit_collection(&mut self, expr: &Expr, items: &[Expr]) -> Result<()>;

    fn visit_new(&mut self, element: &Type, length: Option<&Expr>, parent: Priority)
        -> Result<()>;

    fn visit_resource(&mut self, name: &str) -> Result<()>;

    // Statements

    fn accept_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(block) => self.visit_block(block),
            Stmt::Expr(expr) => self.visit_expr_stmt(expr),
            Stmt::Var(var) => self.visit_var(*var),
            Stmt::If {
                cond,
                on_true,
                on_false,
            } => self.visit_if(cond, on_true, on_false.as_deref()),
            Stmt::While { cond, body } => self.visit_while(cond, body),
            Stmt::DoWhile { body, cond } => self.visit_do_while(body, cond),
            Stmt::For {
                init,
                cond,
                advance,
                body,
            } => self.visit_for(init.as_deref(), cond.as_ref(), advance.as_ref(), body),
            Stmt::Foreach {
                element,
                collection,
                body,
            } => self.visit_foreach(*element, collection, body),
            Stmt::Switch {
                value,
                cases,
                default,
            } => self.visit_switch(value, cases, default.as_deref()),
            Stmt::Return(value) => self.visit_return(value.as_ref()),
            Stmt::Throw(message) => self.visit_throw(message),
            Stmt::Break => self.visit_break(),
            Stmt::Continue => self.visit_continue(),
        }
    }

    fn visit_block(&mut self, block: &Block) -> Result<()>;
    fn visit_expr_stmt(&mut self, expr: &Expr) -> Result<()>;
    fn visit_var(&mut self, var: VarId) -> Result<()>;
    fn visit_if(&mut self, cond: &Expr, on_true: &Stmt, on_false: Option<&Stmt>) -> Result<()>;
    fn visit_while(&mut self, cond: &Expr, body: &Stmt) -> Result<()>;
    fn visit_do_while(&mut self, body: &Stmt, cond: &Expr) -> Result<()>;
    fn visit_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        advance: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()>;
    fn visit_foreach(&mut self, element: VarId, collection: &Expr, body: &Stmt) -> Result<()>;
    fn visit_switch(&mut self, value: &Expr, cases: &[Case], default: Option<&[Stmt]>)
        -> Result<()>;
    fn visit_return(&mut self, value: Option<&Expr>) -> Result<()>;
    fn visit_throw(&mut self, message: &Expr) -> Result<()>;
    fn visit_break(&mut self) -> Result<()>;
    fn visit_continue(&mut self) -> Result<()>;

    // Shared helpers

    /// Statements in order.
    fn write_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.accept_stmt(stmt)?;
        }
        Ok(())
    }

    /// `left op right`, parenthesized when `parent` binds tighter.
    fn write_infix(
        &mut self,
        left: &Expr,
        left_priority: Priority,
        op: &str,
        right: &Expr,
        right_priority: Priority,
        parens: bool,
    ) -> Result<()> {
        if parens {
            self.out().write("(");
        }
        self.accept_expr(left, left_priority)?;
        self.out().write(op);
        self.accept_expr(right, right_priority)?;
        if parens {
            self.out().write(")");
        }
        Ok(())
    }

    /// C-family spelling of any binary operator.
    fn write_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, parent: Priority)
        -> Result<()> {
        match op {
            BinaryOp::Index => {
                self.accept_expr(left, Priority::Primary)?;
                self.out().write("[");
                self.accept_expr(right, Priority::Argument)?;
                self.out().write("]");
                Ok(())
            }
            op if op.is_assign() => self.write_infix(
                left,
                Priority::Assign,
                &format!(" {} ", op.as_symbol()),
                right,
                Priority::Assign,
                parent > Priority::Assign,
            ),
            op => {
                let own = Priority::of(op);
                self.write_infix(
                    left,
                    own,
                    &format!(" {} ", op.as_symbol()),
                    right,
                    own.tighter(),
                    needs_parens(op, parent),
                )
            }
        }
    }

    /// C-family prefix or postfix operator.
    fn write_unary(&mut self, op: UnaryOp, inner: &Expr) -> Result<()> {
        if op.is_postfix() {
            self.accept_expr(inner, Priority::Primary)?;
            self.out().write(op.as_symbol());
            return Ok(());
        }
        self.out().write(op.as_symbol());
        // `- -x` must not become `--x`.
        let clash = matches!(op, UnaryOp::Neg | UnaryOp::PreDecrement)
            && starts_with_minus(inner);
        if clash {
            self.out().write("(");
            self.accept_expr(inner, Priority::Statement)?;
            self.out().write(")");
            Ok(())
        } else {
            self.accept_expr(inner, Priority::Primary)
        }
    }

    /// `cond ? on_true : on_false`.
    fn write_select(&mut self, cond: &Expr, on_true: &Expr, on_false: &Expr, parent: Priority)
        -> Result<()> {
        let parens = parent > Priority::Select;
        if parens {
            self.out().write("(");
        }
        self.accept_expr(cond, Priority::CondOr)?;
        self.out().write(" ? ");
        self.accept_expr(on_true, Priority::Select)?;
        self.out().write(" : ");
        self.accept_expr(on_false, Priority::Select)?;
        if parens {
            self.out().write(")");
        }
        Ok(())
    }

    /// Comma-separated expressions.
    fn write_comma_separated(&mut self, items: &[Expr]) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out().write(", ");
            }
            self.accept_expr(item, Priority::Argument)?;
        }
        Ok(())
    }
}

fn starts_with_minus(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Unary { op, .. } => matches!(op, UnaryOp::Neg | UnaryOp::PreDecrement),
        ExprKind::Literal(Literal::Int(n)) => *n < 0,
        ExprKind::Literal(Literal::Float(bits)) => f64::from_bits(*bits).is_sign_negative(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_are_ordered_loosest_first() {
        assert!(Priority::Statement < Priority::Assign);
        assert!(Priority::Add < Priority::Mul);
        assert!(Priority::Mul < Priority::Primary);
        assert_eq!(Priority::Add.tighter(), Priority::Mul);
        assert_eq!(Priority::Primary.tighter(), Priority::Primary);
    }

    #[test]
    fn parens_follow_binding_strength() {
        assert!(needs_parens(BinaryOp::Add, Priority::Mul));
        assert!(!needs_parens(BinaryOp::Mul, Priority::Add));
        assert!(needs_parens(BinaryOp::CondAnd, Priority::CondOr));
        assert!(!needs_parens(BinaryOp::CondOr, Priority::CondOr));
        assert!(!needs_parens(BinaryOp::Equal, Priority::Statement));
    }
}
