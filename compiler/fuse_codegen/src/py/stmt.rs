//! Statements, and the hoisting of `++` and `--` out of expressions.
//!
//! Prefix steps are written before the statement that contains them,
//! postfix steps after it. For conditions, postfix steps open every branch
//! the condition leads to.

use fuse_ir::flow::{completes_normally, has_break};
use fuse_ir::{BinaryOp, Case, Expr, ExprKind, Stmt, Symbol, UnaryOp, VarId};

use super::{JumpTarget, LoopShape, PyCodegen};
use crate::error::{CodegenError, Result};
use crate::traverse::{Lowering, Priority};

/// Operands of `++`/`--` inside `expr` in evaluation order, with whether
/// each is an increment.
fn collect_steps<'e>(expr: &'e Expr, postfix: bool, steps: &mut Vec<(&'e Expr, bool)>) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Resource(_) => {}
        ExprKind::Symbol { left, .. } => {
            if let Some(left) = left {
                collect_steps(left, postfix, steps);
            }
        }
        ExprKind::Call { obj, args, .. } => {
            if let Some(obj) = obj {
                collect_steps(obj, postfix, steps);
            }
            for arg in args {
                collect_steps(arg, postfix, steps);
            }
        }
        ExprKind::Property { obj, .. } => collect_steps(obj, postfix, steps),
        ExprKind::Unary { op, inner } => {
            collect_steps(inner, postfix, steps);
            if op.is_step() && op.is_postfix() == postfix {
                steps.push((inner, op.is_increment()));
            }
        }
        ExprKind::Binary { left, right, .. } => {
            collect_steps(left, postfix, steps);
            collect_steps(right, postfix, steps);
        }
        ExprKind::Cond {
            cond,
            on_true,
            on_false,
        } => {
            collect_steps(cond, postfix, steps);
            collect_steps(on_true, postfix, steps);
            collect_steps(on_false, postfix, steps);
        }
        ExprKind::Interpolated { parts, .. } => {
            for part in parts {
                collect_steps(&part.arg, postfix, steps);
            }
        }
        ExprKind::Collection(items) => {
            for item in items {
                collect_steps(item, postfix, steps);
            }
        }
        ExprKind::New { length, .. } => {
            if let Some(length) = length {
                collect_steps(length, postfix, steps);
            }
        }
    }
}

fn has_steps(expr: &Expr, postfix: bool) -> bool {
    let mut steps = Vec::new();
    collect_steps(expr, postfix, &mut steps);
    !steps.is_empty()
}

/// Whether evaluating `expr` may write `var`.
fn expr_modifies(expr: &Expr, var: VarId) -> bool {
    match &expr.kind {
        ExprKind::Unary { op, inner } => {
            (op.is_step() && inner.is_reference_to(var)) || expr_modifies(inner, var)
        }
        ExprKind::Binary { op, left, right } => {
            (op.is_assign() && left.is_reference_to(var))
                || expr_modifies(left, var)
                || expr_modifies(right, var)
        }
        ExprKind::Symbol { left, .. } => left.as_deref().is_some_and(|l| expr_modifies(l, var)),
        ExprKind::Call { obj, args, .. } => {
            obj.as_deref().is_some_and(|o| expr_modifies(o, var))
                || args.iter().any(|a| expr_modifies(a, var))
        }
        ExprKind::Property { obj, .. } => expr_modifies(obj, var),
        ExprKind::Cond {
            cond,
            on_true,
            on_false,
        } => [cond, on_true, on_false]
            .into_iter()
            .any(|e| expr_modifies(e, var)),
        ExprKind::Interpolated { parts, .. } => parts.iter().any(|p| expr_modifies(&p.arg, var)),
        ExprKind::Collection(items) => items.iter().any(|i| expr_modifies(i, var)),
        ExprKind::New { length, .. } => length.as_deref().is_some_and(|l| expr_modifies(l, var)),
        ExprKind::Literal(_) | ExprKind::Resource(_) => false,
    }
}

/// Whether executing `stmt` may write `var`.
fn stmt_modifies(stmt: &Stmt, var: VarId) -> bool {
    let any = |stmts: &[Stmt]| stmts.iter().any(|s| stmt_modifies(s, var));
    match stmt {
        Stmt::Block(block) => any(&block.stmts),
        Stmt::Expr(expr) | Stmt::Throw(expr) | Stmt::Return(Some(expr)) => {
            expr_modifies(expr, var)
        }
        Stmt::If {
            cond,
            on_true,
            on_false,
        } => {
            expr_modifies(cond, var)
                || stmt_modifies(on_true, var)
                || on_false.as_deref().is_some_and(|s| stmt_modifies(s, var))
        }
        Stmt::While { cond, body } | Stmt::DoWhile { body, cond } => {
            expr_modifies(cond, var) || stmt_modifies(body, var)
        }
        Stmt::For {
            init,
            cond,
            advance,
            body,
        } => {
            init.as_deref().is_some_and(|s| stmt_modifies(s, var))
                || cond.as_ref().is_some_and(|c| expr_modifies(c, var))
                || advance.as_ref().is_some_and(|a| expr_modifies(a, var))
                || stmt_modifies(body, var)
        }
        Stmt::Foreach {
            collection, body, ..
        } => expr_modifies(collection, var) || stmt_modifies(body, var),
        Stmt::Switch {
            value,
            cases,
            default,
        } => {
            expr_modifies(value, var)
                || cases.iter().any(|c| any(&c.body))
                || default.as_deref().is_some_and(any)
        }
        Stmt::Var(_) | Stmt::Return(None) | Stmt::Break | Stmt::Continue => false,
    }
}

/// A case body without the `break` that ends it.
fn without_trailing_break(stmts: &[Stmt]) -> &[Stmt] {
    match stmts {
        [rest @ .., Stmt::Break] => rest,
        _ => stmts,
    }
}

fn has_early_break(stmts: &[Stmt]) -> bool {
    without_trailing_break(stmts).iter().any(has_break)
}

/// A switch value that may be repeated in every comparison.
fn is_simple_subject(value: &Expr) -> bool {
    match &value.kind {
        ExprKind::Symbol { left: None, .. } => true,
        ExprKind::Symbol {
            left: Some(left),
            symbol: Symbol::Field(_),
        } => matches!(
            left.kind,
            ExprKind::Symbol {
                left: None,
                symbol: Symbol::Var(_) | Symbol::This
            }
        ),
        _ => false,
    }
}

/// `for (int i = start; i < limit; i++)` with a loop-invariant limit.
struct RangeLoop {
    var: VarId,
    start: Expr,
    limit: Expr,
}

impl PyCodegen<'_> {
    /// Write `x += 1` for each step in `expr`; returns whether any was.
    pub(super) fn write_steps(&mut self, expr: &Expr, postfix: bool) -> Result<bool> {
        let mut steps = Vec::new();
        collect_steps(expr, postfix, &mut steps);
        for &(operand, increment) in &steps {
            self.accept_expr(operand, Priority::Assign)?;
            self.out.writeln(if increment { " += 1" } else { " -= 1" });
        }
        Ok(!steps.is_empty())
    }

    /// `keyword cond:` opening a suite that starts with the postfix steps
    /// of `cond`; returns whether there were any.
    fn open_cond(&mut self, keyword: &str, cond: &Expr, priority: Priority) -> Result<bool> {
        self.write_steps(cond, false)?;
        self.out.write(keyword);
        self.accept_expr(cond, priority)?;
        self.open_suite();
        self.write_steps(cond, true)
    }

    pub(super) fn lower_expr_stmt(&mut self, expr: &Expr) -> Result<()> {
        self.write_steps(expr, false)?;
        let bare_step = matches!(&expr.kind, ExprKind::Unary { op, .. } if op.is_step());
        if !bare_step {
            self.accept_expr(expr, Priority::Statement)?;
            self.out.newline();
        }
        self.write_steps(expr, true)?;
        Ok(())
    }

    pub(super) fn lower_var(&mut self, var: VarId) -> Result<()> {
        let program = self.program;
        let v = program.var(var);
        let name = self.local_name(var);
        match &v.value {
            Some(value) => {
                self.write_steps(value, false)?;
                self.out.write(&format!("{name} = "));
                let chained = matches!(
                    value.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Assign,
                        ..
                    }
                );
                let priority = if chained {
                    Priority::Statement
                } else {
                    Priority::Argument
                };
                self.accept_expr(value, priority)?;
                self.out.newline();
                self.write_steps(value, true)?;
            }
            None if Self::needs_storage_init(&v.ty) => {
                self.out.write(&format!("{name} = "));
                self.write_storage_init(&v.ty)?;
                self.out.newline();
            }
            None => {}
        }
        Ok(())
    }

    pub(super) fn lower_if(&mut self, cond: &Expr, on_true: &Stmt, on_false: Option<&Stmt>)
        -> Result<()> {
        let post = self.open_cond("if ", cond, Priority::Argument)?;
        self.accept_stmt(on_true)?;
        self.close_suite();

        if on_false.is_none() {
            if post && !completes_normally(on_true) {
                self.write_steps(cond, true)?;
                return Ok(());
            }
            if !post {
                return Ok(());
            }
        }
        if !post {
            if let Some(Stmt::If {
                cond,
                on_true,
                on_false,
            }) = on_false
            {
                if !has_steps(cond, false) {
                    self.out.write("el");
                    return self.lower_if(cond, on_true, on_false.as_deref());
                }
            }
        }
        self.out.write("else");
        self.open_suite();
        if post {
            self.write_steps(cond, true)?;
        }
        if let Some(on_false) = on_false {
            self.accept_stmt(on_false)?;
        }
        self.close_suite();
        Ok(())
    }

    /// Loop body in its own suite, with `shape` as the `continue` target.
    pub(super) fn write_loop_suite(&mut self, shape: LoopShape, body: &Stmt) -> Result<()> {
        self.open_suite();
        self.write_loop_body(shape, body)?;
        self.close_suite();
        Ok(())
    }

    fn write_loop_body(&mut self, shape: LoopShape, body: &Stmt) -> Result<()> {
        self.jumps.push(JumpTarget::Loop(shape));
        let result = self.accept_stmt(body);
        self.jumps.pop();
        result
    }

    /// Close a `while` suite; the last, failing test still runs the
    /// postfix steps of `cond`.
    fn close_while(&mut self, cond: Option<&Expr>, body: &Stmt) -> Result<()> {
        self.close_suite();
        let Some(cond) = cond.filter(|cond| has_steps(cond, true)) else {
            return Ok(());
        };
        if has_break(body) {
            self.out.write("else");
            self.open_suite();
            self.write_steps(cond, true)?;
            self.close_suite();
        } else {
            self.write_steps(cond, true)?;
        }
        Ok(())
    }

    pub(super) fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<()> {
        self.open_cond("while ", cond, Priority::Argument)?;
        self.write_loop_body(LoopShape::While(cond.clone()), body)?;
        self.write_steps(cond, false)?;
        self.close_while(Some(cond), body)
    }

    pub(super) fn lower_do_while(&mut self, body: &Stmt, cond: &Expr) -> Result<()> {
        self.out.write("while True");
        self.open_suite();
        self.write_loop_body(LoopShape::DoWhile(cond.clone()), body)?;
        self.open_cond("if not ", cond, Priority::Or)?;
        self.out.writeln("break");
        self.close_suite();
        self.write_steps(cond, true)?;
        self.close_suite();
        Ok(())
    }

    fn range_loop(
        &self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        advance: Option<&Expr>,
        body: &Stmt,
    ) -> Option<RangeLoop> {
        let Some(Stmt::Var(var)) = init else {
            return None;
        };
        let var = *var;
        let v = self.program.var(var);
        let start = v.value.as_ref()?;
        if !v.ty.is_integer() || has_steps(start, false) || has_steps(start, true) {
            return None;
        }
        let ExprKind::Binary {
            op: BinaryOp::Less,
            left,
            right: limit,
        } = &cond?.kind
        else {
            return None;
        };
        let invariant_limit = limit.as_int_literal().is_some()
            || matches!(
                limit.kind,
                ExprKind::Symbol {
                    symbol: Symbol::Const(_),
                    ..
                }
            );
        let steps_up = matches!(
            &advance?.kind,
            ExprKind::Unary {
                op: UnaryOp::PreIncrement | UnaryOp::PostIncrement,
                inner,
            } if inner.is_reference_to(var)
        );
        (left.is_reference_to(var) && invariant_limit && steps_up && !stmt_modifies(body, var))
            .then(|| RangeLoop {
                var,
                start: start.clone(),
                limit: Expr::clone(limit),
            })
    }

    pub(super) fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        advance: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()> {
        if let Some(range) = self.range_loop(init, cond, advance, body) {
            let name = self.local_name(range.var);
            self.out.write(&format!("for {name} in range("));
            if range.start.as_int_literal() != Some(0) {
                self.accept_expr(&range.start, Priority::Argument)?;
                self.out.write(", ");
            }
            self.accept_expr(&range.limit, Priority::Argument)?;
            self.out.write(")");
            return self.write_loop_suite(LoopShape::Native, body);
        }

        if let Some(init) = init {
            self.accept_stmt(init)?;
        }
        match cond {
            Some(cond) => {
                self.open_cond("while ", cond, Priority::Argument)?;
            }
            None => {
                self.out.write("while True");
                self.open_suite();
            }
        }
        let shape = LoopShape::For {
            cond: cond.cloned(),
            advance: advance.cloned(),
        };
        self.write_loop_body(shape, body)?;
        if let Some(advance) = advance {
            self.lower_expr_stmt(advance)?;
        }
        if let Some(cond) = cond {
            self.write_steps(cond, false)?;
        }
        self.close_while(cond, body)
    }

    /// Repeat what the loop header would run before `continue`.
    pub(super) fn lower_continue(&mut self) -> Result<()> {
        let shape = self.jumps.iter().rev().find_map(|jump| match jump {
            JumpTarget::Loop(shape) => Some(shape.clone()),
            JumpTarget::Switch => None,
        });
        let Some(shape) = shape else {
            return Err(CodegenError::internal(
                "continue outside a loop",
                self.context_symbol(),
            ));
        };
        match &shape {
            LoopShape::Native => {}
            LoopShape::While(cond) => {
                self.write_steps(cond, false)?;
            }
            LoopShape::DoWhile(cond) => {
                self.open_cond("if ", cond, Priority::Argument)?;
                self.out.writeln("continue");
                self.close_suite();
                self.write_steps(cond, true)?;
                self.out.writeln("break");
                return Ok(());
            }
            LoopShape::For { cond, advance } => {
                if let Some(advance) = advance {
                    self.lower_expr_stmt(advance)?;
                }
                if let Some(cond) = cond {
                    self.write_steps(cond, false)?;
                }
            }
        }
        self.out.writeln("continue");
        Ok(())
    }

    pub(super) fn lower_switch(
        &mut self,
        value: &Expr,
        cases: &[Case],
        default: Option<&[Stmt]>,
    ) -> Result<()> {
        let early = cases.iter().any(|case| has_early_break(&case.body))
            || default.is_some_and(has_early_break);
        if early {
            self.switch_break = true;
            self.out.write("try");
            self.open_suite();
        }

        let subject = if is_simple_subject(value) {
            Some(value)
        } else {
            self.write_steps(value, false)?;
            self.out.write("fu_switch_tmp = ");
            self.accept_expr(value, Priority::Argument)?;
            self.out.newline();
            self.write_steps(value, true)?;
            None
        };

        self.jumps.push(JumpTarget::Switch);
        let mut keyword = "if ";
        for case in cases {
            for (i, case_value) in case.values.iter().enumerate() {
                self.out.write(if i == 0 { keyword } else { " or " });
                match subject {
                    Some(subject) => self.accept_expr(subject, Priority::Shift)?,
                    None => self.out.write("fu_switch_tmp"),
                }
                self.out.write(" == ");
                self.accept_expr(case_value, Priority::Shift)?;
            }
            self.open_suite();
            self.write_stmts(without_trailing_break(&case.body))?;
            self.close_suite();
            keyword = "elif ";
        }
        let default = default.map(without_trailing_break).unwrap_or_default();
        if !default.is_empty() {
            if cases.is_empty() {
                self.write_stmts(default)?;
            } else {
                self.out.write("else");
                self.open_suite();
                self.write_stmts(default)?;
                self.close_suite();
            }
        }
        self.jumps.pop();

        if early {
            self.close_suite();
            self.out.write("except FuBreak");
            self.open_suite();
            self.close_suite();
        }
        Ok(())
    }

    pub(super) fn lower_return(&mut self, value: Option<&Expr>) -> Result<()> {
        let Some(value) = value else {
            self.out.writeln("return");
            return Ok(());
        };
        self.write_steps(value, false)?;
        if has_steps(value, true) {
            self.out.write("result = ");
            self.accept_expr(value, Priority::Argument)?;
            self.out.newline();
            self.write_steps(value, true)?;
            self.out.writeln("return result");
        } else {
            self.out.write("return ");
            self.accept_expr(value, Priority::Argument)?;
            self.out.newline();
        }
        Ok(())
    }
}
