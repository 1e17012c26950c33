//! Statements, teardown injection and failure forwarding.

use fuse_ir::flow::{completes_normally, list_completes_normally};
use fuse_ir::{BinaryOp, Block, Case, Expr, ExprKind, MethodId, Stmt, Type, VarId};

use super::destruct::JumpKind;
use super::runtime::RuntimeFeatures;
use super::CCodegen;
use crate::error::{CodegenError, Result};
use crate::traverse::{Lowering, Priority};

/// Value tested after a may-fail call.
pub(super) enum Checked<'e> {
    /// The call expression itself, or an assignment of it.
    Expr(&'e Expr),
    /// A variable or field initialized from the call.
    Name(&'e str),
}

impl CCodegen<'_> {
    // Failure forwarding

    /// The may-fail method called by `expr`, directly or as the right side
    /// of an assignment.
    pub(super) fn may_fail_call(&self, expr: &Expr) -> Option<MethodId> {
        let call = match &expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Assign,
                right,
                ..
            } => right,
            _ => expr,
        };
        call.called_method()
            .filter(|&method| self.program.method(method).throws)
    }

    /// `if (<call failed>) return <sentinel>;`, tearing down everything
    /// pending first.
    pub(super) fn write_forward_throw(&mut self, checked: Checked<'_>, callee: MethodId) -> Result<()> {
        let sentinel = self.failure_sentinel()?;
        self.out.write("if (");
        match self.program.method(callee).return_type.clone() {
            None => {
                self.out.write("!");
                self.write_checked(&checked, Priority::Primary)?;
            }
            Some(Type::Int(_)) => {
                self.write_checked(&checked, Priority::Equality)?;
                self.out.write(" == -1");
            }
            Some(Type::Float(_)) => {
                self.out.include("math.h");
                self.out.write("isnan(");
                self.write_checked(&checked, Priority::Argument)?;
                self.out.write(")");
            }
            Some(ty) if ty.is_string() || ty.is_pointer() => {
                self.write_checked(&checked, Priority::Equality)?;
                self.out.write(" == NULL");
            }
            Some(_) => return Err(self.unsupported("failure sentinel for this return type")),
        }
        self.out.write(")");
        if self.pending.is_empty() {
            self.out.newline();
            self.out.indent();
            self.out.writeln(&format!("return {sentinel};"));
            self.out.dedent();
        } else {
            self.out.write(" ");
            self.out.open_block();
            self.write_destruct_all()?;
            self.out.writeln(&format!("return {sentinel};"));
            self.out.close_block();
        }
        Ok(())
    }

    fn write_checked(&mut self, checked: &Checked<'_>, parent: Priority) -> Result<()> {
        match checked {
            Checked::Expr(expr) => self.accept_expr(expr, parent),
            Checked::Name(name) => {
                self.out.write(name);
                Ok(())
            }
        }
    }

    /// `return <call succeeded> [? value : sentinel];` in place of a
    /// may-fail call followed by a return. Only valid with nothing pending.
    pub(super) fn write_call_and_return(&mut self, call: &Expr, value: Option<&Expr>) -> Result<()> {
        let Some(callee) = self.may_fail_call(call) else {
            return Err(CodegenError::internal("collapsed return without a may-fail call", self.context_symbol()));
        };
        let sentinel = self.failure_sentinel()?;
        self.out.write("return ");
        match self.program.method(callee).return_type.clone() {
            None => self.accept_expr(call, Priority::Select)?,
            Some(Type::Int(_)) => {
                self.accept_expr(call, Priority::Equality)?;
                self.out.write(" != -1");
            }
            Some(Type::Float(_)) => {
                self.out.include("math.h");
                self.out.write("!isnan(");
                self.accept_expr(call, Priority::Argument)?;
                self.out.write(")");
            }
            Some(_) => {
                self.accept_expr(call, Priority::Equality)?;
                self.out.write(" != NULL");
            }
        }
        if let Some(value) = value {
            self.out.write(" ? ");
            let return_type = self.current_return_type();
            match return_type {
                Some(ty) => self.write_coerced(&ty, value, Priority::Select)?,
                None => self.accept_expr(value, Priority::Select)?,
            }
            self.out.write(&format!(" : {sentinel}"));
        }
        self.out.writeln(";");
        Ok(())
    }

    fn current_return_type(&self) -> Option<Type> {
        self.current_method
            .and_then(|m| self.program.method(m).return_type.clone())
    }

    fn current_method_throws(&self) -> bool {
        self.current_method
            .is_some_and(|m| self.program.method(m).throws)
    }

    /// Statement list, collapsing a trailing may-fail call and return.
    pub(super) fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        if let [init @ .., call @ Stmt::Expr(call_expr), ret @ Stmt::Return(value)] = stmts {
            if self.current_method_throws() && self.may_fail_call(call_expr).is_some() {
                for stmt in init {
                    self.accept_stmt(stmt)?;
                }
                if self.pending.is_empty() {
                    return self.write_call_and_return(call_expr, value.as_ref());
                }
                self.accept_stmt(call)?;
                return self.accept_stmt(ret);
            }
        }
        for stmt in stmts {
            self.accept_stmt(stmt)?;
        }
        Ok(())
    }

    // Teardown

    /// Teardown of one value: `free`, release, destructor call or list
    /// destruct, looping backwards over array storage.
    pub(super) fn write_destruct(&mut self, name: &str, ty: &Type) -> Result<()> {
        let mut target = name.to_string();
        let mut ty = ty;
        let mut depth = 0;
        while let Type::ArrayStorage { element, length } = ty {
            self.out.writeln(&format!(
                "for (int _i{depth} = {}; _i{depth} >= 0; _i{depth}--)",
                i64::from(*length) - 1
            ));
            self.out.indent();
            target.push_str(&format!("[_i{depth}]"));
            ty = element;
            depth += 1;
        }
        match ty {
            Type::StringStorage => self.out.writeln(&format!("free({target});")),
            Type::ClassValue(class) => {
                let name = self.class_name(*class);
                self.out.writeln(&format!("{name}_Destruct(&{target});"));
            }
            Type::List(_) => {
                self.require(RuntimeFeatures::LIST_DESTRUCT);
                self.out.writeln(&format!("FuList_Destruct(&{target});"));
            }
            ty if ty.is_dynamic_ptr() => {
                self.require(RuntimeFeatures::SHARED_RELEASE);
                self.out.writeln(&format!("FuShared_Release({target});"));
            }
            _ => {
                return Err(CodegenError::internal(
                    "teardown of a type without resources",
                    self.context_symbol(),
                ))
            }
        }
        for _ in 0..depth {
            self.out.dedent();
        }
        Ok(())
    }

    pub(super) fn write_var_destruct(&mut self, var: VarId) -> Result<()> {
        let name = self.local_name(var);
        let ty = self.program.var(var).ty.clone();
        self.write_destruct(&name, &ty)
    }

    /// Tear down every pending variable, innermost first.
    pub(super) fn write_destruct_all(&mut self) -> Result<()> {
        for var in self.pending.all() {
            self.write_var_destruct(var)?;
        }
        Ok(())
    }

    // Statements

    /// Whether `stmt` expands to several C statements.
    fn needs_block(&self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Break => !self.pending.for_break().is_empty(),
            Stmt::Continue => !self.pending.for_continue().is_empty(),
            Stmt::Return(_) | Stmt::Throw(_) => !self.pending.is_empty(),
            Stmt::Expr(expr) => self.may_fail_call(expr).is_some(),
            Stmt::Var(_) => true,
            _ => false,
        }
    }

    /// Body of `if`, `else` or a loop, after its header.
    fn write_child(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(block) => {
                self.out.write(" ");
                self.lower_block(block)
            }
            stmt if self.needs_block(stmt) => {
                self.out.write(" ");
                self.out.open_block();
                let mark = self.pending.mark();
                self.accept_stmt(stmt)?;
                if completes_normally(stmt) {
                    for var in self.pending.since(mark) {
                        self.write_var_destruct(var)?;
                    }
                }
                self.pending.truncate(mark);
                self.out.close_block();
                Ok(())
            }
            stmt => {
                self.out.newline();
                self.out.indent();
                self.accept_stmt(stmt)?;
                self.out.dedent();
                Ok(())
            }
        }
    }

    pub(super) fn lower_block(&mut self, block: &Block) -> Result<()> {
        self.out.open_block();
        let mark = self.pending.mark();
        self.write_stmts(&block.stmts)?;
        if list_completes_normally(&block.stmts) {
            for var in self.pending.since(mark) {
                self.write_var_destruct(var)?;
            }
        }
        self.pending.truncate(mark);
        self.out.close_block();
        Ok(())
    }

    pub(super) fn lower_expr_stmt(&mut self, expr: &Expr) -> Result<()> {
        if let Some(callee) = self.may_fail_call(expr) {
            return self.write_forward_throw(Checked::Expr(expr), callee);
        }
        let discards_owner = matches!(
            expr.kind,
            ExprKind::Call { .. } | ExprKind::Interpolated { .. } | ExprKind::New { .. }
        );
        match &expr.ty {
            Some(Type::StringStorage) if discards_owner => {
                self.out.write("free(");
                self.accept_expr(expr, Priority::Argument)?;
                self.out.writeln(");");
            }
            Some(ty) if discards_owner && ty.is_dynamic_ptr() => {
                self.require(RuntimeFeatures::SHARED_RELEASE);
                self.out.write("FuShared_Release(");
                self.accept_expr(expr, Priority::Argument)?;
                self.out.writeln(");");
            }
            _ => {
                self.accept_expr(expr, Priority::Statement)?;
                self.out.writeln(";");
            }
        }
        Ok(())
    }

    /// ` = value`, or the implicit initializer of owning types.
    fn write_var_init(&mut self, ty: &Type, value: Option<&Expr>) -> Result<()> {
        match (ty, value) {
            (Type::ArrayStorage { .. }, None) => {
                let storage = ty.storage_type();
                if *storage == Type::StringStorage || storage.is_dynamic_ptr() {
                    self.out.write(" = { NULL }");
                }
            }
            (Type::ArrayStorage { .. }, Some(value)) => match &value.kind {
                ExprKind::Collection(_) => {
                    self.out.write(" = ");
                    self.accept_expr(value, Priority::Argument)?;
                }
                ExprKind::Literal(literal) if literal.is_default_value() => {
                    self.out.write(" = { 0 }");
                }
                _ => return Err(self.unsupported("array initializer")),
            },
            (ty, None) if *ty == Type::StringStorage || ty.is_dynamic_ptr() => {
                self.out.write(" = NULL");
            }
            (_, None) => {}
            (ty, Some(value)) => {
                self.out.write(" = ");
                self.write_coerced(ty, value, Priority::Argument)?;
            }
        }
        Ok(())
    }

    pub(super) fn lower_var(&mut self, var: VarId) -> Result<()> {
        let program = self.program;
        let v = program.var(var);
        let name = self.local_name(var);
        if let Type::List(element) = &v.ty {
            self.require(RuntimeFeatures::LIST);
            self.out.writeln(&format!("FuList {name};"));
            self.write_list_init(&name, element)?;
            self.pending.register(var);
            return Ok(());
        }
        let decl = self.declaration(&v.ty, &name, true)?;
        self.out.write(&decl);
        self.write_var_init(&v.ty, v.value.as_ref())?;
        self.out.writeln(";");

        if let Some(callee) = v.value.as_ref().and_then(|value| self.may_fail_call(value)) {
            self.write_forward_throw(Checked::Name(&name), callee)?;
        }
        if let Type::ClassValue(class) = v.ty.storage_type() {
            if self.needs_constructor(*class) {
                let class_name = self.class_name(*class);
                let mut target = name.clone();
                let mut ty = &v.ty;
                let mut depth = 0;
                while let Type::ArrayStorage { element, length } = ty {
                    self.out.writeln(&format!(
                        "for (int _i{depth} = 0; _i{depth} < {length}; _i{depth}++)"
                    ));
                    self.out.indent();
                    target.push_str(&format!("[_i{depth}]"));
                    ty = element;
                    depth += 1;
                }
                self.out.writeln(&format!("{class_name}_Construct(&{target});"));
                for _ in 0..depth {
                    self.out.dedent();
                }
            }
        }
        if self.needs_destruct(&v.ty) {
            self.pending.register(var);
        }
        Ok(())
    }

    pub(super) fn lower_if(&mut self, cond: &Expr, on_true: &Stmt, on_false: Option<&Stmt>) -> Result<()> {
        self.out.write("if (");
        self.accept_expr(cond, Priority::Argument)?;
        self.out.write(")");
        self.write_child(on_true)?;
        if let Some(on_false) = on_false {
            self.out.write("else");
            if let Stmt::If { cond, on_true, on_false } = on_false {
                self.out.write(" ");
                return self.lower_if(cond, on_true, on_false.as_deref());
            }
            self.write_child(on_false)?;
        }
        Ok(())
    }

    fn write_loop_body(&mut self, body: &Stmt) -> Result<()> {
        self.pending.enter(JumpKind::Loop);
        let result = self.write_child(body);
        self.pending.exit();
        result
    }

    pub(super) fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<()> {
        self.out.write("while (");
        self.accept_expr(cond, Priority::Argument)?;
        self.out.write(")");
        self.write_loop_body(body)
    }

    pub(super) fn lower_do_while(&mut self, body: &Stmt, cond: &Expr) -> Result<()> {
        self.out.write("do");
        self.write_loop_body(body)?;
        self.out.write("while (");
        self.accept_expr(cond, Priority::Argument)?;
        self.out.writeln(");");
        Ok(())
    }

    pub(super) fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        advance: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()> {
        self.out.write("for (");
        match init {
            None => {}
            Some(Stmt::Var(var)) => {
                let program = self.program;
                let v = program.var(*var);
                if self.needs_destruct(&v.ty) {
                    return Err(self.unsupported("loop initializer needing teardown"));
                }
                let name = self.local_name(*var);
                let decl = self.declaration(&v.ty, &name, true)?;
                self.out.write(&decl);
                self.write_var_init(&v.ty, v.value.as_ref())?;
            }
            Some(Stmt::Expr(expr)) => self.accept_expr(expr, Priority::Statement)?,
            Some(_) => return Err(self.unsupported("loop initializer statement")),
        }
        self.out.write(";");
        if let Some(cond) = cond {
            self.out.write(" ");
            self.accept_expr(cond, Priority::Argument)?;
        }
        self.out.write(";");
        if let Some(advance) = advance {
            self.out.write(" ");
            self.accept_expr(advance, Priority::Statement)?;
        }
        self.out.write(")");
        self.write_loop_body(body)
    }

    pub(super) fn lower_foreach(&mut self, element: VarId, collection: &Expr, body: &Stmt) -> Result<()> {
        let Some(Type::ArrayStorage { length, .. }) = &collection.ty else {
            return Err(self.unsupported("foreach over a collection without fixed length"));
        };
        let name = self.local_name(element);
        self.out.write(&format!(
            "for (int {name} = 0; {name} < {length}; {name}++)"
        ));
        self.foreach_elements.insert(element, collection.clone());
        let result = self.write_loop_body(body);
        self.foreach_elements.remove(&element);
        result
    }

    fn write_case_body(&mut self, body: &[Stmt]) -> Result<()> {
        self.out.indent();
        // A label must precede a statement, not a declaration.
        if matches!(body.first(), Some(Stmt::Var(_))) {
            self.out.writeln(";");
        }
        let mark = self.pending.mark();
        self.write_stmts(body)?;
        self.pending.truncate(mark);
        self.out.dedent();
        Ok(())
    }

    pub(super) fn lower_switch(&mut self, value: &Expr, cases: &[Case], default: Option<&[Stmt]>) -> Result<()> {
        self.out.write("switch (");
        self.accept_expr(value, Priority::Argument)?;
        self.out.write(") ");
        self.out.open_block();
        self.pending.enter(JumpKind::Switch);
        let result = self.write_cases(cases, default);
        self.pending.exit();
        result?;
        self.out.close_block();
        Ok(())
    }

    fn write_cases(&mut self, cases: &[Case], default: Option<&[Stmt]>) -> Result<()> {
        for case in cases {
            for value in &case.values {
                self.out.write("case ");
                self.accept_expr(value, Priority::Argument)?;
                self.out.writeln(":");
            }
            self.write_case_body(&case.body)?;
        }
        if let Some(default) = default {
            self.out.writeln("default:");
            self.write_case_body(default)?;
        }
        Ok(())
    }

    pub(super) fn lower_return(&mut self, value: Option<&Expr>) -> Result<()> {
        let Some(value) = value else {
            self.write_destruct_all()?;
            self.out.writeln(if self.current_method_throws() {
                "return true;"
            } else {
                "return;"
            });
            return Ok(());
        };
        let return_type = self.current_return_type().ok_or_else(|| {
            CodegenError::internal("return value outside a value method", self.context_symbol())
        })?;

        if self.pending.is_empty() || value.as_literal().is_some() {
            self.write_destruct_all()?;
            self.out.write("return ");
            self.write_coerced(&return_type, value, Priority::Argument)?;
            self.out.writeln(";");
            return Ok(());
        }

        // Returning an owning local hands its ownership to the caller.
        if let ExprKind::Symbol {
            left: None,
            symbol: fuse_ir::Symbol::Var(var),
        } = value.kind
        {
            let owned = return_type == Type::StringStorage || return_type.is_dynamic_ptr();
            if owned && self.pending.contains(var) && self.program.var(var).ty == return_type {
                for pending in self.pending.all_except(var) {
                    self.write_var_destruct(pending)?;
                }
                self.out.writeln(&format!("return {};", self.local_name(var)));
                return Ok(());
            }
        }

        let decl = self.declaration(&return_type, "returnValue", true)?;
        self.out.write(&format!("{decl} = "));
        self.write_coerced(&return_type, value, Priority::Argument)?;
        self.out.writeln(";");
        self.write_destruct_all()?;
        self.out.writeln("return returnValue;");
        Ok(())
    }
}
