//! Python Code Generation
//!
//! Lowers the IR to a single module. The target collects garbage, raises
//! exceptions and dispatches dynamically, so none of the C engine's
//! bookkeeping is needed. What remains is syntax the target lacks:
//!
//! - `++` and `--` are hoisted into `x += 1` statements around the
//!   statement or condition that contains them
//! - `switch` becomes an `if`/`elif` chain; a `break` before the end of a
//!   case raises `FuBreak`, caught around the chain
//! - `__init__` is synthesized from field initializers and the constructor

mod class;
mod expr;
mod stmt;

use fuse_ir::{
    Block, Builtin, BinaryOp, Case, ClassId, ConstId, EnumId, Expr, InterpolatedPart, Literal,
    MethodId, Program, Property, Stmt, Symbol, Type, UnaryOp, VarId,
};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::Result;
use crate::naming::{lower_with_underscores, py_local_name, upper_with_underscores};
use crate::traverse::{Lowering, Priority};
use crate::writer::CodeWriter;
use crate::{Artifact, CodegenOptions};

const BANNER: &str = "# Generated automatically with \"fusec\". Do not edit.";

/// What a `break` or `continue` inside the current statement refers to.
#[derive(Clone, Debug)]
enum JumpTarget {
    Switch,
    Loop(LoopShape),
}

/// How a loop was spelled, which decides what `continue` must repeat.
#[derive(Clone, Debug)]
enum LoopShape {
    /// `for ... in`: nothing to repeat.
    Native,
    /// `while cond:`; prefix steps of `cond` run before re-testing.
    While(Expr),
    /// `while True:` ending in `if not cond: break`.
    DoWhile(Expr),
    /// `for` rewritten as `while`; the advance runs before re-testing.
    For {
        cond: Option<Expr>,
        advance: Option<Expr>,
    },
}

/// Python backend state for one program.
pub struct PyCodegen<'a> {
    program: &'a Program,
    options: &'a CodegenOptions,
    out: CodeWriter,
    current_class: Option<ClassId>,
    current_method: Option<MethodId>,
    /// Classes already written; a base must precede its subclasses.
    written_classes: FxHashSet<ClassId>,
    /// Set once any switch raises `FuBreak`.
    switch_break: bool,
    /// Enclosing loops and switches, innermost last.
    jumps: Vec<JumpTarget>,
    /// Output length at the start of each open suite.
    suites: Vec<usize>,
}

impl<'a> PyCodegen<'a> {
    pub fn new(program: &'a Program, options: &'a CodegenOptions) -> Self {
        PyCodegen {
            program,
            options,
            out: CodeWriter::new(),
            current_class: None,
            current_method: None,
            written_classes: FxHashSet::default(),
            switch_break: false,
            jumps: Vec::new(),
            suites: Vec::new(),
        }
    }

    /// Generate the module.
    pub fn generate(mut self) -> Result<Vec<Artifact>> {
        let file_name = self.options.file_name("py");
        debug!(file = %file_name, "generating Python");
        let program = self.program;

        for id in program.enum_ids() {
            self.write_enum(id)?;
        }
        for class in program.class_ids() {
            self.write_class(class)?;
        }
        self.current_class = None;
        self.write_resources();
        let body = self.out.take_output();

        let mut module = CodeWriter::new();
        module.writeln(BANNER);
        for import in self.out.take_includes() {
            module.writeln(&format!("import {import}"));
        }
        if self.switch_break {
            module.newline();
            module.writeln("class FuBreak(Exception): pass");
        }
        module.write(&body);

        debug!(classes = self.written_classes.len(), "Python generation finished");
        Ok(vec![Artifact {
            file_name,
            contents: module.take_output(),
        }])
    }

    // Suites

    /// End the header line with `:` and indent the suite.
    fn open_suite(&mut self) {
        self.out.writeln(":");
        self.out.indent();
        self.suites.push(self.out.len());
    }

    /// Dedent, writing `pass` if the suite stayed empty.
    fn close_suite(&mut self) {
        if self.suites.pop() == Some(self.out.len()) {
            self.out.writeln("pass");
        }
        self.out.dedent();
    }

    // Names

    fn class_name(&self, class: ClassId) -> String {
        format!("{}{}", self.options.namespace, self.program.class(class).name)
    }

    fn enum_name(&self, id: EnumId) -> String {
        format!("{}{}", self.options.namespace, self.program.enum_def(id).name)
    }

    fn method_name(&self, method: MethodId) -> String {
        lower_with_underscores(&self.program.method(method).name)
    }

    fn const_name(&self, konst: ConstId) -> String {
        upper_with_underscores(&self.program.konst(konst).name)
    }

    fn local_name(&self, var: VarId) -> String {
        py_local_name(&self.program.var(var).name)
    }
}

impl<'a> Lowering<'a> for PyCodegen<'a> {
    fn program(&self) -> &'a Program {
        self.program
    }

    fn out(&mut self) -> &mut CodeWriter {
        &mut self.out
    }

    fn context_symbol(&self) -> String {
        match (self.current_class, self.current_method) {
            (_, Some(method)) => {
                let m = self.program.method(method);
                format!("{}.{}", self.program.class(m.class).name, m.name)
            }
            (Some(class), None) => self.program.class(class).name.clone(),
            (None, None) => "program".to_string(),
        }
    }

    fn visit_literal(&mut self, _expr: &Expr, literal: &Literal) -> Result<()> {
        self.lower_literal(literal);
        Ok(())
    }

    fn visit_symbol(
        &mut self,
        _expr: &Expr,
        left: Option<&Expr>,
        symbol: Symbol,
        _parent: Priority,
    ) -> Result<()> {
        self.lower_symbol(left, symbol)
    }

    fn visit_call(
        &mut self,
        expr: &Expr,
        obj: Option<&Expr>,
        args: &[Expr],
        _parent: Priority,
    ) -> Result<()> {
        self.lower_call(expr, obj, args)
    }

    fn visit_builtin(
        &mut self,
        _expr: &Expr,
        obj: Option<&Expr>,
        builtin: Builtin,
        args: &[Expr],
        parent: Priority,
    ) -> Result<()> {
        self.lower_builtin(obj, builtin, args, parent)
    }

    fn visit_property(&mut self, obj: &Expr, _property: Property, _parent: Priority)
        -> Result<()> {
        self.out.write("len(");
        self.accept_expr(obj, Priority::Argument)?;
        self.out.write(")");
        Ok(())
    }

    fn visit_unary(&mut self, _expr: &Expr, op: UnaryOp, inner: &Expr, parent: Priority)
        -> Result<()> {
        self.lower_unary(op, inner, parent)
    }

    fn visit_binary(
        &mut self,
        _expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        parent: Priority,
    ) -> Result<()> {
        self.lower_binary(op, left, right, parent)
    }

    fn visit_cond(
        &mut self,
        _expr: &Expr,
        cond: &Expr,
        on_true: &Expr,
        on_false: &Expr,
        parent: Priority,
    ) -> Result<()> {
        let parens = parent > Priority::Select;
        if parens {
            self.out.write("(");
        }
        self.accept_expr(on_true, Priority::CondOr)?;
        self.out.write(" if ");
        self.accept_expr(cond, Priority::CondOr)?;
        self.out.write(" else ");
        self.accept_expr(on_false, Priority::Select)?;
        if parens {
            self.out.write(")");
        }
        Ok(())
    }

    fn visit_interpolated(
        &mut self,
        parts: &[InterpolatedPart],
        suffix: &str,
        _parent: Priority,
    ) -> Result<()> {
        self.lower_interpolated(parts, suffix)
    }

    fn visit_collection(&mut self, _expr: &Expr, items: &[Expr]) -> Result<()> {
        self.out.write("[ ");
        self.write_comma_separated(items)?;
        self.out.write(" ]");
        Ok(())
    }

    fn visit_new(&mut self, element: &Type, length: Option<&Expr>, _parent: Priority)
        -> Result<()> {
        self.lower_new(element, length)
    }

    fn visit_resource(&mut self, name: &str) -> Result<()> {
        self.out.write(&format!(
            "FuResource.{}",
            crate::naming::resource_identifier(name)
        ));
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        self.write_stmts(&block.stmts)
    }

    fn visit_expr_stmt(&mut self, expr: &Expr) -> Result<()> {
        self.lower_expr_stmt(expr)
    }

    fn visit_var(&mut self, var: VarId) -> Result<()> {
        self.lower_var(var)
    }

    fn visit_if(&mut self, cond: &Expr, on_true: &Stmt, on_false: Option<&Stmt>) -> Result<()> {
        self.lower_if(cond, on_true, on_false)
    }

    fn visit_while(&mut self, cond: &Expr, body: &Stmt) -> Result<()> {
        self.lower_while(cond, body)
    }

    fn visit_do_while(&mut self, body: &Stmt, cond: &Expr) -> Result<()> {
        self.lower_do_while(body, cond)
    }

    fn visit_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        advance: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()> {
        self.lower_for(init, cond, advance, body)
    }

    fn visit_foreach(&mut self, element: VarId, collection: &Expr, body: &Stmt) -> Result<()> {
        let name = self.local_name(element);
        self.out.write(&format!("for {name} in "));
        self.accept_expr(collection, Priority::Argument)?;
        self.write_loop_suite(LoopShape::Native, body)
    }

    fn visit_switch(&mut self, value: &Expr, cases: &[Case], default: Option<&[Stmt]>)
        -> Result<()> {
        self.lower_switch(value, cases, default)
    }

    fn visit_return(&mut self, value: Option<&Expr>) -> Result<()> {
        self.lower_return(value)
    }

    fn visit_throw(&mut self, message: &Expr) -> Result<()> {
        self.write_steps(message, false)?;
        self.out.write("raise Exception(");
        self.accept_expr(message, Priority::Argument)?;
        self.out.writeln(")");
        Ok(())
    }

    fn visit_break(&mut self) -> Result<()> {
        if matches!(self.jumps.last(), Some(JumpTarget::Switch)) {
            self.out.writeln("raise FuBreak()");
        } else {
            self.out.writeln("break");
        }
        Ok(())
    }

    fn visit_continue(&mut self) -> Result<()> {
        self.lower_continue()
    }
}
