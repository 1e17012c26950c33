//! C Code Generation
//!
//! Lowers the IR to a header/source pair for a target without garbage
//! collection or exceptions:
//!
//! - classes become structs embedding their base as `base`
//! - virtual dispatch goes through per-class function-pointer tables
//! - owned strings, shared pointers and lists are torn down on every exit
//!   path (see [`destruct`])
//! - failure is signalled through sentinel return values
//! - the support library is emitted on demand (see [`runtime`])

mod class;
pub mod destruct;
mod expr;
mod layout;
pub mod runtime;
mod stmt;
mod types;

use fuse_ir::{
    Block, Builtin, BinaryOp, Case, ClassId, ConstId, EnumId, Expr, InterpolatedPart, Literal,
    MethodId, Program, Property, Stmt, Symbol, Type, UnaryOp, VarId,
};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::naming::{c_local_name, upper_with_underscores};
use crate::traverse::{Lowering, Priority};
use crate::writer::CodeWriter;
use crate::{Artifact, CodegenOptions};

use destruct::PendingDestruction;
use runtime::RuntimeFeatures;

const BANNER: &str = "// Generated automatically with \"fusec\". Do not edit.";

/// C backend state for one program.
pub struct CCodegen<'a> {
    program: &'a Program,
    options: &'a CodegenOptions,
    out: CodeWriter,
    /// Support routines referenced by the source file.
    features: RuntimeFeatures,
    /// Owning locals in scope, innermost last.
    pending: PendingDestruction,
    current_class: Option<ClassId>,
    current_method: Option<MethodId>,
    /// Struct emission state: `false` while in progress, `true` once written.
    written_classes: FxHashMap<ClassId, bool>,
    /// `foreach` element variables, written as an index into their array.
    foreach_elements: FxHashMap<VarId, Expr>,
}

impl<'a> CCodegen<'a> {
    pub fn new(program: &'a Program, options: &'a CodegenOptions) -> Self {
        CCodegen {
            program,
            options,
            out: CodeWriter::new(),
            features: RuntimeFeatures::empty(),
            pending: PendingDestruction::new(),
            current_class: None,
            current_method: None,
            written_classes: FxHashMap::default(),
            foreach_elements: FxHashMap::default(),
        }
    }

    /// Generate the header and the source file, in that order.
    pub fn generate(mut self) -> Result<Vec<Artifact>> {
        let header_name = self.options.file_name("h");
        let source_name = self.options.file_name("c");
        debug!(header = %header_name, source = %source_name, "generating C");

        // Header: public typedefs and declarations.
        self.write_typedefs(true)?;
        for class in self.program.class_ids() {
            self.current_class = Some(class);
            self.write_new_delete(class, false)?;
            self.write_signatures(class, true)?;
        }
        let header_body = self.out.take_output();
        let header_includes = self.out.take_includes();

        let mut header = CodeWriter::new();
        header.writeln(BANNER);
        header.writeln("#pragma once");
        for include in &header_includes {
            header.writeln(&format!("#include <{include}>"));
        }
        header.writeln("#ifdef __cplusplus");
        header.writeln("extern \"C\" {");
        header.writeln("#endif");
        header.write(&header_body);
        header.newline();
        header.writeln("#ifdef __cplusplus");
        header.writeln("}");
        header.writeln("#endif");

        // Source: private typedefs, structs, resources, code.
        self.features = RuntimeFeatures::empty();
        self.written_classes.clear();
        self.write_typedefs(false)?;
        let private_typedefs = self.out.take_output();
        for class in self.program.class_ids() {
            self.current_class = Some(class);
            self.write_struct(class)?;
        }
        self.write_resources();
        for class in self.program.class_ids() {
            self.current_class = Some(class);
            debug!(class = %self.program.class(class).name, "writing class");
            self.write_constructor(class)?;
            self.write_destructor(class)?;
            self.write_new_delete(class, true)?;
            for &method in &self.program.class(class).methods {
                self.write_method(method)?;
            }
        }
        self.current_class = None;
        let body = self.out.take_output();

        let features = self.features.with_dependencies();
        let mut includes = self.out.take_includes();
        includes.insert("stdlib.h".to_string());
        includes.extend(features.required_includes().into_iter().map(str::to_string));
        let mut library = CodeWriter::new();
        runtime::write_library(&mut library, features);

        let mut source = CodeWriter::new();
        source.writeln(BANNER);
        for include in includes.difference(&header_includes) {
            source.writeln(&format!("#include <{include}>"));
        }
        source.writeln(&format!("#include \"{header_name}\""));
        source.write(&library.take_output());
        source.write(&private_typedefs);
        source.write(&body);

        debug!(routines = features.bits().count_ones(), "C generation finished");
        Ok(vec![
            Artifact {
                file_name: header_name,
                contents: header.take_output(),
            },
            Artifact {
                file_name: source_name,
                contents: source.take_output(),
            },
        ])
    }

    /// Mark a support routine as used.
    fn require(&mut self, feature: RuntimeFeatures) {
        if !self.features.contains(feature) {
            trace!(routine = feature.routine_name(), "support routine requested");
            self.features.insert(feature);
        }
    }

    // Names

    fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.options.namespace, name)
    }

    fn class_name(&self, class: ClassId) -> String {
        self.prefixed(&self.program.class(class).name)
    }

    fn enum_name(&self, id: EnumId) -> String {
        self.prefixed(&self.program.enum_def(id).name)
    }

    /// `Class_Method`.
    fn method_name(&self, method: MethodId) -> String {
        let m = self.program.method(method);
        format!("{}_{}", self.class_name(m.class), m.name)
    }

    /// `Class_CONST_NAME`.
    fn const_name(&self, konst: ConstId) -> String {
        let k = self.program.konst(konst);
        format!("{}_{}", self.class_name(k.class), upper_with_underscores(&k.name))
    }

    /// `Enum_VALUE_NAME`.
    fn enum_value_name(&self, id: EnumId, index: u32) -> String {
        let def = self.program.enum_def(id);
        let value = def
            .values
            .get(index as usize)
            .map_or_else(|| index.to_string(), |v| upper_with_underscores(&v.name));
        format!("{}_{}", self.enum_name(id), value)
    }

    fn local_name(&self, var: VarId) -> String {
        c_local_name(&self.program.var(var).name)
    }
}

impl<'a> Lowering<'a> for CCodegen<'a> {
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

    fn visit_literal(&mut self, expr: &Expr, literal: &Literal) -> Result<()> {
        self.lower_literal(expr, literal)
    }

    fn visit_symbol(
        &mut self,
        expr: &Expr,
        left: Option<&Expr>,
        symbol: Symbol,
        parent: Priority,
    ) -> Result<()> {
        self.lower_symbol(expr, left, symbol, parent)
    }

    fn visit_call(
        &mut self,
        expr: &Expr,
        obj: Option<&Expr>,
        args: &[Expr],
        parent: Priority,
    ) -> Result<()> {
        self.lower_call(expr, obj, args, parent)
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

    fn visit_property(&mut self, obj: &Expr, property: Property, parent: Priority) -> Result<()> {
        self.lower_property(obj, property, parent)
    }

    fn visit_unary(&mut self, _expr: &Expr, op: UnaryOp, inner: &Expr, _parent: Priority)
        -> Result<()> {
        self.write_unary(op, inner)
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
        expr: &Expr,
        cond: &Expr,
        on_true: &Expr,
        on_false: &Expr,
        parent: Priority,
    ) -> Result<()> {
        self.lower_cond(expr, cond, on_true, on_false, parent)
    }

    fn visit_interpolated(
        &mut self,
        parts: &[InterpolatedPart],
        suffix: &str,
        _parent: Priority,
    ) -> Result<()> {
        self.require(RuntimeFeatures::STRING_FORMAT);
        self.out.write("FuString_Format(");
        self.write_printf_args(parts, suffix, false)?;
        self.out.write(")");
        Ok(())
    }

    fn visit_collection(&mut self, _expr: &Expr, items: &[Expr]) -> Result<()> {
        self.out.write("{ ");
        self.write_comma_separated(items)?;
        self.out.write(" }");
        Ok(())
    }

    fn visit_new(&mut self, element: &Type, length: Option<&Expr>, _parent: Priority)
        -> Result<()> {
        self.lower_new(element, length)
    }

    fn visit_resource(&mut self, name: &str) -> Result<()> {
        self.out.write(&format!(
            "FuResource_{}",
            crate::naming::resource_identifier(name)
        ));
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        self.lower_block(block)
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
        self.lower_foreach(element, collection, body)
    }

    fn visit_switch(&mut self, value: &Expr, cases: &[Case], default: Option<&[Stmt]>)
        -> Result<()> {
        self.lower_switch(value, cases, default)
    }

    fn visit_return(&mut self, value: Option<&Expr>) -> Result<()> {
        self.lower_return(value)
    }

    fn visit_throw(&mut self, _message: &Expr) -> Result<()> {
        self.write_destruct_all()?;
        let sentinel = self.failure_sentinel()?;
        self.out.writeln(&format!("return {sentinel};"));
        Ok(())
    }

    fn visit_break(&mut self) -> Result<()> {
        for var in self.pending.for_break() {
            self.write_var_destruct(var)?;
        }
        self.out.writeln("break;");
        Ok(())
    }

    fn visit_continue(&mut self) -> Result<()> {
        for var in self.pending.for_continue() {
            self.write_var_destruct(var)?;
        }
        self.out.writeln("continue;");
        Ok(())
    }

    fn write_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.lower_stmts(stmts)
    }
}

#[cfg(test)]
mod tests;
