//! Enums, classes and the resource holder.

use fuse_ir::{CallKind, ClassId, ClassKind, EnumId, MethodId};
use tracing::debug;

use super::PyCodegen;
use crate::error::Result;
use crate::naming::{lower_with_underscores, resource_identifier, upper_with_underscores};
use crate::traverse::{Lowering, Priority};

/// Bytes per line of a resource literal.
const RESOURCE_LINE: usize = 16;

impl PyCodegen<'_> {
    /// `class Name(enum.Enum):`, numbering implicit values from 1.
    pub(super) fn write_enum(&mut self, id: EnumId) -> Result<()> {
        let program = self.program;
        self.out.include("enum");
        self.out.newline();
        let name = self.enum_name(id);
        self.out.write(&format!("class {name}(enum.Enum)"));
        self.open_suite();
        for (number, value) in (1..).zip(&program.enum_def(id).values) {
            self.out
                .write(&format!("{} = ", upper_with_underscores(&value.name)));
            match &value.value {
                Some(expr) => self.accept_expr(expr, Priority::Argument)?,
                None => self.out.write(&number.to_string()),
            }
            self.out.newline();
        }
        self.close_suite();
        Ok(())
    }

    /// Whether `__init__` is synthesized for `class`.
    pub(super) fn needs_init(&self, class: ClassId) -> bool {
        let c = self.program.class(class);
        c.kind != ClassKind::Static
            && (c.constructor.is_some()
                || c.fields.iter().any(|&field| {
                    let f = self.program.field(field);
                    f.value.is_some() || Self::needs_storage_init(&f.ty)
                }))
    }

    /// Whether `class` or an ancestor defines `__init__`.
    fn inherits_init(&self, class: ClassId) -> bool {
        self.program.ancestors(class).any(|c| self.needs_init(c))
    }

    /// Write `class` after its base.
    pub(super) fn write_class(&mut self, class: ClassId) -> Result<()> {
        if !self.written_classes.insert(class) {
            return Ok(());
        }
        let program = self.program;
        let c = program.class(class);
        if let Some(base) = c.base {
            self.write_class(base)?;
        }
        self.current_class = Some(class);
        debug!(class = %c.name, "writing class");

        self.out.newline();
        let name = self.class_name(class);
        self.out.write(&format!("class {name}"));
        if let Some(base) = c.base {
            let base = self.class_name(base);
            self.out.write(&format!("({base})"));
        }
        self.open_suite();

        for &konst in &c.consts {
            let k = program.konst(konst);
            self.out.write(&format!("{} = ", self.const_name(konst)));
            self.accept_expr(&k.value, Priority::Argument)?;
            self.out.newline();
        }

        if self.needs_init(class) {
            self.write_init(class)?;
        }
        for &method in &c.methods {
            self.write_method(method)?;
        }
        self.close_suite();
        Ok(())
    }

    /// `__init__`: base initializer, field initializers, constructor body.
    fn write_init(&mut self, class: ClassId) -> Result<()> {
        let program = self.program;
        let c = program.class(class);
        self.out.newline();
        self.out.write("def __init__(self)");
        self.open_suite();
        if c.base.is_some_and(|base| self.inherits_init(base)) {
            self.out.writeln("super().__init__()");
        }
        for &field in &c.fields {
            let f = program.field(field);
            let name = lower_with_underscores(&f.name);
            match &f.value {
                Some(value) => {
                    self.out.write(&format!("self.{name} = "));
                    self.accept_expr(value, Priority::Argument)?;
                    self.out.newline();
                }
                None if Self::needs_storage_init(&f.ty) => {
                    self.out.write(&format!("self.{name} = "));
                    self.write_storage_init(&f.ty)?;
                    self.out.newline();
                }
                None => {}
            }
        }
        if let Some(constructor) = &c.constructor {
            self.write_stmts(&constructor.body.stmts)?;
        }
        self.close_suite();
        Ok(())
    }

    /// `def name(self, params):`; abstract methods are left to subclasses.
    fn write_method(&mut self, method: MethodId) -> Result<()> {
        let program = self.program;
        let m = program.method(method);
        if m.call_kind == CallKind::Abstract {
            return Ok(());
        }
        self.current_method = Some(method);
        self.out.newline();
        if m.call_kind == CallKind::Static {
            self.out.writeln("@staticmethod");
        }
        let name = self.method_name(method);
        self.out.write(&format!("def {name}("));
        let mut first = m.call_kind == CallKind::Static;
        if !first {
            self.out.write("self");
        }
        for &param in &m.params {
            if !first {
                self.out.write(", ");
            }
            first = false;
            let name = self.local_name(param);
            self.out.write(&name);
            if let Some(default) = &program.var(param).value {
                self.out.write("=");
                self.accept_expr(default, Priority::Argument)?;
            }
        }
        self.out.write(")");
        self.open_suite();
        if let Some(body) = &m.body {
            self.accept_stmt(body)?;
        }
        self.close_suite();
        self.current_method = None;
        Ok(())
    }

    /// `class FuResource:` holding each resource as a byte string.
    pub(super) fn write_resources(&mut self) {
        let program = self.program;
        if program.resources.is_empty() {
            return;
        }
        self.out.newline();
        self.out.write("class FuResource");
        self.open_suite();
        for (name, bytes) in &program.resources {
            self.out.write(&format!("{} = (", resource_identifier(name)));
            if bytes.is_empty() {
                self.out.write(" b\"\"");
            }
            for line in bytes.chunks(RESOURCE_LINE) {
                self.out.newline();
                let escaped: String = line.iter().map(|b| format!("\\x{b:02x}")).collect();
                self.out.write(&format!("b\"{escaped}\""));
            }
            self.out.writeln(" )");
        }
        self.close_suite();
    }
}
