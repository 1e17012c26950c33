//! Per-class output: declarations, constructors, destructors and methods.

use fuse_ir::{
    CallKind, ClassId, ClassKind, ConstId, ExprKind, FieldId, Literal, MethodId, Stmt, Type,
    Visibility,
};
use tracing::debug;

use super::runtime::RuntimeFeatures;
use super::stmt::Checked;
use super::CCodegen;
use crate::error::Result;
use crate::naming::{c_local_name, resource_identifier};
use crate::traverse::{Lowering, Priority};

impl CCodegen<'_> {
    // Signatures

    /// `const Class *self, int a, const char *b`, or `void`.
    pub(super) fn parameter_list(&mut self, method: MethodId) -> Result<String> {
        let program = self.program;
        let m = program.method(method);
        let mut params = Vec::with_capacity(m.params.len() + 1);
        if m.call_kind != CallKind::Static {
            let constness = if m.mutator { "" } else { "const " };
            params.push(format!("{constness}{} *self", self.class_name(m.class)));
        }
        for &param in &m.params {
            let p = program.var(param);
            params.push(self.declaration(&p.ty, &c_local_name(&p.name), true)?);
        }
        if params.is_empty() {
            return Ok("void".to_string());
        }
        Ok(params.join(", "))
    }

    /// Declarator `name` with the method's C return type wrapped around it.
    pub(super) fn return_declaration(&mut self, method: MethodId, name: &str) -> Result<String> {
        let program = self.program;
        let m = program.method(method);
        match &m.return_type {
            None if m.throws => {
                self.out.include("stdbool.h");
                Ok(format!("bool {name}"))
            }
            None => Ok(format!("void {name}")),
            Some(ty) => self.declaration(ty, name, true),
        }
    }

    fn is_public_method(&self, method: MethodId) -> bool {
        let m = self.program.method(method);
        m.visibility == Visibility::Public && self.program.class(m.class).public
    }

    fn method_signature(&mut self, method: MethodId) -> Result<String> {
        let params = self.parameter_list(method)?;
        let name = format!("{}({params})", self.method_name(method));
        let declaration = self.return_declaration(method, &name)?;
        if self.is_public_method(method) {
            Ok(declaration)
        } else {
            Ok(format!("static {declaration}"))
        }
    }

    /// Constants and method prototypes of one visibility.
    pub(super) fn write_signatures(&mut self, class: ClassId, public: bool) -> Result<()> {
        let program = self.program;
        let c = program.class(class);
        for &konst in &c.consts {
            let k = program.konst(konst);
            if (k.visibility == Visibility::Public && c.public) == public {
                self.write_const(konst)?;
            }
        }
        for &method in &c.methods {
            if program.method(method).call_kind != CallKind::Abstract
                && self.is_public_method(method) == public
            {
                self.out.newline();
                let signature = self.method_signature(method)?;
                self.out.writeln(&format!("{signature};"));
            }
        }
        Ok(())
    }

    /// `#define` for scalars, `static const` for arrays.
    fn write_const(&mut self, konst: ConstId) -> Result<()> {
        let program = self.program;
        let k = program.konst(konst);
        let name = self.const_name(konst);
        self.out.newline();
        if matches!(k.ty, Type::ArrayStorage { .. }) {
            let decl = self.declaration(&k.ty, &name, false)?;
            self.out.write(&format!("static const {decl} = "));
            self.accept_expr(&k.value, Priority::Argument)?;
            self.out.writeln(";");
            return Ok(());
        }
        self.out.write(&format!("#define {name} "));
        let bare = match k.value.as_literal() {
            Some(Literal::Int(n)) => *n >= 0,
            Some(Literal::Float(bits)) => !f64::from_bits(*bits).is_sign_negative(),
            Some(_) => true,
            None => false,
        };
        if bare {
            self.accept_expr(&k.value, Priority::Argument)?;
        } else {
            self.out.write("(");
            self.accept_expr(&k.value, Priority::Argument)?;
            self.out.write(")");
        }
        self.out.newline();
        Ok(())
    }

    // Allocation

    /// `Class_New`/`Class_Delete` for public classes with a public
    /// constructor: prototypes in the header, definitions in the source.
    pub(super) fn write_new_delete(&mut self, class: ClassId, define: bool) -> Result<()> {
        let program = self.program;
        let c = program.class(class);
        let has_public_constructor = c
            .constructor
            .as_ref()
            .is_some_and(|ctor| ctor.visibility == Visibility::Public);
        if !c.public || !has_public_constructor || c.kind == ClassKind::Abstract {
            return Ok(());
        }
        let name = self.class_name(class);
        self.out.newline();
        if !define {
            self.out.writeln(&format!("{name} *{name}_New(void);"));
            self.out.newline();
            self.out.writeln(&format!("void {name}_Delete({name} *self);"));
            return Ok(());
        }

        self.out.writeln(&format!("{name} *{name}_New(void)"));
        self.out.open_block();
        self.out
            .writeln(&format!("{name} *self = ({name} *) malloc(sizeof({name}));"));
        if self.needs_constructor(class) {
            self.out.writeln("if (self != NULL)");
            self.out.indent();
            self.out.writeln(&format!("{name}_Construct(self);"));
            self.out.dedent();
        }
        self.out.writeln("return self;");
        self.out.close_block();

        self.out.newline();
        self.out.writeln(&format!("void {name}_Delete({name} *self)"));
        self.out.open_block();
        if self.needs_destructor(class) {
            self.out.writeln("if (self == NULL)");
            self.out.indent();
            self.out.writeln("return;");
            self.out.dedent();
            self.out.writeln(&format!("{name}_Destruct(self);"));
        }
        self.out.writeln("free(self);");
        self.out.close_block();
        Ok(())
    }

    // Constructor and destructor

    pub(super) fn write_constructor(&mut self, class: ClassId) -> Result<()> {
        if !self.needs_constructor(class) {
            return Ok(());
        }
        let program = self.program;
        let c = program.class(class);
        self.current_method = None;
        self.out.newline();
        let signature = self.xstructor_signature(class, "Construct");
        self.out.writeln(&signature);
        self.out.open_block();
        if let Some(base) = c.base {
            if self.needs_constructor(base) {
                let base_name = self.class_name(base);
                self.out.writeln(&format!("{base_name}_Construct(&self->base);"));
            }
        }
        if self.installs_vtable(class) {
            self.write_vtbl(class)?;
        }
        for &field in &c.fields {
            if self.has_init_code(field) {
                self.write_field_init(field)?;
            }
        }
        if let Some(constructor) = &c.constructor {
            self.write_stmts(&constructor.body.stmts)?;
            if fuse_ir::flow::list_completes_normally(&constructor.body.stmts) {
                self.write_destruct_all()?;
            }
        }
        self.pending.clear();
        self.out.close_block();
        Ok(())
    }

    /// Initialization of one field, looping over array storage.
    fn write_field_init(&mut self, field: FieldId) -> Result<()> {
        let program = self.program;
        let f = program.field(field);
        let mut target = format!("self->{}", c_local_name(&f.name));
        let mut ty = &f.ty;
        let mut depth = 0;
        match (&f.value, ty) {
            (Some(value), Type::ArrayStorage { element, .. }) => {
                if let ExprKind::Collection(items) = &value.kind {
                    for (i, item) in items.iter().enumerate() {
                        self.out.write(&format!("{target}[{i}] = "));
                        self.write_coerced(element, item, Priority::Argument)?;
                        self.out.writeln(";");
                    }
                    return Ok(());
                }
            }
            (Some(value), _) => {
                self.out.write(&format!("{target} = "));
                self.write_coerced(ty, value, Priority::Argument)?;
                self.out.writeln(";");
                if let Some(callee) = self.may_fail_call(value) {
                    self.write_forward_throw(Checked::Name(&target), callee)?;
                }
                return Ok(());
            }
            (None, _) => {}
        }
        while let Type::ArrayStorage { element, length } = ty {
            self.out.writeln(&format!(
                "for (int _i{depth} = 0; _i{depth} < {length}; _i{depth}++)"
            ));
            self.out.indent();
            target.push_str(&format!("[_i{depth}]"));
            ty = element;
            depth += 1;
        }
        match (&f.value, ty) {
            (Some(value), _) => {
                self.out.write(&format!("{target} = "));
                self.write_coerced(ty, value, Priority::Argument)?;
                self.out.writeln(";");
            }
            (None, Type::ClassValue(embedded)) => {
                let name = self.class_name(*embedded);
                self.out.writeln(&format!("{name}_Construct(&{target});"));
            }
            (None, Type::List(element)) => self.write_list_init(&target, element)?,
            (None, _) => self.out.writeln(&format!("{target} = NULL;")),
        }
        for _ in 0..depth {
            self.out.dedent();
        }
        Ok(())
    }

    /// `FuList_Init(&target, sizeof(T), destructor);`
    pub(super) fn write_list_init(&mut self, target: &str, element: &Type) -> Result<()> {
        if matches!(element, Type::ClassValue(_)) {
            return Err(self.unsupported("list of class values"));
        }
        self.require(RuntimeFeatures::LIST_INIT);
        let element_type = self.type_name(element)?;
        let destructor = self.element_destructor(element);
        self.out.writeln(&format!(
            "FuList_Init(&{target}, sizeof({element_type}), {destructor});"
        ));
        Ok(())
    }

    pub(super) fn write_destructor(&mut self, class: ClassId) -> Result<()> {
        if !self.needs_destructor(class) {
            return Ok(());
        }
        let program = self.program;
        let c = program.class(class);
        self.out.newline();
        let signature = self.xstructor_signature(class, "Destruct");
        self.out.writeln(&signature);
        self.out.open_block();
        for &field in c.fields.iter().rev() {
            let f = program.field(field);
            if self.needs_destruct(&f.ty) {
                self.write_destruct(&format!("self->{}", c_local_name(&f.name)), &f.ty)?;
            }
        }
        if let Some(base) = c.base {
            if self.needs_destructor(base) {
                let base_name = self.class_name(base);
                self.out.writeln(&format!("{base_name}_Destruct(&self->base);"));
            }
        }
        self.out.close_block();
        Ok(())
    }

    // Methods

    pub(super) fn write_method(&mut self, method: MethodId) -> Result<()> {
        let program = self.program;
        let m = program.method(method);
        let Some(body) = &m.body else {
            return Ok(());
        };
        if m.call_kind == CallKind::Abstract {
            return Ok(());
        }
        debug!(method = %self.method_name(method), "writing method");
        self.current_method = Some(method);
        self.out.newline();
        let signature = self.method_signature(method)?;
        self.out.writeln(&signature);
        self.out.open_block();
        for &param in &m.params {
            if self.var_needs_destruct(param) {
                self.pending.register(param);
            }
        }
        match body {
            Stmt::Block(block) => self.write_method_body(method, &block.stmts)?,
            stmt => self.write_method_body(method, std::slice::from_ref(stmt))?,
        }
        self.out.close_block();
        self.pending.clear();
        self.current_method = None;
        Ok(())
    }

    fn write_method_body(&mut self, method: MethodId, stmts: &[Stmt]) -> Result<()> {
        let program = self.program;
        let m = program.method(method);
        if !fuse_ir::flow::list_completes_normally(stmts) {
            return self.write_stmts(stmts);
        }
        if !(m.throws && m.return_type.is_none()) {
            self.write_stmts(stmts)?;
            return self.write_destruct_all();
        }
        // A may-fail void method falls off its end with success, unless its
        // last statement is a may-fail call whose result it can return.
        if let Some((Stmt::Expr(last), init)) = stmts.split_last() {
            if self.may_fail_call(last).is_some() {
                self.write_stmts(init)?;
                if self.pending.is_empty() {
                    return self.write_call_and_return(last, None);
                }
                self.accept_stmt(&stmts[stmts.len() - 1])?;
                self.write_destruct_all()?;
                self.out.writeln("return true;");
                return Ok(());
            }
        }
        self.write_stmts(stmts)?;
        self.write_destruct_all()?;
        self.out.writeln("return true;");
        Ok(())
    }

    // Resources

    /// `static const uint8_t FuResource_name[n] = { ... };`, sorted by name.
    pub(super) fn write_resources(&mut self) {
        let program = self.program;
        if program.resources.is_empty() {
            return;
        }
        self.out.include("stdint.h");
        for (name, bytes) in &program.resources {
            self.out.newline();
            self.out.writeln(&format!(
                "static const uint8_t FuResource_{}[{}] = {{",
                resource_identifier(name),
                bytes.len()
            ));
            self.out.indent();
            for (i, chunk) in bytes.chunks(16).enumerate() {
                if i > 0 {
                    self.out.writeln(",");
                }
                let line: Vec<String> = chunk.iter().map(|b| format!("0x{b:02x}")).collect();
                self.out.write(&line.join(", "));
            }
            self.out.newline();
            self.out.dedent();
            self.out.writeln("};");
        }
    }
}
