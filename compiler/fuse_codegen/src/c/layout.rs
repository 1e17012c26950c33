//! Struct layout, inheritance and vtables.
//!
//! A derived struct embeds its base as the first member `base`, so a
//! pointer to any ancestor is `&x->base.base...`. The topmost class that
//! adds virtual methods holds the only `vtbl` pointer; each class that adds
//! virtual methods defines a `ClassVtbl` struct extending its base's table.

use fuse_ir::{ClassId, ClassKind, FieldId, MethodId, Type};

use super::CCodegen;
use crate::error::{CodegenError, Result};
use crate::naming::{c_local_name, camel_case};
use crate::traverse::Lowering;

impl CCodegen<'_> {
    // Predicates

    /// Whether `Class_Construct` is synthesized.
    pub(super) fn needs_constructor(&self, class: ClassId) -> bool {
        let c = self.program.class(class);
        if c.kind == ClassKind::Static {
            return false;
        }
        c.constructor.is_some()
            || c.fields.iter().any(|&f| self.has_init_code(f))
            || self.installs_vtable(class)
            || c.base.is_some_and(|base| self.needs_constructor(base))
    }

    /// Whether `Class_Destruct` is synthesized.
    pub(super) fn needs_destructor(&self, class: ClassId) -> bool {
        let c = self.program.class(class);
        c.fields
            .iter()
            .any(|&f| self.needs_destruct(&self.program.field(f).ty))
            || c.base.is_some_and(|base| self.needs_destructor(base))
    }

    /// Whether the constructor must initialize this field.
    pub(super) fn has_init_code(&self, field: FieldId) -> bool {
        let f = self.program.field(field);
        if f.value.is_some() {
            return true;
        }
        match f.ty.storage_type() {
            Type::StringStorage | Type::List(_) => true,
            Type::ClassValue(class) => self.needs_constructor(*class),
            ty => ty.is_dynamic_ptr(),
        }
    }

    /// Nearest class at or above `class` that adds virtual methods; its
    /// `Vtbl` struct describes the table `class` uses.
    pub(super) fn vtbl_struct_class(&self, class: ClassId) -> Option<ClassId> {
        self.program
            .ancestors(class)
            .find(|&c| self.program.adds_virtual_methods(c))
    }

    /// Topmost class that adds virtual methods; it holds the `vtbl` field.
    pub(super) fn vtbl_ptr_class(&self, class: ClassId) -> Option<ClassId> {
        self.program
            .ancestors(class)
            .filter(|&c| self.program.adds_virtual_methods(c))
            .last()
    }

    /// Whether the constructor stores a table of its own.
    ///
    /// Concrete classes that fill a slot do, and so do concrete classes
    /// derived directly from an abstract one, whose constructor installs
    /// no table.
    pub(super) fn installs_vtable(&self, class: ClassId) -> bool {
        let c = self.program.class(class);
        if matches!(c.kind, ClassKind::Abstract | ClassKind::Static)
            || self.vtbl_ptr_class(class).is_none()
        {
            return false;
        }
        let fills = c
            .methods
            .iter()
            .any(|&m| self.program.method(m).call_kind.fills_slot());
        let abstract_base = c
            .base
            .is_some_and(|base| self.program.class(base).kind == ClassKind::Abstract);
        fills || abstract_base
    }

    /// `base.` once per level from `from` up to `to`.
    pub(super) fn base_path(&self, from: ClassId, to: ClassId) -> String {
        "base.".repeat(self.program.base_steps(from, to).unwrap_or(0))
    }

    // Typedefs and structs

    /// Enum definitions and `typedef struct` forward declarations.
    pub(super) fn write_typedefs(&mut self, public: bool) -> Result<()> {
        let program = self.program;
        for id in program.enum_ids() {
            let def = program.enum_def(id);
            if def.public != public {
                continue;
            }
            self.out.newline();
            self.out.writeln("typedef enum {");
            self.out.indent();
            for (i, value) in (0u32..).zip(&def.values) {
                if i > 0 {
                    self.out.writeln(",");
                }
                let name = self.enum_value_name(id, i);
                self.out.write(&name);
                if let Some(value) = &value.value {
                    self.out.write(" = ");
                    self.accept_expr(value, crate::traverse::Priority::Argument)?;
                }
            }
            self.out.newline();
            self.out.dedent();
            self.out.writeln(&format!("}} {};", self.enum_name(id)));
        }

        let classes: Vec<ClassId> = program
            .class_ids()
            .filter(|&c| {
                let class = program.class(c);
                class.public == public && class.kind != ClassKind::Static
            })
            .collect();
        if !classes.is_empty() {
            self.out.newline();
        }
        for class in classes {
            let name = self.class_name(class);
            self.out.writeln(&format!("typedef struct {name} {name};"));
        }
        Ok(())
    }

    /// Write the struct of `class` after the structs it embeds.
    pub(super) fn write_struct(&mut self, class: ClassId) -> Result<()> {
        let program = self.program;
        match self.written_classes.get(&class) {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(CodegenError::CircularDependency {
                    class: program.class(class).name.clone(),
                })
            }
            None => {}
        }
        self.written_classes.insert(class, false);
        let c = program.class(class);
        if let Some(base) = c.base {
            self.write_struct(base)?;
        }
        for &field in &c.fields {
            if let Type::ClassValue(embedded) = program.field(field).ty.storage_type() {
                self.write_struct(*embedded)?;
            }
        }
        self.written_classes.insert(class, true);

        if c.kind != ClassKind::Static {
            if program.adds_virtual_methods(class) {
                self.write_vtbl_struct(class)?;
            }
            self.out.newline();
            self.out.write(&format!("struct {} ", self.class_name(class)));
            self.out.open_block();
            if let Some(base) = c.base {
                self.out.writeln(&format!("{} base;", self.class_name(base)));
            }
            if self.vtbl_ptr_class(class) == Some(class) {
                self.out
                    .writeln(&format!("const {}Vtbl *vtbl;", self.class_name(class)));
            }
            for &field in &c.fields {
                let f = program.field(field);
                let decl = self.declaration(&f.ty, &c_local_name(&f.name), false)?;
                self.out.writeln(&format!("{decl};"));
            }
            self.out.dedent();
            self.out.writeln("};");

            if self.needs_constructor(class) {
                self.out.newline();
                let signature = self.xstructor_signature(class, "Construct");
                self.out.writeln(&format!("{signature};"));
            }
            if self.needs_destructor(class) {
                self.out.newline();
                let signature = self.xstructor_signature(class, "Destruct");
                self.out.writeln(&format!("{signature};"));
            }
        }
        self.write_signatures(class, false)
    }

    /// `static void Class_Construct(Class *self)`.
    pub(super) fn xstructor_signature(&self, class: ClassId, kind: &str) -> String {
        let name = self.class_name(class);
        format!("static void {name}_{kind}({name} *self)")
    }

    /// Virtual and abstract methods in slot order, root first.
    fn slots(&self, class: ClassId) -> Vec<MethodId> {
        let mut chain: Vec<ClassId> = self.program.ancestors(class).collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|c| self.program.class(c).methods.iter().copied())
            .filter(|&m| self.program.method(m).call_kind.is_abstract_or_virtual())
            .collect()
    }

    /// `ret (*name)(const Decl *self, params)` for a slot.
    fn slot_declaration(&mut self, method: MethodId, name: &str) -> Result<String> {
        let params = self.parameter_list(method)?;
        self.return_declaration(method, &format!("(*{name})({params})"))
    }

    fn write_vtbl_struct(&mut self, class: ClassId) -> Result<()> {
        self.out.newline();
        self.out.write("typedef struct ");
        self.out.open_block();
        for method in self.slots(class) {
            let slot = camel_case(&self.program.method(method).name);
            let decl = self.slot_declaration(method, &slot)?;
            self.out.writeln(&format!("{decl};"));
        }
        self.out.dedent();
        self.out.writeln(&format!("}} {}Vtbl;", self.class_name(class)));
        Ok(())
    }

    /// Constructor prologue storing the class's own table.
    pub(super) fn write_vtbl(&mut self, class: ClassId) -> Result<()> {
        let program = self.program;
        let (Some(struct_class), Some(ptr_class)) =
            (self.vtbl_struct_class(class), self.vtbl_ptr_class(class))
        else {
            return Ok(());
        };
        let struct_name = self.class_name(struct_class);
        self.out
            .write(&format!("static const {struct_name}Vtbl vtbl = "));
        self.out.open_block();
        for declared in self.slots(struct_class) {
            let name = &program.method(declared).name;
            let defined = program
                .lookup_method(class, name)
                .filter(|&m| program.method(m).call_kind != fuse_ir::CallKind::Abstract)
                .ok_or_else(|| {
                    CodegenError::internal(
                        format!("no implementation for abstract method {name}"),
                        program.class(class).name.clone(),
                    )
                })?;
            if defined != declared {
                let cast = self.slot_declaration(declared, "")?;
                self.out.write(&format!("({cast}) "));
            }
            self.out.writeln(&format!("{},", self.method_name(defined)));
        }
        self.out.dedent();
        self.out.writeln("};");

        let path = self.base_path(class, ptr_class);
        self.out.write(&format!("self->{path}vtbl = "));
        if struct_class != ptr_class {
            self.out
                .write(&format!("(const {}Vtbl *) ", self.class_name(ptr_class)));
        }
        self.out.writeln("&vtbl;");
        Ok(())
    }
}
