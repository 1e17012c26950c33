//! Whole-program container and class-hierarchy queries.
//!
//! [`Program`] owns one arena per entity kind. Besides plain lookups it
//! answers the hierarchy questions every backend asks: the ancestor chain of
//! a class, how many `base` projections separate two classes, which method a
//! name resolves to from a given class, and which ancestor introduced a
//! virtual slot.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashSet;

use crate::ast::{
    CallKind, Class, Const, EnumDef, Expr, ExprKind, Field, Method, Symbol, Var,
};
use crate::{ClassId, ConstId, EnumId, FieldId, MethodId, Type, VarId};

/// Structural defect in the class hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HierarchyError {
    /// The class is its own ancestor.
    Cycle { class: ClassId },
    /// A base class id is out of range.
    UnknownBase { class: ClassId },
}

impl fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyError::Cycle { class } => {
                write!(f, "class {class:?} inherits from itself")
            }
            HierarchyError::UnknownBase { class } => {
                write!(f, "class {class:?} names an unknown base class")
            }
        }
    }
}

impl std::error::Error for HierarchyError {}

/// A complete, fully typed program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub enums: Vec<EnumDef>,
    pub classes: Vec<Class>,
    pub methods: Vec<Method>,
    pub fields: Vec<Field>,
    pub vars: Vec<Var>,
    pub consts: Vec<Const>,
    /// Embedded binary resources by name.
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    // Lookups

    #[inline]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    #[inline]
    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.index()]
    }

    #[inline]
    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.index()]
    }

    #[inline]
    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.index()]
    }

    #[inline]
    pub fn konst(&self, id: ConstId) -> &Const {
        &self.consts[id.index()]
    }

    #[inline]
    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        &self.enums[id.index()]
    }

    /// All class ids in declaration order.
    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(|i| ClassId::new(index_u32(i)))
    }

    /// All enum ids in declaration order.
    pub fn enum_ids(&self) -> impl Iterator<Item = EnumId> + '_ {
        (0..self.enums.len()).map(|i| EnumId::new(index_u32(i)))
    }

    // Hierarchy

    /// Verify every base id is valid and no class is its own ancestor.
    pub fn check_hierarchy(&self) -> Result<(), HierarchyError> {
        for class in self.class_ids() {
            let mut seen = FxHashSet::default();
            let mut current = Some(class);
            while let Some(id) = current {
                if !seen.insert(id) {
                    return Err(HierarchyError::Cycle { class });
                }
                current = self.class(id).base;
                if let Some(base) = current {
                    if base.index() >= self.classes.len() {
                        return Err(HierarchyError::UnknownBase { class: id });
                    }
                }
            }
        }
        Ok(())
    }

    /// The class itself followed by its ancestors, nearest first.
    ///
    /// Stops after visiting every class once, so a cyclic hierarchy yields a
    /// finite sequence; call [`check_hierarchy`](Self::check_hierarchy)
    /// first to reject such programs.
    pub fn ancestors(&self, class: ClassId) -> Ancestors<'_> {
        Ancestors {
            program: self,
            next: Some(class),
            remaining: self.classes.len(),
        }
    }

    /// Number of `base` projections from `from` up to its ancestor `to`.
    pub fn base_steps(&self, from: ClassId, to: ClassId) -> Option<usize> {
        self.ancestors(from).position(|class| class == to)
    }

    /// Whether `ancestor` is `class` or one of its bases.
    pub fn is_same_or_ancestor(&self, ancestor: ClassId, class: ClassId) -> bool {
        self.base_steps(class, ancestor).is_some()
    }

    /// Resolve a method name from `class`: its own methods first, then the
    /// nearest ancestor declaring it.
    pub fn lookup_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        self.ancestors(class).find_map(|id| {
            self.class(id)
                .methods
                .iter()
                .copied()
                .find(|&m| self.method(m).name == name)
        })
    }

    /// Whether `class` declares a method introducing a dispatch slot.
    pub fn adds_virtual_methods(&self, class: ClassId) -> bool {
        self.class(class)
            .methods
            .iter()
            .any(|&m| self.method(m).call_kind.is_abstract_or_virtual())
    }

    /// The method that introduced the dispatch slot `method` fills.
    ///
    /// For an override this is the topmost ancestor method of the same name
    /// that is abstract or virtual; every other method is its own declaring
    /// method.
    pub fn declaring_method(&self, method: MethodId) -> MethodId {
        let m = self.method(method);
        if !matches!(m.call_kind, CallKind::Override | CallKind::Sealed) {
            return method;
        }
        let mut declaring = method;
        if let Some(base) = self.class(m.class).base {
            for class in self.ancestors(base) {
                for &candidate in &self.class(class).methods {
                    let c = self.method(candidate);
                    if c.name == m.name && c.call_kind.is_abstract_or_virtual() {
                        declaring = candidate;
                    }
                }
            }
        }
        declaring
    }

    // Typed references

    /// Reference to a local variable or parameter.
    pub fn var_ref(&self, var: VarId) -> Expr {
        Expr::new(
            ExprKind::Symbol {
                left: None,
                symbol: Symbol::Var(var),
            },
            Some(self.var(var).ty.clone()),
        )
    }

    /// Reference to a field of `obj`, or of `this` when `obj` is `None`.
    pub fn field_ref(&self, obj: Option<Expr>, field: FieldId) -> Expr {
        Expr::new(
            ExprKind::Symbol {
                left: obj.map(Box::new),
                symbol: Symbol::Field(field),
            },
            Some(self.field(field).ty.clone()),
        )
    }

    /// Reference to a class constant.
    pub fn const_ref(&self, konst: ConstId) -> Expr {
        Expr::new(
            ExprKind::Symbol {
                left: None,
                symbol: Symbol::Const(konst),
            },
            Some(self.konst(konst).ty.clone()),
        )
    }

    /// Call of a user method, typed by its return type.
    pub fn call(&self, obj: Option<Expr>, method: MethodId, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Call {
                obj: obj.map(Box::new),
                callee: crate::Callee::Method(method),
                args,
            },
            self.method(method).return_type.clone(),
        )
    }

    // Construction

    /// Append a class.
    pub fn add_class(&mut self, class: Class) -> ClassId {
        let id = ClassId::new(index_u32(self.classes.len()));
        self.classes.push(class);
        id
    }

    /// Append a method and list it on its owning class.
    pub fn add_method(&mut self, method: Method) -> MethodId {
        let id = MethodId::new(index_u32(self.methods.len()));
        let class = method.class;
        self.methods.push(method);
        self.classes[class.index()].methods.push(id);
        id
    }

    /// Append a field and list it on its owning class.
    pub fn add_field(&mut self, class: ClassId, name: impl Into<String>, ty: Type, value: Option<Expr>) -> FieldId {
        let id = FieldId::new(index_u32(self.fields.len()));
        self.fields.push(Field {
            name: name.into(),
            class,
            ty,
            value,
        });
        self.classes[class.index()].fields.push(id);
        id
    }

    /// Append a local variable or parameter.
    pub fn add_var(&mut self, name: impl Into<String>, ty: Type, value: Option<Expr>) -> VarId {
        let id = VarId::new(index_u32(self.vars.len()));
        self.vars.push(Var {
            name: name.into(),
            ty,
            value,
        });
        id
    }

    /// Append a constant and list it on its owning class.
    pub fn add_const(&mut self, konst: Const) -> ConstId {
        let id = ConstId::new(index_u32(self.consts.len()));
        let class = konst.class;
        self.consts.push(konst);
        self.classes[class.index()].consts.push(id);
        id
    }

    /// Append an enum.
    pub fn add_enum(&mut self, def: EnumDef) -> EnumId {
        let id = EnumId::new(index_u32(self.enums.len()));
        self.enums.push(def);
        id
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "arena sizes never exceed u32"
)]
fn index_u32(index: usize) -> u32 {
    index as u32
}

/// Iterator over a class and its ancestors.
pub struct Ancestors<'p> {
    program: &'p Program,
    next: Option<ClassId>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = self.program.class(current).base;
        Some(current)
    }
}
