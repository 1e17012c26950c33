//! Top-level and member declarations.

use crate::{ClassId, ConstId, FieldId, MethodId, Type, VarId};

use super::expr::Expr;
use super::stmt::{Block, Stmt};

/// Member and constructor visibility.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Visibility {
    Private,
    Internal,
    Protected,
    Public,
}

/// How a class may be instantiated and extended.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClassKind {
    /// Only static members; never instantiated.
    Static,
    Normal,
    /// Cannot be instantiated directly.
    Abstract,
    /// Cannot be extended.
    Sealed,
}

/// How a method is bound.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallKind {
    Static,
    Normal,
    /// Introduces a slot without a body.
    Abstract,
    /// Introduces a slot with a default body.
    Virtual,
    /// Replaces an inherited slot.
    Override,
    /// Replaces an inherited slot and forbids further overrides.
    Sealed,
}

impl CallKind {
    /// Whether a method of this kind introduces a dispatch slot.
    pub const fn is_abstract_or_virtual(self) -> bool {
        matches!(self, Self::Abstract | Self::Virtual)
    }

    /// Whether a method of this kind provides a slot implementation.
    pub const fn fills_slot(self) -> bool {
        matches!(self, Self::Virtual | Self::Override | Self::Sealed)
    }
}

/// Constructor body of a class.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constructor {
    pub visibility: Visibility,
    pub body: Block,
}

/// A class declaration. Members are listed in declaration order.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Class {
    pub name: String,
    pub base: Option<ClassId>,
    pub public: bool,
    pub kind: ClassKind,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub consts: Vec<ConstId>,
    pub constructor: Option<Constructor>,
}

impl Class {
    /// A public, normal class with no members.
    pub fn new(name: impl Into<String>) -> Self {
        Class {
            name: name.into(),
            base: None,
            public: true,
            kind: ClassKind::Normal,
            fields: Vec::new(),
            methods: Vec::new(),
            consts: Vec::new(),
            constructor: None,
        }
    }

    #[must_use]
    pub fn with_base(mut self, base: ClassId) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

/// A method declaration.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Method {
    pub name: String,
    pub class: ClassId,
    pub visibility: Visibility,
    pub call_kind: CallKind,
    /// Whether the method may modify `this`.
    pub mutator: bool,
    pub return_type: Option<Type>,
    /// Whether the method may fail.
    pub throws: bool,
    pub params: Vec<VarId>,
    /// Absent for abstract methods.
    pub body: Option<Stmt>,
}

impl Method {
    /// A public, normal, non-failing method without parameters or body.
    pub fn new(name: impl Into<String>, class: ClassId) -> Self {
        Method {
            name: name.into(),
            class,
            visibility: Visibility::Public,
            call_kind: CallKind::Normal,
            mutator: false,
            return_type: None,
            throws: false,
            params: Vec::new(),
            body: None,
        }
    }
}

/// An instance field.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    pub name: String,
    pub class: ClassId,
    pub ty: Type,
    pub value: Option<Expr>,
}

/// A local variable or parameter.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Var {
    pub name: String,
    pub ty: Type,
    /// Initializer of a local, default value of a parameter.
    pub value: Option<Expr>,
}

/// A named class constant.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Const {
    pub name: String,
    pub class: ClassId,
    pub visibility: Visibility,
    pub ty: Type,
    pub value: Expr,
}

/// One member of an enum.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumValue {
    pub name: String,
    pub value: Option<Expr>,
}

/// An enum declaration.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumDef {
    pub name: String,
    pub public: bool,
    pub values: Vec<EnumValue>,
}
