//! Expression Types
//!
//! Every expression carries its resolved type (`None` only for calls to
//! methods without a return value). Floats are stored as `u64` bits so that
//! the whole tree keeps `Eq` and `Hash`.

use crate::{ConstId, EnumId, FieldId, MethodId, Type, VarId};

use super::operators::{BinaryOp, UnaryOp};

/// Expression node.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<Type>,
}

/// Literal values.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    /// `f64` bits.
    Float(u64),
    String(String),
}

impl Literal {
    /// Build a float literal from its value.
    pub fn float(value: f64) -> Self {
        Literal::Float(value.to_bits())
    }

    /// Numeric zero, `false` or `null`.
    pub fn is_default_value(&self) -> bool {
        match self {
            Literal::Null | Literal::Bool(false) | Literal::Int(0) => true,
            Literal::Float(bits) => f64::from_bits(*bits) == 0.0,
            _ => false,
        }
    }
}

/// What a symbol reference resolves to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Symbol {
    /// Local variable or parameter.
    Var(VarId),
    /// Instance field; the receiver is implicit `this` when `left` is `None`.
    Field(FieldId),
    Const(ConstId),
    /// Enum member by position.
    EnumValue { enum_id: EnumId, index: u32 },
    /// The receiver of an instance method.
    This,
    /// The receiver viewed as its base class (non-virtual base calls).
    Base,
}

/// Library methods with target-specific lowerings.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Builtin {
    StringContains,
    StringIndexOf,
    StringLastIndexOf,
    StringStartsWith,
    StringEndsWith,
    /// `s.EqualsIgnoreCase(other)`, ignoring ASCII letter case.
    StringEqualsIgnoreCase,
    /// `s.Substring(offset)` or `s.Substring(offset, length)`.
    StringSubstring,
    ConsoleWrite { stderr: bool },
    ConsoleWriteLine { stderr: bool },
    Math(MathFn),
    /// `src.CopyTo(srcOffset, dest, destOffset, length)`
    ArrayCopyTo,
    /// `array.Fill(value)`; only default values are supported.
    ArrayFill,
    ListAdd,
    ListClear,
}

/// Math library functions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MathFn {
    Ceiling,
    Floor,
    Truncate,
    Sqrt,
    Exp,
    Log,
    Pow,
    Sin,
    Cos,
    Tan,
}

impl MathFn {
    /// Name shared by the C library and Python's `math` module.
    pub const fn library_name(self) -> &'static str {
        match self {
            Self::Ceiling => "ceil",
            Self::Floor => "floor",
            Self::Truncate => "trunc",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Pow => "pow",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
        }
    }
}

/// Call target.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Callee {
    Method(MethodId),
    Builtin(Builtin),
}

/// Read-only properties of library types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    StringLength,
    CollectionCount,
}

/// One `{arg,width:format precision}` hole of an interpolated string,
/// preceded by its literal prefix.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpolatedPart {
    pub prefix: String,
    pub arg: Expr,
    /// Field width; negative means left-aligned.
    pub width: Option<i32>,
    /// Format letter (`D`, `X`, `x`, `F`, `E`, ...).
    pub format: Option<char>,
    pub precision: Option<u32>,
}

/// Expression kinds.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    Literal(Literal),
    Symbol {
        left: Option<Box<Expr>>,
        symbol: Symbol,
    },
    Call {
        obj: Option<Box<Expr>>,
        callee: Callee,
        args: Vec<Expr>,
    },
    Property {
        obj: Box<Expr>,
        property: Property,
    },
    Unary {
        op: UnaryOp,
        inner: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Box<Expr>,
    },
    Interpolated {
        parts: Vec<InterpolatedPart>,
        suffix: String,
    },
    /// Array literal `{ a, b, c }`.
    Collection(Vec<Expr>),
    /// Dynamic allocation of one object (`length` absent) or an array.
    New {
        element: Type,
        length: Option<Box<Expr>>,
    },
    /// Embedded binary resource by name.
    Resource(String),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Option<Type>) -> Self {
        Expr { kind, ty }
    }

    pub fn null() -> Self {
        Expr::new(ExprKind::Literal(Literal::Null), Some(Type::Null))
    }

    pub fn bool(value: bool) -> Self {
        Expr::new(ExprKind::Literal(Literal::Bool(value)), Some(Type::Bool))
    }

    pub fn int(value: i64) -> Self {
        Expr::new(ExprKind::Literal(Literal::Int(value)), Some(Type::INT))
    }

    pub fn float(value: f64) -> Self {
        Expr::new(ExprKind::Literal(Literal::float(value)), Some(Type::DOUBLE))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::new(
            ExprKind::Literal(Literal::String(value.into())),
            Some(Type::StringPtr),
        )
    }

    /// Binary expression of the given result type.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr, ty: Type) -> Self {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Some(ty),
        )
    }

    /// Assignment; typed as its left side.
    pub fn assign(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let ty = left.ty.clone();
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    /// Comparison or logical operator, typed `bool`.
    pub fn compare(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::binary(op, left, right, Type::Bool)
    }

    /// Unary expression typed as its operand (or `bool` for `!`).
    pub fn unary(op: UnaryOp, inner: Expr) -> Self {
        let ty = if op == UnaryOp::Not {
            Some(Type::Bool)
        } else {
            inner.ty.clone()
        };
        Expr::new(
            ExprKind::Unary {
                op,
                inner: Box::new(inner),
            },
            ty,
        )
    }

    /// `cond ? on_true : on_false`, typed as `on_true`.
    pub fn cond(cond: Expr, on_true: Expr, on_false: Expr) -> Self {
        let ty = on_true.ty.clone();
        Expr::new(
            ExprKind::Cond {
                cond: Box::new(cond),
                on_true: Box::new(on_true),
                on_false: Box::new(on_false),
            },
            ty,
        )
    }

    /// Call of a library method.
    pub fn builtin(obj: Option<Expr>, builtin: Builtin, args: Vec<Expr>, ty: Option<Type>) -> Self {
        Expr::new(
            ExprKind::Call {
                obj: obj.map(Box::new),
                callee: Callee::Builtin(builtin),
                args,
            },
            ty,
        )
    }

    /// Read-only property typed `int`.
    pub fn property(obj: Expr, property: Property) -> Self {
        Expr::new(
            ExprKind::Property {
                obj: Box::new(obj),
                property,
            },
            Some(Type::INT),
        )
    }

    /// Interpolated string; always produces an owned string.
    pub fn interpolated(parts: Vec<InterpolatedPart>, suffix: impl Into<String>) -> Self {
        Expr::new(
            ExprKind::Interpolated {
                parts,
                suffix: suffix.into(),
            },
            Some(Type::StringStorage),
        )
    }

    /// `new T()` or `new T[length]` producing a shared pointer.
    pub fn new_object(element: Type, length: Option<Expr>) -> Self {
        let ty = match (&element, &length) {
            (Type::ClassValue(class), None) => Type::class_ptr(*class, crate::Sharing::Shared),
            _ => Type::array_ptr(element.clone(), crate::Sharing::Shared),
        };
        Expr::new(
            ExprKind::New {
                element,
                length: length.map(Box::new),
            },
            Some(ty),
        )
    }

    /// The literal payload, if this is a literal.
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// The string payload, if this is a string literal.
    pub fn as_string_literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer literal.
    pub fn as_int_literal(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::Literal(Literal::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is a bare reference to the given variable.
    pub fn is_reference_to(&self, var: VarId) -> bool {
        matches!(
            &self.kind,
            ExprKind::Symbol { left: None, symbol: Symbol::Var(v) } if *v == var
        )
    }

    /// Whether this is any symbol reference.
    pub fn is_symbol(&self) -> bool {
        matches!(self.kind, ExprKind::Symbol { .. })
    }

    /// The user method called by this expression, if it is a method call.
    pub fn called_method(&self) -> Option<MethodId> {
        match &self.kind {
            ExprKind::Call {
                callee: Callee::Method(method),
                ..
            } => Some(*method),
            _ => None,
        }
    }
}
