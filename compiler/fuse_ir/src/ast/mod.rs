//! Declarations, statements and expressions of the typed IR.

mod expr;
mod items;
mod operators;
mod stmt;

pub use expr::{
    Builtin, Callee, Expr, ExprKind, InterpolatedPart, Literal, MathFn, Property, Symbol,
};
pub use items::{
    CallKind, Class, ClassKind, Const, Constructor, EnumDef, EnumValue, Field, Method, Var,
    Visibility,
};
pub use operators::{BinaryOp, UnaryOp};
pub use stmt::{Block, Case, Stmt};
