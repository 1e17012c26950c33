//! Fuse IR - the typed program model shared by every code generator.
//!
//! This crate contains the data structures the backends consume:
//! - Arena ids for classes, methods, fields, variables, constants and enums
//! - The type lattice with its ownership distinctions
//! - Statements and expressions, each expression carrying its resolved type
//! - [`Program`], the owner of every arena, with class-hierarchy queries
//! - [`flow`], reachability facts over statements
//!
//! # Design Philosophy
//!
//! - **Arena everything**: entities are stored once and referenced by `u32`
//!   ids, so the tree is a plain value that can be cloned and compared.
//! - **Fully typed**: the upstream checker has resolved every symbol; the IR
//!   never carries unresolved names.
//!
//! Floats are stored as `u64` bits so every node keeps `Eq` and `Hash`.

pub mod ast;
pub mod flow;
mod ids;
mod program;
mod types;

pub use ast::{
    BinaryOp, Block, Builtin, CallKind, Callee, Case, Class, ClassKind, Const, Constructor,
    EnumDef, EnumValue, Expr, ExprKind, Field, InterpolatedPart, Literal, MathFn, Method,
    Property, Stmt, Symbol, UnaryOp, Var, Visibility,
};
pub use ids::{ClassId, ConstId, EnumId, FieldId, MethodId, VarId};
pub use program::{Ancestors, HierarchyError, Program};
pub use types::{FloatKind, IntKind, Sharing, Type};
