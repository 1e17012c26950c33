//! Expressions.
//!
//! Python comparisons bind looser than its bitwise operators, unlike C, so
//! comparison operands are written at [`COMPARISON_OPERAND`] and a
//! comparison parenthesizes itself under anything tighter than `and`.

use fuse_ir::{BinaryOp, Builtin, CallKind, Expr, ExprKind, IntKind, Literal, Symbol, Type, UnaryOp};

use super::PyCodegen;
use crate::error::{CodegenError, Result};
use crate::naming::{lower_with_underscores, upper_with_underscores};
use crate::traverse::{needs_parens, Lowering, Priority};
use crate::writer::{push_py_escaped, py_string_literal};

/// Context of an operand of `==`, `<`, `in` and friends.
const COMPARISON_OPERAND: Priority = Priority::Shift;

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual
    )
}

fn is_integer(expr: &Expr) -> bool {
    expr.ty.as_ref().is_some_and(Type::is_integer)
}

/// Operands compared by identity rather than value.
fn is_identity_operand(expr: &Expr) -> bool {
    matches!(&expr.ty, Some(ty) if ty.is_pointer() || *ty == Type::Null)
}

impl PyCodegen<'_> {
    pub(super) fn lower_literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Null => self.out.write("None"),
            Literal::Bool(value) => self.out.write(if *value { "True" } else { "False" }),
            Literal::Int(value) => self.out.write(&value.to_string()),
            Literal::Float(bits) => {
                let value = f64::from_bits(*bits);
                if value.is_nan() {
                    self.out.include("math");
                    self.out.write("math.nan");
                } else if value.is_infinite() {
                    self.out.include("math");
                    self.out.write(if value > 0.0 { "math.inf" } else { "-math.inf" });
                } else {
                    self.out.write(&format!("{value:?}"));
                }
            }
            Literal::String(s) => self.out.write(&py_string_literal(s)),
        }
    }

    pub(super) fn lower_symbol(&mut self, left: Option<&Expr>, symbol: Symbol) -> Result<()> {
        let program = self.program;
        match symbol {
            Symbol::Var(var) => {
                let name = self.local_name(var);
                self.out.write(&name);
            }
            Symbol::This => self.out.write("self"),
            Symbol::Base => self.out.write("super()"),
            Symbol::Field(field) => {
                match left {
                    // Attributes live on the instance, whichever class set them.
                    None
                    | Some(Expr {
                        kind:
                            ExprKind::Symbol {
                                symbol: Symbol::Base,
                                ..
                            },
                        ..
                    }) => self.out.write("self"),
                    Some(obj) => self.accept_expr(obj, Priority::Primary)?,
                }
                self.out.write(".");
                self.out
                    .write(&lower_with_underscores(&program.field(field).name));
            }
            Symbol::Const(konst) => {
                let class = self.class_name(program.konst(konst).class);
                let name = self.const_name(konst);
                self.out.write(&format!("{class}.{name}"));
            }
            Symbol::EnumValue { enum_id, index } => {
                let value = program
                    .enum_def(enum_id)
                    .values
                    .get(index as usize)
                    .ok_or_else(|| {
                        CodegenError::internal(
                            format!("enum value {index} out of range"),
                            self.context_symbol(),
                        )
                    })?;
                let name = self.enum_name(enum_id);
                self.out
                    .write(&format!("{name}.{}", upper_with_underscores(&value.name)));
            }
        }
        Ok(())
    }

    pub(super) fn lower_call(&mut self, expr: &Expr, obj: Option<&Expr>, args: &[Expr])
        -> Result<()> {
        let program = self.program;
        let method = expr
            .called_method()
            .ok_or_else(|| CodegenError::internal("call without a method", self.context_symbol()))?;
        let m = program.method(method);
        if m.call_kind == CallKind::Static {
            let class = self.class_name(m.class);
            self.out.write(&class);
        } else {
            match obj {
                Some(obj) => self.accept_expr(obj, Priority::Primary)?,
                None => self.out.write("self"),
            }
        }
        let name = self.method_name(method);
        self.out.write(&format!(".{name}("));
        self.write_comma_separated(args)?;
        self.out.write(")");
        Ok(())
    }

    fn receiver<'e>(&self, obj: Option<&'e Expr>, builtin: Builtin) -> Result<&'e Expr> {
        obj.ok_or_else(|| {
            CodegenError::internal(format!("{builtin:?} without a receiver"), self.context_symbol())
        })
    }

    fn argument<'e>(&self, args: &'e [Expr], index: usize, builtin: Builtin) -> Result<&'e Expr> {
        args.get(index).ok_or_else(|| {
            CodegenError::internal(
                format!("{builtin:?} is missing argument {index}"),
                self.context_symbol(),
            )
        })
    }

    /// `obj[offset:offset + length]`, open-ended without a length.
    fn write_slice(&mut self, obj: &Expr, offset: &Expr, length: Option<&Expr>) -> Result<()> {
        self.accept_expr(obj, Priority::Primary)?;
        self.out.write("[");
        let from_start = offset.as_int_literal() == Some(0);
        if !from_start {
            self.accept_expr(offset, Priority::Argument)?;
        }
        self.out.write(":");
        if let Some(length) = length {
            if !from_start {
                self.accept_expr(offset, Priority::Add)?;
                self.out.write(" + ");
            }
            self.accept_expr(length, Priority::Mul)?;
        }
        self.out.write("]");
        Ok(())
    }

    fn statement_only(&self, builtin: Builtin, parent: Priority) -> Result<()> {
        if parent == Priority::Statement {
            Ok(())
        } else {
            Err(self.unsupported(&format!("{builtin:?} inside an expression")))
        }
    }

    pub(super) fn lower_builtin(
        &mut self,
        obj: Option<&Expr>,
        builtin: Builtin,
        args: &[Expr],
        parent: Priority,
    ) -> Result<()> {
        match builtin {
            Builtin::StringContains => {
                let s = self.receiver(obj, builtin)?;
                let needle = self.argument(args, 0, builtin)?;
                let parens = parent > Priority::CondAnd;
                if parens {
                    self.out.write("(");
                }
                self.accept_expr(needle, COMPARISON_OPERAND)?;
                self.out.write(" in ");
                self.accept_expr(s, COMPARISON_OPERAND)?;
                if parens {
                    self.out.write(")");
                }
            }
            Builtin::StringEqualsIgnoreCase => {
                let s = self.receiver(obj, builtin)?;
                let other = self.argument(args, 0, builtin)?;
                let parens = parent > Priority::CondAnd;
                if parens {
                    self.out.write("(");
                }
                self.accept_expr(s, Priority::Primary)?;
                self.out.write(".casefold() == ");
                self.accept_expr(other, Priority::Primary)?;
                self.out.write(".casefold()");
                if parens {
                    self.out.write(")");
                }
            }
            Builtin::StringIndexOf
            | Builtin::StringLastIndexOf
            | Builtin::StringStartsWith
            | Builtin::StringEndsWith
            | Builtin::ListAdd
            | Builtin::ListClear => {
                let name = match builtin {
                    Builtin::StringIndexOf => "find",
                    Builtin::StringLastIndexOf => "rfind",
                    Builtin::StringStartsWith => "startswith",
                    Builtin::StringEndsWith => "endswith",
                    Builtin::ListAdd => "append",
                    _ => "clear",
                };
                let obj = self.receiver(obj, builtin)?;
                self.accept_expr(obj, Priority::Primary)?;
                self.out.write(&format!(".{name}("));
                self.write_comma_separated(args)?;
                self.out.write(")");
            }
            Builtin::StringSubstring => {
                let s = self.receiver(obj, builtin)?;
                let offset = self.argument(args, 0, builtin)?;
                self.write_slice(s, offset, args.get(1))?;
            }
            Builtin::ConsoleWrite { stderr } | Builtin::ConsoleWriteLine { stderr } => {
                let line = matches!(builtin, Builtin::ConsoleWriteLine { .. });
                let mut options = Vec::new();
                if !line {
                    options.push("end=\"\"");
                }
                if stderr {
                    self.out.include("sys");
                    options.push("file=sys.stderr");
                }
                self.out.write("print(");
                if let Some(arg) = args.first() {
                    self.accept_expr(arg, Priority::Argument)?;
                    if !options.is_empty() {
                        self.out.write(", ");
                    }
                }
                self.out.write(&options.join(", "));
                self.out.write(")");
            }
            Builtin::Math(function) => {
                self.out.include("math");
                self.out.write(&format!("math.{}(", function.library_name()));
                self.write_comma_separated(args)?;
                self.out.write(")");
            }
            Builtin::ArrayCopyTo => {
                self.statement_only(builtin, parent)?;
                let source = self.receiver(obj, builtin)?;
                let source_offset = self.argument(args, 0, builtin)?;
                let dest = self.argument(args, 1, builtin)?;
                let dest_offset = self.argument(args, 2, builtin)?;
                let length = self.argument(args, 3, builtin)?;
                self.write_slice(dest, dest_offset, Some(length))?;
                self.out.write(" = ");
                self.write_slice(source, source_offset, Some(length))?;
            }
            Builtin::ArrayFill => {
                self.statement_only(builtin, parent)?;
                let array = self.receiver(obj, builtin)?;
                let value = self.argument(args, 0, builtin)?;
                self.accept_expr(array, Priority::Primary)?;
                self.out.write("[:] = [ ");
                self.accept_expr(value, Priority::Argument)?;
                self.out.write(" ] * len(");
                self.accept_expr(array, Priority::Argument)?;
                self.out.write(")");
            }
        }
        Ok(())
    }

    pub(super) fn lower_unary(&mut self, op: UnaryOp, inner: &Expr, parent: Priority)
        -> Result<()> {
        match op {
            // Hoisted into statements of their own.
            op if op.is_step() => self.accept_expr(inner, parent),
            UnaryOp::Not => {
                let parens = parent > Priority::CondAnd;
                if parens {
                    self.out.write("(");
                }
                self.out.write("not ");
                self.accept_expr(inner, Priority::Or)?;
                if parens {
                    self.out.write(")");
                }
                Ok(())
            }
            op => self.write_unary(op, inner),
        }
    }

    pub(super) fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        parent: Priority,
    ) -> Result<()> {
        match op {
            op if op.is_assign() => self.lower_assign(op, left, right, parent),
            BinaryOp::CondAnd | BinaryOp::CondOr => {
                let own = Priority::of(op);
                let keyword = if op == BinaryOp::CondAnd { " and " } else { " or " };
                self.write_infix(left, own, keyword, right, own.tighter(), needs_parens(op, parent))
            }
            BinaryOp::Equal | BinaryOp::NotEqual
                if is_identity_operand(left) || is_identity_operand(right) =>
            {
                let keyword = if op == BinaryOp::Equal { " is " } else { " is not " };
                self.write_infix(
                    left,
                    COMPARISON_OPERAND,
                    keyword,
                    right,
                    COMPARISON_OPERAND,
                    parent > Priority::CondAnd,
                )
            }
            op if is_comparison(op) => self.write_infix(
                left,
                COMPARISON_OPERAND,
                &format!(" {} ", op.as_symbol()),
                right,
                COMPARISON_OPERAND,
                parent > Priority::CondAnd,
            ),
            BinaryOp::Div if is_integer(left) && is_integer(right) => self.write_infix(
                left,
                Priority::Mul,
                " // ",
                right,
                Priority::Primary,
                parent > Priority::Mul,
            ),
            BinaryOp::Index if left.ty.as_ref().is_some_and(Type::is_string) => {
                self.out.write("ord(");
                self.write_binary(op, left, right, Priority::Argument)?;
                self.out.write(")");
                Ok(())
            }
            op => self.write_binary(op, left, right, parent),
        }
    }

    /// Assignments are statements; only `a = b = c` chains nest.
    fn lower_assign(&mut self, op: BinaryOp, left: &Expr, right: &Expr, parent: Priority)
        -> Result<()> {
        if parent != Priority::Statement {
            return Err(self.unsupported("assignment inside an expression"));
        }
        self.accept_expr(left, Priority::Assign)?;
        let symbol = match op {
            BinaryOp::DivAssign if is_integer(left) => "//=",
            op => op.as_symbol(),
        };
        self.out.write(&format!(" {symbol} "));
        let chained = op == BinaryOp::Assign
            && matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Assign,
                    ..
                }
            );
        let right_priority = if chained {
            Priority::Statement
        } else {
            Priority::Argument
        };
        self.accept_expr(right, right_priority)
    }

    /// `f"..."` with `{{` and `}}` for literal braces.
    pub(super) fn lower_interpolated(
        &mut self,
        parts: &[fuse_ir::InterpolatedPart],
        suffix: &str,
    ) -> Result<()> {
        self.out.write("f\"");
        for part in parts {
            self.write_fstring_text(&part.prefix);
            self.out.write("{");
            self.accept_expr(&part.arg, Priority::Argument)?;
            let numeric = part.arg.ty.as_ref().is_some_and(Type::is_numeric);
            let format = part.format.filter(|&f| f != 'D' && f != 'd');
            let mut spec = String::new();
            match part.width {
                Some(width) if width < 0 => spec.push_str(&format!("<{}", width.unsigned_abs())),
                Some(width) if numeric => spec.push_str(&width.to_string()),
                Some(width) => spec.push_str(&format!(">{width}")),
                None => {}
            }
            if let Some(precision) = part.precision {
                let marker = if is_integer(&part.arg) { '0' } else { '.' };
                spec.push(marker);
                spec.push_str(&precision.to_string());
            }
            if let Some(format) = format {
                spec.push(format);
            }
            if !spec.is_empty() {
                self.out.write(":");
                self.out.write(&spec);
            }
            self.out.write("}");
        }
        self.write_fstring_text(suffix);
        self.out.write("\"");
        Ok(())
    }

    fn write_fstring_text(&mut self, text: &str) {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '{' => escaped.push_str("{{"),
                '}' => escaped.push_str("}}"),
                c => push_py_escaped(&mut escaped, c),
            }
        }
        self.out.write(&escaped);
    }

    pub(super) fn lower_new(&mut self, element: &Type, length: Option<&Expr>) -> Result<()> {
        match length {
            Some(length) => self.write_new_array(element, length),
            None => match element.class() {
                Some(class) => {
                    let name = self.class_name(class);
                    self.out.write(&format!("{name}()"));
                    Ok(())
                }
                None => Err(self.unsupported(&format!("new {element:?}"))),
            },
        }
    }

    /// A fresh array of `length` default elements.
    pub(super) fn write_new_array(&mut self, element: &Type, length: &Expr) -> Result<()> {
        match element {
            Type::Int(IntKind::Byte) => {
                self.out.write("bytearray(");
                self.accept_expr(length, Priority::Argument)?;
                self.out.write(")");
            }
            Type::ClassValue(_)
            | Type::ArrayStorage { .. }
            | Type::List(_)
            | Type::Dictionary { .. } => {
                self.out.write("[ ");
                self.write_storage_init(element)?;
                self.out.write(" for _ in range(");
                self.accept_expr(length, Priority::Argument)?;
                self.out.write(") ]");
            }
            element => {
                let default = match element {
                    Type::Int(_) => "0",
                    Type::Float(_) => "0.0",
                    Type::Bool => "False",
                    _ => "None",
                };
                self.out.write(&format!("[ {default} ] * "));
                self.accept_expr(length, Priority::Mul)?;
            }
        }
        Ok(())
    }

    /// Whether a variable or field of `ty` needs a value before first use.
    pub(super) fn needs_storage_init(ty: &Type) -> bool {
        matches!(
            ty,
            Type::ClassValue(_) | Type::ArrayStorage { .. } | Type::List(_) | Type::Dictionary { .. }
        ) || ty.is_dynamic_ptr()
    }

    /// Initial value of a variable or field of `ty` declared without one.
    pub(super) fn write_storage_init(&mut self, ty: &Type) -> Result<()> {
        match ty {
            Type::ClassValue(class) => {
                let name = self.class_name(*class);
                self.out.write(&format!("{name}()"));
            }
            Type::ArrayStorage { element, length } => {
                self.write_new_array(element, &Expr::int(i64::from(*length)))?;
            }
            Type::List(element) if **element == Type::Int(IntKind::Byte) => {
                self.out.write("bytearray()");
            }
            Type::List(_) => self.out.write("[]"),
            Type::Dictionary { .. } => self.out.write("{}"),
            _ => self.out.write("None"),
        }
        Ok(())
    }
}
