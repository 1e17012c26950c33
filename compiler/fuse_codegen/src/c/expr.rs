//! Expressions: symbols, calls, library methods and ownership coercions.

use fuse_ir::{
    BinaryOp, Builtin, Callee, CallKind, ClassId, Expr, ExprKind, FloatKind, IntKind,
    InterpolatedPart, Literal, Property, Symbol, Type,
};

use super::runtime::RuntimeFeatures;
use super::CCodegen;
use crate::error::{CodegenError, Result};
use crate::naming::camel_case;
use crate::traverse::{Lowering, Priority};
use crate::writer::{c_char_literal, c_string_literal, escape_c};

/// `s.Substring(offset, length)`: the receiver, offset and length.
fn as_substring(expr: &Expr) -> Option<(&Expr, &Expr, &Expr)> {
    match &expr.kind {
        ExprKind::Call {
            obj: Some(obj),
            callee: Callee::Builtin(Builtin::StringSubstring),
            args,
        } => match args.as_slice() {
            [offset, length] => Some((obj, offset, length)),
            _ => None,
        },
        _ => None,
    }
}

/// A string literal of exactly one character.
fn as_char_literal(expr: &Expr) -> Option<char> {
    let s = expr.as_string_literal()?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn is_this_or_base(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Symbol {
            left: None,
            symbol: Symbol::This | Symbol::Base
        }
    )
}

fn is_base(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Symbol {
            left: None,
            symbol: Symbol::Base
        }
    )
}

fn is_null(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Null))
}

fn is_concatenation(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => left.ty.as_ref().is_some_and(Type::is_string) || right.ty.as_ref().is_some_and(Type::is_string),
        _ => false,
    }
}

/// Flatten `a + "-" + b` into format parts, folding literal text into the
/// prefix of the next part. Leftover text ends up in `text`.
fn collect_concatenation(expr: &Expr, parts: &mut Vec<InterpolatedPart>, text: &mut String) {
    if let ExprKind::Binary { left, right, .. } = &expr.kind {
        if is_concatenation(expr) {
            collect_concatenation(left, parts, text);
            collect_concatenation(right, parts, text);
            return;
        }
    }
    if let Some(literal) = expr.as_string_literal() {
        text.push_str(literal);
        return;
    }
    parts.push(InterpolatedPart {
        prefix: std::mem::take(text),
        arg: expr.clone(),
        width: None,
        format: None,
        precision: None,
    });
}

/// A string concatenation rewritten as one interpolation.
fn concatenation_as_interpolation(expr: &Expr) -> Option<Expr> {
    if !is_concatenation(expr) {
        return None;
    }
    let mut parts = Vec::new();
    let mut text = String::new();
    collect_concatenation(expr, &mut parts, &mut text);
    Some(Expr::interpolated(parts, text))
}

/// Whether `expr` yields a freshly allocated string the consumer must own.
fn is_new_string(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Interpolated { .. } => true,
        ExprKind::Binary { .. } => is_concatenation(expr),
        ExprKind::Call {
            callee: Callee::Method(_),
            ..
        } => expr.ty == Some(Type::StringStorage),
        ExprKind::Call { .. } => as_substring(expr).is_some(),
        _ => false,
    }
}

/// Whether `expr` yields a shared pointer with no other owner: an
/// allocation, a call result or null. Anything else must be retained.
fn is_new_shared(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::New { .. }
        | ExprKind::Literal(Literal::Null)
        | ExprKind::Call {
            callee: Callee::Method(_),
            ..
        } => true,
        ExprKind::Cond {
            on_true, on_false, ..
        } => match (is_null(on_true), is_null(on_false)) {
            (true, _) => is_new_shared(on_false),
            (_, true) => is_new_shared(on_true),
            _ => is_new_shared(on_true) && is_new_shared(on_false),
        },
        _ => false,
    }
}

impl CCodegen<'_> {
    pub(super) fn lower_literal(&mut self, expr: &Expr, literal: &Literal) -> Result<()> {
        match literal {
            Literal::Null => self.out.write("NULL"),
            Literal::Bool(value) => {
                self.out.include("stdbool.h");
                self.out.write(if *value { "true" } else { "false" });
            }
            Literal::Int(i64::MIN) => self.out.write("(-9223372036854775807LL - 1)"),
            Literal::Int(n) if i32::try_from(*n).is_ok() => self.out.write(&n.to_string()),
            Literal::Int(n) => self.out.write(&format!("{n}LL")),
            Literal::Float(bits) => {
                let value = f64::from_bits(*bits);
                if value.is_nan() {
                    self.out.include("math.h");
                    self.out.write("NAN");
                } else if value.is_infinite() {
                    self.out.include("math.h");
                    self.out
                        .write(if value > 0.0 { "INFINITY" } else { "-INFINITY" });
                } else {
                    self.out.write(&format!("{value:?}"));
                    if expr.ty == Some(Type::Float(FloatKind::Float)) {
                        self.out.write("f");
                    }
                }
            }
            Literal::String(s) => self.out.write(&c_string_literal(s)),
        }
        Ok(())
    }

    // Member access

    /// Receiver and `base.` steps ahead of a member declared in `member_class`:
    /// `self->`, `obj->base.` or `obj.`.
    fn write_member_prefix(&mut self, obj: Option<&Expr>, member_class: ClassId) -> Result<()> {
        match obj {
            None => self.write_self_prefix(member_class),
            Some(obj) if is_this_or_base(obj) => self.write_self_prefix(member_class),
            Some(obj) => match &obj.ty {
                Some(Type::ClassPtr { class, .. }) => {
                    let path = self.base_path(*class, member_class);
                    self.accept_expr(obj, Priority::Primary)?;
                    self.out.write(&format!("->{path}"));
                    Ok(())
                }
                Some(Type::ClassValue(class)) => {
                    let path = self.base_path(*class, member_class);
                    self.accept_expr(obj, Priority::Primary)?;
                    self.out.write(&format!(".{path}"));
                    Ok(())
                }
                _ => Err(CodegenError::internal(
                    "member access on a value that is not an object",
                    self.context_symbol(),
                )),
            },
        }
    }

    fn write_self_prefix(&mut self, member_class: ClassId) -> Result<()> {
        let current = self.current_class.ok_or_else(|| {
            CodegenError::internal("`this` outside a class", self.context_symbol())
        })?;
        let path = self.base_path(current, member_class);
        self.out.write(&format!("self->{path}"));
        Ok(())
    }

    /// Pointer to `obj` viewed as `target`: `self`, `obj` or `&obj->base.base`.
    pub(super) fn write_class_ptr(&mut self, target: ClassId, obj: Option<&Expr>) -> Result<()> {
        let receiver = match obj {
            Some(obj) if !is_this_or_base(obj) => obj,
            _ => {
                let current = self.current_class.ok_or_else(|| {
                    CodegenError::internal("`this` outside a class", self.context_symbol())
                })?;
                if current == target {
                    self.out.write("self");
                } else {
                    let path = self.base_path(current, target);
                    self.out
                        .write(&format!("&self->{}", path.trim_end_matches('.')));
                }
                return Ok(());
            }
        };
        match &receiver.ty {
            Some(Type::ClassPtr { class, .. }) if *class == target => {
                self.accept_expr(receiver, Priority::Argument)
            }
            Some(Type::ClassPtr { class, .. }) => {
                let path = self.base_path(*class, target);
                self.out.write("&");
                self.accept_expr(receiver, Priority::Primary)?;
                self.out.write(&format!("->{}", path.trim_end_matches('.')));
                Ok(())
            }
            Some(Type::ClassValue(class)) => {
                let path = self.base_path(*class, target);
                self.out.write("&");
                self.accept_expr(receiver, Priority::Primary)?;
                if *class != target {
                    self.out.write(&format!(".{}", path.trim_end_matches('.')));
                }
                Ok(())
            }
            _ => Err(CodegenError::internal(
                "receiver is not an object",
                self.context_symbol(),
            )),
        }
    }

    pub(super) fn lower_symbol(
        &mut self,
        _expr: &Expr,
        left: Option<&Expr>,
        symbol: Symbol,
        _parent: Priority,
    ) -> Result<()> {
        match symbol {
            Symbol::Var(var) => {
                let name = self.local_name(var);
                if let Some(collection) = self.foreach_elements.get(&var).cloned() {
                    self.accept_expr(&collection, Priority::Primary)?;
                    self.out.write(&format!("[{name}]"));
                } else {
                    self.out.write(&name);
                }
            }
            Symbol::Field(field) => {
                let f = self.program.field(field);
                self.write_member_prefix(left, f.class)?;
                self.out.write(&crate::naming::c_local_name(&f.name));
            }
            Symbol::Const(konst) => {
                let name = self.const_name(konst);
                self.out.write(&name);
            }
            Symbol::EnumValue { enum_id, index } => {
                let name = self.enum_value_name(enum_id, index);
                self.out.write(&name);
            }
            Symbol::This => self.out.write("self"),
            Symbol::Base => {
                let class = self.current_class.and_then(|c| self.program.class(c).base);
                match class {
                    Some(base) => self.write_class_ptr(base, None)?,
                    None => {
                        return Err(CodegenError::internal(
                            "`base` in a class without a base",
                            self.context_symbol(),
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    // Calls

    /// Arguments coerced to the parameter types, filling in defaults.
    fn write_call_args(&mut self, method: fuse_ir::MethodId, args: &[Expr], first: bool) -> Result<()> {
        let program = self.program;
        for (i, &param) in program.method(method).params.iter().enumerate() {
            if i > 0 || !first {
                self.out.write(", ");
            }
            let p = program.var(param);
            match args.get(i).or(p.value.as_ref()) {
                Some(arg) => self.write_coerced(&p.ty, arg, Priority::Argument)?,
                None => {
                    return Err(CodegenError::internal(
                        format!("missing argument for parameter {}", p.name),
                        self.context_symbol(),
                    ))
                }
            }
        }
        Ok(())
    }

    pub(super) fn lower_call(
        &mut self,
        expr: &Expr,
        obj: Option<&Expr>,
        args: &[Expr],
        _parent: Priority,
    ) -> Result<()> {
        let program = self.program;
        let Some(method) = expr.called_method() else {
            return Err(CodegenError::internal("call without a method", self.context_symbol()));
        };
        let m = program.method(method);
        if m.call_kind == CallKind::Static {
            self.out.write(&format!("{}(", self.method_name(method)));
            self.write_call_args(method, args, true)?;
            self.out.write(")");
            return Ok(());
        }

        let dispatched = matches!(
            m.call_kind,
            CallKind::Abstract | CallKind::Virtual | CallKind::Override
        ) && !obj.is_some_and(is_base);
        if !dispatched {
            self.out.write(&format!("{}(", self.method_name(method)));
            self.write_class_ptr(m.class, obj)?;
            self.write_call_args(method, args, false)?;
            self.out.write(")");
            return Ok(());
        }

        let declaring = program.declaring_method(method);
        let declaring_class = program.method(declaring).class;
        let ptr_class = self.vtbl_ptr_class(declaring_class).ok_or_else(|| {
            CodegenError::internal("virtual call without a table", self.context_symbol())
        })?;
        let cast = declaring_class != ptr_class;
        if cast {
            self.out
                .write(&format!("((const {}Vtbl *) ", self.class_name(declaring_class)));
        }
        self.write_member_prefix(obj, ptr_class)?;
        self.out.write("vtbl");
        if cast {
            self.out.write(")");
        }
        self.out
            .write(&format!("->{}(", camel_case(&program.method(declaring).name)));
        self.write_class_ptr(declaring_class, obj)?;
        self.write_call_args(method, args, false)?;
        self.out.write(")");
        Ok(())
    }

    /// `base + offset`, or just `base` for a zero offset.
    fn write_pointer_offset(&mut self, base: &Expr, offset: &Expr, parent: Priority) -> Result<()> {
        if offset.as_int_literal() == Some(0) {
            return self.accept_expr(base, parent);
        }
        let parens = parent > Priority::Add;
        if parens {
            self.out.write("(");
        }
        self.accept_expr(base, Priority::Add)?;
        self.out.write(" + ");
        self.accept_expr(offset, Priority::Mul)?;
        if parens {
            self.out.write(")");
        }
        Ok(())
    }

    fn write_equality_test(&mut self, prefix: &str, suffix: &str, parent: Priority, body: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let parens = parent > Priority::Equality;
        if parens {
            self.out.write("(");
        }
        self.out.write(prefix);
        body(self)?;
        self.out.write(suffix);
        if parens {
            self.out.write(")");
        }
        Ok(())
    }

    pub(super) fn lower_builtin(
        &mut self,
        obj: Option<&Expr>,
        builtin: Builtin,
        args: &[Expr],
        parent: Priority,
    ) -> Result<()> {
        let symbol = self.context_symbol();
        let receiver = || {
            obj.ok_or_else(|| {
                CodegenError::internal("library method without a receiver", symbol.clone())
            })
        };
        match (builtin, args) {
            (Builtin::StringContains, [needle]) => {
                let s = receiver()?;
                self.out.include("string.h");
                let function = if as_char_literal(needle).is_some() { "strchr" } else { "strstr" };
                self.write_equality_test(&format!("{function}("), ") != NULL", parent, |this| {
                    this.accept_expr(s, Priority::Argument)?;
                    this.out.write(", ");
                    match as_char_literal(needle) {
                        Some(c) => {
                            this.out.write(&c_char_literal(c));
                            Ok(())
                        }
                        None => this.accept_expr(needle, Priority::Argument),
                    }
                })
            }
            (Builtin::StringStartsWith, [prefix]) if as_char_literal(prefix).is_some() => {
                let s = receiver()?;
                let c = as_char_literal(prefix).unwrap_or('\0');
                self.write_equality_test("", &format!("[0] == {}", c_char_literal(c)), parent, |this| {
                    this.accept_expr(s, Priority::Primary)
                })
            }
            (Builtin::StringEqualsIgnoreCase, [other]) => {
                self.require(RuntimeFeatures::STRING_COMPARE_IGNORE_CASE);
                let s = receiver()?;
                self.write_equality_test("FuString_CompareIgnoreCase(", ") == 0", parent, |this| {
                    this.accept_expr(s, Priority::Argument)?;
                    this.out.write(", ");
                    this.accept_expr(other, Priority::Argument)
                })
            }
            (
                Builtin::StringIndexOf
                | Builtin::StringLastIndexOf
                | Builtin::StringStartsWith
                | Builtin::StringEndsWith,
                [arg],
            ) => {
                let (feature, name) = match builtin {
                    Builtin::StringIndexOf => (RuntimeFeatures::STRING_INDEX_OF, "FuString_IndexOf"),
                    Builtin::StringLastIndexOf => {
                        (RuntimeFeatures::STRING_LAST_INDEX_OF, "FuString_LastIndexOf")
                    }
                    Builtin::StringStartsWith => {
                        (RuntimeFeatures::STRING_STARTS_WITH, "FuString_StartsWith")
                    }
                    _ => (RuntimeFeatures::STRING_ENDS_WITH, "FuString_EndsWith"),
                };
                self.require(feature);
                let s = receiver()?;
                self.out.write(&format!("{name}("));
                self.accept_expr(s, Priority::Argument)?;
                self.out.write(", ");
                self.accept_expr(arg, Priority::Argument)?;
                self.out.write(")");
                Ok(())
            }
            (Builtin::StringSubstring, [offset]) => {
                let s = receiver()?;
                self.write_pointer_offset(s, offset, parent)
            }
            (Builtin::StringSubstring, [offset, length]) => {
                let s = receiver()?;
                self.require(RuntimeFeatures::STRING_SUBSTRING);
                self.out.write("FuString_Substring(");
                self.write_pointer_offset(s, offset, Priority::Argument)?;
                self.out.write(", ");
                self.accept_expr(length, Priority::Argument)?;
                self.out.write(")");
                Ok(())
            }
            (Builtin::ConsoleWrite { stderr } | Builtin::ConsoleWriteLine { stderr }, _) => {
                let newline = matches!(builtin, Builtin::ConsoleWriteLine { .. });
                self.write_console(stderr, newline, args.first())
            }
            (Builtin::Math(function), _) => {
                self.out.include("math.h");
                self.out.write(&format!("{}(", function.library_name()));
                self.write_comma_separated(args)?;
                self.out.write(")");
                Ok(())
            }
            (Builtin::ArrayCopyTo, [source_offset, dest, dest_offset, length]) => {
                let source = receiver()?;
                let element = source
                    .ty
                    .as_ref()
                    .and_then(Type::element)
                    .cloned()
                    .ok_or_else(|| self.unsupported("copy from a value that is not an array"))?;
                let element_type = self.type_name(&element)?;
                self.out.include("string.h");
                self.out.write("memcpy(");
                self.write_pointer_offset(dest, dest_offset, Priority::Argument)?;
                self.out.write(", ");
                self.write_pointer_offset(source, source_offset, Priority::Argument)?;
                self.out.write(", ");
                self.accept_expr(length, Priority::Mul)?;
                self.out.write(&format!(" * sizeof({element_type}))"));
                Ok(())
            }
            (Builtin::ArrayFill, [value]) => {
                let array = receiver()?;
                if !value.as_literal().is_some_and(Literal::is_default_value) {
                    return Err(self.unsupported("array fill with a non-default value"));
                }
                if !matches!(array.ty, Some(Type::ArrayStorage { .. })) {
                    return Err(self.unsupported("fill of an array without fixed length"));
                }
                self.out.include("string.h");
                self.out.write("memset(");
                self.accept_expr(array, Priority::Argument)?;
                self.out.write(", 0, sizeof(");
                self.accept_expr(array, Priority::Argument)?;
                self.out.write("))");
                Ok(())
            }
            (Builtin::ListAdd, [value]) => {
                let list = receiver()?;
                let Some(Type::List(element)) = &list.ty else {
                    return Err(self.unsupported("add to a value that is not a list"));
                };
                self.require(RuntimeFeatures::LIST_ADD_SLOT);
                let slot = self.declaration(element, "*", false)?;
                let parens = parent > Priority::Assign;
                if parens {
                    self.out.write("(");
                }
                self.out.write(&format!("*({slot}) FuList_AddSlot(&"));
                self.accept_expr(list, Priority::Primary)?;
                self.out.write(") = ");
                self.write_coerced(element, value, Priority::Assign)?;
                if parens {
                    self.out.write(")");
                }
                Ok(())
            }
            (Builtin::ListClear, []) => {
                let list = receiver()?;
                self.require(RuntimeFeatures::LIST_CLEAR);
                self.out.write("FuList_Clear(&");
                self.accept_expr(list, Priority::Primary)?;
                self.out.write(")");
                Ok(())
            }
            _ => Err(self.unsupported(&format!("{builtin:?} with {} arguments", args.len()))),
        }
    }

    /// `printf`, `puts`, `fputs` or `putchar` for a console write.
    fn write_console(&mut self, stderr: bool, newline: bool, arg: Option<&Expr>) -> Result<()> {
        self.out.include("stdio.h");
        let joined = arg.and_then(concatenation_as_interpolation);
        let Some(arg) = joined.as_ref().or(arg) else {
            if newline {
                self.out
                    .write(if stderr { "fputc('\\n', stderr)" } else { "putchar('\\n')" });
            }
            return Ok(());
        };
        if !is_new_string(arg) && arg.ty.as_ref().is_some_and(Type::is_string) {
            match (stderr, newline) {
                (false, true) => {
                    self.out.write("puts(");
                    self.accept_expr(arg, Priority::Argument)?;
                    self.out.write(")");
                    return Ok(());
                }
                (_, false) => {
                    self.out.write("fputs(");
                    self.accept_expr(arg, Priority::Argument)?;
                    self.out
                        .write(if stderr { ", stderr)" } else { ", stdout)" });
                    return Ok(());
                }
                (true, true) => {}
            }
        }
        let single;
        let (parts, suffix) = match &arg.kind {
            ExprKind::Interpolated { parts, suffix } => (parts.as_slice(), suffix.as_str()),
            _ => {
                single = [InterpolatedPart {
                    prefix: String::new(),
                    arg: arg.clone(),
                    width: None,
                    format: None,
                    precision: None,
                }];
                (single.as_slice(), "")
            }
        };
        self.out
            .write(if stderr { "fprintf(stderr, " } else { "printf(" });
        self.write_printf_args(parts, suffix, newline)?;
        self.out.write(")");
        Ok(())
    }

    /// `"format", args...` for the printf family.
    pub(super) fn write_printf_args(
        &mut self,
        parts: &[InterpolatedPart],
        suffix: &str,
        newline: bool,
    ) -> Result<()> {
        let mut format = String::new();
        for part in parts {
            format.push_str(&escape_c(&part.prefix).replace('%', "%%"));
            format.push('%');
            if let Some(width) = part.width {
                format.push_str(&width.to_string());
            }
            let ty = part.arg.ty.clone().unwrap_or(Type::Null);
            let conversion = match (&ty, part.format) {
                (Type::StringPtr | Type::StringStorage, _) if as_substring(&part.arg).is_some() => {
                    ".*s".to_string()
                }
                (Type::StringPtr | Type::StringStorage, _) => "s".to_string(),
                (Type::Bool, _) => "s".to_string(),
                (Type::Int(kind), format) => {
                    let letter = match format {
                        Some('X') => 'X',
                        Some('x') => 'x',
                        _ => 'd',
                    };
                    let precision = part.precision.map(|p| format!(".{p}")).unwrap_or_default();
                    let length = if *kind == IntKind::Long { "ll" } else { "" };
                    format!("{precision}{length}{letter}")
                }
                (Type::Enum(_), _) => "d".to_string(),
                (Type::Float(_), format) => {
                    let letter = match format {
                        Some('F' | 'f') => 'f',
                        Some('E') => 'E',
                        Some('e') => 'e',
                        _ => 'g',
                    };
                    let precision = part.precision.map(|p| format!(".{p}")).unwrap_or_default();
                    format!("{precision}{letter}")
                }
                _ => return Err(self.unsupported("formatted value of this type")),
            };
            format.push_str(&conversion);
        }
        format.push_str(&escape_c(suffix).replace('%', "%%"));
        if newline {
            format.push_str("\\n");
        }
        self.out.write(&format!("\"{format}\""));

        for part in parts {
            self.out.write(", ");
            let arg = &part.arg;
            match &arg.ty {
                Some(Type::Int(IntKind::Long)) => {
                    self.out.write("(long long) ");
                    self.accept_expr(arg, Priority::Primary)?;
                }
                Some(Type::Bool) => {
                    self.accept_expr(arg, Priority::CondOr)?;
                    self.out.write(" ? \"true\" : \"false\"");
                }
                Some(_) if as_substring(arg).is_some() => {
                    if let Some((s, offset, length)) = as_substring(arg) {
                        self.out.write("(int) ");
                        self.accept_expr(length, Priority::Primary)?;
                        self.out.write(", ");
                        self.write_pointer_offset(s, offset, Priority::Argument)?;
                    }
                }
                Some(_) if is_new_string(arg) => {
                    return Err(self.unsupported("owned string temporary in formatted output"))
                }
                _ => self.accept_expr(arg, Priority::Argument)?,
            }
        }
        Ok(())
    }

    pub(super) fn lower_property(&mut self, obj: &Expr, property: Property, parent: Priority) -> Result<()> {
        match (property, &obj.ty) {
            (Property::StringLength, _) => {
                self.out.include("string.h");
                let parens = parent >= Priority::Primary;
                if parens {
                    self.out.write("(");
                }
                self.out.write("(int) strlen(");
                self.accept_expr(obj, Priority::Argument)?;
                self.out.write(")");
                if parens {
                    self.out.write(")");
                }
                Ok(())
            }
            (Property::CollectionCount, Some(Type::ArrayStorage { length, .. })) => {
                self.out.write(&length.to_string());
                Ok(())
            }
            (Property::CollectionCount, Some(Type::List(_))) => {
                let parens = parent >= Priority::Primary;
                if parens {
                    self.out.write("(");
                }
                self.out.write("(int) ");
                self.accept_expr(obj, Priority::Primary)?;
                self.out.write(".count");
                if parens {
                    self.out.write(")");
                }
                Ok(())
            }
            _ => Err(self.unsupported("count of a collection without known length")),
        }
    }

    // Operators

    /// String equality, or `None` when neither side is textual.
    fn write_string_equality(&mut self, op: BinaryOp, left: &Expr, right: &Expr, parent: Priority) -> Result<bool> {
        let textual = |e: &Expr| e.ty.as_ref().is_some_and(Type::is_string);
        if !(textual(left) || textual(right)) || is_null(left) || is_null(right) {
            return Ok(false);
        }
        let comparison = op.as_symbol();

        // First-byte test against the empty string.
        let empty = match (left.as_string_literal(), right.as_string_literal()) {
            (_, Some("")) => Some(left),
            (Some(""), _) => Some(right),
            _ => None,
        };
        if let Some(s) = empty {
            self.write_equality_test("", &format!("[0] {comparison} '\\0'"), parent, |this| {
                this.accept_expr(s, Priority::Primary)
            })?;
            return Ok(true);
        }

        // Fixed-length substring against a literal of that length.
        let fixed = match (as_substring(left), right.as_string_literal()) {
            (Some(sub), Some(lit)) => Some((sub, lit)),
            _ => match (as_substring(right), left.as_string_literal()) {
                (Some(sub), Some(lit)) => Some((sub, lit)),
                _ => None,
            },
        };
        if let Some(((s, offset, length), literal)) = fixed {
            let length_matches = usize::try_from(length.as_int_literal().unwrap_or(-1))
                .is_ok_and(|n| n == literal.len());
            if length_matches {
                self.out.include("string.h");
                self.write_equality_test("memcmp(", &format!(", {}) {comparison} 0", literal.len()), parent, |this| {
                    this.write_pointer_offset(s, offset, Priority::Argument)?;
                    this.out.write(&format!(", {}", c_string_literal(literal)));
                    Ok(())
                })?;
                return Ok(true);
            }
        }

        if is_new_string(left) || is_new_string(right) {
            return Err(self.unsupported("comparison with an owned string temporary"));
        }
        self.out.include("string.h");
        self.write_equality_test("strcmp(", &format!(") {comparison} 0"), parent, |this| {
            this.accept_expr(left, Priority::Argument)?;
            this.out.write(", ");
            this.accept_expr(right, Priority::Argument)
        })?;
        Ok(true)
    }

    pub(super) fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        parent: Priority,
    ) -> Result<()> {
        let left_type = left.ty.clone().unwrap_or(Type::Null);
        match op {
            BinaryOp::Equal | BinaryOp::NotEqual => {
                if self.write_string_equality(op, left, right, parent)? {
                    return Ok(());
                }
                // `s.Length == 0` tests the first byte.
                if let (ExprKind::Property { obj, property: Property::StringLength }, Some(0)) =
                    (&left.kind, right.as_int_literal())
                {
                    let comparison = op.as_symbol();
                    return self.write_equality_test("", &format!("[0] {comparison} '\\0'"), parent, |this| {
                        this.accept_expr(obj, Priority::Primary)
                    });
                }
                self.write_binary(op, left, right, parent)
            }
            BinaryOp::Assign if left_type == Type::StringStorage => {
                if let Some((s, offset, length)) = as_substring(right) {
                    if parent == Priority::Statement && offset.as_int_literal() == Some(0) && *s == *left {
                        self.accept_expr(left, Priority::Primary)?;
                        self.out.write("[");
                        self.accept_expr(length, Priority::Argument)?;
                        self.out.write("] = '\\0'");
                        return Ok(());
                    }
                }
                self.require(RuntimeFeatures::STRING_ASSIGN);
                self.out.write("FuString_Assign(&");
                self.accept_expr(left, Priority::Primary)?;
                self.out.write(", ");
                self.write_string_storage_value(right, Priority::Argument)?;
                self.out.write(")");
                Ok(())
            }
            BinaryOp::AddAssign if left_type == Type::StringStorage => {
                if let Some(joined) = concatenation_as_interpolation(right) {
                    let rewritten = Expr::assign(BinaryOp::AddAssign, left.clone(), joined);
                    return self.accept_expr(&rewritten, parent);
                }
                if let ExprKind::Interpolated { parts, suffix } = &right.kind {
                    let mut joined = Vec::with_capacity(parts.len() + 1);
                    joined.push(InterpolatedPart {
                        prefix: String::new(),
                        arg: left.clone(),
                        width: None,
                        format: None,
                        precision: None,
                    });
                    joined.extend(parts.iter().cloned());
                    let rewritten = Expr::assign(
                        BinaryOp::Assign,
                        left.clone(),
                        Expr::interpolated(joined, suffix.clone()),
                    );
                    return self.accept_expr(&rewritten, parent);
                }
                if is_new_string(right) {
                    return Err(self.unsupported("append of an owned string temporary"));
                }
                self.require(RuntimeFeatures::STRING_APPEND);
                self.out.write("FuString_Append(&");
                self.accept_expr(left, Priority::Primary)?;
                self.out.write(", ");
                self.accept_expr(right, Priority::Argument)?;
                self.out.write(")");
                Ok(())
            }
            BinaryOp::Assign if left_type.is_dynamic_ptr() => {
                self.require(RuntimeFeatures::SHARED_ASSIGN);
                self.out.write("FuShared_Assign((void **) &");
                self.accept_expr(left, Priority::Primary)?;
                self.out.write(", ");
                self.write_coerced(&left_type, right, Priority::Argument)?;
                self.out.write(")");
                Ok(())
            }
            BinaryOp::Assign => {
                let parens = parent > Priority::Assign;
                if parens {
                    self.out.write("(");
                }
                self.accept_expr(left, Priority::Assign)?;
                self.out.write(" = ");
                self.write_coerced(&left_type, right, Priority::Assign)?;
                if parens {
                    self.out.write(")");
                }
                Ok(())
            }
            BinaryOp::Index => {
                if let Type::List(element) = &left_type {
                    let items = self.declaration(element, "*", false)?;
                    self.out.write(&format!("(({items}) "));
                    self.accept_expr(left, Priority::Primary)?;
                    self.out.write(".items)[");
                    self.accept_expr(right, Priority::Argument)?;
                    self.out.write("]");
                    return Ok(());
                }
                self.write_binary(op, left, right, parent)
            }
            BinaryOp::Add if left_type.is_string() || right.ty.as_ref().is_some_and(Type::is_string) => {
                let mut parts = Vec::new();
                let mut text = String::new();
                collect_concatenation(left, &mut parts, &mut text);
                collect_concatenation(right, &mut parts, &mut text);
                self.accept_expr(&Expr::interpolated(parts, text), parent)
            }
            _ => self.write_binary(op, left, right, parent),
        }
    }

    pub(super) fn lower_cond(
        &mut self,
        expr: &Expr,
        cond: &Expr,
        on_true: &Expr,
        on_false: &Expr,
        parent: Priority,
    ) -> Result<()> {
        if expr.ty == Some(Type::StringStorage) && (is_new_string(on_true) != is_new_string(on_false)) {
            return Err(self.unsupported("conditional mixing owned and borrowed strings"));
        }
        self.write_select(cond, on_true, on_false, parent)
    }

    /// `(T *) FuShared_Make(count, sizeof(T), constructor, destructor)`.
    pub(super) fn lower_new(&mut self, element: &Type, length: Option<&Expr>) -> Result<()> {
        self.require(RuntimeFeatures::SHARED_MAKE);
        let pointer = self.declaration(element, "*", false)?;
        let element_type = self.type_name(element)?;
        let constructor = self.element_constructor(element);
        let destructor = self.element_destructor(element);
        self.out.write(&format!("({pointer}) FuShared_Make("));
        match length {
            Some(length) => self.accept_expr(length, Priority::Argument)?,
            None => self.out.write("1"),
        }
        self.out.write(&format!(
            ", sizeof({element_type}), {constructor}, {destructor})"
        ));
        Ok(())
    }

    // Coercions

    /// `expr` stored into a slot of type `ty`, with the ownership transfer
    /// the slot requires.
    pub(super) fn write_coerced(&mut self, ty: &Type, expr: &Expr, parent: Priority) -> Result<()> {
        match ty {
            Type::StringStorage => self.write_string_storage_value(expr, parent),
            ty if ty.is_dynamic_ptr() => {
                if let ExprKind::Cond {
                    on_true, on_false, ..
                } = &expr.kind
                {
                    let mixed = !is_null(on_true)
                        && !is_null(on_false)
                        && is_new_shared(on_true) != is_new_shared(on_false);
                    if mixed {
                        return Err(self.unsupported("conditional mixing owned and borrowed pointers"));
                    }
                }
                let retained = !is_new_shared(expr) && expr.ty.as_ref().is_some_and(Type::is_dynamic_ptr);
                if retained {
                    self.require(RuntimeFeatures::SHARED_ADD_REF);
                    self.out.write("FuShared_AddRef(");
                    self.accept_expr(expr, Priority::Argument)?;
                    self.out.write(")");
                    Ok(())
                } else {
                    self.accept_expr(expr, parent)
                }
            }
            Type::ClassPtr { class, .. } => match &expr.ty {
                Some(Type::ClassPtr { class: from, .. }) if from != class => {
                    self.write_class_ptr(*class, Some(expr))
                }
                Some(Type::ClassValue(_)) => self.write_class_ptr(*class, Some(expr)),
                _ => self.accept_expr(expr, parent),
            },
            _ => self.accept_expr(expr, parent),
        }
    }

    /// Value for owned string storage: new strings as is, anything else
    /// duplicated.
    pub(super) fn write_string_storage_value(&mut self, expr: &Expr, parent: Priority) -> Result<()> {
        if is_null(expr) || is_new_string(expr) {
            return self.accept_expr(expr, parent);
        }
        if let ExprKind::Cond { cond, on_true, on_false } = &expr.kind {
            if is_new_string(on_true) && is_new_string(on_false) {
                return self.write_select(cond, on_true, on_false, parent);
            }
        }
        self.out.include("string.h");
        self.out.write("strdup(");
        self.accept_expr(expr, Priority::Argument)?;
        self.out.write(")");
        Ok(())
    }
}
