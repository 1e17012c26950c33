//! C type spelling and ownership predicates.

use fuse_ir::{FloatKind, IntKind, Sharing, Type, VarId};

use super::runtime::RuntimeFeatures;
use super::CCodegen;
use crate::error::Result;
use crate::traverse::Lowering;

impl CCodegen<'_> {
    /// Declaration of `name` as `ty`: `int x`, `const char *s`, `int (*a)[3]`.
    ///
    /// `promote` widens `byte` and `short` scalars to `int`, as C does for
    /// locals, parameters and return values.
    pub(super) fn declaration(&mut self, ty: &Type, name: &str, promote: bool) -> Result<String> {
        let mut base = ty;
        while let Type::ArrayStorage { element, .. } | Type::ArrayPtr { element, .. } = base {
            base = element;
        }
        let is_array = matches!(ty, Type::ArrayStorage { .. } | Type::ArrayPtr { .. });
        let mut result = self.base_type(base, promote && !is_array)?;
        array_prefix(ty, &mut result);
        result.push_str(name);
        array_suffix(ty, &mut result);
        Ok(result)
    }

    /// Abstract declarator, as used in casts and `sizeof`.
    pub(super) fn type_name(&mut self, ty: &Type) -> Result<String> {
        Ok(self.declaration(ty, "", false)?.trim_end().to_string())
    }

    /// Spelling of a non-array type, ending in a space or `*`.
    fn base_type(&mut self, ty: &Type, promote: bool) -> Result<String> {
        let spelled = match ty {
            Type::Int(IntKind::Byte | IntKind::Short) if promote => "int ".to_string(),
            Type::Int(IntKind::Byte) => {
                self.out.include("stdint.h");
                "uint8_t ".to_string()
            }
            Type::Int(IntKind::Short) => {
                self.out.include("stdint.h");
                "int16_t ".to_string()
            }
            Type::Int(IntKind::Int) => "int ".to_string(),
            Type::Int(IntKind::Long) => {
                self.out.include("stdint.h");
                "int64_t ".to_string()
            }
            Type::Float(FloatKind::Float) => "float ".to_string(),
            Type::Float(FloatKind::Double) => "double ".to_string(),
            Type::Bool => {
                self.out.include("stdbool.h");
                "bool ".to_string()
            }
            Type::StringPtr => "const char *".to_string(),
            Type::StringStorage => "char *".to_string(),
            Type::ClassValue(class) => format!("{} ", self.class_name(*class)),
            Type::ClassPtr { class, sharing } => {
                let constness = if *sharing == Sharing::None { "const " } else { "" };
                format!("{constness}{} *", self.class_name(*class))
            }
            Type::Enum(id) => format!("{} ", self.enum_name(*id)),
            Type::List(_) => {
                self.require(RuntimeFeatures::LIST);
                "FuList ".to_string()
            }
            Type::Null => "void *".to_string(),
            Type::Dictionary { .. } => return Err(self.unsupported("dictionary storage")),
            Type::ArrayStorage { .. } | Type::ArrayPtr { .. } => {
                return Err(self.unsupported("nested array spelling"))
            }
        };
        Ok(spelled)
    }

    /// Whether a variable of this type owes a teardown call.
    pub(super) fn needs_destruct(&self, ty: &Type) -> bool {
        let storage = ty.storage_type();
        match storage {
            Type::StringStorage | Type::List(_) => true,
            Type::ClassValue(class) => self.needs_destructor(*class),
            _ => storage.is_dynamic_ptr(),
        }
    }

    pub(super) fn var_needs_destruct(&self, var: VarId) -> bool {
        self.needs_destruct(&self.program.var(var).ty)
    }

    /// Element constructor passed to `FuShared_Make`.
    pub(super) fn element_constructor(&mut self, element: &Type) -> String {
        match element {
            Type::ClassValue(class) if self.needs_constructor(*class) => {
                format!("(FuMethodPtr) {}_Construct", self.class_name(*class))
            }
            Type::StringStorage => {
                self.require(RuntimeFeatures::PTR_CONSTRUCT);
                "(FuMethodPtr) FuPtr_Construct".to_string()
            }
            ty if ty.is_dynamic_ptr() => {
                self.require(RuntimeFeatures::PTR_CONSTRUCT);
                "(FuMethodPtr) FuPtr_Construct".to_string()
            }
            _ => "NULL".to_string(),
        }
    }

    /// Element destructor passed to `FuShared_Make` and `FuList_Init`.
    pub(super) fn element_destructor(&mut self, element: &Type) -> String {
        match element {
            Type::ClassValue(class) if self.needs_destructor(*class) => {
                format!("(FuMethodPtr) {}_Destruct", self.class_name(*class))
            }
            Type::StringStorage => {
                self.require(RuntimeFeatures::STRING_DESTRUCT);
                "(FuMethodPtr) FuString_Destruct".to_string()
            }
            Type::List(_) => {
                self.require(RuntimeFeatures::LIST_DESTRUCT);
                "(FuMethodPtr) FuList_Destruct".to_string()
            }
            ty if ty.is_dynamic_ptr() => {
                self.require(RuntimeFeatures::SHARED_DESTRUCT);
                "(FuMethodPtr) FuShared_Destruct".to_string()
            }
            _ => "NULL".to_string(),
        }
    }

    /// Value the current method returns to signal failure.
    pub(super) fn failure_sentinel(&mut self) -> Result<&'static str> {
        let program = self.program;
        let Some(method) = self.current_method.map(|m| program.method(m)).filter(|m| m.throws)
        else {
            return Err(self.unsupported("failure outside a method that may fail"));
        };
        match &method.return_type {
            None => Ok("false"),
            Some(ty) => self.sentinel_for(ty),
        }
    }

    /// Sentinel encoding of failure for a may-fail method returning `ty`.
    pub(super) fn sentinel_for(&mut self, ty: &Type) -> Result<&'static str> {
        match ty {
            Type::Int(_) => Ok("-1"),
            Type::Float(_) => {
                self.out.include("math.h");
                Ok("NAN")
            }
            ty if ty.is_string() || ty.is_pointer() => Ok("NULL"),
            _ => Err(self.unsupported("failure sentinel for this return type")),
        }
    }
}

fn array_prefix(ty: &Type, out: &mut String) {
    match ty {
        Type::ArrayStorage { element, .. } => array_prefix(element, out),
        Type::ArrayPtr { element, sharing } => {
            array_prefix(element, out);
            if matches!(**element, Type::ArrayStorage { .. }) {
                out.push('(');
            }
            out.push_str(if *sharing == Sharing::None { "const *" } else { "*" });
        }
        _ => {}
    }
}

fn array_suffix(ty: &Type, out: &mut String) {
    let mut ty = ty;
    loop {
        match ty {
            Type::ArrayStorage { element, length } => {
                out.push_str(&format!("[{length}]"));
                ty = element;
            }
            Type::ArrayPtr { element, .. } => {
                if matches!(**element, Type::ArrayStorage { .. }) {
                    out.push(')');
                }
                ty = element;
            }
            _ => break,
        }
    }
}
