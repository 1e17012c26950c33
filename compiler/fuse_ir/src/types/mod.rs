//! The IR type lattice.
//!
//! Types are small owned values: nested array/collection element types are
//! boxed, classes and enums are referenced by id. The distinctions that
//! matter to backends are ownership ones:
//!
//! - `StringPtr` is a borrowed view, `StringStorage` owns its buffer.
//! - `ClassValue` embeds an object by value, `ClassPtr` points at one.
//! - `ArrayStorage` is a fixed-length inline array, `ArrayPtr` points at one.
//! - A pointer with [`Sharing::Shared`] is reference-counted ("dynamic").

use crate::{ClassId, EnumId};

/// Integer widths.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntKind {
    /// Unsigned 8-bit.
    Byte,
    /// Signed 16-bit.
    Short,
    /// Signed 32-bit, the default integer.
    Int,
    /// Signed 64-bit.
    Long,
}

/// Floating-point widths.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FloatKind {
    Float,
    Double,
}

/// Pointer sharing modifier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sharing {
    /// Read-only borrowed view.
    None,
    /// Mutable borrowed view.
    Exclusive,
    /// Reference-counted owner.
    Shared,
}

/// A fully resolved IR type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Int(IntKind),
    Float(FloatKind),
    Bool,
    /// Borrowed string, never freed by the holder.
    StringPtr,
    /// Owned string, freed on reassignment and scope exit.
    StringStorage,
    /// Object embedded by value.
    ClassValue(ClassId),
    /// Pointer to an object.
    ClassPtr { class: ClassId, sharing: Sharing },
    /// Fixed-length inline array.
    ArrayStorage { element: Box<Type>, length: u32 },
    /// Pointer to array elements.
    ArrayPtr { element: Box<Type>, sharing: Sharing },
    Enum(EnumId),
    /// Growable list owned by value.
    List(Box<Type>),
    /// Key/value collection owned by value.
    Dictionary { key: Box<Type>, value: Box<Type> },
    /// Type of the `null` literal.
    Null,
}

impl Type {
    /// The default integer type.
    pub const INT: Type = Type::Int(IntKind::Int);

    /// The default floating-point type.
    pub const DOUBLE: Type = Type::Float(FloatKind::Double);

    /// Pointer to a class with the given sharing.
    pub fn class_ptr(class: ClassId, sharing: Sharing) -> Type {
        Type::ClassPtr { class, sharing }
    }

    /// Fixed-length array of `element`.
    pub fn array_storage(element: Type, length: u32) -> Type {
        Type::ArrayStorage {
            element: Box::new(element),
            length,
        }
    }

    /// Pointer to elements of type `element`.
    pub fn array_ptr(element: Type, sharing: Sharing) -> Type {
        Type::ArrayPtr {
            element: Box::new(element),
            sharing,
        }
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    /// Integer or floating-point.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Borrowed or owned string.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Type::StringPtr | Type::StringStorage)
    }

    /// A class or array pointer of any sharing.
    #[inline]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::ClassPtr { .. } | Type::ArrayPtr { .. })
    }

    /// A reference-counted pointer.
    #[inline]
    pub fn is_dynamic_ptr(&self) -> bool {
        matches!(
            self,
            Type::ClassPtr {
                sharing: Sharing::Shared,
                ..
            } | Type::ArrayPtr {
                sharing: Sharing::Shared,
                ..
            }
        )
    }

    /// The element type after stripping every level of array storage.
    pub fn storage_type(&self) -> &Type {
        let mut ty = self;
        while let Type::ArrayStorage { element, .. } = ty {
            ty = element;
        }
        ty
    }

    /// The class behind a class value or class pointer.
    pub fn class(&self) -> Option<ClassId> {
        match self {
            Type::ClassValue(class) | Type::ClassPtr { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// Element type of array storage, array pointers and lists.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::ArrayStorage { element, .. }
            | Type::ArrayPtr { element, .. }
            | Type::List(element) => Some(element),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
