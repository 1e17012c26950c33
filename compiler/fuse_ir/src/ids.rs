//! Arena indices for IR entities.
//!
//! Every class, method, field, variable, constant and enum lives in a flat
//! arena owned by [`Program`](crate::Program). Nodes refer to each other
//! through these `u32` newtypes instead of pointers, so the IR is a plain
//! tree of values that can be cloned, compared and serialized.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw arena index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            /// Get the index into the arena.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Get the raw u32 value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// Index into [`Program::classes`](crate::Program).
    ClassId
);
define_id!(
    /// Index into [`Program::methods`](crate::Program).
    MethodId
);
define_id!(
    /// Index into [`Program::fields`](crate::Program).
    FieldId
);
define_id!(
    /// Index into [`Program::vars`](crate::Program). Covers locals and parameters.
    VarId
);
define_id!(
    /// Index into [`Program::consts`](crate::Program).
    ConstId
);
define_id!(
    /// Index into [`Program::enums`](crate::Program).
    EnumId
);
