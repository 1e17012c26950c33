//! Code generation errors.
//!
//! Every error is fatal: generation stops at the first one and no artifact
//! is produced.

/// A defect in the input program or a construct the backend does not model.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// The backend has no lowering for this construct.
    #[error("unsupported {construct} in {symbol}")]
    Unsupported { construct: String, symbol: String },
    /// A class is its own ancestor or embeds itself by value.
    #[error("circular dependency for class {class}")]
    CircularDependency { class: String },
    /// The IR violates an assumption the checker should have enforced.
    #[error("internal error in {symbol}: {message}")]
    Internal { message: String, symbol: String },
}

impl CodegenError {
    pub fn unsupported(construct: impl Into<String>, symbol: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            construct: construct.into(),
            symbol: symbol.into(),
        }
    }

    pub fn internal(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        CodegenError::Internal {
            message: message.into(),
            symbol: symbol.into(),
        }
    }
}

pub type Result<T, E = CodegenError> = std::result::Result<T, E>;
