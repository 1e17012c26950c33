//! Fuse code generators.
//!
//! Lowers a checked [`fuse_ir::Program`] to source text for one target:
//!
//! ```text
//! Program (typed IR)
//!     ├── CCodegen   -> name.h + name.c   (manual memory, vtables, sentinels)
//!     └── PyCodegen  -> name.py           (managed target)
//! ```
//!
//! Both engines implement [`traverse::Lowering`], so expression
//! parenthesization and statement dispatch are shared. Generation is
//! all-or-nothing: the first [`CodegenError`] aborts it and no artifact is
//! returned.

pub mod c;
mod error;
pub mod naming;
pub mod py;
pub mod traverse;
pub mod writer;

use std::path::Path;

use fuse_ir::{HierarchyError, Program};

pub use c::CCodegen;
pub use error::{CodegenError, Result};
pub use py::PyCodegen;

/// One generated file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Artifact {
    /// File name without directory.
    pub file_name: String,
    pub contents: String,
}

/// Settings shared by every target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Prefix for every generated type and function name.
    pub namespace: String,
    /// Output file name; the extension is replaced per artifact.
    pub output: String,
}

impl CodegenOptions {
    pub fn new(output: impl Into<String>) -> Self {
        CodegenOptions {
            namespace: String::new(),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Output file name with its extension replaced by `extension`.
    pub fn file_name(&self, extension: &str) -> String {
        let path = Path::new(&self.output).with_extension(extension);
        path.file_name()
            .map_or_else(|| format!("out.{extension}"), |name| name.to_string_lossy().into_owned())
    }
}

/// Output language.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    C,
    Python,
}

impl Target {
    /// Parse a target name as given on the command line.
    pub fn from_name(name: &str) -> Option<Target> {
        match name {
            "c" => Some(Target::C),
            "py" | "python" => Some(Target::Python),
            _ => None,
        }
    }

    pub fn generate(self, program: &Program, options: &CodegenOptions) -> Result<Vec<Artifact>> {
        match self {
            Target::C => generate_c(program, options),
            Target::Python => generate_py(program, options),
        }
    }
}

/// Generate `name.h` and `name.c`.
pub fn generate_c(program: &Program, options: &CodegenOptions) -> Result<Vec<Artifact>> {
    check_hierarchy(program)?;
    CCodegen::new(program, options).generate()
}

/// Generate `name.py`.
pub fn generate_py(program: &Program, options: &CodegenOptions) -> Result<Vec<Artifact>> {
    check_hierarchy(program)?;
    PyCodegen::new(program, options).generate()
}

fn check_hierarchy(program: &Program) -> Result<()> {
    program.check_hierarchy().map_err(|err| {
        let class = match err {
            HierarchyError::Cycle { class } | HierarchyError::UnknownBase { class } => class,
        };
        tracing::debug!(%err, "rejecting class hierarchy");
        CodegenError::CircularDependency {
            class: program.class(class).name.clone(),
        }
    })
}
