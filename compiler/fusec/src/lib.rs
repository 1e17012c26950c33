//! Fuse driver.
//!
//! Reads a checked program serialized as JSON, runs one code generator and
//! writes its artifacts next to the output path:
//!
//! ```text
//! fusec <c|py> <program.json> [-o <output>] [--namespace=<Prefix>]
//! ```
//!
//! Nothing is written unless generation succeeds for the whole program.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

use fuse_codegen::{Artifact, CodegenError, CodegenOptions, Target};
use fuse_ir::Program;
use tracing::{debug, info};

pub const USAGE: &str = "Usage: fusec <c|py> <program.json> [-o <output>] [--namespace=<Prefix>]";

/// Driver failure, reported as `error: ...`.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}\n{USAGE}")]
    Usage(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid program in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Args {
    pub target: Target,
    pub input: PathBuf,
    /// Defaults to the input path; only its directory and stem matter.
    pub output: PathBuf,
    pub namespace: String,
}

impl Args {
    /// Parse arguments following the program name.
    pub fn parse(args: &[String]) -> Result<Args, DriverError> {
        let mut target = None;
        let mut input = None;
        let mut output = None;
        let mut namespace = String::new();

        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg == "-o" {
                let Some(path) = args.get(i + 1) else {
                    return Err(DriverError::Usage("missing path after -o".to_string()));
                };
                output = Some(PathBuf::from(path));
                i += 2;
                continue;
            }
            if let Some(prefix) = arg.strip_prefix("--namespace=") {
                namespace = prefix.to_string();
            } else if arg.starts_with('-') {
                return Err(DriverError::Usage(format!("unknown option {arg}")));
            } else if target.is_none() {
                target = Some(
                    Target::from_name(arg)
                        .ok_or_else(|| DriverError::Usage(format!("unknown target {arg}")))?,
                );
            } else if input.is_none() {
                input = Some(PathBuf::from(arg));
            } else {
                return Err(DriverError::Usage(format!("unexpected argument {arg}")));
            }
            i += 1;
        }

        let target = target.ok_or_else(|| DriverError::Usage("missing target".to_string()))?;
        let input = input.ok_or_else(|| DriverError::Usage("missing program".to_string()))?;
        Ok(Args {
            target,
            output: output.unwrap_or_else(|| input.clone()),
            input,
            namespace,
        })
    }

    fn options(&self) -> CodegenOptions {
        CodegenOptions::new(self.output.to_string_lossy()).with_namespace(self.namespace.clone())
    }
}

/// Load a program from its JSON form.
pub fn load_program(path: &Path) -> Result<Program, DriverError> {
    let text = fs::read_to_string(path).map_err(|source| DriverError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DriverError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Generate the artifacts for `args` without touching the file system.
pub fn generate(program: &Program, args: &Args) -> Result<Vec<Artifact>, DriverError> {
    Ok(args.target.generate(program, &args.options())?)
}

/// Directory the artifacts of `output` land in.
fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load, generate and write. Returns the paths written.
pub fn run(args: &Args) -> Result<Vec<PathBuf>, DriverError> {
    let program = load_program(&args.input)?;
    debug!(
        classes = program.classes.len(),
        methods = program.methods.len(),
        "program loaded"
    );
    let artifacts = generate(&program, args)?;

    let dir = output_dir(&args.output);
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(&artifact.file_name);
        fs::write(&path, artifact.contents).map_err(|source| DriverError::Write {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote");
        written.push(path);
    }
    Ok(written)
}

static TRACING_INIT: Once = Once::new();

/// Install a `fmt` subscriber when `RUST_LOG` is set. Safe to call twice.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
