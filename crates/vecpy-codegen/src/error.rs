//! Codegen error types covering all compilation failure modes.

use thiserror::Error;

use vecpy_front::FrontEndError;

/// Errors raised while emitting code for a lowered kernel.
#[derive(Debug, Error)]
pub enum BackEndError {
    /// The operator has no emission path for the chosen (arch, dtype) pair.
    #[error("operator '{op}' is not implemented for {arch}/{dtype}")]
    UnsupportedOp {
        op: String,
        arch: &'static str,
        dtype: &'static str,
    },

    /// A literal value cannot be represented in the kernel datatype.
    #[error("literal {value} cannot be represented as {dtype}")]
    InvalidLiteral { value: f64, dtype: &'static str },
}

/// Configuration errors, raised before any code is generated.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The architecture is recognized but has no translators.
    #[error("architecture {arch} is not supported for code generation")]
    UnsupportedArchitecture { arch: &'static str },

    /// An empty binding set would produce an unusable library.
    #[error("no language bindings requested")]
    NoBindings,

    /// Thread counts must be positive.
    #[error("thread count must be positive")]
    InvalidThreads,
}

/// Any failure of the full pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FrontEnd(#[from] FrontEndError),

    #[error(transparent)]
    BackEnd(#[from] BackEndError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
