//! Front-end error diagnostics.
//!
//! Every variant carries the 1-based source line it was detected on
//! (`line: 0` when the host supplied no line information), so hosts can
//! point back at the offending statement.

use thiserror::Error;

use vecpy_core::CoreError;

/// Errors detected while lowering an AST to a kernel. All are fatal to the
/// compile.
#[derive(Debug, Error)]
pub enum FrontEndError {
    /// A node kind or node shape outside the supported set.
    #[error("line {line}: unsupported syntax: {what}")]
    UnsupportedSyntax { what: String, line: u32 },

    /// A name was read before any assignment and is not an argument.
    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable { name: String, line: u32 },

    /// `return` of a name that is not a kernel argument.
    #[error("line {line}: cannot return '{name}': not an argument")]
    ReturnNotArgument { name: String, line: u32 },

    /// More than one docstring expression.
    #[error("line {line}: duplicate docstring")]
    DuplicateDocstring { line: u32 },

    /// The function carries decorators, which have no kernel meaning.
    #[error("function '{name}' has decorators, which are not supported")]
    DecoratorNotSupported { name: String },

    /// A mask was supplied where a numeric value is required, or vice versa.
    #[error("line {line}: operator '{op}' requires {expected} operands")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        line: u32,
    },

    /// Uniform arguments are broadcast constants and cannot be written.
    #[error("line {line}: cannot assign to uniform '{name}'")]
    AssignToUniform { name: String, line: u32 },

    /// A scalar value was assigned over an array variable or an array was
    /// used as a plain scalar.
    #[error("line {line}: scalar/array mismatch on '{name}'")]
    KindMismatch { name: String, line: u32 },

    /// Subscript of a variable without a stride annotation.
    #[error("line {line}: '{name}' has stride 1 and cannot be subscripted")]
    NotSubscriptable { name: String, line: u32 },

    /// A call to a function outside the intrinsic and math tables.
    #[error("line {line}: unknown function '{name}'")]
    UnknownFunction { name: String, line: u32 },

    /// An attribute other than the supported math constants.
    #[error("line {line}: unknown attribute '{name}'")]
    UnknownAttribute { name: String, line: u32 },

    /// The function cannot be compiled as an elementwise kernel at all.
    #[error("invalid kernel: {reason}")]
    InvalidKernel { reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
