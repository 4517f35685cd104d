//! Core error types for the IR data model.

use thiserror::Error;

/// Errors produced while building a kernel's variable table.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Registering an argument whose name is already an argument.
    #[error("duplicate argument: '{name}'")]
    DuplicateArgument { name: String },

    /// Arguments carry numeric values per element; a mask cannot be one.
    #[error("argument '{name}' cannot be a mask")]
    MaskArgument { name: String },
}
