//! Intermediate representation for elementwise SIMD kernels.
//!
//! The front end lowers a restricted scripting-language function into a
//! [`Kernel`]: a variable table plus a block tree of flat, predicated
//! statements. The back ends walk the same kernel twice to emit a scalar
//! reference stream and a vectorized stream.

pub mod error;
pub mod id;
pub mod kernel;
pub mod ops;
pub mod stmt;
pub mod variable;

// Re-export commonly used types
pub use error::CoreError;
pub use id::VarId;
pub use kernel::{ArgFilter, Kernel, VarFilter, DEFAULT_DOCSTRING};
pub use ops::{BinOp, CmpOp, UnOp};
pub use stmt::{AccessMode, Block, Expr, Statement};
pub use variable::{LitValue, Role, VarKind, Variable};
