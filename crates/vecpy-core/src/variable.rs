//! Kernel variables and literal values.
//!
//! A [`Variable`] is the unit the IR computes with: kernel arguments,
//! temporaries introduced while lowering expressions, deduplicated numeric
//! literals, and the two mask sentinels. Identity is the per-kernel
//! [`VarId`](crate::id::VarId); the name is what the emitters print.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::VarId;

/// Why a variable exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A kernel parameter.
    Argument,
    /// A named local or a generated temporary.
    Temporary,
    /// A deduplicated numeric constant.
    Literal,
    /// One of the `MASK_TRUE` / `MASK_FALSE` sentinels. Mask variables never
    /// carry numeric values; the sentinels are the only literal-like masks.
    MaskLiteral,
}

/// What a variable holds per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    /// One numeric value per element.
    Scalar,
    /// A per-lane boolean.
    Mask,
    /// A single scalar broadcast across all elements; never written.
    Uniform,
    /// An array argument whose logical element spans `stride` consecutive
    /// storage elements; accessed only through subscripts.
    Array { stride: u32 },
}

/// A numeric literal value.
///
/// Stored as `f64` regardless of the kernel datatype so that integer and
/// float spellings of the same number compare equal and deduplicate to one
/// variable (`0` and `0.0` share a literal). Narrowing to the target type
/// happens at emission. `-0.0` is canonicalized to `0.0` at construction so
/// keying by bits matches numeric equality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LitValue(f64);

impl LitValue {
    pub fn new(value: f64) -> Self {
        // Fold the two zero representations together.
        if value == 0.0 {
            LitValue(0.0)
        } else {
            LitValue(value)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Deduplication key. Literals never hold NaN (the front end only folds
    /// finite constants), so bit equality on the canonical form is numeric
    /// equality.
    pub fn key(self) -> u64 {
        self.0.to_bits()
    }

    /// The value as a 32-bit unsigned integer, when it is one.
    pub fn as_u32(self) -> Option<u32> {
        if self.0.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&self.0) {
            Some(self.0 as u32)
        } else {
            None
        }
    }
}

impl PartialEq for LitValue {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for LitValue {}

impl PartialOrd for LitValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LitValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for LitValue {
    fn from(value: f64) -> Self {
        LitValue::new(value)
    }
}

impl fmt::Display for LitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A kernel variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    /// Creation-order identity within the kernel.
    pub id: VarId,
    /// Name used in emitted code. Explicit for arguments and named locals,
    /// generated with a `var`/`lit`/`mask` prefix otherwise.
    pub name: String,
    pub role: Role,
    pub kind: VarKind,
    /// Present iff `role == Literal`.
    pub value: Option<LitValue>,
    /// The argument is read by the kernel body. Meaningful for arguments.
    pub input: bool,
    /// The argument is written by the kernel body. Meaningful for arguments.
    pub output: bool,
}

impl Variable {
    pub fn is_mask(&self) -> bool {
        matches!(self.kind, VarKind::Mask)
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self.kind, VarKind::Uniform)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, VarKind::Array { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.role, Role::Literal)
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.role, Role::Argument)
    }

    /// Storage elements per logical element: the array stride, or 1.
    pub fn stride(&self) -> u32 {
        match self.kind {
            VarKind::Array { stride } => stride,
            _ => 1,
        }
    }
}
