//! Operator vocabulary for kernel expressions.
//!
//! Three enums cover everything a kernel body can compute:
//! - [`BinOp`]: arithmetic, bitwise, boolean, and two-argument math-library
//!   operators.
//! - [`UnOp`]: negation-free unary operators (unary minus is lowered to
//!   `0 - x` by the front end) and one-argument math-library functions.
//! - [`CmpOp`]: comparisons, which always produce a mask.
//!
//! Back ends match these enums exhaustively, so adding an operator here
//! surfaces every translator that has not decided how to emit it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    /// Floor division. Emitted as div + floor for floats, native `/` for
    /// integers.
    FloorDiv,
    Rem,
    Pow,
    // Bitwise
    BitAnd,
    /// `!a & b` in one operation. Used for else-branch mask synthesis and
    /// mapped to the native andnot intrinsics on SIMD targets.
    BitAndNot,
    BitOr,
    BitXor,
    Shl,
    Shr,
    // Boolean (mask-valued operands and result)
    BoolAnd,
    BoolOr,
    // Intrinsics and two-argument math functions
    Max,
    Min,
    Atan2,
    Copysign,
    Fmod,
    Hypot,
}

impl BinOp {
    /// `true` for operators whose operands and result are masks.
    pub fn is_mask_op(self) -> bool {
        matches!(self, BinOp::BoolAnd | BinOp::BoolOr)
    }

    /// `true` for the mask-combining operators the front end synthesizes for
    /// control flow (`BoolAnd` for then/loop masks, `BitAndNot` for else
    /// masks). The scalar emitter reduces `vector_only` assignments of these
    /// to a copy of the left operand.
    pub fn combines_masks(self) -> bool {
        matches!(self, BinOp::BoolAnd | BinOp::BoolOr | BinOp::BitAndNot)
    }

    /// C operator token, for the operators that have one.
    pub fn token(self) -> Option<&'static str> {
        Some(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BoolAnd => "&&",
            BinOp::BoolOr => "||",
            _ => return None,
        })
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitAndNot => "&~",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BoolAnd => "and",
            BinOp::BoolOr => "or",
            BinOp::Max => "max",
            BinOp::Min => "min",
            BinOp::Atan2 => "atan2",
            BinOp::Copysign => "copysign",
            BinOp::Fmod => "fmod",
            BinOp::Hypot => "hypot",
        };
        f.write_str(text)
    }
}

/// Unary operators and one-argument math-library functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    /// Bitwise complement; integer datatypes only.
    BitNot,
    /// Logical complement; masks only.
    BoolNot,
    Abs,
    Round,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Ceil,
    Cos,
    Cosh,
    Erf,
    Erfc,
    Exp,
    Expm1,
    Fabs,
    Floor,
    Gamma,
    Lgamma,
    Log,
    Log10,
    Log1p,
    Log2,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    Trunc,
}

impl UnOp {
    /// `true` for operators whose operand and result are masks.
    pub fn is_mask_op(self) -> bool {
        matches!(self, UnOp::BoolNot)
    }

    /// C math-library function name, for the function-like operators.
    /// `Gamma` maps to `tgamma` and `Abs` on floats is rewritten to `fabs`
    /// by the emitters; neither rewrite belongs here.
    pub fn function_name(self) -> Option<&'static str> {
        Some(match self {
            UnOp::BitNot | UnOp::BoolNot => return None,
            UnOp::Abs => "abs",
            UnOp::Round => "round",
            UnOp::Acos => "acos",
            UnOp::Acosh => "acosh",
            UnOp::Asin => "asin",
            UnOp::Asinh => "asinh",
            UnOp::Atan => "atan",
            UnOp::Atanh => "atanh",
            UnOp::Ceil => "ceil",
            UnOp::Cos => "cos",
            UnOp::Cosh => "cosh",
            UnOp::Erf => "erf",
            UnOp::Erfc => "erfc",
            UnOp::Exp => "exp",
            UnOp::Expm1 => "expm1",
            UnOp::Fabs => "fabs",
            UnOp::Floor => "floor",
            UnOp::Gamma => "gamma",
            UnOp::Lgamma => "lgamma",
            UnOp::Log => "log",
            UnOp::Log10 => "log10",
            UnOp::Log1p => "log1p",
            UnOp::Log2 => "log2",
            UnOp::Sin => "sin",
            UnOp::Sinh => "sinh",
            UnOp::Sqrt => "sqrt",
            UnOp::Tan => "tan",
            UnOp::Tanh => "tanh",
            UnOp::Trunc => "trunc",
        })
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::BitNot => f.write_str("~"),
            UnOp::BoolNot => f.write_str("not"),
            other => f.write_str(other.function_name().unwrap_or("?")),
        }
    }
}

/// Comparison operators. All comparisons produce a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// C operator token.
    pub fn token(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
