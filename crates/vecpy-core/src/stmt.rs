//! Expressions, statements, and blocks.
//!
//! The kernel body is a tree: blocks own statements, `IfElse`/`While`
//! statements own their child blocks, and expressions reference variables by
//! [`VarId`]. Every block carries exactly one predicate mask; the root
//! block's mask is the `MASK_TRUE` sentinel.

use serde::{Deserialize, Serialize};

use crate::id::VarId;
use crate::ops::{BinOp, CmpOp, UnOp};

/// Whether a subscript loads or stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
}

/// The right-hand side of an assignment.
///
/// Operands are always variables: the front end materializes nested
/// subexpressions into temporaries before building an `Expr`, so emission is
/// a flat walk with no recursion into operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    VarRef(VarId),
    Bin { left: VarId, op: BinOp, right: VarId },
    Unary { op: UnOp, operand: VarId },
    Cmp { left: VarId, op: CmpOp, right: VarId },
    /// Subscript access on a stride-k argument. For writes, the enclosing
    /// assignment's destination holds the value to store and the emitters
    /// print `array[index] = dst`.
    ArrayAccess {
        array: VarId,
        index: VarId,
        mode: AccessMode,
    },
}

/// One kernel statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Source-line annotation, echoed into the generated code.
    Comment(String),
    Assign {
        dst: VarId,
        expr: Expr,
        /// `true` for mask bookkeeping and masked writes. The scalar emitter
        /// reduces these (plain copy for a `VarRef`, left operand for a mask
        /// combine); the vector emitter expands `VarRef` forms into blends.
        vector_only: bool,
        /// The governing block mask, present on `vector_only` writes.
        mask: Option<VarId>,
    },
    IfElse {
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        body: Block,
    },
}

/// An ordered statement list predicated by a mask variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub mask: VarId,
    pub stmts: Vec<Statement>,
}

impl Block {
    pub fn new(mask: VarId) -> Self {
        Block {
            mask,
            stmts: Vec::new(),
        }
    }

    pub fn push(&mut self, stmt: Statement) {
        self.stmts.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}
