//! Lowering: AST -> kernel IR.
//!
//! The lowerer walks the function body once, materializing every
//! subexpression into a kernel variable and flattening control flow into
//! mask-predicated blocks:
//!
//! - each source statement is preceded by a `Comment` carrying its rendered
//!   source line;
//! - user assignments become a plain expression evaluation into a temporary
//!   followed by a `vector_only` copy into the target, carrying the current
//!   block mask (the vector emitter turns the copy into a blend, the scalar
//!   emitter into a plain assignment);
//! - `if`/`while` synthesize child-block masks from the condition and the
//!   parent mask, also as `vector_only` assignments;
//! - `while` re-emits its condition computation at the end of the body so
//!   the loop mask is refreshed each iteration even when the body modifies
//!   the condition's inputs.

use smallvec::SmallVec;
use tracing::debug;

use vecpy_core::{
    AccessMode, BinOp, Block, Expr, Kernel, LitValue, Statement, UnOp, VarId, VarKind,
};

use crate::ast::{
    AstBinOp, AstBoolOp, AstCmpOp, AstExpr, AstStmt, AstUnaryOp, FunctionDef, Param,
    ParamAnnotation,
};
use crate::error::FrontEndError;

/// Lower a function AST to a kernel.
pub fn lower(func: &FunctionDef) -> Result<Kernel, FrontEndError> {
    debug!(name = %func.name, params = func.params.len(), "lowering kernel");
    let mut lowerer = Lowerer {
        kernel: Kernel::new(&func.name),
        docstring_set: false,
    };
    lowerer.register_arguments(&func.params)?;
    if !func.decorators.is_empty() {
        return Err(FrontEndError::DecoratorNotSupported {
            name: func.name.clone(),
        });
    }
    let mask = lowerer.kernel.mask_true();
    let root = lowerer.lower_block(&func.body, mask, true)?;
    lowerer.kernel.root = root;
    debug!(name = %func.name, "lowered kernel");
    Ok(lowerer.kernel)
}

struct Lowerer {
    kernel: Kernel,
    docstring_set: bool,
}

impl Lowerer {
    // -----------------------------------------------------------------------
    // Arguments
    // -----------------------------------------------------------------------

    fn register_arguments(&mut self, params: &[Param]) -> Result<(), FrontEndError> {
        for param in params {
            let kind = match &param.annotation {
                None => VarKind::Scalar,
                Some(ParamAnnotation::Stride(1)) => VarKind::Scalar,
                Some(ParamAnnotation::Stride(stride)) if *stride >= 2 => {
                    VarKind::Array { stride: *stride }
                }
                Some(ParamAnnotation::Stride(_)) => {
                    return Err(FrontEndError::InvalidKernel {
                        reason: format!("argument '{}' has a zero stride", param.name),
                    })
                }
                Some(ParamAnnotation::Keyword(keyword)) if keyword == "uniform" => {
                    VarKind::Uniform
                }
                Some(ParamAnnotation::Keyword(keyword)) => {
                    return Err(FrontEndError::InvalidKernel {
                        reason: format!(
                            "argument '{}' has unknown annotation '{}'",
                            param.name, keyword
                        ),
                    })
                }
            };
            self.kernel.add_argument(&param.name, kind)?;
        }
        let elementwise = self.kernel.arguments(vecpy_core::ArgFilter {
            uniform: Some(false),
            array: Some(false),
            ..Default::default()
        });
        if elementwise.is_empty() {
            return Err(FrontEndError::InvalidKernel {
                reason: "kernel needs at least one elementwise argument".into(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn lower_block(
        &mut self,
        stmts: &[AstStmt],
        mask: VarId,
        in_root: bool,
    ) -> Result<Block, FrontEndError> {
        let mut block = Block::new(mask);
        for stmt in stmts {
            self.lower_stmt(stmt, &mut block, in_root)?;
        }
        Ok(block)
    }

    fn lower_stmt(
        &mut self,
        stmt: &AstStmt,
        block: &mut Block,
        in_root: bool,
    ) -> Result<(), FrontEndError> {
        let line = stmt.line();

        // Docstrings produce no code and no comment.
        if let AstStmt::Expr {
            value: AstExpr::Str { value },
            ..
        } = stmt
        {
            if !in_root {
                return Err(FrontEndError::UnsupportedSyntax {
                    what: "docstring inside control flow".into(),
                    line,
                });
            }
            if self.docstring_set {
                return Err(FrontEndError::DuplicateDocstring { line });
            }
            self.kernel.set_docstring(value.clone());
            self.docstring_set = true;
            return Ok(());
        }

        block.push(Statement::Comment(stmt.render()));

        match stmt {
            AstStmt::Assign { targets, value, .. } => {
                self.lower_assign(targets, value, block, line)
            }
            AstStmt::AugAssign {
                target, op, value, ..
            } => {
                // x op= e  ==  x = x op e
                let desugared = AstExpr::BinOp {
                    left: Box::new(target.clone()),
                    op: *op,
                    right: Box::new(value.clone()),
                };
                self.lower_assign(std::slice::from_ref(target), &desugared, block, line)
            }
            AstStmt::If {
                test, body, orelse, ..
            } => self.lower_if(test, body, orelse, block, line),
            AstStmt::While { test, body, .. } => self.lower_while(test, body, block, line),
            AstStmt::Return { value, .. } => self.lower_return(value.as_ref(), in_root, line),
            AstStmt::Pass { .. } => Ok(()),
            AstStmt::Expr { value, .. } => Err(FrontEndError::UnsupportedSyntax {
                what: format!("expression statement '{}'", value.render()),
                line,
            }),
        }
    }

    fn lower_assign(
        &mut self,
        targets: &[AstExpr],
        value: &AstExpr,
        block: &mut Block,
        line: u32,
    ) -> Result<(), FrontEndError> {
        // Tuple unpacking: every subexpression lands in a temporary before
        // any target is written, so `a, b = b, a` reads consistent values.
        if let [AstExpr::Tuple { elts: target_elts }] = targets {
            let AstExpr::Tuple { elts: value_elts } = value else {
                return Err(FrontEndError::UnsupportedSyntax {
                    what: "tuple target needs a tuple value".into(),
                    line,
                });
            };
            if target_elts.len() != value_elts.len() {
                return Err(FrontEndError::UnsupportedSyntax {
                    what: format!(
                        "cannot unpack {} values into {} targets",
                        value_elts.len(),
                        target_elts.len()
                    ),
                    line,
                });
            }
            let mut temps: SmallVec<[VarId; 4]> = SmallVec::new();
            for elt in value_elts {
                let value_var = self.lower_expr(elt, block, line)?;
                let kind = if self.kernel.var(value_var).is_mask() {
                    VarKind::Mask
                } else {
                    VarKind::Scalar
                };
                let temp = self.kernel.add_temp(kind);
                block.push(Statement::Assign {
                    dst: temp,
                    expr: Expr::VarRef(value_var),
                    vector_only: false,
                    mask: None,
                });
                temps.push(temp);
            }
            for (target, temp) in target_elts.iter().zip(temps) {
                self.write_target(target, temp, block, line)?;
            }
            return Ok(());
        }

        // Multi-target assignment evaluates the right-hand side once.
        let value_var = self.lower_expr(value, block, line)?;
        for target in targets {
            self.write_target(target, value_var, block, line)?;
        }
        Ok(())
    }

    /// Write a value variable into an assignment target.
    fn write_target(
        &mut self,
        target: &AstExpr,
        value_var: VarId,
        block: &mut Block,
        line: u32,
    ) -> Result<(), FrontEndError> {
        match target {
            AstExpr::Name { id } => {
                let value_is_mask = self.kernel.var(value_var).is_mask();
                let dst = match self.kernel.get_variable(id) {
                    Some(var) => {
                        if var.is_uniform() {
                            return Err(FrontEndError::AssignToUniform {
                                name: id.clone(),
                                line,
                            });
                        }
                        if var.is_array() {
                            return Err(FrontEndError::KindMismatch {
                                name: id.clone(),
                                line,
                            });
                        }
                        if var.is_mask() != value_is_mask {
                            return Err(FrontEndError::TypeMismatch {
                                op: "=".into(),
                                expected: if var.is_mask() { "mask" } else { "numeric" },
                                line,
                            });
                        }
                        let dst = var.id;
                        if var.is_argument() {
                            self.kernel.mark_output(dst);
                        }
                        dst
                    }
                    None => {
                        let kind = if value_is_mask {
                            VarKind::Mask
                        } else {
                            VarKind::Scalar
                        };
                        self.kernel.add_named(id, kind)
                    }
                };
                block.push(Statement::Assign {
                    dst,
                    expr: Expr::VarRef(value_var),
                    vector_only: true,
                    mask: Some(block.mask),
                });
                Ok(())
            }
            AstExpr::Subscript { value: base, index } => {
                let array = self.subscript_base(base, line)?;
                self.require_numeric(value_var, "[]=", line)?;
                let index_var = self.lower_expr(index, block, line)?;
                self.require_numeric(index_var, "[]", line)?;
                // The array pointer must be materialized in the loop body
                // even when the argument is only written.
                self.kernel.mark_input(array);
                self.kernel.mark_output(array);
                block.push(Statement::Assign {
                    dst: value_var,
                    expr: Expr::ArrayAccess {
                        array,
                        index: index_var,
                        mode: AccessMode::Write,
                    },
                    vector_only: false,
                    mask: None,
                });
                Ok(())
            }
            other => Err(FrontEndError::UnsupportedSyntax {
                what: format!("assignment target '{}'", other.render()),
                line,
            }),
        }
    }

    fn lower_if(
        &mut self,
        test: &AstExpr,
        body: &[AstStmt],
        orelse: &[AstStmt],
        block: &mut Block,
        line: u32,
    ) -> Result<(), FrontEndError> {
        let cond = self.lower_expr(test, block, line)?;
        self.require_mask(cond, "if", line)?;

        // then_mask = cond AND parent; the scalar stream reduces this to
        // `then_mask = cond` because the parent is enforced by the enclosing
        // branch.
        let then_mask = self.kernel.add_temp(VarKind::Mask);
        block.push(Statement::Assign {
            dst: then_mask,
            expr: Expr::Bin {
                left: cond,
                op: BinOp::BoolAnd,
                right: block.mask,
            },
            vector_only: true,
            mask: None,
        });

        let else_mask = if orelse.is_empty() {
            None
        } else {
            // else_mask = (NOT cond) AND parent, as a single andnot.
            let else_mask = self.kernel.add_temp(VarKind::Mask);
            block.push(Statement::Assign {
                dst: else_mask,
                expr: Expr::Bin {
                    left: cond,
                    op: BinOp::BitAndNot,
                    right: block.mask,
                },
                vector_only: true,
                mask: None,
            });
            Some(else_mask)
        };

        let then_block = self.lower_block(body, then_mask, false)?;
        let else_block = match else_mask {
            Some(mask) => Some(self.lower_block(orelse, mask, false)?),
            None => None,
        };
        block.push(Statement::IfElse {
            then_block,
            else_block,
        });
        Ok(())
    }

    fn lower_while(
        &mut self,
        test: &AstExpr,
        body: &[AstStmt],
        block: &mut Block,
        line: u32,
    ) -> Result<(), FrontEndError> {
        // Everything from here on is the condition computation; it is cloned
        // to the end of the loop body so the mask refreshes each iteration.
        let mark = block.stmts.len();
        let cond = self.lower_expr(test, block, line)?;
        self.require_mask(cond, "while", line)?;
        let loop_mask = self.kernel.add_temp(VarKind::Mask);
        block.push(Statement::Assign {
            dst: loop_mask,
            expr: Expr::Bin {
                left: cond,
                op: BinOp::BoolAnd,
                right: block.mask,
            },
            vector_only: true,
            mask: None,
        });
        let condition_stmts: Vec<Statement> = block.stmts[mark..].to_vec();

        let mut body_block = self.lower_block(body, loop_mask, false)?;
        body_block.stmts.extend(condition_stmts);
        block.push(Statement::While { body: body_block });
        Ok(())
    }

    fn lower_return(
        &mut self,
        value: Option<&AstExpr>,
        in_root: bool,
        line: u32,
    ) -> Result<(), FrontEndError> {
        if !in_root {
            return Err(FrontEndError::UnsupportedSyntax {
                what: "return inside control flow".into(),
                line,
            });
        }
        let Some(value) = value else {
            return Ok(());
        };
        let names: SmallVec<[&AstExpr; 4]> = match value {
            AstExpr::Tuple { elts } => elts.iter().collect(),
            single => SmallVec::from_elem(single, 1),
        };
        for expr in names {
            let AstExpr::Name { id } = expr else {
                return Err(FrontEndError::ReturnNotArgument {
                    name: expr.render(),
                    line,
                });
            };
            let is_argument = self
                .kernel
                .get_variable(id)
                .is_some_and(|var| var.is_argument());
            if !is_argument {
                return Err(FrontEndError::ReturnNotArgument {
                    name: id.clone(),
                    line,
                });
            }
        }
        // Outputs are identified by the written flag; return produces no IR.
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Lower an expression, returning the variable holding its value.
    fn lower_expr(
        &mut self,
        expr: &AstExpr,
        block: &mut Block,
        line: u32,
    ) -> Result<VarId, FrontEndError> {
        match expr {
            AstExpr::Num { value } => Ok(self.kernel.add_literal(LitValue::new(*value))),
            AstExpr::Name { id } => {
                let Some(var) = self.kernel.get_variable(id) else {
                    return Err(FrontEndError::UndefinedVariable {
                        name: id.clone(),
                        line,
                    });
                };
                if var.is_array() {
                    // Arrays are only reachable through subscripts.
                    return Err(FrontEndError::KindMismatch {
                        name: id.clone(),
                        line,
                    });
                }
                let id = var.id;
                if var.is_argument() {
                    self.kernel.mark_input(id);
                }
                Ok(id)
            }
            AstExpr::BinOp { left, op, right } => {
                let left = self.lower_expr(left, block, line)?;
                let right = self.lower_expr(right, block, line)?;
                let op = bin_op(*op);
                self.require_numeric(left, &op.to_string(), line)?;
                self.require_numeric(right, &op.to_string(), line)?;
                Ok(self.push_bin(block, op, left, right, VarKind::Scalar))
            }
            AstExpr::UnaryOp { op, operand } => self.lower_unary(*op, operand, block, line),
            AstExpr::Compare { left, op, right } => {
                let left = self.lower_expr(left, block, line)?;
                let right = self.lower_expr(right, block, line)?;
                let op = cmp_op(*op);
                self.require_numeric(left, op.token(), line)?;
                self.require_numeric(right, op.token(), line)?;
                let dst = self.kernel.add_temp(VarKind::Mask);
                block.push(Statement::Assign {
                    dst,
                    expr: Expr::Cmp { left, op, right },
                    vector_only: false,
                    mask: None,
                });
                Ok(dst)
            }
            AstExpr::BoolOp { op, values } => {
                let op = match op {
                    AstBoolOp::And => BinOp::BoolAnd,
                    AstBoolOp::Or => BinOp::BoolOr,
                };
                let mut iter = values.iter();
                let Some(first) = iter.next() else {
                    return Err(FrontEndError::UnsupportedSyntax {
                        what: "empty boolean expression".into(),
                        line,
                    });
                };
                let mut acc = self.lower_expr(first, block, line)?;
                self.require_mask(acc, &op.to_string(), line)?;
                for value in iter {
                    let rhs = self.lower_expr(value, block, line)?;
                    self.require_mask(rhs, &op.to_string(), line)?;
                    acc = self.push_bin(block, op, acc, rhs, VarKind::Mask);
                }
                Ok(acc)
            }
            AstExpr::Call { func, args } => self.lower_call(func, args, block, line),
            AstExpr::Attribute { value, attr } => self.lower_attribute(value, attr, line),
            AstExpr::Subscript { value, index } => {
                let array = self.subscript_base(value, line)?;
                self.kernel.mark_input(array);
                let index_var = self.lower_expr(index, block, line)?;
                self.require_numeric(index_var, "[]", line)?;
                let dst = self.kernel.add_temp(VarKind::Scalar);
                block.push(Statement::Assign {
                    dst,
                    expr: Expr::ArrayAccess {
                        array,
                        index: index_var,
                        mode: AccessMode::Read,
                    },
                    vector_only: false,
                    mask: None,
                });
                Ok(dst)
            }
            AstExpr::Str { .. } | AstExpr::Tuple { .. } => {
                Err(FrontEndError::UnsupportedSyntax {
                    what: format!("expression '{}'", expr.render()),
                    line,
                })
            }
        }
    }

    fn lower_unary(
        &mut self,
        op: AstUnaryOp,
        operand: &AstExpr,
        block: &mut Block,
        line: u32,
    ) -> Result<VarId, FrontEndError> {
        match op {
            AstUnaryOp::Pos => self.lower_expr(operand, block, line),
            AstUnaryOp::Neg => {
                // Negated literals fold; everything else is 0 - x.
                if let AstExpr::Num { value } = operand {
                    return Ok(self.kernel.add_literal(LitValue::new(-value)));
                }
                let operand = self.lower_expr(operand, block, line)?;
                self.require_numeric(operand, "-", line)?;
                let zero = self.kernel.add_literal(LitValue::new(0.0));
                Ok(self.push_bin(block, BinOp::Sub, zero, operand, VarKind::Scalar))
            }
            AstUnaryOp::Invert => {
                let operand = self.lower_expr(operand, block, line)?;
                self.require_numeric(operand, "~", line)?;
                let dst = self.kernel.add_temp(VarKind::Scalar);
                block.push(Statement::Assign {
                    dst,
                    expr: Expr::Unary {
                        op: UnOp::BitNot,
                        operand,
                    },
                    vector_only: false,
                    mask: None,
                });
                Ok(dst)
            }
            AstUnaryOp::Not => {
                let operand = self.lower_expr(operand, block, line)?;
                self.require_mask(operand, "not", line)?;
                let dst = self.kernel.add_temp(VarKind::Mask);
                block.push(Statement::Assign {
                    dst,
                    expr: Expr::Unary {
                        op: UnOp::BoolNot,
                        operand,
                    },
                    vector_only: false,
                    mask: None,
                });
                Ok(dst)
            }
        }
    }

    fn lower_call(
        &mut self,
        func: &AstExpr,
        args: &[AstExpr],
        block: &mut Block,
        line: u32,
    ) -> Result<VarId, FrontEndError> {
        let name = match func {
            AstExpr::Name { id } => id.as_str(),
            AstExpr::Attribute { value, attr } => {
                if !matches!(&**value, AstExpr::Name { id } if id == "math") {
                    return Err(FrontEndError::UnknownFunction {
                        name: func.render(),
                        line,
                    });
                }
                attr.as_str()
            }
            other => {
                return Err(FrontEndError::UnsupportedSyntax {
                    what: format!("call of '{}'", other.render()),
                    line,
                })
            }
        };

        // Conversions and two-argument log lower to plain arithmetic.
        match (name, args) {
            ("degrees", [arg]) => {
                let value = self.lower_expr(arg, block, line)?;
                self.require_numeric(value, name, line)?;
                let factor = self
                    .kernel
                    .add_literal(LitValue::new(180.0 / std::f64::consts::PI));
                return Ok(self.push_bin(block, BinOp::Mul, value, factor, VarKind::Scalar));
            }
            ("radians", [arg]) => {
                let value = self.lower_expr(arg, block, line)?;
                self.require_numeric(value, name, line)?;
                let factor = self
                    .kernel
                    .add_literal(LitValue::new(std::f64::consts::PI / 180.0));
                return Ok(self.push_bin(block, BinOp::Mul, value, factor, VarKind::Scalar));
            }
            ("log", [arg, base]) => {
                // log(x, base) = log(x) / log(base); constant bases are not
                // folded.
                let value = self.lower_expr(arg, block, line)?;
                let base = self.lower_expr(base, block, line)?;
                self.require_numeric(value, name, line)?;
                self.require_numeric(base, name, line)?;
                let log_value = self.push_unary(block, UnOp::Log, value);
                let log_base = self.push_unary(block, UnOp::Log, base);
                return Ok(self.push_bin(block, BinOp::Div, log_value, log_base, VarKind::Scalar));
            }
            _ => {}
        }

        match args {
            [arg] => {
                let Some(op) = unary_function(name) else {
                    return Err(if binary_function(name).is_some() {
                        FrontEndError::UnsupportedSyntax {
                            what: format!("{} expects 2 arguments", name),
                            line,
                        }
                    } else {
                        FrontEndError::UnknownFunction {
                            name: name.into(),
                            line,
                        }
                    });
                };
                let operand = self.lower_expr(arg, block, line)?;
                self.require_numeric(operand, name, line)?;
                Ok(self.push_unary(block, op, operand))
            }
            [left, right] => {
                let Some(op) = binary_function(name) else {
                    return Err(if unary_function(name).is_some() {
                        FrontEndError::UnsupportedSyntax {
                            what: format!("{} expects 1 argument", name),
                            line,
                        }
                    } else {
                        FrontEndError::UnknownFunction {
                            name: name.into(),
                            line,
                        }
                    });
                };
                let left = self.lower_expr(left, block, line)?;
                let right = self.lower_expr(right, block, line)?;
                self.require_numeric(left, name, line)?;
                self.require_numeric(right, name, line)?;
                Ok(self.push_bin(block, op, left, right, VarKind::Scalar))
            }
            _ => Err(FrontEndError::UnsupportedSyntax {
                what: format!("{} with {} arguments", name, args.len()),
                line,
            }),
        }
    }

    fn lower_attribute(
        &mut self,
        base: &AstExpr,
        attr: &str,
        line: u32,
    ) -> Result<VarId, FrontEndError> {
        let known_base = matches!(base, AstExpr::Name { id } if id == "math");
        match attr {
            "pi" if known_base => Ok(self
                .kernel
                .add_literal_suffixed(LitValue::new(std::f64::consts::PI), "PI")),
            "e" if known_base => Ok(self
                .kernel
                .add_literal_suffixed(LitValue::new(std::f64::consts::E), "E")),
            _ => Err(FrontEndError::UnknownAttribute {
                name: format!("{}.{}", base.render(), attr),
                line,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn subscript_base(&self, base: &AstExpr, line: u32) -> Result<VarId, FrontEndError> {
        let AstExpr::Name { id } = base else {
            return Err(FrontEndError::UnsupportedSyntax {
                what: format!("subscript of '{}'", base.render()),
                line,
            });
        };
        let Some(var) = self.kernel.get_variable(id) else {
            return Err(FrontEndError::UndefinedVariable {
                name: id.clone(),
                line,
            });
        };
        if !var.is_array() {
            return Err(FrontEndError::NotSubscriptable {
                name: id.clone(),
                line,
            });
        }
        Ok(var.id)
    }

    fn push_bin(
        &mut self,
        block: &mut Block,
        op: BinOp,
        left: VarId,
        right: VarId,
        kind: VarKind,
    ) -> VarId {
        let dst = self.kernel.add_temp(kind);
        block.push(Statement::Assign {
            dst,
            expr: Expr::Bin { left, op, right },
            vector_only: false,
            mask: None,
        });
        dst
    }

    fn push_unary(&mut self, block: &mut Block, op: UnOp, operand: VarId) -> VarId {
        let dst = self.kernel.add_temp(VarKind::Scalar);
        block.push(Statement::Assign {
            dst,
            expr: Expr::Unary { op, operand },
            vector_only: false,
            mask: None,
        });
        dst
    }

    fn require_numeric(&self, id: VarId, op: &str, line: u32) -> Result<(), FrontEndError> {
        if self.kernel.var(id).is_mask() {
            Err(FrontEndError::TypeMismatch {
                op: op.into(),
                expected: "numeric",
                line,
            })
        } else {
            Ok(())
        }
    }

    fn require_mask(&self, id: VarId, op: &str, line: u32) -> Result<(), FrontEndError> {
        if self.kernel.var(id).is_mask() {
            Ok(())
        } else {
            Err(FrontEndError::TypeMismatch {
                op: op.into(),
                expected: "mask",
                line,
            })
        }
    }
}

fn bin_op(op: AstBinOp) -> BinOp {
    match op {
        AstBinOp::Add => BinOp::Add,
        AstBinOp::Sub => BinOp::Sub,
        AstBinOp::Mul => BinOp::Mul,
        AstBinOp::Div => BinOp::Div,
        AstBinOp::FloorDiv => BinOp::FloorDiv,
        AstBinOp::Mod => BinOp::Rem,
        AstBinOp::Pow => BinOp::Pow,
        AstBinOp::BitAnd => BinOp::BitAnd,
        AstBinOp::BitOr => BinOp::BitOr,
        AstBinOp::BitXor => BinOp::BitXor,
        AstBinOp::Shl => BinOp::Shl,
        AstBinOp::Shr => BinOp::Shr,
    }
}

fn cmp_op(op: AstCmpOp) -> vecpy_core::CmpOp {
    use vecpy_core::CmpOp;
    match op {
        AstCmpOp::Eq => CmpOp::Eq,
        AstCmpOp::Ne => CmpOp::Ne,
        AstCmpOp::Lt => CmpOp::Lt,
        AstCmpOp::Le => CmpOp::Le,
        AstCmpOp::Gt => CmpOp::Gt,
        AstCmpOp::Ge => CmpOp::Ge,
    }
}

/// One-argument intrinsics and math-library functions.
fn unary_function(name: &str) -> Option<UnOp> {
    Some(match name {
        "abs" => UnOp::Abs,
        "round" => UnOp::Round,
        "acos" => UnOp::Acos,
        "acosh" => UnOp::Acosh,
        "asin" => UnOp::Asin,
        "asinh" => UnOp::Asinh,
        "atan" => UnOp::Atan,
        "atanh" => UnOp::Atanh,
        "ceil" => UnOp::Ceil,
        "cos" => UnOp::Cos,
        "cosh" => UnOp::Cosh,
        "erf" => UnOp::Erf,
        "erfc" => UnOp::Erfc,
        "exp" => UnOp::Exp,
        "expm1" => UnOp::Expm1,
        "fabs" => UnOp::Fabs,
        "floor" => UnOp::Floor,
        "gamma" => UnOp::Gamma,
        "lgamma" => UnOp::Lgamma,
        "log" => UnOp::Log,
        "log10" => UnOp::Log10,
        "log1p" => UnOp::Log1p,
        "log2" => UnOp::Log2,
        "sin" => UnOp::Sin,
        "sinh" => UnOp::Sinh,
        "sqrt" => UnOp::Sqrt,
        "tan" => UnOp::Tan,
        "tanh" => UnOp::Tanh,
        "trunc" => UnOp::Trunc,
        _ => return None,
    })
}

/// Two-argument intrinsics and math-library functions.
fn binary_function(name: &str) -> Option<BinOp> {
    Some(match name {
        "max" => BinOp::Max,
        "min" => BinOp::Min,
        "pow" => BinOp::Pow,
        "atan2" => BinOp::Atan2,
        "copysign" => BinOp::Copysign,
        "fmod" => BinOp::Fmod,
        "hypot" => BinOp::Hypot,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use vecpy_core::{ArgFilter, CmpOp};

    use super::*;
    use crate::ast::{AstBoolOp, AstCmpOp};

    fn name(id: &str) -> AstExpr {
        AstExpr::Name { id: id.into() }
    }

    fn num(value: f64) -> AstExpr {
        AstExpr::Num { value }
    }

    fn bin(left: AstExpr, op: AstBinOp, right: AstExpr) -> AstExpr {
        AstExpr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn cmp(left: AstExpr, op: AstCmpOp, right: AstExpr) -> AstExpr {
        AstExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn assign(target: &str, value: AstExpr) -> AstStmt {
        AstStmt::Assign {
            line: 0,
            targets: vec![name(target)],
            value,
        }
    }

    fn func(params: &[(&str, Option<ParamAnnotation>)], body: Vec<AstStmt>) -> FunctionDef {
        FunctionDef {
            name: "kernel".into(),
            decorators: vec![],
            params: params
                .iter()
                .map(|(name, annotation)| Param {
                    name: (*name).into(),
                    annotation: annotation.clone(),
                })
                .collect(),
            body,
        }
    }

    fn scalar_params(names: &[&str]) -> Vec<(&'static str, Option<ParamAnnotation>)> {
        // Leak is fine in tests; keeps the helper signatures simple.
        names
            .iter()
            .map(|n| (&*Box::leak(n.to_string().into_boxed_str()), None))
            .collect()
    }

    #[test]
    fn simple_assignment_produces_masked_copy() {
        let f = func(
            &scalar_params(&["a", "x", "b"]),
            vec![assign("b", bin(name("a"), AstBinOp::Add, name("x")))],
        );
        let k = lower(&f).unwrap();

        // comment, temp = a + x, b = temp (vector_only, root mask)
        assert_eq!(k.root.stmts.len(), 3);
        assert!(matches!(&k.root.stmts[0], Statement::Comment(text) if text == "b = a + x"));
        let Statement::Assign {
            expr: Expr::Bin { op, .. },
            vector_only: false,
            ..
        } = &k.root.stmts[1]
        else {
            panic!("expected plain binary assignment");
        };
        assert_eq!(*op, BinOp::Add);
        let Statement::Assign {
            dst,
            expr: Expr::VarRef(_),
            vector_only: true,
            mask: Some(mask),
        } = &k.root.stmts[2]
        else {
            panic!("expected vector_only copy");
        };
        assert_eq!(*mask, k.mask_true());
        assert_eq!(k.name_of(*dst), "b");

        // io flags: a, x read; b written.
        assert!(k.get_variable("a").unwrap().input);
        assert!(k.get_variable("x").unwrap().input);
        assert!(k.get_variable("b").unwrap().output);
    }

    #[test]
    fn if_else_synthesizes_both_masks() {
        // if x > 0: y = x else: y = 0 - x
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![AstStmt::If {
                line: 1,
                test: cmp(name("x"), AstCmpOp::Gt, num(0.0)),
                body: vec![assign("y", name("x"))],
                orelse: vec![assign(
                    "y",
                    AstExpr::UnaryOp {
                        op: AstUnaryOp::Neg,
                        operand: Box::new(name("x")),
                    },
                )],
            }],
        );
        let k = lower(&f).unwrap();

        // comment, cmp, then_mask, else_mask, ifelse
        assert_eq!(k.root.stmts.len(), 5);
        let Statement::Assign {
            dst: cond,
            expr: Expr::Cmp { op, .. },
            ..
        } = &k.root.stmts[1]
        else {
            panic!("expected comparison");
        };
        assert_eq!(*op, CmpOp::Gt);
        assert!(k.var(*cond).is_mask());

        let Statement::Assign {
            dst: then_mask,
            expr:
                Expr::Bin {
                    left,
                    op: BinOp::BoolAnd,
                    right,
                },
            vector_only: true,
            ..
        } = &k.root.stmts[2]
        else {
            panic!("expected then-mask combine");
        };
        assert_eq!(*left, *cond);
        assert_eq!(*right, k.mask_true());

        let Statement::Assign {
            dst: else_mask,
            expr:
                Expr::Bin {
                    op: BinOp::BitAndNot,
                    ..
                },
            vector_only: true,
            ..
        } = &k.root.stmts[3]
        else {
            panic!("expected else-mask andnot");
        };

        let Statement::IfElse {
            then_block,
            else_block,
        } = &k.root.stmts[4]
        else {
            panic!("expected if/else");
        };
        assert_eq!(then_block.mask, *then_mask);
        let else_block = else_block.as_ref().unwrap();
        assert_eq!(else_block.mask, *else_mask);

        // Writes inside the branches carry the branch mask.
        let Statement::Assign {
            vector_only: true,
            mask: Some(write_mask),
            ..
        } = then_block.stmts.last().unwrap()
        else {
            panic!("expected masked write in then branch");
        };
        assert_eq!(*write_mask, *then_mask);
    }

    #[test]
    fn if_without_else_has_no_andnot() {
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![AstStmt::If {
                line: 1,
                test: cmp(name("x"), AstCmpOp::Gt, num(0.0)),
                body: vec![assign("y", name("x"))],
                orelse: vec![],
            }],
        );
        let k = lower(&f).unwrap();
        let andnots = count_ops(&k.root, BinOp::BitAndNot);
        assert_eq!(andnots, 0);
        let Statement::IfElse { else_block, .. } = k.root.stmts.last().unwrap() else {
            panic!("expected if");
        };
        assert!(else_block.is_none());
    }

    #[test]
    fn while_re_emits_condition_at_body_end() {
        // while x > 1: x = x / 2
        let f = func(
            &scalar_params(&["x"]),
            vec![AstStmt::While {
                line: 1,
                test: cmp(name("x"), AstCmpOp::Gt, num(1.0)),
                body: vec![assign("x", bin(name("x"), AstBinOp::Div, num(2.0)))],
            }],
        );
        let k = lower(&f).unwrap();

        // comment, cmp, loop_mask, while
        assert_eq!(k.root.stmts.len(), 4);
        let Statement::While { body } = &k.root.stmts[3] else {
            panic!("expected while");
        };
        // Body: comment, div temp, masked write, then the re-emitted
        // condition pair (cmp + loop-mask combine).
        assert_eq!(body.stmts.len(), 5);
        assert_eq!(&k.root.stmts[1], &body.stmts[3]);
        assert_eq!(&k.root.stmts[2], &body.stmts[4]);
        let Statement::Assign { dst: loop_mask, .. } = &k.root.stmts[2] else {
            panic!("expected loop-mask assignment");
        };
        assert_eq!(body.mask, *loop_mask);
    }

    #[test]
    fn docstring_is_captured_once() {
        let mut body = vec![AstStmt::Expr {
            line: 1,
            value: AstExpr::Str {
                value: "Halves things.".into(),
            },
        }];
        body.push(assign("x", num(1.0)));
        let f = func(&scalar_params(&["x"]), body);
        let k = lower(&f).unwrap();
        assert_eq!(k.docstring, "Halves things.");

        let f = func(
            &scalar_params(&["x"]),
            vec![
                AstStmt::Expr {
                    line: 1,
                    value: AstExpr::Str { value: "one".into() },
                },
                AstStmt::Expr {
                    line: 2,
                    value: AstExpr::Str { value: "two".into() },
                },
            ],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::DuplicateDocstring { line: 2 })
        ));
    }

    #[test]
    fn uniform_annotation_and_assignment_rules() {
        let params = [
            ("x", None),
            ("a", Some(ParamAnnotation::Keyword("uniform".into()))),
        ];
        let f = func(&params, vec![assign("x", bin(name("a"), AstBinOp::Mul, name("x")))]);
        let k = lower(&f).unwrap();
        assert!(k.get_variable("a").unwrap().is_uniform());

        let f = func(&params, vec![assign("a", num(1.0))]);
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::AssignToUniform { .. })
        ));
    }

    #[test]
    fn kernel_needs_an_elementwise_argument() {
        let params = [("a", Some(ParamAnnotation::Keyword("uniform".into())))];
        let f = func(&params, vec![]);
        assert!(matches!(lower(&f), Err(FrontEndError::InvalidKernel { .. })));
    }

    #[test]
    fn stride_arguments_and_subscripts() {
        let params = [("out", None), ("pair", Some(ParamAnnotation::Stride(2)))];
        let f = func(
            &params,
            vec![assign(
                "out",
                bin(
                    AstExpr::Subscript {
                        value: Box::new(name("pair")),
                        index: Box::new(num(0.0)),
                    },
                    AstBinOp::Add,
                    AstExpr::Subscript {
                        value: Box::new(name("pair")),
                        index: Box::new(num(1.0)),
                    },
                ),
            )],
        );
        let k = lower(&f).unwrap();
        let pair = k.get_variable("pair").unwrap();
        assert_eq!(pair.stride(), 2);
        assert!(pair.input);

        // Subscripting a stride-1 argument is rejected.
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![assign(
                "y",
                AstExpr::Subscript {
                    value: Box::new(name("x")),
                    index: Box::new(num(0.0)),
                },
            )],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::NotSubscriptable { .. })
        ));

        // Reading an array without a subscript is rejected.
        let f = func(&params, vec![assign("out", name("pair"))]);
        assert!(matches!(lower(&f), Err(FrontEndError::KindMismatch { .. })));
    }

    #[test]
    fn return_validates_argument_names() {
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![
                assign("y", name("x")),
                AstStmt::Return {
                    line: 3,
                    value: Some(AstExpr::Tuple {
                        elts: vec![name("y")],
                    }),
                },
            ],
        );
        assert!(lower(&f).is_ok());

        let f = func(
            &scalar_params(&["x", "y"]),
            vec![
                assign("t", name("x")),
                AstStmt::Return {
                    line: 3,
                    value: Some(name("t")),
                },
            ],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::ReturnNotArgument { .. })
        ));
    }

    #[test]
    fn literals_fold_and_deduplicate() {
        // y = -2.5 * x + 2.5 interns a single 2.5 alongside -2.5.
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![assign(
                "y",
                bin(
                    bin(
                        AstExpr::UnaryOp {
                            op: AstUnaryOp::Neg,
                            operand: Box::new(num(2.5)),
                        },
                        AstBinOp::Mul,
                        name("x"),
                    ),
                    AstBinOp::Add,
                    num(2.5),
                ),
            )],
        );
        let k = lower(&f).unwrap();
        let values: Vec<f64> = k
            .literals()
            .iter()
            .map(|lit| lit.value.unwrap().get())
            .collect();
        assert_eq!(values, vec![-2.5, 2.5]);
        assert!(k.get_literal(LitValue::new(2.5)).is_some());
    }

    #[test]
    fn math_constants_use_fixed_names() {
        let f = func(
            &scalar_params(&["x"]),
            vec![assign(
                "x",
                bin(
                    name("x"),
                    AstBinOp::Mul,
                    AstExpr::Attribute {
                        value: Box::new(name("math")),
                        attr: "pi".into(),
                    },
                ),
            )],
        );
        let k = lower(&f).unwrap();
        let pi = k.get_literal(LitValue::new(std::f64::consts::PI)).unwrap();
        assert_eq!(pi.name, "litPI");
    }

    #[test]
    fn degrees_and_two_argument_log_lower_to_arithmetic() {
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![
                assign(
                    "y",
                    AstExpr::Call {
                        func: Box::new(name("degrees")),
                        args: vec![name("x")],
                    },
                ),
                assign(
                    "y",
                    AstExpr::Call {
                        func: Box::new(AstExpr::Attribute {
                            value: Box::new(name("math")),
                            attr: "log".into(),
                        }),
                        args: vec![name("x"), num(10.0)],
                    },
                ),
            ],
        );
        let k = lower(&f).unwrap();
        assert!(k
            .get_literal(LitValue::new(180.0 / std::f64::consts::PI))
            .is_some());
        // log(x, 10) becomes log(x) / log(10): two Log unaries and a Div.
        assert_eq!(count_unops(&k.root, UnOp::Log), 2);
        assert_eq!(count_ops(&k.root, BinOp::Div), 1);
    }

    #[test]
    fn tuple_unpacking_copies_before_writing() {
        // b, y = y, b swaps through temporaries.
        let f = func(
            &scalar_params(&["b", "y"]),
            vec![
                assign("b", name("b")),
                AstStmt::Assign {
                    line: 2,
                    targets: vec![AstExpr::Tuple {
                        elts: vec![name("b"), name("y")],
                    }],
                    value: AstExpr::Tuple {
                        elts: vec![name("y"), name("b")],
                    },
                },
            ],
        );
        let k = lower(&f).unwrap();
        // The unpack produces: copy y->t1, copy b->t2, write b<-t1, write y<-t2.
        let stmts = &k.root.stmts;
        let unpack = &stmts[stmts.len() - 4..];
        assert!(matches!(
            unpack[0],
            Statement::Assign {
                vector_only: false,
                expr: Expr::VarRef(_),
                ..
            }
        ));
        assert!(matches!(
            unpack[2],
            Statement::Assign {
                vector_only: true,
                ..
            }
        ));
    }

    #[test]
    fn bool_ops_require_masks() {
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![AstStmt::If {
                line: 1,
                test: AstExpr::BoolOp {
                    op: AstBoolOp::And,
                    values: vec![
                        cmp(name("x"), AstCmpOp::Gt, num(0.0)),
                        cmp(name("x"), AstCmpOp::Lt, num(9.0)),
                    ],
                },
                body: vec![assign("y", name("x"))],
                orelse: vec![],
            }],
        );
        let k = lower(&f).unwrap();
        assert_eq!(count_ops(&k.root, BinOp::BoolAnd), 2); // combine + then-mask

        let f = func(
            &scalar_params(&["x", "y"]),
            vec![AstStmt::If {
                line: 4,
                test: AstExpr::BoolOp {
                    op: AstBoolOp::And,
                    values: vec![name("x"), name("y")],
                },
                body: vec![],
                orelse: vec![],
            }],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::TypeMismatch { line: 4, .. })
        ));
    }

    #[test]
    fn errors_carry_lines() {
        let f = func(
            &scalar_params(&["x"]),
            vec![AstStmt::Assign {
                line: 7,
                targets: vec![name("x")],
                value: name("ghost"),
            }],
        );
        match lower(&f) {
            Err(FrontEndError::UndefinedVariable { name, line }) => {
                assert_eq!(name, "ghost");
                assert_eq!(line, 7);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn decorators_are_rejected() {
        let mut f = func(&scalar_params(&["x"]), vec![]);
        f.decorators.push("vectorize".into());
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::DecoratorNotSupported { .. })
        ));
    }

    #[test]
    fn unknown_functions_and_attributes() {
        let f = func(
            &scalar_params(&["x"]),
            vec![assign(
                "x",
                AstExpr::Call {
                    func: Box::new(name("mystery")),
                    args: vec![name("x")],
                },
            )],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::UnknownFunction { .. })
        ));

        let f = func(
            &scalar_params(&["x"]),
            vec![assign(
                "x",
                AstExpr::Attribute {
                    value: Box::new(name("math")),
                    attr: "tau".into(),
                },
            )],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn arity_mismatch_is_reported_for_known_functions() {
        let f = func(
            &scalar_params(&["x"]),
            vec![assign(
                "x",
                AstExpr::Call {
                    func: Box::new(name("sqrt")),
                    args: vec![name("x"), name("x")],
                },
            )],
        );
        assert!(matches!(
            lower(&f),
            Err(FrontEndError::UnsupportedSyntax { .. })
        ));
    }

    #[test]
    fn aug_assign_desugars() {
        let f = func(
            &scalar_params(&["x"]),
            vec![AstStmt::AugAssign {
                line: 1,
                target: name("x"),
                op: AstBinOp::Div,
                value: num(2.0),
            }],
        );
        let k = lower(&f).unwrap();
        assert!(matches!(&k.root.stmts[0], Statement::Comment(c) if c == "x /= 2"));
        assert_eq!(count_ops(&k.root, BinOp::Div), 1);
        assert!(k.get_variable("x").unwrap().output);
    }

    #[test]
    fn outputs_written_only_in_branches_are_still_outputs() {
        let f = func(
            &scalar_params(&["x", "y"]),
            vec![AstStmt::If {
                line: 1,
                test: cmp(name("x"), AstCmpOp::Gt, num(0.0)),
                body: vec![assign("y", name("x"))],
                orelse: vec![],
            }],
        );
        let k = lower(&f).unwrap();
        let outputs = k.arguments(ArgFilter {
            output: true,
            ..Default::default()
        });
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "y");
    }

    // -- helpers ----------------------------------------------------------

    fn count_ops(block: &Block, needle: BinOp) -> usize {
        let mut count = 0;
        walk(block, &mut |stmt| {
            if let Statement::Assign {
                expr: Expr::Bin { op, .. },
                ..
            } = stmt
            {
                if *op == needle {
                    count += 1;
                }
            }
        });
        count
    }

    fn count_unops(block: &Block, needle: UnOp) -> usize {
        let mut count = 0;
        walk(block, &mut |stmt| {
            if let Statement::Assign {
                expr: Expr::Unary { op, .. },
                ..
            } = stmt
            {
                if *op == needle {
                    count += 1;
                }
            }
        });
        count
    }

    fn walk(block: &Block, visit: &mut impl FnMut(&Statement)) {
        for stmt in &block.stmts {
            visit(stmt);
            match stmt {
                Statement::IfElse {
                    then_block,
                    else_block,
                } => {
                    walk(then_block, visit);
                    if let Some(else_block) = else_block {
                        walk(else_block, visit);
                    }
                }
                Statement::While { body } => walk(body, visit),
                _ => {}
            }
        }
    }
}
