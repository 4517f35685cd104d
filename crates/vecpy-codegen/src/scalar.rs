//! Scalar reference stream.
//!
//! Emits `<name>_scalar(KernelArgs*)`: one plain C++ loop over the input,
//! used as the semantic reference for the vector stream and as the tail
//! handler by the driver. Control flow is native `if`/`else`/`while` on the
//! block masks, so `vector_only` statements shrink here: masked copies
//! become plain assignments and mask combines keep only the condition (the
//! parent mask is enforced by the enclosing branch).

use vecpy_core::{
    AccessMode, ArgFilter, BinOp, Block, Expr, Kernel, Statement, UnOp, VarFilter, VarId,
};

use crate::arch::DataType;
use crate::error::BackEndError;
use crate::fmt::SourceWriter;

/// Emit the scalar stream for a kernel.
pub fn emit_scalar(kernel: &Kernel, dtype: DataType) -> Result<String, BackEndError> {
    let mut w = SourceWriter::new();
    let ctype = dtype.ctype();

    w.line("//Includes");
    w.line("#include <math.h>");
    w.line("#include <algorithm>");
    w.blank();

    w.line(format!("//Kernel function: {}", kernel.name));
    w.line(format!("static void {}_scalar(KernelArgs* args) {{", kernel.name));
    w.blank();
    w.indent();

    w.line("//Uniforms");
    for arg in kernel.arguments(ArgFilter {
        uniform: Some(true),
        ..Default::default()
    }) {
        w.line(format!("const {} {} = args->{};", ctype, arg.name, arg.name));
    }
    w.blank();

    w.line("//Literals");
    for lit in kernel.literals() {
        let value = dtype.format_literal(lit.value.expect("literal value"))?;
        w.line(format!("const {} {} = {};", ctype, lit.name, value));
    }
    w.blank();

    w.line("//Stack variables (numeric)");
    let numeric: Vec<String> = kernel
        .variables(VarFilter {
            mask: Some(false),
            uniform: Some(false),
            ..Default::default()
        })
        .iter()
        .map(|var| {
            if var.stride() > 1 {
                format!("*{}", var.name)
            } else {
                var.name.clone()
            }
        })
        .collect();
    if !numeric.is_empty() {
        w.line(format!("{} {};", ctype, numeric.join(", ")));
    }
    w.blank();

    w.line("//Stack variables (boolean)");
    let bools: Vec<&str> = kernel
        .variables(VarFilter {
            mask: Some(true),
            ..Default::default()
        })
        .iter()
        .map(|var| var.name.as_str())
        .collect();
    if !bools.is_empty() {
        w.line(format!("bool {};", bools.join(", ")));
    }
    w.blank();

    w.line("//Loop over input");
    w.line("for(uint64_t index = 0; index < args->N; ++index) {");
    w.blank();
    w.indent();

    w.line("//Inputs");
    for arg in kernel.arguments(ArgFilter {
        input: true,
        uniform: Some(false),
        ..Default::default()
    }) {
        if arg.stride() > 1 {
            w.line(format!(
                "{} = &args->{}[index * {}];",
                arg.name,
                arg.name,
                arg.stride()
            ));
        } else {
            w.line(format!("{} = args->{}[index];", arg.name, arg.name));
        }
    }
    w.blank();

    w.line("//Begin kernel logic");
    w.line("{");
    w.blank();
    emit_block(kernel, &kernel.root, &mut w, dtype)?;
    w.blank();
    w.line("}");
    w.line("//End kernel logic");
    w.blank();

    w.line("//Outputs");
    for arg in kernel.arguments(ArgFilter {
        output: true,
        array: Some(false),
        ..Default::default()
    }) {
        w.line(format!("args->{}[index] = {};", arg.name, arg.name));
    }
    w.blank();

    w.unindent();
    w.line("}");
    w.unindent();
    w.line("}");
    w.line("//End of kernel function");
    w.blank();
    Ok(w.finish())
}

fn emit_block(
    kernel: &Kernel,
    block: &Block,
    w: &mut SourceWriter,
    dtype: DataType,
) -> Result<(), BackEndError> {
    w.indent();
    for stmt in &block.stmts {
        match stmt {
            Statement::Comment(text) => w.line(format!("//>>> {}", text)),
            Statement::Assign {
                dst,
                expr,
                vector_only,
                ..
            } => emit_assign(kernel, *dst, expr, *vector_only, w, dtype)?,
            Statement::IfElse {
                then_block,
                else_block,
            } => {
                w.line(format!("if({}) {{", kernel.name_of(then_block.mask)));
                emit_block(kernel, then_block, w, dtype)?;
                match else_block {
                    Some(else_block) if !else_block.is_empty() => {
                        w.line("} else {");
                        emit_block(kernel, else_block, w, dtype)?;
                    }
                    _ => {}
                }
                w.line("}");
            }
            Statement::While { body } => {
                w.line(format!("while({}) {{", kernel.name_of(body.mask)));
                emit_block(kernel, body, w, dtype)?;
                w.line("}");
            }
        }
    }
    w.unindent();
    Ok(())
}

fn emit_assign(
    kernel: &Kernel,
    dst: VarId,
    expr: &Expr,
    vector_only: bool,
    w: &mut SourceWriter,
    dtype: DataType,
) -> Result<(), BackEndError> {
    let d = kernel.name_of(dst);
    match expr {
        Expr::VarRef(src) => {
            // Masked copies flatten to plain assignments; the branch
            // structure provides the predication.
            w.line(format!("{} = {};", d, kernel.name_of(*src)));
            Ok(())
        }
        Expr::Bin { left, .. } if vector_only => {
            // Mask combine: the parent-mask conjunction is vector
            // bookkeeping, only the condition survives.
            w.line(format!("{} = {};", d, kernel.name_of(*left)));
            Ok(())
        }
        Expr::Bin { left, op, right } => emit_bin(kernel, d, *left, *op, *right, w, dtype),
        Expr::Unary { op, operand } => emit_unary(kernel, d, *op, *operand, w, dtype),
        Expr::Cmp { left, op, right } => {
            w.line(format!(
                "{} = {} {} {};",
                d,
                kernel.name_of(*left),
                op.token(),
                kernel.name_of(*right)
            ));
            Ok(())
        }
        Expr::ArrayAccess { array, index, mode } => {
            let array = kernel.name_of(*array);
            // Float kernels index with a float variable; cast it down.
            let index = if dtype.is_floating() {
                format!("(int){}", kernel.name_of(*index))
            } else {
                kernel.name_of(*index).to_string()
            };
            match mode {
                AccessMode::Read => w.line(format!("{} = {}[{}];", d, array, index)),
                AccessMode::Write => w.line(format!("{}[{}] = {};", array, index, d)),
            }
            Ok(())
        }
    }
}

fn emit_bin(
    kernel: &Kernel,
    d: &str,
    left: VarId,
    op: BinOp,
    right: VarId,
    w: &mut SourceWriter,
    dtype: DataType,
) -> Result<(), BackEndError> {
    let l = kernel.name_of(left);
    let r = kernel.name_of(right);
    let on_masks = kernel.var(left).is_mask();
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::BoolAnd | BinOp::BoolOr => {
            w.line(format!("{} = {} {} {};", d, l, op.token().expect("token"), r));
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
            if !on_masks && dtype.is_floating() {
                return Err(unsupported(&op, dtype));
            }
            w.line(format!("{} = {} {} {};", d, l, op.token().expect("token"), r));
        }
        BinOp::BitAndNot => {
            if on_masks {
                w.line(format!("{} = !{} && {};", d, l, r));
            } else if dtype.is_integral() {
                w.line(format!("{} = ~{} & {};", d, l, r));
            } else {
                return Err(unsupported(&op, dtype));
            }
        }
        BinOp::FloorDiv => {
            if dtype.is_floating() {
                w.line(format!("{} = floor({} / {});", d, l, r));
            } else {
                w.line(format!("{} = {} / {};", d, l, r));
            }
        }
        BinOp::Rem => {
            if dtype.is_floating() {
                w.line(format!("{} = fmod({}, {});", d, l, r));
            } else {
                w.line(format!("{} = {} % {};", d, l, r));
            }
        }
        BinOp::Pow => w.line(format!("{} = pow({}, {});", d, l, r)),
        BinOp::Max => w.line(format!("{} = std::max({}, {});", d, l, r)),
        BinOp::Min => w.line(format!("{} = std::min({}, {});", d, l, r)),
        BinOp::Atan2 => w.line(format!("{} = atan2({}, {});", d, l, r)),
        BinOp::Copysign => w.line(format!("{} = copysign({}, {});", d, l, r)),
        BinOp::Fmod => w.line(format!("{} = fmod({}, {});", d, l, r)),
        BinOp::Hypot => w.line(format!("{} = hypot({}, {});", d, l, r)),
    }
    Ok(())
}

fn emit_unary(
    kernel: &Kernel,
    d: &str,
    op: UnOp,
    operand: VarId,
    w: &mut SourceWriter,
    dtype: DataType,
) -> Result<(), BackEndError> {
    let x = kernel.name_of(operand);
    match op {
        UnOp::BitNot => {
            if !dtype.is_integral() {
                return Err(unsupported(&op, dtype));
            }
            w.line(format!("{} = ~{};", d, x));
        }
        UnOp::BoolNot => w.line(format!("{} = !{};", d, x)),
        UnOp::Abs if dtype.is_floating() => w.line(format!("{} = fabs({});", d, x)),
        UnOp::Gamma => w.line(format!("{} = tgamma({});", d, x)),
        other => {
            let func = other.function_name().ok_or_else(|| unsupported(&other, dtype))?;
            w.line(format!("{} = {}({});", d, func, x));
        }
    }
    Ok(())
}

fn unsupported(op: &dyn std::fmt::Display, dtype: DataType) -> BackEndError {
    BackEndError::UnsupportedOp {
        op: op.to_string(),
        arch: "Generic",
        dtype: dtype.ctype(),
    }
}

#[cfg(test)]
mod tests {
    use vecpy_front::{lower, FunctionDef};

    use super::*;

    fn kernel_from_json(json: &str) -> Kernel {
        let func: FunctionDef = serde_json::from_str(json).expect("valid AST json");
        lower(&func).expect("lowering succeeds")
    }

    const POLY: &str = r#"{
        "name": "poly",
        "params": [{"name": "a"}, {"name": "x"}, {"name": "b"}],
        "body": [
            {"kind": "assign", "line": 2, "targets": [{"kind": "name", "id": "b"}],
             "value": {"kind": "bin_op",
                       "left": {"kind": "bin_op",
                                "left": {"kind": "name", "id": "a"},
                                "op": "mul",
                                "right": {"kind": "name", "id": "x"}},
                       "op": "add",
                       "right": {"kind": "num", "value": 1.0}}}
        ]
    }"#;

    #[test]
    fn scalar_stream_has_the_reference_shape() {
        let kernel = kernel_from_json(POLY);
        let code = emit_scalar(&kernel, DataType::Float).unwrap();

        assert!(code.contains("static void poly_scalar(KernelArgs* args) {"));
        assert!(code.contains("for(uint64_t index = 0; index < args->N; ++index) {"));
        assert!(code.contains(" = 1.0000000f;"));
        assert!(code.contains("a = args->a[index];"));
        assert!(code.contains("x = args->x[index];"));
        assert!(code.contains("args->b[index] = b;"));
        assert!(code.contains("//>>> b = (a * x) + 1"));
        // The masked write flattens to a plain copy.
        assert!(code.contains("b = var"));
        assert!(!code.contains("MASK_TRUE"));
    }

    #[test]
    fn uint_literals_are_hex_and_floordiv_is_native() {
        let json = r#"{
            "name": "halve",
            "params": [{"name": "x"}],
            "body": [
                {"kind": "assign", "line": 2, "targets": [{"kind": "name", "id": "x"}],
                 "value": {"kind": "bin_op",
                           "left": {"kind": "name", "id": "x"},
                           "op": "floor_div",
                           "right": {"kind": "num", "value": 2.0}}}
            ]
        }"#;
        let kernel = kernel_from_json(json);
        let code = emit_scalar(&kernel, DataType::Uint32).unwrap();
        assert!(code.contains(" = 0x00000002;"));
        assert!(code.contains("/ lit"));
        assert!(!code.contains("floor("));

        let code = emit_scalar(&kernel, DataType::Float).unwrap();
        assert!(code.contains("floor(x / lit002)"));
    }

    #[test]
    fn branches_emit_native_control_flow() {
        let json = r#"{
            "name": "clamp",
            "params": [{"name": "x"}, {"name": "y"}],
            "body": [
                {"kind": "if", "line": 2,
                 "test": {"kind": "compare",
                          "left": {"kind": "name", "id": "x"},
                          "op": "gt",
                          "right": {"kind": "num", "value": 0.0}},
                 "body": [{"kind": "assign", "line": 3,
                           "targets": [{"kind": "name", "id": "y"}],
                           "value": {"kind": "name", "id": "x"}}],
                 "orelse": [{"kind": "assign", "line": 5,
                             "targets": [{"kind": "name", "id": "y"}],
                             "value": {"kind": "unary_op", "op": "neg",
                                       "operand": {"kind": "name", "id": "x"}}}]}
            ]
        }"#;
        let kernel = kernel_from_json(json);
        let code = emit_scalar(&kernel, DataType::Float).unwrap();

        // The branch tests the then-mask, which holds the bare condition.
        assert!(code.contains("if(mask"));
        assert!(code.contains("} else {"));
        // Mask combines keep only their left operand.
        let mask_line = code
            .lines()
            .find(|line| line.trim_start().starts_with("if(mask"))
            .unwrap();
        let mask_name = mask_line
            .trim_start()
            .trim_start_matches("if(")
            .trim_end_matches(") {");
        assert!(code.contains(&format!("{} = mask", mask_name)));
        // Bool stack variables exist for the masks.
        assert!(code.contains("bool mask"));
    }

    #[test]
    fn while_loops_test_the_body_mask() {
        let json = r#"{
            "name": "conv",
            "params": [{"name": "x"}],
            "body": [
                {"kind": "while", "line": 2,
                 "test": {"kind": "compare",
                          "left": {"kind": "name", "id": "x"},
                          "op": "gt",
                          "right": {"kind": "num", "value": 1.0}},
                 "body": [{"kind": "assign", "line": 3,
                           "targets": [{"kind": "name", "id": "x"}],
                           "value": {"kind": "bin_op",
                                     "left": {"kind": "name", "id": "x"},
                                     "op": "div",
                                     "right": {"kind": "num", "value": 2.0}}}]}
            ]
        }"#;
        let kernel = kernel_from_json(json);
        let code = emit_scalar(&kernel, DataType::Float).unwrap();

        let while_line = code
            .lines()
            .find(|line| line.trim_start().starts_with("while("))
            .unwrap()
            .trim_start();
        let mask_name = while_line
            .trim_start_matches("while(")
            .trim_end_matches(") {");
        // The loop mask is refreshed inside the body (condition re-emitted).
        let body_start = code.find(while_line).unwrap();
        let refresh = format!("{} = mask", mask_name);
        assert!(code[body_start..].contains(&refresh));
    }

    #[test]
    fn float_bitwise_is_rejected() {
        let json = r#"{
            "name": "bits",
            "params": [{"name": "x"}],
            "body": [
                {"kind": "assign", "line": 2, "targets": [{"kind": "name", "id": "x"}],
                 "value": {"kind": "bin_op",
                           "left": {"kind": "name", "id": "x"},
                           "op": "bit_and",
                           "right": {"kind": "num", "value": 3.0}}}
            ]
        }"#;
        let kernel = kernel_from_json(json);
        assert!(matches!(
            emit_scalar(&kernel, DataType::Float),
            Err(BackEndError::UnsupportedOp { .. })
        ));
        assert!(emit_scalar(&kernel, DataType::Uint32).is_ok());
    }

    #[test]
    fn stride_inputs_become_pointers() {
        let json = r#"{
            "name": "pairsum",
            "params": [{"name": "out"}, {"name": "pair", "annotation": 2}],
            "body": [
                {"kind": "assign", "line": 2, "targets": [{"kind": "name", "id": "out"}],
                 "value": {"kind": "bin_op",
                           "left": {"kind": "subscript",
                                    "value": {"kind": "name", "id": "pair"},
                                    "index": {"kind": "num", "value": 0.0}},
                           "op": "add",
                           "right": {"kind": "subscript",
                                     "value": {"kind": "name", "id": "pair"},
                                     "index": {"kind": "num", "value": 1.0}}}}
            ]
        }"#;
        let kernel = kernel_from_json(json);
        let code = emit_scalar(&kernel, DataType::Float).unwrap();
        assert!(code.contains("float out, *pair"));
        assert!(code.contains("pair = &args->pair[index * 2];"));
        assert!(code.contains("= pair[(int)lit"));
        // Arrays never appear in the write-back loop.
        assert!(!code.contains("args->pair[index] ="));
    }
}
