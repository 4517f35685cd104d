//! SIMD vector stream.
//!
//! Emits `<name>_vector(KernelArgs*)`: one loop processing `size` elements
//! per iteration through a [`Translator`]. Control flow is predicated, not
//! branched: both sides of an `IfElse` always execute, and masked writes
//! blend new lanes over old ones. `while` loops run until the movemask test
//! reports no live lanes, with the condition recomputed at the end of every
//! iteration.

use vecpy_core::{AccessMode, ArgFilter, Block, Expr, Kernel, Statement, VarFilter};

use crate::error::BackEndError;
use crate::fmt::SourceWriter;
use crate::translate::{RhsOperand, Translator, SPILL_A, SPILL_B};

/// Emit the vector stream for a kernel.
pub fn emit_vector(kernel: &Kernel, t: &dyn Translator) -> Result<String, BackEndError> {
    let mut w = SourceWriter::new();
    let vec_type = t.vec_type();
    let size = t.arch().size();
    let dtype = t.dtype();

    w.line("//Includes");
    w.line("#include <x86intrin.h>");
    w.blank();

    w.line(format!("//Kernel function: {}", kernel.name));
    w.line(format!("static void {}_vector(KernelArgs* args) {{", kernel.name));
    w.blank();
    w.indent();

    w.line("//Setup");
    t.setup(&mut w);
    w.blank();

    w.line("//Uniforms");
    for arg in kernel.arguments(ArgFilter {
        uniform: Some(true),
        ..Default::default()
    }) {
        t.set(
            &mut w,
            &format!("const {} {}", vec_type, arg.name),
            &format!("args->{}", arg.name),
        );
    }
    w.blank();

    w.line("//Literals");
    for lit in kernel.literals() {
        let value = dtype.format_literal(lit.value.expect("literal value"))?;
        t.set(&mut w, &format!("const {} {}", vec_type, lit.name), &value);
    }
    w.blank();

    w.line("//Stack variables");
    let vectors: Vec<&str> = kernel
        .variables(VarFilter {
            uniform: Some(false),
            array: Some(false),
            ..Default::default()
        })
        .iter()
        .map(|var| var.name.as_str())
        .collect();
    if !vectors.is_empty() {
        w.line(format!("{} {};", vec_type, vectors.join(", ")));
    }
    let pointers: Vec<String> = kernel
        .variables(VarFilter {
            uniform: Some(false),
            array: Some(true),
            ..Default::default()
        })
        .iter()
        .map(|var| format!("*{}", var.name))
        .collect();
    if !pointers.is_empty() {
        w.line(format!("{} {};", dtype.ctype(), pointers.join(", ")));
    }
    if needs_scratch(kernel, t) {
        let align = size * dtype.size_of();
        for buf in [SPILL_A, SPILL_B] {
            w.line(format!(
                "alignas({}) {} {}[{}];",
                align,
                dtype.ctype(),
                buf,
                size
            ));
        }
    }
    w.blank();

    w.line("//Loop over input");
    w.line(format!(
        "for(uint64_t index = 0; index < args->N; index += {}) {{",
        size
    ));
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
            t.load(&mut w, &arg.name, &format!("&args->{}[index]", arg.name));
        }
    }
    w.blank();

    w.line("//Begin kernel logic");
    w.line("{");
    w.blank();
    emit_block(kernel, &kernel.root, &mut w, t)?;
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
        t.store(&mut w, &format!("&args->{}[index]", arg.name), &arg.name);
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
    t: &dyn Translator,
) -> Result<(), BackEndError> {
    w.indent();
    for stmt in &block.stmts {
        match stmt {
            Statement::Comment(text) => w.line(format!("//>>> {}", text)),
            Statement::Assign {
                dst,
                expr,
                vector_only,
                mask,
            } => {
                let d = kernel.name_of(*dst);
                match expr {
                    Expr::VarRef(src) => {
                        let src = kernel.name_of(*src);
                        if *vector_only {
                            let mask = mask.map(|m| kernel.name_of(m)).unwrap_or("MASK_TRUE");
                            t.blend(w, src, d, mask);
                        } else {
                            w.line(format!("{} = {};", d, src));
                        }
                    }
                    Expr::Bin { left, op, right } => {
                        let rhs = RhsOperand {
                            name: kernel.name_of(*right),
                            literal: kernel.var(*right).value,
                        };
                        t.bin(w, *op, d, kernel.name_of(*left), rhs)?;
                    }
                    Expr::Unary { op, operand } => {
                        t.unary(w, *op, d, kernel.name_of(*operand))?;
                    }
                    Expr::Cmp { left, op, right } => {
                        t.cmp(w, *op, d, kernel.name_of(*left), kernel.name_of(*right))?;
                    }
                    Expr::ArrayAccess { array, index, mode } => {
                        let stride = kernel.var(*array).stride();
                        let array = kernel.name_of(*array);
                        let index = kernel.name_of(*index);
                        match mode {
                            AccessMode::Read => t.array_read(w, d, array, index, stride),
                            AccessMode::Write => t.array_write(w, d, array, index, stride),
                        }
                    }
                }
            }
            Statement::IfElse {
                then_block,
                else_block,
            } => {
                // Both branches run unconditionally; predication comes from
                // the block masks on the writes inside.
                w.line("{");
                emit_block(kernel, then_block, w, t)?;
                match else_block {
                    Some(else_block) if !else_block.is_empty() => {
                        w.line("}");
                        w.line("//(else)");
                        w.line("{");
                        emit_block(kernel, else_block, w, t)?;
                    }
                    _ => {}
                }
                w.line("}");
            }
            Statement::While { body } => {
                w.line(format!(
                    "while({}({})) {{",
                    t.test_fn(),
                    kernel.name_of(body.mask)
                ));
                emit_block(kernel, body, w, t)?;
                w.line("}");
            }
        }
    }
    w.unindent();
    Ok(())
}

/// Whether any statement routes through the scratch buffers.
fn needs_scratch(kernel: &Kernel, t: &dyn Translator) -> bool {
    fn block_needs(block: &Block, t: &dyn Translator) -> bool {
        block.stmts.iter().any(|stmt| match stmt {
            Statement::Assign { expr, .. } => match expr {
                Expr::Bin { op, .. } => t.bin_uses_scratch(*op),
                Expr::Unary { op, .. } => t.unary_uses_scratch(*op),
                Expr::ArrayAccess { .. } => t.array_access_uses_scratch(),
                _ => false,
            },
            Statement::IfElse {
                then_block,
                else_block,
            } => {
                block_needs(then_block, t)
                    || else_block.as_ref().is_some_and(|b| block_needs(b, t))
            }
            Statement::While { body } => block_needs(body, t),
            _ => false,
        })
    }
    block_needs(&kernel.root, t)
}
