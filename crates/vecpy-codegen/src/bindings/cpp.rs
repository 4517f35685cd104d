//! Native C/C++ entry point.

use vecpy_core::{ArgFilter, Kernel};

use crate::arch::DataType;
use crate::fmt::SourceWriter;

/// Emit `vecpy_<name>_cpp.h`: an `extern "C"` wrapper taking raw pointers
/// (uniforms by value) and the element count.
pub fn emit_cpp(kernel: &Kernel, dtype: DataType) -> String {
    let mut w = SourceWriter::new();
    let ctype = dtype.ctype();

    w.line("//c++ entry point");
    w.line("//Wrapper for the core function");
    let params: Vec<String> = kernel
        .arguments(ArgFilter::default())
        .iter()
        .map(|arg| {
            if arg.is_uniform() {
                format!("{} {}", ctype, arg.name)
            } else {
                format!("{}* {}", ctype, arg.name)
            }
        })
        .collect();
    w.line(format!(
        "extern \"C\" bool {}({}, int N) {{",
        kernel.name,
        params.join(", ")
    ));
    w.indent();
    w.line("KernelArgs args;");
    for arg in kernel.arguments(ArgFilter::default()) {
        w.line(format!("args.{name} = {name};", name = arg.name));
    }
    w.line("args.N = N;");
    w.line("return run(&args);");
    w.unindent();
    w.line("}");
    w.blank();
    w.finish()
}

#[cfg(test)]
mod tests {
    use vecpy_core::VarKind;

    use super::*;

    #[test]
    fn wrapper_takes_pointers_and_uniform_values() {
        let mut kernel = Kernel::new("scale");
        kernel.add_argument("x", VarKind::Scalar).unwrap();
        kernel.add_argument("y", VarKind::Scalar).unwrap();
        kernel.add_argument("a", VarKind::Uniform).unwrap();

        let code = emit_cpp(&kernel, DataType::Float);
        assert!(code.contains("extern \"C\" bool scale(float* x, float* y, float a, int N) {"));
        assert!(code.contains("args.x = x;"));
        assert!(code.contains("args.a = a;"));
        assert!(code.contains("args.N = N;"));
        assert!(code.contains("return run(&args);"));
    }

    #[test]
    fn uint_kernels_use_uint_pointers() {
        let mut kernel = Kernel::new("mask");
        kernel.add_argument("bits", VarKind::Scalar).unwrap();
        let code = emit_cpp(&kernel, DataType::Uint32);
        assert!(code.contains("extern \"C\" bool mask(uint32_t* bits, int N) {"));
    }
}
