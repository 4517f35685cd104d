//! Driver emission: the kernel header and the threaded core.
//!
//! The kernel header declares `KernelArgs` and defines both code streams.
//! The core file wraps them in `run`: validate alignment, partition the
//! input across pthread workers running the vector stream, join, then hand
//! the tail to the scalar stream on the calling thread. A failed validation
//! returns before any thread is spawned.

use vecpy_core::{ArgFilter, Kernel};

use crate::error::Error;
use crate::fmt::SourceWriter;
use crate::options::{Options, Threads};
use crate::scalar::emit_scalar;
use crate::translate;
use crate::vector::emit_vector;

/// Emit `vecpy_<name>_kernel.h`: the `KernelArgs` struct plus the scalar
/// and vector streams.
pub fn emit_kernel_header(kernel: &Kernel, options: &Options) -> Result<String, Error> {
    let mut w = SourceWriter::new();
    let dtype = options.dtype;

    w.section(&format!(
        "Target Architecture: {} ({})",
        options.arch.name(),
        dtype.ctype()
    ));
    w.line("//Includes");
    w.line("#include <stdint.h>");
    w.blank();

    w.line("//Kernel arguments");
    w.line("struct KernelArgs {");
    w.indent();
    for arg in kernel.arguments(ArgFilter::default()) {
        if arg.is_uniform() {
            w.line(format!("{} {};", dtype.ctype(), arg.name));
        } else {
            w.line(format!("{}* {};", dtype.ctype(), arg.name));
        }
    }
    w.line("uint64_t N;");
    w.unindent();
    w.line("};");
    w.blank();

    let mut code = w.finish();
    code.push_str(&emit_scalar(kernel, dtype)?);

    if options.arch.is_generic() {
        let mut w = SourceWriter::new();
        w.line(format!("//Kernel function: {} (vector pass-through)", kernel.name));
        w.line(format!(
            "static void {name}_vector(KernelArgs* args) {{ {name}_scalar(args); }}",
            name = kernel.name
        ));
        w.blank();
        code.push_str(&w.finish());
    } else {
        let translator = translate::select(options.arch, dtype)?;
        code.push_str(&emit_vector(kernel, translator.as_ref())?);
    }
    Ok(code)
}

/// Emit `vecpy_<name>_core.cpp`: the unified `run` driver plus the includes
/// for each requested binding header.
pub fn emit_core(kernel: &Kernel, options: &Options, binding_files: &[String]) -> String {
    let mut w = SourceWriter::new();
    let size = options.arch.size();
    let alignment = size * options.dtype.size_of();
    let pointer_args = kernel.arguments(ArgFilter {
        uniform: Some(false),
        ..Default::default()
    });

    w.line("//Includes");
    w.line("#include <pthread.h>");
    w.line("#include <stdio.h>");
    if options.threads == Threads::Auto {
        w.line("#include <unistd.h>");
    }
    w.line(format!("#include \"{}\"", crate::kernel_file(&kernel.name)));
    w.blank();

    w.line("//Utility functions");
    w.line(format!(
        "static void* threadStart(void* v) {{ {}_vector((KernelArgs*)v); return NULL; }}",
        kernel.name
    ));
    w.line(format!(
        "static bool isAligned(void* data) {{ return reinterpret_cast<uintptr_t>(data) % {}UL == 0UL; }}",
        alignment
    ));
    w.line("static bool checkArgs(KernelArgs* args) {");
    w.indent();
    for arg in &pointer_args {
        w.line(format!(
            "if(!isAligned(args->{name})) {{ printf(\"Array not aligned ({name})\\n\"); return false; }}",
            name = arg.name
        ));
    }
    w.line("return true;");
    w.unindent();
    w.line("}");
    w.blank();

    w.line("//Unified core function");
    w.line("static bool run(KernelArgs* args) {");
    w.indent();
    w.line("//Validate the arguments");
    w.line("if(!checkArgs(args)) { printf(\"Arguments are invalid\\n\"); return false; }");
    w.line("//Partition the input across the workers");
    match options.threads {
        Threads::Auto => {
            w.line("long processors = sysconf(_SC_NPROCESSORS_ONLN);");
            w.line("unsigned int numThreads = processors < 1 ? 1 : (unsigned int)processors;");
        }
        Threads::Count(count) => {
            w.line(format!("unsigned int numThreads = {};", count));
        }
    }
    w.line(format!(
        "uint64_t vectorsPerThread = args->N / ({} * numThreads);",
        size
    ));
    w.line(format!(
        "uint64_t elementsPerThread = vectorsPerThread * {};",
        size
    ));
    w.line("uint64_t offset = 0;");
    w.line("//Launch the workers");
    w.line("if(elementsPerThread > 0) {");
    w.indent();
    w.line("pthread_t* threads = new pthread_t[numThreads];");
    w.line("KernelArgs* threadArgs = new KernelArgs[numThreads];");
    w.line("for(unsigned int t = 0; t < numThreads; t++) {");
    w.indent();
    for arg in kernel.arguments(ArgFilter::default()) {
        if arg.is_uniform() {
            w.line(format!("threadArgs[t].{name} = args->{name};", name = arg.name));
        } else if arg.stride() > 1 {
            w.line(format!(
                "threadArgs[t].{name} = &args->{name}[offset * {stride}];",
                name = arg.name,
                stride = arg.stride()
            ));
        } else {
            w.line(format!(
                "threadArgs[t].{name} = &args->{name}[offset];",
                name = arg.name
            ));
        }
    }
    w.line("threadArgs[t].N = elementsPerThread;");
    w.line("offset += elementsPerThread;");
    w.line("pthread_create(&threads[t], NULL, threadStart, (void*)&threadArgs[t]);");
    w.unindent();
    w.line("}");
    w.line("for(unsigned int t = 0; t < numThreads; t++) { pthread_join(threads[t], NULL); }");
    w.line("delete [] threads;");
    w.line("delete [] threadArgs;");
    w.unindent();
    w.line("}");
    w.line("//Finish the tail on the calling thread");
    w.line("if(offset < args->N) {");
    w.indent();
    w.line("KernelArgs tailArgs;");
    for arg in kernel.arguments(ArgFilter::default()) {
        if arg.is_uniform() {
            w.line(format!("tailArgs.{name} = args->{name};", name = arg.name));
        } else if arg.stride() > 1 {
            w.line(format!(
                "tailArgs.{name} = &args->{name}[offset * {stride}];",
                name = arg.name,
                stride = arg.stride()
            ));
        } else {
            w.line(format!(
                "tailArgs.{name} = &args->{name}[offset];",
                name = arg.name
            ));
        }
    }
    w.line("tailArgs.N = args->N - offset;");
    w.line(format!("{}_scalar(&tailArgs);", kernel.name));
    w.unindent();
    w.line("}");
    w.line("return true;");
    w.unindent();
    w.line("}");
    w.blank();

    w.line("//Additional includes for each programming language");
    for file in binding_files {
        w.line(format!("#include \"{}\"", file));
    }
    w.blank();
    w.finish()
}

#[cfg(test)]
mod tests {
    use vecpy_front::{lower, FunctionDef};

    use super::*;
    use crate::arch::Architecture;
    use crate::options::Binding;

    fn kernel() -> Kernel {
        let json = r#"{
            "name": "scale",
            "params": [
                {"name": "x"},
                {"name": "y"},
                {"name": "pair", "annotation": 2},
                {"name": "a", "annotation": "uniform"}
            ],
            "body": [
                {"kind": "assign", "line": 2, "targets": [{"kind": "name", "id": "y"}],
                 "value": {"kind": "bin_op",
                           "left": {"kind": "bin_op",
                                    "left": {"kind": "name", "id": "a"},
                                    "op": "mul",
                                    "right": {"kind": "name", "id": "x"}},
                           "op": "add",
                           "right": {"kind": "subscript",
                                     "value": {"kind": "name", "id": "pair"},
                                     "index": {"kind": "num", "value": 0.0}}}}
            ]
        }"#;
        let func: FunctionDef = serde_json::from_str(json).unwrap();
        lower(&func).unwrap()
    }

    fn options(arch: Architecture, threads: Threads) -> Options {
        Options {
            arch,
            threads,
            bindings: vec![Binding::Cpp],
            ..Default::default()
        }
    }

    #[test]
    fn header_declares_args_and_both_streams() {
        let kernel = kernel();
        let opts = options(Architecture::Sse4_2, Threads::Count(2));
        let header = emit_kernel_header(&kernel, &opts).unwrap();

        assert!(header.contains("struct KernelArgs {"));
        assert!(header.contains("float* x;"));
        assert!(header.contains("float* pair;"));
        assert!(header.contains("float a;"));
        assert!(header.contains("uint64_t N;"));
        assert!(header.contains("static void scale_scalar(KernelArgs* args) {"));
        assert!(header.contains("static void scale_vector(KernelArgs* args) {"));
        assert!(header.contains("Target Architecture: SSE4.2 (float)"));
    }

    #[test]
    fn generic_header_routes_vector_to_scalar() {
        let kernel = kernel();
        let opts = options(Architecture::Generic, Threads::Count(2));
        let header = emit_kernel_header(&kernel, &opts).unwrap();
        assert!(header.contains("static void scale_vector(KernelArgs* args) { scale_scalar(args); }"));
        assert!(!header.contains("x86intrin"));
    }

    #[test]
    fn alignment_follows_vector_width() {
        let kernel = kernel();
        let core = emit_core(&kernel, &options(Architecture::Sse4_2, Threads::Count(2)), &[]);
        assert!(core.contains("% 16UL == 0UL"));

        let core = emit_core(&kernel, &options(Architecture::Avx2, Threads::Count(2)), &[]);
        assert!(core.contains("% 32UL == 0UL"));
    }

    #[test]
    fn checks_run_before_any_thread_spawns() {
        let kernel = kernel();
        let core = emit_core(&kernel, &options(Architecture::Sse4_2, Threads::Count(2)), &[]);
        let check = core.find("if(!checkArgs(args))").unwrap();
        let spawn = core.find("pthread_create").unwrap();
        assert!(check < spawn);
        // Every pointer argument is checked; the uniform is not.
        assert!(core.contains("isAligned(args->x)"));
        assert!(core.contains("isAligned(args->y)"));
        assert!(core.contains("isAligned(args->pair)"));
        assert!(!core.contains("isAligned(args->a)"));
    }

    #[test]
    fn partition_and_tail_shape() {
        let kernel = kernel();
        let core = emit_core(&kernel, &options(Architecture::Sse4_2, Threads::Count(2)), &[]);
        assert!(core.contains("unsigned int numThreads = 2;"));
        assert!(core.contains("uint64_t vectorsPerThread = args->N / (4 * numThreads);"));
        assert!(core.contains("uint64_t elementsPerThread = vectorsPerThread * 4;"));
        // Stride arguments advance by offset * stride; the uniform passes
        // through by value.
        assert!(core.contains("threadArgs[t].pair = &args->pair[offset * 2];"));
        assert!(core.contains("threadArgs[t].x = &args->x[offset];"));
        assert!(core.contains("threadArgs[t].a = args->a;"));
        // Tail runs the scalar stream after the joins.
        let join = core.find("pthread_join").unwrap();
        let tail = core.find("scale_scalar(&tailArgs);").unwrap();
        assert!(join < tail);
        assert!(core.contains("tailArgs.N = args->N - offset;"));
    }

    #[test]
    fn auto_threads_use_sysconf() {
        let kernel = kernel();
        let core = emit_core(&kernel, &options(Architecture::Sse4_2, Threads::Auto), &[]);
        assert!(core.contains("#include <unistd.h>"));
        assert!(core.contains("sysconf(_SC_NPROCESSORS_ONLN)"));
        assert!(core.contains("processors < 1 ? 1 : (unsigned int)processors"));
    }

    #[test]
    fn binding_headers_are_included_at_the_end() {
        let kernel = kernel();
        let files = vec!["vecpy_scale_cpp.h".to_string(), "vecpy_scale_python.h".to_string()];
        let core = emit_core(&kernel, &options(Architecture::Sse4_2, Threads::Count(1)), &files);
        let run = core.find("static bool run").unwrap();
        let cpp = core.find("#include \"vecpy_scale_cpp.h\"").unwrap();
        let py = core.find("#include \"vecpy_scale_python.h\"").unwrap();
        assert!(run < cpp);
        assert!(cpp < py);
    }
}
