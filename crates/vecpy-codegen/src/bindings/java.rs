//! Managed-runtime direct-buffer entry point (JNI wire level).
//!
//! Kernel arguments arrive as direct byte buffers (uniforms by value). The
//! wrapper rejects non-direct buffers, validates every capacity against
//! `N * stride * sizeof(element)`, and fails cleanly on hosts without
//! direct-buffer support. `allocate`/`release` wrap `posix_memalign` so
//! callers can satisfy the driver's alignment precondition.

use vecpy_core::{ArgFilter, Kernel};

use crate::arch::DataType;
use crate::bindings::length_argument;
use crate::fmt::SourceWriter;

/// Alignment of allocated buffers, in bytes. Wide enough for every
/// supported vector width.
const ALLOC_ALIGNMENT: u32 = 32;

/// Emit `vecpy_<name>_java.h`. `class_name` is the owning managed class
/// (dots allowed, mangled per JNI rules).
pub fn emit_java(kernel: &Kernel, dtype: DataType, class_name: &str) -> String {
    let mut w = SourceWriter::new();
    let ctype = dtype.ctype();
    let mangled = class_name.replace('.', "_");
    let args = kernel.arguments(ArgFilter::default());
    let buffers: Vec<_> = args.iter().filter(|arg| !arg.is_uniform()).collect();
    let uniforms: Vec<_> = args.iter().filter(|arg| arg.is_uniform()).collect();
    let uniform_type = match dtype {
        DataType::Float => "jfloat",
        DataType::Uint32 => "jint",
    };

    w.line("//Java entry point");
    w.line("//Includes");
    w.line("#include <jni.h>");
    w.line("#include <stdlib.h>");
    w.blank();

    w.line("//Wrapper for the core function");
    let params: Vec<String> = buffers
        .iter()
        .map(|arg| format!("jobject buf_{}", arg.name))
        .chain(uniforms.iter().map(|arg| format!("{} {}", uniform_type, arg.name)))
        .collect();
    w.line(format!(
        "extern \"C\" JNIEXPORT jboolean JNICALL Java_{}_{}(JNIEnv* env, jclass cls, {}) {{",
        mangled,
        kernel.name,
        params.join(", ")
    ));
    w.indent();
    w.line("//Make sure the buffers are directly allocated");
    w.line("jclass byteBuffer = env->FindClass(\"java/nio/ByteBuffer\");");
    w.line("jmethodID isDirect = env->GetMethodID(byteBuffer, \"isDirect\", \"()Z\");");
    for arg in &buffers {
        w.line(format!(
            "if(!env->CallBooleanMethod(buf_{name}, isDirect)) {{ printf(\"Buffer not direct ({name})\\n\"); return false; }}",
            name = arg.name
        ));
    }
    w.line("//Number of elements to process");
    if let Some(length_arg) = length_argument(kernel) {
        w.line(format!(
            "jlong bytes = env->GetDirectBufferCapacity(buf_{});",
            length_arg.name
        ));
        w.line("if(bytes == -1) { printf(\"JVM doesn't support direct buffers\\n\"); return false; }");
        w.line(format!(
            "uint64_t N = (uint64_t)bytes / ({} * sizeof({}));",
            length_arg.stride(),
            ctype
        ));
    }
    w.line("//Check length for all buffers");
    for arg in &buffers {
        w.line(format!(
            "if(env->GetDirectBufferCapacity(buf_{name}) != (jlong)(N * {stride} * sizeof({ctype}))) {{ printf(\"Java buffer sizes don't match\\n\"); return false; }}",
            name = arg.name,
            stride = arg.stride(),
            ctype = ctype
        ));
    }
    w.line("//Extract input arrays from buffers");
    w.line("KernelArgs args;");
    for arg in &buffers {
        w.line(format!(
            "args.{name} = ({ctype}*)env->GetDirectBufferAddress(buf_{name});",
            name = arg.name,
            ctype = ctype
        ));
        w.line(format!(
            "if(args.{name} == NULL) {{ printf(\"Error retrieving Java buffers\\n\"); return false; }}",
            name = arg.name
        ));
    }
    for arg in &uniforms {
        w.line(format!("args.{name} = {name};", name = arg.name));
    }
    w.line("args.N = N;");
    w.line("//Run the kernel");
    w.line("return run(&args);");
    w.unindent();
    w.line("}");
    w.blank();

    w.line("//Aligned buffer allocation");
    w.line(format!(
        "extern \"C\" JNIEXPORT jobject JNICALL Java_{}_allocate(JNIEnv* env, jclass cls, jlong N) {{",
        mangled
    ));
    w.indent();
    w.line("void* buffer = NULL;");
    w.line(format!(
        "if(posix_memalign(&buffer, {}, (size_t)N * sizeof({})) != 0) {{ printf(\"Error allocating aligned buffer\\n\"); return NULL; }}",
        ALLOC_ALIGNMENT, ctype
    ));
    w.line(format!(
        "return env->NewDirectByteBuffer(buffer, N * sizeof({}));",
        ctype
    ));
    w.unindent();
    w.line("}");
    w.blank();

    w.line("//Aligned buffer release");
    w.line(format!(
        "extern \"C\" JNIEXPORT void JNICALL Java_{}_release(JNIEnv* env, jclass cls, jobject buffer) {{",
        mangled
    ));
    w.indent();
    w.line("void* data = env->GetDirectBufferAddress(buffer);");
    w.line("if(data != NULL) { free(data); }");
    w.unindent();
    w.line("}");
    w.blank();
    w.finish()
}
