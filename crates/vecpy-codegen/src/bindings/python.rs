//! Dynamic-language buffer-protocol entry point (CPython wire level).
//!
//! The emitted module exposes the kernel as `<name>(buffer, ..., uniform,
//! ...)`. Buffers are requested writable when the kernel writes them, `N`
//! comes from the length-defining buffer, and every buffer length is
//! validated against `N * stride * sizeof(element)` before `run` is called.

use vecpy_core::{ArgFilter, Kernel};

use crate::arch::DataType;
use crate::bindings::length_argument;
use crate::fmt::SourceWriter;

/// Emit `vecpy_<name>_python.h`.
pub fn emit_python(kernel: &Kernel, dtype: DataType) -> String {
    let mut w = SourceWriter::new();
    let ctype = dtype.ctype();
    let module_name = format!("VecPy_{}", kernel.name);
    let args = kernel.arguments(ArgFilter::default());
    let buffers: Vec<_> = args.iter().filter(|arg| !arg.is_uniform()).collect();
    let uniforms: Vec<_> = args.iter().filter(|arg| arg.is_uniform()).collect();

    w.line("//Python entry point");
    w.line("//Includes");
    w.line("#include <Python.h>");
    w.blank();

    w.line("//Wrapper for the core function");
    w.line(format!(
        "static PyObject* {}_run(PyObject* self, PyObject* pyArgs) {{",
        kernel.name
    ));
    w.indent();
    w.line("//Handles to Python objects and buffers");
    let obj_decls: Vec<String> = buffers
        .iter()
        .map(|arg| format!("*obj_{}", arg.name))
        .collect();
    let buf_decls: Vec<String> = buffers
        .iter()
        .map(|arg| format!("buf_{}", arg.name))
        .collect();
    w.line(format!("PyObject {};", obj_decls.join(", ")));
    w.line(format!("Py_buffer {};", buf_decls.join(", ")));
    for arg in &uniforms {
        w.line(format!("{} {};", ctype, arg.name));
    }

    w.line("//Get Python objects");
    let format: String = buffers
        .iter()
        .map(|_| "O")
        .chain(uniforms.iter().map(|_| match dtype {
            DataType::Float => "f",
            DataType::Uint32 => "I",
        }))
        .collect();
    let targets: Vec<String> = buffers
        .iter()
        .map(|arg| format!("&obj_{}", arg.name))
        .chain(uniforms.iter().map(|arg| format!("&{}", arg.name)))
        .collect();
    w.line(format!(
        "if(!PyArg_ParseTuple(pyArgs, \"{}\", {})) {{ printf(\"Error retrieving Python objects\\n\"); return NULL; }}",
        format,
        targets.join(", ")
    ));

    w.line("//Get Python buffers from Python objects");
    for arg in &buffers {
        let flags = if arg.output { "PyBUF_WRITABLE" } else { "0" };
        w.line(format!(
            "if(PyObject_GetBuffer(obj_{name}, &buf_{name}, {flags}) != 0) {{ printf(\"Error retrieving Python buffers\\n\"); return NULL; }}",
            name = arg.name,
            flags = flags
        ));
    }

    w.line("//Number of elements to process");
    if let Some(length_arg) = length_argument(kernel) {
        w.line(format!(
            "uint64_t N = buf_{}.len / ({} * sizeof({}));",
            length_arg.name,
            length_arg.stride(),
            ctype
        ));
    }

    w.line("//Check length for all buffers");
    for arg in &buffers {
        w.line(format!(
            "if((uint64_t)buf_{name}.len != N * {stride} * sizeof({ctype})) {{ printf(\"Python buffer sizes don't match\\n\"); return NULL; }}",
            name = arg.name,
            stride = arg.stride(),
            ctype = ctype
        ));
    }

    w.line("//Extract input arrays from buffers");
    w.line("KernelArgs args;");
    for arg in &buffers {
        w.line(format!(
            "args.{name} = ({ctype}*)buf_{name}.buf;",
            name = arg.name,
            ctype = ctype
        ));
    }
    for arg in &uniforms {
        w.line(format!("args.{name} = {name};", name = arg.name));
    }
    w.line("args.N = N;");

    w.line("//Run the kernel");
    w.line("bool result = run(&args);");
    w.line("//Release buffers");
    for arg in &buffers {
        w.line(format!("PyBuffer_Release(&buf_{});", arg.name));
    }
    w.line("//Return the result");
    w.line("if(result) { Py_RETURN_TRUE; } else { printf(\"Kernel reported failure\\n\"); Py_RETURN_FALSE; }");
    w.unindent();
    w.line("}");
    w.blank();

    w.line("//Module manifest");
    w.line("static PyMethodDef module_methods[] = {");
    w.indent();
    w.line("{");
    w.indent();
    w.line("//Export name, visible within Python");
    w.line(format!("\"{}\",", kernel.name));
    w.line("//Pointer to local implementation");
    w.line(format!("{}_run,", kernel.name));
    w.line("//Accept normal (not keyword) arguments");
    w.line("METH_VARARGS,");
    w.line("//Function documentation");
    w.line(format!("\"{}\"", escape_docstring(&kernel.docstring)));
    w.unindent();
    w.line("},{NULL, NULL, 0, NULL} //End of manifest entries");
    w.unindent();
    w.line("};");
    w.blank();

    w.line("//Module definition");
    w.line("static struct PyModuleDef module = {");
    w.indent();
    w.line("PyModuleDef_HEAD_INIT,");
    w.line("//Module name");
    w.line(format!("\"{}\",", module_name));
    w.line("//Module documentation");
    w.line(format!("\"VecPy module for {}.\",", kernel.name));
    w.line("//Other module info");
    w.line("-1, module_methods, NULL, NULL, NULL, NULL");
    w.unindent();
    w.line("};");
    w.blank();

    w.line("//Module initializer");
    w.line(format!(
        "PyMODINIT_FUNC PyInit_{}() {{ return PyModule_Create(&module); }}",
        module_name
    ));
    w.blank();
    w.finish()
}

/// Flatten the docstring into a single C string literal.
fn escape_docstring(docstring: &str) -> String {
    docstring
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .lines()
        .collect::<Vec<_>>()
        .join("\\n")
}
