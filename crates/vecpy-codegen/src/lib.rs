//! Code generation for elementwise SIMD kernels.
//!
//! This crate turns a lowered [`Kernel`] into C++ source text: a kernel
//! header with a scalar and a vector stream, a threaded driver, and one
//! entry header per requested foreign binding, plus the [`BuildPlan`]
//! describing how the host toolchain links it all into a shared library.
//!
//! # Modules
//!
//! - [`arch`] -- architectures and element datatypes
//! - [`translate`] -- per-(arch, dtype) intrinsic translators
//! - [`scalar`] / [`vector`] -- the two code streams
//! - [`driver`] -- kernel header and threaded `run` core
//! - [`bindings`] -- foreign-language entry surfaces
//! - [`build_plan`] -- the toolchain invocation contract

pub mod arch;
pub mod bindings;
pub mod build_plan;
pub mod driver;
pub mod error;
pub mod fmt;
pub mod options;
pub mod scalar;
pub mod translate;
pub mod vector;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vecpy_core::Kernel;
use vecpy_front::FunctionDef;

pub use arch::{Architecture, DataType};
pub use build_plan::BuildPlan;
pub use error::{BackEndError, ConfigError, Error};
pub use options::{Binding, Options, Threads};

// ---------------------------------------------------------------------------
// Artifact names
// ---------------------------------------------------------------------------

pub fn kernel_file(kernel_name: &str) -> String {
    format!("vecpy_{}_kernel.h", kernel_name)
}

pub fn core_file(kernel_name: &str) -> String {
    format!("vecpy_{}_core.cpp", kernel_name)
}

pub fn cpp_file(kernel_name: &str) -> String {
    format!("vecpy_{}_cpp.h", kernel_name)
}

pub fn python_file(kernel_name: &str) -> String {
    format!("vecpy_{}_python.h", kernel_name)
}

pub fn java_file(kernel_name: &str) -> String {
    format!("vecpy_{}_java.h", kernel_name)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One emitted source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedFile {
    pub name: String,
    pub contents: String,
}

/// Everything the pipeline produces for one kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifacts {
    /// Kernel name the file names derive from.
    pub kernel: String,
    pub files: Vec<EmittedFile>,
    pub build: BuildPlan,
}

impl Artifacts {
    /// Contents of an emitted file by name.
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.name == name)
            .map(|file| file.contents.as_str())
    }

    /// Persist every emitted file into `dir`, returning the written paths.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut paths = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = dir.join(&file.name);
            fs::write(&path, &file.contents)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Compile a function AST: lower it and emit every artifact.
pub fn vectorize(func: &FunctionDef, options: &Options) -> Result<Artifacts, Error> {
    options.validate()?;
    let kernel = vecpy_front::lower(func)?;
    emit(&kernel, options)
}

/// Emit every artifact for an already-lowered kernel.
pub fn emit(kernel: &Kernel, options: &Options) -> Result<Artifacts, Error> {
    options.validate()?;
    debug!(
        kernel = %kernel.name,
        arch = options.arch.name(),
        dtype = options.dtype.ctype(),
        "emitting kernel"
    );

    let mut files = vec![EmittedFile {
        name: kernel_file(&kernel.name),
        contents: driver::emit_kernel_header(kernel, options)?,
    }];

    let mut binding_files = Vec::new();
    if options.wants(Binding::Cpp) {
        let name = cpp_file(&kernel.name);
        files.push(EmittedFile {
            name: name.clone(),
            contents: bindings::cpp::emit_cpp(kernel, options.dtype),
        });
        binding_files.push(name);
    }
    if options.wants(Binding::Dynamic) {
        let name = python_file(&kernel.name);
        files.push(EmittedFile {
            name: name.clone(),
            contents: bindings::python::emit_python(kernel, options.dtype),
        });
        binding_files.push(name);
    }
    if options.wants(Binding::Managed) {
        let name = java_file(&kernel.name);
        files.push(EmittedFile {
            name: name.clone(),
            contents: bindings::java::emit_java(kernel, options.dtype, &options.managed_package),
        });
        binding_files.push(name);
    }

    files.push(EmittedFile {
        name: core_file(&kernel.name),
        contents: driver::emit_core(kernel, options, &binding_files),
    });

    let build = BuildPlan::new(&kernel.name, options);
    info!(kernel = %kernel.name, files = files.len(), "emission complete");
    Ok(Artifacts {
        kernel: kernel.name.clone(),
        files,
        build,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_the_kernel() {
        assert_eq!(kernel_file("poly"), "vecpy_poly_kernel.h");
        assert_eq!(core_file("poly"), "vecpy_poly_core.cpp");
        assert_eq!(cpp_file("poly"), "vecpy_poly_cpp.h");
        assert_eq!(python_file("poly"), "vecpy_poly_python.h");
        assert_eq!(java_file("poly"), "vecpy_poly_java.h");
    }

    #[test]
    fn write_to_persists_every_file() {
        let artifacts = Artifacts {
            kernel: "k".into(),
            files: vec![
                EmittedFile {
                    name: "vecpy_k_kernel.h".into(),
                    contents: "//a\n".into(),
                },
                EmittedFile {
                    name: "vecpy_k_core.cpp".into(),
                    contents: "//b\n".into(),
                },
            ],
            build: BuildPlan::new("k", &Options::default()),
        };
        let dir = tempfile::tempdir().unwrap();
        let paths = artifacts.write_to(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert!(path.exists());
        }
        assert_eq!(
            std::fs::read_to_string(&paths[0]).unwrap(),
            "//a\n"
        );
        assert_eq!(artifacts.file("vecpy_k_core.cpp"), Some("//b\n"));
        assert_eq!(artifacts.file("missing"), None);
    }
}
