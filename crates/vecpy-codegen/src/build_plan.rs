//! The native-toolchain invocation contract.
//!
//! Compiling the emitted C++ into a shared library is the host's job; the
//! pipeline hands back a [`BuildPlan`] describing the exact invocation: the
//! architecture flag, the binding-specific include arguments, and the
//! platform-suffixed output name.

use serde::{Deserialize, Serialize};

use crate::options::{Binding, Options};

/// A description of the compiler command that turns the emitted sources
/// into the final shared library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub compiler: String,
    pub sources: Vec<String>,
    /// Baseline flags plus the architecture flag.
    pub flags: Vec<String>,
    /// Host-environment include/link arguments per requested binding; these
    /// reference host variables (`JAVA_HOME`, `python3-config`) the caller
    /// resolves.
    pub binding_flags: Vec<String>,
    pub output: String,
}

impl BuildPlan {
    pub fn new(kernel_name: &str, options: &Options) -> Self {
        let mut flags = vec![
            "-O3".to_string(),
            "-fPIC".to_string(),
            "-shared".to_string(),
            "-pthread".to_string(),
        ];
        let arch_flag = options.arch.flag();
        if !arch_flag.is_empty() {
            flags.push(arch_flag.to_string());
        }
        let mut binding_flags = Vec::new();
        if options.wants(Binding::Dynamic) {
            binding_flags.push("$(python3-config --includes)".to_string());
        }
        if options.wants(Binding::Managed) {
            binding_flags.push("-I${JAVA_HOME}/include".to_string());
            binding_flags.push("-I${JAVA_HOME}/include/linux".to_string());
        }
        BuildPlan {
            compiler: "g++".to_string(),
            sources: vec![crate::core_file(kernel_name)],
            flags,
            binding_flags,
            output: shared_library_name(kernel_name),
        }
    }

    /// The full command line, for display and shell use.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.compiler.clone()];
        parts.extend(self.flags.iter().cloned());
        parts.extend(self.binding_flags.iter().cloned());
        parts.extend(self.sources.iter().cloned());
        parts.push("-o".to_string());
        parts.push(self.output.clone());
        parts.join(" ")
    }
}

/// `vecpy_<name>.<platform shared-library extension>`.
pub fn shared_library_name(kernel_name: &str) -> String {
    let extension = if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    };
    format!("vecpy_{}.{}", kernel_name, extension)
}
