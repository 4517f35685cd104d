//! Options controlling the compilation pipeline.

use serde::{Deserialize, Serialize};

use crate::arch::{Architecture, DataType};
use crate::error::ConfigError;

/// A foreign-language entry surface to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    /// Every surface below.
    All,
    /// `extern "C"` entry point.
    Cpp,
    /// Dynamic-language buffer-protocol module (CPython wire level).
    Dynamic,
    /// Managed-runtime direct-buffer entry (JNI wire level).
    Managed,
}

impl Binding {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "all" => Some(Binding::All),
            "cpp" | "c++" => Some(Binding::Cpp),
            "dynamic" | "python" => Some(Binding::Dynamic),
            "managed" | "java" => Some(Binding::Managed),
            _ => None,
        }
    }
}

/// Worker-thread count baked into the emitted driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threads {
    /// Detect the processor count at runtime.
    Auto,
    /// A fixed positive count.
    Count(u32),
}

/// Options for [`vectorize`](crate::vectorize).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub arch: Architecture,
    pub dtype: DataType,
    /// Requested entry surfaces; `Binding::All` expands to every surface.
    pub bindings: Vec<Binding>,
    pub threads: Threads,
    /// Owning class name for the managed-runtime binding.
    pub managed_package: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            arch: Architecture::Avx2,
            dtype: DataType::Float,
            bindings: vec![Binding::Cpp],
            threads: Threads::Auto,
            managed_package: "VecPy".to_string(),
        }
    }
}

impl Options {
    /// Reject configurations before any code is generated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.arch {
            Architecture::Generic | Architecture::Sse4_2 | Architecture::Avx2 => {}
            other => {
                return Err(ConfigError::UnsupportedArchitecture { arch: other.name() });
            }
        }
        if self.bindings.is_empty() {
            return Err(ConfigError::NoBindings);
        }
        if self.threads == Threads::Count(0) {
            return Err(ConfigError::InvalidThreads);
        }
        Ok(())
    }

    /// Whether a concrete binding surface was requested.
    pub fn wants(&self, binding: Binding) -> bool {
        self.bindings.contains(&Binding::All) || self.bindings.contains(&binding)
    }
}
