//! Target architectures and element datatypes.
//!
//! An [`Architecture`] is identified by a level, a display name, a vector
//! width in lanes, and the compiler flag that enables it. Levels group into
//! families: `level / 100 == 1` is generic C++, `== 2` is x86 SIMD. The full
//! x86 ladder is listed for configuration purposes; code generation accepts
//! `Generic`, `Sse4_2`, and `Avx2`.

use serde::{Deserialize, Serialize};

use vecpy_core::LitValue;

use crate::error::BackEndError;

/// A compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Generic,
    Sse,
    Sse2,
    Sse3,
    Ssse3,
    #[serde(rename = "sse4.1")]
    Sse4_1,
    #[serde(rename = "sse4.2")]
    Sse4_2,
    Avx,
    Avx2,
}

impl Architecture {
    pub fn level(self) -> u32 {
        match self {
            Architecture::Generic => 100,
            Architecture::Sse => 200,
            Architecture::Sse2 => 201,
            Architecture::Sse3 => 202,
            Architecture::Ssse3 => 203,
            Architecture::Sse4_1 => 204,
            Architecture::Sse4_2 => 205,
            Architecture::Avx => 206,
            Architecture::Avx2 => 207,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Architecture::Generic => "Generic",
            Architecture::Sse => "SSE",
            Architecture::Sse2 => "SSE2",
            Architecture::Sse3 => "SSE3",
            Architecture::Ssse3 => "SSSE3",
            Architecture::Sse4_1 => "SSE4.1",
            Architecture::Sse4_2 => "SSE4.2",
            Architecture::Avx => "AVX",
            Architecture::Avx2 => "AVX2",
        }
    }

    /// Vector width in lanes.
    pub fn size(self) -> u32 {
        match self {
            Architecture::Generic => 1,
            Architecture::Sse
            | Architecture::Sse2
            | Architecture::Sse3
            | Architecture::Ssse3
            | Architecture::Sse4_1
            | Architecture::Sse4_2 => 4,
            Architecture::Avx | Architecture::Avx2 => 8,
        }
    }

    /// Compiler flag enabling the instruction set.
    pub fn flag(self) -> &'static str {
        match self {
            Architecture::Generic => "",
            Architecture::Sse => "-msse",
            Architecture::Sse2 => "-msse2",
            Architecture::Sse3 => "-msse3",
            Architecture::Ssse3 => "-mssse3",
            Architecture::Sse4_1 => "-msse4.1",
            Architecture::Sse4_2 => "-msse4.2",
            Architecture::Avx => "-mavx",
            Architecture::Avx2 => "-mavx2",
        }
    }

    pub fn is_generic(self) -> bool {
        self.level() / 100 == 1
    }

    pub fn is_intel(self) -> bool {
        self.level() / 100 == 2
    }

    /// Parse a user-supplied architecture name (`avx2`, `SSE4.2`, ...).
    pub fn parse(text: &str) -> Option<Self> {
        let arch = match text.to_ascii_lowercase().as_str() {
            "generic" => Architecture::Generic,
            "sse" => Architecture::Sse,
            "sse2" => Architecture::Sse2,
            "sse3" => Architecture::Sse3,
            "ssse3" => Architecture::Ssse3,
            "sse4.1" | "sse4_1" => Architecture::Sse4_1,
            "sse4.2" | "sse4_2" | "sse4" => Architecture::Sse4_2,
            "avx" => Architecture::Avx,
            "avx2" => Architecture::Avx2,
            _ => return None,
        };
        Some(arch)
    }
}

/// Element datatype of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float,
    Uint32,
}

impl DataType {
    /// The C element type.
    pub fn ctype(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Uint32 => "uint32_t",
        }
    }

    /// Element size in bytes.
    pub fn size_of(self) -> u32 {
        4
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DataType::Float)
    }

    pub fn is_integral(self) -> bool {
        matches!(self, DataType::Uint32)
    }

    /// Format a literal for emitted code: fixed-point with an `f` suffix for
    /// floats, zero-padded hex for uint32.
    pub fn format_literal(self, value: LitValue) -> Result<String, BackEndError> {
        match self {
            DataType::Float => Ok(format!("{:.7}f", value.get())),
            DataType::Uint32 => {
                let bits = value.as_u32().ok_or(BackEndError::InvalidLiteral {
                    value: value.get(),
                    dtype: self.ctype(),
                })?;
                Ok(format!("0x{:08x}", bits))
            }
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "float" | "f32" => Some(DataType::Float),
            "uint32" | "u32" => Some(DataType::Uint32),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_classification_follows_levels() {
        assert!(Architecture::Generic.is_generic());
        assert!(!Architecture::Generic.is_intel());
        for arch in [Architecture::Sse, Architecture::Sse4_2, Architecture::Avx2] {
            assert!(arch.is_intel());
            assert!(!arch.is_generic());
        }
    }

    #[test]
    fn sizes_and_flags() {
        assert_eq!(Architecture::Generic.size(), 1);
        assert_eq!(Architecture::Sse4_2.size(), 4);
        assert_eq!(Architecture::Avx2.size(), 8);
        assert_eq!(Architecture::Sse4_2.flag(), "-msse4.2");
        assert_eq!(Architecture::Avx2.flag(), "-mavx2");
        assert_eq!(Architecture::Generic.flag(), "");
    }

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!(Architecture::parse("AVX2"), Some(Architecture::Avx2));
        assert_eq!(Architecture::parse("sse4.2"), Some(Architecture::Sse4_2));
        assert_eq!(Architecture::parse("sse4"), Some(Architecture::Sse4_2));
        assert_eq!(Architecture::parse("riscv"), None);
        assert_eq!(DataType::parse("float"), Some(DataType::Float));
        assert_eq!(DataType::parse("uint32"), Some(DataType::Uint32));
    }

    #[test]
    fn float_literals_use_fixed_point_with_suffix() {
        let dt = DataType::Float;
        assert_eq!(dt.format_literal(LitValue::new(2.5)).unwrap(), "2.5000000f");
        assert_eq!(dt.format_literal(LitValue::new(1.0)).unwrap(), "1.0000000f");
        assert_eq!(
            dt.format_literal(LitValue::new(-1.5)).unwrap(),
            "-1.5000000f"
        );
    }

    #[test]
    fn uint_literals_are_hex() {
        let dt = DataType::Uint32;
        assert_eq!(dt.format_literal(LitValue::new(255.0)).unwrap(), "0x000000ff");
        assert_eq!(dt.format_literal(LitValue::new(0.0)).unwrap(), "0x00000000");
        assert!(matches!(
            dt.format_literal(LitValue::new(2.5)),
            Err(BackEndError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            dt.format_literal(LitValue::new(-1.0)),
            Err(BackEndError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&Architecture::Sse4_2).unwrap(),
            "\"sse4.2\""
        );
        assert_eq!(serde_json::to_string(&Architecture::Avx2).unwrap(), "\"avx2\"");
        assert_eq!(serde_json::to_string(&DataType::Uint32).unwrap(), "\"uint32\"");
        let back: Architecture = serde_json::from_str("\"sse4.2\"").unwrap();
        assert_eq!(back, Architecture::Sse4_2);
    }
}
