//! Per-(architecture, datatype) intrinsic translators.
//!
//! A [`Translator`] maps IR operators onto emitted intrinsic sequences for
//! one SIMD target. Each implementation matches the operator enums
//! exhaustively; combinations with no emission path report through the
//! single [`Translator::unsupported`] sentinel, so a kernel using an
//! unavailable operator fails with a precise (op, arch, dtype) diagnostic.
//!
//! Operators without a native SIMD form fall back to a scalar-lane loop: the
//! operand vectors are stored to the aligned scratch buffers, the scalar
//! library function runs per lane, and the result is reloaded. The triple is
//! emitted explicitly rather than left for the native toolchain to discover.

pub mod avx2;
pub mod sse4;

use std::fmt::Display;

use vecpy_core::{BinOp, CmpOp, LitValue, UnOp};

use crate::arch::{Architecture, DataType};
use crate::error::{BackEndError, ConfigError};
use crate::fmt::SourceWriter;

/// First scratch buffer, also the result carrier of lane fallbacks.
pub const SPILL_A: &str = "spill0";
/// Second scratch buffer, for right-hand operands.
pub const SPILL_B: &str = "spill1";

/// Right-hand operand of a binary operation. Shifts with a literal
/// right-hand side switch to the shift-immediate intrinsics.
#[derive(Debug, Clone, Copy)]
pub struct RhsOperand<'a> {
    pub name: &'a str,
    pub literal: Option<LitValue>,
}

impl<'a> RhsOperand<'a> {
    pub fn var(name: &'a str) -> Self {
        RhsOperand {
            name,
            literal: None,
        }
    }

    /// The literal as a shift-immediate count, when present.
    pub fn shift_immediate(&self) -> Option<u32> {
        self.literal.and_then(LitValue::as_u32)
    }
}

/// One (architecture, datatype) code emission target.
pub trait Translator {
    fn arch(&self) -> Architecture;
    fn dtype(&self) -> DataType;

    /// The C vector register type (`__m128`, `__m256i`, ...).
    fn vec_type(&self) -> &'static str;

    /// The movemask intrinsic the while-loop emitter tests live lanes with.
    fn test_fn(&self) -> &'static str;

    /// Declare the ISA-specific constants (`MASK_FALSE`, `MASK_TRUE`, and
    /// for integer targets `SIGN_BITS` plus one `MASK_LANE_i` per lane).
    fn setup(&self, w: &mut SourceWriter);

    /// `dst = broadcast(value)`.
    fn set(&self, w: &mut SourceWriter, dst: &str, value: &str);

    /// Aligned vector load.
    fn load(&self, w: &mut SourceWriter, dst: &str, addr: &str);

    /// Aligned vector store.
    fn store(&self, w: &mut SourceWriter, addr: &str, src: &str);

    /// `output = (mask AND input) OR (NOT mask AND output)`, collapsing to a
    /// plain copy when the mask is the `MASK_TRUE` sentinel.
    fn blend(&self, w: &mut SourceWriter, input: &str, output: &str, mask: &str);

    fn bin(
        &self,
        w: &mut SourceWriter,
        op: BinOp,
        dst: &str,
        left: &str,
        right: RhsOperand<'_>,
    ) -> Result<(), BackEndError>;

    fn unary(
        &self,
        w: &mut SourceWriter,
        op: UnOp,
        dst: &str,
        operand: &str,
    ) -> Result<(), BackEndError>;

    fn cmp(
        &self,
        w: &mut SourceWriter,
        op: CmpOp,
        dst: &str,
        left: &str,
        right: &str,
    ) -> Result<(), BackEndError>;

    /// Per-lane gather from a stride-k argument: lane `i` reads
    /// `array[stride*i + index[i]]`.
    fn array_read(&self, w: &mut SourceWriter, dst: &str, array: &str, index: &str, stride: u32);

    /// Per-lane scatter into a stride-k argument.
    fn array_write(&self, w: &mut SourceWriter, src: &str, array: &str, index: &str, stride: u32);

    /// Operators routed through the scratch buffers; drives whether the
    /// vector emitter declares them.
    fn bin_uses_scratch(&self, op: BinOp) -> bool;
    fn unary_uses_scratch(&self, op: UnOp) -> bool;
    fn array_access_uses_scratch(&self) -> bool;

    /// The one "not implemented" sentinel every missing table entry reports
    /// through.
    fn unsupported(&self, op: &dyn Display) -> BackEndError {
        BackEndError::UnsupportedOp {
            op: op.to_string(),
            arch: self.arch().name(),
            dtype: self.dtype().ctype(),
        }
    }
}

/// Pick the translator for an (arch, dtype) pair.
pub fn select(arch: Architecture, dtype: DataType) -> Result<Box<dyn Translator>, ConfigError> {
    match (arch, dtype) {
        (Architecture::Sse4_2, DataType::Float) => Ok(Box::new(sse4::Sse4F32)),
        (Architecture::Sse4_2, DataType::Uint32) => Ok(Box::new(sse4::Sse4U32)),
        (Architecture::Avx2, DataType::Float) => Ok(Box::new(avx2::Avx2F32)),
        (Architecture::Avx2, DataType::Uint32) => Ok(Box::new(avx2::Avx2U32)),
        (other, _) => Err(ConfigError::UnsupportedArchitecture { arch: other.name() }),
    }
}

// ---------------------------------------------------------------------------
// Shared emission helpers
// ---------------------------------------------------------------------------

/// `dst = func(a);`
pub(crate) fn call_1(w: &mut SourceWriter, dst: &str, func: &str, a: &str) {
    w.line(format!("{} = {}({});", dst, func, a));
}

/// `dst = func(a, b);`
pub(crate) fn call_2(w: &mut SourceWriter, dst: &str, func: &str, a: &str, b: &str) {
    w.line(format!("{} = {}({}, {});", dst, func, a, b));
}

/// `dst = func(a, b, c);`
pub(crate) fn call_3(w: &mut SourceWriter, dst: &str, func: &str, a: &str, b: &str, c: &str) {
    w.line(format!("{} = {}({}, {}, {});", dst, func, a, b, c));
}

/// `func(a, b);`
pub(crate) fn stmt_2(w: &mut SourceWriter, func: &str, a: &str, b: &str) {
    w.line(format!("{}({}, {});", func, a, b));
}

/// The blend shape shared by all targets, specialized by the three logical
/// intrinsics of the register class.
pub(crate) fn blend_with(
    w: &mut SourceWriter,
    input: &str,
    output: &str,
    mask: &str,
    or_: &str,
    and_: &str,
    andnot_: &str,
) {
    if mask == "MASK_TRUE" {
        w.line(format!("{} = {};", output, input));
    } else {
        w.line(format!(
            "{} = {}({}({}, {}), {}({}, {}));",
            output, or_, and_, mask, input, andnot_, mask, output
        ));
    }
}

/// Scalar-lane fallback through the scratch buffers. Parameterized by the
/// store/load intrinsics of the register class.
pub(crate) struct Spill {
    pub store: &'static str,
    pub load: &'static str,
    /// Pointer cast for integer register classes (`(__m128i*)`).
    pub ptr_cast: &'static str,
    /// Cast applied to spilled index lanes before array indexing.
    pub index_cast: &'static str,
    pub size: u32,
}

impl Spill {
    fn store_line(&self, w: &mut SourceWriter, buf: &str, vec: &str) {
        w.line(format!("{}({}{}, {});", self.store, self.ptr_cast, buf, vec));
    }

    fn load_line(&self, w: &mut SourceWriter, dst: &str, buf: &str) {
        w.line(format!("{} = {}({}{});", dst, self.load, self.ptr_cast, buf));
    }

    /// store, per-lane call, reload: `dst = func(a)` lanewise.
    pub fn unary(&self, w: &mut SourceWriter, func: &str, dst: &str, a: &str) {
        self.store_line(w, SPILL_A, a);
        for lane in 0..self.size {
            w.line(format!(
                "{buf}[{lane}] = {func}({buf}[{lane}]);",
                buf = SPILL_A,
                lane = lane,
                func = func
            ));
        }
        self.load_line(w, dst, SPILL_A);
    }

    /// store both operands, per-lane call, reload.
    pub fn binary(&self, w: &mut SourceWriter, func: &str, dst: &str, a: &str, b: &str) {
        self.store_line(w, SPILL_A, a);
        self.store_line(w, SPILL_B, b);
        for lane in 0..self.size {
            w.line(format!(
                "{a}[{lane}] = {func}({a}[{lane}], {b}[{lane}]);",
                a = SPILL_A,
                b = SPILL_B,
                lane = lane,
                func = func
            ));
        }
        self.load_line(w, dst, SPILL_A);
    }

    /// Per-lane gather: spill the index vector, read through the base
    /// pointer, reload the result.
    pub fn array_read(
        &self,
        w: &mut SourceWriter,
        dst: &str,
        array: &str,
        index: &str,
        stride: u32,
    ) {
        self.store_line(w, SPILL_A, index);
        for lane in 0..self.size {
            w.line(format!(
                "{buf}[{lane}] = {array}[{offset} + {cast}{buf}[{lane}]];",
                buf = SPILL_A,
                lane = lane,
                array = array,
                offset = stride * lane,
                cast = self.index_cast
            ));
        }
        self.load_line(w, dst, SPILL_A);
    }

    /// Per-lane scatter: spill index and value vectors, write through the
    /// base pointer.
    pub fn array_write(
        &self,
        w: &mut SourceWriter,
        src: &str,
        array: &str,
        index: &str,
        stride: u32,
    ) {
        self.store_line(w, SPILL_A, index);
        self.store_line(w, SPILL_B, src);
        for lane in 0..self.size {
            w.line(format!(
                "{array}[{offset} + {cast}{idx}[{lane}]] = {val}[{lane}];",
                array = array,
                offset = stride * lane,
                cast = self.index_cast,
                idx = SPILL_A,
                val = SPILL_B,
                lane = lane
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_covers_the_four_simd_targets() {
        for (arch, dtype) in [
            (Architecture::Sse4_2, DataType::Float),
            (Architecture::Sse4_2, DataType::Uint32),
            (Architecture::Avx2, DataType::Float),
            (Architecture::Avx2, DataType::Uint32),
        ] {
            let translator = select(arch, dtype).unwrap();
            assert_eq!(translator.arch(), arch);
            assert_eq!(translator.dtype(), dtype);
        }
        assert!(select(Architecture::Generic, DataType::Float).is_err());
        assert!(select(Architecture::Sse2, DataType::Float).is_err());
    }

    #[test]
    fn blend_collapses_for_the_true_mask() {
        let mut w = SourceWriter::new();
        blend_with(
            &mut w,
            "in",
            "out",
            "MASK_TRUE",
            "_mm_or_ps",
            "_mm_and_ps",
            "_mm_andnot_ps",
        );
        assert_eq!(w.finish(), "out = in;\n");

        let mut w = SourceWriter::new();
        blend_with(
            &mut w,
            "in",
            "out",
            "mask007",
            "_mm_or_ps",
            "_mm_and_ps",
            "_mm_andnot_ps",
        );
        assert_eq!(
            w.finish(),
            "out = _mm_or_ps(_mm_and_ps(mask007, in), _mm_andnot_ps(mask007, out));\n"
        );
    }

    #[test]
    fn spill_emits_store_call_load_triple() {
        let spill = Spill {
            store: "_mm_store_ps",
            load: "_mm_load_ps",
            ptr_cast: "",
            index_cast: "(int)",
            size: 4,
        };
        let mut w = SourceWriter::new();
        spill.binary(&mut w, "fmod", "var000", "a", "b");
        let code = w.finish();
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(lines[0], "_mm_store_ps(spill0, a);");
        assert_eq!(lines[1], "_mm_store_ps(spill1, b);");
        assert_eq!(lines[2], "spill0[0] = fmod(spill0[0], spill1[0]);");
        assert_eq!(lines[5], "spill0[3] = fmod(spill0[3], spill1[3]);");
        assert_eq!(lines[6], "var000 = _mm_load_ps(spill0);");
    }

    #[test]
    fn spill_array_read_offsets_by_stride() {
        let spill = Spill {
            store: "_mm_store_ps",
            load: "_mm_load_ps",
            ptr_cast: "",
            index_cast: "(int)",
            size: 4,
        };
        let mut w = SourceWriter::new();
        spill.array_read(&mut w, "var001", "pair", "var000", 2);
        let code = w.finish();
        assert!(code.contains("spill0[0] = pair[0 + (int)spill0[0]];"));
        assert!(code.contains("spill0[3] = pair[6 + (int)spill0[3]];"));
    }

    #[test]
    fn shift_immediate_requires_an_integer_literal() {
        let with_lit = RhsOperand {
            name: "lit001",
            literal: Some(LitValue::new(3.0)),
        };
        assert_eq!(with_lit.shift_immediate(), Some(3));

        let fractional = RhsOperand {
            name: "lit002",
            literal: Some(LitValue::new(0.5)),
        };
        assert_eq!(fractional.shift_immediate(), None);
        assert_eq!(RhsOperand::var("x").shift_immediate(), None);
    }
}
