//! SSE4.2 translators (4 lanes).
//!
//! Integer comparisons flip sign bits (XOR with `SIGN_BITS`) before the
//! signed compare intrinsics, because SSE has no unsigned compares. Variable
//! shifts have no SSE intrinsic and unroll per lane through the
//! `MASK_LANE_i` selects.

use vecpy_core::{BinOp, CmpOp, UnOp};

use crate::arch::{Architecture, DataType};
use crate::error::BackEndError;
use crate::fmt::SourceWriter;
use crate::translate::{blend_with, call_1, call_2, RhsOperand, Spill, Translator};

const ROUND_NEAREST: &str = "(_MM_FROUND_TO_NEAREST_INT | _MM_FROUND_NO_EXC)";
const ROUND_UP: &str = "(_MM_FROUND_TO_POS_INF | _MM_FROUND_NO_EXC)";
const ROUND_DOWN: &str = "(_MM_FROUND_TO_NEG_INF | _MM_FROUND_NO_EXC)";
const ROUND_ZERO: &str = "(_MM_FROUND_TO_ZERO | _MM_FROUND_NO_EXC)";

// ---------------------------------------------------------------------------
// 32-bit float
// ---------------------------------------------------------------------------

/// SSE4.2, 32-bit float.
pub struct Sse4F32;

impl Sse4F32 {
    fn spill(&self) -> Spill {
        Spill {
            store: "_mm_store_ps",
            load: "_mm_load_ps",
            ptr_cast: "",
            index_cast: "(int)",
            size: 4,
        }
    }
}

impl Translator for Sse4F32 {
    fn arch(&self) -> Architecture {
        Architecture::Sse4_2
    }

    fn dtype(&self) -> DataType {
        DataType::Float
    }

    fn vec_type(&self) -> &'static str {
        "__m128"
    }

    fn test_fn(&self) -> &'static str {
        "_mm_movemask_ps"
    }

    fn setup(&self, w: &mut SourceWriter) {
        w.line("const __m128 MASK_FALSE = _mm_setzero_ps();");
        w.line("const __m128 MASK_TRUE = _mm_cmpeq_ps(MASK_FALSE, MASK_FALSE);");
    }

    fn set(&self, w: &mut SourceWriter, dst: &str, value: &str) {
        call_1(w, dst, "_mm_set1_ps", value);
    }

    fn load(&self, w: &mut SourceWriter, dst: &str, addr: &str) {
        call_1(w, dst, "_mm_load_ps", addr);
    }

    fn store(&self, w: &mut SourceWriter, addr: &str, src: &str) {
        crate::translate::stmt_2(w, "_mm_store_ps", addr, src);
    }

    fn blend(&self, w: &mut SourceWriter, input: &str, output: &str, mask: &str) {
        blend_with(w, input, output, mask, "_mm_or_ps", "_mm_and_ps", "_mm_andnot_ps");
    }

    fn bin(
        &self,
        w: &mut SourceWriter,
        op: BinOp,
        dst: &str,
        left: &str,
        right: RhsOperand<'_>,
    ) -> Result<(), BackEndError> {
        let r = right.name;
        match op {
            BinOp::Add => call_2(w, dst, "_mm_add_ps", left, r),
            BinOp::Sub => call_2(w, dst, "_mm_sub_ps", left, r),
            BinOp::Mul => call_2(w, dst, "_mm_mul_ps", left, r),
            BinOp::Div => call_2(w, dst, "_mm_div_ps", left, r),
            BinOp::FloorDiv => {
                call_2(w, dst, "_mm_div_ps", left, r);
                call_2(w, dst, "_mm_round_ps", dst, ROUND_DOWN);
            }
            BinOp::Rem | BinOp::Fmod => self.spill().binary(w, "fmod", dst, left, r),
            BinOp::Pow => self.spill().binary(w, "pow", dst, left, r),
            BinOp::BitAnd | BinOp::BoolAnd => call_2(w, dst, "_mm_and_ps", left, r),
            BinOp::BitAndNot => call_2(w, dst, "_mm_andnot_ps", left, r),
            BinOp::BitOr | BinOp::BoolOr => call_2(w, dst, "_mm_or_ps", left, r),
            BinOp::BitXor => call_2(w, dst, "_mm_xor_ps", left, r),
            BinOp::Shl | BinOp::Shr => return Err(self.unsupported(&op)),
            BinOp::Max => call_2(w, dst, "_mm_max_ps", left, r),
            BinOp::Min => call_2(w, dst, "_mm_min_ps", left, r),
            BinOp::Atan2 => self.spill().binary(w, "atan2", dst, left, r),
            BinOp::Copysign => self.spill().binary(w, "copysign", dst, left, r),
            BinOp::Hypot => self.spill().binary(w, "hypot", dst, left, r),
        }
        Ok(())
    }

    fn unary(
        &self,
        w: &mut SourceWriter,
        op: UnOp,
        dst: &str,
        operand: &str,
    ) -> Result<(), BackEndError> {
        match op {
            UnOp::BitNot | UnOp::BoolNot => call_2(w, dst, "_mm_xor_ps", operand, "MASK_TRUE"),
            UnOp::Round => call_2(w, dst, "_mm_round_ps", operand, ROUND_NEAREST),
            UnOp::Ceil => call_2(w, dst, "_mm_round_ps", operand, ROUND_UP),
            UnOp::Floor => call_2(w, dst, "_mm_round_ps", operand, ROUND_DOWN),
            UnOp::Trunc => call_2(w, dst, "_mm_round_ps", operand, ROUND_ZERO),
            UnOp::Sqrt => call_1(w, dst, "_mm_sqrt_ps", operand),
            UnOp::Abs | UnOp::Fabs => self.spill().unary(w, "fabs", dst, operand),
            UnOp::Gamma => self.spill().unary(w, "tgamma", dst, operand),
            other => {
                // Remaining math-library calls have no SSE form; every one
                // maps to a scalar-lane loop over its own name.
                let func = other.function_name().ok_or_else(|| self.unsupported(&other))?;
                self.spill().unary(w, func, dst, operand);
            }
        }
        Ok(())
    }

    fn cmp(
        &self,
        w: &mut SourceWriter,
        op: CmpOp,
        dst: &str,
        left: &str,
        right: &str,
    ) -> Result<(), BackEndError> {
        let func = match op {
            CmpOp::Eq => "_mm_cmpeq_ps",
            CmpOp::Ne => "_mm_cmpneq_ps",
            CmpOp::Lt => "_mm_cmplt_ps",
            CmpOp::Le => "_mm_cmple_ps",
            CmpOp::Gt => "_mm_cmpgt_ps",
            CmpOp::Ge => "_mm_cmpge_ps",
        };
        call_2(w, dst, func, left, right);
        Ok(())
    }

    fn array_read(&self, w: &mut SourceWriter, dst: &str, array: &str, index: &str, stride: u32) {
        self.spill().array_read(w, dst, array, index, stride);
    }

    fn array_write(&self, w: &mut SourceWriter, src: &str, array: &str, index: &str, stride: u32) {
        self.spill().array_write(w, src, array, index, stride);
    }

    fn bin_uses_scratch(&self, op: BinOp) -> bool {
        matches!(
            op,
            BinOp::Rem | BinOp::Pow | BinOp::Atan2 | BinOp::Copysign | BinOp::Fmod | BinOp::Hypot
        )
    }

    fn unary_uses_scratch(&self, op: UnOp) -> bool {
        !matches!(
            op,
            UnOp::BitNot
                | UnOp::BoolNot
                | UnOp::Round
                | UnOp::Ceil
                | UnOp::Floor
                | UnOp::Trunc
                | UnOp::Sqrt
        )
    }

    fn array_access_uses_scratch(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// 32-bit unsigned int
// ---------------------------------------------------------------------------

/// SSE4.2, 32-bit unsigned int.
pub struct Sse4U32;

impl Sse4U32 {
    fn sign_flip(operand: &str) -> String {
        format!("_mm_xor_si128(SIGN_BITS, {})", operand)
    }
}

impl Translator for Sse4U32 {
    fn arch(&self) -> Architecture {
        Architecture::Sse4_2
    }

    fn dtype(&self) -> DataType {
        DataType::Uint32
    }

    fn vec_type(&self) -> &'static str {
        "__m128i"
    }

    fn test_fn(&self) -> &'static str {
        "_mm_movemask_epi8"
    }

    fn setup(&self, w: &mut SourceWriter) {
        w.line("const __m128i MASK_FALSE = _mm_setzero_si128();");
        w.line("const __m128i MASK_TRUE = _mm_cmpeq_epi32(MASK_FALSE, MASK_FALSE);");
        w.line("const __m128i SIGN_BITS = _mm_set1_epi32(0x80000000);");
        for lane in 0..4u32 {
            // set_epi32 takes the highest lane first.
            let slots: Vec<String> = (0..4u32)
                .rev()
                .map(|slot| if slot == lane { "1" } else { "0" }.to_string())
                .collect();
            w.line(format!(
                "const __m128i MASK_LANE_{} = _mm_xor_si128(MASK_TRUE, _mm_cmpeq_epi32(MASK_FALSE, _mm_set_epi32({})));",
                lane,
                slots.join(", ")
            ));
        }
    }

    fn set(&self, w: &mut SourceWriter, dst: &str, value: &str) {
        call_1(w, dst, "_mm_set1_epi32", value);
    }

    fn load(&self, w: &mut SourceWriter, dst: &str, addr: &str) {
        w.line(format!(
            "{} = _mm_load_si128((const __m128i*)({}));",
            dst, addr
        ));
    }

    fn store(&self, w: &mut SourceWriter, addr: &str, src: &str) {
        w.line(format!("_mm_store_si128((__m128i*)({}), {});", addr, src));
    }

    fn blend(&self, w: &mut SourceWriter, input: &str, output: &str, mask: &str) {
        blend_with(
            w,
            input,
            output,
            mask,
            "_mm_or_si128",
            "_mm_and_si128",
            "_mm_andnot_si128",
        );
    }

    fn bin(
        &self,
        w: &mut SourceWriter,
        op: BinOp,
        dst: &str,
        left: &str,
        right: RhsOperand<'_>,
    ) -> Result<(), BackEndError> {
        let r = right.name;
        match op {
            BinOp::Add => call_2(w, dst, "_mm_add_epi32", left, r),
            BinOp::Sub => call_2(w, dst, "_mm_sub_epi32", left, r),
            BinOp::Mul => call_2(w, dst, "_mm_mullo_epi32", left, r),
            BinOp::BitAnd | BinOp::BoolAnd => call_2(w, dst, "_mm_and_si128", left, r),
            BinOp::BitAndNot => call_2(w, dst, "_mm_andnot_si128", left, r),
            BinOp::BitOr | BinOp::BoolOr => call_2(w, dst, "_mm_or_si128", left, r),
            BinOp::BitXor => call_2(w, dst, "_mm_xor_si128", left, r),
            BinOp::Shl => self.shift(w, "_mm_slli_epi32", dst, left, right),
            BinOp::Shr => self.shift(w, "_mm_srli_epi32", dst, left, right),
            BinOp::Max => w.line(format!(
                "{} = _mm_xor_si128(SIGN_BITS, _mm_max_epi32({}, {}));",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(r)
            )),
            BinOp::Min => w.line(format!(
                "{} = _mm_xor_si128(SIGN_BITS, _mm_min_epi32({}, {}));",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(r)
            )),
            BinOp::Div
            | BinOp::FloorDiv
            | BinOp::Rem
            | BinOp::Pow
            | BinOp::Atan2
            | BinOp::Copysign
            | BinOp::Fmod
            | BinOp::Hypot => return Err(self.unsupported(&op)),
        }
        Ok(())
    }

    fn unary(
        &self,
        w: &mut SourceWriter,
        op: UnOp,
        dst: &str,
        operand: &str,
    ) -> Result<(), BackEndError> {
        match op {
            UnOp::BitNot | UnOp::BoolNot => {
                call_2(w, dst, "_mm_xor_si128", operand, "MASK_TRUE");
                Ok(())
            }
            other => Err(self.unsupported(&other)),
        }
    }

    fn cmp(
        &self,
        w: &mut SourceWriter,
        op: CmpOp,
        dst: &str,
        left: &str,
        right: &str,
    ) -> Result<(), BackEndError> {
        match op {
            CmpOp::Eq => call_2(w, dst, "_mm_cmpeq_epi32", left, right),
            CmpOp::Ne => w.line(format!(
                "{} = _mm_xor_si128(_mm_cmpeq_epi32({}, {}), MASK_TRUE);",
                dst, left, right
            )),
            CmpOp::Gt => w.line(format!(
                "{} = _mm_cmpgt_epi32({}, {});",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right)
            )),
            CmpOp::Lt => w.line(format!(
                "{} = _mm_cmplt_epi32({}, {});",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right)
            )),
            // le/ge are complements of the strict compares.
            CmpOp::Le => w.line(format!(
                "{} = _mm_xor_si128(_mm_cmpgt_epi32({}, {}), MASK_TRUE);",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right)
            )),
            CmpOp::Ge => w.line(format!(
                "{} = _mm_xor_si128(_mm_cmplt_epi32({}, {}), MASK_TRUE);",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right)
            )),
        }
        Ok(())
    }

    fn array_read(&self, w: &mut SourceWriter, dst: &str, array: &str, index: &str, stride: u32) {
        for lane in 0..4u32 {
            w.line(format!(
                "{dst} = _mm_or_si128(_mm_and_si128(MASK_LANE_{lane}, _mm_set1_epi32({array}[{offset} + _mm_extract_epi32({index}, {lane})])), _mm_andnot_si128(MASK_LANE_{lane}, {dst}));",
                dst = dst,
                lane = lane,
                array = array,
                offset = stride * lane,
                index = index
            ));
        }
    }

    fn array_write(&self, w: &mut SourceWriter, src: &str, array: &str, index: &str, stride: u32) {
        for lane in 0..4u32 {
            w.line(format!(
                "{array}[{offset} + _mm_extract_epi32({index}, {lane})] = _mm_extract_epi32({src}, {lane});",
                array = array,
                offset = stride * lane,
                index = index,
                src = src,
                lane = lane
            ));
        }
    }

    fn bin_uses_scratch(&self, _op: BinOp) -> bool {
        false
    }

    fn unary_uses_scratch(&self, _op: UnOp) -> bool {
        false
    }

    fn array_access_uses_scratch(&self) -> bool {
        false
    }
}

impl Sse4U32 {
    /// Immediate shifts use the `slli`/`srli` intrinsics; variable shifts
    /// unroll per lane because SSE has no variable-shift instruction.
    fn shift(
        &self,
        w: &mut SourceWriter,
        imm_intrinsic: &str,
        dst: &str,
        left: &str,
        right: RhsOperand<'_>,
    ) {
        if let Some(count) = right.shift_immediate() {
            w.line(format!("{} = {}({}, {});", dst, imm_intrinsic, left, count));
            return;
        }
        for lane in 0..4u32 {
            w.line(format!(
                "{dst} = _mm_or_si128(_mm_and_si128(MASK_LANE_{lane}, {imm}({left}, _mm_extract_epi32({right}, {lane}))), _mm_andnot_si128(MASK_LANE_{lane}, {dst}));",
                dst = dst,
                lane = lane,
                imm = imm_intrinsic,
                left = left,
                right = right.name
            ));
        }
    }
}
