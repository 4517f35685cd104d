//! AVX2 translators (8 lanes).
//!
//! Float comparisons go through `_mm256_cmp_ps` with ordered/unordered
//! predicate flags. Integer unsigned comparisons flip sign bits around the
//! signed `cmpgt`; `ge` is `(a > b) OR (a == b)`. Variable shifts use the
//! AVX2 `sllv`/`srlv` intrinsics instead of a per-lane unroll.

use vecpy_core::{BinOp, CmpOp, UnOp};

use crate::arch::{Architecture, DataType};
use crate::error::BackEndError;
use crate::fmt::SourceWriter;
use crate::translate::{blend_with, call_1, call_2, call_3, RhsOperand, Spill, Translator};

const ROUND_NEAREST: &str = "(_MM_FROUND_TO_NEAREST_INT | _MM_FROUND_NO_EXC)";
const ROUND_UP: &str = "(_MM_FROUND_TO_POS_INF | _MM_FROUND_NO_EXC)";
const ROUND_DOWN: &str = "(_MM_FROUND_TO_NEG_INF | _MM_FROUND_NO_EXC)";
const ROUND_ZERO: &str = "(_MM_FROUND_TO_ZERO | _MM_FROUND_NO_EXC)";

// ---------------------------------------------------------------------------
// 32-bit float
// ---------------------------------------------------------------------------

/// AVX2, 32-bit float.
pub struct Avx2F32;

impl Avx2F32 {
    fn spill(&self) -> Spill {
        Spill {
            store: "_mm256_store_ps",
            load: "_mm256_load_ps",
            ptr_cast: "",
            index_cast: "(int)",
            size: 8,
        }
    }
}

impl Translator for Avx2F32 {
    fn arch(&self) -> Architecture {
        Architecture::Avx2
    }

    fn dtype(&self) -> DataType {
        DataType::Float
    }

    fn vec_type(&self) -> &'static str {
        "__m256"
    }

    fn test_fn(&self) -> &'static str {
        "_mm256_movemask_ps"
    }

    fn setup(&self, w: &mut SourceWriter) {
        w.line("const __m256 MASK_FALSE = _mm256_setzero_ps();");
        w.line("const __m256 MASK_TRUE = _mm256_cmp_ps(MASK_FALSE, MASK_FALSE, _CMP_EQ_UQ);");
    }

    fn set(&self, w: &mut SourceWriter, dst: &str, value: &str) {
        call_1(w, dst, "_mm256_set1_ps", value);
    }

    fn load(&self, w: &mut SourceWriter, dst: &str, addr: &str) {
        call_1(w, dst, "_mm256_load_ps", addr);
    }

    fn store(&self, w: &mut SourceWriter, addr: &str, src: &str) {
        crate::translate::stmt_2(w, "_mm256_store_ps", addr, src);
    }

    fn blend(&self, w: &mut SourceWriter, input: &str, output: &str, mask: &str) {
        blend_with(
            w,
            input,
            output,
            mask,
            "_mm256_or_ps",
            "_mm256_and_ps",
            "_mm256_andnot_ps",
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
            BinOp::Add => call_2(w, dst, "_mm256_add_ps", left, r),
            BinOp::Sub => call_2(w, dst, "_mm256_sub_ps", left, r),
            BinOp::Mul => call_2(w, dst, "_mm256_mul_ps", left, r),
            BinOp::Div => call_2(w, dst, "_mm256_div_ps", left, r),
            BinOp::FloorDiv => {
                call_2(w, dst, "_mm256_div_ps", left, r);
                call_2(w, dst, "_mm256_round_ps", dst, ROUND_DOWN);
            }
            BinOp::Rem | BinOp::Fmod => self.spill().binary(w, "fmod", dst, left, r),
            BinOp::Pow => self.spill().binary(w, "pow", dst, left, r),
            BinOp::BitAnd | BinOp::BoolAnd => call_2(w, dst, "_mm256_and_ps", left, r),
            BinOp::BitAndNot => call_2(w, dst, "_mm256_andnot_ps", left, r),
            BinOp::BitOr | BinOp::BoolOr => call_2(w, dst, "_mm256_or_ps", left, r),
            BinOp::BitXor => call_2(w, dst, "_mm256_xor_ps", left, r),
            BinOp::Shl | BinOp::Shr => return Err(self.unsupported(&op)),
            BinOp::Max => call_2(w, dst, "_mm256_max_ps", left, r),
            BinOp::Min => call_2(w, dst, "_mm256_min_ps", left, r),
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
            UnOp::BitNot | UnOp::BoolNot => {
                call_2(w, dst, "_mm256_xor_ps", operand, "MASK_TRUE")
            }
            UnOp::Round => call_2(w, dst, "_mm256_round_ps", operand, ROUND_NEAREST),
            UnOp::Ceil => call_2(w, dst, "_mm256_round_ps", operand, ROUND_UP),
            UnOp::Floor => call_2(w, dst, "_mm256_round_ps", operand, ROUND_DOWN),
            UnOp::Trunc => call_2(w, dst, "_mm256_round_ps", operand, ROUND_ZERO),
            UnOp::Sqrt => call_1(w, dst, "_mm256_sqrt_ps", operand),
            UnOp::Abs | UnOp::Fabs => self.spill().unary(w, "fabs", dst, operand),
            UnOp::Gamma => self.spill().unary(w, "tgamma", dst, operand),
            other => {
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
        let predicate = match op {
            CmpOp::Eq => "_CMP_EQ_UQ",
            CmpOp::Ne => "_CMP_NEQ_UQ",
            CmpOp::Lt => "_CMP_LT_OQ",
            CmpOp::Le => "_CMP_LE_OQ",
            CmpOp::Gt => "_CMP_GT_OQ",
            CmpOp::Ge => "_CMP_GE_OQ",
        };
        call_3(w, dst, "_mm256_cmp_ps", left, right, predicate);
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

/// AVX2, 32-bit unsigned int.
pub struct Avx2U32;

impl Avx2U32 {
    fn sign_flip(operand: &str) -> String {
        format!("_mm256_xor_si256(SIGN_BITS, {})", operand)
    }
}

impl Translator for Avx2U32 {
    fn arch(&self) -> Architecture {
        Architecture::Avx2
    }

    fn dtype(&self) -> DataType {
        DataType::Uint32
    }

    fn vec_type(&self) -> &'static str {
        "__m256i"
    }

    fn test_fn(&self) -> &'static str {
        "_mm256_movemask_epi8"
    }

    fn setup(&self, w: &mut SourceWriter) {
        w.line("const __m256i MASK_FALSE = _mm256_setzero_si256();");
        w.line("const __m256i MASK_TRUE = _mm256_cmpeq_epi32(MASK_FALSE, MASK_FALSE);");
        w.line("const __m256i SIGN_BITS = _mm256_set1_epi32(0x80000000);");
        for lane in 0..8u32 {
            let slots: Vec<String> = (0..8u32)
                .rev()
                .map(|slot| if slot == lane { "1" } else { "0" }.to_string())
                .collect();
            w.line(format!(
                "const __m256i MASK_LANE_{} = _mm256_xor_si256(MASK_TRUE, _mm256_cmpeq_epi32(MASK_FALSE, _mm256_set_epi32({})));",
                lane,
                slots.join(", ")
            ));
        }
    }

    fn set(&self, w: &mut SourceWriter, dst: &str, value: &str) {
        call_1(w, dst, "_mm256_set1_epi32", value);
    }

    fn load(&self, w: &mut SourceWriter, dst: &str, addr: &str) {
        w.line(format!(
            "{} = _mm256_load_si256((const __m256i*)({}));",
            dst, addr
        ));
    }

    fn store(&self, w: &mut SourceWriter, addr: &str, src: &str) {
        w.line(format!("_mm256_store_si256((__m256i*)({}), {});", addr, src));
    }

    fn blend(&self, w: &mut SourceWriter, input: &str, output: &str, mask: &str) {
        blend_with(
            w,
            input,
            output,
            mask,
            "_mm256_or_si256",
            "_mm256_and_si256",
            "_mm256_andnot_si256",
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
            BinOp::Add => call_2(w, dst, "_mm256_add_epi32", left, r),
            BinOp::Sub => call_2(w, dst, "_mm256_sub_epi32", left, r),
            BinOp::Mul => call_2(w, dst, "_mm256_mullo_epi32", left, r),
            BinOp::BitAnd | BinOp::BoolAnd => call_2(w, dst, "_mm256_and_si256", left, r),
            BinOp::BitAndNot => call_2(w, dst, "_mm256_andnot_si256", left, r),
            BinOp::BitOr | BinOp::BoolOr => call_2(w, dst, "_mm256_or_si256", left, r),
            BinOp::BitXor => call_2(w, dst, "_mm256_xor_si256", left, r),
            BinOp::Shl => match right.shift_immediate() {
                Some(count) => w.line(format!("{} = _mm256_slli_epi32({}, {});", dst, left, count)),
                None => call_2(w, dst, "_mm256_sllv_epi32", left, r),
            },
            BinOp::Shr => match right.shift_immediate() {
                Some(count) => w.line(format!("{} = _mm256_srli_epi32({}, {});", dst, left, count)),
                None => call_2(w, dst, "_mm256_srlv_epi32", left, r),
            },
            BinOp::Max => w.line(format!(
                "{} = _mm256_xor_si256(SIGN_BITS, _mm256_max_epi32({}, {}));",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(r)
            )),
            BinOp::Min => w.line(format!(
                "{} = _mm256_xor_si256(SIGN_BITS, _mm256_min_epi32({}, {}));",
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
                call_2(w, dst, "_mm256_xor_si256", operand, "MASK_TRUE");
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
            CmpOp::Eq => call_2(w, dst, "_mm256_cmpeq_epi32", left, right),
            CmpOp::Ne => w.line(format!(
                "{} = _mm256_xor_si256(_mm256_cmpeq_epi32({}, {}), MASK_TRUE);",
                dst, left, right
            )),
            CmpOp::Gt => w.line(format!(
                "{} = _mm256_cmpgt_epi32({}, {});",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right)
            )),
            // lt is gt with the operands switched.
            CmpOp::Lt => w.line(format!(
                "{} = _mm256_cmpgt_epi32({}, {});",
                dst,
                Self::sign_flip(right),
                Self::sign_flip(left)
            )),
            CmpOp::Le => w.line(format!(
                "{} = _mm256_xor_si256(_mm256_cmpgt_epi32({}, {}), MASK_TRUE);",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right)
            )),
            // ge is (a > b) OR (a == b); equality needs no sign flip.
            CmpOp::Ge => w.line(format!(
                "{} = _mm256_or_si256(_mm256_cmpgt_epi32({}, {}), _mm256_cmpeq_epi32({}, {}));",
                dst,
                Self::sign_flip(left),
                Self::sign_flip(right),
                left,
                right
            )),
        }
        Ok(())
    }

    fn array_read(&self, w: &mut SourceWriter, dst: &str, array: &str, index: &str, stride: u32) {
        for lane in 0..8u32 {
            w.line(format!(
                "{dst} = _mm256_or_si256(_mm256_and_si256(MASK_LANE_{lane}, _mm256_set1_epi32({array}[{offset} + _mm256_extract_epi32({index}, {lane})])), _mm256_andnot_si256(MASK_LANE_{lane}, {dst}));",
                dst = dst,
                lane = lane,
                array = array,
                offset = stride * lane,
                index = index
            ));
        }
    }

    fn array_write(&self, w: &mut SourceWriter, src: &str, array: &str, index: &str, stride: u32) {
        for lane in 0..8u32 {
            w.line(format!(
                "{array}[{offset} + _mm256_extract_epi32({index}, {lane})] = _mm256_extract_epi32({src}, {lane});",
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
