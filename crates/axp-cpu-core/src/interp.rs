//! Tier-0 fused-micro-op interpreter: executes one
//! decoded `Instruction` against a `CpuState` and `MemorySystem`. This is
//! the reference execution path the JIT tier must agree with byte-for-byte.

use axp_cache::CacheBackend;
use axp_constants::{Fpcr, RoundingMode};
use axp_decoder::{BranchOp, FloatFormat, FloatOp, Instruction, IntegerOp, MemoryOp, MiscOp, OperateOperand};
use axp_mmu::{MemorySystem, ReservationTracker};
use axp_types::{AccessKind, PhysAddr, VirtAddr};

use crate::fault::Fault;
use crate::state::CpuState;

/// What the interpreter did to the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Next,
    Branch { target: VirtAddr },
    PalCall { function: u32 },
}

fn sext32(v: u32) -> u64 {
    v as i32 as i64 as u64
}

fn operand_value(state: &CpuState, operand: OperateOperand) -> u64 {
    match operand {
        OperateOperand::Reg(r) => state.registers.read_int(r),
        OperateOperand::Literal(l) => l as u64,
    }
}

/// Byte-lane rotate amount shared by the EXT/INS/MSK family: `Rb`'s low 3 bits select which of the 8
/// bytes in a 64-bit register the unaligned-access instructions pivot on.
fn lane(rb_value: u64) -> u32 {
    (rb_value & 7) as u32
}

fn size_mask(bytes: u32) -> u64 {
    if bytes >= 8 {
        u64::MAX
    } else {
        (1u64 << (bytes * 8)) - 1
    }
}

/// Executes single decoded instructions against architectural state. Named
/// distinctly from `exec::Interpreter` (the block-at-a-time trait
/// `ExecDispatcher` drives) since this is the instruction-at-a-time engine
/// that trait's tier-0 implementation wraps.
pub struct Tier0;

impl Tier0 {
    /// Executes one instruction, returning where the PC should go next.
    /// Memory/translation failures and raised architectural conditions
    /// surface as `Fault` for the caller to hand to `ExceptionEngine`.
    pub fn step<Backend: CacheBackend + Clone>(
        state: &mut CpuState,
        mem: &mut MemorySystem<Backend>,
        reservations: &dyn ReservationTracker,
        cpu_id: u32,
        pc: VirtAddr,
        instr: Instruction,
    ) -> Result<StepOutcome, Fault> {
        match instr {
            Instruction::PalCall { function } => Ok(StepOutcome::PalCall { function }),
            Instruction::Integer { op, ra, rb, rc } => {
                Self::exec_integer(state, op, ra, rb, rc)?;
                Ok(StepOutcome::Next)
            }
            Instruction::Floating { op, format, fa, fb, fc, trap_qualifier, round_qualifier } => {
                Self::exec_float(state, op, format, fa, fb, fc, round_qualifier, trap_qualifier)?;
                Ok(StepOutcome::Next)
            }
            Instruction::Memory { op, ra, rb, disp } => {
                Self::exec_memory(state, mem, reservations, cpu_id, op, ra, rb, disp)?;
                Ok(StepOutcome::Next)
            }
            Instruction::Branch { op, ra, disp } => Ok(Self::exec_branch(state, pc, op, ra, disp)),
            Instruction::Jsr { ra, rb, .. } => {
                let target = state.registers.read_int(rb) & !0b11;
                state.registers.write_int(ra, pc + 4);
                Ok(StepOutcome::Branch { target })
            }
            Instruction::Misc { op, ra, rb, disp } => {
                Self::exec_misc(state, mem, op, ra, rb, disp);
                Ok(StepOutcome::Next)
            }
        }
    }

    pub(crate) fn exec_integer(state: &mut CpuState, op: IntegerOp, ra: u8, rb: OperateOperand, rc: u8) -> Result<(), Fault> {
        let a = state.registers.read_int(ra);
        let b = operand_value(state, rb);
        let result = match op {
            IntegerOp::Addl => sext32((a as u32).wrapping_add(b as u32)),
            IntegerOp::S4addl => sext32(((a as u32).wrapping_mul(4)).wrapping_add(b as u32)),
            IntegerOp::Subl => sext32((a as u32).wrapping_sub(b as u32)),
            IntegerOp::S4subl => sext32(((a as u32).wrapping_mul(4)).wrapping_sub(b as u32)),
            IntegerOp::S8addl => sext32(((a as u32).wrapping_mul(8)).wrapping_add(b as u32)),
            IntegerOp::S8subl => sext32(((a as u32).wrapping_mul(8)).wrapping_sub(b as u32)),
            IntegerOp::Addq => a.wrapping_add(b),
            IntegerOp::S4addq => a.wrapping_mul(4).wrapping_add(b),
            IntegerOp::Subq => a.wrapping_sub(b),
            IntegerOp::S4subq => a.wrapping_mul(4).wrapping_sub(b),
            IntegerOp::S8addq => a.wrapping_mul(8).wrapping_add(b),
            IntegerOp::S8subq => a.wrapping_mul(8).wrapping_sub(b),
            IntegerOp::Cmpeq => (a == b) as u64,
            IntegerOp::Cmpult => (a < b) as u64,
            IntegerOp::Cmpule => (a <= b) as u64,
            IntegerOp::Cmplt => ((a as i64) < (b as i64)) as u64,
            IntegerOp::Cmple => ((a as i64) <= (b as i64)) as u64,
            IntegerOp::Cmpbge => {
                let abytes = a.to_le_bytes();
                let bbytes = b.to_le_bytes();
                let mut bits = 0u64;
                for i in 0..8 {
                    if abytes[i] >= bbytes[i] {
                        bits |= 1 << i;
                    }
                }
                bits
            }
            IntegerOp::And => a & b,
            IntegerOp::Bic => a & !b,
            IntegerOp::Bis => a | b,
            IntegerOp::Ornot => a | !b,
            IntegerOp::Xor => a ^ b,
            IntegerOp::Eqv => !(a ^ b),
            IntegerOp::CmovEq => return Ok(Self::cmov(state, a == 0, b, rc)),
            IntegerOp::CmovNe => return Ok(Self::cmov(state, a != 0, b, rc)),
            IntegerOp::CmovLt => return Ok(Self::cmov(state, (a as i64) < 0, b, rc)),
            IntegerOp::CmovGe => return Ok(Self::cmov(state, (a as i64) >= 0, b, rc)),
            IntegerOp::CmovLe => return Ok(Self::cmov(state, (a as i64) <= 0, b, rc)),
            IntegerOp::CmovGt => return Ok(Self::cmov(state, (a as i64) > 0, b, rc)),
            IntegerOp::CmovLbs => return Ok(Self::cmov(state, a & 1 != 0, b, rc)),
            IntegerOp::CmovLbc => return Ok(Self::cmov(state, a & 1 == 0, b, rc)),
            IntegerOp::Amask => b & !0u64, // Rbv AND NOT feature_mask: no optional extensions unsupported, clear nothing
            IntegerOp::Implver => 2,       // EV6-class implementation version
            IntegerOp::Sll => a << (b & 63),
            IntegerOp::Srl => a >> (b & 63),
            IntegerOp::Sra => ((a as i64) >> (b & 63)) as u64,
            IntegerOp::Extbl => (a >> (lane(b) * 8)) & size_mask(1),
            IntegerOp::Extwl => (a >> (lane(b) * 8)) & size_mask(2),
            IntegerOp::Extll => (a >> (lane(b) * 8)) & size_mask(4),
            IntegerOp::Extql => {
                let l = lane(b);
                if l == 0 { a } else { a >> (l * 8) }
            }
            IntegerOp::Extwh => Self::ext_high(a, b, 2),
            IntegerOp::Extlh => Self::ext_high(a, b, 4),
            IntegerOp::Extqh => Self::ext_high(a, b, 8),
            IntegerOp::Insbl => (a & size_mask(1)) << (lane(b) * 8),
            IntegerOp::Inswl => (a & size_mask(2)) << (lane(b) * 8),
            IntegerOp::Insll => (a & size_mask(4)) << (lane(b) * 8),
            IntegerOp::Insql => {
                let l = lane(b);
                if l == 0 { a } else { a << (l * 8) }
            }
            IntegerOp::Inswh => Self::ins_high(a, b, 2),
            IntegerOp::Inslh => Self::ins_high(a, b, 4),
            IntegerOp::Insqh => Self::ins_high(a, b, 8),
            IntegerOp::Mskbl => a & !(size_mask(1) << (lane(b) * 8)),
            IntegerOp::Mskwl => a & !(size_mask(2) << (lane(b) * 8)),
            IntegerOp::Mskll => a & !(size_mask(4) << (lane(b) * 8)),
            IntegerOp::Mskql => {
                let l = lane(b);
                if l == 0 { 0 } else { a & !(u64::MAX << (l * 8)) }
            }
            IntegerOp::Mskwh => Self::msk_high(a, b, 2),
            IntegerOp::Msklh => Self::msk_high(a, b, 4),
            IntegerOp::Mskqh => Self::msk_high(a, b, 8),
            IntegerOp::Zap => {
                let mut bytes = a.to_le_bytes();
                for i in 0..8 {
                    if (b >> i) & 1 != 0 {
                        bytes[i] = 0;
                    }
                }
                u64::from_le_bytes(bytes)
            }
            IntegerOp::Zapnot => {
                let mut bytes = a.to_le_bytes();
                for i in 0..8 {
                    if (b >> i) & 1 == 0 {
                        bytes[i] = 0;
                    }
                }
                u64::from_le_bytes(bytes)
            }
            IntegerOp::Mull => sext32((a as u32).wrapping_mul(b as u32)),
            IntegerOp::Mulq => a.wrapping_mul(b),
            IntegerOp::Umulh => ((a as u128 * b as u128) >> 64) as u64,
        };
        state.registers.write_int(rc, result);
        Ok(())
    }

    fn cmov(state: &mut CpuState, take: bool, new_value: u64, rc: u8) {
        if take {
            state.registers.write_int(rc, new_value);
        }
    }

    /// `EXTwh/lh/qh`: the complement half of an unaligned-load assembly;
    /// yields 0 when `Rb`'s lane is already byte-aligned.
    fn ext_high(a: u64, b: u64, bytes: u32) -> u64 {
        let l = lane(b);
        if l == 0 {
            0
        } else {
            (a << (64 - l * 8)) & size_mask(bytes)
        }
    }

    fn ins_high(a: u64, b: u64, bytes: u32) -> u64 {
        let l = lane(b);
        if l == 0 {
            0
        } else {
            (a & size_mask(bytes)) >> (64 - l * 8)
        }
    }

    fn msk_high(a: u64, b: u64, bytes: u32) -> u64 {
        let l = lane(b);
        if l == 0 {
            a
        } else {
            a & !(size_mask(bytes) >> (64 - l * 8))
        }
    }

    /// Two-sum error-free transform: `a+b` exactly equals `hi+lo`, with `hi`
    /// the host round-to-nearest sum.
    fn two_sum(a: f64, b: f64) -> (f64, f64) {
        let hi = a + b;
        let bb = hi - a;
        let lo = (a - (hi - bb)) + (b - bb);
        (hi, lo)
    }

    /// Two-product error-free transform via `mul_add`: `a*b` exactly equals
    /// `hi+lo`.
    fn two_prod(a: f64, b: f64) -> (f64, f64) {
        let hi = a * b;
        let lo = a.mul_add(b, -hi);
        (hi, lo)
    }

    /// Smallest `f64` strictly greater than `x`.
    fn next_up(x: f64) -> f64 {
        if x.is_nan() || x == f64::INFINITY {
            return x;
        }
        if x == 0.0 {
            return f64::from_bits(1);
        }
        let bits = x.to_bits();
        if x > 0.0 { f64::from_bits(bits + 1) } else { f64::from_bits(bits - 1) }
    }

    /// Largest `f64` strictly less than `x`.
    fn next_down(x: f64) -> f64 {
        if x.is_nan() || x == f64::NEG_INFINITY {
            return x;
        }
        if x == 0.0 {
            return f64::from_bits(0x8000_0000_0000_0001);
        }
        let bits = x.to_bits();
        if x > 0.0 { f64::from_bits(bits - 1) } else { f64::from_bits(bits + 1) }
    }

    /// Applies `mode` to the correctly-rounded-to-nearest `hi` given the
    /// exact residual `lo` (`true_value == hi + lo`). `hi == 0.0` is left
    /// alone: directed rounding across a true-value/rounded-value sign
    /// disagreement at the zero boundary is not modeled here.
    fn round_directed(hi: f64, lo: f64, mode: RoundingMode) -> f64 {
        if lo == 0.0 || !hi.is_finite() || hi == 0.0 {
            return hi;
        }
        match mode {
            RoundingMode::Normal => hi,
            RoundingMode::Plus => if lo > 0.0 { Self::next_up(hi) } else { hi },
            RoundingMode::Minus => if lo < 0.0 { Self::next_down(hi) } else { hi },
            RoundingMode::Chopped => {
                let overshoots = if hi > 0.0 { lo < 0.0 } else { lo > 0.0 };
                if !overshoots {
                    hi
                } else if hi > 0.0 {
                    Self::next_down(hi)
                } else {
                    Self::next_up(hi)
                }
            }
        }
    }

    /// The rounding mode this instruction actually uses: its own qualifier,
    /// unless that selects `Normal`, which defers to the dynamic FPCR mode.
    fn effective_rounding(fpcr: Fpcr, round_qualifier: u8) -> RoundingMode {
        let instr_mode = RoundingMode::from_bits(round_qualifier as u64);
        if matches!(instr_mode, RoundingMode::Normal) { fpcr.rounding_mode() } else { instr_mode }
    }

    /// Trap-enable bits in effect for this instruction: the FPCR's own
    /// enables, widened by any `/U` (force underflow-enable) or `/I`/`/V`
    /// (force inexact-enable) qualifier bit the opcode carries. The
    /// remaining qualifier bit (`/S`, software completion) only affects
    /// when a trap is delivered relative to later instructions, which this
    /// engine already delivers precisely and synchronously, so it is a
    /// no-op here.
    fn effective_trap_enables(fpcr: Fpcr, trap_qualifier: u8) -> Fpcr {
        let mut enables = fpcr;
        if trap_qualifier & 0b001 != 0 {
            enables.insert(Fpcr::UNFD);
        }
        if trap_qualifier & 0b010 != 0 {
            enables.insert(Fpcr::INED);
        }
        enables
    }

    /// Raises the sticky bit for whichever exceptional condition applies
    /// and faults only if the matching trap-enable bit is also set;
    /// otherwise produces the IEEE default result. `hi`/`lo` are the
    /// unrounded result and its exact residual (see `round_directed`).
    #[allow(clippy::too_many_arguments)]
    fn finish_fp(
        state: &mut CpuState,
        fc: u8,
        hi: f64,
        lo: f64,
        invalid: bool,
        div_by_zero: bool,
        operands_finite: bool,
        mode: RoundingMode,
        traps: Fpcr,
    ) -> Result<(), Fault> {
        if invalid {
            state.registers.raise_fp_sticky(Fpcr::INV);
            if traps.contains(Fpcr::INVD) {
                return Err(Fault::FpInvalid);
            }
            state.registers.write_float_f64(fc, f64::NAN);
            return Ok(());
        }
        if div_by_zero {
            state.registers.raise_fp_sticky(Fpcr::DZE);
            if traps.contains(Fpcr::DZED) {
                return Err(Fault::FpDivideByZero);
            }
            state.registers.write_float_f64(fc, hi);
            return Ok(());
        }

        let rounded = Self::round_directed(hi, lo, mode);
        if rounded.is_infinite() && (operands_finite || hi.is_finite()) {
            state.registers.raise_fp_sticky(Fpcr::OVF);
            if traps.contains(Fpcr::OVFD) {
                return Err(Fault::FpOverflow);
            }
        } else if rounded != 0.0 && rounded.abs() < f64::MIN_POSITIVE {
            state.registers.raise_fp_sticky(Fpcr::UNF);
            if traps.contains(Fpcr::UNFD) {
                return Err(Fault::FpUnderflow);
            }
        }
        if lo != 0.0 {
            state.registers.raise_fp_sticky(Fpcr::INE);
            if traps.contains(Fpcr::INED) {
                return Err(Fault::FpInexact);
            }
        }
        state.registers.write_float_f64(fc, rounded);
        Ok(())
    }

    pub(crate) fn exec_float(
        state: &mut CpuState,
        op: FloatOp,
        format: FloatFormat,
        fa: u8,
        fb: u8,
        fc: u8,
        round_qualifier: u8,
        trap_qualifier: u8,
    ) -> Result<(), Fault> {
        // VAX F/G operands are read through the same IEEE-double path as S/T
        // here; precise VAX bit-layout conversion is out of scope for this
        // tier.
        let _ = format;
        let a = state.registers.read_float_f64(fa);
        let b = state.registers.read_float_f64(fb);
        let fpcr = state.registers.fpcr();
        let mode = Self::effective_rounding(fpcr, round_qualifier);
        let traps = Self::effective_trap_enables(fpcr, trap_qualifier);
        let operands_finite = a.is_finite() && b.is_finite();

        match op {
            FloatOp::Add => {
                let invalid = a.is_nan() || b.is_nan() || (a.is_infinite() && b.is_infinite() && a.signum() != b.signum());
                let (hi, lo) = Self::two_sum(a, b);
                Self::finish_fp(state, fc, hi, lo, invalid, false, operands_finite, mode, traps)
            }
            FloatOp::Sub => {
                let invalid = a.is_nan() || b.is_nan() || (a.is_infinite() && b.is_infinite() && a.signum() == b.signum());
                let (hi, lo) = Self::two_sum(a, -b);
                Self::finish_fp(state, fc, hi, lo, invalid, false, operands_finite, mode, traps)
            }
            FloatOp::Mul => {
                let invalid = a.is_nan()
                    || b.is_nan()
                    || (a == 0.0 && b.is_infinite())
                    || (b == 0.0 && a.is_infinite());
                let (hi, lo) = Self::two_prod(a, b);
                Self::finish_fp(state, fc, hi, lo, invalid, false, operands_finite, mode, traps)
            }
            FloatOp::Div => {
                let invalid =
                    a.is_nan() || b.is_nan() || (a == 0.0 && b == 0.0) || (a.is_infinite() && b.is_infinite());
                let div_by_zero = !invalid && b == 0.0;
                let q = a / b;
                let r = if !invalid && !div_by_zero && q.is_finite() { q.mul_add(-b, a) } else { 0.0 };
                let lo = if b.is_sign_negative() { -r } else { r };
                Self::finish_fp(state, fc, q, lo, invalid, div_by_zero, operands_finite, mode, traps)
            }
            FloatOp::CmpEq | FloatOp::CmpLt | FloatOp::CmpLe => {
                if a.is_nan() || b.is_nan() {
                    state.registers.raise_fp_sticky(Fpcr::INV);
                    if traps.contains(Fpcr::INVD) {
                        return Err(Fault::FpInvalid);
                    }
                    state.registers.write_float_f64(fc, 0.0);
                } else {
                    let taken = match op {
                        FloatOp::CmpEq => a == b,
                        FloatOp::CmpLt => a < b,
                        FloatOp::CmpLe => a <= b,
                        _ => unreachable!(),
                    };
                    state.registers.write_float_f64(fc, if taken { 2.0 } else { 0.0 });
                }
                Ok(())
            }
            FloatOp::CmpUn => {
                state.registers.write_float_f64(fc, if a.is_nan() || b.is_nan() { 2.0 } else { 0.0 });
                Ok(())
            }
            FloatOp::CvtQt | FloatOp::CvtQf | FloatOp::CvtQg => {
                let q = state.registers.read_float_bits(fa) as i64;
                let converted = q as f64;
                if converted as i64 != q {
                    state.registers.raise_fp_sticky(Fpcr::INE);
                    if traps.contains(Fpcr::INED) {
                        return Err(Fault::FpInexact);
                    }
                }
                state.registers.write_float_f64(fc, converted);
                Ok(())
            }
            FloatOp::CvtTq | FloatOp::CvtGq => {
                if !a.is_finite() || !(-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&a) {
                    state.registers.raise_fp_sticky(Fpcr::INV);
                    if traps.contains(Fpcr::INVD) {
                        return Err(Fault::FpInvalid);
                    }
                    state.registers.write_float_bits(fc, 0);
                    return Ok(());
                }
                let truncated = match mode {
                    RoundingMode::Chopped => a.trunc(),
                    RoundingMode::Minus => a.floor(),
                    RoundingMode::Plus => a.ceil(),
                    RoundingMode::Normal => a.round_ties_even(),
                };
                if truncated != a {
                    state.registers.raise_fp_sticky(Fpcr::INE);
                    if traps.contains(Fpcr::INED) {
                        return Err(Fault::FpInexact);
                    }
                }
                state.registers.write_float_bits(fc, truncated as i64 as u64);
                Ok(())
            }
        }
    }

    pub(crate) fn exec_memory<Backend: CacheBackend + Clone>(
        state: &mut CpuState,
        mem: &mut MemorySystem<Backend>,
        reservations: &dyn ReservationTracker,
        cpu_id: u32,
        op: MemoryOp,
        ra: u8,
        rb: u8,
        disp: i16,
    ) -> Result<(), Fault> {
        let base = state.registers.read_int(rb);
        let addr = base.wrapping_add(disp as i64 as u64);

        if matches!(op, MemoryOp::Lda) {
            state.registers.write_int(ra, addr);
            return Ok(());
        }
        if matches!(op, MemoryOp::Ldah) {
            state.registers.write_int(ra, base.wrapping_add(((disp as i64) << 16) as u64));
            return Ok(());
        }

        let size = op.access_size() as u64;
        let access_addr = if op.is_unaligned() { addr & !7 } else { addr };
        let is_float = matches!(op, MemoryOp::Ldf | MemoryOp::Ldg | MemoryOp::Lds | MemoryOp::Ldt | MemoryOp::Stf | MemoryOp::Stg | MemoryOp::Sts | MemoryOp::Stt);

        if op.is_store() {
            let raw = if is_float { state.registers.read_float_bits(ra) } else { state.registers.read_int(ra) };
            let mut buf = [0u8; 8];
            buf[..size as usize].copy_from_slice(&raw.to_le_bytes()[..size as usize]);

            if matches!(op, MemoryOp::StlC | MemoryOp::StqC) {
                let paddr = Self::probe_paddr(state, mem, access_addr)?;
                let ok = reservations.check_and_clear_reservation(cpu_id, paddr);
                if ok {
                    mem.write_virtual(state.asn(), access_addr, size, state.mode(), &buf[..size as usize])
                        .map_err(Fault::Translation)?;
                    reservations.invalidate_overlapping(cpu_id, paddr, size as u8);
                }
                state.registers.write_int(ra, ok as u64);
                return Ok(());
            }

            mem.write_virtual(state.asn(), access_addr, size, state.mode(), &buf[..size as usize]).map_err(Fault::Translation)?;
            let paddr = Self::probe_paddr(state, mem, access_addr)?;
            reservations.invalidate_overlapping(cpu_id, paddr, size as u8);
            return Ok(());
        }

        let mut buf = [0u8; 8];
        mem.read_virtual(state.asn(), access_addr, size, state.mode(), &mut buf[..size as usize]).map_err(Fault::Translation)?;
        let mut raw_bytes = [0u8; 8];
        raw_bytes[..size as usize].copy_from_slice(&buf[..size as usize]);
        let mut value = u64::from_le_bytes(raw_bytes);
        if matches!(op, MemoryOp::Ldl) {
            value = sext32(value as u32);
        }

        if matches!(op, MemoryOp::LdlL | MemoryOp::LdqL) {
            let paddr = Self::probe_paddr(state, mem, access_addr)?;
            reservations.register_reservation(cpu_id, paddr, size as u8);
        }

        if is_float {
            state.registers.write_float_bits(ra, value);
        } else {
            state.registers.write_int(ra, value);
        }
        Ok(())
    }

    fn probe_paddr<Backend: CacheBackend + Clone>(
        state: &CpuState,
        mem: &mut MemorySystem<Backend>,
        vaddr: VirtAddr,
    ) -> Result<PhysAddr, Fault> {
        mem.translate(&axp_mmu::TranslateArgs { vaddr, asn: state.asn(), access: AccessKind::Read, mode: state.mode() })
            .map_err(Fault::Translation)
    }

    pub(crate) fn exec_branch(state: &mut CpuState, pc: VirtAddr, op: BranchOp, ra: u8, disp: i32) -> StepOutcome {
        let target = (pc.wrapping_add(4)).wrapping_add((disp as i64 * 4) as u64);
        let taken = if op.is_unconditional() {
            true
        } else {
            let a = state.registers.read_int(ra);
            match op {
                BranchOp::Beq => a == 0,
                BranchOp::Bne => a != 0,
                BranchOp::Blt => (a as i64) < 0,
                BranchOp::Ble => (a as i64) <= 0,
                BranchOp::Bgt => (a as i64) > 0,
                BranchOp::Bge => (a as i64) >= 0,
                BranchOp::Blbc => a & 1 == 0,
                BranchOp::Blbs => a & 1 != 0,
                BranchOp::Fbeq => state.registers.read_float_f64(ra) == 0.0,
                BranchOp::Fbne => state.registers.read_float_f64(ra) != 0.0,
                BranchOp::Fblt => state.registers.read_float_f64(ra) < 0.0,
                BranchOp::Fble => state.registers.read_float_f64(ra) <= 0.0,
                BranchOp::Fbgt => state.registers.read_float_f64(ra) > 0.0,
                BranchOp::Fbge => state.registers.read_float_f64(ra) >= 0.0,
                BranchOp::Br | BranchOp::Bsr => unreachable!("unconditional handled above"),
            }
        };
        if matches!(op, BranchOp::Bsr) {
            state.registers.write_int(ra, pc.wrapping_add(4));
        }
        if taken {
            StepOutcome::Branch { target }
        } else {
            StepOutcome::Next
        }
    }

    fn exec_misc<Backend: CacheBackend + Clone>(state: &mut CpuState, mem: &mut MemorySystem<Backend>, op: MiscOp, ra: u8, _rb: u8, _disp: i16) {
        match op {
            MiscOp::Mb => mem.execute_memory_barrier(axp_mmu::BarrierKind::Full),
            MiscOp::Wmb => mem.execute_memory_barrier(axp_mmu::BarrierKind::Write),
            MiscOp::Trapb | MiscOp::Excb => {}
            MiscOp::Fetch | MiscOp::FetchM | MiscOp::Ecb | MiscOp::Wh64 => {}
            MiscOp::Rpcc => state.registers.write_int(ra, 0),
            MiscOp::Rc | MiscOp::Rs => state.registers.write_int(ra, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_cache::{DataCache, InstructionCache};
    use axp_mem::MemoryBus;

    #[derive(Clone)]
    struct NoReservations;
    impl ReservationTracker for NoReservations {
        fn register_reservation(&self, _cpu: u32, _paddr: PhysAddr, _size: u8) {}
        fn check_and_clear_reservation(&self, _cpu: u32, _paddr: PhysAddr) -> bool {
            true
        }
        fn clear_reservation(&self, _cpu: u32) {}
        fn invalidate_overlapping(&self, _writer_cpu: u32, _paddr: PhysAddr, _size: u8) {}
    }

    #[test]
    fn addq_computes_sum() {
        let mut state = CpuState::new();
        state.registers.write_int(1, 4);
        Tier0::exec_integer(&mut state, IntegerOp::Addq, 1, OperateOperand::Literal(5), 2).unwrap();
        assert_eq!(state.registers.read_int(2), 9);
    }

    #[test]
    fn addl_sign_extends_32_bit_overflow() {
        let mut state = CpuState::new();
        state.registers.write_int(1, 0x7FFF_FFFF);
        Tier0::exec_integer(&mut state, IntegerOp::Addl, 1, OperateOperand::Literal(1), 2).unwrap();
        assert_eq!(state.registers.read_int(2), 0xFFFF_FFFF_8000_0000);
    }

    #[test]
    fn extql_extracts_aligned_low_quad() {
        let mut state = CpuState::new();
        state.registers.write_int(1, 0x1122_3344_5566_7788);
        Tier0::exec_integer(&mut state, IntegerOp::Extql, 1, OperateOperand::Literal(0), 2).unwrap();
        assert_eq!(state.registers.read_int(2), 0x1122_3344_5566_7788);
    }

    #[test]
    fn cmpbge_sets_one_bit_per_byte_lane() {
        let mut state = CpuState::new();
        state.registers.write_int(1, 0x05_05_05_05_05_05_05_05);
        Tier0::exec_integer(&mut state, IntegerOp::Cmpbge, 1, OperateOperand::Literal(5), 2).unwrap();
        assert_eq!(state.registers.read_int(2), 0xFF);
    }

    #[test]
    fn amask_clears_nothing_and_reads_rbv_not_ra() {
        let mut state = CpuState::new();
        state.registers.write_int(1, 0xFFFF_FFFF_FFFF_FFFF);
        state.registers.write_int(2, 0x0000_0000_0000_0006);
        Tier0::exec_integer(&mut state, IntegerOp::Amask, 1, OperateOperand::Reg(2), 3).unwrap();
        assert_eq!(state.registers.read_int(3), 0x6);
    }

    #[test]
    fn fp_divide_by_zero_sets_dze_sticky_and_produces_infinity_without_trapping() {
        let mut state = CpuState::new();
        state.registers.write_float_f64(1, 1.0);
        state.registers.write_float_f64(2, 0.0);
        Tier0::exec_float(&mut state, FloatOp::Div, FloatFormat::IeeeT, 1, 2, 3, 2, 0).unwrap();
        assert_eq!(state.registers.read_float_f64(3), f64::INFINITY);
        assert!(state.registers.fpcr().contains(Fpcr::DZE));
        assert!(state.registers.fpcr().contains(Fpcr::SUM));
    }

    #[test]
    fn fp_divide_by_zero_traps_when_dzed_enabled() {
        let mut state = CpuState::new();
        state.registers.set_fpcr(Fpcr::DZED);
        state.registers.write_float_f64(1, 1.0);
        state.registers.write_float_f64(2, 0.0);
        let err = Tier0::exec_float(&mut state, FloatOp::Div, FloatFormat::IeeeT, 1, 2, 3, 2, 0).unwrap_err();
        assert_eq!(err, Fault::FpDivideByZero);
    }

    #[test]
    fn fp_inexact_add_sets_ine_sticky() {
        let mut state = CpuState::new();
        state.registers.write_float_f64(1, 1.0);
        state.registers.write_float_f64(2, f64::EPSILON / 4.0);
        Tier0::exec_float(&mut state, FloatOp::Add, FloatFormat::IeeeT, 1, 2, 3, 2, 0).unwrap();
        assert!(state.registers.fpcr().contains(Fpcr::INE));
    }

    #[test]
    fn fp_invalid_nan_result_raises_inv_without_trapping_by_default() {
        let mut state = CpuState::new();
        state.registers.write_float_f64(1, f64::INFINITY);
        state.registers.write_float_f64(2, f64::INFINITY);
        Tier0::exec_float(&mut state, FloatOp::Sub, FloatFormat::IeeeT, 1, 2, 3, 2, 0).unwrap();
        assert!(state.registers.read_float_f64(3).is_nan());
        assert!(state.registers.fpcr().contains(Fpcr::INV));
    }

    #[test]
    fn fp_chopped_rounding_diverges_from_dynamic_round_to_nearest() {
        // 2^53 + 3 sits exactly halfway between the two f64 values 2^53+2
        // and 2^53+4; ties-to-even picks 2^53+4 (the even mantissa), which
        // overshoots the true sum, so chopped mode must step back down.
        let mut state = CpuState::new();
        state.registers.write_float_f64(1, 2f64.powi(53));
        state.registers.write_float_f64(2, 3.0);

        Tier0::exec_float(&mut state, FloatOp::Add, FloatFormat::IeeeT, 1, 2, 3, 2, 0).unwrap();
        assert_eq!(state.registers.read_float_f64(3), 2f64.powi(53) + 4.0);

        // round_qualifier 0 == Chopped.
        Tier0::exec_float(&mut state, FloatOp::Add, FloatFormat::IeeeT, 1, 2, 3, 0, 0).unwrap();
        assert_eq!(state.registers.read_float_f64(3), 2f64.powi(53) + 2.0);
    }

    #[test]
    fn unconditional_branch_computes_word_aligned_target() {
        let mut state = CpuState::new();
        let outcome = Tier0::exec_branch(&mut state, 0x1000, BranchOp::Br, 31, 2);
        assert_eq!(outcome, StepOutcome::Branch { target: 0x1000 + 4 + 8 });
    }

    fn fresh_mem() -> MemorySystem<MemoryBus> {
        let ram = std::sync::Arc::new(axp_mem::PhysicalMemory::new(1 << 20).unwrap());
        let bus = MemoryBus::new(ram);
        let l1d = DataCache::new(4, 2, bus.clone());
        let icache = InstructionCache::new(4, 2, bus.clone());
        MemorySystem::new(32, l1d, icache, bus)
    }

    #[test]
    fn store_then_load_round_trips_through_memory_system() {
        let mut state = CpuState::new();
        state.registers.write_int(1, 0x1234);
        state.registers.write_int(2, 0x2000);
        let mut mem = fresh_mem();
        let reservations = NoReservations;

        Tier0::exec_memory(&mut state, &mut mem, &reservations, 0, MemoryOp::Stq, 1, 2, 0).unwrap();
        Tier0::exec_memory(&mut state, &mut mem, &reservations, 0, MemoryOp::Ldq, 3, 2, 0).unwrap();
        assert_eq!(state.registers.read_int(3), 0x1234);
    }
}
