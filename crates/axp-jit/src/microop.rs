use axp_decoder::{decode, Instruction, IntegerOp, MemoryOp, OperateOperand};

/// One scheduled unit inside a compiled block: either a single decoded
/// instruction passed straight through, or a multi-instruction idiom the
/// block builder recognized and collapsed into one specialized op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    Single(Instruction),
    /// `LDQ_U+LDQ_U+EXTQL+EXTQH+BIS`: one unaligned 64-bit load from the
    /// address held in `base`, landing in `dest`. `EXTQL`/`EXTQH` have no
    /// displacement field of their own and reference the unaligned address
    /// only through `base` directly, so this idiom only fuses when both
    /// `LDQ_U`s carry a zero displacement (the address is pre-materialized
    /// into `base` by the caller, the common compiler idiom).
    UnalignedLoadQuad { base: u8, dest: u8 },
    /// `LDQ_U+INSQL/INSQH+MSKQL/MSKQH+BIS+STQ_U`: one unaligned 64-bit
    /// store of `value` to the address held in `base`, under the same
    /// zero-displacement constraint as `UnalignedLoadQuad`.
    UnalignedStoreQuad { base: u8, value: u8 },
}

impl MicroOp {
    /// How many source instructions this op stands in for, for retirement
    /// accounting.
    pub fn source_instruction_count(&self) -> u32 {
        match self {
            MicroOp::Single(_) => 1,
            MicroOp::UnalignedLoadQuad { .. } | MicroOp::UnalignedStoreQuad { .. } => 5,
        }
    }
}

/// A forward-scanned, fusion-rewritten run of micro-ops starting at
/// `entry_pc`.
#[derive(Debug, Clone)]
pub struct CompiledBlock {
    pub entry_pc: u64,
    pub ops: Vec<MicroOp>,
    /// Guest code bytes this block covers, for `CompiledBlockMeta::byte_len`.
    pub byte_len: u32,
    /// Source instructions represented, summed across `ops` — what a
    /// committed execution of this block retires.
    pub instruction_count: u32,
    /// The entry instruction itself is something the JIT tier refuses to
    /// compile (a PAL call, a barrier, a locked memory op): this block is
    /// permanently empty and its only valid use is falling straight back
    /// to the interpreter.
    pub is_fallback: bool,
}

const MAX_SCAN_INSTRUCTIONS: usize = 20;

/// Forward-scans from `entry_pc`, decoding and fusing until a branch/
/// jump/PAL-call/barrier/locked-memory boundary or `MAX_SCAN_INSTRUCTIONS`,
/// whichever comes first. `fetch` returns the raw instruction word at a
/// given PC, or `None` if it is not resident (treated like a boundary).
pub fn build_block(entry_pc: u64, mut fetch: impl FnMut(u64) -> Option<u32>) -> CompiledBlock {
    let mut decoded = Vec::new();
    let mut pc = entry_pc;
    while decoded.len() < MAX_SCAN_INSTRUCTIONS {
        let Some(word) = fetch(pc) else { break };
        let Ok(instr) = decode(word) else { break };
        if is_block_boundary(&instr) {
            break;
        }
        let ends_block = ends_straight_line(&instr);
        decoded.push(instr);
        pc += 4;
        if ends_block {
            break;
        }
    }

    if decoded.is_empty() {
        return CompiledBlock { entry_pc, ops: Vec::new(), byte_len: 0, instruction_count: 0, is_fallback: true };
    }

    let ops = fuse(&decoded);
    let instruction_count = ops.iter().map(MicroOp::source_instruction_count).sum();
    CompiledBlock { entry_pc, byte_len: (decoded.len() as u32) * 4, ops, instruction_count, is_fallback: false }
}

/// Instructions the JIT tier never compiles into a block at all: PAL calls
/// hand control to code this tier does not model, locked memory ops carry
/// cross-CPU reservation side effects the interpreter alone tracks, and
/// every `MiscOp` (barriers, `RPCC`, cache-hint ops) is rare enough on a hot
/// path that it is not worth a dispatch arm in the fused-block executor.
fn is_block_boundary(instr: &Instruction) -> bool {
    match instr {
        Instruction::PalCall { .. } => true,
        Instruction::Memory { op, .. } => op.is_locked(),
        Instruction::Misc { .. } => true,
        _ => false,
    }
}

/// Whether `instr` redirects the PC, ending straight-line execution.
fn ends_straight_line(instr: &Instruction) -> bool {
    matches!(instr, Instruction::Branch { .. } | Instruction::Jsr { .. })
}

fn fuse(instrs: &[Instruction]) -> Vec<MicroOp> {
    let mut ops = Vec::with_capacity(instrs.len());
    let mut i = 0;
    while i < instrs.len() {
        if let Some(op) = try_fuse_unaligned_load(&instrs[i..]) {
            ops.push(op);
            i += 5;
            continue;
        }
        if let Some(op) = try_fuse_unaligned_store(&instrs[i..]) {
            ops.push(op);
            i += 5;
            continue;
        }
        ops.push(MicroOp::Single(instrs[i]));
        i += 1;
    }
    ops
}

/// `LDQ_U t0,0(b); LDQ_U t1,7(b); EXTQL t0,b,r; EXTQH t1,b,r2; BIS r,r2,dest`.
/// `EXTQL`/`EXTQH` are operate-format and have no displacement of their own,
/// so they can only read "the unaligned address" from `b` directly — this
/// only matches the `LDQ_U`s' own displacement when it is exactly zero.
fn try_fuse_unaligned_load(window: &[Instruction]) -> Option<MicroOp> {
    if window.len() < 5 {
        return None;
    }
    let Instruction::Memory { op: MemoryOp::LdqU, ra: t0, rb: base0, disp: d0 } = &window[0] else { return None };
    let Instruction::Memory { op: MemoryOp::LdqU, ra: t1, rb: base1, disp: d1 } = &window[1] else { return None };
    if base0 != base1 || *d0 != 0 || *d1 != 7 {
        return None;
    }
    let Instruction::Integer { op: IntegerOp::Extql, ra: ra2, rb: OperateOperand::Reg(rb2), rc: rc2 } = &window[2] else {
        return None;
    };
    let Instruction::Integer { op: IntegerOp::Extqh, ra: ra3, rb: OperateOperand::Reg(rb3), rc: rc3 } = &window[3] else {
        return None;
    };
    if ra2 != t0 || rb2 != base0 || ra3 != t1 || rb3 != base0 {
        return None;
    }
    let Instruction::Integer { op: IntegerOp::Bis, ra: ra4, rb: OperateOperand::Reg(rb4), rc: dest } = &window[4] else {
        return None;
    };
    if !((ra4 == rc2 && rb4 == rc3) || (ra4 == rc3 && rb4 == rc2)) {
        return None;
    }
    Some(MicroOp::UnalignedLoadQuad { base: *base0, dest: *dest })
}

/// `LDQ_U t0,0(b); INSQL/INSQH v,b,i; MSKQL/MSKQH t0,b,m; BIS i,m,s; STQ_U s,0(b)`.
/// Same zero-displacement constraint as `try_fuse_unaligned_load`, since
/// `INSQL`/`MSKQL` are operate-format and reference `b` directly.
fn try_fuse_unaligned_store(window: &[Instruction]) -> Option<MicroOp> {
    if window.len() < 5 {
        return None;
    }
    let Instruction::Memory { op: MemoryOp::LdqU, ra: t0, rb: base0, disp: d0 } = &window[0] else { return None };
    if *d0 != 0 {
        return None;
    }

    let (ins, msk) = match (&window[1], &window[2]) {
        (a @ Instruction::Integer { op: IntegerOp::Insql, .. }, b @ Instruction::Integer { op: IntegerOp::Mskql, .. }) => {
            (a, b)
        }
        (a @ Instruction::Integer { op: IntegerOp::Mskql, .. }, b @ Instruction::Integer { op: IntegerOp::Insql, .. }) => {
            (b, a)
        }
        _ => return None,
    };
    let Instruction::Integer { op: IntegerOp::Insql, ra: value, rb: OperateOperand::Reg(ins_base), rc: ins_dest } = ins
    else {
        return None;
    };
    let Instruction::Integer { op: IntegerOp::Mskql, ra: msk_src, rb: OperateOperand::Reg(msk_base), rc: msk_dest } = msk
    else {
        return None;
    };
    if ins_base != base0 || msk_base != base0 || msk_src != t0 {
        return None;
    }

    let Instruction::Integer { op: IntegerOp::Bis, ra: bis_a, rb: OperateOperand::Reg(bis_b), rc: store_src } =
        &window[3]
    else {
        return None;
    };
    if !((bis_a == ins_dest && bis_b == msk_dest) || (bis_a == msk_dest && bis_b == ins_dest)) {
        return None;
    }

    let Instruction::Memory { op: MemoryOp::StqU, ra: stq_src, rb: base4, disp: d4 } = &window[4] else { return None };
    if stq_src != store_src || base4 != base0 || *d4 != 0 {
        return None;
    }

    Some(MicroOp::UnalignedStoreQuad { base: *base0, value: *value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_decoder::{BranchOp, FloatFormat, FloatOp};

    fn encode_operate(opcode: u8, ra: u8, rb: u8, function: u16, rc: u8) -> u32 {
        ((opcode as u32) << 26) | ((ra as u32) << 21) | ((rb as u32) << 16) | ((function as u32) << 5) | (rc as u32)
    }

    fn encode_memory(opcode: u8, ra: u8, rb: u8, disp: i16) -> u32 {
        ((opcode as u32) << 26) | ((ra as u32) << 21) | ((rb as u32) << 16) | (disp as u16 as u32)
    }

    fn unaligned_load_words(base: u8, t0: u8, t1: u8, dest: u8) -> Vec<u32> {
        use axp_decoder::{func_int, major};
        vec![
            encode_memory(major::LDQ_U, t0, base, 0),
            encode_memory(major::LDQ_U, t1, base, 7),
            encode_operate(major::INTS, t0, base, func_int::EXTQL, 20),
            encode_operate(major::INTS, t1, base, func_int::EXTQH, 21),
            encode_operate(major::INTL, 20, 21, func_int::BIS, dest),
        ]
    }

    #[test]
    fn fuses_unaligned_load_quad_idiom() {
        let words = unaligned_load_words(10, 1, 2, 5);
        let block = build_block(0x1000, |pc| {
            let idx = ((pc - 0x1000) / 4) as usize;
            words.get(idx).copied()
        });
        assert_eq!(block.ops.len(), 1);
        assert!(matches!(block.ops[0], MicroOp::UnalignedLoadQuad { base: 10, dest: 5 }));
        assert_eq!(block.instruction_count, 5);
        assert_eq!(block.byte_len, 20);
    }

    #[test]
    fn nonzero_displacement_prevents_unaligned_load_fusion() {
        use axp_decoder::{func_int, major};
        let words = vec![
            encode_memory(major::LDQ_U, 1, 10, 8),
            encode_memory(major::LDQ_U, 2, 10, 15),
            encode_operate(major::INTS, 1, 10, func_int::EXTQL, 20),
            encode_operate(major::INTS, 2, 10, func_int::EXTQH, 21),
            encode_operate(major::INTL, 20, 21, func_int::BIS, 5),
        ];
        let block = build_block(0, |pc| words.get((pc / 4) as usize).copied());
        assert_eq!(block.ops.len(), 5, "EXTQL/EXTQH have no displacement of their own, so a nonzero LDQ_U disp cannot fuse");
        assert!(block.ops.iter().all(|op| matches!(op, MicroOp::Single(_))));
    }

    #[test]
    fn fuses_unaligned_store_quad_idiom() {
        use axp_decoder::{func_int, major};
        let words = vec![
            encode_memory(major::LDQ_U, 1, 10, 0),
            encode_operate(major::INTS, 2, 10, func_int::INSQL, 20),
            encode_operate(major::INTS, 1, 10, func_int::MSKQL, 21),
            encode_operate(major::INTL, 20, 21, func_int::BIS, 22),
            encode_memory(major::STQ_U, 22, 10, 0),
        ];
        let block = build_block(0x2000, |pc| {
            let idx = ((pc - 0x2000) / 4) as usize;
            words.get(idx).copied()
        });
        assert_eq!(block.ops.len(), 1);
        assert!(matches!(block.ops[0], MicroOp::UnalignedStoreQuad { base: 10, value: 2 }));
        assert_eq!(block.instruction_count, 5);
    }

    #[test]
    fn stops_scan_at_branch_and_retires_the_branch_itself() {
        use axp_decoder::major;
        let words = vec![
            encode_operate(major::INTA, 1, 2, 0x20, 3), // ADDQ
            ((major::BR as u32) << 26) | (0u32),
        ];
        let block = build_block(0, |pc| words.get((pc / 4) as usize).copied());
        assert_eq!(block.ops.len(), 2);
        assert!(!block.is_fallback);
        assert_eq!(block.instruction_count, 2);
    }

    #[test]
    fn refuses_to_compile_a_block_whose_entry_is_a_barrier() {
        use axp_decoder::{func_misc, major};
        let words = vec![((major::MISC as u32) << 26) | (func_misc::MB as u32)];
        let block = build_block(0, |pc| words.get((pc / 4) as usize).copied());
        assert!(block.is_fallback);
        assert!(block.ops.is_empty());
    }

    #[test]
    fn non_barrier_misc_op_is_also_a_block_boundary() {
        use axp_decoder::{func_misc, major};
        let words = vec![((major::MISC as u32) << 26) | (func_misc::RPCC as u32)];
        let block = build_block(0, |pc| words.get((pc / 4) as usize).copied());
        assert!(block.is_fallback, "RPCC is rare enough that it is not worth a dispatch arm in the fused executor");
    }

    #[test]
    fn mismatched_bases_do_not_fuse_as_unaligned_load() {
        use axp_decoder::{func_int, major};
        let words = vec![
            encode_memory(major::LDQ_U, 1, 10, 0),
            encode_memory(major::LDQ_U, 2, 11, 7), // different base register
            encode_operate(major::INTS, 1, 10, func_int::EXTQL, 20),
            encode_operate(major::INTS, 2, 10, func_int::EXTQH, 21),
            encode_operate(major::INTL, 20, 21, func_int::BIS, 5),
        ];
        let block = build_block(0, |pc| words.get((pc / 4) as usize).copied());
        assert_eq!(block.ops.len(), 5);
        assert!(block.ops.iter().all(|op| matches!(op, MicroOp::Single(_))));
    }

    #[test]
    fn unrelated_float_op_is_a_plain_single_microop() {
        let word = encode_operate(0x17, 4, 5, 0x0A0, 6); // FLTL ADDT
        let block = build_block(0, |pc| if pc == 0 { Some(word) } else { None });
        match block.ops.as_slice() {
            [MicroOp::Single(Instruction::Floating { op: FloatOp::Add, format: FloatFormat::IeeeT, .. })] => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn scan_budget_caps_block_length() {
        use axp_decoder::major;
        let word = encode_operate(major::INTA, 1, 2, 0x20, 3); // ADDQ, never branches
        let block = build_block(0, |_pc| Some(word));
        assert_eq!(block.ops.len(), MAX_SCAN_INSTRUCTIONS);
    }

    #[test]
    fn unconditional_branch_variant_used_here_is_recognized() {
        assert!(BranchOp::Br.is_unconditional());
    }
}
