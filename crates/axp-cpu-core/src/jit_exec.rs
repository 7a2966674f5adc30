//! The JIT tier's execution backend: runs a `CompiledBlock` of fused
//! micro-ops produced by `axp-jit`'s forward-scan builder against a real
//! `Vcpu`, all-or-nothing. Register effects run against a swapped-in clone
//! of the real register file so a mid-block fault can be undone by putting
//! the original back; store bytes are buffered and only replayed for real
//! once every micro-op in the block has succeeded. Loads run for real
//! immediately — they are idempotent (no reservation is ever taken inside a
//! compiled block, since locked memory ops are block boundaries by
//! construction) so there is nothing to undo if a later op aborts the block.
//!
//! Grounded in `Tier0`'s own instruction execution (`interp.rs`): every
//! micro-op here either calls straight into `Tier0::exec_integer` /
//! `exec_float` / `exec_branch` or replicates `exec_memory`'s store path
//! with buffering substituted for the immediate write, so the two tiers
//! agree on every opcode by construction rather than by parallel
//! maintenance.

use axp_cache::CacheBackend;
use axp_decoder::{Instruction, MemoryOp};
use axp_jit::{CompiledBlock, JitBackend, JitBlockExit, MicroOp};
use axp_mmu::{MemorySystem, ReservationTracker, TlbFault, TranslateArgs};
use axp_types::{AccessKind, PhysAddr, VirtAddr};

use crate::exec::Vcpu;
use crate::fault::Fault;
use crate::interp::Tier0;
use crate::registers::RegisterFile;
use crate::state::CpuState;

struct PendingWrite {
    vaddr: VirtAddr,
    paddr: PhysAddr,
    size: u64,
    bytes: [u8; 8],
}

fn check_alignment(vaddr: VirtAddr, size: u64) -> Result<(), Fault> {
    if vaddr & (size - 1) != 0 {
        return Err(Fault::Translation(TlbFault::AlignmentFault { vaddr }));
    }
    Ok(())
}

fn stage_write<Backend: CacheBackend + Clone>(
    state: &CpuState,
    mem: &mut MemorySystem<Backend>,
    vaddr: VirtAddr,
    size: u64,
    bytes: [u8; 8],
    pending: &mut Vec<PendingWrite>,
) -> Result<(), Fault> {
    check_alignment(vaddr, size)?;
    let paddr = mem
        .translate(&TranslateArgs { vaddr, asn: state.asn(), access: AccessKind::Write, mode: state.mode() })
        .map_err(Fault::Translation)?;
    pending.push(PendingWrite { vaddr, paddr, size, bytes });
    Ok(())
}

/// A regular (non-fused, non-locked) store: `Stb/Stw/Stl/Stq/StqU/Stf/Stg/Sts/Stt`.
fn simulate_store<Backend: CacheBackend + Clone>(
    state: &CpuState,
    mem: &mut MemorySystem<Backend>,
    op: MemoryOp,
    ra: u8,
    rb: u8,
    disp: i16,
    pending: &mut Vec<PendingWrite>,
) -> Result<(), Fault> {
    let base = state.registers.read_int(rb);
    let addr = base.wrapping_add(disp as i64 as u64);
    let size = op.access_size() as u64;
    let access_addr = if op.is_unaligned() { addr & !7 } else { addr };
    let is_float = matches!(op, MemoryOp::Stf | MemoryOp::Stg | MemoryOp::Sts | MemoryOp::Stt);
    let raw = if is_float { state.registers.read_float_bits(ra) } else { state.registers.read_int(ra) };
    let mut bytes = [0u8; 8];
    bytes[..size as usize].copy_from_slice(&raw.to_le_bytes()[..size as usize]);
    stage_write(state, mem, access_addr, size, bytes, pending)
}

fn simulate_unaligned_load_quad<Backend: CacheBackend + Clone>(
    state: &mut CpuState,
    mem: &mut MemorySystem<Backend>,
    base: u8,
    dest: u8,
) -> Result<(), Fault> {
    let addr = state.registers.read_int(base);
    let lane = (addr & 7) as usize;
    let low_oct = addr & !7;
    let high_oct = low_oct + 8;

    let mut lo = [0u8; 8];
    mem.read_virtual(state.asn(), low_oct, 8, state.mode(), &mut lo).map_err(Fault::Translation)?;
    let mut hi = [0u8; 8];
    mem.read_virtual(state.asn(), high_oct, 8, state.mode(), &mut hi).map_err(Fault::Translation)?;

    let mut window = [0u8; 16];
    window[..8].copy_from_slice(&lo);
    window[8..].copy_from_slice(&hi);
    let mut result = [0u8; 8];
    result.copy_from_slice(&window[lane..lane + 8]);
    state.registers.write_int(dest, u64::from_le_bytes(result));
    Ok(())
}

/// Single-octaword unaligned partial store: the low `8 - lane` bytes of
/// `value` overwrite the high end of the aligned octaword at
/// `Rbase & !7`, leaving the low `lane` bytes of that octaword untouched.
/// This is what `INSQL/MSKQL/BIS/STQ_U` at a shared displacement computes;
/// it does not span a second octaword the way a full unaligned store of an
/// arbitrarily-placed 8-byte value would.
fn simulate_unaligned_store_quad<Backend: CacheBackend + Clone>(
    state: &CpuState,
    mem: &mut MemorySystem<Backend>,
    base: u8,
    value: u8,
    pending: &mut Vec<PendingWrite>,
) -> Result<(), Fault> {
    let addr = state.registers.read_int(base);
    let lane = (addr & 7) as usize;
    let access_addr = addr & !7;

    let mut merged = [0u8; 8];
    mem.read_virtual(state.asn(), access_addr, 8, state.mode(), &mut merged).map_err(Fault::Translation)?;
    let value_bytes = state.registers.read_int(value).to_le_bytes();
    merged[lane..].copy_from_slice(&value_bytes[lane..]);
    stage_write(state, mem, access_addr, 8, merged, pending)
}

fn simulate_op<Backend: CacheBackend + Clone>(
    state: &mut CpuState,
    mem: &mut MemorySystem<Backend>,
    reservations: &dyn ReservationTracker,
    cpu_id: u32,
    pc: VirtAddr,
    op: MicroOp,
    pending: &mut Vec<PendingWrite>,
) -> Result<VirtAddr, Fault> {
    match op {
        MicroOp::Single(Instruction::Integer { op, ra, rb, rc }) => {
            Tier0::exec_integer(state, op, ra, rb, rc)?;
            Ok(pc + 4)
        }
        MicroOp::Single(Instruction::Floating { op, format, fa, fb, fc, trap_qualifier, round_qualifier }) => {
            Tier0::exec_float(state, op, format, fa, fb, fc, round_qualifier, trap_qualifier)?;
            Ok(pc + 4)
        }
        MicroOp::Single(Instruction::Memory { op, ra, rb, disp }) if op.is_store() => {
            simulate_store(state, mem, op, ra, rb, disp, pending)?;
            Ok(pc + 4)
        }
        MicroOp::Single(Instruction::Memory { op, ra, rb, disp }) => {
            Tier0::exec_memory(state, mem, reservations, cpu_id, op, ra, rb, disp)?;
            Ok(pc + 4)
        }
        MicroOp::Single(Instruction::Branch { op, ra, disp }) => {
            match Tier0::exec_branch(state, pc, op, ra, disp) {
                crate::interp::StepOutcome::Branch { target } => Ok(target),
                crate::interp::StepOutcome::Next => Ok(pc + 4),
                crate::interp::StepOutcome::PalCall { .. } => unreachable!("branch never yields a PAL call"),
            }
        }
        MicroOp::Single(Instruction::Jsr { ra, rb, .. }) => {
            let target = state.registers.read_int(rb) & !0b11;
            state.registers.write_int(ra, pc + 4);
            Ok(target)
        }
        MicroOp::Single(Instruction::Misc { .. }) => Ok(pc + 4),
        MicroOp::Single(Instruction::PalCall { .. }) => {
            unreachable!("PAL calls are block boundaries and never scanned into a compiled block")
        }
        MicroOp::UnalignedLoadQuad { base, dest, .. } => {
            simulate_unaligned_load_quad(state, mem, base, dest)?;
            Ok(pc + 20)
        }
        MicroOp::UnalignedStoreQuad { base, value, .. } => {
            simulate_unaligned_store_quad(state, mem, base, value, pending)?;
            Ok(pc + 20)
        }
    }
}

fn run_block<Backend: CacheBackend + Clone>(block: &CompiledBlock, cpu: &mut Vcpu<Backend>) -> JitBlockExit {
    let shadow = cpu.state.registers.clone();
    let mut pending = Vec::new();
    let mut pc = block.entry_pc;
    let reservations = cpu.reservations.clone();

    for op in &block.ops {
        match simulate_op(&mut cpu.state, &mut cpu.mem, reservations.as_ref(), cpu.cpu_id, pc, *op, &mut pending) {
            Ok(next_pc) => pc = next_pc,
            Err(_fault) => {
                restore_registers(&mut cpu.state.registers, shadow);
                return JitBlockExit { next_pc: block.entry_pc, exit_to_interpreter: true, committed: false };
            }
        }
    }

    for write in pending {
        match cpu.mem.write_virtual(cpu.state.asn(), write.vaddr, write.size, cpu.state.mode(), &write.bytes[..write.size as usize]) {
            Ok(()) => reservations.invalidate_overlapping(cpu.cpu_id, write.paddr, write.size as u8),
            Err(_) => unreachable!("store target was already validated during simulation"),
        }
    }

    JitBlockExit { next_pc: pc, exit_to_interpreter: false, committed: true }
}

fn restore_registers(target: &mut RegisterFile, shadow: RegisterFile) {
    *target = shadow;
}

/// Owns the compiled blocks `axp-jit`'s forward-scan builder produces and
/// runs them through the two-phase simulate/commit dispatch above. The
/// `CodeCache`/`HotnessProfile` bookkeeping lives in `axp_jit::JitRuntime`;
/// this backend only ever sees the `table_index` that bookkeeping hands it.
pub struct MicroOpBackend<Backend: CacheBackend + Clone> {
    blocks: Vec<CompiledBlock>,
    _marker: std::marker::PhantomData<Backend>,
}

impl<Backend: CacheBackend + Clone> Default for MicroOpBackend<Backend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Backend: CacheBackend + Clone> MicroOpBackend<Backend> {
    pub fn new() -> Self {
        Self { blocks: Vec::new(), _marker: std::marker::PhantomData }
    }

    /// Registers a freshly built block and returns the `table_index` to hand
    /// to `JitRuntime::install_handle`/`install_block` alongside it.
    pub fn register(&mut self, block: CompiledBlock) -> u32 {
        self.blocks.push(block);
        (self.blocks.len() - 1) as u32
    }

    pub fn block(&self, table_index: u32) -> Option<&CompiledBlock> {
        self.blocks.get(table_index as usize)
    }
}

impl<Backend: CacheBackend + Clone> JitBackend for MicroOpBackend<Backend> {
    type Cpu = Vcpu<Backend>;

    fn execute(&mut self, table_index: u32, cpu: &mut Self::Cpu) -> JitBlockExit {
        let entry_pc = cpu.pc();
        let Some(block) = self.blocks.get(table_index as usize) else {
            return JitBlockExit { next_pc: entry_pc, exit_to_interpreter: true, committed: false };
        };
        if block.is_fallback || block.ops.is_empty() {
            return JitBlockExit { next_pc: block.entry_pc, exit_to_interpreter: true, committed: false };
        }
        run_block(block, cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_cache::{DataCache, InstructionCache};
    use axp_jit::build_block;
    use axp_mem::{MemoryBus, PhysicalMemory};
    use std::sync::Arc;

    struct NoReservations;
    impl ReservationTracker for NoReservations {
        fn register_reservation(&self, _cpu: u32, _paddr: PhysAddr, _size: u8) {}
        fn check_and_clear_reservation(&self, _cpu: u32, _paddr: PhysAddr) -> bool {
            false
        }
        fn clear_reservation(&self, _cpu: u32) {}
        fn invalidate_overlapping(&self, _writer_cpu: u32, _paddr: PhysAddr, _size: u8) {}
    }

    fn fresh_vcpu() -> Vcpu<MemoryBus> {
        let ram = Arc::new(PhysicalMemory::new(1 << 20).unwrap());
        let bus = MemoryBus::new(ram);
        let l1d = DataCache::new(4, 2, bus.clone());
        let icache = InstructionCache::new(4, 2, bus.clone());
        let mem = MemorySystem::new(32, l1d, icache, bus);
        Vcpu::new(0, CpuState::new(), mem, Arc::new(NoReservations))
    }

    fn encode_operate(opcode: u8, ra: u8, rb: u8, function: u16, rc: u8) -> u32 {
        ((opcode as u32) << 26) | ((ra as u32) << 21) | ((rb as u32) << 16) | ((function as u32) << 5) | (rc as u32)
    }

    fn encode_memory(opcode: u8, ra: u8, rb: u8, disp: i16) -> u32 {
        ((opcode as u32) << 26) | ((ra as u32) << 21) | ((rb as u32) << 16) | (disp as u16 as u32)
    }

    /// `base` holds the exact unaligned address (disp 0 on every
    /// instruction); this is the canonical form compilers emit once the
    /// pointer itself has been materialized into a register.
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
    fn committed_fused_unaligned_load_matches_manual_bytes() {
        let mut vcpu = fresh_vcpu();
        let words = unaligned_load_words(1, 2, 3, 5);
        let mut backend: MicroOpBackend<MemoryBus> = MicroOpBackend::new();

        // R1 holds an unaligned pointer into a region we seed with a known
        // 8-byte pattern straddling two octawords.
        vcpu.state.registers.write_int(1, 0x3004);
        let pattern: [u8; 16] = [0xBA, 0xBE, 0xCA, 0xEF, 0xBE, 0xAD, 0xDE, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99];
        vcpu.mem.write_virtual(vcpu.state.asn(), 0x3000, 8, vcpu.state.mode(), &pattern[..8]).unwrap();
        vcpu.mem.write_virtual(vcpu.state.asn(), 0x3008, 8, vcpu.state.mode(), &pattern[8..]).unwrap();

        let block = build_block(0x1000, |pc| {
            let idx = ((pc - 0x1000) / 4) as usize;
            words.get(idx).copied()
        });
        assert_eq!(block.ops.len(), 1);
        let table_index = backend.register(block);

        vcpu.set_pc(0x1000);
        let exit = backend.execute(table_index, &mut vcpu);
        assert!(exit.committed);
        assert_eq!(exit.next_pc, 0x1014);
        assert_eq!(vcpu.state.registers.read_int(5), u64::from_le_bytes(pattern[4..12].try_into().unwrap()));
    }

    #[test]
    fn rolled_back_block_leaves_registers_untouched() {
        let mut vcpu = fresh_vcpu();
        vcpu.state.registers.write_int(9, 0xFACE);

        // A single integer op followed by a load through an address that
        // will not translate (page fault): the whole block must abort and
        // the integer op's effect must not be visible.
        use axp_decoder::{func_int, major};
        let words = vec![
            encode_operate(major::INTA, 31, 0, func_int::ADDQ, 9), // R9 = 0 + 0, would clobber 0xFACE
            encode_memory(major::LDQ, 2, 10, 0),                  // R10 is 0: unmapped
        ];
        vcpu.state.registers.write_int(10, 0);

        let block = build_block(0x2000, |pc| {
            let idx = ((pc - 0x2000) / 4) as usize;
            words.get(idx).copied()
        });
        let mut backend: MicroOpBackend<MemoryBus> = MicroOpBackend::new();
        let table_index = backend.register(block);

        vcpu.set_pc(0x2000);
        let exit = backend.execute(table_index, &mut vcpu);
        assert!(!exit.committed);
        assert!(exit.exit_to_interpreter);
        assert_eq!(exit.next_pc, 0x2000);
        assert_eq!(vcpu.state.registers.read_int(9), 0xFACE, "aborted block must not retain partial effects");
    }

    #[test]
    fn fused_unaligned_store_merges_only_the_high_lane_bytes() {
        let mut vcpu = fresh_vcpu();
        vcpu.mem.write_virtual(vcpu.state.asn(), 0x4000, 8, vcpu.state.mode(), &[0xFF; 8]).unwrap();
        vcpu.state.registers.write_int(10, 0x4004); // lane 4
        vcpu.state.registers.write_int(2, 0x1122_3344_5566_7788);

        use axp_decoder::{func_int, major};
        let words = vec![
            encode_memory(major::LDQ_U, 1, 10, 0),
            encode_operate(major::INTS, 2, 10, func_int::INSQL, 20),
            encode_operate(major::INTS, 1, 10, func_int::MSKQL, 21),
            encode_operate(major::INTL, 20, 21, func_int::BIS, 22),
            encode_memory(major::STQ_U, 22, 10, 0),
        ];
        let block = build_block(0x3000, |pc| {
            let idx = ((pc - 0x3000) / 4) as usize;
            words.get(idx).copied()
        });
        assert_eq!(block.ops.len(), 1);
        let mut backend: MicroOpBackend<MemoryBus> = MicroOpBackend::new();
        let table_index = backend.register(block);

        vcpu.set_pc(0x3000);
        let exit = backend.execute(table_index, &mut vcpu);
        assert!(exit.committed);

        let mut out = [0u8; 8];
        vcpu.mem.read_virtual(vcpu.state.asn(), 0x4000, 8, vcpu.state.mode(), &mut out).unwrap();
        assert_eq!(&out[..4], &[0xFF; 4]); // low lane untouched
        assert_eq!(&out[4..], &0x1122_3344_5566_7788u64.to_le_bytes()[..4]); // high lane overwritten
    }
}
