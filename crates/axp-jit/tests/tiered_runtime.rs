use axp_jit::{
    CompileRequestSink, CompiledBlockHandle, HotnessProfile, JitBackend, JitBlockExit, JitConfig,
    JitRuntime,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Default)]
struct RecordingSink(Rc<RefCell<Vec<u64>>>);

impl RecordingSink {
    fn snapshot(&self) -> Vec<u64> {
        self.0.borrow().clone()
    }
}

impl CompileRequestSink for RecordingSink {
    fn request_compile(&mut self, entry_pc: u64) {
        self.0.borrow_mut().push(entry_pc);
    }
}

#[derive(Default)]
struct AccumulatingBackend {
    acc: u64,
}

impl JitBackend for AccumulatingBackend {
    type Cpu = u64;
    fn execute(&mut self, _table_index: u32, cpu: &mut u64) -> JitBlockExit {
        self.acc += 1;
        *cpu += 1;
        JitBlockExit { next_pc: *cpu, exit_to_interpreter: false, committed: true }
    }
}

#[test]
fn installed_block_executes_through_backend() {
    let config = JitConfig { enabled: true, hot_threshold: 1_000, ..Default::default() };
    let compile = RecordingSink::default();
    let mut jit = JitRuntime::new(config, AccumulatingBackend::default(), compile);
    jit.install_block(7, 0, 0x9000, 4);

    let table_index = jit.prepare_block(7).expect("installed block must be a hit");
    let mut cpu_pc = 0u64;
    let exit = jit.execute(table_index, &mut cpu_pc);
    assert!(exit.committed);
    assert_eq!(cpu_pc, 1);
    assert_eq!(jit.backend_mut().acc, 1);
}

#[test]
fn install_and_evict_counting() {
    let config = JitConfig { cache_max_blocks: 1, hot_threshold: u32::MAX, ..Default::default() };
    let mut jit = JitRuntime::new(config, AccumulatingBackend::default(), RecordingSink::default());

    let meta0 = jit.make_meta(0, 0);
    jit.install_handle(CompiledBlockHandle { entry_pc: 0x1000, table_index: 0, meta: meta0 });
    let meta1 = jit.make_meta(0, 0);
    jit.install_handle(CompiledBlockHandle { entry_pc: 0x2000, table_index: 1, meta: meta1 });

    let stats = jit.stats_snapshot();
    assert_eq!(stats.install_ok, 2);
    assert_eq!(stats.evictions, 1);
    assert_eq!(jit.cache_len(), 1);
}

#[test]
fn hotness_profile_stays_capacity_bounded_under_guest_pc_churn() {
    let cap = 8;
    let mut profile = HotnessProfile::new_with_capacity(1_000, cap);
    for rip in 0..(cap as u64 * 10) {
        profile.record_hit(rip, false);
        assert!(profile.len() <= cap);
    }
}
