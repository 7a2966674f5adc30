use crate::cache::{CodeCache, CompiledBlockHandle, CompiledBlockMeta};
use crate::page_version::PageVersionTable;
use crate::profile::HotnessProfile;

pub use crate::page_version::PAGE_SHIFT;

/// How a compiled block's single-step execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitBlockExit {
    pub next_pc: u64,
    /// Forces exactly one interpreter step before any further JIT dispatch,
    /// e.g. because the block touched state the interpreter alone models.
    pub exit_to_interpreter: bool,
    /// Whether architectural state (retirement count, interrupt shadow,
    /// timers) should actually be applied, or rolled back.
    pub committed: bool,
}

/// Produces an architectural side effect from a compiled block. Generic
/// over the CPU state type so this crate has no dependency on any concrete
/// register file.
pub trait JitBackend {
    type Cpu;
    fn execute(&mut self, table_index: u32, cpu: &mut Self::Cpu) -> JitBlockExit;
}

/// Where the runtime reports a PC that has crossed the hotness threshold,
/// asking for a block to be produced. Decoupled from how compilation
/// actually happens.
pub trait CompileRequestSink {
    fn request_compile(&mut self, entry_pc: u64);
}

#[derive(Debug, Clone, Copy)]
pub struct JitConfig {
    pub enabled: bool,
    pub hot_threshold: u32,
    pub cache_max_blocks: usize,
    pub cache_max_bytes: u64,
    pub code_version_max_pages: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_threshold: 50,
            cache_max_blocks: 4096,
            cache_max_bytes: 0,
            code_version_max_pages: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitStats {
    pub cache_hit: u64,
    pub cache_miss: u64,
    pub evictions: u64,
    pub install_ok: u64,
    pub install_rejected_stale: u64,
    pub invalidations: u64,
    pub compile_requests: u64,
}

/// Owns the hotness profile and code cache and orchestrates them
///. The backend is responsible for actually running a
/// compiled block; for this emulator that is always the fused-micro-op
/// interpreter path (no native codegen backend).
pub struct JitRuntime<Backend, Sink> {
    config: JitConfig,
    backend: Backend,
    sink: Sink,
    profile: HotnessProfile,
    cache: CodeCache,
    page_versions: PageVersionTable,
    stats: JitStats,
}

impl<Backend: JitBackend, Sink: CompileRequestSink> JitRuntime<Backend, Sink> {
    pub fn new(config: JitConfig, backend: Backend, sink: Sink) -> Self {
        let profile_capacity = config.cache_max_blocks.max(1) * 4;
        Self {
            profile: HotnessProfile::new_with_capacity(config.hot_threshold, profile_capacity),
            cache: CodeCache::new(config.cache_max_blocks, config.cache_max_bytes),
            page_versions: PageVersionTable::new(config.code_version_max_pages.max(1)),
            config,
            backend,
            sink,
            stats: JitStats::default(),
        }
    }

    pub fn config(&self) -> JitConfig {
        self.config
    }

    pub fn stats_snapshot(&self) -> JitStats {
        self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_compiled(&self, entry_pc: u64) -> bool {
        self.cache.contains(entry_pc)
    }

    /// The installed block's validation/retirement metadata, for a caller
    /// that just ran `execute` and needs `instruction_count`/
    /// `inhibit_interrupts_after_block` to account for it.
    pub fn meta(&self, entry_pc: u64) -> Option<&CompiledBlockMeta> {
        self.cache.meta(entry_pc)
    }

    pub fn page_versions(&self) -> &PageVersionTable {
        &self.page_versions
    }

    /// Records a guest write, bumping the version of every page it touches.
    pub fn on_guest_write(&mut self, paddr: u64, len: usize) {
        self.page_versions.record_write(paddr, len);
    }

    /// Invalidates all outstanding validation snapshots at once (e.g. on a
    /// full TLB/cache flush), without rewriting every page counter.
    pub fn reset(&mut self) {
        self.page_versions.reset();
    }

    /// Captures the current per-page versions covering `[code_paddr,
    /// code_paddr+byte_len)`, for a compiler to embed in a
    /// `CompiledBlockMeta`.
    pub fn snapshot_meta(&self, code_paddr: u64, byte_len: u32) -> CompiledBlockMeta {
        let (generation, page_versions) = self.page_versions.snapshot(code_paddr, byte_len as usize);
        CompiledBlockMeta {
            code_paddr,
            byte_len,
            page_versions_generation: generation,
            page_versions,
            instruction_count: 0,
            inhibit_interrupts_after_block: false,
        }
    }

    /// Alias for [`Self::snapshot_meta`] for callers that then mutate the
    /// remaining fields in place.
    pub fn make_meta(&self, code_paddr: u64, byte_len: u32) -> CompiledBlockMeta {
        self.snapshot_meta(code_paddr, byte_len)
    }

    fn meta_is_current(&self, meta: &CompiledBlockMeta) -> bool {
        self.page_versions.snapshot_is_current(meta.page_versions_generation, &meta.page_versions)
    }

    /// Installs a compiled block. Rejected outright if its recorded page
    /// versions are already stale; a stale install only triggers a fresh
    /// compile request if no currently-valid block already serves this
    /// `entry_pc`.
    pub fn install_handle(&mut self, handle: CompiledBlockHandle) {
        if !self.meta_is_current(&handle.meta) {
            self.stats.install_rejected_stale += 1;
            let entry_pc = handle.entry_pc;
            let has_valid_existing = self
                .cache
                .meta(entry_pc)
                .map(|m| self.page_versions.snapshot_is_current(m.page_versions_generation, &m.page_versions))
                .unwrap_or(false);
            if !has_valid_existing {
                self.sink.request_compile(entry_pc);
                self.stats.compile_requests += 1;
            }
            return;
        }
        let evicted = self.cache.insert(handle);
        self.stats.install_ok += 1;
        self.stats.evictions += evicted.len() as u64;
    }

    /// Convenience for tests/bring-up: snapshots the current page versions
    /// and installs a block in one call.
    pub fn install_block(&mut self, entry_pc: u64, table_index: u32, code_paddr: u64, byte_len: u32) {
        let meta = self.snapshot_meta(code_paddr, byte_len);
        self.install_handle(CompiledBlockHandle { entry_pc, table_index, meta });
    }

    pub fn invalidate_block(&mut self, entry_pc: u64) -> bool {
        if self.cache.remove(entry_pc).is_some() {
            self.stats.invalidations += 1;
            true
        } else {
            false
        }
    }

    /// Looks up a compiled block for `entry_pc`, lazily evicting and
    /// requesting recompilation if self-modifying code has invalidated it,
    /// and feeding the hotness profile on a genuine miss.
    pub fn prepare_block(&mut self, entry_pc: u64) -> Option<u32> {
        if let Some(handle) = self.cache.get_cloned(entry_pc) {
            if self.meta_is_current(&handle.meta) {
                self.stats.cache_hit += 1;
                self.profile.record_hit(entry_pc, true);
                return Some(handle.table_index);
            }
            self.cache.remove(entry_pc);
            self.stats.invalidations += 1;
            self.sink.request_compile(entry_pc);
            self.stats.compile_requests += 1;
            self.stats.cache_miss += 1;
            return None;
        }

        self.stats.cache_miss += 1;
        if self.profile.record_hit(entry_pc, false) {
            self.sink.request_compile(entry_pc);
            self.stats.compile_requests += 1;
        }
        None
    }

    pub fn execute(&mut self, table_index: u32, cpu: &mut Backend::Cpu) -> JitBlockExit {
        self.backend.execute(table_index, cpu)
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }
}
