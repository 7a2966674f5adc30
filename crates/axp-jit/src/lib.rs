mod cache;
mod microop;
mod page_version;
mod profile;
mod runtime;

pub use cache::{CodeCache, CompiledBlockHandle, CompiledBlockMeta};
pub use microop::{build_block, CompiledBlock, MicroOp};
pub use page_version::{PageVersionSnapshot, PageVersionTable, PAGE_SHIFT};
pub use profile::HotnessProfile;
pub use runtime::{CompileRequestSink, JitBackend, JitBlockExit, JitConfig, JitRuntime, JitStats};
