//! `DataCache` and `InstructionCache`: N-way
//! set-associative write-back caches with MESI coherency, chained
//! `L1 -> L2 -> L3 -> PhysicalMemory`.

mod backend;
mod cache;
mod instruction;
mod line;
mod set;

pub use backend::CacheBackend;
pub use cache::{DataCache, SnoopOp};
pub use instruction::InstructionCache;
pub use line::CoherencyState;
