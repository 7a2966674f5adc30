//! Per-CPU architectural core: registers, IPRs, the exception stack, and
//! fault/REI delivery.

pub mod exception;
pub mod exec;
pub mod fault;
pub mod interp;
pub mod ipr;
pub mod jit_exec;
pub mod registers;
pub mod stack;
pub mod state;

pub use exception::{to_synchronous_fault, Delivery, ExceptionEngine};
pub use exec::{
    ExecCpu, ExecDispatcher, ExecutedTier, Interpreter, InterpreterBlockExit, PendingPoll, StepOutcome, Tier0Interpreter,
    Vcpu,
};
pub use fault::Fault;
pub use interp::{StepOutcome as Tier0StepOutcome, Tier0};
pub use ipr::{IprBank, IprWriteOutcome, TlbTrigger};
pub use jit_exec::MicroOpBackend;
pub use registers::RegisterFile;
pub use stack::{ExceptionFrame, SavedContext, StackManager, StackOverflow};
pub use state::{CpuState, ExternalIprEffect};
