mod decode;
mod instruction;
mod opcode;
mod raw;

pub use decode::{decode, DecodeError};
pub use instruction::{
    BranchOp, FloatFormat, FloatOp, Instruction, IntegerOp, MemoryOp, MiscOp, OperateOperand,
};
pub use opcode::{func_float, func_int, func_misc, major};
pub use raw::RawWord;
