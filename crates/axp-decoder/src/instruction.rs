/// Either a register operand or an 8-bit zero-extended literal — the
/// operate-format "Rb or literal" choice selected by bit 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperateOperand {
    Reg(u8),
    Literal(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerOp {
    Addl,
    S4addl,
    Subl,
    S4subl,
    Cmpbge,
    S8addl,
    S8subl,
    Cmpult,
    Addq,
    S4addq,
    Subq,
    S4subq,
    Cmpeq,
    S8addq,
    S8subq,
    Cmpule,
    Cmplt,
    Cmple,
    And,
    Bic,
    Bis,
    Ornot,
    Xor,
    Eqv,
    CmovEq,
    CmovNe,
    CmovLt,
    CmovGe,
    CmovLe,
    CmovGt,
    CmovLbs,
    CmovLbc,
    Amask,
    Implver,
    Sll,
    Srl,
    Sra,
    Extbl,
    Extwl,
    Extll,
    Extql,
    Extwh,
    Extlh,
    Extqh,
    Insbl,
    Inswl,
    Insll,
    Insql,
    Inswh,
    Inslh,
    Insqh,
    Mskbl,
    Mskwl,
    Mskll,
    Mskql,
    Mskwh,
    Msklh,
    Mskqh,
    Zap,
    Zapnot,
    Mull,
    Mulq,
    Umulh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
    CmpEq,
    CmpLt,
    CmpLe,
    CmpUn,
    CvtQt,
    CvtQf,
    CvtQg,
    CvtTq,
    CvtGq,
}

/// Floating-point format the operands are interpreted under: IEEE single
/// (S) and double (T), or VAX F-format and G-format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatFormat {
    VaxF,
    VaxG,
    IeeeS,
    IeeeT,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    Lda,
    Ldah,
    Ldbu,
    LdqU,
    Ldwu,
    Stw,
    Stb,
    StqU,
    Ldl,
    Ldq,
    LdlL,
    LdqL,
    Stl,
    Stq,
    StlC,
    StqC,
    Ldf,
    Ldg,
    Lds,
    Ldt,
    Stf,
    Stg,
    Sts,
    Stt,
}

impl MemoryOp {
    pub fn is_store(self) -> bool {
        matches!(
            self,
            MemoryOp::Stw
                | MemoryOp::Stb
                | MemoryOp::StqU
                | MemoryOp::Stl
                | MemoryOp::Stq
                | MemoryOp::StlC
                | MemoryOp::StqC
                | MemoryOp::Stf
                | MemoryOp::Stg
                | MemoryOp::Sts
                | MemoryOp::Stt
        )
    }

    pub fn is_unaligned(self) -> bool {
        matches!(self, MemoryOp::LdqU | MemoryOp::StqU)
    }

    pub fn is_locked(self) -> bool {
        matches!(self, MemoryOp::LdlL | MemoryOp::LdqL | MemoryOp::StlC | MemoryOp::StqC)
    }

    pub fn access_size(self) -> u8 {
        match self {
            MemoryOp::Ldbu | MemoryOp::Stb => 1,
            MemoryOp::Ldwu | MemoryOp::Stw => 2,
            MemoryOp::Lda | MemoryOp::Ldah => 8,
            MemoryOp::Ldl | MemoryOp::LdlL | MemoryOp::Stl | MemoryOp::StlC => 4,
            MemoryOp::Ldf | MemoryOp::Stf | MemoryOp::Lds | MemoryOp::Sts => 4,
            _ => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    Br,
    Bsr,
    Beq,
    Bne,
    Blt,
    Ble,
    Bgt,
    Bge,
    Blbc,
    Blbs,
    Fbeq,
    Fbne,
    Fblt,
    Fble,
    Fbgt,
    Fbge,
}

impl BranchOp {
    pub fn is_unconditional(self) -> bool {
        matches!(self, BranchOp::Br | BranchOp::Bsr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscOp {
    Trapb,
    Excb,
    Mb,
    Wmb,
    Fetch,
    FetchM,
    Rpcc,
    Rc,
    Rs,
    Ecb,
    Wh64,
}

/// A fully decoded instruction. Register fields are raw
/// 5-bit indices (0..=31); R31/F31 special-casing happens in the register
/// file, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PalCall { function: u32 },
    Integer { op: IntegerOp, ra: u8, rb: OperateOperand, rc: u8 },
    Floating { op: FloatOp, format: FloatFormat, fa: u8, fb: u8, fc: u8, trap_qualifier: u8, round_qualifier: u8 },
    Memory { op: MemoryOp, ra: u8, rb: u8, disp: i16 },
    Branch { op: BranchOp, ra: u8, disp: i32 },
    Jsr { ra: u8, rb: u8, hint: u16 },
    Misc { op: MiscOp, ra: u8, rb: u8, disp: i16 },
}
