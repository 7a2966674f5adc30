/// Primary (bits 31:26) opcode values this decoder recognizes.
pub mod major {
    pub const CALL_PAL: u8 = 0x00;
    pub const INTA: u8 = 0x10;
    pub const INTL: u8 = 0x11;
    pub const INTS: u8 = 0x12;
    pub const INTM: u8 = 0x13;
    pub const ITFP: u8 = 0x14;
    pub const FLTV: u8 = 0x15;
    pub const FLTI: u8 = 0x16;
    pub const FLTL: u8 = 0x17;
    pub const MISC: u8 = 0x18;
    pub const JSR: u8 = 0x1A;
    pub const LDA: u8 = 0x08;
    pub const LDAH: u8 = 0x09;
    pub const LDBU: u8 = 0x0A;
    pub const LDQ_U: u8 = 0x0B;
    pub const LDWU: u8 = 0x0C;
    pub const STW: u8 = 0x0D;
    pub const STB: u8 = 0x0E;
    pub const STQ_U: u8 = 0x0F;
    pub const LDF: u8 = 0x20;
    pub const LDG: u8 = 0x21;
    pub const LDS: u8 = 0x22;
    pub const LDT: u8 = 0x23;
    pub const STF: u8 = 0x24;
    pub const STG: u8 = 0x25;
    pub const STS: u8 = 0x26;
    pub const STT: u8 = 0x27;
    pub const LDL: u8 = 0x28;
    pub const LDQ: u8 = 0x29;
    pub const LDL_L: u8 = 0x2A;
    pub const LDQ_L: u8 = 0x2B;
    pub const STL: u8 = 0x2C;
    pub const STQ: u8 = 0x2D;
    pub const STL_C: u8 = 0x2E;
    pub const STQ_C: u8 = 0x2F;
    pub const BR: u8 = 0x30;
    pub const FBEQ: u8 = 0x31;
    pub const FBLT: u8 = 0x32;
    pub const FBLE: u8 = 0x33;
    pub const BSR: u8 = 0x34;
    pub const FBNE: u8 = 0x35;
    pub const FBGE: u8 = 0x36;
    pub const FBGT: u8 = 0x37;
    pub const BLBC: u8 = 0x38;
    pub const BEQ: u8 = 0x39;
    pub const BLT: u8 = 0x3A;
    pub const BLE: u8 = 0x3B;
    pub const BNE: u8 = 0x3C;
    pub const BGE: u8 = 0x3D;
    pub const BGT: u8 = 0x3E;
    pub const BLBS: u8 = 0x3F;
}

/// Function codes within the `INTA`/`INTL`/`INTS`/`INTM` operate groups,
/// using the standard Alpha encoding.
pub mod func_int {
    pub const ADDL: u16 = 0x00;
    pub const S4ADDL: u16 = 0x02;
    pub const SUBL: u16 = 0x09;
    pub const S4SUBL: u16 = 0x0B;
    pub const CMPBGE: u16 = 0x0F;
    pub const S8ADDL: u16 = 0x12;
    pub const S8SUBL: u16 = 0x1B;
    pub const CMPULT: u16 = 0x1D;
    pub const ADDQ: u16 = 0x20;
    pub const S4ADDQ: u16 = 0x22;
    pub const SUBQ: u16 = 0x29;
    pub const S4SUBQ: u16 = 0x2B;
    pub const CMPEQ: u16 = 0x2D;
    pub const S8ADDQ: u16 = 0x32;
    pub const S8SUBQ: u16 = 0x3B;
    pub const CMPULE: u16 = 0x3D;
    pub const CMPLT: u16 = 0x4D;
    pub const CMPLE: u16 = 0x6D;

    pub const AND: u16 = 0x00;
    pub const BIC: u16 = 0x08;
    pub const CMOVLBS: u16 = 0x14;
    pub const CMOVLBC: u16 = 0x16;
    pub const BIS: u16 = 0x20;
    pub const CMOVEQ: u16 = 0x24;
    pub const CMOVNE: u16 = 0x26;
    pub const ORNOT: u16 = 0x28;
    pub const XOR: u16 = 0x40;
    pub const CMOVLT: u16 = 0x44;
    pub const CMOVGE: u16 = 0x46;
    pub const EQV: u16 = 0x48;
    pub const AMASK: u16 = 0x61;
    pub const CMOVLE: u16 = 0x64;
    pub const CMOVGT: u16 = 0x66;
    pub const IMPLVER: u16 = 0x6C;

    pub const MSKBL: u16 = 0x02;
    pub const EXTBL: u16 = 0x06;
    pub const INSBL: u16 = 0x0B;
    pub const MSKWL: u16 = 0x12;
    pub const EXTWL: u16 = 0x16;
    pub const INSWL: u16 = 0x1B;
    pub const MSKLL: u16 = 0x22;
    pub const EXTLL: u16 = 0x26;
    pub const INSLL: u16 = 0x2B;
    pub const ZAP: u16 = 0x30;
    pub const ZAPNOT: u16 = 0x31;
    pub const MSKQL: u16 = 0x32;
    pub const SRL: u16 = 0x34;
    pub const EXTQL: u16 = 0x36;
    pub const SLL: u16 = 0x39;
    pub const INSQL: u16 = 0x3B;
    pub const SRA: u16 = 0x3C;
    pub const MSKWH: u16 = 0x52;
    pub const INSWH: u16 = 0x57;
    pub const EXTWH: u16 = 0x5A;
    pub const MSKLH: u16 = 0x62;
    pub const INSLH: u16 = 0x67;
    pub const EXTLH: u16 = 0x6A;
    pub const MSKQH: u16 = 0x72;
    pub const INSQH: u16 = 0x77;
    pub const EXTQH: u16 = 0x7A;

    pub const MULL: u16 = 0x00;
    pub const MULQ: u16 = 0x20;
    pub const UMULH: u16 = 0x30;
}

/// Floating-operate function codes (`ITFP`/`FLTV`/`FLTI`/`FLTL`), 11 bits.
pub mod func_float {
    pub const ADDF: u16 = 0x080;
    pub const SUBF: u16 = 0x081;
    pub const MULF: u16 = 0x082;
    pub const DIVF: u16 = 0x083;
    pub const ADDG: u16 = 0x0A0;
    pub const SUBG: u16 = 0x0A1;
    pub const MULG: u16 = 0x0A2;
    pub const DIVG: u16 = 0x0A3;
    pub const ADDS: u16 = 0x080;
    pub const ADDT: u16 = 0x0A0;
    pub const SUBT: u16 = 0x0A1;
    pub const MULT: u16 = 0x0A2;
    pub const DIVT: u16 = 0x0A3;
    pub const CMPTEQ: u16 = 0x0A5;
    pub const CMPTLT: u16 = 0x0A6;
    pub const CMPTLE: u16 = 0x0A7;
    pub const CMPTUN: u16 = 0x0A4;
    pub const CVTQT: u16 = 0x0BC;
    pub const CVTQF: u16 = 0x03C;
    pub const CVTQG: u16 = 0x03E;
    pub const CVTTQ: u16 = 0x0AF;
    pub const CVTGQ: u16 = 0x03F;
}

/// Function codes in the `MISC` group (memory barriers, prefetch hints).
pub mod func_misc {
    pub const TRAPB: u16 = 0x0000;
    pub const EXCB: u16 = 0x0400;
    pub const MB: u16 = 0x4000;
    pub const WMB: u16 = 0x4400;
    pub const FETCH: u16 = 0x8000;
    pub const FETCH_M: u16 = 0xA000;
    pub const RPCC: u16 = 0xC000;
    pub const RC: u16 = 0xE000;
    pub const ECB: u16 = 0xE800;
    pub const RS: u16 = 0xF000;
    pub const WH64: u16 = 0xF800;
}
