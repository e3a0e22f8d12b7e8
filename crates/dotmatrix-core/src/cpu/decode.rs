//! Opcode tables.
//!
//! Every opcode byte maps to an [`Instr`]: the operation, where its operands
//! live, and its cost in clock cycles. Conditional control flow carries a
//! second cost for the taken path. Cycle counts follow
//! gbdev.io/gb-opcodes/optables.

use crate::registers::{Reg8, Reg16};

/// Where an 8-bit operand is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Reg(Reg8),
    /// (HL)
    HlInd,
    /// n
    Imm,
    /// (BC)
    BcInd,
    /// (DE)
    DeInd,
    /// (HL+)
    HlInc,
    /// (HL-)
    HlDec,
    /// (nn)
    Abs,
    /// (FF00+n)
    HighImm,
    /// (FF00+C)
    HighC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Always,
    NotZero,
    Zero,
    NotCarry,
    Carry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// CB-prefixed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit(u8),
    Res(u8),
    Set(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    /// LD dst, src
    Ld(Operand8, Operand8),
    /// LD rr, nn
    Ld16(Reg16),
    /// LD (nn), SP
    LdAbsSp,
    LdSpHl,
    /// LD HL, SP+e8
    LdHlSpOffset,
    Push(Reg16),
    Pop(Reg16),
    Alu(AluOp, Operand8),
    Inc(Operand8),
    Dec(Operand8),
    Inc16(Reg16),
    Dec16(Reg16),
    AddHl(Reg16),
    /// ADD SP, e8
    AddSpOffset,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jp(Cond),
    JpHl,
    Jr(Cond),
    Call(Cond),
    Ret(Cond),
    Reti,
    Rst(u16),
    Prefix,
    Cb(CbOp, Operand8),
    Illegal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub op: Op,
    pub cycles: u8,
    pub cycles_taken: u8,
}

#[rustfmt::skip]
const CYCLES: [u8; 256] = [
//   0   1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
     4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0x
     4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1x
     8, 12,  8,  8,  4,  4,  8,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 2x
     8, 12,  8,  8, 12, 12, 12,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 3x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
     8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Ax
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Bx
     8, 12, 12, 16, 12, 16,  8, 16,  8, 16, 12,  4, 12, 24,  8, 16, // Cx
     8, 12, 12,  0, 12, 16,  8, 16,  8, 16, 12,  0, 12,  0,  8, 16, // Dx
    12, 12,  8,  0,  0, 16,  8, 16, 16,  4, 16,  0,  0,  0,  8, 16, // Ex
    12, 12,  8,  4,  0, 16,  8, 16, 12,  8, 16,  4,  0,  0,  8, 16, // Fx
];

/// Opcodes 0x00-0xFF.
pub static UNPREFIXED: [Instr; 256] = build_unprefixed();

/// Opcodes following 0xCB. Costs include the prefix byte.
pub static PREFIXED: [Instr; 256] = build_prefixed();

const fn r8(code: u8) -> Operand8 {
    match code & 0x07 {
        0 => Operand8::Reg(Reg8::B),
        1 => Operand8::Reg(Reg8::C),
        2 => Operand8::Reg(Reg8::D),
        3 => Operand8::Reg(Reg8::E),
        4 => Operand8::Reg(Reg8::H),
        5 => Operand8::Reg(Reg8::L),
        6 => Operand8::HlInd,
        _ => Operand8::Reg(Reg8::A),
    }
}

const fn rp(code: u8) -> Reg16 {
    match code & 0x03 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        _ => Reg16::SP,
    }
}

/// Register pairs as PUSH/POP name them.
const fn rp2(code: u8) -> Reg16 {
    match code & 0x03 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        _ => Reg16::AF,
    }
}

const fn cond(code: u8) -> Cond {
    match code & 0x03 {
        0 => Cond::NotZero,
        1 => Cond::Zero,
        2 => Cond::NotCarry,
        _ => Cond::Carry,
    }
}

const fn alu(code: u8) -> AluOp {
    match code & 0x07 {
        0 => AluOp::Add,
        1 => AluOp::Adc,
        2 => AluOp::Sub,
        3 => AluOp::Sbc,
        4 => AluOp::And,
        5 => AluOp::Xor,
        6 => AluOp::Or,
        _ => AluOp::Cp,
    }
}

const A: Operand8 = Operand8::Reg(Reg8::A);

const fn decode_unprefixed(opcode: u8) -> Op {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let q = y & 0x01;

    match opcode {
        0x00 => Op::Nop,
        0x08 => Op::LdAbsSp,
        0x10 => Op::Stop,
        0x18 => Op::Jr(Cond::Always),
        0x20 | 0x28 | 0x30 | 0x38 => Op::Jr(cond(y - 4)),
        0x76 => Op::Halt,
        0x40..=0x7F => Op::Ld(r8(y), r8(z)),
        0x80..=0xBF => Op::Alu(alu(y), r8(z)),
        0xC3 => Op::Jp(Cond::Always),
        0xC9 => Op::Ret(Cond::Always),
        0xCB => Op::Prefix,
        0xCD => Op::Call(Cond::Always),
        0xD9 => Op::Reti,
        0xE0 => Op::Ld(Operand8::HighImm, A),
        0xE2 => Op::Ld(Operand8::HighC, A),
        0xE8 => Op::AddSpOffset,
        0xE9 => Op::JpHl,
        0xEA => Op::Ld(Operand8::Abs, A),
        0xF0 => Op::Ld(A, Operand8::HighImm),
        0xF2 => Op::Ld(A, Operand8::HighC),
        0xF3 => Op::Di,
        0xF8 => Op::LdHlSpOffset,
        0xF9 => Op::LdSpHl,
        0xFA => Op::Ld(A, Operand8::Abs),
        0xFB => Op::Ei,
        0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
            Op::Illegal
        }
        _ => match (x, z) {
            (0, 1) if q == 0 => Op::Ld16(rp(p)),
            (0, 1) => Op::AddHl(rp(p)),
            (0, 2) => {
                let mem = match p {
                    0 => Operand8::BcInd,
                    1 => Operand8::DeInd,
                    2 => Operand8::HlInc,
                    _ => Operand8::HlDec,
                };
                if q == 0 { Op::Ld(mem, A) } else { Op::Ld(A, mem) }
            }
            (0, 3) if q == 0 => Op::Inc16(rp(p)),
            (0, 3) => Op::Dec16(rp(p)),
            (0, 4) => Op::Inc(r8(y)),
            (0, 5) => Op::Dec(r8(y)),
            (0, 6) => Op::Ld(r8(y), Operand8::Imm),
            (0, 7) => match y {
                0 => Op::Rlca,
                1 => Op::Rrca,
                2 => Op::Rla,
                3 => Op::Rra,
                4 => Op::Daa,
                5 => Op::Cpl,
                6 => Op::Scf,
                _ => Op::Ccf,
            },
            (3, 0) => Op::Ret(cond(y)),
            (3, 1) => Op::Pop(rp2(p)),
            (3, 2) => Op::Jp(cond(y)),
            (3, 4) => Op::Call(cond(y)),
            (3, 5) => Op::Push(rp2(p)),
            (3, 6) => Op::Alu(alu(y), Operand8::Imm),
            (3, 7) => Op::Rst(y as u16 * 8),
            _ => Op::Illegal,
        },
    }
}

const fn taken_cycles(opcode: u8, base: u8) -> u8 {
    match opcode {
        0x20 | 0x28 | 0x30 | 0x38 => 12,
        0xC0 | 0xC8 | 0xD0 | 0xD8 => 20,
        0xC2 | 0xCA | 0xD2 | 0xDA => 16,
        0xC4 | 0xCC | 0xD4 | 0xDC => 24,
        _ => base,
    }
}

const fn decode_prefixed(opcode: u8) -> Op {
    let y = (opcode >> 3) & 0x07;
    let op = match opcode >> 6 {
        0 => match y {
            0 => CbOp::Rlc,
            1 => CbOp::Rrc,
            2 => CbOp::Rl,
            3 => CbOp::Rr,
            4 => CbOp::Sla,
            5 => CbOp::Sra,
            6 => CbOp::Swap,
            _ => CbOp::Srl,
        },
        1 => CbOp::Bit(y),
        2 => CbOp::Res(y),
        _ => CbOp::Set(y),
    };
    Op::Cb(op, r8(opcode))
}

const fn prefixed_cycles(opcode: u8) -> u8 {
    if opcode & 0x07 != 6 {
        8
    } else if opcode >> 6 == 1 {
        // BIT n,(HL) only reads memory
        12
    } else {
        16
    }
}

const fn build_unprefixed() -> [Instr; 256] {
    let mut table = [Instr {
        op: Op::Illegal,
        cycles: 0,
        cycles_taken: 0,
    }; 256];
    let mut i = 0;
    while i < 256 {
        let opcode = i as u8;
        table[i] = Instr {
            op: decode_unprefixed(opcode),
            cycles: CYCLES[i],
            cycles_taken: taken_cycles(opcode, CYCLES[i]),
        };
        i += 1;
    }
    table
}

const fn build_prefixed() -> [Instr; 256] {
    let mut table = [Instr {
        op: Op::Illegal,
        cycles: 0,
        cycles_taken: 0,
    }; 256];
    let mut i = 0;
    while i < 256 {
        let opcode = i as u8;
        let cycles = prefixed_cycles(opcode);
        table[i] = Instr {
            op: decode_prefixed(opcode),
            cycles,
            cycles_taken: cycles,
        };
        i += 1;
    }
    table
}
