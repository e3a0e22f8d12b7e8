//! Flag-producing arithmetic. Every helper returns `(result, new F)`.

use super::decode::{AluOp, CbOp};
use crate::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

#[inline(always)]
fn flag(on: bool, mask: u8) -> u8 {
    if on { mask } else { 0 }
}

#[inline(always)]
fn zero(val: u8) -> u8 {
    flag(val == 0, FLAG_Z)
}

pub fn add(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let c = carry as u8;
    let sum = a as u16 + b as u16 + c as u16;
    let res = sum as u8;
    let half = (a & 0x0F) + (b & 0x0F) + c > 0x0F;
    (res, zero(res) | flag(half, FLAG_H) | flag(sum > 0xFF, FLAG_C))
}

pub fn sub(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let c = carry as u8;
    let res = a.wrapping_sub(b).wrapping_sub(c);
    let half = (a & 0x0F) < (b & 0x0F) + c;
    let borrow = (a as u16) < b as u16 + c as u16;
    (
        res,
        FLAG_N | zero(res) | flag(half, FLAG_H) | flag(borrow, FLAG_C),
    )
}

/// Accumulator operation. CP leaves A untouched.
pub fn alu(op: AluOp, a: u8, b: u8, f: u8) -> (u8, u8) {
    let carry = f & FLAG_C != 0;
    match op {
        AluOp::Add => add(a, b, false),
        AluOp::Adc => add(a, b, carry),
        AluOp::Sub => sub(a, b, false),
        AluOp::Sbc => sub(a, b, carry),
        AluOp::And => {
            let res = a & b;
            (res, zero(res) | FLAG_H)
        }
        AluOp::Xor => {
            let res = a ^ b;
            (res, zero(res))
        }
        AluOp::Or => {
            let res = a | b;
            (res, zero(res))
        }
        AluOp::Cp => (a, sub(a, b, false).1),
    }
}

pub fn inc(val: u8, f: u8) -> (u8, u8) {
    let res = val.wrapping_add(1);
    (
        res,
        (f & FLAG_C) | zero(res) | flag(val & 0x0F == 0x0F, FLAG_H),
    )
}

pub fn dec(val: u8, f: u8) -> (u8, u8) {
    let res = val.wrapping_sub(1);
    (
        res,
        (f & FLAG_C) | FLAG_N | zero(res) | flag(val & 0x0F == 0, FLAG_H),
    )
}

/// ADD HL,rr. Z is preserved.
pub fn add16(hl: u16, rr: u16, f: u8) -> (u16, u8) {
    let half = (hl & 0x0FFF) + (rr & 0x0FFF) > 0x0FFF;
    let carry = hl as u32 + rr as u32 > 0xFFFF;
    (
        hl.wrapping_add(rr),
        (f & FLAG_Z) | flag(half, FLAG_H) | flag(carry, FLAG_C),
    )
}

/// SP plus a signed byte, shared by ADD SP,e8 and LD HL,SP+e8. H and C come
/// from the unsigned low-byte addition.
pub fn add_sp(sp: u16, offset: u8) -> (u16, u8) {
    let val = offset as i8 as i16 as u16;
    let half = (sp & 0x0F) + (val & 0x0F) > 0x0F;
    let carry = (sp & 0xFF) + (val & 0xFF) > 0xFF;
    (sp.wrapping_add(val), flag(half, FLAG_H) | flag(carry, FLAG_C))
}

pub fn daa(a: u8, f: u8) -> (u8, u8) {
    let subtract = f & FLAG_N != 0;
    let mut correction = 0u8;
    let mut carry = false;
    if f & FLAG_H != 0 || (!subtract && (a & 0x0F) > 0x09) {
        correction |= 0x06;
    }
    if f & FLAG_C != 0 || (!subtract && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }
    let res = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    (res, zero(res) | (f & FLAG_N) | flag(carry, FLAG_C))
}

/// Rotates, shifts and bit operations from the CB page.
pub fn cb(op: CbOp, val: u8, f: u8) -> (u8, u8) {
    let carry_in = f & FLAG_C != 0;
    let shifted = |res: u8, out: bool| (res, zero(res) | flag(out, FLAG_C));
    match op {
        CbOp::Rlc => shifted(val.rotate_left(1), val & 0x80 != 0),
        CbOp::Rrc => shifted(val.rotate_right(1), val & 0x01 != 0),
        CbOp::Rl => shifted((val << 1) | carry_in as u8, val & 0x80 != 0),
        CbOp::Rr => shifted((val >> 1) | ((carry_in as u8) << 7), val & 0x01 != 0),
        CbOp::Sla => shifted(val << 1, val & 0x80 != 0),
        CbOp::Sra => shifted((val >> 1) | (val & 0x80), val & 0x01 != 0),
        CbOp::Swap => shifted(val.rotate_left(4), false),
        CbOp::Srl => shifted(val >> 1, val & 0x01 != 0),
        CbOp::Bit(n) => (
            val,
            (f & FLAG_C) | FLAG_H | flag(val & (1 << n) == 0, FLAG_Z),
        ),
        CbOp::Res(n) => (val & !(1 << n), f),
        CbOp::Set(n) => (val | (1 << n), f),
    }
}
