mod alu;
pub mod decode;

use log::debug;

use crate::{
    error::{EmuError, Result},
    mmu::Mmu,
    registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Reg8, Reg16, Registers},
};
use decode::{CbOp, Cond, Instr, Op, Operand8, PREFIXED, UNPREFIXED};

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;
const BOOT_AF: u16 = 0x01B0;
const BOOT_BC: u16 = 0x0013;
const BOOT_DE: u16 = 0x00D8;
const BOOT_HL: u16 = 0x014D;

/// Push PC and jump to the vector.
const INTERRUPT_SERVICE_CYCLES: u32 = 20;
/// One halted "instruction".
const HALT_IDLE_CYCLES: u32 = 4;

const CB_PREFIX: u8 = 0xCB;

#[derive(Debug, Clone, Default)]
pub struct Cpu {
    pub regs: Registers,
    /// Clock cycles retired since construction.
    pub cycles: u64,
}

impl Cpu {
    /// A CPU in the power-on state: every register zero, PC at 0x0000.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the register values the DMG boot ROM leaves behind.
    pub fn init_post_boot_state(&mut self) {
        self.regs.set16(Reg16::AF, BOOT_AF);
        self.regs.set16(Reg16::BC, BOOT_BC);
        self.regs.set16(Reg16::DE, BOOT_DE);
        self.regs.set16(Reg16::HL, BOOT_HL);
        self.regs.sp = BOOT_SP;
        self.regs.pc = BOOT_PC;
    }

    fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.fetch8(mmu);
        let hi = self.fetch8(mmu);
        u16::from_le_bytes([lo, hi])
    }

    /// Opcode fetch. After the HALT bug the byte at PC is read without
    /// advancing, so it executes twice.
    fn fetch_opcode(&mut self, mmu: &mut Mmu) -> u8 {
        if mmu.interrupts.halt_bug {
            mmu.interrupts.halt_bug = false;
            mmu.read_byte(self.regs.pc)
        } else {
            self.fetch8(mmu)
        }
    }

    fn push_word(&mut self, mmu: &mut Mmu, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        mmu.write_byte(self.regs.sp, lo);
        mmu.write_byte(self.regs.sp.wrapping_add(1), hi);
    }

    fn pop_word(&mut self, mmu: &Mmu) -> u16 {
        let lo = mmu.read_byte(self.regs.sp);
        let hi = mmu.read_byte(self.regs.sp.wrapping_add(1));
        self.regs.sp = self.regs.sp.wrapping_add(2);
        u16::from_le_bytes([lo, hi])
    }

    /// Effective address of a memory operand. Falls back to (HL).
    fn address(&mut self, mmu: &Mmu, operand: Operand8) -> u16 {
        match operand {
            Operand8::BcInd => self.regs.get16(Reg16::BC),
            Operand8::DeInd => self.regs.get16(Reg16::DE),
            Operand8::HlInc => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_add(1));
                hl
            }
            Operand8::HlDec => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_sub(1));
                hl
            }
            Operand8::Abs => self.fetch16(mmu),
            Operand8::HighImm => 0xFF00 | self.fetch8(mmu) as u16,
            Operand8::HighC => 0xFF00 | self.regs.c as u16,
            _ => self.regs.hl(),
        }
    }

    fn read_operand(&mut self, mmu: &Mmu, operand: Operand8) -> u8 {
        match operand {
            Operand8::Reg(reg) => self.regs.get8(reg),
            Operand8::Imm => self.fetch8(mmu),
            _ => {
                let addr = self.address(mmu, operand);
                mmu.read_byte(addr)
            }
        }
    }

    fn write_operand(&mut self, mmu: &mut Mmu, operand: Operand8, val: u8) {
        match operand {
            Operand8::Reg(reg) => self.regs.set8(reg, val),
            _ => {
                let addr = self.address(mmu, operand);
                mmu.write_byte(addr, val);
            }
        }
    }

    fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::Always => true,
            Cond::NotZero => !self.regs.flag(FLAG_Z),
            Cond::Zero => self.regs.flag(FLAG_Z),
            Cond::NotCarry => !self.regs.carry(),
            Cond::Carry => self.regs.carry(),
        }
    }

    /// Dispatch the highest priority pending interrupt when IME allows it.
    fn service_interrupt(&mut self, mmu: &mut Mmu) -> Option<u32> {
        if !mmu.interrupts.ime {
            return None;
        }
        let interrupt = mmu.interrupts.highest_pending()?;
        mmu.interrupts.halted = false;
        mmu.interrupts.ime = false;
        mmu.interrupts.acknowledge(interrupt);
        self.push_word(mmu, self.regs.pc);
        self.regs.pc = interrupt.vector();
        Some(INTERRUPT_SERVICE_CYCLES)
    }

    /// Execute one instruction, service one interrupt, or idle one halted
    /// slot; then advance the timer and PPU by the elapsed cycles.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<u32> {
        let cycles = if let Some(cycles) = self.service_interrupt(mmu) {
            cycles
        } else if mmu.interrupts.halted {
            if mmu.interrupts.pending() != 0 {
                // Wakes without IME and resumes after the HALT.
                mmu.interrupts.halted = false;
                self.execute(mmu)?
            } else {
                HALT_IDLE_CYCLES
            }
        } else {
            self.execute(mmu)?
        };

        mmu.tick(cycles);
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Step until the cumulative cycle counter reaches `max_cycles`. Returns
    /// the cycles consumed by this call, which may overshoot by the cost of
    /// the last instruction.
    pub fn run(&mut self, mmu: &mut Mmu, max_cycles: u64) -> Result<u64> {
        let start = self.cycles;
        while self.cycles < max_cycles {
            self.step(mmu)?;
        }
        Ok(self.cycles - start)
    }

    fn execute(&mut self, mmu: &mut Mmu) -> Result<u32> {
        // EI takes effect after the instruction that follows it.
        let promote = mmu.interrupts.ime_pending;
        let pc = self.regs.pc;
        let opcode = self.fetch_opcode(mmu);

        #[cfg(feature = "cpu-trace")]
        log::trace!("{pc:04X}: {opcode:02X} {}", self.regs.debug_state());

        let instr = if opcode == CB_PREFIX {
            PREFIXED[self.fetch8(mmu) as usize]
        } else {
            UNPREFIXED[opcode as usize]
        };
        let cycles = self.execute_op(mmu, instr, opcode, pc)?;

        if promote {
            mmu.interrupts.promote_pending();
        }
        Ok(cycles)
    }

    fn execute_op(&mut self, mmu: &mut Mmu, instr: Instr, opcode: u8, pc: u16) -> Result<u32> {
        let taken = |taken: bool| {
            if taken {
                instr.cycles_taken as u32
            } else {
                instr.cycles as u32
            }
        };

        match instr.op {
            Op::Nop => {}
            Op::Stop => {
                self.fetch8(mmu);
                debug!("STOP at {pc:04X}");
            }
            Op::Halt => return Ok(instr.cycles as u32 + self.halt(mmu)),
            Op::Di => mmu.interrupts.disable(),
            Op::Ei => mmu.interrupts.enable_delayed(),

            Op::Ld(dst, src) => {
                let val = self.read_operand(mmu, src);
                self.write_operand(mmu, dst, val);
            }
            Op::Ld16(rr) => {
                let val = self.fetch16(mmu);
                self.regs.set16(rr, val);
            }
            Op::LdAbsSp => {
                let addr = self.fetch16(mmu);
                let [lo, hi] = self.regs.sp.to_le_bytes();
                mmu.write_byte(addr, lo);
                mmu.write_byte(addr.wrapping_add(1), hi);
            }
            Op::LdSpHl => self.regs.sp = self.regs.hl(),
            Op::LdHlSpOffset => {
                let offset = self.fetch8(mmu);
                let (res, f) = alu::add_sp(self.regs.sp, offset);
                self.regs.set_hl(res);
                self.regs.set_f(f);
            }
            Op::Push(rr) => self.push_word(mmu, self.regs.get16(rr)),
            Op::Pop(rr) => {
                let val = self.pop_word(mmu);
                self.regs.set16(rr, val);
            }

            Op::Alu(op, src) => {
                let val = self.read_operand(mmu, src);
                let (res, f) = alu::alu(op, self.regs.a, val, self.regs.f());
                self.regs.a = res;
                self.regs.set_f(f);
            }
            Op::Inc(target) => {
                let val = self.read_operand(mmu, target);
                let (res, f) = alu::inc(val, self.regs.f());
                self.write_operand(mmu, target, res);
                self.regs.set_f(f);
            }
            Op::Dec(target) => {
                let val = self.read_operand(mmu, target);
                let (res, f) = alu::dec(val, self.regs.f());
                self.write_operand(mmu, target, res);
                self.regs.set_f(f);
            }
            Op::Inc16(rr) => self.regs.set16(rr, self.regs.get16(rr).wrapping_add(1)),
            Op::Dec16(rr) => self.regs.set16(rr, self.regs.get16(rr).wrapping_sub(1)),
            Op::AddHl(rr) => {
                let (res, f) = alu::add16(self.regs.hl(), self.regs.get16(rr), self.regs.f());
                self.regs.set_hl(res);
                self.regs.set_f(f);
            }
            Op::AddSpOffset => {
                let offset = self.fetch8(mmu);
                let (res, f) = alu::add_sp(self.regs.sp, offset);
                self.regs.sp = res;
                self.regs.set_f(f);
            }

            Op::Rlca => self.rotate_a(CbOp::Rlc),
            Op::Rrca => self.rotate_a(CbOp::Rrc),
            Op::Rla => self.rotate_a(CbOp::Rl),
            Op::Rra => self.rotate_a(CbOp::Rr),
            Op::Daa => {
                let (res, f) = alu::daa(self.regs.a, self.regs.f());
                self.regs.a = res;
                self.regs.set_f(f);
            }
            Op::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.set_f(self.regs.f() | FLAG_N | FLAG_H);
            }
            Op::Scf => self.regs.set_f((self.regs.f() & FLAG_Z) | FLAG_C),
            Op::Ccf => {
                let f = self.regs.f();
                self.regs.set_f((f & FLAG_Z) | ((f ^ FLAG_C) & FLAG_C));
            }

            Op::Jp(cond) => {
                let addr = self.fetch16(mmu);
                let jump = self.condition(cond);
                if jump {
                    self.regs.pc = addr;
                }
                return Ok(taken(jump));
            }
            Op::JpHl => self.regs.pc = self.regs.hl(),
            Op::Jr(cond) => {
                let offset = self.fetch8(mmu) as i8;
                let jump = self.condition(cond);
                if jump {
                    self.regs.pc = self.regs.pc.wrapping_add_signed(offset as i16);
                }
                return Ok(taken(jump));
            }
            Op::Call(cond) => {
                let addr = self.fetch16(mmu);
                let call = self.condition(cond);
                if call {
                    self.push_word(mmu, self.regs.pc);
                    self.regs.pc = addr;
                }
                return Ok(taken(call));
            }
            Op::Ret(cond) => {
                let ret = self.condition(cond);
                if ret {
                    self.regs.pc = self.pop_word(mmu);
                }
                return Ok(taken(ret));
            }
            Op::Reti => {
                self.regs.pc = self.pop_word(mmu);
                mmu.interrupts.ime = true;
            }
            Op::Rst(vector) => {
                self.push_word(mmu, self.regs.pc);
                self.regs.pc = vector;
            }

            Op::Cb(op, target) => {
                let val = self.read_operand(mmu, target);
                let (res, f) = alu::cb(op, val, self.regs.f());
                if !matches!(op, CbOp::Bit(_)) {
                    self.write_operand(mmu, target, res);
                }
                self.regs.set_f(f);
            }
            Op::Prefix | Op::Illegal => return Err(EmuError::UnknownOpcode { opcode, pc }),
        }
        Ok(instr.cycles as u32)
    }

    /// RLCA/RRCA/RLA/RRA: the CB rotate on A with Z forced clear.
    fn rotate_a(&mut self, op: CbOp) {
        let (res, f) = alu::cb(op, self.regs.get8(Reg8::A), self.regs.f());
        self.regs.a = res;
        self.regs.set_f(f & !FLAG_Z);
    }

    /// Extra cycles spent if HALT services an interrupt on the spot.
    fn halt(&mut self, mmu: &mut Mmu) -> u32 {
        mmu.interrupts.promote_pending();
        if mmu.interrupts.pending() == 0 {
            mmu.interrupts.halted = true;
            0
        } else if mmu.interrupts.ime {
            self.service_interrupt(mmu).unwrap_or(0)
        } else {
            mmu.interrupts.halt_bug = true;
            0
        }
    }
}
