// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

/// 8-bit register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// 16-bit register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

/// The LR35902 register file. F's low nibble always reads back as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn f(&self) -> u8 {
        self.f
    }

    pub fn set_f(&mut self, val: u8) {
        self.f = val & 0xF0;
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::F => self.f,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    pub fn set8(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::A => self.a = val,
            Reg8::F => self.set_f(val),
            Reg8::B => self.b = val,
            Reg8::C => self.c = val,
            Reg8::D => self.d = val,
            Reg8::E => self.e = val,
            Reg8::H => self.h = val,
            Reg8::L => self.l = val,
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => u16::from_be_bytes([self.a, self.f]),
            Reg16::BC => u16::from_be_bytes([self.b, self.c]),
            Reg16::DE => u16::from_be_bytes([self.d, self.e]),
            Reg16::HL => u16::from_be_bytes([self.h, self.l]),
            Reg16::SP => self.sp,
            Reg16::PC => self.pc,
        }
    }

    pub fn set16(&mut self, reg: Reg16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        match reg {
            Reg16::AF => {
                self.a = hi;
                self.set_f(lo);
            }
            Reg16::BC => {
                self.b = hi;
                self.c = lo;
            }
            Reg16::DE => {
                self.d = hi;
                self.e = lo;
            }
            Reg16::HL => {
                self.h = hi;
                self.l = lo;
            }
            Reg16::SP => self.sp = val,
            Reg16::PC => self.pc = val,
        }
    }

    pub fn hl(&self) -> u16 {
        self.get16(Reg16::HL)
    }

    pub fn set_hl(&mut self, val: u16) {
        self.set16(Reg16::HL, val);
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    pub fn carry(&self) -> bool {
        self.flag(FLAG_C)
    }

    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X}",
            self.get16(Reg16::AF),
            self.get16(Reg16::BC),
            self.get16(Reg16::DE),
            self.hl(),
            self.pc,
            self.sp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_round_trip() {
        let mut r = Registers::new();
        for reg in [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP, Reg16::PC] {
            for v in [0x0000u16, 0x00FF, 0xFF00, 0x1234, 0xFFFF] {
                r.set16(reg, v);
                assert_eq!(r.get16(reg), v);
            }
        }
    }

    #[test]
    fn af_drops_low_nibble() {
        let mut r = Registers::new();
        r.set16(Reg16::AF, 0x12FF);
        assert_eq!(r.get16(Reg16::AF), 0x12F0);
        r.set8(Reg8::F, 0x0F);
        assert_eq!(r.f(), 0x00);
        assert_eq!(r.a, 0x12);
    }

    #[test]
    fn halves_are_independent() {
        let mut r = Registers::new();
        r.set16(Reg16::DE, 0xABCD);
        r.set8(Reg8::D, 0x11);
        assert_eq!(r.get16(Reg16::DE), 0x11CD);
        r.set8(Reg8::E, 0x22);
        assert_eq!(r.get16(Reg16::DE), 0x1122);
    }
}
