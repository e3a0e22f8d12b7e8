use crate::interrupts::{Interrupt, InterruptSink};

pub const DIV_ADDR: u16 = 0xFF04;
pub const TIMA_ADDR: u16 = 0xFF05;
pub const TMA_ADDR: u16 = 0xFF06;
pub const TAC_ADDR: u16 = 0xFF07;

const TAC_ENABLE: u8 = 0x04;

pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    last_signal: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV_ADDR => (self.div >> 8) as u8,
            TIMA_ADDR => self.tima,
            TMA_ADDR => self.tma,
            TAC_ADDR => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, irq: &mut impl InterruptSink) {
        match addr {
            DIV_ADDR => self.reset_div(irq),
            TIMA_ADDR => self.tima = val,
            TMA_ADDR => self.tma = val,
            TAC_ADDR => {
                self.tac = val & 0x07;
                // Disabling the timer or moving the tap off a high bit is a
                // falling edge too.
                self.update_signal(irq);
            }
            _ => {}
        }
    }

    /// Advance the timer by `cycles` clock cycles, requesting the timer
    /// interrupt whenever TIMA overflows.
    pub fn step(&mut self, cycles: u32, irq: &mut impl InterruptSink) {
        for _ in 0..cycles {
            self.div = self.div.wrapping_add(1);
            self.update_signal(irq);
        }
    }

    /// Reset the internal divider counter, applying TIMA edge logic.
    pub fn reset_div(&mut self, irq: &mut impl InterruptSink) {
        self.div = 0;
        self.update_signal(irq);
    }

    /// Load the divider without producing a TIMA edge.
    pub fn set_div(&mut self, div: u16) {
        self.div = div;
        self.last_signal = Self::signal_with(self.div, self.tac);
    }

    fn update_signal(&mut self, irq: &mut impl InterruptSink) {
        let new = Self::signal_with(self.div, self.tac);
        if self.last_signal && !new {
            self.increment(irq);
        }
        self.last_signal = new;
    }

    fn increment(&mut self, irq: &mut impl InterruptSink) {
        let (next, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            irq.request(Interrupt::Timer);
        } else {
            self.tima = next;
        }
    }

    /// Number of cycles between TIMA increments for the current clock select.
    pub fn period(&self) -> u32 {
        match self.tac & 0x03 {
            0x00 => 1024,
            0x01 => 16,
            0x02 => 64,
            _ => 256,
        }
    }

    fn timer_bit_with(div: u16, tac: u8) -> u8 {
        match tac & 0x03 {
            0x00 => ((div >> 9) & 1) as u8,
            0x01 => ((div >> 3) & 1) as u8,
            0x02 => ((div >> 5) & 1) as u8,
            _ => ((div >> 7) & 1) as u8,
        }
    }

    fn signal_with(div: u16, tac: u8) -> bool {
        tac & TAC_ENABLE != 0 && Self::timer_bit_with(div, tac) != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
