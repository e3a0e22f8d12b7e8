//! Interrupt flag/enable registers and the master enable state machine.
//!
//! Peripherals never see the bus. They raise interrupts through
//! [`InterruptSink`], which the controller implements and which a bare `u8`
//! also implements so a unit can be driven against a scratch IF byte.

/// Interrupt sources in priority order (lowest bit first).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// Mask of this interrupt in IF/IE.
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Service routine address (gbdev.io/pandocs/Interrupts.html).
    pub const fn vector(self) -> u16 {
        0x40 + 8 * self as u16
    }

    /// Highest priority interrupt set in `pending`, if any.
    pub fn highest(pending: u8) -> Option<Interrupt> {
        Self::ALL.into_iter().find(|i| pending & i.bit() != 0)
    }
}

/// Capability to latch an interrupt request into IF.
pub trait InterruptSink {
    fn request(&mut self, interrupt: Interrupt);
}

impl InterruptSink for u8 {
    fn request(&mut self, interrupt: Interrupt) {
        *self |= interrupt.bit();
    }
}

const IF_UNUSED_BITS: u8 = 0xE0;
const IF_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    /// Interrupt master enable.
    pub ime: bool,
    /// Set by EI; promoted to `ime` once the following instruction retires.
    pub ime_pending: bool,
    pub halted: bool,
    /// Next opcode fetch must not advance PC.
    pub halt_bug: bool,
    if_reg: u8,
    ie_reg: u8,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_if(&self) -> u8 {
        self.if_reg | IF_UNUSED_BITS
    }

    pub fn write_if(&mut self, val: u8) {
        self.if_reg = val & IF_MASK;
    }

    pub fn read_ie(&self) -> u8 {
        self.ie_reg
    }

    pub fn write_ie(&mut self, val: u8) {
        self.ie_reg = val;
    }

    /// Requested and enabled interrupts, ignoring IME.
    pub fn pending(&self) -> u8 {
        self.if_reg & self.ie_reg & IF_MASK
    }

    pub fn highest_pending(&self) -> Option<Interrupt> {
        Interrupt::highest(self.pending())
    }

    /// Clear the IF bit of an interrupt that is being serviced.
    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.if_reg &= !interrupt.bit();
    }

    /// DI takes effect immediately and cancels a pending EI.
    pub fn disable(&mut self) {
        self.ime = false;
        self.ime_pending = false;
    }

    pub fn enable_delayed(&mut self) {
        self.ime_pending = true;
    }

    pub fn promote_pending(&mut self) {
        if self.ime_pending {
            self.ime_pending = false;
            self.ime = true;
        }
    }
}

impl InterruptSink for InterruptController {
    fn request(&mut self, interrupt: Interrupt) {
        self.if_reg |= interrupt.bit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_follow_bit_order() {
        let vectors: Vec<u16> = Interrupt::ALL.iter().map(|i| i.vector()).collect();
        assert_eq!(vectors, [0x40, 0x48, 0x50, 0x58, 0x60]);
    }

    #[test]
    fn lowest_bit_wins() {
        assert_eq!(Interrupt::highest(0x14), Some(Interrupt::Timer));
        assert_eq!(Interrupt::highest(0x1F), Some(Interrupt::VBlank));
        assert_eq!(Interrupt::highest(0x00), None);
    }

    #[test]
    fn pending_requires_enable() {
        let mut ic = InterruptController::new();
        ic.request(Interrupt::Serial);
        assert_eq!(ic.read_if(), 0xE8);
        assert_eq!(ic.pending(), 0);
        ic.write_ie(0x08);
        assert_eq!(ic.highest_pending(), Some(Interrupt::Serial));
        ic.acknowledge(Interrupt::Serial);
        assert_eq!(ic.pending(), 0);
    }

    #[test]
    fn di_cancels_pending_ei() {
        let mut ic = InterruptController::new();
        ic.enable_delayed();
        ic.disable();
        ic.promote_pending();
        assert!(!ic.ime);
    }
}
