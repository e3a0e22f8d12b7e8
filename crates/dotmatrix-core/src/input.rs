use crate::interrupts::{Interrupt, InterruptSink};

const SELECT_MASK: u8 = 0x30;
const SELECT_DPAD: u8 = 0x10;
const SELECT_BUTTONS: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    fn is_dpad(self) -> bool {
        matches!(self, Button::Right | Button::Left | Button::Up | Button::Down)
    }

    fn mask(self) -> u8 {
        match self {
            Button::Right | Button::A => 0x01,
            Button::Left | Button::B => 0x02,
            Button::Up | Button::Select => 0x04,
            Button::Down | Button::Start => 0x08,
        }
    }
}

/// JOYP (0xFF00). All lines are active-low.
pub struct Input {
    select: u8,
    dpad: u8,
    buttons: u8,
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: SELECT_MASK,
            dpad: 0x0F,
            buttons: 0x0F,
        }
    }

    pub fn read(&self) -> u8 {
        let lines = match self.select {
            0x00 => self.dpad & self.buttons,
            SELECT_BUTTONS => self.dpad,
            SELECT_DPAD => self.buttons,
            _ => 0x0F,
        };
        0xC0 | self.select | lines
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & SELECT_MASK;
    }

    /// Press a button, requesting the joypad interrupt if it was released.
    pub fn press(&mut self, button: Button, irq: &mut impl InterruptSink) {
        let group = self.group_mut(button);
        let was_released = *group & button.mask() != 0;
        *group &= !button.mask();
        if was_released {
            irq.request(Interrupt::Joypad);
        }
    }

    pub fn release(&mut self, button: Button) {
        *self.group_mut(button) |= button.mask();
    }

    fn group_mut(&mut self, button: Button) -> &mut u8 {
        if button.is_dpad() {
            &mut self.dpad
        } else {
            &mut self.buttons
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_reads_all_high() {
        let input = Input::new();
        assert_eq!(input.read(), 0xFF);
    }

    #[test]
    fn groups_are_multiplexed() {
        let mut input = Input::new();
        let mut if_reg = 0u8;
        input.press(Button::Down, &mut if_reg);
        input.press(Button::A, &mut if_reg);

        input.write(0x20); // d-pad
        assert_eq!(input.read(), 0xE7);
        input.write(0x10); // buttons
        assert_eq!(input.read(), 0xDE);
        input.write(0x00);
        assert_eq!(input.read(), 0xC6);
    }

    #[test]
    fn interrupt_only_on_press_edge() {
        let mut input = Input::new();
        let mut if_reg = 0u8;
        input.press(Button::Start, &mut if_reg);
        assert_eq!(if_reg, 0x10);

        if_reg = 0;
        input.press(Button::Start, &mut if_reg);
        assert_eq!(if_reg, 0);

        input.release(Button::Start);
        input.press(Button::Start, &mut if_reg);
        assert_eq!(if_reg, 0x10);
    }
}
