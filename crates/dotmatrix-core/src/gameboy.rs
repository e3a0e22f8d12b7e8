use std::path::Path;

use crate::{
    cartridge::Cartridge,
    cpu::Cpu,
    error::{EmuError, Result},
    input::Button,
    mmu::Mmu,
    ppu::{CYCLES_PER_FRAME, SCREEN_HEIGHT, SCREEN_WIDTH},
};

/// A complete DMG: the CPU and the bus that owns every other component.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// A machine in the power-on state with no cartridge inserted.
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
        }
    }

    pub fn load_cartridge<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let cart = Cartridge::from_file(path)?;
        self.insert_cartridge(cart);
        Ok(())
    }

    pub fn load_rom_bytes(&mut self, data: Vec<u8>) -> Result<()> {
        let cart = Cartridge::from_bytes(data)?;
        self.insert_cartridge(cart);
        Ok(())
    }

    pub fn insert_cartridge(&mut self, cart: Cartridge) {
        self.mmu.load_cart(cart);
    }

    /// Skip the boot ROM: registers and I/O as it would leave them.
    pub fn init_post_boot_state(&mut self) {
        self.cpu.init_post_boot_state();
        self.mmu.init_post_boot_state();
    }

    pub fn step(&mut self) -> Result<u32> {
        self.cpu.step(&mut self.mmu)
    }

    /// Run until the CPU's cycle counter reaches `max_cycles`.
    pub fn run(&mut self, max_cycles: u64) -> Result<u64> {
        self.cpu.run(&mut self.mmu, max_cycles)
    }

    /// Run `frames` more frames' worth of cycles.
    pub fn run_frames(&mut self, frames: u64) -> Result<u64> {
        let target = self.cpu.cycles + frames * CYCLES_PER_FRAME as u64;
        self.run(target)
    }

    pub fn framebuffer(&self) -> &[u8; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.mmu.ppu.framebuffer()
    }

    /// Everything the serial port has sent so far, decoded lossily.
    pub fn serial_output(&self) -> String {
        String::from_utf8_lossy(self.mmu.serial.peek_output()).into_owned()
    }

    pub fn take_serial(&mut self) -> Vec<u8> {
        self.mmu.take_serial()
    }

    pub fn press(&mut self, button: Button) {
        self.mmu.input.press(button, &mut self.mmu.interrupts);
    }

    pub fn release(&mut self, button: Button) {
        self.mmu.input.release(button);
    }

    fn cart(&self) -> Result<&Cartridge> {
        self.mmu.cart.as_ref().ok_or(EmuError::NoCartridge)
    }

    fn cart_mut(&mut self) -> Result<&mut Cartridge> {
        self.mmu.cart.as_mut().ok_or(EmuError::NoCartridge)
    }

    pub fn save_battery(&self) -> Result<Vec<u8>> {
        Ok(self.cart()?.save_battery())
    }

    pub fn load_battery(&mut self, data: &[u8]) -> Result<()> {
        self.cart_mut()?.load_battery(data)
    }

    pub fn save_battery_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.cart()?.save_battery_to(path)
    }

    pub fn load_battery_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.cart_mut()?.load_battery_from(path)
    }

    /// Write battery RAM to the cartridge's `.sav` file, if it has one.
    pub fn save_ram(&self) -> Result<()> {
        self.cart()?.save_ram()
    }

    /// Back to power-on, keeping the inserted cartridge.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        self.cpu = Cpu::new();
        self.mmu = Mmu::new();
        if let Some(c) = cart {
            self.mmu.load_cart(c);
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
