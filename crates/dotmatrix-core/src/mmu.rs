use crate::{
    cartridge::Cartridge,
    error::{EmuError, Result},
    input::Input,
    interrupts::InterruptController,
    ppu::{DMA_ADDR, LCDC_ADDR, Ppu},
    serial::Serial,
    timer::Timer,
};

const ADDRESS_SPACE: usize = 0x10000;

const ECHO_START: u16 = 0xE000;
const ECHO_END: u16 = 0xFDFF;
const ECHO_OFFSET: u16 = 0x2000;

const OAM_START: u16 = 0xFE00;
const OAM_SIZE: u16 = 0xA0;

const JOYP_ADDR: u16 = 0xFF00;
const IF_ADDR: u16 = 0xFF0F;
const IE_ADDR: u16 = 0xFFFF;
const BGP_ADDR: u16 = 0xFF47;

// Post-boot I/O state (gbdev.io/pandocs/Power_Up_State.html)
const BOOT_IF: u8 = 0xE1;
const BOOT_DIV: u16 = 0xAB00;
const BOOT_LCDC: u8 = 0x91;
const BOOT_BGP: u8 = 0xFC;

/// The DMG address space.
///
/// Cartridge windows, I/O registers and IF/IE are dispatched to the
/// component that owns them. Everything else, VRAM and OAM included, lives
/// in one flat 64 KiB array the PPU reads from directly.
pub struct Mmu {
    memory: Box<[u8]>,
    pub cart: Option<Cartridge>,
    pub interrupts: InterruptController,
    pub timer: Timer,
    pub ppu: Ppu,
    pub serial: Serial,
    pub input: Input,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            memory: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            cart: None,
            interrupts: InterruptController::new(),
            timer: Timer::new(),
            ppu: Ppu::new(),
            serial: Serial::new(),
            input: Input::new(),
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    /// I/O register values left by the boot ROM.
    pub fn init_post_boot_state(&mut self) {
        self.interrupts.write_if(BOOT_IF);
        self.timer.set_div(BOOT_DIV);
        self.ppu.write_reg(LCDC_ADDR, BOOT_LCDC);
        self.ppu.write_reg(BGP_ADDR, BOOT_BGP);
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => match &self.cart {
                Some(cart) => cart.read(addr),
                None => self.memory[addr as usize],
            },
            ECHO_START..=ECHO_END => self.memory[(addr - ECHO_OFFSET) as usize],
            JOYP_ADDR => self.input.read(),
            0xFF01..=0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            IF_ADDR => self.interrupts.read_if(),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            IE_ADDR => self.interrupts.read_ie(),
            _ => self.memory[addr as usize],
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => match &mut self.cart {
                // Bank registers and external RAM. ROM itself is never written.
                Some(cart) => cart.write(addr, val),
                None => self.memory[addr as usize] = val,
            },
            ECHO_START..=ECHO_END => self.memory[(addr - ECHO_OFFSET) as usize] = val,
            JOYP_ADDR => self.input.write(val),
            0xFF01..=0xFF02 => self.serial.write(addr, val),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.interrupts),
            IF_ADDR => self.interrupts.write_if(val),
            DMA_ADDR => {
                self.ppu.write_reg(addr, val);
                self.oam_dma(val);
            }
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            IE_ADDR => self.interrupts.write_ie(val),
            _ => self.memory[addr as usize] = val,
        }
    }

    /// Range-checked read for callers holding a wider address.
    pub fn read(&self, addr: u32) -> Result<u8> {
        let addr = u16::try_from(addr).map_err(|_| EmuError::AddressOutOfRange(addr))?;
        Ok(self.read_byte(addr))
    }

    /// Range-checked write for callers holding a wider address.
    pub fn write(&mut self, addr: u32, val: u8) -> Result<()> {
        let addr = u16::try_from(addr).map_err(|_| EmuError::AddressOutOfRange(addr))?;
        self.write_byte(addr, val);
        Ok(())
    }

    /// Copy 160 bytes from `page << 8` of the backing array into OAM in one
    /// go. Cartridge and I/O handlers are not consulted.
    fn oam_dma(&mut self, page: u8) {
        let src = (page as usize) << 8;
        self.memory
            .copy_within(src..src + OAM_SIZE as usize, OAM_START as usize);
    }

    /// Advance the timer and PPU by `cycles` clock cycles.
    pub fn tick(&mut self, cycles: u32) {
        self.timer.step(cycles, &mut self.interrupts);
        self.ppu.step(cycles, &*self.memory, &mut self.interrupts);
    }

    pub fn take_serial(&mut self) -> Vec<u8> {
        self.serial.take_output()
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
