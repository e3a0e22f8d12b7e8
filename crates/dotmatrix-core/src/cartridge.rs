use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::error::{EmuError, Result};

mod rtc;

pub use rtc::{ManualClock, RtcClock, SystemClock};
use rtc::{RTC_DAY_HIGH, RTC_SECONDS, Rtc};

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// Smallest image that still contains the full header.
pub const HEADER_END: usize = 0x0150;

const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0144;
const CART_TYPE_ADDR: usize = 0x0147;
const ROM_SIZE_ADDR: usize = 0x0148;
const RAM_SIZE_ADDR: usize = 0x0149;
const CHECKSUM_START: usize = 0x0134;
const CHECKSUM_END: usize = 0x014C;
const CHECKSUM_ADDR: usize = 0x014D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Unknown(u8),
}

/// Fields decoded from 0x0100-0x014F.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub cart_type: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub checksum: u8,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_END {
            return Err(EmuError::RomTooSmall { len: data.len() });
        }
        let mut title = &data[TITLE_START..TITLE_END];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }
        Ok(Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cart_type: data[CART_TYPE_ADDR],
            rom_size_code: data[ROM_SIZE_ADDR],
            ram_size_code: data[RAM_SIZE_ADDR],
            checksum: data[CHECKSUM_ADDR],
        })
    }

    pub fn mbc_type(&self) -> MbcType {
        match self.cart_type {
            0x00 => MbcType::NoMbc,
            0x01..=0x03 => MbcType::Mbc1,
            0x05 | 0x06 => MbcType::Mbc2,
            0x0F..=0x13 => MbcType::Mbc3,
            0x19..=0x1E => MbcType::Mbc5,
            other => MbcType::Unknown(other),
        }
    }

    /// ROM size in bytes, `None` for codes outside the documented range.
    pub fn rom_size(&self) -> Option<usize> {
        (self.rom_size_code <= 0x08).then(|| 0x8000 << self.rom_size_code)
    }

    pub fn ram_size(&self) -> usize {
        match self.ram_size_code {
            0x02 => 0x2000,  // 8KB
            0x03 => 0x8000,  // 32KB (4 banks)
            0x04 => 0x20000, // 128KB (16 banks)
            0x05 => 0x10000, // 64KB (8 banks)
            _ => 0,
        }
    }

    pub fn has_battery(&self) -> bool {
        matches!(
            self.cart_type,
            0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
        )
    }

    pub fn has_rtc(&self) -> bool {
        matches!(self.cart_type, 0x0F | 0x10)
    }
}

/// Rolling header checksum over 0x0134-0x014C.
pub fn header_checksum(data: &[u8]) -> u8 {
    data[CHECKSUM_START..=CHECKSUM_END]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        rom_bank: usize,
        ram_bank: usize,
        mode: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: usize,
        /// 0x00-0x03 select RAM, 0x08-0x0C select an RTC register.
        ram_bank: u8,
        ram_enable: bool,
        rtc: Option<Rtc>,
    },
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub header: Header,
    rom_banks: usize,
    save_path: Option<PathBuf>,
    mbc_state: MbcState,
}

impl Cartridge {
    /// Build a cartridge from a ROM image, using the host clock for any RTC.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_clock(data, Box::new(SystemClock))
    }

    pub fn from_bytes_with_clock(data: Vec<u8>, clock: Box<dyn RtcClock>) -> Result<Self> {
        let header = Header::parse(&data)?;
        let mbc = header.mbc_type();

        if header_checksum(&data) != header.checksum {
            warn!(
                "Header checksum mismatch for \"{}\" (stored {:02X}, computed {:02X})",
                header.title,
                header.checksum,
                header_checksum(&data)
            );
        }

        let rom_banks = match header.rom_size() {
            Some(size) => size / ROM_BANK_SIZE,
            None => {
                warn!("Unknown ROM size code {:02X}", header.rom_size_code);
                (data.len() / ROM_BANK_SIZE).max(2)
            }
        };

        let mbc_state = match mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 | MbcType::Mbc2 | MbcType::Mbc5 => {
                if mbc != MbcType::Mbc1 {
                    warn!("{mbc:?} is emulated with MBC1-style bank switching only");
                }
                MbcState::Mbc1 {
                    rom_bank: 1,
                    ram_bank: 0,
                    mode: 0,
                    ram_enable: false,
                }
            }
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
                rtc: header.has_rtc().then(|| Rtc::new(clock)),
            },
            MbcType::Unknown(code) => {
                warn!("Unknown cartridge type {code:02X}, falling back to no banking");
                MbcState::NoMbc
            }
        };

        Ok(Self {
            ram: vec![0; header.ram_size()],
            rom: data,
            mbc,
            header,
            rom_banks,
            save_path: None,
            mbc_state,
        })
    }

    /// Load a ROM from disk. Battery-backed carts pick up `<rom>.sav` when it
    /// exists and remember that path for [`Cartridge::save_ram`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| EmuError::io(path, e))?;
        let mut cart = Self::from_bytes(data)?;

        if cart.has_battery() {
            let save = save_path_for(path);
            match fs::read(&save) {
                Ok(bytes) => {
                    if let Err(e) = cart.load_battery(&bytes) {
                        warn!("Ignoring {}: {e}", save.display());
                    } else {
                        info!("Loaded battery RAM from {}", save.display());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(EmuError::io(save, e)),
            }
            cart.save_path = Some(save);
        }

        info!(
            "Loaded ROM: {} (MBC: {:?}, {} ROM banks, {} bytes RAM)",
            cart.header.title,
            cart.mbc,
            cart.rom_banks,
            cart.ram.len()
        );
        Ok(cart)
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn rom_banks(&self) -> usize {
        self.rom_banks
    }

    pub fn validate_header_checksum(&self) -> bool {
        header_checksum(&self.rom) == self.header.checksum
    }

    pub fn has_battery(&self) -> bool {
        self.header.has_battery()
    }

    pub fn has_rtc(&self) -> bool {
        matches!(self.mbc_state, MbcState::Mbc3 { rtc: Some(_), .. })
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                let bank = match &self.mbc_state {
                    MbcState::NoMbc => 1,
                    MbcState::Mbc1 { rom_bank, .. } | MbcState::Mbc3 { rom_bank, .. } => {
                        *rom_bank
                    }
                };
                let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        let offset = addr as usize - 0xA000;
        match &self.mbc_state {
            MbcState::NoMbc => 0xFF,
            MbcState::Mbc1 {
                ram_bank,
                ram_enable,
                ..
            } => {
                if !*ram_enable {
                    return 0xFF;
                }
                self.ram
                    .get(ram_bank * RAM_BANK_SIZE + offset)
                    .copied()
                    .unwrap_or(0xFF)
            }
            MbcState::Mbc3 {
                ram_bank,
                ram_enable,
                rtc,
                ..
            } => match (*ram_enable, *ram_bank) {
                (false, _) => 0xFF,
                (true, bank @ 0x00..=0x03) => self
                    .ram
                    .get(bank as usize * RAM_BANK_SIZE + offset)
                    .copied()
                    .unwrap_or(0xFF),
                (true, reg @ RTC_SECONDS..=RTC_DAY_HIGH) => {
                    rtc.as_ref().map(|r| r.read(reg)).unwrap_or(0xFF)
                }
                _ => 0xFF,
            },
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        let banks = self.rom_banks;
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, _) => {}
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF)
            | (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = select_rom_bank(val & 0x1F, banks);
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = select_rom_bank(val & 0x7F, banks);
            }
            (MbcState::Mbc1 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = (val & 0x03) as usize;
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (MbcState::Mbc3 { rtc, .. }, 0x6000..=0x7FFF) => {
                if let Some(rtc) = rtc {
                    rtc.write_latch(val);
                }
            }
            (
                MbcState::Mbc1 {
                    ram_bank,
                    ram_enable: true,
                    ..
                },
                0xA000..=0xBFFF,
            ) => {
                let offset = *ram_bank * RAM_BANK_SIZE + (addr as usize - 0xA000);
                if let Some(b) = self.ram.get_mut(offset) {
                    *b = val;
                }
            }
            (
                MbcState::Mbc3 {
                    ram_bank,
                    ram_enable: true,
                    rtc,
                    ..
                },
                0xA000..=0xBFFF,
            ) => match *ram_bank {
                bank @ 0x00..=0x03 => {
                    let offset = bank as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
                    if let Some(b) = self.ram.get_mut(offset) {
                        *b = val;
                    }
                }
                reg @ RTC_SECONDS..=RTC_DAY_HIGH => {
                    if let Some(rtc) = rtc {
                        rtc.write(reg, val);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// Copy of the external RAM as it would be written to a save file.
    pub fn save_battery(&self) -> Vec<u8> {
        self.ram.clone()
    }

    pub fn load_battery(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.ram.len() {
            return Err(EmuError::SaveSizeMismatch {
                expected: self.ram.len(),
                actual: data.len(),
            });
        }
        self.ram.copy_from_slice(data);
        Ok(())
    }

    pub fn save_battery_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, &self.ram).map_err(|e| EmuError::io(path, e))?;
        info!("Saved {} bytes of battery RAM to {}", self.ram.len(), path.display());
        Ok(())
    }

    pub fn load_battery_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| EmuError::io(path, e))?;
        self.load_battery(&data)
    }

    /// Persist battery RAM to the `.sav` path chosen at load time. Carts
    /// without a battery or RAM have nothing to save.
    pub fn save_ram(&self) -> Result<()> {
        match &self.save_path {
            Some(path) if self.has_battery() && !self.ram.is_empty() => {
                self.save_battery_to(path)
            }
            _ => Ok(()),
        }
    }
}

/// `<rom>.sav` next to the ROM file.
pub fn save_path_for(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("sav")
}

fn select_rom_bank(val: u8, banks: usize) -> usize {
    let bank = if val == 0 { 1 } else { val as usize };
    bank % banks.max(1)
}
