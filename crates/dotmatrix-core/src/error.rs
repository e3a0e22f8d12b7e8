use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmuError>;

#[derive(Error, Debug)]
pub enum EmuError {
    /// The image cannot even hold the cartridge header at 0x0100-0x014F.
    #[error("ROM image is {len} bytes, smaller than the 0x150-byte header")]
    RomTooSmall { len: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Raised instead of silently skipping a byte the decoder has no entry for.
    #[error("unknown opcode {opcode:#04X} at PC={pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16 },

    #[error("address {0:#X} is outside the 16-bit address space")]
    AddressOutOfRange(u32),

    #[error("no cartridge loaded")]
    NoCartridge,

    #[error("battery save is {actual} bytes but the cartridge has {expected} bytes of RAM")]
    SaveSizeMismatch { expected: usize, actual: usize },
}

impl EmuError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
