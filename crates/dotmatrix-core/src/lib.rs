//! Cycle-accurate DMG Game Boy emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/MMU/PPU/timer/etc).
//! Frontends live in separate crates and drive the core via the [`gameboy`] facade.

/// Cartridge mappers (MBC) and ROM/RAM/RTC handling.
pub mod cartridge;

/// LR35902 CPU core.
pub mod cpu;

/// Error type shared by every fallible operation in the core.
pub mod error;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Joypad input register and edge-triggered interrupt behavior.
pub mod input;

/// Interrupt master enable, IF/IE and the request capability peripherals use.
pub mod interrupts;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// CPU register file.
pub mod registers;

/// Serial port byte capture.
pub mod serial;

/// Divider/timer unit.
pub mod timer;

pub use error::{EmuError, Result};
