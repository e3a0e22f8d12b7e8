use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use dotmatrix_core::{cartridge::save_path_for, gameboy::GameBoy};
use log::{error, info};

#[derive(Parser)]
#[command(version, about = "Headless DMG Game Boy runner")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Stop once the CPU has run this many clock cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Number of frames to run (ignored when --cycles is given)
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Start from power-on defaults instead of the post-boot state
    #[arg(long)]
    power_on: bool,

    /// Write battery RAM to <rom>.sav on exit
    #[arg(long)]
    save: bool,

    /// Print the bus byte at ADDR after the run (hex, e.g. 0xC000)
    #[arg(long, value_name = "ADDR", value_parser = parse_addr)]
    peek: Vec<u32>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn run(args: &Args) -> dotmatrix_core::Result<()> {
    let mut gb = GameBoy::new();
    gb.load_cartridge(&args.rom)?;
    if !args.power_on {
        gb.init_post_boot_state();
    }

    let consumed = match args.cycles {
        Some(max) => gb.run(max)?,
        None => gb.run_frames(args.frames)?,
    };
    info!(
        "Ran {consumed} cycles, {} frames; {}",
        gb.mmu.ppu.frames(),
        gb.cpu.regs.debug_state()
    );

    let serial = gb.take_serial();
    if !serial.is_empty() {
        println!("{}", String::from_utf8_lossy(&serial));
    }

    for &addr in &args.peek {
        println!("[{addr:04X}] = {:02X}", gb.mmu.read(addr)?);
    }

    if args.save {
        gb.save_battery_to(save_path_for(&args.rom))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
