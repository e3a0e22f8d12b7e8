use std::{
    cell::Cell,
    fmt,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

const SECONDS_PER_DAY: u64 = 86_400;

/// Register-select values for the first and last RTC registers.
pub const RTC_SECONDS: u8 = 0x08;
pub const RTC_DAY_HIGH: u8 = 0x0C;

const DAY_HIGH_BIT8: u8 = 0x01;
const DAY_HIGH_HALT: u8 = 0x40;
const DAY_HIGH_CARRY: u8 = 0x80;

/// Host time source for the MBC3 clock, in whole seconds.
pub trait RtcClock: fmt::Debug {
    fn now(&self) -> u64;
}

/// Wall clock of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl RtcClock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    secs: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            secs: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.secs.set(self.secs.get() + secs);
    }
}

impl RtcClock for ManualClock {
    fn now(&self) -> u64 {
        self.secs.get()
    }
}

/// MBC3 real-time clock.
///
/// Live time is never stored in the registers: it is `base_seconds` plus the
/// host seconds elapsed since `base_timestamp`. Latching copies that value
/// into `regs`, which is all the game can read.
#[derive(Debug)]
pub(crate) struct Rtc {
    clock: Box<dyn RtcClock>,
    regs: [u8; 5],
    halted: bool,
    /// Host time the running clock counts from; `None` while halted.
    base_timestamp: Option<u64>,
    base_seconds: u64,
    /// Last value written to the latch area.
    latch_state: u8,
}

impl Rtc {
    pub(crate) fn new(clock: Box<dyn RtcClock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            regs: [0; 5],
            halted: false,
            base_timestamp: Some(now),
            base_seconds: 0,
            latch_state: 0xFF,
        }
    }

    fn total_seconds(&self) -> u64 {
        match (self.halted, self.base_timestamp) {
            (false, Some(base)) => {
                self.base_seconds + self.clock.now().saturating_sub(base)
            }
            _ => self.base_seconds,
        }
    }

    /// Feed a write to 0x6000-0x7FFF. Only 0x00 followed by 0x01 latches.
    pub(crate) fn write_latch(&mut self, val: u8) {
        if self.latch_state == 0x00 && val == 0x01 {
            self.latch();
        }
        self.latch_state = val;
    }

    fn latch(&mut self) {
        let total = self.total_seconds();
        let days = total / SECONDS_PER_DAY;

        self.regs[0] = (total % 60) as u8;
        self.regs[1] = ((total / 60) % 60) as u8;
        self.regs[2] = ((total / 3600) % 24) as u8;
        self.regs[3] = (days & 0xFF) as u8;
        let mut day_high = ((days >> 8) & 0x01) as u8;
        if self.halted {
            day_high |= DAY_HIGH_HALT;
        }
        if days > 511 {
            day_high |= DAY_HIGH_CARRY;
        }
        self.regs[4] = day_high;
    }

    pub(crate) fn read(&self, reg: u8) -> u8 {
        match reg {
            RTC_SECONDS..=RTC_DAY_HIGH => self.regs[(reg - RTC_SECONDS) as usize],
            _ => 0xFF,
        }
    }

    /// Writing any register sets the clock to the value the five registers
    /// now describe.
    pub(crate) fn write(&mut self, reg: u8, val: u8) {
        if !(RTC_SECONDS..=RTC_DAY_HIGH).contains(&reg) {
            return;
        }
        self.regs[(reg - RTC_SECONDS) as usize] = val;

        if reg == RTC_DAY_HIGH {
            self.halted = val & DAY_HIGH_HALT != 0;
        }

        let [s, m, h, dl, dh] = self.regs.map(u64::from);
        let days = dl | ((dh & DAY_HIGH_BIT8 as u64) << 8);
        self.base_seconds = s + m * 60 + h * 3600 + days * SECONDS_PER_DAY;
        self.base_timestamp = (!self.halted).then(|| self.clock.now());
    }
}
