use crate::interrupts::{Interrupt, InterruptSink};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Scanline timing in dots (gbdev.io/pandocs/Rendering.html)
pub const DOTS_PER_LINE: u16 = 456;
const MODE2_END: u16 = 80; // OAM scan
const MODE3_END: u16 = 252; // Pixel transfer
const LINES_PER_FRAME: u8 = 154;

/// Clock cycles in one full frame, V-Blank included.
pub const CYCLES_PER_FRAME: u32 = DOTS_PER_LINE as u32 * LINES_PER_FRAME as u32;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

// Window X position limit
const WINDOW_X_MAX: u8 = 166;

// Offsets into VRAM
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

// LCD modes
pub const MODE_HBLANK: u8 = 0;
pub const MODE_VBLANK: u8 = 1;
pub const MODE_OAM: u8 = 2;
pub const MODE_TRANSFER: u8 = 3;

pub const LCDC_ADDR: u16 = 0xFF40;
pub const LY_ADDR: u16 = 0xFF44;
pub const DMA_ADDR: u16 = 0xFF46;

/// Memory the PPU fetches tiles, maps and sprite attributes from.
pub trait VideoMemory {
    /// Byte at `offset` into VRAM (0x8000-0x9FFF).
    fn vram(&self, offset: usize) -> u8;
    /// Byte at `offset` into OAM (0xFE00-0xFE9F).
    fn oam(&self, offset: usize) -> u8;
}

/// A full 64 KiB address-space image.
impl VideoMemory for [u8] {
    fn vram(&self, offset: usize) -> u8 {
        self.get(0x8000 + offset).copied().unwrap_or(0xFF)
    }

    fn oam(&self, offset: usize) -> u8 {
        self.get(0xFE00 + offset).copied().unwrap_or(0xFF)
    }
}

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

pub struct Ppu {
    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Internal window line counter
    win_line_counter: u8,

    dot: u16,
    mode: u8,

    /// 2-bit shade per pixel, row-major
    framebuffer: [u8; SCREEN_WIDTH * SCREEN_HEIGHT],
    line_color_zero: [bool; SCREEN_WIDTH],
    /// Latched sprites for the current scanline
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// Set from the start of V-Blank until line 0 of the next frame
    frame_ready: bool,
    stat_irq_line: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            lcdc: 0x91,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0xFF,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            dot: 0,
            mode: MODE_OAM,
            framebuffer: [0; SCREEN_WIDTH * SCREEN_HEIGHT],
            line_color_zero: [false; SCREEN_WIDTH],
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            frame_ready: false,
            stat_irq_line: false,
            frame_counter: 0,
        }
    }

    pub fn framebuffer(&self) -> &[u8; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }

    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Number of frames completed since power-on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    fn lcd_enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                (self.stat & 0x78)
                    | 0x80
                    | (self.mode & 0x03)
                    | if self.ly == self.lyc { 0x04 } else { 0 }
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    self.mode = MODE_HBLANK;
                    self.dot = 0;
                    self.win_line_counter = 0;
                    self.ly = 0;
                    self.stat_irq_line = false;
                } else if !was_on && self.lcd_enabled() {
                    self.mode = MODE_OAM;
                    self.dot = 0;
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            // Writing LY restarts the line counter.
            0xFF44 => self.ly = 0,
            0xFF45 => self.lyc = val,
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    /// Advance the LCD by `cycles` dots. Does nothing while the LCD is off.
    pub fn step<M, I>(&mut self, cycles: u32, mem: &M, irq: &mut I)
    where
        M: VideoMemory + ?Sized,
        I: InterruptSink,
    {
        if !self.lcd_enabled() {
            return;
        }
        for _ in 0..cycles {
            self.dot += 1;

            if (self.ly as usize) < SCREEN_HEIGHT {
                match self.dot {
                    MODE2_END => {
                        self.oam_scan(mem);
                        self.set_mode(MODE_TRANSFER);
                    }
                    MODE3_END => {
                        self.render_scanline(mem);
                        self.set_mode(MODE_HBLANK);
                    }
                    _ => {}
                }
            }

            if self.dot == DOTS_PER_LINE {
                self.dot = 0;
                self.ly += 1;
                if self.ly as usize == SCREEN_HEIGHT {
                    self.set_mode(MODE_VBLANK);
                    self.frame_ready = true;
                    irq.request(Interrupt::VBlank);
                } else if self.ly == LINES_PER_FRAME {
                    self.ly = 0;
                    self.win_line_counter = 0;
                    self.frame_ready = false;
                    self.frame_counter = self.frame_counter.wrapping_add(1);
                    self.set_mode(MODE_OAM);
                } else if (self.ly as usize) < SCREEN_HEIGHT {
                    self.set_mode(MODE_OAM);
                }
            }

            self.update_stat_irq(irq);
        }
    }

    fn set_mode(&mut self, mode: u8) {
        #[cfg(feature = "ppu-trace")]
        log::trace!("[PPU] mode {} -> {} LY={}", self.mode, mode, self.ly);
        self.mode = mode;
    }

    fn update_stat_irq(&mut self, irq: &mut impl InterruptSink) {
        let coincidence = self.ly == self.lyc && self.stat & 0x40 != 0;
        let mode_signal = match self.mode {
            MODE_HBLANK => self.stat & 0x08 != 0,
            MODE_VBLANK => self.stat & 0x10 != 0,
            MODE_OAM => self.stat & 0x20 != 0,
            _ => false,
        };
        let current = coincidence || mode_signal;
        if current && !self.stat_irq_line {
            irq.request(Interrupt::LcdStat);
        }
        self.stat_irq_line = current;
    }

    /// Collect up to 10 sprites visible on the current scanline.
    fn oam_scan<M: VideoMemory + ?Sized>(&mut self, mem: &M) {
        let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = mem.oam(base) as i16 - 16;
            if self.ly as i16 >= y && (self.ly as i16) < y + sprite_height {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: mem.oam(base + 1) as i16 - 8,
                    y,
                    tile: mem.oam(base + 2),
                    flags: mem.oam(base + 3),
                    oam_index: i,
                };
                self.sprite_count += 1;
            }
        }
        self.line_sprites[..self.sprite_count].sort_by_key(|s| (s.x, s.oam_index));
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    /// Color index of one pixel of a BG/window tile.
    fn tile_color<M: VideoMemory + ?Sized>(
        &self,
        mem: &M,
        tile_index: u8,
        tile_y: usize,
        bit: usize,
    ) -> u8 {
        let addr = if self.lcdc & 0x10 != 0 {
            TILE_DATA_0_BASE + tile_index as usize * 16
        } else {
            TILE_DATA_1_BASE + ((tile_index as i8 as i16 + 128) as usize) * 16
        };
        let lo = mem.vram(addr + tile_y * 2);
        let hi = mem.vram(addr + tile_y * 2 + 1);
        ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1)
    }

    fn render_scanline<M: VideoMemory + ?Sized>(&mut self, mem: &M) {
        let ly = self.ly as usize;
        let row = ly * SCREEN_WIDTH;

        // With BG/window disabled (LCDC bit 0) the line is color 0 and sprites
        // treat every pixel as transparent background.
        let blank = Self::dmg_shade(self.bgp, 0);
        self.framebuffer[row..row + SCREEN_WIDTH].fill(blank);
        self.line_color_zero.fill(true);

        if self.lcdc & 0x01 != 0 {
            let tile_map_base = if self.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let py = (ly + self.scy as usize) & 0xFF;
            let tile_row = py / 8;
            let tile_y = py % 8;

            for x in 0..SCREEN_WIDTH {
                let px = (x + self.scx as usize) & 0xFF;
                let tile_index = mem.vram(tile_map_base + tile_row * 32 + px / 8);
                let color_id = self.tile_color(mem, tile_index, tile_y, 7 - px % 8);
                self.framebuffer[row + x] = Self::dmg_shade(self.bgp, color_id);
                self.line_color_zero[x] = color_id == 0;
            }

            if self.lcdc & 0x20 != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX {
                let window_map_base = if self.lcdc & 0x40 != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let wx = self.wx as i16 - 7;
                let window_y = self.win_line_counter as usize;
                for x in wx.max(0) as usize..SCREEN_WIDTH {
                    let window_x = (x as i16 - wx) as usize;
                    let tile_index =
                        mem.vram(window_map_base + (window_y / 8) * 32 + window_x / 8);
                    let color_id = self.tile_color(mem, tile_index, window_y % 8, 7 - window_x % 8);
                    self.framebuffer[row + x] = Self::dmg_shade(self.bgp, color_id);
                    self.line_color_zero[x] = color_id == 0;
                }
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        }

        if self.lcdc & 0x02 != 0 {
            let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
            // Sprites are sorted by priority, so the first opaque pixel at a
            // column owns it even if the background then hides it.
            let mut drawn = [false; SCREEN_WIDTH];
            for s in &self.line_sprites[..self.sprite_count] {
                let mut tile = s.tile;
                if sprite_height == 16 {
                    tile &= 0xFE;
                }
                let mut line_idx = self.ly as i16 - s.y;
                if s.flags & 0x40 != 0 {
                    line_idx = sprite_height - 1 - line_idx;
                }
                let addr = (tile as usize + (line_idx as usize >> 3)) * 16
                    + (line_idx as usize & 7) * 2;
                let lo = mem.vram(addr);
                let hi = mem.vram(addr + 1);
                let palette = if s.flags & 0x10 != 0 {
                    self.obp1
                } else {
                    self.obp0
                };
                for px in 0..8 {
                    let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                    let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                    if color_id == 0 {
                        continue;
                    }
                    let sx = s.x + px as i16;
                    if !(0i16..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                        continue;
                    }
                    let sx = sx as usize;
                    drawn[sx] = true;
                    if s.flags & 0x80 != 0 && !self.line_color_zero[sx] {
                        continue;
                    }
                    self.framebuffer[row + sx] = Self::dmg_shade(palette, color_id);
                }
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shade_lookup_uses_two_bits_per_index() {
        assert_eq!(Ppu::dmg_shade(0xE4, 0), 0);
        assert_eq!(Ppu::dmg_shade(0xE4, 1), 1);
        assert_eq!(Ppu::dmg_shade(0xE4, 2), 2);
        assert_eq!(Ppu::dmg_shade(0xE4, 3), 3);
        assert_eq!(Ppu::dmg_shade(0xFC, 0), 0);
        assert_eq!(Ppu::dmg_shade(0xFC, 1), 3);
    }

    #[test]
    fn power_on_registers() {
        let ppu = Ppu::new();
        assert_eq!(ppu.read_reg(0xFF40), 0x91);
        // mode 2, LY == LYC
        assert_eq!(ppu.read_reg(0xFF41), 0x86);
        assert_eq!(ppu.read_reg(0xFF47), 0xFC);
        assert_eq!(ppu.read_reg(0xFF48), 0xFF);
        assert_eq!(ppu.read_reg(0xFF49), 0xFF);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.dot(), 0);
    }

    #[test]
    fn mode_sequence_on_visible_line() {
        let mem = vec![0u8; 0x10000];
        let mut ppu = Ppu::new();
        let mut if_reg = 0u8;
        ppu.step(79, &mem[..], &mut if_reg);
        assert_eq!(ppu.mode(), MODE_OAM);
        ppu.step(1, &mem[..], &mut if_reg);
        assert_eq!(ppu.mode(), MODE_TRANSFER);
        ppu.step(171, &mem[..], &mut if_reg);
        assert_eq!(ppu.mode(), MODE_TRANSFER);
        ppu.step(1, &mem[..], &mut if_reg);
        assert_eq!(ppu.mode(), MODE_HBLANK);
        ppu.step(203, &mem[..], &mut if_reg);
        assert_eq!(ppu.ly(), 0);
        ppu.step(1, &mem[..], &mut if_reg);
        assert_eq!(ppu.ly(), 1);
        assert_eq!(ppu.mode(), MODE_OAM);
        assert_eq!(if_reg, 0);
    }

    #[test]
    fn lcd_off_freezes_state() {
        let mem = vec![0u8; 0x10000];
        let mut ppu = Ppu::new();
        let mut if_reg = 0u8;
        ppu.step(1000, &mem[..], &mut if_reg);
        ppu.write_reg(0xFF40, 0x11);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.mode(), MODE_HBLANK);
        ppu.step(CYCLES_PER_FRAME, &mem[..], &mut if_reg);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.dot(), 0);
    }

    #[test]
    fn ly_write_resets() {
        let mem = vec![0u8; 0x10000];
        let mut ppu = Ppu::new();
        let mut if_reg = 0u8;
        ppu.step(DOTS_PER_LINE as u32 * 5, &mem[..], &mut if_reg);
        assert_eq!(ppu.read_reg(LY_ADDR), 5);
        ppu.write_reg(LY_ADDR, 0x42);
        assert_eq!(ppu.read_reg(LY_ADDR), 0);
    }
}
