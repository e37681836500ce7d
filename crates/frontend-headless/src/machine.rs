//! Small deterministic demo machine used to exercise the rewind history.
//!
//! Shaped like a microcontroller: CPU registers, a data space, EEPROM and a
//! 1-bit framebuffer. Each frame runs a xorshift "program" that pokes a few
//! data bytes and scrolls the framebuffer, so consecutive captures differ
//! in only a handful of bytes, as real game frames do.

use serde::{Deserialize, Serialize};

/// Data space: registers + I/O + SRAM.
pub const DATA_SIZE: usize = 32 + 224 + 2560;
pub const EEPROM_SIZE: usize = 1024;
/// 128×64 monochrome, one bit per pixel.
pub const FRAMEBUFFER_SIZE: usize = 128 * 64 / 8;
/// CPU cycles per 60 Hz frame at 16 MHz.
const CYCLES_PER_FRAME: u64 = 16_000_000 / 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DemoMachine {
    pub pc: u16,
    pub sp: u16,
    pub sreg: u8,
    pub tick: u64,
    pub sleeping: bool,
    pub data: Vec<u8>,
    pub eeprom: Vec<u8>,
    pub framebuffer: Vec<u8>,
    pub frame: u32,
    rng_state: u32,
}

impl DemoMachine {
    pub fn new(seed: u32) -> Self {
        DemoMachine {
            pc: 0,
            sp: (DATA_SIZE - 1) as u16,
            sreg: 0,
            tick: 0,
            sleeping: false,
            data: vec![0; DATA_SIZE],
            eeprom: vec![0xFF; EEPROM_SIZE],
            framebuffer: vec![0; FRAMEBUFFER_SIZE],
            frame: 0,
            rng_state: seed.max(1),
        }
    }

    fn next_rand(&mut self) -> u32 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        x
    }

    /// Run one frame.
    pub fn run_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.tick += CYCLES_PER_FRAME;
        for _ in 0..8 {
            let r = self.next_rand();
            let addr = 32 + 224 + (r as usize >> 8) % 2560;
            self.data[addr] = r as u8;
            self.pc = (r >> 16) as u16 & 0x3FFF;
        }
        self.sreg = (self.next_rand() & 0xFF) as u8;
        self.sleeping = self.frame % 4 == 0;

        // Scroll one row of the framebuffer and draw a new column.
        let row = (self.frame as usize % 8) * 128;
        self.framebuffer[row..row + 128].rotate_left(1);
        self.framebuffer[row + 127] = (self.next_rand() >> 24) as u8;

        if self.frame % 120 == 0 {
            let slot = (self.frame as usize / 120) % EEPROM_SIZE;
            self.eeprom[slot] = self.frame as u8;
        }
    }

    /// Grow the data space, as a newer build with more SRAM would.
    pub fn extend_data(&mut self, extra: usize) {
        self.data.resize(self.data.len() + extra, 0);
    }
}
