//! Top-level emulator state: the flat 64 KiB address space plus the
//! peripherals that interpret slices of it, and the clock coordinator that
//! ties CPU execution to timer/PPU advancement (spec.md §2, §5, §6).

pub mod bus;
pub mod cpu;
pub mod interrupts;
pub mod joypad;
pub mod ppu;
pub mod serial;
pub mod timer;

use std::fmt;
use std::fs;
use std::path::Path;
use std::process;

use bus::Bus;
use cpu::Cpu;
use interrupts::{Interrupt, Interrupts};
use joypad::{Joypad, Key};
use ppu::Ppu;
use serial::Serial;
use timer::Timer;

const MEMORY_SIZE: usize = 0x10000;
const OAM_BASE: u16 = 0xFE00;
const OAM_SIZE: u16 = 0xA0;

#[derive(Debug)]
pub enum RomLoadError {
    Io(std::io::Error),
}

impl fmt::Display for RomLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RomLoadError::Io(e) => write!(f, "failed to read ROM: {e}"),
        }
    }
}

impl std::error::Error for RomLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RomLoadError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for RomLoadError {
    fn from(e: std::io::Error) -> Self {
        RomLoadError::Io(e)
    }
}

pub struct Gameboy {
    pub(crate) memory: Box<[u8; MEMORY_SIZE]>,
    pub cpu: Cpu,
    pub timer: Timer,
    pub ppu: Ppu,
    pub joypad: Joypad,
    pub serial: Serial,
    pub interrupts: Interrupts,

    /// Owed M-cycles produced by the last instruction, drained by `wait`.
    pub cycles_to_wait: u32,
    /// Monotonic M-cycle counter.
    pub cycle_count: u64,
    /// Last value written to $FF46; DMA has no other readable state here.
    dma_register: u8,
}

impl Gameboy {
    /// Builds a Gameboy from ROM bytes already in memory, copied starting
    /// at address 0x0000 (spec.md §6 `initialize`).
    pub fn new(rom: &[u8]) -> Result<Gameboy, RomLoadError> {
        let mut memory = Box::new([0u8; MEMORY_SIZE]);
        let len = rom.len().min(MEMORY_SIZE);
        memory[..len].copy_from_slice(&rom[..len]);

        Ok(Gameboy {
            memory,
            cpu: Cpu::new(),
            timer: Timer::new(),
            ppu: Ppu::new(),
            joypad: Joypad::new(),
            serial: Serial::new(),
            interrupts: Interrupts::new(),
            cycles_to_wait: 0,
            cycle_count: 0,
            dma_register: 0xFF,
        })
    }

    /// Reads a ROM file from disk and builds a Gameboy from it. Logs and
    /// exits the process on failure, per spec.md §7's fatal-setup-error
    /// path; a host or test that wants the error as a value should use
    /// `Gameboy::new` directly.
    pub fn from_rom_path<P: AsRef<Path>>(path: P) -> Gameboy {
        let path = path.as_ref();
        let rom = fs::read(path).unwrap_or_else(|e| {
            log::error!("failed to read ROM at {}: {e}", path.display());
            process::exit(1);
        });
        Gameboy::new(&rom).unwrap_or_else(|e| {
            log::error!("{e}");
            process::exit(1);
        })
    }

    /// Executes one instruction (or one HALTed cycle) and returns the
    /// number of M-cycles it produced, accumulating them onto
    /// `cycles_to_wait` (spec.md §4.5, §4.6).
    pub fn step(&mut self) -> u32 {
        self.cpu.tick_ime_delay();

        if self.interrupts.need_to_do_interrupts {
            self.service_interrupts();
        }

        let cycles = if self.cpu.halted {
            1
        } else {
            self.execute_instruction()
        };

        self.cycles_to_wait += cycles;
        cycles
    }

    /// Drains `cycles_to_wait`, advancing the timer and (when the LCD is
    /// enabled) the PPU one M-cycle at a time. LCDC bit 7 is re-read on
    /// every iteration, so disabling the LCD mid-drain freezes the PPU
    /// immediately rather than only at the next `wait` call (spec.md §9).
    pub fn wait(&mut self) {
        while self.cycles_to_wait > 0 {
            self.cycles_to_wait -= 1;
            self.cycle_count += 1;
            self.timer.tick(&mut self.interrupts);
            if self.ppu.lcd_enabled() {
                self.ppu.tick(&mut self.interrupts, &self.memory[..]);
            }
        }
    }

    /// Interrupt dispatch per spec.md §4.2: unhalt on any pending request
    /// regardless of IME, then, only if IME is set, push PC and jump to
    /// the highest-priority vector.
    fn service_interrupts(&mut self) {
        if self.interrupts.pending() != 0 {
            self.cpu.halted = false;
        }
        if !self.cpu.ime {
            return;
        }
        if let Some(interrupt) = self.interrupts.highest_priority() {
            self.interrupts.clear(interrupt);
            self.cpu.ime = false;
            self.cpu.cancel_ime_delay();
            let pc = self.cpu.registers.pc;
            let sp = self.cpu.registers.sp.wrapping_sub(2);
            self.cpu.registers.sp = sp;
            self.write16(sp, pc);
            self.cpu.registers.pc = interrupt.vector();
            self.cycles_to_wait += 5;
        }
        self.interrupts.need_to_do_interrupts = false;
    }

    /// Reads the DMA trigger register's last-written value. The register
    /// itself has no other readable effect.
    pub(crate) fn read_dma_register(&self) -> u8 {
        self.dma_register
    }

    /// Write to $FF46: copy 160 bytes from `value << 8` verbatim into OAM
    /// and charge 160 owed cycles (spec.md §3, §4.1).
    pub(crate) fn trigger_dma(&mut self, value: u8) {
        self.dma_register = value;
        let source = (value as u16) << 8;
        for i in 0..OAM_SIZE {
            let byte = self.read_byte(source + i);
            self.memory[(OAM_BASE + i) as usize] = byte;
        }
        self.cycles_to_wait += 160;
    }

    pub fn press_button(&mut self, key: Key) {
        self.joypad.press(key, &mut self.interrupts);
    }

    pub fn release_button(&mut self, key: Key) {
        self.joypad.release(key);
    }

    /// Current scroll origin (SCY, SCX).
    pub fn get_origin(&self) -> (u8, u8) {
        self.ppu.get_origin()
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.ppu.framebuffer()
    }

    /// One-line register/memory trace in the exact format spec.md §6
    /// specifies, e.g. for Blargg-style test ROM acceptance runs.
    pub fn dump(&self) -> String {
        let r = &self.cpu.registers;
        let pc = r.pc;
        let mem = |offset: u16| self.memory[pc.wrapping_add(offset) as usize];
        let line = format!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} \
             SP:{:04X} PC:{:04X} PCMEM:{:02X},{:02X},{:02X},{:02X}",
            r.a,
            r.f,
            r.b,
            r.c,
            r.d,
            r.e,
            r.h,
            r.l,
            r.sp,
            pc,
            mem(0),
            mem(1),
            mem(2),
            mem(3)
        );
        log::trace!("{line}");
        line
    }
}
