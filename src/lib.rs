//! Core of a handheld-console emulator modeled on the original 8-bit Game
//! Boy (DMG): a Sharp LR35902 CPU interpreter, a memory-mapped bus with its
//! I/O registers, DMA and interrupt latch, and a PPU state machine that
//! times scanlines and composites a framebuffer.
//!
//! This crate is the core only. A host is expected to supply a ROM loader,
//! a frame presenter reading the framebuffer through the scroll registers,
//! and a button event source; audio, bank-switching cartridges beyond ROM
//! bank 0, and save states are not implemented here.

mod gameboy;

pub use gameboy::bus::Bus;
pub use gameboy::cpu::registers::{Flags, Registers};
pub use gameboy::cpu::Cpu;
pub use gameboy::interrupts::Interrupt;
pub use gameboy::joypad::{Joypad, JoypadMode, Key};
pub use gameboy::ppu::{GraphicsMode, Ppu};
pub use gameboy::serial::Sink;
pub use gameboy::timer::Timer;
pub use gameboy::{Gameboy, RomLoadError};

/// Width in pixels of the visible window into the framebuffer.
pub const WIDTH: usize = 160;
/// Height in pixels of the visible window into the framebuffer.
pub const HEIGHT: usize = 144;
/// Side length in pixels of the internal background/window framebuffer.
pub const FRAMEBUFFER_SIZE: usize = 256;
