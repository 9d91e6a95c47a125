//! CPU register/flag state (spec.md §3). The fetch-decode-execute engine
//! itself lives on `Gameboy` (see `decode.rs` and `ops.rs`), since it needs
//! simultaneous access to the bus, timer, and interrupt controller that a
//! bare `Cpu` does not own.

pub mod alu;
mod decode;
mod ops;
pub mod registers;

use registers::Registers;

#[derive(Clone, Copy, Default)]
pub struct Cpu {
    pub registers: Registers,
    pub ime: bool,
    /// Set to `Some(1)` by EI, decremented once per instruction, and only
    /// then applied to `ime`. This is the one-instruction EI latch
    /// spec.md §9 calls for; DI clears it outright.
    ime_delay: Option<u8>,
    pub halted: bool,
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu { registers: Registers::new(), ime: false, ime_delay: None, halted: false }
    }

    pub fn schedule_ime_enable(&mut self) {
        self.ime_delay = Some(1);
    }

    pub fn cancel_ime_delay(&mut self) {
        self.ime_delay = None;
    }

    /// Consumes one instruction's worth of EI delay. Call once per step,
    /// before checking for a pending interrupt dispatch.
    pub fn tick_ime_delay(&mut self) {
        match self.ime_delay {
            Some(0) => {
                self.ime = true;
                self.ime_delay = None;
            }
            Some(n) => self.ime_delay = Some(n - 1),
            None => {}
        }
    }
}
