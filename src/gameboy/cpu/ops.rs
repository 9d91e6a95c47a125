//! Instruction bodies shared by the main and CB-prefixed dispatch tables
//! in `decode.rs`. Every method here operates on `Gameboy` directly so it
//! can freely mix register access with bus reads/writes.

use super::super::bus::Bus;
use super::super::Gameboy;
use super::alu;
use super::registers::{Flags, Register, RegisterPair};

/// `r[z]`/`r[y]`: the eight 3-bit register codes, in LR35902 opcode order.
pub const R_TABLE: [Register; 8] = [
    Register::B,
    Register::C,
    Register::D,
    Register::E,
    Register::H,
    Register::L,
    Register::AtHl,
    Register::A,
];

/// `rp[p]`: 16-bit register codes used by LD/INC/DEC/ADD HL forms.
pub const RP_TABLE: [RegisterPair; 4] =
    [RegisterPair::BC, RegisterPair::DE, RegisterPair::HL, RegisterPair::SP];

/// `rp2[p]`: 16-bit register codes used by PUSH/POP (AF instead of SP).
pub const RP2_TABLE: [RegisterPair; 4] =
    [RegisterPair::BC, RegisterPair::DE, RegisterPair::HL, RegisterPair::AF];

impl Gameboy {
    pub(super) fn get_r(&mut self, code: Register) -> u8 {
        match code {
            Register::B => self.cpu.registers.b,
            Register::C => self.cpu.registers.c,
            Register::D => self.cpu.registers.d,
            Register::E => self.cpu.registers.e,
            Register::H => self.cpu.registers.h,
            Register::L => self.cpu.registers.l,
            Register::A => self.cpu.registers.a,
            Register::AtHl => {
                let hl = self.cpu.registers.hl();
                self.read_byte(hl)
            }
        }
    }

    pub(super) fn set_r(&mut self, code: Register, value: u8) {
        match code {
            Register::B => self.cpu.registers.b = value,
            Register::C => self.cpu.registers.c = value,
            Register::D => self.cpu.registers.d = value,
            Register::E => self.cpu.registers.e = value,
            Register::H => self.cpu.registers.h = value,
            Register::L => self.cpu.registers.l = value,
            Register::A => self.cpu.registers.a = value,
            Register::AtHl => {
                let hl = self.cpu.registers.hl();
                self.write_byte(hl, value);
            }
        }
    }

    pub(super) fn fetch_byte(&mut self) -> u8 {
        let pc = self.cpu.registers.pc;
        self.cpu.registers.pc = pc.wrapping_add(1);
        self.read_byte(pc)
    }

    pub(super) fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        (hi << 8) | lo
    }

    pub(super) fn fetch_signed_byte(&mut self) -> i8 {
        self.fetch_byte() as i8
    }

    pub(super) fn push(&mut self, value: u16) {
        let sp = self.cpu.registers.sp.wrapping_sub(2);
        self.cpu.registers.sp = sp;
        self.write16(sp, value);
    }

    pub(super) fn pop(&mut self) -> u16 {
        let sp = self.cpu.registers.sp;
        let value = self.read16(sp);
        self.cpu.registers.sp = sp.wrapping_add(2);
        value
    }

    /// cc ∈ {NZ, Z, NC, C}, per spec.md's condition-code table.
    pub(super) fn condition_met(&self, cc: u8) -> bool {
        let flags = self.cpu.registers.flags();
        match cc & 0b11 {
            0 => !flags.zero,
            1 => flags.zero,
            2 => !flags.carry,
            _ => flags.carry,
        }
    }

    pub(super) fn alu_op(&mut self, op: u8, operand: u8) {
        let a = self.cpu.registers.a;
        let carry_in = self.cpu.registers.flags().carry;
        let result = match op {
            0 => alu::add(a, operand),
            1 => alu::adc(a, operand, carry_in),
            2 => alu::sub(a, operand),
            3 => alu::sbc(a, operand, carry_in),
            4 => alu::and(a, operand),
            5 => alu::xor(a, operand),
            6 => alu::or(a, operand),
            7 => {
                let flags = alu::cp(a, operand);
                self.cpu.registers.set_flags(flags);
                return;
            }
            _ => unreachable!("alu op is a 3-bit field"),
        };
        self.cpu.registers.a = result.value;
        self.cpu.registers.set_flags(result.flags);
    }

    pub(super) fn inc_r(&mut self, code: Register) {
        let value = self.get_r(code);
        let carry = self.cpu.registers.flags().carry;
        let result = alu::inc(value);
        self.set_r(code, result.value);
        self.cpu.registers.set_flags(Flags { carry, ..result.flags });
    }

    pub(super) fn dec_r(&mut self, code: Register) {
        let value = self.get_r(code);
        let carry = self.cpu.registers.flags().carry;
        let result = alu::dec(value);
        self.set_r(code, result.value);
        self.cpu.registers.set_flags(Flags { carry, ..result.flags });
    }

    pub(super) fn jump_relative(&mut self, offset: i8) {
        let pc = self.cpu.registers.pc;
        self.cpu.registers.pc = pc.wrapping_add(offset as i16 as u16);
    }

    /// Binary-coded-decimal adjust of A after an ADD/ADC/SUB/SBC, using the
    /// N/H/C flags those instructions left behind.
    pub(super) fn daa(&mut self) {
        let flags = self.cpu.registers.flags();
        let mut a = self.cpu.registers.a;
        let mut carry = flags.carry;

        if !flags.subtract {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if flags.half_carry || (a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if flags.half_carry {
                a = a.wrapping_sub(0x06);
            }
        }

        self.cpu.registers.a = a;
        self.cpu.registers.set_flags(Flags {
            zero: a == 0,
            subtract: flags.subtract,
            half_carry: false,
            carry,
        });
    }

    pub(super) fn cpl(&mut self) {
        self.cpu.registers.a = !self.cpu.registers.a;
        let flags = self.cpu.registers.flags();
        self.cpu.registers.set_flags(Flags { subtract: true, half_carry: true, ..flags });
    }

    pub(super) fn ccf(&mut self) {
        let flags = self.cpu.registers.flags();
        self.cpu.registers.set_flags(Flags {
            subtract: false,
            half_carry: false,
            carry: !flags.carry,
            ..flags
        });
    }

    pub(super) fn scf(&mut self) {
        let flags = self.cpu.registers.flags();
        self.cpu.registers.set_flags(Flags {
            subtract: false,
            half_carry: false,
            carry: true,
            ..flags
        });
    }

    /// RLCA/RLA/RRCA/RRA: the unprefixed rotate-A forms always clear Z,
    /// unlike their CB-prefixed counterparts below.
    pub(super) fn rotate_a(&mut self, op: u8) {
        let a = self.cpu.registers.a;
        let carry_in = self.cpu.registers.flags().carry;
        let (value, carry_out) = Self::rotate_value(op, a, carry_in);
        self.cpu.registers.a = value;
        self.cpu.registers.set_flags(Flags {
            zero: false,
            subtract: false,
            half_carry: false,
            carry: carry_out,
        });
    }

    /// CB-prefixed RLC/RRC/RL/RR r / (HL): same rotation, but Z reflects
    /// the result and the other three non-carry flags are always cleared.
    pub(super) fn rotate_cb(&mut self, op: u8, code: Register) {
        let value = self.get_r(code);
        let carry_in = self.cpu.registers.flags().carry;
        let (result, carry_out) = Self::rotate_value(op, value, carry_in);
        self.set_r(code, result);
        self.cpu.registers.set_flags(Flags {
            zero: result == 0,
            subtract: false,
            half_carry: false,
            carry: carry_out,
        });
    }

    /// op: 0=RLC, 1=RRC, 2=RL, 3=RR.
    fn rotate_value(op: u8, value: u8, carry_in: bool) -> (u8, bool) {
        match op {
            0 => (value.rotate_left(1), value & 0x80 != 0),
            1 => (value.rotate_right(1), value & 0x01 != 0),
            2 => {
                let carry_out = value & 0x80 != 0;
                ((value << 1) | carry_in as u8, carry_out)
            }
            3 => {
                let carry_out = value & 0x01 != 0;
                ((value >> 1) | ((carry_in as u8) << 7), carry_out)
            }
            _ => unreachable!("rotate op is a 2-bit field"),
        }
    }

    /// op: 0=SLA, 1=SRA, 2=SWAP, 3=SRL.
    pub(super) fn shift_cb(&mut self, op: u8, code: Register) {
        let value = self.get_r(code);
        let (result, carry_out) = match op {
            0 => (value << 1, value & 0x80 != 0),
            1 => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
            2 => (value.rotate_left(4), false),
            3 => (value >> 1, value & 0x01 != 0),
            _ => unreachable!("shift op is a 2-bit field"),
        };
        self.set_r(code, result);
        self.cpu.registers.set_flags(Flags {
            zero: result == 0,
            subtract: false,
            half_carry: false,
            carry: carry_out,
        });
    }

    /// BIT b,r / (HL): Z = complement of the tested bit, C preserved.
    pub(super) fn bit_test(&mut self, bit: u8, code: Register) {
        let value = self.get_r(code);
        let carry = self.cpu.registers.flags().carry;
        self.cpu.registers.set_flags(Flags {
            zero: (value >> bit) & 1 == 0,
            subtract: false,
            half_carry: true,
            carry,
        });
    }

    pub(super) fn res_bit(&mut self, bit: u8, code: Register) {
        let value = self.get_r(code);
        self.set_r(code, value & !(1 << bit));
    }

    pub(super) fn set_bit(&mut self, bit: u8, code: Register) {
        let value = self.get_r(code);
        self.set_r(code, value | (1 << bit));
    }
}
