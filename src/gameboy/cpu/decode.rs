//! Opcode dispatch by bit-field extraction: `x = op[7:6]`, `y = op[5:3]`,
//! `z = op[2:0]`, `p = y>>1`, `q = y&1`. This replaces the hundreds-of-arm
//! switch the instruction set is traditionally interpreted with (spec.md
//! §9) with the small table-driven scheme documented for the Z80/LR35902
//! family, adjusted for the handful of opcodes this ISA redefines (0x08,
//! 0x10, 0xD9, LDH forms, `ADD SP,e`/`LD HL,SP+e`, `JP (HL)`).

use super::alu;
use super::ops::{R_TABLE, RP2_TABLE, RP_TABLE};
use super::registers::{Flags, RegisterPair};
use super::super::bus::Bus;
use super::super::timer::TimerRegister;
use super::super::Gameboy;

impl Gameboy {
    /// Fetches and executes one instruction, returning its M-cycle cost.
    /// Assumes the caller has already handled the HALTed case.
    pub(crate) fn execute_instruction(&mut self) -> u32 {
        let opcode = self.fetch_byte();
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0b111;
        let z = opcode & 0b111;
        let p = y >> 1;
        let q = y & 1;

        match x {
            0 => self.exec_block0(opcode, y, z, p, q),
            1 => self.exec_block1(y, z),
            2 => {
                let operand = self.get_r(R_TABLE[z as usize]);
                self.alu_op(y, operand);
                if z == 6 { 2 } else { 1 }
            }
            3 => self.exec_block3(opcode, y, z, p, q),
            _ => unreachable!("x is a 2-bit field"),
        }
    }

    fn illegal_opcode(&self, opcode: u8) -> ! {
        log::error!(
            "unrecognized opcode {opcode:#04X} at PC {:#06X}",
            self.cpu.registers.pc.wrapping_sub(1)
        );
        panic!("unrecognized opcode {opcode:#04X}");
    }

    fn exec_block0(&mut self, opcode: u8, y: u8, z: u8, p: u8, q: u8) -> u32 {
        match z {
            0 => match y {
                0 => 1, // NOP
                1 => {
                    let addr = self.fetch_word();
                    let sp = self.cpu.registers.sp;
                    self.write16(addr, sp);
                    5
                }
                2 => {
                    self.fetch_byte(); // STOP's second byte
                    self.timer.write(TimerRegister::Div, 0);
                    self.cpu.halted = true;
                    1
                }
                3 => {
                    let offset = self.fetch_signed_byte();
                    self.jump_relative(offset);
                    3
                }
                _ => {
                    let cc = y - 4;
                    let offset = self.fetch_signed_byte();
                    if self.condition_met(cc) {
                        self.jump_relative(offset);
                        3
                    } else {
                        2
                    }
                }
            },
            1 => {
                let rp = RP_TABLE[p as usize];
                if q == 0 {
                    let value = self.fetch_word();
                    self.cpu.registers.set_pair(rp, value);
                    3
                } else {
                    let rr = self.cpu.registers.get_pair(rp);
                    let hl = self.cpu.registers.hl();
                    let result = alu::add16(hl, rr);
                    self.cpu.registers.set_pair(RegisterPair::HL, result.value);
                    let zero = self.cpu.registers.flags().zero;
                    self.cpu.registers.set_flags(Flags {
                        zero,
                        subtract: false,
                        half_carry: result.half_carry,
                        carry: result.carry,
                    });
                    2
                }
            }
            2 => {
                let a = self.cpu.registers.a;
                match (p, q) {
                    (0, 0) => self.write_byte(self.cpu.registers.get_pair(RegisterPair::BC), a),
                    (1, 0) => self.write_byte(self.cpu.registers.get_pair(RegisterPair::DE), a),
                    (2, 0) => {
                        let hl = self.cpu.registers.hl();
                        self.write_byte(hl, a);
                        self.cpu.registers.set_pair(RegisterPair::HL, hl.wrapping_add(1));
                    }
                    (3, 0) => {
                        let hl = self.cpu.registers.hl();
                        self.write_byte(hl, a);
                        self.cpu.registers.set_pair(RegisterPair::HL, hl.wrapping_sub(1));
                    }
                    (0, 1) => {
                        self.cpu.registers.a =
                            self.read_byte(self.cpu.registers.get_pair(RegisterPair::BC))
                    }
                    (1, 1) => {
                        self.cpu.registers.a =
                            self.read_byte(self.cpu.registers.get_pair(RegisterPair::DE))
                    }
                    (2, 1) => {
                        let hl = self.cpu.registers.hl();
                        self.cpu.registers.a = self.read_byte(hl);
                        self.cpu.registers.set_pair(RegisterPair::HL, hl.wrapping_add(1));
                    }
                    (3, 1) => {
                        let hl = self.cpu.registers.hl();
                        self.cpu.registers.a = self.read_byte(hl);
                        self.cpu.registers.set_pair(RegisterPair::HL, hl.wrapping_sub(1));
                    }
                    _ => unreachable!("p is a 2-bit field, q is a 1-bit field"),
                }
                2
            }
            3 => {
                let rp = RP_TABLE[p as usize];
                let value = self.cpu.registers.get_pair(rp);
                let result = if q == 0 { value.wrapping_add(1) } else { value.wrapping_sub(1) };
                self.cpu.registers.set_pair(rp, result);
                2
            }
            4 => {
                self.inc_r(R_TABLE[y as usize]);
                if y == 6 { 3 } else { 1 }
            }
            5 => {
                self.dec_r(R_TABLE[y as usize]);
                if y == 6 { 3 } else { 1 }
            }
            6 => {
                let n = self.fetch_byte();
                self.set_r(R_TABLE[y as usize], n);
                if y == 6 { 3 } else { 2 }
            }
            7 => {
                match y {
                    0 => self.rotate_a(0), // RLCA
                    1 => self.rotate_a(1), // RRCA
                    2 => self.rotate_a(2), // RLA
                    3 => self.rotate_a(3), // RRA
                    4 => self.daa(),
                    5 => self.cpl(),
                    6 => self.scf(),
                    7 => self.ccf(),
                    _ => unreachable!("y is a 3-bit field"),
                }
                1
            }
            _ => self.illegal_opcode(opcode),
        }
    }

    fn exec_block1(&mut self, y: u8, z: u8) -> u32 {
        if y == 6 && z == 6 {
            self.cpu.halted = true;
            return 1;
        }
        let value = self.get_r(R_TABLE[z as usize]);
        self.set_r(R_TABLE[y as usize], value);
        if y == 6 || z == 6 { 2 } else { 1 }
    }

    fn exec_block3(&mut self, opcode: u8, y: u8, z: u8, p: u8, q: u8) -> u32 {
        match z {
            0 => match y {
                0..=3 => {
                    if self.condition_met(y) {
                        self.cpu.registers.pc = self.pop();
                        5
                    } else {
                        2
                    }
                }
                4 => {
                    let n = self.fetch_byte();
                    let a = self.cpu.registers.a;
                    self.write_byte(0xFF00 + n as u16, a);
                    3
                }
                5 => {
                    let offset = self.fetch_signed_byte();
                    let sp = self.cpu.registers.sp;
                    let result = alu::add_signed_offset(sp, offset);
                    self.cpu.registers.sp = result.value;
                    self.cpu.registers.set_flags(Flags {
                        zero: false,
                        subtract: false,
                        half_carry: result.half_carry,
                        carry: result.carry,
                    });
                    4
                }
                6 => {
                    let n = self.fetch_byte();
                    self.cpu.registers.a = self.read_byte(0xFF00 + n as u16);
                    3
                }
                _ => {
                    let offset = self.fetch_signed_byte();
                    let sp = self.cpu.registers.sp;
                    let result = alu::add_signed_offset(sp, offset);
                    self.cpu.registers.set_pair(RegisterPair::HL, result.value);
                    self.cpu.registers.set_flags(Flags {
                        zero: false,
                        subtract: false,
                        half_carry: result.half_carry,
                        carry: result.carry,
                    });
                    3
                }
            },
            1 => {
                if q == 0 {
                    let value = self.pop();
                    self.cpu.registers.set_pair(RP2_TABLE[p as usize], value);
                    3
                } else {
                    match p {
                        0 => {
                            self.cpu.registers.pc = self.pop();
                            4
                        }
                        1 => {
                            self.cpu.registers.pc = self.pop();
                            self.cpu.ime = true;
                            self.interrupts.need_to_do_interrupts = true;
                            4
                        }
                        2 => {
                            self.cpu.registers.pc = self.cpu.registers.hl();
                            1
                        }
                        _ => {
                            self.cpu.registers.sp = self.cpu.registers.hl();
                            2
                        }
                    }
                }
            }
            2 => match y {
                0..=3 => {
                    let addr = self.fetch_word();
                    if self.condition_met(y) {
                        self.cpu.registers.pc = addr;
                        4
                    } else {
                        3
                    }
                }
                4 => {
                    let a = self.cpu.registers.a;
                    let c = self.cpu.registers.c;
                    self.write_byte(0xFF00 + c as u16, a);
                    2
                }
                5 => {
                    let addr = self.fetch_word();
                    let a = self.cpu.registers.a;
                    self.write_byte(addr, a);
                    4
                }
                6 => {
                    let c = self.cpu.registers.c;
                    self.cpu.registers.a = self.read_byte(0xFF00 + c as u16);
                    2
                }
                _ => {
                    let addr = self.fetch_word();
                    self.cpu.registers.a = self.read_byte(addr);
                    4
                }
            },
            3 => match y {
                0 => {
                    self.cpu.registers.pc = self.fetch_word();
                    4
                }
                1 => self.execute_cb(),
                6 => {
                    self.cpu.ime = false;
                    self.cpu.cancel_ime_delay();
                    1
                }
                7 => {
                    self.cpu.schedule_ime_enable();
                    1
                }
                _ => self.illegal_opcode(opcode),
            },
            4 => match y {
                0..=3 => {
                    let addr = self.fetch_word();
                    if self.condition_met(y) {
                        let pc = self.cpu.registers.pc;
                        self.push(pc);
                        self.cpu.registers.pc = addr;
                        6
                    } else {
                        3
                    }
                }
                _ => self.illegal_opcode(opcode),
            },
            5 => {
                if q == 0 {
                    let value = self.cpu.registers.get_pair(RP2_TABLE[p as usize]);
                    self.push(value);
                    4
                } else if p == 0 {
                    let addr = self.fetch_word();
                    let pc = self.cpu.registers.pc;
                    self.push(pc);
                    self.cpu.registers.pc = addr;
                    6
                } else {
                    self.illegal_opcode(opcode)
                }
            }
            6 => {
                let n = self.fetch_byte();
                self.alu_op(y, n);
                2
            }
            _ => {
                let pc = self.cpu.registers.pc;
                self.push(pc);
                self.cpu.registers.pc = (y as u16) * 8;
                4
            }
        }
    }

    fn execute_cb(&mut self) -> u32 {
        let opcode = self.fetch_byte();
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0b111;
        let z = opcode & 0b111;
        let code = R_TABLE[z as usize];

        match x {
            0 => {
                if y < 4 {
                    self.rotate_cb(y, code);
                } else {
                    self.shift_cb(y - 4, code);
                }
                if z == 6 { 4 } else { 2 }
            }
            1 => {
                self.bit_test(y, code);
                if z == 6 { 3 } else { 2 }
            }
            2 => {
                self.res_bit(y, code);
                if z == 6 { 4 } else { 2 }
            }
            _ => {
                self.set_bit(y, code);
                if z == 6 { 4 } else { 2 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::registers::RegisterPair;
    use super::*;

    /// Builds a Gameboy whose ROM bank 0 is `program`, zero-padded so PC
    /// lands on the first opcode at the post-boot PC of 0x0100.
    fn gb_with_program(program: &[u8]) -> Gameboy {
        let mut rom = vec![0u8; 0x100];
        rom.extend_from_slice(program);
        Gameboy::new(&rom).unwrap()
    }

    #[test]
    fn call_pushes_return_address_and_jumps() {
        // scenario #4 in spec.md §8.
        let mut gb = gb_with_program(&[0xCD, 0x34, 0x12]);
        gb.cpu.registers.sp = 0xDFF8;
        let cycles = gb.execute_instruction();
        assert_eq!(cycles, 6);
        assert_eq!(gb.cpu.registers.sp, 0xDFF6);
        assert_eq!(gb.read16(0xDFF6), 0x0103);
        assert_eq!(gb.cpu.registers.pc, 0x1234);
    }

    #[test]
    fn ret_undoes_a_call() {
        let mut gb = gb_with_program(&[0xCD, 0x05, 0x01, 0x00, 0x00, 0xC9]);
        gb.cpu.registers.sp = 0xDFF8;
        gb.execute_instruction(); // CALL 0x0105
        assert_eq!(gb.cpu.registers.pc, 0x0105);
        gb.execute_instruction(); // RET
        assert_eq!(gb.cpu.registers.pc, 0x0103);
        assert_eq!(gb.cpu.registers.sp, 0xDFF8);
    }

    #[test]
    fn push_pop_round_trip_clears_f_low_nibble() {
        let mut gb = gb_with_program(&[0xC5, 0xC1]); // PUSH BC; POP BC
        gb.cpu.registers.sp = 0xDFF8;
        gb.cpu.registers.set_pair(RegisterPair::BC, 0x1234);
        gb.execute_instruction(); // PUSH BC
        gb.cpu.registers.set_pair(RegisterPair::BC, 0x0000);
        gb.execute_instruction(); // POP BC
        assert_eq!(gb.cpu.registers.get_pair(RegisterPair::BC), 0x1234);
    }

    #[test]
    fn sla_hl_scenario_from_spec() {
        // scenario #3 in spec.md §8.
        let mut gb = gb_with_program(&[0xCB, 0x26]); // SLA (HL)
        gb.cpu.registers.set_pair(RegisterPair::HL, 0x8000);
        gb.write_byte(0x8000, 0x80);
        gb.cpu.registers.set_flags(Flags {
            zero: false,
            subtract: false,
            half_carry: false,
            carry: false,
        });
        gb.execute_instruction();
        assert_eq!(gb.read_byte(0x8000), 0x00);
        assert_eq!(gb.cpu.registers.f, 0x90);
    }

    #[test]
    fn bit_instruction_zero_flag_is_the_complement_of_the_tested_bit() {
        let mut gb = gb_with_program(&[0xCB, 0x47, 0xCB, 0x4F]); // BIT 0,A; BIT 1,A
        gb.cpu.registers.a = 0b0000_0001;
        gb.execute_instruction();
        assert!(!gb.cpu.registers.flags().zero);
        gb.execute_instruction();
        assert!(gb.cpu.registers.flags().zero);
    }

    #[test]
    fn cpl_twice_restores_a_and_always_sets_n_and_h() {
        let mut gb = gb_with_program(&[0x2F, 0x2F]); // CPL; CPL
        gb.cpu.registers.a = 0x35;
        gb.execute_instruction();
        assert_eq!(gb.cpu.registers.a, 0xCA);
        assert!(gb.cpu.registers.flags().subtract);
        assert!(gb.cpu.registers.flags().half_carry);
        gb.execute_instruction();
        assert_eq!(gb.cpu.registers.a, 0x35);
        assert!(gb.cpu.registers.flags().subtract);
        assert!(gb.cpu.registers.flags().half_carry);
    }

    #[test]
    fn jr_nz_is_not_taken_when_zero_flag_is_set() {
        let mut gb = gb_with_program(&[0x20, 0x05]); // JR NZ, +5
        gb.cpu.registers.set_flags(Flags {
            zero: true,
            subtract: false,
            half_carry: false,
            carry: false,
        });
        let cycles = gb.execute_instruction();
        assert_eq!(cycles, 2);
        assert_eq!(gb.cpu.registers.pc, 0x0102);
    }

    #[test]
    fn ei_enables_ime_only_after_the_following_instruction() {
        // spec.md §9: EI's effect is delayed by one instruction, so the
        // instruction immediately after EI still runs with IME clear.
        let mut gb = gb_with_program(&[0xFB, 0x00, 0x00]); // EI; NOP; NOP
        gb.step(); // EI
        assert!(!gb.cpu.ime);
        gb.step(); // first NOP after EI: IME still not yet applied
        assert!(!gb.cpu.ime);
        gb.step(); // second NOP: IME has now taken effect
        assert!(gb.cpu.ime);
    }

    #[test]
    fn rst_pushes_pc_and_jumps_to_n_times_eight() {
        let mut gb = gb_with_program(&[0xEF]); // RST 0x28
        gb.cpu.registers.sp = 0xDFF8;
        gb.execute_instruction();
        assert_eq!(gb.cpu.registers.pc, 0x0028);
        assert_eq!(gb.read16(0xDFF6), 0x0101);
    }

    #[test]
    fn unrecognized_opcode_panics_with_its_value() {
        let mut gb = gb_with_program(&[0xD3]); // undefined on the LR35902
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            gb.execute_instruction();
        }));
        assert!(result.is_err());
    }
}
