//! Pure execution helpers.
//!
//! These functions compute the destination value and next PC of an
//! instruction from its source values. They are shared by the ALU dispatch
//! tables (timing core) and by the functional reference model, so the two
//! sides cannot drift apart semantically.

use crate::common::{increment_pc, Trap};
use crate::isa::{opcodes, Insn};

/// Result of executing a computational or control instruction.
#[derive(Debug, Clone, Copy)]
pub struct ExecOut {
    /// Destination value (0 when the instruction has no destination).
    pub value: u64,
    /// Computed next PC.
    pub next_pc: u64,
}

/// Execute an integer/control/FP-move instruction from raw source values.
///
/// `a`, `b`, `d3` are the first, second, and third source values. Loads,
/// stores, AMOs, and CSR operations are handled elsewhere (LSU and retire
/// stage); passing one here returns an illegal-instruction trap.
pub fn execute(insn: Insn, pc: u64, a: u64, b: u64, d3: u64) -> Result<ExecOut, Trap> {
    let _ = d3;
    let seq = increment_pc(pc);
    let out = |value| ExecOut { value, next_pc: seq };
    match insn.opcode() {
        opcodes::LUI => Ok(out(insn.u_imm() as u64)),
        opcodes::AUIPC => Ok(out(pc.wrapping_add(insn.u_imm() as u64))),
        opcodes::JAL => Ok(ExecOut {
            value: seq,
            next_pc: pc.wrapping_add(insn.j_imm() as u64),
        }),
        opcodes::JALR => Ok(ExecOut {
            value: seq,
            next_pc: a.wrapping_add(insn.i_imm() as u64) & !1,
        }),
        opcodes::BRANCH => {
            let taken = match insn.funct3() {
                0 => a == b,
                1 => a != b,
                4 => (a as i64) < (b as i64),
                5 => (a as i64) >= (b as i64),
                6 => a < b,
                7 => a >= b,
                _ => return Err(Trap::IllegalInstruction(insn.bits())),
            };
            Ok(ExecOut {
                value: 0,
                next_pc: if taken { pc.wrapping_add(insn.b_imm() as u64) } else { seq },
            })
        }
        opcodes::OP_IMM => {
            let imm = insn.i_imm() as u64;
            let v = match insn.funct3() {
                0 => a.wrapping_add(imm),
                1 => a << insn.shamt(),
                2 => u64::from((a as i64) < (imm as i64)),
                3 => u64::from(a < imm),
                4 => a ^ imm,
                5 => {
                    if insn.funct7() & 0x20 != 0 {
                        ((a as i64) >> insn.shamt()) as u64
                    } else {
                        a >> insn.shamt()
                    }
                }
                6 => a | imm,
                7 => a & imm,
                _ => return Err(Trap::IllegalInstruction(insn.bits())),
            };
            Ok(out(v))
        }
        opcodes::OP_IMM_32 => {
            let imm = insn.i_imm();
            let sh = insn.shamt() & 0x1F;
            let a32 = a as u32;
            let v32 = match insn.funct3() {
                0 => (a32 as i32).wrapping_add(imm as i32) as u32,
                1 => a32 << sh,
                5 => {
                    if insn.funct7() & 0x20 != 0 {
                        ((a32 as i32) >> sh) as u32
                    } else {
                        a32 >> sh
                    }
                }
                _ => return Err(Trap::IllegalInstruction(insn.bits())),
            };
            Ok(out(v32 as i32 as i64 as u64))
        }
        opcodes::OP => {
            let v = if insn.funct7() == 1 {
                exec_muldiv(insn, a, b)?
            } else {
                match (insn.funct3(), insn.funct7()) {
                    (0, 0) => a.wrapping_add(b),
                    (0, 0x20) => a.wrapping_sub(b),
                    (1, 0) => a << (b & 0x3F),
                    (2, 0) => u64::from((a as i64) < (b as i64)),
                    (3, 0) => u64::from(a < b),
                    (4, 0) => a ^ b,
                    (5, 0) => a >> (b & 0x3F),
                    (5, 0x20) => ((a as i64) >> (b & 0x3F)) as u64,
                    (6, 0) => a | b,
                    (7, 0) => a & b,
                    _ => return Err(Trap::IllegalInstruction(insn.bits())),
                }
            };
            Ok(out(v))
        }
        opcodes::OP_32 => {
            let a32 = a as u32;
            let b32 = b as u32;
            let v32 = if insn.funct7() == 1 {
                exec_muldiv32(insn, a32, b32)?
            } else {
                match (insn.funct3(), insn.funct7()) {
                    (0, 0) => a32.wrapping_add(b32),
                    (0, 0x20) => a32.wrapping_sub(b32),
                    (1, 0) => a32 << (b32 & 0x1F),
                    (5, 0) => a32 >> (b32 & 0x1F),
                    (5, 0x20) => ((a32 as i32) >> (b32 & 0x1F)) as u32,
                    _ => return Err(Trap::IllegalInstruction(insn.bits())),
                }
            };
            Ok(out(v32 as i32 as i64 as u64))
        }
        opcodes::MISC_MEM => Ok(out(0)),
        opcodes::OP_FP => exec_fp_move(insn, a, b).map(out),
        _ => Err(Trap::IllegalInstruction(insn.bits())),
    }
}

fn exec_muldiv(insn: Insn, a: u64, b: u64) -> Result<u64, Trap> {
    let v = match insn.funct3() {
        0 => a.wrapping_mul(b),
        1 => (((a as i64 as i128) * (b as i64 as i128)) >> 64) as u64,
        2 => (((a as i64 as i128) * (b as u128 as i128)) >> 64) as u64,
        3 => (((a as u128) * (b as u128)) >> 64) as u64,
        4 => {
            // div
            let (a, b) = (a as i64, b as i64);
            if b == 0 {
                u64::MAX
            } else if a == i64::MIN && b == -1 {
                a as u64
            } else {
                (a / b) as u64
            }
        }
        5 => {
            if b == 0 {
                u64::MAX
            } else {
                a / b
            }
        }
        6 => {
            let (a, b) = (a as i64, b as i64);
            if b == 0 {
                a as u64
            } else if a == i64::MIN && b == -1 {
                0
            } else {
                (a % b) as u64
            }
        }
        7 => {
            if b == 0 {
                a
            } else {
                a % b
            }
        }
        _ => return Err(Trap::IllegalInstruction(insn.bits())),
    };
    Ok(v)
}

fn exec_muldiv32(insn: Insn, a: u32, b: u32) -> Result<u32, Trap> {
    let v = match insn.funct3() {
        0 => a.wrapping_mul(b),
        4 => {
            let (a, b) = (a as i32, b as i32);
            if b == 0 {
                u32::MAX
            } else if a == i32::MIN && b == -1 {
                a as u32
            } else {
                (a / b) as u32
            }
        }
        5 => {
            if b == 0 {
                u32::MAX
            } else {
                a / b
            }
        }
        6 => {
            let (a, b) = (a as i32, b as i32);
            if b == 0 {
                a as u32
            } else if a == i32::MIN && b == -1 {
                0
            } else {
                (a % b) as u32
            }
        }
        7 => {
            if b == 0 {
                a
            } else {
                a % b
            }
        }
        _ => return Err(Trap::IllegalInstruction(insn.bits())),
    };
    Ok(v)
}

fn exec_fp_move(insn: Insn, a: u64, b: u64) -> Result<u64, Trap> {
    match insn.funct7() {
        // fsgnj.s family operates on the low 32 bits, NaN-boxed.
        0x10 => {
            let sign = 0x8000_0000u64;
            let v = match insn.funct3() {
                0 => (a & !sign) | (b & sign),
                1 => (a & !sign) | (!b & sign),
                2 => a ^ (b & sign),
                _ => return Err(Trap::IllegalInstruction(insn.bits())),
            };
            Ok(0xFFFF_FFFF_0000_0000 | (v & 0xFFFF_FFFF))
        }
        0x11 => {
            let sign = 0x8000_0000_0000_0000u64;
            match insn.funct3() {
                0 => Ok((a & !sign) | (b & sign)),
                1 => Ok((a & !sign) | (!b & sign)),
                2 => Ok(a ^ (b & sign)),
                _ => Err(Trap::IllegalInstruction(insn.bits())),
            }
        }
        0x70 => Ok(a as u32 as i32 as i64 as u64), // fmv.x.w
        0x71 => Ok(a),                             // fmv.x.d
        0x78 => Ok(0xFFFF_FFFF_0000_0000 | (a & 0xFFFF_FFFF)), // fmv.w.x
        0x79 => Ok(a),                             // fmv.d.x
        _ => Err(Trap::IllegalInstruction(insn.bits())),
    }
}

/// Address generation for loads, stores, and AMOs.
///
/// AMOs address directly through rs1; loads use the I-type displacement and
/// stores the S-type displacement.
pub fn agen(insn: Insn, a: u64) -> u64 {
    match insn.opcode() {
        opcodes::AMO => a,
        opcodes::LOAD | opcodes::LOAD_FP => a.wrapping_add(insn.i_imm() as u64),
        _ => a.wrapping_add(insn.s_imm() as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_branch() {
        // add x3, x1, x2
        let r = execute(Insn(0x0020_81B3), 0x2000, 5, 7, 0).unwrap();
        assert_eq!(r.value, 12);
        assert_eq!(r.next_pc, 0x2004);

        // beq x1, x2, +16 (taken)
        let beq = Insn(0x0020_8863);
        let r = execute(beq, 0x2000, 9, 9, 0).unwrap();
        assert_eq!(r.next_pc, 0x2010);
        let r = execute(beq, 0x2000, 9, 8, 0).unwrap();
        assert_eq!(r.next_pc, 0x2004);
    }

    #[test]
    fn division_by_zero_follows_the_spec() {
        // div x3, x1, x2
        let div = Insn(0x0220_C1B3);
        let r = execute(div, 0, 10, 0, 0).unwrap();
        assert_eq!(r.value, u64::MAX);
    }
}
