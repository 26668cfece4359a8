//! Compact disassembler for trace output.
//!
//! Produces a single-line rendering of an instruction, sufficient for stage
//! logs and checker diagnostics. Not a full pretty-printer.

use crate::isa::{opcodes, Insn};

/// Disassemble one instruction to a short string.
pub fn disasm(insn: Insn) -> String {
    let rd = insn.rd();
    let rs1 = insn.rs1();
    let rs2 = insn.rs2();
    match insn.opcode() {
        opcodes::LUI => format!("lui x{rd}, {:#x}", insn.u_imm()),
        opcodes::AUIPC => format!("auipc x{rd}, {:#x}", insn.u_imm()),
        opcodes::JAL => format!("jal x{rd}, {}", insn.j_imm()),
        opcodes::JALR => format!("jalr x{rd}, {}(x{rs1})", insn.i_imm()),
        opcodes::BRANCH => {
            let m = match insn.funct3() {
                0 => "beq",
                1 => "bne",
                4 => "blt",
                5 => "bge",
                6 => "bltu",
                7 => "bgeu",
                _ => "b??",
            };
            format!("{m} x{rs1}, x{rs2}, {}", insn.b_imm())
        }
        opcodes::LOAD => {
            let m = match insn.funct3() {
                0 => "lb",
                1 => "lh",
                2 => "lw",
                3 => "ld",
                4 => "lbu",
                5 => "lhu",
                6 => "lwu",
                _ => "l??",
            };
            format!("{m} x{rd}, {}(x{rs1})", insn.i_imm())
        }
        opcodes::STORE => {
            let m = match insn.funct3() {
                0 => "sb",
                1 => "sh",
                2 => "sw",
                3 => "sd",
                _ => "s??",
            };
            format!("{m} x{rs2}, {}(x{rs1})", insn.s_imm())
        }
        opcodes::LOAD_FP => format!(
            "{} f{rd}, {}(x{rs1})",
            if insn.funct3() == 2 { "flw" } else { "fld" },
            insn.i_imm()
        ),
        opcodes::STORE_FP => format!(
            "{} f{rs2}, {}(x{rs1})",
            if insn.funct3() == 2 { "fsw" } else { "fsd" },
            insn.s_imm()
        ),
        opcodes::OP_IMM => {
            let m = match insn.funct3() {
                0 => "addi",
                1 => "slli",
                2 => "slti",
                3 => "sltiu",
                4 => "xori",
                5 => {
                    if insn.funct7() & 0x20 != 0 {
                        "srai"
                    } else {
                        "srli"
                    }
                }
                6 => "ori",
                _ => "andi",
            };
            format!("{m} x{rd}, x{rs1}, {}", insn.i_imm())
        }
        opcodes::OP_IMM_32 => format!("opw-imm x{rd}, x{rs1}, {}", insn.i_imm()),
        opcodes::OP | opcodes::OP_32 => {
            let m = if insn.funct7() == 1 {
                match insn.funct3() {
                    0 => "mul",
                    4 => "div",
                    5 => "divu",
                    6 => "rem",
                    7 => "remu",
                    _ => "mul?",
                }
            } else {
                match (insn.funct3(), insn.funct7()) {
                    (0, 0) => "add",
                    (0, 0x20) => "sub",
                    (1, _) => "sll",
                    (2, _) => "slt",
                    (3, _) => "sltu",
                    (4, _) => "xor",
                    (5, 0) => "srl",
                    (5, _) => "sra",
                    (6, _) => "or",
                    _ => "and",
                }
            };
            format!("{m} x{rd}, x{rs1}, x{rs2}")
        }
        opcodes::AMO => match insn.funct5() {
            0b00010 => format!("lr x{rd}, (x{rs1})"),
            0b00011 => format!("sc x{rd}, x{rs2}, (x{rs1})"),
            _ => format!("amo x{rd}, x{rs2}, (x{rs1})"),
        },
        opcodes::SYSTEM => match insn.funct3() {
            0 => match insn.funct12() {
                0 => "ecall".to_string(),
                1 => "ebreak".to_string(),
                0x102 => "sret".to_string(),
                _ => "system".to_string(),
            },
            _ => format!("csr x{rd}, {:#x}, x{rs1}", insn.funct12()),
        },
        opcodes::MISC_MEM => "fence".to_string(),
        opcodes::OP_FP => format!("fp-op f{rd}, f{rs1}, f{rs2}"),
        _ => format!(".word {:#010x}", insn.bits()),
    }
}
