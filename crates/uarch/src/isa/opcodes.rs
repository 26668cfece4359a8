//! Major opcode values (bits 6:0 of the instruction word).

/// Integer loads.
pub const LOAD: u32 = 0x03;
/// Floating-point loads.
pub const LOAD_FP: u32 = 0x07;
/// Fences.
pub const MISC_MEM: u32 = 0x0F;
/// Integer register-immediate operations.
pub const OP_IMM: u32 = 0x13;
/// Add upper immediate to PC.
pub const AUIPC: u32 = 0x17;
/// 32-bit register-immediate operations.
pub const OP_IMM_32: u32 = 0x1B;
/// Integer stores.
pub const STORE: u32 = 0x23;
/// Floating-point stores.
pub const STORE_FP: u32 = 0x27;
/// Atomic memory operations.
pub const AMO: u32 = 0x2F;
/// Integer register-register operations.
pub const OP: u32 = 0x33;
/// Load upper immediate.
pub const LUI: u32 = 0x37;
/// 32-bit register-register operations.
pub const OP_32: u32 = 0x3B;
/// Floating-point computation.
pub const OP_FP: u32 = 0x53;
/// Conditional branches.
pub const BRANCH: u32 = 0x63;
/// Indirect jumps.
pub const JALR: u32 = 0x67;
/// Direct jumps.
pub const JAL: u32 = 0x6F;
/// System instructions (ecall/ebreak/CSR).
pub const SYSTEM: u32 = 0x73;

/// Canonical NOP encoding (`addi x0, x0, 0`).
pub const NOP: u32 = 0x0000_0013;
