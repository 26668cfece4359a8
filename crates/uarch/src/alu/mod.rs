//! ALU dispatch tables.
//!
//! The execute stage dispatches computational instructions through a
//! match/mask table: the first descriptor whose mask-and-compare matches the
//! instruction word supplies the executor. Executors write the computed
//! destination value and computed next PC into the payload; a fault latches
//! into the payload's trap slot. Memory operations go through AGEN and the
//! LSU instead, and AMO/CSR work is deferred to retirement.

use crate::core::payload::Payload;
use crate::isa::{exec, opcodes};

/// An executor: computes `c_value`/`c_next_pc` from the payload's sources.
pub type AluOpFn = fn(&mut Payload);

/// One dispatch table row.
#[derive(Debug, Clone, Copy)]
pub struct AluOpDesc {
    /// Bits that must match after masking.
    pub matches: u32,
    /// Mask applied to the instruction word.
    pub mask: u32,
    /// The executor.
    pub func: AluOpFn,
}

/// The dispatch table.
#[derive(Debug)]
pub struct AluTable {
    ops: Vec<AluOpDesc>,
}

fn op_compute(pay: &mut Payload) {
    match exec::execute(pay.insn, pay.pc, pay.a_value, pay.b_value, pay.d_value) {
        Ok(out) => {
            pay.c_value = out.value;
            pay.c_next_pc = out.next_pc;
        }
        Err(trap) => pay.trap.post(trap),
    }
}

fn op_agen(pay: &mut Payload) {
    pay.addr = exec::agen(pay.insn, pay.a_value);
    pay.c_next_pc = crate::common::increment_pc(pay.pc);
}

fn op_deferred(pay: &mut Payload) {
    // AMO compute and CSR operations execute at retirement; the datapath
    // only carries their source values forward.
    pay.c_next_pc = crate::common::increment_pc(pay.pc);
}

impl Default for AluTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AluTable {
    /// Build the standard table.
    pub fn new(/* no configuration: the ISA is fixed */) -> Self {
        const OPCODE_MASK: u32 = 0x7F;
        let row = |op: u32, func: AluOpFn| AluOpDesc { matches: op, mask: OPCODE_MASK, func };
        let ops = vec![
            row(opcodes::LUI, op_compute),
            row(opcodes::AUIPC, op_compute),
            row(opcodes::JAL, op_compute),
            row(opcodes::JALR, op_compute),
            row(opcodes::BRANCH, op_compute),
            row(opcodes::OP_IMM, op_compute),
            row(opcodes::OP_IMM_32, op_compute),
            row(opcodes::OP, op_compute),
            row(opcodes::OP_32, op_compute),
            row(opcodes::MISC_MEM, op_compute),
            row(opcodes::OP_FP, op_compute),
            row(opcodes::LOAD, op_agen),
            row(opcodes::LOAD_FP, op_agen),
            row(opcodes::STORE, op_agen),
            row(opcodes::STORE_FP, op_agen),
            row(opcodes::AMO, op_agen),
            row(opcodes::SYSTEM, op_deferred),
        ];
        Self { ops }
    }

    /// Find the executor for an instruction word.
    pub fn lookup(&self, bits: u32) -> Option<AluOpFn> {
        self.ops
            .iter()
            .find(|d| bits & d.mask == d.matches)
            .map(|d| d.func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Insn;

    #[test]
    fn dispatch_writes_value_and_next_pc() {
        let table = AluTable::new();
        let mut pay = Payload { insn: Insn(0x0020_81B3), pc: 0x2000, a_value: 2, b_value: 3, ..Payload::default() };
        let f = table.lookup(pay.insn.bits()).unwrap();
        f(&mut pay);
        assert_eq!(pay.c_value, 5);
        assert_eq!(pay.c_next_pc, 0x2004);
    }
}
