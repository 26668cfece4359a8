//! Decode stage: predecode payload fields and feed the fetch queue.

use crate::core::pipeline::Pipeline;
use crate::isa::decode::{flags, predecode};
use crate::isa::IqSelect;

impl Pipeline {
    /// Decode the bundle in the Fetch2 → Decode register into the fetch queue.
    pub(crate) fn decode(&mut self) {
        if !self.decode_regs[0].valid {
            return;
        }
        // The whole decode bundle moves or none of it does.
        if !self.fq.enough_space(self.fetch_width) {
            return;
        }

        for i in 0..self.fetch_width {
            if !self.decode_regs[i].valid {
                break;
            }
            let index = self.decode_regs[i].index;
            let p = self.pay.get_mut(index);
            let dec = predecode(p.insn, p.pc);
            p.flags = dec.flags;
            p.fu = dec.fu;
            p.a.valid = dec.a.valid;
            p.a.log = dec.a.log;
            p.b.valid = dec.b.valid;
            p.b.log = dec.b.log;
            p.d.valid = dec.d.valid;
            p.d.log = dec.d.log;
            p.c.valid = dec.c.valid;
            p.c.log = dec.c.log;
            p.iq = dec.iq;
            p.csr_addr = dec.csr_addr;
            p.size = dec.size;
            p.is_signed = dec.is_signed;
            p.split = false;
            p.upper = false;
            p.split_store = false;
            if let Some(trap) = dec.decode_trap {
                p.trap.post(trap);
            }
            // A fetch trap arrived with the bundle: the instruction carries
            // it straight to retirement.
            if p.trap.is_posted() {
                p.flags |= flags::TRAP;
                p.iq = IqSelect::Skip;
                p.a.valid = false;
                p.b.valid = false;
                p.d.valid = false;
                p.c.valid = false;
            }

            self.fq.push(index);
            self.decode_regs[i].valid = false;
        }
    }
}
