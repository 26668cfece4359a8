//! Execute stage.
//!
//! Each lane's execute chain is processed deepest-first so instructions
//! shift like a register chain. Computation (ALU dispatch or AGEN) happens
//! in the first execute cycle; multi-cycle producers wake dependents in
//! their second-to-last stage; the final stage performs LSU entry for
//! memory operations and the physical-register write for producers.
//! AMO-compute and CSR operations pass through untouched: they execute at
//! retirement.

use crate::core::pipeline::Pipeline;
use crate::isa::decode::flags;

impl Pipeline {
    /// Advance one lane's execute chain by one cycle.
    pub(crate) fn execute(&mut self, lane: usize) {
        let depth = self.lanes[lane].depth();
        for j in (0..depth).rev() {
            if !self.lanes[lane].ex[j].valid {
                continue;
            }
            let index = self.lanes[lane].ex[j].index;

            if j == 0 {
                // First execute cycle: dispatch through the ALU table.
                if let Some(func) = self.alu_table.lookup(self.pay.get(index).insn.bits()) {
                    func(self.pay.get_mut(index));
                }
            }

            if depth > 1 && j == depth - 2 {
                // Second-to-last stage: speculative wakeup for multi-cycle
                // producers (never loads or AMO-compute).
                let (p_flags, c) = {
                    let p = self.pay.get(index);
                    (p.flags, p.c)
                };
                if c.valid && !flags::is_load(p_flags) && !flags::is_amo(p_flags) {
                    self.iq.wakeup(c.phys);
                    self.ren.set_ready(c.phys);
                }
            }

            if j == depth - 1 {
                let advance = self.finish_execute(lane, index);
                self.lanes[lane].ex[j].valid = false;
                if advance {
                    assert!(!self.lanes[lane].wb.valid);
                    self.lanes[lane].wb = crate::core::pipeline::PipelineReg {
                        valid: true,
                        index,
                        chkpt_id: self.pay.get(index).chkpt_id,
                    };
                }
            } else {
                assert!(!self.lanes[lane].ex[j + 1].valid);
                self.lanes[lane].ex[j + 1] = self.lanes[lane].ex[j];
                self.lanes[lane].ex[j].valid = false;
            }
        }
    }

    /// Final execute actions. Returns false when the instruction leaves the
    /// lane without advancing to writeback (a load stalled in the LSU, which
    /// completes it later through the replay path).
    fn finish_execute(&mut self, _lane: usize, index: usize) -> bool {
        let (p_flags, p_addr, p_b_value, lq_index, lq_phase, sq_index, sq_phase, c, chkpt) = {
            let p = self.pay.get(index);
            (p.flags, p.addr, p.b_value, p.lq_index, p.lq_phase, p.sq_index, p.sq_phase, p.c, p.chkpt_id)
        };
        let amo = flags::is_amo(p_flags);

        let advance = if flags::is_load(p_flags) {
            let value = self.lsu.load_addr(
                self.cycle,
                p_addr,
                lq_index,
                lq_phase,
                sq_index,
                sq_phase,
                &mut self.pay,
                &mut self.ren,
                &self.mem,
                &mut self.hier,
                &self.oracle,
                &mut self.state,
            );
            match value {
                Some(v) => {
                    self.pay.get_mut(index).c_value = v;
                    if c.valid {
                        self.ren.write(c.phys, v);
                        self.ren.set_ready(c.phys);
                        if !amo {
                            self.iq.wakeup(c.phys);
                        }
                    }
                    true
                }
                // Stalled: the LSU owns completion from here.
                None => false,
            }
        } else if flags::is_store(p_flags) {
            self.lsu.store_addr(
                self.cycle,
                p_addr,
                sq_index,
                lq_index,
                lq_phase,
                &mut self.pay,
                &mut self.ren,
                &self.mem,
                &mut self.hier,
            );
            self.lsu.store_value(sq_index, p_b_value);
            if amo && c.valid {
                // Store-conditional success is assumed; commit asserts it.
                self.pay.get_mut(index).c_value = 0;
                self.ren.write(c.phys, 0);
                self.ren.set_ready(c.phys);
            }
            true
        } else if amo || flags::is_csr(p_flags) {
            // Deferred to retirement; sources already captured.
            true
        } else {
            if c.valid {
                let v = self.pay.get(index).c_value;
                self.ren.write(c.phys, v);
            }
            true
        };

        // A fault discovered during execution fires at retirement.
        if self.pay.get(index).trap.is_posted() {
            self.ren.set_exception(chkpt);
        }
        advance
    }

    /// Load-replay path: complete one stalled load whose conflict or cache
    /// miss has resolved.
    pub(crate) fn load_replay(&mut self) {
        let Some((pay_index, value)) = self.lsu.load_unstall(
            self.cycle,
            &mut self.pay,
            &mut self.ren,
            &self.mem,
            &mut self.hier,
            &self.oracle,
            &mut self.state,
        ) else {
            return;
        };
        let (c, chkpt, amo, trapped) = {
            let p = self.pay.get(pay_index);
            (p.c, p.chkpt_id, flags::is_amo(p.flags), p.trap.is_posted())
        };
        self.pay.get_mut(pay_index).c_value = value;
        if c.valid {
            self.ren.write(c.phys, value);
            self.ren.set_ready(c.phys);
            if !amo {
                self.iq.wakeup(c.phys);
            }
        }
        if trapped {
            self.ren.set_exception(chkpt);
        }
        self.ren.set_complete(chkpt);
    }
}
