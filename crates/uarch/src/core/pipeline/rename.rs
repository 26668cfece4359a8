//! Rename stages.
//!
//! Rename1 assembles the next rename bundle from the fetch queue. Rename2
//! checks resource availability (free physical registers and checkpoints),
//! renames the bundle, and creates checkpoints on the trigger conditions:
//! serializing instructions (before and after), excepting instructions
//! (before), mispredicted-at-fetch branches (after, detected against the
//! reference model), and the instructions-per-checkpoint bound.

use crate::core::pipeline::Pipeline;
use crate::isa::decode::flags;

impl Pipeline {
    /// Rename1: pull the next full bundle from the fetch queue.
    pub(crate) fn rename1(&mut self) {
        if self.rename2_regs[0].valid {
            // The current rename bundle is stalled in Rename2.
            return;
        }
        let bundle_width = self.fq.len().min(self.dispatch_width);
        // Wait for a full bundle unless fetch is stalled on a serializer.
        if self.fetch_unit.active() && bundle_width < self.dispatch_width {
            return;
        }
        for i in 0..bundle_width {
            assert!(!self.rename2_regs[i].valid);
            self.rename2_regs[i].valid = true;
            self.rename2_regs[i].index = self.fq.pop();
        }
    }

    /// Rename2: rename the current bundle and assign checkpoints.
    pub(crate) fn rename2(&mut self) {
        if !self.rename2_regs[0].valid || self.dispatch_regs[0].valid {
            return;
        }

        // Count the bundle's resource needs: destination registers, and
        // checkpoints per the trigger rules (walked with a scratch copy of
        // the instructions-since-checkpoint counter).
        let mut bundle_dst = 0u64;
        let mut bundle_chkpts = 0u64;
        let mut temp_count = self.instr_renamed_since_last_checkpoint;
        for i in 0..self.dispatch_width {
            if !self.rename2_regs[i].valid {
                break;
            }
            let p = self.pay.get(self.rename2_regs[i].index);
            let actual = p.db_index.and_then(|db| self.oracle.peek(db));
            let is_serial = flags::is_amo(p.flags) || flags::is_csr(p.flags);
            let excepting = actual.is_some_and(|a| a.exception.is_some());
            let mispredicted = actual.is_some_and(|a| p.next_pc != a.next_pc);

            if is_serial || excepting {
                // Checkpoint before (unless one is fresh) and after: an
                // excepting instruction's architectural next PC is the
                // handler, so the post-instruction trigger fires too.
                bundle_chkpts += if temp_count == 0 { 1 } else { 2 };
                temp_count = 0;
            } else if mispredicted {
                bundle_chkpts += 1;
                temp_count = 0;
            } else {
                temp_count += 1;
                if temp_count == self.ren.max_instr_between_checkpoints {
                    bundle_chkpts += 1;
                    temp_count = 0;
                }
            }

            if p.c.valid {
                bundle_dst += 1;
            }
        }

        if self.ren.stall_reg(bundle_dst) || self.ren.stall_checkpoint(bundle_chkpts) {
            return;
        }

        for i in 0..self.dispatch_width {
            if !self.rename2_regs[i].valid {
                break;
            }
            let index = self.rename2_regs[i].index;
            let (p_flags, p_next_pc, p_db) = {
                let p = self.pay.get(index);
                (p.flags, p.next_pc, p.db_index)
            };
            let actual = p_db.and_then(|db| self.oracle.peek(db));
            let (actual_next_pc, actual_exception) =
                actual.map_or((0, false), |a| (a.next_pc, a.exception.is_some()));
            let good = actual.is_some();

            let load = flags::is_load(p_flags);
            let store = flags::is_store(p_flags);
            let branch = flags::is_branch(p_flags);
            let amo = flags::is_amo(p_flags);
            let csr = flags::is_csr(p_flags);
            let is_serial = amo || csr;

            // Checkpoint before a serializer or an excepting instruction, so
            // the architectural state just prior to it is recoverable.
            if (is_serial || (good && actual_exception))
                && self.instr_renamed_since_last_checkpoint != 0
            {
                self.ren.checkpoint();
                self.instr_renamed_since_last_checkpoint = 0;
            }

            let chkpt_id = self.ren.assign_checkpoint(load, store, branch, amo, csr);
            self.pay.get_mut(index).chkpt_id = chkpt_id;

            // Sources first, then the destination.
            {
                let ops = {
                    let p = self.pay.get(index);
                    (p.a, p.b, p.d, p.c)
                };
                if ops.0.valid {
                    self.pay.get_mut(index).a.phys = self.ren.rename_rsrc(ops.0.log);
                }
                if ops.1.valid {
                    self.pay.get_mut(index).b.phys = self.ren.rename_rsrc(ops.1.log);
                }
                if ops.2.valid {
                    self.pay.get_mut(index).d.phys = self.ren.rename_rsrc(ops.2.log);
                }
                if ops.3.valid {
                    self.pay.get_mut(index).c.phys = self.ren.rename_rdst(ops.3.log);
                }
            }
            self.instr_renamed_since_last_checkpoint += 1;

            // Checkpoint after a serializer, after a branch whose prediction
            // the reference model disconfirms, and at the interval bound.
            if is_serial {
                self.ren.checkpoint();
                self.instr_renamed_since_last_checkpoint = 0;
            } else if (good && p_next_pc != actual_next_pc)
                || self.instr_renamed_since_last_checkpoint == self.ren.max_instr_between_checkpoints
            {
                if good && p_next_pc != actual_next_pc {
                    self.pay.get_mut(index).checkpoint = true;
                }
                self.ren.checkpoint();
                self.instr_renamed_since_last_checkpoint = 0;
            }
        }

        // Transfer the bundle to Dispatch.
        for i in 0..self.dispatch_width {
            if !self.rename2_regs[i].valid {
                break;
            }
            assert!(!self.dispatch_regs[i].valid);
            self.rename2_regs[i].valid = false;
            self.dispatch_regs[i].valid = true;
            self.dispatch_regs[i].index = self.rename2_regs[i].index;
            self.dispatch_regs[i].chkpt_id = self.pay.get(self.rename2_regs[i].index).chkpt_id;
        }
    }
}
