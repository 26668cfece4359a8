//! Dispatch stage: LQ/SQ allocation, issue-queue insertion, lane pre-steer.

use crate::config::DisambigModel;
use crate::core::issue::{IqEntry, IqSrc};
use crate::core::pipeline::Pipeline;
use crate::isa::decode::flags;
use crate::isa::IqSelect;

impl Pipeline {
    /// Dispatch the current bundle into the issue queue and the LSU.
    pub(crate) fn dispatch(&mut self) {
        if !self.dispatch_regs[0].valid {
            return;
        }

        // Structural hazards: the whole bundle dispatches or none of it.
        let mut bundle_loads = 0u64;
        let mut bundle_stores = 0u64;
        let mut bundle_iq = 0usize;
        for i in 0..self.dispatch_width {
            if !self.dispatch_regs[i].valid {
                break;
            }
            let p = self.pay.get(self.dispatch_regs[i].index);
            if flags::is_load(p.flags) {
                bundle_loads += 1;
            }
            if flags::is_store(p.flags) {
                bundle_stores += 1;
            }
            if p.iq == IqSelect::Queue {
                bundle_iq += 1;
            }
        }
        if self.lsu.stall(bundle_loads, bundle_stores) || self.iq.free_slots() < bundle_iq {
            return;
        }

        for i in 0..self.dispatch_width {
            if !self.dispatch_regs[i].valid {
                break;
            }
            let index = self.dispatch_regs[i].index;

            // Every instruction records the LSU tails at its dispatch: loads
            // and stores get their own entry index plus the opposing tail,
            // branches keep both tails for mispredict restoration.
            let (lq_tail, lq_phase, sq_tail, sq_phase) = self.lsu.tails();
            {
                let p = self.pay.get_mut(index);
                p.lq_index = lq_tail;
                p.lq_phase = lq_phase;
                p.sq_index = sq_tail;
                p.sq_phase = sq_phase;
            }

            let (p_flags, p_size, p_signed, p_pc, p_db) = {
                let p = self.pay.get(index);
                (p.flags, p.size, p.is_signed, p.pc, p.db_index)
            };
            let is_load = flags::is_load(p_flags);
            let is_store = flags::is_store(p_flags);
            if is_load || is_store {
                let (lq_index, lq_ph, sq_index, sq_ph) = self.lsu.dispatch(
                    is_load,
                    p_size,
                    p_signed,
                    flags::is_amo(p_flags),
                    index,
                    p_pc,
                );
                let p = self.pay.get_mut(index);
                p.lq_index = lq_index;
                p.lq_phase = lq_ph;
                p.sq_index = sq_index;
                p.sq_phase = sq_ph;

                // Oracle disambiguation: the store's address is known now.
                if is_store && self.disambig_model == DisambigModel::Oracle {
                    if let Some((addr, _, _)) = p_db
                        .and_then(|db| self.oracle.peek(db))
                        .and_then(|e| e.store)
                    {
                        self.lsu.preset_store_addr(sq_index, addr);
                    }
                }
            }

            let (p_iq, p_fu, p_chkpt, p_trap) = {
                let p = self.pay.get(index);
                (p.iq, p.fu, p.chkpt_id, p.trap.is_posted())
            };
            match p_iq {
                IqSelect::Queue => {
                    let lane = if self.presteer {
                        let lane = self.steering.steer(p_fu);
                        self.pay.get_mut(index).lane = lane;
                        Some(lane)
                    } else {
                        None
                    };
                    let p = self.pay.get(index);
                    let src = |op: crate::core::payload::Operand, ren: &crate::core::renamer::Renamer| IqSrc {
                        valid: op.valid,
                        phys: op.phys,
                        ready: !op.valid || ren.is_ready(op.phys),
                    };
                    let entry = IqEntry {
                        valid: true,
                        dest: p.c.valid.then_some(p.c.phys),
                        srcs: [src(p.a, &self.ren), src(p.b, &self.ren), src(p.d, &self.ren)],
                        pay_index: index,
                        chkpt_id: p_chkpt,
                        fu: p_fu,
                        lane,
                        age: 0,
                    };
                    self.iq.insert(entry);
                }
                IqSelect::Skip => {
                    // Trapped before dispatch (fetch/decode fault, ecall,
                    // ebreak): completed immediately, fires at retirement.
                    if p_trap {
                        self.ren.set_exception(p_chkpt);
                    }
                    self.ren.set_complete(p_chkpt);
                }
            }

            self.dispatch_regs[i].valid = false;
        }
    }
}
