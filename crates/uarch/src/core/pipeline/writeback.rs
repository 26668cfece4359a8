//! Writeback stage: branch resolution and completion.
//!
//! A branch that received a checkpoint at rename (its fetch-time prediction
//! disagreed with the reference model) resolves here: the fetch unit rolls
//! the branch queue back and repredicts, the renamer rolls back to the
//! checkpoint created just after the branch, the LSU truncates to the
//! branch's recorded tails, and younger instructions are selectively
//! squashed by checkpoint mask.

use crate::common::increment_pc;
use crate::core::pipeline::Pipeline;

impl Pipeline {
    /// Resolve and complete the instruction in a lane's writeback register.
    pub(crate) fn writeback(&mut self, lane: usize) {
        if !self.lanes[lane].wb.valid {
            return;
        }
        let index = self.lanes[lane].wb.index;

        let (has_checkpoint, good, pred_next_pc, c_next_pc, pc, pred_tag, chkpt_id) = {
            let p = self.pay.get(index);
            (p.checkpoint, p.is_good(), p.next_pc, p.c_next_pc, p.pc, p.pred_tag, p.chkpt_id)
        };

        if has_checkpoint && good && pred_next_pc != c_next_pc {
            // Mispredicted branch: recover the fetch unit, the renamer, and
            // the LSU, then squash everything logically after the branch.
            let taken = c_next_pc != increment_pc(pc);
            tracing::debug!(
                target: "recovery",
                cycle = self.cycle,
                pc = format_args!("{pc:#x}"),
                next_pc = format_args!("{c_next_pc:#x}"),
                "branch mispredict"
            );
            self.fetch_unit.mispredict(pred_tag, taken, c_next_pc);

            let info = self.ren.rollback(chkpt_id, true);
            self.instr_renamed_since_last_checkpoint = 0;

            let (lq_index, lq_phase, sq_index, sq_phase) = {
                let p = self.pay.get(index);
                (p.lq_index, p.lq_phase, p.sq_index, p.sq_phase)
            };
            self.lsu.restore(lq_index, lq_phase, sq_index, sq_phase, &self.pay, &mut self.ren);

            self.selective_squash(info.squash_mask);
            self.pay.rollback(index);
            self.stats.selective_squashes += 1;
        }

        self.ren.set_complete(chkpt_id);
        self.lanes[lane].wb.valid = false;
    }
}
