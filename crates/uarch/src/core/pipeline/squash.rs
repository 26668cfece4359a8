//! Complete and selective squash.

use crate::core::pipeline::Pipeline;

impl Pipeline {
    /// Invalidate every pipeline register, flush the fetch queue, issue
    /// queue, and LSU, squash the renamer back to the committed checkpoint,
    /// and redirect fetch to `jump_pc`.
    pub(crate) fn squash_complete(&mut self, jump_pc: u64) {
        tracing::debug!(
            target: "recovery",
            cycle = self.cycle,
            jump_pc = format_args!("{jump_pc:#x}"),
            "complete squash"
        );
        self.fetch_unit.flush(jump_pc);

        for reg in &mut self.decode_regs {
            reg.valid = false;
        }
        self.fq.flush();
        // Rename2 holds un-renamed instructions: no references to release.
        for reg in &mut self.rename2_regs {
            reg.valid = false;
        }

        self.ren.squash();

        // Dispatched-but-unissued instructions hold source and destination
        // references taken at rename.
        for i in 0..self.dispatch_width {
            if self.dispatch_regs[i].valid {
                let index = self.dispatch_regs[i].index;
                let (a, b, d, c) = {
                    let p = self.pay.get(index);
                    (p.a, p.b, p.d, p.c)
                };
                for op in [a, b, d, c] {
                    if op.valid {
                        self.ren.dec_usage(op.phys);
                    }
                }
                self.dispatch_regs[i].valid = false;
            }
        }

        for entry in self.iq.drain() {
            if let Some(dest) = entry.dest {
                self.ren.dec_usage(dest);
            }
        }

        for lane in 0..self.issue_width {
            if self.lanes[lane].rr.valid {
                let index = self.lanes[lane].rr.index;
                let (a, b, d, c) = {
                    let p = self.pay.get(index);
                    (p.a, p.b, p.d, p.c)
                };
                for op in [a, b, d, c] {
                    if op.valid {
                        self.ren.dec_usage(op.phys);
                    }
                }
                self.lanes[lane].rr.valid = false;
            }
            for j in 0..self.lanes[lane].depth() {
                if self.lanes[lane].ex[j].valid {
                    // Sources were released at register read; only the
                    // destination hold remains.
                    let index = self.lanes[lane].ex[j].index;
                    let c = self.pay.get(index).c;
                    if c.valid {
                        self.ren.dec_usage(c.phys);
                    }
                    self.lanes[lane].ex[j].valid = false;
                }
            }
            // Writeback-resident instructions already wrote their results.
            self.lanes[lane].wb.valid = false;
        }

        self.lsu.flush(&self.pay, &mut self.ren);
        self.stats.full_squashes += 1;
    }

    /// Squash only the instructions whose checkpoint-id bit is set in
    /// `mask`. The front-of-pipe stages (Decode, the fetch queue, Rename2,
    /// Dispatch) are always squashed: they are logically after any branch
    /// that could have triggered a selective squash.
    pub(crate) fn selective_squash(&mut self, mask: u64) {
        for reg in &mut self.decode_regs {
            reg.valid = false;
        }
        self.fq.flush();
        for reg in &mut self.rename2_regs {
            reg.valid = false;
        }

        for i in 0..self.dispatch_width {
            if self.dispatch_regs[i].valid {
                let index = self.dispatch_regs[i].index;
                let (a, b, d, c) = {
                    let p = self.pay.get(index);
                    (p.a, p.b, p.d, p.c)
                };
                for op in [a, b, d, c] {
                    if op.valid {
                        self.ren.dec_usage(op.phys);
                    }
                }
                self.dispatch_regs[i].valid = false;
            }
        }

        for entry in self.iq.squash(mask) {
            if let Some(dest) = entry.dest {
                self.ren.dec_usage(dest);
            }
        }

        for lane in 0..self.issue_width {
            let hit = |reg: &crate::core::pipeline::PipelineReg| {
                reg.valid && mask & (1 << reg.chkpt_id) != 0
            };
            if hit(&self.lanes[lane].rr) {
                let index = self.lanes[lane].rr.index;
                let (a, b, d, c) = {
                    let p = self.pay.get(index);
                    (p.a, p.b, p.d, p.c)
                };
                for op in [a, b, d, c] {
                    if op.valid {
                        self.ren.dec_usage(op.phys);
                    }
                }
                self.lanes[lane].rr.valid = false;
            }
            for j in 0..self.lanes[lane].depth() {
                if hit(&self.lanes[lane].ex[j]) {
                    let index = self.lanes[lane].ex[j].index;
                    let c = self.pay.get(index).c;
                    if c.valid {
                        self.ren.dec_usage(c.phys);
                    }
                    self.lanes[lane].ex[j].valid = false;
                }
            }
            if hit(&self.lanes[lane].wb) {
                self.lanes[lane].wb.valid = false;
            }
        }
    }
}
