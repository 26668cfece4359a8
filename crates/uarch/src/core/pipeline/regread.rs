//! Register-read stage.
//!
//! Single-cycle producers wake their dependents here (the issue-to-issue
//! shadow): the select logic sees the fresh ready bits next cycle. Loads
//! conservatively delay wakeup until their data arrive, and AMO-compute never
//! wakes dependents (it executes at retirement under a full squash).

use crate::core::pipeline::Pipeline;
use crate::isa::decode::flags;

impl Pipeline {
    /// Read source registers and advance into the first execute stage.
    pub(crate) fn register_read(&mut self, lane: usize) {
        if !self.lanes[lane].rr.valid {
            return;
        }
        let index = self.lanes[lane].rr.index;
        let depth = self.lanes[lane].depth();

        let (p_flags, a, b, d, c) = {
            let p = self.pay.get(index);
            (p.flags, p.a, p.b, p.d, p.c)
        };

        if depth == 1 && !flags::is_load(p_flags) && !flags::is_amo(p_flags) && c.valid {
            self.iq.wakeup(c.phys);
            self.ren.set_ready(c.phys);
        }

        if a.valid {
            self.pay.get_mut(index).a_value = self.ren.read(a.phys);
        }
        if b.valid {
            self.pay.get_mut(index).b_value = self.ren.read(b.phys);
        }
        if d.valid {
            self.pay.get_mut(index).d_value = self.ren.read(d.phys);
        }

        // Execution lanes are free-flowing.
        assert!(!self.lanes[lane].ex[0].valid);
        self.lanes[lane].ex[0] = self.lanes[lane].rr;
        self.lanes[lane].rr.valid = false;
    }
}
