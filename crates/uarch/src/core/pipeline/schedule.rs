//! Issue stage: select ready instructions and steer them to lanes.

use crate::core::pipeline::Pipeline;

impl Pipeline {
    /// Select up to `issue_width` ready entries, oldest first in the chosen
    /// ordering, and move each into an eligible lane's register-read slot.
    pub(crate) fn schedule(&mut self) {
        let mut issued = 0usize;
        for slot in self.iq.select_order() {
            if issued == self.issue_width {
                break;
            }
            let lane = match self.iq.entry(slot).lane {
                // Dispatch-time pre-steer fixed the lane; issue only when it
                // is free.
                Some(lane) => (!self.lanes[lane].rr.valid).then_some(lane),
                None => self.steering.steer_free(self.iq.entry(slot).fu, &self.lanes),
            };
            let Some(lane) = lane else { continue };
            let entry = self.iq.take(slot);
            let rr = &mut self.lanes[lane].rr;
            rr.valid = true;
            rr.index = entry.pay_index;
            rr.chkpt_id = entry.chkpt_id;
            self.pay.get_mut(entry.pay_index).lane = lane;
            issued += 1;
        }
    }
}
