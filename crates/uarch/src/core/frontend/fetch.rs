//! The two-stage fetch unit.
//!
//! Fetch1 predicts and supplies a fetch bundle from the trace cache or the
//! instruction cache + BTB, checkpoints its own state, and speculatively
//! updates the PC, BHRs, and RAS. Fetch2 predecodes the bundle, detects
//! misfetches and serializing instructions, advances the bundle to Decode,
//! and pushes branches onto the branch queue with their precise contexts.

use crate::common::{increment_pc, Cycle, Trap};
use crate::config::SimConfig;
use crate::core::cache::CacheHierarchy;
use crate::core::frontend::bq::{BranchQueue, PredTag};
use crate::core::frontend::btb::{BranchKind, Btb, FetchSlot, SpecUpdate};
use crate::core::frontend::gshare::{
    bump_counter, packed_counter, set_packed_counter, GshareIndex, WEAKLY_TAKEN_PACKED,
};
use crate::core::frontend::icache::InstrCache;
use crate::core::frontend::ras::Ras;
use crate::core::frontend::tc::TraceCache;
use crate::core::payload::PayloadBuffer;
use crate::core::pipeline::PipelineReg;
use crate::isa::opcodes;
use crate::mem::Memory;
use crate::ref_model::RefModel;
use crate::stats::SimStats;

/// Checkpoint of the Fetch1 context for the bundle sitting in Fetch2,
/// restored on a misfetch.
#[derive(Debug, Clone, Copy, Default)]
struct Fetch2Status {
    valid: bool,
    pc: u64,
    cb_bhr: u64,
    ib_bhr: u64,
    ras_tos: u64,
    pay_checkpoint: usize,
    tc_hit: bool,
}

/// The fetch-and-predict front end.
#[derive(Debug)]
pub struct FetchUnit {
    fetch_width: u64,

    // Fetch1 state.
    fetch_active: bool,
    pc: u64,
    bundle: Vec<FetchSlot>,
    /// L1 instruction cache (timing only).
    pub ic: InstrCache,
    ic_miss: bool,
    ic_miss_resolve: Cycle,
    btb: Btb,
    tc_enable: bool,
    tc: TraceCache,
    /// Conditional predictor table: *m* packed 2-bit counters per entry.
    cb: Vec<u64>,
    cb_index: GshareIndex,
    /// Indirect predictor table: one target per entry.
    ib: Vec<u64>,
    ib_index: GshareIndex,
    ras: Ras,
    bp_perfect: bool,

    // Fetch2 state.
    fetch2_regs: Vec<PipelineReg>,
    status: Fetch2Status,
    /// Branch queue of outstanding predictions.
    pub bq: BranchQueue,
}

impl FetchUnit {
    /// Build the front end from the configuration, starting at `pc`.
    pub fn new(cfg: &SimConfig, pc: u64) -> Self {
        let n = cfg.core.fetch_width;
        let m = cfg.frontend.cond_branch_per_cycle;
        let cb_index = GshareIndex::new(cfg.frontend.cbp_pc_length, cfg.frontend.cbp_bhr_length);
        let ib_index = GshareIndex::new(cfg.frontend.ibp_pc_length, cfg.frontend.ibp_bhr_length);
        Self {
            fetch_width: n,
            fetch_active: true,
            pc,
            bundle: vec![FetchSlot::empty(); n as usize],
            ic: InstrCache::new(cfg.oracle.perfect_icache, &cfg.memory.l1i),
            ic_miss: false,
            ic_miss_resolve: 0,
            btb: Btb::new(cfg.frontend.btb_entries, n, cfg.frontend.btb_assoc, m),
            tc_enable: cfg.frontend.trace_cache,
            tc: TraceCache::new(cfg.oracle.perfect_trace_cache, m, n),
            cb: vec![WEAKLY_TAKEN_PACKED; cb_index.table_size() as usize],
            cb_index,
            ib: vec![0; ib_index.table_size() as usize],
            ib_index,
            ras: Ras::new(cfg.frontend.ras_size),
            bp_perfect: cfg.oracle.perfect_branch_pred,
            fetch2_regs: vec![PipelineReg::default(); n as usize],
            status: Fetch2Status::default(),
            // The queue must cover every branch between fetch and retire.
            bq: BranchQueue::new(
                cfg.frontend.bq_size.max(cfg.core.active_size + cfg.core.fetch_queue_size),
            ),
        }
    }

    /// The speculative fetch PC.
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Redirect the speculative fetch PC.
    pub const fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    /// False while waiting for a serializing instruction to retire.
    pub const fn active(&self) -> bool {
        self.fetch_active
    }

    /// Speculatively update the PC, BHRs, and RAS from an assembled bundle.
    fn spec_update(&mut self, update: &SpecUpdate, mut cb_preds: u64) {
        self.pc = update.next_pc;
        for _ in 0..update.num_cb {
            let taken = (cb_preds & 3) >= 2;
            cb_preds >>= 2;
            self.cb_index.update_bhr(taken);
            self.ib_index.update_bhr(taken);
        }
        if update.pop_ras {
            assert!(!update.push_ras);
            let _ = self.ras.pop();
        }
        if update.push_ras {
            self.ras.push(update.push_ras_pc);
        }
    }

    /// Move the assembled bundle into the payload buffer and the
    /// Fetch1→Fetch2 register, linking each instruction to the reference
    /// model on the way.
    fn transfer_bundle(&mut self, pay: &mut PayloadBuffer, oracle: &mut RefModel) {
        let mut pos = 0usize;
        while pos < self.fetch_width as usize && self.bundle[pos].valid {
            let slot = &self.bundle[pos];
            let index = pay.push();
            let p = pay.get_mut(index);
            p.insn = slot.insn;
            p.pc = slot.pc;
            p.next_pc = slot.next_pc;
            p.branch = slot.branch;
            p.branch_kind = slot.branch_kind;
            p.branch_target = slot.branch_target;
            p.fflags = 0;
            p.trap.clear();
            if let Some(trap) = &slot.fetch_trap {
                match trap {
                    Trap::FetchMisaligned(_) | Trap::FetchAccessFault(_) => {
                        p.trap.post(trap.clone());
                    }
                    _ => unreachable!("instruction cache posts only fetch traps"),
                }
            }
            pay.map_to_actual(oracle, index);

            let reg = &mut self.fetch2_regs[pos];
            assert!(!reg.valid);
            reg.valid = true;
            reg.index = index;
            pos += 1;
        }
        assert!(self.fetch2_regs[0].valid, "fetch bundle must contain at least one instruction");
    }

    fn squash_fetch2(&mut self) {
        self.status.valid = false;
        for reg in &mut self.fetch2_regs {
            reg.valid = false;
        }
    }

    /// Fetch1: predict and supply a fetch bundle.
    ///
    /// Stalls if the Fetch2 bundle has not advanced, fetch is idle for a
    /// serializing instruction, or an instruction-cache miss is outstanding.
    pub fn fetch1(
        &mut self,
        cycle: Cycle,
        pay: &mut PayloadBuffer,
        oracle: &mut RefModel,
        mem: &Memory,
        hier: &mut CacheHierarchy,
    ) {
        if self.status.valid || !self.fetch_active || (self.ic_miss && cycle < self.ic_miss_resolve) {
            return;
        }
        self.ic_miss = false;

        // Read all predictors "in parallel": the multi-prediction conditional
        // table, the indirect target table, and the RAS (peek only).
        let (cb_preds, ib_target, ras_target) = if self.bp_perfect {
            let (preds, indirect) = pay.predict(oracle, self.pc, self.fetch_width);
            (preds, indirect, indirect)
        } else {
            (
                self.cb[self.cb_index.index(self.pc) as usize],
                self.ib[self.ib_index.index(self.pc) as usize],
                self.ras.peek(),
            )
        };

        let mut update = SpecUpdate::default();
        let tc_hit = self.tc_enable
            && self.tc.lookup(
                self.pc,
                cb_preds,
                ib_target,
                ras_target,
                mem,
                &mut self.bundle,
                &mut update,
            );

        // The instruction cache + BTB search is gated by the trace-cache hit:
        // conceptually parallel, but only one bundle/update pair is kept.
        if !tc_hit {
            let (hit, resolve) = self.ic.lookup(cycle, self.pc, mem, &mut self.bundle, hier);
            self.ic_miss = !hit;
            self.ic_miss_resolve = resolve;
            if !self.ic_miss {
                // The BTB consumes the per-slot fetch traps the I-cache just
                // posted, terminating the bundle at the first one.
                self.btb.lookup(self.pc, cb_preds, ib_target, ras_target, &mut self.bundle, &mut update);
            }
        }

        if tc_hit || !self.ic_miss {
            // Checkpoint the Fetch1 context so a misfetch can repredict.
            self.status = Fetch2Status {
                valid: true,
                pc: self.pc,
                cb_bhr: self.cb_index.bhr(),
                ib_bhr: self.ib_index.bhr(),
                ras_tos: self.ras.tos(),
                pay_checkpoint: pay.checkpoint(),
                tc_hit,
            };
            self.transfer_bundle(pay, oracle);
            self.spec_update(&update, cb_preds);
        }
    }

    /// Fetch2: predecode, misfetch recovery, bundle advance.
    ///
    /// Returns false on a misfetch; the caller must not clock Fetch1 this
    /// cycle (the discarded slot models the repredict bubble).
    pub fn fetch2(
        &mut self,
        decode: &mut [PipelineReg],
        pay: &mut PayloadBuffer,
        stats: &mut SimStats,
    ) -> bool {
        if !self.status.valid {
            assert!(!self.fetch2_regs[0].valid);
            return true;
        }

        // Step 1: predecode. Identify fetch exceptions and serializing
        // instructions (both idle Fetch1 until retirement), and detect a
        // misfetched bundle from the instruction-cache path.
        let mut misfetch = false;
        let mut pos = 0usize;
        while pos < self.fetch_width as usize && self.fetch2_regs[pos].valid {
            let index = self.fetch2_regs[pos].index;

            if pay.get(index).trap.is_posted() {
                // Fetch trap: the bundle already terminates here.
                if pos + 1 < self.fetch_width as usize {
                    assert!(!self.fetch2_regs[pos + 1].valid);
                }
                self.fetch_active = false;
            }

            let insn = pay.get(index).insn;
            let is_branch_insn = match insn.opcode() {
                opcodes::AMO | opcodes::SYSTEM => {
                    // Serializing: discard the rest of the bundle and stall
                    // fetch until the serializer retires.
                    if pos + 1 < self.fetch_width as usize {
                        self.fetch2_regs[pos + 1].valid = false;
                    }
                    self.fetch_active = false;
                    pay.rollback(index);
                    false
                }
                opcodes::JAL | opcodes::JALR | opcodes::BRANCH => true,
                _ => false,
            };

            if self.status.tc_hit {
                // The trace cache is always right about branch identity.
                assert!(pay.get(index).branch == is_branch_insn);
            } else if is_branch_insn {
                let (real_kind, real_target) = BranchKind::decode(insn, pay.get(index).pc);
                let p = pay.get(index);
                if !p.branch
                    || p.branch_kind != real_kind
                    || (insn.opcode() != opcodes::JALR && p.branch_target != real_target)
                {
                    // Missed by the BTB, or its cached type/target is stale
                    // (self-modifying code, or wrong-path training outside
                    // the text segment). Train and repredict.
                    misfetch = true;
                    self.btb.update(self.status.pc, pos as u64, insn);
                    stats.branches.btb_misfetch += 1;
                }
            } else if pay.get(index).branch {
                // A non-branch mis-identified as a branch: drop the entry.
                misfetch = true;
                self.btb.invalidate(self.status.pc, pos as u64);
                stats.branches.btb_misfetch += 1;
            }

            pos += 1;
        }

        if misfetch {
            // The bundle may also have contained an exception or serializer
            // after the first misfetched slot; fetch resumes regardless.
            self.fetch_active = true;
            self.squash_fetch2();
            self.pc = self.status.pc;
            self.cb_index.set_bhr(self.status.cb_bhr);
            self.ib_index.set_bhr(self.status.ib_bhr);
            self.ras.set_tos(self.status.ras_tos);
            pay.restore(self.status.pay_checkpoint);
            return false;
        }

        // Step 2: advance the bundle to Decode and push branches onto the
        // branch queue with precise per-branch contexts.
        if decode[0].valid {
            return true;
        }

        let mut my_cb_bhr = self.status.cb_bhr;
        let mut my_ib_bhr = self.status.ib_bhr;
        let mut cb_pos_in_entry = 0u64;
        let mut pos = 0usize;
        while pos < self.fetch_width as usize && self.fetch2_regs[pos].valid {
            let index = self.fetch2_regs[pos].index;
            assert!(!decode[pos].valid);
            decode[pos].valid = true;
            decode[pos].index = index;
            self.fetch2_regs[pos].valid = false;

            if pay.get(index).branch {
                let (tag, phase) = self.bq.push();
                pay.get_mut(index).pred_tag = PredTag::new(tag, phase);

                let taken = pay.get(index).next_pc != increment_pc(pay.get(index).pc);
                let kind = pay.get(index).branch_kind;
                let next_pc = pay.get(index).next_pc;
                let entry = self.bq.entry_mut(tag);
                entry.kind = kind;
                entry.precise_cb_bhr = my_cb_bhr;
                entry.precise_ib_bhr = my_ib_bhr;
                entry.precise_ras_tos = self.status.ras_tos;
                entry.fetch_pc = self.status.pc;
                entry.fetch_cb_bhr = self.status.cb_bhr;
                entry.fetch_ib_bhr = self.status.ib_bhr;
                entry.fetch_cb_pos = 0;
                entry.misp = false;
                entry.taken = taken;
                entry.next_pc = next_pc;

                if kind == BranchKind::Conditional {
                    self.bq.entry_mut(tag).fetch_cb_pos = cb_pos_in_entry;
                    cb_pos_in_entry += 1;
                    // Reconstruct the precise BHRs locally; the predictors'
                    // own BHRs were already updated in Fetch1.
                    my_cb_bhr = self.cb_index.update_my_bhr(my_cb_bhr, taken);
                    my_ib_bhr = self.ib_index.update_my_bhr(my_ib_bhr, taken);
                }
            }
            pos += 1;
        }

        self.status.valid = false;
        true
    }

    /// Recover from a mispredicted branch resolved at Writeback.
    ///
    /// Rolls the branch queue back to the branch (re-pushing it with the
    /// corrected outcome), restores the precise BHRs and RAS TOS, redirects
    /// the PC, reactivates fetch, and squashes the Fetch2 bundle.
    pub fn mispredict(&mut self, pred_tag: PredTag, taken: bool, next_pc: u64) {
        let tag = pred_tag.tag();
        let phase = pred_tag.phase();

        self.bq.rollback(tag, phase, true);
        let (new_tag, new_phase) = self.bq.push();
        assert!(new_tag == tag && new_phase == phase);

        {
            let entry = self.bq.entry_mut(tag);
            assert!(entry.next_pc != next_pc);
            entry.next_pc = next_pc;
            if entry.kind == BranchKind::Conditional {
                assert!(entry.taken != taken);
            }
            entry.taken = taken;
            entry.misp = true;
        }

        let entry = self.bq.entry(tag).clone();
        self.cb_index.set_bhr(entry.precise_cb_bhr);
        self.ib_index.set_bhr(entry.precise_ib_bhr);
        self.ras.set_tos(entry.precise_ras_tos);
        // Fold the corrected outcome into the restored histories.
        if entry.kind == BranchKind::Conditional {
            self.cb_index.update_bhr(taken);
            self.ib_index.update_bhr(taken);
        }

        self.pc = next_pc;
        self.fetch_active = true;
        self.squash_fetch2();
    }

    /// Commit the branch at the head of the branch queue, training the
    /// predictor that supplied its prediction using its fetch-time context.
    pub fn commit_branch(&mut self, stats: &mut SimStats) {
        let (tag, _phase) = self.bq.pop();
        let entry = self.bq.entry(tag).clone();
        let b = &mut stats.branches;
        match entry.kind {
            BranchKind::Conditional => {
                // Re-reference the same packed-counter entry the prediction
                // came from, and update just this branch's 2-bit counter.
                let idx = self.cb_index.index_with(entry.fetch_pc, entry.fetch_cb_bhr) as usize;
                let ctr = bump_counter(packed_counter(self.cb[idx], entry.fetch_cb_pos), entry.taken);
                self.cb[idx] = set_packed_counter(self.cb[idx], entry.fetch_cb_pos, ctr);
                b.branch_n += 1;
                if entry.misp {
                    b.branch_m += 1;
                }
            }
            BranchKind::JumpDirect => {
                b.jumpdir_n += 1;
                assert!(!entry.misp);
            }
            BranchKind::CallDirect => {
                b.calldir_n += 1;
                assert!(!entry.misp);
            }
            BranchKind::JumpIndirect | BranchKind::CallIndirect => {
                let idx = self.ib_index.index_with(entry.fetch_pc, entry.fetch_ib_bhr) as usize;
                self.ib[idx] = entry.next_pc;
                if entry.kind == BranchKind::JumpIndirect {
                    b.jumpind_n += 1;
                    if entry.misp {
                        b.jumpind_m += 1;
                    }
                    // An indirect jump to the next sequential PC happens for
                    // the first arm of a switch statement.
                    if !entry.taken {
                        b.jumpind_seq += 1;
                    }
                } else {
                    b.callind_n += 1;
                    if entry.misp {
                        b.callind_m += 1;
                    }
                }
            }
            BranchKind::Return => {
                b.jumpret_n += 1;
                if entry.misp {
                    b.jumpret_m += 1;
                }
            }
        }
    }

    /// Complete squash: empty the branch queue, restore the head entry's
    /// precise context, redirect fetch, and discard pending I-cache misses.
    pub fn flush(&mut self, pc: u64) {
        let head = self.bq.flush();
        let entry = self.bq.entry(head).clone();
        self.cb_index.set_bhr(entry.precise_cb_bhr);
        self.ib_index.set_bhr(entry.precise_ib_bhr);
        self.ras.set_tos(entry.precise_ras_tos);
        self.pc = pc;
        self.fetch_active = true;
        self.squash_fetch2();
        self.ic_miss = false;
    }
}
