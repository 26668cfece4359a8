//! Checkpoint-based register renamer.
//!
//! The renamer is the recovery substrate of the core. At any moment the head
//! checkpoint reflects the architectural state; every later checkpoint is a
//! speculative snapshot that can be rolled back to. Physical registers are
//! reference-counted: a register returns to the free list exactly when it is
//! unmapped and its use count reaches zero, and it is never returned twice.
//!
//! Use-count discipline:
//! - `rename_rsrc` increments (consumer); the count drops when the consumer
//!   reads the register or when the consuming context is squashed.
//! - `rename_rdst` increments (a destination is its own consumer until its
//!   value is written back).
//! - `checkpoint` increments every register named by the snapshot; rollback
//!   and commit release those holds as snapshots die or retire.

use crate::common::NUM_LOG_REGS;

#[derive(Debug, Clone)]
struct PrfEntry {
    value: u64,
    unmapped: bool,
    usage: u64,
}

/// One checkpoint: RMT and unmapped-bit snapshots plus per-class counters.
#[derive(Debug, Clone)]
struct Checkpoint {
    rmt: Vec<usize>,
    unmapped: Vec<bool>,
    uncompleted: u64,
    loads: u64,
    stores: u64,
    branches: u64,
    amo: bool,
    csr: bool,
    exception: bool,
}

impl Checkpoint {
    fn clear_counters(&mut self) {
        self.uncompleted = 0;
        self.loads = 0;
        self.stores = 0;
        self.branches = 0;
        self.amo = false;
        self.csr = false;
        self.exception = false;
    }
}

/// Counters and flags reported by [`Renamer::precommit`] for the oldest
/// checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecommitInfo {
    /// The committing checkpoint's id.
    pub chkpt_id: u64,
    /// Loads enclosed by the checkpoint.
    pub loads: u64,
    /// Stores enclosed by the checkpoint.
    pub stores: u64,
    /// Branches enclosed by the checkpoint.
    pub branches: u64,
    /// Checkpoint encloses an atomic memory operation.
    pub amo: bool,
    /// Checkpoint encloses a system instruction.
    pub csr: bool,
    /// An exception was posted within the checkpoint.
    pub exception: bool,
}

/// Totals returned by [`Renamer::rollback`] for the still-live checkpoints,
/// used to restore the LSU tails and prune the branch queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackInfo {
    /// Squashed checkpoint ids as a bitmask.
    pub squash_mask: u64,
    /// Loads in checkpoints between head and the restore point.
    pub loads: u64,
    /// Stores in checkpoints between head and the restore point.
    pub stores: u64,
    /// Branches in checkpoints between head and the restore point.
    pub branches: u64,
}

/// The renamer: RMT, free list, PRF with use counts, ready bits, and the
/// checkpoint buffer.
#[derive(Debug)]
pub struct Renamer {
    rmt: Vec<usize>,
    prf: Vec<PrfEntry>,
    ready: Vec<bool>,

    free_list: Vec<usize>,
    fl_head: usize,
    fl_tail: usize,
    fl_head_phase: bool,
    fl_tail_phase: bool,

    checkpoints: Vec<Checkpoint>,
    cb_head: usize,
    cb_tail: usize,
    cb_head_phase: bool,
    cb_tail_phase: bool,

    /// Rename bundles force a checkpoint after this many instructions.
    pub max_instr_between_checkpoints: u64,
}

impl Renamer {
    /// Construct with `n_phys` physical registers, `n_checkpoints`
    /// checkpoints (1..=64 so the squash mask fits one word), and the active
    /// window size `n_active`.
    ///
    /// Initially the pipeline is empty: the logical registers map to the
    /// first `NUM_LOG_REGS` physical registers, all of which the head
    /// checkpoint holds; the rest fill the free list.
    pub fn new(n_phys: usize, n_checkpoints: u64, n_active: u64) -> Self {
        let n_log = NUM_LOG_REGS;
        assert!(n_phys > n_log);
        assert!((1..=64).contains(&n_checkpoints));
        assert!(n_active > 0);
        let n_checkpoints = n_checkpoints as usize;

        let rmt: Vec<usize> = (0..n_log).collect();
        let mut prf = Vec::with_capacity(n_phys);
        for _ in 0..n_log {
            // Held by the initial head checkpoint.
            prf.push(PrfEntry { value: 0, unmapped: false, usage: 1 });
        }
        for _ in n_log..n_phys {
            prf.push(PrfEntry { value: 0, unmapped: true, usage: 0 });
        }
        let ready: Vec<bool> = (0..n_phys).map(|p| p < n_log).collect();

        let free_list: Vec<usize> = (n_log..n_phys).collect();

        let initial = Checkpoint {
            rmt: rmt.clone(),
            unmapped: prf.iter().map(|e| e.unmapped).collect(),
            uncompleted: 0,
            loads: 0,
            stores: 0,
            branches: 0,
            amo: false,
            csr: false,
            exception: false,
        };
        let mut checkpoints = vec![initial.clone(); n_checkpoints];
        for c in checkpoints.iter_mut().skip(1) {
            c.rmt.fill(0);
            c.unmapped.fill(true);
        }

        Self {
            rmt,
            prf,
            ready,
            free_list,
            fl_head: 0,
            fl_tail: 0,
            // The free list starts full.
            fl_head_phase: true,
            fl_tail_phase: false,
            checkpoints,
            cb_head: 0,
            cb_tail: 1 % n_checkpoints,
            cb_head_phase: false,
            cb_tail_phase: n_checkpoints == 1,
            max_instr_between_checkpoints: n_active / n_checkpoints as u64,
        }
    }

    fn fl_size(&self) -> usize {
        self.free_list.len()
    }

    fn free_regs(&self) -> usize {
        if self.fl_head == self.fl_tail {
            if self.fl_head_phase == self.fl_tail_phase { 0 } else { self.fl_size() }
        } else if self.fl_head_phase == self.fl_tail_phase {
            self.fl_tail - self.fl_head
        } else {
            self.fl_size() - (self.fl_head - self.fl_tail)
        }
    }

    fn checkpoints_in_use(&self) -> usize {
        let n = self.checkpoints.len();
        if self.cb_head_phase == self.cb_tail_phase {
            self.cb_tail - self.cb_head
        } else {
            n - (self.cb_head - self.cb_tail)
        }
    }

    /// True iff fewer than `bundle_dst` physical registers are free.
    pub fn stall_reg(&self, bundle_dst: u64) -> bool {
        (self.free_regs() as u64) < bundle_dst
    }

    /// True iff fewer than `bundle_chkpts` checkpoints are free.
    pub fn stall_checkpoint(&self, bundle_chkpts: u64) -> bool {
        let free = self.checkpoints.len() - self.checkpoints_in_use();
        (free as u64) < bundle_chkpts
    }

    /// Rename one source register; the consumer holds a reference until it
    /// reads the value or is squashed.
    pub fn rename_rsrc(&mut self, log_reg: usize) -> usize {
        let pr = self.rmt[log_reg];
        self.inc_usage(pr);
        pr
    }

    /// Rename one destination register: allocate from the free list, clear
    /// its ready bit, unmap the previous mapping, and install the new one.
    ///
    /// # Panics
    /// Panics if the free list is empty; callers check `stall_reg` first.
    pub fn rename_rdst(&mut self, log_reg: usize) -> usize {
        assert!(
            self.fl_head != self.fl_tail || self.fl_head_phase != self.fl_tail_phase,
            "rename from an empty free list"
        );
        let pr = self.free_list[self.fl_head];
        self.fl_head += 1;
        if self.fl_head == self.fl_size() {
            self.fl_head = 0;
            self.fl_head_phase = !self.fl_head_phase;
        }
        self.ready[pr] = false;
        self.unmap(self.rmt[log_reg]);
        self.rmt[log_reg] = pr;
        self.map(pr);
        self.inc_usage(pr);
        pr
    }

    /// Clear a register's unmapped bit (it is named by the RMT again).
    pub fn map(&mut self, pr: usize) {
        self.prf[pr].unmapped = false;
    }

    /// Set a register's unmapped bit; frees it if no references remain.
    pub fn unmap(&mut self, pr: usize) {
        if !self.prf[pr].unmapped {
            self.prf[pr].unmapped = true;
            if self.prf[pr].usage == 0 {
                self.push_free(pr);
            }
        }
    }

    fn push_free(&mut self, pr: usize) {
        self.free_list[self.fl_tail] = pr;
        self.fl_tail += 1;
        if self.fl_tail == self.fl_size() {
            self.fl_tail = 0;
            self.fl_tail_phase = !self.fl_tail_phase;
        }
    }

    /// Take a reference to a physical register.
    pub fn inc_usage(&mut self, pr: usize) {
        self.prf[pr].usage += 1;
    }

    /// Release a reference; the register is freed when it is unmapped and
    /// the count reaches zero.
    ///
    /// # Panics
    /// Panics on a release without a matching reference (double free).
    pub fn dec_usage(&mut self, pr: usize) {
        assert!(self.prf[pr].usage > 0, "physical register use-count underflow");
        self.prf[pr].usage -= 1;
        if self.prf[pr].usage == 0 && self.prf[pr].unmapped {
            self.push_free(pr);
        }
    }

    /// Snapshot the RMT and unmapped bits into the tail checkpoint; the
    /// snapshot takes a reference on every register it names.
    ///
    /// # Panics
    /// Panics if no checkpoint is free; callers check `stall_checkpoint`.
    pub fn checkpoint(&mut self) {
        assert!(!self.stall_checkpoint(1));
        let tail = self.cb_tail;
        for l in 0..NUM_LOG_REGS {
            self.checkpoints[tail].rmt[l] = self.rmt[l];
        }
        for p in 0..self.prf.len() {
            self.checkpoints[tail].unmapped[p] = self.prf[p].unmapped;
        }
        for l in 0..NUM_LOG_REGS {
            let pr = self.checkpoints[tail].rmt[l];
            self.inc_usage(pr);
        }
        self.checkpoints[tail].clear_counters();
        self.cb_tail += 1;
        if self.cb_tail == self.checkpoints.len() {
            self.cb_tail = 0;
            self.cb_tail_phase = !self.cb_tail_phase;
        }
    }

    /// Return the current (tail-1) checkpoint id and charge the instruction
    /// to it: bump the per-class counters, set the serialization flags, and
    /// count it as uncompleted.
    pub fn assign_checkpoint(
        &mut self,
        load: bool,
        store: bool,
        branch: bool,
        amo: bool,
        csr: bool,
    ) -> u64 {
        let id = if self.cb_tail > 0 { self.cb_tail - 1 } else { self.checkpoints.len() - 1 };
        let c = &mut self.checkpoints[id];
        if load {
            c.loads += 1;
        }
        if store {
            c.stores += 1;
        }
        if branch {
            c.branches += 1;
        }
        if amo {
            c.amo = true;
        }
        if csr {
            c.csr = true;
        }
        c.uncompleted += 1;
        id as u64
    }

    /// Test a register's ready bit.
    pub fn is_ready(&self, pr: usize) -> bool {
        self.ready[pr]
    }

    /// Clear a register's ready bit.
    pub fn clear_ready(&mut self, pr: usize) {
        self.ready[pr] = false;
    }

    /// Set a register's ready bit.
    pub fn set_ready(&mut self, pr: usize) {
        self.ready[pr] = true;
    }

    /// Read a register, releasing the reader's reference.
    pub fn read(&mut self, pr: usize) -> u64 {
        self.dec_usage(pr);
        self.prf[pr].value
    }

    /// Peek at a register's value without touching its use count.
    pub fn peek(&self, pr: usize) -> u64 {
        self.prf[pr].value
    }

    /// Write a register, releasing the producer's destination hold.
    pub fn write(&mut self, pr: usize, value: u64) {
        self.dec_usage(pr);
        self.prf[pr].value = value;
    }

    /// An instruction of checkpoint `chkpt_id` completed.
    pub fn set_complete(&mut self, chkpt_id: u64) {
        let c = &mut self.checkpoints[chkpt_id as usize];
        assert!(c.uncompleted > 0);
        c.uncompleted -= 1;
    }

    /// Post an exception to a checkpoint.
    pub fn set_exception(&mut self, chkpt_id: u64) {
        self.checkpoints[chkpt_id as usize].exception = true;
    }

    /// Query a checkpoint's exception flag.
    pub fn get_exception(&self, chkpt_id: u64) -> bool {
        self.checkpoints[chkpt_id as usize].exception
    }

    /// Committed value of a logical register (head-checkpoint mapping).
    pub fn committed_value(&self, log_reg: usize) -> u64 {
        self.prf[self.checkpoints[self.cb_head].rmt[log_reg]].value
    }

    /// Overwrite the committed value of a logical register (fast-skip state
    /// injection into an otherwise empty pipeline).
    pub fn set_committed_value(&mut self, log_reg: usize, value: u64) {
        let pr = self.checkpoints[self.cb_head].rmt[log_reg];
        self.prf[pr].value = value;
    }

    /// Roll back to checkpoint `chkpt_id` (or the one after, with `next`).
    ///
    /// Restores the RMT and unmapped bits from the restore point, releases
    /// the snapshot references of every later checkpoint, zeroes the restore
    /// point's counters, resets the tail, and reports the squashed-checkpoint
    /// mask plus the live-interval load/store/branch totals.
    pub fn rollback(&mut self, chkpt_id: u64, next: bool) -> RollbackInfo {
        let n = self.checkpoints.len();
        let id = if next { (chkpt_id as usize + 1) % n } else { chkpt_id as usize };

        // The restore point must lie within [head, tail).
        if self.cb_head_phase == self.cb_tail_phase {
            assert!(id >= self.cb_head && id < self.cb_tail);
        } else {
            assert!(!(id >= self.cb_tail && id < self.cb_head));
        }

        for l in 0..NUM_LOG_REGS {
            self.rmt[l] = self.checkpoints[id].rmt[l];
        }
        for p in 0..self.prf.len() {
            if self.checkpoints[id].unmapped[p] {
                self.unmap(p);
            } else {
                self.map(p);
            }
        }

        let mut info = RollbackInfo::default();
        let mut idx = id;
        while idx != self.cb_tail {
            info.squash_mask |= 1 << idx;
            idx = (idx + 1) % n;
        }

        // Later snapshots die: release their references.
        let mut idx = (id + 1) % n;
        while idx != self.cb_tail {
            for l in 0..NUM_LOG_REGS {
                let pr = self.checkpoints[idx].rmt[l];
                assert!(self.prf[pr].usage > 0);
                self.dec_usage(pr);
            }
            idx = (idx + 1) % n;
        }

        self.checkpoints[id].clear_counters();

        let mut idx = self.cb_head;
        while idx != id {
            info.loads += self.checkpoints[idx].loads;
            info.stores += self.checkpoints[idx].stores;
            info.branches += self.checkpoints[idx].branches;
            idx = (idx + 1) % n;
        }

        self.cb_tail = (id + 1) % n;
        self.cb_tail_phase = if self.cb_head >= self.cb_tail {
            !self.cb_head_phase
        } else {
            self.cb_head_phase
        };
        info
    }

    /// Report the oldest checkpoint if it is ready to commit: more than one
    /// checkpoint in use (or an exception pending) and no uncompleted
    /// instructions.
    pub fn precommit(&self) -> Option<PrecommitInfo> {
        let in_use = self.checkpoints_in_use();
        let head = &self.checkpoints[self.cb_head];
        ((in_use > 1 || head.exception) && head.uncompleted == 0).then(|| PrecommitInfo {
            chkpt_id: self.cb_head as u64,
            loads: head.loads,
            stores: head.stores,
            branches: head.branches,
            amo: head.amo,
            csr: head.csr,
            exception: head.exception,
        })
    }

    /// Commit one logical register of the head checkpoint: release the
    /// snapshot's reference and unmap the register unless a live RMT entry
    /// still names it.
    pub fn commit(&mut self, log_reg: usize) {
        assert!(self.checkpoints_in_use() > 1);
        assert!(self.checkpoints[self.cb_head].uncompleted == 0);

        let pr = self.checkpoints[self.cb_head].rmt[log_reg];
        assert!(self.prf[pr].usage > 0);
        self.prf[pr].unmapped = !self.rmt.iter().any(|&m| m == pr);
        self.dec_usage(pr);
    }

    /// Retire the head checkpoint (after its registers committed).
    pub fn free_checkpoint(&mut self) {
        self.cb_head += 1;
        if self.cb_head == self.checkpoints.len() {
            self.cb_head = 0;
            self.cb_head_phase = !self.cb_head_phase;
        }
    }

    /// Squash all speculative state back to the head checkpoint.
    pub fn squash(&mut self) {
        let n = self.checkpoints.len();
        for p in 0..self.prf.len() {
            if self.checkpoints[self.cb_head].unmapped[p] {
                self.unmap(p);
            } else {
                self.map(p);
            }
        }
        for l in 0..NUM_LOG_REGS {
            self.rmt[l] = self.checkpoints[self.cb_head].rmt[l];
        }

        let in_use = self.checkpoints_in_use();
        for k in 1..in_use {
            let idx = (self.cb_head + k) % n;
            for l in 0..NUM_LOG_REGS {
                let pr = self.checkpoints[idx].rmt[l];
                self.dec_usage(pr);
            }
        }

        self.checkpoints[self.cb_head].clear_counters();
        self.cb_tail_phase = self.cb_head_phase;
        self.cb_tail = self.cb_head + 1;
        if self.cb_tail == n {
            self.cb_tail = 0;
            self.cb_tail_phase = !self.cb_tail_phase;
        }
    }

    /// Number of physical registers (test support).
    pub fn prf_size(&self) -> usize {
        self.prf.len()
    }

    /// A register's current use count (test support).
    pub fn usage_of(&self, pr: usize) -> u64 {
        self.prf[pr].usage
    }

    /// A register's unmapped bit (test support).
    pub fn is_unmapped(&self, pr: usize) -> bool {
        self.prf[pr].unmapped
    }

    /// Number of free physical registers (test support).
    pub fn free_count(&self) -> usize {
        self.free_regs()
    }

    /// Current RMT mapping of a logical register (test support).
    pub fn mapping(&self, log_reg: usize) -> usize {
        self.rmt[log_reg]
    }

    /// Checkpoints currently in use (test support).
    pub fn live_checkpoints(&self) -> usize {
        self.checkpoints_in_use()
    }

    /// Load/store/branch counters of a checkpoint (test support).
    pub fn checkpoint_counters(&self, chkpt_id: u64) -> (u64, u64, u64, u64) {
        let c = &self.checkpoints[chkpt_id as usize];
        (c.uncompleted, c.loads, c.stores, c.branches)
    }
}
