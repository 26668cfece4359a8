//! Load/store unit.
//!
//! Two age-ordered ring queues (LQ and SQ) with head/tail phase bits.
//! Loads disambiguate against older stores at execute: unknown store
//! addresses stall the load only when the memory-dependence predictor says a
//! conflict is likely; matching addresses forward when sizes match and the
//! value is ready. Store-address arrival scans younger loads for ordering
//! violations, which fire a recovery at retirement. Stores replay to memory
//! at commit; LR/SC use a per-hart reservation.

use std::collections::HashMap;

use crate::common::{Cycle, Trap};
use crate::config::{DisambigConfig, DisambigModel};
use crate::core::cache::{CacheHierarchy, CacheModel};
use crate::core::payload::PayloadBuffer;
use crate::core::renamer::Renamer;
use crate::mem::Memory;
use crate::ref_model::{ArchState, RefModel};
use crate::stats::SimStats;

/// One LQ or SQ entry.
#[derive(Debug, Clone, Default)]
pub struct LsqEntry {
    /// Slot occupied.
    pub valid: bool,
    /// Loaded value is sign-extended.
    pub is_signed: bool,
    /// Access size in bytes.
    pub size: usize,
    /// LR/SC flag.
    pub amo: bool,
    /// Address computed.
    pub addr_avail: bool,
    /// The address.
    pub addr: u64,
    /// Value available (loads: loaded/forwarded; stores: data arrived).
    pub value_avail: bool,
    /// The value.
    pub value: u64,
    /// The access missed the data cache.
    pub missed: bool,
    /// Cycle at which the miss resolves; `None` while no MHSR was free.
    pub miss_resolve: Option<Cycle>,
    /// Payload index of the instruction.
    pub pay_index: usize,
    /// Loads: SQ tail at dispatch (the disambiguation window's end).
    pub sq_index: u64,
    /// Phase bit accompanying `sq_index`.
    pub sq_phase: bool,
    /// Dispatch-time prediction: stall on unknown older store addresses.
    pub mdp_stall: bool,

    // Per-load statistics, consumed when the load retires (MDP training).
    stat_stall_disambig: bool,
    stat_stall_addr_unknown: bool,
    stat_stall_miss: bool,
    stat_forward: bool,
    stat_load_violation: bool,
    stat_late_store_match: bool,
    stat_partial_cheat: bool,
}

/// The load/store unit.
#[derive(Debug)]
pub struct Lsu {
    lq: Vec<LsqEntry>,
    lq_size: u64,
    lq_head: u64,
    lq_tail: u64,
    lq_head_phase: bool,
    lq_tail_phase: bool,
    lq_length: u64,

    sq: Vec<LsqEntry>,
    sq_size: u64,
    sq_head: u64,
    sq_tail: u64,
    sq_head_phase: bool,
    sq_tail_phase: bool,
    sq_length: u64,

    /// L1 data cache timing model.
    pub dc: CacheModel,
    dc_perfect: bool,

    /// PC-indexed memory-dependence predictor counters.
    mdp: HashMap<u64, u64>,
    model: DisambigModel,
    mdp_max: u64,
}

/// Outcome of the per-load disambiguation walk.
struct Disambig {
    stall: bool,
    forward: bool,
    partial: bool,
    store_entry: u64,
}

impl Lsu {
    /// Build the LSU.
    pub fn new(
        lq_size: u64,
        sq_size: u64,
        disambig: DisambigConfig,
        dc_perfect: bool,
        dc_cfg: &crate::config::CacheLevelConfig,
    ) -> Self {
        Self {
            lq: vec![LsqEntry::default(); lq_size as usize],
            lq_size,
            lq_head: 0,
            lq_tail: 0,
            lq_head_phase: false,
            lq_tail_phase: false,
            lq_length: 0,
            sq: vec![LsqEntry::default(); sq_size as usize],
            sq_size,
            sq_head: 0,
            sq_tail: 0,
            sq_head_phase: false,
            sq_tail_phase: false,
            sq_length: 0,
            dc: CacheModel::new(dc_cfg),
            dc_perfect,
            mdp: HashMap::new(),
            model: disambig.model,
            mdp_max: if disambig.model == DisambigModel::MdpSticky { 1 } else { disambig.mdp_max },
        }
    }

    const fn spec_disambig(&self) -> bool {
        !matches!(self.model, DisambigModel::AlwaysConflict)
    }

    const fn mem_dep_pred(&self) -> bool {
        matches!(self.model, DisambigModel::MdpSticky | DisambigModel::MdpCounter)
    }

    /// True iff the queues cannot accept the bundle.
    pub const fn stall(&self, bundle_loads: u64, bundle_stores: u64) -> bool {
        self.lq_length + bundle_loads > self.lq_size || self.sq_length + bundle_stores > self.sq_size
    }

    /// Current queue tails, recorded by every dispatched instruction for
    /// mispredict restoration.
    pub const fn tails(&self) -> (u64, bool, u64, bool) {
        (self.lq_tail, self.lq_tail_phase, self.sq_tail, self.sq_tail_phase)
    }

    /// Allocate an LQ or SQ entry for a load or store.
    ///
    /// Returns `(lq_index, lq_phase, sq_index, sq_phase)`: the load's own LQ
    /// slot plus the SQ tail bounding its disambiguation window, or the
    /// store's own SQ slot plus the LQ tail where its violation scan starts.
    pub fn dispatch(
        &mut self,
        load: bool,
        size: usize,
        is_signed: bool,
        amo: bool,
        pay_index: usize,
        load_pc: u64,
    ) -> (u64, bool, u64, bool) {
        let (lq_index, lq_phase) = (self.lq_tail, self.lq_tail_phase);
        let (sq_index, sq_phase) = (self.sq_tail, self.sq_tail_phase);
        if load {
            assert!(self.lq_length < self.lq_size, "load queue overflow");
            let mdp_stall = match self.model {
                DisambigModel::AlwaysConflict => true,
                DisambigModel::NeverConflict | DisambigModel::Oracle => false,
                DisambigModel::MdpSticky | DisambigModel::MdpCounter => {
                    self.mdp.get(&load_pc).copied().unwrap_or(0) > 0
                }
            };
            self.lq[lq_index as usize] = LsqEntry {
                valid: true,
                is_signed,
                size,
                amo,
                pay_index,
                sq_index,
                sq_phase,
                mdp_stall,
                ..LsqEntry::default()
            };
            self.lq_tail = (self.lq_tail + 1) % self.lq_size;
            self.lq_length += 1;
            if self.lq_tail == 0 {
                self.lq_tail_phase = !self.lq_tail_phase;
            }
        } else {
            assert!(self.sq_length < self.sq_size, "store queue overflow");
            self.sq[sq_index as usize] = LsqEntry {
                valid: true,
                is_signed,
                size,
                amo,
                pay_index,
                ..LsqEntry::default()
            };
            self.sq_tail = (self.sq_tail + 1) % self.sq_size;
            self.sq_length += 1;
            if self.sq_tail == 0 {
                self.sq_tail_phase = !self.sq_tail_phase;
            }
        }
        (lq_index, lq_phase, sq_index, sq_phase)
    }

    /// Record a store address known at dispatch (oracle disambiguation).
    pub fn preset_store_addr(&mut self, sq_index: u64, addr: u64) {
        let e = &mut self.sq[sq_index as usize];
        e.addr_avail = true;
        e.addr = addr;
    }

    /// Store-address arrival: translate (posting any trap), scan younger
    /// loads for ordering violations, and access the data cache.
    pub fn store_addr(
        &mut self,
        cycle: Cycle,
        addr: u64,
        sq_index: u64,
        lq_index: u64,
        lq_phase: bool,
        pay: &mut PayloadBuffer,
        ren: &mut Renamer,
        mem: &Memory,
        hier: &mut CacheHierarchy,
    ) {
        assert!(self.sq[sq_index as usize].valid);

        // With oracle disambiguation the address was recorded at dispatch;
        // a wrong-path address generation may legitimately disagree with it.
        if self.sq[sq_index as usize].addr_avail {
            return;
        }
        self.sq[sq_index as usize].addr_avail = true;
        self.sq[sq_index as usize].addr = addr;

        let size = self.sq[sq_index as usize].size;
        if let Err(trap) = mem.translate_store(addr, size) {
            let pay_index = self.sq[sq_index as usize].pay_index;
            let chkpt = pay.get(pay_index).chkpt_id;
            assert!(trap.is_mem());
            ren.set_exception(chkpt);
            pay.get_mut(pay_index).trap.post(trap);
            return;
        }

        if self.spec_disambig() {
            self.scan_load_violations(sq_index, lq_index, lq_phase);
        }

        if !self.dc_perfect {
            let resolve = self.dc.access(cycle, addr, true, |_| hier.access(cycle, addr, true));
            self.sq[sq_index as usize].miss_resolve = resolve;
            self.sq[sq_index as usize].missed =
                resolve.is_none_or(|r| r > cycle + self.dc.hit_latency());
        }
    }

    /// Scan the LQ from the first load after the store to the tail.
    ///
    /// A completed load with a matching address is a violation. A ready but
    /// not-yet-completed match is recorded as a late-store match, training
    /// the predictor toward "conflict".
    fn scan_load_violations(&mut self, sq_index: u64, lq_index: u64, lq_phase: bool) {
        let mut entry = lq_index;
        let mut phase = lq_phase;
        while !(entry == self.lq_tail && phase == self.lq_tail_phase) {
            let max_size = self.sq[sq_index as usize].size.max(self.lq[entry as usize].size) as u64;
            let mask = !(max_size - 1);
            let load = &mut self.lq[entry as usize];
            let matches = load.addr_avail && (self.sq[sq_index as usize].addr & mask) == (load.addr & mask);
            if matches && load.value_avail {
                load.stat_load_violation = true;
                return;
            }
            if matches {
                load.stat_late_store_match = true;
            }
            entry = (entry + 1) % self.lq_size;
            if entry == 0 {
                phase = !phase;
            }
        }
    }

    /// Store-data arrival.
    pub fn store_value(&mut self, sq_index: u64, value: u64) {
        assert!(self.sq[sq_index as usize].valid);
        self.sq[sq_index as usize].value_avail = true;
        self.sq[sq_index as usize].value = value;
    }

    /// Load-address arrival: record the address, access the data cache, and
    /// run the load execution datapath. Returns the value if it is available
    /// this cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn load_addr(
        &mut self,
        cycle: Cycle,
        addr: u64,
        lq_index: u64,
        lq_phase: bool,
        sq_index: u64,
        sq_phase: bool,
        pay: &mut PayloadBuffer,
        ren: &mut Renamer,
        mem: &Memory,
        hier: &mut CacheHierarchy,
        oracle: &RefModel,
        state: &mut ArchState,
    ) -> Option<u64> {
        assert!(self.lq[lq_index as usize].valid);
        self.lq[lq_index as usize].addr_avail = true;
        self.lq[lq_index as usize].addr = addr;

        if !self.dc_perfect {
            let resolve = self.dc.access(cycle, addr, false, |_| hier.access(cycle, addr, false));
            self.lq[lq_index as usize].miss_resolve = resolve;
            self.lq[lq_index as usize].missed =
                resolve.is_none_or(|r| r > cycle + self.dc.hit_latency());
        }

        self.execute_load(cycle, lq_index, lq_phase, sq_index, sq_phase, pay, ren, mem, oracle, state);
        let e = &self.lq[lq_index as usize];
        e.value_avail.then_some(e.value)
    }

    /// Retry stalled loads: scan the LQ for an address-ready load without a
    /// value and re-run its datapath. Returns the first load that completes.
    #[allow(clippy::too_many_arguments)]
    pub fn load_unstall(
        &mut self,
        cycle: Cycle,
        pay: &mut PayloadBuffer,
        ren: &mut Renamer,
        mem: &Memory,
        hier: &mut CacheHierarchy,
        oracle: &RefModel,
        state: &mut ArchState,
    ) -> Option<(usize, u64)> {
        let mut scan = self.lq_head;
        let mut phase = self.lq_head_phase;
        while !(scan == self.lq_tail && phase == self.lq_tail_phase) {
            assert!(self.lq[scan as usize].valid);
            if self.lq[scan as usize].addr_avail && !self.lq[scan as usize].value_avail {
                // If the initial execution could not get an MHSR, retry the
                // data cache.
                if !self.dc_perfect && self.lq[scan as usize].miss_resolve.is_none() {
                    let addr = self.lq[scan as usize].addr;
                    let resolve = self.dc.access(cycle, addr, false, |_| hier.access(cycle, addr, false));
                    self.lq[scan as usize].miss_resolve = resolve;
                    self.lq[scan as usize].missed =
                        resolve.is_none_or(|r| r > cycle + self.dc.hit_latency());
                }
                let (sq_index, sq_phase) = (self.lq[scan as usize].sq_index, self.lq[scan as usize].sq_phase);
                self.execute_load(cycle, scan, phase, sq_index, sq_phase, pay, ren, mem, oracle, state);
                if self.lq[scan as usize].value_avail {
                    return Some((self.lq[scan as usize].pay_index, self.lq[scan as usize].value));
                }
            }
            scan = (scan + 1) % self.lq_size;
            if scan == 0 {
                phase = !phase;
            }
        }
        None
    }

    /// Walk older stores for a conflict, at most one full lap backwards from
    /// the load's dispatch-recorded SQ predecessor.
    fn disambiguate(&mut self, lq_index: u64, sq_index: u64, sq_phase: bool) -> Disambig {
        let mut out = Disambig { stall: false, forward: false, partial: false, store_entry: 0 };
        if sq_index == self.sq_head && sq_phase == self.sq_head_phase {
            // The load is logically at the SQ head: no prior stores.
            return out;
        }
        assert!(self.sq_length > 0);

        let mut store_entry = sq_index;
        loop {
            store_entry = (store_entry + self.sq_size - 1) % self.sq_size;
            let max_size = self.sq[store_entry as usize].size.max(self.lq[lq_index as usize].size) as u64;
            let mask = !(max_size - 1);

            if !self.sq[store_entry as usize].addr_avail {
                // Unknown store address: stall only if predicted to conflict.
                out.stall = self.lq[lq_index as usize].mdp_stall;
                if out.stall {
                    self.lq[lq_index as usize].stat_stall_addr_unknown = true;
                }
            } else if (self.sq[store_entry as usize].addr & mask) == (self.lq[lq_index as usize].addr & mask) {
                if self.sq[store_entry as usize].size != self.lq[lq_index as usize].size {
                    // Partial overlap; handled by the caller.
                    out.forward = true;
                    out.partial = true;
                } else if !self.sq[store_entry as usize].value_avail {
                    out.stall = true;
                } else {
                    out.forward = true;
                    out.partial = false;
                }
            }
            if store_entry == self.sq_head || out.stall || out.forward {
                break;
            }
        }
        out.store_entry = store_entry;
        out
    }

    /// The load execution datapath: reservation handling, disambiguation,
    /// forwarding, and the memory access.
    #[allow(clippy::too_many_arguments)]
    fn execute_load(
        &mut self,
        cycle: Cycle,
        lq_index: u64,
        lq_phase: bool,
        sq_index: u64,
        sq_phase: bool,
        pay: &mut PayloadBuffer,
        ren: &mut Renamer,
        mem: &Memory,
        oracle: &RefModel,
        state: &mut ArchState,
    ) {
        assert!(self.lq[lq_index as usize].valid);
        assert!(self.lq[lq_index as usize].addr_avail);
        assert!(!self.lq[lq_index as usize].value_avail);

        if self.lq[lq_index as usize].amo {
            // Load-reserved: only at the LQ head may it set the reservation.
            if lq_index == self.lq_head && lq_phase == self.lq_head_phase {
                state.load_reservation = self.lq[lq_index as usize].addr;
            } else {
                return;
            }
        }

        let d = self.disambiguate(lq_index, sq_index, sq_phase);
        if d.stall {
            self.lq[lq_index as usize].stat_stall_disambig = true;
        } else if d.forward && d.partial {
            let load_chkpt = pay.get(self.lq[lq_index as usize].pay_index).chkpt_id;
            let store_chkpt = pay.get(self.sq[d.store_entry as usize].pay_index).chkpt_id;
            if load_chkpt == store_chkpt {
                // Conflicting store and load of different sizes within one
                // checkpoint interval: stalling would deadlock retirement,
                // so take the post-state value from the reference model and
                // count the occurrence.
                let load = &mut self.lq[lq_index as usize];
                load.value = pay
                    .get(load.pay_index)
                    .db_index
                    .and_then(|db| oracle.peek(db))
                    .and_then(|e| e.load_value)
                    .unwrap_or(0xDEAD_BEEF);
                load.value_avail = true;
                load.stat_partial_cheat = true;
            } else {
                // Different intervals: stall until the store retires.
                self.lq[lq_index as usize].stat_stall_disambig = true;
            }
        } else if d.forward {
            let value = self.sq[d.store_entry as usize].value;
            let load = &mut self.lq[lq_index as usize];
            load.stat_forward = true;
            let shift = 64 - 8 * load.size;
            load.value = if load.is_signed {
                (((value << shift) as i64) >> shift) as u64
            } else {
                (value << shift) >> shift
            };
            load.value_avail = true;
        } else if !(self.lq[lq_index as usize].missed
            && self.lq[lq_index as usize].miss_resolve.is_none_or(|r| cycle < r))
        {
            // Hit, or the missed line has arrived: read memory. Faults are
            // latched in the payload and fire at retirement.
            let load = &mut self.lq[lq_index as usize];
            match mem.load(load.addr, load.size, load.is_signed) {
                Ok(v) => {
                    load.value = v;
                    load.value_avail = true;
                }
                Err(trap) => {
                    assert!(trap.is_mem());
                    let pay_index = load.pay_index;
                    let chkpt = pay.get(pay_index).chkpt_id;
                    ren.set_exception(chkpt);
                    pay.get_mut(pay_index).trap.post(trap);
                    load.value_avail = true;
                }
            }
        } else {
            self.lq[lq_index as usize].stat_stall_miss = true;
        }
    }

    /// True if any of the first `num_loads` queue-head loads was flagged as
    /// an ordering violation (checked before bulk commit).
    pub fn pending_violation(&self, num_loads: u64) -> Option<u64> {
        let mut entry = self.lq_head;
        for _ in 0..num_loads.min(self.lq_length) {
            if self.lq[entry as usize].stat_load_violation {
                return Some(self.lq[entry as usize].pay_index as u64);
            }
            entry = (entry + 1) % self.lq_size;
        }
        None
    }

    /// Force the predictor toward "conflict" for a load PC (violation
    /// recovery trains before the interval replays).
    pub fn mdp_force_conflict(&mut self, load_pc: u64) {
        if self.mem_dep_pred() {
            self.mdp.insert(load_pc, self.mdp_max);
        }
    }

    /// Train the MDP from the head load's retirement-time statistics, and
    /// tally the LSU counters.
    pub fn train(&mut self, load: bool, pay: &PayloadBuffer, stats: &mut SimStats) {
        if load {
            assert!(self.lq_length > 0);
            let head = &self.lq[self.lq_head as usize];
            if self.spec_disambig() && self.mem_dep_pred() {
                let load_pc = pay.get(head.pay_index).pc;
                if head.stat_load_violation {
                    self.mdp.insert(load_pc, self.mdp_max);
                } else if self.model == DisambigModel::MdpCounter && head.stat_stall_addr_unknown {
                    if head.stat_late_store_match {
                        self.mdp.insert(load_pc, self.mdp_max);
                    } else if let Some(ctr) = self.mdp.get_mut(&load_pc) {
                        *ctr = ctr.saturating_sub(1);
                    }
                }
            }
            let l = &mut stats.lsu;
            l.loads += 1;
            if head.stat_stall_disambig {
                l.stall_disambig += 1;
                if head.stat_stall_addr_unknown {
                    if head.stat_late_store_match {
                        l.true_stall += 1;
                    } else {
                        l.false_stall += 1;
                    }
                }
            }
            if head.stat_load_violation {
                l.load_violation += 1;
            }
            if head.stat_forward {
                l.forward += 1;
            }
            if head.stat_stall_miss {
                l.stall_miss_load += 1;
            }
            if head.stat_partial_cheat {
                l.partial_forward_cheat += 1;
            }
        } else {
            assert!(self.sq_length > 0);
            stats.lsu.stores += 1;
        }
    }

    /// Commit the head load or store. Stores replay to memory now; a
    /// store-conditional whose reservation lapsed is suppressed.
    ///
    /// # Panics
    /// Panics if a store faults at commit: store exceptions were posted at
    /// address translation, which blocks commit.
    pub fn commit(&mut self, load: bool, atomic_op: bool, mem: &mut Memory, state: &mut ArchState) -> bool {
        let mut atomic_success = true;
        if load {
            assert!(self.lq_length > 0);
            self.lq[self.lq_head as usize].valid = false;
            self.lq_head = (self.lq_head + 1) % self.lq_size;
            self.lq_length -= 1;
            if self.lq_head == 0 {
                self.lq_head_phase = !self.lq_head_phase;
            }
        } else {
            assert!(self.sq_length > 0);
            let head = self.sq_head as usize;
            assert!(atomic_op == self.sq[head].amo);
            if atomic_op && state.load_reservation != self.sq[head].addr {
                atomic_success = false;
            } else if self.sq[head].addr_avail {
                match mem.store(self.sq[head].addr, self.sq[head].size, self.sq[head].value) {
                    Ok(()) => {}
                    Err(trap) => unreachable!("store fault at commit: {trap}"),
                }
            }
            if atomic_op {
                state.load_reservation = u64::MAX;
            }
            self.sq[head].valid = false;
            self.sq_head = (self.sq_head + 1) % self.sq_size;
            self.sq_length -= 1;
            if self.sq_head == 0 {
                self.sq_head_phase = !self.sq_head_phase;
            }
        }
        atomic_success
    }

    /// Truncate both queues to recorded tails (mispredict recovery).
    ///
    /// Pending loads being squashed release their destination holds; valid
    /// bits are rebuilt from the restored head/tail windows.
    pub fn restore(
        &mut self,
        lq_tail: u64,
        lq_phase: bool,
        sq_tail: u64,
        sq_phase: bool,
        pay: &PayloadBuffer,
        ren: &mut Renamer,
    ) {
        let squash_count = if lq_tail < self.lq_tail {
            self.lq_tail - lq_tail
        } else if lq_tail > self.lq_tail {
            self.lq_size - (lq_tail - self.lq_tail)
        } else {
            0
        };
        for k in 0..squash_count {
            let idx = ((lq_tail + k) % self.lq_size) as usize;
            if self.lq[idx].valid {
                let p = pay.get(self.lq[idx].pay_index);
                if p.c.valid && self.lq[idx].addr_avail && !self.lq[idx].value_avail {
                    ren.dec_usage(p.c.phys);
                }
            }
        }

        self.lq_tail = lq_tail;
        self.lq_tail_phase = lq_phase;
        self.lq_length = (self.lq_size + self.lq_tail - self.lq_head) % self.lq_size;
        if self.lq_length == 0 && self.lq_tail_phase != self.lq_head_phase {
            self.lq_length = self.lq_size;
        }
        for e in &mut self.lq {
            e.valid = false;
        }
        let mut j = self.lq_head;
        for _ in 0..self.lq_length {
            self.lq[j as usize].valid = true;
            j = (j + 1) % self.lq_size;
        }

        self.sq_tail = sq_tail;
        self.sq_tail_phase = sq_phase;
        self.sq_length = (self.sq_size + self.sq_tail - self.sq_head) % self.sq_size;
        if self.sq_length == 0 && self.sq_tail_phase != self.sq_head_phase {
            self.sq_length = self.sq_size;
        }
        for e in &mut self.sq {
            e.valid = false;
        }
        let mut j = self.sq_head;
        for _ in 0..self.sq_length {
            self.sq[j as usize].valid = true;
            j = (j + 1) % self.sq_size;
        }
    }

    /// Empty both queues (complete squash), releasing destination holds of
    /// pending loads.
    pub fn flush(&mut self, pay: &PayloadBuffer, ren: &mut Renamer) {
        for i in 0..self.lq.len() {
            if self.lq[i].valid {
                let p = pay.get(self.lq[i].pay_index);
                if p.c.valid && self.lq[i].addr_avail && !self.lq[i].value_avail {
                    ren.dec_usage(p.c.phys);
                }
                self.lq[i].valid = false;
            }
        }
        self.lq_head = 0;
        self.lq_head_phase = false;
        self.lq_tail = 0;
        self.lq_tail_phase = false;
        self.lq_length = 0;

        for e in &mut self.sq {
            e.valid = false;
        }
        self.sq_head = 0;
        self.sq_head_phase = false;
        self.sq_tail = 0;
        self.sq_tail_phase = false;
        self.sq_length = 0;
    }

    /// Queue occupancies (test support).
    pub const fn lengths(&self) -> (u64, u64) {
        (self.lq_length, self.sq_length)
    }

    /// Inspect an LQ entry (test support).
    pub fn lq_entry(&self, index: u64) -> &LsqEntry {
        &self.lq[index as usize]
    }

    /// Inspect an SQ entry (test support).
    pub fn sq_entry(&self, index: u64) -> &LsqEntry {
        &self.sq[index as usize]
    }

    /// Forwarding statistic of an LQ entry (test support).
    pub fn lq_forwarded(&self, index: u64) -> bool {
        self.lq[index as usize].stat_forward
    }
}
