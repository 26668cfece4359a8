//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for the simulator:
//! 1. **Cycle and IPC:** total cycles, retired instructions, derived IPC.
//! 2. **Recovery:** exceptions, full squashes, misfetch cycles.
//! 3. **Branch prediction:** per-type predicted/mispredicted counts.
//! 4. **LSU:** forwards, disambiguation stalls, violations, miss stalls.
//! 5. **Caches:** hit/miss counts per level.

use std::collections::HashMap;
use std::fmt::Write as _;

/// Per-branch-type prediction measurements, owned by the fetch unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchStats {
    /// Retired conditional branches.
    pub branch_n: u64,
    /// Retired direct jumps.
    pub jumpdir_n: u64,
    /// Retired direct calls.
    pub calldir_n: u64,
    /// Retired indirect jumps.
    pub jumpind_n: u64,
    /// Retired indirect calls.
    pub callind_n: u64,
    /// Retired returns.
    pub jumpret_n: u64,
    /// Mispredicted conditional branches.
    pub branch_m: u64,
    /// Mispredicted indirect jumps.
    pub jumpind_m: u64,
    /// Mispredicted indirect calls.
    pub callind_m: u64,
    /// Mispredicted returns.
    pub jumpret_m: u64,
    /// Indirect jumps whose target was the next sequential PC.
    pub jumpind_seq: u64,
    /// Fetch cycles discarded due to a BTB miss within the bundle.
    pub btb_misfetch: u64,
}

/// LSU measurements, tallied at load/store retirement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsuStats {
    /// Retired loads.
    pub loads: u64,
    /// Retired stores.
    pub stores: u64,
    /// Loads that stalled for disambiguation.
    pub stall_disambig: u64,
    /// Address-unknown stalls that a real conflict justified.
    pub true_stall: u64,
    /// Address-unknown stalls with no conflict (MDP training signal).
    pub false_stall: u64,
    /// Loads that forwarded from a store.
    pub forward: u64,
    /// Load-order violations detected.
    pub load_violation: u64,
    /// Loads stalled on a cache miss.
    pub stall_miss_load: u64,
    /// Partial-forward conflicts resolved with the reference value.
    pub partial_forward_cheat: u64,
}

/// One cache level's hit/miss counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Accesses that hit.
    pub hits: u64,
    /// Accesses that missed.
    pub misses: u64,
    /// Accesses rejected because all MHSRs were busy.
    pub mhsr_full: u64,
}

/// All simulation counters.
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    /// Total simulated cycles.
    pub cycles: u64,
    /// Retired instructions.
    pub instret: u64,
    /// Retired instructions that were the upper half of a split.
    pub instret_split: u64,
    /// Exceptions taken at retirement.
    pub exceptions: u64,
    /// Complete pipeline squashes.
    pub full_squashes: u64,
    /// Selective (checkpoint-mask) squashes.
    pub selective_squashes: u64,
    /// Load-violation squashes.
    pub load_violation_squashes: u64,
    /// Branch prediction measurements.
    pub branches: BranchStats,
    /// LSU measurements.
    pub lsu: LsuStats,
    /// L1-I cache counters.
    pub l1i: CacheStats,
    /// L1-D cache counters.
    pub l1d: CacheStats,
    /// L2 cache counters.
    pub l2: CacheStats,
    /// L3 cache counters.
    pub l3: CacheStats,
    /// Histogram of retired PCs (enabled by config).
    pub pc_histogram: Option<HashMap<u64, u64>>,
}

impl SimStats {
    /// Record a retired PC in the histogram, if enabled.
    pub fn note_pc(&mut self, pc: u64) {
        if let Some(h) = self.pc_histogram.as_mut() {
            *h.entry(pc).or_insert(0) += 1;
        }
    }

    /// Render the measurement report.
    pub fn report(&self) -> String {
        let mut s = String::new();
        let ipc = self.instret as f64 / self.cycles.max(1) as f64;
        let _ = writeln!(s, "SIMULATION MEASUREMENTS----------------------------");
        let _ = writeln!(s, "cycles             = {}", self.cycles);
        let _ = writeln!(s, "instructions       = {}", self.instret);
        let _ = writeln!(s, "IPC                = {ipc:.3}");
        let _ = writeln!(s, "exceptions         = {}", self.exceptions);
        let _ = writeln!(s, "full squashes      = {}", self.full_squashes);
        let _ = writeln!(s, "selective squashes = {}", self.selective_squashes);
        let _ = writeln!(s, "load violations    = {}", self.load_violation_squashes);

        let b = &self.branches;
        let all_n = b.branch_n + b.jumpdir_n + b.calldir_n + b.jumpind_n + b.callind_n + b.jumpret_n;
        let all_m = b.branch_m + b.jumpind_m + b.callind_m + b.jumpret_m;
        let _ = writeln!(s, "BRANCH PREDICTION MEASUREMENTS---------------------");
        let _ = writeln!(s, "Type                      n          m");
        let _ = writeln!(s, "All              {all_n:>10} {all_m:>10}");
        let _ = writeln!(s, "Branch           {:>10} {:>10}", b.branch_n, b.branch_m);
        let _ = writeln!(s, "Jump Direct      {:>10} {:>10}", b.jumpdir_n, 0);
        let _ = writeln!(s, "Call Direct      {:>10} {:>10}", b.calldir_n, 0);
        let _ = writeln!(s, "Jump Indirect    {:>10} {:>10}", b.jumpind_n, b.jumpind_m);
        let _ = writeln!(s, "Call Indirect    {:>10} {:>10}", b.callind_n, b.callind_m);
        let _ = writeln!(s, "Return           {:>10} {:>10}", b.jumpret_n, b.jumpret_m);
        let _ = writeln!(s, "BTB misfetch cycles = {}", b.btb_misfetch);

        let l = &self.lsu;
        let _ = writeln!(s, "LSU MEASUREMENTS-----------------------------------");
        let _ = writeln!(s, "loads              = {}", l.loads);
        let _ = writeln!(s, "stores             = {}", l.stores);
        let _ = writeln!(s, "disambig. stalls   = {}", l.stall_disambig);
        let _ = writeln!(s, "  true dep. stalls = {}", l.true_stall);
        let _ = writeln!(s, "  false dep. stalls= {}", l.false_stall);
        let _ = writeln!(s, "forwards           = {}", l.forward);
        let _ = writeln!(s, "load violations    = {}", l.load_violation);
        let _ = writeln!(s, "miss stalls        = {}", l.stall_miss_load);
        let _ = writeln!(s, "partial fwd cheats = {}", l.partial_forward_cheat);

        let _ = writeln!(s, "CACHE MEASUREMENTS---------------------------------");
        for (name, c) in [("L1-I", &self.l1i), ("L1-D", &self.l1d), ("L2  ", &self.l2), ("L3  ", &self.l3)] {
            let _ = writeln!(
                s,
                "{name}  hits = {:>10}  misses = {:>10}  mhsr-full = {}",
                c.hits, c.misses, c.mhsr_full
            );
        }

        if let Some(h) = &self.pc_histogram {
            let mut pcs: Vec<_> = h.iter().collect();
            pcs.sort_by(|x, y| y.1.cmp(x.1).then(x.0.cmp(y.0)));
            let _ = writeln!(s, "PC HISTOGRAM (top 20)------------------------------");
            for (pc, count) in pcs.into_iter().take(20) {
                let _ = writeln!(s, "{pc:#012x}  {count}");
            }
        }
        s
    }
}
