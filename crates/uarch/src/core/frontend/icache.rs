//! Instruction-cache timing wrapper.
//!
//! The I-cache holds no instructions; it models timing only. Instruction
//! words come from the flat memory, and any fetch trap is recorded per slot
//! so the BTB can terminate the bundle at the offending instruction.

use crate::common::Cycle;
use crate::config::CacheLevelConfig;
use crate::core::cache::{CacheHierarchy, CacheModel};
use crate::core::frontend::btb::FetchSlot;
use crate::isa::{opcodes, Insn};
use crate::mem::Memory;

/// L1 instruction cache.
#[derive(Debug)]
pub struct InstrCache {
    perfect: bool,
    hit_latency: Cycle,
    /// The timing model; its counters feed the L1-I stats block.
    pub model: CacheModel,
}

impl InstrCache {
    /// Build the I-cache. With `perfect`, every lookup hits.
    pub fn new(perfect: bool, cfg: &CacheLevelConfig) -> Self {
        Self { perfect, hit_latency: cfg.hit_latency, model: CacheModel::new(cfg) }
    }

    /// Fetch a bundle's instruction words and model the access timing.
    ///
    /// Fills `insn`/`fetch_trap` in every slot. Returns `(hit, resolve)`;
    /// on a miss the fetch unit idles until `resolve`.
    pub fn lookup(
        &mut self,
        cycle: Cycle,
        pc: u64,
        mem: &Memory,
        bundle: &mut [FetchSlot],
        hier: &mut CacheHierarchy,
    ) -> (bool, Cycle) {
        for (i, slot) in bundle.iter_mut().enumerate() {
            let slot_pc = pc + 4 * i as u64;
            match mem.load_insn(slot_pc) {
                Ok(insn) => {
                    slot.insn = insn;
                    slot.fetch_trap = None;
                }
                Err(trap) => {
                    slot.insn = Insn(opcodes::NOP);
                    slot.fetch_trap = Some(trap);
                }
            }
        }

        if self.perfect {
            return (true, cycle);
        }
        match self.model.access(cycle, pc, false, |_| hier.access(cycle, pc, false)) {
            Some(resolve) => (resolve <= cycle + self.hit_latency, resolve),
            // Every MHSR busy: retry next cycle.
            None => (false, cycle + 1),
        }
    }
}
