//! Branch target buffer.
//!
//! The BTB locates branches within a sequential fetch bundle and supplies
//! their types and taken targets (targets for conditional branches and
//! direct jumps only; indirect targets come from the indirect predictor and
//! the RAS). It is organized as `btb[bank][set][way]`: the number of banks
//! equals the maximum bundle width so that all slots of a bundle can be
//! searched in parallel, and replacement within a set is true LRU.

use crate::common::{increment_pc, is_pow2, Trap};
use crate::isa::{abi, opcodes, Insn};

/// Branch classification used by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchKind {
    /// Conditional branch.
    #[default]
    Conditional,
    /// Direct jump.
    JumpDirect,
    /// Direct call (jump that links the return address).
    CallDirect,
    /// Indirect jump.
    JumpIndirect,
    /// Indirect call.
    CallIndirect,
    /// Return.
    Return,
}

impl BranchKind {
    /// Classify a control instruction and extract its taken target.
    ///
    /// Calls and returns follow the ABI convention: a jump that links `x1`
    /// is a call; a `jalr` that discards its link (`rd = x0`) while jumping
    /// through `x1` is a return. Indirect targets are dynamic, reported as 0.
    ///
    /// # Panics
    /// Panics if the instruction is not a branch; callers predecode first.
    pub fn decode(insn: Insn, pc: u64) -> (Self, u64) {
        match insn.opcode() {
            opcodes::BRANCH => (Self::Conditional, pc.wrapping_add(insn.b_imm() as u64)),
            opcodes::JAL => {
                let kind = if insn.rd() == abi::REG_RA { Self::CallDirect } else { Self::JumpDirect };
                (kind, pc.wrapping_add(insn.j_imm() as u64))
            }
            opcodes::JALR => {
                let kind = if insn.rd() == abi::REG_ZERO && insn.rs1() == abi::REG_RA {
                    Self::Return
                } else if insn.rd() == abi::REG_RA {
                    Self::CallIndirect
                } else {
                    Self::JumpIndirect
                };
                (kind, 0)
            }
            _ => unreachable!("branch-type decode of a non-branch"),
        }
    }
}

/// One slot of a predicted fetch bundle.
///
/// The BTB (or trace cache) sets the branch-identification fields; the
/// instruction cache sets the instruction word and any fetch trap.
#[derive(Debug, Clone, Default)]
pub struct FetchSlot {
    /// This slot contains a valid instruction.
    pub valid: bool,
    /// Identified as a branch by the BTB or trace cache.
    pub branch: bool,
    /// Branch type, if identified as a branch.
    pub branch_kind: BranchKind,
    /// Taken target, if identified (not valid for indirect branches).
    pub branch_target: u64,
    /// PC of this instruction.
    pub pc: u64,
    /// PC of the next instruction fetched after this one.
    pub next_pc: u64,
    /// Fetch trap raised by the instruction cache for this slot.
    pub fetch_trap: Option<Trap>,
    /// The instruction word.
    pub insn: Insn,
}

impl FetchSlot {
    /// An invalid slot.
    pub const fn empty() -> Self {
        Self {
            valid: false,
            branch: false,
            branch_kind: BranchKind::Conditional,
            branch_target: 0,
            pc: 0,
            next_pc: 0,
            fetch_trap: None,
            insn: Insn(opcodes::NOP),
        }
    }
}

/// Speculative-update packet emitted with each assembled bundle, directing
/// the fetch unit's PC/BHR/RAS updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecUpdate {
    /// Predicted PC of the next fetch bundle.
    pub next_pc: u64,
    /// Number of conditional branches in the bundle (BHR shift count).
    pub num_cb: u64,
    /// Bundle ends in a return: pop the RAS.
    pub pop_ras: bool,
    /// Bundle ends in a call: push the RAS.
    pub push_ras: bool,
    /// Address to push if `push_ras` is set (call PC + 4).
    pub push_ras_pc: u64,
}

#[derive(Debug, Clone, Default)]
struct BtbEntry {
    valid: bool,
    tag: u64,
    lru: u64,
    kind: BranchKind,
    target: u64,
}

/// Banked set-associative branch target buffer.
#[derive(Debug)]
pub struct Btb {
    // btb[bank][set][way]
    banks: Vec<Vec<Vec<BtbEntry>>>,
    num_banks: u64,
    sets: u64,
    assoc: u64,
    log2_banks: u64,
    log2_sets: u64,
    cond_branch_per_cycle: u64,
}

impl Btb {
    /// Construct a BTB with `entries` total entries split across `banks`
    /// banks of `assoc` ways. `banks` equals the maximum bundle width and
    /// must be a power of two, as must the derived set count.
    pub fn new(entries: u64, banks: u64, assoc: u64, cond_branch_per_cycle: u64) -> Self {
        let sets = entries / (banks * assoc);
        assert!(is_pow2(banks), "BTB bank count must be a power of two");
        assert!(is_pow2(sets), "BTB set count must be a power of two");
        let make_set = || {
            (0..assoc)
                .map(|way| BtbEntry { lru: way, ..BtbEntry::default() })
                .collect::<Vec<_>>()
        };
        Self {
            banks: (0..banks)
                .map(|_| (0..sets).map(|_| make_set()).collect())
                .collect(),
            num_banks: banks,
            sets,
            assoc,
            log2_banks: banks.trailing_zeros() as u64,
            log2_sets: sets.trailing_zeros() as u64,
            cond_branch_per_cycle,
        }
    }

    /// Convert a bundle start PC and slot position to bank and bank-local PC.
    ///
    /// The bank-local PC is the instruction-level PC with the bank-select
    /// bits removed (they are implied by which bank is referenced).
    const fn convert(&self, pc: u64, slot: u64) -> (u64, u64) {
        let ipc = (pc >> 2) + slot;
        (ipc & (self.num_banks - 1), ipc >> self.log2_banks)
    }

    /// Search a bank for `btb_pc`. Returns (hit, set, way); on a miss the way
    /// is the set's LRU victim.
    fn search(&self, bank: u64, btb_pc: u64) -> (bool, u64, u64) {
        let set = btb_pc & (self.sets - 1);
        let tag = btb_pc >> self.log2_sets;
        let ways = &self.banks[bank as usize][set as usize];
        let mut lru_way = self.assoc;
        for (i, e) in ways.iter().enumerate() {
            if e.valid && e.tag == tag {
                return (true, set, i as u64);
            }
            if e.lru == self.assoc - 1 {
                lru_way = i as u64;
            }
        }
        assert!(lru_way < self.assoc);
        (false, set, lru_way)
    }

    /// Make `way` the MRU of its set.
    fn touch(&mut self, bank: u64, set: u64, way: u64) {
        let ways = &mut self.banks[bank as usize][set as usize];
        let old = ways[way as usize].lru;
        for e in ways.iter_mut() {
            if e.lru < old {
                e.lru += 1;
            }
        }
        ways[way as usize].lru = 0;
    }

    /// Assemble the predicted fetch bundle starting at `pc`.
    ///
    /// `cb_preds` packs up to *m* 2-bit conditional predictions (consumed
    /// LSB-first); `ib_target` and `ras_target` are the indirect and return
    /// target predictions, used if the bundle ends in that branch type.
    ///
    /// The bundle terminates at a taken conditional, after *m* conditionals,
    /// at any non-conditional branch, or at a slot carrying a fetch trap.
    /// The instruction cache must have filled `insn`/`fetch_trap` already.
    pub fn lookup(
        &mut self,
        pc: u64,
        mut cb_preds: u64,
        ib_target: u64,
        ras_target: u64,
        bundle: &mut [FetchSlot],
        update: &mut SpecUpdate,
    ) {
        update.pop_ras = false;
        update.push_ras = false;

        let mut num_cb = 0u64;
        let mut terminated = false;
        let mut pos = 0u64;
        while pos < self.num_banks && !terminated {
            let slot = &mut bundle[pos as usize];
            slot.valid = true;
            slot.pc = pc + (pos << 2);

            let (bank, btb_pc) = self.convert(pc, pos);
            let (hit, set, way) = self.search(bank, btb_pc);
            if hit {
                let entry = &self.banks[bank as usize][set as usize][way as usize];
                slot.branch = true;
                slot.branch_kind = entry.kind;
                slot.branch_target = entry.target;
                let target = entry.target;
                self.touch(bank, set, way);

                let slot = &mut bundle[pos as usize];
                match slot.branch_kind {
                    BranchKind::Conditional => {
                        num_cb += 1;
                        let taken = (cb_preds & 3) >= 2;
                        cb_preds >>= 2;
                        slot.next_pc = if taken { target } else { increment_pc(slot.pc) };
                        if taken || num_cb == self.cond_branch_per_cycle {
                            terminated = true;
                        }
                    }
                    BranchKind::JumpDirect => {
                        slot.next_pc = target;
                        terminated = true;
                    }
                    BranchKind::CallDirect => {
                        slot.next_pc = target;
                        terminated = true;
                        update.push_ras = true;
                        update.push_ras_pc = increment_pc(slot.pc);
                    }
                    BranchKind::JumpIndirect => {
                        slot.next_pc = ib_target;
                        terminated = true;
                    }
                    BranchKind::CallIndirect => {
                        slot.next_pc = ib_target;
                        terminated = true;
                        update.push_ras = true;
                        update.push_ras_pc = increment_pc(slot.pc);
                    }
                    BranchKind::Return => {
                        slot.next_pc = ras_target;
                        terminated = true;
                        update.pop_ras = true;
                    }
                }
            } else {
                slot.branch = false;
                slot.next_pc = increment_pc(slot.pc);
            }

            // Regardless of the branch outcome, a fetch trap in this slot
            // ends the bundle at the offending instruction.
            if bundle[pos as usize].fetch_trap.is_some() {
                terminated = true;
            }
            pos += 1;
        }

        assert!(pos > 0, "fetch bundle must contain at least one instruction");
        update.next_pc = bundle[(pos - 1) as usize].next_pc;
        update.num_cb = num_cb;

        for slot in bundle.iter_mut().skip(pos as usize) {
            slot.valid = false;
        }
    }

    /// Train the BTB for a branch the lookup missed or mis-identified.
    ///
    /// An overwriting hit must reflect a legitimate change: the branch type
    /// differs, or a non-indirect target differs (self-modifying code, or
    /// the BTB was trained with wrong-path data).
    pub fn update(&mut self, pc: u64, slot: u64, insn: Insn) {
        let slot_pc = pc + (slot << 2);
        let (kind, target) = BranchKind::decode(insn, slot_pc);
        let (bank, btb_pc) = self.convert(pc, slot);
        let (hit, set, way) = self.search(bank, btb_pc);
        if hit {
            let e = &self.banks[bank as usize][set as usize][way as usize];
            assert!(
                e.kind != kind || (insn.opcode() != opcodes::JALR && e.target != target),
                "BTB overwrite without a legitimate change"
            );
        }
        let tag = btb_pc >> self.log2_sets;
        {
            let e = &mut self.banks[bank as usize][set as usize][way as usize];
            e.valid = true;
            e.tag = tag;
            e.kind = kind;
            e.target = target;
        }
        self.touch(bank, set, way);
    }

    /// Invalidate the entry for a non-branch the BTB mis-identified, and
    /// demote it to LRU.
    ///
    /// # Panics
    /// Panics if no entry exists; the pipeline only invalidates entries it
    /// just observed hitting.
    pub fn invalidate(&mut self, pc: u64, slot: u64) {
        let (bank, btb_pc) = self.convert(pc, slot);
        let (hit, set, way) = self.search(bank, btb_pc);
        assert!(hit, "invalidating a BTB entry that does not exist");
        let set_ways = &mut self.banks[bank as usize][set as usize];
        set_ways[way as usize].valid = false;
        let old = set_ways[way as usize].lru;
        for e in set_ways.iter_mut() {
            if e.lru > old {
                e.lru -= 1;
            }
        }
        set_ways[way as usize].lru = self.assoc - 1;
    }

    /// Which bank a (bundle PC, slot) pair maps to. Exposed for tests.
    pub const fn bank_of(&self, pc: u64, slot: u64) -> u64 {
        self.convert(pc, slot).0
    }
}
