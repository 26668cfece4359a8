//! Centralized per-instruction payload arena.
//!
//! The pipeline explicitly models all processor queues and pipeline
//! registers so that it is structurally the same as a real pipeline. For
//! simulation efficiency, all payload information about an instruction is
//! held in this centralized buffer and only indices move through the
//! pipeline. Each instruction is allocated two consecutive entries, even and
//! odd, in case it is split into two micro-operations.

use crate::common::{is_pow2, TrapSlot};
use crate::core::frontend::bq::PredTag;
use crate::core::frontend::btb::BranchKind;
use crate::core::lanes::FuType;
use crate::isa::{opcodes, Insn, IqSelect};
use crate::ref_model::RefModel;

/// Checkpoint-id sentinel for payloads that have not passed Rename2 yet.
///
/// Without this, retirement could prematurely pop payloads whose
/// uninitialized checkpoint id happens to match the committing checkpoint.
pub const CHKPT_NONE: u64 = 0xDEAD_BEEF;

/// A register operand: logical and renamed physical register with validity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Operand {
    /// The operand exists.
    pub valid: bool,
    /// Flat logical register number.
    pub log: usize,
    /// Renamed physical register number.
    pub phys: usize,
}

/// Everything the pipeline knows about one in-flight instruction.
#[derive(Debug, Clone)]
pub struct Payload {
    // Set by Fetch1.
    /// The instruction word.
    pub insn: Insn,
    /// The instruction's PC.
    pub pc: u64,
    /// Predicted PC of the next instruction fetched after this one.
    pub next_pc: u64,
    /// Identified as a branch by the BTB or trace cache.
    pub branch: bool,
    /// Branch type, if identified as a branch.
    pub branch_kind: BranchKind,
    /// Taken target from the BTB (not valid for indirect branches).
    pub branch_target: u64,
    /// Index of the corresponding instruction in the reference model, or
    /// `None` once reference divergence is observed (wrong path, sticky).
    pub db_index: Option<u64>,
    /// Unique sequence number for logging.
    pub sequence: u64,

    // Set by Fetch2.
    /// Branch-queue identity, if the instruction is a branch.
    pub pred_tag: PredTag,

    // Set by Decode.
    /// Operation flag bitset.
    pub flags: u32,
    /// Function-unit type.
    pub fu: FuType,
    /// Instruction is split into two micro-operations.
    pub split: bool,
    /// Upper half of a split instruction.
    pub upper: bool,
    /// Split-store flag.
    pub split_store: bool,
    /// First source operand.
    pub a: Operand,
    /// Second source operand.
    pub b: Operand,
    /// Third source operand.
    pub d: Operand,
    /// Destination operand.
    pub c: Operand,
    /// Issue-queue routing.
    pub iq: IqSelect,
    /// CSR address for system instructions.
    pub csr_addr: u64,
    /// Load/store access size in bytes.
    pub size: usize,
    /// Loaded value is sign-extended.
    pub is_signed: bool,

    // Set by Rename2.
    /// Enclosing checkpoint identifier.
    pub chkpt_id: u64,
    /// A checkpoint was created immediately after this instruction because
    /// its predicted next PC disagreed with the architectural one; Writeback
    /// checks such instructions for misprediction recovery.
    pub checkpoint: bool,

    // Set by Dispatch.
    /// LQ index (loads) or LQ tail at dispatch (all others).
    pub lq_index: u64,
    /// Phase bit accompanying `lq_index`.
    pub lq_phase: bool,
    /// SQ index (stores) or SQ tail at dispatch (all others).
    pub sq_index: u64,
    /// Phase bit accompanying `sq_index`.
    pub sq_phase: bool,
    /// Execution lane chosen for the instruction.
    pub lane: usize,

    // Set by Register Read.
    /// First source value.
    pub a_value: u64,
    /// Second source value.
    pub b_value: u64,
    /// Third source value.
    pub d_value: u64,

    // Set by Execute.
    /// Load/store address from AGEN.
    pub addr: u64,
    /// Computed next PC (branch resolution).
    pub c_next_pc: u64,
    /// Computed destination value.
    pub c_value: u64,
    /// Floating-point accrued-exception bits produced by this instruction.
    pub fflags: u32,
    /// First-posted trap.
    pub trap: TrapSlot,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            insn: Insn(opcodes::NOP),
            pc: 0,
            next_pc: 0,
            branch: false,
            branch_kind: BranchKind::Conditional,
            branch_target: 0,
            db_index: None,
            sequence: 0,
            pred_tag: PredTag::default(),
            flags: 0,
            fu: FuType::AluSimple,
            split: false,
            upper: false,
            split_store: false,
            a: Operand::default(),
            b: Operand::default(),
            d: Operand::default(),
            c: Operand::default(),
            iq: IqSelect::Queue,
            csr_addr: 0,
            size: 0,
            is_signed: false,
            chkpt_id: CHKPT_NONE,
            checkpoint: false,
            lq_index: 0,
            lq_phase: false,
            sq_index: 0,
            sq_phase: false,
            lane: 0,
            a_value: 0,
            b_value: 0,
            d_value: 0,
            addr: 0,
            c_next_pc: 0,
            c_value: 0,
            fflags: 0,
            trap: TrapSlot::default(),
        }
    }
}

impl Payload {
    /// On the correct control-flow path (has a reference-model twin).
    pub const fn is_good(&self) -> bool {
        self.db_index.is_some()
    }
}

/// Power-of-two ring of payload records, two slots per instruction.
#[derive(Debug)]
pub struct PayloadBuffer {
    buf: Vec<Payload>,
    size: usize,
    head: usize,
    tail: usize,
    length: usize,
    next_sequence: u64,
}

impl PayloadBuffer {
    /// Size the buffer to at least two slots per in-flight instruction,
    /// rounded up to a power of two.
    pub fn new(total_inflight: usize) -> Self {
        assert!(total_inflight > 0);
        let size = (2 * total_inflight).next_power_of_two();
        assert!(is_pow2(size as u64) && size >= 2 * total_inflight);
        Self {
            buf: vec![Payload::default(); size],
            size,
            head: 0,
            tail: 0,
            length: 0,
            next_sequence: 0,
        }
    }

    /// Allocate an even/odd pair; returns the even index.
    ///
    /// # Panics
    /// Panics on overflow; the buffer is sized to the in-flight capacity.
    pub fn push(&mut self) -> usize {
        let index = self.tail;
        self.tail = (self.tail + 2) & (self.size - 1);
        self.length += 2;
        assert!(self.length <= self.size, "payload buffer overflow");
        self.buf[index] = Payload { sequence: self.next_sequence, ..Payload::default() };
        self.next_sequence += 1;
        index
    }

    /// Retire one slot from the head.
    pub fn pop(&mut self) {
        self.head = (self.head + 1) & (self.size - 1);
        assert!(self.length > 0, "payload buffer underflow");
        self.length -= 1;
    }

    /// Make the buffer empty.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.length = 0;
    }

    /// Truncate the tail to the instruction after `index` (mispredict rollback).
    pub fn rollback(&mut self, index: usize) {
        self.tail = (index + 2) & (self.size - 1);
        self.length = (self.size + self.tail - self.head) & (self.size - 1);
    }

    /// Record the current tail (Fetch1 checkpointing).
    pub const fn checkpoint(&self) -> usize {
        self.tail
    }

    /// Restore a recorded tail (misfetch recovery).
    pub fn restore(&mut self, tail: usize) {
        self.tail = tail;
        self.length = (self.size + self.tail - self.head) & (self.size - 1);
    }

    /// Head slot index (next instruction to retire).
    pub const fn head(&self) -> usize {
        self.head
    }

    /// Tail slot index.
    pub const fn tail(&self) -> usize {
        self.tail
    }

    /// True when no payloads are live.
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of live slots.
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Total slot capacity.
    pub const fn capacity(&self) -> usize {
        self.size
    }

    /// Access a payload record.
    pub fn get(&self, index: usize) -> &Payload {
        &self.buf[index]
    }

    /// Mutable access to a payload record.
    pub fn get_mut(&mut self, index: usize) -> &mut Payload {
        &mut self.buf[index]
    }

    /// Link the record at `index` to the next architectural instruction in
    /// the reference model.
    ///
    /// The first live instruction maps through `first`; later instructions
    /// chain through their predecessor's index. Once divergence is observed
    /// the wrong-path state is sticky: successors never rejoin.
    pub fn map_to_actual(&mut self, oracle: &mut RefModel, index: usize) {
        let first = index == self.head;
        let db = if first {
            oracle.first(self.buf[index].pc)
        } else {
            let prev = (index + self.size - 2) & (self.size - 1);
            match self.buf[prev].db_index {
                Some(prev_db) => oracle.check_next(prev_db, self.buf[index].pc),
                None => None,
            }
        };
        self.buf[index].db_index = db;
    }

    /// Perfect branch prediction: walk the reference model's upcoming
    /// instructions from `pc`, packing a taken/not-taken 2-bit counter per
    /// conditional branch, up to `max_len` instructions or the first
    /// indirect branch (whose target is returned).
    pub fn predict(&self, oracle: &mut RefModel, pc: u64, max_len: u64) -> (u64, u64) {
        let mut db = if self.tail == self.head {
            oracle.first(pc)
        } else {
            let prev = (self.tail + self.size - 2) & (self.size - 1);
            match self.buf[prev].db_index {
                Some(prev_db) => oracle.check_next(prev_db, pc),
                None => None,
            }
        };

        let mut cb_preds = 0u64;
        let mut indirect_target = 0u64;
        let mut i = 0u64;
        let mut j = 0u64;
        while i < max_len {
            let Some(cur) = db else { break };
            let Some(actual) = oracle.peek(cur) else { break };
            let (op, a_pc, a_next_pc) = (actual.insn.opcode(), actual.pc, actual.next_pc);
            match op {
                opcodes::BRANCH => {
                    if a_next_pc != crate::common::increment_pc(a_pc) {
                        cb_preds |= 3 << (j << 1);
                    }
                    j += 1;
                }
                opcodes::JALR => {
                    indirect_target = a_next_pc;
                    break;
                }
                _ => {}
            }
            i += 1;
            db = oracle.check_next(cur, a_next_pc);
        }
        (cb_preds, indirect_target)
    }
}
