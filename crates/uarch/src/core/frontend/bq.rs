//! Branch queue: a FIFO of in-flight branch contexts.
//!
//! Every branch pushed at Fetch2 records the precise pre-branch predictor
//! context (BHRs, RAS TOS) and the fetch-time context used to index the
//! predictors. Mispredict recovery rolls the tail back to the resolved
//! branch; commit pops the head and trains the predictors from the entry's
//! fetch-time context.

use crate::core::frontend::btb::BranchKind;

/// One in-flight branch context.
#[derive(Debug, Clone, Default)]
pub struct BqEntry {
    /// The type of branch.
    pub kind: BranchKind,

    /// Precise conditional-predictor BHR at this point in the instruction
    /// stream (all prior branches included).
    pub precise_cb_bhr: u64,
    /// Precise indirect-predictor BHR at this point in the instruction stream.
    pub precise_ib_bhr: u64,
    /// Precise RAS TOS index at this point in the instruction stream.
    pub precise_ras_tos: u64,

    /// PC used to index the predictors for this prediction. Training always
    /// re-references the entry the prediction came from.
    pub fetch_pc: u64,
    /// BHR used to index the conditional predictor for this prediction.
    pub fetch_cb_bhr: u64,
    /// BHR used to index the indirect predictor for this prediction.
    pub fetch_ib_bhr: u64,
    /// Position of this prediction within the multi-prediction entry.
    pub fetch_cb_pos: u64,

    /// Prediction until resolved, outcome afterwards.
    pub taken: bool,
    /// Predicted (then resolved) next PC.
    pub next_pc: u64,
    /// Set when the branch was mispredicted; tallied at retirement.
    pub misp: bool,
}

/// External identity of a branch-queue slot: `(tag << 1) | phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredTag(pub u64);

impl PredTag {
    /// Combine a slot index and phase bit.
    pub const fn new(tag: u64, phase: bool) -> Self {
        Self((tag << 1) | phase as u64)
    }
    /// Slot index within the queue.
    pub const fn tag(self) -> u64 {
        self.0 >> 1
    }
    /// Phase bit of the slot.
    pub const fn phase(self) -> bool {
        self.0 & 1 == 1
    }
}

/// Ring buffer of in-flight branch contexts with head/tail phase bits.
///
/// Empty iff `head == tail && head_phase == tail_phase`; full iff
/// `head == tail && head_phase != tail_phase`.
#[derive(Debug)]
pub struct BranchQueue {
    entries: Vec<BqEntry>,
    size: u64,
    head: u64,
    tail: u64,
    head_phase: bool,
    tail_phase: bool,
}

impl BranchQueue {
    /// Create a queue with `size` slots (minimum one).
    pub fn new(size: u64) -> Self {
        let size = size.max(1);
        Self {
            entries: vec![BqEntry::default(); size as usize],
            size,
            head: 0,
            tail: 0,
            head_phase: false,
            tail_phase: false,
        }
    }

    /// Access an entry by slot index.
    pub fn entry(&self, tag: u64) -> &BqEntry {
        &self.entries[tag as usize]
    }

    /// Mutable access to an entry by slot index.
    pub fn entry_mut(&mut self, tag: u64) -> &mut BqEntry {
        &mut self.entries[tag as usize]
    }

    /// Allocate the tail slot and return its (tag, phase).
    ///
    /// # Panics
    /// Panics if the queue is full; the fetch unit sizes the queue to the
    /// maximum number of outstanding branches.
    pub fn push(&mut self) -> (u64, bool) {
        assert!(self.tail != self.head || self.tail_phase == self.head_phase, "branch queue overflow");
        let slot = (self.tail, self.tail_phase);
        self.tail += 1;
        if self.tail == self.size {
            self.tail = 0;
            self.tail_phase = !self.tail_phase;
        }
        slot
    }

    /// Release the head slot and return its (tag, phase).
    ///
    /// # Panics
    /// Panics if the queue is empty.
    pub fn pop(&mut self) -> (u64, bool) {
        assert!(self.head != self.tail || self.head_phase != self.tail_phase, "branch queue underflow");
        let slot = (self.head, self.head_phase);
        self.head += 1;
        if self.head == self.size {
            self.head = 0;
            self.head_phase = !self.head_phase;
        }
        slot
    }

    /// Roll the tail back to `(tag, phase)`. The caller re-pushes the resolved
    /// branch afterwards to re-insert it with corrected contents.
    ///
    /// With `check`, asserts that the slot lies logically within [head, tail).
    pub fn rollback(&mut self, tag: u64, phase: bool, check: bool) {
        assert!(tag < self.size);
        if check {
            if self.head == self.tail {
                // Rollback target must exist, so the queue cannot be empty.
                assert!(self.head_phase != self.tail_phase);
                if phase == self.head_phase {
                    assert!(tag >= self.head);
                } else {
                    assert!(tag < self.head);
                }
            } else if self.head < self.tail {
                assert!(self.head_phase == self.tail_phase);
                assert!(tag >= self.head && tag < self.tail);
                assert!(phase == self.head_phase);
            } else {
                assert!(self.head_phase != self.tail_phase);
                assert!(tag < self.tail || tag >= self.head);
                if tag < self.tail {
                    assert!(phase == self.tail_phase);
                } else {
                    assert!(phase == self.head_phase);
                }
            }
        }
        self.tail = tag;
        self.tail_phase = phase;
    }

    /// Current tail position, for recording without allocating.
    pub const fn mark(&self) -> (u64, bool) {
        (self.tail, self.tail_phase)
    }

    /// Empty the queue (tail := head) and return the head slot index.
    pub fn flush(&mut self) -> u64 {
        self.tail = self.head;
        self.tail_phase = self.head_phase;
        self.head
    }

    /// Head slot index.
    pub const fn head(&self) -> u64 {
        self.head
    }

    /// True if no branches are outstanding.
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail && self.head_phase == self.tail_phase
    }
}
