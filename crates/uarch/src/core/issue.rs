//! Issue queue with speculative wakeup and select.
//!
//! Entries hold renamed source tags with ready bits. `wakeup` broadcasts a
//! produced tag to every entry; select picks the oldest ready entries up to
//! the issue width, position-based by default or age-based when configured,
//! with a rotating partition pointer adjusting priority between partitions.
//! Squash is by checkpoint-id mask.

use crate::core::lanes::FuType;

/// One renamed source operand in the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct IqSrc {
    /// The operand exists.
    pub valid: bool,
    /// Physical register tag.
    pub phys: usize,
    /// The value is (or will be by register-read) available.
    pub ready: bool,
}

/// One issue-queue entry.
#[derive(Debug, Clone, Default)]
pub struct IqEntry {
    /// Slot occupied.
    pub valid: bool,
    /// Destination physical register, if any.
    pub dest: Option<usize>,
    /// Source operands (A, B, D).
    pub srcs: [IqSrc; 3],
    /// Payload index.
    pub pay_index: usize,
    /// Enclosing checkpoint id.
    pub chkpt_id: u64,
    /// Function-unit type for steering.
    pub fu: FuType,
    /// Pre-steered lane, fixed at dispatch.
    pub lane: Option<usize>,
    /// Dispatch order stamp for age-based select.
    pub age: u64,
}

impl IqEntry {
    /// All present sources ready.
    pub fn ready(&self) -> bool {
        self.srcs.iter().all(|s| !s.valid || s.ready)
    }
}

/// The issue queue.
#[derive(Debug)]
pub struct IssueQueue {
    entries: Vec<IqEntry>,
    parts: usize,
    part_ptr: usize,
    age_based: bool,
    next_age: u64,
}

impl IssueQueue {
    /// Create a queue with `size` entries and `parts` priority partitions.
    pub fn new(size: u64, parts: u64, age_based: bool) -> Self {
        Self {
            entries: vec![IqEntry::default(); size as usize],
            parts: parts.max(1) as usize,
            part_ptr: 0,
            age_based,
            next_age: 0,
        }
    }

    /// Number of free slots.
    pub fn free_slots(&self) -> usize {
        self.entries.iter().filter(|e| !e.valid).count()
    }

    /// Insert an entry into any free slot.
    ///
    /// # Panics
    /// Panics when full; dispatch checks `free_slots` first.
    pub fn insert(&mut self, mut entry: IqEntry) {
        entry.valid = true;
        entry.age = self.next_age;
        self.next_age += 1;
        let slot = self
            .entries
            .iter()
            .position(|e| !e.valid)
            .unwrap_or_else(|| unreachable!("issue queue overflow"));
        self.entries[slot] = entry;
    }

    /// Broadcast a produced tag: matching sources become ready.
    pub fn wakeup(&mut self, pr: usize) {
        for e in self.entries.iter_mut().filter(|e| e.valid) {
            for s in &mut e.srcs {
                if s.valid && s.phys == pr {
                    s.ready = true;
                }
            }
        }
    }

    /// Slots of ready entries in selection priority order.
    ///
    /// Position-based: partitions are visited starting at the rotating
    /// partition pointer, positions in order within each. Age-based: oldest
    /// first regardless of position.
    pub fn select_order(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = Vec::new();
        if self.age_based {
            let mut ready: Vec<(u64, usize)> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.valid && e.ready())
                .map(|(i, e)| (e.age, i))
                .collect();
            ready.sort_unstable();
            order.extend(ready.into_iter().map(|(_, i)| i));
        } else {
            let part_len = self.entries.len().div_ceil(self.parts);
            for k in 0..self.parts {
                let part = (self.part_ptr + k) % self.parts;
                let start = part * part_len;
                let end = (start + part_len).min(self.entries.len());
                for i in start..end {
                    if self.entries[i].valid && self.entries[i].ready() {
                        order.push(i);
                    }
                }
            }
            self.part_ptr = (self.part_ptr + 1) % self.parts;
        }
        order
    }

    /// Inspect an entry by slot.
    pub fn entry(&self, slot: usize) -> &IqEntry {
        &self.entries[slot]
    }

    /// Remove and return the entry at `slot`.
    pub fn take(&mut self, slot: usize) -> IqEntry {
        let e = std::mem::take(&mut self.entries[slot]);
        assert!(e.valid, "issuing an empty slot");
        e
    }

    /// Invalidate all entries whose checkpoint bit is set in `mask`,
    /// returning them so the caller can release destination holds.
    pub fn squash(&mut self, mask: u64) -> Vec<IqEntry> {
        let mut removed = Vec::new();
        for e in &mut self.entries {
            if e.valid && mask & (1 << e.chkpt_id) != 0 {
                e.valid = false;
                removed.push(e.clone());
            }
        }
        removed
    }

    /// Empty the queue, returning the removed entries.
    pub fn drain(&mut self) -> Vec<IqEntry> {
        let mut removed = Vec::new();
        for e in &mut self.entries {
            if e.valid {
                e.valid = false;
                removed.push(e.clone());
            }
        }
        removed
    }

    /// Empty the queue.
    pub fn flush(&mut self) {
        let _ = self.drain();
    }

    /// Number of occupied slots (test support).
    pub fn occupancy(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }
}
