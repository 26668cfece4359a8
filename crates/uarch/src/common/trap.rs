//! Trap taxonomy and per-instruction trap storage.
//!
//! Traps are data, not control flow: an MMU or CSR call that faults returns
//! `Err(Trap)`, and the trap is latched into the offending instruction's
//! payload slot. The exception handler fires when the instruction reaches
//! retirement, preserving precise-state semantics.

use thiserror::Error;

/// Synchronous exceptions recognized by the core.
///
/// Each variant carries the faulting address or instruction word where the
/// architecture defines one. `cause` maps the variant to its RISC-V cause code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Trap {
    /// Instruction fetch from a misaligned PC.
    #[error("misaligned fetch at {0:#x}")]
    FetchMisaligned(u64),
    /// Instruction fetch outside implemented memory.
    #[error("fetch access fault at {0:#x}")]
    FetchAccessFault(u64),
    /// Undecodable or unimplemented instruction encoding.
    #[error("illegal instruction {0:#010x}")]
    IllegalInstruction(u32),
    /// Privileged operation attempted without sufficient privilege.
    #[error("privileged instruction at {0:#x}")]
    PrivilegedInstruction(u64),
    /// Floating-point operation with the FP unit disabled.
    #[error("floating-point unit disabled at {0:#x}")]
    FpDisabled(u64),
    /// Environment call (`ecall`).
    #[error("syscall")]
    Syscall,
    /// Breakpoint (`ebreak`).
    #[error("breakpoint at {0:#x}")]
    Breakpoint(u64),
    /// Load from a misaligned address.
    #[error("misaligned load at {0:#x}")]
    LoadMisaligned(u64),
    /// Load outside implemented memory.
    #[error("load access fault at {0:#x}")]
    LoadAccessFault(u64),
    /// Store to a misaligned address.
    #[error("misaligned store at {0:#x}")]
    StoreMisaligned(u64),
    /// Store outside implemented memory.
    #[error("store access fault at {0:#x}")]
    StoreAccessFault(u64),
    /// Micro-architectural CSR synchronization: refetch the instruction
    /// without taking an architectural trap.
    #[error("csr serialization")]
    CsrSerialize,
}

impl Trap {
    /// RISC-V cause code for this trap.
    pub const fn cause(&self) -> u64 {
        match self {
            Self::FetchMisaligned(_) => 0,
            Self::FetchAccessFault(_) => 1,
            Self::IllegalInstruction(_) => 2,
            Self::Breakpoint(_) => 3,
            Self::LoadMisaligned(_) => 4,
            Self::LoadAccessFault(_) => 5,
            Self::StoreMisaligned(_) => 6,
            Self::StoreAccessFault(_) => 7,
            Self::Syscall => 8,
            Self::PrivilegedInstruction(_) => 9,
            Self::FpDisabled(_) => 10,
            Self::CsrSerialize => 24,
        }
    }

    /// Faulting data address, for memory traps.
    pub const fn badvaddr(&self) -> Option<u64> {
        match self {
            Self::FetchMisaligned(a)
            | Self::FetchAccessFault(a)
            | Self::LoadMisaligned(a)
            | Self::LoadAccessFault(a)
            | Self::StoreMisaligned(a)
            | Self::StoreAccessFault(a) => Some(*a),
            _ => None,
        }
    }

    /// True for load/store address traps (posted at address translation).
    pub const fn is_mem(&self) -> bool {
        matches!(
            self,
            Self::LoadMisaligned(_)
                | Self::LoadAccessFault(_)
                | Self::StoreMisaligned(_)
                | Self::StoreAccessFault(_)
        )
    }
}

/// Per-instruction trap latch.
///
/// The first trap posted wins; later posts are ignored. This mirrors hardware
/// behavior where the oldest fault along an instruction's path defines its
/// architectural outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapSlot(Option<Trap>);

impl TrapSlot {
    /// Latch a trap if the slot is empty; no-op otherwise.
    pub fn post(&mut self, trap: Trap) {
        if self.0.is_none() {
            self.0 = Some(trap);
        }
    }

    /// The latched trap, if any.
    pub const fn get(&self) -> Option<&Trap> {
        self.0.as_ref()
    }

    /// True if a trap has been posted.
    pub const fn is_posted(&self) -> bool {
        self.0.is_some()
    }

    /// Empty the slot (new payload allocation only).
    pub fn clear(&mut self) {
        self.0 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_posted_trap_wins() {
        let mut slot = TrapSlot::default();
        slot.post(Trap::LoadAccessFault(0x100));
        slot.post(Trap::StoreAccessFault(0x200));
        assert_eq!(slot.get(), Some(&Trap::LoadAccessFault(0x100)));
    }

    #[test]
    fn clear_empties_the_slot() {
        let mut slot = TrapSlot::default();
        slot.post(Trap::Syscall);
        slot.clear();
        assert!(!slot.is_posted());
    }
}
