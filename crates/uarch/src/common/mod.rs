//! Common types shared across the simulator core.
//!
//! This module provides the fundamental building blocks used by every component:
//! 1. **Constants:** initial PC, register-space layout, PC arithmetic.
//! 2. **Traps:** the exception taxonomy and the first-posted-wins trap slot.

/// System-wide constants and small helpers.
pub mod constants;
/// Trap taxonomy and payload trap storage.
pub mod trap;

pub use constants::{increment_pc, is_pow2, INIT_PC, NUM_FP_REGS, NUM_INT_REGS, NUM_LOG_REGS};
pub use trap::{Trap, TrapSlot};

/// Simulated clock cycle count.
pub type Cycle = u64;
