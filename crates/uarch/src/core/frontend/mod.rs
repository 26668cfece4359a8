//! The fetch-and-predict front end.
//!
//! The front end is a two-stage pipeline (Fetch1/Fetch2) composed from:
//! 1. **Branch queue** — in-flight branch contexts for precise rollback.
//! 2. **Gshare predictors** — conditional (multi-prediction) and indirect.
//! 3. **RAS** — speculative return-address stack with TOS checkpointing.
//! 4. **BTB** — banked, set-associative branch identification.
//! 5. **Trace cache** — whole-bundle supply across branches (optional).
//! 6. **L1-I timing model** — instruction cache with MHSRs.

/// Branch queue (in-flight branch contexts).
pub mod bq;
/// Banked set-associative branch target buffer.
pub mod btb;
/// The two-stage fetch unit composing all front-end structures.
pub mod fetch;
/// Gshare index generation and BHR management.
pub mod gshare;
/// Instruction-cache timing wrapper.
pub mod icache;
/// Circular return-address stack.
pub mod ras;
/// Trace cache.
pub mod tc;

pub use btb::{BranchKind, FetchSlot, SpecUpdate};
pub use fetch::FetchUnit;
