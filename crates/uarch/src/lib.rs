//! Cycle-accurate, speculative, out-of-order superscalar RISC-V core simulator.
//!
//! This crate implements a checkpoint-based out-of-order core model with the following:
//! 1. **Front end:** two-stage fetch with multi-way BTB, gshare conditional and indirect
//!    predictors, return-address stack, optional trace cache, and a branch queue for
//!    precise predictor rollback.
//! 2. **Rename:** checkpoint-based register renamer with reference-counted physical
//!    registers (RMT, free list, PRF, checkpoint buffer).
//! 3. **Back end:** issue queue with speculative wakeup/select, per-lane execution
//!    pipelines, and a load/store unit with speculative memory disambiguation.
//! 4. **Retirement:** a three-state bulk-commit machine with precise recovery for
//!    mispredictions, load violations, and exceptions, checked instruction-by-
//!    instruction against a functional reference model.
//! 5. **Memory:** L1-I/L1-D/L2/L3 timing caches with MHSRs and a flat physical memory.

/// ALU dispatch tables (opcode match/mask to executor function).
pub mod alu;
/// Common types and constants (traps, register space, cycle/address types).
pub mod common;
/// Simulator configuration (defaults and hierarchical config structures).
pub mod config;
/// The out-of-order core: front end, rename, issue, execute, LSU, retire.
pub mod core;
/// Instruction set: field extraction, predecode, execution helpers, disassembly.
pub mod isa;
/// Flat physical memory with typed, trap-raising access methods.
pub mod mem;
/// Functional reference model: in-order run-ahead interpreter and oracle buffer.
pub mod ref_model;
/// Simulation driver: binary/ELF loader and the top-level `Simulator`.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `SimConfig::default()` or deserialize from JSON.
pub use crate::config::SimConfig;
/// Top-level simulator; owns the pipeline and the reference model side-by-side.
pub use crate::sim::simulator::Simulator;
