//! The out-of-order core.
//!
//! Components are organized leaves-first: predictors and queues under
//! `frontend`, the payload arena, the checkpoint-based renamer, the issue
//! queue, execution lanes, the load/store unit, the cache timing models, and
//! the `pipeline` module that owns and orchestrates all of them.

/// Cache timing models (generic set-associative cache with MHSRs, hierarchy).
pub mod cache;
/// Fetch queue between the Decode and Rename stages.
pub mod fetch_queue;
/// Fetch-and-predict front end (BTB, gshare, RAS, trace cache, branch queue).
pub mod frontend;
/// Issue queue with speculative wakeup/select.
pub mod issue;
/// Per-lane execution pipelines and function-unit steering.
pub mod lanes;
/// Load/store unit with speculative disambiguation.
pub mod lsu;
/// Centralized per-instruction payload arena.
pub mod payload;
/// Stage orchestration, recovery wiring, and the retirement state machine.
pub mod pipeline;
/// Checkpoint-based register renamer.
pub mod renamer;
