//! Configuration system for the simulator.
//!
//! This module defines all configuration structures used to parameterize the
//! core. It provides:
//! 1. **Defaults:** a runnable 4-wide baseline configuration.
//! 2. **Structures:** hierarchical config for the core, front end, execution
//!    lanes, memory hierarchy, oracle modes, and disambiguation.
//!
//! Configuration is supplied as JSON (`-c<file>`) layered under CLI flag
//! overrides, or use `SimConfig::default()`.

use serde::Deserialize;

/// Default configuration constants.
mod defaults {
    /// Fetch/decode width (instructions per cycle, power of two).
    pub const FETCH_WIDTH: u64 = 4;
    /// Rename/dispatch width.
    pub const DISPATCH_WIDTH: u64 = 4;
    /// Issue width (number of execution lanes).
    pub const ISSUE_WIDTH: u64 = 4;
    /// Retire width (work-units per bulk-commit cycle).
    pub const RETIRE_WIDTH: u64 = 4;
    /// Fetch queue entries.
    pub const FETCH_QUEUE_SIZE: u64 = 32;
    /// Checkpoints for mispredict recovery (1..=64).
    pub const NUM_CHECKPOINTS: u64 = 8;
    /// Active window (ROB) size.
    pub const ACTIVE_SIZE: u64 = 128;
    /// Physical register file size.
    pub const PRF_SIZE: u64 = 192;
    /// Issue queue entries.
    pub const IQ_SIZE: u64 = 32;
    /// Issue queue partitions for rotated priority.
    pub const IQ_NUM_PARTS: u64 = 4;
    /// Load queue entries.
    pub const LQ_SIZE: u64 = 32;
    /// Store queue entries.
    pub const SQ_SIZE: u64 = 32;

    /// Branch queue entries.
    pub const BQ_SIZE: u64 = 32;
    /// BTB total entries.
    pub const BTB_ENTRIES: u64 = 1024;
    /// BTB set-associativity.
    pub const BTB_ASSOC: u64 = 4;
    /// RAS entries.
    pub const RAS_SIZE: u64 = 16;
    /// Maximum conditional branches predicted per cycle ("m").
    pub const COND_BRANCH_PER_CYCLE: u64 = 2;
    /// Conditional gshare PC index bits.
    pub const CBP_PC_LENGTH: u64 = 12;
    /// Conditional gshare BHR bits.
    pub const CBP_BHR_LENGTH: u64 = 8;
    /// Indirect gshare PC index bits.
    pub const IBP_PC_LENGTH: u64 = 12;
    /// Indirect gshare BHR bits.
    pub const IBP_BHR_LENGTH: u64 = 8;

    /// L1 cache size in bytes (both sides).
    pub const L1_SIZE: u64 = 32 * 1024;
    /// L1 associativity.
    pub const L1_ASSOC: u64 = 4;
    /// L1 block size in bytes.
    pub const L1_BLOCK: u64 = 64;
    /// L1 MHSR count.
    pub const L1_MHSRS: u64 = 8;
    /// L1 hit latency in cycles.
    pub const L1_HIT: u64 = 1;
    /// L2 cache size in bytes.
    pub const L2_SIZE: u64 = 512 * 1024;
    /// L2 associativity.
    pub const L2_ASSOC: u64 = 8;
    /// L2 hit latency in cycles.
    pub const L2_HIT: u64 = 10;
    /// L3 cache size in bytes.
    pub const L3_SIZE: u64 = 4 * 1024 * 1024;
    /// L3 associativity.
    pub const L3_ASSOC: u64 = 16;
    /// L3 hit latency in cycles.
    pub const L3_HIT: u64 = 30;
    /// Fixed miss penalty beyond the last cache level.
    pub const MEM_LATENCY: u64 = 100;
    /// Main memory size in megabytes.
    pub const MEMORY_MB: u64 = 256;

    /// Memory-dependence predictor counter maximum.
    pub const MDP_MAX: u64 = 7;
}

/// Speculative-disambiguation model for loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DisambigModel {
    /// Every load waits for all prior store addresses (always predict conflict).
    AlwaysConflict,
    /// Loads never wait for unknown store addresses.
    NeverConflict,
    /// Memory-dependence predictor, sticky: once a violation, always stall.
    MdpSticky,
    /// Memory-dependence predictor with saturating counters.
    #[default]
    MdpCounter,
    /// Store addresses known at dispatch from the reference model.
    Oracle,
}

/// Core widths and window sizes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Fetch/decode width (power of two; also the BTB bank count).
    pub fetch_width: u64,
    /// Rename/dispatch width.
    pub dispatch_width: u64,
    /// Issue width (number of execution lanes).
    pub issue_width: u64,
    /// Retire width.
    pub retire_width: u64,
    /// Fetch queue entries.
    pub fetch_queue_size: u64,
    /// Checkpoint count (1..=64; the squash mask is one machine word).
    pub num_checkpoints: u64,
    /// Active window size (bounds instructions per checkpoint).
    pub active_size: u64,
    /// Physical register file size.
    pub prf_size: u64,
    /// Issue queue entries.
    pub iq_size: u64,
    /// Issue queue partitions for rotated selection priority.
    pub iq_num_parts: u64,
    /// Load queue entries.
    pub lq_size: u64,
    /// Store queue entries.
    pub sq_size: u64,
    /// Fix each instruction's lane at dispatch instead of issue.
    pub presteer: bool,
    /// Age-based issue selection (default is position-based).
    pub age_based_select: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            fetch_width: defaults::FETCH_WIDTH,
            dispatch_width: defaults::DISPATCH_WIDTH,
            issue_width: defaults::ISSUE_WIDTH,
            retire_width: defaults::RETIRE_WIDTH,
            fetch_queue_size: defaults::FETCH_QUEUE_SIZE,
            num_checkpoints: defaults::NUM_CHECKPOINTS,
            active_size: defaults::ACTIVE_SIZE,
            prf_size: defaults::PRF_SIZE,
            iq_size: defaults::IQ_SIZE,
            iq_num_parts: defaults::IQ_NUM_PARTS,
            lq_size: defaults::LQ_SIZE,
            sq_size: defaults::SQ_SIZE,
            presteer: false,
            age_based_select: false,
        }
    }
}

/// Front-end predictor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Branch queue entries (outstanding branches fetch-to-retire).
    pub bq_size: u64,
    /// BTB total entries.
    pub btb_entries: u64,
    /// BTB set-associativity.
    pub btb_assoc: u64,
    /// RAS entries.
    pub ras_size: u64,
    /// Maximum conditional branches per fetch bundle ("m").
    pub cond_branch_per_cycle: u64,
    /// Conditional gshare: PC index bits.
    pub cbp_pc_length: u64,
    /// Conditional gshare: BHR bits.
    pub cbp_bhr_length: u64,
    /// Indirect gshare: PC index bits.
    pub ibp_pc_length: u64,
    /// Indirect gshare: BHR bits.
    pub ibp_bhr_length: u64,
    /// Enable the trace cache.
    pub trace_cache: bool,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            bq_size: defaults::BQ_SIZE,
            btb_entries: defaults::BTB_ENTRIES,
            btb_assoc: defaults::BTB_ASSOC,
            ras_size: defaults::RAS_SIZE,
            cond_branch_per_cycle: defaults::COND_BRANCH_PER_CYCLE,
            cbp_pc_length: defaults::CBP_PC_LENGTH,
            cbp_bhr_length: defaults::CBP_BHR_LENGTH,
            ibp_pc_length: defaults::IBP_PC_LENGTH,
            ibp_bhr_length: defaults::IBP_BHR_LENGTH,
            trace_cache: false,
        }
    }
}

/// Execution-lane configuration: per-FU-type lane masks and latencies.
///
/// Index order: branch, load/store, int-simple, int-complex, FP load/store,
/// FP-arith, move-to-FP.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Bit vector per FU type indicating which lanes support it.
    pub fu_lane_matrix: [u64; 7],
    /// Execution latency per FU type.
    pub fu_latency: [u64; 7],
}

impl Default for LaneConfig {
    fn default() -> Self {
        // Universal lanes: every FU type on every lane, single-cycle.
        Self { fu_lane_matrix: [0xFFFF; 7], fu_latency: [1; 7] }
    }
}

/// One cache level's geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheLevelConfig {
    /// Total size in bytes.
    pub size_bytes: u64,
    /// Associativity (ways).
    pub assoc: u64,
    /// Block size in bytes (power of two).
    pub block_bytes: u64,
    /// Miss-handling status registers.
    pub mhsrs: u64,
    /// Hit latency in cycles.
    pub hit_latency: u64,
}

impl CacheLevelConfig {
    const fn level(size_bytes: u64, assoc: u64, hit_latency: u64) -> Self {
        Self {
            size_bytes,
            assoc,
            block_bytes: defaults::L1_BLOCK,
            mhsrs: defaults::L1_MHSRS,
            hit_latency,
        }
    }
}

impl Default for CacheLevelConfig {
    fn default() -> Self {
        Self::level(defaults::L1_SIZE, defaults::L1_ASSOC, defaults::L1_HIT)
    }
}

/// Memory hierarchy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// L1 instruction cache.
    pub l1i: CacheLevelConfig,
    /// L1 data cache.
    pub l1d: CacheLevelConfig,
    /// Unified L2 cache.
    pub l2: CacheLevelConfig,
    /// Unified L3 cache.
    pub l3: CacheLevelConfig,
    /// L2 present.
    pub l2_present: bool,
    /// L3 present.
    pub l3_present: bool,
    /// Fixed miss penalty beyond the last cache level.
    pub mem_latency: u64,
    /// Main memory size in megabytes.
    pub memory_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            l1i: CacheLevelConfig::default(),
            l1d: CacheLevelConfig::default(),
            l2: CacheLevelConfig::level(defaults::L2_SIZE, defaults::L2_ASSOC, defaults::L2_HIT),
            l3: CacheLevelConfig::level(defaults::L3_SIZE, defaults::L3_ASSOC, defaults::L3_HIT),
            l2_present: true,
            l3_present: false,
            mem_latency: defaults::MEM_LATENCY,
            memory_mb: defaults::MEMORY_MB,
        }
    }
}

/// Oracle (perfect-structure) switches.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Perfect branch prediction via the reference model.
    pub perfect_branch_pred: bool,
    /// Perfect data cache (every access hits).
    pub perfect_dcache: bool,
    /// Perfect instruction cache.
    pub perfect_icache: bool,
    /// Perfect trace cache (only meaningful with the trace cache enabled).
    pub perfect_trace_cache: bool,
}

/// Load/store disambiguation configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DisambigConfig {
    /// Disambiguation model.
    pub model: DisambigModel,
    /// MDP saturating-counter maximum (MdpCounter model).
    pub mdp_max: u64,
}

impl Default for DisambigConfig {
    fn default() -> Self {
        Self { model: DisambigModel::default(), mdp_max: defaults::MDP_MAX }
    }
}

/// Run control.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many committed instructions (0 = unlimited).
    pub stop_after: u64,
    /// Fast-skip this many instructions before timing simulation.
    pub fast_skip: u64,
    /// Enable stage logging after this many commits.
    pub log_after: u64,
    /// Track a histogram of retired PCs.
    pub pc_histogram: bool,
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use cprsim_core::config::SimConfig;
///
/// let config = SimConfig::default();
/// assert_eq!(config.core.fetch_width, 4);
/// assert!(config.core.num_checkpoints <= 64);
///
/// let json = r#"{ "core": { "fetch_width": 8, "num_checkpoints": 16 } }"#;
/// let config: SimConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.core.fetch_width, 8);
/// assert_eq!(config.core.num_checkpoints, 16);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Core widths and window sizes.
    pub core: CoreConfig,
    /// Front-end predictors.
    pub frontend: FrontendConfig,
    /// Execution lanes.
    pub lanes: LaneConfig,
    /// Memory hierarchy.
    pub memory: MemoryConfig,
    /// Oracle switches.
    pub oracle: OracleConfig,
    /// Disambiguation model.
    pub disambig: DisambigConfig,
    /// Run control.
    pub run: RunConfig,
}

impl SimConfig {
    /// Validate cross-field constraints that the type system cannot express.
    ///
    /// # Errors
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if !crate::common::is_pow2(self.core.fetch_width) {
            return Err("fetch width must be a power of two (BTB banking)".into());
        }
        if self.core.num_checkpoints == 0 || self.core.num_checkpoints > 64 {
            return Err("checkpoint count must be in 1..=64 (squash mask is one word)".into());
        }
        if self.core.prf_size <= crate::common::NUM_LOG_REGS as u64 {
            return Err("PRF must be larger than the logical register space".into());
        }
        if self.core.active_size == 0 {
            return Err("active window must be non-empty".into());
        }
        Ok(())
    }
}
