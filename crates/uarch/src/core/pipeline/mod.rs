//! Stage orchestration and recovery wiring.
//!
//! The `Pipeline` owns every component of the core. One call to [`Pipeline::step`]
//! advances one logical cycle, invoking the stages in reverse pipeline order
//! so that each stage reads its incoming register before its producer
//! overwrites it:
//!
//! Retire → Writeback → Execute → Register Read → Issue → Dispatch →
//! Rename2 → Rename1 → Decode → Fetch2 → Fetch1.
//!
//! All pipeline registers hold only payload indices plus minimal bookkeeping;
//! the payload buffer is the sole storage for per-instruction state.

/// Decode stage.
mod decode;
/// Dispatch stage (LQ/SQ and issue-queue allocation).
mod dispatch;
/// Execute stage (per-lane chains, AGEN/ALU dispatch, LSU entry).
mod execute;
/// Register-read stage (wakeup of single-cycle producers, PRF reads).
mod regread;
/// Rename stages (bundle assembly and checkpointed renaming).
mod rename;
/// Retirement state machine, deferred AMO/CSR execution, and the checker.
mod retire;
/// Issue (wakeup/select) stage.
mod schedule;
/// Complete and selective squash.
mod squash;
/// Writeback stage and misprediction recovery.
mod writeback;

pub use retire::RetirePhase;

use crate::alu::AluTable;
use crate::common::{Cycle, INIT_PC};
use crate::config::{DisambigModel, SimConfig};
use crate::core::cache::CacheHierarchy;
use crate::core::fetch_queue::FetchQueue;
use crate::core::frontend::FetchUnit;
use crate::core::issue::IssueQueue;
use crate::core::lanes::{build_lanes, ExecutionLane, LaneSteering};
use crate::core::lsu::Lsu;
use crate::core::payload::PayloadBuffer;
use crate::core::renamer::Renamer;
use crate::mem::Memory;
use crate::ref_model::{ArchState, RefModel};
use crate::stats::SimStats;

/// One pipeline register slot: a payload index plus minimal bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineReg {
    /// Slot holds an instruction.
    pub valid: bool,
    /// Payload buffer index.
    pub index: usize,
    /// Enclosing checkpoint id (set from Rename2 onwards).
    pub chkpt_id: u64,
}

/// Aggregated retirement state (see the retire module).
#[derive(Debug, Clone, Copy)]
pub struct RetireState {
    /// Current phase of the retirement machine.
    pub phase: RetirePhase,
    /// Committing checkpoint id.
    pub chkpt_id: u64,
    /// Loads not yet committed for this checkpoint.
    pub loads_left: u64,
    /// Stores not yet committed for this checkpoint.
    pub stores_left: u64,
    /// Branches not yet committed for this checkpoint.
    pub branches_left: u64,
    /// Checkpoint encloses an AMO.
    pub amo: bool,
    /// Checkpoint encloses a CSR instruction.
    pub csr: bool,
    /// An exception fires at this checkpoint.
    pub exception: bool,
    /// Next logical register to commit during bulk commit.
    pub log_reg: usize,
}

impl Default for RetireState {
    fn default() -> Self {
        Self {
            phase: RetirePhase::Idle,
            chkpt_id: 0,
            loads_left: 0,
            stores_left: 0,
            branches_left: 0,
            amo: false,
            csr: false,
            exception: false,
            log_reg: 0,
        }
    }
}

/// The complete core: every stage, queue, and collaborator.
#[derive(Debug)]
pub struct Pipeline {
    // Widths.
    pub(crate) fetch_width: usize,
    pub(crate) dispatch_width: usize,
    pub(crate) issue_width: usize,
    pub(crate) retire_width: usize,
    pub(crate) presteer: bool,
    pub(crate) disambig_model: DisambigModel,

    /// Current simulated cycle.
    pub cycle: Cycle,
    /// Centralized payload arena.
    pub pay: PayloadBuffer,
    /// Two-stage front end.
    pub fetch_unit: FetchUnit,
    /// Fetch2 → Decode register.
    pub decode_regs: Vec<PipelineReg>,
    /// Decode → Rename fetch queue.
    pub fq: FetchQueue,
    /// Rename1 → Rename2 register.
    pub rename2_regs: Vec<PipelineReg>,
    /// The checkpoint-based renamer.
    pub ren: Renamer,
    /// Rename2 → Dispatch register.
    pub dispatch_regs: Vec<PipelineReg>,
    /// The issue queue.
    pub iq: IssueQueue,
    /// Execution lanes.
    pub lanes: Vec<ExecutionLane>,
    /// FU-type lane steering.
    pub steering: LaneSteering,
    /// The load/store unit.
    pub lsu: Lsu,
    /// Unified cache levels behind both L1s.
    pub hier: CacheHierarchy,
    /// The core's memory image.
    pub mem: Memory,
    /// The core's architectural CSR state.
    pub state: ArchState,
    /// The functional reference model.
    pub oracle: RefModel,
    /// ALU dispatch table.
    pub alu_table: AluTable,
    /// Simulation counters.
    pub stats: SimStats,
    /// Retirement state machine.
    pub retstate: RetireState,
    /// Instructions renamed since the last checkpoint was created.
    pub instr_renamed_since_last_checkpoint: u64,
    /// Set when the target program's exit call retires.
    pub exit_code: Option<u64>,
}

impl Pipeline {
    /// Build a core from the configuration, its memory image, and the
    /// reference model (which owns an independent image).
    pub fn new(cfg: &SimConfig, mem: Memory, oracle: RefModel) -> Self {
        // In-flight capacity: the active window plus the fetch queue plus
        // the front-of-pipe registers.
        let inflight = cfg.core.active_size
            + cfg.core.fetch_queue_size
            + 4 * cfg.core.fetch_width.max(cfg.core.dispatch_width);
        let pay = PayloadBuffer::new(inflight as usize);
        let mut stats = SimStats::default();
        if cfg.run.pc_histogram {
            stats.pc_histogram = Some(std::collections::HashMap::new());
        }
        Self {
            fetch_width: cfg.core.fetch_width as usize,
            dispatch_width: cfg.core.dispatch_width as usize,
            issue_width: cfg.core.issue_width as usize,
            retire_width: cfg.core.retire_width as usize,
            presteer: cfg.core.presteer,
            disambig_model: cfg.disambig.model,
            cycle: 0,
            fetch_unit: FetchUnit::new(cfg, INIT_PC),
            decode_regs: vec![PipelineReg::default(); cfg.core.fetch_width as usize],
            fq: FetchQueue::new(cfg.core.fetch_queue_size),
            rename2_regs: vec![PipelineReg::default(); cfg.core.dispatch_width as usize],
            ren: Renamer::new(cfg.core.prf_size as usize, cfg.core.num_checkpoints, cfg.core.active_size),
            dispatch_regs: vec![PipelineReg::default(); cfg.core.dispatch_width as usize],
            iq: IssueQueue::new(cfg.core.iq_size, cfg.core.iq_num_parts, cfg.core.age_based_select),
            lanes: build_lanes(&cfg.lanes, cfg.core.issue_width),
            steering: LaneSteering::new(&cfg.lanes, cfg.core.issue_width),
            lsu: Lsu::new(
                cfg.core.lq_size,
                cfg.core.sq_size,
                cfg.disambig,
                cfg.oracle.perfect_dcache,
                &cfg.memory.l1d,
            ),
            hier: CacheHierarchy::new(&cfg.memory),
            mem,
            state: ArchState::new(INIT_PC),
            oracle,
            alu_table: AluTable::new(),
            stats,
            retstate: RetireState::default(),
            instr_renamed_since_last_checkpoint: 0,
            exit_code: None,
            pay,
        }
    }

    /// Advance one cycle: all stages in reverse pipeline order.
    pub fn step(&mut self, instret_limit: u64) {
        self.retire(instret_limit);
        if self.exit_code.is_some() {
            return;
        }
        for lane in 0..self.issue_width {
            self.writeback(lane);
        }
        for lane in 0..self.issue_width {
            self.execute(lane);
        }
        self.load_replay();
        for lane in 0..self.issue_width {
            self.register_read(lane);
        }
        self.schedule();
        self.dispatch();
        self.rename2();
        self.rename1();
        self.decode();

        // Fetch2 gates Fetch1: a misfetch discards the bundle Fetch1 would
        // have produced this cycle, modeling the repredict bubble.
        if self.fetch_unit.fetch2(&mut self.decode_regs, &mut self.pay, &mut self.stats) {
            self.fetch_unit
                .fetch1(self.cycle, &mut self.pay, &mut self.oracle, &self.mem, &mut self.hier);
        }

        self.cycle += 1;
        self.stats.cycles += 1;
    }

    /// Retired-instruction count so far.
    pub const fn instret(&self) -> u64 {
        self.state.instret
    }
}
