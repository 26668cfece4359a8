//! Top-level simulator: owns the pipeline (which owns the core) and wires
//! the reference model beside it.

use crate::common::NUM_LOG_REGS;
use crate::config::SimConfig;
use crate::core::pipeline::Pipeline;
use crate::mem::Memory;
use crate::ref_model::RefModel;
use crate::sim::loader;

/// The simulator.
#[derive(Debug)]
pub struct Simulator {
    /// The core.
    pub pipeline: Pipeline,
    stop_after: u64,
}

impl Simulator {
    /// Build a simulator for a program image.
    ///
    /// The core and the reference model each receive an independent copy of
    /// the loaded memory. Fast-skip runs the reference model ahead and
    /// copies its architectural state into the (empty) core.
    ///
    /// # Errors
    /// Returns a description for configuration or image errors.
    pub fn new(cfg: &SimConfig, image: &[u8]) -> Result<Self, String> {
        cfg.validate()?;
        let mut mem = Memory::new(cfg.memory.memory_mb as usize);
        let entry = loader::load_image(image, &mut mem)?;
        let oracle = RefModel::new(mem.clone(), entry);
        let mut pipeline = Pipeline::new(cfg, mem, oracle);
        pipeline.fetch_unit.set_pc(entry);
        pipeline.state.pc = entry;
        pipeline.oracle.state.pc = entry;

        let mut sim = Self { pipeline, stop_after: cfg.run.stop_after };
        if cfg.run.fast_skip > 0 {
            sim.fast_skip(cfg.run.fast_skip);
        }
        Ok(sim)
    }

    /// Run the reference model ahead by `n` instructions and inject its
    /// state into the empty core.
    fn fast_skip(&mut self, n: u64) {
        let p = &mut self.pipeline;
        p.oracle.skip(n);
        for r in 0..NUM_LOG_REGS {
            p.ren.set_committed_value(r, p.oracle.state.reg(r));
        }
        let pc = p.oracle.state.pc;
        let instret = p.oracle.state.instret;
        p.state = p.oracle.state.clone();
        p.state.instret = instret;
        p.mem = p.oracle.mem.clone();
        p.fetch_unit.set_pc(pc);
    }

    /// Run to completion: until the target program exits or the commit limit
    /// is reached. Returns the exit code (the reference model's code).
    pub fn run(&mut self) -> u64 {
        let limit = if self.stop_after == 0 { u64::MAX } else { self.stop_after };
        loop {
            self.pipeline.step(limit);
            if let Some(code) = self.pipeline.exit_code {
                return code;
            }
            if self.pipeline.instret() >= limit {
                tracing::info!(instret = self.pipeline.instret(), "commit limit reached");
                return 0;
            }
        }
    }

    /// Advance a single cycle (test harnesses).
    pub fn step(&mut self) {
        let limit = if self.stop_after == 0 { u64::MAX } else { self.stop_after };
        self.pipeline.step(limit);
    }

    /// The measurement report, with the cache counters gathered from the
    /// timing models.
    pub fn report(&self) -> String {
        let mut stats = self.pipeline.stats.clone();
        stats.l1i = self.pipeline.fetch_unit.ic.model.stats;
        stats.l1d = self.pipeline.lsu.dc.stats;
        if let Some(l2) = &self.pipeline.hier.l2 {
            stats.l2 = l2.stats;
        }
        if let Some(l3) = &self.pipeline.hier.l3 {
            stats.l3 = l3.stats;
        }
        stats.report()
    }
}
