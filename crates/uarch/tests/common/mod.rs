//! Shared test infrastructure: instruction encoders and a program harness.

/// RV64 instruction encoders for building test programs.
pub mod asm;

use cprsim_core::{SimConfig, Simulator};

/// Turn instruction words into a little-endian flat image.
pub fn assemble(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// A small-structure configuration that still exercises every component.
pub fn quick_config() -> SimConfig {
    let mut cfg = SimConfig::default();
    cfg.memory.memory_mb = 16;
    cfg
}

/// Run a program to completion under `cfg`; returns the exit code and the
/// finished simulator for inspection.
///
/// Panics if the program does not exit within a generous cycle bound, so a
/// deadlocked pipeline fails the test instead of hanging it.
pub fn run_words_with(cfg: &SimConfig, words: &[u32]) -> (u64, Simulator) {
    let image = assemble(words);
    let mut sim = Simulator::new(cfg, &image).expect("simulator construction");
    for _ in 0..2_000_000u64 {
        sim.step();
        if let Some(code) = sim.pipeline.exit_code {
            return (code, sim);
        }
    }
    panic!("program did not exit within the cycle bound");
}

/// Run a program under the default quick configuration.
pub fn run_words(words: &[u32]) -> (u64, Simulator) {
    run_words_with(&quick_config(), words)
}
