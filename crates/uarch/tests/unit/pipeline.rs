//! Whole-pipeline tests.
//!
//! Every retired instruction is checked against the functional reference
//! model inside the retire stage, so a program that runs to its exit call
//! has demonstrated architectural equivalence along the way. These tests
//! drive the recovery machinery: branch mispredicts, BTB misfetches,
//! serialized atomics and CSRs, load-order violations, and store-to-load
//! forwarding.

use crate::common::{asm, quick_config, run_words, run_words_with};
use cprsim_core::config::DisambigModel;
use pretty_assertions::assert_eq;

#[test]
fn straight_line_arithmetic() {
    let mut words = vec![
        asm::addi(5, 0, 2),
        asm::addi(6, 0, 3),
        asm::add(7, 5, 6),
        asm::addi(17, 0, 93),
        asm::addi(10, 7, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words(&words);
    assert_eq!(code, 5);
    assert_eq!(sim.pipeline.stats.instret, 6);
}

#[test]
fn counted_loop_with_conditional_branches() {
    // sum = 1 + 2 + ... + 10, a taken back-edge that finally falls through.
    let mut words = vec![
        asm::addi(5, 0, 0),  // sum
        asm::addi(6, 0, 1),  // i
        asm::addi(7, 0, 11), // limit
        // loop:
        asm::add(5, 5, 6),
        asm::addi(6, 6, 1),
        asm::blt(6, 7, -8),
        asm::addi(17, 0, 93),
        asm::addi(10, 5, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words(&words);
    assert_eq!(code, 55);
    let b = &sim.pipeline.stats.branches;
    assert_eq!(b.branch_n, 10, "ten retired conditional branches");
    assert!(b.branch_m >= 1, "the final fall-through mispredicts at least once");
}

#[test]
fn perfect_branch_prediction_never_mispredicts() {
    let mut cfg = quick_config();
    cfg.oracle.perfect_branch_pred = true;
    cfg.oracle.perfect_icache = true;
    cfg.oracle.perfect_dcache = true;
    let mut words = vec![
        asm::addi(5, 0, 0),
        asm::addi(6, 0, 1),
        asm::addi(7, 0, 11),
        asm::add(5, 5, 6),
        asm::addi(6, 6, 1),
        asm::blt(6, 7, -8),
        asm::addi(17, 0, 93),
        asm::addi(10, 5, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words_with(&cfg, &words);
    assert_eq!(code, 55);
    let b = &sim.pipeline.stats.branches;
    assert_eq!(b.branch_m, 0);
    assert_eq!(b.jumpret_m, 0);
    assert_eq!(sim.pipeline.stats.selective_squashes, 0);
}

#[test]
fn calls_and_returns_exercise_the_ras() {
    // main calls a leaf twice; the leaf returns through the RAS.
    let mut words = vec![
        asm::addi(5, 0, 0),      // 0x2000
        asm::jal(1, 0x18),       // 0x2004 -> 0x201C (leaf)
        asm::jal(1, 0x14),       // 0x2008 -> 0x201C
        asm::addi(17, 0, 93),    // 0x200C
        asm::addi(10, 5, 0),     // 0x2010
        asm::ecall(),            // 0x2014
        asm::nop(),              // 0x2018
        // leaf:
        asm::addi(5, 5, 21),     // 0x201C
        asm::jalr(0, 1, 0),      // 0x2020 return
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words(&words);
    assert_eq!(code, 42);
    let b = &sim.pipeline.stats.branches;
    assert_eq!(b.calldir_n, 2);
    assert_eq!(b.jumpret_n, 2);
}

#[test]
fn store_to_load_forwarding_supplies_the_value() {
    let mut words = vec![
        asm::addi(5, 0, 0x400),
        asm::addi(6, 0, 0x77),
        asm::sw(6, 5, 0),
        asm::lw(7, 5, 0), // forwards from the uncommitted store
        asm::addi(17, 0, 93),
        asm::addi(10, 7, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words(&words);
    assert_eq!(code, 0x77);
    assert!(sim.pipeline.stats.lsu.forward >= 1);
}

#[test]
fn partial_size_overlap_resolves_to_the_architectural_value() {
    // A word store followed by a byte load of the same location: the
    // partial-overlap path must still produce the architectural byte.
    let mut words = vec![
        asm::addi(5, 0, 0x400),
        asm::addi(6, 0, 0x7F),
        asm::sw(6, 5, 0),
        asm::lb(7, 5, 0),
        asm::addi(17, 0, 93),
        asm::addi(10, 7, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, _sim) = run_words(&words);
    assert_eq!(code, 0x7F);
}

#[test]
fn late_store_address_triggers_violation_recovery() {
    // The store's address drags through a dependency chain while the load's
    // address is ready immediately: under the counter MDP the load runs
    // ahead, is caught by the arriving store address, recovers, and replays.
    let mut cfg = quick_config();
    cfg.disambig.model = DisambigModel::MdpCounter;
    let mut words = vec![
        asm::addi(10, 0, 0x400), // base, ready early
        asm::addi(11, 0, 7),     // store data
        asm::addi(12, 10, 0),    // address chain...
        asm::addi(12, 12, 0),
        asm::addi(12, 12, 0),
        asm::addi(12, 12, 0),
        asm::addi(12, 12, 0),
        asm::addi(12, 12, 0),
        asm::sd(11, 12, 0),      // address late
        asm::ld(13, 10, 0),      // same location, address early
        asm::addi(17, 0, 93),
        asm::addi(10, 13, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words_with(&cfg, &words);
    assert_eq!(code, 7, "the committed load value is the in-order one");
    assert!(
        sim.pipeline.stats.load_violation_squashes >= 1,
        "the speculative load was caught and replayed"
    );
}

#[test]
fn always_conflict_never_violates() {
    let mut cfg = quick_config();
    cfg.disambig.model = DisambigModel::AlwaysConflict;
    let mut words = vec![
        asm::addi(10, 0, 0x400),
        asm::addi(11, 0, 9),
        asm::addi(12, 10, 0),
        asm::addi(12, 12, 0),
        asm::addi(12, 12, 0),
        asm::sd(11, 12, 0),
        asm::ld(13, 10, 0),
        asm::addi(17, 0, 93),
        asm::addi(10, 13, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words_with(&cfg, &words);
    assert_eq!(code, 9);
    assert_eq!(sim.pipeline.stats.load_violation_squashes, 0);
    assert_eq!(sim.pipeline.stats.lsu.load_violation, 0);
}

#[test]
fn atomic_executes_at_retirement_with_a_full_squash() {
    // amoadd returns the old value and leaves the sum in memory.
    let mut words = vec![
        asm::addi(5, 0, 0x400),
        asm::addi(6, 0, 5),
        asm::sd(6, 5, 0),
        asm::addi(7, 0, 7),
        asm::amoadd_d(8, 7, 5), // x8 = 5, memory = 12
        asm::ld(9, 5, 0),       // 12
        asm::addi(17, 0, 93),
        asm::add(10, 8, 9),     // 17
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words(&words);
    assert_eq!(code, 17);
    assert!(sim.pipeline.stats.instret >= 9);
}

#[test]
fn csr_scratch_roundtrip() {
    let mut words = vec![
        asm::addi(5, 0, 0x123),
        asm::csrrw(0, 0x140, 5), // sscratch = 0x123
        asm::csrrs(6, 0x140, 0), // x6 = sscratch
        asm::addi(17, 0, 93),
        asm::addi(10, 6, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, _sim) = run_words(&words);
    assert_eq!(code, 0x123);
}

#[test]
fn stale_btb_entry_is_misfetched_and_invalidated() {
    // Self-modifying sequence: a location first holds an always-taken
    // branch (training the BTB), is overwritten with an ALU op, and is
    // re-executed after a serializing CSR drains the store. The front end
    // must detect both the initial miss and the stale identification.
    let mut words = vec![
        asm::lui(5, 2),            // 0x2000: x5 = 0x2000
        asm::addi(5, 5, 0x18),     // 0x2004: x5 = 0x2018 (patch target)
        asm::lui(6, 0x100),        // 0x2008
        asm::addi(6, 6, 0x393),    // 0x200C: x6 = encoding of addi x7,x0,1
        asm::nop(),                // 0x2010
        asm::nop(),                // 0x2014
        asm::beq(0, 0, 8),         // 0x2018: patch target; taken -> 0x2020
        asm::bne(7, 0, 24),        // 0x201C: after patch x7=1 -> 0x2034
        asm::sw(6, 5, 0),          // 0x2020: overwrite 0x2018
        asm::csrrs(0, 0x140, 0),   // 0x2024: serialize; the store commits
        asm::jal(0, -16),          // 0x2028: back to 0x2018
        asm::nop(),                // 0x202C
        asm::nop(),                // 0x2030
        asm::addi(17, 0, 93),      // 0x2034
        asm::addi(10, 0, 7),       // 0x2038
        asm::ecall(),              // 0x203C
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words(&words);
    assert_eq!(code, 7);
    assert!(
        sim.pipeline.stats.branches.btb_misfetch >= 2,
        "one train on first sight, one invalidate on the stale hit"
    );
}

#[test]
fn fast_skip_hands_off_architectural_state() {
    let mut cfg = quick_config();
    cfg.run.fast_skip = 3; // skip the three setup instructions
    let mut words = vec![
        asm::addi(5, 0, 11),
        asm::addi(6, 0, 31),
        asm::add(7, 5, 6),
        asm::addi(17, 0, 93),
        asm::addi(10, 7, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, sim) = run_words_with(&cfg, &words);
    assert_eq!(code, 42);
    assert_eq!(sim.pipeline.stats.instret, 3, "only the tail ran in the timing core");
}

#[test]
fn commit_limit_pauses_retirement() {
    let mut cfg = quick_config();
    cfg.run.stop_after = 4;
    let mut words = vec![
        asm::addi(5, 0, 1),
        asm::addi(5, 5, 1),
        asm::addi(5, 5, 1),
        asm::addi(5, 5, 1),
        asm::addi(5, 5, 1),
        asm::addi(5, 5, 1),
        asm::addi(17, 0, 93),
        asm::addi(10, 5, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let image = crate::common::assemble(&words);
    let mut sim = cprsim_core::Simulator::new(&cfg, &image).expect("simulator");
    let code = sim.run();
    assert_eq!(code, 0, "stopped by the limit, not by the program");
    assert_eq!(sim.pipeline.stats.instret, 4);
}

#[test]
fn trace_cache_supplies_bundles_across_branches() {
    let mut cfg = quick_config();
    cfg.frontend.trace_cache = true;
    cfg.oracle.perfect_trace_cache = true;
    let mut words = vec![
        asm::addi(5, 0, 0),
        asm::addi(6, 0, 1),
        asm::addi(7, 0, 5),
        asm::add(5, 5, 6),
        asm::addi(6, 6, 1),
        asm::blt(6, 7, -8),
        asm::addi(17, 0, 93),
        asm::addi(10, 5, 0),
        asm::ecall(),
    ];
    words.extend([asm::nop(); 4]);
    let (code, _sim) = run_words_with(&cfg, &words);
    assert_eq!(code, 10);
}
