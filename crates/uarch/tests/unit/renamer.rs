//! Renamer tests: mapping discipline, reference counting, checkpoint
//! rollback, commit flow, and the physical-register conservation property.

use cprsim_core::common::NUM_LOG_REGS;
use cprsim_core::core::renamer::Renamer;
use proptest::prelude::*;

const PRF: usize = 96;

fn fresh() -> Renamer {
    Renamer::new(PRF, 8, 64)
}

/// Every physical register the free list hands out is accounted for: the
/// free count always equals the number of registers that are unmapped with
/// a zero use count. A double free would break this immediately.
fn assert_conserved(ren: &Renamer) {
    let freeable = (0..ren.prf_size())
        .filter(|&p| ren.is_unmapped(p) && ren.usage_of(p) == 0)
        .count();
    assert_eq!(ren.free_count(), freeable);
}

#[test]
fn initial_state_maps_logical_registers_identically() {
    let ren = fresh();
    for l in 0..NUM_LOG_REGS {
        assert_eq!(ren.mapping(l), l);
        assert!(ren.is_ready(l));
    }
    assert_eq!(ren.free_count(), PRF - NUM_LOG_REGS);
    assert_conserved(&ren);
}

#[test]
fn destination_rename_allocates_and_remaps() {
    let mut ren = fresh();
    let pr = ren.rename_rdst(5);
    assert!(pr >= NUM_LOG_REGS, "allocated from the free pool");
    assert_eq!(ren.mapping(5), pr);
    assert!(!ren.is_ready(pr), "new destination is not ready");
    assert_eq!(ren.usage_of(pr), 1, "destination holds itself");
    assert!(!ren.is_unmapped(pr));
    assert_conserved(&mut ren);
}

#[test]
fn source_rename_references_the_current_mapping() {
    let mut ren = fresh();
    let dst = ren.rename_rdst(3);
    let src = ren.rename_rsrc(3);
    assert_eq!(src, dst);
    assert_eq!(ren.usage_of(dst), 2);
    // The consumer read releases its reference.
    ren.write(dst, 42);
    assert_eq!(ren.read(src), 42);
    assert_eq!(ren.usage_of(dst), 0);
    assert!(!ren.is_unmapped(dst), "still named by the RMT");
    assert_conserved(&mut ren);
}

#[test]
fn overwritten_mapping_frees_once_unreferenced() {
    let mut ren = fresh();
    let old = ren.rename_rdst(7);
    ren.write(old, 1);
    let free_before = ren.free_count();
    let new = ren.rename_rdst(7);
    assert_ne!(old, new);
    // `old` became unmapped with zero references: exactly one slot returns,
    // one is consumed.
    assert_eq!(ren.free_count(), free_before);
    assert_conserved(&mut ren);
}

#[test]
fn stall_reg_reports_free_list_pressure() {
    let mut ren = fresh();
    let head_room = (PRF - NUM_LOG_REGS) as u64;
    assert!(!ren.stall_reg(head_room));
    assert!(ren.stall_reg(head_room + 1));
    let _ = ren.rename_rdst(1);
    assert!(ren.stall_reg(head_room));
}

#[test]
fn stall_checkpoint_counts_free_slots() {
    let mut ren = fresh();
    // One checkpoint (the committed state) is live out of eight.
    assert!(!ren.stall_checkpoint(7));
    assert!(ren.stall_checkpoint(8));
    ren.checkpoint();
    assert!(ren.stall_checkpoint(7));
}

#[test]
fn rollback_restores_the_snapshot_and_reports_the_mask() {
    let mut ren = fresh();
    let before = ren.mapping(4);

    // Interval 0: one load charged to the committed checkpoint's interval.
    let id0 = ren.assign_checkpoint(true, false, false, false, false);
    assert_eq!(id0, 0);
    ren.checkpoint(); // snapshot 1

    // Interval 1: a store and a redefinition of r4.
    let id1 = ren.assign_checkpoint(false, true, false, false, false);
    assert_eq!(id1, 1);
    let spec = ren.rename_rdst(4);
    ren.checkpoint(); // snapshot 2

    // Interval 2: speculative instructions beyond the restore point.
    let id2 = ren.assign_checkpoint(true, false, true, false, false);
    assert_eq!(id2, 2);

    // Resolve a misprediction at the end of interval 1: restore snapshot 2.
    let info = ren.rollback(1, true);
    assert_eq!(info.squash_mask, 1 << 2, "only the checkpoints from the restore point on");
    assert_eq!((info.loads, info.stores, info.branches), (1, 1, 0));
    assert_eq!(ren.mapping(4), spec, "snapshot 2 still names the speculative mapping");
    let (unc, loads, stores, branches) = ren.checkpoint_counters(2);
    assert_eq!((unc, loads, stores, branches), (0, 0, 0, 0), "restore point counters zeroed");
    assert_eq!(ren.live_checkpoints(), 3);
    assert_conserved(&mut ren);

    // Rolling back to the committed snapshot instead discards r4 entirely.
    let info = ren.rollback(0, false);
    assert_eq!(ren.mapping(4), before);
    assert!(info.squash_mask & 1 == 1);
    assert_conserved(&mut ren);
}

#[test]
fn precommit_then_commit_advances_the_architectural_state() {
    let mut ren = fresh();
    assert!(ren.precommit().is_none(), "a lone checkpoint never commits");

    let id = ren.assign_checkpoint(false, false, false, false, false);
    let pr = ren.rename_rdst(3);
    ren.checkpoint();
    assert!(ren.precommit().is_none(), "uncompleted instruction blocks commit");

    ren.write(pr, 7);
    ren.set_complete(id);
    let info = ren.precommit().expect("committable");
    assert_eq!(info.chkpt_id, 0);
    assert!(!info.exception);

    for l in 0..NUM_LOG_REGS {
        ren.commit(l);
    }
    ren.free_checkpoint();
    assert_eq!(ren.committed_value(3), 7);
    assert_eq!(ren.live_checkpoints(), 1);
    assert_conserved(&mut ren);
}

#[test]
fn squash_returns_to_the_committed_state() {
    let mut ren = fresh();
    let committed = ren.mapping(9);
    let _ = ren.assign_checkpoint(false, false, false, false, false);
    let _spec = ren.rename_rdst(9);
    ren.checkpoint();
    let _ = ren.assign_checkpoint(false, false, false, false, false);
    let _spec2 = ren.rename_rdst(9);

    ren.squash();
    assert_eq!(ren.mapping(9), committed);
    assert_eq!(ren.live_checkpoints(), 1);
    let (unc, ..) = ren.checkpoint_counters(0);
    assert_eq!(unc, 0);
}

#[test]
fn exception_flag_reaches_precommit() {
    let mut ren = fresh();
    let id = ren.assign_checkpoint(false, false, false, false, true);
    ren.set_exception(id);
    ren.set_complete(id);
    // Even a lone checkpoint commits when an exception is pending.
    let info = ren.precommit().expect("exception forces precommit");
    assert!(info.exception);
    assert!(info.csr);
}

/// The conservation property under random legal operation sequences:
/// renames, reads, writes, checkpoints, and full squashes never lose or
/// double-free a physical register.
#[derive(Debug, Clone)]
enum Op {
    RenameSrc(usize),
    RenameDst(usize),
    ReadOne,
    WriteOne,
    Checkpoint,
    Squash,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NUM_LOG_REGS).prop_map(Op::RenameSrc),
        (1..NUM_LOG_REGS).prop_map(Op::RenameDst),
        Just(Op::ReadOne),
        Just(Op::WriteOne),
        Just(Op::Checkpoint),
        Just(Op::Squash),
    ]
}

proptest! {
    #[test]
    fn physical_registers_are_conserved(ops in proptest::collection::vec(op_strategy(), 1..200)) {
        let mut ren = fresh();
        // Outstanding consumer references (sources awaiting read) and
        // producer holds (destinations awaiting writeback).
        let mut pending_reads: Vec<usize> = Vec::new();
        let mut pending_writes: Vec<usize> = Vec::new();

        for op in ops {
            match op {
                Op::RenameSrc(l) => {
                    pending_reads.push(ren.rename_rsrc(l));
                }
                Op::RenameDst(l) => {
                    if !ren.stall_reg(1) {
                        pending_writes.push(ren.rename_rdst(l));
                    }
                }
                Op::ReadOne => {
                    if let Some(pr) = pending_reads.pop() {
                        let _ = ren.read(pr);
                    }
                }
                Op::WriteOne => {
                    if let Some(pr) = pending_writes.pop() {
                        ren.write(pr, 0);
                    }
                }
                Op::Checkpoint => {
                    if !ren.stall_checkpoint(1) {
                        ren.checkpoint();
                    }
                }
                Op::Squash => {
                    // A complete squash first restores the renamer, then the
                    // squashed in-flight instructions release their holds.
                    ren.squash();
                    for pr in pending_reads.drain(..) {
                        ren.dec_usage(pr);
                    }
                    for pr in pending_writes.drain(..) {
                        ren.dec_usage(pr);
                    }
                }
            }
            assert_conserved(&ren);
        }
    }
}
