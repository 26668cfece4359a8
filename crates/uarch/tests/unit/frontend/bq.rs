//! Branch queue tests: wrap-around phase bits, rollback semantics, flush.

use cprsim_core::core::frontend::bq::{BranchQueue, PredTag};

#[test]
fn wrap_after_mixed_pushes_and_pops() {
    // size=4, push x3, pop x2, push x2: head=2, tail=1, head phase still
    // false, tail phase flipped by the wrap.
    let mut bq = BranchQueue::new(4);
    for _ in 0..3 {
        bq.push();
    }
    bq.pop();
    bq.pop();
    let _ = bq.push(); // slot 3
    let (tag, phase) = bq.push(); // wraps to slot 0
    assert_eq!(tag, 0);
    assert!(phase, "tail wrapped: phase toggles");
    assert_eq!(bq.head(), 2);
    assert_eq!(bq.mark(), (1, true));
    assert!(!bq.is_empty());
}

#[test]
fn pred_tag_packs_slot_and_phase() {
    let t = PredTag::new(5, true);
    assert_eq!(t.tag(), 5);
    assert!(t.phase());
    assert_eq!(t.0, 11);
    let t = PredTag::new(5, false);
    assert!(!t.phase());
}

#[test]
fn rollback_reopens_slots_for_repush() {
    let mut bq = BranchQueue::new(8);
    let slots: Vec<_> = (0..5).map(|_| bq.push()).collect();
    // Resolve the middle branch: roll the tail back to it...
    let (tag, phase) = slots[2];
    bq.rollback(tag, phase, true);
    // ...and re-push to re-insert the corrected branch.
    let (tag2, phase2) = bq.push();
    assert_eq!((tag2, phase2), (tag, phase));
    assert_eq!(bq.mark(), (3, false));
}

#[test]
fn rollback_across_the_wrap_keeps_phases_straight() {
    let mut bq = BranchQueue::new(4);
    for _ in 0..4 {
        bq.push();
    }
    bq.pop();
    bq.pop();
    let wrapped = bq.push(); // slot 0, phase true
    assert_eq!(wrapped, (0, true));
    bq.rollback(0, true, true);
    assert_eq!(bq.push(), (0, true));
}

#[test]
fn flush_empties_to_head() {
    let mut bq = BranchQueue::new(4);
    bq.push();
    bq.push();
    bq.pop();
    let head = bq.flush();
    assert_eq!(head, 1);
    assert!(bq.is_empty());
}

#[test]
#[should_panic(expected = "branch queue overflow")]
fn overflow_asserts() {
    let mut bq = BranchQueue::new(2);
    bq.push();
    bq.push();
    bq.push();
}
