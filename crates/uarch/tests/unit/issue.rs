//! Issue queue tests: wakeup broadcast, selection ordering, checkpoint-mask
//! squash.

use cprsim_core::core::issue::{IqEntry, IqSrc, IssueQueue};

fn entry(pay_index: usize, chkpt: u64, srcs: &[(usize, bool)]) -> IqEntry {
    let mut e = IqEntry { valid: true, pay_index, chkpt_id: chkpt, ..IqEntry::default() };
    for (i, &(phys, ready)) in srcs.iter().enumerate() {
        e.srcs[i] = IqSrc { valid: true, phys, ready };
    }
    e
}

#[test]
fn ready_entries_select_in_position_order() {
    let mut iq = IssueQueue::new(8, 1, false);
    iq.insert(entry(10, 0, &[(40, true)]));
    iq.insert(entry(11, 0, &[(41, false)]));
    iq.insert(entry(12, 0, &[]));
    let order = iq.select_order();
    let picked: Vec<usize> = order.iter().map(|&s| iq.entry(s).pay_index).collect();
    assert_eq!(picked, vec![10, 12], "only ready entries, in position order");
}

#[test]
fn wakeup_broadcast_readies_matching_tags() {
    let mut iq = IssueQueue::new(8, 1, false);
    iq.insert(entry(1, 0, &[(50, false), (51, false)]));
    iq.insert(entry(2, 0, &[(50, false)]));
    assert!(iq.select_order().is_empty());

    iq.wakeup(50);
    let order = iq.select_order();
    assert_eq!(order.len(), 1);
    assert_eq!(iq.entry(order[0]).pay_index, 2, "entry 1 still waits on tag 51");

    iq.wakeup(51);
    assert_eq!(iq.select_order().len(), 2);
}

#[test]
fn age_based_selection_ignores_position() {
    let mut iq = IssueQueue::new(8, 1, true);
    // Fill and free slot 0 so a later insert lands before an older entry.
    iq.insert(entry(1, 0, &[]));
    iq.insert(entry(2, 0, &[]));
    let slot_of_1 = iq.select_order()[0];
    let _ = iq.take(slot_of_1);
    iq.insert(entry(3, 0, &[]));
    let order = iq.select_order();
    let picked: Vec<usize> = order.iter().map(|&s| iq.entry(s).pay_index).collect();
    assert_eq!(picked, vec![2, 3], "oldest first regardless of slot position");
}

#[test]
fn squash_removes_exactly_the_masked_checkpoints() {
    let mut iq = IssueQueue::new(8, 1, false);
    iq.insert(entry(1, 2, &[]));
    iq.insert(entry(2, 3, &[]));
    iq.insert(entry(3, 5, &[]));
    let removed = iq.squash((1 << 3) | (1 << 5));
    assert_eq!(removed.len(), 2);
    assert_eq!(iq.occupancy(), 1);
    let order = iq.select_order();
    assert_eq!(iq.entry(order[0]).pay_index, 1);
}

#[test]
fn take_frees_the_slot() {
    let mut iq = IssueQueue::new(2, 1, false);
    iq.insert(entry(1, 0, &[]));
    iq.insert(entry(2, 0, &[]));
    assert_eq!(iq.free_slots(), 0);
    let slot = iq.select_order()[0];
    let e = iq.take(slot);
    assert_eq!(e.pay_index, 1);
    assert_eq!(iq.free_slots(), 1);
}
