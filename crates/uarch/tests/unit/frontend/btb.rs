//! BTB tests: bank selection, update/lookup idempotence, bundle assembly
//! and termination rules.

use cprsim_core::core::frontend::btb::{BranchKind, Btb, FetchSlot, SpecUpdate};
use cprsim_core::isa::Insn;
use rstest::rstest;

fn beq(rs1: usize, rs2: usize, offset: i32) -> Insn {
    let imm = offset as u32;
    Insn(
        ((imm >> 12 & 1) << 31)
            | ((imm >> 5 & 0x3F) << 25)
            | ((rs2 as u32) << 20)
            | ((rs1 as u32) << 15)
            | ((imm >> 1 & 0xF) << 8)
            | ((imm >> 11 & 1) << 7)
            | 0x63,
    )
}

fn jal(rd: usize, offset: i32) -> Insn {
    let imm = offset as u32;
    Insn(
        ((imm >> 20 & 1) << 31)
            | ((imm >> 1 & 0x3FF) << 21)
            | ((imm >> 11 & 1) << 20)
            | ((imm >> 12 & 0xFF) << 12)
            | ((rd as u32) << 7)
            | 0x6F,
    )
}

fn jalr(rd: usize, rs1: usize) -> Insn {
    Insn(((rs1 as u32) << 15) | ((rd as u32) << 7) | 0x67)
}

fn bundle(n: usize) -> Vec<FetchSlot> {
    vec![FetchSlot::empty(); n]
}

#[rstest]
#[case(0x20, 3, 3)] // ((0x20 >> 2) + 3) & 3 = 11 & 3
#[case(0x20, 0, 0)]
#[case(0x24, 0, 1)]
#[case(0x3C, 1, 0)] // (15 + 1) & 3
fn bank_selection(#[case] pc: u64, #[case] slot: u64, #[case] want: u64) {
    let btb = Btb::new(256, 4, 2, 2);
    assert_eq!(btb.bank_of(pc, slot), want);
}

#[test]
fn lookup_after_update_hits_with_matching_payload() {
    let mut btb = Btb::new(256, 4, 2, 2);
    let pc = 0x2000;
    // Train slot 1 with a taken-target branch.
    btb.update(pc, 1, beq(1, 2, 0x40));

    let mut slots = bundle(4);
    let mut update = SpecUpdate::default();
    // Strongly-taken prediction in the first packed counter.
    btb.lookup(pc, 0b11, 0, 0, &mut slots, &mut update);

    assert!(slots[1].branch);
    assert_eq!(slots[1].branch_kind, BranchKind::Conditional);
    assert_eq!(slots[1].branch_target, pc + 4 + 0x40);
    assert_eq!(slots[1].next_pc, pc + 4 + 0x40);
    // Taken conditional terminates the bundle.
    assert!(!slots[2].valid);
    assert_eq!(update.next_pc, pc + 4 + 0x40);
    assert_eq!(update.num_cb, 1);
}

#[test]
fn not_taken_conditional_continues_the_bundle() {
    let mut btb = Btb::new(256, 4, 2, 2);
    let pc = 0x2000;
    btb.update(pc, 0, beq(1, 2, 0x40));

    let mut slots = bundle(4);
    let mut update = SpecUpdate::default();
    btb.lookup(pc, 0b00, 0, 0, &mut slots, &mut update);

    assert!(slots[0].branch);
    assert_eq!(slots[0].next_pc, pc + 4);
    assert!(slots[3].valid, "bundle runs to full width");
    assert_eq!(update.next_pc, pc + 16);
}

#[test]
fn bundle_ends_after_max_conditionals() {
    let mut btb = Btb::new(256, 4, 2, 2);
    let pc = 0x2000;
    btb.update(pc, 0, beq(1, 2, 0x40));
    btb.update(pc, 1, beq(3, 4, 0x40));

    let mut slots = bundle(4);
    let mut update = SpecUpdate::default();
    // Both predicted not-taken; m=2 conditionals consumed at slot 1.
    btb.lookup(pc, 0b0000, 0, 0, &mut slots, &mut update);
    assert!(slots[1].valid);
    assert!(!slots[2].valid);
    assert_eq!(update.num_cb, 2);
}

#[test]
fn call_pushes_and_return_pops_in_the_update_packet() {
    let mut btb = Btb::new(256, 4, 2, 2);
    let pc = 0x2000;
    btb.update(pc, 0, jal(1, 0x100)); // call direct (links ra)

    let mut slots = bundle(4);
    let mut update = SpecUpdate::default();
    btb.lookup(pc, 0, 0, 0, &mut slots, &mut update);
    assert_eq!(slots[0].branch_kind, BranchKind::CallDirect);
    assert!(update.push_ras);
    assert_eq!(update.push_ras_pc, pc + 4);

    let pc2 = 0x3000;
    btb.update(pc2, 0, jalr(0, 1)); // return (discards link, jumps through ra)
    let mut slots = bundle(4);
    btb.lookup(pc2, 0, 0, 0xCAFE, &mut slots, &mut update);
    assert_eq!(slots[0].branch_kind, BranchKind::Return);
    assert_eq!(slots[0].next_pc, 0xCAFE);
    assert!(update.pop_ras);
}

#[test]
fn indirect_targets_come_from_the_indirect_predictor() {
    let mut btb = Btb::new(256, 4, 2, 2);
    let pc = 0x2000;
    btb.update(pc, 2, jalr(5, 6)); // plain indirect jump

    let mut slots = bundle(4);
    let mut update = SpecUpdate::default();
    btb.lookup(pc, 0, 0xBEE0, 0, &mut slots, &mut update);
    assert_eq!(slots[2].branch_kind, BranchKind::JumpIndirect);
    assert_eq!(slots[2].next_pc, 0xBEE0);
    assert!(!slots[3].valid, "non-conditional branch ends the bundle");
}

#[test]
fn invalidate_clears_the_entry() {
    let mut btb = Btb::new(256, 4, 2, 2);
    let pc = 0x2000;
    btb.update(pc, 0, beq(1, 2, 0x40));
    btb.invalidate(pc, 0);

    let mut slots = bundle(4);
    let mut update = SpecUpdate::default();
    btb.lookup(pc, 0b11, 0, 0, &mut slots, &mut update);
    assert!(!slots[0].branch);
}

#[test]
fn lru_evicts_the_least_recent_way() {
    // One bank, one set, two ways: the third distinct branch evicts the
    // least recently touched of the first two.
    let mut btb = Btb::new(2, 1, 2, 2);
    btb.update(0x1000, 0, jal(0, 0x10));
    btb.update(0x2000, 0, jal(0, 0x20));
    // Touch the first so the second becomes LRU.
    let mut slots = bundle(1);
    let mut update = SpecUpdate::default();
    btb.lookup(0x1000, 0, 0, 0, &mut slots, &mut update);
    assert!(slots[0].branch);

    btb.update(0x3000, 0, jal(0, 0x30));
    let mut slots = bundle(1);
    btb.lookup(0x1000, 0, 0, 0, &mut slots, &mut update);
    assert!(slots[0].branch, "recently used entry survives");
    let mut slots = bundle(1);
    btb.lookup(0x2000, 0, 0, 0, &mut slots, &mut update);
    assert!(!slots[0].branch, "LRU entry evicted");
}
