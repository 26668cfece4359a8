//! Gshare tests: index folding, BHR updates, counter saturation.

use cprsim_core::core::frontend::gshare::{
    bump_counter, packed_counter, set_packed_counter, GshareIndex,
};
use rstest::rstest;

#[rstest]
#[case(12, 8, 1 << 12)]
#[case(8, 12, 1 << 12)]
#[case(0, 2, 1 << 2)]
#[case(10, 10, 1 << 10)]
fn table_size_is_max_of_lengths(#[case] pc_len: u64, #[case] bhr_len: u64, #[case] want: u64) {
    assert_eq!(GshareIndex::new(pc_len, bhr_len).table_size(), want);
}

#[test]
fn index_folds_pc_and_shifted_bhr() {
    // pc_length=12, bhr_length=8: the BHR lands in the upper index bits.
    let mut g = GshareIndex::new(12, 8);
    assert_eq!(g.index(0x2000), (0x2000 >> 2) & 0xFFF);
    g.set_bhr(0xFF);
    assert_eq!(g.index(0x2000), ((0x2000 >> 2) & 0xFFF) ^ (0xFF << 4));
}

#[test]
fn bhr_shifts_in_from_the_msb() {
    let mut g = GshareIndex::new(0, 4);
    g.update_bhr(true);
    assert_eq!(g.bhr(), 0b1000);
    g.update_bhr(false);
    assert_eq!(g.bhr(), 0b0100);
    g.update_bhr(true);
    assert_eq!(g.bhr(), 0b1010);
}

#[test]
fn update_my_bhr_leaves_the_speculative_bhr_alone() {
    let g = GshareIndex::new(4, 4);
    let mine = g.update_my_bhr(0b0001, true);
    assert_eq!(mine, 0b1000);
    assert_eq!(g.bhr(), 0);
}

#[test]
fn counter_saturates_through_a_taken_then_not_taken_run() {
    // pc_length=0, bhr_length=2, single counter starting weakly taken:
    // after T,T,T it saturates at 0b11; after N,N,N it reaches 0b00.
    let mut entry = set_packed_counter(0, 0, 0b10);
    for _ in 0..3 {
        let ctr = bump_counter(packed_counter(entry, 0), true);
        entry = set_packed_counter(entry, 0, ctr);
    }
    assert_eq!(packed_counter(entry, 0), 0b11);
    for _ in 0..3 {
        let ctr = bump_counter(packed_counter(entry, 0), false);
        entry = set_packed_counter(entry, 0, ctr);
    }
    assert_eq!(packed_counter(entry, 0), 0b00);
}

#[test]
fn packed_counters_are_independent() {
    let mut entry = 0u64;
    entry = set_packed_counter(entry, 0, 3);
    entry = set_packed_counter(entry, 1, 1);
    entry = set_packed_counter(entry, 2, 2);
    assert_eq!(packed_counter(entry, 0), 3);
    assert_eq!(packed_counter(entry, 1), 1);
    assert_eq!(packed_counter(entry, 2), 2);
    entry = set_packed_counter(entry, 1, 0);
    assert_eq!(packed_counter(entry, 0), 3, "neighbors untouched");
    assert_eq!(packed_counter(entry, 2), 2);
}
