//! LSU tests: store-to-load forwarding, disambiguation stalls and replay,
//! and load-order violation detection.

use cprsim_core::config::{DisambigConfig, DisambigModel, SimConfig};
use cprsim_core::core::cache::CacheHierarchy;
use cprsim_core::core::lsu::Lsu;
use cprsim_core::core::payload::PayloadBuffer;
use cprsim_core::core::renamer::Renamer;
use cprsim_core::mem::Memory;
use cprsim_core::ref_model::{ArchState, RefModel};

struct Rig {
    lsu: Lsu,
    pay: PayloadBuffer,
    ren: Renamer,
    mem: Memory,
    hier: CacheHierarchy,
    oracle: RefModel,
    state: ArchState,
}

fn rig(model: DisambigModel) -> Rig {
    let cfg = SimConfig::default();
    let mem = Memory::new(1);
    Rig {
        lsu: Lsu::new(
            8,
            8,
            DisambigConfig { model, mdp_max: 7 },
            true, // perfect data cache: timing out of the way
            &cfg.memory.l1d,
        ),
        pay: PayloadBuffer::new(32),
        ren: Renamer::new(96, 8, 64),
        mem,
        hier: CacheHierarchy::new(&cfg.memory),
        oracle: RefModel::new(Memory::new(1), 0x2000),
        state: ArchState::new(0x2000),
    }
}

fn new_payload(rig: &mut Rig, pc: u64) -> usize {
    let index = rig.pay.push();
    let p = rig.pay.get_mut(index);
    p.pc = pc;
    p.chkpt_id = 0;
    index
}

#[test]
fn matching_store_forwards_to_the_load() {
    let mut r = rig(DisambigModel::NeverConflict);

    // Three older stores; the youngest one matches the load's address.
    let mut sq_indices = Vec::new();
    for i in 0..3u64 {
        let pay_index = new_payload(&mut r, 0x2000 + 4 * i);
        let (_, _, sq_index, _) = r.lsu.dispatch(false, 4, false, false, pay_index, 0x2000 + 4 * i);
        sq_indices.push(sq_index);
    }
    for (i, &sq_index) in sq_indices.iter().enumerate() {
        let addr = 0x100 + 0x10 * i as u64;
        let (lq_tail, lq_phase, _, _) = r.lsu.tails();
        r.lsu.store_addr(0, addr, sq_index, lq_tail, lq_phase, &mut r.pay, &mut r.ren, &r.mem, &mut r.hier);
    }
    r.lsu.store_value(sq_indices[0], 0x1111);
    r.lsu.store_value(sq_indices[1], 0x2222);
    r.lsu.store_value(sq_indices[2], 0xDEADBEEF);

    let pay_index = new_payload(&mut r, 0x2010);
    let (lq_index, lq_phase, sq_index, sq_phase) = r.lsu.dispatch(true, 4, false, false, pay_index, 0x2010);
    let value = r.lsu.load_addr(
        0,
        0x120, // masked-equal to the third store
        lq_index,
        lq_phase,
        sq_index,
        sq_phase,
        &mut r.pay,
        &mut r.ren,
        &r.mem,
        &mut r.hier,
        &r.oracle,
        &mut r.state,
    );
    assert_eq!(value, Some(0xDEADBEEF), "value forwarded the same cycle");
    assert!(r.lsu.lq_forwarded(lq_index));
}

#[test]
fn value_not_ready_stalls_then_replays() {
    let mut r = rig(DisambigModel::NeverConflict);

    let store_pay = new_payload(&mut r, 0x2000);
    let (_, _, sq_index, _) = r.lsu.dispatch(false, 8, false, false, store_pay, 0x2000);
    let (lq_tail, lq_phase, _, _) = r.lsu.tails();
    r.lsu.store_addr(0, 0x200, sq_index, lq_tail, lq_phase, &mut r.pay, &mut r.ren, &r.mem, &mut r.hier);
    // Address known, value still in flight.

    let load_pay = new_payload(&mut r, 0x2004);
    let (lq_index, lq_phase, sq_win, sq_phase) = r.lsu.dispatch(true, 8, false, false, load_pay, 0x2004);
    let value = r.lsu.load_addr(
        0, 0x200, lq_index, lq_phase, sq_win, sq_phase,
        &mut r.pay, &mut r.ren, &r.mem, &mut r.hier, &r.oracle, &mut r.state,
    );
    assert_eq!(value, None, "same-size conflict with no data stalls");

    r.lsu.store_value(sq_index, 99);
    let replay = r.lsu.load_unstall(
        1, &mut r.pay, &mut r.ren, &r.mem, &mut r.hier, &r.oracle, &mut r.state,
    );
    assert_eq!(replay, Some((load_pay, 99)));
}

#[test]
fn unknown_address_stalls_only_when_predicted_to_conflict() {
    // Always-conflict: the load waits for every older store address.
    let mut r = rig(DisambigModel::AlwaysConflict);
    let store_pay = new_payload(&mut r, 0x2000);
    let _ = r.lsu.dispatch(false, 8, false, false, store_pay, 0x2000);
    let load_pay = new_payload(&mut r, 0x2004);
    let (lq_index, lq_phase, sq_win, sq_phase) = r.lsu.dispatch(true, 8, false, false, load_pay, 0x2004);
    let value = r.lsu.load_addr(
        0, 0x300, lq_index, lq_phase, sq_win, sq_phase,
        &mut r.pay, &mut r.ren, &r.mem, &mut r.hier, &r.oracle, &mut r.state,
    );
    assert_eq!(value, None);

    // Never-conflict: the load runs ahead of the unknown store address.
    let mut r = rig(DisambigModel::NeverConflict);
    let store_pay = new_payload(&mut r, 0x2000);
    let _ = r.lsu.dispatch(false, 8, false, false, store_pay, 0x2000);
    let load_pay = new_payload(&mut r, 0x2004);
    let (lq_index, lq_phase, sq_win, sq_phase) = r.lsu.dispatch(true, 8, false, false, load_pay, 0x2004);
    let value = r.lsu.load_addr(
        0, 0x300, lq_index, lq_phase, sq_win, sq_phase,
        &mut r.pay, &mut r.ren, &r.mem, &mut r.hier, &r.oracle, &mut r.state,
    );
    assert_eq!(value, Some(0), "speculatively read from memory");
}

#[test]
fn late_store_address_flags_the_completed_load() {
    let mut r = rig(DisambigModel::NeverConflict);

    let store_pay = new_payload(&mut r, 0x2000);
    let (_, _, sq_index, _) = r.lsu.dispatch(false, 8, false, false, store_pay, 0x2000);
    let (store_scan_lq, store_scan_phase, _, _) = r.lsu.tails();

    let load_pay = new_payload(&mut r, 0x2004);
    let (lq_index, lq_phase, sq_win, sq_phase) = r.lsu.dispatch(true, 8, false, false, load_pay, 0x2004);
    let value = r.lsu.load_addr(
        0, 0x400, lq_index, lq_phase, sq_win, sq_phase,
        &mut r.pay, &mut r.ren, &r.mem, &mut r.hier, &r.oracle, &mut r.state,
    );
    assert!(value.is_some(), "load completed speculatively");

    // The older store's address arrives and matches: ordering violation.
    r.lsu.store_addr(
        5, 0x400, sq_index, store_scan_lq, store_scan_phase,
        &mut r.pay, &mut r.ren, &r.mem, &mut r.hier,
    );
    assert_eq!(r.lsu.pending_violation(1), Some(load_pay as u64));
}

#[test]
fn restore_truncates_to_the_recorded_tails() {
    let mut r = rig(DisambigModel::NeverConflict);

    let older = new_payload(&mut r, 0x2000);
    let _ = r.lsu.dispatch(true, 8, false, false, older, 0x2000);
    let (lq_mark, lq_mark_phase, sq_mark, sq_mark_phase) = r.lsu.tails();

    // Speculative younger memory operations past the branch.
    let y1 = new_payload(&mut r, 0x2008);
    let _ = r.lsu.dispatch(true, 8, false, false, y1, 0x2008);
    let y2 = new_payload(&mut r, 0x200C);
    let _ = r.lsu.dispatch(false, 8, false, false, y2, 0x200C);
    assert_eq!(r.lsu.lengths(), (2, 1));

    r.lsu.restore(lq_mark, lq_mark_phase, sq_mark, sq_mark_phase, &r.pay, &mut r.ren);
    assert_eq!(r.lsu.lengths(), (1, 0));
    assert!(r.lsu.lq_entry(0).valid);
    assert!(!r.lsu.lq_entry(1).valid);
}
