//! Payload arena tests: pair allocation, rollback/restore, and the sticky
//! wrong-path linkage to the reference model.

use crate::common::{asm, assemble};
use cprsim_core::core::payload::PayloadBuffer;
use cprsim_core::mem::Memory;
use cprsim_core::ref_model::RefModel;

fn model_for(words: &[u32]) -> RefModel {
    let mut mem = Memory::new(1);
    mem.write_image(0x2000, &assemble(words));
    RefModel::new(mem, 0x2000)
}

#[test]
fn push_allocates_even_odd_pairs() {
    let mut pay = PayloadBuffer::new(8);
    let a = pay.push();
    let b = pay.push();
    assert_eq!(a % 2, 0);
    assert_eq!(b, a + 2);
    assert_eq!(pay.len(), 4);
}

#[test]
fn capacity_is_a_power_of_two_covering_two_slots_each() {
    let pay = PayloadBuffer::new(48);
    assert!(pay.capacity().is_power_of_two());
    assert!(pay.capacity() >= 96);
}

#[test]
fn rollback_truncates_to_the_instruction_after() {
    let mut pay = PayloadBuffer::new(8);
    let first = pay.push();
    let _second = pay.push();
    let _third = pay.push();
    pay.rollback(first);
    assert_eq!(pay.tail(), first + 2);
    assert_eq!(pay.len(), 2);
}

#[test]
fn checkpoint_and_restore_rewind_the_tail() {
    let mut pay = PayloadBuffer::new(8);
    let _ = pay.push();
    let saved = pay.checkpoint();
    let _ = pay.push();
    let _ = pay.push();
    pay.restore(saved);
    assert_eq!(pay.tail(), saved);
    assert_eq!(pay.len(), 2);
}

#[test]
fn pop_retires_one_slot() {
    let mut pay = PayloadBuffer::new(8);
    let _ = pay.push();
    pay.pop();
    pay.pop();
    assert!(pay.is_empty());
}

#[test]
fn map_to_actual_links_the_correct_path() {
    let words = [asm::nop(), asm::nop(), asm::nop()];
    let mut oracle = model_for(&words);
    let mut pay = PayloadBuffer::new(8);

    let a = pay.push();
    pay.get_mut(a).pc = 0x2000;
    pay.map_to_actual(&mut oracle, a);
    assert!(pay.get(a).is_good());

    let b = pay.push();
    pay.get_mut(b).pc = 0x2004;
    pay.map_to_actual(&mut oracle, b);
    assert!(pay.get(b).is_good());
}

#[test]
fn wrong_path_is_sticky() {
    let words = [asm::nop(), asm::nop(), asm::nop(), asm::nop()];
    let mut oracle = model_for(&words);
    let mut pay = PayloadBuffer::new(8);

    let a = pay.push();
    pay.get_mut(a).pc = 0x2000;
    pay.map_to_actual(&mut oracle, a);
    assert!(pay.get(a).is_good());

    // Fetch diverges from the architectural path...
    let b = pay.push();
    pay.get_mut(b).pc = 0x3000;
    pay.map_to_actual(&mut oracle, b);
    assert!(!pay.get(b).is_good());

    // ...and never rejoins, even if a later PC happens to line up.
    let c = pay.push();
    pay.get_mut(c).pc = 0x2008;
    pay.map_to_actual(&mut oracle, c);
    assert!(!pay.get(c).is_good());
}
