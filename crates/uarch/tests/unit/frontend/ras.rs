//! RAS tests: bounded push/pop, wrap behavior, and TOS checkpointing.

use cprsim_core::core::frontend::ras::Ras;

#[test]
fn lifo_order() {
    let mut ras = Ras::new(8);
    ras.push(0xA);
    ras.push(0xB);
    ras.push(0xC);
    assert_eq!(ras.pop(), 0xC);
    assert_eq!(ras.pop(), 0xB);
    assert_eq!(ras.pop(), 0xA);
}

#[test]
fn two_deep_stack_overflow() {
    // Three calls into a 2-deep stack: the predictor keeps the two oldest
    // return addresses it can still pair with their returns.
    let mut ras = Ras::new(2);
    ras.push(0x100);
    ras.push(0x200);
    ras.push(0x300);
    assert_eq!(ras.peek(), 0x200);
    assert_eq!(ras.pop(), 0x200);
    assert_eq!(ras.pop(), 0x100);
}

#[test]
fn peek_does_not_mutate() {
    let mut ras = Ras::new(4);
    ras.push(0x500);
    let tos = ras.tos();
    assert_eq!(ras.peek(), 0x500);
    assert_eq!(ras.peek(), 0x500);
    assert_eq!(ras.tos(), tos);
}

#[test]
fn underflow_wraps_to_the_top_slot() {
    // Best-effort behavior: popping empty reads the top slot rather than
    // faulting. Predicted garbage is recovered by normal mispredict paths.
    let mut ras = Ras::new(4);
    ras.push(0x10);
    assert_eq!(ras.pop(), 0x10);
    let _ = ras.pop();
    assert_eq!(ras.tos(), 3);
}

#[test]
fn tos_checkpoint_restores_the_speculative_view() {
    // The branch queue checkpoints only the TOS index. Rolling back to a
    // prior entry must make peek() see what that entry's fetch saw.
    let mut ras = Ras::new(8);
    ras.push(0x1000);
    let checkpoint = ras.tos();
    let seen_at_fetch = ras.peek();

    // Wrong-path speculation beyond the checkpoint.
    ras.push(0x2000);
    ras.push(0x3000);
    let _ = ras.pop();

    ras.set_tos(checkpoint);
    assert_eq!(ras.peek(), seen_at_fetch);
}
