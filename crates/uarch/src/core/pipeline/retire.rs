//! Retirement: a three-state machine driven once per cycle.
//!
//! **Idle** asks the renamer whether the oldest checkpoint can commit. For a
//! checkpoint carrying an AMO or CSR, the deferred micro-operation executes
//! now (and may post an exception). Exceptions take the trap and fully
//! squash; a CSR-synchronization refetches the instruction without counting
//! it; a flagged load-order violation squashes and refetches the interval.
//!
//! **BulkCommit** drains the checkpoint's loads, stores, branches, and
//! architectural registers, up to `retire_width` work-units per cycle.
//!
//! **Finalize** pops the interval's payloads, accrues FP flags, checks every
//! retired instruction against the reference model, and resumes fetch after
//! a serializing instruction.

use crate::common::{increment_pc, Trap, NUM_LOG_REGS};
use crate::core::pipeline::Pipeline;
use crate::isa::decode::{flags, predecode};
use crate::isa::{abi, opcodes};
use crate::ref_model::state::csr;
use crate::ref_model::{amo_modify, csr_modify};

/// Phase of the retirement machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetirePhase {
    /// Waiting for a committable checkpoint.
    #[default]
    Idle,
    /// Draining the checkpoint's queues.
    BulkCommit,
    /// Popping the interval's payloads and checking them.
    Finalize,
}

impl Pipeline {
    /// Drive the retirement machine one cycle.
    pub(crate) fn retire(&mut self, instret_limit: u64) {
        match self.retstate.phase {
            RetirePhase::Idle => self.retire_idle(),
            RetirePhase::BulkCommit => self.retire_bulk_commit(),
            RetirePhase::Finalize => self.retire_finalize(instret_limit),
        }
    }

    fn retire_idle(&mut self) {
        let Some(info) = self.ren.precommit() else { return };
        self.retstate.chkpt_id = info.chkpt_id;
        self.retstate.loads_left = info.loads;
        self.retstate.stores_left = info.stores;
        self.retstate.branches_left = info.branches;
        self.retstate.amo = info.amo;
        self.retstate.csr = info.csr;
        self.retstate.exception = info.exception;

        let head = self.pay.head();
        let head_flags = self.pay.get(head).flags;
        assert!(!self.retstate.amo || flags::is_amo(head_flags));
        assert!(!self.retstate.csr || flags::is_csr(head_flags));
        let (load, store) = if self.retstate.amo || self.retstate.csr {
            // Only the serializer sits between the two checkpoints.
            assert!(info.loads <= 1 && info.stores <= 1 && info.branches == 0);
            (info.loads > 0, info.stores > 0)
        } else {
            (false, false)
        };

        // A load flagged as an ordering violation forces the interval to
        // re-execute from its first instruction: the head checkpoint is
        // exactly the architectural state before it. The violation outranks
        // any exception in the interval, since instructions fed by the
        // too-early load value may have posted bogus faults.
        if self.lsu.pending_violation(info.loads).is_some() {
            self.train_violation_mdp(info.loads);
            let jump_pc = self.pay.get(head).pc;
            self.stats.load_violation_squashes += 1;
            self.squash_complete(jump_pc);
            self.pay.clear();
            return;
        }

        if !self.retstate.exception {
            if self.retstate.amo && !(load || store) {
                self.retstate.exception = self.execute_amo();
            } else if self.retstate.csr {
                self.retstate.exception = self.execute_csr();
            }
            if self.retstate.exception {
                self.ren.set_exception(self.retstate.chkpt_id);
            }
        }

        if self.retstate.exception {
            let offending_pc = self.pay.get(head).pc;
            let trap = match self.pay.get(head).trap.get() {
                Some(t) => t.clone(),
                None => unreachable!("exception flagged without a posted trap"),
            };

            if trap == Trap::CsrSerialize {
                // Micro-architectural resynchronization: refetch the CSR
                // instruction itself, without retiring anything.
                self.squash_complete(offending_pc);
                self.pay.clear();
                return;
            }

            if trap == Trap::Syscall && self.ren.committed_value(abi::REG_A7) == abi::SYS_EXIT {
                let code = self.ren.committed_value(abi::REG_A0);
                self.state.instret += 1;
                self.stats.instret += 1;
                self.checker();
                assert!(self.oracle.exit_code() == Some(code), "exit code diverges from the reference");
                self.exit_code = Some(code);
                return;
            }

            let jump_pc = self.state.take_trap(&trap, offending_pc);
            self.state.instret += 1;
            self.stats.instret += 1;
            self.stats.exceptions += 1;
            self.stats.note_pc(offending_pc);
            self.checker();
            self.squash_complete(jump_pc);
            self.pay.clear();
            return;
        }

        self.retstate.phase = RetirePhase::BulkCommit;
        self.retstate.log_reg = 0;
    }

    fn retire_bulk_commit(&mut self) {
        for _ in 0..self.retire_width {
            if self.retstate.loads_left > 0 {
                self.lsu.train(true, &self.pay, &mut self.stats);
                let ok = self.lsu.commit(true, self.retstate.amo, &mut self.mem, &mut self.state);
                assert!(ok);
                self.retstate.loads_left -= 1;
            }
            if self.retstate.stores_left > 0 {
                self.lsu.train(false, &self.pay, &mut self.stats);
                let ok = self.lsu.commit(false, self.retstate.amo, &mut self.mem, &mut self.state);
                assert!(ok, "store-conditional lost its reservation at commit");
                self.retstate.stores_left -= 1;
            }
            if self.retstate.branches_left > 0 {
                self.fetch_unit.commit_branch(&mut self.stats);
                self.retstate.branches_left -= 1;
            }
            if self.retstate.log_reg < NUM_LOG_REGS {
                self.ren.commit(self.retstate.log_reg);
                self.retstate.log_reg += 1;
            }
            if self.retstate.loads_left == 0
                && self.retstate.stores_left == 0
                && self.retstate.branches_left == 0
                && self.retstate.log_reg == NUM_LOG_REGS
            {
                self.ren.free_checkpoint();
                self.retstate.phase = RetirePhase::Finalize;
                return;
            }
        }
    }

    fn retire_finalize(&mut self, instret_limit: u64) {
        while !self.pay.is_empty() && self.pay.get(self.pay.head()).chkpt_id == self.retstate.chkpt_id {
            let head = self.pay.head();
            let (p_flags, p_fflags, p_pc, p_insn, p_split) = {
                let p = self.pay.get(head);
                (p.flags, p.fflags, p.pc, p.insn, p.split)
            };

            if flags::is_fp(p_flags) {
                // Accrue the FP exception flags into the architectural CSR.
                self.state.fflags |= u64::from(p_fflags);
            }

            self.checker();

            self.state.instret += 1;
            self.stats.instret += 1;
            self.stats.note_pc(p_pc);
            tracing::trace!(
                target: "retire",
                cycle = self.cycle,
                pc = format_args!("{p_pc:#x}"),
                "{}",
                crate::isa::disasm::disasm(p_insn)
            );
            if p_split && self.pay.get(head).upper {
                self.stats.instret_split += 1;
            }

            assert!(!self.retstate.amo || flags::is_amo(p_flags));
            assert!(!self.retstate.csr || flags::is_csr(p_flags));
            if self.retstate.amo || self.retstate.csr {
                // The serializer stalled fetch, so the pipeline is empty:
                // resume at the successor (or the exception PC for sret).
                let is_sret = p_insn.opcode() == opcodes::SYSTEM
                    && p_insn.funct3() == 0
                    && p_insn.funct12() == 0x102;
                let next_pc = if is_sret { self.state.epc } else { increment_pc(p_pc) };
                self.fetch_unit.flush(next_pc);
            }

            if !p_split {
                self.pay.pop();
            }
            self.pay.pop();

            // Pause, but remain in this state, when the commit limit hits.
            if self.state.instret == instret_limit {
                return;
            }
        }
        self.retstate.phase = RetirePhase::Idle;
    }

    /// Compare the instruction at the payload head against the reference
    /// model and consume its oracle entry.
    ///
    /// # Panics
    /// Divergence from the reference model is a fatal simulator bug.
    fn checker(&mut self) {
        let head = self.pay.head();
        let (pc, p_flags, c, c_value, addr, b_value, db, trapped) = {
            let p = self.pay.get(head);
            (p.pc, p.flags, p.c, p.c_value, p.addr, p.b_value, p.db_index, p.trap.is_posted())
        };
        let Some(db) = db else {
            unreachable!("retiring a wrong-path instruction at pc {pc:#x}")
        };
        assert!(db == self.oracle.head_seq(), "reference model out of sync at pc {pc:#x}");
        let entry = self.oracle.consume_head();
        assert!(entry.pc == pc, "checker: pc {pc:#x} != reference {:#x}", entry.pc);

        if trapped {
            assert!(
                entry.exception.is_some(),
                "checker: trap at pc {pc:#x} the reference did not raise"
            );
            return;
        }
        assert!(
            entry.exception.is_none(),
            "checker: reference raised {:?} at pc {pc:#x}, core did not",
            entry.exception
        );

        // CSR destinations are timing-coupled (cycle counters) and excluded.
        if c.valid && !flags::is_csr(p_flags) {
            match entry.dest {
                Some((lreg, val)) => {
                    assert!(lreg == c.log, "checker: destination register diverges at pc {pc:#x}");
                    assert!(
                        val == c_value,
                        "checker: value {c_value:#x} != reference {val:#x} at pc {pc:#x}"
                    );
                }
                None => unreachable!("checker: reference has no destination at pc {pc:#x}"),
            }
        }
        if flags::is_store(p_flags) && !flags::is_amo(p_flags) {
            if let Some((ref_addr, _, ref_val)) = entry.store {
                assert!(ref_addr == addr, "checker: store address diverges at pc {pc:#x}");
                assert!(ref_val == b_value, "checker: store data diverges at pc {pc:#x}");
            }
        }
    }

    /// Train the MDP for a violating load about to be squashed, so the
    /// replayed interval stalls it properly.
    fn train_violation_mdp(&mut self, num_loads: u64) {
        if let Some(pay_index) = self.lsu.pending_violation(num_loads) {
            let load_pc = self.pay.get(pay_index as usize).pc;
            self.lsu.mdp_force_conflict(load_pc);
        }
    }

    /// Execute a deferred atomic (load-modify-store) at the payload head.
    /// Returns true if it posted an exception.
    fn execute_amo(&mut self) -> bool {
        let head = self.pay.head();
        let (insn, a_value, b_value, c, size) = {
            let p = self.pay.get(head);
            (p.insn, p.a_value, p.b_value, p.c, p.size)
        };
        let addr = a_value;

        // Atomics fault as stores; translate before touching memory.
        let result = self
            .mem
            .translate_store(addr, size)
            .and_then(|()| self.mem.load(addr, size, true));
        let old = match result {
            Ok(v) => v,
            Err(trap) => {
                assert!(trap.is_mem());
                self.pay.get_mut(head).trap.post(trap);
                return true;
            }
        };
        let new = amo_modify(insn.funct5(), size, old, b_value);
        match self.mem.store(addr, size, new) {
            Ok(()) => {}
            Err(trap) => unreachable!("atomic store fault after translation: {trap}"),
        }

        // Record the loaded value for checking, and write the destination.
        // amoswap may discard its result (rd = x0) to implement a
        // sequentially consistent store.
        self.pay.get_mut(head).c_value = old;
        if c.valid {
            self.ren.set_ready(c.phys);
            self.ren.write(c.phys, old);
        }
        false
    }

    /// Execute a deferred CSR operation at the payload head. Returns true if
    /// it posted an exception (including the CSR-synchronization refetch).
    fn execute_csr(&mut self) -> bool {
        let head = self.pay.head();
        let (insn, pc, csr_addr, a_value, c, db) = {
            let p = self.pay.get(head);
            (p.insn, p.pc, p.csr_addr, p.a_value, p.c, p.db_index)
        };

        if insn.funct3() == 0 {
            // sret resumes at the exception PC; handled at finalize.
            self.state.serialized = false;
            return false;
        }

        let dec = predecode(insn, pc);
        let (mut old, new) = match csr_modify(&self.state, insn, &dec, a_value, pc, self.cycle) {
            Ok(v) => v,
            Err(trap) => {
                self.pay.get_mut(head).trap.post(trap);
                return true;
            }
        };

        // The hardware counters are timed by the reference model so that
        // both sides observe identical values.
        if matches!(csr_addr, csr::CYCLE | csr::INSTRET) {
            if let Some((_, val)) = db.and_then(|d| self.oracle.peek(d)).and_then(|e| e.dest) {
                old = val;
            }
        }

        if let Some(new) = new {
            // Writes to the FP control state resynchronize the pipeline:
            // the first attempt refetches, the replay performs the write.
            if matches!(csr_addr, csr::FFLAGS | csr::FRM | csr::FCSR) && !self.state.serialized {
                self.state.serialized = true;
                self.pay.get_mut(head).trap.post(Trap::CsrSerialize);
                return true;
            }
            self.state.serialized = false;
            if let Err(trap) = self.state.csr_write(csr_addr, new, pc) {
                self.pay.get_mut(head).trap.post(trap);
                return true;
            }
        }

        if c.valid {
            self.pay.get_mut(head).c_value = old;
            self.ren.set_ready(c.phys);
            self.ren.write(c.phys, old);
        }
        false
    }
}
