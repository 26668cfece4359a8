//! Functional reference model.
//!
//! An in-order interpreter over its own copy of memory, running ahead of
//! the timing core on demand. Each executed instruction is recorded as an
//! [`OracleEntry`] in an ordered run-ahead buffer; the front end links
//! fetched instructions to entries (`first`/`check_next`), oracle modes read
//! them (`peek`), and the retirement checker consumes them in order.

/// Architectural state and CSR file.
pub mod state;

use std::collections::VecDeque;

use crate::common::{increment_pc, Trap};
use crate::isa::decode::{flags, predecode};
use crate::isa::{abi, exec, insn::Insn, opcodes};
use crate::mem::Memory;
pub use state::ArchState;

/// One architecturally executed instruction.
#[derive(Debug, Clone)]
pub struct OracleEntry {
    /// The instruction's PC.
    pub pc: u64,
    /// The instruction word (NOP when the fetch itself trapped).
    pub insn: Insn,
    /// Architectural next PC (the trap handler for excepting instructions).
    pub next_pc: u64,
    /// Trap raised by this instruction, if any.
    pub exception: Option<Trap>,
    /// Destination register write (flat logical register, value).
    pub dest: Option<(usize, u64)>,
    /// Store effect (address, size, value).
    pub store: Option<(u64, usize, u64)>,
    /// Load effect (address, size).
    pub load: Option<(u64, usize)>,
    /// Value returned by a load (also the partial-forward oracle value).
    pub load_value: Option<u64>,
    /// Exit code if this instruction is the exit environment call.
    pub exit: Option<u64>,
    /// FP accrued-exception bits produced.
    pub fflags: u32,
}

/// The reference model: architectural state, private memory, and the
/// run-ahead oracle buffer.
#[derive(Debug)]
pub struct RefModel {
    /// Architectural state.
    pub state: ArchState,
    /// The model's private memory image.
    pub mem: Memory,
    entries: VecDeque<OracleEntry>,
    base_seq: u64,
    exited: Option<u64>,
}

impl RefModel {
    /// Create a reference model over its own memory image.
    pub fn new(mem: Memory, entry_pc: u64) -> Self {
        Self {
            state: ArchState::new(entry_pc),
            mem,
            entries: VecDeque::new(),
            base_seq: 0,
            exited: None,
        }
    }

    /// Exit code of the program, once the exit environment call executes.
    pub const fn exit_code(&self) -> Option<u64> {
        self.exited
    }

    /// Sequence number of the oldest unconsumed entry.
    pub const fn head_seq(&self) -> u64 {
        self.base_seq
    }

    /// Map the first live instruction: the next architectural instruction
    /// must be at `pc`, otherwise the fetch is on a wrong path.
    pub fn first(&mut self, pc: u64) -> Option<u64> {
        self.ensure(self.base_seq)?;
        (self.entries.front()?.pc == pc).then_some(self.base_seq)
    }

    /// Map the instruction after `prev`: it must be at `pc`.
    pub fn check_next(&mut self, prev: u64, pc: u64) -> Option<u64> {
        let want = prev + 1;
        self.ensure(want)?;
        (self.entry(want)?.pc == pc).then_some(want)
    }

    /// Inspect a produced entry by sequence number.
    pub fn peek(&self, seq: u64) -> Option<&OracleEntry> {
        self.entry(seq)
    }

    /// Consume the head entry (retirement checker).
    ///
    /// # Panics
    /// Panics if the buffer is empty; the checker only consumes entries that
    /// were mapped at fetch.
    pub fn consume_head(&mut self) -> OracleEntry {
        self.base_seq += 1;
        match self.entries.pop_front() {
            Some(e) => e,
            None => unreachable!("oracle buffer underflow"),
        }
    }

    /// Run the model forward by `n` instructions without keeping entries
    /// (fast-skip before timing simulation starts).
    pub fn skip(&mut self, n: u64) {
        assert!(self.entries.is_empty());
        for _ in 0..n {
            if self.produce().is_none() {
                break;
            }
            self.base_seq += 1;
            let _ = self.entries.pop_front();
        }
    }

    fn entry(&self, seq: u64) -> Option<&OracleEntry> {
        seq.checked_sub(self.base_seq)
            .and_then(|off| self.entries.get(off as usize))
    }

    fn ensure(&mut self, seq: u64) -> Option<()> {
        assert!(seq >= self.base_seq, "oracle entry already consumed");
        while self.base_seq + self.entries.len() as u64 <= seq {
            self.produce()?;
        }
        Some(())
    }

    /// Execute one instruction architecturally and append its entry.
    /// Returns `None` once the program has exited.
    fn produce(&mut self) -> Option<()> {
        if self.exited.is_some() {
            return None;
        }
        let pc = self.state.pc;
        let mut entry = OracleEntry {
            pc,
            insn: Insn(opcodes::NOP),
            next_pc: increment_pc(pc),
            exception: None,
            dest: None,
            store: None,
            load: None,
            load_value: None,
            exit: None,
            fflags: 0,
        };

        let insn = match self.mem.load_insn(pc) {
            Ok(i) => i,
            Err(trap) => {
                entry.next_pc = self.state.take_trap(&trap, pc);
                entry.exception = Some(trap);
                self.finish(entry);
                return Some(());
            }
        };
        entry.insn = insn;

        let dec = predecode(insn, pc);
        if let Some(trap) = dec.decode_trap {
            if trap == Trap::Syscall && self.state.reg(abi::REG_A7) == abi::SYS_EXIT {
                let code = self.state.reg(abi::REG_A0);
                entry.exception = Some(trap);
                entry.exit = Some(code);
                self.exited = Some(code);
                self.finish(entry);
                return Some(());
            }
            entry.next_pc = self.state.take_trap(&trap, pc);
            entry.exception = Some(trap);
            self.finish(entry);
            return Some(());
        }

        let a = if dec.a.valid { self.state.reg(dec.a.log) } else { 0 };
        let b = if dec.b.valid { self.state.reg(dec.b.log) } else { 0 };
        let d3 = if dec.d.valid { self.state.reg(dec.d.log) } else { 0 };

        let result: Result<(), Trap> = if flags::is_amo(dec.flags) {
            self.exec_amo(insn, &dec, a, b, &mut entry)
        } else if flags::is_load(dec.flags) {
            let addr = exec::agen(insn, a);
            entry.load = Some((addr, dec.size));
            self.mem.load(addr, dec.size, dec.is_signed).map(|v| {
                entry.load_value = Some(v);
                if dec.c.valid {
                    entry.dest = Some((dec.c.log, v));
                }
            })
        } else if flags::is_store(dec.flags) {
            let addr = exec::agen(insn, a);
            self.mem
                .store(addr, dec.size, b)
                .map(|()| entry.store = Some((addr, dec.size, b)))
        } else if flags::is_csr(dec.flags) {
            self.exec_csr(insn, &dec, a, &mut entry)
        } else {
            exec::execute(insn, pc, a, b, d3).map(|out| {
                entry.next_pc = out.next_pc;
                if dec.c.valid {
                    entry.dest = Some((dec.c.log, out.value));
                }
            })
        };

        if let Err(trap) = result {
            entry.dest = None;
            entry.store = None;
            entry.next_pc = self.state.take_trap(&trap, pc);
            entry.exception = Some(trap);
        } else if let Some((r, v)) = entry.dest {
            self.state.set_reg(r, v);
        }
        self.finish(entry);
        Some(())
    }

    fn exec_amo(
        &mut self,
        insn: Insn,
        dec: &crate::isa::Decoded,
        a: u64,
        b: u64,
        entry: &mut OracleEntry,
    ) -> Result<(), Trap> {
        let size = dec.size;
        match insn.funct5() {
            0b00010 => {
                // lr: load and set the reservation.
                let v = self.mem.load(a, size, true)?;
                entry.load = Some((a, size));
                entry.load_value = Some(v);
                self.state.load_reservation = a;
                if dec.c.valid {
                    entry.dest = Some((dec.c.log, v));
                }
                Ok(())
            }
            0b00011 => {
                // sc: store iff the reservation still covers the address.
                let success = self.state.load_reservation == a;
                if success {
                    self.mem.store(a, size, b)?;
                    entry.store = Some((a, size, b));
                }
                self.state.load_reservation = u64::MAX;
                if dec.c.valid {
                    entry.dest = Some((dec.c.log, u64::from(!success)));
                }
                Ok(())
            }
            f5 => {
                // Load-modify-store to one address; the old value is the result.
                let old = self.mem.load(a, size, true)?;
                let new = amo_modify(f5, size, old, b);
                self.mem.store(a, size, new)?;
                entry.load = Some((a, size));
                entry.load_value = Some(old);
                entry.store = Some((a, size, new));
                if dec.c.valid {
                    entry.dest = Some((dec.c.log, old));
                }
                Ok(())
            }
        }
    }

    fn exec_csr(
        &mut self,
        insn: Insn,
        dec: &crate::isa::Decoded,
        a: u64,
        entry: &mut OracleEntry,
    ) -> Result<(), Trap> {
        let pc = entry.pc;
        if insn.funct3() == 0 {
            // sret: return to the exception PC.
            entry.next_pc = self.state.epc;
            return Ok(());
        }
        let (old, new) = csr_modify(&self.state, insn, dec, a, pc, self.state.instret)?;
        if let Some(new) = new {
            self.state.csr_write(dec.csr_addr, new, pc)?;
        }
        if dec.c.valid {
            entry.dest = Some((dec.c.log, old));
        }
        Ok(())
    }

    fn finish(&mut self, entry: OracleEntry) {
        self.state.fflags |= u64::from(entry.fflags);
        self.state.pc = entry.next_pc;
        self.state.instret += 1;
        self.entries.push_back(entry);
    }
}

/// Compute the stored value of a load-modify-store atomic.
pub fn amo_modify(funct5: u32, size: usize, old: u64, b: u64) -> u64 {
    let v = if size == 4 {
        let (old32, b32) = (old as u32, b as u32);
        let r = match funct5 {
            0b00001 => b32,
            0b00000 => b32.wrapping_add(old32),
            0b00100 => b32 ^ old32,
            0b01100 => b32 & old32,
            0b01000 => b32 | old32,
            0b10000 => (old32 as i32).min(b32 as i32) as u32,
            0b10100 => (old32 as i32).max(b32 as i32) as u32,
            0b11000 => old32.min(b32),
            0b11100 => old32.max(b32),
            _ => unreachable!("amo funct5 validated at decode"),
        };
        u64::from(r)
    } else {
        match funct5 {
            0b00001 => b,
            0b00000 => b.wrapping_add(old),
            0b00100 => b ^ old,
            0b01100 => b & old,
            0b01000 => b | old,
            0b10000 => (old as i64).min(b as i64) as u64,
            0b10100 => (old as i64).max(b as i64) as u64,
            0b11000 => old.min(b),
            0b11100 => old.max(b),
            _ => unreachable!("amo funct5 validated at decode"),
        }
    };
    v
}

/// Compute the (old value, new value) pair of a CSR operation.
///
/// Returns `new = None` when the operation performs no write (a set/clear
/// with x0/zero-immediate source is architecturally read-only).
pub fn csr_modify(
    state: &ArchState,
    insn: Insn,
    dec: &crate::isa::Decoded,
    a: u64,
    pc: u64,
    cycle: u64,
) -> Result<(u64, Option<u64>), Trap> {
    let addr = dec.csr_addr;
    let old = state.csr_read(addr, pc, cycle)?;
    // Register forms use the A source value; immediate forms carry the
    // zero-extended immediate in the A operand's register-number field.
    let operand = if insn.funct3() < 4 { a } else { dec.a.log as u64 };
    let no_src = insn.rs1() == 0;
    let new = match insn.funct3() & 3 {
        1 => Some(operand),
        2 => (!no_src).then_some(old | operand),
        3 => (!no_src).then_some(old & !operand),
        _ => return Err(Trap::IllegalInstruction(insn.bits())),
    };
    Ok((old, new))
}
