//! Register capture tracking
//!
//! Decides, for every register at every program point, whether it holds its
//! value directly or through a capture cell shared with closures. A register
//! becomes captured when a closure that captures it is created and stays
//! captured until a `Close` op ends its scope. At control-flow merges the
//! states are unioned: if any predecessor reaches a block with the register
//! captured, the block treats it as captured, and predecessors that left it
//! plain box it on the edge.
//!
//! The result is computed once and stored as a flat arena indexed by
//! (program point, register).

use crate::ir::{BlockId, CaptureSource, Op, ProcedureDef, Reg};
use std::collections::VecDeque;

/// Access mode of a register at a program point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Plain,
    Captured,
}

impl SlotState {
    fn join(self, other: SlotState) -> SlotState {
        if self == SlotState::Captured || other == SlotState::Captured {
            SlotState::Captured
        } else {
            SlotState::Plain
        }
    }
}

/// Position before op `index` of `block`; `index == ops.len()` is the terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramPoint {
    pub block: BlockId,
    pub index: usize,
}

/// Capture state of every register at every reachable program point
#[derive(Debug, Clone)]
pub struct CaptureAnalysis {
    registers: usize,
    /// First arena row of each reachable block
    offsets: Vec<Option<usize>>,
    states: Vec<SlotState>,
}

impl CaptureAnalysis {
    /// Run the forward dataflow to a fixpoint
    pub fn analyze(def: &ProcedureDef) -> Self {
        let registers = def.registers as usize;
        let mut entry: Vec<Option<Vec<SlotState>>> = vec![None; def.blocks.len()];
        entry[0] = Some(vec![SlotState::Plain; registers]);

        let mut worklist = VecDeque::from([0]);
        while let Some(block) = worklist.pop_front() {
            let mut state = match &entry[block] {
                Some(s) => s.clone(),
                None => continue,
            };
            for op in &def.blocks[block].ops {
                transfer(def, op, &mut state);
            }

            for succ in def.blocks[block].exit.successors() {
                let changed = match entry[succ].as_mut() {
                    Some(existing) => {
                        let mut changed = false;
                        for (slot, incoming) in existing.iter_mut().zip(&state) {
                            let joined = slot.join(*incoming);
                            if joined != *slot {
                                *slot = joined;
                                changed = true;
                            }
                        }
                        changed
                    }
                    None => {
                        entry[succ] = Some(state.clone());
                        true
                    }
                };
                if changed && !worklist.contains(&succ) {
                    worklist.push_back(succ);
                }
            }
        }

        // Materialize per-point states
        let mut offsets = vec![None; def.blocks.len()];
        let mut states = Vec::new();
        let mut row = 0;
        for (idx, block) in def.blocks.iter().enumerate() {
            let Some(mut state) = entry[idx].take() else {
                continue;
            };
            offsets[idx] = Some(row);
            for op in &block.ops {
                states.extend_from_slice(&state);
                transfer(def, op, &mut state);
                row += 1;
            }
            states.extend_from_slice(&state);
            row += 1;
        }

        Self {
            registers,
            offsets,
            states,
        }
    }

    /// Is the block reachable from the entry?
    pub fn is_reachable(&self, block: BlockId) -> bool {
        matches!(self.offsets.get(block), Some(Some(_)))
    }

    /// States of all registers at a point.
    ///
    /// # Panics
    /// If the point lies in an unreachable block.
    pub fn states_at(&self, point: ProgramPoint) -> &[SlotState] {
        let base = match self.offsets.get(point.block) {
            Some(Some(base)) => base + point.index,
            _ => panic!("no capture states for unreachable block {}", point.block),
        };
        let start = base * self.registers;
        &self.states[start..start + self.registers]
    }

    /// State of one register at a point
    pub fn capture_state(&self, slot: Reg, point: ProgramPoint) -> SlotState {
        self.states_at(point)[slot as usize]
    }

    /// States on entry to a block
    pub fn block_entry(&self, block: BlockId) -> &[SlotState] {
        self.states_at(ProgramPoint { block, index: 0 })
    }
}

/// Registers a closure op captures from its parent
pub(crate) fn captured_locals(def: &ProcedureDef, proto: usize) -> impl Iterator<Item = Reg> + '_ {
    def.nested[proto].upvalues.iter().filter_map(|source| match source {
        CaptureSource::Local(r) => Some(*r),
        CaptureSource::Upvalue(_) => None,
    })
}

fn transfer(def: &ProcedureDef, op: &Op, state: &mut [SlotState]) {
    match op {
        Op::Closure { proto, .. } => {
            for r in captured_locals(def, *proto) {
                state[r as usize] = SlotState::Captured;
            }
        }
        Op::Close { regs } => {
            for r in regs {
                state[*r as usize] = SlotState::Plain;
            }
        }
        _ => {}
    }
}
