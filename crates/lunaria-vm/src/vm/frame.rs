//! Call frame implementation

use crate::bytecode::{ArgList, CompiledProc, Operand, Receive, ResumePoint, SlotMode, SlotRef};
use crate::value::{Upvalue, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// A register: its value in place, or a capture cell shared with closures
#[derive(Debug, Clone)]
pub enum Slot {
    Plain(Value),
    Boxed(Upvalue),
}

/// Register window for a call frame
#[derive(Debug, Clone)]
pub struct RegisterWindow {
    slots: Vec<Slot>,
}

impl RegisterWindow {
    /// Window of `size` nil registers
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![Slot::Plain(Value::Nil); size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Read a register.
    ///
    /// # Panics
    /// If the slot's runtime mode disagrees with the compiled mode.
    #[inline]
    pub fn get(&self, slot: SlotRef) -> Value {
        match (&self.slots[slot.reg as usize], slot.mode) {
            (Slot::Plain(v), SlotMode::Direct) => v.clone(),
            (Slot::Boxed(cell), SlotMode::Boxed) => cell.borrow().clone(),
            _ => panic!("slot mode mismatch reading r{}", slot.reg),
        }
    }

    /// Write a register; boxed writes are visible to every closure sharing the cell
    #[inline]
    pub fn set(&mut self, slot: SlotRef, value: Value) {
        match (&mut self.slots[slot.reg as usize], slot.mode) {
            (Slot::Plain(v), SlotMode::Direct) => *v = value,
            (Slot::Boxed(cell), SlotMode::Boxed) => *cell.borrow_mut() = value,
            _ => panic!("slot mode mismatch writing r{}", slot.reg),
        }
    }

    /// Move a plain register into a fresh capture cell
    pub fn capture(&mut self, reg: u16) {
        let slot = &mut self.slots[reg as usize];
        match slot {
            Slot::Plain(v) => {
                let value = std::mem::take(v);
                *slot = Slot::Boxed(Rc::new(RefCell::new(value)));
            }
            Slot::Boxed(_) => panic!("r{} is already captured", reg),
        }
    }

    /// Detach a register from its capture cell, keeping the current value
    pub fn uncapture(&mut self, reg: u16) {
        let slot = &mut self.slots[reg as usize];
        match slot {
            Slot::Boxed(cell) => {
                let value = cell.borrow().clone();
                *slot = Slot::Plain(value);
            }
            Slot::Plain(_) => panic!("r{} is not captured", reg),
        }
    }

    /// The capture cell of a boxed register
    pub fn cell(&self, reg: u16) -> Upvalue {
        match &self.slots[reg as usize] {
            Slot::Boxed(cell) => Rc::clone(cell),
            Slot::Plain(_) => panic!("closure captures r{} but it is not boxed", reg),
        }
    }
}

/// Activation of a compiled procedure
#[derive(Debug, Clone)]
pub struct Frame {
    pub registers: RegisterWindow,
    /// Arguments past the declared parameters
    pub varargs: Vec<Value>,
    /// Results kept for the next spreading call or return
    pub multi: Vec<Value>,
    /// Resumption point of the suspendable instruction being executed
    pub point: ResumePoint,
}

impl Frame {
    /// Fresh frame with parameters bound from `args`
    pub fn new(proc: &CompiledProc, args: Vec<Value>) -> Self {
        let mut registers = RegisterWindow::new(proc.register_count as usize);
        let params = proc.param_count as usize;

        let mut args = args.into_iter();
        for slot in registers.slots.iter_mut().take(params) {
            *slot = Slot::Plain(args.next().unwrap_or(Value::Nil));
        }
        let varargs = if proc.is_vararg {
            args.collect()
        } else {
            Vec::new()
        };

        Self {
            registers,
            varargs,
            multi: Vec::new(),
            point: ResumePoint::ENTRY,
        }
    }

    #[inline]
    pub fn read(&self, operand: &Operand) -> Value {
        match operand {
            Operand::Slot(slot) => self.registers.get(*slot),
            Operand::Const(v) => v.clone(),
        }
    }

    /// Materialize an argument list
    pub fn arguments(&self, args: &ArgList) -> Vec<Value> {
        let extra = if args.spread { self.multi.len() } else { 0 };
        let mut values = Vec::with_capacity(args.fixed.len() + extra);
        values.extend(args.fixed.iter().map(|o| self.read(o)));
        if args.spread {
            values.extend(self.multi.iter().cloned());
        }
        values
    }

    /// Distribute `values` as `receive` asks
    pub fn receive(&mut self, receive: &Receive, values: &[Value]) {
        match receive {
            Receive::Discard => {}
            Receive::One(dst) => {
                let v = values.first().cloned().unwrap_or(Value::Nil);
                self.registers.set(*dst, v);
            }
            Receive::Fixed(dsts) => {
                for (i, dst) in dsts.iter().enumerate() {
                    let v = values.get(i).cloned().unwrap_or(Value::Nil);
                    self.registers.set(*dst, v);
                }
            }
            Receive::Multi => {
                self.multi.clear();
                self.multi.extend_from_slice(values);
            }
        }
    }

    /// Distribute the varargs as `receive` asks
    pub fn receive_varargs(&mut self, receive: &Receive) {
        let varargs = std::mem::take(&mut self.varargs);
        self.receive(receive, &varargs);
        self.varargs = varargs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(reg: u16) -> SlotRef {
        SlotRef {
            reg,
            mode: SlotMode::Direct,
        }
    }

    fn boxed(reg: u16) -> SlotRef {
        SlotRef {
            reg,
            mode: SlotMode::Boxed,
        }
    }

    #[test]
    fn test_capture_shares_cell() {
        let mut regs = RegisterWindow::new(2);
        regs.set(direct(0), Value::Integer(1));
        regs.capture(0);

        let cell = regs.cell(0);
        regs.set(boxed(0), Value::Integer(2));
        assert_eq!(*cell.borrow(), Value::Integer(2));

        *cell.borrow_mut() = Value::Integer(3);
        assert_eq!(regs.get(boxed(0)), Value::Integer(3));
    }

    #[test]
    fn test_uncapture_detaches() {
        let mut regs = RegisterWindow::new(1);
        regs.capture(0);
        let cell = regs.cell(0);
        regs.set(boxed(0), Value::Integer(5));
        regs.uncapture(0);

        regs.set(direct(0), Value::Integer(6));
        assert_eq!(*cell.borrow(), Value::Integer(5));
    }

    #[test]
    #[should_panic(expected = "slot mode mismatch")]
    fn test_mode_mismatch_panics() {
        let regs = RegisterWindow::new(1);
        regs.get(boxed(0));
    }

    #[test]
    fn test_receive_pads_with_nil() {
        let mut frame = Frame {
            registers: RegisterWindow::new(3),
            varargs: vec![Value::Integer(9)],
            multi: Vec::new(),
            point: ResumePoint::ENTRY,
        };
        frame.registers.set(direct(2), Value::Boolean(true));
        frame.receive(
            &Receive::Fixed(vec![direct(0), direct(1), direct(2)]),
            &[Value::Integer(1)],
        );
        assert_eq!(frame.registers.get(direct(1)), Value::Nil);
        assert_eq!(frame.registers.get(direct(2)), Value::Nil);

        frame.receive_varargs(&Receive::Multi);
        assert_eq!(frame.multi, vec![Value::Integer(9)]);
        assert_eq!(frame.varargs.len(), 1);
    }
}
