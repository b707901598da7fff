//! Closures: a compiled procedure plus its capture cells

use super::exec;
use super::frame::Frame;
use crate::bytecode::CompiledProc;
use crate::context::ExecutionContext;
use crate::error::Control;
use crate::value::{Function, Upvalue, Value};
use std::fmt;
use std::rc::Rc;

pub struct LuaClosure {
    pub proc: Rc<CompiledProc>,
    pub upvalues: Vec<Upvalue>,
}

impl LuaClosure {
    pub fn new(proc: Rc<CompiledProc>, upvalues: Vec<Upvalue>) -> Self {
        Self { proc, upvalues }
    }

    /// Wrap as a callable value
    pub fn into_value(self) -> Value {
        Value::Function(Function::Closure(Rc::new(self)))
    }
}

impl fmt::Debug for LuaClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaClosure")
            .field("proc", &self.proc.name)
            .field("upvalues", &self.upvalues.len())
            .finish()
    }
}

/// Run a closure from its entry point
pub(crate) fn invoke(
    ctx: &mut ExecutionContext,
    closure: &Rc<LuaClosure>,
    args: Vec<Value>,
) -> Result<(), Control> {
    let frame = Frame::new(&closure.proc, args);
    exec::run(ctx, closure, frame)
}

/// Continue a closure from a restored frame
pub(crate) fn resume(
    ctx: &mut ExecutionContext,
    closure: &Rc<LuaClosure>,
    frame: Frame,
) -> Result<(), Control> {
    exec::run(ctx, closure, frame)
}
