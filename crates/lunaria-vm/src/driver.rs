//! Driver: runs calls to completion or to the next suspension
//!
//! The driver is the only place a `SuspendSignal` surfaces as a value. It
//! hands the signal to the host as `Outcome::Suspended`; the host decides what
//! values to resume with and passes the signal back to `resume`.

use crate::bytecode::CompiledProc;
use crate::config::VmConfig;
use crate::context::{ExecutionContext, State};
use crate::dispatch;
use crate::error::{Control, LuaError};
use crate::suspend::SuspendSignal;
use crate::value::Value;
use crate::vm::LuaClosure;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Where a step stopped
#[derive(Debug)]
pub enum Outcome {
    /// The call returned these values
    Done(Vec<Value>),
    /// Suspended; resume with `Driver::resume`
    Suspended(SuspendSignal),
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

pub struct Driver {
    ctx: ExecutionContext,
}

impl Driver {
    pub fn new(state: State) -> Self {
        Self {
            ctx: ExecutionContext::new(state),
        }
    }

    /// Driver over a state with the standard library
    pub fn with_config(config: VmConfig) -> Self {
        Self::new(State::new(config))
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.ctx
    }

    /// Closure for a top-level procedure.
    ///
    /// A top-level procedure may declare one upvalue, which is bound to the
    /// globals table.
    pub fn instantiate(&self, proc: Rc<CompiledProc>) -> Result<Value, LuaError> {
        if proc.upvalues.len() > 1 {
            return Err(LuaError::Runtime(format!(
                "top-level procedure '{}' declares {} upvalues; only the globals table can be bound",
                proc.name,
                proc.upvalues.len()
            )));
        }
        let upvalues = proc
            .upvalues
            .iter()
            .map(|_| {
                let globals = Value::Table(Rc::clone(self.ctx.state().globals()));
                Rc::new(RefCell::new(globals))
            })
            .collect();
        Ok(LuaClosure::new(proc, upvalues).into_value())
    }

    /// Call `callable` until it returns or suspends
    pub fn step(&mut self, callable: Value, args: Vec<Value>) -> Result<Outcome, LuaError> {
        self.ctx.channel.reset();
        let result = dispatch::call(&mut self.ctx, callable, args);
        self.settle(result)
    }

    /// Continue a suspended call; `values` become the results of the
    /// operation that suspended
    pub fn resume(
        &mut self,
        signal: SuspendSignal,
        values: Vec<Value>,
    ) -> Result<Outcome, LuaError> {
        debug!(frames = signal.depth(), values = values.len(), "resuming");
        self.ctx.channel.set_values(values);
        let mut continuation = signal.into_continuation();
        let result = continuation.resume_next(&mut self.ctx);
        self.settle(result)
    }

    /// Step and resume until done. `scheduler` is asked for the resume values
    /// at every suspension.
    pub fn run_to_completion(
        &mut self,
        callable: Value,
        args: Vec<Value>,
        mut scheduler: impl FnMut(&SuspendSignal) -> Vec<Value>,
    ) -> Result<Vec<Value>, LuaError> {
        let mut outcome = self.step(callable, args)?;
        loop {
            match outcome {
                Outcome::Done(values) => return Ok(values),
                Outcome::Suspended(signal) => {
                    let values = scheduler(&signal);
                    outcome = self.resume(signal, values)?;
                }
            }
        }
    }

    fn settle(&mut self, result: Result<(), Control>) -> Result<Outcome, LuaError> {
        match result {
            Ok(()) => Ok(Outcome::Done(self.ctx.channel.take_values())),
            Err(Control::Suspend(signal)) => {
                debug!(
                    frames = signal.depth(),
                    values = signal.values().len(),
                    "suspended"
                );
                Ok(Outcome::Suspended(signal))
            }
            Err(Control::Error(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::ir::{Args, CaptureSource, Operand, ProcBuilder, Results};

    #[test]
    fn test_instantiate_binds_globals() {
        let mut b = ProcBuilder::new("main", 0);
        let env = b.capture(CaptureSource::Upvalue(0));
        b.get_upvalue(0, env);
        b.index(1, 0u16, Operand::str("type"));
        b.call(1, Args::of(vec![Operand::int(1)]), Results::Fixed(vec![2]));
        b.ret(Args::of(vec![2u16.into()]));
        let proc = compile(&b.build().unwrap()).unwrap();

        let mut driver = Driver::with_config(VmConfig::default());
        let main = driver.instantiate(proc).unwrap();
        let values = driver
            .run_to_completion(main, vec![], |_| Vec::new())
            .unwrap();
        assert_eq!(values, vec![Value::from("number")]);
    }

    #[test]
    fn test_instantiate_rejects_extra_upvalues() {
        let mut b = ProcBuilder::new("main", 0);
        b.capture(CaptureSource::Upvalue(0));
        b.capture(CaptureSource::Upvalue(1));
        b.ret(Args::default());
        let proc = compile(&b.build().unwrap()).unwrap();

        let driver = Driver::with_config(VmConfig::default());
        assert!(driver.instantiate(proc).is_err());
    }

    #[test]
    fn test_pause_round_trip() {
        let mut driver = Driver::with_config(VmConfig::default());
        let pause = driver.context().state().library().function("pause").unwrap();

        let outcome = driver.step(pause, vec![Value::Integer(1)]).unwrap();
        let signal = match outcome {
            Outcome::Suspended(signal) => signal,
            Outcome::Done(_) => panic!("pause should suspend"),
        };
        assert_eq!(signal.values(), &[Value::Integer(1)]);

        match driver.resume(signal, vec![Value::Integer(2)]).unwrap() {
            Outcome::Done(values) => assert_eq!(values, vec![Value::Integer(2)]),
            Outcome::Suspended(_) => panic!("should be done"),
        }
    }
}
