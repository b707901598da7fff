//! `pause`: hand values to the driver and wait to be resumed

use super::{registry::Library, restore_locals, LibraryRoutine};
use crate::context::ExecutionContext;
use crate::error::Control;
use crate::suspend::{SavedFrame, SuspendSignal};
use crate::value::{BuiltinId, Value};
use std::any::Any;
use std::rc::Rc;
use tracing::debug;

pub fn register(library: &mut Library) {
    library.register(Rc::new(Pause));
}

/// `pause(...)` suspends with its arguments. When resumed it returns the
/// values the driver supplied, or its own arguments if the driver supplied
/// none.
pub struct Pause;

impl LibraryRoutine for Pause {
    fn name(&self) -> &str {
        "pause"
    }

    fn invoke(
        &self,
        _ctx: &mut ExecutionContext,
        this: BuiltinId,
        args: Vec<Value>,
    ) -> Result<(), Control> {
        debug!(values = args.len(), "pause");
        Err(SuspendSignal::suspend(
            args.clone(),
            SavedFrame::library(this, 0, args),
        ))
    }

    fn resume(
        &self,
        ctx: &mut ExecutionContext,
        _this: BuiltinId,
        phase: u8,
        locals: Box<dyn Any>,
    ) -> Result<(), Control> {
        assert_eq!(phase, 0, "illegal pause phase");
        let args: Vec<Value> = restore_locals(self.name(), locals);
        if ctx.channel.is_empty() {
            ctx.channel.set_values(args);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::context::State;
    use crate::dispatch;

    #[test]
    fn test_pause_suspends_with_arguments() {
        let mut ctx = ExecutionContext::new(State::new(VmConfig::default()));
        let pause = ctx.state().library().function("pause").unwrap();

        let err = dispatch::call(&mut ctx, pause, vec![Value::Integer(7)]).unwrap_err();
        match err {
            Control::Suspend(signal) => {
                assert_eq!(signal.values(), &[Value::Integer(7)]);
                assert_eq!(signal.depth(), 1);
                assert!(signal.frames()[0].resume_point().is_none());
            }
            Control::Error(e) => panic!("unexpected error: {}", e),
        }
    }
}
