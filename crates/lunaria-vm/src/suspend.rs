//! Suspension and resumption
//!
//! A routine that wants to yield to the driver returns
//! `Err(Control::Suspend(signal))`. Each frame the signal passes through
//! appends a `SavedFrame` describing where it stopped, so when the signal
//! reaches the driver it holds the whole suspended stack, innermost first.
//!
//! Resuming rebuilds that stack top-down. The outermost frame is resumed
//! first; before continuing at its resumption point it resumes the frame
//! beneath it, and so on until the innermost frame picks up the values the
//! driver supplied. Each frame then finds its callee's results in the result
//! channel exactly as if the call had returned normally.

use crate::bytecode::ResumePoint;
use crate::context::ExecutionContext;
use crate::dispatch;
use crate::error::{Control, LuaError};
use crate::value::{BuiltinId, Value};
use crate::vm::closure::{self, LuaClosure};
use crate::vm::frame::Frame;
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Snapshot of one suspended frame
pub enum SavedFrame {
    /// A compiled procedure: its closure plus registers, varargs and the
    /// resumption point to continue at
    Compiled {
        closure: Rc<LuaClosure>,
        frame: Frame,
    },

    /// A library routine: the phase it will continue in and its locals
    Library {
        routine: BuiltinId,
        phase: u8,
        locals: Box<dyn Any>,
    },
}

impl SavedFrame {
    /// Library frame with typed locals
    pub fn library<L: Any>(routine: BuiltinId, phase: u8, locals: L) -> Self {
        SavedFrame::Library {
            routine,
            phase,
            locals: Box::new(locals),
        }
    }

    /// Resumption point, for compiled frames
    pub fn resume_point(&self) -> Option<ResumePoint> {
        match self {
            SavedFrame::Compiled { frame, .. } => Some(frame.point),
            SavedFrame::Library { .. } => None,
        }
    }
}

impl fmt::Debug for SavedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavedFrame::Compiled { closure, frame } => f
                .debug_struct("Compiled")
                .field("procedure", &closure.proc.name)
                .field("point", &frame.point)
                .field("registers", &frame.registers.len())
                .finish(),
            SavedFrame::Library { routine, phase, .. } => f
                .debug_struct("Library")
                .field("routine", routine)
                .field("phase", phase)
                .finish(),
        }
    }
}

/// Suspended stack on its way to the driver
#[derive(Debug)]
pub struct SuspendSignal {
    /// Innermost first
    frames: Vec<SavedFrame>,
    /// Values handed to the driver by the suspending routine
    values: Vec<Value>,
}

impl SuspendSignal {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            frames: Vec::new(),
            values,
        }
    }

    /// Start suspending with the given values and the caller's own frame
    pub fn suspend(values: Vec<Value>, frame: SavedFrame) -> Control {
        let mut signal = Self::new(values);
        signal.push(frame);
        Control::Suspend(signal)
    }

    /// Append the next outer frame
    pub fn push(&mut self, frame: SavedFrame) {
        self.frames.push(frame);
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Saved frames, innermost first
    pub fn frames(&self) -> &[SavedFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn into_continuation(self) -> Continuation {
        Continuation {
            frames: self.frames,
        }
    }
}

/// The frames of a suspended stack, consumed outermost first
pub(crate) struct Continuation {
    frames: Vec<SavedFrame>,
}

impl Continuation {
    /// Resume the outermost remaining frame, then run any tail call it left.
    ///
    /// With no frames left, the channel already holds the driver's values.
    pub(crate) fn resume_next(&mut self, ctx: &mut ExecutionContext) -> Result<(), Control> {
        match self.frames.pop() {
            Some(frame) => {
                resume_frame(ctx, frame, self)?;
                dispatch::evaluate_tail_calls(ctx)
            }
            None => Ok(()),
        }
    }
}

fn resume_frame(
    ctx: &mut ExecutionContext,
    saved: SavedFrame,
    rest: &mut Continuation,
) -> Result<(), Control> {
    ctx.nested(|ctx| {
        if let Err(control) = rest.resume_next(ctx) {
            return Err(control.suspended_through(|| saved));
        }

        match saved {
            SavedFrame::Compiled { closure, frame } => {
                debug!(
                    procedure = %closure.proc.name,
                    point = frame.point.0,
                    "resuming compiled frame"
                );
                closure::resume(ctx, &closure, frame)
            }
            SavedFrame::Library {
                routine,
                phase,
                locals,
            } => {
                let handler = ctx.state().library().get(routine).ok_or_else(|| {
                    LuaError::Runtime(format!("unknown library routine #{}", routine.0))
                })?;
                debug!(routine = handler.name(), phase, "resuming library frame");
                handler.resume(ctx, routine, phase, locals)
            }
        }
    })
}
