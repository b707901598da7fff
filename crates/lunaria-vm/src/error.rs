//! Error types for the runtime and compiler
//!
//! Two things travel on the `Err` side of a suspendable operation: real errors
//! (`LuaError`) and suspension (`SuspendSignal`). They are kept apart by
//! `Control` so an error handler can never mistake one for the other.

use crate::suspend::{SavedFrame, SuspendSignal};
use thiserror::Error;

/// User-visible runtime errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LuaError {
    /// An operation is not defined for the value's type
    #[error("attempt to {operation} a {type_name} value")]
    IllegalOperation {
        operation: &'static str,
        type_name: &'static str,
    },

    /// Metamethod dispatch the runtime does not implement yet
    #[error("'{operation}' metamethod dispatch is not yet supported")]
    NotYetSupported { operation: &'static str },

    /// Bad argument passed to a library routine
    #[error("bad argument #{position} to '{function}' ({message})")]
    BadArgument {
        position: usize,
        function: String,
        message: String,
    },

    /// Integer division or modulo by zero
    #[error("attempt to perform 'n{operator}0'")]
    DivisionByZero { operator: &'static str },

    /// Too many chained `__index` tables
    #[error("'__index' chain too long; possible loop")]
    IndexChainTooLong,

    /// Native call depth limit exceeded
    #[error("stack overflow (more than {limit} nested calls)")]
    StackOverflow { limit: usize },

    /// Runtime error with message
    #[error("{0}")]
    Runtime(String),
}

impl LuaError {
    /// Shorthand for a failed operation on a value of the given type
    pub fn illegal(operation: &'static str, type_name: &'static str) -> Self {
        LuaError::IllegalOperation {
            operation,
            type_name,
        }
    }

    /// Shorthand for a bad library argument
    pub fn bad_argument(position: usize, function: &str, message: impl Into<String>) -> Self {
        LuaError::BadArgument {
            position,
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Non-local exit from a suspendable operation
#[derive(Debug)]
pub enum Control {
    /// A runtime error, propagated to the driver untouched
    Error(LuaError),

    /// Execution is suspending; every frame on the way out appends itself
    Suspend(SuspendSignal),
}

impl Control {
    /// Append a frame if this is a suspension, pass errors through.
    ///
    /// The frame is built lazily so errors never pay for a register snapshot.
    pub fn suspended_through(self, frame: impl FnOnce() -> SavedFrame) -> Control {
        match self {
            Control::Suspend(mut signal) => {
                signal.push(frame());
                Control::Suspend(signal)
            }
            error @ Control::Error(_) => error,
        }
    }

    /// Is this a suspension?
    pub fn is_suspend(&self) -> bool {
        matches!(self, Control::Suspend(_))
    }
}

impl From<LuaError> for Control {
    fn from(error: LuaError) -> Self {
        Control::Error(error)
    }
}

/// Compiler errors for malformed procedure graphs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Procedure has no blocks
    #[error("procedure '{procedure}' has no blocks")]
    EmptyProcedure { procedure: String },

    /// Block was never given a terminator
    #[error("block {block} of '{procedure}' has no terminator")]
    UnterminatedBlock { procedure: String, block: usize },

    /// Register index out of range
    #[error("register r{register} out of range in '{procedure}' ({count} registers)")]
    InvalidRegister {
        procedure: String,
        register: u16,
        count: u16,
    },

    /// Jump to a block that does not exist
    #[error("block {block} does not exist in '{procedure}'")]
    InvalidBlock { procedure: String, block: usize },

    /// Closure of a nested procedure that does not exist
    #[error("nested procedure {index} does not exist in '{procedure}'")]
    InvalidProcedure { procedure: String, index: usize },

    /// Upvalue index out of range
    #[error("upvalue {index} does not exist in '{procedure}'")]
    InvalidUpvalue { procedure: String, index: u16 },

    /// Vararg access in a fixed-arity procedure
    #[error("vararg used in non-vararg procedure '{procedure}'")]
    VarargOutsideVarargProcedure { procedure: String },

    /// More parameters than registers
    #[error("procedure '{procedure}' declares {params} parameters but only {registers} registers")]
    TooManyParameters {
        procedure: String,
        params: u16,
        registers: u16,
    },
}
