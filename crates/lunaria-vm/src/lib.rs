//! Lunaria Virtual Machine
//!
//! This crate compiles procedure graphs of a dynamically-typed, Lua-like
//! language into resumable bytecode and runs them under a cooperative driver.
//! Any operation that may need to yield (a call, an index, a length, or
//! arithmetic on values that might carry metamethods) can suspend the whole
//! native stack and be resumed later, without native stack switching.
//!
//! # Architecture
//!
//! - Suspension travels on the `Err` side as `Control::Suspend`; each frame it
//!   passes appends a snapshot of itself.
//! - Compiled procedures are state machines addressed by a resumption point.
//!   Procedures that cannot suspend pay nothing for it.
//! - Calls leave their results in a per-context result channel. Tail calls
//!   are flattened by a trampoline in the caller.
//! - Library routines that may suspend are explicit phase machines.
//!
//! # Modules
//!
//! - `ir`: procedure graph input format and builder
//! - `compiler`: capture tracking, type inference, state-machine code generation
//! - `bytecode`: compiled procedure format
//! - `vm`: frames, closures and the instruction loop
//! - `dispatch`: call, index, length, arithmetic and comparison dispatch
//! - `suspend`: saved frames, suspend signals and resumption
//! - `builtins`: library registry and routines
//! - `driver`: step/resume entry points for hosts

#![allow(clippy::result_large_err)]

pub mod builtins;
pub mod bytecode;
pub mod bytecode_debug;
pub mod channel;
pub mod compiler;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod ir;
pub mod metatables;
pub mod suspend;
pub mod table;
pub mod value;
pub mod vm;

// Re-export main types
pub use bytecode::CompiledProc;
pub use bytecode_debug::disassemble;
pub use compiler::compile;
pub use config::{ConfigError, VmConfig};
pub use context::{ExecutionContext, State};
pub use driver::{Driver, Outcome};
pub use error::{CompileError, Control, LuaError};
pub use suspend::{SavedFrame, SuspendSignal};
pub use value::Value;

#[cfg(test)]
mod tests;
