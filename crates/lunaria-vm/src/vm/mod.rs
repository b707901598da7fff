//! Compiled procedure execution

pub mod closure;
pub(crate) mod exec;
pub mod frame;

pub use closure::LuaClosure;
pub use frame::{Frame, RegisterWindow, Slot};
