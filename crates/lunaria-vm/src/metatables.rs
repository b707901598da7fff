//! Metatable lookup
//!
//! Tables carry their own metatable; every other value uses the per-type
//! metatable registered on the state, if any.

use crate::context::State;
use crate::value::{TableRef, Value};

/// Metamethod events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Index,
    Call,
    Len,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    IDiv,
    Unm,
    Eq,
    Lt,
    Le,
}

impl Event {
    pub const ALL: [Event; 14] = [
        Event::Index,
        Event::Call,
        Event::Len,
        Event::Add,
        Event::Sub,
        Event::Mul,
        Event::Div,
        Event::Mod,
        Event::Pow,
        Event::IDiv,
        Event::Unm,
        Event::Eq,
        Event::Lt,
        Event::Le,
    ];

    /// Metatable key for this event
    pub fn key(self) -> &'static str {
        match self {
            Event::Index => "__index",
            Event::Call => "__call",
            Event::Len => "__len",
            Event::Add => "__add",
            Event::Sub => "__sub",
            Event::Mul => "__mul",
            Event::Div => "__div",
            Event::Mod => "__mod",
            Event::Pow => "__pow",
            Event::IDiv => "__idiv",
            Event::Unm => "__unm",
            Event::Eq => "__eq",
            Event::Lt => "__lt",
            Event::Le => "__le",
        }
    }
}

/// Metatable of any value
pub fn metatable_of(state: &State, value: &Value) -> Option<TableRef> {
    match value {
        Value::Table(t) => t.borrow().metatable(),
        other => state.type_metatable(other.kind()),
    }
}

/// Metamethod for `event` on `value`, or nil
pub fn metamethod(state: &State, value: &Value, event: Event) -> Value {
    match metatable_of(state, value) {
        Some(mt) => mt.borrow().rawget(state.event_key(event)),
        None => Value::Nil,
    }
}

/// Handler for a binary event: `a`'s metamethod, else `b`'s
pub fn binary_handler(state: &State, a: &Value, b: &Value, event: Event) -> Value {
    let handler = metamethod(state, a, event);
    if handler.is_nil() {
        metamethod(state, b, event)
    } else {
        handler
    }
}
