//! Interpreter state and execution context
//!
//! `State` is what outlives a single run: configuration, the library registry,
//! per-type metatables and the globals table. `ExecutionContext` wraps a state
//! with the per-run machinery: the result channel, the native call depth, and
//! dispatch counters.

use crate::builtins::registry::Library;
use crate::channel::ResultChannel;
use crate::config::VmConfig;
use crate::error::LuaError;
use crate::metatables::Event;
use crate::table::Table;
use crate::value::{TableRef, Value, ValueKind};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Long-lived interpreter state
pub struct State {
    config: VmConfig,
    library: Library,
    type_metatables: HashMap<ValueKind, TableRef>,
    event_keys: HashMap<Event, Value>,
    globals: TableRef,
}

impl State {
    /// State with the standard library installed into the globals table
    pub fn new(config: VmConfig) -> Self {
        Self::with_library(config, Library::standard())
    }

    /// State with a custom library
    pub fn with_library(config: VmConfig, library: Library) -> Self {
        let event_keys = Event::ALL
            .iter()
            .map(|e| (*e, Value::from(e.key())))
            .collect();

        let mut globals = Table::new();
        for (name, id) in library.entries() {
            globals.set_str(name, Value::builtin(id));
        }

        Self {
            config,
            library,
            type_metatables: HashMap::new(),
            event_keys,
            globals: Rc::new(RefCell::new(globals)),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Global environment table
    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    /// Metatable shared by all non-table values of a kind
    pub fn type_metatable(&self, kind: ValueKind) -> Option<TableRef> {
        self.type_metatables.get(&kind).cloned()
    }

    /// Set or clear the metatable for a kind; tables use their own instead
    pub fn set_type_metatable(&mut self, kind: ValueKind, metatable: Option<TableRef>) {
        match metatable {
            Some(mt) => {
                self.type_metatables.insert(kind, mt);
            }
            None => {
                self.type_metatables.remove(&kind);
            }
        }
    }

    /// Interned metatable key for an event
    pub(crate) fn event_key(&self, event: Event) -> &Value {
        &self.event_keys[&event]
    }
}

/// Native call depth with a high-water mark
#[derive(Debug, Default, Clone, Copy)]
pub struct CallDepth {
    current: usize,
    high_water: usize,
}

impl CallDepth {
    /// Current nesting
    pub fn current(&self) -> usize {
        self.current
    }

    /// Deepest nesting seen since the last reset
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub(crate) fn enter(&mut self, limit: usize) -> Result<(), LuaError> {
        if self.current >= limit {
            return Err(LuaError::StackOverflow { limit });
        }
        self.current += 1;
        self.high_water = self.high_water.max(self.current);
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.current = self.current.saturating_sub(1);
    }
}

/// How often each dispatch entry point ran
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCounters {
    /// Functions invoked, including trampolined tail calls
    pub invocations: u64,
    /// Tail calls flattened by the trampoline
    pub tail_calls: u64,
    /// `index` dispatches
    pub index: u64,
    /// `len` dispatches
    pub len: u64,
    /// Arithmetic dispatches (statically numeric operations skip dispatch)
    pub arithmetic: u64,
    /// Metamethod handlers called
    pub metamethod_calls: u64,
}

/// Per-run execution context
pub struct ExecutionContext {
    state: State,
    pub(crate) channel: ResultChannel,
    pub(crate) depth: CallDepth,
    pub(crate) counters: DispatchCounters,
}

impl ExecutionContext {
    pub fn new(state: State) -> Self {
        Self {
            state,
            channel: ResultChannel::new(),
            depth: CallDepth::default(),
            counters: DispatchCounters::default(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn config(&self) -> &VmConfig {
        self.state.config()
    }

    /// Result channel of the most recent call
    pub fn channel(&self) -> &ResultChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut ResultChannel {
        &mut self.channel
    }

    pub fn call_depth(&self) -> CallDepth {
        self.depth
    }

    pub fn counters(&self) -> DispatchCounters {
        self.counters
    }

    /// Zero the counters and the depth high-water mark
    pub fn reset_statistics(&mut self) {
        self.counters = DispatchCounters::default();
        self.depth.high_water = self.depth.current;
    }

    /// Run `f` one native call level deeper
    pub(crate) fn nested<T, E: From<LuaError>>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let limit = self.state.config.max_call_depth;
        self.depth.enter(limit)?;
        let result = f(self);
        self.depth.leave();
        result
    }
}
