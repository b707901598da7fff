//! Library routine registry
//!
//! Routines are stored in an arena indexed by `BuiltinId`. Function values
//! carry only the id, so the registry is also how a suspended library frame
//! finds its way back to the routine's resume entry point.

use crate::context::ExecutionContext;
use crate::error::Control;
use crate::value::{BuiltinId, Value};
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

/// A routine callable from scripts
pub trait LibraryRoutine {
    fn name(&self) -> &str;

    /// Run from the start. Results go to the context's result channel.
    fn invoke(
        &self,
        ctx: &mut ExecutionContext,
        this: BuiltinId,
        args: Vec<Value>,
    ) -> Result<(), Control>;

    /// Continue from a saved phase. The result channel holds whatever the
    /// operation the routine suspended in produced.
    ///
    /// # Panics
    /// Routines that never suspend have nothing to resume.
    fn resume(
        &self,
        _ctx: &mut ExecutionContext,
        _this: BuiltinId,
        phase: u8,
        _locals: Box<dyn Any>,
    ) -> Result<(), Control> {
        panic!(
            "library routine '{}' cannot be resumed (phase {})",
            self.name(),
            phase
        )
    }
}

/// Signature of a routine that never suspends
pub type NativeFn = fn(&mut ExecutionContext, Vec<Value>) -> Result<(), Control>;

/// Adapter for plain native functions
pub struct NativeFunction {
    name: String,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &str, func: NativeFn) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

impl LibraryRoutine for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &self,
        ctx: &mut ExecutionContext,
        _this: BuiltinId,
        args: Vec<Value>,
    ) -> Result<(), Control> {
        (self.func)(ctx, args)
    }
}

/// Registry of library routines
///
/// O(1) lookup by name (for installing globals) and by id (for dispatch)
pub struct Library {
    name_to_id: HashMap<String, BuiltinId>,
    routines: Vec<Rc<dyn LibraryRoutine>>,
}

impl Library {
    /// Empty library
    pub fn new() -> Self {
        Self {
            name_to_id: HashMap::new(),
            routines: Vec::new(),
        }
    }

    /// Library with the standard routines
    pub fn standard() -> Self {
        let mut library = Self::new();
        super::base::register(&mut library);
        super::table::register(&mut library);
        super::coroutine::register(&mut library);
        library
    }

    /// Register a routine under its own name
    ///
    /// # Panics
    /// Panics if the name is already registered or if more than 65536
    /// routines are registered.
    pub fn register(&mut self, routine: Rc<dyn LibraryRoutine>) -> BuiltinId {
        let name = routine.name().to_string();
        if self.name_to_id.contains_key(&name) {
            panic!("Library routine '{}' already registered", name);
        }

        let id = self.routines.len();
        if id > u16::MAX as usize {
            panic!("Too many library routines (max 65536)");
        }

        let id = BuiltinId(id as u16);
        self.name_to_id.insert(name, id);
        self.routines.push(routine);
        id
    }

    /// Register a native function that never suspends
    pub fn register_fn(&mut self, name: &str, func: NativeFn) -> BuiltinId {
        self.register(Rc::new(NativeFunction::new(name, func)))
    }

    #[inline]
    pub fn get(&self, id: BuiltinId) -> Option<Rc<dyn LibraryRoutine>> {
        self.routines.get(id.0 as usize).cloned()
    }

    #[inline]
    pub fn id(&self, name: &str) -> Option<BuiltinId> {
        self.name_to_id.get(name).copied()
    }

    /// Function value for a registered routine
    pub fn function(&self, name: &str) -> Option<Value> {
        self.id(name).map(Value::builtin)
    }

    /// Names and ids in registration order
    pub fn entries(&self) -> impl Iterator<Item = (&str, BuiltinId)> + '_ {
        self.routines
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name(), BuiltinId(i as u16)))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(ctx: &mut ExecutionContext, _args: Vec<Value>) -> Result<(), Control> {
        ctx.channel.set_empty();
        Ok(())
    }

    #[test]
    fn test_registry_basic() {
        let mut library = Library::new();
        assert!(library.is_empty());

        let id = library.register_fn("dummy", dummy);
        assert_eq!(library.len(), 1);
        assert_eq!(library.id("dummy"), Some(id));
        assert_eq!(library.id("missing"), None);
        assert_eq!(library.get(id).unwrap().name(), "dummy");
        assert!(library.get(BuiltinId(7)).is_none());
    }

    #[test]
    fn test_entries_in_registration_order() {
        let mut library = Library::new();
        library.register_fn("a", dummy);
        library.register_fn("b", dummy);
        let names: Vec<_> = library.entries().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut library = Library::new();
        library.register_fn("dup", dummy);
        library.register_fn("dup", dummy);
    }

    #[test]
    fn test_standard_library_contents() {
        let library = Library::standard();
        for name in [
            "unpack",
            "pack",
            "pause",
            "select",
            "rawlen",
            "rawget",
            "rawequal",
            "setmetatable",
            "getmetatable",
            "type",
        ] {
            assert!(library.id(name).is_some(), "missing {}", name);
        }
    }
}
