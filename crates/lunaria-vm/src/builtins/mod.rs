//! Library routines
//!
//! The standard routines, organized by category:
//! - Base: select, type, raw accessors, metatable access
//! - Table: pack, and `unpack` as a resumable state machine
//! - Coroutine: `pause`, which hands values to the driver and waits
//!
//! Routines that can suspend implement `LibraryRoutine` directly, with an
//! explicit phase enum and a locals struct saved on suspension. Routines
//! that cannot suspend are plain functions registered through `register_fn`.

pub mod base;
pub mod coroutine;
pub mod registry;
pub mod table;

use crate::error::LuaError;
use crate::value::{TableRef, Value};
use std::any::Any;

pub use registry::{Library, LibraryRoutine, NativeFn, NativeFunction};

// ============================================================================
// Argument helpers
// ============================================================================

/// Argument `position` (1-based), nil when absent
pub(crate) fn arg(args: &[Value], position: usize) -> Value {
    args.get(position - 1).cloned().unwrap_or(Value::Nil)
}

pub(crate) fn check_table(
    args: &[Value],
    position: usize,
    function: &str,
) -> Result<TableRef, LuaError> {
    match args.get(position - 1) {
        Some(Value::Table(t)) => Ok(t.clone()),
        other => Err(type_error(position, function, "table", other)),
    }
}

pub(crate) fn check_integer(
    args: &[Value],
    position: usize,
    function: &str,
) -> Result<i64, LuaError> {
    let value = args.get(position - 1);
    match value.and_then(|v| v.to_number()) {
        Some(_) => value.and_then(|v| v.as_integer()).ok_or_else(|| {
            LuaError::bad_argument(position, function, "number has no integer representation")
        }),
        None => Err(type_error(position, function, "number", value)),
    }
}

/// Integer argument, `default` when absent or nil
pub(crate) fn opt_integer(
    args: &[Value],
    position: usize,
    function: &str,
    default: i64,
) -> Result<i64, LuaError> {
    match args.get(position - 1) {
        None | Some(Value::Nil) => Ok(default),
        Some(_) => check_integer(args, position, function),
    }
}

fn type_error(position: usize, function: &str, expected: &str, got: Option<&Value>) -> LuaError {
    let got = got.map(|v| v.type_name()).unwrap_or("no value");
    LuaError::bad_argument(position, function, format!("{} expected, got {}", expected, got))
}

/// Recover the locals a routine saved on suspension.
///
/// # Panics
/// If the saved state is not the routine's locals type.
pub(crate) fn restore_locals<L: Any>(routine: &str, locals: Box<dyn Any>) -> L {
    match locals.downcast::<L>() {
        Ok(locals) => *locals,
        Err(_) => panic!("saved state of '{}' has the wrong type", routine),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arguments() {
        let args = vec![Value::Integer(3), Value::Float(2.0), Value::Float(2.5), Value::from("x")];
        assert_eq!(check_integer(&args, 1, "f").unwrap(), 3);
        assert_eq!(check_integer(&args, 2, "f").unwrap(), 2);
        assert_eq!(
            check_integer(&args, 3, "f").unwrap_err().to_string(),
            "bad argument #3 to 'f' (number has no integer representation)"
        );
        assert_eq!(
            check_integer(&args, 4, "f").unwrap_err().to_string(),
            "bad argument #4 to 'f' (number expected, got string)"
        );
        assert_eq!(opt_integer(&args, 9, "f", 1).unwrap(), 1);
    }

    #[test]
    fn test_check_table_missing() {
        let err = check_table(&[], 1, "rawlen").unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'rawlen' (table expected, got no value)"
        );
    }

    #[test]
    #[should_panic(expected = "wrong type")]
    fn test_restore_locals_type_mismatch() {
        let _: String = restore_locals("r", Box::new(5u8));
    }
}
