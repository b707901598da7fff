use super::helpers::*;
use crate::dispatch;
use crate::error::{Control, LuaError};
use crate::ir::{Args, ProcBuilder};
use crate::table::Table;
use crate::value::Value;

// ============================================================================
// index
// ============================================================================

/// Procedure returning its two arguments
fn echo_two() -> ProcBuilder {
    let mut b = ProcBuilder::new("echo", 2);
    b.ret(Args::of(vec![0u16.into(), 1u16.into()]));
    b
}

#[test]
fn test_raw_hit_skips_metamethods() {
    let mut driver = driver();
    let handler = load(&driver, echo_two());
    let mut t = Table::new();
    t.rawset(Value::from("k"), Value::Integer(1)).unwrap();
    let t = with_metatable(t, vec![("__index", handler)]);

    let ctx = driver.context_mut();
    ctx.reset_statistics();
    dispatch::index(ctx, t, Value::from("k")).unwrap();
    assert_eq!(ctx.channel().first(), Value::Integer(1));
    assert_eq!(ctx.counters().metamethod_calls, 0);
}

#[test]
fn test_index_function_gets_value_and_key() {
    let mut driver = driver();
    let handler = load(&driver, echo_two());
    let t = with_metatable(Table::new(), vec![("__index", handler)]);

    let ctx = driver.context_mut();
    dispatch::index(ctx, t.clone(), Value::from("missing")).unwrap();
    assert_eq!(ctx.channel().as_slice(), &[t, Value::from("missing")]);
    assert_eq!(ctx.counters().metamethod_calls, 1);
}

#[test]
fn test_index_table_chain() {
    let mut driver = driver();
    let mut base = Table::new();
    base.rawset(Value::from("x"), Value::Integer(42)).unwrap();
    let middle = with_metatable(Table::new(), vec![("__index", Value::table(base))]);
    let top = with_metatable(Table::new(), vec![("__index", middle)]);

    let ctx = driver.context_mut();
    dispatch::index(ctx, top.clone(), Value::from("x")).unwrap();
    assert_eq!(ctx.channel().first(), Value::Integer(42));

    dispatch::index(ctx, top, Value::from("y")).unwrap();
    assert_eq!(ctx.channel().first(), Value::Nil);
}

#[test]
fn test_index_without_handler() {
    let mut driver = driver();
    let ctx = driver.context_mut();

    dispatch::index(ctx, Value::table(Table::new()), Value::Integer(1)).unwrap();
    assert_eq!(ctx.channel().first(), Value::Nil);

    match dispatch::index(ctx, Value::Boolean(true), Value::Integer(1)).unwrap_err() {
        Control::Error(e) => assert_eq!(e, LuaError::illegal("index", "boolean")),
        Control::Suspend(_) => panic!("unexpected suspension"),
    }
}

#[test]
fn test_index_cycle_is_bounded() {
    let mut driver = driver();
    let a = Value::table(Table::new());
    let b = with_metatable(Table::new(), vec![("__index", a.clone())]);
    let mut mt = Table::new();
    mt.rawset(Value::from("__index"), b).unwrap();
    as_table(&a)
        .borrow_mut()
        .set_metatable(Some(as_table(&Value::table(mt))));

    match dispatch::index(driver.context_mut(), a, Value::from("k")).unwrap_err() {
        Control::Error(e) => assert_eq!(e, LuaError::IndexChainTooLong),
        Control::Suspend(_) => panic!("unexpected suspension"),
    }
}

// ============================================================================
// call
// ============================================================================

#[test]
fn test_call_metamethod_prepends_target() {
    let mut driver = driver();
    let handler = load(&driver, echo_two());
    let t = with_metatable(Table::new(), vec![("__call", handler)]);

    let values = run_plain(&mut driver, t.clone(), vec![Value::Integer(1)]);
    assert_eq!(values, vec![t, Value::Integer(1)]);
}

#[test]
fn test_direct_call_passes_args_unchanged() {
    let mut driver = driver();
    let f = load(&driver, echo_two());
    let values = run_plain(&mut driver, f, ints(&[5, 6, 7]));
    assert_eq!(values, ints(&[5, 6]));
}

#[test]
fn test_call_non_function_metamethod() {
    let mut driver = driver();
    let t = with_metatable(Table::new(), vec![("__call", Value::Integer(3))]);
    let err = driver.step(t, vec![]).unwrap_err();
    assert_eq!(err, LuaError::illegal("call", "table"));
}

#[test]
fn test_len_metamethod() {
    let mut driver = driver();
    let rawlen = driver.context().state().library().function("rawlen").unwrap();
    let t = with_metatable(
        Table::from_sequence(ints(&[1, 2])),
        vec![("__len", Value::Nil)],
    );
    let ctx = driver.context_mut();
    dispatch::len(ctx, t).unwrap();
    assert_eq!(ctx.channel().first(), Value::Integer(2));

    // __len receives the value itself
    let counted = with_metatable(Table::from_sequence(ints(&[1, 2, 3])), vec![("__len", rawlen)]);
    dispatch::len(ctx, counted).unwrap();
    assert_eq!(ctx.channel().first(), Value::Integer(3));
    assert_eq!(ctx.counters().metamethod_calls, 1);
}
