use super::helpers::*;
use crate::config::VmConfig;
use crate::driver::Driver;
use crate::error::LuaError;
use crate::ir::{Args, ArithOp, CaptureSource, CompareOp, Const, Operand, ProcBuilder, Results};
use crate::value::Value;

// ============================================================================
// Tail calls
// ============================================================================

/// `countdown(n)`: `"done"` at zero, otherwise a tail call to itself with `n - 1`.
/// The enclosing procedure returns the closure, which reaches itself through
/// a captured register.
fn countdown() -> ProcBuilder {
    let mut inner = ProcBuilder::new("countdown", 1);
    let this = inner.capture(CaptureSource::Local(0));
    let done = inner.new_block();
    let again = inner.new_block();
    inner.compare(1, CompareOp::Eq, 0u16, Operand::int(0));
    inner.branch(1, done, again);
    inner.switch_to(done);
    inner.ret(Args::of(vec![Operand::str("done")]));
    inner.switch_to(again);
    inner.arith(2, ArithOp::Sub, 0u16, Operand::int(1));
    inner.get_upvalue(3, this);
    inner.tail_call(3, Args::of(vec![2u16.into()]));

    let mut outer = ProcBuilder::new("make_countdown", 0);
    let proto = outer.nested(inner.build().unwrap());
    outer.closure(0, proto);
    outer.ret(Args::of(vec![0u16.into()]));
    outer
}

#[test]
fn test_deep_tail_recursion_has_bounded_depth() {
    let mut driver = driver();
    let make = load(&driver, countdown());
    let f = run_plain(&mut driver, make, vec![]).remove(0);

    driver.context_mut().reset_statistics();
    let values = run_plain(&mut driver, f, vec![Value::Integer(1_000_000)]);
    assert_eq!(values, vec![Value::from("done")]);

    let ctx = driver.context();
    assert!(
        ctx.call_depth().high_water() <= 2,
        "native depth grew to {}",
        ctx.call_depth().high_water()
    );
    assert_eq!(ctx.counters().tail_calls, 1_000_000);
}

#[test]
fn test_tail_call_into_library_routine() {
    let mut driver = driver();
    let mut b = ProcBuilder::new("f", 1);
    let env = b.capture(CaptureSource::Upvalue(0));
    b.get_upvalue(1, env);
    b.index(2, 1u16, Operand::str("select"));
    b.tail_call(2, Args::of(vec![Operand::str("#"), 0u16.into(), 0u16.into()]));
    let f = load(&driver, b);

    let values = run(&mut driver, f, vec![Value::Integer(9)]).unwrap();
    assert_eq!(values, vec![Value::Integer(2)]);
}

// ============================================================================
// Non-tail recursion
// ============================================================================

/// `sum(n)`: `n + sum(n - 1)`, not a tail call
fn recursive_sum() -> ProcBuilder {
    let mut inner = ProcBuilder::new("sum", 1);
    let this = inner.capture(CaptureSource::Local(0));
    let base = inner.new_block();
    let step = inner.new_block();
    inner.compare(1, CompareOp::Eq, 0u16, Operand::int(0));
    inner.branch(1, base, step);
    inner.switch_to(base);
    inner.ret(Args::of(vec![Operand::int(0)]));
    inner.switch_to(step);
    inner.arith(2, ArithOp::Sub, 0u16, Operand::int(1));
    inner.get_upvalue(3, this);
    inner.call(3, Args::of(vec![2u16.into()]), Results::Fixed(vec![4]));
    inner.arith(5, ArithOp::Add, 0u16, 4u16);
    inner.ret(Args::of(vec![5u16.into()]));

    let mut outer = ProcBuilder::new("make_sum", 0);
    let proto = outer.nested(inner.build().unwrap());
    outer.load(0, Const::Nil);
    outer.closure(0, proto);
    outer.ret(Args::of(vec![0u16.into()]));
    outer
}

#[test]
fn test_recursion_within_depth_limit() {
    let mut driver = driver();
    let make = load(&driver, recursive_sum());
    let f = run_plain(&mut driver, make, vec![]).remove(0);
    let values = run_plain(&mut driver, f, vec![Value::Integer(100)]);
    assert_eq!(values, vec![Value::Integer(5050)]);
}

#[test]
fn test_recursion_past_depth_limit_overflows() {
    let config = VmConfig {
        max_call_depth: 50,
        ..VmConfig::default()
    };
    let mut driver = Driver::with_config(config);
    let make = load(&driver, recursive_sum());
    let f = run_plain(&mut driver, make, vec![]).remove(0);

    let err = driver.step(f, vec![Value::Integer(100)]).unwrap_err();
    assert_eq!(err, LuaError::StackOverflow { limit: 50 });
    // the failed run unwound completely
    assert_eq!(driver.context().call_depth().current(), 0);
}
