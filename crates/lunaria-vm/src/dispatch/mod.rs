//! Call dispatch
//!
//! Every operation whose behavior depends on a value's runtime type goes
//! through here: calls, indexing, length, arithmetic and comparison. All of
//! them leave their results in the context's result channel, and all of them
//! may suspend if a metamethod they invoke does.
//!
//! Calls come in two flavors. `invoke` runs a single function and may leave a
//! pending tail call in the channel; `call` invokes and then runs the tail-call
//! trampoline until the channel holds plain results. A procedure that ends in a
//! tail call therefore never nests a native frame for its callee.

pub mod arithmetic;

use crate::context::ExecutionContext;
use crate::error::{Control, LuaError};
use crate::metatables::{self, Event};
use crate::value::{Function, Value};
use crate::vm::closure;
use arithmetic::ArithOp;
use tracing::{trace, warn};

pub use arithmetic::raw_arithmetic;

/// How a value is called
#[derive(Debug, Clone)]
pub enum Callable {
    /// The value itself is a function
    Direct(Function),
    /// The value's `__call` metamethod; the value is passed as first argument
    Metamethod(Function),
}

/// Find what calling `target` means
pub fn resolve_callable(ctx: &ExecutionContext, target: &Value) -> Result<Callable, LuaError> {
    if let Value::Function(f) = target {
        return Ok(Callable::Direct(f.clone()));
    }
    match metatables::metamethod(ctx.state(), target, Event::Call) {
        Value::Function(f) => Ok(Callable::Metamethod(f)),
        _ => Err(LuaError::illegal("call", target.type_name())),
    }
}

/// Invoke `target` once; a pending tail call may be left in the channel
pub fn invoke(ctx: &mut ExecutionContext, target: Value, args: Vec<Value>) -> Result<(), Control> {
    match resolve_callable(ctx, &target)? {
        Callable::Direct(f) => invoke_function(ctx, &f, args),
        Callable::Metamethod(f) => {
            ctx.counters.metamethod_calls += 1;
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(target);
            full.extend(args);
            invoke_function(ctx, &f, full)
        }
    }
}

fn invoke_function(
    ctx: &mut ExecutionContext,
    function: &Function,
    args: Vec<Value>,
) -> Result<(), Control> {
    ctx.counters.invocations += 1;
    ctx.nested(|ctx| match function {
        Function::Closure(c) => closure::invoke(ctx, c, args),
        Function::Builtin(id) => {
            let routine = ctx.state().library().get(*id).ok_or_else(|| {
                LuaError::Runtime(format!("unknown library routine #{}", id.0))
            })?;
            trace!(routine = routine.name(), args = args.len(), "invoking library routine");
            routine.invoke(ctx, *id, args)
        }
    })
}

/// Run pending tail calls until the channel holds plain results
pub fn evaluate_tail_calls(ctx: &mut ExecutionContext) -> Result<(), Control> {
    while let Some(tail) = ctx.channel.take_tail_call() {
        ctx.counters.tail_calls += 1;
        invoke(ctx, tail.target, tail.args)?;
    }
    Ok(())
}

/// Invoke `target` and flatten any tail calls it leaves
pub fn call(ctx: &mut ExecutionContext, target: Value, args: Vec<Value>) -> Result<(), Control> {
    invoke(ctx, target, args)?;
    evaluate_tail_calls(ctx)
}

/// `value[key]` with `__index` dispatch
pub fn index(ctx: &mut ExecutionContext, value: Value, key: Value) -> Result<(), Control> {
    ctx.counters.index += 1;
    let limit = ctx.config().max_index_chain;
    let mut current = value;

    for _ in 0..limit {
        if let Value::Table(t) = &current {
            let raw = t.borrow().rawget(&key);
            if !raw.is_nil() {
                ctx.channel.set_to(raw);
                return Ok(());
            }
        }

        let handler = metatables::metamethod(ctx.state(), &current, Event::Index);
        match handler {
            Value::Nil if matches!(current, Value::Table(_)) => {
                ctx.channel.set_to(Value::Nil);
                return Ok(());
            }
            Value::Function(_) => {
                trace!(key = %key, "calling __index handler");
                ctx.counters.metamethod_calls += 1;
                return call(ctx, handler, vec![current, key]);
            }
            Value::Table(_) => {
                current = handler;
            }
            _ => return Err(LuaError::illegal("index", current.type_name()).into()),
        }
    }

    warn!(limit, key = %key, "__index chain limit reached");
    Err(LuaError::IndexChainTooLong.into())
}

/// `#value` with `__len` dispatch
pub fn len(ctx: &mut ExecutionContext, value: Value) -> Result<(), Control> {
    ctx.counters.len += 1;
    if let Value::String(s) = &value {
        let n = s.len() as i64;
        ctx.channel.set_to(Value::Integer(n));
        return Ok(());
    }

    match metatables::metamethod(ctx.state(), &value, Event::Len) {
        handler @ Value::Function(_) => {
            ctx.counters.metamethod_calls += 1;
            call(ctx, handler, vec![value])
        }
        _ => match &value {
            Value::Table(t) => {
                let n = t.borrow().rawlen();
                ctx.channel.set_to(Value::Integer(n));
                Ok(())
            }
            other => Err(LuaError::illegal("get length of", other.type_name()).into()),
        },
    }
}

/// Arithmetic with metamethod fallback
pub fn arithmetic(
    ctx: &mut ExecutionContext,
    op: ArithOp,
    a: Value,
    b: Value,
) -> Result<(), Control> {
    ctx.counters.arithmetic += 1;
    if let Some(result) = raw_arithmetic(op, &a, &b) {
        ctx.channel.set_to(result?);
        return Ok(());
    }

    let handler = metatables::binary_handler(ctx.state(), &a, &b, op.event());
    if handler.is_nil() {
        let culprit = if a.to_number().is_none() { &a } else { &b };
        return Err(LuaError::illegal("perform arithmetic on", culprit.type_name()).into());
    }

    trace!(op = %op, "calling arithmetic metamethod");
    ctx.counters.metamethod_calls += 1;
    call(ctx, handler, vec![a, b])
}

/// Equality; only primitive cases are supported
pub fn eq(ctx: &ExecutionContext, a: &Value, b: &Value) -> Result<bool, LuaError> {
    if a.raw_equals(b) {
        return Ok(true);
    }
    if let (Value::Table(_), Value::Table(_)) = (a, b) {
        let handler = metatables::binary_handler(ctx.state(), a, b, Event::Eq);
        if !handler.is_nil() {
            return Err(LuaError::NotYetSupported { operation: "__eq" });
        }
    }
    Ok(false)
}

/// Less-than; only numbers and strings are supported
pub fn lt(ctx: &ExecutionContext, a: &Value, b: &Value) -> Result<bool, LuaError> {
    compare(ctx, a, b, Event::Lt).map(|ord| ord == Some(std::cmp::Ordering::Less))
}

/// Less-or-equal; only numbers and strings are supported
pub fn le(ctx: &ExecutionContext, a: &Value, b: &Value) -> Result<bool, LuaError> {
    compare(ctx, a, b, Event::Le).map(|ord| {
        matches!(
            ord,
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        )
    })
}

/// `None` means unordered (NaN involved)
fn compare(
    ctx: &ExecutionContext,
    a: &Value,
    b: &Value,
    event: Event,
) -> Result<Option<std::cmp::Ordering>, LuaError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Some(x.cmp(y))),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let x = a.to_number().map(|n| n.as_float()).unwrap_or(f64::NAN);
            let y = b.to_number().map(|n| n.as_float()).unwrap_or(f64::NAN);
            Ok(x.partial_cmp(&y))
        }
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        _ => {
            let handler = metatables::binary_handler(ctx.state(), a, b, event);
            if handler.is_nil() {
                let culprit = if matches!(a, Value::Integer(_) | Value::Float(_) | Value::String(_))
                {
                    b
                } else {
                    a
                };
                Err(LuaError::illegal("compare", culprit.type_name()))
            } else {
                Err(LuaError::NotYetSupported {
                    operation: event.key(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::context::State;
    use crate::table::Table;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(State::new(VmConfig::default()))
    }

    #[test]
    fn test_call_non_callable() {
        let mut ctx = ctx();
        let err = call(&mut ctx, Value::Integer(3), vec![]).unwrap_err();
        match err {
            Control::Error(e) => assert_eq!(e, LuaError::illegal("call", "number")),
            Control::Suspend(_) => panic!("unexpected suspension"),
        }
    }

    #[test]
    fn test_len_of_string_and_table() {
        let mut ctx = ctx();
        len(&mut ctx, Value::from("hello")).unwrap();
        assert_eq!(ctx.channel().first(), Value::Integer(5));

        let t = Value::table(Table::from_sequence(vec![Value::Nil, Value::Integer(1)]));
        len(&mut ctx, t).unwrap();
        assert_eq!(ctx.channel().first(), Value::Integer(0));

        assert!(len(&mut ctx, Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_arithmetic_error_names_non_number() {
        let mut ctx = ctx();
        let err = arithmetic(&mut ctx, ArithOp::Add, Value::Integer(1), Value::Boolean(true))
            .unwrap_err();
        match err {
            Control::Error(e) => {
                assert_eq!(e, LuaError::illegal("perform arithmetic on", "boolean"))
            }
            Control::Suspend(_) => panic!("unexpected suspension"),
        }
    }

    #[test]
    fn test_primitive_comparisons() {
        let ctx = ctx();
        assert!(lt(&ctx, &Value::Integer(1), &Value::Float(1.5)).unwrap());
        assert!(le(&ctx, &Value::Integer(2), &Value::Integer(2)).unwrap());
        assert!(lt(&ctx, &Value::from("a"), &Value::from("b")).unwrap());
        assert!(!lt(&ctx, &Value::Float(f64::NAN), &Value::Integer(1)).unwrap());
        assert!(eq(&ctx, &Value::Integer(1), &Value::Float(1.0)).unwrap());
        assert_eq!(
            lt(&ctx, &Value::Integer(1), &Value::from("2")).unwrap_err(),
            LuaError::illegal("compare", "string")
        );
    }

    #[test]
    fn test_comparison_metamethods_not_supported() {
        let ctx = ctx();
        let mut mt = Table::new();
        mt.rawset(Value::from("__lt"), Value::builtin(crate::value::BuiltinId(0)))
            .unwrap();
        mt.rawset(Value::from("__eq"), Value::builtin(crate::value::BuiltinId(0)))
            .unwrap();
        let mt = Value::table(mt);

        let mut t = Table::new();
        t.set_metatable(mt.as_table().cloned());
        let a = Value::table(t);
        let b = Value::table(Table::new());

        assert_eq!(
            lt(&ctx, &a, &b).unwrap_err(),
            LuaError::NotYetSupported { operation: "__lt" }
        );
        assert_eq!(
            eq(&ctx, &a, &b).unwrap_err(),
            LuaError::NotYetSupported { operation: "__eq" }
        );
        // identical tables are equal without consulting __eq
        assert!(eq(&ctx, &a, &a).unwrap());
    }
}
