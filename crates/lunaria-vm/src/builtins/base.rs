//! Base routines
//!
//! None of these dispatch through metamethods, so none can suspend.

use super::{arg, check_integer, check_table, registry::Library};
use crate::context::ExecutionContext;
use crate::error::{Control, LuaError};
use crate::metatables;
use crate::table::Table;
use crate::value::Value;

pub fn register(library: &mut Library) {
    library.register_fn("select", lua_select);
    library.register_fn("type", lua_type);
    library.register_fn("rawlen", lua_rawlen);
    library.register_fn("rawget", lua_rawget);
    library.register_fn("rawequal", lua_rawequal);
    library.register_fn("setmetatable", lua_setmetatable);
    library.register_fn("getmetatable", lua_getmetatable);
}

/// `select('#', ...)` or `select(n, ...)`
pub fn lua_select(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    let rest = args.len().saturating_sub(1) as i64;
    if let Some(Value::String(s)) = args.first() {
        if &**s == "#" {
            ctx.channel.set_to(Value::Integer(rest));
            return Ok(());
        }
    }

    let n = check_integer(&args, 1, "select")?;
    let start = if n < 0 {
        rest + n
    } else if n == 0 {
        return Err(LuaError::bad_argument(1, "select", "index out of range").into());
    } else {
        n - 1
    };
    if start < 0 {
        return Err(LuaError::bad_argument(1, "select", "index out of range").into());
    }

    let start = (start as usize).min(args.len() - 1);
    ctx.channel.set_values(args.into_iter().skip(1 + start));
    Ok(())
}

pub fn lua_type(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    match args.first() {
        Some(v) => {
            ctx.channel.set_to(Value::from(v.type_name()));
            Ok(())
        }
        None => Err(LuaError::bad_argument(1, "type", "value expected").into()),
    }
}

pub fn lua_rawlen(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    let n = match args.first() {
        Some(Value::Table(t)) => t.borrow().rawlen(),
        Some(Value::String(s)) => s.len() as i64,
        _ => {
            return Err(
                LuaError::bad_argument(1, "rawlen", "table or string expected").into(),
            )
        }
    };
    ctx.channel.set_to(Value::Integer(n));
    Ok(())
}

pub fn lua_rawget(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    let table = check_table(&args, 1, "rawget")?;
    let value = table.borrow().rawget(&arg(&args, 2));
    ctx.channel.set_to(value);
    Ok(())
}

pub fn lua_rawequal(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    if args.len() < 2 {
        return Err(LuaError::bad_argument(args.len() + 1, "rawequal", "value expected").into());
    }
    ctx.channel
        .set_to(Value::Boolean(args[0].raw_equals(&args[1])));
    Ok(())
}

/// `setmetatable(t, mt)`; refuses to replace a metatable with a `__metatable` field
pub fn lua_setmetatable(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    let table = check_table(&args, 1, "setmetatable")?;
    let metatable = match arg(&args, 2) {
        Value::Nil => None,
        Value::Table(mt) => Some(mt),
        _ => {
            return Err(
                LuaError::bad_argument(2, "setmetatable", "nil or table expected").into(),
            )
        }
    };

    if is_protected(&table.borrow()) {
        return Err(LuaError::Runtime("cannot change a protected metatable".to_string()).into());
    }

    table.borrow_mut().set_metatable(metatable);
    ctx.channel.set_to(Value::Table(table));
    Ok(())
}

/// `getmetatable(v)`; a `__metatable` field stands in for the metatable
pub fn lua_getmetatable(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    let value = arg(&args, 1);
    let result = match metatables::metatable_of(ctx.state(), &value) {
        Some(mt) => {
            let guard = mt.borrow().get_str("__metatable");
            if guard.is_nil() {
                Value::Table(mt)
            } else {
                guard
            }
        }
        None => Value::Nil,
    };
    ctx.channel.set_to(result);
    Ok(())
}

fn is_protected(table: &Table) -> bool {
    table
        .metatable()
        .map(|mt| !mt.borrow().get_str("__metatable").is_nil())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::context::State;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(State::new(VmConfig::default()))
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|i| Value::Integer(*i)).collect()
    }

    #[test]
    fn test_select_count_and_index() {
        let mut ctx = ctx();
        let mut args = vec![Value::from("#")];
        args.extend(ints(&[1, 2, 3]));
        lua_select(&mut ctx, args).unwrap();
        assert_eq!(ctx.channel().first(), Value::Integer(3));

        let mut args = ints(&[2]);
        args.extend(ints(&[10, 20, 30]));
        lua_select(&mut ctx, args).unwrap();
        assert_eq!(ctx.channel().as_slice(), &ints(&[20, 30])[..]);

        let mut args = ints(&[-1]);
        args.extend(ints(&[10, 20, 30]));
        lua_select(&mut ctx, args).unwrap();
        assert_eq!(ctx.channel().as_slice(), &ints(&[30])[..]);

        lua_select(&mut ctx, ints(&[5, 1])).unwrap();
        assert!(ctx.channel().is_empty());
    }

    #[test]
    fn test_select_out_of_range() {
        let mut ctx = ctx();
        assert!(lua_select(&mut ctx, ints(&[0, 1])).is_err());
        assert!(lua_select(&mut ctx, ints(&[-3, 1])).is_err());
    }

    #[test]
    fn test_type_names() {
        let mut ctx = ctx();
        lua_type(&mut ctx, vec![Value::Float(1.0)]).unwrap();
        assert_eq!(ctx.channel().first(), Value::from("number"));
        lua_type(&mut ctx, vec![Value::table(Table::new())]).unwrap();
        assert_eq!(ctx.channel().first(), Value::from("table"));
        assert!(lua_type(&mut ctx, vec![]).is_err());
    }

    #[test]
    fn test_protected_metatable() {
        let mut ctx = ctx();
        let mut mt = Table::new();
        mt.rawset(Value::from("__metatable"), Value::from("locked"))
            .unwrap();
        let t = Value::table(Table::new());

        lua_setmetatable(&mut ctx, vec![t.clone(), Value::table(mt)]).unwrap();
        lua_getmetatable(&mut ctx, vec![t.clone()]).unwrap();
        assert_eq!(ctx.channel().first(), Value::from("locked"));

        let err = lua_setmetatable(&mut ctx, vec![t, Value::Nil]).unwrap_err();
        assert!(matches!(err, Control::Error(LuaError::Runtime(_))));
    }

    #[test]
    fn test_rawlen_rejects_numbers() {
        let mut ctx = ctx();
        lua_rawlen(&mut ctx, vec![Value::from("abc")]).unwrap();
        assert_eq!(ctx.channel().first(), Value::Integer(3));
        assert!(lua_rawlen(&mut ctx, vec![Value::Integer(1)]).is_err());
    }
}
