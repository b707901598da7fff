//! Table routines: `pack` and the resumable `unpack`
//!
//! `unpack(t [, i [, j]])` is the worked example of a library routine that can
//! be suspended. When `t` is a plain table it reads the elements raw and never
//! touches dispatch. Otherwise the length and every element go through
//! `dispatch`, any of which may run a metamethod that suspends; the routine is
//! written as a phase loop so that it can save `(phase, locals)` on the way out
//! and pick up in the same phase when resumed.

use super::{arg, opt_integer, registry::Library, restore_locals, LibraryRoutine};
use crate::context::ExecutionContext;
use crate::dispatch;
use crate::error::{Control, LuaError};
use crate::metatables::{self, Event};
use crate::suspend::SavedFrame;
use crate::table::Table;
use crate::value::{BuiltinId, TableRef, Value};
use std::any::Any;
use std::rc::Rc;
use tracing::trace;

/// Most values a single `unpack` may produce
pub const MAX_UNPACK: i64 = 1_000_000;

pub fn register(library: &mut Library) {
    library.register_fn("pack", lua_pack);
    library.register(Rc::new(Unpack));
}

/// `pack(...)`: a sequence of the arguments with `n` set to their count
pub fn lua_pack(ctx: &mut ExecutionContext, args: Vec<Value>) -> Result<(), Control> {
    let n = args.len() as i64;
    let mut table = Table::new();
    for (i, v) in args.into_iter().enumerate() {
        table.set_int(i as i64 + 1, v);
    }
    table.rawset(Value::from("n"), Value::Integer(n))?;
    ctx.channel.set_to(Value::table(table));
    Ok(())
}

// ============================================================================
// unpack
// ============================================================================

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Length of the object is needed
    PrepareLength = 0,
    /// Length dispatch finished; its result is in the channel
    ResumeLength = 1,
    /// Bounds are known
    BeforeLoop = 2,
    /// An element dispatch finished; its result is in the channel
    LoopStep = 3,
}

impl Phase {
    fn from_u8(phase: u8) -> Self {
        match phase {
            0 => Phase::PrepareLength,
            1 => Phase::ResumeLength,
            2 => Phase::BeforeLoop,
            3 => Phase::LoopStep,
            other => panic!("illegal unpack phase: {}", other),
        }
    }
}

#[derive(Debug)]
struct Locals {
    obj: Value,
    i: i64,
    j: i64,
    /// Index of the element most recently requested
    k: i64,
    result: Vec<Value>,
}

pub struct Unpack;

impl Unpack {
    fn run(
        &self,
        ctx: &mut ExecutionContext,
        this: BuiltinId,
        mut phase: Phase,
        mut locals: Locals,
    ) -> Result<(), Control> {
        match Self::step(ctx, &mut phase, &mut locals) {
            Ok(()) => Ok(()),
            Err(control) => Err(control
                .suspended_through(|| SavedFrame::library(this, phase as u8, locals))),
        }
    }

    /// Run phases until done. On `Err`, `phase` is the phase to resume in.
    fn step(
        ctx: &mut ExecutionContext,
        phase: &mut Phase,
        locals: &mut Locals,
    ) -> Result<(), Control> {
        loop {
            match *phase {
                Phase::PrepareLength => {
                    *phase = Phase::ResumeLength;
                    dispatch::len(ctx, locals.obj.clone())?;
                }

                Phase::ResumeLength => {
                    locals.j = ctx.channel.first().as_integer().ok_or_else(|| {
                        LuaError::Runtime("object length is not an integer".to_string())
                    })?;
                    *phase = Phase::BeforeLoop;
                }

                Phase::BeforeLoop => {
                    let (i, j) = (locals.i, locals.j);
                    if i > j {
                        ctx.channel.set_empty();
                        return Ok(());
                    }
                    check_count(i, j)?;

                    if let Some(t) = raw_table(ctx, &locals.obj, Event::Index) {
                        trace!(i, j, "unpack raw fast path");
                        let t = t.borrow();
                        ctx.channel.set_values((i..=j).map(|k| t.get_int(k)));
                        return Ok(());
                    }

                    locals.k = i;
                    locals.result = Vec::with_capacity((j - i + 1) as usize);
                    *phase = Phase::LoopStep;
                    dispatch::index(ctx, locals.obj.clone(), Value::Integer(i))?;
                }

                Phase::LoopStep => {
                    locals.result.push(ctx.channel.first());
                    if locals.k < locals.j {
                        locals.k += 1;
                        dispatch::index(ctx, locals.obj.clone(), Value::Integer(locals.k))?;
                    } else {
                        let result = std::mem::take(&mut locals.result);
                        ctx.channel.set_values(result);
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl LibraryRoutine for Unpack {
    fn name(&self) -> &str {
        "unpack"
    }

    fn invoke(
        &self,
        ctx: &mut ExecutionContext,
        this: BuiltinId,
        args: Vec<Value>,
    ) -> Result<(), Control> {
        let obj = arg(&args, 1);
        let i = opt_integer(&args, 2, "unpack", 1)?;

        let (phase, j) = if !arg(&args, 3).is_nil() {
            (Phase::BeforeLoop, opt_integer(&args, 3, "unpack", 0)?)
        } else if let Some(t) = raw_table(ctx, &obj, Event::Len) {
            let n = t.borrow().rawlen();
            (Phase::BeforeLoop, n)
        } else {
            (Phase::PrepareLength, 0)
        };

        let locals = Locals {
            obj,
            i,
            j,
            k: 0,
            result: Vec::new(),
        };
        self.run(ctx, this, phase, locals)
    }

    fn resume(
        &self,
        ctx: &mut ExecutionContext,
        this: BuiltinId,
        phase: u8,
        locals: Box<dyn Any>,
    ) -> Result<(), Control> {
        let locals: Locals = restore_locals(self.name(), locals);
        self.run(ctx, this, Phase::from_u8(phase), locals)
    }
}

/// `obj` as a table, if it has no metamethod for `event`
fn raw_table(ctx: &ExecutionContext, obj: &Value, event: Event) -> Option<TableRef> {
    match obj {
        Value::Table(t) if metatables::metamethod(ctx.state(), obj, event).is_nil() => {
            Some(t.clone())
        }
        _ => None,
    }
}

fn check_count(i: i64, j: i64) -> Result<(), LuaError> {
    let count = j as i128 - i as i128 + 1;
    if count > MAX_UNPACK as i128 {
        return Err(LuaError::Runtime("too many results to unpack".to_string()));
    }
    Ok(())
}
