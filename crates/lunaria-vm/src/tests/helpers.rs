//! Helper functions and common imports for integration tests.

use crate::builtins::Library;
use crate::bytecode::CompiledProc;
use crate::compiler::compile;
use crate::config::VmConfig;
use crate::context::State;
use crate::driver::{Driver, Outcome};
use crate::error::LuaError;
use crate::ir::ProcBuilder;
use crate::table::Table;
use crate::value::{TableRef, Value};
use std::rc::Rc;

/// Build and compile a procedure
pub fn compile_proc(builder: ProcBuilder) -> Rc<CompiledProc> {
    let def = builder.build().expect("procedure graph should build");
    compile(&def).expect("procedure should compile")
}

/// Driver over the standard library
pub fn driver() -> Driver {
    Driver::with_config(VmConfig::default())
}

/// Driver over a custom library
pub fn driver_with(library: Library) -> Driver {
    Driver::new(State::with_library(VmConfig::default(), library))
}

/// Compile and instantiate a top-level procedure
pub fn load(driver: &Driver, builder: ProcBuilder) -> Value {
    driver
        .instantiate(compile_proc(builder))
        .expect("procedure should instantiate")
}

/// Run to completion, resuming every suspension with no values
pub fn run(driver: &mut Driver, callable: Value, args: Vec<Value>) -> Result<Vec<Value>, LuaError> {
    driver.run_to_completion(callable, args, |_| Vec::new())
}

/// Run a call that must not suspend
pub fn run_plain(driver: &mut Driver, callable: Value, args: Vec<Value>) -> Vec<Value> {
    match driver.step(callable, args).expect("call should succeed") {
        Outcome::Done(values) => values,
        Outcome::Suspended(signal) => panic!("unexpected suspension: {:?}", signal),
    }
}

/// Table whose metatable has the given fields
pub fn with_metatable(table: Table, fields: Vec<(&str, Value)>) -> Value {
    let mut mt = Table::new();
    for (k, v) in fields {
        mt.rawset(Value::from(k), v).unwrap();
    }
    let mut table = table;
    table.set_metatable(Some(as_table(&Value::table(mt))));
    Value::table(table)
}

pub fn as_table(value: &Value) -> TableRef {
    value.as_table().cloned().expect("value should be a table")
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|i| Value::Integer(*i)).collect()
}
