use super::helpers::*;
use crate::driver::Outcome;
use crate::error::LuaError;
use crate::table::Table;
use crate::value::Value;

fn unpack_fn(driver: &crate::driver::Driver) -> Value {
    driver
        .context()
        .state()
        .library()
        .function("unpack")
        .unwrap()
}

#[test]
fn test_fast_path_does_not_dispatch() {
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let t = Value::table(Table::from_sequence(ints(&[1, 2, 3, 4])));

    driver.context_mut().reset_statistics();
    let values = run_plain(&mut driver, unpack, vec![t, Value::Integer(1), Value::Integer(3)]);
    assert_eq!(values, ints(&[1, 2, 3]));

    let counters = driver.context().counters();
    assert_eq!(counters.index, 0);
    assert_eq!(counters.len, 0);
    assert_eq!(counters.metamethod_calls, 0);
}

#[test]
fn test_default_bounds_use_raw_length() {
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let t = Value::table(Table::from_sequence(ints(&[5, 6, 7])));

    driver.context_mut().reset_statistics();
    let values = run_plain(&mut driver, unpack, vec![t]);
    assert_eq!(values, ints(&[5, 6, 7]));
    assert_eq!(driver.context().counters().len, 0);
}

#[test]
fn test_index_metamethod_takes_slow_path() {
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let mut fallback = Table::new();
    fallback.set_int(2, Value::from("from fallback"));
    let t = with_metatable(
        Table::from_sequence(vec![Value::from("own")]),
        vec![("__index", Value::table(fallback))],
    );

    driver.context_mut().reset_statistics();
    let values = run_plain(&mut driver, unpack, vec![t, Value::Integer(1), Value::Integer(3)]);
    assert_eq!(
        values,
        vec![Value::from("own"), Value::from("from fallback"), Value::Nil]
    );
    assert_eq!(driver.context().counters().index, 3);
}

#[test]
fn test_slow_path_survives_suspension() {
    // both __len and __index suspend; the driver answers 3 for the length
    // and key * 10 for each element
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let pause = driver.context().state().library().function("pause").unwrap();
    let t = with_metatable(
        Table::new(),
        vec![("__len", pause.clone()), ("__index", pause)],
    );

    let mut lengths = 0;
    let mut elements = 0;
    let values = driver
        .run_to_completion(unpack, vec![t], |signal| {
            assert_eq!(signal.depth(), 2);
            match signal.values() {
                [_] => {
                    lengths += 1;
                    vec![Value::Integer(3)]
                }
                [_, key] => {
                    elements += 1;
                    vec![Value::Integer(key.as_integer().unwrap() * 10)]
                }
                other => panic!("unexpected suspension values {:?}", other),
            }
        })
        .unwrap();

    assert_eq!(values, ints(&[10, 20, 30]));
    assert_eq!((lengths, elements), (1, 3));
}

#[test]
fn test_stepwise_resumption() {
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let pause = driver.context().state().library().function("pause").unwrap();
    let t = with_metatable(Table::new(), vec![("__index", pause)]);

    let mut outcome = driver
        .step(unpack, vec![t, Value::Integer(4), Value::Integer(5)])
        .unwrap();
    let mut keys = Vec::new();
    let values = loop {
        match outcome {
            Outcome::Done(values) => break values,
            Outcome::Suspended(signal) => {
                let key = signal.values()[1].clone();
                keys.push(key.clone());
                outcome = driver.resume(signal, vec![key]).unwrap();
            }
        }
    };
    assert_eq!(keys, ints(&[4, 5]));
    assert_eq!(values, ints(&[4, 5]));
}

#[test]
fn test_length_must_be_integer() {
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let pause = driver.context().state().library().function("pause").unwrap();
    let t = with_metatable(Table::new(), vec![("__len", pause)]);

    let err = driver
        .run_to_completion(unpack, vec![t], |_| vec![Value::Float(2.5)])
        .unwrap_err();
    assert_eq!(
        err,
        LuaError::Runtime("object length is not an integer".to_string())
    );
}

#[test]
fn test_bad_bounds() {
    let mut driver = driver();
    let unpack = unpack_fn(&driver);
    let t = Value::table(Table::new());
    let err = driver
        .step(unpack, vec![t, Value::from("one")])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #2 to 'unpack' (number expected, got string)"
    );
}
