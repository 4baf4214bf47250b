// ABOUTME: Native (host-implemented) functions installed into the global
// environment before a program runs.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::env::Environment;
use crate::error::RuntimeError;
use crate::value::{Callable, NativeFunction, Value};

pub fn install(globals: &Rc<Environment>) {
    define_native(globals, "clock", 0, clock);
}

fn define_native(globals: &Rc<Environment>, name: &'static str, arity: usize, func: fn(&[Value]) -> Result<Value, RuntimeError>) {
    globals.define(
        name.to_string(),
        Value::Callable(Callable::Native(Rc::new(NativeFunction { name, arity, func }))),
    );
}

/// Microseconds since the Unix epoch, as an f64.
fn clock(_args: &[Value]) -> Result<Value, RuntimeError> {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock must be set to a time at or after the Unix epoch")
        .as_micros();
    Ok(Value::Number(micros as f64))
}
