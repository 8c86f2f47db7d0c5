mod array;
mod error;
mod function;
mod global;
mod number;
mod object;
mod regexp;
mod string;

use super::{Eval, Interpreter, NativeContext};
use crate::{
    error::ErrorKind,
    object::{ObjectRef, Property},
    value::{inspect, to_integer, Value},
};

/// A builtin implemented in Rust.
type Builtin = fn(&mut NativeContext) -> Eval<Value>;

/// Populates the global object and the builtin prototypes.
pub(super) fn install(interpreter: &mut Interpreter) {
    global::install(interpreter);
    object::install(interpreter);
    function::install(interpreter);
    string::install(interpreter);
    number::install(interpreter);
    array::install(interpreter);
    error::install(interpreter);
    regexp::install(interpreter);
    log::debug!(
        "installed {} globals",
        interpreter.global_object.borrow().properties.len()
    );
}

fn define_methods(interpreter: &Interpreter, target: &ObjectRef, methods: &[(&str, usize, Builtin)]) {
    for (name, arity, function) in methods {
        interpreter.define_native(target, name, *arity, *function);
    }
}

/// Non-writable, non-enumerable data property, as builtin constants are.
fn define_constant(target: &ObjectRef, name: &str, value: Value) {
    target.borrow_mut().define_property(
        name,
        Property {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        },
    );
}

/// Resolves a relative position such as `slice(-2)` against `length`.
fn relative_index(position: f64, length: usize) -> usize {
    let position = to_integer(position);
    if position < 0.0 {
        (length as f64 + position).max(0.0) as usize
    } else {
        position.min(length as f64) as usize
    }
}

/// The argument at `index`, which must be callable.
fn callback_argument(ctx: &NativeContext, index: usize) -> Eval<Value> {
    let callback = ctx.argument(index);
    if callback.is_callable() {
        Ok(callback)
    } else {
        ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("{} is not a function", inspect(&callback)),
        )
    }
}
