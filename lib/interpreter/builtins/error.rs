use super::{define_methods, Interpreter, NativeContext};
use crate::{
    error::{format_trace, ErrorKind},
    interpreter::Eval,
    object::{JsObject, ObjectKind, Property},
    value::Value,
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let base_prototype = interpreter.intrinsics.error_prototype(ErrorKind::Error);
    let base_constructor =
        interpreter.define_constructor("Error", 1, &base_prototype, |ctx| {
            construct_error(ctx, ErrorKind::Error)
        });

    for kind in ErrorKind::ALL {
        let prototype = interpreter.intrinsics.error_prototype(kind);
        {
            let mut prototype = prototype.borrow_mut();
            prototype.define_property("name", Property::hidden(Value::from(kind.name())));
            prototype.define_property("message", Property::hidden(Value::from("")));
        }
        if kind == ErrorKind::Error {
            continue;
        }
        let constructor =
            interpreter.define_constructor(kind.name(), 1, &prototype, move |ctx| {
                construct_error(ctx, kind)
            });
        constructor.borrow_mut().prototype = Some(base_constructor.clone());
    }

    define_methods(
        interpreter,
        &base_prototype,
        &[("toString", 0, error_to_string)],
    );
}

/// Shared by every error constructor. Called without `new` it allocates the error itself.
fn construct_error(ctx: &mut NativeContext, kind: ErrorKind) -> Eval<Value> {
    let message = match ctx.argument(0) {
        Value::Undefined => None,
        _ => Some(ctx.string_argument(0)?),
    };
    let cause = match ctx.argument(1) {
        Value::Object(options) => options.borrow().get_own_property("cause"),
        _ => None,
    };

    let error = match ctx.constructed_this() {
        Some(this) => {
            this.borrow_mut().kind = ObjectKind::Error;
            this
        }
        None => JsObject::new(
            ObjectKind::Error,
            Some(ctx.interpreter.intrinsics.error_prototype(kind)),
        )
        .into_ref(),
    };

    // The innermost frame is this constructor.
    let trace: Vec<String> = ctx.interpreter.stack_trace().into_iter().skip(1).collect();
    {
        let mut error = error.borrow_mut();
        if let Some(message) = &message {
            error.define_property("message", Property::hidden(Value::from(message.as_str())));
        }
        if let Some(cause) = cause {
            error.define_property("cause", Property::hidden(cause));
        }
        let name = JsObject::get(&error, "name").primitive_to_string();
        let header = match message.as_deref() {
            None | Some("") => name,
            Some(message) => format!("{}: {}", name, message),
        };
        error.define_property(
            "stack",
            Property::hidden(Value::from(format!("{}{}", header, format_trace(&trace)))),
        );
    }
    Ok(Value::Object(error))
}

fn error_to_string(ctx: &mut NativeContext) -> Eval<Value> {
    let this = ctx.this.clone();
    if !matches!(this, Value::Object(_)) {
        return ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            "Error.prototype.toString requires that 'this' be an Object",
        );
    }
    let name = match ctx.interpreter.get_property(&this, "name")? {
        Value::Undefined => "Error".to_string(),
        name => ctx.interpreter.coerce_to_string(&name)?,
    };
    let message = match ctx.interpreter.get_property(&this, "message")? {
        Value::Undefined => String::new(),
        message => ctx.interpreter.coerce_to_string(&message)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::{test_eval, test_render};

    #[test]
    fn test_error_constructors() {
        let tests = vec![
            ("new Error('boom').message", "boom"),
            ("Error('called').message", "called"),
            ("new Error().message === ''", "true"),
            ("Error('x') instanceof Error", "true"),
            ("new TypeError('t') instanceof Error", "true"),
            ("new TypeError('t') instanceof RangeError", "false"),
            ("new ReferenceError('r').name", "ReferenceError"),
            ("String(new RangeError('r'))", "RangeError: r"),
            ("new SyntaxError().toString()", "SyntaxError"),
            ("Object.keys(new Error('hidden'))", "[]"),
            ("Object.getPrototypeOf(TypeError) === Error", "true"),
            ("new Error('outer', { cause: 'inner' }).cause", "inner"),
            ("new Error('shown')", "Error: shown"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_error_subclasses() {
        let input = r#"
            class ValidationError extends Error {
                constructor(message) {
                    super(message);
                    this.name = 'ValidationError';
                }
            }
            let e = new ValidationError('bad input');
            [e instanceof ValidationError, e instanceof Error, e.toString(), e.message]
        "#;
        assert_eq!(
            test_render(input),
            "[ true, true, 'ValidationError: bad input', 'bad input' ]"
        );
    }

    #[test]
    fn test_error_stack() {
        let tests = vec![
            (
                "function make() { return new Error('deep'); } make().stack",
                "Error: deep\n    at make()\n    at <global>()",
            ),
            ("TypeError('plain').stack", "TypeError: plain\n    at <global>()"),
            (
                "try { null.x; } catch (e) { e.stack }",
                "TypeError: Cannot read properties of null (reading 'x')\n    at <global>()",
            ),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_thrown_errors_are_catchable() {
        let value = test_eval("try { throw new RangeError('r'); } catch (e) { e.name }").unwrap();
        assert_eq!(value.primitive_to_string(), "RangeError");
    }
}
