use super::{define_methods, Interpreter, NativeContext};
use crate::{
    ast::{ExpressionKind, StatementKind},
    error::ErrorKind,
    interpreter::Eval,
    object::{BoundFunction, JsObject, ObjectKind, ObjectRef, Property},
    parser,
    value::{to_integer, Value},
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let prototype = interpreter.intrinsics.function_prototype.clone();
    interpreter.define_constructor("Function", 1, &prototype, function_constructor);
    define_methods(
        interpreter,
        &prototype,
        &[
            ("call", 1, function_call),
            ("apply", 2, function_apply),
            ("bind", 1, function_bind),
            ("toString", 0, function_to_string),
        ],
    );
}

/// `new Function('a', 'b', 'return a + b')` compiles its source in the global scope.
fn function_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let mut parts = Vec::with_capacity(ctx.arguments.len());
    for index in 0..ctx.arguments.len() {
        parts.push(ctx.string_argument(index)?);
    }
    let body = parts.pop().unwrap_or_default();
    let source = format!("(function anonymous({}\n) {{\n{}\n}})", parts.join(","), body);

    let program = match parser::parse_source(&source, "<anonymous>") {
        Ok(program) => program,
        Err(error) => {
            let message = error.to_string();
            return ctx.interpreter.throw_error(
                ErrorKind::SyntaxError,
                message.trim_start_matches("SyntaxError: "),
            );
        }
    };
    let literal = program
        .statements
        .first()
        .and_then(|statement| match &statement.kind {
            StatementKind::Expression(expression) => match &expression.kind {
                ExpressionKind::Function(literal) if program.statements.len() == 1 => {
                    Some(literal.clone())
                }
                _ => None,
            },
            _ => None,
        });
    match literal {
        Some(literal) => {
            let scope = ctx.interpreter.global_scope.clone();
            let closure = ctx
                .interpreter
                .create_closure(&literal, scope, None, false, None);
            Ok(Value::Object(closure))
        }
        None => ctx
            .interpreter
            .throw_error(ErrorKind::SyntaxError, "Unexpected token in function body"),
    }
}

/// The callable `this` of a `Function.prototype` method.
fn this_function(ctx: &NativeContext, method: &str) -> Eval<ObjectRef> {
    match &ctx.this {
        Value::Object(object) if object.borrow().is_callable() => Ok(object.clone()),
        _ => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("Function.prototype.{} called on non-function", method),
        ),
    }
}

fn function_call(ctx: &mut NativeContext) -> Eval<Value> {
    let function = this_function(ctx, "call")?;
    let this = ctx.argument(0);
    let arguments = ctx.arguments.iter().skip(1).cloned().collect();
    ctx.interpreter
        .call(&Value::Object(function), this, arguments)
}

fn function_apply(ctx: &mut NativeContext) -> Eval<Value> {
    let function = this_function(ctx, "apply")?;
    let this = ctx.argument(0);
    let arguments = match ctx.argument(1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(object) => {
            let elements = object.borrow().array_elements().cloned();
            match elements {
                Some(elements) => elements,
                None => {
                    let length = JsObject::get(&object.borrow(), "length");
                    let length = ctx.interpreter.coerce_to_number(&length)?;
                    let length =
                        ctx.interpreter.checked_array_length(to_integer(length).max(0.0))?;
                    let object = object.borrow();
                    (0..length)
                        .map(|index| JsObject::get(&object, &index.to_string()))
                        .collect()
                }
            }
        }
        _ => {
            return ctx.interpreter.throw_error(
                ErrorKind::TypeError,
                "CreateListFromArrayLike called on non-object",
            )
        }
    };
    ctx.interpreter
        .call(&Value::Object(function), this, arguments)
}

fn function_bind(ctx: &mut NativeContext) -> Eval<Value> {
    let target = this_function(ctx, "bind")?;
    let this = ctx.argument(0);
    let arguments: Vec<Value> = ctx.arguments.iter().skip(1).cloned().collect();

    let (name, length) = {
        let target = target.borrow();
        let length = JsObject::get(&target, "length").primitive_to_number();
        (target.function_name().unwrap_or_default(), length)
    };
    let length = (length - arguments.len() as f64).max(0.0);

    let mut bound = JsObject::new(
        ObjectKind::Bound(BoundFunction {
            target,
            this,
            arguments,
        }),
        Some(ctx.interpreter.intrinsics.function_prototype.clone()),
    );
    let read_only = |value: Value| Property {
        value,
        writable: false,
        enumerable: false,
        configurable: true,
    };
    bound.define_property("name", read_only(Value::from(format!("bound {}", name))));
    bound.define_property("length", read_only(Value::from(length)));
    Ok(Value::Object(bound.into_ref()))
}

fn function_to_string(ctx: &mut NativeContext) -> Eval<Value> {
    let function = this_function(ctx, "toString")?;
    let function = function.borrow();
    let name = function.function_name().unwrap_or_default();
    let text = match &function.kind {
        ObjectKind::Function(closure) if closure.is_class_constructor => {
            format!("class {} {{ }}", name)
        }
        ObjectKind::Function(closure) if closure.function.is_arrow => "() => { }".to_string(),
        ObjectKind::Function(_) => format!("function {}() {{ }}", name),
        _ => format!("function {}() {{ [native code] }}", name),
    };
    Ok(Value::from(text))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::test_render;

    #[test]
    fn test_call_apply_bind() {
        let tests = vec![
            ("function who() { return this.name; } who.call({ name: 'a' })", "a"),
            ("function sum(a, b) { return a + b; } sum.call(null, 1, 2)", "3"),
            ("function sum(a, b) { return a + b; } sum.apply(null, [3, 4])", "7"),
            ("Math.max.apply(null, [1, 9, 4])", "9"),
            ("function f() { return arguments.length; } f.apply(null)", "0"),
            ("function add(a, b) { return a + b; } let inc = add.bind(null, 1); inc(41)", "42"),
            ("function add(a, b) { return a + b; } add.bind(null, 1).length", "1"),
            ("function f() {} f.bind(null).name", "bound f"),
            ("let o = { v: 1 }; function get() { return this.v; } let b = get.bind(o); b.call({ v: 2 })", "1"),
            ("function P(x) { this.x = x; } let B = P.bind(null, 5); new B().x", "5"),
            ("let arrow = () => typeof this; arrow.call(5)", "object"),
            ("function f() { return arguments.length; } f.apply(null, { length: '2' })", "2"),
            ("function f() { return arguments.length; } f.apply(null, { length: NaN })", "0"),
            (
                "try { Math.max.apply(null, { length: 1e10 }); } catch (e) { e.name + ': ' + e.message }",
                "RangeError: Invalid array length",
            ),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_function_constructor() {
        let tests = vec![
            ("new Function('a', 'b', 'return a * b')(6, 7)", "42"),
            ("Function('return 1')()", "1"),
            ("new Function('return this')() === undefined", "true"),
            ("try { new Function('return ('); } catch (e) { e.name }", "SyntaxError"),
            ("typeof Function.prototype.call", "function"),
            ("(function named() {}).toString()", "function named() { }"),
            ("Math.abs.toString()", "function abs() { [native code] }"),
            ("try { Function.prototype.call.call(1); } catch (e) { e.message }", "Function.prototype.call called on non-function"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }
}
