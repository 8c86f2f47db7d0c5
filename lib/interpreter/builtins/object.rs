use std::rc::Rc;

use super::{define_methods, Interpreter, NativeContext};
use crate::{
    error::ErrorKind,
    interpreter::Eval,
    object::{JsObject, ObjectKind, ObjectRef, Property},
    value::{inspect, Value},
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let prototype = interpreter.intrinsics.object_prototype.clone();
    let constructor = interpreter.define_constructor("Object", 1, &prototype, object_constructor);
    define_methods(
        interpreter,
        &constructor,
        &[
            ("keys", 1, object_keys),
            ("values", 1, object_values),
            ("entries", 1, object_entries),
            ("assign", 2, object_assign),
            ("create", 2, object_create),
            ("getPrototypeOf", 1, object_get_prototype_of),
            ("setPrototypeOf", 2, object_set_prototype_of),
            ("defineProperty", 3, object_define_property),
            ("freeze", 1, object_freeze),
            ("isFrozen", 1, object_is_frozen),
        ],
    );
    define_methods(
        interpreter,
        &prototype,
        &[
            ("hasOwnProperty", 1, has_own_property),
            ("isPrototypeOf", 1, is_prototype_of),
            ("propertyIsEnumerable", 1, property_is_enumerable),
            ("toString", 0, object_to_string),
            ("toLocaleString", 0, object_to_string),
            ("valueOf", 0, object_value_of),
        ],
    );
}

fn object_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let value = ctx.argument(0);
    if value.is_nullish() {
        return Ok(Value::Object(ctx.interpreter.create_object()));
    }
    Ok(Value::Object(ctx.interpreter.to_object(&value)?))
}

/// `Object.create` and `Object.setPrototypeOf` accept an object or `null`.
fn prototype_argument(ctx: &NativeContext, index: usize) -> Eval<Option<ObjectRef>> {
    match ctx.argument(index) {
        Value::Object(object) => Ok(Some(object)),
        Value::Null => Ok(None),
        other => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!(
                "Object prototype may only be an Object or null: {}",
                inspect(&other)
            ),
        ),
    }
}

/// Own enumerable `[key, value]` pairs of the first argument.
fn enumerable_entries(ctx: &mut NativeContext) -> Eval<Vec<(String, Value)>> {
    let value = ctx.argument(0);
    let object = ctx.interpreter.to_object(&value)?;
    let keys = object.borrow().enumerable_keys();
    let entries = keys
        .into_iter()
        .map(|key| {
            let value = JsObject::get(&object.borrow(), &key);
            (key, value)
        })
        .collect();
    Ok(entries)
}

fn object_keys(ctx: &mut NativeContext) -> Eval<Value> {
    let keys = enumerable_entries(ctx)?
        .into_iter()
        .map(|(key, _)| Value::from(key))
        .collect();
    Ok(ctx.interpreter.create_array(keys))
}

fn object_values(ctx: &mut NativeContext) -> Eval<Value> {
    let values = enumerable_entries(ctx)?
        .into_iter()
        .map(|(_, value)| value)
        .collect();
    Ok(ctx.interpreter.create_array(values))
}

fn object_entries(ctx: &mut NativeContext) -> Eval<Value> {
    let entries = enumerable_entries(ctx)?
        .into_iter()
        .map(|(key, value)| ctx.interpreter.create_array(vec![Value::from(key), value]))
        .collect();
    Ok(ctx.interpreter.create_array(entries))
}

fn object_assign(ctx: &mut NativeContext) -> Eval<Value> {
    let target = ctx.argument(0);
    let target = Value::Object(ctx.interpreter.to_object(&target)?);
    for source in ctx.arguments.iter().skip(1).cloned().collect::<Vec<Value>>() {
        let source = match source {
            Value::Object(object) => object,
            _ => continue,
        };
        let keys = source.borrow().enumerable_keys();
        for key in keys {
            let value = JsObject::get(&source.borrow(), &key);
            ctx.interpreter.set_property(&target, &key, value)?;
        }
    }
    Ok(target)
}

fn object_create(ctx: &mut NativeContext) -> Eval<Value> {
    let prototype = prototype_argument(ctx, 0)?;
    let object = JsObject::new(ObjectKind::Ordinary, prototype).into_ref();
    if let Value::Object(properties) = ctx.argument(1) {
        let keys = properties.borrow().enumerable_keys();
        for key in keys {
            let descriptor = JsObject::get(&properties.borrow(), &key);
            define_from_descriptor(ctx, &object, &key, &descriptor)?;
        }
    }
    Ok(Value::Object(object))
}

fn object_get_prototype_of(ctx: &mut NativeContext) -> Eval<Value> {
    let value = ctx.argument(0);
    let object = ctx.interpreter.to_object(&value)?;
    let prototype = object.borrow().prototype.clone();
    Ok(prototype.map(Value::Object).unwrap_or(Value::Null))
}

fn object_set_prototype_of(ctx: &mut NativeContext) -> Eval<Value> {
    let target = ctx.argument(0);
    let prototype = prototype_argument(ctx, 1)?;
    if let Value::Object(object) = &target {
        if let Some(prototype) = &prototype {
            let value = Value::Object(prototype.clone());
            if Rc::ptr_eq(object, prototype) || Interpreter::inherits_from(&value, object)
            {
                return ctx
                    .interpreter
                    .throw_error(ErrorKind::TypeError, "Cyclic __proto__ value");
            }
        }
        object.borrow_mut().prototype = prototype;
    }
    Ok(target)
}

/// Applies a `{ value, writable, enumerable, configurable }` descriptor. Flags missing from
/// the descriptor keep their current value, or default to false for a new property.
fn define_from_descriptor(
    ctx: &mut NativeContext,
    object: &ObjectRef,
    key: &str,
    descriptor: &Value,
) -> Eval<()> {
    let descriptor = match descriptor {
        Value::Object(descriptor) => descriptor.clone(),
        other => {
            return ctx.interpreter.throw_error(
                ErrorKind::TypeError,
                format!("Property description must be an object: {}", inspect(other)),
            )
        }
    };
    let field = |name: &str| {
        let descriptor = descriptor.borrow();
        JsObject::has_property(&descriptor, name).then(|| JsObject::get(&descriptor, name))
    };
    if field("get").is_some() || field("set").is_some() {
        return ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            "Accessor properties are not supported",
        );
    }

    let existing = {
        let object = object.borrow();
        object
            .properties
            .get(key)
            .cloned()
            .or_else(|| object.get_own_property(key).map(Property::new))
    };
    if let Some(existing) = &existing {
        if !existing.configurable {
            return ctx.interpreter.throw_error(
                ErrorKind::TypeError,
                format!("Cannot redefine property: {}", key),
            );
        }
    }

    let flag = |name: &str, current: Option<bool>| match field(name) {
        Some(value) => value.is_truthy(),
        None => current.unwrap_or(false),
    };
    let property = Property {
        value: field("value")
            .or_else(|| existing.as_ref().map(|property| property.value.clone()))
            .unwrap_or(Value::Undefined),
        writable: flag("writable", existing.as_ref().map(|property| property.writable)),
        enumerable: flag(
            "enumerable",
            existing.as_ref().map(|property| property.enumerable),
        ),
        configurable: flag(
            "configurable",
            existing.as_ref().map(|property| property.configurable),
        ),
    };
    object.borrow_mut().define_property(key, property);
    Ok(())
}

fn object_define_property(ctx: &mut NativeContext) -> Eval<Value> {
    let target = ctx.argument(0);
    let object = match &target {
        Value::Object(object) => object.clone(),
        _ => {
            return ctx.interpreter.throw_error(
                ErrorKind::TypeError,
                "Object.defineProperty called on non-object",
            )
        }
    };
    let key = ctx.argument(1);
    let key = ctx.interpreter.to_property_key(&key)?;
    let descriptor = ctx.argument(2);
    define_from_descriptor(ctx, &object, &key, &descriptor)?;
    Ok(target)
}

fn object_freeze(ctx: &mut NativeContext) -> Eval<Value> {
    let target = ctx.argument(0);
    if let Value::Object(object) = &target {
        object.borrow_mut().freeze();
    }
    Ok(target)
}

fn object_is_frozen(ctx: &mut NativeContext) -> Eval<Value> {
    let frozen = match ctx.argument(0) {
        Value::Object(object) => {
            let object = object.borrow();
            !object.extensible
                && object
                    .properties
                    .values()
                    .all(|property| !property.writable && !property.configurable)
        }
        _ => true,
    };
    Ok(Value::from(frozen))
}

fn has_own_property(ctx: &mut NativeContext) -> Eval<Value> {
    let key = ctx.string_argument(0)?;
    let this = ctx.this.clone();
    let object = ctx.interpreter.to_object(&this)?;
    let has = object.borrow().has_own_property(&key);
    Ok(Value::from(has))
}

fn is_prototype_of(ctx: &mut NativeContext) -> Eval<Value> {
    match &ctx.this {
        Value::Object(prototype) => Ok(Value::from(Interpreter::inherits_from(
            &ctx.argument(0),
            prototype,
        ))),
        _ => Ok(Value::from(false)),
    }
}

fn property_is_enumerable(ctx: &mut NativeContext) -> Eval<Value> {
    let key = ctx.string_argument(0)?;
    let this = ctx.this.clone();
    let object = ctx.interpreter.to_object(&this)?;
    let enumerable = object.borrow().enumerable_keys().contains(&key);
    Ok(Value::from(enumerable))
}

fn object_to_string(ctx: &mut NativeContext) -> Eval<Value> {
    let tag = match &ctx.this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Boolean(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::String(_) => "String",
            ObjectKind::Number(_) => "Number",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Ordinary => "Object",
        },
    };
    Ok(Value::from(format!("[object {}]", tag)))
}

fn object_value_of(ctx: &mut NativeContext) -> Eval<Value> {
    let this = ctx.this.clone();
    Ok(Value::Object(ctx.interpreter.to_object(&this)?))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::test_render;

    #[test]
    fn test_object_statics() {
        let tests = vec![
            ("Object.keys({ a: 1, b: 2 })", "[ 'a', 'b' ]"),
            ("Object.values({ a: 1, b: 'x' })", "[ 1, 'x' ]"),
            ("Object.entries({ a: 1 })", "[ [ 'a', 1 ] ]"),
            ("Object.keys(['x', 'y'])", "[ '0', '1' ]"),
            ("Object.keys('hi')", "[ '0', '1' ]"),
            ("Object.assign({ a: 1 }, { b: 2 }, null, { a: 3 })", "{ a: 3, b: 2 }"),
            ("let proto = { greet() { return 'hi'; } }; Object.create(proto).greet()", "hi"),
            ("Object.getPrototypeOf(Object.create(null))", "null"),
            ("Object.getPrototypeOf([]) === Array.prototype", "true"),
            ("let o = {}; Object.setPrototypeOf(o, { inherited: 1 }); o.inherited", "1"),
            ("Object.create({ x: 1 }, { y: { value: 2, enumerable: true } }).y", "2"),
            ("typeof Object(1)", "object"),
            ("let o = {}; Object(o) === o", "true"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_define_property_and_freeze() {
        let tests = vec![
            ("let o = {}; Object.defineProperty(o, 'hidden', { value: 1 }); [o.hidden, Object.keys(o)]", "[ 1, [] ]"),
            ("let o = {}; Object.defineProperty(o, 'fixed', { value: 1 }); o.fixed = 2; o.fixed", "1"),
            ("let o = { a: 1 }; Object.defineProperty(o, 'a', { value: 5 }); [o.a, Object.keys(o)]", "[ 5, [ 'a' ] ]"),
            ("let o = Object.freeze({ a: 1 }); o.a = 2; o.b = 3; [o.a, o.b, Object.isFrozen(o)]", "[ 1, undefined, true ]"),
            ("let o = Object.freeze({ a: 1 }); delete o.a; o.a", "1"),
            ("try { Object.defineProperty({}, 'x', { get() { return 1; } }); } catch (e) { e.message }", "Accessor properties are not supported"),
            ("try { Object.create(5); } catch (e) { e.message }", "Object prototype may only be an Object or null: 5"),
            ("let a = {}; let b = Object.create(a); try { Object.setPrototypeOf(a, b); } catch (e) { e.message }", "Cyclic __proto__ value"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_object_prototype() {
        let tests = vec![
            ("({ a: 1 }).hasOwnProperty('a')", "true"),
            ("({ a: 1 }).hasOwnProperty('toString')", "false"),
            ("[1].hasOwnProperty('length')", "true"),
            ("Object.prototype.isPrototypeOf([])", "true"),
            ("Array.prototype.isPrototypeOf({})", "false"),
            ("[1].propertyIsEnumerable(0)", "true"),
            ("[1].propertyIsEnumerable('length')", "false"),
            ("({}).toString()", "[object Object]"),
            ("Object.prototype.toString.call([])", "[object Array]"),
            ("Object.prototype.toString.call(null)", "[object Null]"),
            ("'' + { toString: Object.prototype.toString }", "[object Object]"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
        assert_eq!(test_render("let o = {}; o.valueOf() === o"), "true");
    }
}
