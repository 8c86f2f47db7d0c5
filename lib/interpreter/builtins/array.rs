use std::rc::Rc;

use super::{callback_argument, define_methods, relative_index, Interpreter, NativeContext};
use crate::{
    error::ErrorKind,
    interpreter::Eval,
    object::{JsObject, ObjectKind, ObjectRef},
    value::{to_integer, Value},
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let prototype = interpreter.intrinsics.array_prototype.clone();
    let constructor = interpreter.define_constructor("Array", 1, &prototype, array_constructor);
    define_methods(
        interpreter,
        &constructor,
        &[
            ("isArray", 1, array_is_array),
            ("from", 1, array_from),
            ("of", 0, array_of),
        ],
    );
    define_methods(
        interpreter,
        &prototype,
        &[
            ("push", 1, array_push),
            ("pop", 0, array_pop),
            ("shift", 0, array_shift),
            ("unshift", 1, array_unshift),
            ("slice", 2, array_slice),
            ("splice", 2, array_splice),
            ("concat", 1, array_concat),
            ("join", 1, array_join),
            ("reverse", 0, array_reverse),
            ("sort", 1, array_sort),
            ("indexOf", 1, array_index_of),
            ("lastIndexOf", 1, array_last_index_of),
            ("includes", 1, array_includes),
            ("at", 1, array_at),
            ("forEach", 1, array_for_each),
            ("map", 1, array_map),
            ("filter", 1, array_filter),
            ("reduce", 1, array_reduce),
            ("reduceRight", 1, array_reduce_right),
            ("find", 1, array_find),
            ("findIndex", 1, array_find_index),
            ("some", 1, array_some),
            ("every", 1, array_every),
            ("fill", 1, array_fill),
            ("flat", 0, array_flat),
            ("toString", 0, array_to_string),
        ],
    );
}

fn array_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let elements = match ctx.arguments.as_slice() {
        [Value::Number(length)] => {
            let length = ctx.interpreter.checked_array_length(*length)?;
            vec![Value::Undefined; length]
        }
        arguments => arguments.to_vec(),
    };
    match ctx.constructed_this() {
        Some(this) => {
            this.borrow_mut().kind = ObjectKind::Array(elements);
            Ok(Value::Object(this))
        }
        None => Ok(ctx.interpreter.create_array(elements)),
    }
}

fn array_is_array(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(matches!(
        ctx.argument(0),
        Value::Object(object) if object.borrow().is_array()
    )))
}

fn array_from(ctx: &mut NativeContext) -> Eval<Value> {
    let source = ctx.argument(0);
    let values = match &source {
        Value::Object(object)
            if !matches!(object.borrow().kind, ObjectKind::Array(_) | ObjectKind::String(_)) =>
        {
            let length = JsObject::get(&object.borrow(), "length");
            let length = ctx.interpreter.coerce_to_number(&length)?;
            let length = ctx.interpreter.checked_array_length(to_integer(length).max(0.0))?;
            let object = object.borrow();
            (0..length)
                .map(|index| JsObject::get(&object, &index.to_string()))
                .collect()
        }
        _ => ctx.interpreter.iterable_to_vec(&source)?,
    };

    let values = match ctx.argument(1) {
        Value::Undefined => values,
        _ => {
            let mapper = callback_argument(ctx, 1)?;
            let this = ctx.argument(2);
            let mut mapped = Vec::with_capacity(values.len());
            for (index, value) in values.into_iter().enumerate() {
                mapped.push(ctx.interpreter.call(
                    &mapper,
                    this.clone(),
                    vec![value, Value::from(index)],
                )?);
            }
            mapped
        }
    };
    Ok(ctx.interpreter.create_array(values))
}

fn array_of(ctx: &mut NativeContext) -> Eval<Value> {
    let elements = ctx.arguments.clone();
    Ok(ctx.interpreter.create_array(elements))
}

/// The receiver of an `Array.prototype` method, which must be an array.
fn this_array(ctx: &NativeContext, method: &str) -> Eval<ObjectRef> {
    match &ctx.this {
        Value::Object(object) if object.borrow().is_array() => Ok(object.clone()),
        _ => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("Array.prototype.{} called on non-array", method),
        ),
    }
}

fn snapshot(array: &ObjectRef) -> Vec<Value> {
    array
        .borrow()
        .array_elements()
        .cloned()
        .unwrap_or_default()
}

fn length(array: &ObjectRef) -> usize {
    array
        .borrow()
        .array_elements()
        .map(Vec::len)
        .unwrap_or(0)
}

fn element(array: &ObjectRef, index: usize) -> Option<Value> {
    array
        .borrow()
        .array_elements()
        .and_then(|elements| elements.get(index).cloned())
}

/// Applies `update` to the elements of a receiver that is not frozen.
fn mutate<T>(
    ctx: &NativeContext,
    array: &ObjectRef,
    method: &str,
    update: impl FnOnce(&mut Vec<Value>) -> T,
) -> Eval<T> {
    let mut array = array.borrow_mut();
    if !array.extensible {
        return ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("Cannot {} on a frozen array", method),
        );
    }
    match array.array_elements_mut() {
        Some(elements) => Ok(update(elements)),
        None => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("Array.prototype.{} called on non-array", method),
        ),
    }
}

fn array_push(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "push")?;
    let values = ctx.arguments.clone();
    let length = mutate(ctx, &array, "push", |elements| {
        elements.extend(values);
        elements.len()
    })?;
    Ok(Value::from(length))
}

fn array_pop(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "pop")?;
    let popped = mutate(ctx, &array, "pop", Vec::pop)?;
    Ok(popped.unwrap_or(Value::Undefined))
}

fn array_shift(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "shift")?;
    let shifted = mutate(ctx, &array, "shift", |elements| {
        if elements.is_empty() {
            None
        } else {
            Some(elements.remove(0))
        }
    })?;
    Ok(shifted.unwrap_or(Value::Undefined))
}

fn array_unshift(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "unshift")?;
    let values = ctx.arguments.clone();
    let length = mutate(ctx, &array, "unshift", |elements| {
        elements.splice(0..0, values);
        elements.len()
    })?;
    Ok(Value::from(length))
}

/// Integer argument, or `default` when it is missing.
fn index_argument(ctx: &mut NativeContext, index: usize, default: f64) -> Eval<f64> {
    match ctx.argument(index) {
        Value::Undefined => Ok(default),
        _ => Ok(to_integer(ctx.number_argument(index)?)),
    }
}

fn array_slice(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "slice")?;
    let elements = snapshot(&array);
    let start = relative_index(index_argument(ctx, 0, 0.0)?, elements.len());
    let end = relative_index(
        index_argument(ctx, 1, elements.len() as f64)?,
        elements.len(),
    );
    let sliced = if start < end {
        elements[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(ctx.interpreter.create_array(sliced))
}

fn array_splice(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "splice")?;
    let len = length(&array);
    let start = relative_index(index_argument(ctx, 0, 0.0)?, len);
    let delete_count = match ctx.arguments.len() {
        0 => 0,
        1 => len - start,
        _ => index_argument(ctx, 1, 0.0)?
            .max(0.0)
            .min((len - start) as f64) as usize,
    };
    let inserted: Vec<Value> = ctx.arguments.iter().skip(2).cloned().collect();
    let removed = mutate(ctx, &array, "splice", |elements| {
        elements
            .splice(start..start + delete_count, inserted)
            .collect::<Vec<Value>>()
    })?;
    Ok(ctx.interpreter.create_array(removed))
}

fn array_concat(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "concat")?;
    let mut elements = snapshot(&array);
    for argument in &ctx.arguments {
        match argument {
            Value::Object(object) if object.borrow().is_array() => {
                elements.extend(snapshot(object));
            }
            other => elements.push(other.clone()),
        }
    }
    Ok(ctx.interpreter.create_array(elements))
}

fn join(ctx: &mut NativeContext, array: &ObjectRef, separator: &str) -> Eval<String> {
    if ctx.interpreter.joining.iter().any(|active| Rc::ptr_eq(active, array)) {
        return Ok(String::new());
    }
    ctx.interpreter.joining.push(array.clone());
    let joined = join_parts(ctx, array, separator);
    ctx.interpreter.joining.pop();
    joined
}

fn join_parts(ctx: &mut NativeContext, array: &ObjectRef, separator: &str) -> Eval<String> {
    let mut parts = Vec::with_capacity(length(array));
    for value in snapshot(array) {
        parts.push(match value {
            Value::Undefined | Value::Null => String::new(),
            other => ctx.interpreter.coerce_to_string(&other)?,
        });
    }
    Ok(parts.join(separator))
}

fn array_join(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "join")?;
    let separator = match ctx.argument(0) {
        Value::Undefined => ",".to_string(),
        _ => ctx.string_argument(0)?,
    };
    Ok(Value::from(join(ctx, &array, &separator)?))
}

fn array_to_string(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "toString")?;
    Ok(Value::from(join(ctx, &array, ",")?))
}

fn array_reverse(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "reverse")?;
    mutate(ctx, &array, "reverse", |elements| elements.reverse())?;
    Ok(Value::Object(array))
}

fn array_sort(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "sort")?;
    let comparator = ctx.argument(0);
    if !matches!(comparator, Value::Undefined) && !comparator.is_callable() {
        return ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            "The comparison function must be either a function or undefined",
        );
    }
    let sorted = sort_values(ctx.interpreter, snapshot(&array), &comparator)?;
    mutate(ctx, &array, "sort", |elements| *elements = sorted)?;
    Ok(Value::Object(array))
}

/// Stable bottom-up merge sort. `undefined` elements go last without being compared.
fn sort_values(
    interpreter: &mut Interpreter,
    values: Vec<Value>,
    comparator: &Value,
) -> Eval<Vec<Value>> {
    let (mut defined, undefined): (Vec<Value>, Vec<Value>) = values
        .into_iter()
        .partition(|value| !matches!(value, Value::Undefined));

    let len = defined.len();
    let mut width = 1;
    while width < len {
        let mut merged = Vec::with_capacity(len);
        for start in (0..len).step_by(2 * width) {
            let middle = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right) = (start, middle);
            while left < middle && right < end {
                if comes_after(interpreter, comparator, &defined[left], &defined[right])? {
                    merged.push(defined[right].clone());
                    right += 1;
                } else {
                    merged.push(defined[left].clone());
                    left += 1;
                }
            }
            merged.extend_from_slice(&defined[left..middle]);
            merged.extend_from_slice(&defined[right..end]);
        }
        defined = merged;
        width *= 2;
    }

    defined.extend(undefined);
    Ok(defined)
}

fn comes_after(
    interpreter: &mut Interpreter,
    comparator: &Value,
    left: &Value,
    right: &Value,
) -> Eval<bool> {
    if matches!(comparator, Value::Undefined) {
        let left = interpreter.coerce_to_string(left)?;
        let right = interpreter.coerce_to_string(right)?;
        return Ok(left > right);
    }
    let order = interpreter.call(
        comparator,
        Value::Undefined,
        vec![left.clone(), right.clone()],
    )?;
    Ok(interpreter.coerce_to_number(&order)? > 0.0)
}

fn array_index_of(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "indexOf")?;
    let elements = snapshot(&array);
    let search = ctx.argument(0);
    let from = relative_index(index_argument(ctx, 1, 0.0)?, elements.len());
    let found = elements
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, value)| value.strict_equals(&search))
        .map(|(index, _)| index);
    Ok(found.map(Value::from).unwrap_or(Value::from(-1.0)))
}

fn array_last_index_of(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "lastIndexOf")?;
    let elements = snapshot(&array);
    let search = ctx.argument(0);
    let last = elements.len() as f64 - 1.0;
    let from = index_argument(ctx, 1, last)?;
    let from = if from < 0.0 {
        elements.len() as f64 + from
    } else {
        from.min(last)
    };
    if from < 0.0 {
        return Ok(Value::from(-1.0));
    }
    let found = elements[..=from as usize]
        .iter()
        .rposition(|value| value.strict_equals(&search));
    Ok(found.map(Value::from).unwrap_or(Value::from(-1.0)))
}

fn array_includes(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "includes")?;
    let elements = snapshot(&array);
    let search = ctx.argument(0);
    let from = relative_index(index_argument(ctx, 1, 0.0)?, elements.len());
    Ok(Value::from(
        elements[from..]
            .iter()
            .any(|value| value.same_value_zero(&search)),
    ))
}

fn array_at(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "at")?;
    let len = length(&array) as f64;
    let position = index_argument(ctx, 0, 0.0)?;
    let index = if position < 0.0 { len + position } else { position };
    if index < 0.0 || index >= len {
        return Ok(Value::Undefined);
    }
    Ok(element(&array, index as usize).unwrap_or(Value::Undefined))
}

/// Calls `callback(element, index, array)` for each index below the starting length,
/// reading elements live so callbacks observe earlier mutations. Stops early when `visit`
/// returns false.
fn for_each_element(
    ctx: &mut NativeContext,
    method: &str,
    mut visit: impl FnMut(usize, Value, Value) -> bool,
) -> Eval<()> {
    let array = this_array(ctx, method)?;
    let callback = callback_argument(ctx, 0)?;
    let this = ctx.argument(1);
    for index in 0..length(&array) {
        let Some(value) = element(&array, index) else {
            break;
        };
        let result = ctx.interpreter.call(
            &callback,
            this.clone(),
            vec![value.clone(), Value::from(index), Value::Object(array.clone())],
        )?;
        if !visit(index, value, result) {
            break;
        }
    }
    Ok(())
}

fn array_for_each(ctx: &mut NativeContext) -> Eval<Value> {
    for_each_element(ctx, "forEach", |_, _, _| true)?;
    Ok(Value::Undefined)
}

fn array_map(ctx: &mut NativeContext) -> Eval<Value> {
    let mut mapped = Vec::new();
    for_each_element(ctx, "map", |_, _, result| {
        mapped.push(result);
        true
    })?;
    Ok(ctx.interpreter.create_array(mapped))
}

fn array_filter(ctx: &mut NativeContext) -> Eval<Value> {
    let mut kept = Vec::new();
    for_each_element(ctx, "filter", |_, value, result| {
        if result.is_truthy() {
            kept.push(value);
        }
        true
    })?;
    Ok(ctx.interpreter.create_array(kept))
}

fn array_find(ctx: &mut NativeContext) -> Eval<Value> {
    let mut found = Value::Undefined;
    for_each_element(ctx, "find", |_, value, result| {
        if result.is_truthy() {
            found = value;
            return false;
        }
        true
    })?;
    Ok(found)
}

fn array_find_index(ctx: &mut NativeContext) -> Eval<Value> {
    let mut found = -1.0;
    for_each_element(ctx, "findIndex", |index, _, result| {
        if result.is_truthy() {
            found = index as f64;
            return false;
        }
        true
    })?;
    Ok(Value::from(found))
}

fn array_some(ctx: &mut NativeContext) -> Eval<Value> {
    let mut any = false;
    for_each_element(ctx, "some", |_, _, result| {
        any = result.is_truthy();
        !any
    })?;
    Ok(Value::from(any))
}

fn array_every(ctx: &mut NativeContext) -> Eval<Value> {
    let mut all = true;
    for_each_element(ctx, "every", |_, _, result| {
        all = result.is_truthy();
        all
    })?;
    Ok(Value::from(all))
}

fn reduce(ctx: &mut NativeContext, method: &str, from_right: bool) -> Eval<Value> {
    let array = this_array(ctx, method)?;
    let callback = callback_argument(ctx, 0)?;
    let len = length(&array);
    let mut indices: Box<dyn Iterator<Item = usize>> = if from_right {
        Box::new((0..len).rev())
    } else {
        Box::new(0..len)
    };

    let mut accumulator = if ctx.arguments.len() >= 2 {
        ctx.argument(1)
    } else {
        match indices.next().and_then(|index| element(&array, index)) {
            Some(first) => first,
            None => {
                return ctx.interpreter.throw_error(
                    ErrorKind::TypeError,
                    "Reduce of empty array with no initial value",
                )
            }
        }
    };
    for index in indices {
        let Some(value) = element(&array, index) else {
            continue;
        };
        accumulator = ctx.interpreter.call(
            &callback,
            Value::Undefined,
            vec![
                accumulator,
                value,
                Value::from(index),
                Value::Object(array.clone()),
            ],
        )?;
    }
    Ok(accumulator)
}

fn array_reduce(ctx: &mut NativeContext) -> Eval<Value> {
    reduce(ctx, "reduce", false)
}

fn array_reduce_right(ctx: &mut NativeContext) -> Eval<Value> {
    reduce(ctx, "reduceRight", true)
}

fn array_fill(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "fill")?;
    let len = length(&array);
    let value = ctx.argument(0);
    let start = relative_index(index_argument(ctx, 1, 0.0)?, len);
    let end = relative_index(index_argument(ctx, 2, len as f64)?, len);
    mutate(ctx, &array, "fill", |elements| {
        for slot in elements.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    })?;
    Ok(Value::Object(array))
}

fn flatten(values: Vec<Value>, depth: f64, into: &mut Vec<Value>) {
    for value in values {
        match &value {
            Value::Object(object) if depth >= 1.0 && object.borrow().is_array() => {
                flatten(snapshot(object), depth - 1.0, into);
            }
            _ => into.push(value),
        }
    }
}

fn array_flat(ctx: &mut NativeContext) -> Eval<Value> {
    let array = this_array(ctx, "flat")?;
    let depth = index_argument(ctx, 0, 1.0)?;
    let mut flattened = Vec::new();
    flatten(snapshot(&array), depth, &mut flattened);
    Ok(ctx.interpreter.create_array(flattened))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::{test_output, test_render};

    #[test]
    fn test_array_construction() {
        let tests = vec![
            ("Array(3).length", "3"),
            ("Array(1, 2)", "[ 1, 2 ]"),
            ("new Array('a')", "[ 'a' ]"),
            ("Array.of(7)", "[ 7 ]"),
            ("Array.isArray([])", "true"),
            ("Array.isArray({ length: 0 })", "false"),
            ("Array.from('abc')", "[ 'a', 'b', 'c' ]"),
            ("Array.from([1, 2], (x) => x * 10)", "[ 10, 20 ]"),
            ("Array.from({ length: 2 })", "[ undefined, undefined ]"),
            ("try { new Array(-1); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid array length"),
            ("try { Array(4294967295); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid array length"),
            ("try { Array.from({ length: 1e12 }); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid array length"),
            ("Array.from({ length: '2', 0: 'x' })", "[ 'x', undefined ]"),
            ("Array.from({ length: -5 })", "[]"),
            ("class List extends Array {} let l = new List(); l.push(1); [l.length, l instanceof Array]", "[ 1, true ]"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_array_mutation() {
        let tests = vec![
            ("let a = [1, 2, 3]; [a.splice(1, 2), a]", "[ [ 2, 3 ], [ 1 ] ]"),
            ("[].pop()", "undefined"),
            ("let a = [1, 2]; [a.push(3, 4), a]", "[ 4, [ 1, 2, 3, 4 ] ]"),
            ("let a = [1, 2]; [a.pop(), a]", "[ 2, [ 1 ] ]"),
            ("let a = [1, 2]; [a.shift(), a]", "[ 1, [ 2 ] ]"),
            ("let a = [3]; [a.unshift(1, 2), a]", "[ 3, [ 1, 2, 3 ] ]"),
            ("let a = [1, 2, 3, 4]; [a.splice(1, 1, 'x', 'y'), a]", "[ [ 2 ], [ 1, 'x', 'y', 3, 4 ] ]"),
            ("let a = [1, 2, 3]; [a.splice(-1), a]", "[ [ 3 ], [ 1, 2 ] ]"),
            ("let a = [1, 2, 3]; a.reverse(); a", "[ 3, 2, 1 ]"),
            ("[1, 2, 3, 4].fill(0, 1, 3)", "[ 1, 0, 0, 4 ]"),
            ("let a = [1, 2, 3]; a.length = 1; a", "[ 1 ]"),
            ("let a = Object.freeze([1]); try { a.push(2); } catch (e) { e.name }", "TypeError"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_array_access() {
        let tests = vec![
            ("[1, 2, 3, 4].slice(1, 3)", "[ 2, 3 ]"),
            ("[1, 2, 3].slice(-2)", "[ 2, 3 ]"),
            ("[1, 2].concat([3], 4, [[5]])", "[ 1, 2, 3, 4, [ 5 ] ]"),
            ("[1, null, 'a', undefined].join('-')", "1--a-"),
            ("[1, [2, 3]].toString()", "1,2,3"),
            ("String([1, 2])", "1,2"),
            ("let a = [1]; a.push(a); a.join()", "1,"),
            ("let a = [1, 2]; let b = [a, 3]; a.push(b); String(a)", "1,2,,3"),
            ("let a = ['x']; a.push(a); [a + '', a.join('-')]", "[ 'x,', 'x-' ]"),
            ("let a = [[1], [1]]; a.join(';')", "1;1"),
            ("[1, 2, 1].indexOf(1, 1)", "2"),
            ("[1, 2, 1].lastIndexOf(1)", "2"),
            ("[1, 2, 1].lastIndexOf(1, -2)", "0"),
            ("[NaN].indexOf(NaN)", "-1"),
            ("[NaN].includes(NaN)", "true"),
            ("[1, 2, 3].at(-1)", "3"),
            ("[1, [2, [3, [4]]]].flat()", "[ 1, 2, [ 3, [ 4 ] ] ]"),
            ("[1, [2, [3, [4]]]].flat(Infinity)", "[ 1, 2, 3, 4 ]"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_array_callbacks() {
        let tests = vec![
            ("[1, 2, 3].map((x, i) => x * i)", "[ 0, 2, 6 ]"),
            ("[1, 2, 3, 4].filter((x) => x % 2 === 0)", "[ 2, 4 ]"),
            ("[1, 2, 3].reduce((sum, x) => sum + x)", "6"),
            ("[1, 2, 3].reduce((sum, x) => sum + x, 10)", "16"),
            ("['a', 'b', 'c'].reduceRight((acc, x) => acc + x)", "cba"),
            ("[5, 12, 8].find((x) => x > 6)", "12"),
            ("[5, 12, 8].findIndex((x) => x > 100)", "-1"),
            ("[1, 2].some((x) => x > 1)", "true"),
            ("[1, 2].every((x) => x > 1)", "false"),
            ("[].every((x) => false)", "true"),
            ("let total = 0; [1, 2, 3].forEach(function (x) { total += x * this.k; }, { k: 2 }); total", "12"),
            ("try { [].reduce((a, b) => a); } catch (e) { e.message }", "Reduce of empty array with no initial value"),
            ("try { [1].map(5); } catch (e) { e.message }", "5 is not a function"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_array_sort() {
        let tests = vec![
            ("[3, 1, 10, 2].sort()", "[ 1, 10, 2, 3 ]"),
            ("[3, 1, 10, 2].sort((a, b) => a - b)", "[ 1, 2, 3, 10 ]"),
            ("[undefined, 'b', 'a'].sort()", "[ 'a', 'b', undefined ]"),
            (
                "let people = [{ n: 'x', a: 2 }, { n: 'y', a: 1 }, { n: 'z', a: 2 }]; people.sort((p, q) => p.a - q.a).map((p) => p.n).join('')",
                "yxz",
            ),
            ("try { [2, 1].sort((a, b) => { throw new Error('stop'); }); } catch (e) { e.message }", "stop"),
            ("try { [1].sort(1); } catch (e) { e.name }", "TypeError"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_callback_sees_mutation() {
        let output = test_output(
            "let a = [1, 2, 3]; a.forEach((x, i) => { if (i === 0) a.pop(); console.log(x); });",
        );
        assert_eq!(output, vec!["1", "2"]);
    }
}
