use regex::{Captures, RegexBuilder};

use super::{define_methods, Interpreter, NativeContext};
use crate::{
    error::ErrorKind,
    interpreter::Eval,
    object::{JsObject, ObjectKind, ObjectRef, Property, RegExpData},
    value::{to_integer, Value},
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let prototype = interpreter.intrinsics.regexp_prototype.clone();
    interpreter.define_constructor("RegExp", 2, &prototype, regexp_constructor);
    define_methods(
        interpreter,
        &prototype,
        &[
            ("exec", 1, regexp_exec),
            ("test", 1, regexp_test),
            ("toString", 0, regexp_to_string),
        ],
    );
}

impl Interpreter {
    /// Compiles a regular expression object. Patterns the `regex` crate rejects, such as
    /// lookaround or backreferences, raise a catchable `SyntaxError`.
    pub(crate) fn create_regexp(&mut self, pattern: &str, flags: &str) -> Eval<Value> {
        let mut builder = RegexBuilder::new(&pattern.replace("\\/", "/"));
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' => {}
                _ => {
                    return self.throw_error(
                        ErrorKind::SyntaxError,
                        format!("Invalid regular expression flags '{}'", flags),
                    )
                }
            }
        }
        let regex = match builder.build() {
            Ok(regex) => regex,
            Err(error) => {
                log::debug!("rejected pattern /{}/: {}", pattern, error);
                return self.throw_error(
                    ErrorKind::SyntaxError,
                    format!("Invalid regular expression: /{}/{}", pattern, flags),
                );
            }
        };

        let data = RegExpData {
            regex,
            source: pattern.to_string(),
            flags: flags.to_string(),
        };
        let mut object = JsObject::new(
            ObjectKind::RegExp(data),
            Some(self.intrinsics.regexp_prototype.clone()),
        );
        let constant = |value: Value| Property {
            value,
            writable: false,
            enumerable: false,
            configurable: true,
        };
        object.define_property("source", constant(Value::from(pattern)));
        object.define_property("flags", constant(Value::from(flags)));
        object.define_property("global", constant(Value::from(flags.contains('g'))));
        object.define_property("ignoreCase", constant(Value::from(flags.contains('i'))));
        object.define_property("multiline", constant(Value::from(flags.contains('m'))));
        object.define_property("lastIndex", Property::hidden(Value::from(0.0)));
        Ok(Value::Object(object.into_ref()))
    }
}

/// The compiled pattern behind a RegExp object.
pub(super) fn regexp_data(value: &Value) -> Option<RegExpData> {
    match value {
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::RegExp(data) => Some(data.clone()),
            _ => None,
        },
        _ => None,
    }
}

pub(super) fn char_to_byte(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

pub(super) fn byte_to_char(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// The array `exec` and `match` return: the match, its groups, `index` and `input`.
pub(super) fn match_result(interpreter: &Interpreter, captures: &Captures, text: &str) -> Value {
    let groups = captures
        .iter()
        .map(|group| {
            group
                .map(|group| Value::from(group.as_str()))
                .unwrap_or(Value::Undefined)
        })
        .collect();
    let result = interpreter.create_array(groups);
    if let Value::Object(array) = &result {
        let start = captures.get(0).map(|group| group.start()).unwrap_or(0);
        let mut array = array.borrow_mut();
        array.set("index", Value::from(byte_to_char(text, start)));
        array.set("input", Value::from(text));
    }
    result
}

fn regexp_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let pattern = ctx.argument(0);
    let (source, inherited_flags) = match regexp_data(&pattern) {
        Some(data) => (data.source, data.flags),
        None if pattern.is_nullish() => ("(?:)".to_string(), String::new()),
        None => (ctx.string_argument(0)?, String::new()),
    };
    let flags = match ctx.argument(1) {
        Value::Undefined => inherited_flags,
        _ => ctx.string_argument(1)?,
    };
    ctx.interpreter.create_regexp(&source, &flags)
}

fn this_regexp(ctx: &NativeContext, method: &str) -> Eval<(ObjectRef, RegExpData)> {
    if let Value::Object(object) = &ctx.this {
        if let Some(data) = regexp_data(&ctx.this) {
            return Ok((object.clone(), data));
        }
    }
    ctx.interpreter.throw_error(
        ErrorKind::TypeError,
        format!("RegExp.prototype.{} requires that 'this' be a RegExp", method),
    )
}

/// Runs the pattern from `lastIndex` for global expressions and from the start otherwise,
/// advancing `lastIndex` past a global match and resetting it on failure.
fn execute(ctx: &mut NativeContext, method: &str) -> Eval<Option<Value>> {
    let (object, data) = this_regexp(ctx, method)?;
    let text = ctx.string_argument(0)?;

    let start = if data.is_global() {
        let last_index = JsObject::get(&object.borrow(), "lastIndex").primitive_to_number();
        to_integer(last_index).max(0.0) as usize
    } else {
        0
    };
    if start > text.chars().count() {
        object.borrow_mut().set("lastIndex", Value::from(0.0));
        return Ok(None);
    }

    match data.regex.captures_at(&text, char_to_byte(&text, start)) {
        Some(captures) => {
            if data.is_global() {
                let end = captures.get(0).map(|group| group.end()).unwrap_or(0);
                let mut next = byte_to_char(&text, end);
                if captures.get(0).is_some_and(|group| group.is_empty()) {
                    next += 1;
                }
                object.borrow_mut().set("lastIndex", Value::from(next));
            }
            Ok(Some(match_result(ctx.interpreter, &captures, &text)))
        }
        None => {
            if data.is_global() {
                object.borrow_mut().set("lastIndex", Value::from(0.0));
            }
            Ok(None)
        }
    }
}

fn regexp_exec(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(execute(ctx, "exec")?.unwrap_or(Value::Null))
}

fn regexp_test(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(execute(ctx, "test")?.is_some()))
}

fn regexp_to_string(ctx: &mut NativeContext) -> Eval<Value> {
    let (_, data) = this_regexp(ctx, "toString")?;
    Ok(Value::from(format!("/{}/{}", data.source, data.flags)))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::test_render;

    #[test]
    fn test_regexp_objects() {
        let tests = vec![
            ("/ab+c/i.test('xABBCx')", "true"),
            ("/^\\d+$/.test('12a')", "false"),
            ("/a\\/b/.test('a/b')", "true"),
            ("new RegExp('h.llo').test('hello')", "true"),
            ("let r = /o/g; r.source + ' ' + r.flags + ' ' + r.global + ' ' + r.ignoreCase", "o g true false"),
            ("String(/x/gi)", "/x/gi"),
            ("new RegExp(/a/g).flags", "g"),
            ("/(\\w)(\\d)/.exec('ab12')", "[ 'b1', 'b', '1', index: 1, input: 'ab12' ]"),
            ("/z/.exec('abc')", "null"),
            ("/line$/m.test('line\\nnext')", "true"),
            ("/a.b/s.test('a\\nb')", "true"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_global_exec_advances_last_index() {
        let input = r#"
            let r = /\d/g;
            let found = [];
            let m;
            while ((m = r.exec('a1b2c3')) !== null) found.push(m[0] + '@' + r.lastIndex);
            [found, r.lastIndex]
        "#;
        assert_eq!(test_render(input), "[ [ '1@2', '2@4', '3@6' ], 0 ]");
    }

    #[test]
    fn test_invalid_patterns_throw_syntax_errors() {
        let tests = vec![
            ("try { new RegExp('('); } catch (e) { e.name }", "SyntaxError"),
            ("try { new RegExp('(?<=a)b'); } catch (e) { e.name }", "SyntaxError"),
            ("try { new RegExp('a', 'q'); } catch (e) { e.message }", "Invalid regular expression flags 'q'"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }
}
