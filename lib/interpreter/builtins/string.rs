use super::{
    define_methods,
    regexp::{byte_to_char, char_to_byte, match_result, regexp_data},
    relative_index, Interpreter, NativeContext,
};
use crate::{
    error::ErrorKind,
    interpreter::Eval,
    object::{ObjectKind, RegExpData},
    value::{number_to_string, to_integer, to_uint32, Value, MAX_STRING_LENGTH},
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let prototype = interpreter.intrinsics.string_prototype.clone();
    let constructor = interpreter.define_constructor("String", 1, &prototype, string_constructor);
    define_methods(
        interpreter,
        &constructor,
        &[("fromCharCode", 1, string_from_char_code)],
    );
    define_methods(
        interpreter,
        &prototype,
        &[
            ("at", 1, string_at),
            ("charAt", 1, string_char_at),
            ("charCodeAt", 1, string_char_code_at),
            ("indexOf", 1, string_index_of),
            ("lastIndexOf", 1, string_last_index_of),
            ("includes", 1, string_includes),
            ("startsWith", 1, string_starts_with),
            ("endsWith", 1, string_ends_with),
            ("slice", 2, string_slice),
            ("substring", 2, string_substring),
            ("substr", 2, string_substr),
            ("toUpperCase", 0, string_to_upper_case),
            ("toLowerCase", 0, string_to_lower_case),
            ("trim", 0, string_trim),
            ("trimStart", 0, string_trim_start),
            ("trimEnd", 0, string_trim_end),
            ("split", 2, string_split),
            ("replace", 2, string_replace),
            ("replaceAll", 2, string_replace_all),
            ("match", 1, string_match),
            ("search", 1, string_search),
            ("repeat", 1, string_repeat),
            ("padStart", 2, string_pad_start),
            ("padEnd", 2, string_pad_end),
            ("concat", 1, string_concat),
            ("localeCompare", 1, string_locale_compare),
            ("toString", 0, string_value_of),
            ("valueOf", 0, string_value_of),
        ],
    );
}

fn string_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let value = if ctx.arguments.is_empty() {
        String::new()
    } else {
        ctx.string_argument(0)?
    };
    match ctx.constructed_this() {
        Some(this) => {
            this.borrow_mut().kind = ObjectKind::String(value);
            Ok(Value::Object(this))
        }
        None => Ok(Value::from(value)),
    }
}

fn string_from_char_code(ctx: &mut NativeContext) -> Eval<Value> {
    let mut text = String::with_capacity(ctx.arguments.len());
    for index in 0..ctx.arguments.len() {
        let code = to_uint32(ctx.number_argument(index)?) & 0xFFFF;
        text.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    Ok(Value::from(text))
}

/// `this` coerced to a string, as generic `String.prototype` methods see it.
fn this_string(ctx: &mut NativeContext, method: &str) -> Eval<String> {
    match &ctx.this {
        Value::String(text) => Ok(text.clone()),
        Value::Undefined | Value::Null => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("String.prototype.{} called on null or undefined", method),
        ),
        other => {
            let other = other.clone();
            ctx.interpreter.coerce_to_string(&other)
        }
    }
}

fn string_value_of(ctx: &mut NativeContext) -> Eval<Value> {
    let value = match &ctx.this {
        Value::String(text) => Some(text.clone()),
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::String(text) => Some(text.clone()),
            _ => None,
        },
        _ => None,
    };
    match value {
        Some(text) => Ok(Value::from(text)),
        None => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            "String.prototype.valueOf requires that 'this' be a String",
        ),
    }
}

/// Integer position argument; a missing argument is `default`.
fn position_argument(ctx: &mut NativeContext, index: usize, default: f64) -> Eval<f64> {
    match ctx.argument(index) {
        Value::Undefined => Ok(default),
        _ => Ok(to_integer(ctx.number_argument(index)?)),
    }
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

fn string_at(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "at")?;
    let position = position_argument(ctx, 0, 0.0)?;
    let length = text.chars().count() as f64;
    let index = if position < 0.0 { length + position } else { position };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    Ok(text
        .chars()
        .nth(index as usize)
        .map(|char| Value::from(char.to_string()))
        .unwrap_or(Value::Undefined))
}

fn string_char_at(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "charAt")?;
    let position = position_argument(ctx, 0, 0.0)?;
    if position < 0.0 {
        return Ok(Value::from(""));
    }
    Ok(Value::from(
        text.chars()
            .nth(position as usize)
            .map(|char| char.to_string())
            .unwrap_or_default(),
    ))
}

fn string_char_code_at(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "charCodeAt")?;
    let position = position_argument(ctx, 0, 0.0)?;
    if position < 0.0 {
        return Ok(Value::from(f64::NAN));
    }
    Ok(Value::from(
        text.chars()
            .nth(position as usize)
            .map(|char| char as u32 as f64)
            .unwrap_or(f64::NAN),
    ))
}

/// Char index of the first occurrence of `search` at or after char `from`.
fn find_from(text: &str, search: &str, from: usize) -> Option<usize> {
    let start = char_to_byte(text, from);
    text[start..]
        .find(search)
        .map(|byte| byte_to_char(text, start + byte))
}

fn string_index_of(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "indexOf")?;
    let search = ctx.string_argument(0)?;
    let from = position_argument(ctx, 1, 0.0)?.max(0.0) as usize;
    let from = from.min(text.chars().count());
    Ok(match find_from(&text, &search, from) {
        Some(index) => Value::from(index),
        None => Value::from(-1.0),
    })
}

fn string_last_index_of(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "lastIndexOf")?;
    let search = ctx.string_argument(0)?;
    let length = text.chars().count();
    let from = match ctx.number_argument(1)? {
        from if from.is_nan() => length,
        from => to_integer(from).max(0.0).min(length as f64) as usize,
    };
    let end = char_to_byte(&text, (from + search.chars().count()).min(length));
    Ok(match text[..end].rfind(&search) {
        Some(byte) => Value::from(byte_to_char(&text, byte)),
        None => Value::from(-1.0),
    })
}

/// The search string of `includes` and friends, which refuse regular expressions.
fn search_string_argument(ctx: &mut NativeContext, method: &str) -> Eval<String> {
    if regexp_data(&ctx.argument(0)).is_some() {
        return ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!(
                "First argument to String.prototype.{} must not be a regular expression",
                method
            ),
        );
    }
    ctx.string_argument(0)
}

fn string_includes(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "includes")?;
    let search = search_string_argument(ctx, "includes")?;
    let from = position_argument(ctx, 1, 0.0)?.max(0.0) as usize;
    let from = from.min(text.chars().count());
    Ok(Value::from(find_from(&text, &search, from).is_some()))
}

fn string_starts_with(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "startsWith")?;
    let search = search_string_argument(ctx, "startsWith")?;
    let position = position_argument(ctx, 1, 0.0)?.max(0.0) as usize;
    let start = char_to_byte(&text, position);
    Ok(Value::from(text[start..].starts_with(&search)))
}

fn string_ends_with(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "endsWith")?;
    let search = search_string_argument(ctx, "endsWith")?;
    let length = text.chars().count() as f64;
    let end = position_argument(ctx, 1, length)?.max(0.0).min(length) as usize;
    let end = char_to_byte(&text, end);
    Ok(Value::from(text[..end].ends_with(&search)))
}

fn string_slice(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "slice")?;
    let length = text.chars().count();
    let start = relative_index(position_argument(ctx, 0, 0.0)?, length);
    let end = relative_index(position_argument(ctx, 1, length as f64)?, length);
    Ok(Value::from(char_slice(&text, start, end)))
}

fn string_substring(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "substring")?;
    let length = text.chars().count() as f64;
    let clamp = |position: f64| position.max(0.0).min(length) as usize;
    let start = clamp(position_argument(ctx, 0, 0.0)?);
    let end = clamp(position_argument(ctx, 1, length)?);
    Ok(Value::from(char_slice(&text, start.min(end), start.max(end))))
}

fn string_substr(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "substr")?;
    let length = text.chars().count();
    let start = relative_index(position_argument(ctx, 0, 0.0)?, length);
    let count = position_argument(ctx, 1, length as f64)?
        .max(0.0)
        .min((length - start) as f64) as usize;
    Ok(Value::from(char_slice(&text, start, start + count)))
}

fn string_to_upper_case(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_string(ctx, "toUpperCase")?.to_uppercase()))
}

fn string_to_lower_case(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_string(ctx, "toLowerCase")?.to_lowercase()))
}

fn string_trim(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_string(ctx, "trim")?.trim()))
}

fn string_trim_start(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_string(ctx, "trimStart")?.trim_start()))
}

fn string_trim_end(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_string(ctx, "trimEnd")?.trim_end()))
}

fn string_split(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "split")?;
    let separator = ctx.argument(0);
    let limit = match ctx.argument(1) {
        Value::Undefined => u32::MAX as usize,
        _ => to_uint32(ctx.number_argument(1)?) as usize,
    };

    let mut pieces: Vec<Value> = if let Some(data) = regexp_data(&separator) {
        split_by_regexp(&text, &data)
    } else {
        match separator {
            Value::Undefined => vec![Value::from(text.as_str())],
            _ => {
                let separator = ctx.string_argument(0)?;
                if separator.is_empty() {
                    text.chars().map(|char| Value::from(char.to_string())).collect()
                } else {
                    text.split(separator.as_str()).map(Value::from).collect()
                }
            }
        }
    };
    pieces.truncate(limit);
    Ok(ctx.interpreter.create_array(pieces))
}

/// Splits around each match, keeping capture groups between the pieces. An empty match
/// at the end of the previous piece never splits.
fn split_by_regexp(text: &str, data: &RegExpData) -> Vec<Value> {
    let mut pieces = Vec::new();
    let mut last = 0;
    let mut search = 0;
    while search < text.len() {
        let Some(captures) = data.regex.captures_at(text, search) else {
            break;
        };
        let Some(found) = captures.get(0) else {
            break;
        };
        if found.start() >= text.len() {
            break;
        }
        if found.end() == last {
            search = next_boundary(text, found.start());
            continue;
        }
        pieces.push(Value::from(&text[last..found.start()]));
        for group in captures.iter().skip(1) {
            pieces.push(
                group
                    .map(|group| Value::from(group.as_str()))
                    .unwrap_or(Value::Undefined),
            );
        }
        last = found.end();
        search = last;
    }
    pieces.push(Value::from(&text[last..]));
    pieces
}

fn next_boundary(text: &str, byte: usize) -> usize {
    text[byte..]
        .chars()
        .next()
        .map(|char| byte + char.len_utf8())
        .unwrap_or(text.len() + 1)
}

/// One match being replaced: its byte range and capture groups.
struct Replacement {
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
}

fn regexp_matches(text: &str, data: &RegExpData, all: bool) -> Vec<Replacement> {
    let to_replacement = |captures: regex::Captures| {
        captures.get(0).map(|found| Replacement {
            start: found.start(),
            end: found.end(),
            groups: captures
                .iter()
                .skip(1)
                .map(|group| group.map(|group| group.as_str().to_string()))
                .collect(),
        })
    };
    if all {
        data.regex
            .captures_iter(text)
            .filter_map(to_replacement)
            .collect()
    } else {
        data.regex
            .captures(text)
            .and_then(to_replacement)
            .into_iter()
            .collect()
    }
}

fn replace_matches(ctx: &mut NativeContext, all: bool, method: &str) -> Eval<Value> {
    let text = this_string(ctx, method)?;
    let pattern = ctx.argument(0);
    let matches = match regexp_data(&pattern) {
        Some(data) => {
            if all && !data.is_global() {
                return ctx.interpreter.throw_error(
                    ErrorKind::TypeError,
                    "replaceAll must be called with a global RegExp",
                );
            }
            if let Value::Object(object) = &pattern {
                if data.is_global() {
                    object.borrow_mut().set("lastIndex", Value::from(0.0));
                }
            }
            let global = data.is_global();
            regexp_matches(&text, &data, global)
        }
        None => {
            let search = ctx.string_argument(0)?;
            let found: Vec<usize> = if all {
                if search.is_empty() {
                    text.char_indices()
                        .map(|(byte, _)| byte)
                        .chain(std::iter::once(text.len()))
                        .collect()
                } else {
                    text.match_indices(search.as_str())
                        .map(|(byte, _)| byte)
                        .collect()
                }
            } else {
                text.find(search.as_str()).into_iter().collect()
            };
            found
                .into_iter()
                .map(|start| Replacement {
                    start,
                    end: start + search.len(),
                    groups: Vec::new(),
                })
                .collect()
        }
    };

    let replacer = ctx.argument(1);
    let template = if replacer.is_callable() {
        None
    } else {
        Some(ctx.string_argument(1)?)
    };

    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for found in matches {
        result.push_str(&text[last..found.start]);
        let matched = &text[found.start..found.end];
        match &template {
            Some(template) => expand_template(&mut result, template, &text, matched, &found),
            None => {
                let mut arguments = vec![Value::from(matched)];
                arguments.extend(found.groups.iter().map(|group| {
                    group
                        .as_deref()
                        .map(Value::from)
                        .unwrap_or(Value::Undefined)
                }));
                arguments.push(Value::from(byte_to_char(&text, found.start)));
                arguments.push(Value::from(text.as_str()));
                let replaced = ctx.interpreter.call(&replacer, Value::Undefined, arguments)?;
                result.push_str(&ctx.interpreter.coerce_to_string(&replaced)?);
            }
        }
        last = found.end;
    }
    result.push_str(&text[last..]);
    Ok(Value::from(result))
}

/// Expands `$$`, `$&`, `` $` ``, `$'` and `$1`..`$99` in a replacement string.
fn expand_template(
    result: &mut String,
    template: &str,
    text: &str,
    matched: &str,
    found: &Replacement,
) {
    let chars: Vec<char> = template.chars().collect();
    let mut index = 0;
    while index < chars.len() {
        let char = chars[index];
        if char != '$' || index + 1 == chars.len() {
            result.push(char);
            index += 1;
            continue;
        }
        match chars[index + 1] {
            '$' => {
                result.push('$');
                index += 2;
            }
            '&' => {
                result.push_str(matched);
                index += 2;
            }
            '`' => {
                result.push_str(&text[..found.start]);
                index += 2;
            }
            '\'' => {
                result.push_str(&text[found.end..]);
                index += 2;
            }
            digit if digit.is_ascii_digit() => {
                let mut number = digit as usize - '0' as usize;
                let mut width = 2;
                if let Some(next) = chars.get(index + 2).and_then(|next| next.to_digit(10)) {
                    let two_digit = number * 10 + next as usize;
                    if two_digit >= 1 && two_digit <= found.groups.len() {
                        number = two_digit;
                        width = 3;
                    }
                }
                if number >= 1 && number <= found.groups.len() {
                    if let Some(group) = &found.groups[number - 1] {
                        result.push_str(group);
                    }
                    index += width;
                } else {
                    result.push('$');
                    index += 1;
                }
            }
            _ => {
                result.push('$');
                index += 1;
            }
        }
    }
}

fn string_replace(ctx: &mut NativeContext) -> Eval<Value> {
    replace_matches(ctx, false, "replace")
}

fn string_replace_all(ctx: &mut NativeContext) -> Eval<Value> {
    replace_matches(ctx, true, "replaceAll")
}

/// The pattern argument of `match` and `search`, compiling strings into expressions.
fn pattern_argument(ctx: &mut NativeContext) -> Eval<(Value, RegExpData)> {
    let pattern = ctx.argument(0);
    if let Some(data) = regexp_data(&pattern) {
        return Ok((pattern, data));
    }
    let source = match pattern {
        Value::Undefined => "(?:)".to_string(),
        _ => ctx.string_argument(0)?,
    };
    let regexp = ctx.interpreter.create_regexp(&source, "")?;
    match regexp_data(&regexp) {
        Some(data) => Ok((regexp, data)),
        None => ctx
            .interpreter
            .throw_error(ErrorKind::TypeError, "Invalid regular expression"),
    }
}

fn string_match(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "match")?;
    let (regexp, data) = pattern_argument(ctx)?;
    if !data.is_global() {
        return Ok(match data.regex.captures(&text) {
            Some(captures) => match_result(ctx.interpreter, &captures, &text),
            None => Value::Null,
        });
    }
    if let Value::Object(object) = &regexp {
        object.borrow_mut().set("lastIndex", Value::from(0.0));
    }
    let found: Vec<Value> = data
        .regex
        .find_iter(&text)
        .map(|found| Value::from(found.as_str()))
        .collect();
    if found.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(ctx.interpreter.create_array(found))
    }
}

fn string_search(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "search")?;
    let (_, data) = pattern_argument(ctx)?;
    Ok(match data.regex.find(&text) {
        Some(found) => Value::from(byte_to_char(&text, found.start())),
        None => Value::from(-1.0),
    })
}

fn string_repeat(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "repeat")?;
    let count = to_integer(ctx.number_argument(0)?);
    if count < 0.0 || count.is_infinite() {
        return ctx.interpreter.throw_error(
            ErrorKind::RangeError,
            format!("Invalid count value: {}", number_to_string(count)),
        );
    }
    if count * text.chars().count() as f64 > MAX_STRING_LENGTH as f64 {
        return ctx
            .interpreter
            .throw_error(ErrorKind::RangeError, "Invalid string length");
    }
    Ok(Value::from(text.repeat(count as usize)))
}

/// The filler `padStart` and `padEnd` add to reach the target length.
fn padding(ctx: &mut NativeContext, text: &str) -> Eval<String> {
    let target = to_integer(ctx.number_argument(0)?).max(0.0);
    let fill = match ctx.argument(1) {
        Value::Undefined => " ".to_string(),
        _ => ctx.string_argument(1)?,
    };
    let length = text.chars().count();
    if target <= length as f64 || fill.is_empty() {
        return Ok(String::new());
    }
    if target > MAX_STRING_LENGTH as f64 {
        return ctx
            .interpreter
            .throw_error(ErrorKind::RangeError, "Invalid string length");
    }
    let target = target as usize;
    Ok(fill.chars().cycle().take(target - length).collect())
}

fn string_pad_start(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "padStart")?;
    let padding = padding(ctx, &text)?;
    Ok(Value::from(padding + &text))
}

fn string_pad_end(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "padEnd")?;
    let padding = padding(ctx, &text)?;
    Ok(Value::from(text + &padding))
}

fn string_concat(ctx: &mut NativeContext) -> Eval<Value> {
    let mut text = this_string(ctx, "concat")?;
    for index in 0..ctx.arguments.len() {
        text.push_str(&ctx.string_argument(index)?);
    }
    Ok(Value::from(text))
}

fn string_locale_compare(ctx: &mut NativeContext) -> Eval<Value> {
    let text = this_string(ctx, "localeCompare")?;
    let other = ctx.string_argument(0)?;
    Ok(Value::from(match text.cmp(&other) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::test_render;

    #[test]
    fn test_string_basics() {
        let tests = vec![
            ("'hello'.length", "5"),
            ("'hello'.charAt(1)", "e"),
            ("'hello'.charAt(10)", ""),
            ("'A'.charCodeAt(0)", "65"),
            ("'abc'.charCodeAt(5)", "NaN"),
            ("'abc'.at(-1)", "c"),
            ("String.fromCharCode(104, 105)", "hi"),
            ("'banana'.indexOf('an')", "1"),
            ("'banana'.indexOf('an', 2)", "3"),
            ("'banana'.indexOf('x')", "-1"),
            ("'banana'.lastIndexOf('an')", "3"),
            ("'banana'.lastIndexOf('an', 2)", "1"),
            ("'banana'.includes('nan')", "true"),
            ("'banana'.startsWith('ban')", "true"),
            ("'banana'.startsWith('an', 1)", "true"),
            ("'banana'.endsWith('na')", "true"),
            ("'banana'.endsWith('ban', 3)", "true"),
            ("'héllo'.length", "5"),
            ("'héllo'.indexOf('l')", "2"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_string_slicing() {
        let tests = vec![
            ("'abcdef'.slice(1, 3)", "bc"),
            ("'abcdef'.slice(-2)", "ef"),
            ("'abcdef'.slice(4, 1)", ""),
            ("'abcdef'.substring(4, 1)", "bcd"),
            ("'abcdef'.substring(-3, 2)", "ab"),
            ("'abcdef'.substr(2, 3)", "cde"),
            ("'abcdef'.substr(-2)", "ef"),
            ("'Hello'.toUpperCase()", "HELLO"),
            ("'Hello'.toLowerCase()", "hello"),
            ("'  pad  '.trim() + '|'", "pad|"),
            ("'  pad  '.trimStart() + '|'", "pad  |"),
            ("'  pad  '.trimEnd() + '|'", "  pad|"),
            ("'ab'.repeat(3)", "ababab"),
            ("'5'.padStart(3, '0')", "005"),
            ("'abc'.padStart(6, '12')", "121abc"),
            ("'5'.padEnd(3)", "5  "),
            ("'a'.concat('b', 1, null)", "ab1null"),
            ("'a'.localeCompare('b')", "-1"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_split() {
        let tests = vec![
            ("'a,b,c'.split(',')", "[ 'a', 'b', 'c' ]"),
            ("'abc'.split('')", "[ 'a', 'b', 'c' ]"),
            ("'abc'.split()", "[ 'abc' ]"),
            ("'a,b,c'.split(',', 2)", "[ 'a', 'b' ]"),
            ("'a1b22c'.split(/\\d+/)", "[ 'a', 'b', 'c' ]"),
            ("'a1b'.split(/(\\d)/)", "[ 'a', '1', 'b' ]"),
            ("'abc'.split(/(?:)/)", "[ 'a', 'b', 'c' ]"),
            ("''.split(',')", "[ '' ]"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_replace_and_match() {
        let tests = vec![
            ("'aaa'.replace('a', 'b')", "baa"),
            ("'aaa'.replaceAll('a', 'b')", "bbb"),
            ("'aaa'.replace(/a/g, 'b')", "bbb"),
            ("'John Smith'.replace(/(\\w+)\\s(\\w+)/, '$2, $1')", "Smith, John"),
            ("'abc'.replace('b', '[$&]')", "a[b]c"),
            ("'abc'.replace('b', '$$')", "a$c"),
            ("'a-b'.replace('-', \"$`$'\")", "aabb"),
            ("'1 2 3'.replace(/\\d/g, (d) => d * 2)", "2 4 6"),
            ("'x1'.replace(/(\\d)/, (m, g, offset) => g + '@' + offset)", "x1@1"),
            ("try { 'a'.replaceAll(/a/, 'b'); } catch (e) { e.message }", "replaceAll must be called with a global RegExp"),
            ("'a1b2'.match(/\\d/g)", "[ '1', '2' ]"),
            ("'abc'.match(/x/g)", "null"),
            ("'abc'.match(/b/)", "[ 'b', index: 1, input: 'abc' ]"),
            ("'a.c'.match('.')[0]", "a"),
            ("'abc'.search(/c/)", "2"),
            ("'abc'.search('z')", "-1"),
            ("try { 'a'.includes(/a/); } catch (e) { e.name }", "TypeError"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_string_wrappers() {
        let tests = vec![
            ("String(12)", "12"),
            ("String(123456789012345680000)", "123456789012345680000"),
            ("String()", ""),
            ("typeof new String('a')", "object"),
            ("new String('ab').length", "2"),
            ("new String('ab').valueOf() === 'ab'", "true"),
            ("new String('x') + 'y'", "xy"),
            ("try { 'a'.repeat(-1); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid count value: -1"),
            ("try { 'ab'.repeat(2 ** 30); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid string length"),
            ("try { 'a'.padStart(2 ** 40); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid string length"),
            ("try { 'a'.padEnd(Infinity, '-'); } catch (e) { e.name + ': ' + e.message }", "RangeError: Invalid string length"),
            ("''.repeat(2 ** 40)", ""),
            ("'abc'.padEnd(2 ** 40, '')", "abc"),
            ("try { String.prototype.trim.call(null); } catch (e) { e.message }", "String.prototype.trim called on null or undefined"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }
}
