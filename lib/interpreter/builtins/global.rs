use rand::Rng;

use super::{define_constant, define_methods, Interpreter, NativeContext};
use crate::{
    ast::BinaryOperator,
    error::ErrorKind,
    interpreter::{ConsoleLevel, Eval},
    object::{ObjectKind, Property},
    value::{inspect, to_int32, Value},
};

pub(super) fn install(interpreter: &mut Interpreter) {
    let global = interpreter.global_object();

    let console = interpreter.create_object();
    define_methods(
        interpreter,
        &console,
        &[
            ("log", 0, console_log),
            ("info", 0, console_info),
            ("warn", 0, console_warn),
            ("error", 0, console_error),
        ],
    );
    global
        .borrow_mut()
        .define_property("console", Property::hidden(Value::Object(console)));

    define_methods(
        interpreter,
        &global,
        &[
            ("parseInt", 2, parse_int),
            ("parseFloat", 1, parse_float),
            ("isNaN", 1, is_nan),
            ("isFinite", 1, is_finite),
        ],
    );
    define_constant(&global, "NaN", Value::from(f64::NAN));
    define_constant(&global, "Infinity", Value::from(f64::INFINITY));
    global
        .borrow_mut()
        .define_property("globalThis", Property::hidden(Value::Object(global.clone())));

    let boolean_prototype = interpreter.intrinsics.boolean_prototype.clone();
    interpreter.define_constructor("Boolean", 1, &boolean_prototype, boolean_constructor);
    define_methods(
        interpreter,
        &boolean_prototype,
        &[("toString", 0, boolean_to_string), ("valueOf", 0, boolean_value_of)],
    );

    install_math(interpreter);
}

fn console_message(ctx: &NativeContext) -> String {
    ctx.arguments
        .iter()
        .map(inspect)
        .collect::<Vec<String>>()
        .join(" ")
}

fn console_log(ctx: &mut NativeContext) -> Eval<Value> {
    let message = console_message(ctx);
    ctx.interpreter.console_write(ConsoleLevel::Log, &message);
    Ok(Value::Undefined)
}

fn console_info(ctx: &mut NativeContext) -> Eval<Value> {
    let message = console_message(ctx);
    ctx.interpreter.console_write(ConsoleLevel::Info, &message);
    Ok(Value::Undefined)
}

fn console_warn(ctx: &mut NativeContext) -> Eval<Value> {
    let message = console_message(ctx);
    log::warn!("console.warn: {}", message);
    ctx.interpreter.console_write(ConsoleLevel::Warn, &message);
    Ok(Value::Undefined)
}

fn console_error(ctx: &mut NativeContext) -> Eval<Value> {
    let message = console_message(ctx);
    ctx.interpreter.console_write(ConsoleLevel::Error, &message);
    Ok(Value::Undefined)
}

fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// `parseInt`: optional sign, optional `0x` prefix, then as many digits of `radix` as
/// there are.
pub(super) fn parse_int_text(input: &str, radix: i32) -> f64 {
    let mut text = input.trim_start_matches(is_js_whitespace);
    let negative = text.starts_with('-');
    if negative || text.starts_with('+') {
        text = &text[1..];
    }

    let has_hex_prefix = text.starts_with("0x") || text.starts_with("0X");
    let radix = match radix {
        0 if has_hex_prefix => {
            text = &text[2..];
            16
        }
        0 => 10,
        16 if has_hex_prefix => {
            text = &text[2..];
            16
        }
        2..=36 => radix as u32,
        _ => return f64::NAN,
    };

    let digits: Vec<u32> = text.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .into_iter()
        .fold(0.0, |total, digit| total * radix as f64 + digit as f64);
    if negative {
        -value
    } else {
        value
    }
}

/// `parseFloat`: the longest prefix that reads as a decimal literal or `Infinity`.
pub(super) fn parse_float_text(input: &str) -> f64 {
    let text = input.trim_start_matches(is_js_whitespace);
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits_from = |start: usize| {
        start
            + bytes[start..]
                .iter()
                .take_while(|byte| byte.is_ascii_digit())
                .count()
    };
    let integer_end = digits_from(end);
    let mut mantissa_end = integer_end;
    if bytes.get(integer_end) == Some(&b'.') {
        mantissa_end = digits_from(integer_end + 1);
    }
    let has_digits = integer_end > end || mantissa_end > integer_end + 1;
    if !has_digits {
        return f64::NAN;
    }
    end = mantissa_end;

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_end = digits_from(exponent);
        if exponent_end > exponent {
            end = exponent_end;
        }
    }

    text[..end].trim_end_matches('.').parse().unwrap_or(f64::NAN)
}

fn parse_int(ctx: &mut NativeContext) -> Eval<Value> {
    let input = ctx.string_argument(0)?;
    let radix = to_int32(ctx.number_argument(1)?);
    Ok(Value::from(parse_int_text(&input, radix)))
}

fn parse_float(ctx: &mut NativeContext) -> Eval<Value> {
    let input = ctx.string_argument(0)?;
    Ok(Value::from(parse_float_text(&input)))
}

fn is_nan(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(ctx.number_argument(0)?.is_nan()))
}

fn is_finite(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(ctx.number_argument(0)?.is_finite()))
}

fn boolean_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let value = ctx.argument(0).is_truthy();
    match ctx.constructed_this() {
        Some(this) => {
            this.borrow_mut().kind = ObjectKind::Boolean(value);
            Ok(Value::Object(this))
        }
        None => Ok(Value::from(value)),
    }
}

fn this_boolean(ctx: &NativeContext) -> Eval<bool> {
    let value = match &ctx.this {
        Value::Boolean(value) => Some(*value),
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::Boolean(value) => Some(*value),
            _ => None,
        },
        _ => None,
    };
    match value {
        Some(value) => Ok(value),
        None => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            "Boolean.prototype.valueOf requires that 'this' be a Boolean",
        ),
    }
}

fn boolean_to_string(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_boolean(ctx)?.to_string()))
}

fn boolean_value_of(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_boolean(ctx)?))
}

fn install_math(interpreter: &mut Interpreter) {
    let math = interpreter.create_object();
    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("SQRT2", std::f64::consts::SQRT_2),
    ] {
        define_constant(&math, name, Value::from(value));
    }

    let unary: [(&str, fn(f64) -> f64); 19] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", round_half_up),
        ("trunc", f64::trunc),
        ("sign", sign),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("exp", f64::exp),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("fround", |value| value as f32 as f64),
    ];
    for (name, function) in unary {
        interpreter.define_native(&math, name, 1, move |ctx| {
            Ok(Value::from(function(ctx.number_argument(0)?)))
        });
    }

    define_methods(
        interpreter,
        &math,
        &[
            ("pow", 2, math_pow),
            ("atan2", 2, math_atan2),
            ("min", 2, math_min),
            ("max", 2, math_max),
            ("hypot", 2, math_hypot),
            ("random", 0, math_random),
        ],
    );

    interpreter
        .global_object
        .borrow_mut()
        .define_property("Math", Property::hidden(Value::Object(math)));
}

/// `Math.round` rounds halves towards positive infinity.
fn round_half_up(value: f64) -> f64 {
    if !value.is_finite() || value.fract() == 0.0 {
        return value;
    }
    let rounded = (value + 0.5).floor();
    if rounded == 0.0 && value < 0.0 {
        -0.0
    } else {
        rounded
    }
}

fn sign(value: f64) -> f64 {
    if value.is_nan() || value == 0.0 {
        value
    } else {
        value.signum()
    }
}

fn numeric_arguments(ctx: &mut NativeContext) -> Eval<Vec<f64>> {
    let mut numbers = Vec::with_capacity(ctx.arguments.len());
    for index in 0..ctx.arguments.len() {
        numbers.push(ctx.number_argument(index)?);
    }
    Ok(numbers)
}

fn math_pow(ctx: &mut NativeContext) -> Eval<Value> {
    let base = ctx.number_argument(0)?;
    let exponent = ctx.number_argument(1)?;
    ctx.interpreter.binary_operation(
        BinaryOperator::Exponent,
        &Value::from(base),
        &Value::from(exponent),
    )
}

fn math_atan2(ctx: &mut NativeContext) -> Eval<Value> {
    let y = ctx.number_argument(0)?;
    let x = ctx.number_argument(1)?;
    Ok(Value::from(y.atan2(x)))
}

fn math_min(ctx: &mut NativeContext) -> Eval<Value> {
    let numbers = numeric_arguments(ctx)?;
    Ok(Value::from(numbers.into_iter().fold(f64::INFINITY, |min, value| {
        if min.is_nan() || value.is_nan() {
            f64::NAN
        } else {
            min.min(value)
        }
    })))
}

fn math_max(ctx: &mut NativeContext) -> Eval<Value> {
    let numbers = numeric_arguments(ctx)?;
    Ok(Value::from(numbers.into_iter().fold(f64::NEG_INFINITY, |max, value| {
        if max.is_nan() || value.is_nan() {
            f64::NAN
        } else {
            max.max(value)
        }
    })))
}

fn math_hypot(ctx: &mut NativeContext) -> Eval<Value> {
    let numbers = numeric_arguments(ctx)?;
    Ok(Value::from(
        numbers.iter().map(|value| value * value).sum::<f64>().sqrt(),
    ))
}

fn math_random(_ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(rand::thread_rng().gen::<f64>()))
}

#[cfg(test)]
mod tests {
    use super::{parse_float_text, parse_int_text};
    use crate::interpreter::tests::{test_output, test_render};

    #[test]
    fn test_parse_int() {
        let tests = vec![
            ("42", 0, 42.0),
            ("  -17px", 0, -17.0),
            ("0x1F", 0, 31.0),
            ("ff", 16, 255.0),
            ("0xff", 16, 255.0),
            ("101", 2, 5.0),
            ("z", 36, 35.0),
            ("3.9", 10, 3.0),
        ];
        for (input, radix, expected) in tests {
            assert_eq!(parse_int_text(input, radix), expected, "{}", input);
        }
        assert!(parse_int_text("abc", 10).is_nan());
        assert!(parse_int_text("1", 37).is_nan());
        assert!(parse_int_text("", 0).is_nan());
    }

    #[test]
    fn test_parse_float() {
        let tests = vec![
            ("3.14", 3.14),
            ("  2.5e3xyz", 2500.0),
            ("-.5", -0.5),
            ("7.", 7.0),
            ("1e", 1.0),
            ("-Infinity", f64::NEG_INFINITY),
            ("0x10", 0.0),
        ];
        for (input, expected) in tests {
            assert_eq!(parse_float_text(input), expected, "{}", input);
        }
        assert!(parse_float_text(".").is_nan());
        assert!(parse_float_text("e5").is_nan());
    }

    #[test]
    fn test_globals() {
        let tests = vec![
            ("parseInt('08')", "8"),
            ("parseFloat('1.5kg')", "1.5"),
            ("isNaN('abc')", "true"),
            ("isNaN('12')", "false"),
            ("isFinite('1e3')", "true"),
            ("isFinite(Infinity)", "false"),
            ("typeof NaN", "number"),
            ("globalThis.Math === Math", "true"),
            ("var exposed = 1; globalThis.exposed", "1"),
            ("Boolean('')", "false"),
            ("Boolean([])", "true"),
            ("typeof new Boolean(false)", "object"),
            ("new Boolean(false).valueOf()", "false"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_math() {
        let tests = vec![
            ("Math.max(1, 5, 3)", "5"),
            ("Math.min()", "Infinity"),
            ("Math.max(1, NaN)", "NaN"),
            ("Math.round(2.5)", "3"),
            ("Math.round(-2.5)", "-2"),
            ("Math.floor(-1.5)", "-2"),
            ("Math.trunc(-1.5)", "-1"),
            ("Math.sign(-3)", "-1"),
            ("Math.abs(-4)", "4"),
            ("Math.pow(2, 8)", "256"),
            ("Math.hypot(3, 4)", "5"),
            ("Math.sqrt(16)", "4"),
            ("Math.cbrt(27)", "3"),
            ("Math.PI > 3.14", "true"),
            ("let r = Math.random(); r >= 0 && r < 1", "true"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_console() {
        assert_eq!(
            test_output("console.log('a', 1, [1, 'b'], { c: true }); console.error('oops')"),
            vec!["a 1 [ 1, 'b' ] { c: true }", "oops"]
        );
    }
}
