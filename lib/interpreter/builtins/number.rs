use super::{define_constant, define_methods, Interpreter, NativeContext};
use crate::{
    error::ErrorKind,
    interpreter::Eval,
    object::{ObjectKind, Property},
    value::{number_to_radix_string, number_to_string, to_integer, Value},
};

const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

pub(super) fn install(interpreter: &mut Interpreter) {
    let prototype = interpreter.intrinsics.number_prototype.clone();
    let constructor = interpreter.define_constructor("Number", 1, &prototype, number_constructor);
    define_methods(
        interpreter,
        &constructor,
        &[
            ("isInteger", 1, number_is_integer),
            ("isSafeInteger", 1, number_is_safe_integer),
            ("isNaN", 1, number_is_nan),
            ("isFinite", 1, number_is_finite),
        ],
    );
    // Number.parseFloat and Number.parseInt are the global functions themselves.
    for name in ["parseFloat", "parseInt"] {
        let function = interpreter.get_global(name);
        constructor
            .borrow_mut()
            .define_property(name, Property::hidden(function));
    }
    for (name, value) in [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("EPSILON", f64::EPSILON),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ] {
        define_constant(&constructor, name, Value::from(value));
    }

    define_methods(
        interpreter,
        &prototype,
        &[
            ("toString", 1, number_to_string_method),
            ("toFixed", 1, number_to_fixed),
            ("toLocaleString", 0, number_to_locale_string),
            ("valueOf", 0, number_value_of),
        ],
    );
}

fn number_constructor(ctx: &mut NativeContext) -> Eval<Value> {
    let value = if ctx.arguments.is_empty() {
        0.0
    } else {
        ctx.number_argument(0)?
    };
    match ctx.constructed_this() {
        Some(this) => {
            this.borrow_mut().kind = ObjectKind::Number(value);
            Ok(Value::Object(this))
        }
        None => Ok(Value::from(value)),
    }
}

/// The argument when it already is a number. The `Number.is*` predicates never coerce.
fn number_only(ctx: &NativeContext) -> Option<f64> {
    match ctx.argument(0) {
        Value::Number(value) => Some(value),
        _ => None,
    }
}

fn number_is_integer(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(
        number_only(ctx).is_some_and(|value| value.is_finite() && value.fract() == 0.0),
    ))
}

fn number_is_safe_integer(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(number_only(ctx).is_some_and(|value| {
        value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER
    })))
}

fn number_is_nan(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(number_only(ctx).is_some_and(f64::is_nan)))
}

fn number_is_finite(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(number_only(ctx).is_some_and(f64::is_finite)))
}

fn this_number(ctx: &NativeContext, method: &str) -> Eval<f64> {
    let value = match &ctx.this {
        Value::Number(value) => Some(*value),
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::Number(value) => Some(*value),
            _ => None,
        },
        _ => None,
    };
    match value {
        Some(value) => Ok(value),
        None => ctx.interpreter.throw_error(
            ErrorKind::TypeError,
            format!("Number.prototype.{} requires that 'this' be a Number", method),
        ),
    }
}

fn number_to_string_method(ctx: &mut NativeContext) -> Eval<Value> {
    let value = this_number(ctx, "toString")?;
    let radix = match ctx.argument(0) {
        Value::Undefined => 10.0,
        _ => to_integer(ctx.number_argument(0)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return ctx.interpreter.throw_error(
            ErrorKind::RangeError,
            "toString() radix must be between 2 and 36",
        );
    }
    Ok(Value::from(number_to_radix_string(value, radix as u32)))
}

fn number_to_locale_string(ctx: &mut NativeContext) -> Eval<Value> {
    let value = this_number(ctx, "toLocaleString")?;
    Ok(Value::from(number_to_string(value)))
}

fn number_value_of(ctx: &mut NativeContext) -> Eval<Value> {
    Ok(Value::from(this_number(ctx, "valueOf")?))
}

fn number_to_fixed(ctx: &mut NativeContext) -> Eval<Value> {
    let value = this_number(ctx, "toFixed")?;
    let digits = to_integer(ctx.number_argument(0)?);
    if !(0.0..=100.0).contains(&digits) {
        return ctx.interpreter.throw_error(
            ErrorKind::RangeError,
            "toFixed() digits argument must be between 0 and 100",
        );
    }
    if !value.is_finite() || value.abs() >= 1e21 {
        return Ok(Value::from(number_to_string(value)));
    }
    let fixed = format_fixed(value.abs(), digits as usize);
    if value < 0.0 {
        Ok(Value::from(format!("-{}", fixed)))
    } else {
        Ok(Value::from(fixed))
    }
}

/// Fixed-point formatting of a non-negative number with exact ties rounding up, which is
/// where `toFixed` differs from Rust's round-half-to-even formatting.
fn format_fixed(value: f64, digits: usize) -> String {
    let extended = format!("{:.*}", digits + 30, value);
    let cut = match extended.find('.') {
        Some(point) if digits == 0 => point,
        Some(point) => point + 1 + digits,
        None => return format!("{:.*}", digits, value),
    };
    let tail = extended[cut..].trim_start_matches('.');
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|byte| byte == b'0');
    if !is_tie {
        return format!("{:.*}", digits, value);
    }
    increment_last_digit(&extended[..cut])
}

/// Adds one unit in the last place to a decimal string such as `"1.249"`.
fn increment_last_digit(decimal: &str) -> String {
    let mut bytes = decimal.as_bytes().to_vec();
    let mut index = bytes.len();
    while index > 0 {
        index -= 1;
        match bytes[index] {
            b'.' => continue,
            b'9' => bytes[index] = b'0',
            digit => {
                bytes[index] = digit + 1;
                return String::from_utf8_lossy(&bytes).into_owned();
            }
        }
    }
    format!("1{}", String::from_utf8_lossy(&bytes))
}

#[cfg(test)]
mod tests {
    use super::{format_fixed, increment_last_digit};
    use crate::interpreter::tests::test_render;

    #[test]
    fn test_number_statics() {
        let tests = vec![
            ("Number('42')", "42"),
            ("Number('')", "0"),
            ("Number('x')", "NaN"),
            ("Number()", "0"),
            ("Number(true)", "1"),
            ("Number.isInteger(5)", "true"),
            ("Number.isInteger(5.5)", "false"),
            ("Number.isInteger('5')", "false"),
            ("Number.isNaN('x')", "false"),
            ("Number.isNaN(NaN)", "true"),
            ("Number.isFinite(Infinity)", "false"),
            ("Number.isSafeInteger(2 ** 53)", "false"),
            ("Number.MAX_SAFE_INTEGER", "9007199254740991"),
            ("Number.parseFloat === parseFloat", "true"),
            ("Number.parseInt('ff', 16)", "255"),
            ("Number.EPSILON > 0", "true"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_number_methods() {
        let tests = vec![
            ("(255).toString(16)", "ff"),
            ("(255).toString(2)", "11111111"),
            ("(-8).toString(8)", "-10"),
            ("(3.5).toString()", "3.5"),
            ("(1.005).toFixed(2)", "1.00"),
            ("(2.5).toFixed(0)", "3"),
            ("(1.25).toFixed(1)", "1.3"),
            ("(3.14159).toFixed(2)", "3.14"),
            ("(-1.5).toFixed(0)", "-2"),
            ("(-0.0001).toFixed(2)", "-0.00"),
            ("(10).toFixed()", "10"),
            ("(1e21).toFixed(2)", "1e+21"),
            ("typeof new Number(1)", "object"),
            ("new Number(7).valueOf()", "7"),
            ("new Number(2) * 3", "6"),
            ("try { (1).toString(1); } catch (e) { e.name }", "RangeError"),
            ("try { (1).toFixed(101); } catch (e) { e.message }", "toFixed() digits argument must be between 0 and 100"),
            ("try { Number.prototype.valueOf.call('1'); } catch (e) { e.name }", "TypeError"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_fixed_point_rounding() {
        assert_eq!(format_fixed(0.5, 0), "1");
        assert_eq!(format_fixed(9.995, 2), "9.99");
        assert_eq!(format_fixed(0.125, 2), "0.13");
        assert_eq!(increment_last_digit("9.99"), "10.00");
        assert_eq!(increment_last_digit("1.249"), "1.250");
    }
}
