use std::{collections::HashSet, fmt, rc::Rc};

use crate::object::{JsObject, ObjectKind, ObjectRef};

/// How many levels of nested objects `inspect` expands before abbreviating.
const INSPECT_DEPTH: usize = 2;

/// Longest string the engine will build, in characters.
pub const MAX_STRING_LENGTH: usize = 1 << 29;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(ObjectRef),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(value) => *value,
            Value::Number(value) => !(value.is_nan() || *value == 0.0),
            Value::String(value) => !value.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(object) if object.borrow().is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object()
            .is_some_and(|object| object.borrow().is_callable())
    }

    /// ToNumber for primitives. Objects need the interpreter to run `valueOf`, so they map to
    /// NaN here.
    pub fn primitive_to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(value) => {
                if *value {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(value) => *value,
            Value::String(value) => string_to_number(value),
            Value::Object(_) => f64::NAN,
        }
    }

    /// ToString for primitives. Objects render with their inspection format.
    pub fn primitive_to_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(value) => value.to_string(),
            Value::Number(value) => number_to_string(*value),
            Value::String(value) => value.clone(),
            Value::Object(_) => inspect(self),
        }
    }

    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Like `strict_equals` but NaN equals itself, as `includes` compares.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(value) => write!(f, "String({:?})", value),
            Value::Object(_) => write!(f, "Object({})", inspect(self)),
            other => write!(f, "{}", other.primitive_to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", inspect(self))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        };
    }
    // Display prints the shortest digits that round-trip, padded with zeros.
    format!("{}", value)
}

/// Formats an integer-valued or fractional number in `radix` (2..=36).
pub fn number_to_radix_string(value: f64, radix: u32) -> String {
    if radix == 10 || !value.is_finite() {
        return number_to_string(value);
    }
    let negative = value < 0.0;
    let mut integer = value.abs().trunc();
    let mut fraction = value.abs().fract();

    let mut digits = Vec::new();
    if integer == 0.0 {
        digits.push('0');
    }
    while integer >= 1.0 {
        let digit = (integer % radix as f64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        integer = (integer / radix as f64).trunc();
    }
    digits.reverse();

    let mut result: String = digits.into_iter().collect();
    if fraction > 0.0 {
        result.push('.');
        for _ in 0..20 {
            fraction *= radix as f64;
            let digit = fraction.trunc() as u32;
            result.push(std::char::from_digit(digit, radix).unwrap_or('0'));
            fraction = fraction.fract();
            if fraction == 0.0 {
                break;
            }
        }
    }
    if negative {
        result.insert(0, '-');
    }
    result
}

pub fn string_to_number(input: &str) -> f64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return match u64::from_str_radix(digits, radix) {
                Ok(value) => value as f64,
                Err(_) => f64::NAN,
            };
        }
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    // Rust's float parser also accepts "inf" and "nan", which JavaScript does not.
    if !trimmed
        .chars()
        .all(|char| char.is_ascii_digit() || matches!(char, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn to_int32(value: f64) -> i32 {
    to_uint32(value) as i32
}

pub fn to_uint32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4294967296.0) as u32
}

/// ToIntegerOrInfinity, used for indices and counts.
pub fn to_integer(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.trunc()
    }
}

/// Renders a value the way `console.log` shows it: strings bare at the top level and quoted
/// when nested inside arrays or objects.
pub fn inspect(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        _ => {
            let mut seen = HashSet::new();
            inspect_nested(value, 0, &mut seen)
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn format_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|char| char.is_alphanumeric() || char == '_' || char == '$');
    if is_identifier {
        key.to_string()
    } else {
        quote(key)
    }
}

fn inspect_nested(value: &Value, depth: usize, seen: &mut HashSet<*const ()>) -> String {
    let object = match value {
        Value::String(value) => return quote(value),
        Value::Object(object) => object,
        other => return other.primitive_to_string(),
    };

    let pointer = Rc::as_ptr(object) as *const ();
    if seen.contains(&pointer) {
        return "[Circular]".to_string();
    }

    let borrowed = object.borrow();
    let (prefix, mut entries) = match &borrowed.kind {
        ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_) => {
            return describe_function(&borrowed);
        }
        ObjectKind::Error => return describe_error(&borrowed),
        ObjectKind::RegExp(regexp) => return format!("/{}/{}", regexp.source, regexp.flags),
        ObjectKind::String(value) => (format!("[String: {}]", quote(value)), Vec::new()),
        ObjectKind::Number(value) => (format!("[Number: {}]", number_to_string(*value)), Vec::new()),
        ObjectKind::Boolean(value) => (format!("[Boolean: {}]", value), Vec::new()),
        ObjectKind::Array(elements) => {
            if depth > INSPECT_DEPTH {
                return "[Array]".to_string();
            }
            seen.insert(pointer);
            let elements = elements
                .iter()
                .map(|element| inspect_nested(element, depth + 1, seen))
                .collect::<Vec<String>>();
            (String::new(), elements)
        }
        ObjectKind::Ordinary => {
            if depth > INSPECT_DEPTH {
                return "[Object]".to_string();
            }
            (constructor_name(&borrowed), Vec::new())
        }
    };

    seen.insert(pointer);
    for (key, property) in borrowed.properties.iter() {
        if property.enumerable {
            entries.push(format!(
                "{}: {}",
                format_key(key),
                inspect_nested(&property.value, depth + 1, seen)
            ));
        }
    }
    seen.remove(&pointer);

    let is_array = matches!(borrowed.kind, ObjectKind::Array(_));
    let body = match (is_array, entries.is_empty()) {
        (true, true) => "[]".to_string(),
        (true, false) => format!("[ {} ]", entries.join(", ")),
        (false, true) if prefix.is_empty() => "{}".to_string(),
        (false, true) => return prefix,
        (false, false) => format!("{{ {} }}", entries.join(", ")),
    };
    if prefix.is_empty() {
        body
    } else {
        format!("{} {}", prefix, body)
    }
}

/// The name of a non-`Object` constructor found through the prototype, e.g. `Point` for
/// instances of `class Point`.
fn constructor_name(object: &JsObject) -> String {
    let constructor = object
        .prototype
        .as_ref()
        .and_then(|prototype| prototype.borrow().get_own_property("constructor"));
    match constructor {
        Some(Value::Object(constructor)) => match constructor.borrow().function_name() {
            Some(name) if name != "Object" && !name.is_empty() => name,
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn describe_function(object: &JsObject) -> String {
    let name = object.function_name().unwrap_or_default();
    match &object.kind {
        ObjectKind::Function(closure) if closure.is_class_constructor => {
            if name.is_empty() {
                "[class (anonymous)]".to_string()
            } else {
                format!("[class {}]", name)
            }
        }
        _ if name.is_empty() => "[Function (anonymous)]".to_string(),
        _ => format!("[Function: {}]", name),
    }
}

fn describe_error(object: &JsObject) -> String {
    let name = JsObject::get(object, "name").primitive_to_string();
    let message = JsObject::get(object, "message").primitive_to_string();
    if message.is_empty() {
        name
    } else {
        format!("{}: {}", name, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string() {
        let tests = vec![
            (1.0, "1"),
            (-0.0, "0"),
            (0.5, "0.5"),
            (0.1 + 0.2, "0.30000000000000004"),
            (123456789.0, "123456789"),
            (1e20, "100000000000000000000"),
            (123456789012345680000.0, "123456789012345680000"),
            (2f64.powi(53) + 2.0, "9007199254740994"),
            (-1.7976931348623157e20, "-179769313486231570000"),
            (1e21, "1e+21"),
            (1.5e-7, "1.5e-7"),
            (0.000001, "0.000001"),
            (-42.25, "-42.25"),
            (f64::NAN, "NaN"),
            (f64::INFINITY, "Infinity"),
            (f64::NEG_INFINITY, "-Infinity"),
        ];

        for (input, expected) in tests {
            assert_eq!(number_to_string(input), expected);
        }
    }

    #[test]
    fn test_string_to_number() {
        let tests = vec![
            ("42", 42.0),
            ("  3.5\n", 3.5),
            ("", 0.0),
            ("   ", 0.0),
            ("0x1F", 31.0),
            ("0b101", 5.0),
            ("0o17", 15.0),
            ("-7", -7.0),
            (".5", 0.5),
            ("1e3", 1000.0),
            ("Infinity", f64::INFINITY),
            ("-Infinity", f64::NEG_INFINITY),
        ];
        for (input, expected) in tests {
            assert_eq!(string_to_number(input), expected, "{:?}", input);
        }

        for input in ["abc", "inf", "nan", "1_000", "12px", "0xZZ"] {
            assert!(string_to_number(input).is_nan(), "{:?}", input);
        }
    }

    #[test]
    fn test_radix_strings() {
        let tests = vec![
            (255.0, 16, "ff"),
            (5.0, 2, "101"),
            (-8.0, 8, "-10"),
            (0.5, 2, "0.1"),
            (35.0, 36, "z"),
        ];
        for (value, radix, expected) in tests {
            assert_eq!(number_to_radix_string(value, radix), expected);
        }
    }

    #[test]
    fn test_truthiness_and_typeof() {
        let tests = vec![
            (Value::Undefined, false, "undefined"),
            (Value::Null, false, "object"),
            (Value::Boolean(true), true, "boolean"),
            (Value::Number(0.0), false, "number"),
            (Value::Number(f64::NAN), false, "number"),
            (Value::Number(-3.0), true, "number"),
            (Value::string(""), false, "string"),
            (Value::string("0"), true, "string"),
        ];
        for (value, truthy, type_name) in tests {
            assert_eq!(value.is_truthy(), truthy, "{:?}", value);
            assert_eq!(value.type_of(), type_name, "{:?}", value);
        }
    }

    #[test]
    fn test_strict_equality() {
        assert!(Value::Number(2.0).strict_equals(&Value::Number(2.0)));
        assert!(!Value::Number(2.0).strict_equals(&Value::string("2")));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
        assert!(Value::Number(0.0).strict_equals(&Value::Number(-0.0)));
    }

    #[test]
    fn test_int32_conversions() {
        let tests = vec![
            (1.9, 1),
            (-1.9, -1),
            (4294967296.0, 0),
            (2147483648.0, -2147483648),
            (f64::NAN, 0),
            (f64::INFINITY, 0),
        ];
        for (input, expected) in tests {
            assert_eq!(to_int32(input), expected, "{}", input);
        }
        assert_eq!(to_uint32(-1.0), 4294967295);
    }

    #[test]
    fn test_inspect_primitives() {
        assert_eq!(inspect(&Value::string("plain")), "plain");
        assert_eq!(inspect(&Value::Number(3.0)), "3");
        assert_eq!(inspect(&Value::Undefined), "undefined");
        assert_eq!(format_key("a_b"), "a_b");
        assert_eq!(format_key("a-b"), "'a-b'");
        assert_eq!(format_key("1"), "'1'");
    }
}
