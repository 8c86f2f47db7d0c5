use super::{Eval, Interpreter};
use crate::{
    ast::BinaryOperator,
    error::ErrorKind,
    object::{array_index, JsObject, ObjectKind, ObjectRef, MAX_ARRAY_LENGTH, MAX_DENSE_LENGTH},
    value::{inspect, string_to_number, to_int32, to_uint32, Value, MAX_STRING_LENGTH},
};

/// Which conversion `to_primitive` tries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreferredType {
    Number,
    String,
}

impl Interpreter {
    /// Converts objects to primitives through their `valueOf`/`toString` methods.
    pub(crate) fn to_primitive(&mut self, value: &Value, preferred: PreferredType) -> Eval<Value> {
        if !matches!(value, Value::Object(_)) {
            return Ok(value.clone());
        }
        let order = match preferred {
            PreferredType::Number => ["valueOf", "toString"],
            PreferredType::String => ["toString", "valueOf"],
        };
        for name in order {
            let method = self.get_property(value, name)?;
            if method.is_callable() {
                let result = self.call(&method, value.clone(), Vec::new())?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        self.throw_error(
            ErrorKind::TypeError,
            "Cannot convert object to primitive value",
        )
    }

    pub(crate) fn coerce_to_number(&mut self, value: &Value) -> Eval<f64> {
        let primitive = self.to_primitive(value, PreferredType::Number)?;
        Ok(primitive.primitive_to_number())
    }

    pub(crate) fn coerce_to_string(&mut self, value: &Value) -> Eval<String> {
        let primitive = self.to_primitive(value, PreferredType::String)?;
        Ok(primitive.primitive_to_string())
    }

    pub(crate) fn to_property_key(&mut self, value: &Value) -> Eval<String> {
        match value {
            Value::String(key) => Ok(key.clone()),
            other => self.coerce_to_string(other),
        }
    }

    /// Wraps primitives in their wrapper objects.
    pub(crate) fn to_object(&mut self, value: &Value) -> Eval<ObjectRef> {
        let (kind, prototype) = match value {
            Value::Object(object) => return Ok(object.clone()),
            Value::Undefined | Value::Null => {
                return self.throw_error(
                    ErrorKind::TypeError,
                    "Cannot convert undefined or null to object",
                )
            }
            Value::String(string) => (
                ObjectKind::String(string.clone()),
                &self.intrinsics.string_prototype,
            ),
            Value::Number(number) => (
                ObjectKind::Number(*number),
                &self.intrinsics.number_prototype,
            ),
            Value::Boolean(boolean) => (
                ObjectKind::Boolean(*boolean),
                &self.intrinsics.boolean_prototype,
            ),
        };
        Ok(JsObject::new(kind, Some(prototype.clone())).into_ref())
    }

    /// Property read on any value. Primitives read through their builtin prototypes.
    pub(crate) fn get_property(&mut self, base: &Value, key: &str) -> Eval<Value> {
        let prototype = match base {
            Value::Undefined | Value::Null => {
                return self.throw_error(
                    ErrorKind::TypeError,
                    format!(
                        "Cannot read properties of {} (reading '{}')",
                        base.primitive_to_string(),
                        key
                    ),
                )
            }
            Value::Object(object) => return Ok(JsObject::get(&object.borrow(), key)),
            Value::String(string) => {
                if key == "length" {
                    return Ok(Value::from(string.chars().count()));
                }
                if let Some(index) = array_index(key) {
                    return Ok(string
                        .chars()
                        .nth(index)
                        .map(|char| Value::from(char.to_string()))
                        .unwrap_or(Value::Undefined));
                }
                &self.intrinsics.string_prototype
            }
            Value::Number(_) => &self.intrinsics.number_prototype,
            Value::Boolean(_) => &self.intrinsics.boolean_prototype,
        };
        Ok(JsObject::get(&prototype.borrow(), key))
    }

    /// Property write. Writes to primitives are dropped, as in sloppy-mode scripts.
    pub(crate) fn set_property(&mut self, base: &Value, key: &str, value: Value) -> Eval<()> {
        match base {
            Value::Undefined | Value::Null => self.throw_error(
                ErrorKind::TypeError,
                format!(
                    "Cannot set properties of {} (setting '{}')",
                    base.primitive_to_string(),
                    key
                ),
            ),
            Value::Object(object) => {
                let is_array = object.borrow().is_array();
                let value = if is_array && key == "length" {
                    let length = self.coerce_to_number(&value)?;
                    Value::from(self.checked_array_length(length)?)
                } else {
                    value
                };
                if is_array && array_index(key).is_some_and(|index| index >= MAX_DENSE_LENGTH) {
                    return self.throw_error(ErrorKind::RangeError, "Invalid array length");
                }
                if !object.borrow_mut().set(key, value) {
                    log::trace!("ignored write to read-only property '{}'", key);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Validates a requested array length. Lengths past the dense storage limit are refused
    /// with the same error as invalid ones.
    pub(crate) fn checked_array_length(&self, length: f64) -> Eval<usize> {
        if length >= 0.0
            && length.fract() == 0.0
            && length <= MAX_ARRAY_LENGTH
            && length <= MAX_DENSE_LENGTH as f64
        {
            return Ok(length as usize);
        }
        self.throw_error(ErrorKind::RangeError, "Invalid array length")
    }

    pub(crate) fn binary_operation(
        &mut self,
        operator: BinaryOperator,
        left: &Value,
        right: &Value,
    ) -> Eval<Value> {
        let value = match operator {
            BinaryOperator::Add => {
                let left = self.to_primitive(left, PreferredType::Number)?;
                let right = self.to_primitive(right, PreferredType::Number)?;
                match (&left, &right) {
                    (Value::String(_), _) | (_, Value::String(_)) => {
                        let left = left.primitive_to_string();
                        let right = right.primitive_to_string();
                        if left.len() + right.len() > MAX_STRING_LENGTH {
                            return self.throw_error(ErrorKind::RangeError, "Invalid string length");
                        }
                        Value::from(left + &right)
                    }
                    _ => Value::from(left.primitive_to_number() + right.primitive_to_number()),
                }
            }
            BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Remainder
            | BinaryOperator::Exponent => {
                let a = self.coerce_to_number(left)?;
                let b = self.coerce_to_number(right)?;
                Value::from(match operator {
                    BinaryOperator::Subtract => a - b,
                    BinaryOperator::Multiply => a * b,
                    BinaryOperator::Divide => a / b,
                    BinaryOperator::Remainder => a % b,
                    _ => power(a, b),
                })
            }
            BinaryOperator::BitwiseAnd
            | BinaryOperator::BitwiseOr
            | BinaryOperator::BitwiseXor
            | BinaryOperator::ShiftLeft
            | BinaryOperator::ShiftRight
            | BinaryOperator::UnsignedShiftRight => {
                let a = self.coerce_to_number(left)?;
                let b = self.coerce_to_number(right)?;
                let shift = to_uint32(b) & 31;
                Value::from(match operator {
                    BinaryOperator::BitwiseAnd => (to_int32(a) & to_int32(b)) as f64,
                    BinaryOperator::BitwiseOr => (to_int32(a) | to_int32(b)) as f64,
                    BinaryOperator::BitwiseXor => (to_int32(a) ^ to_int32(b)) as f64,
                    BinaryOperator::ShiftLeft => to_int32(a).wrapping_shl(shift) as f64,
                    BinaryOperator::ShiftRight => (to_int32(a) >> shift) as f64,
                    _ => (to_uint32(a) >> shift) as f64,
                })
            }
            BinaryOperator::Equal => Value::from(self.loose_equals(left, right)?),
            BinaryOperator::NotEqual => Value::from(!self.loose_equals(left, right)?),
            BinaryOperator::StrictEqual => Value::from(left.strict_equals(right)),
            BinaryOperator::StrictNotEqual => Value::from(!left.strict_equals(right)),
            BinaryOperator::LessThan => Value::from(self.compare(left, right)? == Some(true)),
            BinaryOperator::GreaterThan => Value::from(self.compare(right, left)? == Some(true)),
            BinaryOperator::LessThanOrEqual => {
                Value::from(self.compare(right, left)? == Some(false))
            }
            BinaryOperator::GreaterThanOrEqual => {
                Value::from(self.compare(left, right)? == Some(false))
            }
            BinaryOperator::In => {
                if !matches!(right, Value::Object(_)) {
                    let key = self.coerce_to_string(left)?;
                    return self.throw_error(
                        ErrorKind::TypeError,
                        format!(
                            "Cannot use 'in' operator to search for '{}' in {}",
                            key,
                            inspect(right)
                        ),
                    );
                }
                let key = self.to_property_key(left)?;
                Value::from(self.for_in_keys(right).contains(&key))
            }
            BinaryOperator::Instanceof => Value::from(self.instance_of(left, right)?),
            BinaryOperator::LogicalAnd if left.is_truthy() => right.clone(),
            BinaryOperator::LogicalOr if !left.is_truthy() => right.clone(),
            BinaryOperator::Nullish if left.is_nullish() => right.clone(),
            BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr | BinaryOperator::Nullish => {
                left.clone()
            }
        };
        Ok(value)
    }

    /// `==`: same types compare strictly, `null` and `undefined` equal each other, and mixed
    /// primitives compare as numbers after objects are reduced to primitives.
    pub(crate) fn loose_equals(&mut self, left: &Value, right: &Value) -> Eval<bool> {
        if left.same_type(right) {
            return Ok(left.strict_equals(right));
        }
        match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => Ok(true),
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => Ok(false),
            (Value::Number(number), Value::String(string))
            | (Value::String(string), Value::Number(number)) => {
                Ok(*number == string_to_number(string))
            }
            (Value::Boolean(_), _) => {
                let left = Value::from(left.primitive_to_number());
                self.loose_equals(&left, right)
            }
            (_, Value::Boolean(_)) => {
                let right = Value::from(right.primitive_to_number());
                self.loose_equals(left, &right)
            }
            (Value::Object(_), _) => {
                let left = self.to_primitive(left, PreferredType::Number)?;
                self.loose_equals(&left, right)
            }
            (_, Value::Object(_)) => {
                let right = self.to_primitive(right, PreferredType::Number)?;
                self.loose_equals(left, &right)
            }
            _ => Ok(false),
        }
    }

    /// `left < right`, or `None` when either side is NaN. Two strings compare by code point.
    fn compare(&mut self, left: &Value, right: &Value) -> Eval<Option<bool>> {
        let left = self.to_primitive(left, PreferredType::Number)?;
        let right = self.to_primitive(right, PreferredType::Number)?;
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(Some(a < b));
        }
        let a = left.primitive_to_number();
        let b = right.primitive_to_number();
        if a.is_nan() || b.is_nan() {
            Ok(None)
        } else {
            Ok(Some(a < b))
        }
    }

    pub(crate) fn instance_of(&mut self, value: &Value, constructor: &Value) -> Eval<bool> {
        let mut target = match constructor {
            Value::Object(object) if object.borrow().is_callable() => object.clone(),
            _ => {
                return self.throw_error(
                    ErrorKind::TypeError,
                    "Right-hand side of 'instanceof' is not callable",
                )
            }
        };
        loop {
            let next = match &target.borrow().kind {
                ObjectKind::Bound(bound) => bound.target.clone(),
                _ => break,
            };
            target = next;
        }

        match self.get_property(&Value::Object(target), "prototype")? {
            Value::Object(prototype) => Ok(Self::inherits_from(value, &prototype)),
            other => self.throw_error(
                ErrorKind::TypeError,
                format!(
                    "Function has non-object prototype '{}' in instanceof check",
                    other.primitive_to_string()
                ),
            ),
        }
    }
}

fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}
