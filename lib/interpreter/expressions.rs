use std::rc::Rc;

use anyhow::anyhow;

use super::{Eval, Interpreter, Reference, STACK_GROWTH, STACK_RED_ZONE};
use crate::{
    ast::{
        BinaryOperator, Expression, ExpressionKind, FunctionLiteral, Literal, PropertyDefinition,
        PropertyKey, UnaryOperator,
    },
    environment::Scope,
    error::ErrorKind,
    object::{ObjectKind, ObjectRef},
    value::{inspect, to_int32, Value},
};

/// Source-like text for an expression, used in `x is not a function` messages.
fn describe_expression(expression: &Expression) -> Option<String> {
    match &expression.kind {
        ExpressionKind::Identifier(name) => Some(name.clone()),
        ExpressionKind::This => Some("this".to_string()),
        ExpressionKind::SuperDot(name) => Some(format!("super.{}", name)),
        ExpressionKind::Dot { object, property } => {
            describe_expression(object).map(|object| format!("{}.{}", object, property))
        }
        ExpressionKind::Index { object, .. } => {
            describe_expression(object).map(|object| format!("{}[...]", object))
        }
        ExpressionKind::Call { callee, .. } => {
            describe_expression(callee).map(|callee| format!("{}(...)", callee))
        }
        _ => None,
    }
}

impl Interpreter {
    pub(crate) fn evaluate(&mut self, expression: &Expression) -> Eval<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.evaluate_expression(expression)
        })
    }

    fn evaluate_expression(&mut self, expression: &Expression) -> Eval<Value> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Boolean(value) => Value::Boolean(*value),
                Literal::Number(value) => Value::Number(*value),
                Literal::String(value) => Value::String(value.clone()),
            }),
            ExpressionKind::RegularExpression { pattern, flags } => {
                self.create_regexp(pattern, flags)
            }
            ExpressionKind::Identifier(_)
            | ExpressionKind::Dot { .. }
            | ExpressionKind::Index { .. }
            | ExpressionKind::SuperDot(_) => {
                let reference = self.evaluate_reference(expression)?;
                self.get_value(&reference)
            }
            ExpressionKind::This => {
                Ok(Scope::this_binding(&self.current_scope()).unwrap_or(Value::Undefined))
            }
            ExpressionKind::Array(elements) => {
                let values = self.evaluate_list(elements)?;
                Ok(self.create_array(values))
            }
            ExpressionKind::Object(properties) => self.evaluate_object_literal(properties),
            ExpressionKind::Function(function) => Ok(self.evaluate_function(function, None)),
            ExpressionKind::Class(class) => self.create_class(class, None),
            ExpressionKind::Spread(_) => {
                Err(anyhow!("SyntaxError: Unexpected token '...'").into())
            }
            ExpressionKind::Call { callee, arguments } => self.evaluate_call(callee, arguments),
            ExpressionKind::SuperCall(arguments) => self.evaluate_super_call(arguments),
            ExpressionKind::New { callee, arguments } => {
                let constructor = self.evaluate(callee)?;
                let arguments = self.evaluate_list(arguments)?;
                let constructable = match &constructor {
                    Value::Object(object) => Self::is_constructor(&object.borrow()),
                    _ => false,
                };
                if !constructable {
                    let name = describe_expression(callee).unwrap_or_else(|| inspect(&constructor));
                    return self.throw_error(
                        ErrorKind::TypeError,
                        format!("{} is not a constructor", name),
                    );
                }
                self.construct(&constructor, arguments)
            }
            ExpressionKind::Unary {
                operator,
                operand,
                prefix,
            } => self.evaluate_unary(*operator, operand, *prefix),
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                match operator {
                    BinaryOperator::LogicalAnd if !left.is_truthy() => Ok(left),
                    BinaryOperator::LogicalOr if left.is_truthy() => Ok(left),
                    BinaryOperator::Nullish if !left.is_nullish() => Ok(left),
                    operator if operator.is_logical() => self.evaluate(right),
                    operator => {
                        let right = self.evaluate(right)?;
                        self.binary_operation(*operator, &left, &right)
                    }
                }
            }
            ExpressionKind::Assign {
                operator,
                target,
                value,
            } => self.evaluate_assignment(*operator, target, value),
            ExpressionKind::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
            ExpressionKind::Sequence(expressions) => {
                let mut last = Value::Undefined;
                for expression in expressions {
                    last = self.evaluate(expression)?;
                }
                Ok(last)
            }
        }
    }

    /// Evaluates `expression`, naming it `name` if it is an anonymous function or class, as
    /// `let f = function () {}` does.
    pub(crate) fn evaluate_named(&mut self, expression: &Expression, name: &str) -> Eval<Value> {
        match &expression.kind {
            ExpressionKind::Function(function) if function.name.is_none() => {
                Ok(self.evaluate_function(function, Some(name)))
            }
            ExpressionKind::Class(class) if class.name.is_none() => {
                self.create_class(class, Some(name))
            }
            _ => self.evaluate(expression),
        }
    }

    pub(crate) fn evaluate_reference(&mut self, expression: &Expression) -> Eval<Reference> {
        match &expression.kind {
            ExpressionKind::Identifier(name) => Ok(Reference::Variable(name.clone())),
            ExpressionKind::Dot { object, property } => {
                let base = self.evaluate(object)?;
                Ok(Reference::Property {
                    base,
                    key: property.clone(),
                    this: None,
                })
            }
            ExpressionKind::Index { object, index } => {
                let base = self.evaluate(object)?;
                let key = self.evaluate(index)?;
                let key = self.to_property_key(&key)?;
                Ok(Reference::Property {
                    base,
                    key,
                    this: None,
                })
            }
            ExpressionKind::SuperDot(name) => {
                let scope = self.current_scope();
                let home = Scope::method_context(&scope)
                    .1
                    .ok_or_else(|| anyhow!("SyntaxError: 'super' keyword unexpected here"))?;
                let base = match &home.borrow().prototype {
                    Some(prototype) => Value::Object(prototype.clone()),
                    None => Value::Null,
                };
                let this = Scope::this_binding(&scope).unwrap_or(Value::Undefined);
                Ok(Reference::Property {
                    base,
                    key: name.clone(),
                    this: Some(this),
                })
            }
            _ => Ok(Reference::Value(self.evaluate(expression)?)),
        }
    }

    /// Evaluates call arguments or array elements, expanding spreads.
    pub(crate) fn evaluate_list(&mut self, expressions: &[Expression]) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(expressions.len());
        for expression in expressions {
            match &expression.kind {
                ExpressionKind::Spread(inner) => {
                    let iterable = self.evaluate(inner)?;
                    values.extend(self.iterable_to_vec(&iterable)?);
                }
                _ => values.push(self.evaluate(expression)?),
            }
        }
        Ok(values)
    }

    /// The values `for-of` and spread walk over: array elements or the characters of a string.
    pub(crate) fn iterable_to_vec(&mut self, value: &Value) -> Eval<Vec<Value>> {
        let characters = |string: &str| string.chars().map(|c| Value::from(c.to_string())).collect();
        match value {
            Value::String(string) => Ok(characters(string)),
            Value::Object(object) => match &object.borrow().kind {
                ObjectKind::Array(elements) => Ok(elements.clone()),
                ObjectKind::String(string) => Ok(characters(string)),
                _ => self.throw_error(
                    ErrorKind::TypeError,
                    format!("{} is not iterable", inspect(value)),
                ),
            },
            other => self.throw_error(
                ErrorKind::TypeError,
                format!("{} is not iterable", inspect(other)),
            ),
        }
    }

    /// A named function expression can call itself by name, so it gets a scope of its own
    /// holding that binding.
    fn evaluate_function(
        &mut self,
        function: &Rc<FunctionLiteral>,
        name_hint: Option<&str>,
    ) -> Value {
        let scope = self.current_scope();
        let closure = match (&function.name, function.is_arrow) {
            (Some(name), false) => {
                let inner = Scope::new_block(scope);
                let closure = self.create_closure(function, inner.clone(), None, false, None);
                inner
                    .borrow_mut()
                    .declare(name, Value::Object(closure.clone()), true);
                closure
            }
            _ => self.create_closure(function, scope, None, false, name_hint),
        };
        Value::Object(closure)
    }

    fn evaluate_object_literal(&mut self, properties: &[PropertyDefinition]) -> Eval<Value> {
        let object = self.create_object();
        for property in properties {
            let key = match &property.key {
                PropertyKey::Static(key) => key.clone(),
                PropertyKey::Computed(expression) => {
                    let key = self.evaluate(expression)?;
                    self.to_property_key(&key)?
                }
            };
            let value = self.evaluate_named(&property.value, &key)?;
            object.borrow_mut().set(&key, value);
        }
        Ok(Value::Object(object))
    }

    fn evaluate_call(&mut self, callee: &Expression, arguments: &[Expression]) -> Eval<Value> {
        let (function, this) = match &callee.kind {
            ExpressionKind::Dot { .. }
            | ExpressionKind::Index { .. }
            | ExpressionKind::SuperDot(_) => {
                let reference = self.evaluate_reference(callee)?;
                let function = self.get_value(&reference)?;
                (function, reference.this_value())
            }
            _ => (self.evaluate(callee)?, Value::Undefined),
        };
        let arguments = self.evaluate_list(arguments)?;

        if !function.is_callable() {
            let name = describe_expression(callee).unwrap_or_else(|| inspect(&function));
            return self.throw_error(ErrorKind::TypeError, format!("{} is not a function", name));
        }
        self.call(&function, this, arguments)
    }

    /// `super(...)` runs the parent constructor against the `this` already allocated by `new`.
    fn evaluate_super_call(&mut self, arguments: &[Expression]) -> Eval<Value> {
        let scope = self.current_scope();
        let function = Scope::method_context(&scope)
            .0
            .ok_or_else(|| anyhow!("SyntaxError: 'super' keyword unexpected here"))?;
        let parent = function.borrow().prototype.clone();
        let parent = match parent {
            Some(parent) if Self::is_constructor(&parent.borrow()) => parent,
            _ => {
                return self.throw_error(
                    ErrorKind::TypeError,
                    "Super constructor is not a constructor",
                )
            }
        };

        let arguments = self.evaluate_list(arguments)?;
        let this = Scope::this_binding(&scope).unwrap_or(Value::Undefined);
        self.invoke(&Value::Object(parent), this, arguments, true)?;
        Ok(Value::Undefined)
    }

    fn evaluate_unary(
        &mut self,
        operator: UnaryOperator,
        operand: &Expression,
        prefix: bool,
    ) -> Eval<Value> {
        match operator {
            UnaryOperator::Typeof => {
                if let ExpressionKind::Identifier(name) = &operand.kind {
                    if self.lookup_variable(name).is_none() {
                        return Ok(Value::from("undefined"));
                    }
                }
                let value = self.evaluate(operand)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOperator::Delete => match &operand.kind {
                ExpressionKind::Dot { .. } | ExpressionKind::Index { .. } => {
                    match self.evaluate_reference(operand)? {
                        Reference::Property {
                            base: Value::Object(object),
                            key,
                            ..
                        } => Ok(Value::from(object.borrow_mut().delete(&key))),
                        Reference::Property { base, key, .. } if base.is_nullish() => self
                            .throw_error(
                                ErrorKind::TypeError,
                                format!(
                                    "Cannot convert undefined or null to object (deleting '{}')",
                                    key
                                ),
                            ),
                        _ => Ok(Value::from(true)),
                    }
                }
                ExpressionKind::Identifier(_) => Ok(Value::from(false)),
                _ => {
                    self.evaluate(operand)?;
                    Ok(Value::from(true))
                }
            },
            UnaryOperator::Increment | UnaryOperator::Decrement => {
                if !operand.is_assignable() {
                    let position = if prefix { "prefix" } else { "postfix" };
                    return Err(anyhow!(
                        "SyntaxError: Invalid left-hand side expression in {} operation",
                        position
                    )
                    .into());
                }
                let reference = self.evaluate_reference(operand)?;
                let current = self.get_value(&reference)?;
                let old = self.coerce_to_number(&current)?;
                let new = if operator == UnaryOperator::Increment {
                    old + 1.0
                } else {
                    old - 1.0
                };
                self.put_value(&reference, Value::from(new))?;
                Ok(Value::from(if prefix { new } else { old }))
            }
            UnaryOperator::Not => Ok(Value::from(!self.evaluate(operand)?.is_truthy())),
            UnaryOperator::Negate => {
                let value = self.evaluate(operand)?;
                Ok(Value::from(-self.coerce_to_number(&value)?))
            }
            UnaryOperator::Plus => {
                let value = self.evaluate(operand)?;
                Ok(Value::from(self.coerce_to_number(&value)?))
            }
            UnaryOperator::BitwiseNot => {
                let value = self.evaluate(operand)?;
                let number = self.coerce_to_number(&value)?;
                Ok(Value::from(!to_int32(number) as f64))
            }
            UnaryOperator::Void => {
                self.evaluate(operand)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn evaluate_assignment(
        &mut self,
        operator: Option<BinaryOperator>,
        target: &Expression,
        value: &Expression,
    ) -> Eval<Value> {
        if !target.is_assignable() {
            return Err(anyhow!("SyntaxError: Invalid left-hand side in assignment").into());
        }
        let reference = self.evaluate_reference(target)?;

        let value = match operator {
            None => match &target.kind {
                ExpressionKind::Identifier(name) => self.evaluate_named(value, name)?,
                _ => self.evaluate(value)?,
            },
            Some(operator) if operator.is_logical() => {
                let current = self.get_value(&reference)?;
                let keep = match operator {
                    BinaryOperator::LogicalAnd => !current.is_truthy(),
                    BinaryOperator::LogicalOr => current.is_truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.evaluate(value)?
            }
            Some(operator) => {
                let current = self.get_value(&reference)?;
                let right = self.evaluate(value)?;
                self.binary_operation(operator, &current, &right)?
            }
        };

        self.put_value(&reference, value.clone())?;
        Ok(value)
    }

    /// True when `value` is an object whose prototype chain contains `prototype`.
    pub(crate) fn inherits_from(value: &Value, prototype: &ObjectRef) -> bool {
        match value {
            Value::Object(object) => object
                .borrow()
                .prototype_chain()
                .iter()
                .any(|candidate| Rc::ptr_eq(candidate, prototype)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_eval, test_render};
    use crate::value::Value;

    #[test]
    fn test_arithmetic_and_coercion() {
        let tests = vec![
            ("2 + \"2\"", Value::from("22")),
            ("2 + 2", Value::from(4.0)),
            ("\"5\" - 1", Value::from(4.0)),
            ("'3' * '4'", Value::from(12.0)),
            ("1 + true", Value::from(2.0)),
            ("'a' + null", Value::from("anull")),
            ("[1, 2] + ''", Value::from("1,2")),
            ("({}) + ''", Value::from("[object Object]")),
            ("2 ** 10", Value::from(1024.0)),
            ("2 ** 3 ** 2", Value::from(512.0)),
            ("-7 % 3", Value::from(-1.0)),
            ("~5", Value::from(-6.0)),
            ("-'3'", Value::from(-3.0)),
            ("+''", Value::from(0.0)),
            ("1 / 0", Value::from(f64::INFINITY)),
            ("(1, 2, 3)", Value::from(3.0)),
            ("void 0", Value::Undefined),
        ];
        for (input, expected) in tests {
            assert_eq!(test_eval(input).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let tests = vec![
            ("0 || 'fallback'", Value::from("fallback")),
            ("'first' || 'second'", Value::from("first")),
            ("1 && 'last'", Value::from("last")),
            ("'' && 'never'", Value::from("")),
            ("null ?? 'default'", Value::from("default")),
            ("0 ?? 'default'", Value::from(0.0)),
            ("let calls = 0; false && calls++; calls", Value::from(0.0)),
            ("let x = null; x ??= 5; x", Value::from(5.0)),
            ("let y = 1; y &&= 2; y", Value::from(2.0)),
            ("let z = 0; z ||= 3; z", Value::from(3.0)),
            ("let calls = 0; let v = 'set'; v ||= calls++; v ??= calls++; calls", Value::from(0.0)),
            ("let calls = 0; let w = 0; w &&= calls++; calls", Value::from(0.0)),
            ("let o = { n: null }; (o.n ??= 'filled') + o.n", Value::from("filledfilled")),
        ];
        for (input, expected) in tests {
            assert_eq!(test_eval(input).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn test_assignment_forms() {
        let tests = vec![
            ("let a = 1; a += 2; a", "3"),
            ("let s = 'a'; s += 'b'; s", "ab"),
            ("let n = 10; n -= 3; n *= 2; n /= 7; n", "2"),
            ("let b = 5; b <<= 2; b", "20"),
            ("let u = -1; u >>>= 28; u", "15"),
            ("let p = 3; p **= 2; p", "9"),
            ("let i = 0; [i++, i, ++i, i--, --i]", "[ 0, 1, 2, 2, 0 ]"),
            ("let o = { n: 1 }; o.n++; o['n'] += 10; o.n", "12"),
            ("let a, b; a = b = 7; a + b", "14"),
            ("let arr = [1, 2]; arr[5] = 6; arr.length", "6"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_invalid_assignment_target_is_fatal() {
        let tests = vec!["1 = 2", "f() = 1", "try { (a + b) = 1; } catch (e) {}"];
        for input in tests {
            let error = test_eval(input).unwrap_err();
            assert!(
                error.to_string().contains("Invalid left-hand side"),
                "{}: {}",
                input,
                error
            );
        }
    }

    #[test]
    fn test_typeof_and_delete() {
        let tests = vec![
            ("typeof undeclared", "undefined"),
            ("typeof null", "object"),
            ("typeof function () {}", "function"),
            ("typeof class {}", "function"),
            ("typeof 'x'", "string"),
            ("let o = { a: 1, b: 2 }; delete o.a; Object.keys(o)", "[ 'b' ]"),
            ("let o = { a: 1 }; [delete o.missing, delete o['a'], o.a]", "[ true, true, undefined ]"),
            ("let arr = [1, 2, 3]; delete arr[1]; arr", "[ 1, undefined, 3 ]"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_closures() {
        let tests = vec![
            (
                "function counter() { let n = 0; return () => ++n; } let c = counter(); c(); c(); c()",
                "3",
            ),
            (
                "function pair() { let v = 0; return [() => v++, () => v]; } let p = pair(); p[0](); p[0](); p[1]()",
                "2",
            ),
            (
                "function make() { let shared = 0; return { inc() { shared++; }, get() { return shared; } }; } let m = make(); m.inc(); m.inc(); m.get()",
                "2",
            ),
            ("let adders = [1, 2].map(n => x => x + n); adders[1](10)", "12"),
            ("let fact = function f(n) { return n <= 1 ? 1 : n * f(n - 1); }; fact(5)", "120"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_functions_and_arguments() {
        let tests = vec![
            ("function f(a, b = a + 1) { return [a, b]; } f(1)", "[ 1, 2 ]"),
            ("function f(first, ...rest) { return rest; } f(1, 2, 3)", "[ 2, 3 ]"),
            ("function f() { return arguments.length; } f(1, 2, 3)", "3"),
            ("function f(a, b) { return a + b; } f(...[4, 5])", "9"),
            ("[...'hi', ...[1]]", "[ 'h', 'i', 1 ]"),
            ("function f(a) { return a; } f()", "undefined"),
            ("(function (a, b) {}).length", "2"),
            ("let named = () => 1; named.name", "named"),
            ("function f() { return this; } f()", "undefined"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_this_binding() {
        let tests = vec![
            ("let o = { v: 1, get() { return this.v; } }; o.get()", "1"),
            ("let o = { v: 2, get() { return (() => this.v)(); } }; o.get()", "2"),
            ("let o = { v: 3, get() { return [1].map(() => this.v); } }; o.get()", "[ 3 ]"),
            ("let o = { v: 4 }; function f() { return this.v; } f.call(o)", "4"),
            ("let o = { v: 5, f: () => typeof this }; o.f()", "object"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_object_literals() {
        let tests = vec![
            ("let key = 'dyn'; ({ [key + 1]: true })", "{ dyn1: true }"),
            ("let a = 1; ({ a, b: 2 })", "{ a: 1, b: 2 }"),
            ("({ 'two words': 1, 3: 'x' })['3']", "x"),
            ("({ 'two words': 1 })", "{ 'two words': 1 }"),
            ("({ m() { return 'method'; } }).m()", "method"),
            ("({ f: function () {} }).f.name", "f"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_runtime_type_errors() {
        let tests = vec![
            ("let o = {}; try { o.nope(); } catch (e) { e.message }", "o.nope is not a function"),
            ("try { undefined.x; } catch (e) { e.message }", "Cannot read properties of undefined (reading 'x')"),
            ("try { null.x = 1; } catch (e) { e.message }", "Cannot set properties of null (setting 'x')"),
            ("try { new (() => 1)(); } catch (e) { e.name }", "TypeError"),
            ("const c = 1; try { c = 2; } catch (e) { e.message }", "Assignment to constant variable."),
            ("try { for (const x of 5) {} } catch (e) { e.message }", "5 is not iterable"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }
}
