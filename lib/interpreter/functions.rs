use std::rc::Rc;

use anyhow::anyhow;

use super::{
    Completion, Eval, Interpreter, NativeContext, StackFrame, STACK_GROWTH, STACK_RED_ZONE,
};
use crate::{
    ast::{
        ClassLiteral, Expression, ExpressionKind, FunctionBody, FunctionLiteral, Parameter,
        Statement, StatementKind,
    },
    environment::{Scope, ScopeRef},
    error::ErrorKind,
    object::{Closure, JsObject, NativeFn, NativeFunction, ObjectKind, ObjectRef, Property},
    token::SourceInfo,
    value::{inspect, Value},
};

/// What a callable object does when invoked, cloned out so no borrow is held during the call.
enum Callee {
    Closure(Closure),
    Native(NativeFn),
    Bound(ObjectRef, Value, Vec<Value>),
}

fn read_only(value: Value) -> Property {
    Property {
        value,
        writable: false,
        enumerable: false,
        configurable: true,
    }
}

impl Interpreter {
    pub(crate) fn make_native(
        &self,
        name: &str,
        arity: usize,
        is_constructor: bool,
        function: NativeFn,
    ) -> ObjectRef {
        let mut object = JsObject::new(
            ObjectKind::Native(NativeFunction {
                function,
                is_constructor,
            }),
            Some(self.intrinsics.function_prototype.clone()),
        );
        object.define_property("name", read_only(Value::from(name)));
        object.define_property("length", read_only(Value::from(arity)));
        object.into_ref()
    }

    /// Installs a builtin method as a non-enumerable property of `target`.
    pub(crate) fn define_native(
        &self,
        target: &ObjectRef,
        name: &str,
        arity: usize,
        function: impl Fn(&mut NativeContext) -> Eval<Value> + 'static,
    ) {
        let native = self.make_native(name, arity, false, Rc::new(function));
        target
            .borrow_mut()
            .define_property(name, Property::hidden(Value::Object(native)));
    }

    /// Creates a builtin constructor linked both ways with `prototype` and exposes it as a
    /// global.
    pub(crate) fn define_constructor(
        &mut self,
        name: &str,
        arity: usize,
        prototype: &ObjectRef,
        function: impl Fn(&mut NativeContext) -> Eval<Value> + 'static,
    ) -> ObjectRef {
        let constructor = self.make_native(name, arity, true, Rc::new(function));
        // The constructor literal is named `constructor`; the class name wins over it.
        constructor.borrow_mut().define_property(
            "name",
            read_only(Value::from(name)),
        );
        constructor.borrow_mut().define_property(
            "prototype",
            Property {
                value: Value::Object(prototype.clone()),
                writable: false,
                enumerable: false,
                configurable: false,
            },
        );
        prototype.borrow_mut().define_property(
            "constructor",
            Property::hidden(Value::Object(constructor.clone())),
        );
        self.global_object
            .borrow_mut()
            .define_property(name, Property::hidden(Value::Object(constructor.clone())));
        constructor
    }

    pub(crate) fn create_closure(
        &self,
        function: &Rc<FunctionLiteral>,
        scope: ScopeRef,
        home_object: Option<ObjectRef>,
        is_class_constructor: bool,
        name_hint: Option<&str>,
    ) -> ObjectRef {
        let name = function
            .name
            .clone()
            .or_else(|| name_hint.map(str::to_string))
            .unwrap_or_default();
        let arity = function
            .parameters
            .iter()
            .take_while(|parameter| parameter.default.is_none() && !parameter.rest)
            .count();
        let has_own_prototype = !function.is_arrow && home_object.is_none();

        let mut object = JsObject::new(
            ObjectKind::Function(Closure {
                function: function.clone(),
                scope,
                home_object,
                is_class_constructor,
            }),
            Some(self.intrinsics.function_prototype.clone()),
        );
        object.define_property("name", read_only(Value::from(name)));
        object.define_property("length", read_only(Value::from(arity)));
        let object = object.into_ref();

        if has_own_prototype {
            let prototype = self.create_object();
            prototype.borrow_mut().define_property(
                "constructor",
                Property::hidden(Value::Object(object.clone())),
            );
            object.borrow_mut().define_property(
                "prototype",
                Property {
                    value: Value::Object(prototype),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        object
    }

    pub(crate) fn is_constructor(object: &JsObject) -> bool {
        match &object.kind {
            ObjectKind::Function(closure) => {
                !closure.function.is_arrow
                    && (closure.home_object.is_none() || closure.is_class_constructor)
            }
            ObjectKind::Native(native) => native.is_constructor,
            ObjectKind::Bound(bound) => Self::is_constructor(&bound.target.borrow()),
            _ => false,
        }
    }

    pub(crate) fn call(
        &mut self,
        callee: &Value,
        this: Value,
        arguments: Vec<Value>,
    ) -> Eval<Value> {
        self.invoke(callee, this, arguments, false)
    }

    /// `new callee(...arguments)`.
    pub(crate) fn construct(&mut self, callee: &Value, arguments: Vec<Value>) -> Eval<Value> {
        let function = match callee {
            Value::Object(object) if Self::is_constructor(&object.borrow()) => object.clone(),
            other => {
                return self.throw_error(
                    ErrorKind::TypeError,
                    format!("{} is not a constructor", inspect(other)),
                )
            }
        };

        let bound = match &function.borrow().kind {
            ObjectKind::Bound(bound) => Some(bound.clone()),
            _ => None,
        };
        if let Some(bound) = bound {
            let mut bound_arguments = bound.arguments;
            bound_arguments.extend(arguments);
            return self.construct(&Value::Object(bound.target), bound_arguments);
        }

        let prototype = match self.get_property(callee, "prototype")? {
            Value::Object(prototype) => prototype,
            _ => self.intrinsics.object_prototype.clone(),
        };
        let this = JsObject::new(ObjectKind::Ordinary, Some(prototype)).into_ref();
        match self.invoke(callee, Value::Object(this.clone()), arguments, true)? {
            Value::Object(result) => Ok(Value::Object(result)),
            _ => Ok(Value::Object(this)),
        }
    }

    /// Calls any callable object. Under construction `this` is the allocated instance.
    pub(crate) fn invoke(
        &mut self,
        callee: &Value,
        this: Value,
        arguments: Vec<Value>,
        is_construct: bool,
    ) -> Eval<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.invoke_callee(callee, this, arguments, is_construct)
        })
    }

    fn invoke_callee(
        &mut self,
        callee: &Value,
        this: Value,
        arguments: Vec<Value>,
        is_construct: bool,
    ) -> Eval<Value> {
        let object = match callee {
            Value::Object(object) => object.clone(),
            other => {
                return self.throw_error(
                    ErrorKind::TypeError,
                    format!("{} is not a function", inspect(other)),
                )
            }
        };

        let target = match &object.borrow().kind {
            ObjectKind::Function(closure) => Some(Callee::Closure(closure.clone())),
            ObjectKind::Native(native) => Some(Callee::Native(native.function.clone())),
            ObjectKind::Bound(bound) => Some(Callee::Bound(
                bound.target.clone(),
                bound.this.clone(),
                bound.arguments.clone(),
            )),
            _ => None,
        };

        match target {
            Some(Callee::Closure(closure)) => {
                self.call_closure(&object, closure, this, arguments, is_construct)
            }
            Some(Callee::Native(function)) => {
                let name = object.borrow().function_name().unwrap_or_default();
                self.enter_frame(name, self.current_scope(), SourceInfo::default())?;
                let mut context = NativeContext {
                    interpreter: self,
                    this,
                    arguments,
                    is_construct,
                };
                let result = function(&mut context);
                self.call_stack.pop();
                result
            }
            Some(Callee::Bound(target, bound_this, mut bound_arguments)) => {
                bound_arguments.extend(arguments);
                let this = if is_construct { this } else { bound_this };
                self.invoke(&Value::Object(target), this, bound_arguments, is_construct)
            }
            None => self.throw_error(
                ErrorKind::TypeError,
                format!("{} is not a function", inspect(callee)),
            ),
        }
    }

    fn enter_frame(&mut self, name: String, scope: ScopeRef, source: SourceInfo) -> Eval<()> {
        if self.call_stack.len() >= self.config.max_call_depth {
            return self.throw_error(ErrorKind::RangeError, "Maximum call stack size exceeded");
        }
        log::trace!("entering {} (depth {})", name, self.call_stack.len());
        self.call_stack.push(StackFrame {
            name,
            scope,
            source,
        });
        Ok(())
    }

    fn call_closure(
        &mut self,
        function_object: &ObjectRef,
        closure: Closure,
        this: Value,
        arguments: Vec<Value>,
        is_construct: bool,
    ) -> Eval<Value> {
        let literal = closure.function.clone();
        let name = function_object
            .borrow()
            .function_name()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "<anonymous>".to_string());

        if closure.is_class_constructor && !is_construct {
            return self.throw_error(
                ErrorKind::TypeError,
                format!("Class constructor {} cannot be invoked without 'new'", name),
            );
        }

        let this_binding = if literal.is_arrow { None } else { Some(this) };
        let scope = Scope::new_function(
            closure.scope.clone(),
            this_binding,
            Some(function_object.clone()),
            closure.home_object.clone(),
        );

        self.enter_frame(name, scope.clone(), literal.source.clone())?;
        let result = self.run_function_body(&literal, &scope, arguments);
        self.call_stack.pop();
        result
    }

    fn run_function_body(
        &mut self,
        literal: &FunctionLiteral,
        scope: &ScopeRef,
        arguments: Vec<Value>,
    ) -> Eval<Value> {
        if !literal.is_arrow {
            let array = self.create_array(arguments.clone());
            scope.borrow_mut().declare("arguments", array, true);
        }

        for (index, parameter) in literal.parameters.iter().enumerate() {
            let value = if parameter.rest {
                self.create_array(arguments.get(index..).unwrap_or_default().to_vec())
            } else {
                arguments.get(index).cloned().unwrap_or(Value::Undefined)
            };
            let value = match (&parameter.default, value) {
                (Some(default), Value::Undefined) => self.evaluate(default)?,
                (_, value) => value,
            };
            scope.borrow_mut().declare(&parameter.name, value, true);
        }

        match &literal.body {
            FunctionBody::Expression(expression) => self.evaluate(expression),
            FunctionBody::Block(statements) => {
                self.hoist_declarations(statements, scope)?;
                match self.execute_statements(statements)? {
                    Completion::Return(value) => Ok(value),
                    Completion::Normal(_) => Ok(Value::Undefined),
                    Completion::Break(_) | Completion::Continue(_) => {
                        Err(anyhow!("SyntaxError: Illegal break or continue statement").into())
                    }
                }
            }
        }
    }

    /// Builds a class: a constructor closure whose `prototype` carries the methods, linked to
    /// the superclass both on the prototype chain and for static lookups.
    pub(crate) fn create_class(
        &mut self,
        class: &ClassLiteral,
        name_hint: Option<&str>,
    ) -> Eval<Value> {
        let name = class
            .name
            .clone()
            .or_else(|| name_hint.map(str::to_string));

        let superclass = match &class.superclass {
            Some(expression) => {
                let value = self.evaluate(expression)?;
                match &value {
                    Value::Null => Some(None),
                    Value::Object(object) if Self::is_constructor(&object.borrow()) => {
                        Some(Some(object.clone()))
                    }
                    other => {
                        return self.throw_error(
                            ErrorKind::TypeError,
                            format!(
                                "Class extends value {} is not a constructor or null",
                                inspect(other)
                            ),
                        )
                    }
                }
            }
            None => None,
        };

        let prototype_parent = match &superclass {
            Some(Some(parent)) => match self.get_property(&Value::Object(parent.clone()), "prototype")?
            {
                Value::Object(prototype) => Some(prototype),
                Value::Null => None,
                _ => {
                    return self.throw_error(
                        ErrorKind::TypeError,
                        "Class extends value does not have valid prototype property",
                    )
                }
            },
            Some(None) => None,
            None => Some(self.intrinsics.object_prototype.clone()),
        };
        let prototype = JsObject::new(ObjectKind::Ordinary, prototype_parent).into_ref();

        let scope = Scope::new_block(self.current_scope());
        let constructor_literal = match &class.constructor {
            Some(constructor) => constructor.clone(),
            None => default_constructor(class, matches!(superclass, Some(Some(_)))),
        };
        let constructor = self.create_closure(
            &constructor_literal,
            scope.clone(),
            Some(prototype.clone()),
            true,
            Some(name.as_deref().unwrap_or_default()),
        );
        constructor.borrow_mut().define_property(
            "prototype",
            Property {
                value: Value::Object(prototype.clone()),
                writable: false,
                enumerable: false,
                configurable: false,
            },
        );
        prototype.borrow_mut().define_property(
            "constructor",
            Property::hidden(Value::Object(constructor.clone())),
        );
        if let Some(Some(parent)) = &superclass {
            constructor.borrow_mut().prototype = Some(parent.clone());
        }

        for method in &class.methods {
            let home = if method.is_static {
                constructor.clone()
            } else {
                prototype.clone()
            };
            let function = self.create_closure(
                &method.function,
                scope.clone(),
                Some(home.clone()),
                false,
                Some(&method.name),
            );
            home.borrow_mut()
                .define_property(&method.name, Property::hidden(Value::Object(function)));
        }

        if let Some(name) = &name {
            scope
                .borrow_mut()
                .declare(name, Value::Object(constructor.clone()), false);
        }
        Ok(Value::Object(constructor))
    }
}

/// `constructor() {}`, or `constructor(...args) { super(...args); }` for derived classes.
fn default_constructor(class: &ClassLiteral, derived: bool) -> Rc<FunctionLiteral> {
    let source = class.source.clone();
    let expression = |kind: ExpressionKind| Expression {
        kind,
        source: source.clone(),
    };

    let (parameters, body) = if derived {
        let forward = expression(ExpressionKind::SuperCall(vec![expression(
            ExpressionKind::Spread(Box::new(expression(ExpressionKind::Identifier(
                "args".to_string(),
            )))),
        )]));
        (
            vec![Parameter {
                name: "args".to_string(),
                default: None,
                rest: true,
            }],
            vec![Statement {
                kind: StatementKind::Expression(forward),
                source: source.clone(),
            }],
        )
    } else {
        (Vec::new(), Vec::new())
    };

    Rc::new(FunctionLiteral {
        name: class.name.clone(),
        parameters,
        body: FunctionBody::Block(body),
        is_arrow: false,
        source: class.source.clone(),
    })
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::test_render;

    #[test]
    fn test_class_names() {
        let tests = vec![
            ("class P { constructor() {} }; P.name", "P"),
            ("class Q {}; Q.name", "Q"),
            ("let Anonymous = class { constructor() {} }; Anonymous.name", "Anonymous"),
            ("class Point { constructor(x) { this.x = x; } }; new Point(1)", "Point { x: 1 }"),
            (
                "class Named { constructor() {} }; try { Named(); } catch (e) { e.message }",
                "Class constructor Named cannot be invoked without 'new'",
            ),
            ("class Shown { constructor() {} }; String(Shown)", "class Shown { }"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_class_inheritance() {
        let input = r#"
            class Animal {
                constructor(name) { this.name = name; }
                speak() { return this.name + " makes a sound"; }
                static create(name) { return new this(name); }
            }
            class Dog extends Animal {
                speak() { return super.speak() + " (woof)"; }
            }
            let dog = Dog.create("Rex");
            [dog.speak(), dog instanceof Animal, Dog.name, dog.constructor === Dog]
        "#;
        assert_eq!(
            test_render(input),
            "[ 'Rex makes a sound (woof)', true, 'Dog', true ]"
        );
    }
}
