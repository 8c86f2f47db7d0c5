mod builtins;
mod completion;
mod expressions;
mod functions;
mod operators;
mod reference;
mod statements;

use std::rc::Rc;

use anyhow::{bail, Result};

pub use completion::{Completion, Eval, Exception, Interruption};
pub use reference::Reference;

use crate::{
    engine::Engine,
    environment::{Scope, ScopeRef},
    error::{format_trace, ErrorKind, UncaughtException},
    object::{JsObject, ObjectKind, ObjectRef, Property},
    parser,
    token::SourceInfo,
    value::{inspect, Value},
};

/// Script recursion maps onto Rust recursion. Evaluation grows the stack by `STACK_GROWTH`
/// whenever less than `STACK_RED_ZONE` is left, so deep scripts run on any thread.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROWTH: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Reported in source positions of parse errors.
    pub filename: String,
    /// Calls nested deeper than this raise a `RangeError`.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            filename: "<script>".to_string(),
            max_call_depth: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// Where `console.*` output goes.
pub trait Console {
    fn write(&mut self, level: ConsoleLevel, message: &str);
}

pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write(&mut self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => println!("{}", message),
            ConsoleLevel::Warn | ConsoleLevel::Error => eprintln!("{}", message),
        }
    }
}

pub struct StackFrame {
    pub name: String,
    pub scope: ScopeRef,
    pub source: SourceInfo,
}

/// What a native function sees when it is called.
pub struct NativeContext<'a> {
    pub interpreter: &'a mut Interpreter,
    pub this: Value,
    pub arguments: Vec<Value>,
    /// Set under `new` and `super(...)`, where `this` is the freshly allocated object.
    pub is_construct: bool,
}

impl<'a> NativeContext<'a> {
    pub fn argument(&self, index: usize) -> Value {
        self.arguments
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub fn number_argument(&mut self, index: usize) -> Eval<f64> {
        let value = self.argument(index);
        self.interpreter.coerce_to_number(&value)
    }

    pub fn string_argument(&mut self, index: usize) -> Eval<String> {
        let value = self.argument(index);
        self.interpreter.coerce_to_string(&value)
    }

    /// The object `new` allocated, if this call is a construction.
    pub fn constructed_this(&self) -> Option<ObjectRef> {
        match (&self.this, self.is_construct) {
            (Value::Object(object), true) => Some(object.clone()),
            _ => None,
        }
    }
}

/// Builtin prototypes, created before anything else so every object can link to them.
pub(crate) struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub regexp_prototype: ObjectRef,
    error_prototypes: Vec<(ErrorKind, ObjectRef)>,
}

impl Intrinsics {
    fn new() -> Self {
        let object_prototype = JsObject::new(ObjectKind::Ordinary, None).into_ref();
        let derived = |kind: ObjectKind| -> ObjectRef {
            JsObject::new(kind, Some(object_prototype.clone())).into_ref()
        };

        let error_prototype = derived(ObjectKind::Ordinary);
        let error_prototypes = ErrorKind::ALL
            .iter()
            .map(|kind| match kind {
                ErrorKind::Error => (*kind, error_prototype.clone()),
                _ => (
                    *kind,
                    JsObject::new(ObjectKind::Ordinary, Some(error_prototype.clone())).into_ref(),
                ),
            })
            .collect();

        Self {
            function_prototype: derived(ObjectKind::Ordinary),
            array_prototype: derived(ObjectKind::Array(Vec::new())),
            string_prototype: derived(ObjectKind::String(String::new())),
            number_prototype: derived(ObjectKind::Number(0.0)),
            boolean_prototype: derived(ObjectKind::Boolean(false)),
            regexp_prototype: derived(ObjectKind::Ordinary),
            error_prototypes,
            object_prototype,
        }
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> ObjectRef {
        self.error_prototypes
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, prototype)| prototype.clone())
            .unwrap_or_else(|| self.object_prototype.clone())
    }
}

pub struct Interpreter {
    config: InterpreterConfig,
    global_object: ObjectRef,
    global_scope: ScopeRef,
    call_stack: Vec<StackFrame>,
    intrinsics: Intrinsics,
    console: Box<dyn Console>,
    /// Arrays with a `join` in progress. Meeting one again renders it as empty.
    joining: Vec<ObjectRef>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let intrinsics = Intrinsics::new();
        let global_object = JsObject::new(
            ObjectKind::Ordinary,
            Some(intrinsics.object_prototype.clone()),
        )
        .into_ref();
        let global_scope = Scope::new_global(Value::Object(global_object.clone()));

        let mut interpreter = Self {
            config,
            call_stack: vec![StackFrame {
                name: "<global>".to_string(),
                scope: global_scope.clone(),
                source: SourceInfo::default(),
            }],
            global_object,
            global_scope,
            intrinsics,
            console: Box::new(StdoutConsole),
            joining: Vec::new(),
        };
        builtins::install(&mut interpreter);
        interpreter
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn set_console(&mut self, console: Box<dyn Console>) {
        self.console = console;
    }

    pub(crate) fn console_write(&mut self, level: ConsoleLevel, message: &str) {
        self.console.write(level, message);
    }

    /// Runs a script against this interpreter's global object and returns the value of the
    /// last statement evaluated at top level.
    pub fn interpret(&mut self, source: &str) -> Result<Value> {
        log::debug!(
            "interpreting {} ({} bytes)",
            self.config.filename,
            source.len()
        );
        let program = parser::parse_source(source, &self.config.filename)?;

        let result = self.execute_program(&program);

        self.call_stack.truncate(1);
        if let Some(frame) = self.call_stack.first_mut() {
            frame.scope = self.global_scope.clone();
        }

        result.map_err(|interruption| self.into_host_error(interruption))
    }

    /// Like `interpret`, but the script must evaluate to an object.
    pub fn interpret_as_object(&mut self, source: &str) -> Result<ObjectRef> {
        match self.interpret(source)? {
            Value::Object(object) => Ok(object),
            other => bail!("expected an object, got {}", inspect(&other)),
        }
    }

    /// Converts a value to a string the way script code would, running `toString` methods.
    pub fn interpret_as_string(&mut self, value: &Value) -> Result<String> {
        self.coerce_to_string(value)
            .map_err(|interruption| self.into_host_error(interruption))
    }

    pub fn call_function(
        &mut self,
        function: &Value,
        this: Value,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        let result = if function.is_callable() {
            self.call(function, this, arguments)
        } else {
            self.throw_error(
                ErrorKind::TypeError,
                format!("{} is not a function", inspect(function)),
            )
        };
        self.call_stack.truncate(1);
        result.map_err(|interruption| self.into_host_error(interruption))
    }

    pub fn global_object(&self) -> ObjectRef {
        self.global_object.clone()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.global_object.borrow_mut().set(name, value);
    }

    pub fn get_global(&self, name: &str) -> Value {
        JsObject::get(&self.global_object.borrow(), name)
    }

    pub fn create_object(&self) -> ObjectRef {
        JsObject::new(
            ObjectKind::Ordinary,
            Some(self.intrinsics.object_prototype.clone()),
        )
        .into_ref()
    }

    pub fn create_array(&self, elements: Vec<Value>) -> Value {
        Value::Object(
            JsObject::new(
                ObjectKind::Array(elements),
                Some(self.intrinsics.array_prototype.clone()),
            )
            .into_ref(),
        )
    }

    /// Wraps a host closure as a callable script function.
    pub fn create_native_function(
        &self,
        name: &str,
        arity: usize,
        function: impl Fn(&mut NativeContext) -> Eval<Value> + 'static,
    ) -> Value {
        Value::Object(self.make_native(name, arity, false, Rc::new(function)))
    }

    pub(crate) fn current_scope(&self) -> ScopeRef {
        match self.call_stack.last() {
            Some(frame) => frame.scope.clone(),
            None => self.global_scope.clone(),
        }
    }

    /// Replaces the scope of the innermost frame and returns the previous one.
    pub(crate) fn replace_scope(&mut self, scope: ScopeRef) -> ScopeRef {
        match self.call_stack.last_mut() {
            Some(frame) => std::mem::replace(&mut frame.scope, scope),
            None => scope,
        }
    }

    /// Runs `body` with `scope` as the current scope, restoring the previous scope however
    /// `body` exits.
    pub(crate) fn with_scope<T>(
        &mut self,
        scope: ScopeRef,
        body: impl FnOnce(&mut Self) -> Eval<T>,
    ) -> Eval<T> {
        let previous = self.replace_scope(scope);
        let result = body(self);
        self.replace_scope(previous);
        result
    }

    /// Frame names, innermost first.
    pub(crate) fn stack_trace(&self) -> Vec<String> {
        self.call_stack
            .iter()
            .rev()
            .map(|frame| frame.name.clone())
            .collect()
    }

    pub(crate) fn throw_value<T>(&self, value: Value) -> Eval<T> {
        Err(Interruption::Throw(Exception {
            value,
            trace: self.stack_trace(),
        }))
    }

    pub(crate) fn create_error(&self, kind: ErrorKind, message: &str) -> Value {
        let mut error = JsObject::new(
            ObjectKind::Error,
            Some(self.intrinsics.error_prototype(kind)),
        );
        error.define_property("message", Property::hidden(Value::from(message)));
        error.define_property(
            "stack",
            Property::hidden(Value::from(format!(
                "{}: {}{}",
                kind.name(),
                message,
                format_trace(&self.stack_trace())
            ))),
        );
        Value::Object(error.into_ref())
    }

    pub(crate) fn throw_error<T>(&self, kind: ErrorKind, message: impl Into<String>) -> Eval<T> {
        let error = self.create_error(kind, &message.into());
        self.throw_value(error)
    }

    fn into_host_error(&self, interruption: Interruption) -> anyhow::Error {
        match interruption {
            Interruption::Throw(exception) => {
                let message = describe_exception(&exception.value);
                log::debug!("uncaught exception: {}", message);
                UncaughtException {
                    message,
                    trace: exception.trace,
                }
                .into()
            }
            Interruption::Fatal(error) => error,
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Interpreter {
    fn run(&mut self, input: &str) -> Result<String> {
        let value = self.interpret(input)?;
        Ok(inspect(&value))
    }
}

/// `Name: message` for error objects, the plain string form for anything else.
fn describe_exception(value: &Value) -> String {
    match value {
        Value::Object(object) if object.borrow().is_error() => {
            let object = object.borrow();
            let name = JsObject::get(&object, "name").primitive_to_string();
            let message = JsObject::get(&object, "message").primitive_to_string();
            if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            }
        }
        other => other.primitive_to_string(),
    }
}
