//! A tree-walking JavaScript engine: lexer, recursive-descent parser, and an interpreter
//! with prototype-based objects and a small standard library.

pub mod ast;
pub mod engine;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod token;
pub mod value;

pub use engine::Engine;
pub use error::{ErrorKind, LexError, ParseError, UncaughtException};
pub use interpreter::{Console, ConsoleLevel, Interpreter, InterpreterConfig, NativeContext};
pub use object::{JsObject, ObjectKind, ObjectRef, Property};
pub use value::{inspect, Value};

pub fn new_interpreter() -> Box<dyn Engine> {
    Box::new(Interpreter::new())
}
