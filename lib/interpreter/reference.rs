use anyhow::anyhow;

use super::{Eval, Interpreter};
use crate::{
    environment::{Assignment, Scope},
    error::ErrorKind,
    object::JsObject,
    value::Value,
};

/// The result of evaluating a possibly-assignable expression: reads go through
/// `get_value`, writes through `put_value`.
#[derive(Debug, Clone)]
pub enum Reference {
    Variable(String),
    /// `this` differs from `base` only for `super.name`, which looks the property up on the
    /// parent prototype but calls it with the current receiver.
    Property {
        base: Value,
        key: String,
        this: Option<Value>,
    },
    Value(Value),
}

impl Reference {
    /// The receiver a call through this reference gets.
    pub fn this_value(&self) -> Value {
        match self {
            Reference::Property { base, this, .. } => this.clone().unwrap_or_else(|| base.clone()),
            _ => Value::Undefined,
        }
    }
}

impl Interpreter {
    pub(crate) fn get_value(&mut self, reference: &Reference) -> Eval<Value> {
        match reference {
            Reference::Variable(name) => match self.lookup_variable(name) {
                Some(value) => Ok(value),
                None => self.throw_error(
                    ErrorKind::ReferenceError,
                    format!("{} is not defined", name),
                ),
            },
            Reference::Property { base, key, .. } => self.get_property(base, key),
            Reference::Value(value) => Ok(value.clone()),
        }
    }

    pub(crate) fn put_value(&mut self, reference: &Reference, value: Value) -> Eval<()> {
        match reference {
            Reference::Variable(name) => self.assign_variable(name, value),
            Reference::Property { base, key, this } => match this {
                Some(this) => self.set_property(this, key, value),
                None => self.set_property(base, key, value),
            },
            Reference::Value(_) => {
                Err(anyhow!("SyntaxError: Invalid left-hand side in assignment").into())
            }
        }
    }

    /// Resolves a name through the scope chain, then the global object.
    pub(crate) fn lookup_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = Scope::lookup(&self.current_scope(), name) {
            return Some(value);
        }
        let global = self.global_object.borrow();
        if JsObject::has_property(&global, name) {
            Some(JsObject::get(&global, name))
        } else {
            None
        }
    }

    /// Assigns to the nearest binding named `name`. Unresolved names become properties of the
    /// global object.
    pub(crate) fn assign_variable(&mut self, name: &str, value: Value) -> Eval<()> {
        match Scope::assign(&self.current_scope(), name, value.clone()) {
            Assignment::Assigned => Ok(()),
            Assignment::Constant => {
                self.throw_error(ErrorKind::TypeError, "Assignment to constant variable.")
            }
            Assignment::Unresolved => {
                self.global_object.borrow_mut().set(name, value);
                Ok(())
            }
        }
    }
}
