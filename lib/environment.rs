use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{object::ObjectRef, value::Value};

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Assignment {
    Assigned,
    Constant,
    Unresolved,
}

/// One lexical frame. Function scopes of arrow functions carry no `this`, so lookups walk
/// out to the scope the arrow was defined in.
pub struct Scope {
    variables: HashMap<String, Binding>,
    kind: ScopeKind,
    this_binding: Option<Value>,
    function: Option<ObjectRef>,
    home_object: Option<ObjectRef>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn new_global(this: Value) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            variables: HashMap::new(),
            kind: ScopeKind::Global,
            this_binding: Some(this),
            function: None,
            home_object: None,
            parent: None,
        }))
    }

    pub fn new_function(
        parent: ScopeRef,
        this: Option<Value>,
        function: Option<ObjectRef>,
        home_object: Option<ObjectRef>,
    ) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            variables: HashMap::new(),
            kind: ScopeKind::Function,
            this_binding: this,
            function,
            home_object,
            parent: Some(parent),
        }))
    }

    pub fn new_block(parent: ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            variables: HashMap::new(),
            kind: ScopeKind::Block,
            this_binding: None,
            function: None,
            home_object: None,
            parent: Some(parent),
        }))
    }

    /// A sibling block scope holding copies of this scope's bindings, used to give each loop
    /// iteration fresh `let` bindings.
    pub fn copy_block(scope: &ScopeRef) -> ScopeRef {
        let scope = scope.borrow();
        Rc::new(RefCell::new(Scope {
            variables: scope.variables.clone(),
            kind: ScopeKind::Block,
            this_binding: None,
            function: None,
            home_object: None,
            parent: scope.parent.clone(),
        }))
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.variables
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let scope = scope.borrow();
        match scope.variables.get(name) {
            Some(binding) => Some(binding.value.clone()),
            None => match &scope.parent {
                Some(parent) => Scope::lookup(parent, name),
                None => None,
            },
        }
    }

    pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Assignment {
        let mut current = Some(scope.clone());
        while let Some(scope) = current {
            let mut borrowed = scope.borrow_mut();
            if let Some(binding) = borrowed.variables.get_mut(name) {
                if !binding.mutable {
                    return Assignment::Constant;
                }
                binding.value = value;
                return Assignment::Assigned;
            }
            current = borrowed.parent.clone();
        }
        Assignment::Unresolved
    }

    pub fn this_binding(scope: &ScopeRef) -> Option<Value> {
        let scope = scope.borrow();
        match (&scope.this_binding, &scope.parent) {
            (Some(this), _) => Some(this.clone()),
            (None, Some(parent)) => Scope::this_binding(parent),
            (None, None) => None,
        }
    }

    /// The function object and home object of the nearest scope that has a `this`, which is
    /// where `super` resolves from.
    pub fn method_context(scope: &ScopeRef) -> (Option<ObjectRef>, Option<ObjectRef>) {
        let scope = scope.borrow();
        match (&scope.this_binding, &scope.parent) {
            (Some(_), _) => (scope.function.clone(), scope.home_object.clone()),
            (None, Some(parent)) => Scope::method_context(parent),
            (None, None) => (None, None),
        }
    }

    /// The nearest function or global scope, where `var` names live.
    pub fn variable_scope(scope: &ScopeRef) -> ScopeRef {
        let borrowed = scope.borrow();
        match (&borrowed.kind, &borrowed.parent) {
            (ScopeKind::Block, Some(parent)) => Scope::variable_scope(parent),
            _ => scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let global = Scope::new_global(Value::Undefined);
        global.borrow_mut().declare("x", Value::from(1.0), true);
        let function = Scope::new_function(global.clone(), Some(Value::Null), None, None);
        let block = Scope::new_block(function.clone());

        assert_eq!(Scope::lookup(&block, "x"), Some(Value::from(1.0)));
        assert_eq!(Scope::lookup(&block, "y"), None);

        assert_eq!(Scope::assign(&block, "x", Value::from(2.0)), Assignment::Assigned);
        assert_eq!(Scope::lookup(&global, "x"), Some(Value::from(2.0)));
        assert_eq!(Scope::assign(&block, "y", Value::Null), Assignment::Unresolved);
    }

    #[test]
    fn test_constant_bindings() {
        let global = Scope::new_global(Value::Undefined);
        global.borrow_mut().declare("limit", Value::from(10.0), false);
        assert_eq!(
            Scope::assign(&global, "limit", Value::from(11.0)),
            Assignment::Constant
        );
        assert_eq!(Scope::lookup(&global, "limit"), Some(Value::from(10.0)));
    }

    #[test]
    fn test_this_skips_arrow_scopes() {
        let global = Scope::new_global(Value::from("global"));
        let method = Scope::new_function(global.clone(), Some(Value::from("receiver")), None, None);
        let arrow = Scope::new_function(method.clone(), None, None, None);
        let block = Scope::new_block(arrow.clone());

        assert_eq!(Scope::this_binding(&block), Some(Value::from("receiver")));
        assert_eq!(Scope::this_binding(&global), Some(Value::from("global")));
        assert!(Rc::ptr_eq(&Scope::variable_scope(&block), &arrow));
    }

    #[test]
    fn test_copy_block_is_independent() {
        let global = Scope::new_global(Value::Undefined);
        let block = Scope::new_block(global.clone());
        block.borrow_mut().declare("i", Value::from(0.0), true);

        let copy = Scope::copy_block(&block);
        Scope::assign(&copy, "i", Value::from(1.0));
        assert_eq!(Scope::lookup(&block, "i"), Some(Value::from(0.0)));
        assert_eq!(Scope::lookup(&copy, "i"), Some(Value::from(1.0)));
    }
}
