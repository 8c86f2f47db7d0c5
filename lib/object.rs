use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::FunctionLiteral,
    environment::ScopeRef,
    interpreter::{Eval, NativeContext},
    value::Value,
};

pub type ObjectRef = Rc<RefCell<JsObject>>;

pub type NativeFn = Rc<dyn Fn(&mut NativeContext) -> Eval<Value>>;

#[derive(Clone, Debug)]
pub struct Property {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable and configurable but skipped by enumeration, as builtin methods are.
    pub fn hidden(value: Value) -> Self {
        Self {
            enumerable: false,
            ..Self::new(value)
        }
    }
}

/// A function defined in script, with the scope it closes over.
#[derive(Clone)]
pub struct Closure {
    pub function: Rc<FunctionLiteral>,
    pub scope: ScopeRef,
    /// The object whose prototype `super.x` resolves against.
    pub home_object: Option<ObjectRef>,
    pub is_class_constructor: bool,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub function: NativeFn,
    pub is_constructor: bool,
}

#[derive(Clone)]
pub struct BoundFunction {
    pub target: ObjectRef,
    pub this: Value,
    pub arguments: Vec<Value>,
}

#[derive(Clone)]
pub struct RegExpData {
    pub regex: regex::Regex,
    pub source: String,
    pub flags: String,
}

impl RegExpData {
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Closure),
    Native(NativeFunction),
    Bound(BoundFunction),
    String(String),
    Number(f64),
    Boolean(bool),
    Error,
    RegExp(RegExpData),
}

pub struct JsObject {
    pub kind: ObjectKind,
    pub properties: IndexMap<String, Property>,
    pub prototype: Option<ObjectRef>,
    pub extensible: bool,
}

/// Largest length an array may report.
pub const MAX_ARRAY_LENGTH: f64 = 4294967295.0;

/// Arrays keep their elements densely, so lengths above this are refused.
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

/// Canonical array index form: digits without leading zeros, below 2^32 - 1. Larger keys
/// are ordinary named properties.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>()
        .ok()
        .filter(|index| *index != u32::MAX)
        .map(|index| index as usize)
}

impl JsObject {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
            prototype,
            extensible: true,
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ObjectKind::Error)
    }

    pub fn function_name(&self) -> Option<String> {
        if !self.is_callable() {
            return None;
        }
        match self.properties.get("name") {
            Some(Property {
                value: Value::String(name),
                ..
            }) => Some(name.clone()),
            _ => None,
        }
    }

    /// Own property lookup, including the virtual index and `length` keys of arrays and
    /// string wrappers.
    pub fn get_own_property(&self, key: &str) -> Option<Value> {
        match &self.kind {
            ObjectKind::Array(elements) => {
                if key == "length" {
                    return Some(Value::from(elements.len()));
                }
                if let Some(value) = array_index(key).and_then(|index| elements.get(index)) {
                    return Some(value.clone());
                }
            }
            ObjectKind::String(value) => {
                if key == "length" {
                    return Some(Value::from(value.chars().count()));
                }
                if let Some(index) = array_index(key) {
                    return value.chars().nth(index).map(|char| Value::from(char.to_string()));
                }
            }
            _ => {}
        }
        self.properties
            .get(key)
            .map(|property| property.value.clone())
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Reads `key`, walking the prototype chain. The first object that owns the key wins.
    pub fn get(object: &JsObject, key: &str) -> Value {
        if let Some(value) = object.get_own_property(key) {
            return value;
        }
        let mut current = object.prototype.clone();
        while let Some(prototype) = current {
            let prototype = prototype.borrow();
            if let Some(value) = prototype.get_own_property(key) {
                return value;
            }
            current = prototype.prototype.clone();
        }
        Value::Undefined
    }

    pub fn has_property(object: &JsObject, key: &str) -> bool {
        object.has_own_property(key)
            || object
                .prototype_chain()
                .iter()
                .any(|prototype| prototype.borrow().has_own_property(key))
    }

    /// Writes an own property. Returns false when the write is refused (read-only property or
    /// non-extensible object).
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        let extensible = self.extensible;
        match &mut self.kind {
            ObjectKind::Array(elements) => {
                if key == "length" {
                    if !extensible {
                        return false;
                    }
                    if let Value::Number(length) = value {
                        if length >= 0.0
                            && length.fract() == 0.0
                            && length <= MAX_DENSE_LENGTH as f64
                        {
                            elements.resize(length as usize, Value::Undefined);
                            return true;
                        }
                    }
                    return false;
                }
                if let Some(index) = array_index(key) {
                    if !extensible || index >= MAX_DENSE_LENGTH {
                        return false;
                    }
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                    return true;
                }
            }
            ObjectKind::String(string) => {
                let length = string.chars().count();
                if key == "length" || array_index(key).is_some_and(|index| index < length) {
                    return false;
                }
            }
            _ => {}
        }

        match self.properties.get_mut(key) {
            Some(property) if property.writable => {
                property.value = value;
                true
            }
            Some(_) => false,
            None if extensible => {
                self.properties.insert(key.to_string(), Property::new(value));
                true
            }
            None => false,
        }
    }

    pub fn define_property(&mut self, key: &str, property: Property) {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Some(index) = array_index(key).filter(|index| *index < MAX_DENSE_LENGTH) {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = property.value;
                return;
            }
        }
        self.properties.insert(key.to_string(), property);
    }

    /// Returns false for non-configurable properties, which are left in place.
    pub fn delete(&mut self, key: &str) -> bool {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if key == "length" {
                return false;
            }
            if let Some(index) = array_index(key) {
                if let Some(element) = elements.get_mut(index) {
                    *element = Value::Undefined;
                }
                return true;
            }
        }
        match self.properties.get(key) {
            Some(property) if !property.configurable => false,
            Some(_) => {
                self.properties.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Own enumerable keys: indices ascending, then named properties in insertion order.
    pub fn enumerable_keys(&self) -> Vec<String> {
        self.keys(false)
    }

    /// Every own key, enumerable or not.
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys = self.keys(true);
        match &self.kind {
            ObjectKind::Array(_) | ObjectKind::String(_) => keys.push("length".to_string()),
            _ => {}
        }
        keys
    }

    fn keys(&self, include_hidden: bool) -> Vec<String> {
        let mut keys: Vec<String> = match &self.kind {
            ObjectKind::Array(elements) => (0..elements.len()).map(|i| i.to_string()).collect(),
            ObjectKind::String(value) => (0..value.chars().count()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };

        let mut indexed: Vec<(usize, &String)> = Vec::new();
        let mut named: Vec<&String> = Vec::new();
        for (key, property) in self.properties.iter() {
            if !include_hidden && !property.enumerable {
                continue;
            }
            match array_index(key) {
                Some(index) => indexed.push((index, key)),
                None => named.push(key),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        keys.extend(indexed.into_iter().map(|(_, key)| key.clone()));
        keys.extend(named.into_iter().cloned());
        keys
    }

    /// The prototypes above this object, nearest first.
    pub fn prototype_chain(&self) -> Vec<ObjectRef> {
        let mut chain = Vec::new();
        let mut current = self.prototype.clone();
        while let Some(prototype) = current {
            current = prototype.borrow().prototype.clone();
            chain.push(prototype);
        }
        chain
    }

    pub fn freeze(&mut self) {
        self.extensible = false;
        for property in self.properties.values_mut() {
            property.writable = false;
            property.configurable = false;
        }
    }

    pub fn array_elements(&self) -> Option<&Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn array_elements_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match &self.kind {
            ObjectKind::Ordinary => "Ordinary",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Native(_) => "Native",
            ObjectKind::Bound(_) => "Bound",
            ObjectKind::String(_) => "String",
            ObjectKind::Number(_) => "Number",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Error => "Error",
            ObjectKind::RegExp(_) => "RegExp",
        };
        f.debug_struct("JsObject")
            .field("kind", &kind)
            .field("keys", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordinary(prototype: Option<ObjectRef>) -> ObjectRef {
        JsObject::new(ObjectKind::Ordinary, prototype).into_ref()
    }

    #[test]
    fn test_prototype_lookup_and_shadowing() {
        let parent = ordinary(None);
        parent.borrow_mut().set("greeting", Value::from("hello"));
        let child = ordinary(Some(parent.clone()));

        assert_eq!(JsObject::get(&child.borrow(), "greeting"), Value::from("hello"));
        assert_eq!(JsObject::get(&child.borrow(), "missing"), Value::Undefined);

        child.borrow_mut().set("greeting", Value::from("hi"));
        assert_eq!(JsObject::get(&child.borrow(), "greeting"), Value::from("hi"));
        assert_eq!(JsObject::get(&parent.borrow(), "greeting"), Value::from("hello"));
        assert_eq!(child.borrow().prototype_chain().len(), 1);
    }

    #[test]
    fn test_array_magic_keys() {
        let array = JsObject::new(
            ObjectKind::Array(vec![Value::from(1.0), Value::from(2.0)]),
            None,
        )
        .into_ref();

        assert_eq!(array.borrow().get_own_property("length"), Some(Value::from(2.0)));
        assert_eq!(array.borrow().get_own_property("1"), Some(Value::from(2.0)));
        assert_eq!(array.borrow().get_own_property("01"), None);

        array.borrow_mut().set("4", Value::from("x"));
        assert_eq!(array.borrow().get_own_property("length"), Some(Value::from(5.0)));
        assert_eq!(array.borrow().get_own_property("3"), Some(Value::Undefined));

        array.borrow_mut().set("length", Value::from(1.0));
        assert_eq!(array.borrow().array_elements().map(Vec::len), Some(1));
        assert!(!array.borrow_mut().set("length", Value::from(-1.0)));
        assert!(!array.borrow_mut().set("length", Value::from(MAX_ARRAY_LENGTH)));
        assert!(!array.borrow_mut().set("16777216", Value::from(true)));
        assert_eq!(array.borrow().array_elements().map(Vec::len), Some(1));
        assert!(!array.borrow_mut().delete("length"));
    }

    #[test]
    fn test_array_index_range() {
        let tests = vec![
            ("0", Some(0)),
            ("4294967294", Some(4294967294)),
            ("4294967295", None),
            ("99999999999999999999", None),
            ("007", None),
            ("-1", None),
            ("1.5", None),
        ];
        for (key, expected) in tests {
            assert_eq!(array_index(key), expected, "{}", key);
        }

        let array = JsObject::new(ObjectKind::Array(Vec::new()), None).into_ref();
        assert!(array.borrow_mut().set("4294967295", Value::from("named")));
        assert_eq!(array.borrow().get_own_property("length"), Some(Value::from(0.0)));
        assert_eq!(
            array.borrow().get_own_property("4294967295"),
            Some(Value::from("named"))
        );
    }

    #[test]
    fn test_key_order() {
        let object = ordinary(None);
        {
            let mut object = object.borrow_mut();
            object.set("b", Value::Null);
            object.set("10", Value::Null);
            object.set("a", Value::Null);
            object.set("2", Value::Null);
            object.define_property("hidden", Property::hidden(Value::Null));
        }
        assert_eq!(object.borrow().enumerable_keys(), vec!["2", "10", "b", "a"]);
        assert_eq!(object.borrow().own_keys().len(), 5);

        assert!(object.borrow_mut().delete("b"));
        assert_eq!(object.borrow().enumerable_keys(), vec!["2", "10", "a"]);
    }

    #[test]
    fn test_freeze() {
        let object = ordinary(None);
        object.borrow_mut().set("a", Value::from(1.0));
        object.borrow_mut().freeze();

        assert!(!object.borrow_mut().set("a", Value::from(2.0)));
        assert!(!object.borrow_mut().set("b", Value::from(2.0)));
        assert!(!object.borrow_mut().delete("a"));
        assert_eq!(object.borrow().get_own_property("a"), Some(Value::from(1.0)));
    }

    #[test]
    fn test_string_wrapper_keys() {
        let wrapper = JsObject::new(ObjectKind::String("héllo".to_string()), None);
        assert_eq!(wrapper.get_own_property("length"), Some(Value::from(5.0)));
        assert_eq!(wrapper.get_own_property("1"), Some(Value::from("é")));
        assert_eq!(wrapper.enumerable_keys(), vec!["0", "1", "2", "3", "4"]);
    }
}
