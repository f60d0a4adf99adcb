use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Class {
    name: String,
    methods: HashMap<String, Rc<Function>>,
    superclass: Option<Rc<RefCell<Self>>>,
}

impl Class {
    pub fn new(
        name: impl AsRef<str>,
        methods: HashMap<String, Rc<Function>>,
        superclass: Option<Rc<RefCell<Self>>>,
    ) -> Self {
        Self { name: name.as_ref().to_owned(), methods, superclass }
    }

    /// Calling a class builds an instance and runs 'init' on it when the
    /// class (or an ancestor) declares one.
    pub fn construct(
        class: Rc<RefCell<Class>>,
        arguments: &[Object],
        interpreter: &mut Interpreter,
    ) -> Result<Rc<RefCell<Instance>>, Interrupt> {
        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));

        let initializer = class.borrow().find_method("init");
        if let Some(initializer) = initializer {
            initializer.bind(Object::Instance(instance.clone())).call(interpreter, arguments)?;
        }

        Ok(instance)
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        if let Some(superclass) = &self.superclass {
            return superclass.borrow().find_method(name);
        }

        None
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |initializer| initializer.arity())
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    class: Rc<RefCell<Class>>,
    fields: HashMap<String, Object>,
}

impl Instance {
    pub fn new(class: Rc<RefCell<Class>>) -> Self {
        Self { class, fields: HashMap::new() }
    }

    /// Fields shadow methods. A method lookup binds 'this' to the instance,
    /// so the returned callable can outlive the property access.
    pub fn get(&self, field: &Token, instance: &Object) -> Result<Object, Interrupt> {
        if let Some(object) = self.fields.get(&field.lexeme) {
            return Ok(object.clone());
        }

        if let Some(method) = self.class.borrow().find_method(&field.lexeme) {
            return Ok(Object::Callable(method.bind(instance.clone())));
        }

        Err(Interrupt::error(
            field.line,
            format!("Undefined property '{}'.", field.lexeme),
        ))
    }

    /// Writes always create or overwrite a field, never a method.
    pub fn set(&mut self, field: &Token, value: Object) {
        self.fields.insert(field.lexeme.clone(), value);
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} instance", self.class.borrow())
    }
}
