use std::collections::HashMap;

use super::Interrupt;
use crate::object::Object;
use crate::token::Token;
use crate::Shared;

/// One scope frame: a map of bindings plus a link to the enclosing frame.
/// Frames form a tree rooted at the globals; closures keep interior frames
/// alive past their lexical extent, which is why they are shared.
#[derive(Debug, Default)]
pub struct Environment {
    pub enclosing: Option<Shared<Environment>>,
    values: HashMap<String, Object>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(self, enclosing: Shared<Environment>) -> Self {
        Self { enclosing: Some(enclosing), ..self }
    }

    pub fn as_shared(self) -> Shared<Self> {
        std::rc::Rc::new(std::cell::RefCell::new(self))
    }

    pub fn define(&mut self, name: &str, value: Object) {
        self.values.insert(name.to_owned(), value);
    }

    /// Assign to the nearest enclosing frame that defines `name`. Used for
    /// globals and for REPL input the resolver has not seen.
    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), Interrupt> {
        if !self.values.contains_key(&name.lexeme) {
            // Ask one level above if possible
            if let Some(ref e) = self.enclosing {
                return e.borrow_mut().assign(name, value);
            }

            return Err(undefined_variable(name));
        }

        self.values.insert(name.lexeme.clone(), value);
        Ok(())
    }

    /// Assign in exactly the frame `distance` hops up, as computed by the
    /// resolver. No fallback walking: the depth is the contract.
    pub fn assign_at(
        &mut self,
        distance: usize,
        name: &Token,
        value: Object,
    ) -> Result<(), Interrupt> {
        if distance == 0 {
            return self.assign_local(name, value);
        }

        match self.ancestor(distance) {
            Some(frame) => frame.borrow_mut().assign_local(name, value),
            None => Err(missing_frame(distance, name)),
        }
    }

    /// Look up through the whole chain. Used for globals and REPL input.
    pub fn get(&self, name: &Token) -> Result<Object, Interrupt> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        // Ask one level above if possible
        if let Some(ref e) = self.enclosing {
            return e.borrow().get(name);
        }

        Err(undefined_variable(name))
    }

    /// Read from exactly the frame `distance` hops up.
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Object, Interrupt> {
        if distance == 0 {
            return self.get_local(name);
        }

        match self.ancestor(distance) {
            Some(frame) => frame.borrow().get_local(name),
            None => Err(missing_frame(distance, name)),
        }
    }

    fn get_local(&self, name: &Token) -> Result<Object, Interrupt> {
        self.values.get(&name.lexeme).cloned().ok_or_else(|| undefined_variable(name))
    }

    fn assign_local(&mut self, name: &Token, value: Object) -> Result<(), Interrupt> {
        if !self.values.contains_key(&name.lexeme) {
            return Err(undefined_variable(name));
        }

        self.values.insert(name.lexeme.clone(), value);
        Ok(())
    }

    fn ancestor(&self, distance: usize) -> Option<Shared<Environment>> {
        let mut env = self.enclosing.clone()?;

        for _ in 1..distance {
            let parent = env.borrow().enclosing.clone()?;
            env = parent;
        }

        Some(env)
    }
}

fn undefined_variable(name: &Token) -> Interrupt {
    Interrupt::error(name.line, format!("Undefined variable '{}'.", name.lexeme))
}

fn missing_frame(distance: usize, name: &Token) -> Interrupt {
    Interrupt::error(
        name.line,
        format!("No enclosing scope at depth {} for '{}'.", distance, name.lexeme),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, None, 1)
    }

    #[test]
    fn define_then_get() {
        let mut env = Environment::new();
        env.define("a", Object::Number(1.0));
        assert_eq!(env.get(&ident("a")).unwrap(), Object::Number(1.0));
    }

    #[test]
    fn get_walks_the_chain() {
        let globals = {
            let mut env = Environment::new();
            env.define("a", Object::Number(1.0));
            env.as_shared()
        };
        let child = Environment::new().with_enclosing(globals);

        assert_eq!(child.get(&ident("a")).unwrap(), Object::Number(1.0));
    }

    #[test]
    fn get_at_reads_exactly_one_frame() {
        let globals = {
            let mut env = Environment::new();
            env.define("a", Object::String("outer".into()));
            env.as_shared()
        };
        let mut child = Environment::new().with_enclosing(globals);
        child.define("a", Object::String("inner".into()));

        assert_eq!(child.get_at(0, &ident("a")).unwrap(), Object::String("inner".into()));
        assert_eq!(child.get_at(1, &ident("a")).unwrap(), Object::String("outer".into()));
        // The depth is a contract: a wrong frame is an error, not a fallback.
        assert!(child.get_at(0, &ident("b")).is_err());
    }

    #[test]
    fn assign_to_undefined_is_an_error() {
        let mut env = Environment::new();
        assert!(env.assign(&ident("ghost"), Object::Null).is_err());
    }

    #[test]
    fn assign_at_writes_the_ancestor() {
        let globals = {
            let mut env = Environment::new();
            env.define("a", Object::Number(1.0));
            env.as_shared()
        };
        let mut child = Environment::new().with_enclosing(globals.clone());

        child.assign_at(1, &ident("a"), Object::Number(2.0)).unwrap();
        assert_eq!(globals.borrow().get(&ident("a")).unwrap(), Object::Number(2.0));
    }
}
