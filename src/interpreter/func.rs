use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::prelude::*;
use crate::Shared;

pub trait Callable: Debug + Display {
    fn arity(&self) -> usize;
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Object],
    ) -> Result<Object, Interrupt>;
}

/// A user-declared function. The closure is the environment that was active
/// when the declaration executed, NOT when the function is called; inner
/// functions close over their parent function's frame this way.
#[derive(Debug, Clone)]
pub struct Function {
    name: Token,
    params: Vec<Token>,
    body: Vec<Rc<Stmt>>,
    closure: Shared<Environment>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        name: Token,
        params: Vec<Token>,
        body: &[Rc<Stmt>],
        closure: Shared<Environment>,
        is_initializer: bool,
    ) -> Self {
        Self { name, params, body: body.to_vec(), closure, is_initializer }
    }

    /// Produce a bound method: same declaration, but the closure gains a
    /// one-entry frame defining 'this'.
    pub fn bind(&self, this: Object) -> Rc<Function> {
        let env = Environment::new().with_enclosing(self.closure.clone()).as_shared();
        env.borrow_mut().define("this", this);

        Rc::new(Function::new(
            self.name.clone(),
            self.params.clone(),
            &self.body,
            env,
            self.is_initializer,
        ))
    }

    fn new_env_for_call(&self, arguments: &[Object]) -> Shared<Environment> {
        // Every call gets a fresh frame; a single shared frame would let
        // recursive calls clobber each other's parameters.
        let mut environment = Environment::new().with_enclosing(self.closure.clone());

        for (arg, param) in arguments.iter().zip(&self.params) {
            environment.define(param.lexeme.as_str(), arg.clone());
        }

        environment.as_shared()
    }

    fn this_from_closure(&self) -> Result<Object, Interrupt> {
        let token = Token::new(TokenType::This, "this", None, self.name.line);
        self.closure.borrow().get_at(0, &token)
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Object],
    ) -> Result<Object, Interrupt> {
        let environment = self.new_env_for_call(arguments);

        let res = interpreter.execute_block(&self.body, environment);

        // An initializer always evaluates to its instance, even on an early
        // bare 'return'. The bound closure's innermost frame holds 'this'.
        if self.is_initializer
            && matches!(res, Ok(()) | Err(Interrupt::Return { .. }))
        {
            return self.this_from_closure();
        }

        // A 'Return' interrupt means the body hit a return statement; the
        // carried value is the call's result. Falling off the end yields nil.
        match res {
            Err(Interrupt::Return { value }) => Ok(value),
            Err(other) => Err(other),
            Ok(()) => Ok(Object::Null),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}
