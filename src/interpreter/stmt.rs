use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::prelude::*;
use crate::Shared;

impl Interpreter {
    /// Run a program. The first runtime error is reported and aborts the
    /// remaining statements.
    pub fn interpret(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            if let Err(interrupt) = self.execute(stmt) {
                self.runtime_error(&interrupt);
                break;
            }
        }
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<(), Interrupt> {
        match stmt {
            Stmt::Expression { expr } => {
                self.evaluate_expr(expr)?;
            }
            Stmt::Print { expr } => {
                let value = self.evaluate_expr(expr)?;
                println!("{value}");
            }
            Stmt::Var { name, initializer } => {
                let value = if let Some(expr) = initializer {
                    self.evaluate_expr(expr)?
                } else {
                    Object::Null
                };

                self.environment.borrow_mut().define(&name.lexeme, value);
            }
            Stmt::Block { statements } => {
                let new_env =
                    Environment::new().with_enclosing(self.environment.clone()).as_shared();

                self.execute_block(statements, new_env)?;
            }
            Stmt::If { condition, then_branch, else_branch } => {
                let condition_result = self.evaluate_expr(condition)?;

                if self.is_truthy(&condition_result) {
                    self.execute(then_branch)?;
                } else if let Some(stmt) = else_branch {
                    self.execute(stmt)?;
                }
            }
            Stmt::While { condition, body } => loop {
                let value = self.evaluate_expr(condition)?;
                if !self.is_truthy(&value) {
                    break;
                }

                self.execute(body)?;
            },
            Stmt::Function { name, params, body } => {
                // The closure is the environment active right now, at
                // declaration time; calls build their frames on top of it.
                let closure = self.environment.clone();
                let function =
                    Function::new(name.clone(), params.to_vec(), body, closure, false);
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Object::Callable(Rc::new(function)));
            }
            Stmt::Return { value, .. } => {
                let value = if let Some(expr) = value {
                    self.evaluate_expr(expr)?
                } else {
                    Object::Null
                };

                // Unwinds to the nearest function call frame; func.rs
                // consumes it there.
                return Err(Interrupt::Return { value });
            }
            Stmt::Class { name, superclass, methods } => {
                self.execute_class_decl(name, superclass.as_ref(), methods)?;
            }
        };

        Ok(())
    }

    /// Execute statements inside `environment`, restoring the previous
    /// environment on every exit path, including returns and runtime errors.
    pub fn execute_block<I, R>(
        &mut self,
        statements: I,
        environment: Shared<Environment>,
    ) -> Result<(), Interrupt>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<Stmt>,
    {
        let prev_env = self.environment.clone();
        self.environment = environment;

        for stmt in statements {
            let result = self.execute(stmt.as_ref());
            if result.is_err() {
                self.environment = prev_env;
                return result;
            }
        }

        self.environment = prev_env;
        Ok(())
    }

    fn execute_class_decl(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
    ) -> Result<(), Interrupt> {
        trace!(class = %name.lexeme, "declaring class");

        let superclass = match superclass {
            Some(expr) => match self.evaluate_expr(expr)? {
                Object::Class(class) => Some(class),
                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };
                    return Err(Interrupt::error(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Define the name first so methods can refer to their own class.
        self.environment.borrow_mut().define(&name.lexeme, Object::Null);

        // In a subclass, methods close over an extra frame holding 'super';
        // the resolver placed it immediately outside the 'this' frame.
        if let Some(ref superclass) = superclass {
            self.environment =
                Environment::new().with_enclosing(self.environment.clone()).as_shared();

            self.environment
                .borrow_mut()
                .define("super", Object::Class(superclass.clone()));
        }

        let mut method_funcs = HashMap::new();
        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let is_initializer = name.lexeme == "init";

                method_funcs.insert(
                    name.lexeme.clone(),
                    Rc::new(Function::new(
                        name.clone(),
                        params.to_vec(),
                        body,
                        self.environment.clone(),
                        is_initializer,
                    )),
                );
            }
        }

        let class =
            Rc::new(RefCell::new(Class::new(&name.lexeme, method_funcs, superclass.clone())));

        if superclass.is_some() {
            let enclosing = self
                .environment
                .borrow()
                .enclosing
                .clone()
                .expect("the 'super' frame always has a parent");
            self.environment = enclosing;
        }

        self.environment.borrow_mut().assign(name, Object::Class(class))
    }
}
