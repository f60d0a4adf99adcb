mod class;
mod environment;
mod error;
mod expr;
mod func;
mod native;
mod stmt;

use std::collections::HashMap;

use tracing::debug;

pub use class::{Class, Instance};
pub use environment::Environment;
pub use error::Interrupt;
pub use func::{Callable, Function};

use crate::ast::ExprId;
use crate::{Shared, SharedErrorReporter};

pub struct Interpreter {
    pub globals: Shared<Environment>,
    environment: Shared<Environment>,
    // Depth table produced by the resolver: expression id -> scope distance.
    // Expressions without an entry resolve against the globals.
    locals: HashMap<ExprId, usize>,
    error_reporter: Option<SharedErrorReporter>,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new().as_shared();
        let environment = globals.clone();

        globals.borrow_mut().define("clock", crate::object::Object::Callable(native::clock()));

        Self { globals, environment, locals: HashMap::new(), error_reporter: None }
    }

    pub fn with_error_reporting(self, error_reporter: SharedErrorReporter) -> Self {
        Self { error_reporter: Some(error_reporter), ..self }
    }

    /// Record the scope distance for a binding expression. Called by the
    /// resolver; the table is read-only afterwards.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    fn runtime_error(&self, interrupt: &Interrupt) {
        debug!(%interrupt, "runtime error");
        if let Some(reporter) = &self.error_reporter {
            reporter.borrow_mut().runtime_error(interrupt);
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
