mod ast;
mod interpreter;
mod object;
mod parser;
mod printer;
mod resolver;
mod scanner;
mod token;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::interpreter::*;
    pub use crate::object::*;
    pub use crate::parser::*;
    pub use crate::printer::*;
    pub use crate::resolver::*;
    pub use crate::scanner::*;
    pub use crate::token::*;
}

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use tracing::debug;

use prelude::{Interpreter, Interrupt, Parser, Resolver, Scanner, Stmt, Token, TokenType};

pub type Shared<T> = Rc<RefCell<T>>;

/// The single diagnostics sink shared by every phase. Scanner, parser and
/// resolver report static errors here; the evaluator reports runtime errors.
/// The flags feed the process exit code.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    pub had_error: bool,
    pub had_runtime_error: bool,
}

pub type SharedErrorReporter = Shared<ErrorReporter>;

pub fn new_error_reporter() -> SharedErrorReporter {
    Rc::new(RefCell::new(ErrorReporter::default()))
}

impl ErrorReporter {
    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    pub fn token_error(&mut self, token: &Token, message: &str) {
        if token.token_type == TokenType::EOF {
            self.report(token.line, " at end", message);
        } else {
            self.report(token.line, &format!(" at '{}'", token.lexeme), message);
        }
    }

    pub fn runtime_error(&mut self, interrupt: &Interrupt) {
        eprintln!("{interrupt}");
        self.had_runtime_error = true;
    }

    fn report(&mut self, line: u32, location: &str, message: &str) {
        eprintln!("[line {line}] Error{location}: {message}");
        self.had_error = true;
    }

    fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

pub struct Silt {
    interpreter: Interpreter,
    error_reporter: SharedErrorReporter,
}

impl Silt {
    pub fn new() -> Self {
        let error_reporter = new_error_reporter();
        let interpreter = Interpreter::new().with_error_reporting(error_reporter.clone());

        Self { interpreter, error_reporter }
    }

    pub fn had_error(&self) -> bool {
        self.error_reporter.borrow().had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.error_reporter.borrow().had_runtime_error
    }

    pub fn run_file(&mut self, path: &Path) -> Result<(), anyhow::Error> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.run(&source);
        Ok(())
    }

    pub fn run_prompt(&mut self) -> Result<(), anyhow::Error> {
        let stdin = std::io::stdin();

        loop {
            print!("> ");
            std::io::stdout().flush().context("failed to flush stdout")?;

            let mut line = String::new();
            let n = stdin.read_line(&mut line)?;
            if n == 0 {
                return Ok(());
            }

            // One bad line must not poison the session.
            self.error_reporter.borrow_mut().reset();
            self.run_line(line.trim_end());
        }
    }

    /// Scan, parse, resolve and interpret a whole program.
    pub fn run(&mut self, source: &str) {
        if let Some(statements) = self.front_end(source) {
            self.interpreter.interpret(&statements);
        }
    }

    /// REPL variant of [`run`](Self::run): a lone expression statement
    /// echoes its value instead of discarding it.
    fn run_line(&mut self, source: &str) {
        let Some(statements) = self.front_end(source) else {
            return;
        };

        if let [Stmt::Expression { expr }] = statements.as_slice() {
            match self.interpreter.evaluate_expr(expr) {
                Ok(value) => println!("{value}"),
                Err(interrupt) => self.error_reporter.borrow_mut().runtime_error(&interrupt),
            }
            return;
        }

        self.interpreter.interpret(&statements);
    }

    /// The static phases. Returns the resolved statements, or None when any
    /// phase reported a diagnostic; evaluation must not run in that case.
    fn front_end(&mut self, source: &str) -> Option<Vec<Stmt>> {
        let mut scanner =
            Scanner::new(source).with_error_reporting(self.error_reporter.clone());
        let (tokens, scan_failed) = scanner.scan_tokens();

        let mut parser =
            Parser::new(tokens).with_error_reporting(self.error_reporter.clone());
        let (statements, parse_failed) = parser.parse();

        if scan_failed || parse_failed {
            debug!(scan_failed, parse_failed, "skipping evaluation");
            return None;
        }

        let mut resolver = Resolver::new(&mut self.interpreter)
            .with_error_reporting(self.error_reporter.clone());
        resolver.resolve(&statements);

        if resolver.had_error() {
            debug!("resolution failed, skipping evaluation");
            return None;
        }

        Some(statements)
    }
}

impl Default for Silt {
    fn default() -> Self {
        Self::new()
    }
}
