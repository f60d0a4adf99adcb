use std::collections::HashMap;

use tracing::debug;

use crate::interpreter::Interpreter;
use crate::{prelude::*, SharedErrorReporter};

#[derive(Debug, Clone, PartialEq, Copy)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, PartialEq, Copy)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Static analysis pass that binds every local variable use to the scope
/// distance of its declaration, and rejects programs that misuse `this`,
/// `super`, `return`, or read a local in its own initializer.
///
/// Unlike the parser there is no synchronization to do: the resolver reports
/// each violation and keeps walking, so one pass surfaces every static error.
pub struct Resolver<'i> {
    interpreter: &'i mut Interpreter,
    // name -> "has its initializer finished" for each nested scope.
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
    had_error: bool,
    error_reporter: Option<SharedErrorReporter>,
}

impl<'i> Resolver<'i> {
    pub fn new(interpreter: &'i mut Interpreter) -> Self {
        Self {
            interpreter,
            scopes: vec![],
            current_function: FunctionType::None,
            current_class: ClassType::None,
            had_error: false,
            error_reporter: None,
        }
    }

    pub fn with_error_reporting(self, error_reporter: SharedErrorReporter) -> Self {
        Self { error_reporter: Some(error_reporter), ..self }
    }

    /// True once any static diagnostic has been emitted. Evaluation must not
    /// run in that case.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn resolve<I, R>(&mut self, statements: I)
    where
        I: IntoIterator<Item = R>,
        R: AsRef<Stmt>,
    {
        for stmt in statements {
            self.resolve_stmt(stmt.as_ref());
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                // Declare first so a use of the name inside its own
                // initializer is caught; define only afterwards.
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Function { name, params, body } => {
                // Unlike variables, functions are defined before their body
                // is resolved so they can recursively call themselves.
                self.declare(name);
                self.define(name);

                self.resolve_function(params, body, FunctionType::Function);
            }
            Stmt::Class { name, superclass, methods } => {
                self.resolve_class(name, superclass.as_ref(), methods)
            }
            Stmt::Expression { expr } => self.resolve_expr(expr),
            Stmt::Print { expr } => self.resolve_expr(expr),
            Stmt::If { condition, then_branch, else_branch } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(stmt) = else_branch {
                    self.resolve_stmt(stmt);
                }
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
        }
    }

    fn resolve_class(&mut self, name: &Token, superclass: Option<&Expr>, methods: &[Stmt]) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable { name: super_name, .. } = superclass {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            // 'super' lives in its own scope immediately enclosing the
            // 'this' scope; the evaluator relies on that d / d-1 layout.
            self.begin_scope();
            self.define_keyword("super");
        }

        self.begin_scope();
        self.define_keyword("this");

        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let declaration = if name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };
                self.resolve_function(params, body, declaration);
            }
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, params: &[Token], body: &[std::rc::Rc<Stmt>], func_type: FunctionType) {
        let enclosing_func = self.current_function;
        self.current_function = func_type;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }

        self.resolve(body);
        self.end_scope();

        self.current_function = enclosing_func;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { name, .. } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                }

                self.resolve_local(expr, name);
            }
            Expr::Assignment { name, value, .. } => {
                self.resolve_expr(value);
                self.resolve_local(expr, name);
            }
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Call { callee, arguments, .. } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }
            Expr::This { keyword, .. } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(expr, keyword);
            }
            Expr::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                    }
                    ClassType::Subclass => self.resolve_local(expr, keyword),
                }
            }
            Expr::Grouping { expr } => self.resolve_expr(expr),
            Expr::Literal { .. } => {}
            Expr::Unary { right, .. } => self.resolve_expr(right),
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            // Globals are late-bound; nothing to track.
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Define an implicit binding ('this' / 'super') in the innermost scope.
    fn define_keyword(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .expect("a scope must be open for implicit bindings")
            .insert(name.to_owned(), true);
    }

    fn resolve_local(&mut self, expr: &Expr, name: &Token) {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(&name.lexeme) {
                let depth = self.scopes.len() - 1 - i;
                let id = expr.unique_id().expect("resolved expressions carry an id");
                debug!(name = %name.lexeme, depth, "resolved local");
                self.interpreter.resolve(id, depth);
                return;
            }
        }

        // Not found in any scope: the evaluator falls back to globals.
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.had_error = true;
        if let Some(reporter) = &self.error_reporter {
            reporter.borrow_mut().token_error(token, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve_source(source: &str) -> bool {
        let mut scanner = Scanner::new(source);
        let (tokens, scan_failed) = scanner.scan_tokens();
        assert!(!scan_failed);

        let (statements, parse_failed) = Parser::new(tokens).parse();
        assert!(!parse_failed);

        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve(&statements);
        resolver.had_error()
    }

    #[test]
    fn top_level_return_is_rejected() {
        assert!(resolve_source("return 1;"));
    }

    #[test]
    fn return_inside_function_is_fine() {
        assert!(!resolve_source("fun f() { return 1; }"));
    }

    #[test]
    fn self_initializer_read_is_rejected() {
        assert!(resolve_source("var a = 1; { var a = a; }"));
    }

    #[test]
    fn shadowing_from_outer_scope_is_fine() {
        assert!(!resolve_source("var a = 1; { var b = a; }"));
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        assert!(resolve_source("fun f() { var a = 1; var a = 2; }"));
    }

    #[test]
    fn redeclaration_of_global_is_fine() {
        assert!(!resolve_source("var a = 1; var a = 2;"));
    }

    #[test]
    fn this_outside_class_is_rejected() {
        assert!(resolve_source("print this;"));
    }

    #[test]
    fn super_without_superclass_is_rejected() {
        assert!(resolve_source("class A { f() { super.f(); } }"));
    }

    #[test]
    fn super_in_subclass_is_fine() {
        assert!(!resolve_source("class A { f() {} } class B < A { f() { super.f(); } }"));
    }

    #[test]
    fn class_inheriting_from_itself_is_rejected() {
        assert!(resolve_source("class A < A {}"));
    }

    #[test]
    fn value_return_from_initializer_is_rejected() {
        assert!(resolve_source("class A { init() { return 1; } }"));
    }

    #[test]
    fn bare_return_from_initializer_is_fine() {
        assert!(!resolve_source("class A { init() { return; } }"));
    }

    #[test]
    fn all_errors_surface_in_one_pass() {
        let source = "return 1; print this;";

        let mut scanner = Scanner::new(source);
        let (tokens, _) = scanner.scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();

        let reporter = crate::new_error_reporter();
        let mut interpreter = Interpreter::new();
        let mut resolver =
            Resolver::new(&mut interpreter).with_error_reporting(reporter.clone());
        resolver.resolve(&statements);

        assert!(resolver.had_error());
        assert!(reporter.borrow().had_error);
    }
}
