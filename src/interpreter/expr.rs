use crate::prelude::*;

type EvalResult = Result<Object, Interrupt>;

impl Interpreter {
    pub fn evaluate_expr(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal { value } => Ok(value.clone().into()),
            Expr::Grouping { expr: inner } => self.evaluate_expr(inner),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            Expr::Logical { left, operator, right } => {
                let left_val = self.evaluate_expr(left)?;

                if operator.token_type == TokenType::Or {
                    if self.is_truthy(&left_val) {
                        return Ok(left_val);
                    }
                } else {
                    // TokenType::And
                    if !self.is_truthy(&left_val) {
                        return Ok(left_val);
                    }
                }

                self.evaluate_expr(right)
            }
            Expr::Variable { name, .. } => self.lookup_variable(name, expr),
            Expr::Assignment { name, value, .. } => {
                let value = self.evaluate_expr(value)?;

                if let Some(&distance) = expr.unique_id().and_then(|id| self.locals.get(&id)) {
                    self.environment.borrow_mut().assign_at(distance, name, value.clone())?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }

                Ok(value)
            }
            Expr::Call { callee, paren, arguments } => {
                self.evaluate_call(callee, paren, arguments)
            }
            Expr::Get { object, name } => {
                let object = self.evaluate_expr(object)?;
                if let Object::Instance(ref instance) = object {
                    instance.borrow().get(name, &object)
                } else {
                    Err(Interrupt::error(name.line, "Only instances have properties."))
                }
            }
            Expr::Set { object, name, value } => {
                let object = self.evaluate_expr(object)?;

                if let Object::Instance(instance) = object {
                    let value = self.evaluate_expr(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    Ok(value)
                } else {
                    Err(Interrupt::error(name.line, "Only instances have fields."))
                }
            }
            Expr::This { keyword, .. } => self.lookup_variable(keyword, expr),
            Expr::Super { keyword, method, .. } => self.evaluate_super(expr, keyword, method),
        }
    }

    pub(super) fn is_truthy(&self, value: &Object) -> bool {
        !matches!(value, Object::Null | Object::Boolean(false))
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> EvalResult {
        let callee = self.evaluate_expr(callee)?;

        match callee {
            Object::Callable(callable) => {
                let args = self.evaluate_arguments(arguments)?;
                self.check_arity(callable.arity(), args.len(), paren)?;

                callable.call(self, &args)
            }
            Object::Class(class) => {
                let args = self.evaluate_arguments(arguments)?;
                let arity = class.borrow().arity();
                self.check_arity(arity, args.len(), paren)?;

                Class::construct(class, &args, self).map(Object::Instance)
            }
            _ => Err(Interrupt::error(paren.line, "Can only call functions and classes.")),
        }
    }

    fn evaluate_arguments(&mut self, arguments: &[Expr]) -> Result<Vec<Object>, Interrupt> {
        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate_expr(arg)?);
        }
        Ok(args)
    }

    fn check_arity(&self, arity: usize, got: usize, paren: &Token) -> Result<(), Interrupt> {
        if arity == got {
            Ok(())
        } else {
            Err(Interrupt::error(
                paren.line,
                format!("Expected {} arguments but got {}.", arity, got),
            ))
        }
    }

    /// 'super' reads two frames the resolver laid out: the superclass at the
    /// resolved distance, and 'this' one frame below it.
    fn evaluate_super(&mut self, expr: &Expr, keyword: &Token, method: &Token) -> EvalResult {
        let distance = *expr
            .unique_id()
            .and_then(|id| self.locals.get(&id))
            .expect("'super' is always resolved");

        let superclass = match self.environment.borrow().get_at(distance, keyword)? {
            Object::Class(class) => class,
            _ => {
                return Err(Interrupt::error(keyword.line, "Superclass must be a class."));
            }
        };

        let this = Token::new(TokenType::This, "this", None, keyword.line);
        let instance = self.environment.borrow().get_at(distance - 1, &this)?;

        let method_func = superclass.borrow().find_method(&method.lexeme);
        match method_func {
            Some(method_func) => Ok(Object::Callable(method_func.bind(instance))),
            None => Err(Interrupt::error(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult {
        let value = self.evaluate_expr(right)?;
        match operator.token_type {
            TokenType::Minus => {
                if let Object::Number(n) = value {
                    Ok(Object::Number(-n))
                } else {
                    Err(Interrupt::error(operator.line, "Operand must be a number."))
                }
            }
            TokenType::Bang => Ok(Object::Boolean(!self.is_truthy(&value))),

            // Unreachable: the parser only builds the two unary forms above.
            _ => Ok(Object::Null),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left_value = self.evaluate_expr(left)?;
        let right_value = self.evaluate_expr(right)?;

        match operator.token_type {
            TokenType::Plus => {
                if let (Some(l), Some(r)) = (left_value.number(), right_value.number()) {
                    Ok(Object::Number(l + r))
                } else if let (Some(l), Some(r)) = (left_value.string(), right_value.string()) {
                    Ok(Object::String(format!("{l}{r}")))
                } else {
                    Err(Interrupt::error(
                        operator.line,
                        "Operands must be two numbers or two strings.",
                    ))
                }
            }
            TokenType::Minus => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Number(l - r)),
            TokenType::Star => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Number(l * r)),
            // Division by zero is not an error; IEEE-754 produces inf/NaN.
            TokenType::Slash => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Number(l / r)),
            TokenType::Greater => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l > r)),
            TokenType::GreaterEqual => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l >= r)),
            TokenType::Less => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l < r)),
            TokenType::LessEqual => self
                .check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l <= r)),

            TokenType::EqualEqual => Ok(Object::Boolean(left_value == right_value)),
            TokenType::BangEqual => Ok(Object::Boolean(left_value != right_value)),

            // Unreachable
            _ => Ok(Object::Null),
        }
    }

    fn check_number_operands(
        &self,
        operator: &Token,
        left: &Object,
        right: &Object,
    ) -> Result<(f64, f64), Interrupt> {
        if let (Some(l), Some(r)) = (left.number(), right.number()) {
            Ok((l, r))
        } else {
            Err(Interrupt::error(operator.line, "Operands must be numbers."))
        }
    }

    fn lookup_variable(&self, name: &Token, expr: &Expr) -> EvalResult {
        if let Some(&distance) = expr.unique_id().and_then(|id| self.locals.get(&id)) {
            self.environment.borrow().get_at(distance, name)
        } else {
            self.globals.borrow().get(name)
        }
    }
}
