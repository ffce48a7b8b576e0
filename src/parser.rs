use std::collections::HashMap;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{Lexer, Token};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("expected {expected}, found {found}")]
    Expected { expected: &'static str, found: Token },
    #[error("unknown token {0} when expecting an expression")]
    UnknownToken(Token),
}

pub type PartialParseResult = Result<Expression, ParserError>;

fn expected(expected: &'static str, found: &Token) -> ParserError {
    ParserError::Expected {
        expected,
        found: found.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct Parser {
    pub operator_precedence: HashMap<char, i32>,
}

impl std::default::Default for Parser {
    fn default() -> Self {
        let mut operator_precedence = HashMap::new();
        operator_precedence.insert('<', 10);
        operator_precedence.insert('+', 20);
        operator_precedence.insert('-', 20);
        operator_precedence.insert('*', 40);
        Self {
            operator_precedence,
        }
    }
}

impl Parser {
    /// register an extra binary operator; higher binds tighter
    pub fn with_operator(mut self, op: char, precedence: i32) -> Self {
        self.operator_precedence.insert(op, precedence);
        self
    }

    /// precedence of the token as a binary operator, -1 if it is not one
    fn token_precedence(&self, token: &Token) -> i32 {
        match token {
            Token::Char(op) => self.operator_precedence.get(op).copied().unwrap_or(-1),
            _ => -1,
        }
    }

    fn parse_number(&self, input: &mut Lexer) -> PartialParseResult {
        if let Token::Number(value) = *input.current() {
            input.advance();
            Ok(Expression::Number(value))
        } else {
            Err(expected("a number", input.current()))
        }
    }

    /// parenexpr ::= '(' expression ')'
    fn parse_paren_expr(&self, input: &mut Lexer) -> PartialParseResult {
        if input.current() != &Token::Char('(') {
            return Err(expected("'('", input.current()));
        }
        input.advance();
        let res = self.parse_expression(input)?;
        if input.current() != &Token::Char(')') {
            return Err(expected("')'", input.current()));
        }
        input.advance();
        Ok(res)
    }

    /// identifierexpr ::= identifier | identifier '(' (expression (',' expression)*)? ')'
    fn parse_identifier_expr(&self, input: &mut Lexer) -> PartialParseResult {
        let name = match input.current() {
            Token::Ident(name) => name.clone(),
            other => return Err(expected("an identifier", other)),
        };

        if input.advance() != &Token::Char('(') {
            return Ok(Expression::Variable(name));
        }
        input.advance();

        let mut args = Vec::new();
        if input.current() != &Token::Char(')') {
            loop {
                args.push(self.parse_expression(input)?);

                match input.current() {
                    Token::Char(')') => break,
                    Token::Char(',') => {
                        input.advance();
                    }
                    other => return Err(expected("')' or ',' in argument list", other)),
                }
            }
        }
        input.advance();

        Ok(Expression::Call(name, args))
    }

    fn parse_primary(&self, input: &mut Lexer) -> PartialParseResult {
        match input.current() {
            Token::Number(_) => self.parse_number(input),
            Token::Ident(_) => self.parse_identifier_expr(input),
            Token::Char('(') => self.parse_paren_expr(input),
            other => Err(ParserError::UnknownToken(other.clone())),
        }
    }

    /// binoprhs ::= (binop primary)*
    ///
    /// Only operators binding at least as tightly as `expr_precedence` are
    /// consumed. Equal precedence folds into `lhs` straight away, giving left
    /// associativity.
    fn parse_bin_op_rhs(
        &self,
        input: &mut Lexer,
        expr_precedence: i32,
        lhs: Expression,
    ) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let precedence = self.token_precedence(input.current());
            if precedence < expr_precedence {
                return Ok(result);
            }

            let operator = match input.current() {
                Token::Char(op) => *op,
                _ => return Ok(result),
            };
            input.advance();

            let mut rhs = self.parse_primary(input)?;

            let next_precedence = self.token_precedence(input.current());
            if precedence < next_precedence {
                rhs = self.parse_bin_op_rhs(input, precedence + 1, rhs)?;
            }

            result = Expression::Binary(operator, Box::new(result), Box::new(rhs));
        }
    }

    /// expression ::= primary binoprhs
    pub fn parse_expression(&self, input: &mut Lexer) -> PartialParseResult {
        let lhs = self.parse_primary(input)?;
        self.parse_bin_op_rhs(input, 0, lhs)
    }

    /// prototype ::= identifier '(' identifier* ')'
    pub fn parse_prototype(&self, input: &mut Lexer) -> Result<Prototype, ParserError> {
        let name = match input.current() {
            Token::Ident(name) => name.clone(),
            other => return Err(expected("function name in prototype", other)),
        };

        if input.advance() != &Token::Char('(') {
            return Err(expected("'(' in prototype", input.current()));
        }

        let mut args = Vec::new();
        while let Token::Ident(arg) = input.advance() {
            args.push(arg.clone());
        }

        if input.current() != &Token::Char(')') {
            return Err(expected("')' in prototype", input.current()));
        }
        input.advance();

        Ok(Prototype { name, args })
    }

    /// definition ::= 'def' prototype expression
    pub fn parse_definition(&self, input: &mut Lexer) -> Result<Function, ParserError> {
        if input.current() != &Token::Def {
            return Err(expected("'def'", input.current()));
        }
        input.advance();
        let prototype = self.parse_prototype(input)?;
        let body = self.parse_expression(input)?;
        Ok(Function { prototype, body })
    }

    /// external ::= 'extern' prototype
    pub fn parse_extern(&self, input: &mut Lexer) -> Result<Prototype, ParserError> {
        if input.current() != &Token::Extern {
            return Err(expected("'extern'", input.current()));
        }
        input.advance();
        self.parse_prototype(input)
    }

    /// toplevelexpr ::= expression
    pub fn parse_top_level_expr(&self, input: &mut Lexer) -> Result<Function, ParserError> {
        let body = self.parse_expression(input)?;
        Ok(Function::anonymous(body))
    }

    /// top ::= definition | external | expression
    pub fn parse_item(&self, input: &mut Lexer) -> Result<ASTNode, ParserError> {
        match input.current() {
            Token::Def => self.parse_definition(input).map(ASTNode::Definition),
            Token::Extern => self.parse_extern(input).map(ASTNode::Extern),
            _ => self.parse_top_level_expr(input).map(ASTNode::Expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ANON_FN_NAME;
    use pretty_assertions::assert_eq;

    fn binary(op: char, lhs: Expression, rhs: Expression) -> Expression {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    fn var(name: &str) -> Expression {
        Expression::Variable(name.to_string())
    }

    fn parse_expr(source: &str) -> PartialParseResult {
        let mut tokens = Lexer::new(source.as_bytes());
        Parser::default().parse_expression(&mut tokens)
    }

    #[test]
    fn parse_expr_works() {
        let res = parse_expr("x + 1 * (2 - 3)").unwrap();
        let target = binary(
            '+',
            var("x"),
            binary(
                '*',
                Expression::Number(1.0),
                binary('-', Expression::Number(2.0), Expression::Number(3.0)),
            ),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn multiplication_binds_tighter() {
        let target = binary(
            '+',
            Expression::Number(1.0),
            binary('*', Expression::Number(2.0), Expression::Number(3.0)),
        );
        assert_eq!(parse_expr("1+2*3").unwrap(), target);
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        let target = binary(
            '+',
            binary('-', var("a"), var("b")),
            var("c"),
        );
        assert_eq!(parse_expr("a - b + c").unwrap(), target);
    }

    #[test]
    fn comparison_binds_loosest() {
        let target = binary(
            '<',
            binary('+', var("a"), Expression::Number(1.0)),
            binary('*', var("b"), Expression::Number(2.0)),
        );
        assert_eq!(parse_expr("a + 1 < b * 2").unwrap(), target);
    }

    #[test]
    fn unknown_operator_ends_expression() {
        let mut tokens = Lexer::new("1 + 2 ; 3".as_bytes());
        let res = Parser::default().parse_expression(&mut tokens).unwrap();
        assert_eq!(
            res,
            binary('+', Expression::Number(1.0), Expression::Number(2.0))
        );
        assert_eq!(tokens.current(), &Token::Char(';'));
    }

    #[test]
    fn operator_table_is_extendable() {
        let parser = Parser::default().with_operator('/', 40);
        let mut tokens = Lexer::new("a / b - c".as_bytes());
        let target = binary('-', binary('/', var("a"), var("b")), var("c"));
        assert_eq!(parser.parse_expression(&mut tokens).unwrap(), target);
    }

    #[test]
    fn parses_calls() {
        let target = Expression::Call(
            "foo".to_string(),
            vec![
                Expression::Number(1.0),
                binary('+', var("x"), Expression::Number(2.0)),
                Expression::Call("bar".to_string(), vec![]),
            ],
        );
        assert_eq!(parse_expr("foo(1, x + 2, bar())").unwrap(), target);
    }

    #[test]
    fn reports_missing_paren() {
        assert_eq!(
            parse_expr("(1 + 2"),
            Err(ParserError::Expected {
                expected: "')'",
                found: Token::Eof
            })
        );
        assert_eq!(
            parse_expr("foo(1 2)"),
            Err(ParserError::Expected {
                expected: "')' or ',' in argument list",
                found: Token::Number(2.0)
            })
        );
    }

    #[test]
    fn reports_unknown_primary() {
        assert_eq!(
            parse_expr("* 2"),
            Err(ParserError::UnknownToken(Token::Char('*')))
        );
    }

    #[test]
    fn parses_definition() {
        let mut tokens = Lexer::new("def add(x y) x + y".as_bytes());
        let target = ASTNode::Definition(Function {
            prototype: Prototype::new("add", vec!["x".to_string(), "y".to_string()]),
            body: binary('+', var("x"), var("y")),
        });
        assert_eq!(Parser::default().parse_item(&mut tokens).unwrap(), target);
        assert_eq!(tokens.current(), &Token::Eof);
    }

    #[test]
    fn parses_extern() {
        let mut tokens = Lexer::new("extern sin(a)".as_bytes());
        let target = ASTNode::Extern(Prototype::new("sin", vec!["a".to_string()]));
        assert_eq!(Parser::default().parse_item(&mut tokens).unwrap(), target);
    }

    #[test]
    fn prototype_args_are_not_comma_separated() {
        let mut tokens = Lexer::new("extern f(a, b)".as_bytes());
        assert_eq!(
            Parser::default().parse_item(&mut tokens),
            Err(ParserError::Expected {
                expected: "')' in prototype",
                found: Token::Char(',')
            })
        );
    }

    #[test]
    fn prototype_needs_a_name() {
        let mut tokens = Lexer::new("def (x) x".as_bytes());
        assert_eq!(
            Parser::default().parse_item(&mut tokens),
            Err(ParserError::Expected {
                expected: "function name in prototype",
                found: Token::Char('(')
            })
        );
    }

    #[test]
    fn wraps_top_level_expression() {
        let mut tokens = Lexer::new("4 * 2".as_bytes());
        match Parser::default().parse_item(&mut tokens).unwrap() {
            ASTNode::Expression(function) => {
                assert_eq!(function.prototype.name, ANON_FN_NAME);
                assert!(function.prototype.args.is_empty());
                assert_eq!(
                    function.body,
                    binary('*', Expression::Number(4.0), Expression::Number(2.0))
                );
            }
            other => panic!("expected a top-level expression, got {:?}", other),
        }
    }
}
