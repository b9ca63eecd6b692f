use std::fmt::Display;

use crate::error::EngineError;
use crate::lexer::Token;
use crate::log::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Subtract => write!(f, "-"),
            BinaryOp::Multiply => write!(f, "*"),
            BinaryOp::Divide => write!(f, "/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    NullLiteral,
    NumberLiteral(f64),
    StringLiteral(String),
    Ident(String),
    Negate(Box<Node>),
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Define {
        name: String,
        value: Box<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::NullLiteral => write!(f, "()"),
            Node::NumberLiteral(number) => write!(f, "{}", number),
            Node::StringLiteral(string) => write!(f, "'{}'", string),
            Node::Ident(name) => write!(f, "{}", name),
            Node::Negate(operand) => write!(f, "(- {})", operand),
            Node::Binary { op, left, right } => write!(f, "({} {} {})", op, left, right),
            Node::Define { name, value } => write!(f, "({} := {})", name, value),
            Node::Call { name, args } => {
                write!(f, "({}", name)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Recursive-descent parser over one request's token stream. Produces the
/// list of top-level expressions, separator-delimited.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    trace: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, trace: bool) -> Self {
        Parser {
            tokens,
            index: 0,
            trace,
        }
    }

    pub fn parse(mut self) -> Result<Vec<Node>, EngineError> {
        let mut nodes = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            let node = self.parse_expression()?;
            if self.trace {
                log_debug(&format!("parse -> {}", node));
            }
            nodes.push(node);
            match self.peek() {
                None => break,
                Some(Token::Separator) => self.skip_separators(),
                Some(token) => {
                    return Err(EngineError::syntax(format!(
                        "unexpected token '{}'",
                        token
                    )));
                }
            }
        }
        Ok(nodes)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.index + 1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn skip_separators(&mut self) {
        while let Some(Token::Separator) = self.peek() {
            self.index += 1;
        }
    }

    fn parse_expression(&mut self) -> Result<Node, EngineError> {
        if let (Some(Token::Ident(_)), Some(Token::DefineOp)) = (self.peek(), self.peek_second()) {
            let Some(Token::Ident(name)) = self.next() else {
                return Err(EngineError::new(
                    crate::error::ErrorKind::Assert,
                    "binding target vanished between peek and consume",
                ));
            };
            self.next(); // :=
            let value = self.parse_expression()?;
            return Ok(Node::Define {
                name,
                value: Box::new(value),
            });
        }
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Result<Node, EngineError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_multiplicative()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, EngineError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => BinaryOp::Multiply,
                Some(Token::Divide) => BinaryOp::Divide,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_unary()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Node, EngineError> {
        if let Some(Token::Minus) = self.peek() {
            self.next();
            let operand = self.parse_unary()?;
            return Ok(Node::Negate(Box::new(operand)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Node, EngineError> {
        match self.next() {
            Some(Token::NumberLiteral(number)) => Ok(Node::NumberLiteral(number)),
            Some(Token::StringLiteral(string)) => Ok(Node::StringLiteral(string)),
            Some(Token::Ident(name)) => {
                if let Some(Token::LeftParen) = self.peek() {
                    self.next();
                    let args = self.parse_call_args()?;
                    Ok(Node::Call { name, args })
                } else {
                    Ok(Node::Ident(name))
                }
            }
            Some(Token::LeftParen) => {
                if let Some(Token::RightParen) = self.peek() {
                    self.next();
                    return Ok(Node::NullLiteral);
                }
                let inner = self.parse_expression()?;
                self.expect_right_paren()?;
                Ok(inner)
            }
            Some(token) => Err(EngineError::syntax(format!(
                "unexpected token '{}'",
                token
            ))),
            None => Err(EngineError::syntax("unexpected end of input")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Node>, EngineError> {
        let mut args = Vec::new();
        if let Some(Token::RightParen) = self.peek() {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.next() {
                Some(Token::RightParen) => return Ok(args),
                Some(Token::Separator) => continue,
                Some(token) => {
                    return Err(EngineError::syntax(format!(
                        "expected ')' but found '{}'",
                        token
                    )));
                }
                None => return Err(EngineError::syntax("unexpected end of input, expected ')'")),
            }
        }
    }

    fn expect_right_paren(&mut self) -> Result<(), EngineError> {
        match self.next() {
            Some(Token::RightParen) => Ok(()),
            Some(token) => Err(EngineError::syntax(format!(
                "expected ')' but found '{}'",
                token
            ))),
            None => Err(EngineError::syntax("unexpected end of input, expected ')'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Result<Vec<Node>, EngineError> {
        let tokens = Lexer::new(source.chars(), false).tokenize()?;
        Parser::new(tokens, false).parse()
    }

    fn parse_one(source: &str) -> Node {
        let mut nodes = parse(source).unwrap();
        assert_eq!(nodes.len(), 1, "parsing '{}'", source);
        nodes.pop().unwrap()
    }

    #[test]
    fn parses_a_binding() {
        assert_eq!(
            parse_one("x := 1\n"),
            Node::Define {
                name: "x".to_string(),
                value: Box::new(Node::NumberLiteral(1.0)),
            }
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(parse_one("1 + 2 * 3").to_string(), "(+ 1 (* 2 3))");
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(parse_one("(1 + 2) * 3").to_string(), "(* (+ 1 2) 3)");
    }

    #[test]
    fn negation_applies_to_the_nearest_operand() {
        assert_eq!(parse_one("-1 + 2").to_string(), "(+ (- 1) 2)");
    }

    #[test]
    fn parses_calls_with_arguments() {
        assert_eq!(
            parse_one("out('hi', 1)"),
            Node::Call {
                name: "out".to_string(),
                args: vec![
                    Node::StringLiteral("hi".to_string()),
                    Node::NumberLiteral(1.0),
                ],
            }
        );
    }

    #[test]
    fn empty_parens_are_the_null_literal() {
        assert_eq!(parse_one("()"), Node::NullLiteral);
    }

    #[test]
    fn newlines_separate_top_level_expressions() {
        assert_eq!(parse("1\n2\n").unwrap().len(), 2);
    }

    #[test]
    fn unmatched_open_paren_is_a_syntax_error() {
        let err = parse("(1 + 2\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn stray_close_paren_is_a_syntax_error() {
        let err = parse("1 + 2)\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }
}
