use std::fmt::Display;
use std::iter::Peekable;

use crate::error::EngineError;
use crate::log::log_debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    NumberLiteral(f64),
    StringLiteral(String),
    Ident(String),
    DefineOp,
    Plus,
    Minus,
    Multiply,
    Divide,
    LeftParen,
    RightParen,
    /// Newline or comma; consecutive separators collapse into one.
    Separator,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::NumberLiteral(number) => write!(f, "{}", number),
            Token::StringLiteral(string) => write!(f, "'{}'", string),
            Token::Ident(name) => write!(f, "{}", name),
            Token::DefineOp => write!(f, ":="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Multiply => write!(f, "*"),
            Token::Divide => write!(f, "/"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Separator => write!(f, "<sep>"),
        }
    }
}

/// Tokenizer over any character source. In production the source is a
/// request's input channel, so tokens are produced as characters arrive and
/// `tokenize` returns once the sending side closes the channel.
pub struct Lexer<I: Iterator<Item = char>> {
    chars: Peekable<I>,
    trace: bool,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(chars: I, trace: bool) -> Self {
        Lexer {
            chars: chars.peekable(),
            trace,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, EngineError> {
        let mut tokens: Vec<Token> = Vec::new();
        while let Some(&ch) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.chars.next();
                }
                '\n' | ',' => {
                    self.chars.next();
                    // a separator at the very start or right after another
                    // separator carries no information
                    if !matches!(tokens.last(), None | Some(Token::Separator)) {
                        self.push(&mut tokens, Token::Separator);
                    }
                }
                '`' => self.chomp_comment(),
                '0'..='9' => {
                    let token = self.chomp_number()?;
                    self.push(&mut tokens, token);
                }
                '\'' => {
                    let token = self.chomp_string()?;
                    self.push(&mut tokens, token);
                }
                _ if is_ident_start(ch) => {
                    let token = self.chomp_ident();
                    self.push(&mut tokens, token);
                }
                ':' => {
                    self.chars.next();
                    if self.chars.next_if_eq(&'=').is_none() {
                        return Err(EngineError::syntax("expected '=' after ':'"));
                    }
                    self.push(&mut tokens, Token::DefineOp);
                }
                '+' | '-' | '*' | '/' | '(' | ')' => {
                    self.chars.next();
                    let token = match ch {
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '*' => Token::Multiply,
                        '/' => Token::Divide,
                        '(' => Token::LeftParen,
                        _ => Token::RightParen,
                    };
                    self.push(&mut tokens, token);
                }
                _ => {
                    return Err(EngineError::syntax(format!(
                        "unexpected character '{}'",
                        ch
                    )));
                }
            }
        }
        // a separator after the last token carries no information either
        if let Some(Token::Separator) = tokens.last() {
            tokens.pop();
        }
        Ok(tokens)
    }

    fn push(&mut self, tokens: &mut Vec<Token>, token: Token) {
        if self.trace {
            log_debug(&format!("lex -> {}", token));
        }
        tokens.push(token);
    }

    /// Backtick comments run to the end of the line; the newline itself is
    /// left in place so it still separates expressions.
    fn chomp_comment(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn chomp_number(&mut self) -> Result<Token, EngineError> {
        let mut literal = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() || (ch == '.' && !literal.contains('.')) {
                literal.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        let number = literal
            .parse::<f64>()
            .map_err(|_| EngineError::syntax(format!("invalid number literal '{}'", literal)))?;
        Ok(Token::NumberLiteral(number))
    }

    fn chomp_string(&mut self) -> Result<Token, EngineError> {
        self.chars.next(); // opening quote
        let mut string = String::new();
        loop {
            match self.chars.next() {
                Some('\'') => return Ok(Token::StringLiteral(string)),
                Some('\\') => match self.chars.next() {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some(escaped) => string.push(escaped),
                    None => break,
                },
                Some(ch) => string.push(ch),
                None => break,
            }
        }
        Err(EngineError::syntax(
            "unexpected end of input in string literal",
        ))
    }

    fn chomp_ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(&ch) = self.chars.peek() {
            if is_ident_start(ch) || ch.is_ascii_digit() {
                name.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Ident(name)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
