use std::{collections::VecDeque, fmt, io, io::BufRead};

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Ident(String),
    Number(f64),
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Number(value) => write!(f, "number {}", value),
            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}

lazy_static! {
    static ref IGNORE_RE: Regex = Regex::new(r"(?m)#.*$").unwrap();
    static ref TOKEN_RE: Regex = Regex::new(
        &[
            r"(?P<ident>[A-Za-z][A-Za-z0-9]*)",
            r"(?P<number>[0-9]+\.?[0-9]*|\.[0-9]+)",
            r"(?P<char>\S)",
        ]
        .join("|")
    )
    .unwrap();
}

fn preprocess(line: &str) -> std::borrow::Cow<'_, str> {
    IGNORE_RE.replace(line, "")
}

/// lex a single line of input, in source order
pub fn lex_line(line: &str) -> Vec<Token> {
    let preprocessed = preprocess(line);

    let mut res = Vec::new();
    for cap in TOKEN_RE.captures_iter(&preprocessed) {
        let token = if let Some(ident) = cap.name("ident") {
            match ident.as_str() {
                "def" => Token::Def,
                "extern" => Token::Extern,
                name => Token::Ident(name.to_string()),
            }
        } else if let Some(number) = cap.name("number") {
            // the number pattern only admits valid float syntax
            Token::Number(number.as_str().parse().expect("failed to parse number!"))
        } else if let Some(c) = cap.name("char").and_then(|c| c.as_str().chars().next()) {
            Token::Char(c)
        } else {
            continue;
        };

        res.push(token);
    }
    res
}

/// Pull-model token source with one token of lookahead.
///
/// Input is read a line at a time and only when the parser asks for a token
/// past the end of what has been buffered, so an interactive session never
/// blocks on input it does not need yet.
pub struct Lexer<'a> {
    input: Box<dyn BufRead + 'a>,
    pending: VecDeque<Token>,
    current: Option<Token>,
    exhausted: bool,
    error: Option<io::Error>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: impl BufRead + 'a) -> Self {
        Lexer {
            input: Box::new(input),
            pending: VecDeque::new(),
            current: None,
            exhausted: false,
            error: None,
        }
    }

    /// the current lookahead token, pulling one from the input if needed
    pub fn current(&mut self) -> &Token {
        if self.current.is_none() {
            self.current = Some(self.next_token());
        }
        self.current.get_or_insert(Token::Eof)
    }

    /// consume the current token and return the new lookahead
    pub fn advance(&mut self) -> &Token {
        self.current = None;
        self.current()
    }

    /// the read error that ended the token stream early, if any
    pub fn io_error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return token;
            }
            if self.exhausted {
                return Token::Eof;
            }

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => self.exhausted = true,
                Ok(_) => self.pending.extend(lex_line(&line)),
                Err(e) => {
                    self.exhausted = true;
                    self.error = Some(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ignore_works() {
        assert_eq!(preprocess("a # somebody"), "a ");
        assert_eq!(lex_line("# only a comment"), Vec::<Token>::new());
    }

    #[test]
    fn lex_works() {
        let tokenized = vec![
            Token::Def,
            Token::Ident("add".to_string()),
            Token::Char('('),
            Token::Ident("x".to_string()),
            Token::Ident("y".to_string()),
            Token::Char(')'),
            Token::Ident("x".to_string()),
            Token::Char('+'),
            Token::Number(1.5),
            Token::Char(';'),
        ];
        assert_eq!(lex_line("def add(x y) x+1.5;"), tokenized);
    }

    #[test]
    fn keywords_need_word_boundaries() {
        assert_eq!(
            lex_line("define externs"),
            vec![
                Token::Ident("define".to_string()),
                Token::Ident("externs".to_string())
            ]
        );
        assert_eq!(lex_line("extern"), vec![Token::Extern]);
    }

    #[test]
    fn numbers_and_underscores() {
        assert_eq!(
            lex_line("1. .25 42 _x"),
            vec![
                Token::Number(1.0),
                Token::Number(0.25),
                Token::Number(42.0),
                Token::Char('_'),
                Token::Ident("x".to_string()),
            ]
        );
    }

    #[test]
    fn pulls_across_lines() {
        let mut lexer = Lexer::new("foo(\n# nothing here\n\n 2)".as_bytes());
        assert_eq!(lexer.current(), &Token::Ident("foo".to_string()));
        assert_eq!(lexer.current(), &Token::Ident("foo".to_string()));
        assert_eq!(lexer.advance(), &Token::Char('('));
        assert_eq!(lexer.advance(), &Token::Number(2.0));
        assert_eq!(lexer.advance(), &Token::Char(')'));
        assert_eq!(lexer.advance(), &Token::Eof);
        assert_eq!(lexer.advance(), &Token::Eof);
        assert!(lexer.io_error().is_none());
    }
}
