use std::{fmt, io, io::Write};

use crate::lexer::{Lexer, Token};
use crate::parser::Parser;
use crate::session::{Mode, Outcome, Session};

/// The read-eval-print loop.
///
/// Results go to `out`; the prompt and diagnostics go to `diag`.
pub struct Repl<'ctx, O, D> {
    parser: Parser,
    session: Session<'ctx>,
    out: O,
    diag: D,
    interactive: bool,
    errors: usize,
}

impl<'ctx, O: Write, D: Write> Repl<'ctx, O, D> {
    pub fn new(parser: Parser, session: Session<'ctx>, out: O, diag: D) -> Self {
        Repl {
            parser,
            session,
            out,
            diag,
            interactive: false,
            errors: 0,
        }
    }

    /// print a `ready> ` prompt before every construct
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// number of constructs rejected so far
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// top ::= definition | external | expression | ';'
    pub fn run(&mut self, input: &mut Lexer) -> io::Result<()> {
        loop {
            if self.interactive {
                write!(self.diag, "ready> ")?;
                self.diag.flush()?;
            }

            match input.current() {
                Token::Eof => break,
                Token::Char(';') => {
                    input.advance();
                }
                _ => self.handle_item(input)?,
            }
        }

        if self.session.config().mode == Mode::Ir {
            write!(self.out, "{}", self.session.unit_ir())?;
        }
        self.out.flush()
    }

    fn handle_item(&mut self, input: &mut Lexer) -> io::Result<()> {
        let node = match self.parser.parse_item(input) {
            Ok(node) => node,
            Err(e) => {
                self.report_error(&e)?;
                // skip a token so the loop makes progress
                input.advance();
                return Ok(());
            }
        };

        match self.session.handle(&node) {
            Ok(outcome) => self.report(outcome),
            Err(e) => self.report_error(&e),
        }
    }

    fn report(&mut self, outcome: Outcome) -> io::Result<()> {
        match outcome {
            Outcome::Parsed(kind) => writeln!(self.out, "Parsed {}.", kind),
            Outcome::Definition(ir) => write!(self.out, "Read function definition:\n{}", ir),
            Outcome::Extern(ir) => write!(self.out, "Read extern:\n{}", ir),
            Outcome::Expression(ir) => write!(self.out, "Read top-level expression:\n{}", ir),
            Outcome::Evaluated(value) => writeln!(self.out, "Evaluated to {}", value),
        }
    }

    fn report_error(&mut self, error: &dyn fmt::Display) -> io::Result<()> {
        self.errors += 1;
        writeln!(self.diag, "Error: {}", error)
    }
}
