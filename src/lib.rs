//! Front-end and JIT session for a tiny expression language: numbers,
//! variables, `+ - * <`, calls, `def` and `extern`.
//!
//! Source text is pulled through [`lexer::Lexer`], parsed one top-level
//! construct at a time by [`parser::Parser`], and handed to a
//! [`session::Session`], which generates LLVM IR for it and, in JIT mode,
//! compiles and runs it.

pub mod ast;
pub mod codegen;
pub mod driver;
pub mod jit;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod session;
