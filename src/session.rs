use std::{fmt, str::FromStr};

use inkwell::{builder::Builder, context::Context, module::Module, values::AnyValue};

use crate::ast::{ASTNode, Function, Prototype};
use crate::codegen::{Codegen, CodegenError, Unit};
use crate::jit::{Jit, JitError};
use crate::registry::PrototypeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// only parse, report what kind of construct was read
    Parse,
    /// generate everything into one unit and print the IR
    Ir,
    /// generate, hand off and evaluate
    Jit,
}

impl Mode {
    pub const NAMES: [&'static str; 3] = ["parse", "ir", "jit"];
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parse" => Ok(Mode::Parse),
            "ir" => Ok(Mode::Ir),
            "jit" => Ok(Mode::Jit),
            other => Err(format!("unknown mode {}", other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Parse => "parse",
            Mode::Ir => "ir",
            Mode::Jit => "jit",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: Mode,
    pub optimize: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            mode: Mode::Jit,
            optimize: true,
        }
    }
}

/// What handling one top-level construct produced.
#[derive(Debug, PartialEq, Clone)]
pub enum Outcome {
    Parsed(&'static str),
    Definition(String),
    Extern(String),
    Expression(String),
    Evaluated(f64),
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error(transparent)]
    Jit(#[from] JitError),
}

/// Drives the unit lifecycle of a session.
///
/// Exactly one unit is open for writing. In JIT mode every successful
/// definition or extern closes it and hands it to the execution engine, and
/// every top-level expression closes it, runs it and throws it away. The
/// prototype registry is the only state carried from one unit to the next.
pub struct Session<'ctx> {
    context: &'ctx Context,
    config: SessionConfig,
    builder: Builder<'ctx>,
    prototypes: PrototypeRegistry,
    unit: Unit<'ctx>,
    jit: Option<Jit<'ctx>>,
    opened: usize,
}

impl<'ctx> Session<'ctx> {
    pub fn new(context: &'ctx Context, config: SessionConfig) -> Result<Session<'ctx>, SessionError> {
        let jit = match config.mode {
            Mode::Jit => Some(Jit::new(context)?),
            Mode::Parse | Mode::Ir => None,
        };

        Ok(Session {
            context,
            config,
            builder: context.create_builder(),
            prototypes: PrototypeRegistry::new(),
            unit: Unit::new(context, "unit0", config.optimize),
            jit,
            opened: 0,
        })
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn prototypes(&self) -> &PrototypeRegistry {
        &self.prototypes
    }

    /// IR of everything in the currently open unit
    pub fn unit_ir(&self) -> String {
        self.unit
            .module
            .print_to_string()
            .to_string_lossy()
            .into_owned()
    }

    /// look a name up in the execution engine, if there is one
    pub fn resolve_symbol(&self, name: &str) -> Option<usize> {
        self.jit.as_ref().and_then(|jit| jit.resolve_symbol(name))
    }

    pub fn handle(&mut self, node: &ASTNode) -> Result<Outcome, SessionError> {
        if self.config.mode == Mode::Parse {
            return Ok(Outcome::Parsed(node.describe()));
        }

        match node {
            ASTNode::Definition(function) => self.handle_definition(function),
            ASTNode::Extern(proto) => self.handle_extern(proto),
            ASTNode::Expression(function) => self.handle_top_level_expr(function),
        }
    }

    fn codegen(&mut self) -> Codegen<'_, 'ctx> {
        Codegen::new(self.context, &self.builder, &self.unit, &mut self.prototypes)
    }

    fn handle_definition(&mut self, function: &Function) -> Result<Outcome, SessionError> {
        let ir = self
            .codegen()
            .compile_fn(function)?
            .print_to_string()
            .to_string_lossy()
            .into_owned();
        self.hand_off()?;
        Ok(Outcome::Definition(ir))
    }

    fn handle_extern(&mut self, proto: &Prototype) -> Result<Outcome, SessionError> {
        let ir = self
            .codegen()
            .compile_extern(proto)
            .print_to_string()
            .to_string_lossy()
            .into_owned();
        self.hand_off()?;
        Ok(Outcome::Extern(ir))
    }

    fn handle_top_level_expr(&mut self, function: &Function) -> Result<Outcome, SessionError> {
        let name = function.prototype.name.as_str();
        let llvm_func = self.codegen().compile_fn(function)?;
        // the anonymous function never outlives this call
        self.prototypes.remove(name);

        match &self.jit {
            Some(jit) => {
                let module =
                    close_unit(self.context, self.config, &mut self.opened, &mut self.unit);
                let value = jit.evaluate(module, name)?;
                Ok(Outcome::Evaluated(value))
            }
            None => {
                let ir = llvm_func.print_to_string().to_string_lossy().into_owned();
                unsafe {
                    llvm_func.delete();
                }
                Ok(Outcome::Expression(ir))
            }
        }
    }

    fn hand_off(&mut self) -> Result<(), SessionError> {
        if let Some(jit) = &mut self.jit {
            let module = close_unit(self.context, self.config, &mut self.opened, &mut self.unit);
            jit.load_unit(module)?;
        }
        Ok(())
    }
}

/// close `unit` and open a fresh one in its place
fn close_unit<'ctx>(
    context: &'ctx Context,
    config: SessionConfig,
    opened: &mut usize,
    unit: &mut Unit<'ctx>,
) -> Module<'ctx> {
    *opened += 1;
    let next = Unit::new(context, &format!("unit{}", opened), config.optimize);
    std::mem::replace(unit, next).into_module()
}
