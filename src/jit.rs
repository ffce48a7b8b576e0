use inkwell::{
    context::Context,
    execution_engine::{ExecutionEngine, JitFunction},
    module::Module,
    targets::{InitializationConfig, Target},
    OptimizationLevel,
};

use crate::runtime;

type EntryFunc = unsafe extern "C" fn() -> f64;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum JitError {
    #[error("failed to initialize native target: {0}")]
    Target(String),
    #[error("failed to create execution engine: {0}")]
    Engine(String),
    #[error("execution engine refused unit {0}")]
    Load(String),
    #[error("unable to resolve symbol {0}")]
    Unresolved(String),
    #[error("failed to unload unit {0}")]
    Unload(String),
}

fn unit_name(module: &Module<'_>) -> String {
    module.get_name().to_string_lossy().into_owned()
}

/// Bind every runtime function `module` declares to its native address.
fn bind_runtime<'ctx>(engine: &ExecutionEngine<'ctx>, module: &Module<'ctx>) {
    for function in module.get_functions() {
        if function.count_basic_blocks() > 0 {
            continue;
        }
        let name = function.get_name().to_string_lossy();
        if let Some(address) = runtime::symbol_address(&name) {
            engine.add_global_mapping(&function, address);
        }
    }
}

fn defines(module: &Module<'_>, name: &str) -> bool {
    module
        .get_function(name)
        .map_or(false, |function| function.count_basic_blocks() > 0)
}

fn defined_names(module: &Module<'_>) -> Vec<String> {
    module
        .get_functions()
        .filter(|function| function.count_basic_blocks() > 0)
        .map(|function| function.get_name().to_string_lossy().into_owned())
        .collect()
}

fn session_engine<'ctx>(
    context: &'ctx Context,
) -> Result<(Module<'ctx>, ExecutionEngine<'ctx>), JitError> {
    let root = context.create_module("root");
    let engine = root
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| JitError::Engine(e.to_string_lossy().into_owned()))?;
    Ok((root, engine))
}

/// Hosts finished units.
///
/// Definitions live in one engine for the rest of the session. Anonymous
/// expressions get an engine of their own that is thrown away together with
/// the unit once the expression has run, so nothing of it stays resident.
/// Loading a unit that redefines a function moves the session onto a fresh
/// engine without the older definition, so the latest one always wins.
pub struct Jit<'ctx> {
    context: &'ctx Context,
    engine: ExecutionEngine<'ctx>,
    units: Vec<Module<'ctx>>,
}

impl<'ctx> Jit<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Jit<'ctx>, JitError> {
        Target::initialize_native(&InitializationConfig::default()).map_err(JitError::Target)?;

        let (root, engine) = session_engine(context)?;
        Ok(Jit {
            context,
            engine,
            units: vec![root],
        })
    }

    /// hand a finished unit over for the rest of the session
    pub fn load_unit(&mut self, module: Module<'ctx>) -> Result<(), JitError> {
        let defined = defined_names(&module);
        let shadows = self
            .units
            .iter()
            .any(|unit| defined.iter().any(|name| defines(unit, name)));
        if shadows {
            self.evict(&defined)?;
        }

        self.engine
            .add_module(&module)
            .map_err(|()| JitError::Load(unit_name(&module)))?;
        bind_runtime(&self.engine, &module);
        self.units.push(module);
        Ok(())
    }

    /// Rebuild the session engine from every unit that still defines
    /// something, leaving out the ones that define any of `names`.
    fn evict(&mut self, names: &[String]) -> Result<(), JitError> {
        // a linked symbol stays in an engine even after its module is removed
        let (root, engine) = session_engine(self.context)?;
        let mut kept = vec![root];

        for unit in self.units.drain(..) {
            self.engine
                .remove_module(&unit)
                .map_err(|_| JitError::Unload(unit_name(&unit)))?;

            let defined = defined_names(&unit);
            if defined.is_empty() || defined.iter().any(|name| names.contains(name)) {
                continue;
            }
            engine
                .add_module(&unit)
                .map_err(|()| JitError::Load(unit_name(&unit)))?;
            bind_runtime(&engine, &unit);
            kept.push(unit);
        }

        self.engine = engine;
        self.units = kept;
        Ok(())
    }

    /// native address of a function defined by a loaded unit
    pub fn resolve_symbol(&self, name: &str) -> Option<usize> {
        if !self.units.iter().any(|unit| defines(unit, name)) {
            return None;
        }
        self.engine.get_function_address(name).ok()
    }

    /// Load `module`, call its `entry` function and unload it again.
    pub fn evaluate(&self, module: Module<'ctx>, entry: &str) -> Result<f64, JitError> {
        let engine = module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| JitError::Engine(e.to_string_lossy().into_owned()))?;

        // calls into earlier units go through the addresses the session
        // engine hands out; anything else is left to the process symbols
        for function in module.get_functions() {
            if function.count_basic_blocks() > 0 {
                continue;
            }
            let name = function.get_name().to_string_lossy();
            let address = runtime::symbol_address(&name).or_else(|| self.resolve_symbol(&name));
            if let Some(address) = address {
                engine.add_global_mapping(&function, address);
            }
        }

        let result = {
            let func: JitFunction<EntryFunc> = unsafe { engine.get_function(entry) }
                .map_err(|_| JitError::Unresolved(entry.to_string()))?;
            unsafe { func.call() }
        };

        engine
            .remove_module(&module)
            .map_err(|_| JitError::Unload(unit_name(&module)))?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use inkwell::context::Context;

    use super::*;
    use crate::ast::{Expression, Function, Prototype};
    use crate::codegen::{Codegen, Unit};
    use crate::registry::PrototypeRegistry;

    fn define<'ctx>(
        context: &'ctx Context,
        prototypes: &mut PrototypeRegistry,
        function: &Function,
    ) -> Module<'ctx> {
        let unit = Unit::new(context, "test", false);
        let builder = context.create_builder();
        Codegen::new(context, &builder, &unit, prototypes)
            .compile_fn(function)
            .unwrap();
        unit.into_module()
    }

    #[test]
    fn each_expression_runs_its_own_code() {
        let context = Context::create();
        let jit = Jit::new(&context).unwrap();
        let mut prototypes = PrototypeRegistry::new();

        let body = Expression::Binary(
            '*',
            Box::new(Expression::Number(6.0)),
            Box::new(Expression::Number(7.0)),
        );
        let module = define(&context, &mut prototypes, &Function::anonymous(body));
        assert_eq!(jit.evaluate(module, "__anon_expr"), Ok(42.0));

        let one = Function::anonymous(Expression::Number(1.0));
        let module = define(&context, &mut prototypes, &one);
        assert_eq!(jit.evaluate(module, "__anon_expr"), Ok(1.0));
    }

    #[test]
    fn resolves_loaded_definitions() {
        let context = Context::create();
        let mut jit = Jit::new(&context).unwrap();
        let mut prototypes = PrototypeRegistry::new();

        let id = Function {
            prototype: Prototype::new("id", vec!["x".to_string()]),
            body: Expression::Variable("x".to_string()),
        };
        jit.load_unit(define(&context, &mut prototypes, &id)).unwrap();
        assert!(jit.resolve_symbol("id").is_some());
        assert_eq!(jit.resolve_symbol("missing"), None);

        let call = Expression::Call("id".to_string(), vec![Expression::Number(3.0)]);
        let module = define(&context, &mut prototypes, &Function::anonymous(call));
        assert_eq!(jit.evaluate(module, "__anon_expr"), Ok(3.0));
    }

    #[test]
    fn later_definition_replaces_earlier_one() {
        let context = Context::create();
        let mut jit = Jit::new(&context).unwrap();
        let mut prototypes = PrototypeRegistry::new();

        let constant = |value| Function {
            prototype: Prototype::new("answer", Vec::new()),
            body: Expression::Number(value),
        };
        let call = || Function::anonymous(Expression::Call("answer".to_string(), Vec::new()));

        jit.load_unit(define(&context, &mut prototypes, &constant(1.0))).unwrap();
        let module = define(&context, &mut prototypes, &call());
        assert_eq!(jit.evaluate(module, "__anon_expr"), Ok(1.0));

        jit.load_unit(define(&context, &mut prototypes, &constant(2.0))).unwrap();
        let module = define(&context, &mut prototypes, &call());
        assert_eq!(jit.evaluate(module, "__anon_expr"), Ok(2.0));
        assert_eq!(jit.units.iter().filter(|unit| defines(unit, "answer")).count(), 1);
    }
}
