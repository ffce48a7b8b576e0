use std::collections::{HashMap, HashSet};

use inkwell::{
    builder::Builder,
    context::Context,
    module::Module,
    passes::PassManager,
    types::BasicMetadataTypeEnum,
    values::{BasicMetadataValueEnum, FloatValue, FunctionValue},
    FloatPredicate,
};

use crate::ast::{Expression, Function, Prototype};
use crate::registry::PrototypeRegistry;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable referenced {0}")]
    UnknownVariable(String),
    #[error("invalid binary operator {0}")]
    InvalidOperator(char),
    #[error("unknown function referenced {0}")]
    UnknownFunction(String),
    #[error("incorrect number of arguments passed to {name}: expected {expected} found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("failed to verify function {0}")]
    InvalidFunction(String),
    #[error("call to {0} produced no value")]
    VoidCall(String),
}

/// One independently generated block of code: a module and the function
/// pass pipeline attached to it.
pub struct Unit<'ctx> {
    pub pass_manager: Option<PassManager<FunctionValue<'ctx>>>,
    pub module: Module<'ctx>,
}

impl<'ctx> Unit<'ctx> {
    pub fn new(context: &'ctx Context, name: &str, optimize: bool) -> Unit<'ctx> {
        let module = context.create_module(name);

        let pass_manager = if optimize {
            let fpm = PassManager::create(&module);
            // peephole and bit-twiddling
            fpm.add_instruction_combining_pass();
            fpm.add_reassociate_pass();
            // common subexpressions
            fpm.add_gvn_pass();
            // unreachable blocks and the like
            fpm.add_cfg_simplification_pass();
            fpm.initialize();
            Some(fpm)
        } else {
            None
        };

        Unit {
            pass_manager,
            module,
        }
    }

    /// close the unit, releasing its pass manager before the module moves on
    pub fn into_module(self) -> Module<'ctx> {
        let Unit {
            module,
            pass_manager,
        } = self;
        drop(pass_manager);
        module
    }
}

pub struct Codegen<'a, 'ctx> {
    pub context: &'ctx Context,
    pub builder: &'a Builder<'ctx>,
    pub unit: &'a Unit<'ctx>,
    pub prototypes: &'a mut PrototypeRegistry,
    named_values: HashMap<String, FloatValue<'ctx>>,
}

impl<'a, 'ctx> Codegen<'a, 'ctx> {
    pub fn new(
        context: &'ctx Context,
        builder: &'a Builder<'ctx>,
        unit: &'a Unit<'ctx>,
        prototypes: &'a mut PrototypeRegistry,
    ) -> Codegen<'a, 'ctx> {
        Codegen {
            context,
            builder,
            unit,
            prototypes,
            named_values: HashMap::new(),
        }
    }

    /// Look a function up in the current unit, falling back to re-declaring
    /// it from the prototype registry.
    fn get_function(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        if let Some(function) = self.unit.module.get_function(name) {
            return Some(function);
        }

        self.prototypes
            .get(name)
            .map(|proto| self.compile_proto(proto))
    }

    fn codegen_expr(&self, expr: &Expression) -> Result<FloatValue<'ctx>, CodegenError> {
        match expr {
            Expression::Number(value) => Ok(self.context.f64_type().const_float(*value)),
            Expression::Variable(name) => match self.named_values.get(name) {
                Some(var) => Ok(*var),
                None => Err(CodegenError::UnknownVariable(name.clone())),
            },
            Expression::Binary(op, left, right) => {
                let lhs = self.codegen_expr(left)?;
                let rhs = self.codegen_expr(right)?;

                match op {
                    '+' => Ok(self.builder.build_float_add(lhs, rhs, "addtmp")),
                    '-' => Ok(self.builder.build_float_sub(lhs, rhs, "subtmp")),
                    '*' => Ok(self.builder.build_float_mul(lhs, rhs, "multmp")),
                    '<' => {
                        let cmp = self.builder.build_float_compare(
                            FloatPredicate::ULT,
                            lhs,
                            rhs,
                            "cmptmp",
                        );
                        // 0/1 back to 0.0/1.0
                        Ok(self.builder.build_unsigned_int_to_float(
                            cmp,
                            self.context.f64_type(),
                            "booltmp",
                        ))
                    }
                    _ => Err(CodegenError::InvalidOperator(*op)),
                }
            }
            Expression::Call(callee, args) => {
                let func = self
                    .get_function(callee)
                    .ok_or_else(|| CodegenError::UnknownFunction(callee.clone()))?;

                let expected = func.count_params() as usize;
                if expected != args.len() {
                    return Err(CodegenError::ArityMismatch {
                        name: callee.clone(),
                        expected,
                        found: args.len(),
                    });
                }

                let mut argsv: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len());
                for arg in args {
                    argsv.push(self.codegen_expr(arg)?.into());
                }

                self.builder
                    .build_call(func, argsv.as_slice(), "calltmp")
                    .try_as_basic_value()
                    .left()
                    .map(|value| value.into_float_value())
                    .ok_or_else(|| CodegenError::VoidCall(callee.clone()))
            }
        }
    }

    /// declare `double name(double, ...)` in the current unit
    pub fn compile_proto(&self, proto: &Prototype) -> FunctionValue<'ctx> {
        let args_types = std::iter::repeat(self.context.f64_type())
            .take(proto.arity())
            .map(|f| f.into())
            .collect::<Vec<BasicMetadataTypeEnum>>();
        let args_types = args_types.as_slice();

        let fn_type = self.context.f64_type().fn_type(args_types, false);
        let fn_val = self
            .unit
            .module
            .add_function(proto.name.as_str(), fn_type, None);

        for (arg, name) in fn_val.get_param_iter().zip(&proto.args) {
            arg.into_float_value().set_name(name.as_str());
        }

        fn_val
    }

    /// record an external declaration and declare it in the current unit
    pub fn compile_extern(&mut self, proto: &Prototype) -> FunctionValue<'ctx> {
        self.prototypes.insert(proto.clone());
        match self.unit.module.get_function(&proto.name) {
            Some(existing) => existing,
            None => self.compile_proto(proto),
        }
    }

    /// Generate a full function definition.
    ///
    /// The prototype is registered before the body is generated so that the
    /// body may call the function itself. If anything fails the registry entry
    /// is rolled back and nothing of the function is left in the unit, including
    /// the declarations its body pulled in from the registry.
    pub fn compile_fn(&mut self, function: &Function) -> Result<FunctionValue<'ctx>, CodegenError> {
        let proto = &function.prototype;
        let existing = self.function_names();
        let previous = self.prototypes.insert(proto.clone());

        let result = self.compile_fn_body(function);
        if result.is_err() {
            self.prototypes.restore(&proto.name, previous);
            self.discard_new_declarations(&existing);
        }
        self.named_values.clear();

        result
    }

    fn function_names(&self) -> HashSet<String> {
        self.unit
            .module
            .get_functions()
            .map(|function| function.get_name().to_string_lossy().into_owned())
            .collect()
    }

    /// drop bodiless functions that are not in `existing`
    fn discard_new_declarations(&self, existing: &HashSet<String>) {
        let added = self.unit.module.get_functions().filter(|function| {
            function.count_basic_blocks() == 0
                && !existing.contains(function.get_name().to_string_lossy().as_ref())
        });
        for function in added.collect::<Vec<_>>() {
            unsafe {
                function.delete();
            }
        }
    }

    fn compile_fn_body(&mut self, function: &Function) -> Result<FunctionValue<'ctx>, CodegenError> {
        let Function {
            prototype: proto,
            body,
        } = function;

        let declared = self.unit.module.get_function(&proto.name).is_some();
        let llvm_func = self
            .get_function(&proto.name)
            .ok_or_else(|| CodegenError::UnknownFunction(proto.name.clone()))?;

        if llvm_func.count_basic_blocks() > 0 {
            return Err(CodegenError::Redefinition(proto.name.clone()));
        }

        let entry = self.context.append_basic_block(llvm_func, "entry");
        self.builder.position_at_end(entry);

        self.named_values.clear();
        self.named_values.reserve(proto.arity());
        for (arg, name) in llvm_func.get_param_iter().zip(&proto.args) {
            let arg = arg.into_float_value();
            arg.set_name(name.as_str());
            self.named_values.insert(name.clone(), arg);
        }

        let body = match self.codegen_expr(body) {
            Ok(body) => body,
            Err(e) => {
                discard(llvm_func, declared);
                return Err(e);
            }
        };

        self.builder.build_return(Some(&body));

        if !llvm_func.verify(true) {
            discard(llvm_func, declared);
            return Err(CodegenError::InvalidFunction(proto.name.clone()));
        }

        if let Some(fpm) = &self.unit.pass_manager {
            fpm.run_on(&llvm_func);
        }

        Ok(llvm_func)
    }
}

/// Throw away a half-built function. A declaration that was already in the
/// unit before generation started keeps existing, just without a body, since
/// other functions in the unit may call it.
fn discard(function: FunctionValue<'_>, keep_declaration: bool) {
    if keep_declaration {
        for block in function.get_basic_blocks() {
            // only a block without a parent function refuses
            if unsafe { block.delete() }.is_err() {
                break;
            }
        }
    } else {
        unsafe {
            function.delete();
        }
    }
}
