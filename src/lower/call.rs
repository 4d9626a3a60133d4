//! Calls, lazy function emission, and entry-point synthesis.
//!
//! A call site requires its target in the definition table. The first call
//! of a name within the module synthesises the Cranelift function, lowers
//! the recorded body into it inside a fresh scope, and caches the result;
//! later calls reuse the cached function. Argument and return values follow
//! the shared promotion rules.

use cranelift_codegen::ir::{
    AbiParam, Function, InstBuilder, MemFlags, Signature, UserFuncName, Value,
};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{FuncId, Linkage, Module};
use smallvec::SmallVec;
use tracing::debug;

use crate::env::{Binding, FnDef};
use crate::error::Diagnostic;
use crate::syntax::Node;
use crate::types::TypeDesc;

use super::Lowerer;

impl<'a> Lowerer<'a> {
    /// `(name arg…)`: call a recorded function; `None` for a void callee.
    pub(crate) fn lower_call(
        &mut self,
        node: &Node,
        name: &str,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Option<Value>, Diagnostic> {
        let def = self
            .env
            .fn_def(name)
            .cloned()
            .ok_or_else(|| Diagnostic::node(node, format!("unknown function '{}'", name)))?;
        let args = &children[1..];
        if args.len() != def.params.len() {
            return Err(Diagnostic::node(
                node,
                format!(
                    "'{}' expects {} arguments, got {}",
                    name,
                    def.params.len(),
                    args.len()
                ),
            ));
        }
        let func_id = self.ensure_emitted(node, name, &def)?;
        let func_ref = self.module.declare_func_in_func(func_id, b.func);
        let mut values: SmallVec<[Value; 8]> = SmallVec::new();
        for (arg, (_, ptag)) in args.iter().zip(&def.params) {
            let val = self.lower_value(arg, b)?;
            let ty = self.value_type(ptag, arg)?;
            values.push(self.coerce(val, ty, b));
        }
        let inst = b.ins().call(func_ref, &values);
        Ok(b.inst_results(inst).first().copied())
    }

    /// Emit `name` into the module if this is its first call site.
    fn ensure_emitted(
        &mut self,
        node: &Node,
        name: &str,
        def: &FnDef,
    ) -> Result<FuncId, Diagnostic> {
        if let Some(id) = self.emitted.get(name) {
            return Ok(*id);
        }
        let sig = self.fn_signature(node, def)?;
        let func_id = self
            .module
            .declare_function(name, Linkage::Local, &sig)
            .map_err(|e| Diagnostic::node(node, format!("failed to declare '{}': {}", name, e)))?;
        // recorded before the body lowers so recursive calls resolve
        self.emitted.insert(name.to_string(), func_id);
        debug!(function = name, "emitting function body");

        let mut func = Function::with_name_signature(UserFuncName::testcase(name), sig);
        let mut fb_ctx = FunctionBuilderContext::new();
        let mut b = FunctionBuilder::new(&mut func, &mut fb_ctx);
        let entry = b.create_block();
        b.append_block_params_for_function_params(entry);
        b.switch_to_block(entry);

        // a fresh scope per body; parameter names must not leak out
        self.env.push_scope();
        let result = self.emit_body(node, def, entry, &mut b);
        self.env.pop_scope();
        result?;

        b.seal_all_blocks();
        b.finalize();
        self.define(func_id, func, node)?;
        Ok(func_id)
    }

    fn fn_signature(&mut self, node: &Node, def: &FnDef) -> Result<Signature, Diagnostic> {
        let mut sig = self.module.make_signature();
        for (_, ptag) in &def.params {
            let ty = self.value_type(ptag, node)?;
            sig.params.push(AbiParam::new(ty));
        }
        match self.types.resolve(&def.ret) {
            Some(TypeDesc::Void) => {}
            Some(TypeDesc::Scalar(ty)) => sig.returns.push(AbiParam::new(ty)),
            Some(TypeDesc::Pointer(_)) => sig.returns.push(AbiParam::new(self.ptr_type)),
            _ => {
                return Err(Diagnostic::node(
                    node,
                    format!("unknown return type ':{}'", def.ret),
                ))
            }
        }
        Ok(sig)
    }

    /// Bind parameters, lower the body as a sequence, and return the last
    /// value coerced to the declared return type.
    fn emit_body(
        &mut self,
        node: &Node,
        def: &FnDef,
        entry: cranelift_codegen::ir::Block,
        b: &mut FunctionBuilder,
    ) -> Result<(), Diagnostic> {
        let incoming: Vec<Value> = b.block_params(entry).to_vec();
        for ((pname, ptag), &value) in def.params.iter().zip(&incoming) {
            match self.types.resolve(ptag) {
                // pointer parameters bind the incoming value directly
                Some(TypeDesc::Pointer(_)) => {
                    self.env.bind(
                        pname.clone(),
                        Binding::Direct {
                            value,
                            ty: ptag.clone(),
                        },
                    );
                }
                Some(TypeDesc::Scalar(ty)) => {
                    let addr = self.alloc_slot(b, ty.bytes(), ty.bytes());
                    b.ins().store(MemFlags::trusted(), value, addr, 0);
                    self.env.bind(
                        pname.clone(),
                        Binding::Slot {
                            addr,
                            ty: ptag.clone(),
                        },
                    );
                }
                _ => {
                    return Err(Diagnostic::node(
                        node,
                        format!("unsupported parameter type ':{}'", ptag),
                    ))
                }
            }
        }

        let mut last = None;
        for form in &def.body {
            last = self.lower(form, b)?;
        }

        match self.types.resolve(&def.ret) {
            Some(TypeDesc::Void) => {
                b.ins().return_(&[]);
            }
            Some(TypeDesc::Scalar(ty)) => {
                let val = last
                    .ok_or_else(|| Diagnostic::node(node, "function body produces no value"))?;
                let val = self.coerce(val, ty, b);
                b.ins().return_(&[val]);
            }
            Some(TypeDesc::Pointer(_)) => {
                let val = last
                    .ok_or_else(|| Diagnostic::node(node, "function body produces no value"))?;
                let val = self.coerce(val, self.ptr_type, b);
                b.ins().return_(&[val]);
            }
            _ => {
                return Err(Diagnostic::node(
                    node,
                    format!("unknown return type ':{}'", def.ret),
                ))
            }
        }
        Ok(())
    }

    /// Build the synthetic zero-argument float64 entry around the top-level
    /// program and define it in the module.
    pub fn emit_entry(&mut self, name: &str, program: &Node) -> Result<FuncId, Diagnostic> {
        let mut sig = self.module.make_signature();
        sig.returns.push(AbiParam::new(cranelift_codegen::ir::types::F64));
        let func_id = self
            .module
            .declare_function(name, Linkage::Export, &sig)
            .map_err(|e| Diagnostic::node(program, format!("failed to declare entry: {}", e)))?;

        let mut func = Function::with_name_signature(UserFuncName::testcase(name), sig);
        let mut fb_ctx = FunctionBuilderContext::new();
        let mut b = FunctionBuilder::new(&mut func, &mut fb_ctx);
        let entry = b.create_block();
        b.switch_to_block(entry);

        let last = self.lower(program, &mut b)?;
        let ret = match last {
            Some(val) => self.coerce(val, cranelift_codegen::ir::types::F64, &mut b),
            // a definition-only program falls back to calling main
            None => match self.env.fn_def("main").cloned() {
                Some(def) => {
                    if !def.params.is_empty() {
                        return Err(Diagnostic::node(program, "main must take no arguments"));
                    }
                    let main_id = self.ensure_emitted(program, "main", &def)?;
                    let main_ref = self.module.declare_func_in_func(main_id, b.func);
                    let inst = b.ins().call(main_ref, &[]);
                    match b.inst_results(inst).first().copied() {
                        Some(val) => self.coerce(val, cranelift_codegen::ir::types::F64, &mut b),
                        None => b.ins().f64const(0.0),
                    }
                }
                None => b.ins().f64const(0.0),
            },
        };
        b.ins().return_(&[ret]);
        b.seal_all_blocks();
        b.finalize();
        self.define(func_id, func, program)?;
        Ok(func_id)
    }

    /// Compile a finished function into the module, recording its IR text.
    fn define(&mut self, func_id: FuncId, func: Function, node: &Node) -> Result<(), Diagnostic> {
        self.funcs.push(func.display().to_string());
        let mut ctx = Context::for_function(func);
        self.module
            .define_function(func_id, &mut ctx)
            .map_err(|e| Diagnostic::node(node, format!("failed to define function: {}", e)))
    }
}
