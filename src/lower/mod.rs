//! Lowering: syntax tree to Cranelift IR.
//!
//! A recursive evaluator over the tree. Literals and symbol loads emit
//! directly; lists dispatch on their head symbol to a special form, a binary
//! operator, or a call to a recorded function. Function bodies are recorded
//! by `defn` and emitted into the module on their first call site.

mod assign;
mod binop;
mod call;
mod control;

use cranelift_codegen::ir::{
    types, InstBuilder, MemFlags, StackSlotData, StackSlotKind, Type, Value,
};
use cranelift_frontend::FunctionBuilder;
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Module};
use rustc_hash::FxHashMap;

use crate::env::{Binding, Env};
use crate::error::Diagnostic;
use crate::syntax::{Node, NodeKind};
use crate::types::{TypeDesc, TypeRegistry};

pub struct Lowerer<'a> {
    pub(crate) module: &'a mut JITModule,
    pub(crate) env: &'a mut Env,
    pub(crate) types: &'a mut TypeRegistry,
    /// Function name to emitted id; filled on first call site.
    pub(crate) emitted: FxHashMap<String, FuncId>,
    /// CLIF text of every defined function, in definition order.
    funcs: Vec<String>,
    pub(crate) ptr_type: Type,
}

impl<'a> Lowerer<'a> {
    pub fn new(module: &'a mut JITModule, env: &'a mut Env, types: &'a mut TypeRegistry) -> Self {
        let ptr_type = module.isa().pointer_type();
        Lowerer {
            module,
            env,
            types,
            emitted: FxHashMap::default(),
            funcs: Vec::new(),
            ptr_type,
        }
    }

    /// The generated IR listing, in definition order.
    pub fn ir_text(&self) -> String {
        self.funcs.join("\n")
    }

    /// Lower one node. `None` means the form produced no value.
    pub fn lower(
        &mut self,
        node: &Node,
        b: &mut FunctionBuilder,
    ) -> Result<Option<Value>, Diagnostic> {
        match &node.kind {
            NodeKind::Int { text, ty } => self.lower_int(node, text, ty.as_deref(), b).map(Some),
            NodeKind::Float { text, ty } => {
                self.lower_float(node, text, ty.as_deref(), b).map(Some)
            }
            NodeKind::Symbol(name) => self.lower_symbol(node, name, b).map(Some),
            NodeKind::List(children) => self.lower_list(node, children, b),
            NodeKind::Discard(_) => Ok(None),
            _ => Err(Diagnostic::node(node, "unsupported expression")),
        }
    }

    /// Lower a node that must produce a value.
    pub(crate) fn lower_value(
        &mut self,
        node: &Node,
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        self.lower(node, b)?
            .ok_or_else(|| Diagnostic::node(node, "expression produces no value"))
    }

    fn lower_int(
        &mut self,
        node: &Node,
        text: &str,
        ty: Option<&str>,
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let value = parse_int(text)
            .ok_or_else(|| Diagnostic::node(node, format!("invalid integer literal '{}'", text)))?;
        let ty = match ty {
            Some(tag) => self.value_type(tag, node)?,
            None => types::I32,
        };
        // a declared float type widens the literal here
        Ok(if ty == types::F32 {
            b.ins().f32const(value as f32)
        } else if ty == types::F64 {
            b.ins().f64const(value as f64)
        } else {
            b.ins().iconst(ty, value)
        })
    }

    fn lower_float(
        &mut self,
        node: &Node,
        text: &str,
        ty: Option<&str>,
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let value = parse_float(text)
            .ok_or_else(|| Diagnostic::node(node, format!("invalid float literal '{}'", text)))?;
        Ok(match ty {
            Some("float32") => b.ins().f32const(value as f32),
            _ => b.ins().f64const(value),
        })
    }

    fn lower_symbol(
        &mut self,
        node: &Node,
        name: &str,
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        // `else` is the reserved truthy literal used by cond tails
        if name == "else" {
            return Ok(b.ins().iconst(types::I32, 1));
        }
        let binding = self
            .env
            .lookup(name)
            .cloned()
            .ok_or_else(|| Diagnostic::node(node, format!("unknown variable '{}'", name)))?;
        match binding {
            Binding::Direct { value, .. } => Ok(value),
            Binding::Slot { addr, ty } => {
                let ty = self.value_type(&ty, node)?;
                Ok(b.ins().load(ty, MemFlags::trusted(), addr, 0))
            }
        }
    }

    fn lower_list(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Option<Value>, Diagnostic> {
        if children.is_empty() {
            return Err(Diagnostic::node(node, "empty list"));
        }
        if is_sequence(children) {
            let mut last = None;
            for child in children {
                last = self.lower(child, b)?;
            }
            return Ok(last);
        }
        let head = &children[0];
        let Some(op) = head.symbol_name() else {
            return Err(Diagnostic::node(head, "expected operator symbol"));
        };
        match op {
            "defn" => self.form_defn(node, children).map(|_| None),
            "struct" => self.form_struct(node, children).map(|_| None),
            "=" => self.form_assign(node, children, b).map(Some),
            "put" => self.form_put(node, children, b).map(Some),
            "ref" => self.form_ref(node, children).map(Some),
            "deref" => self.form_deref(node, children, b).map(Some),
            "." => self.form_field_load(node, children, b).map(Some),
            "cond" => self.form_cond(node, children, b).map(Some),
            "while" => self.form_while(node, children, b).map(Some),
            "+" | "-" | "*" | "/" | "==" | "!=" | "<" | "<=" | ">" | ">=" => {
                self.form_binop(node, op, children, b).map(Some)
            }
            _ => self.lower_call(node, op, children, b),
        }
    }

    /// `(defn :ret name (params…) body…)`: record the function; the body
    /// lowers on first call.
    fn form_defn(&mut self, node: &Node, children: &[Node]) -> Result<(), Diagnostic> {
        if children.len() < 5 {
            return Err(Diagnostic::node(
                node,
                "defn expects a return type, name, parameter list and body",
            ));
        }
        let ret = children[1]
            .keyword_name()
            .ok_or_else(|| Diagnostic::node(&children[1], "expected return type keyword"))?;
        let name = children[2]
            .symbol_name()
            .ok_or_else(|| Diagnostic::node(&children[2], "expected function name"))?;
        let NodeKind::List(params) = &children[3].kind else {
            return Err(Diagnostic::node(&children[3], "expected parameter list"));
        };
        let mut recorded = Vec::with_capacity(params.len());
        for param in params {
            match &param.kind {
                // a bare parameter symbol defaults to int32
                NodeKind::Symbol(p) => recorded.push((p.clone(), "int32".to_string())),
                NodeKind::List(pair) => {
                    let [psym, pty] = pair.as_slice() else {
                        return Err(Diagnostic::node(param, "expected (name :type) parameter"));
                    };
                    let pname = psym
                        .symbol_name()
                        .ok_or_else(|| Diagnostic::node(psym, "expected parameter name"))?;
                    let ptag = pty
                        .keyword_name()
                        .ok_or_else(|| Diagnostic::node(pty, "expected parameter type keyword"))?;
                    recorded.push((pname.to_string(), ptag.to_string()));
                }
                _ => return Err(Diagnostic::node(param, "expected parameter")),
            }
        }
        self.env.define_fn(
            name,
            crate::env::FnDef {
                ret: ret.to_string(),
                params: recorded,
                body: children[4..].to_vec(),
            },
        );
        Ok(())
    }

    /// `(struct Name ((field :type)…))`: register the struct layout.
    fn form_struct(&mut self, node: &Node, children: &[Node]) -> Result<(), Diagnostic> {
        let [_, name_node, fields_node] = children else {
            return Err(Diagnostic::node(node, "struct expects a name and a field list"));
        };
        let name = name_node
            .symbol_name()
            .ok_or_else(|| Diagnostic::node(name_node, "expected struct name"))?;
        let NodeKind::List(field_nodes) = &fields_node.kind else {
            return Err(Diagnostic::node(fields_node, "expected field list"));
        };
        let mut fields = Vec::with_capacity(field_nodes.len());
        for field in field_nodes {
            let NodeKind::List(pair) = &field.kind else {
                return Err(Diagnostic::node(field, "expected (field :type)"));
            };
            let [fsym, fty] = pair.as_slice() else {
                return Err(Diagnostic::node(field, "expected (field :type)"));
            };
            let fname = fsym
                .symbol_name()
                .ok_or_else(|| Diagnostic::node(fsym, "expected field name"))?;
            let ftag = fty
                .keyword_name()
                .ok_or_else(|| Diagnostic::node(fty, "expected field type keyword"))?;
            fields.push((fname.to_string(), ftag.to_string()));
        }
        let ptr_size = self.ptr_type.bytes();
        self.types
            .define_struct(name, &fields, ptr_size)
            .map_err(|message| Diagnostic::node(node, message))
    }

    /// `(ref sym)`: the storage slot of `sym` as a pointer value.
    fn form_ref(&mut self, node: &Node, children: &[Node]) -> Result<Value, Diagnostic> {
        let [_, target] = children else {
            return Err(Diagnostic::node(node, "ref expects a symbol"));
        };
        let name = target
            .symbol_name()
            .ok_or_else(|| Diagnostic::node(target, "expected a symbol"))?;
        match self.env.lookup(name) {
            Some(Binding::Slot { addr, .. }) => Ok(*addr),
            Some(Binding::Direct { .. }) => Err(Diagnostic::node(
                target,
                format!("'{}' has no storage slot", name),
            )),
            None => Err(Diagnostic::node(
                target,
                format!("unknown variable '{}'", name),
            )),
        }
    }

    /// `(deref p)`: load through the pointer `p`.
    fn form_deref(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let [_, target] = children else {
            return Err(Diagnostic::node(node, "deref expects a pointer"));
        };
        let (ptr, pointee) = self.lower_pointer(target, b)?;
        let ty = self.value_type(&pointee, target)?;
        Ok(b.ins().load(ty, MemFlags::trusted(), ptr, 0))
    }

    /// Produce a pointer value and its pointee type tag for `target`: a
    /// symbol bound to a pointer type, or any expression whose lowered value
    /// is pointer-sized (pointee defaults to int32).
    pub(crate) fn lower_pointer(
        &mut self,
        target: &Node,
        b: &mut FunctionBuilder,
    ) -> Result<(Value, String), Diagnostic> {
        if let Some(name) = target.symbol_name() {
            let binding = self
                .env
                .lookup(name)
                .cloned()
                .ok_or_else(|| Diagnostic::node(target, format!("unknown variable '{}'", name)))?;
            let Some(pointee) = binding.ty().strip_suffix('*') else {
                return Err(Diagnostic::node(
                    target,
                    format!("'{}' is not a pointer", name),
                ));
            };
            let pointee = pointee.to_string();
            let ptr = match binding {
                Binding::Direct { value, .. } => value,
                Binding::Slot { addr, .. } => {
                    b.ins().load(self.ptr_type, MemFlags::trusted(), addr, 0)
                }
            };
            return Ok((ptr, pointee));
        }
        let value = self.lower_value(target, b)?;
        if b.func.dfg.value_type(value) != self.ptr_type {
            return Err(Diagnostic::node(target, "dereference of non-pointer"));
        }
        Ok((value, "int32".to_string()))
    }

    /// Cranelift value type for a declared tag; pointers load as the target
    /// pointer type.
    pub(crate) fn value_type(&self, tag: &str, node: &Node) -> Result<Type, Diagnostic> {
        match self.types.resolve(tag) {
            Some(TypeDesc::Scalar(ty)) => Ok(ty),
            Some(TypeDesc::Pointer(_)) => Ok(self.ptr_type),
            Some(TypeDesc::Struct(_)) => Err(Diagnostic::node(
                node,
                format!("'{}' is not usable as a value type", tag),
            )),
            Some(TypeDesc::Void) => Err(Diagnostic::node(node, "void has no value")),
            None => Err(Diagnostic::node(node, format!("unknown type tag ':{}'", tag))),
        }
    }

    /// Allocate a stack slot and return its address.
    pub(crate) fn alloc_slot(&mut self, b: &mut FunctionBuilder, size: u32, align: u32) -> Value {
        let slot = b.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            size,
            align.trailing_zeros() as u8,
        ));
        b.ins().stack_addr(self.ptr_type, slot, 0)
    }
}

/// A list of forms rather than an operation: every child is itself a list
/// or a leaf numeric/symbol (discards allowed), and the first child is a
/// list. Each child lowers in order and the last value is the result.
fn is_sequence(children: &[Node]) -> bool {
    children.len() > 1
        && matches!(children[0].kind, NodeKind::List(_))
        && children.iter().all(|c| {
            matches!(
                c.kind,
                NodeKind::List(_)
                    | NodeKind::Int { .. }
                    | NodeKind::Float { .. }
                    | NodeKind::Symbol(_)
                    | NodeKind::Discard(_)
            )
        })
}

fn parse_int(text: &str) -> Option<i64> {
    let text = text.strip_suffix(['N', 'M']).unwrap_or(text);
    text.parse().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let text = text.strip_suffix(['M', 'm']).unwrap_or(text);
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_one;

    #[test]
    fn numeric_literal_texts_parse() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("+9"), Some(9));
        assert_eq!(parse_int("12N"), Some(12));
        assert_eq!(parse_int("3M"), Some(3));
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("-2.5E2"), Some(-250.0));
        assert_eq!(parse_float("3.25M"), Some(3.25));
    }

    #[test]
    fn sequence_detection() {
        let seq = read_one("((= x :int32 1) (+ x 1))").unwrap();
        let NodeKind::List(children) = &seq.kind else {
            panic!("expected a list");
        };
        assert!(is_sequence(children));

        let op = read_one("(+ 1 2)").unwrap();
        let NodeKind::List(children) = &op.kind else {
            panic!("expected a list");
        };
        assert!(!is_sequence(children));
    }
}
