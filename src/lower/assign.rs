//! The assignment family: the three `=` shapes, `put`, and field access.
//!
//! `=` covers typed assignment `(= target :type value)`, struct
//! construction `(= target (StructName (v…)))`, and struct field stores
//! `(= (. target :field) value)`. `put` stores through a pointer. Field
//! loads share the locate-and-address path with field stores.

use cranelift_codegen::ir::{InstBuilder, MemFlags, Value};
use cranelift_frontend::FunctionBuilder;

use crate::env::Binding;
use crate::error::Diagnostic;
use crate::syntax::{Node, NodeKind};

use super::Lowerer;

impl<'a> Lowerer<'a> {
    /// `(= …)` dispatch over the three assignment shapes.
    pub(crate) fn form_assign(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        match children {
            // (= (. target :field) value), (= (deref p) value)
            [_, target, value] if matches!(target.kind, NodeKind::List(_)) => {
                let (addr, tag) = self.lower_lvalue(target, b)?;
                let val = self.lower_value(value, b)?;
                let expect = self.value_type(&tag, target)?;
                let got = b.func.dfg.value_type(val);
                if got != expect {
                    return Err(Diagnostic::node(
                        value,
                        format!("expected a {} value, got {}", tag, got),
                    ));
                }
                b.ins().store(MemFlags::trusted(), val, addr, 0);
                Ok(val)
            }
            // (= target (StructName (v…)))
            [_, target, value] => self.construct_struct(target, value, b),
            // (= target :type value)
            [_, target, ty, value] => {
                let tag = ty
                    .keyword_name()
                    .ok_or_else(|| Diagnostic::node(ty, "expected type keyword"))?;
                self.typed_assign(target, tag, value, b)
            }
            _ => Err(Diagnostic::node(node, "malformed assignment")),
        }
    }

    /// Allocate a struct-typed slot, store each field value in declaration
    /// order, and bind `target` to the slot.
    fn construct_struct(
        &mut self,
        target: &Node,
        value: &Node,
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let name = target
            .symbol_name()
            .ok_or_else(|| Diagnostic::node(target, "expected variable name"))?;
        let NodeKind::List(parts) = &value.kind else {
            return Err(Diagnostic::node(value, "expected struct construction"));
        };
        let [type_node, values_node] = parts.as_slice() else {
            return Err(Diagnostic::node(value, "expected (StructName (values…))"));
        };
        let struct_name = type_node
            .symbol_name()
            .ok_or_else(|| Diagnostic::node(type_node, "expected struct name"))?;
        let def = self
            .types
            .struct_def(struct_name)
            .cloned()
            .ok_or_else(|| {
                Diagnostic::node(type_node, format!("unknown struct '{}'", struct_name))
            })?;
        let NodeKind::List(field_values) = &values_node.kind else {
            return Err(Diagnostic::node(values_node, "expected field values"));
        };
        if field_values.len() != def.fields.len() {
            return Err(Diagnostic::node(
                values_node,
                format!(
                    "struct '{}' has {} fields, got {} values",
                    def.name,
                    def.fields.len(),
                    field_values.len()
                ),
            ));
        }
        let addr = self.alloc_slot(b, def.size, def.align);
        for (field, fv) in def.fields.iter().zip(field_values) {
            // the declared field type flows into numeric literals
            let fv = fv.with_declared_type(&field.ty);
            let val = self.lower_value(&fv, b)?;
            b.ins()
                .store(MemFlags::trusted(), val, addr, field.offset as i32);
        }
        self.env.bind(
            name,
            Binding::Slot {
                addr,
                ty: def.name.clone(),
            },
        );
        Ok(addr)
    }

    /// `(= target :type value)`: store `value` into `target`'s slot,
    /// materialising the slot on first assignment.
    fn typed_assign(
        &mut self,
        target: &Node,
        tag: &str,
        value: &Node,
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        // the declared type flows into numeric literals before lowering
        let value_node = value.with_declared_type(tag);
        let val = self.lower_value(&value_node, b)?;
        let ty = self.value_type(tag, value)?;
        let val = self.coerce(val, ty, b);
        match &target.kind {
            NodeKind::Symbol(name) => {
                let addr = match self.env.lookup(name) {
                    Some(Binding::Slot { addr, ty: bound }) if bound == tag => *addr,
                    Some(Binding::Direct { .. }) => {
                        return Err(Diagnostic::node(
                            target,
                            format!("'{}' has no storage slot", name),
                        ))
                    }
                    // unbound, or re-declared at a different type
                    _ => {
                        let addr = self.alloc_slot(b, ty.bytes(), ty.bytes());
                        self.env.bind(
                            name.clone(),
                            Binding::Slot {
                                addr,
                                ty: tag.to_string(),
                            },
                        );
                        addr
                    }
                };
                b.ins().store(MemFlags::trusted(), val, addr, 0);
                Ok(val)
            }
            NodeKind::List(_) => {
                let (addr, _) = self.lower_lvalue(target, b)?;
                b.ins().store(MemFlags::trusted(), val, addr, 0);
                Ok(val)
            }
            _ => Err(Diagnostic::node(target, "expected assignment target")),
        }
    }

    /// `(put target :type value)`: store through a pointer-typed symbol or
    /// an lvalue list.
    pub(crate) fn form_put(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let [_, target, ty, value] = children else {
            return Err(Diagnostic::node(node, "put expects a target, type and value"));
        };
        let tag = ty
            .keyword_name()
            .ok_or_else(|| Diagnostic::node(ty, "expected type keyword"))?;
        let value_node = value.with_declared_type(tag);
        let val = self.lower_value(&value_node, b)?;
        let store_ty = self.value_type(tag, value)?;
        let val = self.coerce(val, store_ty, b);
        let addr = match &target.kind {
            NodeKind::List(_) => self.lower_lvalue(target, b)?.0,
            _ => self.lower_pointer(target, b)?.0,
        };
        b.ins().store(MemFlags::trusted(), val, addr, 0);
        Ok(val)
    }

    /// `(. target :field)`: typed load of a struct field.
    pub(crate) fn form_field_load(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let (addr, tag) = self.field_addr(node, children, b)?;
        let ty = self.value_type(&tag, node)?;
        Ok(b.ins().load(ty, MemFlags::trusted(), addr, 0))
    }

    /// Lower a compound expression usable as a store destination: the
    /// address it denotes plus the declared type tag of the pointee.
    pub(crate) fn lower_lvalue(
        &mut self,
        target: &Node,
        b: &mut FunctionBuilder,
    ) -> Result<(Value, String), Diagnostic> {
        let NodeKind::List(children) = &target.kind else {
            return Err(Diagnostic::node(target, "expected lvalue"));
        };
        match children.first().and_then(Node::symbol_name) {
            Some(".") => self.field_addr(target, children, b),
            Some("deref") => {
                let [_, inner] = children.as_slice() else {
                    return Err(Diagnostic::node(target, "deref expects a pointer"));
                };
                self.lower_pointer(inner, b)
            }
            _ => Err(Diagnostic::node(target, "expected lvalue")),
        }
    }

    /// Address and declared type of `(. target :field)`.
    fn field_addr(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<(Value, String), Diagnostic> {
        let [_, target, field] = children else {
            return Err(Diagnostic::node(node, "expected (. target :field)"));
        };
        let name = target
            .symbol_name()
            .ok_or_else(|| Diagnostic::node(target, "expected struct variable"))?;
        let binding = self
            .env
            .lookup(name)
            .cloned()
            .ok_or_else(|| Diagnostic::node(target, format!("unknown variable '{}'", name)))?;
        let Binding::Slot { addr, ty } = binding else {
            return Err(Diagnostic::node(
                target,
                format!("'{}' is not a struct", name),
            ));
        };
        let def = self.types.struct_def(&ty).cloned().ok_or_else(|| {
            Diagnostic::node(target, format!("'{}' is not a struct", name))
        })?;
        let fname = field
            .keyword_name()
            .ok_or_else(|| Diagnostic::node(field, "expected field keyword"))?;
        let index = def.field_index(fname).ok_or_else(|| {
            Diagnostic::node(
                field,
                format!("struct '{}' has no field '{}'", def.name, fname),
            )
        })?;
        let field = &def.fields[index];
        let addr = b.ins().iadd_imm(addr, field.offset as i64);
        Ok((addr, field.ty.clone()))
    }
}
