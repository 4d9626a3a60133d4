//! `cond` chains and `while` loops.

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{types, BlockArg, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;

use crate::error::Diagnostic;
use crate::syntax::{Node, NodeKind};

use super::Lowerer;

impl<'a> Lowerer<'a> {
    /// `(cond (test expr)… (else expr))`: a short-circuit chain whose
    /// clauses all coerce to float64 and join through a block parameter.
    pub(crate) fn form_cond(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        if children.len() < 2 {
            return Err(Diagnostic::node(node, "cond expects at least one clause"));
        }
        let join = b.create_block();
        b.append_block_param(join, types::F64);
        let mut terminated = false;
        for clause in &children[1..] {
            let NodeKind::List(parts) = &clause.kind else {
                return Err(Diagnostic::node(clause, "expected (test expr) clause"));
            };
            match parts.as_slice() {
                // a one-element clause, or an else test, is an unconditional
                // tail that ends the chain
                [expr] => {
                    self.cond_tail(expr, join, b)?;
                    terminated = true;
                    break;
                }
                [test, expr] if test.is_symbol("else") => {
                    self.cond_tail(expr, join, b)?;
                    terminated = true;
                    break;
                }
                [test, expr] => {
                    let test_val = self.lower_value(test, b)?;
                    let flag = self.nonzero(test_val, b);
                    let then_block = b.create_block();
                    let next_block = b.create_block();
                    b.ins().brif(flag, then_block, &[], next_block, &[]);
                    b.switch_to_block(then_block);
                    let val = self.lower_value(expr, b)?;
                    let val = self.coerce(val, types::F64, b);
                    b.ins().jump(join, &[BlockArg::from(val)]);
                    b.switch_to_block(next_block);
                }
                _ => return Err(Diagnostic::node(clause, "expected (test expr) clause")),
            }
        }
        if !terminated {
            // no unconditional tail; the chain falls through to 0.0
            let zero = b.ins().f64const(0.0);
            b.ins().jump(join, &[BlockArg::from(zero)]);
        }
        b.switch_to_block(join);
        Ok(b.block_params(join)[0])
    }

    fn cond_tail(
        &mut self,
        expr: &Node,
        join: cranelift_codegen::ir::Block,
        b: &mut FunctionBuilder,
    ) -> Result<(), Diagnostic> {
        let val = self.lower_value(expr, b)?;
        let val = self.coerce(val, types::F64, b);
        b.ins().jump(join, &[BlockArg::from(val)]);
        Ok(())
    }

    /// `(while test body)`: classical pre-test loop. The loop's value is 0.0.
    pub(crate) fn form_while(
        &mut self,
        node: &Node,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let [_, test, body] = children else {
            return Err(Diagnostic::node(node, "while expects a test and a body"));
        };
        let header = b.create_block();
        let body_block = b.create_block();
        let after = b.create_block();
        b.ins().jump(header, &[]);
        b.switch_to_block(header);
        let test_val = self.lower_value(test, b)?;
        let flag = self.nonzero(test_val, b);
        b.ins().brif(flag, body_block, &[], after, &[]);
        b.switch_to_block(body_block);
        self.lower(body, b)?;
        b.ins().jump(header, &[]);
        b.switch_to_block(after);
        Ok(b.ins().f64const(0.0))
    }

    /// Compare a value against zero with the ordered comparison for its type.
    pub(crate) fn nonzero(&self, value: Value, b: &mut FunctionBuilder) -> Value {
        let ty = b.func.dfg.value_type(value);
        if ty.is_float() {
            let zero = if ty == types::F32 {
                b.ins().f32const(0.0)
            } else {
                b.ins().f64const(0.0)
            };
            b.ins().fcmp(FloatCC::OrderedNotEqual, value, zero)
        } else {
            b.ins().icmp_imm(IntCC::NotEqual, value, 0)
        }
    }
}
