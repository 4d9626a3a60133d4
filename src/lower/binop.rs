//! Binary operators and numeric promotion.
//!
//! If either operand is floating, both widen to float64 and the floating
//! instruction is used; comparisons in that path convert their flag back to
//! float64 so the expression stays numeric. Otherwise both operands widen to
//! the larger integer width with signed casts and comparisons return the
//! native boolean.

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{types, InstBuilder, Type, Value};
use cranelift_frontend::FunctionBuilder;

use crate::error::Diagnostic;
use crate::syntax::Node;

use super::Lowerer;

impl<'a> Lowerer<'a> {
    pub(crate) fn form_binop(
        &mut self,
        node: &Node,
        op: &str,
        children: &[Node],
        b: &mut FunctionBuilder,
    ) -> Result<Value, Diagnostic> {
        let [_, lhs, rhs] = children else {
            return Err(Diagnostic::node(node, "expected two operands"));
        };
        let lv = self.lower_value(lhs, b)?;
        let rv = self.lower_value(rhs, b)?;
        let lt = b.func.dfg.value_type(lv);
        let rt = b.func.dfg.value_type(rv);

        if lt.is_float() || rt.is_float() {
            let lv = self.coerce(lv, types::F64, b);
            let rv = self.coerce(rv, types::F64, b);
            return Ok(match op {
                "+" => b.ins().fadd(lv, rv),
                "-" => b.ins().fsub(lv, rv),
                "*" => b.ins().fmul(lv, rv),
                "/" => b.ins().fdiv(lv, rv),
                _ => {
                    let cc = float_cc(op)
                        .ok_or_else(|| Diagnostic::node(node, format!("unknown operator '{}'", op)))?;
                    let flag = b.ins().fcmp(cc, lv, rv);
                    // the comparison result stays numeric in the float path
                    self.coerce(flag, types::F64, b)
                }
            });
        }

        let ty = if lt.bits() >= rt.bits() { lt } else { rt };
        let lv = self.coerce(lv, ty, b);
        let rv = self.coerce(rv, ty, b);
        Ok(match op {
            "+" => b.ins().iadd(lv, rv),
            "-" => b.ins().isub(lv, rv),
            "*" => b.ins().imul(lv, rv),
            "/" => b.ins().sdiv(lv, rv),
            _ => {
                let cc = int_cc(op)
                    .ok_or_else(|| Diagnostic::node(node, format!("unknown operator '{}'", op)))?;
                b.ins().icmp(cc, lv, rv)
            }
        })
    }

    /// Convert `value` to `target` with the promotion rules used throughout:
    /// signed int/float conversion and signed width adjustment.
    pub(crate) fn coerce(&self, value: Value, target: Type, b: &mut FunctionBuilder) -> Value {
        let have = b.func.dfg.value_type(value);
        if have == target {
            return value;
        }
        match (have.is_float(), target.is_float()) {
            (false, true) => {
                // int/float conversion goes through at least 32 bits
                let value = if have.bits() < 32 {
                    b.ins().sextend(types::I32, value)
                } else {
                    value
                };
                b.ins().fcvt_from_sint(target, value)
            }
            (true, false) => {
                if target.bits() < 32 {
                    let wide = b.ins().fcvt_to_sint(types::I32, value);
                    b.ins().ireduce(target, wide)
                } else {
                    b.ins().fcvt_to_sint(target, value)
                }
            }
            (true, true) => {
                if target.bits() > have.bits() {
                    b.ins().fpromote(target, value)
                } else {
                    b.ins().fdemote(target, value)
                }
            }
            (false, false) => {
                if target.bits() > have.bits() {
                    b.ins().sextend(target, value)
                } else {
                    b.ins().ireduce(target, value)
                }
            }
        }
    }
}

fn int_cc(op: &str) -> Option<IntCC> {
    Some(match op {
        "==" => IntCC::Equal,
        "!=" => IntCC::NotEqual,
        "<" => IntCC::SignedLessThan,
        "<=" => IntCC::SignedLessThanOrEqual,
        ">" => IntCC::SignedGreaterThan,
        ">=" => IntCC::SignedGreaterThanOrEqual,
        _ => return None,
    })
}

fn float_cc(op: &str) -> Option<FloatCC> {
    Some(match op {
        "==" => FloatCC::Equal,
        "!=" => FloatCC::OrderedNotEqual,
        "<" => FloatCC::LessThan,
        "<=" => FloatCC::LessThanOrEqual,
        ">" => FloatCC::GreaterThan,
        ">=" => FloatCC::GreaterThanOrEqual,
        _ => return None,
    })
}
