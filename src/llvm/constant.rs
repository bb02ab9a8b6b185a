// SPDX-License-Identifier: BSD-3-Clause
use serde::{Deserialize, Serialize};
use triomphe::Arc;

use super::types::{Type, TypeRef};
use super::value::Value;

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExprOp {
    BitCast,
    PtrToInt,
    IntToPtr,
    AddrSpaceCast,
    GetElementPtr { source: TypeRef },
    Other,
}

/// Constants other than functions and globals, which are [`Value`]s of their
/// own.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Constant {
    /// `value` is sign-extended from `bits`.
    Int {
        bits: u32,
        value: i64,
    },
    Null {
        ty: TypeRef,
    },
    Undef {
        ty: TypeRef,
    },
    Zero {
        ty: TypeRef,
    },
    Aggregate {
        ty: TypeRef,
        elements: Vec<Value>,
    },
    Expr {
        op: ExprOp,
        operands: Vec<Value>,
        ty: TypeRef,
    },
    Other {
        ty: TypeRef,
    },
}

impl Constant {
    pub fn ty(&self) -> TypeRef {
        match self {
            Constant::Int { bits, .. } => Type::int(*bits),
            Constant::Null { ty } => ty.clone(),
            Constant::Undef { ty } => ty.clone(),
            Constant::Zero { ty } => ty.clone(),
            Constant::Aggregate { ty, .. } => ty.clone(),
            Constant::Expr { ty, .. } => ty.clone(),
            Constant::Other { ty } => ty.clone(),
        }
    }

    pub fn int_value(&self) -> Option<i64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Operands of constant expressions and elements of aggregates.
    pub fn operands(&self) -> &[Value] {
        match self {
            Constant::Aggregate { elements, .. } => elements,
            Constant::Expr { operands, .. } => operands,
            // No `_` pattern to ensure this is updated if the type changes
            Constant::Int { .. } => &[],
            Constant::Null { .. } => &[],
            Constant::Undef { .. } => &[],
            Constant::Zero { .. } => &[],
            Constant::Other { .. } => &[],
        }
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, Constant::Expr { .. })
    }

    pub fn is_pointer_cast(&self) -> bool {
        matches!(
            self,
            Constant::Expr {
                op: ExprOp::BitCast | ExprOp::AddrSpaceCast,
                ..
            }
        )
    }

    pub(crate) fn relocate(&self, functions: u32, globals: u32) -> Arc<Constant> {
        let relocate_all = |vs: &[Value]| -> Vec<Value> {
            vs.iter().map(|v| v.relocate(functions, globals)).collect()
        };
        Arc::new(match self {
            Constant::Aggregate { ty, elements } => Constant::Aggregate {
                ty: ty.clone(),
                elements: relocate_all(elements),
            },
            Constant::Expr { op, operands, ty } => Constant::Expr {
                op: op.clone(),
                operands: relocate_all(operands),
                ty: ty.clone(),
            },
            c => c.clone(),
        })
    }
}
