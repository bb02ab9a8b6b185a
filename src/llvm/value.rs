// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use triomphe::Arc;

use super::constant::{Constant, ExprOp};
use super::name::{ArgumentId, FunctionId, GlobalId, InstructionId};
use super::types::TypeRef;

/// An SSA value: the result of an instruction, a formal parameter, or a
/// constant. Functions and globals are constants in the LLVM sense too, see
/// [`Value::is_constant`].
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Value {
    Instruction(InstructionId),
    Argument(ArgumentId),
    Function(FunctionId),
    Global(GlobalId),
    Constant(Arc<Constant>),
}

impl Value {
    pub fn int(bits: u32, value: i64) -> Self {
        Value::Constant(Arc::new(Constant::Int { bits, value }))
    }

    pub fn null(ty: TypeRef) -> Self {
        Value::Constant(Arc::new(Constant::Null { ty }))
    }

    pub fn undef(ty: TypeRef) -> Self {
        Value::Constant(Arc::new(Constant::Undef { ty }))
    }

    pub fn aggregate(ty: TypeRef, elements: Vec<Value>) -> Self {
        Value::Constant(Arc::new(Constant::Aggregate { ty, elements }))
    }

    /// A `bitcast` constant expression.
    pub fn bitcast(self, ty: TypeRef) -> Self {
        Value::Constant(Arc::new(Constant::Expr {
            op: ExprOp::BitCast,
            operands: vec![self],
            ty,
        }))
    }

    /// A `getelementptr` constant expression.
    pub fn const_gep(source: TypeRef, pointer: Value, indices: Vec<Value>, ty: TypeRef) -> Self {
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(pointer);
        operands.extend(indices);
        Value::Constant(Arc::new(Constant::Expr {
            op: ExprOp::GetElementPtr { source },
            operands,
            ty,
        }))
    }

    /// Functions, globals and everything in [`Constant`].
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Global(_) | Value::Constant(_)
        )
    }

    pub fn as_instruction(&self) -> Option<InstructionId> {
        match self {
            Value::Instruction(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<FunctionId> {
        match self {
            Value::Function(f) => Some(*f),
            _ => None,
        }
    }

    pub(crate) fn relocate(&self, functions: u32, globals: u32) -> Value {
        match self {
            Value::Instruction(i) => Value::Instruction(InstructionId {
                func: i.func.offset(functions),
                ..*i
            }),
            Value::Argument(a) => Value::Argument(ArgumentId {
                func: a.func.offset(functions),
                ..*a
            }),
            Value::Function(f) => Value::Function(f.offset(functions)),
            Value::Global(g) => Value::Global(g.offset(globals)),
            Value::Constant(c) => Value::Constant(c.relocate(functions, globals)),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Instruction(i) => write!(f, "%{}", i),
            Value::Argument(a) => write!(f, "%{}", a),
            Value::Function(func) => write!(f, "@{}", func),
            Value::Global(g) => write!(f, "@g{}", g.0),
            Value::Constant(c) => match &**c {
                Constant::Int { value, .. } => write!(f, "{}", value),
                Constant::Null { .. } => write!(f, "null"),
                c => write!(f, "{:?}", c),
            },
        }
    }
}

/// What a call instruction calls.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Callee {
    Asm { asm: String },
    Value(Value),
}

impl Callee {
    pub fn is_asm(&self) -> bool {
        matches!(self, Callee::Asm { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Callee::Value(v) => Some(v),
            Callee::Asm { .. } => None,
        }
    }
}
