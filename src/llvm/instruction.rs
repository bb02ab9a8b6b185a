// SPDX-License-Identifier: BSD-3-Clause
use serde::{Deserialize, Serialize};

use super::name::BlockId;
use super::types::TypeRef;
use super::value::{Callee, Value};

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DebugLoc {
    pub file: String,
    pub line: u32,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    PtrToInt,
    IntToPtr,
    BitCast,
    AddrSpaceCast,
}

impl CastOp {
    pub fn is_pointer_cast(self) -> bool {
        matches!(self, CastOp::BitCast | CastOp::AddrSpaceCast)
    }
}

/// The single-operand instructions that are not casts, loads or allocas.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnaryOp {
    FNeg,
    Freeze,
    VaArg,
    ExtractValue,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VectorOp {
    ExtractElement,
    InsertElement,
    InsertValue,
    ShuffleVector,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "opcode")]
pub enum Opcode {
    Alloca {
        allocated: TypeRef,
    },
    Load {
        pointer: Value,
    },
    Store {
        value: Value,
        pointer: Value,
    },
    GetElementPtr {
        source: TypeRef,
        pointer: Value,
        indices: Vec<Value>,
    },
    Cast {
        op: CastOp,
        operand: Value,
    },
    Unary {
        op: UnaryOp,
        operand: Value,
    },
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        predicate: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        lhs: Value,
        rhs: Value,
    },
    Phi {
        incoming: Vec<(Value, BlockId)>,
    },
    Select {
        condition: Value,
        true_value: Value,
        false_value: Value,
    },
    Call {
        callee: Callee,
        args: Vec<Value>,
        function_ty: TypeRef,
    },
    Vector {
        op: VectorOp,
        operands: Vec<Value>,
    },
    Ret {
        value: Option<Value>,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        condition: Value,
        true_dest: BlockId,
        false_dest: BlockId,
    },
    Switch {
        condition: Value,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    },
    Unreachable,
    Other {
        operands: Vec<Value>,
    },
}

impl Opcode {
    /// All value operands, in LLVM operand order (the callee of a call comes
    /// after its arguments).
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Opcode::Alloca { .. } => Vec::new(),
            Opcode::Load { pointer } => vec![pointer],
            Opcode::Store { value, pointer } => vec![value, pointer],
            Opcode::GetElementPtr {
                pointer, indices, ..
            } => std::iter::once(pointer).chain(indices.iter()).collect(),
            Opcode::Cast { operand, .. } => vec![operand],
            Opcode::Unary { operand, .. } => vec![operand],
            Opcode::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Opcode::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            Opcode::FCmp { lhs, rhs } => vec![lhs, rhs],
            Opcode::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
            Opcode::Select {
                condition,
                true_value,
                false_value,
            } => vec![condition, true_value, false_value],
            Opcode::Call { callee, args, .. } => args.iter().chain(callee.value()).collect(),
            Opcode::Vector { operands, .. } => operands.iter().collect(),
            Opcode::Ret { value } => value.iter().collect(),
            Opcode::Br { .. } => Vec::new(),
            Opcode::CondBr { condition, .. } => vec![condition],
            Opcode::Switch { condition, .. } => vec![condition],
            Opcode::Unreachable => Vec::new(),
            Opcode::Other { operands } => operands.iter().collect(),
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Opcode::Alloca { .. } => Vec::new(),
            Opcode::Load { pointer } => vec![pointer],
            Opcode::Store { value, pointer } => vec![value, pointer],
            Opcode::GetElementPtr {
                pointer, indices, ..
            } => std::iter::once(pointer).chain(indices.iter_mut()).collect(),
            Opcode::Cast { operand, .. } => vec![operand],
            Opcode::Unary { operand, .. } => vec![operand],
            Opcode::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Opcode::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            Opcode::FCmp { lhs, rhs } => vec![lhs, rhs],
            Opcode::Phi { incoming } => incoming.iter_mut().map(|(v, _)| v).collect(),
            Opcode::Select {
                condition,
                true_value,
                false_value,
            } => vec![condition, true_value, false_value],
            Opcode::Call { callee, args, .. } => {
                let mut ops: Vec<&mut Value> = args.iter_mut().collect();
                if let Callee::Value(v) = callee {
                    ops.push(v);
                }
                ops
            }
            Opcode::Vector { operands, .. } => operands.iter_mut().collect(),
            Opcode::Ret { value } => value.iter_mut().collect(),
            Opcode::Br { .. } => Vec::new(),
            Opcode::CondBr { condition, .. } => vec![condition],
            Opcode::Switch { condition, .. } => vec![condition],
            Opcode::Unreachable => Vec::new(),
            Opcode::Other { operands } => operands.iter_mut().collect(),
        }
    }

    /// The LLVM `UnaryInstruction` family: allocas, loads, casts and
    /// [`UnaryOp`]s. Returns the operand the analyses follow through them;
    /// allocas have none.
    pub fn unary_operand(&self) -> Option<&Value> {
        match self {
            Opcode::Load { pointer } => Some(pointer),
            Opcode::Cast { operand, .. } => Some(operand),
            Opcode::Unary { operand, .. } => Some(operand),
            _ => None,
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Opcode::Alloca { .. } | Opcode::Load { .. } | Opcode::Cast { .. } | Opcode::Unary { .. }
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Opcode::Call { .. })
    }

    pub fn is_cmp(&self) -> bool {
        matches!(self, Opcode::ICmp { .. } | Opcode::FCmp { .. })
    }

    pub fn call_args(&self) -> &[Value] {
        match self {
            Opcode::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// Index of `v` among the arguments of a call.
    pub fn arg_index(&self, v: &Value) -> Option<usize> {
        self.call_args().iter().position(|a| a == v)
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub opcode: Opcode,
    pub ty: TypeRef,
    #[serde(default)]
    pub loc: Option<DebugLoc>,
}

impl Instruction {
    pub(crate) fn relocate(&mut self, functions: u32, globals: u32) {
        for v in self.opcode.operands_mut() {
            *v = v.relocate(functions, globals);
        }
    }
}
