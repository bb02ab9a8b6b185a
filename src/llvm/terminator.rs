// SPDX-License-Identifier: BSD-3-Clause
use super::instruction::Opcode;
use super::name::BlockId;
use super::value::Value;

impl Opcode {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Ret { .. }
                | Opcode::Br { .. }
                | Opcode::CondBr { .. }
                | Opcode::Switch { .. }
                | Opcode::Unreachable
        )
    }

    /// Successors in LLVM order: the taken branch of a conditional branch
    /// comes first, the default destination of a switch comes first.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Opcode::Br { dest } => vec![*dest],
            Opcode::CondBr {
                true_dest,
                false_dest,
                ..
            } => vec![*true_dest, *false_dest],
            Opcode::Switch { default, cases, .. } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, b)| *b))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Condition of a conditional branch or switch.
    pub fn condition(&self) -> Option<&Value> {
        match self {
            Opcode::CondBr { condition, .. } => Some(condition),
            Opcode::Switch { condition, .. } => Some(condition),
            _ => None,
        }
    }

    /// Redirect the `idx`th successor.
    pub(crate) fn set_successor(&mut self, idx: usize, to: BlockId) {
        match self {
            Opcode::Br { dest } if idx == 0 => *dest = to,
            Opcode::CondBr { true_dest, .. } if idx == 0 => *true_dest = to,
            Opcode::CondBr { false_dest, .. } if idx == 1 => *false_dest = to,
            Opcode::Switch { default, .. } if idx == 0 => *default = to,
            Opcode::Switch { cases, .. } => {
                if let Some(case) = cases.get_mut(idx - 1) {
                    case.1 = to;
                }
            }
            _ => (),
        }
    }
}
