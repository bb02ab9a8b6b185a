// SPDX-License-Identifier: BSD-3-Clause
use super::name::{BlockId, FunctionId, InstructionId};

/// A module that does not describe well-formed IR.
#[derive(Clone, Debug, Hash, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Malformed LLVM module: block {block} of {func} has no terminator")]
    MissingTerminator { func: String, block: BlockId },
    #[error("Malformed LLVM module: {0} refers to a missing instruction")]
    DanglingInstruction(InstructionId),
    #[error("Malformed LLVM module: reference to missing function {0}")]
    DanglingFunction(FunctionId),
    #[error("Malformed LLVM module: reference to missing global g{0}")]
    DanglingGlobal(u32),
    #[error("Malformed LLVM module: {func} branches to missing block {block}")]
    DanglingBlock { func: String, block: BlockId },
    #[error("Malformed LLVM module: {0}")]
    Other(String),
}
