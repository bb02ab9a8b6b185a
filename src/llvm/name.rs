// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Index of a linked module.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ModuleId(pub u32);

/// Index into the function arena. Inside a serialized [`super::Module`] the
/// index is module-local; [`super::Program::link`] relocates it.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FunctionId(pub u32);

/// Index into the global-variable arena, relocated like [`FunctionId`].
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GlobalId(pub u32);

/// Index of a block within its function.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId(pub u32);

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructionId {
    pub func: FunctionId,
    pub block: BlockId,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArgumentId {
    pub func: FunctionId,
    pub index: u32,
}

impl FunctionId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn offset(self, base: u32) -> Self {
        FunctionId(self.0 + base)
    }
}

impl GlobalId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn offset(self, base: u32) -> Self {
        GlobalId(self.0 + base)
    }
}

impl BlockId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl InstructionId {
    pub fn new(func: FunctionId, block: BlockId, index: u32) -> Self {
        InstructionId { func, block, index }
    }
}

impl Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl Display for InstructionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.func, self.block, self.index)
    }
}

impl Display for ArgumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:arg{}", self.func, self.index)
    }
}
