// SPDX-License-Identifier: BSD-3-Clause
//! Representation of whole-program LLVM IR that is amenable to analysis.
//!
//! The analyses need stable identities for values (to key maps by them),
//! def-use edges, predecessor lists and a way to link many modules into one
//! program. None of that is a natural fit for a borrowed bitcode AST, so we
//! reproduce the parts of LLVM's module structure we need, with plain index
//! identities ([`FunctionId`], [`InstructionId`], ...) instead of pointers.
//!
//! A [`Module`] can be built with [`builder`], deserialized from JSON, or (with
//! the `bitcode` feature) converted from LLVM bitcode. Modules are then linked
//! into a [`Program`], which answers the queries the analyses make.

use serde::{Deserialize, Serialize};

#[cfg(feature = "bitcode")]
pub mod bitcode;
pub mod builder;
pub mod constant;
mod error;
pub use error::*;
pub mod instruction;
mod name;
pub use name::*;
mod program;
pub use program::*;
mod terminator;
pub mod types;
mod value;
pub use value::*;

use self::instruction::{DebugLoc, Instruction};
use self::types::TypeRef;

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    /// The last instruction is the terminator.
    pub instrs: Vec<Instruction>,
}

impl Block {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instrs.last().filter(|i| i.opcode.is_terminator())
    }
}

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Other,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: Option<String>,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// A function type.
    pub ty: TypeRef,
    pub params: Vec<Param>,
    /// Empty for declarations.
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub linkage: Linkage,
    /// Location of the subprogram, if there is debug info.
    #[serde(default)]
    pub loc: Option<DebugLoc>,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_intrinsic(&self) -> bool {
        self.name.starts_with("llvm.")
    }

    pub fn is_var_arg(&self) -> bool {
        self.ty.signature().map(|(_, _, v)| v).unwrap_or(false)
    }

    pub fn return_type(&self) -> Option<&TypeRef> {
        self.ty.signature().map(|(r, _, _)| r)
    }

    pub fn block(&self, b: BlockId) -> &Block {
        &self.blocks[b.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    /// The type of the initializer, the global itself is a pointer to it.
    pub value_ty: TypeRef,
    #[serde(default)]
    pub initializer: Option<Value>,
    #[serde(default)]
    pub is_constant: bool,
    #[serde(default)]
    pub linkage: Linkage,
}

/// One translation unit. Ids inside it are module-local.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub globals: Vec<Global>,
}

impl Module {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn relocate(&mut self, functions: u32, globals: u32) {
        for f in &mut self.functions {
            for b in &mut f.blocks {
                for i in &mut b.instrs {
                    i.relocate(functions, globals);
                }
            }
        }
        for g in &mut self.globals {
            if let Some(init) = &g.initializer {
                g.initializer = Some(init.relocate(functions, globals));
            }
        }
    }
}
