// SPDX-License-Identifier: BSD-3-Clause
//! Statistical detection of missing security checks in whole-program LLVM IR.

pub mod analysis;
pub mod config;
pub mod context;
pub mod layers;
pub mod llvm;
pub mod pass;
pub mod signatures;
pub mod source;

pub use config::Config;
pub use context::GlobalContext;
pub use signatures::Signatures;
