// SPDX-License-Identifier: BSD-3-Clause
//! The analysis context shared by every pass.
//!
//! Each map is filled by exactly one pass ([`crate::analysis::callgraph`]
//! fills the call-graph maps, [`crate::analysis::pointer`] the alias maps,
//! [`crate::analysis::checks`] the check sets) and only read afterwards.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::analysis::checks::SecurityCheck;
use crate::config::Config;
use crate::llvm::{FunctionId, InstructionId, Program, Value};
use crate::source::SourceTree;

/// Pointer to the other pointers of the same function it may alias.
pub type AliasMap = FxHashMap<Value, FxHashSet<Value>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Recognized security checks.
    pub security_checks: usize,
    /// Branches, switches and selects inspected for checks.
    pub cond_statements: usize,
}

#[derive(Debug)]
pub struct GlobalContext<'p> {
    pub program: &'p Program,
    pub config: &'p Config,
    pub sources: SourceTree,

    /// External definitions by (normalized) name.
    pub global_funcs: FxHashMap<String, FunctionId>,
    pub address_taken: BTreeSet<FunctionId>,
    /// Canonical definition per signature-and-name key.
    pub unified_map: FxHashMap<String, FunctionId>,
    pub unified_set: FxHashSet<FunctionId>,
    /// Canonical declaration per signature-and-name key, for functions
    /// defined nowhere.
    pub declarations: FxHashMap<String, FunctionId>,
    /// Address-taken definitions by function-type key.
    pub sig_funcs: FxHashMap<String, BTreeSet<FunctionId>>,
    pub callees: FxHashMap<InstructionId, BTreeSet<FunctionId>>,
    pub callers: FxHashMap<FunctionId, BTreeSet<InstructionId>>,
    pub indirect_calls: Vec<InstructionId>,
    /// Indirect calls no target was found for.
    pub unresolved: Vec<InstructionId>,

    pub aliases: FxHashMap<FunctionId, AliasMap>,

    pub security_checks: BTreeMap<FunctionId, BTreeSet<SecurityCheck>>,
    /// Conditions of the security checks, per function.
    pub check_insts: FxHashMap<FunctionId, FxHashSet<Value>>,

    pub stats: Statistics,
}

impl<'p> GlobalContext<'p> {
    pub fn new(program: &'p Program, config: &'p Config) -> Self {
        GlobalContext {
            program,
            config,
            sources: SourceTree::new(config.source_root.clone(), config.strip_components),
            global_funcs: FxHashMap::default(),
            address_taken: BTreeSet::new(),
            unified_map: FxHashMap::default(),
            unified_set: FxHashSet::default(),
            declarations: FxHashMap::default(),
            sig_funcs: FxHashMap::default(),
            callees: FxHashMap::default(),
            callers: FxHashMap::default(),
            indirect_calls: Vec::new(),
            unresolved: Vec::new(),
            aliases: FxHashMap::default(),
            security_checks: BTreeMap::new(),
            check_insts: FxHashMap::default(),
            stats: Statistics::default(),
        }
    }

    pub fn callees(&self, call: InstructionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.callees.get(&call).into_iter().flatten().copied()
    }

    /// The lowest-numbered resolved callee.
    pub fn first_callee(&self, call: InstructionId) -> Option<FunctionId> {
        self.callees(call).next()
    }

    pub fn callers(&self, f: FunctionId) -> impl Iterator<Item = InstructionId> + '_ {
        self.callers.get(&f).into_iter().flatten().copied()
    }

    pub fn is_unified(&self, f: FunctionId) -> bool {
        self.unified_set.contains(&f)
    }

    /// `ptr` and the pointers of `f` it may alias.
    pub fn alias_pointers(&self, f: FunctionId, ptr: &Value) -> Vec<Value> {
        let mut ptrs = vec![ptr.clone()];
        if let Some(aliases) = self.aliases.get(&f).and_then(|m| m.get(ptr)) {
            ptrs.extend(aliases.iter().filter(|a| *a != ptr).cloned());
        }
        ptrs
    }

    pub fn is_check_inst(&self, f: FunctionId, v: &Value) -> bool {
        self.check_insts
            .get(&f)
            .map(|s| s.contains(v))
            .unwrap_or(false)
    }
}
