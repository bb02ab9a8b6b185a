// SPDX-License-Identifier: BSD-3-Clause
//! Per-function alias maps.
//!
//! The candidates are the pointers a function loads from, stores to or
//! passes to calls. Every pair is put to the [`AliasOracle`]; `Must` and
//! `Partial` answers are kept, and a `May` answer is kept only when both
//! pointers derive from the same source pointer.

use rustc_hash::FxHashSet;
use tracing::{debug, info_span};

use super::alias::{AliasOracle, AliasResult, BasicAlias};
use crate::context::{AliasMap, GlobalContext};
use crate::llvm::instruction::Opcode;
use crate::llvm::{FunctionId, ModuleId, Program, Value};
use crate::pass::ModulePass;

/// The pointer an address is computed from: follows pointer-typed unary
/// instructions and getelementptrs up to an argument, alloca, call or
/// global.
pub fn source_pointer(program: &Program, p: &Value) -> Value {
    let mut src = p.clone();
    let mut seen = FxHashSet::default();
    while seen.insert(src.clone()) {
        let next = match &src {
            Value::Argument(_) | Value::Global(_) => return src,
            Value::Instruction(i) => match &program.instruction(*i).opcode {
                Opcode::Alloca { .. } | Opcode::Call { .. } => return src,
                Opcode::GetElementPtr { pointer, .. } => pointer.clone(),
                op => match op.unary_operand() {
                    Some(o) if o.as_instruction().is_some() && program.type_of(o).is_pointer() => {
                        o.clone()
                    }
                    _ => return src,
                },
            },
            _ => return src,
        };
        src = next;
    }
    src
}

/// Pointers worth querying, in program order.
fn candidates(program: &Program, f: FunctionId) -> Vec<Value> {
    let mut seen = FxHashSet::default();
    let mut ptrs = Vec::new();
    let mut add = |v: &Value| {
        if seen.insert(v.clone()) {
            ptrs.push(v.clone());
        }
    };
    for (_, i) in program.instructions(f) {
        match &i.opcode {
            Opcode::Load { pointer } => add(pointer),
            Opcode::Store { pointer, .. } => add(pointer),
            Opcode::Call { args, .. } => {
                for a in args {
                    if program.type_of(a).is_pointer() {
                        add(a);
                    }
                }
            }
            _ => (),
        }
    }
    ptrs
}

/// The alias map of one function, or `None` if it has more than `max`
/// candidate pointers.
pub fn alias_map<O: AliasOracle>(
    program: &Program,
    oracle: &O,
    f: FunctionId,
    max: usize,
) -> Option<AliasMap> {
    let ptrs = candidates(program, f);
    if ptrs.len() > max {
        return None;
    }
    let sources: Vec<Value> = ptrs.iter().map(|p| source_pointer(program, p)).collect();
    let mut map = AliasMap::default();
    for (i, a) in ptrs.iter().enumerate() {
        for (j, b) in ptrs.iter().enumerate().skip(i + 1) {
            let aliased = match oracle.alias(program, f, a, b) {
                AliasResult::Must | AliasResult::Partial => true,
                AliasResult::May => sources[i] == sources[j],
                AliasResult::No => false,
            };
            if aliased {
                map.entry(a.clone()).or_default().insert(b.clone());
                map.entry(b.clone()).or_default().insert(a.clone());
            }
        }
    }
    Some(map)
}

#[derive(Debug, Default)]
pub struct PointerAnalysis<O = BasicAlias> {
    oracle: O,
}

impl<O: AliasOracle> PointerAnalysis<O> {
    pub fn new(oracle: O) -> Self {
        PointerAnalysis { oracle }
    }
}

impl<O: AliasOracle> ModulePass for PointerAnalysis<O> {
    const ID: &'static str = "PointerAnalysis";

    fn span(&self) -> tracing::Span {
        info_span!("pointer")
    }

    fn run_on_module(&mut self, ctx: &mut GlobalContext<'_>, module: ModuleId) -> bool {
        let program = ctx.program;
        for f in program.module_functions(module) {
            if program.function(f).is_declaration() {
                continue;
            }
            match alias_map(program, &self.oracle, f, ctx.config.max_alias_candidates) {
                Some(map) => {
                    ctx.aliases.insert(f, map);
                }
                None => debug!(
                    "Too many pointers in {}, skipping alias analysis",
                    program.function(f).name
                ),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{alias_map, source_pointer};
    use crate::analysis::alias::BasicAlias;
    use crate::llvm::builder::ModuleBuilder;
    use crate::llvm::types::Type;
    use crate::llvm::Program;

    #[test]
    fn must_alias_refinement() {
        let i32t = Type::int(32);
        let i32p = Type::ptr(i32t.clone());
        let mut m = ModuleBuilder::new("a.c");
        let mut f = m.define(
            "f",
            Type::func(Type::void(), vec![i32p.clone(), i32p.clone()], false),
        );
        let (p, q) = (f.arg(0), f.arg(1));
        let slot = f.alloca(i32p.clone());
        f.store(p.clone(), slot.clone());
        let loaded = f.load(slot.clone());
        let n = f.load(q.clone());
        let elem = f.gep(loaded.clone(), vec![n], i32p.clone());
        let _ = f.load(elem.clone());
        let _ = f.load(loaded.clone());
        f.ret(None);
        let f = f.id();
        let program = Program::from_modules([m.finish()]).unwrap();

        assert_eq!(slot, source_pointer(&program, &slot));
        assert_eq!(slot, source_pointer(&program, &elem));
        assert_eq!(q, source_pointer(&program, &q));

        let map = alias_map(&program, &BasicAlias, f, 1000).unwrap();
        // A variable index over the same loaded pointer
        assert!(map[&elem].contains(&loaded));
        assert!(map[&loaded].contains(&elem));
        // Unrelated arguments only may-alias
        assert!(!map.get(&q).map(|s| s.contains(&loaded)).unwrap_or(false));

        assert!(alias_map(&program, &BasicAlias, f, 2).is_none());
    }
}
