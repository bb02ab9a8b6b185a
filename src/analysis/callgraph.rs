// SPDX-License-Identifier: BSD-3-Clause
//! Whole-program call graph.
//!
//! Functions are unified across modules by signature and name, so the same
//! `static inline` helper compiled into many translation units gets one
//! representative. Direct calls to declarations resolve to the external
//! definition of the same (normalized) name. Indirect calls resolve either by
//! [`crate::analysis::mlta`] or by structural signature matching, see
//! [`IndirectCalls`].

use std::collections::BTreeSet;

use tracing::{debug, info_span};

use super::mlta::{signature_matches, TypeAnalysis};
use crate::config::IndirectCalls;
use crate::context::GlobalContext;
use crate::llvm::instruction::Opcode;
use crate::llvm::types::TypeRef;
use crate::llvm::{Callee, Function, FunctionId, InstructionId, Linkage, ModuleId, Program};
use crate::pass::ModulePass;

/// Key under which definitions of the same function are unified.
pub fn unify_key(f: &Function) -> String {
    format!("{}{}", f.ty.key(), f.name)
}

/// Syscall wrappers are defined as `SyS_*` and called as `sys_*`.
pub fn normalized_name(name: &str) -> String {
    match name.strip_prefix("SyS_") {
        Some(rest) => format!("sys_{}", rest),
        None => name.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct CallGraph {
    types: TypeAnalysis,
    escapes_propagated: bool,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_indirect(&self, ctx: &GlobalContext<'_>, call: InstructionId) -> BTreeSet<FunctionId> {
        let program = ctx.program;
        let (called, args, function_ty) = match &program.instruction(call).opcode {
            Opcode::Call {
                callee: Callee::Value(called),
                args,
                function_ty,
            } => (called, args, function_ty),
            _ => return BTreeSet::new(),
        };
        match ctx.config.indirect_calls {
            IndirectCalls::Mlta => match ctx.sig_funcs.get(&function_ty.key()) {
                Some(first) => self.types.resolve(program, first, called),
                None => BTreeSet::new(),
            },
            IndirectCalls::Signature => {
                let arg_tys: Vec<TypeRef> = args.iter().map(|a| program.type_of(a)).collect();
                ctx.address_taken
                    .iter()
                    .copied()
                    .filter(|f| signature_matches(program.function(*f), &arg_tys))
                    .collect()
            }
        }
    }

    fn resolve_direct(ctx: &GlobalContext<'_>, cf: FunctionId) -> FunctionId {
        let program = ctx.program;
        let func = program.function(cf);
        if !func.is_declaration() {
            return ctx.unified_map.get(&unify_key(func)).copied().unwrap_or(cf);
        }
        match ctx.global_funcs.get(&normalized_name(&func.name)) {
            Some(def) => ctx
                .unified_map
                .get(&unify_key(program.function(*def)))
                .copied()
                .unwrap_or(*def),
            None => ctx
                .declarations
                .get(&unify_key(func))
                .copied()
                .unwrap_or(cf),
        }
    }

    fn confine_function(&mut self, program: &Program, f: FunctionId) {
        for (_, i) in program.instructions(f) {
            match &i.opcode {
                Opcode::Store { value, pointer } => self.types.confine_store(program, value, pointer),
                Opcode::Cast { operand, .. } => {
                    self.types.confine_cast(&program.type_of(operand), &i.ty)
                }
                _ => (),
            }
        }
    }
}

impl ModulePass for CallGraph {
    const ID: &'static str = "CallGraph";

    fn span(&self) -> tracing::Span {
        info_span!("callgraph")
    }

    fn initialize(&mut self, ctx: &mut GlobalContext<'_>, module: ModuleId) -> bool {
        let program = ctx.program;
        for g in program.module_globals(module) {
            if let Some(init) = &program.global(g).initializer {
                self.types.confine_initializer(program, init);
            }
        }

        for f in program.module_functions(module) {
            let func = program.function(f);
            if func.is_declaration() {
                ctx.declarations.entry(unify_key(func)).or_insert(f);
                continue;
            }
            self.confine_function(program, f);
            if program.is_address_taken(f) {
                ctx.address_taken.insert(f);
                ctx.sig_funcs.entry(func.ty.key()).or_default().insert(f);
            }
            if func.linkage == Linkage::External {
                ctx.global_funcs
                    .entry(normalized_name(&func.name))
                    .or_insert(f);
            }
            if !ctx.unified_map.contains_key(&unify_key(func)) {
                ctx.unified_map.insert(unify_key(func), f);
                ctx.unified_set.insert(f);
            }
        }
        false
    }

    fn run_on_module(&mut self, ctx: &mut GlobalContext<'_>, module: ModuleId) -> bool {
        if !self.escapes_propagated {
            self.types.propagate_escapes();
            self.escapes_propagated = true;
        }

        let program = ctx.program;
        for f in program.module_functions(module) {
            if !ctx.is_unified(f) {
                continue;
            }
            for (call, i) in program.instructions(f) {
                let callee = match &i.opcode {
                    Opcode::Call { callee, .. } => callee,
                    _ => continue,
                };
                let targets = match callee {
                    Callee::Asm { .. } => BTreeSet::new(),
                    Callee::Value(_) if program.is_indirect_call(call) => {
                        let targets = self.resolve_indirect(ctx, call);
                        ctx.indirect_calls.push(call);
                        if targets.is_empty() {
                            debug!("No targets for indirect call {} in {}", call, program.function(f).name);
                            ctx.unresolved.push(call);
                        }
                        targets
                    }
                    Callee::Value(_) => match program.called_function(call) {
                        Some(cf) => BTreeSet::from([Self::resolve_direct(ctx, cf)]),
                        None => BTreeSet::new(),
                    },
                };
                for t in &targets {
                    ctx.callers.entry(*t).or_default().insert(call);
                }
                ctx.callees.entry(call).or_default().extend(targets);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::normalized_name;

    #[test]
    fn syscall_names() {
        assert_eq!("sys_read", normalized_name("SyS_read"));
        assert_eq!("sys_read", normalized_name("sys_read"));
        assert_eq!("SyS", normalized_name("SyS"));
    }
}
