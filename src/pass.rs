// SPDX-License-Identifier: BSD-3-Clause
//! Iterative whole-program passes.
//!
//! A pass sees the modules one at a time. [`run`] repeats each phase over all
//! modules until no module reports a change, which lets a pass carry state
//! from one sweep to the next (the missing-check detection counts in stages).

use tracing::{debug, info};

use crate::context::GlobalContext;
use crate::llvm::ModuleId;

pub trait ModulePass {
    const ID: &'static str;

    /// The span the pass runs in.
    fn span(&self) -> tracing::Span;

    fn initialize(&mut self, _ctx: &mut GlobalContext<'_>, _module: ModuleId) -> bool {
        false
    }

    /// Returns whether another sweep over the modules is needed.
    fn run_on_module(&mut self, ctx: &mut GlobalContext<'_>, module: ModuleId) -> bool;

    fn finalize(&mut self, _ctx: &mut GlobalContext<'_>, _module: ModuleId) -> bool {
        false
    }
}

pub fn run<P: ModulePass>(pass: &mut P, ctx: &mut GlobalContext<'_>) {
    let span = pass.span();
    let _enter = span.enter();

    let program = ctx.program;
    let modules: Vec<ModuleId> = program.module_ids().collect();
    let total = modules.len();

    info!("[{}] Initializing {} modules.", P::ID, total);
    loop {
        let mut changed = false;
        for m in &modules {
            changed |= pass.initialize(ctx, *m);
        }
        if !changed {
            break;
        }
    }

    let mut iter = 0;
    loop {
        iter += 1;
        let mut changed = 0;
        for (k, m) in modules.iter().enumerate() {
            debug!(
                "[{} / {}] [{} / {}] [{}]",
                P::ID,
                iter,
                k + 1,
                total,
                program.module(*m).name
            );
            if pass.run_on_module(ctx, *m) {
                changed += 1;
                debug!("[{} / {}] [CHANGED]", P::ID, iter);
            }
        }
        info!("[{}] Updated in {} modules.", P::ID, changed);
        if changed == 0 {
            break;
        }
    }

    info!("[{}] Postprocessing ...", P::ID);
    loop {
        let mut changed = false;
        for m in &modules {
            changed |= pass.finalize(ctx, *m);
        }
        if !changed {
            break;
        }
    }
    info!("[{}] Done!", P::ID);
}
