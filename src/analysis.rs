// SPDX-License-Identifier: BSD-3-Clause
//! The analyses, and the pipelines that chain them.

use tracing::info;

use crate::context::GlobalContext;
use crate::pass;

pub mod alias;
pub mod callgraph;
pub mod checks;
pub mod dataflow;
pub mod missing;
pub mod mlta;
pub mod pointer;
pub mod unroll;

/// Build the call graph.
pub fn call_graph(ctx: &mut GlobalContext<'_>) {
    pass::run(&mut callgraph::CallGraph::new(), ctx);
    info!(
        "{} indirect calls, {} unresolved",
        ctx.indirect_calls.len(),
        ctx.unresolved.len()
    );
}

/// Recognize the security checks. Needs the call graph.
pub fn security_checks(ctx: &mut GlobalContext<'_>) {
    pass::run(&mut checks::SecurityChecks::new(), ctx);
    info!(
        "{} security checks in {} conditional statements",
        ctx.stats.security_checks, ctx.stats.cond_statements
    );
}

/// Alias maps, security checks, then missing-check detection. Needs the
/// call graph.
pub fn missing_checks(ctx: &mut GlobalContext<'_>) -> missing::MissingChecks {
    pass::run(&mut pointer::PointerAnalysis::<alias::BasicAlias>::default(), ctx);
    security_checks(ctx);
    let mut mc = missing::MissingChecks::new();
    pass::run(&mut mc, ctx);
    mc
}
