// SPDX-License-Identifier: BSD-3-Clause
//! Loop unrolling by back-edge removal.
//!
//! Every latch is redirected out of its loop, so each loop body is seen
//! exactly once. Path-sensitive markings then terminate and reachability no
//! longer wraps around loops.

use petgraph::algo::dominators::{self, Dominators as DomTree};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::llvm::{BlockId, FunctionId, Program};

fn node(b: BlockId) -> NodeIndex {
    NodeIndex::new(b.0 as usize)
}

/// Dominator tree of a function's CFG, rooted at the entry block.
#[derive(Debug)]
pub struct Dominators {
    /// `None` for functions without blocks.
    tree: Option<DomTree<NodeIndex>>,
}

impl Dominators {
    pub fn compute(program: &Program, f: FunctionId) -> Self {
        let func = program.function(f);
        let nblocks = func.blocks.len();
        if nblocks == 0 {
            return Dominators { tree: None };
        }
        // Node indices are block indices
        let mut cfg: DiGraph<BlockId, ()> = DiGraph::with_capacity(nblocks, nblocks);
        for b in func.block_ids() {
            cfg.add_node(b);
        }
        for b in func.block_ids() {
            for s in program.successors(f, b) {
                cfg.add_edge(node(b), node(s), ());
            }
        }
        Dominators {
            tree: Some(dominators::simple_fast(&cfg, node(BlockId(0)))),
        }
    }

    pub fn is_reachable(&self, b: BlockId) -> bool {
        self.tree
            .as_ref()
            .map_or(false, |t| t.dominators(node(b)).is_some())
    }

    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        match self.tree.as_ref().and_then(|t| t.dominators(node(b))) {
            Some(mut doms) => doms.any(|d| d == node(a)),
            None => false,
        }
    }

    /// Whether every path from the entry to `b` takes the edge `from -> to`.
    pub fn edge_dominates(
        &self,
        program: &Program,
        f: FunctionId,
        (from, to): (BlockId, BlockId),
        b: BlockId,
    ) -> bool {
        if !self.dominates(to, b) {
            return false;
        }
        if program.successors(f, from).iter().filter(|s| **s == to).count() > 1 {
            return false;
        }
        program
            .predecessors(f, to)
            .iter()
            .filter(|p| **p != from && self.is_reachable(**p))
            .all(|p| self.dominates(to, *p))
    }
}

/// Edges `latch -> header` whose header dominates the latch.
pub fn back_edges(program: &Program, f: FunctionId, doms: &Dominators) -> Vec<(BlockId, BlockId)> {
    let mut edges = Vec::new();
    for b in program.function(f).block_ids() {
        if !doms.is_reachable(b) {
            continue;
        }
        for s in program.successors(f, b) {
            if doms.dominates(s, b) && !edges.contains(&(b, s)) {
                edges.push((b, s));
            }
        }
    }
    edges
}

/// The retargeting of one latch terminator: successor indices and the block
/// they now lead to.
type Retarget = (BlockId, Vec<(usize, BlockId)>);

fn plan(program: &Program, f: FunctionId) -> Vec<Retarget> {
    let doms = Dominators::compute(program, f);
    let mut plan = Vec::new();
    for (latch, header) in back_edges(program, f, &doms) {
        let succs = program.successors(f, latch);
        let exit = if succs.len() == 1 {
            // `for` and `while`: leave through the header's exit
            program
                .successors(f, header)
                .into_iter()
                .filter(|s| !doms.edge_dominates(program, f, (header, *s), latch))
                .last()
        } else {
            // `do-while`: leave through the latch's own exit
            succs.iter().copied().find(|s| *s != header)
        };
        let exit = match exit {
            Some(e) => e,
            None => continue,
        };
        let indices: Vec<(usize, BlockId)> = succs
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == header)
            .map(|(idx, _)| (idx, exit))
            .collect();
        plan.push((latch, indices));
    }
    plan
}

/// Remove the back edges of `f`; returns how many latches were redirected.
pub fn unroll_function(program: &mut Program, f: FunctionId) -> usize {
    if program.function(f).is_declaration() {
        return 0;
    }
    let plan = plan(program, f);
    let func = program.function_mut(f);
    for (latch, indices) in &plan {
        if let Some(term) = func.blocks[latch.0 as usize].instrs.last_mut() {
            for (idx, to) in indices {
                term.opcode.set_successor(*idx, *to);
            }
        }
    }
    if !plan.is_empty() {
        debug!("Unrolled {} loop latches in {}", plan.len(), func.name);
    }
    plan.len()
}

pub fn unroll_loops(program: &mut Program) {
    let functions: Vec<FunctionId> = program.functions().map(|(id, _)| id).collect();
    let mut latches = 0;
    for f in functions {
        latches += unroll_function(program, f);
    }
    program.reindex();
    info!("Unrolled {} loop latches", latches);
}

#[cfg(test)]
mod tests {
    use super::{back_edges, unroll_loops, Dominators};
    use crate::llvm::builder::ModuleBuilder;
    use crate::llvm::instruction::IntPredicate;
    use crate::llvm::types::Type;
    use crate::llvm::{BlockId, Program, Value};

    fn while_loop() -> Program {
        let i32t = Type::int(32);
        let mut m = ModuleBuilder::new("a.c");
        let mut f = m.define("f", Type::func(Type::void(), vec![i32t.clone()], false));
        let entry = f.block("entry");
        let header = f.block("header");
        let body = f.block("body");
        let exit = f.block("exit");
        f.position(entry);
        f.br(header);
        f.position(header);
        let c = f.icmp(IntPredicate::Slt, f.arg(0), Value::int(32, 10));
        f.cond_br(c, body, exit);
        f.position(body);
        f.br(header);
        f.position(exit);
        f.ret(None);
        Program::from_modules([m.finish()]).unwrap()
    }

    #[test]
    fn dominators_of_while_loop() {
        let program = while_loop();
        let f = program.function_named("f").unwrap();
        let doms = Dominators::compute(&program, f);
        assert!(doms.is_reachable(BlockId(3)));
        assert!(doms.dominates(BlockId(1), BlockId(2)));
        assert!(doms.dominates(BlockId(1), BlockId(3)));
        assert!(!doms.dominates(BlockId(2), BlockId(3)));
        assert!(doms.edge_dominates(&program, f, (BlockId(1), BlockId(2)), BlockId(2)));
        assert!(!doms.edge_dominates(&program, f, (BlockId(1), BlockId(3)), BlockId(2)));
        assert_eq!(vec![(BlockId(2), BlockId(1))], back_edges(&program, f, &doms));
    }

    #[test]
    fn while_latch_leaves_through_header_exit() {
        let mut program = while_loop();
        let f = program.function_named("f").unwrap();
        unroll_loops(&mut program);
        assert_eq!(vec![BlockId(3)], program.successors(f, BlockId(2)));
        assert_eq!(&[BlockId(1), BlockId(2)], program.predecessors(f, BlockId(3)));
        assert_eq!(&[BlockId(0)], program.predecessors(f, BlockId(1)));
    }

    #[test]
    fn do_while_latch_leaves_through_its_exit() {
        let i32t = Type::int(32);
        let mut m = ModuleBuilder::new("a.c");
        let mut f = m.define("f", Type::func(Type::void(), vec![i32t.clone()], false));
        let entry = f.block("entry");
        let body = f.block("body");
        let exit = f.block("exit");
        f.position(entry);
        f.br(body);
        f.position(body);
        let c = f.icmp(IntPredicate::Ne, f.arg(0), Value::int(32, 0));
        f.cond_br(c, body, exit);
        f.position(exit);
        f.ret(None);
        let mut program = Program::from_modules([m.finish()]).unwrap();
        let f = program.function_named("f").unwrap();

        unroll_loops(&mut program);
        assert_eq!(vec![BlockId(2), BlockId(2)], program.successors(f, BlockId(1)));
        assert_eq!(&[BlockId(0)], program.predecessors(f, BlockId(1)));
    }
}
