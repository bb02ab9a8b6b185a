// SPDX-License-Identifier: BSD-3-Clause
//! Best-effort data-flow queries over the IR.
//!
//! None of these are fixed-point analyses: each is a work-list walk over
//! def-use edges, restricted by CFG reachability where it matters, and
//! approximating reaching definitions with the alias maps of
//! [`crate::analysis::pointer`].

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::context::GlobalContext;
use crate::llvm::constant::Constant;
use crate::llvm::instruction::{Opcode, UnaryOp};
use crate::llvm::{BlockId, Callee, FunctionId, InstructionId, Program, Value};

/// A use of a value: the using instruction, and the argument position when
/// it is a call (`-1` otherwise, or when the value is called).
pub type Use = (InstructionId, i8);

/// `b` and every block reachable from it.
pub fn succ_reach(program: &Program, f: FunctionId, b: BlockId) -> FxHashSet<BlockId> {
    let mut reach = FxHashSet::default();
    let mut stack = vec![b];
    while let Some(tb) = stack.pop() {
        if reach.insert(tb) {
            stack.extend(program.successors(f, tb));
        }
    }
    reach
}

/// `b` and every block it is reachable from.
pub fn pred_reach(program: &Program, f: FunctionId, b: BlockId) -> FxHashSet<BlockId> {
    let mut reach = FxHashSet::default();
    let mut stack = vec![b];
    while let Some(tb) = stack.pop() {
        if reach.insert(tb) {
            stack.extend(program.predecessors(f, tb));
        }
    }
    reach
}

/// Position of `v` among the arguments of `call`.
pub fn arg_index(program: &Program, call: InstructionId, v: &Value) -> Option<i8> {
    match &program.instruction(call).opcode {
        Opcode::Call { args, .. } => args
            .iter()
            .position(|a| a == v)
            .and_then(|i| i8::try_from(i).ok()),
        _ => None,
    }
}

fn call_arg(program: &Program, call: InstructionId, idx: i8) -> Option<&Value> {
    match &program.instruction(call).opcode {
        Opcode::Call { args, .. } => usize::try_from(idx).ok().and_then(|i| args.get(i)),
        _ => None,
    }
}

/// Whether the write of `store` may be visible at `inst`: it comes earlier
/// in the same block, or `inst`'s block is reachable from the store's.
pub fn possible_use_st_result(program: &Program, inst: InstructionId, store: InstructionId) -> bool {
    if inst.func != store.func {
        return false;
    }
    if inst.block == store.block {
        return store.index <= inst.index;
    }
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([store.block]);
    while let Some(tb) = queue.pop_front() {
        if !visited.insert(tb) {
            continue;
        }
        if tb == inst.block {
            return true;
        }
        queue.extend(program.successors(store.func, tb));
    }
    false
}

/// Sources and critical variables found by a backward trace.
#[derive(Debug, Default)]
pub struct Trace {
    pub sources: BTreeSet<Value>,
    pub critical: BTreeSet<Value>,
    tracked: FxHashSet<Value>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn source(&mut self, v: &Value) {
        self.sources.insert(v.clone());
        self.critical.insert(v.clone());
    }
}

enum Step {
    Value(Value),
    /// Stores to, and fetches into, a pointer of a function.
    Alias(Value, FunctionId),
}

pub struct DataFlow<'c, 'p> {
    ctx: &'c GlobalContext<'p>,
    /// Load pointers already expanded by [`Self::perform_backward_analysis`].
    loaded: FxHashSet<Value>,
}

impl<'c, 'p> DataFlow<'c, 'p> {
    pub fn new(ctx: &'c GlobalContext<'p>) -> Self {
        DataFlow {
            ctx,
            loaded: FxHashSet::default(),
        }
    }

    /// Origins of `v` across functions: arguments continue into the
    /// matching argument of every caller, loads into the stores and
    /// user-data fetches of every aliased pointer.
    pub fn find_source_cv(&self, v: &Value, trace: &mut Trace) {
        let program = self.ctx.program;
        let signatures = &self.ctx.config.signatures;
        let mut work = vec![Step::Value(v.clone())];
        while let Some(step) = work.pop() {
            match step {
                Step::Alias(a, f) => {
                    if !trace.tracked.insert(a.clone()) {
                        continue;
                    }
                    for u in program.users(f, &a) {
                        match &program.instruction(*u).opcode {
                            Opcode::Store { value, pointer } if *pointer == a => {
                                work.push(Step::Value(value.clone()));
                            }
                            Opcode::Call { .. } => {
                                let name = program.called_name(*u);
                                if let Some((0, src)) = signatures.fetch(name) {
                                    if let Some(src) = call_arg(program, *u, src) {
                                        trace.sources.insert(src.clone());
                                        trace.sources.insert(Value::Instruction(*u));
                                        trace.critical.insert(src.clone());
                                        continue;
                                    }
                                }
                                if let Some((src, _, _)) = signatures.copy(name) {
                                    if let Some(src) = call_arg(program, *u, src) {
                                        work.push(Step::Value(src.clone()));
                                    }
                                }
                            }
                            _ => (),
                        }
                    }
                }
                Step::Value(v) => {
                    if !trace.tracked.insert(v.clone()) {
                        continue;
                    }
                    match &v {
                        Value::Global(_) => trace.source(&v),
                        Value::Constant(c) => match &**c {
                            Constant::Expr { operands, .. } if !operands.is_empty() => {
                                work.push(Step::Value(operands[0].clone()));
                            }
                            _ => {
                                trace.critical.insert(v.clone());
                            }
                        },
                        Value::Function(_) => {
                            trace.critical.insert(v.clone());
                        }
                        Value::Argument(a) => {
                            trace.critical.insert(v.clone());
                            let mut found = false;
                            for caller in self.ctx.callers(a.func) {
                                let arg = i8::try_from(a.index)
                                    .ok()
                                    .and_then(|idx| call_arg(program, caller, idx));
                                if let Some(arg) = arg {
                                    work.push(Step::Value(arg.clone()));
                                    found = true;
                                }
                            }
                            if !found {
                                trace.sources.insert(v.clone());
                            }
                        }
                        Value::Instruction(id) => {
                            trace.critical.insert(v.clone());
                            self.source_cv_step(*id, &mut work, trace);
                        }
                    }
                }
            }
        }
    }

    fn source_cv_step(&self, id: InstructionId, work: &mut Vec<Step>, trace: &mut Trace) {
        let program = self.ctx.program;
        match &program.instruction(id).opcode {
            Opcode::Call { callee, args, .. } => {
                let name = program.called_name(id);
                let src = match self.ctx.config.signatures.fetch(name) {
                    Some((-1, src)) => call_arg(program, id, src),
                    Some(_) => None,
                    None if matches!(callee, Callee::Asm { .. }) && name.contains("get_user") => {
                        args.first()
                    }
                    None => None,
                };
                if let Some(src) = src {
                    trace.sources.insert(src.clone());
                    trace.sources.insert(Value::Instruction(id));
                    trace.critical.insert(src.clone());
                }
            }
            Opcode::Select {
                true_value,
                false_value,
                ..
            } => {
                work.push(Step::Value(true_value.clone()));
                work.push(Step::Value(false_value.clone()));
            }
            Opcode::GetElementPtr { pointer, .. } => work.push(Step::Value(pointer.clone())),
            Opcode::Phi { incoming } => {
                work.extend(incoming.iter().map(|(iv, _)| Step::Value(iv.clone())));
            }
            Opcode::Load { pointer } => {
                for a in self.ctx.alias_pointers(id.func, pointer) {
                    work.push(Step::Alias(a, id.func));
                }
            }
            Opcode::ICmp { .. } | Opcode::Alloca { .. } => (),
            Opcode::Cast { operand, .. } | Opcode::Unary { operand, .. } => {
                work.push(Step::Value(operand.clone()))
            }
            Opcode::Binary { lhs, rhs, .. } => {
                for o in [lhs, rhs] {
                    if !o.is_constant() {
                        work.push(Step::Value(o.clone()));
                    }
                }
            }
            _ => {
                let v = Value::Instruction(id);
                trace!("No sources of {}", v);
            }
        }
    }

    /// Origins of `v` within its function. Loads follow the stores (to
    /// aliased pointers) in blocks that reach them; a pointer passed to a
    /// call there counts as a source.
    pub fn find_in_func_source_cv(&self, v: &Value, trace: &mut Trace) {
        let program = self.ctx.program;
        let mut work = vec![v.clone()];
        while let Some(v) = work.pop() {
            if !trace.tracked.insert(v.clone()) {
                continue;
            }
            let id = match &v {
                Value::Instruction(id) => *id,
                _ => {
                    trace.source(&v);
                    continue;
                }
            };
            match &program.instruction(id).opcode {
                Opcode::Alloca { .. } | Opcode::Call { .. } => trace.source(&v),
                Opcode::Select {
                    true_value,
                    false_value,
                    ..
                } => {
                    trace.critical.insert(v.clone());
                    work.push(true_value.clone());
                    work.push(false_value.clone());
                }
                Opcode::GetElementPtr { pointer, .. } => {
                    trace.critical.insert(v.clone());
                    work.push(pointer.clone());
                }
                Opcode::Phi { incoming } => {
                    trace.critical.insert(v.clone());
                    work.extend(incoming.iter().map(|(iv, _)| iv.clone()));
                }
                Opcode::Load { pointer } => {
                    trace.critical.insert(v.clone());
                    let reach = pred_reach(program, id.func, id.block);
                    for a in self.ctx.alias_pointers(id.func, pointer) {
                        for u in program.users(id.func, &a) {
                            if !reach.contains(&u.block) {
                                continue;
                            }
                            match &program.instruction(*u).opcode {
                                Opcode::Store { value, pointer } if *pointer == a => {
                                    work.push(value.clone());
                                }
                                Opcode::Call { .. } => {
                                    if arg_index(program, *u, &a).is_some() {
                                        trace.source(&a);
                                    }
                                }
                                _ => (),
                            }
                        }
                    }
                    work.push(pointer.clone());
                }
                Opcode::ICmp { .. } => {
                    trace.critical.insert(v.clone());
                }
                Opcode::Cast { operand, .. } | Opcode::Unary { operand, .. } => {
                    trace.critical.insert(v.clone());
                    work.push(operand.clone());
                }
                Opcode::Binary { lhs, rhs, .. } => {
                    trace.critical.insert(v.clone());
                    work.push(lhs.clone());
                    work.push(rhs.clone());
                }
                _ => (),
            }
        }
    }

    /// Globals and constants `v` is computed from. Calls are opaque, except
    /// for the overflow intrinsics, which are arithmetic.
    pub fn find_sources(&self, v: &Value) -> BTreeSet<Value> {
        let program = self.ctx.program;
        let mut sources = BTreeSet::new();
        let mut visited = FxHashSet::default();
        let mut work = vec![v.clone()];
        while let Some(v) = work.pop() {
            if !visited.insert(v.clone()) {
                continue;
            }
            let id = match &v {
                Value::Instruction(id) => *id,
                Value::Argument(_) => continue,
                Value::Constant(c) => {
                    match &**c {
                        Constant::Expr { operands, .. } if !operands.is_empty() => {
                            work.push(operands[0].clone())
                        }
                        _ => {
                            sources.insert(v.clone());
                        }
                    }
                    continue;
                }
                Value::Global(_) | Value::Function(_) => {
                    sources.insert(v.clone());
                    continue;
                }
            };
            match &program.instruction(id).opcode {
                Opcode::Call { args, .. } => {
                    let overflow = program
                        .called_function(id)
                        .map(|cf| program.function(cf).name.contains("with.overflow"))
                        .unwrap_or(false);
                    if overflow {
                        work.extend(args.iter().cloned());
                    }
                }
                Opcode::Load { pointer } => work.push(pointer.clone()),
                Opcode::Select {
                    true_value,
                    false_value,
                    ..
                } => {
                    work.push(true_value.clone());
                    work.push(false_value.clone());
                }
                Opcode::GetElementPtr { pointer, .. } => work.push(pointer.clone()),
                Opcode::Phi { incoming } => work.extend(incoming.iter().map(|(iv, _)| iv.clone())),
                Opcode::ICmp { lhs, rhs, .. } => {
                    work.push(lhs.clone());
                    work.push(rhs.clone());
                }
                Opcode::Binary { lhs, rhs, .. } => {
                    work.extend([lhs, rhs].into_iter().filter(|o| !o.is_constant()).cloned());
                }
                Opcode::Cast { operand, .. } | Opcode::Unary { operand, .. } => {
                    work.push(operand.clone())
                }
                _ => (),
            }
        }
        sources
    }

    /// Uses of `target` in blocks reachable from `border`: dereferences,
    /// memory accesses, comparisons and call arguments. The trace continues
    /// through values derived from the target, and through memory it is
    /// stored to.
    pub fn find_uses(&self, border: InstructionId, target: &Value) -> BTreeSet<Use> {
        let program = self.ctx.program;
        let f = border.func;
        let reach = succ_reach(program, f, border.block);
        let mut uses = BTreeSet::new();
        let mut visited = FxHashSet::default();
        let mut work = vec![target.clone()];
        while let Some(t) = work.pop() {
            if !visited.insert(t.clone()) {
                continue;
            }
            for u in program.users(f, &t) {
                if *u == border {
                    continue;
                }
                let reached = reach.contains(&u.block);
                let user = Value::Instruction(*u);
                match &program.instruction(*u).opcode {
                    Opcode::GetElementPtr { pointer, .. } => {
                        if reached {
                            uses.insert((*u, -1));
                            if *pointer == t {
                                work.push(user);
                            }
                        }
                    }
                    Opcode::Load { .. } => {
                        if reached {
                            uses.insert((*u, -1));
                        }
                    }
                    Opcode::Store { pointer, .. } if *pointer == t => {
                        if reached {
                            uses.insert((*u, -1));
                        }
                    }
                    Opcode::Store { pointer, .. } => {
                        for a in self.ctx.alias_pointers(f, pointer) {
                            for au in program.users(f, &a) {
                                if !reach.contains(&au.block) {
                                    continue;
                                }
                                if let Opcode::Load { .. } = program.instruction(*au).opcode {
                                    work.push(Value::Instruction(*au));
                                }
                            }
                        }
                    }
                    Opcode::ICmp { .. } | Opcode::FCmp { .. } => {
                        if reached {
                            uses.insert((*u, -1));
                        }
                    }
                    Opcode::Call { .. } => {
                        if reached {
                            uses.insert((*u, arg_index(program, *u, &t).unwrap_or(-1)));
                        }
                    }
                    Opcode::Vector { .. }
                    | Opcode::Ret { .. }
                    | Opcode::Unary {
                        op: UnaryOp::ExtractValue,
                        ..
                    } => (),
                    // A constant operand rules out a division by the target
                    Opcode::Binary { lhs, rhs, .. } => {
                        if !lhs.is_constant() && !rhs.is_constant() {
                            work.push(user);
                        }
                    }
                    Opcode::Cast { .. } | Opcode::Unary { .. } => work.push(user),
                    _ => (),
                }
            }
        }
        uses
    }

    /// Calls in `f` that may have produced `v`.
    pub fn perform_backward_analysis(&mut self, f: FunctionId, v: &Value) -> BTreeSet<InstructionId> {
        let program = self.ctx.program;
        let mut calls = BTreeSet::new();
        let mut visited = FxHashSet::default();
        let mut work = vec![v.clone()];
        while let Some(v) = work.pop() {
            if !visited.insert(v.clone()) {
                continue;
            }
            let id = match v.as_instruction() {
                Some(id) => id,
                None => continue,
            };
            match &program.instruction(id).opcode {
                Opcode::Call { .. } => {
                    calls.insert(id);
                }
                Opcode::Load { pointer } => {
                    if !self.loaded.insert(pointer.clone()) {
                        continue;
                    }
                    for (st, i) in program.instructions(f) {
                        if let Opcode::Store {
                            value,
                            pointer: dest,
                        } = &i.opcode
                        {
                            if dest == pointer && possible_use_st_result(program, id, st) {
                                work.push(value.clone());
                            }
                        }
                    }
                }
                Opcode::Alloca { .. } => (),
                Opcode::Cast { operand, .. } | Opcode::Unary { operand, .. } => {
                    work.push(operand.clone())
                }
                Opcode::Binary { lhs, rhs, .. }
                | Opcode::ICmp { lhs, rhs, .. }
                | Opcode::FCmp { lhs, rhs } => {
                    work.push(lhs.clone());
                    work.push(rhs.clone());
                }
                Opcode::Phi { incoming } => work.extend(incoming.iter().map(|(iv, _)| iv.clone())),
                Opcode::GetElementPtr { pointer, .. } => work.push(pointer.clone()),
                Opcode::Select {
                    true_value,
                    false_value,
                    ..
                } => {
                    work.push(true_value.clone());
                    work.push(false_value.clone());
                }
                _ => trace!(
                    "Unsupported value {} in {}",
                    v,
                    program.function(f).name
                ),
            }
        }
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::{possible_use_st_result, pred_reach, succ_reach, DataFlow, Trace};
    use crate::config::Config;
    use crate::context::GlobalContext;
    use crate::llvm::builder::ModuleBuilder;
    use crate::llvm::instruction::{BinaryOp, IntPredicate};
    use crate::llvm::types::Type;
    use crate::llvm::{BlockId, InstructionId, Program, Value};

    #[test]
    fn reachability() {
        let i32t = Type::int(32);
        let mut m = ModuleBuilder::new("a.c");
        let mut f = m.define("f", Type::func(Type::void(), vec![i32t.clone()], false));
        let entry = f.block("entry");
        let then = f.block("then");
        let exit = f.block("exit");
        let c = f.icmp(IntPredicate::Eq, f.arg(0), Value::int(32, 0));
        f.cond_br(c.clone(), then, exit);
        f.position(then);
        let slot = f.alloca(i32t.clone());
        f.store(Value::int(32, 1), slot.clone());
        f.br(exit);
        f.position(exit);
        f.ret(None);
        let f = f.id();
        let program = Program::from_modules([m.finish()]).unwrap();

        assert_eq!(3, succ_reach(&program, f, entry).len());
        let from_then = succ_reach(&program, f, then);
        assert!(from_then.contains(&then) && from_then.contains(&exit));
        assert!(!from_then.contains(&entry));
        assert_eq!(3, pred_reach(&program, f, exit).len());
        assert_eq!(2, pred_reach(&program, f, then).len());

        let store = InstructionId::new(f, BlockId(1), 1);
        let alloca = InstructionId::new(f, BlockId(1), 0);
        let ret = InstructionId::new(f, BlockId(2), 0);
        assert!(possible_use_st_result(&program, ret, store));
        assert!(!possible_use_st_result(&program, alloca, store));
        assert!(!possible_use_st_result(&program, c.as_instruction().unwrap(), store));
    }

    #[test]
    fn sources_and_uses() {
        let i32t = Type::int(32);
        let mut m = ModuleBuilder::new("a.c");
        let get = m.declare("get", Type::func(i32t.clone(), vec![], false));
        let put = m.declare("put", Type::func(Type::void(), vec![i32t.clone()], false));
        let mut f = m.define("f", Type::func(i32t.clone(), vec![i32t.clone()], false));
        let slot = f.alloca(i32t.clone());
        let r = f.call(get, vec![]);
        f.store(r.clone(), slot.clone());
        let x = f.load(slot.clone());
        let sum = f.binary(BinaryOp::Add, x.clone(), f.arg(0));
        let c = f.icmp(IntPredicate::Slt, sum.clone(), Value::int(32, 0));
        let _ = f.call(put, vec![x.clone()]);
        f.ret(Some(c.clone()));
        let program = Program::from_modules([m.finish()]).unwrap();
        let config = Config::default();
        let ctx = GlobalContext::new(&program, &config);
        let mut dfa = DataFlow::new(&ctx);

        let mut trace = Trace::new();
        dfa.find_in_func_source_cv(&sum, &mut trace);
        assert!(trace.sources.contains(&r));
        assert!(trace.sources.contains(&slot));
        assert!(trace.sources.contains(&f_arg(&program)));
        assert!(trace.critical.contains(&x));

        let calls = dfa.perform_backward_analysis(x.as_instruction().unwrap().func, &c);
        assert_eq!(vec![r.as_instruction().unwrap()], calls.into_iter().collect::<Vec<_>>());

        let border = c.as_instruction().unwrap();
        let uses = dfa.find_uses(border, &x);
        let put_call = InstructionId::new(border.func, BlockId(0), 6);
        assert!(uses.contains(&(put_call, 0)));
        assert!(!uses.iter().any(|(u, _)| *u == border));

        // The call is opaque and the alloca holds no constant
        let sources = dfa.find_sources(&c);
        assert_eq!(vec![Value::int(32, 0)], sources.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn sources_cross_callers() {
        let i8t = Type::int(8);
        let i8p = Type::ptr(i8t.clone());
        let mut m = ModuleBuilder::new("a.c");
        let fetch = m.declare(
            "copy_from_user",
            Type::func(Type::int(64), vec![i8p.clone(), i8p.clone(), Type::int(64)], false),
        );
        let mut g = m.define("g", Type::func(Type::void(), vec![i8t.clone()], false));
        g.ret(None);
        let g_arg = g.arg(0);
        let g = g.value();
        let mut f = m.define("f", Type::func(Type::void(), vec![i8p.clone()], false));
        let buf = f.alloca(i8t.clone());
        let copy = f.call(fetch, vec![buf.clone(), f.arg(0), Value::int(64, 1)]);
        let v = f.load(buf.clone());
        f.call(g, vec![v.clone()]);
        f.ret(None);
        let user = f.arg(0);
        let program = Program::from_modules([m.finish()]).unwrap();
        let config = Config::default();
        let mut ctx = GlobalContext::new(&program, &config);
        crate::analysis::call_graph(&mut ctx);
        let dfa = DataFlow::new(&ctx);

        let mut trace = Trace::new();
        dfa.find_source_cv(&g_arg, &mut trace);
        assert_eq!(
            vec![copy, user.clone()],
            trace.sources.iter().cloned().collect::<Vec<_>>()
        );
        assert!(trace.critical.contains(&g_arg));
        assert!(trace.critical.contains(&v));
        assert!(trace.critical.contains(&user));
    }

    fn f_arg(program: &Program) -> Value {
        let f = program.function_named("f").unwrap();
        program.argument(f, 0).unwrap()
    }
}
