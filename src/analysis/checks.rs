// SPDX-License-Identifier: BSD-3-Clause
//! Recognition of security checks.
//!
//! A check is a branch (or select) condition that separates an error path
//! from a non-error path. Blocks are first seeded with error facts: blocks
//! that pick the errno a function returns, and blocks that call an
//! error-handling function. The facts are then spread over the CFG edges,
//! and every conditional terminator whose outgoing edges disagree (one
//! surely leads to an error, another does not) guards a check.

use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};
use std::ops::{BitOr, BitOrAssign};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info_span, trace};

use crate::context::GlobalContext;
use crate::llvm::constant::Constant;
use crate::llvm::instruction::{DebugLoc, Opcode};
use crate::llvm::{BlockId, FunctionId, InstructionId, ModuleId, Program, Value};
use crate::pass::ModulePass;

const ERRNO_PREFIX: i64 = 0x4ced_b000;
const ERRNO_MASK: i64 = 0xffff_f000;

/// Encoded errnos carry a fixed prefix.
pub fn is_errno(x: i64) -> bool {
    (x & ERRNO_MASK) == ERRNO_PREFIX
}

/// Whether `v` is an error code when returned from `f`: an encoded errno
/// of either sign, a small negative integer, or null from a function
/// returning a pointer.
pub fn is_value_errno(program: &Program, v: &Value, f: FunctionId) -> bool {
    let c = match v.as_constant() {
        Some(c) => c,
        None => return false,
    };
    match c {
        Constant::Int { value, .. } => {
            is_errno(*value) || is_errno(value.wrapping_neg()) || (-4096 < *value && *value < 0)
        }
        Constant::Null { .. } => program
            .function(f)
            .return_type()
            .map(|t| t.is_pointer())
            .unwrap_or(false),
        Constant::Expr { operands, .. } => operands.iter().any(|o| is_value_errno(program, o, f)),
        _ => false,
    }
}

/// Error facts of a block or edge. The low nibble says whether an error is
/// returned, the high nibble whether one is handled.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct ErrFlags(u8);

impl ErrFlags {
    pub const NONE: ErrFlags = ErrFlags(0);
    pub const MUST_RETURN: ErrFlags = ErrFlags(1);
    pub const MAY_RETURN: ErrFlags = ErrFlags(2);
    pub const MUST_HANDLE: ErrFlags = ErrFlags(16);
    pub const MAY_HANDLE: ErrFlags = ErrFlags(32);

    const RETURN_MASK: u8 = 0x0f;
    const HANDLE_MASK: u8 = 0xf0;

    /// Whether any bit of `other` is set.
    pub fn has(self, other: ErrFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn return_bits(self) -> ErrFlags {
        ErrFlags(self.0 & Self::RETURN_MASK)
    }

    pub fn handle_bits(self) -> ErrFlags {
        ErrFlags(self.0 & Self::HANDLE_MASK)
    }

    /// Replace the return bits, if `new` has any.
    pub fn update_return(&mut self, new: ErrFlags) {
        if new.0 & Self::RETURN_MASK != 0 {
            self.0 = (self.0 & !Self::RETURN_MASK) | (new.0 & Self::RETURN_MASK);
        }
    }

    /// Replace the handle bits, if `new` has any. `MUST_HANDLE` is final.
    pub fn update_handle(&mut self, new: ErrFlags) {
        if self.has(Self::MUST_HANDLE) {
            return;
        }
        if new.0 & Self::HANDLE_MASK != 0 {
            self.0 = (self.0 & !Self::HANDLE_MASK) | (new.0 & Self::HANDLE_MASK);
        }
    }

    /// Join the facts of two paths meeting: `MUST` only if both must, `MAY`
    /// if either may, otherwise whichever side knows something.
    pub fn merge(&mut self, new: ErrFlags) {
        fn join(old: ErrFlags, new: ErrFlags, must: ErrFlags, may: ErrFlags, mask: u8) -> u8 {
            if old.has(must) && new.has(must) {
                must.0
            } else if old.has(may) || new.has(may) {
                may.0
            } else if old.0 & mask == 0 {
                new.0 & mask
            } else {
                old.0 & mask
            }
        }
        let ret = join(*self, new, Self::MUST_RETURN, Self::MAY_RETURN, Self::RETURN_MASK);
        let handle = join(*self, new, Self::MUST_HANDLE, Self::MAY_HANDLE, Self::HANDLE_MASK);
        self.0 = ret | handle;
    }
}

impl BitOr for ErrFlags {
    type Output = ErrFlags;

    fn bitor(self, rhs: ErrFlags) -> ErrFlags {
        ErrFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrFlags {
    fn bitor_assign(&mut self, rhs: ErrFlags) {
        self.0 |= rhs.0;
    }
}

/// A recognized check: the condition and the terminator or select it
/// decides. Checks are identified by their condition.
#[derive(Clone, Debug)]
pub struct SecurityCheck {
    pub condition: Value,
    pub guard: InstructionId,
    /// Where the condition is computed, if known.
    pub loc: Option<DebugLoc>,
}

impl SecurityCheck {
    pub fn new(program: &Program, condition: Value, guard: InstructionId) -> Self {
        let loc = condition
            .as_instruction()
            .and_then(|i| program.instruction(i).loc.clone())
            .filter(|l| l.line >= 1);
        SecurityCheck {
            condition,
            guard,
            loc,
        }
    }
}

impl PartialEq for SecurityCheck {
    fn eq(&self, other: &Self) -> bool {
        self.condition == other.condition
    }
}

impl Eq for SecurityCheck {}

impl PartialOrd for SecurityCheck {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SecurityCheck {
    fn cmp(&self, other: &Self) -> Ordering {
        self.condition.cmp(&other.condition)
    }
}

/// Index of the successor assumed to handle the error when a call result
/// is tested right away.
fn infer_err_branch(_cond: &Opcode) -> usize {
    0
}

/// Whether `f` may return an error: it stores an errno, returns a pointer
/// from a call, calls `ERR_PTR`/`PTR_ERR`, or calls a function that may.
fn may_return_err(ctx: &GlobalContext<'_>, memo: &mut FxHashMap<FunctionId, bool>, f: FunctionId) -> bool {
    if let Some(known) = memo.get(&f) {
        return *known;
    }
    let program = ctx.program;
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([f]);
    let mut result = false;
    'search: while let Some(tf) = queue.pop_front() {
        if !visited.insert(tf) || program.function(tf).is_declaration() {
            continue;
        }
        for (id, i) in program.instructions(tf) {
            match &i.opcode {
                Opcode::Store { value, .. } => {
                    if is_value_errno(program, value, tf) {
                        result = true;
                        break 'search;
                    }
                }
                Opcode::Call { .. } => {
                    if i.ty.is_pointer() {
                        result = true;
                        break 'search;
                    }
                    if program.called_function(id).is_none() {
                        continue;
                    }
                    let name = program.called_name(id);
                    if name == "ERR_PTR" || name == "PTR_ERR" {
                        result = true;
                        break 'search;
                    }
                    queue.extend(ctx.first_callee(id));
                }
                Opcode::Ret { value: Some(v) } => {
                    if is_value_errno(program, v, tf) {
                        result = true;
                        break 'search;
                    }
                    if let Some(call) = v.as_instruction() {
                        if program.instruction(call).opcode.is_call() {
                            queue.extend(ctx.first_callee(call));
                        }
                    }
                }
                _ => (),
            }
        }
    }
    memo.insert(f, result);
    result
}

/// An edge of the CFG, from a block to one of its successors.
type Edge = (BlockId, BlockId);

/// Error facts of one function.
struct ErrorFlow<'a, 'p> {
    ctx: &'a GlobalContext<'p>,
    memo: &'a mut FxHashMap<FunctionId, bool>,
    func: FunctionId,
    blocks: FxHashMap<BlockId, ErrFlags>,
    edges: FxHashMap<Edge, ErrFlags>,
    /// Selects between an errno and a non-errno.
    err_selects: FxHashSet<InstructionId>,
}

impl<'a, 'p> ErrorFlow<'a, 'p> {
    fn new(
        ctx: &'a GlobalContext<'p>,
        memo: &'a mut FxHashMap<FunctionId, bool>,
        func: FunctionId,
    ) -> Self {
        ErrorFlow {
            ctx,
            memo,
            func,
            blocks: FxHashMap::default(),
            edges: FxHashMap::default(),
            err_selects: FxHashSet::default(),
        }
    }

    fn mark_block(&mut self, b: BlockId, flag: ErrFlags) {
        *self.blocks.entry(b).or_default() |= flag;
    }

    fn edge(&mut self, e: Edge) -> &mut ErrFlags {
        self.edges.entry(e).or_default()
    }

    fn errno_flag(&self, v: &Value) -> ErrFlags {
        if is_value_errno(self.ctx.program, v, self.func) {
            ErrFlags::MUST_RETURN
        } else {
            ErrFlags::MAY_RETURN
        }
    }

    /// Values stored to, or loaded from, the same slots as `v`.
    fn same_variables(&self, v: &Value) -> FxHashSet<Value> {
        let program = self.ctx.program;
        let mut vars = FxHashSet::from_iter([v.clone()]);
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([v.clone()]);
        while let Some(tv) = queue.pop_front() {
            if !visited.insert(tv.clone()) {
                continue;
            }
            for u in program.users(self.func, &tv) {
                let pointer = match &program.instruction(*u).opcode {
                    Opcode::Store { value, pointer } if *value == tv => pointer,
                    _ => continue,
                };
                for su in program.users(self.func, pointer) {
                    if let Opcode::Load { .. } = program.instruction(*su).opcode {
                        let load = Value::Instruction(*su);
                        vars.insert(load.clone());
                        queue.push_back(load);
                    }
                }
            }
        }
        vars
    }

    /// Seed the blocks that decide the errno a function returns.
    fn check_err_return(&mut self) {
        let program = self.ctx.program;
        let mut seen = FxHashSet::default();
        for (id, i) in program.instructions(self.func) {
            if let Opcode::Ret { value: Some(v) } = &i.opcode {
                if v.is_constant() {
                    let flag = self.errno_flag(v);
                    self.mark_block(id.block, flag);
                    continue;
                }
                self.check_value_flow(v, &mut seen);
            }
        }
    }

    /// Walk a returned value back to the blocks that pick it.
    fn check_value_flow(&mut self, ret: &Value, seen: &mut FxHashSet<Value>) {
        let program = self.ctx.program;
        let mut queue = VecDeque::from([ret.clone()]);
        while let Some(v) = queue.pop_front() {
            if !seen.insert(v.clone()) {
                continue;
            }
            let id = match v.as_instruction() {
                Some(id) => id,
                None => continue,
            };
            let block = id.block;
            match &program.instruction(id).opcode {
                Opcode::Load { pointer } => {
                    for u in program.users(self.func, pointer) {
                        if *u == id {
                            continue;
                        }
                        if let Opcode::Store {
                            value,
                            pointer: dest,
                        } = &program.instruction(*u).opcode
                        {
                            if dest != pointer {
                                continue;
                            }
                            if value.is_constant() {
                                let flag = self.errno_flag(value);
                                self.mark_block(u.block, flag);
                            } else {
                                queue.push_back(value.clone());
                            }
                        }
                    }
                }
                Opcode::Phi { incoming } => {
                    for (iv, from) in incoming {
                        if iv.is_constant() {
                            let flag = self.errno_flag(iv);
                            self.mark_block(*from, flag);
                        } else {
                            queue.push_back(iv.clone());
                        }
                    }
                }
                Opcode::Select {
                    true_value,
                    false_value,
                    ..
                } => {
                    let mut errnos = 0;
                    for sv in [true_value, false_value] {
                        if !sv.is_constant() {
                            queue.push_back(sv.clone());
                        } else if is_value_errno(program, sv, self.func) {
                            errnos += 1;
                        }
                    }
                    if errnos == 2 {
                        self.mark_block(block, ErrFlags::MUST_RETURN);
                    } else if errnos == 1 {
                        self.mark_block(block, ErrFlags::MAY_RETURN);
                        self.err_selects.insert(id);
                    }
                }
                Opcode::GetElementPtr { pointer, .. } => {
                    if pointer.is_constant() {
                        let flag = self.errno_flag(pointer);
                        self.mark_block(block, flag);
                    } else {
                        queue.push_back(pointer.clone());
                    }
                }
                Opcode::Call { args, .. } => {
                    if program.called_function(id).is_none() {
                        continue;
                    }
                    let name = program.called_name(id);
                    if name == "PTR_ERR" || name == "ERR_PTR" {
                        self.mark_block(block, ErrFlags::MUST_RETURN);
                        continue;
                    }
                    if let Some((src, -1, _)) = self.ctx.config.signatures.copy(name) {
                        if let Some(arg) = usize::try_from(src).ok().and_then(|s| args.get(s)) {
                            if is_value_errno(program, arg, self.func) {
                                self.mark_block(block, ErrFlags::MUST_RETURN);
                            } else {
                                queue.push_back(arg.clone());
                            }
                            continue;
                        }
                    }
                    let callee = match self.ctx.first_callee(id) {
                        Some(c) => c,
                        None => continue,
                    };
                    self.mark_block(block, ErrFlags::MAY_RETURN);
                    if may_return_err(self.ctx, self.memo, callee) {
                        self.mark_tested_result(&v, id);
                    }
                }
                Opcode::ICmp { .. } | Opcode::FCmp { .. } => (),
                Opcode::Alloca { .. } => self.mark_block(block, ErrFlags::MAY_RETURN),
                Opcode::Cast { operand, .. } | Opcode::Unary { operand, .. } => {
                    if operand.is_constant() {
                        let flag = self.errno_flag(operand);
                        self.mark_block(block, flag);
                    } else {
                        queue.push_back(operand.clone());
                    }
                }
                Opcode::Binary { .. } => self.mark_block(block, ErrFlags::MAY_RETURN),
                _ => trace!("Unsupported returned value {}", v),
            }
        }
    }

    /// A call that may fail, whose result the terminator of its block tests:
    /// the error successor surely returns the error.
    fn mark_tested_result(&mut self, call_value: &Value, call: InstructionId) {
        let program = self.ctx.program;
        let term = &program.instruction(program.terminator(self.func, call.block)).opcode;
        let succs = term.successors();
        if succs.len() < 2 {
            return;
        }
        let cond = match term.condition().and_then(|c| program.opcode(c)) {
            Some(cond) => cond,
            None => return,
        };
        let vars = self.same_variables(call_value);
        if cond.operands().into_iter().any(|o| vars.contains(o)) {
            if let Some(err_succ) = succs.get(infer_err_branch(cond)) {
                self.mark_block(*err_succ, ErrFlags::MUST_RETURN);
            }
        }
    }

    /// Seed the blocks that call an error handler.
    fn check_err_handle(&mut self) {
        let program = self.ctx.program;
        for (id, i) in program.instructions(self.func) {
            if !i.opcode.is_call() {
                continue;
            }
            // Only the mnemonic of inline assembly
            let full = program.called_name(id);
            let mut name = full.split(' ').next().unwrap_or(full).to_string();
            if name.ends_with("printk") {
                if let Some(called) = i
                    .loc
                    .as_ref()
                    .and_then(|l| self.ctx.sources.called_function(l))
                {
                    name = called;
                }
            }
            if self.ctx.config.signatures.is_error_handler(&name) {
                self.mark_block(id.block, ErrFlags::MUST_HANDLE);
            }
        }
    }

    fn mark_all_edges(&mut self) {
        let program = self.ctx.program;
        for b in program.function(self.func).block_ids() {
            let flag = match self.blocks.get(&b) {
                Some(flag) => *flag,
                None => continue,
            };
            if flag.has(ErrFlags::MUST_HANDLE) {
                self.mark_edges_to_handle(b);
            }
            if flag.return_bits() != ErrFlags::NONE {
                for pred in program.predecessors(self.func, b) {
                    let edge = (*pred, b);
                    self.edge(edge).update_return(flag);
                    self.mark_edges_to(edge, flag);
                }
                for succ in program.successors(self.func, b) {
                    let edge = (b, succ);
                    self.edge(edge).update_return(flag);
                    self.mark_edges_from(edge, flag);
                }
            }
        }
    }

    /// Forward propagation of a return flag.
    fn mark_edges_from(&mut self, start: Edge, flag: ErrFlags) {
        let program = self.ctx.program;
        // A block that sets the errno itself overrides what flows in
        if let Some(f) = self.blocks.get(&start.1) {
            if f.return_bits() != ErrFlags::NONE {
                return;
            }
        }
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([(start, flag)]);
        while let Some((edge, flag)) = queue.pop_front() {
            if !visited.insert(edge) {
                continue;
            }
            let (from, tb) = edge;
            let succs = program.successors(self.func, tb);
            if succs.is_empty() {
                continue;
            }
            let mut joined = flag;
            for pred in program.predecessors(self.func, tb) {
                if *pred == from {
                    continue;
                }
                let other = *self.edge((*pred, tb));
                joined.merge(other);
            }
            for succ in succs {
                let out = self.edge((tb, succ));
                if joined.return_bits() != out.return_bits() {
                    out.update_return(joined);
                    queue.push_back(((tb, succ), joined));
                }
            }
        }
    }

    /// Backward propagation of a return flag: a block all of whose other
    /// successors must return an error must itself return one.
    fn mark_edges_to(&mut self, start: Edge, flag: ErrFlags) {
        let program = self.ctx.program;
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([(start, flag)]);
        while let Some((edge, flag)) = queue.pop_front() {
            if !visited.insert(edge) {
                continue;
            }
            let (tb, to) = edge;
            let preds = program.predecessors(self.func, tb);
            if preds.is_empty() || flag.return_bits() == ErrFlags::NONE {
                continue;
            }
            if flag.has(ErrFlags::MAY_RETURN) {
                self.mark_edges_to_return(tb, ErrFlags::MAY_RETURN);
                continue;
            }
            let (mut all_must, mut all_zero) = (true, true);
            for succ in program.successors(self.func, tb) {
                if succ == to {
                    continue;
                }
                let out = *self.edge((tb, succ));
                if !out.has(ErrFlags::MUST_RETURN) {
                    all_must = false;
                } else if out.has(ErrFlags::MAY_RETURN) {
                    all_must = false;
                    all_zero = false;
                } else {
                    all_zero = false;
                }
                if !all_must && !all_zero {
                    break;
                }
            }
            if all_must {
                for pred in preds {
                    let e = self.edge((*pred, tb));
                    if !e.has(ErrFlags::MUST_RETURN) {
                        e.update_return(ErrFlags::MUST_RETURN);
                        queue.push_back(((*pred, tb), ErrFlags::MUST_RETURN));
                    }
                }
            } else if !all_zero {
                self.mark_edges_to_return(tb, ErrFlags::MAY_RETURN);
            }
        }
    }

    /// Mark the edges into `b` as handling an error, back to the closest
    /// branches.
    fn mark_edges_to_handle(&mut self, b: BlockId) {
        let program = self.ctx.program;
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([b]);
        while let Some(tb) = queue.pop_front() {
            if !visited.insert(tb) {
                continue;
            }
            for pred in program.predecessors(self.func, tb) {
                let e = self.edge((*pred, tb));
                if e.has(ErrFlags::MUST_HANDLE) {
                    continue;
                }
                e.update_handle(ErrFlags::MUST_HANDLE);
                if program.successors(self.func, *pred).len() > 1 {
                    continue;
                }
                queue.push_back(*pred);
            }
        }
    }

    fn mark_edges_to_return(&mut self, b: BlockId, flag: ErrFlags) {
        let program = self.ctx.program;
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([b]);
        while let Some(tb) = queue.pop_front() {
            if !visited.insert(tb) {
                continue;
            }
            for pred in program.predecessors(self.func, tb) {
                let e = self.edge((*pred, tb));
                if e.return_bits() == flag.return_bits() {
                    continue;
                }
                e.update_return(flag);
                queue.push_back(*pred);
            }
        }
    }

    /// Returns the checks and the number of conditional statements seen.
    fn identify(mut self) -> (BTreeSet<SecurityCheck>, usize) {
        let program = self.ctx.program;
        self.check_err_return();
        self.check_err_handle();
        self.mark_all_edges();

        let mut checks = BTreeSet::new();
        let mut cond_statements = 0;
        if self.edges.is_empty() && self.err_selects.is_empty() {
            return (checks, cond_statements);
        }
        for ((from, to), flag) in &self.edges {
            trace!(
                "{} -> {}: <{:?}, {:?}>",
                from,
                to,
                flag.return_bits(),
                flag.handle_bits()
            );
        }

        for (id, i) in program.instructions(self.func) {
            let condition = match &i.opcode {
                Opcode::CondBr { condition, .. } | Opcode::Switch { condition, .. } => {
                    let succs = i.opcode.successors();
                    if succs.len() < 2 {
                        continue;
                    }
                    cond_statements += 1;
                    let (mut must_ret, mut other_ret) = (0, 0);
                    let (mut must_handle, mut other_handle) = (0, 0);
                    for s in succs {
                        let flag = self.edges.get(&(id.block, s)).copied().unwrap_or_default();
                        if flag.has(ErrFlags::MUST_RETURN) {
                            must_ret += 1;
                        } else {
                            other_ret += 1;
                        }
                        if flag.has(ErrFlags::MUST_HANDLE) {
                            must_handle += 1;
                        } else {
                            other_handle += 1;
                        }
                    }
                    let splits_return = must_ret > 0 && other_ret > 0;
                    let splits_handle = must_handle > 0 && other_handle > 0;
                    if !splits_return && !splits_handle {
                        continue;
                    }
                    condition
                }
                Opcode::Select { condition, .. } => {
                    cond_statements += 1;
                    if !self.err_selects.contains(&id) {
                        continue;
                    }
                    condition
                }
                _ => continue,
            };
            let check = SecurityCheck::new(program, condition.clone(), id);
            if !checks.contains(&check) {
                checks.insert(check);
            }
        }
        (checks, cond_statements)
    }
}

/// The checks of one function, without recording them.
pub fn function_checks(
    ctx: &GlobalContext<'_>,
    memo: &mut FxHashMap<FunctionId, bool>,
    f: FunctionId,
) -> (BTreeSet<SecurityCheck>, usize) {
    ErrorFlow::new(ctx, memo, f).identify()
}

#[derive(Debug, Default)]
pub struct SecurityChecks {
    /// Memoized [`may_return_err`] answers.
    may_return: FxHashMap<FunctionId, bool>,
}

impl SecurityChecks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModulePass for SecurityChecks {
    const ID: &'static str = "SecurityChecks";

    fn span(&self) -> tracing::Span {
        info_span!("checks")
    }

    fn run_on_module(&mut self, ctx: &mut GlobalContext<'_>, module: ModuleId) -> bool {
        let program = ctx.program;
        for f in program.module_functions(module) {
            let func = program.function(f);
            if func.is_declaration()
                || func.blocks.len() > ctx.config.max_blocks
                || !ctx.is_unified(f)
            {
                continue;
            }
            let (checks, cond_statements) = function_checks(ctx, &mut self.may_return, f);
            ctx.stats.cond_statements += cond_statements;
            if checks.is_empty() {
                continue;
            }
            debug!("{} security checks in {}", checks.len(), func.name);
            ctx.stats.security_checks += checks.len();
            ctx.check_insts
                .entry(f)
                .or_default()
                .extend(checks.iter().map(|c| c.condition.clone()));
            ctx.security_checks.entry(f).or_default().extend(checks);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{is_errno, is_value_errno, ErrFlags};
    use crate::llvm::builder::ModuleBuilder;
    use crate::llvm::types::Type;
    use crate::llvm::{Program, Value};

    #[test]
    fn errno_values() {
        assert!(is_errno(0x4ced_b001));
        assert!(!is_errno(0x4ced_c001));

        let i32t = Type::int(32);
        let mut m = ModuleBuilder::new("a.c");
        let f = m.declare("f", Type::func(i32t.clone(), vec![], false));
        let g = m.declare("g", Type::func(Type::ptr(i32t.clone()), vec![], false));
        let program = Program::from_modules([m.finish()]).unwrap();
        let (f, g) = (f.as_function().unwrap(), g.as_function().unwrap());

        assert!(is_value_errno(&program, &Value::int(32, -22), f));
        assert!(is_value_errno(&program, &Value::int(32, -4095), f));
        assert!(!is_value_errno(&program, &Value::int(32, -4096), f));
        assert!(!is_value_errno(&program, &Value::int(32, 0), f));
        assert!(is_value_errno(&program, &Value::int(64, -0x4ced_b00c), f));
        let null = Value::null(Type::ptr(i32t.clone()));
        assert!(!is_value_errno(&program, &null, f));
        assert!(is_value_errno(&program, &null, g));
        let cast = Value::int(64, -12).bitcast(Type::ptr(i32t));
        assert!(is_value_errno(&program, &cast, f));
    }

    #[test]
    fn flag_updates() {
        let mut f = ErrFlags::MAY_RETURN | ErrFlags::MUST_HANDLE;
        f.update_return(ErrFlags::MUST_RETURN);
        assert_eq!(ErrFlags::MUST_RETURN | ErrFlags::MUST_HANDLE, f);
        f.update_return(ErrFlags::MAY_HANDLE);
        assert_eq!(ErrFlags::MUST_RETURN | ErrFlags::MUST_HANDLE, f);
        f.update_handle(ErrFlags::MAY_HANDLE);
        assert!(f.has(ErrFlags::MUST_HANDLE));

        let mut g = ErrFlags::MAY_HANDLE;
        g.update_handle(ErrFlags::MUST_HANDLE);
        assert_eq!(ErrFlags::MUST_HANDLE, g);
    }

    #[test]
    fn flag_merging() {
        let merged = |mut a: ErrFlags, b: ErrFlags| {
            a.merge(b);
            a
        };
        let (must, may, none) = (ErrFlags::MUST_RETURN, ErrFlags::MAY_RETURN, ErrFlags::NONE);
        assert_eq!(must, merged(must, must));
        assert_eq!(may, merged(must, may));
        assert_eq!(may, merged(none, may));
        assert_eq!(must, merged(none, must));
        assert_eq!(must, merged(must, none));
        assert_eq!(
            ErrFlags::MAY_HANDLE,
            merged(ErrFlags::MUST_HANDLE, ErrFlags::MAY_HANDLE)
        );
        assert_eq!(
            must | ErrFlags::MUST_HANDLE,
            merged(must | ErrFlags::MUST_HANDLE, must | ErrFlags::MUST_HANDLE)
        );
    }
}
