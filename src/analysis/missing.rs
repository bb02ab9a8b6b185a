// SPDX-License-Identifier: BSD-3-Clause
//! Statistical detection of missing checks.
//!
//! Stage 1 walks every recognized security check and records what it checks:
//! the return value of a callee, an output parameter of a callee, or a
//! parameter of a function called indirectly. It also records the calls the
//! checked value later flows into. Stage 2 visits every call and counts,
//! for each of those sources and uses, how many occurrences are checked.
//! Sources and uses that are usually checked but have a few unchecked
//! occurrences are reported.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::io::{self, Write};

use rustc_hash::FxHashSet;
use tracing::{debug, info, info_span, trace};

use super::dataflow::{arg_index, pred_reach, succ_reach, DataFlow, Trace};
use crate::config::ShapePolicy;
use crate::context::GlobalContext;
use crate::llvm::instruction::{IntPredicate, Opcode};
use crate::llvm::{BlockId, FunctionId, InstructionId, ModuleId, Value};
use crate::pass::ModulePass;

/// What a source or use is attached to.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Anchor {
    /// A callee: its return value or one of its parameters.
    Function(FunctionId),
    /// An indirect call: a parameter of whatever it calls.
    Call(InstructionId),
}

/// An anchor and an argument index, `-1` for the return value.
pub type Site = (Anchor, i8);

/// Operator buckets of a comparison.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Other,
}

impl CheckOp {
    fn of(predicate: IntPredicate) -> Self {
        // No `_` pattern to ensure this is updated if the type changes
        match predicate {
            IntPredicate::Eq => CheckOp::Eq,
            IntPredicate::Ne => CheckOp::Ne,
            IntPredicate::Sgt | IntPredicate::Sge | IntPredicate::Ugt | IntPredicate::Uge => {
                CheckOp::Gt
            }
            IntPredicate::Slt | IntPredicate::Sle | IntPredicate::Ult | IntPredicate::Ule => {
                CheckOp::Lt
            }
        }
    }
}

/// What the checked value is compared against.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckCond {
    Const,
    Other,
}

/// The shape of a check on a source or use.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModelSc {
    pub op: CheckOp,
    pub cond: CheckCond,
    pub anchor: Anchor,
    pub arg: i8,
}

impl ModelSc {
    /// `None` if `cmp` is not a comparison.
    pub fn of(cmp: &Opcode, (anchor, arg): Site) -> Option<Self> {
        let (op, rhs) = match cmp {
            Opcode::ICmp { predicate, rhs, .. } => (CheckOp::of(*predicate), rhs),
            Opcode::FCmp { rhs, .. } => (CheckOp::Other, rhs),
            _ => return None,
        };
        let cond = if rhs.is_constant() {
            CheckCond::Const
        } else {
            CheckCond::Other
        };
        Some(ModelSc {
            op,
            cond,
            anchor,
            arg,
        })
    }
}

/// Counts of one source or use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub checks: u32,
    pub unchecks: u32,
    /// Occurrences seen in stage 2.
    pub total: u32,
    pub shapes: BTreeSet<ModelSc>,
    /// The unchecked occurrences.
    pub unchecked: BTreeSet<Value>,
}

impl Tally {
    /// The share of unchecked occurrences, when there are both checked and
    /// unchecked ones. The total never exceeds checks plus unchecks.
    pub fn rating(&self) -> Option<(f64, u32)> {
        if self.checks == 0 || self.unchecks == 0 {
            return None;
        }
        let total = self.total.min(self.checks + self.unchecks);
        Some((f64::from(self.unchecks) / f64::from(total), total))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindingKind {
    /// A callee's return value.
    Retval,
    /// A parameter of an indirectly called function.
    Argmt,
    /// An output parameter of a callee.
    Param,
    Use,
}

impl Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::Retval => write!(f, "Src-retval"),
            FindingKind::Argmt => write!(f, "Src-argmt"),
            FindingKind::Param => write!(f, "Src-param"),
            FindingKind::Use => write!(f, "Use"),
        }
    }
}

/// A reported missing check.
#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    pub kind: FindingKind,
    pub site: Site,
    pub rating: f64,
    pub checks: u32,
    pub unchecks: u32,
    pub total: u32,
    pub unchecked: Vec<Value>,
}

impl Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "== [{}]: Rating: {:.3}, Checks: {}, Unchecks: {}, Total: {} | Arg: {}",
            self.kind, self.rating, self.checks, self.unchecks, self.total, self.site.1
        )
    }
}

/// Citation of a value: its source line, or its function without debug
/// info.
pub fn cite(ctx: &GlobalContext<'_>, v: &Value) -> String {
    let program = ctx.program;
    let (loc, func) = match v {
        Value::Instruction(i) => (program.instruction(*i).loc.as_ref(), Some(i.func)),
        Value::Argument(a) => (program.function(a.func).loc.as_ref(), Some(a.func)),
        Value::Function(f) => (program.function(*f).loc.as_ref(), Some(*f)),
        _ => (None, None),
    };
    match (loc.filter(|l| l.line > 0), func) {
        (Some(loc), _) => ctx.sources.cite(loc),
        (None, Some(f)) => program.function(f).name.clone(),
        (None, None) => v.to_string(),
    }
}

#[derive(Debug)]
pub struct MissingChecks {
    stage: u32,
    /// Modules seen in the current stage.
    seen: usize,
    srcs: BTreeMap<Site, Tally>,
    uses: BTreeMap<Site, Tally>,
}

impl Default for MissingChecks {
    fn default() -> Self {
        MissingChecks {
            stage: 1,
            seen: 0,
            srcs: BTreeMap::new(),
            uses: BTreeMap::new(),
        }
    }
}

impl MissingChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }

    pub fn src_tally(&self, site: &Site) -> Option<&Tally> {
        self.srcs.get(site)
    }

    pub fn use_tally(&self, site: &Site) -> Option<&Tally> {
        self.uses.get(site)
    }

    fn add_src_check(&mut self, site: Site, shape: ModelSc) {
        let t = self.srcs.entry(site).or_default();
        t.checks += 1;
        t.shapes.insert(shape);
    }

    fn add_use_check(&mut self, site: Site, shape: ModelSc) {
        let t = self.uses.entry(site).or_default();
        t.checks += 1;
        t.shapes.insert(shape);
    }

    /// Count one stage-2 occurrence of a checked source or use.
    fn count(tallies: &mut BTreeMap<Site, Tally>, site: Site, checked: bool, v: Value) {
        if let Some(t) = tallies.get_mut(&site) {
            if !checked {
                t.unchecks += 1;
                t.unchecked.insert(v);
            }
            t.total += 1;
        }
    }

    /// Whether `cmp` checks `site` as stage 1 saw it checked.
    fn is_modeled(&self, ctx: &GlobalContext<'_>, cmp: &Opcode, site: Site, is_src: bool) -> bool {
        let tallies = if is_src { &self.srcs } else { &self.uses };
        let (tally, shape) = match (tallies.get(&site), ModelSc::of(cmp, site)) {
            (Some(t), Some(s)) => (t, s),
            _ => return false,
        };
        match ctx.config.check_shapes {
            ShapePolicy::Any => !tally.shapes.is_empty(),
            ShapePolicy::Exact => tally.shapes.contains(&shape),
        }
    }

    /// The callee a source or use of `call` is attributed to.
    fn callee(ctx: &GlobalContext<'_>, call: InstructionId) -> Option<FunctionId> {
        let direct = ctx.program.called_function(call)?;
        Some(ctx.first_callee(call).unwrap_or(direct))
    }

    /// Stage 1: record what the comparison `sci` checks.
    fn count_checks(&mut self, ctx: &GlobalContext<'_>, f: FunctionId, sci: InstructionId) {
        let program = ctx.program;
        let cmp = &program.instruction(sci).opcode;
        let dfa = DataFlow::new(ctx);

        let mut trace = Trace::new();
        for o in cmp.operands() {
            dfa.find_in_func_source_cv(o, &mut trace);
        }
        let targets: Vec<Value> = trace
            .sources
            .into_iter()
            .filter(|t| !t.is_constant())
            .collect();
        if targets.is_empty() {
            return;
        }
        let pred_bbs = pred_reach(program, f, sci.block);

        let record = |this: &mut Self, site: Site| {
            if let Some(shape) = ModelSc::of(cmp, site) {
                trace!("Checked source {:?}", site);
                this.add_src_check(site, shape);
            }
        };
        for t in &targets {
            match t {
                Value::Argument(a) => {
                    if !program.is_address_taken(f) {
                        continue;
                    }
                    let arg = match i8::try_from(a.index) {
                        Ok(arg) => arg,
                        Err(_) => continue,
                    };
                    for caller in ctx.callers(f) {
                        if program.called_function(caller).is_none() {
                            record(self, (Anchor::Call(caller), arg));
                        }
                    }
                }
                Value::Instruction(i) if program.instruction(*i).opcode.is_call() => {
                    if let Some(cf) = Self::callee(ctx, *i) {
                        record(self, (Anchor::Function(cf), -1));
                    }
                }
                _ => {
                    for u in program.users(f, t) {
                        if !program.instruction(*u).opcode.is_call() || !pred_bbs.contains(&u.block) {
                            continue;
                        }
                        let arg = match arg_index(program, *u, t) {
                            Some(arg) => arg,
                            None => continue,
                        };
                        if let Some(cf) = Self::callee(ctx, *u) {
                            record(self, (Anchor::Function(cf), arg));
                        }
                    }
                }
            }
        }

        for t in &targets {
            for (u, arg) in dfa.find_uses(sci, t) {
                if !program.instruction(u).opcode.is_call() {
                    continue;
                }
                if let Some(cf) = Self::callee(ctx, u) {
                    let site = (Anchor::Function(cf), arg);
                    if let Some(shape) = ModelSc::of(cmp, site) {
                        trace!("Checked use {:?}", site);
                        self.add_use_check(site, shape);
                    }
                }
            }
        }
    }

    /// Loads of `ptr`, and of the pointers it aliases, within `scope`.
    fn loads_of(
        ctx: &GlobalContext<'_>,
        f: FunctionId,
        ptr: &Value,
        scope: &FxHashSet<BlockId>,
    ) -> Vec<Value> {
        let program = ctx.program;
        let mut loads = Vec::new();
        for a in ctx.alias_pointers(f, ptr) {
            for u in program.users(f, &a) {
                if scope.contains(&u.block) {
                    if let Opcode::Load { .. } = program.instruction(*u).opcode {
                        loads.push(Value::Instruction(*u));
                    }
                }
            }
        }
        loads
    }

    /// Whether a value derived from `v` within `scope` is compared the way
    /// `site` was seen checked, switched on, returned, or is a check.
    fn is_checked_forward(
        &self,
        ctx: &GlobalContext<'_>,
        f: FunctionId,
        site: Site,
        v: &Value,
        scope: &FxHashSet<BlockId>,
        visited: &mut FxHashSet<Value>,
    ) -> bool {
        let program = ctx.program;
        let mut work = vec![v.clone()];
        while let Some(v) = work.pop() {
            if !visited.insert(v.clone()) {
                continue;
            }
            for u in program.users(f, &v) {
                if !scope.contains(&u.block) {
                    continue;
                }
                let user = Value::Instruction(*u);
                let op = &program.instruction(*u).opcode;
                match op {
                    Opcode::ICmp { .. } | Opcode::FCmp { .. } => {
                        if self.is_modeled(ctx, op, site, true) {
                            return true;
                        }
                    }
                    Opcode::Switch { .. } | Opcode::Ret { .. } => return true,
                    Opcode::Call { .. } => {
                        if ctx.is_check_inst(f, &user) {
                            return true;
                        }
                    }
                    Opcode::Store { value, pointer } if *value == v => {
                        for a in ctx.alias_pointers(f, pointer) {
                            for au in program.users(f, &a) {
                                if let Opcode::Load { .. } = program.instruction(*au).opcode {
                                    work.push(Value::Instruction(*au));
                                }
                            }
                        }
                    }
                    Opcode::GetElementPtr { pointer, .. } => {
                        if *pointer == v {
                            work.push(user);
                        }
                    }
                    Opcode::Phi { .. }
                    | Opcode::Load { .. }
                    | Opcode::Cast { .. }
                    | Opcode::Unary { .. }
                    | Opcode::Binary { .. } => work.push(user),
                    _ => (),
                }
            }
        }
        false
    }

    /// Whether a value `v` is computed from, within `scope` or within the
    /// callers it is passed from, was compared the way `site` was seen
    /// checked.
    fn is_checked_backward(
        &self,
        ctx: &GlobalContext<'_>,
        f: FunctionId,
        site: Site,
        v: &Value,
        scope: FxHashSet<BlockId>,
    ) -> bool {
        let program = ctx.program;
        let mut scopes = vec![scope];
        let mut visited = FxHashSet::default();
        let mut work = vec![(f, v.clone(), 0, 1)];
        while let Some((f, v, s, depth)) = work.pop() {
            if !visited.insert(v.clone()) || depth > ctx.config.max_caller_depth {
                continue;
            }
            if let Value::Argument(a) = &v {
                for caller in ctx.callers(a.func) {
                    let arg = match &program.instruction(caller).opcode {
                        Opcode::Call { args, .. } => args.get(a.index as usize),
                        _ => None,
                    };
                    if let Some(arg) = arg {
                        scopes.push(pred_reach(program, caller.func, caller.block));
                        work.push((caller.func, arg.clone(), scopes.len() - 1, depth + 1));
                    }
                }
                continue;
            }

            let scope = &scopes[s];
            for u in program.users(f, &v) {
                if !scope.contains(&u.block) {
                    continue;
                }
                let op = &program.instruction(*u).opcode;
                match op {
                    Opcode::ICmp { .. } | Opcode::FCmp { .. } => {
                        if self.is_modeled(ctx, op, site, false) {
                            return true;
                        }
                    }
                    Opcode::Switch { .. } => return true,
                    Opcode::Call { .. } => {
                        if ctx.is_check_inst(f, &Value::Instruction(*u)) {
                            return true;
                        }
                    }
                    _ => (),
                }
            }

            let id = match v.as_instruction() {
                Some(id) => id,
                None => continue,
            };
            match &program.instruction(id).opcode {
                Opcode::Call { .. } | Opcode::Alloca { .. } => (),
                Opcode::Load { pointer } => {
                    for a in ctx.alias_pointers(f, pointer) {
                        for au in program.users(f, &a) {
                            if !scope.contains(&au.block) {
                                continue;
                            }
                            match &program.instruction(*au).opcode {
                                Opcode::Load { .. } => {
                                    work.push((f, Value::Instruction(*au), s, depth))
                                }
                                Opcode::Store { value, .. } => work.push((f, value.clone(), s, depth)),
                                _ => (),
                            }
                        }
                    }
                }
                Opcode::Phi { incoming } => {
                    work.extend(incoming.iter().map(|(iv, _)| (f, iv.clone(), s, depth)))
                }
                Opcode::Select {
                    true_value,
                    false_value,
                    ..
                } => {
                    work.push((f, true_value.clone(), s, depth));
                    work.push((f, false_value.clone(), s, depth));
                }
                Opcode::GetElementPtr { pointer, .. } => work.push((f, pointer.clone(), s, depth)),
                Opcode::Cast { operand, .. } | Opcode::Unary { operand, .. } => {
                    work.push((f, operand.clone(), s, depth))
                }
                Opcode::Binary { lhs, rhs, .. } => {
                    work.push((f, lhs.clone(), s, depth));
                    work.push((f, rhs.clone(), s, depth));
                }
                _ => trace!("Unsupported value {} in {}", v, program.function(f).name),
            }
        }
        false
    }

    /// Stage 2: count the checked and unchecked occurrences of recorded
    /// sources and uses among the calls of `f`.
    fn count_unchecks(&mut self, ctx: &GlobalContext<'_>, f: FunctionId) {
        let program = ctx.program;
        for (ci, i) in program.instructions(f) {
            let args = match &i.opcode {
                Opcode::Call { args, .. } => args,
                _ => continue,
            };

            if program.is_indirect_call(ci) {
                for (idx, _) in args.iter().enumerate() {
                    let site = match i8::try_from(idx) {
                        Ok(arg) => (Anchor::Call(ci), arg),
                        Err(_) => break,
                    };
                    if !self.srcs.contains_key(&site) {
                        continue;
                    }
                    for callee in ctx.callees(ci) {
                        let param = match program.argument(callee, idx) {
                            Some(p) => p,
                            None => continue,
                        };
                        if program.function(callee).is_declaration() {
                            continue;
                        }
                        let reach = succ_reach(program, callee, BlockId(0));
                        let mut track = vec![param.clone()];
                        if program.type_of(&param).is_pointer() {
                            track.extend(Self::loads_of(ctx, callee, &param, &reach));
                        }
                        let mut visited = FxHashSet::default();
                        let checked = track.iter().any(|t| {
                            self.is_checked_forward(ctx, callee, site, t, &reach, &mut visited)
                        });
                        Self::count(&mut self.srcs, site, checked, param);
                    }
                }
                continue;
            }

            if program.is_intrinsic_call(ci) {
                continue;
            }
            let call = Value::Instruction(ci);
            let unused = program.users(f, &call).is_empty();
            if unused && args.is_empty() {
                continue;
            }
            let cf = match ctx.first_callee(ci) {
                Some(cf) => cf,
                None => continue,
            };
            let callee = program.function(cf);
            if ctx.config.is_ignored_callee(&callee.name) {
                continue;
            }

            let nparams = i8::try_from(callee.params.len()).unwrap_or(i8::MAX);
            for arg in -1..nparams {
                let param = match usize::try_from(arg) {
                    Err(_) if unused => continue,
                    Err(_) => None,
                    Ok(idx) => match args.get(idx) {
                        None => break,
                        Some(p) if !program.type_of(p).is_pointer() => continue,
                        Some(p) => Some(p),
                    },
                };
                let site = (Anchor::Function(cf), arg);
                if !self.srcs.contains_key(&site) {
                    continue;
                }
                let reach = succ_reach(program, f, ci.block);
                let mut visited = FxHashSet::default();
                let checked = match param {
                    None => self.is_checked_forward(ctx, f, site, &call, &reach, &mut visited),
                    Some(p) => Self::loads_of(ctx, f, p, &reach)
                        .iter()
                        .any(|l| self.is_checked_forward(ctx, f, site, l, &reach, &mut visited)),
                };
                Self::count(&mut self.srcs, site, checked, call.clone());
            }

            for (idx, a) in args.iter().enumerate() {
                let site = match i8::try_from(idx) {
                    Ok(arg) => (Anchor::Function(cf), arg),
                    Err(_) => break,
                };
                if !self.uses.contains_key(&site) {
                    continue;
                }
                let mut reach = pred_reach(program, f, ci.block);
                reach.remove(&ci.block);
                let checked = self.is_checked_backward(ctx, f, site, a, reach);
                Self::count(&mut self.uses, site, checked, a.clone());
            }
        }
    }

    /// Sources and uses with a rating at or below their threshold.
    pub fn findings(&self, ctx: &GlobalContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let tallies = self
            .srcs
            .iter()
            .map(|e| (e, true))
            .chain(self.uses.iter().map(|e| (e, false)));
        for ((site, tally), is_src) in tallies {
            let (rating, total) = match tally.rating() {
                Some(r) => r,
                None => continue,
            };
            let threshold = if is_src {
                ctx.config.src_threshold
            } else {
                ctx.config.use_threshold
            };
            if rating > threshold {
                continue;
            }
            let kind = match (is_src, site) {
                (false, _) => FindingKind::Use,
                (true, (_, -1)) => FindingKind::Retval,
                (true, (Anchor::Call(_), _)) => FindingKind::Argmt,
                (true, _) => FindingKind::Param,
            };
            findings.push(Finding {
                kind,
                site: *site,
                rating,
                checks: tally.checks,
                unchecks: tally.unchecks,
                total,
                unchecked: tally.unchecked.iter().cloned().collect(),
            });
        }
        findings
    }

    /// Write the findings, each followed by a citation of every unchecked
    /// occurrence.
    pub fn write_report(&self, ctx: &GlobalContext<'_>, out: &mut impl Write) -> io::Result<()> {
        for finding in self.findings(ctx) {
            writeln!(out, "{}", finding)?;
            if let (FindingKind::Argmt, (Anchor::Call(call), _)) = (finding.kind, finding.site) {
                writeln!(out, " [Call] {}", cite(ctx, &Value::Instruction(call)))?;
                writeln!(out, "Unchecks:")?;
            }
            for v in &finding.unchecked {
                writeln!(out, " [Code] {}", cite(ctx, v))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl ModulePass for MissingChecks {
    const ID: &'static str = "MissingChecks";

    fn span(&self) -> tracing::Span {
        info_span!("missing")
    }

    fn run_on_module(&mut self, ctx: &mut GlobalContext<'_>, module: ModuleId) -> bool {
        let ctx: &GlobalContext<'_> = ctx;
        let program = ctx.program;
        self.seen += 1;

        for f in program.module_functions(module) {
            let func = program.function(f);
            if func.is_declaration()
                || func.blocks.len() > ctx.config.max_blocks
                || !ctx.is_unified(f)
            {
                continue;
            }
            match self.stage {
                1 => {
                    let mut conds: Vec<InstructionId> = ctx
                        .check_insts
                        .get(&f)
                        .into_iter()
                        .flatten()
                        .filter_map(|c| c.as_instruction())
                        .filter(|c| program.instruction(*c).opcode.is_cmp())
                        .collect();
                    conds.sort();
                    for c in conds {
                        self.count_checks(ctx, f, c);
                    }
                }
                2 => self.count_unchecks(ctx, f),
                _ => (),
            }
        }

        if self.seen == program.modules().len() {
            debug!(
                "Stage {}: {} checked sources, {} checked uses",
                self.stage,
                self.srcs.len(),
                self.uses.len()
            );
            self.stage += 1;
            self.seen = 0;
            if self.stage <= ctx.config.max_stage {
                info!("## Move to stage {}", self.stage);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{Anchor, CheckCond, CheckOp, ModelSc, Tally};
    use crate::llvm::instruction::{IntPredicate, Opcode};
    use crate::llvm::{FunctionId, Value};

    #[test]
    fn rating_clamps_total() {
        let mut t = Tally {
            checks: 3,
            unchecks: 1,
            total: 9,
            ..Tally::default()
        };
        assert_eq!(Some((0.25, 4)), t.rating());
        t.total = 2;
        assert_eq!(Some((0.5, 2)), t.rating());
        t.unchecks = 0;
        assert_eq!(None, t.rating());
    }

    #[test]
    fn check_shapes() {
        let site = (Anchor::Function(FunctionId(0)), -1);
        let cmp = |predicate, rhs| Opcode::ICmp {
            predicate,
            lhs: Value::int(32, 1),
            rhs,
        };
        let shape = ModelSc::of(&cmp(IntPredicate::Sle, Value::int(32, 0)), site).unwrap();
        assert_eq!((CheckOp::Lt, CheckCond::Const), (shape.op, shape.cond));
        let shape = ModelSc::of(&cmp(IntPredicate::Uge, Value::int(32, 0)), site).unwrap();
        assert_eq!(CheckOp::Gt, shape.op);
        let arg = Value::Argument(crate::llvm::ArgumentId {
            func: FunctionId(0),
            index: 0,
        });
        let shape = ModelSc::of(&cmp(IntPredicate::Ne, arg), site).unwrap();
        assert_eq!((CheckOp::Ne, CheckCond::Other), (shape.op, shape.cond));
        assert!(ModelSc::of(&Opcode::Unreachable, site).is_none());
    }
}
