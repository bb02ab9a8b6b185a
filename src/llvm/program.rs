// SPDX-License-Identifier: BSD-3-Clause
use std::ops::Range;

use rustc_hash::FxHashMap;

use super::constant::Constant;
use super::instruction::{Instruction, Opcode};
use super::types::{Type, TypeRef};
use super::{
    ArgumentId, Block, BlockId, Callee, Error, Function, FunctionId, Global, GlobalId,
    InstructionId, Module, ModuleId, Value,
};

/// A linked module: its name and the slices of the arenas it owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub functions: Range<u32>,
    pub globals: Range<u32>,
}

/// All linked modules, plus the indices the analyses query: def-use edges,
/// block predecessors and address-taken flags.
///
/// Call [`Program::reindex`] after linking or rewriting functions;
/// [`Program::from_modules`] does so.
#[derive(Clone, Debug, Default)]
pub struct Program {
    modules: Vec<ModuleInfo>,
    functions: Vec<Function>,
    function_modules: Vec<ModuleId>,
    globals: Vec<Global>,
    users: Vec<FxHashMap<Value, Vec<InstructionId>>>,
    predecessors: Vec<Vec<Vec<BlockId>>>,
    address_taken: Vec<bool>,
}

/// Type of a value, given the arenas it lives in.
pub(crate) fn value_type(functions: &[Function], globals: &[Global], v: &Value) -> TypeRef {
    match v {
        Value::Instruction(i) => {
            functions[i.func.index()].blocks[i.block.index()].instrs[i.index as usize]
                .ty
                .clone()
        }
        Value::Argument(a) => functions[a.func.index()].params[a.index as usize]
            .ty
            .clone(),
        Value::Function(f) => Type::ptr(functions[f.index()].ty.clone()),
        Value::Global(g) => Type::ptr(globals[g.index()].value_ty.clone()),
        Value::Constant(c) => c.ty(),
    }
}

fn check_value(module: &Module, v: &Value) -> Result<(), Error> {
    match v {
        Value::Instruction(i) => {
            let ok = module
                .functions
                .get(i.func.index())
                .and_then(|f| f.blocks.get(i.block.index()))
                .map(|b| (i.index as usize) < b.instrs.len())
                .unwrap_or(false);
            if ok {
                Ok(())
            } else {
                Err(Error::DanglingInstruction(*i))
            }
        }
        Value::Argument(a) => match module.functions.get(a.func.index()) {
            Some(f) if (a.index as usize) < f.params.len() => Ok(()),
            _ => Err(Error::Other(format!("reference to missing argument {}", a))),
        },
        Value::Function(f) if f.index() >= module.functions.len() => {
            Err(Error::DanglingFunction(*f))
        }
        Value::Global(g) if g.index() >= module.globals.len() => Err(Error::DanglingGlobal(g.0)),
        Value::Constant(c) => c.operands().iter().try_for_each(|v| check_value(module, v)),
        _ => Ok(()),
    }
}

fn check_block(module: &Module, f: &Function, id: BlockId) -> Result<(), Error> {
    let b = f.block(id);
    if b.terminator().is_none() {
        return Err(Error::MissingTerminator {
            func: f.name.clone(),
            block: id,
        });
    }
    for (idx, i) in b.instrs.iter().enumerate() {
        if i.opcode.is_terminator() && idx + 1 != b.instrs.len() {
            return Err(Error::Other(format!(
                "terminator in the middle of block {} of {}",
                id, f.name
            )));
        }
        let mut targets = i.opcode.successors();
        if let Opcode::Phi { incoming } = &i.opcode {
            targets.extend(incoming.iter().map(|(_, b)| *b));
        }
        if let Some(block) = targets.into_iter().find(|t| t.index() >= f.blocks.len()) {
            return Err(Error::DanglingBlock {
                func: f.name.clone(),
                block,
            });
        }
        for v in i.opcode.operands() {
            check_value(module, v)?;
        }
    }
    Ok(())
}

fn validate(module: &Module) -> Result<(), Error> {
    for f in &module.functions {
        for b in f.block_ids() {
            check_block(module, f, b)?;
        }
    }
    for g in &module.globals {
        if let Some(init) = &g.initializer {
            check_value(module, init)?;
        }
    }
    Ok(())
}

/// Mark every function that occurs in `v`.
fn mark_functions(v: &Value, taken: &mut [bool]) {
    match v {
        Value::Function(f) => taken[f.index()] = true,
        Value::Constant(c) => {
            for op in c.operands() {
                mark_functions(op, taken);
            }
        }
        _ => (),
    }
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_modules(modules: impl IntoIterator<Item = Module>) -> Result<Self, Error> {
        let mut program = Program::new();
        for m in modules {
            program.link(m)?;
        }
        program.reindex();
        Ok(program)
    }

    /// Append a module, relocating its ids into the program's arenas.
    pub fn link(&mut self, mut module: Module) -> Result<ModuleId, Error> {
        validate(&module)?;
        let id = ModuleId(self.modules.len() as u32);
        let fbase = self.functions.len() as u32;
        let gbase = self.globals.len() as u32;
        module.relocate(fbase, gbase);
        self.modules.push(ModuleInfo {
            name: module.name,
            functions: fbase..fbase + module.functions.len() as u32,
            globals: gbase..gbase + module.globals.len() as u32,
        });
        self.function_modules
            .extend(std::iter::repeat(id).take(module.functions.len()));
        self.functions.extend(module.functions);
        self.globals.extend(module.globals);
        Ok(id)
    }

    /// Recompute def-use edges, predecessors and address-taken flags.
    pub fn reindex(&mut self) {
        self.users = Vec::with_capacity(self.functions.len());
        self.predecessors = Vec::with_capacity(self.functions.len());
        self.address_taken = vec![false; self.functions.len()];

        for (f_idx, f) in self.functions.iter().enumerate() {
            let fid = FunctionId(f_idx as u32);
            let mut users: FxHashMap<Value, Vec<InstructionId>> = FxHashMap::default();
            let mut preds = vec![Vec::new(); f.blocks.len()];
            for b in f.block_ids() {
                for (idx, i) in f.block(b).instrs.iter().enumerate() {
                    let id = InstructionId::new(fid, b, idx as u32);
                    for v in i.opcode.operands() {
                        if let Value::Constant(c) = v {
                            if c.operands().is_empty() {
                                continue;
                            }
                        }
                        let us = users.entry(v.clone()).or_default();
                        if us.last() != Some(&id) {
                            us.push(id);
                        }
                    }
                    for s in i.opcode.successors() {
                        let ps: &mut Vec<BlockId> = &mut preds[s.index()];
                        if !ps.contains(&b) {
                            ps.push(b);
                        }
                    }
                    let direct = match &i.opcode {
                        Opcode::Call {
                            callee: Callee::Value(Value::Function(callee)),
                            ..
                        } => Some(*callee),
                        _ => None,
                    };
                    for v in i.opcode.operands() {
                        if direct.is_some() && v.as_function() == direct {
                            continue;
                        }
                        mark_functions(v, &mut self.address_taken);
                    }
                }
            }
            self.users.push(users);
            self.predecessors.push(preds);
        }
        for g in &self.globals {
            if let Some(init) = &g.initializer {
                mark_functions(init, &mut self.address_taken);
            }
        }
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    pub fn module(&self, m: ModuleId) -> &ModuleInfo {
        &self.modules[m.0 as usize]
    }

    pub fn module_functions(&self, m: ModuleId) -> impl Iterator<Item = FunctionId> {
        self.modules[m.0 as usize].functions.clone().map(FunctionId)
    }

    pub fn module_globals(&self, m: ModuleId) -> impl Iterator<Item = GlobalId> {
        self.modules[m.0 as usize].globals.clone().map(GlobalId)
    }

    pub fn module_of(&self, f: FunctionId) -> ModuleId {
        self.function_modules[f.index()]
    }

    pub fn function(&self, f: FunctionId) -> &Function {
        &self.functions[f.index()]
    }

    pub(crate) fn function_mut(&mut self, f: FunctionId) -> &mut Function {
        &mut self.functions[f.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(i as u32), f))
    }

    /// The first function with this name, preferring definitions.
    pub fn function_named(&self, name: &str) -> Option<FunctionId> {
        let mut named = self.functions().filter(|(_, f)| f.name == name);
        let first = named.next()?;
        if !first.1.is_declaration() {
            return Some(first.0);
        }
        named
            .find(|(_, f)| !f.is_declaration())
            .map(|(id, _)| id)
            .or(Some(first.0))
    }

    pub fn global(&self, g: GlobalId) -> &Global {
        &self.globals[g.index()]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(i, g)| (GlobalId(i as u32), g))
    }

    pub fn block(&self, f: FunctionId, b: BlockId) -> &Block {
        self.function(f).block(b)
    }

    pub fn instruction(&self, i: InstructionId) -> &Instruction {
        &self.block(i.func, i.block).instrs[i.index as usize]
    }

    pub fn opcode(&self, v: &Value) -> Option<&Opcode> {
        v.as_instruction().map(|i| &self.instruction(i).opcode)
    }

    pub fn instructions(&self, f: FunctionId) -> impl Iterator<Item = (InstructionId, &Instruction)> {
        self.function(f).blocks.iter().enumerate().flat_map(move |(b, block)| {
            block
                .instrs
                .iter()
                .enumerate()
                .map(move |(i, instr)| (InstructionId::new(f, BlockId(b as u32), i as u32), instr))
        })
    }

    pub fn terminator(&self, f: FunctionId, b: BlockId) -> InstructionId {
        let len = self.block(f, b).instrs.len();
        InstructionId::new(f, b, len.saturating_sub(1) as u32)
    }

    pub fn successors(&self, f: FunctionId, b: BlockId) -> Vec<BlockId> {
        self.block(f, b)
            .terminator()
            .map(|t| t.opcode.successors())
            .unwrap_or_default()
    }

    pub fn predecessors(&self, f: FunctionId, b: BlockId) -> &[BlockId] {
        self.predecessors
            .get(f.index())
            .and_then(|p| p.get(b.index()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Instructions of `f` that use `v` as an operand.
    pub fn users(&self, f: FunctionId, v: &Value) -> &[InstructionId] {
        self.users
            .get(f.index())
            .and_then(|u| u.get(v))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `f` is used other than as the callee of a direct call.
    pub fn is_address_taken(&self, f: FunctionId) -> bool {
        self.address_taken.get(f.index()).copied().unwrap_or(false)
    }

    pub fn type_of(&self, v: &Value) -> TypeRef {
        value_type(&self.functions, &self.globals, v)
    }

    pub fn argument(&self, f: FunctionId, index: usize) -> Option<Value> {
        (index < self.function(f).params.len()).then(|| {
            Value::Argument(ArgumentId {
                func: f,
                index: index as u32,
            })
        })
    }

    /// Peel pointer casts, both instructions and constant expressions.
    pub fn strip_pointer_casts(&self, v: &Value) -> Value {
        let mut v = v.clone();
        loop {
            let next = match &v {
                Value::Constant(c) if c.is_pointer_cast() => match c.operands().first() {
                    Some(op) => op.clone(),
                    None => return v,
                },
                Value::Instruction(i) => match &self.instruction(*i).opcode {
                    Opcode::Cast { op, operand } if op.is_pointer_cast() => operand.clone(),
                    _ => return v,
                },
                _ => return v,
            };
            v = next;
        }
    }

    pub fn callee(&self, call: InstructionId) -> Option<&Callee> {
        match &self.instruction(call).opcode {
            Opcode::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// The function a call calls directly, looking through pointer casts.
    pub fn called_function(&self, call: InstructionId) -> Option<FunctionId> {
        let callee = self.callee(call)?.value()?;
        self.strip_pointer_casts(callee).as_function()
    }

    /// Indirect calls call through a value that is neither a constant nor
    /// inline assembly.
    pub fn is_indirect_call(&self, call: InstructionId) -> bool {
        match self.callee(call) {
            Some(Callee::Value(v)) => !v.is_constant(),
            _ => false,
        }
    }

    pub fn is_intrinsic_call(&self, call: InstructionId) -> bool {
        self.called_function(call)
            .map(|f| self.function(f).is_intrinsic())
            .unwrap_or(false)
    }

    /// Name of what a call calls: the assembly string of inline assembly, the
    /// name of the function (looking through a cast), or of the value.
    pub fn called_name(&self, call: InstructionId) -> &str {
        match self.callee(call) {
            Some(Callee::Asm { asm }) => asm,
            Some(Callee::Value(v)) => {
                let v = match v {
                    Value::Constant(c) if c.is_expr() => c.operands().first().unwrap_or(v),
                    v => v,
                };
                self.value_name(v).unwrap_or("")
            }
            None => "",
        }
    }

    pub fn value_name(&self, v: &Value) -> Option<&str> {
        match v {
            Value::Instruction(i) => self.instruction(*i).name.as_deref(),
            Value::Argument(a) => self.function(a.func).params[a.index as usize]
                .name
                .as_deref(),
            Value::Function(f) => Some(&self.function(*f).name),
            Value::Global(g) => Some(&self.global(*g).name),
            Value::Constant(_) => None,
        }
    }

    /// The function a value is local to.
    pub fn parent(&self, v: &Value) -> Option<FunctionId> {
        match v {
            Value::Instruction(i) => Some(i.func),
            Value::Argument(a) => Some(a.func),
            _ => None,
        }
    }

    pub fn is_int_constant(&self, v: &Value) -> bool {
        matches!(v.as_constant(), Some(Constant::Int { .. }))
    }
}
