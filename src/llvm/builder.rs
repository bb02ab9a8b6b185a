// SPDX-License-Identifier: BSD-3-Clause
//! Programmatic construction of [`Module`]s, in the manner of LLVM's
//! `IRBuilder`.

use triomphe::Arc;

use super::instruction::{BinaryOp, CastOp, DebugLoc, Instruction, IntPredicate, Opcode};
use super::program::value_type;
use super::types::{Type, TypeRef};
use super::{
    ArgumentId, Block, BlockId, Callee, Function, FunctionId, Global, GlobalId, InstructionId,
    Linkage, Module, Param, Value,
};

#[derive(Debug)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        ModuleBuilder {
            module: Module {
                name: name.to_string(),
                ..Module::default()
            },
        }
    }

    /// Declare a function of function type `ty`.
    pub fn declare(&mut self, name: &str, ty: TypeRef) -> Value {
        let params = ty
            .signature()
            .map(|(_, ps, _)| {
                ps.iter()
                    .map(|ty| Param {
                        name: None,
                        ty: ty.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let id = FunctionId(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            name: name.to_string(),
            ty,
            params,
            blocks: Vec::new(),
            linkage: Linkage::External,
            loc: None,
        });
        Value::Function(id)
    }

    /// Declare and start defining a function.
    pub fn define(&mut self, name: &str, ty: TypeRef) -> FunctionBuilder<'_> {
        let f = self.declare(name, ty);
        self.body(&f)
    }

    /// Start defining a previously declared function.
    ///
    /// Panics if `f` is not a function of this module.
    pub fn body(&mut self, f: &Value) -> FunctionBuilder<'_> {
        let func = match f {
            Value::Function(id) if id.index() < self.module.functions.len() => *id,
            _ => panic!("{} is not a function of module {}", f, self.module.name),
        };
        FunctionBuilder {
            module: &mut self.module,
            func,
            block: None,
            loc: None,
        }
    }

    /// A global variable holding a `value_ty`; the returned value is its
    /// address.
    pub fn global(&mut self, name: &str, value_ty: TypeRef, initializer: Option<Value>) -> Value {
        let id = GlobalId(self.module.globals.len() as u32);
        self.module.globals.push(Global {
            name: name.to_string(),
            value_ty,
            initializer,
            is_constant: false,
            linkage: Linkage::External,
        });
        Value::Global(id)
    }

    pub fn type_of(&self, v: &Value) -> TypeRef {
        value_type(&self.module.functions, &self.module.globals, v)
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

#[derive(Debug)]
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: FunctionId,
    block: Option<BlockId>,
    loc: Option<DebugLoc>,
}

impl FunctionBuilder<'_> {
    pub fn id(&self) -> FunctionId {
        self.func
    }

    pub fn value(&self) -> Value {
        Value::Function(self.func)
    }

    pub fn arg(&self, index: usize) -> Value {
        Value::Argument(ArgumentId {
            func: self.func,
            index: index as u32,
        })
    }

    fn function(&mut self) -> &mut Function {
        &mut self.module.functions[self.func.index()]
    }

    pub fn internal(&mut self) -> &mut Self {
        self.function().linkage = Linkage::Internal;
        self
    }

    /// Attach `file:line` to the instructions built from now on. The first
    /// location also becomes the function's.
    pub fn at(&mut self, file: &str, line: u32) -> &mut Self {
        let loc = DebugLoc {
            file: file.to_string(),
            line,
        };
        let f = self.function();
        if f.loc.is_none() {
            f.loc = Some(loc.clone());
        }
        self.loc = Some(loc);
        self
    }

    /// Append a block. Instructions go to the first block created until
    /// [`FunctionBuilder::position`] says otherwise.
    pub fn block(&mut self, name: &str) -> BlockId {
        let f = self.function();
        let id = BlockId(f.blocks.len() as u32);
        f.blocks.push(Block {
            name: name.to_string(),
            instrs: Vec::new(),
        });
        if self.block.is_none() {
            self.block = Some(id);
        }
        id
    }

    pub fn position(&mut self, b: BlockId) {
        self.block = Some(b);
    }

    pub fn type_of(&self, v: &Value) -> TypeRef {
        value_type(&self.module.functions, &self.module.globals, v)
    }

    /// Name an instruction.
    pub fn name(&mut self, v: &Value, name: &str) {
        if let Value::Instruction(i) = v {
            self.module.functions[i.func.index()].blocks[i.block.index()].instrs
                [i.index as usize]
                .name = Some(name.to_string());
        }
    }

    fn push(&mut self, opcode: Opcode, ty: TypeRef) -> Value {
        let block = match self.block {
            Some(b) => b,
            None => self.block("entry"),
        };
        let loc = self.loc.clone();
        let instrs = &mut self.function().blocks[block.index()].instrs;
        let index = instrs.len() as u32;
        instrs.push(Instruction {
            name: None,
            opcode,
            ty,
            loc,
        });
        Value::Instruction(InstructionId::new(self.func, block, index))
    }

    pub fn alloca(&mut self, allocated: TypeRef) -> Value {
        let ty = Type::ptr(allocated.clone());
        self.push(Opcode::Alloca { allocated }, ty)
    }

    pub fn load(&mut self, pointer: Value) -> Value {
        let ty = match self.type_of(&pointer).pointee() {
            Some(t) => t.clone(),
            None => Arc::new(Type::Other),
        };
        self.push(Opcode::Load { pointer }, ty)
    }

    pub fn store(&mut self, value: Value, pointer: Value) {
        self.push(Opcode::Store { value, pointer }, Type::void());
    }

    /// A `getelementptr` yielding a `ty`.
    pub fn gep(&mut self, pointer: Value, indices: Vec<Value>, ty: TypeRef) -> Value {
        let source = match self.type_of(&pointer).pointee() {
            Some(t) => t.clone(),
            None => Arc::new(Type::Other),
        };
        self.push(
            Opcode::GetElementPtr {
                source,
                pointer,
                indices,
            },
            ty,
        )
    }

    /// Address of field `index` of the struct `pointer` points to, as a
    /// pointer to `field_ty`.
    pub fn field(&mut self, pointer: Value, index: i64, field_ty: TypeRef) -> Value {
        self.gep(
            pointer,
            vec![Value::int(32, 0), Value::int(32, index)],
            Type::ptr(field_ty),
        )
    }

    pub fn cast(&mut self, op: CastOp, operand: Value, ty: TypeRef) -> Value {
        self.push(Opcode::Cast { op, operand }, ty)
    }

    pub fn bitcast(&mut self, operand: Value, ty: TypeRef) -> Value {
        self.cast(CastOp::BitCast, operand, ty)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.type_of(&lhs);
        self.push(Opcode::Binary { op, lhs, rhs }, ty)
    }

    pub fn icmp(&mut self, predicate: IntPredicate, lhs: Value, rhs: Value) -> Value {
        self.push(
            Opcode::ICmp {
                predicate,
                lhs,
                rhs,
            },
            Type::int(1),
        )
    }

    pub fn phi(&mut self, ty: TypeRef, incoming: Vec<(Value, BlockId)>) -> Value {
        self.push(Opcode::Phi { incoming }, ty)
    }

    pub fn select(&mut self, condition: Value, true_value: Value, false_value: Value) -> Value {
        let ty = self.type_of(&true_value);
        self.push(
            Opcode::Select {
                condition,
                true_value,
                false_value,
            },
            ty,
        )
    }

    /// Call a function or function pointer; the function type comes from the
    /// callee's pointer type.
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> Value {
        let function_ty = match self.type_of(&callee).pointee() {
            Some(t) => t.clone(),
            None => Type::func(Type::void(), Vec::new(), false),
        };
        self.call_typed(Callee::Value(callee), args, function_ty)
    }

    pub fn call_asm(&mut self, asm: &str, args: Vec<Value>, function_ty: TypeRef) -> Value {
        self.call_typed(
            Callee::Asm {
                asm: asm.to_string(),
            },
            args,
            function_ty,
        )
    }

    fn call_typed(&mut self, callee: Callee, args: Vec<Value>, function_ty: TypeRef) -> Value {
        let ty = match function_ty.signature() {
            Some((ret, _, _)) => ret.clone(),
            None => Type::void(),
        };
        self.push(
            Opcode::Call {
                callee,
                args,
                function_ty,
            },
            ty,
        )
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(Opcode::Ret { value }, Type::void());
    }

    pub fn br(&mut self, dest: BlockId) {
        self.push(Opcode::Br { dest }, Type::void());
    }

    pub fn cond_br(&mut self, condition: Value, true_dest: BlockId, false_dest: BlockId) {
        self.push(
            Opcode::CondBr {
                condition,
                true_dest,
                false_dest,
            },
            Type::void(),
        );
    }

    pub fn switch(&mut self, condition: Value, default: BlockId, cases: Vec<(i64, BlockId)>) {
        self.push(
            Opcode::Switch {
                condition,
                default,
                cases,
            },
            Type::void(),
        );
    }

    pub fn unreachable(&mut self) {
        self.push(Opcode::Unreachable, Type::void());
    }
}

#[cfg(test)]
mod tests {
    use super::ModuleBuilder;
    use crate::llvm::{instruction::IntPredicate, types::Type, Program, Value};

    #[test]
    fn builds_linkable_modules() {
        let i32t = Type::int(32);
        let mut m = ModuleBuilder::new("a.c");
        let callee = m.declare("g", Type::func(i32t.clone(), vec![i32t.clone()], false));
        let mut f = m.define("f", Type::func(i32t.clone(), vec![i32t.clone()], false));
        let entry = f.block("entry");
        let exit = f.block("exit");
        let r = f.call(callee.clone(), vec![f.arg(0)]);
        let c = f.icmp(IntPredicate::Slt, r.clone(), Value::int(32, 0));
        f.cond_br(c, exit, exit);
        f.position(exit);
        f.ret(Some(r.clone()));
        assert_eq!(i32t, f.type_of(&r));
        let module = m.finish();

        let program = Program::from_modules([module.clone(), module]).unwrap();
        let g = program.function_named("g").unwrap();
        let f = program.function_named("f").unwrap();
        assert_eq!(2, program.modules().len());
        assert!(!program.is_address_taken(g));
        assert_eq!(&[entry], program.predecessors(f, exit));
        assert_eq!(2, program.users(f, &r_in(&program, f)).len());
    }

    fn r_in(program: &Program, f: crate::llvm::FunctionId) -> Value {
        program
            .instructions(f)
            .find(|(_, i)| i.opcode.is_call())
            .map(|(id, _)| Value::Instruction(id))
            .unwrap()
    }
}
