// SPDX-License-Identifier: BSD-3-Clause
//! Conversion from [`llvm_ir`] modules (loaded from bitcode) into [`Module`]s.

use std::collections::HashMap;
use std::path::Path;

use either::Either;
use llvm_ir::types::{Typed, Types};
use llvm_ir::{HasDebugLoc, Name};
use triomphe::Arc;

use super::constant::{Constant, ExprOp};
use super::instruction::{
    BinaryOp, CastOp, DebugLoc, Instruction, IntPredicate, Opcode, UnaryOp, VectorOp,
};
use super::types::{Type, TypeRef};
use super::{
    ArgumentId, Block, BlockId, Callee, Error, Function, FunctionId, Global, GlobalId,
    InstructionId, Linkage, Module, Param, Value,
};

/// Parse a bitcode file and convert it.
pub fn from_path(path: &Path) -> Result<Module, Error> {
    let m = llvm_ir::Module::from_bc_path(path).map_err(Error::Other)?;
    convert(&m)
}

pub fn convert(m: &llvm_ir::Module) -> Result<Module, Error> {
    let mut conv = Converter {
        types: &m.types,
        globals: HashMap::with_capacity(
            m.functions.len() + m.func_declarations.len() + m.global_vars.len(),
        ),
    };
    conv.collect_globals(m)?;

    let mut functions = Vec::with_capacity(m.functions.len() + m.func_declarations.len());
    for (idx, f) in m.functions.iter().enumerate() {
        functions.push(conv.function(FunctionId(idx as u32), f)?);
    }
    for d in &m.func_declarations {
        let ty = conv.signature(&d.return_type, d.parameters.iter().map(|p| &p.ty), d.is_var_arg);
        functions.push(Function {
            name: d.name.clone(),
            ty,
            params: conv.params(&d.parameters),
            blocks: Vec::new(),
            linkage: linkage(&d.linkage),
            loc: None,
        });
    }

    let mut globals = Vec::with_capacity(m.global_vars.len());
    for g in &m.global_vars {
        let initializer = match &g.initializer {
            Some(init) => Some(conv.constant(init)?),
            None => None,
        };
        globals.push(Global {
            name: name_string(&g.name),
            value_ty: conv.pointee(&g.ty),
            initializer,
            is_constant: g.is_constant,
            linkage: linkage(&g.linkage),
        });
    }

    Ok(Module {
        name: m.name.clone(),
        functions,
        globals,
    })
}

fn name_string(n: &Name) -> String {
    match n {
        Name::Name(n) => (**n).clone(),
        Name::Number(n) => n.to_string(),
    }
}

fn linkage(l: &llvm_ir::module::Linkage) -> Linkage {
    match l {
        llvm_ir::module::Linkage::External => Linkage::External,
        llvm_ir::module::Linkage::Internal | llvm_ir::module::Linkage::Private => {
            Linkage::Internal
        }
        _ => Linkage::Other,
    }
}

fn debug_loc(loc: &Option<llvm_ir::DebugLoc>) -> Option<DebugLoc> {
    loc.as_ref().map(|l| DebugLoc {
        file: l.filename.clone(),
        line: l.line,
    })
}

/// Sign-extend the low `bits` of `value`.
fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        value as i64
    } else {
        let shift = 64 - bits;
        ((value << shift) as i64) >> shift
    }
}

struct Converter<'m> {
    types: &'m Types,
    globals: HashMap<String, Value>,
}

impl<'m> Converter<'m> {
    fn collect_globals(&mut self, m: &'m llvm_ir::Module) -> Result<(), Error> {
        for (idx, f) in m.functions.iter().enumerate() {
            self.globals
                .insert(f.name.clone(), Value::Function(FunctionId(idx as u32)));
        }
        let defined = m.functions.len();
        for (idx, d) in m.func_declarations.iter().enumerate() {
            self.globals.insert(
                d.name.clone(),
                Value::Function(FunctionId((defined + idx) as u32)),
            );
        }
        for (idx, g) in m.global_vars.iter().enumerate() {
            self.globals
                .insert(name_string(&g.name), Value::Global(GlobalId(idx as u32)));
        }
        // Aliases stand for whatever they alias.
        for a in &m.global_aliases {
            let aliasee = self.constant(&a.aliasee)?;
            self.globals.insert(name_string(&a.name), aliasee);
        }
        Ok(())
    }

    fn ty(&self, t: &llvm_ir::TypeRef) -> TypeRef {
        match &**t {
            llvm_ir::Type::VoidType => Type::void(),
            llvm_ir::Type::IntegerType { bits } => Type::int(*bits),
            llvm_ir::Type::PointerType { pointee_type, .. } => Type::ptr(self.ty(pointee_type)),
            llvm_ir::Type::FPType(fp) => Arc::new(Type::Float {
                bits: match fp {
                    llvm_ir::types::FPType::Half | llvm_ir::types::FPType::BFloat => 16,
                    llvm_ir::types::FPType::Single => 32,
                    llvm_ir::types::FPType::Double => 64,
                    llvm_ir::types::FPType::X86_FP80 => 80,
                    llvm_ir::types::FPType::FP128 | llvm_ir::types::FPType::PPC_FP128 => 128,
                },
            }),
            llvm_ir::Type::FuncType {
                result_type,
                param_types,
                is_var_arg,
            } => self.signature(result_type, param_types.iter(), *is_var_arg),
            llvm_ir::Type::VectorType {
                element_type,
                num_elements,
                ..
            } => Arc::new(Type::Vector {
                element: self.ty(element_type),
                len: *num_elements as u64,
            }),
            llvm_ir::Type::ArrayType {
                element_type,
                num_elements,
            } => Type::array(self.ty(element_type), *num_elements as u64),
            llvm_ir::Type::StructType {
                element_types,
                is_packed,
            } => Arc::new(Type::Struct {
                fields: element_types.iter().map(|t| self.ty(t)).collect(),
                packed: *is_packed,
            }),
            llvm_ir::Type::NamedStructType { name } => Type::named(name),
            llvm_ir::Type::LabelType => Arc::new(Type::Label),
            llvm_ir::Type::MetadataType => Arc::new(Type::Metadata),
            // No `_` pattern to ensure this is updated if the type changes
            llvm_ir::Type::X86_MMXType => Arc::new(Type::Other),
            llvm_ir::Type::X86_AMXType => Arc::new(Type::Other),
            llvm_ir::Type::TokenType => Arc::new(Type::Other),
        }
    }

    fn pointee(&self, t: &llvm_ir::TypeRef) -> TypeRef {
        match &**t {
            llvm_ir::Type::PointerType { pointee_type, .. } => self.ty(pointee_type),
            _ => Arc::new(Type::Other),
        }
    }

    fn signature<'t>(
        &self,
        ret: &llvm_ir::TypeRef,
        params: impl Iterator<Item = &'t llvm_ir::TypeRef>,
        var_arg: bool,
    ) -> TypeRef {
        Type::func(self.ty(ret), params.map(|p| self.ty(p)).collect(), var_arg)
    }

    fn params(&self, params: &[llvm_ir::function::Parameter]) -> Vec<Param> {
        params
            .iter()
            .map(|p| Param {
                name: match &p.name {
                    Name::Name(n) => Some((**n).clone()),
                    Name::Number(_) => None,
                },
                ty: self.ty(&p.ty),
            })
            .collect()
    }

    fn expr(&self, op: ExprOp, operands: Vec<Value>, ty: &llvm_ir::TypeRef) -> Value {
        Value::Constant(Arc::new(Constant::Expr {
            op,
            operands,
            ty: self.ty(ty),
        }))
    }

    fn constant(&self, c: &llvm_ir::ConstantRef) -> Result<Value, Error> {
        let ty = c.get_type(self.types);
        let binary = |l: &llvm_ir::ConstantRef, r: &llvm_ir::ConstantRef| -> Result<Value, Error> {
            Ok(self.expr(ExprOp::Other, vec![self.constant(l)?, self.constant(r)?], &ty))
        };
        let aggregate = |elements: &[llvm_ir::ConstantRef]| -> Result<Value, Error> {
            let elements = elements
                .iter()
                .map(|e| self.constant(e))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::aggregate(self.ty(&ty), elements))
        };
        Ok(match &**c {
            llvm_ir::Constant::GlobalReference { name, .. } => {
                let name = name_string(name);
                self.globals
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::Other(format!("reference to unknown global {}", name)))?
            }
            llvm_ir::Constant::Int { bits, value } => Value::int(*bits, sign_extend(*value, *bits)),
            llvm_ir::Constant::Null(t) => Value::null(self.ty(t)),
            llvm_ir::Constant::AggregateZero(t) => {
                Value::Constant(Arc::new(Constant::Zero { ty: self.ty(t) }))
            }
            llvm_ir::Constant::Undef(t) | llvm_ir::Constant::Poison(t) => Value::undef(self.ty(t)),
            llvm_ir::Constant::Struct { values, .. } => aggregate(&values[..])?,
            llvm_ir::Constant::Array { elements, .. } => aggregate(&elements[..])?,
            llvm_ir::Constant::Vector(elements) => aggregate(&elements[..])?,
            llvm_ir::Constant::BitCast(b) => {
                self.expr(ExprOp::BitCast, vec![self.constant(&b.operand)?], &b.to_type)
            }
            llvm_ir::Constant::AddrSpaceCast(b) => self.expr(
                ExprOp::AddrSpaceCast,
                vec![self.constant(&b.operand)?],
                &b.to_type,
            ),
            llvm_ir::Constant::PtrToInt(p) => {
                self.expr(ExprOp::PtrToInt, vec![self.constant(&p.operand)?], &p.to_type)
            }
            llvm_ir::Constant::IntToPtr(p) => {
                self.expr(ExprOp::IntToPtr, vec![self.constant(&p.operand)?], &p.to_type)
            }
            llvm_ir::Constant::GetElementPtr(gep) => {
                let source = self.pointee(&gep.address.get_type(self.types));
                let mut operands = Vec::with_capacity(gep.indices.len() + 1);
                operands.push(self.constant(&gep.address)?);
                for i in &gep.indices {
                    operands.push(self.constant(i)?);
                }
                self.expr(ExprOp::GetElementPtr { source }, operands, &ty)
            }
            llvm_ir::Constant::Add(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::Sub(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::Mul(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::And(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::Or(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::Xor(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::Shl(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::LShr(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::AShr(e) => binary(&e.operand0, &e.operand1)?,
            llvm_ir::Constant::Trunc(e) => {
                self.expr(ExprOp::Other, vec![self.constant(&e.operand)?], &e.to_type)
            }
            llvm_ir::Constant::ZExt(e) => {
                self.expr(ExprOp::Other, vec![self.constant(&e.operand)?], &e.to_type)
            }
            llvm_ir::Constant::SExt(e) => {
                self.expr(ExprOp::Other, vec![self.constant(&e.operand)?], &e.to_type)
            }
            _ => Value::Constant(Arc::new(Constant::Other { ty: self.ty(&ty) })),
        })
    }

    fn function(&self, id: FunctionId, f: &'m llvm_ir::Function) -> Result<Function, Error> {
        let mut locals = HashMap::<&Name, Value>::new();
        let mut blocks = HashMap::<&Name, BlockId>::with_capacity(f.basic_blocks.len());
        for (idx, p) in f.parameters.iter().enumerate() {
            locals.insert(
                &p.name,
                Value::Argument(ArgumentId {
                    func: id,
                    index: idx as u32,
                }),
            );
        }
        for (b_idx, b) in f.basic_blocks.iter().enumerate() {
            let block = BlockId(b_idx as u32);
            blocks.insert(&b.name, block);
            for (idx, instr) in b.instrs.iter().enumerate() {
                if let Some(n) = instr.try_get_result() {
                    locals.insert(
                        n,
                        Value::Instruction(InstructionId::new(id, block, idx as u32)),
                    );
                }
            }
            // An invoke becomes a call followed by a branch.
            if let llvm_ir::Terminator::Invoke(invoke) = &b.term {
                locals.insert(
                    &invoke.result,
                    Value::Instruction(InstructionId::new(id, block, b.instrs.len() as u32)),
                );
            }
        }

        // This has to happen in a subsequent loop because LLVM sometimes
        // references variables before their definitions...
        let body = Body {
            conv: self,
            locals,
            blocks,
        };
        let mut converted = Vec::with_capacity(f.basic_blocks.len());
        for b in &f.basic_blocks {
            converted.push(body.block(b)?);
        }

        Ok(Function {
            name: f.name.clone(),
            ty: self.signature(&f.return_type, f.parameters.iter().map(|p| &p.ty), f.is_var_arg),
            params: self.params(&f.parameters),
            blocks: converted,
            linkage: linkage(&f.linkage),
            loc: debug_loc(f.get_debug_loc()),
        })
    }
}

/// Conversion state for one function body.
struct Body<'c, 'm> {
    conv: &'c Converter<'m>,
    locals: HashMap<&'m Name, Value>,
    blocks: HashMap<&'m Name, BlockId>,
}

impl<'m> Body<'_, 'm> {
    fn operand(&self, op: &llvm_ir::Operand) -> Result<Value, Error> {
        match op {
            llvm_ir::Operand::LocalOperand { name, .. } => self
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Other(format!("reference to unknown local {}", name))),
            llvm_ir::Operand::ConstantOperand(c) => self.conv.constant(c),
            llvm_ir::Operand::MetadataOperand => Ok(Value::undef(Arc::new(Type::Metadata))),
        }
    }

    fn operands<'o>(
        &self,
        ops: impl IntoIterator<Item = &'o llvm_ir::Operand>,
    ) -> Result<Vec<Value>, Error> {
        ops.into_iter().map(|op| self.operand(op)).collect()
    }

    fn target(&self, name: &Name) -> Result<BlockId, Error> {
        self.blocks
            .get(name)
            .copied()
            .ok_or_else(|| Error::Other(format!("branch to unknown block {}", name)))
    }

    fn block(&self, b: &'m llvm_ir::BasicBlock) -> Result<Block, Error> {
        let mut instrs = Vec::with_capacity(b.instrs.len() + 1);
        for i in &b.instrs {
            instrs.push(Instruction {
                name: i.try_get_result().and_then(|n| match n {
                    Name::Name(n) => Some((**n).clone()),
                    Name::Number(_) => None,
                }),
                opcode: self.opcode(i)?,
                ty: self.conv.ty(&i.get_type(self.conv.types)),
                loc: debug_loc(i.get_debug_loc()),
            });
        }
        if let llvm_ir::Terminator::Invoke(invoke) = &b.term {
            let (opcode, ty) = self.call(
                &invoke.function,
                invoke.arguments.iter().map(|(op, _)| op),
            )?;
            instrs.push(Instruction {
                name: match &invoke.result {
                    Name::Name(n) => Some((**n).clone()),
                    Name::Number(_) => None,
                },
                opcode,
                ty,
                loc: debug_loc(&invoke.debugloc),
            });
        }
        instrs.push(Instruction {
            name: None,
            opcode: self.terminator(&b.term)?,
            ty: Type::void(),
            loc: debug_loc(b.term.get_debug_loc()),
        });
        Ok(Block {
            name: name_string(&b.name),
            instrs,
        })
    }

    fn binary(&self, op: BinaryOp, l: &llvm_ir::Operand, r: &llvm_ir::Operand) -> Result<Opcode, Error> {
        Ok(Opcode::Binary {
            op,
            lhs: self.operand(l)?,
            rhs: self.operand(r)?,
        })
    }

    fn cast(&self, op: CastOp, operand: &llvm_ir::Operand) -> Result<Opcode, Error> {
        Ok(Opcode::Cast {
            op,
            operand: self.operand(operand)?,
        })
    }

    fn unary(&self, op: UnaryOp, operand: &llvm_ir::Operand) -> Result<Opcode, Error> {
        Ok(Opcode::Unary {
            op,
            operand: self.operand(operand)?,
        })
    }

    fn vector<'o>(
        &self,
        op: VectorOp,
        ops: impl IntoIterator<Item = &'o llvm_ir::Operand>,
    ) -> Result<Opcode, Error> {
        Ok(Opcode::Vector {
            op,
            operands: self.operands(ops)?,
        })
    }

    fn call<'o>(
        &self,
        function: &Either<llvm_ir::function::InlineAssembly, llvm_ir::Operand>,
        args: impl IntoIterator<Item = &'o llvm_ir::Operand>,
    ) -> Result<(Opcode, TypeRef), Error> {
        let (callee, fty) = match function {
            // The bitcode reader does not give us the assembly string.
            Either::Left(asm) => (
                Callee::Asm { asm: String::new() },
                match &*asm.ty {
                    llvm_ir::Type::PointerType { pointee_type, .. } => self.conv.ty(pointee_type),
                    _ => self.conv.ty(&asm.ty),
                },
            ),
            Either::Right(op) => (
                Callee::Value(self.operand(op)?),
                self.conv.pointee(&op.get_type(self.conv.types)),
            ),
        };
        let ty = match fty.signature() {
            Some((ret, _, _)) => ret.clone(),
            None => Type::void(),
        };
        Ok((
            Opcode::Call {
                callee,
                args: self.operands(args)?,
                function_ty: fty,
            },
            ty,
        ))
    }

    fn opcode(&self, i: &'m llvm_ir::Instruction) -> Result<Opcode, Error> {
        use llvm_ir::Instruction as I;
        match i {
            I::Add(i) => self.binary(BinaryOp::Add, &i.operand0, &i.operand1),
            I::Sub(i) => self.binary(BinaryOp::Sub, &i.operand0, &i.operand1),
            I::Mul(i) => self.binary(BinaryOp::Mul, &i.operand0, &i.operand1),
            I::UDiv(i) => self.binary(BinaryOp::UDiv, &i.operand0, &i.operand1),
            I::SDiv(i) => self.binary(BinaryOp::SDiv, &i.operand0, &i.operand1),
            I::URem(i) => self.binary(BinaryOp::URem, &i.operand0, &i.operand1),
            I::SRem(i) => self.binary(BinaryOp::SRem, &i.operand0, &i.operand1),
            I::And(i) => self.binary(BinaryOp::And, &i.operand0, &i.operand1),
            I::Or(i) => self.binary(BinaryOp::Or, &i.operand0, &i.operand1),
            I::Xor(i) => self.binary(BinaryOp::Xor, &i.operand0, &i.operand1),
            I::Shl(i) => self.binary(BinaryOp::Shl, &i.operand0, &i.operand1),
            I::LShr(i) => self.binary(BinaryOp::LShr, &i.operand0, &i.operand1),
            I::AShr(i) => self.binary(BinaryOp::AShr, &i.operand0, &i.operand1),
            I::FAdd(i) => self.binary(BinaryOp::FAdd, &i.operand0, &i.operand1),
            I::FSub(i) => self.binary(BinaryOp::FSub, &i.operand0, &i.operand1),
            I::FMul(i) => self.binary(BinaryOp::FMul, &i.operand0, &i.operand1),
            I::FDiv(i) => self.binary(BinaryOp::FDiv, &i.operand0, &i.operand1),
            I::FRem(i) => self.binary(BinaryOp::FRem, &i.operand0, &i.operand1),
            I::FNeg(i) => self.unary(UnaryOp::FNeg, &i.operand),
            I::Freeze(i) => self.unary(UnaryOp::Freeze, &i.operand),
            I::VAArg(i) => self.unary(UnaryOp::VaArg, &i.arg_list),
            I::ExtractValue(i) => self.unary(UnaryOp::ExtractValue, &i.aggregate),
            I::ExtractElement(i) => {
                self.vector(VectorOp::ExtractElement, [&i.vector, &i.index])
            }
            I::InsertElement(i) => {
                self.vector(VectorOp::InsertElement, [&i.vector, &i.element, &i.index])
            }
            I::ShuffleVector(i) => {
                self.vector(VectorOp::ShuffleVector, [&i.operand0, &i.operand1])
            }
            I::InsertValue(i) => self.vector(VectorOp::InsertValue, [&i.aggregate, &i.element]),
            I::Alloca(i) => Ok(Opcode::Alloca {
                allocated: self.conv.ty(&i.allocated_type),
            }),
            I::Load(i) => Ok(Opcode::Load {
                pointer: self.operand(&i.address)?,
            }),
            I::Store(i) => Ok(Opcode::Store {
                value: self.operand(&i.value)?,
                pointer: self.operand(&i.address)?,
            }),
            I::GetElementPtr(i) => Ok(Opcode::GetElementPtr {
                source: self.conv.pointee(&i.address.get_type(self.conv.types)),
                pointer: self.operand(&i.address)?,
                indices: self.operands(&i.indices)?,
            }),
            I::Trunc(i) => self.cast(CastOp::Trunc, &i.operand),
            I::ZExt(i) => self.cast(CastOp::ZExt, &i.operand),
            I::SExt(i) => self.cast(CastOp::SExt, &i.operand),
            I::FPTrunc(i) => self.cast(CastOp::FPTrunc, &i.operand),
            I::FPExt(i) => self.cast(CastOp::FPExt, &i.operand),
            I::FPToUI(i) => self.cast(CastOp::FPToUI, &i.operand),
            I::FPToSI(i) => self.cast(CastOp::FPToSI, &i.operand),
            I::UIToFP(i) => self.cast(CastOp::UIToFP, &i.operand),
            I::SIToFP(i) => self.cast(CastOp::SIToFP, &i.operand),
            I::PtrToInt(i) => self.cast(CastOp::PtrToInt, &i.operand),
            I::IntToPtr(i) => self.cast(CastOp::IntToPtr, &i.operand),
            I::BitCast(i) => self.cast(CastOp::BitCast, &i.operand),
            I::AddrSpaceCast(i) => self.cast(CastOp::AddrSpaceCast, &i.operand),
            I::ICmp(i) => Ok(Opcode::ICmp {
                predicate: match i.predicate {
                    llvm_ir::IntPredicate::EQ => IntPredicate::Eq,
                    llvm_ir::IntPredicate::NE => IntPredicate::Ne,
                    llvm_ir::IntPredicate::UGT => IntPredicate::Ugt,
                    llvm_ir::IntPredicate::UGE => IntPredicate::Uge,
                    llvm_ir::IntPredicate::ULT => IntPredicate::Ult,
                    llvm_ir::IntPredicate::ULE => IntPredicate::Ule,
                    llvm_ir::IntPredicate::SGT => IntPredicate::Sgt,
                    llvm_ir::IntPredicate::SGE => IntPredicate::Sge,
                    llvm_ir::IntPredicate::SLT => IntPredicate::Slt,
                    llvm_ir::IntPredicate::SLE => IntPredicate::Sle,
                },
                lhs: self.operand(&i.operand0)?,
                rhs: self.operand(&i.operand1)?,
            }),
            I::FCmp(i) => Ok(Opcode::FCmp {
                lhs: self.operand(&i.operand0)?,
                rhs: self.operand(&i.operand1)?,
            }),
            I::Phi(i) => {
                let mut incoming = Vec::with_capacity(i.incoming_values.len());
                for (op, b) in &i.incoming_values {
                    incoming.push((self.operand(op)?, self.target(b)?));
                }
                Ok(Opcode::Phi { incoming })
            }
            I::Select(i) => Ok(Opcode::Select {
                condition: self.operand(&i.condition)?,
                true_value: self.operand(&i.true_value)?,
                false_value: self.operand(&i.false_value)?,
            }),
            I::Call(i) => self
                .call(&i.function, i.arguments.iter().map(|(op, _)| op))
                .map(|(opcode, _)| opcode),
            I::CmpXchg(i) => Ok(Opcode::Other {
                operands: self.operands([&i.address, &i.expected, &i.replacement])?,
            }),
            I::AtomicRMW(i) => Ok(Opcode::Other {
                operands: self.operands([&i.address, &i.value])?,
            }),
            I::Fence(_) | I::LandingPad(_) | I::CatchPad(_) | I::CleanupPad(_) => {
                Ok(Opcode::Other {
                    operands: Vec::new(),
                })
            }
        }
    }

    /// Exception-handling and indirect-branch terminators are lowered to
    /// `unreachable`.
    fn terminator(&self, t: &'m llvm_ir::Terminator) -> Result<Opcode, Error> {
        use llvm_ir::Terminator as T;
        match t {
            T::Ret(r) => Ok(Opcode::Ret {
                value: match &r.return_operand {
                    Some(op) => Some(self.operand(op)?),
                    None => None,
                },
            }),
            T::Br(b) => Ok(Opcode::Br {
                dest: self.target(&b.dest)?,
            }),
            T::CondBr(b) => Ok(Opcode::CondBr {
                condition: self.operand(&b.condition)?,
                true_dest: self.target(&b.true_dest)?,
                false_dest: self.target(&b.false_dest)?,
            }),
            T::Switch(s) => {
                let mut cases = Vec::with_capacity(s.dests.len());
                for (c, b) in &s.dests {
                    let value = match &**c {
                        llvm_ir::Constant::Int { bits, value } => sign_extend(*value, *bits),
                        _ => 0,
                    };
                    cases.push((value, self.target(b)?));
                }
                Ok(Opcode::Switch {
                    condition: self.operand(&s.operand)?,
                    default: self.target(&s.default_dest)?,
                    cases,
                })
            }
            T::Invoke(i) => Ok(Opcode::Br {
                dest: self.target(&i.return_label)?,
            }),
            T::Unreachable(_)
            | T::IndirectBr(_)
            | T::Resume(_)
            | T::CleanupRet(_)
            | T::CatchRet(_)
            | T::CatchSwitch(_)
            | T::CallBr(_) => Ok(Opcode::Unreachable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sign_extend;

    #[test]
    fn sign_extends_narrow_ints() {
        assert_eq!(-22, sign_extend(0xffff_ffea, 32));
        assert_eq!(1, sign_extend(1, 1));
        assert_eq!(-1, sign_extend(0xff, 8));
        assert_eq!(127, sign_extend(0x7f, 8));
        assert_eq!(-1, sign_extend(u64::MAX, 64));
    }
}
