// SPDX-License-Identifier: BSD-3-Clause
//! Multi-layer type analysis for indirect calls.
//!
//! Functions whose address is stored to a field of a composite type are
//! recorded per `(type, field)`. An indirect call through a value loaded
//! from such a field can then only reach functions recorded for it, and for
//! the fields of the layers further out (`a->b->f()`), as long as none of
//! those types escaped (had something stored into them that the analysis
//! cannot attribute).

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::llvm::constant::{Constant, ExprOp};
use crate::llvm::instruction::Opcode;
use crate::llvm::types::{Type, TypeRef};
use crate::llvm::{Function, FunctionId, Program, Value};

/// Bit width of pointer-sized integers.
const INT_PTR_BITS: u32 = 64;

/// A composite type, or one field of it.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LayerKey {
    pub ty: String,
    pub field: Option<i64>,
}

impl LayerKey {
    pub fn whole(ty: &Type) -> Self {
        LayerKey {
            ty: ty.key(),
            field: None,
        }
    }

    pub fn field(ty: &Type, field: i64) -> Self {
        LayerKey {
            ty: ty.key(),
            field: Some(field),
        }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(idx) => write!(f, "{}.{}", self.ty, idx),
            None => write!(f, "{}", self.ty),
        }
    }
}

fn gep_layer(source: &TypeRef, pointer: &Value, indices: &[Value]) -> Option<(LayerKey, Value)> {
    if !source.is_composite() {
        return None;
    }
    let consts: Option<Vec<i64>> = indices
        .iter()
        .map(|i| i.as_constant().and_then(Constant::int_value))
        .collect();
    let last = *consts?.last()?;
    Some((LayerKey::field(source, last), pointer.clone()))
}

/// The field a pointer (or a value loaded through it) was taken from, and
/// the pointer to the enclosing object. Looks through loads, casts and other
/// unary instructions.
pub fn next_layer(program: &Program, v: &Value) -> Option<(LayerKey, Value)> {
    let mut v = v.clone();
    let mut seen = FxHashSet::default();
    while seen.insert(v.clone()) {
        let next = match &v {
            Value::Instruction(i) => match &program.instruction(*i).opcode {
                Opcode::GetElementPtr {
                    source,
                    pointer,
                    indices,
                } => return gep_layer(source, pointer, indices),
                op => op.unary_operand()?.clone(),
            },
            Value::Constant(c) => match &**c {
                Constant::Expr {
                    op: ExprOp::GetElementPtr { source },
                    operands,
                    ..
                } if !operands.is_empty() => {
                    return gep_layer(source, &operands[0], &operands[1..])
                }
                c if c.is_pointer_cast() => c.operands().first()?.clone(),
                _ => return None,
            },
            _ => return None,
        };
        v = next;
    }
    None
}

#[derive(Debug, Default)]
pub struct TypeAnalysis {
    /// Functions stored to each field.
    type_funcs: FxHashMap<LayerKey, BTreeSet<FunctionId>>,
    /// Composite types held by a type or field.
    confine: FxHashMap<LayerKey, FxHashSet<String>>,
    /// Type keys to the type keys cast into them.
    transit: FxHashMap<String, FxHashSet<String>>,
    escapes: FxHashSet<LayerKey>,
}

impl TypeAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn funcs(&self, key: &LayerKey) -> Option<&BTreeSet<FunctionId>> {
        self.type_funcs.get(key)
    }

    /// Whether the field, or its whole type, escaped.
    pub fn is_escaped(&self, key: &LayerKey) -> bool {
        self.escapes.contains(key)
            || self.escapes.contains(&LayerKey {
                ty: key.ty.clone(),
                field: None,
            })
    }

    fn escape(&mut self, key: LayerKey) {
        self.escapes.insert(key);
    }

    /// Record the functions and composite values of a global initializer.
    pub fn confine_initializer(&mut self, program: &Program, init: &Value) {
        let mut queue = VecDeque::from([init.clone()]);
        while let Some(v) = queue.pop_front() {
            let (ty, elements) = match v.as_constant() {
                Some(Constant::Aggregate { ty, elements }) => (ty, elements),
                _ => continue,
            };
            for (idx, elem) in elements.iter().enumerate() {
                let key = LayerKey::field(ty, idx as i64);
                if let Some(f) = program.strip_pointer_casts(elem).as_function() {
                    self.type_funcs.entry(key).or_default().insert(f);
                    continue;
                }
                let elem_ty = program.type_of(elem);
                if elem_ty.is_composite() {
                    self.confine.entry(key).or_default().insert(elem_ty.key());
                    queue.push_back(elem.clone());
                }
            }
        }
    }

    pub fn confine_store(&mut self, program: &Program, value: &Value, pointer: &Value) {
        let stripped = program.strip_pointer_casts(value);
        if let Some(f) = stripped.as_function() {
            if let Some((key, _)) = next_layer(program, pointer) {
                self.type_funcs.entry(key).or_default().insert(f);
            }
            return;
        }

        let value_ty = program.type_of(value);
        if value_ty.is_composite() {
            match program.type_of(pointer).pointee() {
                Some(p) if p.is_composite() => {
                    self.confine
                        .entry(LayerKey::whole(p))
                        .or_default()
                        .insert(value_ty.key());
                }
                Some(p) => self.escape(LayerKey::whole(p)),
                None => (),
            }
            return;
        }

        if matches!(value.as_constant(), Some(Constant::Null { .. })) {
            return;
        }
        let value_pointee = match value_ty.pointee() {
            Some(p) => p,
            None => return,
        };
        match next_layer(program, pointer) {
            Some((key, _)) => {
                if value_pointee.is_composite() {
                    self.confine
                        .entry(key)
                        .or_default()
                        .insert(value_pointee.key());
                } else {
                    self.escape(key);
                }
            }
            None => {
                // A composite object stored through a `void *`-style alias
                if stripped != *value && !value_pointee.is_composite() {
                    if let Some(p) = program.type_of(&stripped).pointee() {
                        if p.is_composite() {
                            self.escape(LayerKey::whole(p));
                        }
                    }
                }
            }
        }
    }

    pub fn confine_cast(&mut self, from: &Type, to: &Type) {
        if from.is_composite() {
            self.transit.entry(to.key()).or_default().insert(from.key());
            return;
        }
        if let (Some(f), Some(t)) = (from.pointee(), to.pointee()) {
            if f.is_composite() && t.is_composite() {
                self.transit.entry(t.key()).or_default().insert(f.key());
            }
        }
    }

    /// Types embedded in an escaped type or field escape too.
    pub fn propagate_escapes(&mut self) {
        loop {
            let mut escaped = Vec::new();
            for (container, held) in &self.confine {
                if !self.is_escaped(container) {
                    continue;
                }
                for ty in held {
                    let key = LayerKey {
                        ty: ty.clone(),
                        field: None,
                    };
                    if !self.escapes.contains(&key) {
                        escaped.push(key);
                    }
                }
            }
            if escaped.is_empty() {
                break;
            }
            self.escapes.extend(escaped);
        }
    }

    /// Every type transitively cast into `ty`.
    fn transits(&self, ty: &str) -> Vec<String> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([ty]);
        seen.insert(ty);
        while let Some(t) = queue.pop_front() {
            for from in self.transit.get(t).into_iter().flatten() {
                if seen.insert(from) {
                    out.push(from.clone());
                    queue.push_back(from);
                }
            }
        }
        out
    }

    /// Refine the first-layer targets `first` of a call through `called`.
    pub fn resolve(
        &self,
        program: &Program,
        first: &BTreeSet<FunctionId>,
        called: &Value,
    ) -> BTreeSet<FunctionId> {
        let mut targets = first.clone();
        let mut cur = called.clone();
        while let Some((key, next)) = next_layer(program, &cur) {
            if self.is_escaped(&key) {
                break;
            }
            let mut layer = self.funcs(&key).cloned().unwrap_or_default();
            for ty in self.transits(&key.ty) {
                let k = LayerKey { ty, field: key.field };
                if let Some(fs) = self.funcs(&k) {
                    layer.extend(fs.iter().copied());
                }
            }
            // Nothing was ever stored at this layer, so it cannot refine
            if layer.is_empty() {
                break;
            }
            targets = targets.intersection(&layer).copied().collect();
            cur = next;
        }
        targets
    }
}

fn is_i8_ptr(t: &Type) -> bool {
    t.pointee().and_then(|p| p.int_bits()) == Some(8)
}

/// `i8*` stands for any pointer or pointer-sized integer.
fn widens(a: &Type, b: &Type) -> bool {
    let pointer_like = |t: &Type| t.is_pointer() || t.int_bits() == Some(INT_PTR_BITS);
    (is_i8_ptr(a) && pointer_like(b)) || (is_i8_ptr(b) && pointer_like(a))
}

/// Whether an argument of type `actual` may be passed for a parameter of
/// type `defined`. Named structs compare by name, so the same struct from
/// different modules matches.
pub fn types_compatible(defined: &Type, actual: &Type) -> bool {
    if defined == actual || widens(defined, actual) {
        return true;
    }
    let (mut d, mut a) = (defined, actual);
    while let (Some(dp), Some(ap)) = (d.pointee(), a.pointee()) {
        d = &**dp;
        a = &**ap;
    }
    if d == a {
        return true;
    }
    if let (Some(x), Some(y)) = (d.int_bits(), a.int_bits()) {
        return x == y;
    }
    widens(d, a)
}

/// Structural matching of call arguments against a function's parameters.
/// Variadic functions only match on their fixed parameters.
pub fn signature_matches(f: &Function, args: &[TypeRef]) -> bool {
    if f.is_intrinsic() {
        return false;
    }
    let (params, var_arg) = match f.ty.signature() {
        Some((_, params, var_arg)) => (params, var_arg),
        None => return false,
    };
    if (var_arg && args.len() < params.len()) || (!var_arg && args.len() != params.len()) {
        return false;
    }
    params
        .iter()
        .zip(args)
        .all(|(d, a)| types_compatible(d, a))
}

#[cfg(test)]
mod tests {
    use super::{next_layer, types_compatible, LayerKey, TypeAnalysis};
    use crate::llvm::builder::ModuleBuilder;
    use crate::llvm::types::Type;
    use crate::llvm::Program;

    #[test]
    fn compatibility() {
        let dev = Type::named("struct.dev");
        let i8p = Type::ptr(Type::int(8));
        assert!(types_compatible(&Type::int(32), &Type::int(32)));
        assert!(types_compatible(
            &Type::ptr(Type::ptr(dev.clone())),
            &Type::ptr(Type::ptr(Type::named("struct.dev")))
        ));
        assert!(types_compatible(&i8p, &Type::ptr(dev.clone())));
        assert!(types_compatible(&Type::ptr(dev.clone()), &i8p));
        assert!(types_compatible(&i8p, &Type::int(64)));
        assert!(types_compatible(&Type::ptr(i8p.clone()), &Type::ptr(Type::ptr(dev.clone()))));
        assert!(!types_compatible(&i8p, &Type::int(32)));
        assert!(!types_compatible(&Type::int(32), &Type::int(64)));
        assert!(!types_compatible(&Type::ptr(dev), &Type::ptr(Type::named("struct.other"))));
    }

    #[test]
    fn layers_and_escapes() {
        let i32t = Type::int(32);
        let ops = Type::named("struct.ops");
        let fty = Type::func(i32t.clone(), vec![], false);
        let fp = Type::ptr(fty.clone());
        let mut m = ModuleBuilder::new("a.c");
        let target = m.define("target", fty.clone());
        let target_v = target.value();
        let mut target = m.body(&target_v);
        target.ret(Some(crate::llvm::Value::int(32, 0)));
        let mut f = m.define(
            "f",
            Type::func(Type::void(), vec![Type::ptr(ops.clone())], false),
        );
        let field = f.field(f.arg(0), 2, fp.clone());
        f.store(target_v.clone(), field.clone());
        let loaded = f.load(field.clone());
        let cast = f.bitcast(loaded.clone(), Type::ptr(Type::int(8)));
        f.ret(None);
        let program = Program::from_modules([m.finish()]).unwrap();

        let (key, base) = next_layer(&program, &cast).unwrap();
        assert_eq!(LayerKey::field(&ops, 2), key);
        assert_eq!("%struct.ops.2", key.to_string());
        assert!(next_layer(&program, &base).is_none());

        let mut ta = TypeAnalysis::new();
        ta.confine_store(&program, &target_v, &field);
        let funcs = ta.funcs(&key).unwrap();
        assert_eq!(1, funcs.len());

        // A non-function, non-composite pointer stored to the field
        ta.confine_store(&program, &cast, &field);
        assert!(ta.is_escaped(&key));
        assert!(!ta.is_escaped(&LayerKey::field(&ops, 1)));
    }
}
