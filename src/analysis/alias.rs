// SPDX-License-Identifier: BSD-3-Clause
//! Alias queries.

use crate::llvm::constant::{Constant, ExprOp};
use crate::llvm::instruction::Opcode;
use crate::llvm::{FunctionId, Program, Value};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum AliasResult {
    No,
    May,
    Partial,
    Must,
}

pub trait AliasOracle {
    /// How the pointers `a` and `b`, used in `func`, may overlap.
    fn alias(&self, program: &Program, func: FunctionId, a: &Value, b: &Value) -> AliasResult;
}

/// Local reasoning in the manner of LLVM's basic alias analysis: pointers
/// are decomposed into a base object plus a path of getelementptr indices.
///
/// - Identical values are `Must`.
/// - Over the same base, equal paths are `Must` (so are paths that differ
///   only in trailing zero indices), a path that is a prefix of the other is
///   `Partial`, other constant paths are `No` and a variable index makes the
///   answer `May`.
/// - Distinct identified objects (allocas, globals, functions, null) are
///   `No`.
/// - Anything else is `May`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicAlias;

/// Index path of a decomposed pointer; `None` is a variable index.
type Path = Vec<Option<i64>>;

fn const_index(v: &Value) -> Option<i64> {
    v.as_constant().and_then(Constant::int_value)
}

/// Append the indices of a getelementptr applied after `path`: its first
/// index offsets the last index of `path`.
fn push_indices(path: &mut Path, indices: &[Value]) {
    let mut indices = indices.iter().map(const_index);
    if let Some(first) = indices.next() {
        match path.last_mut() {
            Some(last) => {
                *last = match (*last, first) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                }
            }
            None => path.push(first),
        }
    }
    path.extend(indices);
}

fn decompose(program: &Program, v: &Value) -> (Value, Path) {
    // Collected outermost first
    let mut geps: Vec<Vec<Value>> = Vec::new();
    let mut base = program.strip_pointer_casts(v);
    loop {
        let next = match &base {
            Value::Instruction(i) => match &program.instruction(*i).opcode {
                Opcode::GetElementPtr {
                    pointer, indices, ..
                } => {
                    geps.push(indices.clone());
                    pointer.clone()
                }
                _ => break,
            },
            Value::Constant(c) => match &**c {
                Constant::Expr {
                    op: ExprOp::GetElementPtr { .. },
                    operands,
                    ..
                } if !operands.is_empty() => {
                    geps.push(operands[1..].to_vec());
                    operands[0].clone()
                }
                _ => break,
            },
            _ => break,
        };
        let next = program.strip_pointer_casts(&next);
        if next == base {
            break;
        }
        base = next;
    }
    let mut path = Vec::new();
    for indices in geps.iter().rev() {
        push_indices(&mut path, indices);
    }
    (base, path)
}

fn is_identified_object(program: &Program, v: &Value) -> bool {
    match v {
        Value::Global(_) | Value::Function(_) => true,
        Value::Instruction(_) => matches!(program.opcode(v), Some(Opcode::Alloca { .. })),
        Value::Constant(c) => matches!(**c, Constant::Null { .. }),
        Value::Argument(_) => false,
    }
}

fn trim_zeros(path: &[Option<i64>]) -> &[Option<i64>] {
    let mut end = path.len();
    while end > 0 && path[end - 1] == Some(0) {
        end -= 1;
    }
    &path[..end]
}

fn compare_paths(a: &Path, b: &Path) -> AliasResult {
    if a.iter().chain(b.iter()).any(Option::is_none) {
        return AliasResult::May;
    }
    if a.len() == b.len() {
        return if a == b {
            AliasResult::Must
        } else {
            AliasResult::No
        };
    }
    if trim_zeros(a) == trim_zeros(b) {
        return AliasResult::Must;
    }
    let shared = a.len().min(b.len());
    if a[..shared] == b[..shared] {
        AliasResult::Partial
    } else {
        AliasResult::No
    }
}

impl AliasOracle for BasicAlias {
    fn alias(&self, program: &Program, _func: FunctionId, a: &Value, b: &Value) -> AliasResult {
        if a == b {
            return AliasResult::Must;
        }
        let (base_a, path_a) = decompose(program, a);
        let (base_b, path_b) = decompose(program, b);
        if base_a == base_b {
            return compare_paths(&path_a, &path_b);
        }
        if is_identified_object(program, &base_a) && is_identified_object(program, &base_b) {
            return AliasResult::No;
        }
        AliasResult::May
    }
}
