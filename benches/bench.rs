use criterion::{black_box, criterion_group, criterion_main, Criterion};

use misscheck::{
    analysis,
    llvm::{builder::ModuleBuilder, instruction::IntPredicate, types::Type, Module, Program, Value},
    Config, GlobalContext,
};

// ------------------------------------------------------------------
// Helpers

/// A driver-like module: `ncallees` fallible helpers, each called from
/// `ncallers` functions, every fourth of which ignores the result.
fn module(name: &str, ncallees: usize, ncallers: usize) -> Module {
    let i32t = Type::int(32);
    let fty = Type::func(i32t.clone(), vec![i32t.clone()], false);
    let mut m = ModuleBuilder::new(name);
    let log = m.declare("log_value", Type::func(Type::void(), vec![i32t.clone()], false));
    for k in 0..ncallees {
        let mut callee = m.define(&format!("{}_op{}", name, k), fty.clone());
        let entry = callee.block("entry");
        let err = callee.block("err");
        let ok = callee.block("ok");
        callee.position(entry);
        let c = callee.icmp(IntPredicate::Slt, callee.arg(0), Value::int(32, 0));
        callee.cond_br(c, err, ok);
        callee.position(err);
        callee.ret(Some(Value::int(32, -22)));
        callee.position(ok);
        callee.ret(Some(Value::int(32, 0)));
        let callee = callee.value();

        for j in 0..ncallers {
            let mut f = m.define(&format!("{}_use{}_{}", name, k, j), fty.clone());
            f.at(name, (k * ncallers + j) as u32 + 1);
            let entry = f.block("entry");
            let r = f.call(callee.clone(), vec![f.arg(0)]);
            if j % 4 == 3 {
                f.call(log.clone(), vec![r]);
                f.ret(Some(Value::int(32, 0)));
                continue;
            }
            let err = f.block("err");
            let ok = f.block("ok");
            f.position(entry);
            let c = f.icmp(IntPredicate::Slt, r.clone(), Value::int(32, 0));
            f.cond_br(c, err, ok);
            f.position(err);
            f.ret(Some(r));
            f.position(ok);
            f.ret(Some(Value::int(32, 0)));
        }
    }
    m.finish()
}

fn program() -> Program {
    Program::from_modules((0..8).map(|i| module(&format!("drivers/m{}.c", i), 16, 8))).unwrap()
}

// ------------------------------------------------------------------
// Benchmarks

pub fn call_graph(c: &mut Criterion) {
    let program = program();
    let config = Config::default();
    c.bench_function("analysis::call_graph", |b| {
        b.iter(|| {
            let mut ctx = GlobalContext::new(black_box(&program), &config);
            analysis::call_graph(&mut ctx);
        })
    });
}

pub fn missing_checks(c: &mut Criterion) {
    let program = program();
    let config = Config::default();
    c.bench_function("analysis::missing_checks", |b| {
        b.iter(|| {
            let mut ctx = GlobalContext::new(black_box(&program), &config);
            analysis::call_graph(&mut ctx);
            analysis::missing_checks(&mut ctx).findings(&ctx)
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = call_graph, missing_checks
}
criterion_main!(benches);
