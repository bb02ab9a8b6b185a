use misscheck::{
    analysis,
    llvm::{
        builder::ModuleBuilder, instruction::IntPredicate, types::Type, Module, Program, Value,
    },
    Config, GlobalContext, Signatures,
};

// ------------------------------------------------------------------
// Helpers

/// `f(x)`: if `x < 0` return `on_true`, otherwise `on_false`.
fn branch(on_true: i64, on_false: i64) -> Module {
    let i32t = Type::int(32);
    let mut m = ModuleBuilder::new("a.c");
    let mut f = m.define("f", Type::func(i32t.clone(), vec![i32t.clone()], false));
    let entry = f.block("entry");
    let t = f.block("t");
    let e = f.block("e");
    f.position(entry);
    f.at("a.c", 3);
    let c = f.icmp(IntPredicate::Slt, f.arg(0), Value::int(32, 0));
    f.cond_br(c, t, e);
    f.position(t);
    f.ret(Some(Value::int(32, on_true)));
    f.position(e);
    f.ret(Some(Value::int(32, on_false)));
    m.finish()
}

/// `f(x)`: calls `handler` when `x == 0`.
fn guarded_call(handler: &str) -> Module {
    let i32t = Type::int(32);
    let mut m = ModuleBuilder::new("a.c");
    let h = m.declare(handler, Type::func(Type::void(), vec![], false));
    let mut f = m.define("f", Type::func(Type::void(), vec![i32t.clone()], false));
    let entry = f.block("entry");
    let bad = f.block("bad");
    let ok = f.block("ok");
    f.position(entry);
    let c = f.icmp(IntPredicate::Eq, f.arg(0), Value::int(32, 0));
    f.cond_br(c, bad, ok);
    f.position(bad);
    f.call(h, vec![]);
    f.unreachable();
    f.position(ok);
    f.ret(None);
    m.finish()
}

/// `f(x, y)`: `x < 0` picks `p` from `on_true` or `on_false`; both paths
/// join before `y < 0` decides which `ret p` is taken.
fn joined(on_true: i64, on_false: i64) -> Module {
    let i32t = Type::int(32);
    let mut m = ModuleBuilder::new("a.c");
    let mut f = m.define(
        "f",
        Type::func(i32t.clone(), vec![i32t.clone(), i32t.clone()], false),
    );
    let entry = f.block("entry");
    let a = f.block("a");
    let b = f.block("b");
    let join = f.block("join");
    let t = f.block("t");
    let e = f.block("e");
    f.position(entry);
    let c = f.icmp(IntPredicate::Slt, f.arg(0), Value::int(32, 0));
    f.cond_br(c, a, b);
    f.position(a);
    f.br(join);
    f.position(b);
    f.br(join);
    f.position(join);
    let p = f.phi(
        i32t.clone(),
        vec![(Value::int(32, on_true), a), (Value::int(32, on_false), b)],
    );
    let d = f.icmp(IntPredicate::Slt, f.arg(1), Value::int(32, 0));
    f.cond_br(d, t, e);
    f.position(t);
    f.ret(Some(p.clone()));
    f.position(e);
    f.ret(Some(p));
    m.finish()
}

/// `f(x)`: `return x < 0 ? on_true : on_false;`
fn selected(on_true: i64, on_false: i64) -> Module {
    let i32t = Type::int(32);
    let mut m = ModuleBuilder::new("a.c");
    let mut f = m.define("f", Type::func(i32t.clone(), vec![i32t.clone()], false));
    let c = f.icmp(IntPredicate::Slt, f.arg(0), Value::int(32, 0));
    let s = f.select(c, Value::int(32, on_true), Value::int(32, on_false));
    f.ret(Some(s));
    m.finish()
}

fn run(program: &Program, config: &Config) -> (usize, usize, Vec<Value>) {
    let mut ctx = GlobalContext::new(program, config);
    analysis::call_graph(&mut ctx);
    analysis::security_checks(&mut ctx);
    let conditions = ctx
        .security_checks
        .values()
        .flatten()
        .map(|c| c.condition.clone())
        .collect();
    (ctx.stats.security_checks, ctx.stats.cond_statements, conditions)
}

fn condition_of(program: &Program) -> Value {
    let f = program.function_named("f").unwrap();
    let (id, _) = program
        .instructions(f)
        .find(|(_, i)| i.opcode.is_cmp())
        .unwrap();
    Value::Instruction(id)
}

// ------------------------------------------------------------------
// Tests

#[test]
fn error_return_on_either_branch() {
    let config = Config::default();
    for (on_true, on_false) in [(-22, 0), (0, -22)] {
        let program = Program::from_modules([branch(on_true, on_false)]).unwrap();
        let (checks, conds, conditions) = run(&program, &config);
        assert_eq!((1, 1), (checks, conds));
        assert_eq!(vec![condition_of(&program)], conditions);
    }
}

#[test]
fn no_check_when_both_branches_fail() {
    let config = Config::default();
    let program = Program::from_modules([branch(-22, -14)]).unwrap();
    assert_eq!((0, 1, vec![]), run(&program, &config));
}

#[test]
fn no_check_when_neither_branch_fails() {
    let config = Config::default();
    let program = Program::from_modules([branch(1, 0)]).unwrap();
    assert_eq!((0, 1, vec![]), run(&program, &config));
}

#[test]
fn error_and_success_paths_join_to_may_return() {
    let config = Config::default();
    let program = Program::from_modules([joined(-22, 0)]).unwrap();
    let (checks, conds, conditions) = run(&program, &config);
    assert_eq!((1, 2), (checks, conds));
    // Only the branch before the join decides the error
    assert_eq!(vec![condition_of(&program)], conditions);
}

#[test]
fn error_paths_join_to_must_return() {
    let config = Config::default();
    let program = Program::from_modules([joined(-22, -5)]).unwrap();
    assert_eq!((0, 2, vec![]), run(&program, &config));
}

#[test]
fn select_between_error_and_success() {
    let config = Config::default();
    for (on_true, on_false) in [(-22, 0), (0, -22)] {
        let program = Program::from_modules([selected(on_true, on_false)]).unwrap();
        let (checks, conds, conditions) = run(&program, &config);
        assert_eq!((1, 1), (checks, conds));
        assert_eq!(vec![condition_of(&program)], conditions);
    }

    // No edge or select carries a decision, so nothing is counted
    let program = Program::from_modules([selected(-22, -5)]).unwrap();
    assert_eq!((0, 0, vec![]), run(&program, &config));
}

#[test]
fn check_location_comes_from_the_condition() {
    let config = Config::default();
    let program = Program::from_modules([branch(-22, 0)]).unwrap();
    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);
    analysis::security_checks(&mut ctx);
    let check = ctx.security_checks.values().flatten().next().unwrap();
    assert_eq!(3, check.loc.as_ref().unwrap().line);
}

#[test]
fn builtin_error_handler() {
    let config = Config::default();
    let program = Program::from_modules([guarded_call("BUG")]).unwrap();
    let (checks, _, conditions) = run(&program, &config);
    assert_eq!(1, checks);
    assert_eq!(vec![condition_of(&program)], conditions);
}

#[test]
fn configured_error_handler() {
    let program = Program::from_modules([guarded_call("my_fatal")]).unwrap();
    let config = Config::default();
    assert_eq!(0, run(&program, &config).0);

    let mut signatures = Signatures::default();
    signatures.add_error_handlers(["my_fatal", "x"]);
    let config = Config {
        signatures,
        ..Config::default()
    };
    assert_eq!(1, run(&program, &config).0);
}

#[test]
fn oversized_functions_are_skipped() {
    let program = Program::from_modules([branch(-22, 0)]).unwrap();
    let config = Config {
        max_blocks: 2,
        ..Config::default()
    };
    assert_eq!((0, 0, vec![]), run(&program, &config));
}
