use misscheck::{
    analysis::{
        self,
        missing::{Anchor, FindingKind, MissingChecks},
    },
    config::ShapePolicy,
    llvm::{
        builder::{FunctionBuilder, ModuleBuilder},
        instruction::IntPredicate,
        types::Type,
        Program, Value,
    },
    Config, GlobalContext,
};

// ------------------------------------------------------------------
// Helpers

/// `if (v < 0) return -EINVAL; <then>; return 0;`
fn check_negative(f: &mut FunctionBuilder<'_>, v: Value, then: impl FnOnce(&mut FunctionBuilder<'_>)) {
    let err = f.block("err");
    let ok = f.block("ok");
    let c = f.icmp(IntPredicate::Slt, v, Value::int(32, 0));
    f.cond_br(c, err, ok);
    f.position(err);
    f.ret(Some(Value::int(32, -22)));
    f.position(ok);
    then(f);
    f.ret(Some(Value::int(32, 0)));
}

/// `foo` may fail; `checked` callers test its result, the last caller
/// passes the result on (or, with `compare_unchecked`, compares it with a
/// value no caller checks against). With `split`, the callers live in their
/// own module and only declare `foo`.
fn retval_modules(checked: usize, compare_unchecked: bool, split: bool) -> Program {
    let i32t = Type::int(32);
    let fty = Type::func(i32t.clone(), vec![i32t.clone()], false);
    let mut defs = ModuleBuilder::new("drivers/foo.c");

    let mut foo = defs.define("foo", fty.clone());
    foo.block("entry");
    let x = foo.arg(0);
    check_negative(&mut foo, x, |_| ());
    let foo = foo.value();

    let (mut m, defs) = if split {
        (ModuleBuilder::new("drivers/users.c"), Some(defs))
    } else {
        (defs, None)
    };
    let foo = if split { m.declare("foo", fty.clone()) } else { foo };
    let bar = m.declare("bar", Type::func(Type::void(), vec![i32t.clone()], false));

    for k in 0..checked {
        let mut f = m.define(&format!("checked{}", k), fty.clone());
        f.block("entry");
        let r = f.call(foo.clone(), vec![f.arg(0)]);
        check_negative(&mut f, r, |_| ());
    }

    let mut u = m.define("unchecked", fty.clone());
    u.at("drivers/u.c", 12);
    let r = u.call(foo.clone(), vec![u.arg(0)]);
    if compare_unchecked {
        u.icmp(IntPredicate::Eq, r, Value::int(32, 5));
    } else {
        u.call(bar, vec![r]);
    }
    u.ret(Some(Value::int(32, 0)));

    let mut modules = vec![m.finish()];
    modules.extend(defs.map(ModuleBuilder::finish));
    Program::from_modules(modules).unwrap()
}

fn retval_program(checked: usize, compare_unchecked: bool) -> Program {
    retval_modules(checked, compare_unchecked, false)
}

/// Parameters spilled to the stack the way an unoptimized build does;
/// `checked` callers test the parameter before passing it to `sink`.
fn use_program(checked: usize) -> Program {
    let i32t = Type::int(32);
    let fty = Type::func(i32t.clone(), vec![i32t.clone()], false);
    let mut m = ModuleBuilder::new("drivers/sink.c");
    let sink = m.declare("sink", Type::func(Type::void(), vec![i32t.clone()], false));

    for k in 0..checked {
        let mut f = m.define(&format!("checked{}", k), fty.clone());
        f.block("entry");
        let slot = f.alloca(i32t.clone());
        f.store(f.arg(0), slot.clone());
        let x = f.load(slot.clone());
        let sink = sink.clone();
        check_negative(&mut f, x, move |f| {
            let y = f.load(slot);
            f.call(sink, vec![y]);
        });
    }

    let mut u = m.define("unchecked", fty.clone());
    u.at("drivers/sink.c", 40);
    let slot = u.alloca(i32t.clone());
    u.store(u.arg(0), slot.clone());
    let y = u.load(slot);
    u.call(sink, vec![y]);
    u.ret(Some(Value::int(32, 0)));

    Program::from_modules([m.finish()]).unwrap()
}

fn detect(program: &Program, config: &Config) -> (MissingChecks, String) {
    let mut ctx = GlobalContext::new(program, config);
    analysis::call_graph(&mut ctx);
    let mc = analysis::missing_checks(&mut ctx);
    let mut out = Vec::new();
    mc.write_report(&ctx, &mut out).unwrap();
    (mc, String::from_utf8(out).unwrap())
}

// ------------------------------------------------------------------
// Tests

#[test]
fn unchecked_return_value() {
    let program = retval_program(3, false);
    let config = Config::default();
    let (mc, report) = detect(&program, &config);

    let foo = program.function_named("foo").unwrap();
    let tally = mc.src_tally(&(Anchor::Function(foo), -1)).unwrap();
    assert_eq!((3, 1, 4), (tally.checks, tally.unchecks, tally.total));
    assert_eq!(3, mc.stage());
    assert_eq!(
        "== [Src-retval]: Rating: 0.250, Checks: 3, Unchecks: 1, Total: 4 | Arg: -1\n \
         [Code] drivers/u.c:12\n\n",
        report
    );
}

#[test]
fn unchecked_return_value_across_modules() {
    let program = retval_modules(3, false, true);
    let config = Config::default();
    let (mc, report) = detect(&program, &config);

    let foo = program.function_named("foo").unwrap();
    assert!(!program.function(foo).is_declaration());
    let tally = mc.src_tally(&(Anchor::Function(foo), -1)).unwrap();
    assert_eq!((3, 1, 4), (tally.checks, tally.unchecks, tally.total));
    assert_eq!(
        "== [Src-retval]: Rating: 0.250, Checks: 3, Unchecks: 1, Total: 4 | Arg: -1\n \
         [Code] drivers/u.c:12\n\n",
        report
    );
}

#[test]
fn rating_above_threshold_is_not_reported() {
    let program = retval_program(1, false);
    let config = Config::default();
    let (mc, report) = detect(&program, &config);

    let foo = program.function_named("foo").unwrap();
    let tally = mc.src_tally(&(Anchor::Function(foo), -1)).unwrap();
    assert_eq!((1, 1), (tally.checks, tally.unchecks));
    assert_eq!("", report);
}

#[test]
fn any_comparison_counts_as_a_check() {
    let program = retval_program(3, true);
    let config = Config::default();
    let (mc, report) = detect(&program, &config);

    let foo = program.function_named("foo").unwrap();
    let tally = mc.src_tally(&(Anchor::Function(foo), -1)).unwrap();
    assert_eq!((3, 0, 4), (tally.checks, tally.unchecks, tally.total));
    assert_eq!("", report);
}

#[test]
fn exact_shapes_reject_other_comparisons() {
    let program = retval_program(3, true);
    let config = Config {
        check_shapes: ShapePolicy::Exact,
        ..Config::default()
    };
    let (mc, _) = detect(&program, &config);

    let foo = program.function_named("foo").unwrap();
    let site = (Anchor::Function(foo), -1);
    let tally = mc.src_tally(&site).unwrap();
    assert_eq!((3, 1, 4), (tally.checks, tally.unchecks, tally.total));

    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);
    let findings = analysis::missing_checks(&mut ctx).findings(&ctx);
    assert_eq!(1, findings.len());
    assert_eq!(FindingKind::Retval, findings[0].kind);
    assert_eq!(site, findings[0].site);
}

#[test]
fn unchecked_use() {
    let program = use_program(9);
    let config = Config::default();
    let (mc, report) = detect(&program, &config);

    let sink = program.function_named("sink").unwrap();
    let tally = mc.use_tally(&(Anchor::Function(sink), 0)).unwrap();
    assert_eq!((9, 1, 10), (tally.checks, tally.unchecks, tally.total));
    assert_eq!(
        "== [Use]: Rating: 0.100, Checks: 9, Unchecks: 1, Total: 10 | Arg: 0\n \
         [Code] drivers/sink.c:40\n\n",
        report
    );
}

#[test]
fn statistics() {
    let program = retval_program(3, false);
    let config = Config::default();
    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);
    analysis::missing_checks(&mut ctx);
    // `foo` and its three checked callers
    assert_eq!(4, ctx.stats.security_checks);
    assert_eq!(4, ctx.stats.cond_statements);
    assert_eq!(4, ctx.security_checks.len());
}
