// To debug a test, try `eprintln!("{:#?}", ctx.callees)`

use std::collections::BTreeSet;

use misscheck::{
    analysis::{self, callgraph::CallGraph},
    config::IndirectCalls,
    llvm::{builder::ModuleBuilder, types::Type, FunctionId, InstructionId, Program, Value},
    pass::ModulePass,
    Config, GlobalContext,
};

// ------------------------------------------------------------------
// Helpers

fn names(program: &Program, fs: &BTreeSet<FunctionId>) -> Vec<String> {
    fs.iter().map(|f| program.function(*f).name.clone()).collect()
}

/// The only call in `f`.
fn call_in(program: &Program, f: &str) -> InstructionId {
    let f = program.function_named(f).unwrap();
    let calls: Vec<InstructionId> = program
        .instructions(f)
        .filter(|(_, i)| i.opcode.is_call())
        .map(|(id, _)| id)
        .collect();
    assert_eq!(1, calls.len());
    calls[0]
}

/// `f1` and `f2` are stored to `ops.fn`, `f3` (with a different type) is cast
/// into it, and `f4` only goes into an unrelated struct. `dispatch` calls
/// through `ops.fn`. With `escape`, an `ops *` is also stored to a `void *`
/// global.
fn ops_program(escape: bool) -> Program {
    let i32t = Type::int(32);
    let i8p = Type::ptr(Type::int(8));
    let dev = Type::ptr(Type::named("struct.dev"));
    let ops = Type::ptr(Type::named("struct.ops"));
    let other = Type::ptr(Type::named("struct.other"));
    let fty = Type::func(i32t.clone(), vec![dev.clone()], false);
    let fp = Type::ptr(fty.clone());

    let mut m = ModuleBuilder::new("drivers/ops.c");
    let mut targets = Vec::new();
    for name in ["f1", "f2", "f4"] {
        let mut f = m.define(name, fty.clone());
        f.ret(Some(Value::int(32, 0)));
        targets.push(f.value());
    }
    let mut f3 = m.define("f3", Type::func(i32t.clone(), vec![i8p.clone()], false));
    f3.ret(Some(Value::int(32, 0)));
    let f3 = f3.value();
    let slot = m.global("slot", i8p.clone(), None);

    let mut setup = m.define("setup", Type::func(Type::void(), vec![ops.clone()], false));
    let field = setup.field(setup.arg(0), 0, fp.clone());
    setup.store(targets[0].clone(), field.clone());
    setup.store(targets[1].clone(), field.clone());
    setup.store(f3.bitcast(fp.clone()), field);
    if escape {
        let erased = setup.bitcast(setup.arg(0), i8p.clone());
        setup.store(erased, slot);
    }
    setup.ret(None);

    let mut setup_other = m.define("setup_other", Type::func(Type::void(), vec![other], false));
    let field = setup_other.field(setup_other.arg(0), 0, fp.clone());
    setup_other.store(targets[2].clone(), field);
    setup_other.ret(None);

    let mut dispatch = m.define(
        "dispatch",
        Type::func(i32t.clone(), vec![ops.clone(), dev.clone()], false),
    );
    let field = dispatch.field(dispatch.arg(0), 0, fp.clone());
    let fnp = dispatch.load(field);
    let r = dispatch.call(fnp, vec![dispatch.arg(1)]);
    dispatch.ret(Some(r));

    Program::from_modules([m.finish()]).unwrap()
}

fn callees_of_dispatch(program: &Program, config: &Config) -> Vec<String> {
    let mut ctx = GlobalContext::new(program, config);
    analysis::call_graph(&mut ctx);
    let call = call_in(program, "dispatch");
    assert_eq!(vec![call], ctx.indirect_calls);
    names(program, &ctx.callees[&call])
}

// ------------------------------------------------------------------
// Tests

#[test]
fn mlta_refines_by_field() {
    let program = ops_program(false);
    let config = Config::default();
    assert_eq!(vec!["f1", "f2"], callees_of_dispatch(&program, &config));
}

#[test]
fn escaped_struct_falls_back_to_signature() {
    let program = ops_program(true);
    let config = Config::default();
    assert_eq!(vec!["f1", "f2", "f4"], callees_of_dispatch(&program, &config));
}

#[test]
fn signature_matching_is_a_superset() {
    let program = ops_program(false);
    let config = Config {
        indirect_calls: IndirectCalls::Signature,
        ..Config::default()
    };
    assert_eq!(
        vec!["f1", "f2", "f3", "f4"],
        callees_of_dispatch(&program, &config)
    );
}

#[test]
fn callers_are_recorded() {
    let program = ops_program(false);
    let config = Config::default();
    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);
    let call = call_in(&program, "dispatch");
    let f1 = program.function_named("f1").unwrap();
    assert_eq!(vec![call], ctx.callers(f1).collect::<Vec<_>>());
    assert_eq!(Some(f1), ctx.first_callee(call));
}

/// `helper` is internal to both `a.c` and `b.c`; `ext` is defined in `a.c`
/// and declared in `b.c`.
fn two_modules() -> Program {
    let i32t = Type::int(32);
    let fty = Type::func(i32t.clone(), vec![i32t.clone()], false);
    let mut modules = Vec::new();
    for (file, caller) in [("a.c", "use_a"), ("b.c", "use_b")] {
        let mut m = ModuleBuilder::new(file);
        let mut helper = m.define("helper", fty.clone());
        helper.internal();
        helper.ret(Some(helper.arg(0)));
        let helper = helper.value();
        let ext = if file == "a.c" {
            let mut ext = m.define("ext", fty.clone());
            ext.ret(Some(Value::int(32, 1)));
            ext.value()
        } else {
            m.declare("ext", fty.clone())
        };
        let mut f = m.define(caller, fty.clone());
        let x = f.call(helper, vec![f.arg(0)]);
        let y = f.call(ext, vec![x]);
        f.ret(Some(y));
        modules.push(m.finish());
    }
    Program::from_modules(modules).unwrap()
}

#[test]
fn unifies_across_modules() {
    let program = two_modules();
    let config = Config::default();
    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);

    let helpers: Vec<FunctionId> = program
        .functions()
        .filter(|(_, f)| f.name == "helper")
        .map(|(id, _)| id)
        .collect();
    assert_eq!(2, helpers.len());
    assert!(ctx.is_unified(helpers[0]));
    assert!(!ctx.is_unified(helpers[1]));

    let use_b = program.function_named("use_b").unwrap();
    let calls: Vec<InstructionId> = program
        .instructions(use_b)
        .filter(|(_, i)| i.opcode.is_call())
        .map(|(id, _)| id)
        .collect();
    assert_eq!(Some(helpers[0]), ctx.first_callee(calls[0]));
    let ext = ctx.first_callee(calls[1]).unwrap();
    assert_eq!("ext", program.function(ext).name);
    assert!(!program.function(ext).is_declaration());
    assert!(ctx.indirect_calls.is_empty());
}

#[test]
fn reinitializing_keeps_representatives() {
    let program = two_modules();
    let config = Config::default();
    let mut ctx = GlobalContext::new(&program, &config);
    let mut cg = CallGraph::new();
    for m in program.module_ids() {
        cg.initialize(&mut ctx, m);
    }
    let unified_map = ctx.unified_map.clone();
    let unified_set = ctx.unified_set.clone();
    let sig_funcs = ctx.sig_funcs.clone();
    for m in program.module_ids() {
        assert!(!cg.initialize(&mut ctx, m));
    }
    assert_eq!(unified_map, ctx.unified_map);
    assert_eq!(unified_set, ctx.unified_set);
    assert_eq!(sig_funcs, ctx.sig_funcs);

    let helpers: Vec<FunctionId> = program
        .functions()
        .filter(|(_, f)| f.name == "helper")
        .map(|(id, _)| id)
        .collect();
    assert!(ctx.is_unified(helpers[0]));
    assert!(!ctx.is_unified(helpers[1]));
}

#[test]
fn unresolved_indirect_calls() {
    let i32t = Type::int(32);
    let fty = Type::func(i32t.clone(), vec![i32t.clone()], false);
    let mut m = ModuleBuilder::new("a.c");
    let mut f = m.define(
        "apply",
        Type::func(i32t.clone(), vec![Type::ptr(fty), i32t.clone()], false),
    );
    let r = f.call(f.arg(0), vec![f.arg(1)]);
    f.ret(Some(r));
    let program = Program::from_modules([m.finish()]).unwrap();
    let config = Config::default();
    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);

    let call = call_in(&program, "apply");
    assert_eq!(vec![call], ctx.indirect_calls);
    assert_eq!(vec![call], ctx.unresolved);
    assert_eq!(None, ctx.first_callee(call));
}

#[test]
fn inline_assembly_has_no_callees() {
    let mut m = ModuleBuilder::new("a.c");
    let mut f = m.define("f", Type::func(Type::void(), vec![], false));
    f.call_asm("nop", vec![], Type::func(Type::void(), vec![], false));
    f.ret(None);
    let program = Program::from_modules([m.finish()]).unwrap();
    let config = Config::default();
    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);

    let call = call_in(&program, "f");
    assert_eq!(0, ctx.callees(call).count());
    assert!(ctx.indirect_calls.is_empty());
}

/// `dispatch` calls `o->ops->fn(d)`; nothing is ever stored to `outer.ops`.
/// With `cast`, some `base *` is cast to an `outer *`.
fn nested_ops_program(cast: bool) -> Program {
    let i32t = Type::int(32);
    let dev = Type::ptr(Type::named("struct.dev"));
    let ops = Type::ptr(Type::named("struct.ops"));
    let outer = Type::ptr(Type::named("struct.outer"));
    let base = Type::ptr(Type::named("struct.base"));
    let fty = Type::func(i32t.clone(), vec![dev.clone()], false);
    let fp = Type::ptr(fty.clone());

    let mut m = ModuleBuilder::new("drivers/outer.c");
    let mut targets = Vec::new();
    for name in ["f1", "f2", "f4"] {
        let mut f = m.define(name, fty.clone());
        f.ret(Some(Value::int(32, 0)));
        targets.push(f.value());
    }

    let mut setup = m.define("setup", Type::func(Type::void(), vec![ops.clone()], false));
    let field = setup.field(setup.arg(0), 0, fp.clone());
    setup.store(targets[0].clone(), field.clone());
    setup.store(targets[1].clone(), field);
    setup.ret(None);

    if cast {
        let mut upcast = m.define("to_outer", Type::func(outer.clone(), vec![base], false));
        let o = upcast.bitcast(upcast.arg(0), outer.clone());
        upcast.ret(Some(o));
    }

    let mut dispatch = m.define(
        "dispatch",
        Type::func(i32t.clone(), vec![outer.clone(), dev.clone()], false),
    );
    let ops_field = dispatch.field(dispatch.arg(0), 0, ops.clone());
    let o = dispatch.load(ops_field);
    let field = dispatch.field(o, 0, fp.clone());
    let fnp = dispatch.load(field);
    let r = dispatch.call(fnp, vec![dispatch.arg(1)]);
    dispatch.ret(Some(r));

    Program::from_modules([m.finish()]).unwrap()
}

#[test]
fn empty_outer_layer_stops_refinement() {
    let config = Config::default();
    for cast in [false, true] {
        let program = nested_ops_program(cast);
        let mut ctx = GlobalContext::new(&program, &config);
        analysis::call_graph(&mut ctx);
        let call = call_in(&program, "dispatch");
        assert_eq!(vec!["f1", "f2"], names(&program, &ctx.callees[&call]));
        assert!(ctx.unresolved.is_empty());
    }
}
