//! Integration tests for load/store elimination around memory barriers.
//!
//! Every test builds a small compilation unit, runs the pipeline and checks
//! the IR snapshots with checker scripts. Where a method can be executed on
//! its own, the optimized body is also run against the original one in the
//! reference interpreter.

use lsekit::{
    analysis::{FieldFlags, FieldRef, SsaFunction, SsaFunctionBuilder, Token},
    compiler::{compile, passes::eliminate, EventKind, EventLog, LseConfig, PipelineConfig},
    emulation::{ExecutionLimits, Interpreter, Observation, Value},
    CompilationUnit, MethodFlags, Result,
};

/// `TestClass { int i; int j; volatile int vi; }` and `Main { volatile int vi; }`.
struct Fixture {
    unit: CompilationUnit,
    test_class: Token,
    main_class: Token,
    i: FieldRef,
    j: FieldRef,
    vi: FieldRef,
    main_vi: FieldRef,
}

impl Fixture {
    fn new() -> Self {
        let mut unit = CompilationUnit::new();
        let test_class = unit.add_class("TestClass");
        let main_class = unit.add_class("Main");
        let i = unit.add_field(test_class, "i", FieldFlags::empty());
        let j = unit.add_field(test_class, "j", FieldFlags::empty());
        let vi = unit.add_field(test_class, "vi", FieldFlags::VOLATILE);
        let main_vi = unit.add_field(main_class, "vi", FieldFlags::VOLATILE);
        Self {
            unit,
            test_class,
            main_class,
            i,
            j,
            vi,
            main_vi,
        }
    }

    fn add(&mut self, name: &str, body: SsaFunction) {
        self.unit.add_method(name, MethodFlags::STATIC, body);
    }
}

/// Runs `ssa` on fresh `TestClass` arguments (plus `extra` scalars).
fn observe(ssa: &SsaFunction, class: Token, objects: usize, extra: &[Value]) -> Observation {
    let mut interp = Interpreter::new(ExecutionLimits::default());
    let mut args = Vec::new();
    for _ in 0..objects {
        args.push(interp.alloc_instance(class).expect("alloc"));
    }
    args.extend_from_slice(extra);
    interp.observe(ssa, &args).expect("execution")
}

/// Asserts that LSE on `ssa` keeps the observable behavior for each input.
fn assert_preserved(ssa: &SsaFunction, class: Token, objects: usize, inputs: &[&[Value]]) {
    let mut optimized = ssa.clone();
    eliminate(
        &mut optimized,
        Token::from_parts(Token::METHOD, 1),
        &LseConfig::default(),
        &EventLog::new(),
    )
    .expect("elimination");
    for extra in inputs {
        assert_eq!(
            observe(ssa, class, objects, extra),
            observe(&optimized, class, objects, extra),
            "behavior changed for input {extra:?}"
        );
    }
}

// obj.vi; obj.j = 1; obj.j = 2; return obj.j
fn scenario_a(fx: &Fixture) -> SsaFunction {
    let (vi, j) = (fx.vi, fx.j);
    SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let _ = b.load_field(obj, vi);
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            let v = b.load_field(obj, j);
            b.ret_val(v);
        });
    })
}

// obj.j = 1; obj.vi; obj.j = 2; return obj.j
fn scenario_b(fx: &Fixture) -> SsaFunction {
    let (vi, j) = (fx.vi, fx.j);
    SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let _ = b.load_field(obj, vi);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            let v = b.load_field(obj, j);
            b.ret_val(v);
        });
    })
}

#[test]
fn test_scenario_a_store_before_acquire_is_dead() -> Result<()> {
    let mut fx = Fixture::new();
    let body = scenario_a(&fx);
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.scenarioA", body);

    let result = compile(fx.unit, &PipelineConfig::lse_only())?;
    result.checker().run_script(
        "/// CHECK-START: int Main.scenarioA(TestClass) load_store_elimination (before)
         /// CHECK: InstanceFieldGet field_name:TestClass.vi
         /// CHECK: InstanceFieldSet field_name:TestClass.j
         /// CHECK: InstanceFieldSet field_name:TestClass.j
         /// CHECK: InstanceFieldGet field_name:TestClass.j

         /// CHECK-START: int Main.scenarioA(TestClass) load_store_elimination (after)
         /// CHECK: InstanceFieldGet field_name:TestClass.vi
         /// CHECK-COUNT-1: InstanceFieldSet field_name:TestClass.j
         /// CHECK-NOT: InstanceFieldSet
         /// CHECK-NOT: InstanceFieldGet",
    )?;
    assert_eq!(result.stats.loads_eliminated, 1);
    assert_eq!(result.stats.stores_eliminated, 1);
    Ok(())
}

#[test]
fn test_scenario_b_store_crossing_acquire_is_kept() -> Result<()> {
    let mut fx = Fixture::new();
    let body = scenario_b(&fx);
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.scenarioB", body);

    let result = compile(fx.unit, &PipelineConfig::lse_only())?;
    result.checker().run_script(
        "CHECK-START: int Main.scenarioB(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK-NOT: InstanceFieldGet field_name:TestClass.j",
    )?;
    assert_eq!(result.stats.stores_eliminated, 0);
    Ok(())
}

#[test]
fn test_scenario_c_synchronized_fresh_object() -> Result<()> {
    let mut fx = Fixture::new();
    let (class, j) = (fx.test_class, fx.j);
    let body = SsaFunctionBuilder::new(0).build_with(|f| {
        f.block(0, |b| {
            let obj = b.new_obj(class);
            b.monitor_enter(obj);
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            b.monitor_exit(obj);
            let v = b.load_field(obj, j);
            b.ret_val(v);
        });
    });
    assert_preserved(&body, class, 0, &[&[]]);
    fx.add("Main.scenarioC", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.scenarioC() load_store_elimination (before)
         CHECK: MonitorOperation kind:enter
         CHECK: MonitorOperation kind:exit

         CHECK-START: int Main.scenarioC() load_store_elimination (after)
         CHECK-NOT: MonitorOperation
         CHECK-NOT: InstanceFieldSet
         CHECK-NOT: InstanceFieldGet",
    )?;
    assert_eq!(result.stats.monitors_eliminated, 2);
    assert!(result.context.events.has(EventKind::SingletonIdentified));

    let token = result
        .context
        .unit
        .method_by_name("Main.scenarioC")
        .map(|m| m.token)
        .expect("method exists");
    let pairs = result.context.monitor_records(token);
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].eliminated);
    assert_eq!(pairs[0].enter_block, Some(0));
    assert_eq!(pairs[0].exit_block, Some(0));
    Ok(())
}

#[test]
fn test_scenario_d_merge_materializes_phi() -> Result<()> {
    let mut fx = Fixture::new();
    let i = fx.i;
    let body = SsaFunctionBuilder::new(2).build_with(|f| {
        let obj = f.arg(0);
        let cond = f.arg(1);
        f.block(0, |b| b.branch(cond, 1, 2));
        f.block(1, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, i, one);
            b.jump(3);
        });
        f.block(2, |b| {
            let two = b.const_i32(2);
            b.store_field(obj, i, two);
            b.jump(3);
        });
        f.block(3, |b| {
            let v = b.load_field(obj, i);
            b.ret_val(v);
        });
    });
    assert_preserved(
        &body,
        fx.test_class,
        1,
        &[&[Value::Bool(true)], &[Value::Bool(false)]],
    );
    fx.add("Main.scenarioD", body);

    let result = compile(fx.unit, &PipelineConfig::lse_only())?;
    result.checker().run_script(
        "CHECK-START: int Main.scenarioD(TestClass, boolean) load_store_elimination (after)
         CHECK-DAG: InstanceFieldSet field_name:TestClass.i
         CHECK-DAG: InstanceFieldSet field_name:TestClass.i
         CHECK-DAG: Phi
         CHECK-NOT: InstanceFieldGet",
    )?;
    assert_eq!(result.stats.phis_inserted, 1);
    Ok(())
}

#[test]
fn test_volatile_accesses_must_be_kept() -> Result<()> {
    let mut fx = Fixture::new();
    let vi = fx.vi;
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let three = b.const_i32(3);
            b.store_field(obj, vi, three);
            let _ = b.load_field(obj, vi);
            let _ = b.load_field(obj, vi);
            let again = b.const_i32(3);
            b.store_field(obj, vi, again);
            let result = b.load_field(obj, vi);
            b.ret_val(result);
        });
    });
    fx.add("Main.testVolatileAccessesMustBeKept", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileAccessesMustBeKept(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.vi",
    )?;
    assert_eq!(result.stats.loads_eliminated, 0);
    assert_eq!(result.stats.stores_eliminated, 0);
    Ok(())
}

#[test]
fn test_singleton_volatile_accesses_can_be_removed() -> Result<()> {
    let mut fx = Fixture::new();
    let (main, vi) = (fx.main_class, fx.main_vi);
    let body = SsaFunctionBuilder::new(0).build_with(|f| {
        f.block(0, |b| {
            let m = b.new_obj(main);
            let three = b.const_i32(3);
            b.store_field(m, vi, three);
            let _ = b.load_field(m, vi);
            let _ = b.load_field(m, vi);
            let again = b.const_i32(3);
            b.store_field(m, vi, again);
            let result = b.load_field(m, vi);
            b.ret_val(result);
        });
    });
    assert_preserved(&body, main, 0, &[&[]]);
    fx.add("Main.testSingletonVolatileAccessesCanBeRemoved", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testSingletonVolatileAccessesCanBeRemoved() load_store_elimination (after)
         CHECK-NOT: InstanceFieldGet
         CHECK-NOT: InstanceFieldSet",
    )?;
    Ok(())
}

#[test]
fn test_volatile_load_different_fields() -> Result<()> {
    let mut fx = Fixture::new();
    let (i, j, vi) = (fx.i, fx.j, fx.vi);
    // unused = obj1.vi; obj1.i = 1; obj2.j = 2; r = obj1.i + obj2.j; unused = obj1.vi
    let body = SsaFunctionBuilder::new(2).build_with(|f| {
        let obj1 = f.arg(0);
        let obj2 = f.arg(1);
        f.block(0, |b| {
            let _ = b.load_field(obj1, vi);
            let one = b.const_i32(1);
            b.store_field(obj1, i, one);
            let two = b.const_i32(2);
            b.store_field(obj2, j, two);
            let a = b.load_field(obj1, i);
            let c = b.load_field(obj2, j);
            let sum = b.add(a, c);
            let _ = b.load_field(obj1, vi);
            b.ret_val(sum);
        });
    });
    assert_preserved(&body, fx.test_class, 2, &[&[]]);
    fx.add("Main.testVolatileLoadDifferentFields", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileLoadDifferentFields(TestClass, TestClass) load_store_elimination (after)
         CHECK-NOT: InstanceFieldGet field_name:TestClass.i
         CHECK-NOT: InstanceFieldGet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldSet field_name:TestClass.i
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: Add
         CHECK: InstanceFieldGet field_name:TestClass.vi",
    )?;
    Ok(())
}

#[test]
fn test_volatile_load_different_fields_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (i, j, vi) = (fx.i, fx.j, fx.vi);
    // obj1.i = 1; obj2.j = 2; unused = obj1.vi; return obj1.i + obj2.j
    let body = SsaFunctionBuilder::new(2).build_with(|f| {
        let obj1 = f.arg(0);
        let obj2 = f.arg(1);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj1, i, one);
            let two = b.const_i32(2);
            b.store_field(obj2, j, two);
            let _ = b.load_field(obj1, vi);
            let a = b.load_field(obj1, i);
            let c = b.load_field(obj2, j);
            let sum = b.add(a, c);
            b.ret_val(sum);
        });
    });
    assert_preserved(&body, fx.test_class, 2, &[&[]]);
    fx.add("Main.testVolatileLoadDifferentFieldsBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileLoadDifferentFieldsBlocking(TestClass, TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.i
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.i
         CHECK: InstanceFieldGet field_name:TestClass.j
         CHECK: Add",
    )?;
    assert_eq!(result.stats.loads_eliminated, 0);
    Ok(())
}

#[test]
fn test_volatile_load_redundant_store_blocking_only_load() -> Result<()> {
    let mut fx = Fixture::new();
    let (j, vi) = (fx.j, fx.vi);
    // obj.j = 1; obj.j = 2; unused = obj.vi; return obj.j
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            let _ = b.load_field(obj, vi);
            let v = b.load_field(obj, j);
            b.ret_val(v);
        });
    });
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.testVolatileLoadRedundantStoreBlockingOnlyLoad", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileLoadRedundantStoreBlockingOnlyLoad(TestClass) load_store_elimination (after)
         CHECK-COUNT-1: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.j",
    )?;
    assert_eq!(result.stats.stores_eliminated, 1);
    assert_eq!(result.stats.loads_eliminated, 0);
    Ok(())
}

#[test]
fn test_volatile_load_set_and_merge_values_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (i, vi) = (fx.i, fx.vi);
    // if (b) obj.i = 1 else obj.i = 2; unused = obj.vi; return obj.i
    let body = SsaFunctionBuilder::new(2).build_with(|f| {
        let obj = f.arg(0);
        let cond = f.arg(1);
        f.block(0, |b| b.branch(cond, 1, 2));
        f.block(1, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, i, one);
            b.jump(3);
        });
        f.block(2, |b| {
            let two = b.const_i32(2);
            b.store_field(obj, i, two);
            b.jump(3);
        });
        f.block(3, |b| {
            let _ = b.load_field(obj, vi);
            let v = b.load_field(obj, i);
            b.ret_val(v);
        });
    });
    assert_preserved(
        &body,
        fx.test_class,
        1,
        &[&[Value::Bool(true)], &[Value::Bool(false)]],
    );
    fx.add("Main.testVolatileLoadSetAndMergeValuesBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileLoadSetAndMergeValuesBlocking(TestClass, boolean) load_store_elimination (after)
         CHECK-NOT: Phi
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.i",
    )?;
    Ok(())
}

#[test]
fn test_volatile_load_redundant_store_removed_synchronization() -> Result<()> {
    let mut fx = Fixture::new();
    let (main, main_vi, j) = (fx.main_class, fx.main_vi, fx.j);
    // Main m = new Main(); obj.j = 1; m.vi; obj.j = 2; m.vi; return obj.j
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let m = b.new_obj(main);
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let _ = b.load_field(m, main_vi);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            let _ = b.load_field(m, main_vi);
            let v = b.load_field(obj, j);
            b.ret_val(v);
        });
    });
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.testVolatileLoadRedundantStoreRemovedSynchronization", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileLoadRedundantStoreRemovedSynchronization(TestClass) load_store_elimination (after)
         CHECK-COUNT-1: InstanceFieldSet field_name:TestClass.j
         CHECK-NOT: InstanceFieldSet
         CHECK-NOT: InstanceFieldGet",
    )?;
    Ok(())
}

#[test]
fn test_volatile_store_does_not_block_loads() -> Result<()> {
    let mut fx = Fixture::new();
    let (i, j, vi) = (fx.i, fx.j, fx.vi);
    // obj1.i = 1; obj2.j = 2; obj1.vi = 123; return obj1.i + obj2.j
    let body = SsaFunctionBuilder::new(2).build_with(|f| {
        let obj1 = f.arg(0);
        let obj2 = f.arg(1);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj1, i, one);
            let two = b.const_i32(2);
            b.store_field(obj2, j, two);
            let v = b.const_i32(123);
            b.store_field(obj1, vi, v);
            let a = b.load_field(obj1, i);
            let c = b.load_field(obj2, j);
            let sum = b.add(a, c);
            b.ret_val(sum);
        });
    });
    assert_preserved(&body, fx.test_class, 2, &[&[]]);
    fx.add("Main.testVolatileStoreDifferentFieldsBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileStoreDifferentFieldsBlocking(TestClass, TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.i
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK-NOT: InstanceFieldGet",
    )?;
    assert_eq!(result.stats.loads_eliminated, 2);
    Ok(())
}

#[test]
fn test_volatile_store_redundant_store_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (j, vi) = (fx.j, fx.vi);
    // obj.j = 1; obj.vi = 123; obj.j = 2; return obj.j
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let v = b.const_i32(123);
            b.store_field(obj, vi, v);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            let r = b.load_field(obj, j);
            b.ret_val(r);
        });
    });
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.testVolatileStoreRedundantStoreBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileStoreRedundantStoreBlocking(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK-NOT: InstanceFieldGet",
    )?;
    Ok(())
}

#[test]
fn test_volatile_store_set_and_merge_values_not_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (i, vi) = (fx.i, fx.vi);
    // if (b) obj.i = 1 else obj.i = 2; obj.vi = 123; return obj.i
    let body = SsaFunctionBuilder::new(2).build_with(|f| {
        let obj = f.arg(0);
        let cond = f.arg(1);
        f.block(0, |b| b.branch(cond, 1, 2));
        f.block(1, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, i, one);
            b.jump(3);
        });
        f.block(2, |b| {
            let two = b.const_i32(2);
            b.store_field(obj, i, two);
            b.jump(3);
        });
        f.block(3, |b| {
            let v = b.const_i32(123);
            b.store_field(obj, vi, v);
            let r = b.load_field(obj, i);
            b.ret_val(r);
        });
    });
    assert_preserved(
        &body,
        fx.test_class,
        1,
        &[&[Value::Bool(true)], &[Value::Bool(false)]],
    );
    fx.add("Main.testVolatileStoreSetAndMergeValuesNotBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileStoreSetAndMergeValuesNotBlocking(TestClass, boolean) load_store_elimination (after)
         CHECK-DAG: InstanceFieldSet field_name:TestClass.i
         CHECK-DAG: InstanceFieldSet field_name:TestClass.i
         CHECK-DAG: Phi
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK-NOT: InstanceFieldGet",
    )?;
    Ok(())
}

#[test]
fn test_volatile_store_same_value_store_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (j, vi) = (fx.j, fx.vi);
    // obj.j = 1; obj.vi = 123; obj.j = 1
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let v = b.const_i32(123);
            b.store_field(obj, vi, v);
            b.store_field(obj, j, one);
            b.ret();
        });
    });
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.testVolatileStoreSameValueStoreBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: void Main.testVolatileStoreSameValueStoreBlocking(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK: InstanceFieldSet field_name:TestClass.j",
    )?;
    assert_eq!(result.stats.stores_eliminated, 0);
    Ok(())
}

#[test]
fn test_consecutive_volatile_loads_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (j, vi) = (fx.j, fx.vi);
    // obj.j = 1; a = obj.vi; c = obj.vi; return a + c + obj.j
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let a = b.load_field(obj, vi);
            let c = b.load_field(obj, vi);
            let r = b.load_field(obj, j);
            let partial = b.add(a, c);
            let sum = b.add(partial, r);
            b.ret_val(sum);
        });
    });
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.testConsecutiveVolatileLoadsBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testConsecutiveVolatileLoadsBlocking(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.j",
    )?;
    assert_eq!(result.stats.loads_eliminated, 0);
    assert_eq!(result.stats.stores_eliminated, 0);
    Ok(())
}

#[test]
fn test_volatile_store_then_volatile_load_blocking() -> Result<()> {
    let mut fx = Fixture::new();
    let (j, vi) = (fx.j, fx.vi);
    // obj.j = 1; obj.vi = 2; t = obj.vi; obj.j = 1; return t + obj.j
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let two = b.const_i32(2);
            b.store_field(obj, vi, two);
            let t = b.load_field(obj, vi);
            b.store_field(obj, j, one);
            let r = b.load_field(obj, j);
            let sum = b.add(t, r);
            b.ret_val(sum);
        });
    });
    assert_preserved(&body, fx.test_class, 1, &[&[]]);
    fx.add("Main.testVolatileStoreThenVolatileLoadBlocking", body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.testVolatileStoreThenVolatileLoadBlocking(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldSet field_name:TestClass.vi
         CHECK: InstanceFieldGet field_name:TestClass.vi
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK-NOT: InstanceFieldGet field_name:TestClass.j",
    )?;
    assert_eq!(result.stats.loads_eliminated, 1);
    assert_eq!(result.stats.stores_eliminated, 0);
    Ok(())
}

#[test]
fn test_volatile_setter_inlined_into_fresh_receiver() -> Result<()> {
    let mut fx = Fixture::new();
    let (main, main_vi, j) = (fx.main_class, fx.main_vi, fx.j);

    // int setterWithVolatileLoads(TestClass obj) {
    //   obj.j = 1; this.vi; obj.j = 2; this.vi; return obj.j;
    // }
    let setter_body = SsaFunctionBuilder::new(2).build_with(|f| {
        let this = f.arg(0);
        let obj = f.arg(1);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let _ = b.load_field(this, main_vi);
            let two = b.const_i32(2);
            b.store_field(obj, j, two);
            let _ = b.load_field(this, main_vi);
            let r = b.load_field(obj, j);
            b.ret_val(r);
        });
    });
    let setter = fx.unit.add_method(
        "Main.setterWithVolatileLoads",
        MethodFlags::empty(),
        setter_body,
    );

    // return new Main().setterWithVolatileLoads(obj)
    let caller_body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let m = b.new_obj(main);
            let r = b.call(setter, &[m, obj]);
            b.ret_val(r);
        });
    });
    fx.add("Main.testVolatileLoadInlineMethodWithSynchronizedScope", caller_body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.setterWithVolatileLoads(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:Main.vi
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldGet field_name:Main.vi
         CHECK: InstanceFieldGet field_name:TestClass.j

         CHECK-START: int Main.testVolatileLoadInlineMethodWithSynchronizedScope(TestClass) inliner (after)
         CHECK-NOT: InvokeStaticOrDirect
         CHECK: InstanceFieldSet field_name:TestClass.j

         CHECK-START: int Main.testVolatileLoadInlineMethodWithSynchronizedScope(TestClass) load_store_elimination (after)
         CHECK-COUNT-1: InstanceFieldSet field_name:TestClass.j
         CHECK-NOT: InstanceFieldGet",
    )?;
    assert_eq!(result.stats.methods_inlined, 1);
    Ok(())
}

#[test]
fn test_inlined_synchronized_setter_loses_its_monitor() -> Result<()> {
    let mut fx = Fixture::new();
    let main = fx.main_class;
    let value_field = fx.unit.add_field(main, "value", FieldFlags::empty());

    // synchronized void set(int v) { this.value = v; }
    let setter_body = SsaFunctionBuilder::new(2).build_with(|f| {
        let this = f.arg(0);
        let value = f.arg(1);
        f.block(0, |b| {
            b.store_field(this, value_field, value);
            b.ret();
        });
    });
    let setter = fx
        .unit
        .add_method("Main.set", MethodFlags::SYNCHRONIZED, setter_body);

    // Main m = new Main(); m.set(7); return m.value
    let caller_body = SsaFunctionBuilder::new(0).build_with(|f| {
        f.block(0, |b| {
            let m = b.new_obj(main);
            let seven = b.const_i32(7);
            b.call_void(setter, &[m, seven]);
            let r = b.load_field(m, value_field);
            b.ret_val(r);
        });
    });
    fx.add("Main.callSynchronized", caller_body);

    let result = compile(fx.unit, &PipelineConfig::default())?;
    result.checker().run_script(
        "CHECK-START: int Main.callSynchronized() inliner (before)
         CHECK: InvokeStaticOrDirect method_name:Main.set

         CHECK-START: int Main.callSynchronized() inliner (after)
         CHECK: MonitorOperation kind:enter
         CHECK: InstanceFieldSet field_name:Main.value
         CHECK: MonitorOperation kind:exit

         CHECK-START: int Main.callSynchronized() load_store_elimination (after)
         CHECK-NOT: MonitorOperation
         CHECK-NOT: InstanceFieldSet
         CHECK-NOT: InstanceFieldGet",
    )?;

    let optimized = result.ssa("Main.callSynchronized").expect("method exists");
    let mut interp = Interpreter::with_unit(&result.context.unit, ExecutionLimits::default());
    let observed = interp.observe(&optimized, &[])?;
    assert_eq!(observed.returned, Some(lsekit::emulation::ObservedValue::Int(7)));
    Ok(())
}

#[test]
fn test_static_volatile_load_is_a_barrier() -> Result<()> {
    let mut fx = Fixture::new();
    let j = fx.j;
    let flag = fx
        .unit
        .add_field(fx.main_class, "flag", FieldFlags::VOLATILE | FieldFlags::STATIC);
    // obj.j = 1; Main.flag; return obj.j
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let obj = f.arg(0);
        f.block(0, |b| {
            let one = b.const_i32(1);
            b.store_field(obj, j, one);
            let _ = b.load_static(flag);
            let r = b.load_field(obj, j);
            b.ret_val(r);
        });
    });
    fx.add("Main.staticFlag", body);

    let result = compile(fx.unit, &PipelineConfig::lse_only())?;
    result.checker().run_script(
        "CHECK-START: int Main.staticFlag(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: StaticFieldGet field_name:Main.flag
         CHECK: InstanceFieldGet field_name:TestClass.j",
    )?;
    Ok(())
}

#[test]
fn test_variable_index_store_blocks_element_forwarding() {
    // arr = new int[4]; arr[0] = 1; arr[k] = 2; return arr[0]
    let body = SsaFunctionBuilder::new(1).build_with(|f| {
        let k = f.arg(0);
        f.block(0, |b| {
            let four = b.const_i32(4);
            let arr = b.new_arr(four);
            let zero = b.const_i32(0);
            let one = b.const_i32(1);
            b.store_element(arr, zero, one);
            let two = b.const_i32(2);
            b.store_element(arr, k, two);
            let r = b.load_element(arr, zero);
            b.ret_val(r);
        });
    });
    let class = Token::from_parts(Token::CLASS, 1);
    assert_preserved(&body, class, 0, &[&[Value::Int(0)], &[Value::Int(3)]]);

    let mut optimized = body.clone();
    let outcome = eliminate(
        &mut optimized,
        Token::from_parts(Token::METHOD, 1),
        &LseConfig::default(),
        &EventLog::new(),
    )
    .expect("elimination");
    assert_eq!(outcome.loads_eliminated, 0);
}

#[test]
fn test_store_elimination_can_be_disabled() -> Result<()> {
    let mut fx = Fixture::new();
    let body = scenario_a(&fx);
    fx.add("Main.scenarioA", body);

    let config = PipelineConfig::lse_only().with_lse(LseConfig {
        enable_store_elimination: false,
        ..LseConfig::default()
    });
    let result = compile(fx.unit, &config)?;
    result.checker().run_script(
        "CHECK-START: int Main.scenarioA(TestClass) load_store_elimination (after)
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK: InstanceFieldSet field_name:TestClass.j
         CHECK-NOT: InstanceFieldGet field_name:TestClass.j",
    )?;
    assert_eq!(result.stats.stores_eliminated, 0);
    Ok(())
}

#[test]
fn test_failing_check_reports_rendered_ir() -> Result<()> {
    let mut fx = Fixture::new();
    let body = scenario_b(&fx);
    fx.add("Main.scenarioB", body);

    let result = compile(fx.unit, &PipelineConfig::lse_only())?;
    let err = result
        .checker()
        .run_script(
            "CHECK-START: int Main.scenarioB(TestClass) load_store_elimination (after)
             CHECK-NOT: InstanceFieldSet",
        )
        .expect_err("the store of j = 1 is kept");
    match err {
        lsekit::Error::CheckFailed { rendered, .. } => {
            assert!(rendered.contains("InstanceFieldSet field_name:TestClass.j"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}
