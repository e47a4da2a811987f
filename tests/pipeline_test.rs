//! Test the pipeline orchestrator end to end.

use wcetopt::core::{
    BinOp, Const, Expr, FuncId, Function, LoopBound, ProgramTree, Stmt, TreeBuilder, TreeDelta,
    Type,
};
use wcetopt::passes::{OptimizationPass, PassResult};
use wcetopt::wcet::AnalysisResults;
use wcetopt::{optimize, OptResult, OptimizationError, Pipeline, PipelineConfig};

fn lit(v: i32) -> Expr {
    Expr::lit(Const::i32(v))
}

/// main calls `used` and computes `2 + 3 * 4`; `unused` is never called.
fn scenario_a() -> ProgramTree {
    let mut b = TreeBuilder::new();
    let main = b.declare("main", &[], Some(Type::I32)).unwrap();
    let used = b.declare("used", &[], None).unwrap();
    let unused = b.declare("unused", &[], None).unwrap();
    b.define(
        main,
        vec![
            Stmt::Expr(Expr::call(used, vec![])),
            Stmt::let_(
                "x",
                Type::I32,
                Expr::binary(
                    BinOp::Add,
                    Type::I32,
                    lit(2),
                    Expr::binary(BinOp::Mul, Type::I32, lit(3), lit(4)),
                ),
            ),
            Stmt::ret(Expr::local("x")),
        ],
    )
    .unwrap();
    b.define(used, vec![Stmt::Io { port: 1, value: lit(1) }]).unwrap();
    b.define(unused, vec![Stmt::Io { port: 2, value: lit(2) }]).unwrap();
    b.finish().unwrap()
}

/// Exported `f` whose body costs exactly 1000 cycles.
fn scenario_b() -> (ProgramTree, FuncId) {
    let mut b = TreeBuilder::new();
    let f = b.declare("f", &[], None).unwrap();
    b.define(f, (0..1000).map(|_| Stmt::Expr(lit(0))).collect()).unwrap();
    b.export(f).unwrap();
    (b.finish().unwrap(), f)
}

/// Appends 200 one-cycle statements to a function.
struct Padding(FuncId);

impl OptimizationPass for Padding {
    fn name(&self) -> &'static str {
        "padding"
    }

    fn is_applicable(&self, _tree: &ProgramTree, _analysis: &AnalysisResults) -> bool {
        true
    }

    fn transform(&self, tree: &mut ProgramTree, _analysis: &AnalysisResults) -> OptResult<PassResult> {
        let function = tree.func_mut(self.0).unwrap();
        function.body.extend((0..200).map(|_| Stmt::Expr(lit(0))));
        Ok(PassResult { modified: true, wcet_impact: 200, size_impact: 400, ..Default::default() })
    }

    fn certify_determinism(&self, _before: &TreeDelta, _after: &ProgramTree) -> bool {
        true
    }
}

/// Flips the literal of main's first statement on every run.
struct Toggle;

impl OptimizationPass for Toggle {
    fn name(&self) -> &'static str {
        "toggle"
    }

    fn is_applicable(&self, _tree: &ProgramTree, _analysis: &AnalysisResults) -> bool {
        true
    }

    fn transform(&self, tree: &mut ProgramTree, _analysis: &AnalysisResults) -> OptResult<PassResult> {
        let main = tree.function_id("main").unwrap();
        let function = tree.func_mut(main).unwrap();
        let next = match function.body[0] {
            Stmt::Expr(Expr::Lit(c)) if c.value() == 1 => 2,
            _ => 1,
        };
        function.body[0] = Stmt::Expr(lit(next));
        Ok(PassResult { modified: true, ..Default::default() })
    }

    fn certify_determinism(&self, _before: &TreeDelta, _after: &ProgramTree) -> bool {
        true
    }
}

/// Applies a fixed mutation and reports a fixed certificate verdict.
struct Rewrite {
    certify: bool,
    apply: fn(&mut ProgramTree),
}

impl OptimizationPass for Rewrite {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    fn is_applicable(&self, _tree: &ProgramTree, _analysis: &AnalysisResults) -> bool {
        true
    }

    fn transform(&self, tree: &mut ProgramTree, _analysis: &AnalysisResults) -> OptResult<PassResult> {
        (self.apply)(tree);
        Ok(PassResult { modified: true, ..Default::default() })
    }

    fn certify_determinism(&self, _before: &TreeDelta, _after: &ProgramTree) -> bool {
        self.certify
    }
}

#[test]
fn test_scenario_a_dce_then_fold() {
    let _ = env_logger::builder().is_test(true).try_init();

    let optimized = optimize(scenario_a(), PipelineConfig::default()).unwrap();
    let meta = &optimized.metadata;
    println!("{}", meta);

    assert_eq!(meta.sweeps, 2);
    assert_eq!(meta.modifications, 2);
    assert!(meta.converged);
    assert_eq!(meta.pass("dead-code-elimination").unwrap().counter("functions_removed"), 1);
    assert_eq!(meta.pass("constant-folding").unwrap().counter("constants_folded"), 2);
    assert_eq!(meta.pass("wcet-guided-optimization").unwrap().modifications, 0);

    let names: Vec<_> = optimized.tree.functions().map(|(_, f)| f.name.as_str()).collect();
    assert_eq!(names, vec!["main", "used"]);
    let main = optimized.tree.function_by_name("main").unwrap();
    assert_eq!(main.body[1], Stmt::let_("x", Type::I32, lit(14)));
}

#[test]
fn test_scenario_b_degradation_aborts() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (tree, f) = scenario_b();
    let config = PipelineConfig::default().with_max_wcet_degradation_percent(5.0);
    let pipeline = Pipeline::with_passes(config, vec![Box::new(Padding(f))]);

    assert_eq!(
        pipeline.run(tree).unwrap_err(),
        OptimizationError::WcetDegradationExceeded {
            function: "f".into(),
            old_cycles: 1000,
            new_cycles: 1200,
            percent: 20.0,
        }
    );
}

#[test]
fn test_degradation_allowed_without_preservation() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (tree, f) = scenario_b();
    let config = PipelineConfig::default()
        .with_preserve_wcet_bounds(false)
        .with_max_optimization_passes(1);
    let optimized = Pipeline::with_passes(config, vec![Box::new(Padding(f))]).run(tree).unwrap();

    assert_eq!(optimized.metadata.bound("f").map(|b| b.cycles()), Some(1200));
    assert!(!optimized.metadata.converged);
}

#[test]
fn test_second_run_is_idempotent() {
    let _ = env_logger::builder().is_test(true).try_init();

    let first = optimize(scenario_a(), PipelineConfig::default()).unwrap();
    let second = optimize(first.tree.clone(), PipelineConfig::default()).unwrap();

    assert_eq!(second.metadata.modifications, 0);
    assert_eq!(second.metadata.sweeps, 1);
    assert!(second.metadata.converged);
    assert_eq!(second.tree, first.tree);
    assert_eq!(second.metadata.wcet_bounds, first.metadata.wcet_bounds);
}

#[test]
fn test_stops_after_max_sweeps() {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = PipelineConfig::default().with_max_optimization_passes(3);
    let optimized = Pipeline::with_passes(config, vec![Box::new(Toggle)]).run(scenario_a()).unwrap();

    assert!(!optimized.metadata.converged);
    assert_eq!(optimized.metadata.sweeps, 3);
    assert_eq!(optimized.metadata.modifications, 3);
    assert_eq!(optimized.metadata.pass("toggle").unwrap().runs, 3);
}

#[test]
fn test_rejected_certificate_aborts() {
    let _ = env_logger::builder().is_test(true).try_init();

    let pass = Rewrite {
        certify: false,
        apply: |tree| {
            let main = tree.function_id("main").unwrap();
            tree.func_mut(main).unwrap().body.remove(0);
        },
    };
    let err = Pipeline::with_passes(PipelineConfig::default(), vec![Box::new(pass)])
        .run(scenario_a())
        .unwrap_err();

    assert!(matches!(err, OptimizationError::DeterminismViolated { ref pass, .. } if pass == "rewrite"));
}

#[test]
fn test_dangling_reference_after_pass_aborts() {
    let _ = env_logger::builder().is_test(true).try_init();

    let pass = Rewrite {
        certify: true,
        apply: |tree| {
            let used = tree.function_id("used").unwrap();
            tree.remove_function(used);
        },
    };
    let err = Pipeline::with_passes(PipelineConfig::default(), vec![Box::new(pass)])
        .run(scenario_a())
        .unwrap_err();

    match err {
        OptimizationError::DeterminismViolated { pass, reason } => {
            assert_eq!(pass, "rewrite");
            assert!(reason.contains("main"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_unbounded_loop_in_input_fails_analysis() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut b = TreeBuilder::new();
    let main = b.declare("main", &[], None).unwrap();
    b.define(
        main,
        vec![Stmt::Loop {
            counter: None,
            bound: LoopBound::Unknown,
            condition: Some(Expr::local("go")),
            body: vec![Stmt::Io { port: 0, value: lit(0) }],
        }],
    )
    .unwrap();

    let err = optimize(b.finish().unwrap(), PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, OptimizationError::AnalysisFailure { ref function, .. } if function == "main"));
}

#[test]
fn test_pass_introducing_unbounded_loop_fails_analysis() {
    let _ = env_logger::builder().is_test(true).try_init();

    let pass = Rewrite {
        certify: true,
        apply: |tree| {
            let used = tree.function_id("used").unwrap();
            let body = std::mem::take(&mut tree.func_mut(used).unwrap().body);
            tree.func_mut(used).unwrap().body = vec![Stmt::Loop {
                counter: None,
                bound: LoopBound::Unknown,
                condition: None,
                body,
            }];
        },
    };
    let err = Pipeline::with_passes(PipelineConfig::default(), vec![Box::new(pass)])
        .run(scenario_a())
        .unwrap_err();

    assert!(matches!(err, OptimizationError::AnalysisFailure { ref function, .. } if function == "used"));
}

#[test]
fn test_inconsistent_input_reports_function() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = ProgramTree::new();
    let mut main = Function::new("main", vec![], None);
    main.body.push(Stmt::Expr(Expr::call(FuncId(9), vec![])));
    tree.add_function(main).unwrap();

    let err = optimize(tree, PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, OptimizationError::AnalysisFailure { ref function, .. } if function == "main"));
}

#[test]
fn test_default_catalog_order() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    assert_eq!(
        pipeline.pass_names(),
        vec!["dead-code-elimination", "constant-folding", "wcet-guided-optimization"]
    );
}
