// The WCET-guided pass rewrites only functions that lie on a critical path, since shortening
// anything else cannot lower a root's bound. It runs four independent sub-transforms per
// function in a fixed order: inlining of hot statement-level call sites, full unrolling of
// short exact loops, branch reordering by then-arm probability, and grouping of literal-index
// loads so that the cost model's sequential-access discount applies. Inlined callee locals and
// the `let`s of every unrolled loop copy get fresh prefixed names, since the copies land in the
// enclosing block. Each function body is rewritten on a copy and written back only if something
// changed and both its old and new effect traces can be built, so untouched and uncertifiable
// functions never enter the tree delta. The certificate compares pre and post effect traces of
// every touched function; after transforming, the pass re-runs the analyzer and reports the
// real change of the touched bounds as its WCET impact.

//! WCET-guided optimization pass.

use super::effects::{self, MAX_EXPANDED_TRIPS};
use super::{OptimizationPass, PassResult};
use crate::core::error::OptResult;
use crate::core::ir::{Const, Expr, LoopBound, Stmt, Type, UnOp};
use crate::core::tree::{FuncId, Function, ProgramTree, TreeDelta};
use crate::wcet::cost::{self, is_sequential_load, literal_load};
use crate::wcet::{AnalysisResults, WcetAnalyzer};
use std::collections::{BTreeMap, BTreeSet};

/// Probability scale of `Stmt::If::then_probability`.
const PER_MILLE: u16 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WcetGuidedConfig {
    pub enable_unroll: bool,
    /// Largest exact trip count that is fully unrolled.
    pub unroll_threshold: u64,
    pub enable_inline: bool,
    /// A call edge is inlined when its frequency is strictly above this.
    pub inline_frequency_threshold: u64,
    /// Largest callee, in nodes, that is inlined.
    pub max_inline_size: usize,
    pub enable_branch_reorder: bool,
    pub enable_memory_grouping: bool,
}

impl Default for WcetGuidedConfig {
    fn default() -> Self {
        Self {
            enable_unroll: true,
            unroll_threshold: 8,
            enable_inline: true,
            inline_frequency_threshold: 4,
            max_inline_size: 64,
            enable_branch_reorder: true,
            enable_memory_grouping: true,
        }
    }
}

impl WcetGuidedConfig {
    /// All sub-transforms disabled; enable the wanted ones with the `with_*` methods.
    pub fn none() -> Self {
        Self {
            enable_unroll: false,
            enable_inline: false,
            enable_branch_reorder: false,
            enable_memory_grouping: false,
            ..Self::default()
        }
    }

    pub fn with_unroll(mut self, enable: bool) -> Self {
        self.enable_unroll = enable;
        self
    }

    pub fn with_unroll_threshold(mut self, trips: u64) -> Self {
        self.unroll_threshold = trips;
        self
    }

    pub fn with_inline(mut self, enable: bool) -> Self {
        self.enable_inline = enable;
        self
    }

    pub fn with_inline_frequency_threshold(mut self, frequency: u64) -> Self {
        self.inline_frequency_threshold = frequency;
        self
    }

    pub fn with_max_inline_size(mut self, nodes: usize) -> Self {
        self.max_inline_size = nodes;
        self
    }

    pub fn with_branch_reorder(mut self, enable: bool) -> Self {
        self.enable_branch_reorder = enable;
        self
    }

    pub fn with_memory_grouping(mut self, enable: bool) -> Self {
        self.enable_memory_grouping = enable;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct WcetGuidedOptimization {
    config: WcetGuidedConfig,
}

/// Per-function sub-transform counts.
#[derive(Default)]
struct Rewrites {
    calls_inlined: u64,
    loops_unrolled: u64,
    branches_reordered: u64,
    accesses_grouped: u64,
}

impl WcetGuidedOptimization {
    pub fn new(config: WcetGuidedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WcetGuidedConfig {
        &self.config
    }

    fn any_enabled(&self) -> bool {
        let c = &self.config;
        c.enable_unroll || c.enable_inline || c.enable_branch_reorder || c.enable_memory_grouping
    }

    /// Inline callees of `caller` at statement-level call sites.
    fn inline_block(
        &self,
        tree: &ProgramTree,
        caller: FuncId,
        targets: &BTreeSet<FuncId>,
        block: &mut Vec<Stmt>,
        sites: &mut u32,
    ) -> u64 {
        let mut inlined = 0;
        for mut stmt in std::mem::take(block) {
            for inner in stmt.blocks_mut() {
                inlined += self.inline_block(tree, caller, targets, inner, sites);
            }
            let call = match &stmt {
                Stmt::Let { value: Expr::Call { callee, args }, .. }
                | Stmt::Assign { value: Expr::Call { callee, args }, .. }
                | Stmt::Expr(Expr::Call { callee, args })
                    if targets.contains(callee) =>
                {
                    Some((*callee, args.clone()))
                }
                _ => None,
            };
            let Some((callee, args)) = call else {
                block.push(stmt);
                continue;
            };
            let Some((function, init, ret)) = tree
                .func(callee)
                .filter(|f| self.inlinable(caller, callee, f))
                .and_then(|f| split_return(&f.body).map(|(init, ret)| (f, init, ret)))
            else {
                block.push(stmt);
                continue;
            };
            if ret.is_none() && !matches!(stmt, Stmt::Expr(_)) {
                block.push(stmt);
                continue;
            }

            let prefix = format!("__{}_{}_", function.name, sites);
            *sites += 1;
            for (param, arg) in function.params.iter().zip(args) {
                let name = format!("{prefix}{}", param.name);
                block.push(Stmt::Let { name, ty: param.ty, value: arg });
            }
            for inner in init {
                let mut inner = inner.clone();
                rename_stmt(&mut inner, &prefix);
                block.push(inner);
            }
            let ret = ret.map(|value| {
                let mut value = value.clone();
                rename_expr(&mut value, &prefix);
                value
            });
            match (stmt, ret) {
                (Stmt::Let { name, ty, .. }, Some(value)) => block.push(Stmt::Let { name, ty, value }),
                (Stmt::Assign { name, .. }, Some(value)) => block.push(Stmt::Assign { name, value }),
                (_, Some(value)) => block.push(Stmt::Expr(value)),
                (_, None) => {}
            }
            log::debug!("WCET-guided: inlined `{}` at site {}", function.name, prefix);
            inlined += 1;
        }
        inlined
    }

    fn inlinable(&self, caller: FuncId, id: FuncId, callee: &Function) -> bool {
        id != caller
            && !callee.callees().contains(&id)
            && callee.node_count() <= self.config.max_inline_size
            && (callee.params.len() as u64) < cost::CALL_OVERHEAD
    }

    fn unroll_block(&self, block: &mut Vec<Stmt>, private: &BTreeSet<String>) -> u64 {
        let limit = self.config.unroll_threshold.min(MAX_EXPANDED_TRIPS);
        let mut unrolled = 0;
        for mut stmt in std::mem::take(block) {
            for inner in stmt.blocks_mut() {
                unrolled += self.unroll_block(inner, private);
            }
            match stmt {
                Stmt::Loop { counter, bound: LoopBound::Exact(n), condition: None, body }
                    if n <= limit && counter.as_ref().map_or(true, |c| private.contains(c)) =>
                {
                    for k in 0..n {
                        let prefix = match &counter {
                            Some(counter) => {
                                block.push(Stmt::let_(
                                    counter.clone(),
                                    Type::U64,
                                    Expr::lit(Const::new(Type::U64, k as i128)),
                                ));
                                format!("__{counter}_{k}_")
                            }
                            None => format!("__loop_{k}_"),
                        };
                        let mut copy = body.clone();
                        rebind_block(&mut copy, &BTreeMap::new(), Some(&prefix));
                        block.extend(copy);
                    }
                    unrolled += 1;
                }
                other => block.push(other),
            }
        }
        unrolled
    }
}

/// Body without its trailing return, and the returned value. `None` when the
/// body returns from anywhere else.
fn split_return(body: &[Stmt]) -> Option<(&[Stmt], Option<&Expr>)> {
    let (init, ret) = match body.split_last() {
        Some((Stmt::Return(value), init)) => (init, value.as_ref()),
        _ => (body, None),
    };
    if contains_return(init) {
        return None;
    }
    Some((init, ret))
}

fn contains_return(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| {
        matches!(stmt, Stmt::Return(_)) || stmt.blocks().iter().any(|b| contains_return(b))
    })
}

fn rename_expr(expr: &mut Expr, prefix: &str) {
    if let Expr::Local(name) = expr {
        *name = format!("{prefix}{name}");
    }
    for child in expr.children_mut() {
        rename_expr(child, prefix);
    }
}

fn rename_stmt(stmt: &mut Stmt, prefix: &str) {
    match stmt {
        Stmt::Let { name, .. } | Stmt::Assign { name, .. } => *name = format!("{prefix}{name}"),
        Stmt::Loop { counter: Some(name), .. } => *name = format!("{prefix}{name}"),
        _ => {}
    }
    for expr in stmt.exprs_mut() {
        rename_expr(expr, prefix);
    }
    for block in stmt.blocks_mut() {
        for inner in block.iter_mut() {
            rename_stmt(inner, prefix);
        }
    }
}

fn rebind_expr(expr: &mut Expr, renames: &BTreeMap<String, String>) {
    if let Expr::Local(name) = expr {
        if let Some(fresh) = renames.get(name.as_str()) {
            *name = fresh.clone();
        }
    }
    for child in expr.children_mut() {
        rebind_expr(child, renames);
    }
}

/// Apply `renames` to the locals used in `block`, following shadowing. With a
/// `prefix`, the `let`s of `block` itself are renamed as well, so that the
/// block can be spliced into its enclosing block without leaking bindings.
fn rebind_block(block: &mut [Stmt], renames: &BTreeMap<String, String>, prefix: Option<&str>) {
    let mut renames = renames.clone();
    for stmt in block.iter_mut() {
        if let Stmt::Loop { counter: Some(counter), .. } = stmt {
            let mut scope = renames.clone();
            scope.remove(counter.as_str());
            for expr in stmt.exprs_mut() {
                rebind_expr(expr, &scope);
            }
            for inner in stmt.blocks_mut() {
                rebind_block(inner, &scope, None);
            }
            continue;
        }
        for expr in stmt.exprs_mut() {
            rebind_expr(expr, &renames);
        }
        match stmt {
            Stmt::Let { name, .. } => match prefix {
                Some(prefix) => {
                    let fresh = format!("{prefix}{name}");
                    renames.insert(name.clone(), fresh.clone());
                    *name = fresh;
                }
                None => {
                    renames.remove(name.as_str());
                }
            },
            Stmt::Assign { name, .. } => {
                if let Some(fresh) = renames.get(name.as_str()) {
                    *name = fresh.clone();
                }
            }
            _ => {}
        }
        for inner in stmt.blocks_mut() {
            rebind_block(inner, &renames, None);
        }
    }
}

/// Whether `stmt` itself (not its nested blocks) binds or reads local `name`.
fn mentions_local(stmt: &Stmt, name: &str) -> bool {
    let binds = match stmt {
        Stmt::Let { name: bound, .. } | Stmt::Assign { name: bound, .. } => bound == name,
        _ => false,
    };
    let mut reads = false;
    for expr in stmt.exprs() {
        expr.walk(&mut |e| reads |= matches!(e, Expr::Local(local) if local == name));
    }
    binds || reads
}

fn declares_counter(body: &[Stmt], name: &str) -> bool {
    body.iter().any(|stmt| {
        matches!(stmt, Stmt::Loop { counter: Some(c), .. } if c == name)
            || stmt.blocks().iter().any(|b| declares_counter(b, name))
    })
}

/// Whether `name` occurs only as the counter of non-nested loops and inside
/// their bodies, so that unrolling may bind it in the enclosing block.
fn counter_is_private(body: &[Stmt], name: &str) -> bool {
    body.iter().all(|stmt| match stmt {
        Stmt::Loop { counter: Some(c), body, .. } if c == name => !declares_counter(body, name),
        _ => !mentions_local(stmt, name) && stmt.blocks().iter().all(|b| counter_is_private(b, name)),
    })
}

fn collect_counters(body: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in body {
        if let Stmt::Loop { counter: Some(c), .. } = stmt {
            out.insert(c.clone());
        }
        for block in stmt.blocks() {
            collect_counters(block, out);
        }
    }
}

fn reorder_block(block: &mut [Stmt]) -> u64 {
    let mut reordered = 0;
    for stmt in block.iter_mut() {
        for inner in stmt.blocks_mut() {
            reordered += reorder_block(inner);
        }
        if let Stmt::If { cond, then_body, else_body, then_probability: Some(p) } = stmt {
            if *p >= PER_MILLE / 2 {
                continue;
            }
            let guard = std::mem::replace(cond, Expr::lit(Const::bool(false)));
            *cond = match guard {
                Expr::Unary { op: UnOp::Not, operand, .. } => *operand,
                other => Expr::not(other),
            };
            std::mem::swap(then_body, else_body);
            *p = PER_MILLE - (*p).min(PER_MILLE);
            reordered += 1;
        }
    }
    reordered
}

fn sequential_pairs(run: &[Stmt]) -> usize {
    run.windows(2).filter(|w| is_sequential_load(&w[0], &w[1])).count()
}

fn group_block(block: &mut [Stmt]) -> u64 {
    let mut grouped = 0;
    for stmt in block.iter_mut() {
        for inner in stmt.blocks_mut() {
            grouped += group_block(inner);
        }
    }

    let mut start = 0;
    while start < block.len() {
        let mut end = start;
        let mut names = BTreeSet::new();
        while end < block.len() && literal_load(&block[end]).is_some() {
            let Stmt::Let { name, .. } = &block[end] else {
                break;
            };
            if !names.insert(name.clone()) {
                break;
            }
            end += 1;
        }
        if end - start > 1 {
            let run = &mut block[start..end];
            let before = sequential_pairs(run);
            let mut sorted = run.to_vec();
            sorted.sort_by_key(literal_load);
            if sequential_pairs(&sorted) > before {
                run.clone_from_slice(&sorted);
                grouped += (end - start) as u64;
            }
        }
        start = end.max(start + 1);
    }
    grouped
}

impl OptimizationPass for WcetGuidedOptimization {
    fn name(&self) -> &'static str {
        "wcet-guided-optimization"
    }

    fn is_applicable(&self, _tree: &ProgramTree, analysis: &AnalysisResults) -> bool {
        self.any_enabled() && !analysis.critical_paths.is_empty()
    }

    fn transform(&self, tree: &mut ProgramTree, analysis: &AnalysisResults) -> OptResult<PassResult> {
        let mut hot_edges: BTreeMap<FuncId, BTreeSet<FuncId>> = BTreeMap::new();
        for path in &analysis.critical_paths {
            for (caller, callee, frequency) in path.edges() {
                if frequency > self.config.inline_frequency_threshold {
                    hot_edges.entry(caller).or_default().insert(callee);
                }
            }
        }

        let mut result = PassResult::unchanged();
        let mut touched = Vec::new();
        for id in analysis.critical_functions() {
            let Some(function) = tree.func(id) else {
                continue;
            };
            let mut body = function.body.clone();
            let mut sites = function.inline_sites;
            let mut rewrites = Rewrites::default();

            if self.config.enable_inline {
                if let Some(targets) = hot_edges.get(&id) {
                    rewrites.calls_inlined = self.inline_block(tree, id, targets, &mut body, &mut sites);
                }
            }
            if self.config.enable_unroll {
                let mut counters = BTreeSet::new();
                collect_counters(&body, &mut counters);
                counters.retain(|c| {
                    !function.params.iter().any(|p| &p.name == c) && counter_is_private(&body, c)
                });
                rewrites.loops_unrolled = self.unroll_block(&mut body, &counters);
            }
            if self.config.enable_branch_reorder {
                rewrites.branches_reordered = reorder_block(&mut body);
            }
            if self.config.enable_memory_grouping {
                rewrites.accesses_grouped = group_block(&mut body);
            }
            if body == function.body {
                continue;
            }
            if effects::effect_trace(tree, id).is_none()
                || effects::effect_trace_with_body(tree, id, &body).is_none()
            {
                log::debug!(
                    "WCET-guided: `{}` skipped, effect trace too large to certify",
                    function.name
                );
                continue;
            }

            log::debug!(
                "WCET-guided `{}`: {} inlined, {} unrolled, {} reordered, {} grouped",
                function.name,
                rewrites.calls_inlined,
                rewrites.loops_unrolled,
                rewrites.branches_reordered,
                rewrites.accesses_grouped
            );
            let nodes_before = function.node_count() as i64;
            if let Some(function) = tree.func_mut(id) {
                function.body = body;
                function.inline_sites = sites;
                result.size_impact += function.node_count() as i64 - nodes_before;
            }
            result.count("calls_inlined", rewrites.calls_inlined);
            result.count("loops_unrolled", rewrites.loops_unrolled);
            result.count("branches_reordered", rewrites.branches_reordered);
            result.count("accesses_grouped", rewrites.accesses_grouped);
            touched.push(id);
        }

        if touched.is_empty() {
            return Ok(result);
        }
        result.modified = true;

        let refreshed = WcetAnalyzer::new().analyze(tree)?;
        for id in touched {
            if let (Some(old), Some(new)) = (analysis.bound(id), refreshed.bound(id)) {
                result.wcet_impact += new.cycles() as i64 - old.cycles() as i64;
            }
        }
        Ok(result)
    }

    fn certify_determinism(&self, before: &TreeDelta, after: &ProgramTree) -> bool {
        before.touched_functions().all(|id| {
            let pre = effects::effect_trace_before(before, after, id);
            let post = effects::effect_trace(after, id);
            let same = pre.is_some() && pre == post;
            if !same {
                log::debug!("WCET-guided certificate: effect trace of {} changed", id);
            }
            same
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::TreeBuilder;
    use crate::core::tree::GlobalId;

    fn lit(v: i32) -> Expr {
        Expr::lit(Const::i32(v))
    }

    fn run(tree: &mut ProgramTree, pass: &WcetGuidedOptimization) -> (PassResult, TreeDelta) {
        let analysis = WcetAnalyzer::new().analyze(tree).unwrap();
        assert!(pass.is_applicable(tree, &analysis));
        tree.begin_delta();
        let result = pass.transform(tree, &analysis).unwrap();
        (result, tree.take_delta())
    }

    #[test]
    fn test_unlikely_then_arm_is_swapped() {
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[("c", Type::BOOL)], None).unwrap();
        b.define(
            main,
            vec![Stmt::If {
                cond: Expr::local("c"),
                then_body: vec![Stmt::Io { port: 1, value: lit(1) }],
                else_body: vec![Stmt::Io { port: 2, value: lit(2) }],
                then_probability: Some(100),
            }],
        )
        .unwrap();
        let mut tree = b.finish().unwrap();
        let pass = WcetGuidedOptimization::new(WcetGuidedConfig::none().with_branch_reorder(true));

        let (result, delta) = run(&mut tree, &pass);
        assert_eq!(result.counter("branches_reordered"), 1);
        assert_eq!(result.wcet_impact, 0);
        match &tree.func(main).unwrap().body[0] {
            Stmt::If { cond, then_body, then_probability, .. } => {
                assert_eq!(cond, &Expr::not(Expr::local("c")));
                assert_eq!(then_body, &vec![Stmt::Io { port: 2, value: lit(2) }]);
                assert_eq!(*then_probability, Some(900));
            }
            other => panic!("unexpected statement {other:?}"),
        }
        assert!(pass.certify_determinism(&delta, &tree));
    }

    #[test]
    fn test_unroll_skips_counter_used_after_loop() {
        let g = GlobalId(0);
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], Some(Type::U64)).unwrap();
        b.global("g", Type::U64, 4).unwrap();
        b.define(
            main,
            vec![
                Stmt::let_("i", Type::U64, Expr::lit(Const::u64(9))),
                Stmt::counted_loop(
                    "i",
                    4,
                    vec![Stmt::Store { global: g, index: Expr::local("i"), value: Expr::local("i") }],
                ),
                Stmt::ret(Expr::local("i")),
            ],
        )
        .unwrap();
        let mut tree = b.finish().unwrap();
        let pass = WcetGuidedOptimization::new(WcetGuidedConfig::none().with_unroll(true));

        let (result, delta) = run(&mut tree, &pass);
        assert!(!result.modified);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_unroll_binds_counter_per_copy() {
        let g = GlobalId(0);
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        b.global("g", Type::U64, 4).unwrap();
        let store = Stmt::Store { global: g, index: Expr::local("i"), value: Expr::local("i") };
        b.define(main, vec![Stmt::counted_loop("i", 3, vec![store.clone()])]).unwrap();
        let mut tree = b.finish().unwrap();
        let pass = WcetGuidedOptimization::new(WcetGuidedConfig::none().with_unroll(true));

        let (result, delta) = run(&mut tree, &pass);
        assert_eq!(result.counter("loops_unrolled"), 1);
        assert!(result.wcet_impact < 0);
        let body = &tree.func(main).unwrap().body;
        assert_eq!(body.len(), 6);
        assert_eq!(body[2], Stmt::let_("i", Type::U64, Expr::lit(Const::u64(1))));
        assert_eq!(body[3], store);
        assert!(pass.certify_determinism(&delta, &tree));
    }

    #[test]
    fn test_unrolled_copies_keep_body_bindings_local() {
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        let io = |value| Stmt::Io { port: 1, value };
        b.define(
            main,
            vec![
                Stmt::let_("x", Type::I32, lit(1)),
                Stmt::counted_loop(
                    "i",
                    2,
                    vec![
                        io(Expr::local("x")),
                        Stmt::let_("x", Type::I32, lit(5)),
                        Stmt::assign("x", Expr::local("x")),
                        io(Expr::local("x")),
                    ],
                ),
                io(Expr::local("x")),
            ],
        )
        .unwrap();
        let mut tree = b.finish().unwrap();
        let pass = WcetGuidedOptimization::new(WcetGuidedConfig::none().with_unroll(true));

        let (result, delta) = run(&mut tree, &pass);
        assert_eq!(result.counter("loops_unrolled"), 1);
        let mut expected = vec![Stmt::let_("x", Type::I32, lit(1))];
        for k in 0..2u64 {
            let local = format!("__i_{k}_x");
            expected.extend([
                Stmt::let_("i", Type::U64, Expr::lit(Const::u64(k))),
                io(Expr::local("x")),
                Stmt::let_(local.clone(), Type::I32, lit(5)),
                Stmt::assign(local.clone(), Expr::local(local.clone())),
                io(Expr::local(local)),
            ]);
        }
        expected.push(io(Expr::local("x")));
        assert_eq!(tree.func(main).unwrap().body, expected);
        assert!(pass.certify_determinism(&delta, &tree));
    }

    #[test]
    fn test_inline_prefix_separates_name_and_site() {
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        let f = b.declare("f", &[("x", Type::I32)], None).unwrap();
        b.define(
            main,
            vec![Stmt::counted_loop("i", 10, vec![Stmt::Expr(Expr::call(f, vec![lit(3)]))])],
        )
        .unwrap();
        b.define(f, vec![Stmt::Io { port: 0, value: Expr::local("x") }]).unwrap();
        let mut tree = b.finish().unwrap();
        tree.func_mut(main).unwrap().inline_sites = 10;
        let pass = WcetGuidedOptimization::new(WcetGuidedConfig::none().with_inline(true));

        let (result, delta) = run(&mut tree, &pass);
        assert_eq!(result.counter("calls_inlined"), 1);
        let Stmt::Loop { body, .. } = &tree.func(main).unwrap().body[0] else {
            panic!("loop expected");
        };
        assert_eq!(body[0], Stmt::let_("__f_10_x", Type::I32, lit(3)));
        assert_eq!(body[1], Stmt::Io { port: 0, value: Expr::local("__f_10_x") });
        assert_eq!(tree.func(main).unwrap().inline_sites, 11);
        assert!(pass.certify_determinism(&delta, &tree));
    }

    #[test]
    fn test_grouping_sorts_literal_loads() {
        let g = GlobalId(0);
        let load = |name: &str, k: i32| Stmt::let_(name, Type::I32, Expr::load(g, lit(k)));
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        b.global("g", Type::I32, 4).unwrap();
        b.define(main, vec![load("c", 2), load("a", 0), load("b", 1)]).unwrap();
        let mut tree = b.finish().unwrap();
        let pass = WcetGuidedOptimization::new(WcetGuidedConfig::none().with_memory_grouping(true));

        let (result, delta) = run(&mut tree, &pass);
        assert_eq!(result.counter("accesses_grouped"), 3);
        assert_eq!(result.wcet_impact, -2);
        assert_eq!(tree.func(main).unwrap().body, vec![load("a", 0), load("b", 1), load("c", 2)]);
        assert!(pass.certify_determinism(&delta, &tree));
    }

    #[test]
    fn test_certificate_rejects_dropped_store() {
        let g = GlobalId(0);
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        b.global("g", Type::I32, 1).unwrap();
        b.define(main, vec![Stmt::SetGlobal { global: g, value: lit(1) }]).unwrap();
        let mut tree = b.finish().unwrap();

        tree.begin_delta();
        tree.func_mut(main).unwrap().body.clear();
        let delta = tree.take_delta();

        let pass = WcetGuidedOptimization::default();
        assert!(!pass.certify_determinism(&delta, &tree));
    }
}
