// tests/scheduler_properties.rs

use std::collections::HashSet;

use proptest::prelude::*;

use suitedag::dag::{Group, Node, NodeId, RunState, Scheduler, TestGraph};
use suitedag::engine::{CoreCommand, CoreRuntime, NodeOutcome, RunOptions, RuntimeEvent};
use suitedag::exec::Body;
use suitedag::types::Exclusivity;

/// Shape of a randomly generated group tree.
#[derive(Debug, Clone)]
struct Shape {
    exclusivity: Exclusivity,
    tests: Vec<Exclusivity>,
    before_all: usize,
    before_each: usize,
    after_each: usize,
    after_all: usize,
    children: Vec<Shape>,
}

fn exclusivity() -> impl Strategy<Value = Exclusivity> {
    prop_oneof![
        3 => Just(Exclusivity::None),
        3 => Just(Exclusivity::Local),
        1 => Just(Exclusivity::Global),
    ]
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    let leaf = (
        exclusivity(),
        prop::collection::vec(exclusivity(), 0..4),
        0..2usize,
        0..2usize,
        0..2usize,
        0..2usize,
    )
        .prop_map(|(exclusivity, tests, ba, be, ae, aa)| Shape {
            exclusivity,
            tests,
            before_all: ba,
            before_each: be,
            after_each: ae,
            after_all: aa,
            children: Vec::new(),
        });

    leaf.prop_recursive(3, 24, 3, |inner| {
        (
            exclusivity(),
            prop::collection::vec(exclusivity(), 0..4),
            0..2usize,
            0..2usize,
            0..2usize,
            0..2usize,
            prop::collection::vec(inner, 0..3),
        )
            .prop_map(|(exclusivity, tests, ba, be, ae, aa, children)| Shape {
                exclusivity,
                tests,
                before_all: ba,
                before_each: be,
                after_each: ae,
                after_all: aa,
                children,
            })
    })
}

fn build(shape: &Shape, mut group: Group, counter: &mut usize) -> Group {
    let mut next = || {
        *counter += 1;
        format!("n{counter}")
    };

    group = group.with_exclusivity(shape.exclusivity);
    for _ in 0..shape.before_all {
        group.add_before_all(Node::before_all(next(), Body::Noop));
    }
    for _ in 0..shape.before_each {
        group.add_before_each(Node::before_each(next(), Body::Noop));
    }
    for _ in 0..shape.after_each {
        group.add_after_each(Node::after_each(next(), Body::Noop));
    }
    for _ in 0..shape.after_all {
        group.add_after_all(Node::after_all(next(), Body::Noop));
    }
    for excl in &shape.tests {
        group.add_test(Node::test(next(), Body::Noop).with_exclusivity(*excl));
    }

    for child in &shape.children {
        *counter += 1;
        let title = format!("g{counter}");
        let built = build(child, Group::new(title), counter);
        group.add_group(built);
    }
    group
}

fn root_for(shape: &Shape) -> Group {
    let mut counter = 0;
    build(shape, Group::root(), &mut counter)
}

fn is_global(graph: &TestGraph, id: NodeId) -> bool {
    graph.node(id).exclusivity() == Exclusivity::Global
}

proptest! {
    #[test]
    fn compiled_graphs_are_well_formed(shape in shape_strategy()) {
        let scheduler = Scheduler::new(root_for(&shape), RunOptions::default())
            .expect("compiles");
        let graph = scheduler.graph();

        for node in graph.nodes() {
            let id = node.id().expect("registered");

            let distinct: HashSet<_> = node.priors().iter().collect();
            prop_assert_eq!(distinct.len(), node.priors().len());

            for prior in node.priors() {
                prop_assert!(*prior < id, "edges point forward");
                prop_assert!(graph.node(*prior).nexts().contains(&id));
            }

            // Single entry, single exit.
            if id != scheduler.first() {
                prop_assert!(!node.priors().is_empty(), "{} has no priors", id);
            }
            if id != scheduler.last() {
                prop_assert!(!node.nexts().is_empty(), "{} has no nexts", id);
            }
        }
    }

    #[test]
    fn compiling_twice_is_idempotent(shape in shape_strategy()) {
        let mut group = root_for(&shape);
        let mut graph = TestGraph::new();

        group.compile(&mut graph);
        let nodes = graph.len();
        let edges: usize = graph.nodes().map(|n| n.priors().len()).sum();

        group.compile(&mut graph);
        prop_assert_eq!(graph.len(), nodes);
        prop_assert_eq!(graph.nodes().map(|n| n.priors().len()).sum::<usize>(), edges);
    }

    #[test]
    fn runs_respect_ceiling_priors_and_global_exclusion(
        shape in shape_strategy(),
        ceiling in 0..4usize,
        picks in prop::collection::vec(any::<usize>(), 1..64),
    ) {
        let options = RunOptions {
            concurrency: Some(ceiling),
            ..RunOptions::default()
        };
        let mut core = CoreRuntime::new(
            Scheduler::new(root_for(&shape), options).expect("compiles"),
        );

        let mut running: Vec<NodeId> = Vec::new();
        let mut launched: HashSet<NodeId> = HashSet::new();
        let mut step = core.start();
        let mut turn = 0usize;

        loop {
            for command in &step.commands {
                if let CoreCommand::Launch(batch) = command {
                    for l in batch {
                        prop_assert!(launched.insert(l.node), "{} launched twice", l.node);
                        running.push(l.node);
                    }
                }
            }

            let graph = core.scheduler().graph();
            for id in &running {
                for prior in graph.node(*id).priors() {
                    prop_assert_eq!(graph.node(*prior).state(), RunState::Completed);
                }
            }
            if ceiling > 0 {
                prop_assert!(running.len() <= ceiling);
            }
            if running.iter().any(|id| is_global(graph, *id)) {
                prop_assert_eq!(running.len(), 1, "global node overlaps: {:?}", running);
            }

            if running.is_empty() {
                break;
            }

            // Complete running nodes in an arbitrary order.
            let pick = picks[turn % picks.len()] % running.len();
            turn += 1;
            let node = running.swap_remove(pick);
            step = core.step(RuntimeEvent::NodeFinished {
                node,
                outcome: NodeOutcome::Success,
            });
        }

        prop_assert!(core.is_finished());
        let stats = core.report().stats;
        prop_assert_eq!(stats.completed, stats.tests);
        prop_assert_eq!(stats.passes, stats.tests);
        if ceiling > 0 {
            prop_assert!(stats.max_concurrency <= ceiling);
        }
    }
}
