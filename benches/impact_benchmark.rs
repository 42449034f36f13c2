use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use itrack::impact::{DependencyGraph, SystemNode};
use itrack::models::{SystemCategory, SystemStatus};

fn nodes(count: usize) -> Vec<SystemNode> {
    (0..count as i64)
        .map(|id| SystemNode {
            id,
            name: format!("system{}", id),
            category: SystemCategory::Core,
            status: SystemStatus::Active,
        })
        .collect()
}

/// Linear chain: system0 -> system1 -> system2 -> ...
/// Worst case for walk depth
fn linear_chain(count: usize) -> DependencyGraph {
    let edges: Vec<(i64, i64)> = (1..count as i64).map(|i| (i - 1, i)).collect();
    DependencyGraph::build(nodes(count), &edges)
}

/// Layers of `width` systems, each depending on every system of the layer
/// above. Many paths reach the same node, exercising the level check.
fn layered(layers: usize, width: usize) -> DependencyGraph {
    let mut edges = Vec::new();
    for layer in 1..layers {
        for from in 0..width {
            for to in 0..width {
                let source = ((layer - 1) * width + from) as i64;
                let target = (layer * width + to) as i64;
                edges.push((source, target));
            }
        }
    }
    DependencyGraph::build(nodes(layers * width), &edges)
}

fn bench_linear_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("impact_linear_chain");

    for size in [10, 100, 500].iter() {
        let graph = linear_chain(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| graph.analyze(black_box(0)).unwrap());
        });
    }

    group.finish();
}

fn bench_layered(c: &mut Criterion) {
    let mut group = c.benchmark_group("impact_layered");

    for (layers, width) in [(4, 3), (6, 3), (5, 4)].iter() {
        let graph = layered(*layers, *width);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", layers, width)),
            &graph,
            |b, graph| {
                b.iter(|| graph.analyze(black_box(0)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_graph_build(c: &mut Criterion) {
    let edges: Vec<(i64, i64)> = (1..1000i64).map(|i| (i / 2, i)).collect();
    c.bench_function("impact_build_1000_systems", |b| {
        b.iter(|| DependencyGraph::build(black_box(nodes(1000)), black_box(&edges)));
    });
}

criterion_group!(benches, bench_linear_chain, bench_layered, bench_graph_build);
criterion_main!(benches);
