use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use narwhal::{Edge, ForceAtlas2, ForceAtlas2Options, Graph, LayoutOptions, Node, layout};
use std::hint::black_box;
use std::time::Duration;

#[derive(Debug, Clone)]
struct GraphSpec {
    node_ids: Vec<String>,
    edges: Vec<(usize, usize)>,
}

impl GraphSpec {
    fn build(&self) -> Graph {
        let mut g = Graph::with_capacity(self.node_ids.len(), self.edges.len());
        for id in &self.node_ids {
            let _ = g.add_node(Node::new(id.clone()).with_label(id.clone()));
        }
        for &(from, to) in &self.edges {
            let _ = g.add_edge(Edge::new(
                self.node_ids[from].clone(),
                self.node_ids[to].clone(),
            ));
        }
        g
    }
}

/// A ring of clusters: dense inside each cluster, one bridge edge between neighbors.
fn build_cluster_spec(name: &str, clusters: usize, cluster_size: usize) -> GraphSpec {
    let node_count = clusters * cluster_size;
    let node_ids: Vec<String> = (0..node_count).map(|i| format!("{name}_n{i}")).collect();
    let mut edges = Vec::new();
    for c in 0..clusters {
        let base = c * cluster_size;
        for i in 0..cluster_size {
            for k in 1..=3 {
                let j = (i + k) % cluster_size;
                if i != j {
                    edges.push((base + i, base + j));
                }
            }
        }
        let next = ((c + 1) % clusters) * cluster_size;
        if next != base {
            edges.push((base, next));
        }
    }
    GraphSpec { node_ids, edges }
}

fn bench_forceatlas2(c: &mut Criterion) {
    let mut group = c.benchmark_group("forceatlas2");
    group.measurement_time(Duration::from_secs(10));

    let cases = [
        ("ring_5x20", 5usize, 20usize),
        ("ring_10x50", 10usize, 50usize),
        ("ring_20x100", 20usize, 100usize),
    ];

    for (name, clusters, size) in cases {
        let spec = build_cluster_spec(name, clusters, size);
        for barnes_hut in [true, false] {
            let opts = ForceAtlas2Options {
                barnes_hut_optimize: barnes_hut,
                max_iterations: 50,
                ..Default::default()
            };
            let id = if barnes_hut { "barnes_hut" } else { "exact" };
            group.bench_with_input(BenchmarkId::new(id, name), &spec, |b, spec| {
                b.iter_batched(
                    || spec.build(),
                    |g| {
                        let Ok(mut engine) = ForceAtlas2::new(g, &opts) else {
                            return;
                        };
                        black_box(engine.run());
                    },
                    BatchSize::LargeInput,
                )
            });
        }
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let spec = build_cluster_spec("ring_10x50", 10, 50);
    let opts = LayoutOptions::default();
    group.bench_function("layout", |b| {
        b.iter_batched(
            || spec.build(),
            |g| black_box(layout(g, &opts).map(|r| r.iterations())),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_forceatlas2, bench_full_pipeline);
criterion_main!(benches);
