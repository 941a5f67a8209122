//! ForceAtlas2 force-directed layout.
//!
//! The engine owns the [`Graph`] for the duration of a run. Each iteration takes a read-only
//! snapshot of positions, rebuilds the Barnes-Hut tree, computes every node's net force in
//! parallel against that snapshot, and only then integrates positions (Jacobi-style). Speed is
//! adapted globally from the swinging/traction balance, then damped per node by its own
//! swinging.

mod forces;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeIndex, Point};
use crate::options::{ForceAtlas2Options, GravityMode};
use crate::quadtree::{Body, Interaction, QuadTree};
use crate::rng::XorShift64Star;
use forces::{Attraction, Gravity, Repulsion, Vec2};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineState {
    Initialized,
    Running,
    /// Forces settled before the iteration cap.
    Converged,
    /// Iteration cap reached, or cancelled.
    Stopped,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::Stopped)
    }
}

/// Cooperative cancellation, honoured at iteration boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStats {
    pub iterations: usize,
    pub state: EngineState,
    pub converged_early: bool,
    /// Mass-weighted sum of useful movement in the last iteration.
    pub traction: f64,
    /// Mass-weighted sum of oscillation in the last iteration.
    pub swinging: f64,
    pub speed: f64,
}

#[derive(Debug, Clone)]
struct SimulationState {
    state: EngineState,
    iteration: usize,
    forces: Vec<Vec2>,
    old_forces: Vec<Vec2>,
    speed: f64,
    speed_efficiency: f64,
    swinging: f64,
    traction: f64,
    calm_iterations: usize,
}

impl SimulationState {
    fn new(node_count: usize) -> Self {
        Self {
            state: EngineState::Initialized,
            iteration: 0,
            forces: vec![Vec2::zeros(); node_count],
            old_forces: vec![Vec2::zeros(); node_count],
            speed: 1.0,
            speed_efficiency: 1.0,
            swinging: 0.0,
            traction: 0.0,
            calm_iterations: 0,
        }
    }
}

const MIN_SPEED_EFFICIENCY: f64 = 0.05;
const MAX_SPEED_RISE: f64 = 0.5;
const MAX_SPEED: f64 = 1000.0;
const MAX_ADJUSTED_STEP: f64 = 10.0;

#[derive(Debug)]
pub struct ForceAtlas2 {
    graph: Graph,
    opts: ForceAtlas2Options,
    masses: Vec<f64>,
    repulsion: Repulsion,
    attraction: Attraction,
    gravity: Gravity,
    movable_mass: f64,
    sim: SimulationState,
    cancel: Option<CancelToken>,
}

impl ForceAtlas2 {
    /// Takes ownership of `graph`. Fails on an empty graph or invalid options.
    pub fn new(mut graph: Graph, opts: &ForceAtlas2Options) -> Result<Self> {
        opts.validate()?;
        if graph.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let n = graph.node_count();
        let masses: Vec<f64> = (0..n).map(|i| graph.mass(i)).collect();
        let movable_mass: f64 = graph
            .nodes()
            .iter()
            .zip(&masses)
            .filter(|(node, _)| !node.fixed)
            .map(|(_, m)| *m)
            .sum();
        let attraction_coefficient = if opts.outbound_attraction_distribution {
            masses.iter().sum::<f64>() / n as f64
        } else {
            1.0
        };

        randomize_unplaced(&mut graph, opts.random_seed);

        let scaling_ratio = opts.scaling_ratio_for(n);
        let gravity = opts.gravity_for(n);
        tracing::debug!(
            nodes = n,
            edges = graph.edge_count(),
            scaling_ratio,
            gravity,
            "forceatlas2 initialized"
        );

        Ok(Self {
            graph,
            masses,
            repulsion: Repulsion {
                coefficient: scaling_ratio,
                adjust_sizes: opts.adjust_sizes,
            },
            attraction: Attraction {
                coefficient: attraction_coefficient,
                edge_weight_influence: opts.edge_weight_influence,
                outbound_distribution: opts.outbound_attraction_distribution,
                lin_log: opts.lin_log_mode,
                adjust_sizes: opts.adjust_sizes,
            },
            gravity: Gravity {
                constant: gravity,
                linear: opts.gravity_mode == GravityMode::Linear,
            },
            movable_mass,
            sim: SimulationState::new(n),
            opts: opts.clone(),
            cancel: None,
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> EngineState {
        self.sim.state
    }

    pub fn iteration(&self) -> usize {
        self.sim.iteration
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Hands the laid-out graph back.
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn stats(&self) -> LayoutStats {
        LayoutStats {
            iterations: self.sim.iteration,
            state: self.sim.state,
            converged_early: self.sim.state == EngineState::Converged,
            traction: self.sim.traction,
            swinging: self.sim.swinging,
            speed: self.sim.speed,
        }
    }

    /// Steps until a terminal state. Always returns within `max_iterations` steps.
    pub fn run(&mut self) -> LayoutStats {
        while !self.step().is_terminal() {}
        let stats = self.stats();
        tracing::debug!(
            iterations = stats.iterations,
            state = ?stats.state,
            speed = stats.speed,
            traction = stats.traction,
            "forceatlas2 finished"
        );
        stats
    }

    /// Runs one iteration, or transitions to a terminal state. No-op once terminal.
    pub fn step(&mut self) -> EngineState {
        if self.sim.state.is_terminal() {
            return self.sim.state;
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            tracing::debug!(iteration = self.sim.iteration, "forceatlas2 cancelled");
            self.sim.state = EngineState::Stopped;
            return self.sim.state;
        }
        if self.sim.iteration >= self.opts.max_iterations {
            self.sim.state = EngineState::Stopped;
            return self.sim.state;
        }
        self.sim.state = EngineState::Running;

        let bodies = self.snapshot();
        let tree = if self.opts.barnes_hut_optimize {
            QuadTree::build(&bodies)
        } else {
            None
        };

        let forces: Vec<Vec2> = (0..bodies.len())
            .into_par_iter()
            .map(|i| self.net_force(i, &bodies, tree.as_ref()))
            .collect();
        self.sim.old_forces = std::mem::replace(&mut self.sim.forces, forces);

        self.adjust_speed();
        self.integrate(&bodies);

        self.sim.iteration += 1;
        tracing::trace!(
            iteration = self.sim.iteration,
            speed = self.sim.speed,
            swinging = self.sim.swinging,
            traction = self.sim.traction,
            "forceatlas2 step"
        );

        let calm = self.movable_mass <= 0.0
            || self.sim.traction / self.movable_mass < self.opts.convergence_epsilon;
        if calm {
            self.sim.calm_iterations += 1;
        } else {
            self.sim.calm_iterations = 0;
        }

        if self.movable_mass <= 0.0 || self.sim.calm_iterations >= self.opts.convergence_window {
            self.sim.state = EngineState::Converged;
        } else if self.sim.iteration >= self.opts.max_iterations {
            self.sim.state = EngineState::Stopped;
        }
        self.sim.state
    }

    fn snapshot(&self) -> Vec<Body> {
        self.graph
            .nodes()
            .iter()
            .zip(&self.masses)
            .map(|(n, &mass)| Body {
                x: n.x,
                y: n.y,
                mass,
                size: n.size,
            })
            .collect()
    }

    fn net_force(&self, i: NodeIndex, bodies: &[Body], tree: Option<&QuadTree>) -> Vec2 {
        let me = &bodies[i];
        let mut f = Vec2::zeros();

        match tree {
            Some(tree) => tree.visit(me.x, me.y, self.opts.barnes_hut_theta, |hit| match hit {
                Interaction::Body(j) => f += self.repulsion.node_node(i, j, bodies),
                Interaction::Cluster { x, y, mass } => {
                    f += self.repulsion.node_cluster(me, x, y, mass)
                }
            }),
            None => {
                for j in 0..bodies.len() {
                    f += self.repulsion.node_node(i, j, bodies);
                }
            }
        }

        for &e in self.graph.out_edges(i) {
            let (_, t) = self.graph.endpoints(e);
            if t == i {
                continue;
            }
            let weight = self.graph.edges()[e].weight;
            f += self
                .attraction
                .along_edge(me, &bodies[t], weight, self.graph.out_degree(i));
        }
        for &e in self.graph.in_edges(i) {
            let (s, _) = self.graph.endpoints(e);
            if s == i {
                continue;
            }
            let weight = self.graph.edges()[e].weight;
            f -= self
                .attraction
                .along_edge(&bodies[s], me, weight, self.graph.out_degree(s));
        }

        f + self.gravity.on(me)
    }

    fn adjust_speed(&mut self) {
        let mut swinging = 0.0f64;
        let mut traction = 0.0f64;
        for (i, node) in self.graph.nodes().iter().enumerate() {
            if node.fixed {
                continue;
            }
            let (old, new) = (self.sim.old_forces[i], self.sim.forces[i]);
            swinging += self.masses[i] * (old - new).norm();
            traction += self.masses[i] * 0.5 * (old + new).norm();
        }
        self.sim.swinging = swinging;
        self.sim.traction = traction;

        let n = self.graph.node_count() as f64;
        let jitter_tolerance = self.opts.jitter_tolerance;
        let estimated_optimal = 0.05 * n.sqrt();
        let min_jt = estimated_optimal.sqrt();
        let max_jt = 10.0f64;
        let mut jt = if traction > 0.0 {
            jitter_tolerance * min_jt.max(max_jt.min(estimated_optimal * traction / (n * n)))
        } else {
            jitter_tolerance * min_jt
        };

        let efficiency = &mut self.sim.speed_efficiency;
        if traction > 0.0 && swinging / traction > 2.0 {
            if *efficiency > MIN_SPEED_EFFICIENCY {
                *efficiency *= 0.5;
            }
            jt = jt.max(jitter_tolerance);
        }

        let speed = self.sim.speed;
        let target_speed = if swinging > 0.0 {
            jt * *efficiency * traction / swinging
        } else {
            speed * (1.0 + MAX_SPEED_RISE)
        };

        if swinging > jt * traction {
            if *efficiency > MIN_SPEED_EFFICIENCY {
                *efficiency *= 0.7;
            }
        } else if speed < MAX_SPEED {
            *efficiency *= 1.3;
        }

        let next = speed + (target_speed - speed).min(MAX_SPEED_RISE * speed);
        if next.is_finite() && next > 0.0 {
            self.sim.speed = next;
        }
    }

    fn integrate(&mut self, bodies: &[Body]) {
        let speed = self.sim.speed;
        for i in 0..bodies.len() {
            if self.graph.nodes()[i].fixed {
                continue;
            }
            let force = self.sim.forces[i];
            let swinging = self.masses[i] * (self.sim.old_forces[i] - force).norm();
            let damping = 1.0 + (speed * swinging).sqrt();

            let step = if self.opts.adjust_sizes {
                let magnitude = force.norm();
                if magnitude == 0.0 {
                    continue;
                }
                let factor = 0.1 * speed / damping;
                force * ((factor * magnitude).min(MAX_ADJUSTED_STEP) / magnitude)
            } else {
                force * (speed / damping)
            };
            if !(step.x.is_finite() && step.y.is_finite()) {
                continue;
            }

            let b = &bodies[i];
            self.graph
                .set_position(i, Point::new(b.x + step.x, b.y + step.y));
        }
    }
}

/// Scatters movable nodes when none of them carries a position (everything at the origin).
fn randomize_unplaced(graph: &mut Graph, seed: u64) {
    let unplaced = graph
        .nodes()
        .iter()
        .filter(|n| !n.fixed)
        .all(|n| n.x == 0.0 && n.y == 0.0);
    if !unplaced {
        return;
    }
    let n = graph.node_count();
    let half_extent = (n as f64).sqrt() * 10.0 / 2.0;
    let mut rng = XorShift64Star::new(seed);
    for i in 0..n {
        if graph.nodes()[i].fixed {
            continue;
        }
        let x = rng.next_f64_signed() * half_extent;
        let y = rng.next_f64_signed() * half_extent;
        graph.set_position(i, Point::new(x, y));
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineState, ForceAtlas2, randomize_unplaced};
    use crate::graph::{Edge, Graph, Node};
    use crate::options::ForceAtlas2Options;

    #[test]
    fn unplaced_nodes_are_scattered_deterministically() {
        let mut a = Graph::new();
        let mut b = Graph::new();
        for id in ["x", "y", "z"] {
            a.add_node(Node::new(id)).unwrap();
            b.add_node(Node::new(id)).unwrap();
        }
        randomize_unplaced(&mut a, 9);
        randomize_unplaced(&mut b, 9);
        assert_eq!(a.positions(), b.positions());
        assert!(a.nodes().iter().any(|n| n.x != 0.0 || n.y != 0.0));
    }

    #[test]
    fn imported_positions_are_kept() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").at(3.0, 4.0)).unwrap();
        g.add_node(Node::new("b")).unwrap();
        randomize_unplaced(&mut g, 1);
        assert_eq!((g.nodes()[0].x, g.nodes()[0].y), (3.0, 4.0));
        assert_eq!((g.nodes()[1].x, g.nodes()[1].y), (0.0, 0.0));
    }

    #[test]
    fn state_machine_walks_initialized_running_terminal() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").at(-5.0, 0.0)).unwrap();
        g.add_node(Node::new("b").at(5.0, 0.0)).unwrap();
        g.add_edge(Edge::new("a", "b")).unwrap();
        let opts = ForceAtlas2Options {
            max_iterations: 3,
            convergence_epsilon: 0.0,
            ..Default::default()
        };
        let mut engine = ForceAtlas2::new(g, &opts).unwrap();
        assert_eq!(engine.state(), EngineState::Initialized);
        assert_eq!(engine.step(), EngineState::Running);
        assert_eq!(engine.step(), EngineState::Running);
        assert_eq!(engine.step(), EngineState::Stopped);
        assert_eq!(engine.iteration(), 3);
        // terminal states are sticky
        assert_eq!(engine.step(), EngineState::Stopped);
        assert_eq!(engine.iteration(), 3);
    }

    #[test]
    fn zero_iteration_budget_stops_without_moving() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").at(1.0, 2.0)).unwrap();
        let opts = ForceAtlas2Options {
            max_iterations: 0,
            ..Default::default()
        };
        let mut engine = ForceAtlas2::new(g, &opts).unwrap();
        let stats = engine.run();
        assert_eq!(stats.state, EngineState::Stopped);
        assert_eq!(stats.iterations, 0);
        assert_eq!(engine.graph().nodes()[0].position().x, 1.0);
    }

    #[test]
    fn all_fixed_graph_converges_immediately() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").at(1.0, 0.0).fixed()).unwrap();
        g.add_node(Node::new("b").at(2.0, 0.0).fixed()).unwrap();
        let mut engine = ForceAtlas2::new(g, &ForceAtlas2Options::default()).unwrap();
        let stats = engine.run();
        assert_eq!(stats.state, EngineState::Converged);
        assert_eq!(stats.iterations, 1);
    }
}
