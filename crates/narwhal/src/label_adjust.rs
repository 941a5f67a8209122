//! Label-overlap removal.
//!
//! A short force simulation over label boxes run after the main layout. Each overlapping pair
//! pushes both centers apart along the center-to-center vector, proportionally to how deep the
//! boxes interpenetrate. Edges and masses are never consulted.

use crate::graph::{Graph, Point};
use crate::grid::{BoxGrid, LabelBox};
use crate::options::LabelAdjustOptions;
use crate::text::{TextMeasurer, TextStyle};
use rayon::prelude::*;

/// Added to every push so boxes that barely overlap end up strictly apart.
const SEPARATION_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelAdjustStats {
    pub iterations: usize,
    /// No overlapping pair remained when the pass finished.
    pub converged: bool,
    pub overlaps_before: usize,
    pub overlaps_after: usize,
}

/// Half extents of each node's box, independent of its position.
#[derive(Debug, Clone, Copy)]
struct Extent {
    half_w: f64,
    half_h: f64,
}

#[derive(Debug)]
pub struct LabelAdjust {
    graph: Graph,
    opts: LabelAdjustOptions,
    extents: Vec<Extent>,
}

impl LabelAdjust {
    pub fn new(graph: Graph, opts: &LabelAdjustOptions, measurer: &dyn TextMeasurer) -> Self {
        let extents = label_extents(&graph, opts, measurer);
        Self {
            graph,
            opts: opts.clone(),
            extents,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Current label boxes, one per node in node order.
    pub fn boxes(&self) -> Vec<LabelBox> {
        self.graph
            .nodes()
            .iter()
            .zip(&self.extents)
            .map(|(n, e)| LabelBox {
                x: n.x,
                y: n.y,
                width: 2.0 * e.half_w,
                height: 2.0 * e.half_h,
            })
            .collect()
    }

    pub fn overlap_count(&self) -> usize {
        count_overlapping_pairs(&self.boxes())
    }

    pub fn run(&mut self) -> LabelAdjustStats {
        let overlaps_before = self.overlap_count();
        let mut best_count = overlaps_before;
        let mut best_positions = self.current_positions();

        let mut iterations = 0usize;
        let mut converged = false;
        let mut last_count = overlaps_before;
        while iterations < self.opts.max_iterations {
            let boxes = self.boxes();
            let (count, moves) = self.displacements(&boxes);
            last_count = count;
            if count == 0 {
                converged = true;
                break;
            }
            if count < best_count {
                best_count = count;
                best_positions = self.current_positions();
            }

            for (i, d) in moves.into_iter().enumerate() {
                if d == (0.0, 0.0) {
                    continue;
                }
                let n = &self.graph.nodes()[i];
                let p = Point::new(n.x + d.0, n.y + d.1);
                self.graph.set_position(i, p);
            }
            iterations += 1;
        }

        let mut overlaps_after = if converged {
            0
        } else if iterations == 0 {
            last_count
        } else {
            self.overlap_count()
        };
        if overlaps_after > best_count {
            for (i, p) in best_positions.into_iter().enumerate() {
                self.graph.set_position(i, p);
            }
            overlaps_after = best_count;
        }

        tracing::debug!(
            iterations,
            converged,
            overlaps_before,
            overlaps_after,
            "label adjust finished"
        );
        LabelAdjustStats {
            iterations,
            converged,
            overlaps_before,
            overlaps_after,
        }
    }

    fn current_positions(&self) -> Vec<Point> {
        self.graph.nodes().iter().map(|n| n.position()).collect()
    }

    /// Overlapping pair count plus the per-node move for this iteration. Every move is computed
    /// from the same box snapshot.
    fn displacements(&self, boxes: &[LabelBox]) -> (usize, Vec<(f64, f64)>) {
        let Some(grid) = BoxGrid::build(boxes) else {
            return (0, vec![(0.0, 0.0); boxes.len()]);
        };
        let nodes = self.graph.nodes();
        let speed = self.opts.speed;

        let per_node: Vec<(usize, (f64, f64))> = (0..boxes.len())
            .into_par_iter()
            .map(|i| {
                let mut pairs = 0usize;
                let (mut dx, mut dy) = (0.0f64, 0.0f64);
                for j in grid.candidates(i, boxes) {
                    let Some((ox, oy)) = boxes[i].overlap(&boxes[j]) else {
                        continue;
                    };
                    if j > i {
                        pairs += 1;
                    }
                    if nodes[i].fixed {
                        continue;
                    }

                    let (mut ux, mut uy) = (boxes[i].x - boxes[j].x, boxes[i].y - boxes[j].y);
                    let len = ux.hypot(uy);
                    if len > 0.0 {
                        ux /= len;
                        uy /= len;
                    } else {
                        // Same center: lower index goes left.
                        ux = if i < j { -1.0 } else { 1.0 };
                        uy = 0.0;
                    }

                    let mut push = speed * (ox.min(oy) / 2.0 + SEPARATION_EPSILON);
                    if nodes[j].fixed {
                        push *= 2.0;
                    }
                    dx += ux * push;
                    dy += uy * push;
                }
                (pairs, (dx, dy))
            })
            .collect();

        let count = per_node.iter().map(|(p, _)| p).sum();
        (count, per_node.into_iter().map(|(_, d)| d).collect())
    }
}

fn label_extents(
    graph: &Graph,
    opts: &LabelAdjustOptions,
    measurer: &dyn TextMeasurer,
) -> Vec<Extent> {
    let style = TextStyle {
        font_family: opts.font_family.clone(),
        font_size: opts.font_size,
    };
    graph
        .nodes()
        .iter()
        .map(|n| {
            let (w, h) = match n.label_size {
                Some(s) => (s.width.max(0.0), s.height.max(0.0)),
                None => {
                    let m = measurer.measure(n.display_label(), &style);
                    (m.width, m.height)
                }
            };
            let (mut half_w, mut half_h) = (w / 2.0, h / 2.0);
            if opts.adjust_by_size {
                half_w = half_w.max(n.size);
                half_h = half_h.max(n.size);
            }
            Extent {
                half_w: half_w + opts.margin,
                half_h: half_h + opts.margin,
            }
        })
        .collect()
}

/// Number of unordered box pairs that overlap.
pub fn count_overlapping_pairs(boxes: &[LabelBox]) -> usize {
    let Some(grid) = BoxGrid::build(boxes) else {
        return 0;
    };
    (0..boxes.len())
        .into_par_iter()
        .map(|i| {
            grid.candidates(i, boxes)
                .into_iter()
                .filter(|&j| j > i && boxes[i].overlap(&boxes[j]).is_some())
                .count()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{LabelAdjust, count_overlapping_pairs};
    use crate::graph::{Graph, Node};
    use crate::grid::LabelBox;
    use crate::options::LabelAdjustOptions;
    use crate::text::DeterministicTextMeasurer;

    fn opts() -> LabelAdjustOptions {
        LabelAdjustOptions {
            margin: 0.0,
            adjust_by_size: false,
            ..Default::default()
        }
    }

    #[test]
    fn explicit_label_size_wins_over_measurement() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").with_label("a very long label").with_label_size(4.0, 2.0))
            .unwrap();
        let la = LabelAdjust::new(g, &opts(), &DeterministicTextMeasurer::default());
        let b = la.boxes()[0];
        assert_eq!((b.width, b.height), (4.0, 2.0));
    }

    #[test]
    fn adjust_by_size_reserves_the_node_circle() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").with_size(10.0).with_label_size(4.0, 2.0))
            .unwrap();
        let o = LabelAdjustOptions {
            adjust_by_size: true,
            margin: 1.0,
            ..Default::default()
        };
        let la = LabelAdjust::new(g, &o, &DeterministicTextMeasurer::default());
        let b = la.boxes()[0];
        assert_eq!((b.width, b.height), (22.0, 22.0));
    }

    #[test]
    fn two_stacked_labels_are_separated() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").at(0.0, 0.0).with_label_size(20.0, 10.0))
            .unwrap();
        g.add_node(Node::new("b").at(4.0, 1.0).with_label_size(20.0, 10.0))
            .unwrap();
        let mut la = LabelAdjust::new(g, &opts(), &DeterministicTextMeasurer::default());
        assert_eq!(la.overlap_count(), 1);
        let stats = la.run();
        assert!(stats.converged);
        assert_eq!(stats.overlaps_before, 1);
        assert_eq!(stats.overlaps_after, 0);
        assert_eq!(la.overlap_count(), 0);
    }

    #[test]
    fn fixed_node_stays_put_while_the_other_moves() {
        let mut g = Graph::new();
        g.add_node(Node::new("a").at(0.0, 0.0).with_label_size(10.0, 10.0).fixed())
            .unwrap();
        g.add_node(Node::new("b").at(2.0, 0.0).with_label_size(10.0, 10.0))
            .unwrap();
        let mut la = LabelAdjust::new(g, &opts(), &DeterministicTextMeasurer::default());
        let stats = la.run();
        assert!(stats.converged);
        let g = la.into_graph();
        assert_eq!((g.nodes()[0].x, g.nodes()[0].y), (0.0, 0.0));
        assert!(g.nodes()[1].x >= 10.0);
    }

    #[test]
    fn counts_pairs_not_boxes() {
        let boxes = vec![
            LabelBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            };
            3
        ];
        assert_eq!(count_overlapping_pairs(&boxes), 3);
        assert_eq!(count_overlapping_pairs(&[]), 0);
    }
}
