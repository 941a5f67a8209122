use crate::quadtree::Body;
use nalgebra::Vector2;

pub(crate) type Vec2 = Vector2<f64>;

/// Floor applied to distances before they enter an inverse-square term.
pub(crate) const MIN_DISTANCE: f64 = 0.01;

/// Multiplier applied to repulsion between overlapping circles when sizes are adjusted.
const ANTI_COLLISION_FACTOR: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Repulsion {
    pub coefficient: f64,
    pub adjust_sizes: bool,
}

impl Repulsion {
    /// Force exerted on body `i` by body `j`.
    pub(crate) fn node_node(&self, i: usize, j: usize, bodies: &[Body]) -> Vec2 {
        if i == j {
            return Vec2::zeros();
        }
        let (a, b) = (&bodies[i], &bodies[j]);
        let mut delta = Vec2::new(a.x - b.x, a.y - b.y);
        let mut distance = delta.norm();
        if distance < MIN_DISTANCE {
            // Coincident nodes: separate along x, lower index to the left.
            let sign = if i < j { -1.0 } else { 1.0 };
            delta = Vec2::new(sign * MIN_DISTANCE, 0.0);
            distance = MIN_DISTANCE;
        }

        let mm = self.coefficient * a.mass * b.mass;
        let factor = if self.adjust_sizes {
            let gap = distance - a.size - b.size;
            if gap > 0.0 {
                let gap = gap.max(MIN_DISTANCE);
                mm / (gap * gap)
            } else {
                ANTI_COLLISION_FACTOR * mm
            }
        } else {
            mm / (distance * distance)
        };
        delta * factor
    }

    /// Force exerted on `a` by a far-away region collapsed into one pseudo-body.
    pub(crate) fn node_cluster(&self, a: &Body, x: f64, y: f64, mass: f64) -> Vec2 {
        let delta = Vec2::new(a.x - x, a.y - y);
        let distance = delta.norm();
        if distance < MIN_DISTANCE {
            return Vec2::zeros();
        }
        delta * (self.coefficient * a.mass * mass / (distance * distance))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Attraction {
    /// Global coefficient; the mean mass when outbound distribution is on, 1 otherwise.
    pub coefficient: f64,
    pub edge_weight_influence: f64,
    pub outbound_distribution: bool,
    pub lin_log: bool,
    pub adjust_sizes: bool,
}

impl Attraction {
    /// Force pulling `source` toward `target` along one edge. The target receives the negation.
    pub(crate) fn along_edge(
        &self,
        source: &Body,
        target: &Body,
        weight: f64,
        source_out_degree: usize,
    ) -> Vec2 {
        let delta = Vec2::new(source.x - target.x, source.y - target.y);
        let distance = delta.norm();
        if distance < MIN_DISTANCE {
            return Vec2::zeros();
        }

        let effective = if self.adjust_sizes {
            let gap = distance - source.size - target.size;
            if gap <= 0.0 {
                return Vec2::zeros();
            }
            gap
        } else {
            distance
        };

        let w = if self.edge_weight_influence == 0.0 {
            1.0
        } else if self.edge_weight_influence == 1.0 {
            weight
        } else {
            weight.powf(self.edge_weight_influence)
        };

        let mut factor = -self.coefficient * w;
        if self.outbound_distribution {
            factor /= source_out_degree.max(1) as f64;
        }
        if self.lin_log {
            factor *= (1.0 + effective).ln() / effective;
        }
        delta * factor
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Gravity {
    pub constant: f64,
    pub linear: bool,
}

impl Gravity {
    pub(crate) fn on(&self, a: &Body) -> Vec2 {
        let p = Vec2::new(a.x, a.y);
        let distance = p.norm();
        if distance == 0.0 || self.constant == 0.0 {
            return Vec2::zeros();
        }
        let factor = if self.linear {
            a.mass * self.constant
        } else {
            a.mass * self.constant / distance
        };
        -p * factor
    }
}

#[cfg(test)]
mod tests {
    use super::{Attraction, Gravity, MIN_DISTANCE, Repulsion};
    use crate::quadtree::Body;

    fn body(x: f64, y: f64, size: f64) -> Body {
        Body {
            x,
            y,
            mass: 2.0,
            size,
        }
    }

    #[test]
    fn repulsion_pushes_apart_and_is_antisymmetric() {
        let r = Repulsion {
            coefficient: 3.0,
            adjust_sizes: false,
        };
        let bodies = [body(-1.0, 0.0, 0.0), body(1.0, 0.0, 0.0)];
        let on_a = r.node_node(0, 1, &bodies);
        let on_b = r.node_node(1, 0, &bodies);
        // 3 * 2 * 2 / 4 * (-2) = -6
        assert!((on_a.x + 6.0).abs() < 1e-12);
        assert!((on_a + on_b).norm() < 1e-12);
        assert_eq!(r.node_node(0, 0, &bodies).norm(), 0.0);
    }

    #[test]
    fn coincident_nodes_get_a_finite_deterministic_push() {
        let r = Repulsion {
            coefficient: 1.0,
            adjust_sizes: false,
        };
        let bodies = [body(5.0, 5.0, 0.0), body(5.0, 5.0, 0.0)];
        let on_a = r.node_node(0, 1, &bodies);
        let on_b = r.node_node(1, 0, &bodies);
        assert!(on_a.x.is_finite() && on_a.x < 0.0);
        assert!(on_b.x.is_finite() && on_b.x > 0.0);
        assert_eq!(on_a.y, 0.0);
        let expected = 4.0 / MIN_DISTANCE;
        assert!((on_a.norm() - expected).abs() < 1e-6);
    }

    #[test]
    fn overlapping_circles_repel_harder_when_sizes_are_adjusted() {
        let plain = Repulsion {
            coefficient: 1.0,
            adjust_sizes: false,
        };
        let sized = Repulsion {
            coefficient: 1.0,
            adjust_sizes: true,
        };
        let bodies = [body(0.0, 0.0, 5.0), body(4.0, 0.0, 5.0)];
        assert!(sized.node_node(0, 1, &bodies).norm() > plain.node_node(0, 1, &bodies).norm());
    }

    #[test]
    fn outbound_distribution_divides_by_out_degree() {
        let base = Attraction {
            coefficient: 1.0,
            edge_weight_influence: 1.0,
            outbound_distribution: false,
            lin_log: false,
            adjust_sizes: false,
        };
        let distributed = Attraction {
            outbound_distribution: true,
            ..base
        };
        let (s, t) = (body(0.0, 0.0, 0.0), body(10.0, 0.0, 0.0));
        let full = base.along_edge(&s, &t, 1.0, 4);
        let shared = distributed.along_edge(&s, &t, 1.0, 4);
        assert!((full.x - 10.0).abs() < 1e-12);
        assert!((shared.x - 2.5).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_influence_ignores_weights() {
        let a = Attraction {
            coefficient: 1.0,
            edge_weight_influence: 0.0,
            outbound_distribution: false,
            lin_log: false,
            adjust_sizes: false,
        };
        let (s, t) = (body(0.0, 0.0, 0.0), body(3.0, 4.0, 0.0));
        assert_eq!(a.along_edge(&s, &t, 9.0, 1), a.along_edge(&s, &t, 1.0, 1));
    }

    #[test]
    fn overlapping_endpoints_do_not_attract_with_adjusted_sizes() {
        let a = Attraction {
            coefficient: 1.0,
            edge_weight_influence: 1.0,
            outbound_distribution: false,
            lin_log: false,
            adjust_sizes: true,
        };
        let (s, t) = (body(0.0, 0.0, 3.0), body(5.0, 0.0, 3.0));
        assert_eq!(a.along_edge(&s, &t, 1.0, 1).norm(), 0.0);
    }

    #[test]
    fn gravity_modes() {
        let linear = Gravity {
            constant: 1.0,
            linear: true,
        };
        let constant = Gravity {
            constant: 1.0,
            linear: false,
        };
        let near = body(1.0, 0.0, 0.0);
        let far = body(10.0, 0.0, 0.0);
        assert!((linear.on(&far).x + 20.0).abs() < 1e-12);
        assert!((constant.on(&far).x + 2.0).abs() < 1e-12);
        assert!((constant.on(&near).x + 2.0).abs() < 1e-12);
        assert_eq!(linear.on(&body(0.0, 0.0, 0.0)).norm(), 0.0);
    }
}
