//! Barnes-Hut region tree.
//!
//! Every region stores the aggregate mass and mass centroid of its members plus a `size`, twice
//! the largest member distance to the centroid. A query point treats a region as a single
//! pseudo-body once `size / distance < theta`; otherwise it descends into the children.

/// Read-only snapshot of one node, taken at the start of an iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
    pub size: f64,
}

/// What a query point interacts with while walking the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// A single node, by index into the body slice the tree was built from.
    Body(usize),
    /// A far-away region approximated by its centroid.
    Cluster { x: f64, y: f64, mass: f64 },
}

#[derive(Debug, Clone)]
struct Region {
    mass: f64,
    cx: f64,
    cy: f64,
    size: f64,
    leaf: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct QuadTree {
    // Arena of regions; the root is always slot 0.
    regions: Vec<Region>,
}

impl QuadTree {
    pub fn build(bodies: &[Body]) -> Option<Self> {
        if bodies.is_empty() {
            return None;
        }
        let mut tree = Self {
            regions: Vec::with_capacity(bodies.len() * 2),
        };
        tree.build_region(bodies, (0..bodies.len()).collect());
        Some(tree)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn total_mass(&self) -> f64 {
        self.regions[0].mass
    }

    pub fn centroid(&self) -> (f64, f64) {
        (self.regions[0].cx, self.regions[0].cy)
    }

    fn build_region(&mut self, bodies: &[Body], members: Vec<usize>) -> usize {
        let slot = self.regions.len();

        if let [only] = members.as_slice() {
            let b = bodies[*only];
            self.regions.push(Region {
                mass: b.mass,
                cx: b.x,
                cy: b.y,
                size: 0.0,
                leaf: Some(*only),
                children: Vec::new(),
            });
            return slot;
        }

        let mut mass = 0.0f64;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        for &i in &members {
            let b = &bodies[i];
            mass += b.mass;
            sum_x += b.x * b.mass;
            sum_y += b.y * b.mass;
        }
        let (cx, cy) = if mass > 0.0 {
            (sum_x / mass, sum_y / mass)
        } else {
            (bodies[members[0]].x, bodies[members[0]].y)
        };
        let size = members
            .iter()
            .map(|&i| 2.0 * (bodies[i].x - cx).hypot(bodies[i].y - cy))
            .fold(0.0f64, f64::max);

        self.regions.push(Region {
            mass,
            cx,
            cy,
            size,
            leaf: None,
            children: Vec::new(),
        });

        let mut quadrants: [Vec<usize>; 4] = Default::default();
        for &i in &members {
            let b = &bodies[i];
            let q = usize::from(b.x >= cx) | (usize::from(b.y >= cy) << 1);
            quadrants[q].push(i);
        }

        let total = members.len();
        let mut children = Vec::with_capacity(4);
        for quadrant in quadrants {
            if quadrant.is_empty() {
                continue;
            }
            if quadrant.len() == total {
                // Every member landed on the same side of the centroid: coincident positions.
                // Split into single-node leaves so recursion terminates.
                for i in quadrant {
                    children.push(self.build_region(bodies, vec![i]));
                }
            } else {
                children.push(self.build_region(bodies, quadrant));
            }
        }
        self.regions[slot].children = children;
        slot
    }

    /// Walks the tree from the point of view of `(x, y)`, reporting each body or cluster the
    /// point interacts with under the Barnes-Hut criterion.
    pub fn visit(&self, x: f64, y: f64, theta: f64, mut f: impl FnMut(Interaction)) {
        let mut stack: Vec<usize> = vec![0];
        while let Some(slot) = stack.pop() {
            let r = &self.regions[slot];
            if let Some(i) = r.leaf {
                f(Interaction::Body(i));
                continue;
            }
            let distance = (x - r.cx).hypot(y - r.cy);
            if distance * theta > r.size {
                f(Interaction::Cluster {
                    x: r.cx,
                    y: r.cy,
                    mass: r.mass,
                });
            } else {
                stack.extend(r.children.iter().rev().copied());
            }
        }
    }
}
