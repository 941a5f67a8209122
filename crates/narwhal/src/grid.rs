/// Axis-aligned rectangle given by its center and full extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelBox {
    pub fn left(&self) -> f64 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f64 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Overlap extents along x and y, or `None` when the boxes are disjoint or only touch.
    pub fn overlap(&self, other: &LabelBox) -> Option<(f64, f64)> {
        let ox = self.right().min(other.right()) - self.left().max(other.left());
        let oy = self.bottom().min(other.bottom()) - self.top().max(other.top());
        (ox > 0.0 && oy > 0.0).then_some((ox, oy))
    }
}

/// Uniform bucket grid over a set of boxes. Every box is pushed into each cell it intersects,
/// so two overlapping boxes always share at least one cell.
#[derive(Debug, Clone)]
pub struct BoxGrid {
    left: f64,
    top: f64,
    cell_size: f64,
    size_x: i32,
    size_y: i32,
    // Flat grid: cells[x * size_y + y] contains box indices.
    cells: Vec<Vec<usize>>,
}

impl BoxGrid {
    pub fn build(boxes: &[LabelBox]) -> Option<Self> {
        if boxes.is_empty() {
            return None;
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut max_extent = 0.0f64;
        for b in boxes {
            min_x = min_x.min(b.left());
            min_y = min_y.min(b.top());
            max_x = max_x.max(b.right());
            max_y = max_y.max(b.bottom());
            max_extent = max_extent.max(b.width).max(b.height);
        }
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }

        let w = (max_x - min_x).max(1.0);
        let h = (max_y - min_y).max(1.0);
        // Keep the cell count bounded for very spread-out layouts.
        let cell_size = max_extent.max(w / 256.0).max(h / 256.0).max(1.0);
        let size_x = ((w / cell_size).floor() as i32 + 1).max(1);
        let size_y = ((h / cell_size).floor() as i32 + 1).max(1);
        let mut grid = Self {
            left: min_x,
            top: min_y,
            cell_size,
            size_x,
            size_y,
            cells: vec![Vec::new(); (size_x as usize) * (size_y as usize)],
        };

        for (idx, b) in boxes.iter().enumerate() {
            let (start_x, finish_x, start_y, finish_y) = grid.cell_range(b);
            for gx in start_x..=finish_x {
                for gy in start_y..=finish_y {
                    let cell = grid.idx(gx, gy);
                    grid.cells[cell].push(idx);
                }
            }
        }
        Some(grid)
    }

    fn idx(&self, x: i32, y: i32) -> usize {
        (x as usize) * (self.size_y as usize) + (y as usize)
    }

    fn cell_range(&self, b: &LabelBox) -> (i32, i32, i32, i32) {
        let to_cell = |v: f64, origin: f64, max: i32| {
            (((v - origin) / self.cell_size).floor() as i32).clamp(0, max - 1)
        };
        (
            to_cell(b.left(), self.left, self.size_x),
            to_cell(b.right(), self.left, self.size_x),
            to_cell(b.top(), self.top, self.size_y),
            to_cell(b.bottom(), self.top, self.size_y),
        )
    }

    /// Indices of boxes sharing a cell with `boxes[idx]`, excluding `idx`, sorted and unique.
    pub fn candidates(&self, idx: usize, boxes: &[LabelBox]) -> Vec<usize> {
        let (start_x, finish_x, start_y, finish_y) = self.cell_range(&boxes[idx]);
        let mut out = Vec::new();
        for gx in start_x..=finish_x {
            for gy in start_y..=finish_y {
                out.extend(self.cells[self.idx(gx, gy)].iter().filter(|&&j| j != idx));
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{BoxGrid, LabelBox};

    fn b(x: f64, y: f64, w: f64, h: f64) -> LabelBox {
        LabelBox {
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        assert_eq!(b(0.0, 0.0, 10.0, 10.0).overlap(&b(10.0, 0.0, 10.0, 10.0)), None);
        assert_eq!(
            b(0.0, 0.0, 10.0, 10.0).overlap(&b(6.0, 2.0, 10.0, 10.0)),
            Some((4.0, 8.0))
        );
    }

    #[test]
    fn candidates_include_overlapping_and_skip_far_boxes() {
        let boxes = vec![
            b(0.0, 0.0, 10.0, 4.0),
            b(8.0, 1.0, 10.0, 4.0),
            b(500.0, 500.0, 10.0, 4.0),
        ];
        let grid = BoxGrid::build(&boxes).expect("grid");
        let near = grid.candidates(0, &boxes);
        assert!(near.contains(&1));
        assert!(!near.contains(&0));
        assert!(!near.contains(&2));
    }
}
