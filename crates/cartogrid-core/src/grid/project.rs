use super::CartogramGrid;
use crate::geom::intersection_of_segments;
use geo::Coord;

impl CartogramGrid {
    /// Lattice cell index and fractional offset of `v` along one axis.
    fn locate(v: f64, min: f64, cell_size: f64, size: usize) -> (usize, f64) {
        let u = (v - min) / cell_size;
        let last = (size - 2) as f64;
        let idx = if v == min { 0.0 } else { u.floor().clamp(0.0, last) };
        (idx as usize, u - idx)
    }

    /// Maps a point of the undeformed plane onto the deformed grid.
    ///
    /// The point's fractional position `(ti, tj)` inside its lattice cell selects one segment
    /// across the deformed cell at constant `ti` and another at constant `tj`; their intersection
    /// is the projected point.
    pub fn project_point(&self, x: f64, y: f64) -> Coord<f64> {
        let min = self.envelope.min();
        let (i, ti) = Self::locate(x, min.x, self.cell_size_x, self.size_x);
        let (j, tj) = Self::locate(y, min.y, self.cell_size_y, self.size_y);

        let p00 = self.node(i, j);
        let p10 = self.node(i + 1, j);
        let p01 = self.node(i, j + 1);
        let p11 = self.node(i + 1, j + 1);

        let a = p00 + (p10 - p00) * ti;
        let b = p01 + (p11 - p01) * ti;
        let c = p00 + (p01 - p00) * tj;
        let d = p10 + (p11 - p10) * tj;

        intersection_of_segments(a.x, a.y, b.x, b.y, c.x, c.y, d.x, d.y).unwrap_or_else(|| {
            Coord {
                x: (p00.x + p10.x + p01.x + p11.x) / 4.0,
                y: (p00.y + p10.y + p01.y + p11.y) / 4.0,
            }
        })
    }

    pub fn project_coord(&self, c: Coord<f64>) -> Coord<f64> {
        self.project_point(c.x, c.y)
    }

    /// Projects the segment `c1 → c2`, inserting a point wherever it crosses a grid line.
    ///
    /// The start point is not included; the result ends with the projection of `c2`.
    pub fn project_line_segment(&self, c1: Coord<f64>, c2: Coord<f64>) -> Vec<Coord<f64>> {
        let min = self.envelope.min();
        let mut ts: Vec<f64> = Vec::new();
        crossings(
            (c1.x - min.x) / self.cell_size_x,
            (c2.x - min.x) / self.cell_size_x,
            self.size_x,
            &mut ts,
        );
        crossings(
            (c1.y - min.y) / self.cell_size_y,
            (c2.y - min.y) / self.cell_size_y,
            self.size_y,
            &mut ts,
        );
        ts.sort_by(f64::total_cmp);
        ts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        let mut out = Vec::with_capacity(ts.len() + 1);
        out.extend(ts.into_iter().map(|t| self.project_coord(c1 + (c2 - c1) * t)));
        out.push(self.project_coord(c2));
        out
    }

    /// Projects a coordinate sequence, subdividing every segment at the grid lines it crosses.
    pub fn project_coordinates(&self, coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
        let Some(first) = coords.first() else {
            return Vec::new();
        };
        let mut out = vec![self.project_coord(*first)];
        for pair in coords.windows(2) {
            out.extend(self.project_line_segment(pair[0], pair[1]));
        }
        out
    }
}

/// Parameters in `(0, 1)` where the index-space segment `u1 → u2` crosses an integer grid line.
fn crossings(u1: f64, u2: f64, size: usize, ts: &mut Vec<f64>) {
    let du = u2 - u1;
    if du == 0.0 || !du.is_finite() {
        return;
    }
    let lo = u1.min(u2).floor().max(0.0);
    let hi = u1.max(u2).ceil().min((size - 1) as f64);
    let mut k = lo;
    while k <= hi {
        let t = (k - u1) / du;
        if t > 0.0 && t < 1.0 {
            ts.push(t);
        }
        k += 1.0;
    }
}
