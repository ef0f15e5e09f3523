//! Local relaxation of constrained cells after diffusion.
//!
//! Nodes of a constrained cell are nudged toward the position that would make the cell square
//! again. Every node of a cell on the grid border may move; inside the grid, a node may move only
//! when no other cell sharing it is deformable. Moves are capped at a tenth of the lattice
//! cell size and are dropped entirely when they would break the ordering of the surrounding nodes.

use super::{CartogramGrid, CellState};
use geo::Coord;
use serde::Serialize;

/// Largest move per node, as a fraction of the smaller lattice cell side.
const MAX_MOVE_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstrainedReport {
    pub constrained_cells: usize,
    pub eligible_nodes: usize,
    pub moved_nodes: usize,
    pub rejected_moves: usize,
}

pub fn resolve_constrained_deformation(grid: &mut CartogramGrid) -> ConstrainedReport {
    let mut report = ConstrainedReport::default();
    let (cx, cy) = grid.cell_count();
    let max_move = MAX_MOVE_FRACTION * grid.cell_size_x.min(grid.cell_size_y);

    for j in 0..cy {
        for i in 0..cx {
            if grid.cell_state[(i, j)] != CellState::Constrained {
                continue;
            }
            report.constrained_cells += 1;

            let border = i == 0 || j == 0 || i + 1 == cx || j + 1 == cy;
            let corners = grid.cell_corners(i, j);
            let center = Coord {
                x: corners.iter().map(|c| c.x).sum::<f64>() / 4.0,
                y: corners.iter().map(|c| c.y).sum::<f64>() / 4.0,
            };
            let edge = |a: usize, b: usize| {
                let d = corners[b] - corners[a];
                d.x.hypot(d.y)
            };

            // corner k in ring order, with the direction it sits in from the centre
            let nodes = [
                ((i, j), -1.0, -1.0),
                ((i + 1, j), 1.0, -1.0),
                ((i + 1, j + 1), 1.0, 1.0),
                ((i, j + 1), -1.0, 1.0),
            ];
            for (k, ((ni, nj), sx, sy)) in nodes.into_iter().enumerate() {
                if !border && !node_is_free(grid, ni, nj, (i, j)) {
                    continue;
                }
                let half = 0.25 * (edge(k, (k + 1) % 4) + edge((k + 3) % 4, k));
                let target = Coord {
                    x: center.x + sx * half,
                    y: center.y + sy * half,
                };
                report.eligible_nodes += 1;
                if try_to_move_node(grid, ni, nj, target, max_move) {
                    report.moved_nodes += 1;
                } else {
                    report.rejected_moves += 1;
                }
            }
        }
    }

    tracing::debug!(
        cells = report.constrained_cells,
        moved = report.moved_nodes,
        rejected = report.rejected_moves,
        "resolved constrained deformation"
    );
    report
}

/// An interior node may move when none of the other cells sharing it is deformable.
fn node_is_free(grid: &CartogramGrid, ni: usize, nj: usize, owner: (usize, usize)) -> bool {
    let (cx, cy) = grid.cell_count();
    let neighbours = [(-1, -1), (0, -1), (-1, 0), (0, 0)];
    neighbours.iter().all(|&(di, dj)| {
        let (ci, cj) = (ni as isize + di, nj as isize + dj);
        if ci < 0 || cj < 0 || ci >= cx as isize || cj >= cy as isize {
            return true;
        }
        let cell = (ci as usize, cj as usize);
        cell == owner || grid.cell_state[cell] != CellState::Deformable
    })
}

fn try_to_move_node(
    grid: &mut CartogramGrid,
    ni: usize,
    nj: usize,
    target: Coord<f64>,
    max_move: f64,
) -> bool {
    let current = grid.node(ni, nj);
    let mut delta = target - current;
    if ni == 0 || ni == grid.size_x - 1 {
        delta.x = 0.0;
    }
    if nj == 0 || nj == grid.size_y - 1 {
        delta.y = 0.0;
    }
    let len = delta.x.hypot(delta.y);
    if len == 0.0 || !len.is_finite() {
        return false;
    }
    if len > max_move {
        delta = delta * (max_move / len);
    }
    let moved = current + delta;
    if !keeps_ordering(grid, ni, nj, moved) {
        return false;
    }
    grid.set_node(ni, nj, moved);
    true
}

/// The three nodes to the left must stay left of `p`, the three to the right stay right, and the
/// same for the rows below and above.
fn keeps_ordering(grid: &CartogramGrid, ni: usize, nj: usize, p: Coord<f64>) -> bool {
    let (sx, sy) = (grid.size_x as isize, grid.size_y as isize);
    let (ni, nj) = (ni as isize, nj as isize);
    let node = |i: isize, j: isize| {
        (i >= 0 && j >= 0 && i < sx && j < sy).then(|| grid.node(i as usize, j as usize))
    };
    (-1..=1).all(|k| {
        node(ni - 1, nj + k).is_none_or(|n| n.x < p.x)
            && node(ni + 1, nj + k).is_none_or(|n| n.x > p.x)
            && node(ni + k, nj - 1).is_none_or(|n| n.y < p.y)
            && node(ni + k, nj + 1).is_none_or(|n| n.y > p.y)
    })
}
