//! A* search over an obstacle mask and optional cost grid.

use crate::PathfindError;
use georaster::{Cell, Cost, CostGrid, ObstacleMask};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
    f64::consts::SQRT_2,
};
use terrain::math::linspace;

/// Number of cells in the straight line returned when no route exists.
pub const FALLBACK_SAMPLES: usize = 10;

const CARDINAL: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

const ALL: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Which neighbors a step may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// North, south, east, and west.
    Four,
    /// Cardinal and diagonal neighbors.
    #[default]
    Eight,
}

impl Connectivity {
    fn steps(self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &CARDINAL,
            Self::Eight => &ALL,
        }
    }
}

/// Where per-cell movement costs come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostModel<'a> {
    /// Every passable cell costs 1.
    Uniform,
    /// Costs from a grid, `None` cells being impassable.
    Weighted(&'a CostGrid),
}

impl CostModel<'_> {
    fn cost(&self, cell: Cell) -> Option<f64> {
        match self {
            Self::Uniform => Some(1.0),
            Self::Weighted(grid) => grid[cell].map(Cost::get),
        }
    }

    fn min_cost(&self) -> Option<f64> {
        match self {
            Self::Uniform => Some(1.0),
            Self::Weighted(grid) => grid.min_cost().map(Cost::get),
        }
    }
}

/// An ordered run of cells with the cost accumulated up to each one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellPath {
    cells: Vec<Cell>,
    costs: Vec<f64>,
}

impl CellPath {
    /// Pairs `cells` with their accumulated costs.
    ///
    /// Returns `None` when the lengths differ or the costs decrease.
    pub fn new(cells: Vec<Cell>, costs: Vec<f64>) -> Option<Self> {
        let monotonic = costs.windows(2).all(|w| w[0] <= w[1]);
        (cells.len() == costs.len() && monotonic).then_some(Self { cells, costs })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cost accumulated over the whole path.
    pub fn total_cost(&self) -> f64 {
        self.costs.last().copied().unwrap_or(0.0)
    }

    /// Appends `next`, dropping its first cell when it repeats this
    /// path's last cell.
    #[must_use]
    pub fn join(mut self, next: &Self) -> Self {
        let offset = self.total_cost();
        let skip = usize::from(!self.cells.is_empty() && self.cells.last() == next.cells.first());
        self.cells.extend_from_slice(&next.cells[skip.min(next.len())..]);
        self.costs
            .extend(next.costs.iter().skip(skip).map(|cost| cost + offset));
        self
    }
}

/// The outcome of one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLeg {
    pub path: CellPath,

    /// `false` when no obstacle-free route exists and `path` is a
    /// straight line that may cross obstacles.
    pub valid: bool,

    /// Start cell actually searched from, after snapping off an
    /// obstacle.
    pub start: Cell,

    /// End cell actually searched to, after snapping off an obstacle.
    pub end: Cell,

    /// Number of cells expanded by the search.
    pub expanded: usize,
}

/// Heap entry. Ordered so that `BinaryHeap` pops the lowest `f`
/// first, and the earliest pushed among equal `f`.
#[derive(Debug, Clone, Copy)]
struct Node {
    f: f64,
    seq: u64,
    idx: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GridPathfinder<'a> {
    mask: &'a ObstacleMask,
    connectivity: Connectivity,
    costs: CostModel<'a>,
}

impl<'a> GridPathfinder<'a> {
    /// A pathfinder where every unmasked cell costs 1.
    pub fn new(mask: &'a ObstacleMask, connectivity: Connectivity) -> Self {
        Self {
            mask,
            connectivity,
            costs: CostModel::Uniform,
        }
    }

    /// Takes per-cell costs from `costs`, which must match the mask's
    /// shape.
    pub fn weighted(mut self, costs: &'a CostGrid) -> Result<Self, PathfindError> {
        self.mask.ensure_same_shape(costs)?;
        self.costs = CostModel::Weighted(costs);
        Ok(self)
    }

    pub fn mask(&self) -> &ObstacleMask {
        self.mask
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.mask.dimensions()
    }

    /// Returns `true` if `cell` is in bounds, unmasked, and has a cost.
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.mask.get(cell) == Some(&false) && self.costs.cost(cell).is_some()
    }

    /// Finds the least-cost route from `start` to `end`.
    ///
    /// Endpoints on impassable cells are first moved to the nearest
    /// passable cell. When no route exists the returned leg is
    /// invalid and holds a straight line between the requested
    /// endpoints.
    pub fn find_path(&self, start: Cell, end: Cell) -> Result<RouteLeg, PathfindError> {
        for cell in [start, end] {
            if !self.mask.contains(cell) {
                return Err(PathfindError::OutOfBounds {
                    cell,
                    dimensions: self.dimensions(),
                });
            }
        }

        let snapped_start = self.nearest_passable(start).unwrap_or(start);
        let snapped_end = self.nearest_passable(end).unwrap_or(end);
        if snapped_start != start || snapped_end != end {
            debug!(
                "snapped endpoints; start: {:?} -> {:?}, end: {:?} -> {:?}",
                start, snapped_start, end, snapped_end
            );
        }

        let now = std::time::Instant::now();
        let (found, expanded) = self.search(snapped_start, snapped_end);
        debug!(
            "search; from: {:?}, to: {:?}, expanded: {}, found: {}, exec: {:?}",
            snapped_start,
            snapped_end,
            expanded,
            found.is_some(),
            now.elapsed()
        );

        Ok(match found {
            Some(path) => RouteLeg {
                path,
                valid: true,
                start: snapped_start,
                end: snapped_end,
                expanded,
            },
            None => {
                warn!("no route from {start:?} to {end:?}, using straight line");
                RouteLeg {
                    path: straight_line(start, end),
                    valid: false,
                    start: snapped_start,
                    end: snapped_end,
                    expanded,
                }
            }
        })
    }

    /// Breadth-first search over cardinal neighbors for the passable
    /// cell closest to `from`.
    pub fn nearest_passable(&self, from: Cell) -> Option<Cell> {
        let dims = self.dimensions();
        let mut visited = vec![false; self.mask.len()];
        let mut queue = VecDeque::from([from]);
        visited[self.mask.linear_index(from)] = true;
        while let Some(cell) = queue.pop_front() {
            if self.is_passable(cell) {
                return Some(cell);
            }
            for &(dr, dc) in &CARDINAL {
                if let Some(next) = cell.offset(dr, dc, dims) {
                    let idx = self.mask.linear_index(next);
                    if !visited[idx] {
                        visited[idx] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        None
    }

    /// Returns the least-cost path, if any, and the number of expanded
    /// cells.
    fn search(&self, start: Cell, end: Cell) -> (Option<CellPath>, usize) {
        let (Some(min_cost), true, true) = (
            self.costs.min_cost(),
            self.is_passable(start),
            self.is_passable(end),
        ) else {
            return (None, 0);
        };

        let dims = self.dimensions();
        let len = self.mask.len();
        let heuristic = |cell: Cell| cell.distance(end) * min_cost;

        let mut g = vec![f64::INFINITY; len];
        let mut came_from: Vec<Option<usize>> = vec![None; len];
        let mut closed = vec![false; len];
        let mut open = BinaryHeap::new();
        let mut seq = 0_u64;
        let mut expanded = 0;

        let start_idx = self.mask.linear_index(start);
        let end_idx = self.mask.linear_index(end);
        g[start_idx] = 0.0;
        open.push(Node {
            f: heuristic(start),
            seq,
            idx: start_idx,
        });

        while let Some(Node { idx, .. }) = open.pop() {
            if closed[idx] {
                continue;
            }
            closed[idx] = true;
            expanded += 1;

            if idx == end_idx {
                return (Some(self.reconstruct(&came_from, &g, end_idx)), expanded);
            }

            let cell = self.mask.cell_at(idx);
            let Some(here) = self.costs.cost(cell) else {
                continue;
            };
            for &(dr, dc) in self.connectivity.steps() {
                let Some(next) = cell.offset(dr, dc, dims) else {
                    continue;
                };
                let next_idx = self.mask.linear_index(next);
                if closed[next_idx] || self.mask[next] {
                    continue;
                }
                let Some(there) = self.costs.cost(next) else {
                    continue;
                };
                let step = if dr != 0 && dc != 0 { SQRT_2 } else { 1.0 };
                let tentative = g[idx] + step * (here + there) / 2.0;
                if tentative < g[next_idx] {
                    g[next_idx] = tentative;
                    came_from[next_idx] = Some(idx);
                    seq += 1;
                    open.push(Node {
                        f: tentative + heuristic(next),
                        seq,
                        idx: next_idx,
                    });
                }
            }
        }

        (None, expanded)
    }

    fn reconstruct(&self, came_from: &[Option<usize>], g: &[f64], end_idx: usize) -> CellPath {
        let mut indices = vec![end_idx];
        let mut idx = end_idx;
        while let Some(prev) = came_from[idx] {
            indices.push(prev);
            idx = prev;
        }
        indices.reverse();
        CellPath {
            cells: indices.iter().map(|&i| self.mask.cell_at(i)).collect(),
            costs: indices.iter().map(|&i| g[i]).collect(),
        }
    }
}

/// [FALLBACK_SAMPLES] cells evenly spaced from `start` to `end`, with
/// accumulated straight-line distance (in cells) as the cost.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn straight_line(start: Cell, end: Cell) -> CellPath {
    let rows = linspace(start.row as f64, end.row as f64, FALLBACK_SAMPLES);
    let cols = linspace(start.col as f64, end.col as f64, FALLBACK_SAMPLES);
    let cells: Vec<Cell> = rows
        .zip(cols)
        .map(|(row, col)| Cell::new(row.floor() as usize, col.floor() as usize))
        .collect();
    let mut total = 0.0;
    let costs = std::iter::once(0.0)
        .chain(cells.windows(2).map(|pair| {
            total += pair[0].distance(pair[1]);
            total
        }))
        .collect();
    CellPath { cells, costs }
}
