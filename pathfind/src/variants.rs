use crate::{
    astar::{CellPath, GridPathfinder},
    PathfindError,
};
use georaster::Cell;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Most routes a single request can produce.
pub const MAX_VARIANTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Least-cost route between the endpoints.
    Direct,
    /// Detours around the left of the direct line, as seen facing the
    /// destination.
    LeftFlank,
    /// Detours around the right.
    RightFlank,
}

impl RouteKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Direct => "Direct Route",
            Self::LeftFlank => "Left Approach",
            Self::RightFlank => "Right Approach",
        }
    }
}

/// A route in grid space, before simplification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRoute {
    pub kind: RouteKind,
    pub path: CellPath,

    /// Every leg found an obstacle-free route.
    pub valid: bool,

    /// Intermediate cell flanking routes pass through.
    pub anchor: Option<Cell>,

    /// Cells expanded over all legs.
    pub expanded: usize,
}

/// Produces the direct route plus up to two flanking alternatives.
pub struct RouteVariantGenerator<'a> {
    pathfinder: &'a GridPathfinder<'a>,
}

impl<'a> RouteVariantGenerator<'a> {
    pub fn new(pathfinder: &'a GridPathfinder<'a>) -> Self {
        Self { pathfinder }
    }

    /// Returns `num_variants` routes (clamped to `1..=3`), direct
    /// first, then left and right flanks.
    pub fn generate(
        &self,
        start: Cell,
        end: Cell,
        num_variants: usize,
    ) -> Result<Vec<RawRoute>, PathfindError> {
        let (left, right) = flank_anchors(start, end, self.pathfinder.dimensions());
        let jobs = [
            (RouteKind::Direct, None),
            (RouteKind::LeftFlank, Some(left)),
            (RouteKind::RightFlank, Some(right)),
        ];
        let count = num_variants.clamp(1, MAX_VARIANTS);
        debug!(
            "variants; start: {:?}, end: {:?}, count: {}, anchors: {:?} {:?}",
            start, end, count, left, right
        );
        jobs[..count]
            .par_iter()
            .map(|&(kind, anchor)| self.route(kind, start, end, anchor))
            .collect()
    }

    fn route(
        &self,
        kind: RouteKind,
        start: Cell,
        end: Cell,
        anchor: Option<Cell>,
    ) -> Result<RawRoute, PathfindError> {
        match anchor {
            None => {
                let leg = self.pathfinder.find_path(start, end)?;
                Ok(RawRoute {
                    kind,
                    path: leg.path,
                    valid: leg.valid,
                    anchor,
                    expanded: leg.expanded,
                })
            }
            Some(mid) => {
                let first = self.pathfinder.find_path(start, mid)?;
                let second = self.pathfinder.find_path(mid, end)?;
                Ok(RawRoute {
                    kind,
                    path: first.path.join(&second.path),
                    valid: first.valid && second.valid,
                    anchor,
                    expanded: first.expanded + second.expanded,
                })
            }
        }
    }
}

/// Returns the (left, right) waypoints flanking routes detour through.
///
/// Anchors sit `max(3, max(rows, cols) / 5)` cells outside the
/// bounding box of `start` and `end`, on either side of the dominant
/// axis of travel, level with the middle of the box. Left and right
/// are as seen when facing from `start` toward `end`.
pub fn flank_anchors(start: Cell, end: Cell, (rows, cols): (usize, usize)) -> (Cell, Cell) {
    let padding = 3.max(rows.max(cols) / 5);
    let (min_row, max_row) = (start.row.min(end.row), start.row.max(end.row));
    let (min_col, max_col) = (start.col.min(end.col), start.col.max(end.col));
    let d_row = end.row.abs_diff(start.row);
    let d_col = end.col.abs_diff(start.col);

    if d_col >= d_row {
        let col = (min_col + max_col) / 2;
        let (north, south) = spread(
            min_row.saturating_sub(padding),
            (max_row + padding).min(rows - 1),
            padding,
            rows,
        );
        let (north, south) = (Cell::new(north, col), Cell::new(south, col));
        if end.col >= start.col {
            (north, south)
        } else {
            (south, north)
        }
    } else {
        let row = (min_row + max_row) / 2;
        let (west, east) = spread(
            min_col.saturating_sub(padding),
            (max_col + padding).min(cols - 1),
            padding,
            cols,
        );
        let (west, east) = (Cell::new(row, west), Cell::new(row, east));
        if end.row > start.row {
            (east, west)
        } else {
            (west, east)
        }
    }
}

/// Moves `lo` and `hi` apart until they are at least `padding` apart
/// or hit the ends of `0..len`.
fn spread(mut lo: usize, mut hi: usize, padding: usize, len: usize) -> (usize, usize) {
    let gap = hi - lo;
    if gap >= padding {
        return (lo, hi);
    }
    let mut need = padding - gap;
    let down = need.div_ceil(2).min(lo);
    lo -= down;
    need -= down;
    let up = need.min(len - 1 - hi);
    hi += up;
    need -= up;
    lo -= need.min(lo);
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::{flank_anchors, spread, RouteKind, RouteVariantGenerator};
    use crate::astar::{Connectivity, GridPathfinder};
    use georaster::{Cell, Grid};

    #[test]
    fn test_anchors_horizontal() {
        // padding = max(3, 20 / 5) = 4
        let east = flank_anchors(Cell::new(10, 2), Cell::new(12, 17), (20, 20));
        assert_eq!(east, (Cell::new(6, 9), Cell::new(16, 9)));
        let west = flank_anchors(Cell::new(12, 17), Cell::new(10, 2), (20, 20));
        assert_eq!(west, (Cell::new(16, 9), Cell::new(6, 9)));
    }

    #[test]
    fn test_anchors_vertical() {
        let south = flank_anchors(Cell::new(1, 10), Cell::new(18, 10), (20, 20));
        assert_eq!(south, (Cell::new(9, 14), Cell::new(9, 6)));
        let north = flank_anchors(Cell::new(18, 10), Cell::new(1, 10), (20, 20));
        assert_eq!(north, (Cell::new(9, 6), Cell::new(9, 14)));
    }

    #[test]
    fn test_anchors_clamped_and_pushed_apart() {
        // Travel along the top edge: the north anchor clamps to row 0.
        let (left, right) = flank_anchors(Cell::new(0, 0), Cell::new(0, 19), (20, 20));
        assert_eq!(left, Cell::new(0, 9));
        assert_eq!(right, Cell::new(4, 9));

        // Too few rows to separate by the full padding.
        let (left, right) = flank_anchors(Cell::new(1, 0), Cell::new(1, 19), (3, 20));
        assert_eq!((left.row, right.row), (0, 2));

        assert_eq!(spread(5, 6, 4, 20), (3, 7));
        assert_eq!(spread(0, 1, 4, 20), (0, 4));
        assert_eq!(spread(18, 19, 4, 20), (15, 19));
    }

    #[test]
    fn test_variant_count_is_clamped() {
        let mask = Grid::filled(15, 15, false).unwrap();
        let finder = GridPathfinder::new(&mask, Connectivity::Eight);
        let generator = RouteVariantGenerator::new(&finder);
        let (start, end) = (Cell::new(7, 1), Cell::new(7, 13));

        let one = generator.generate(start, end, 0).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].kind, RouteKind::Direct);

        let all = generator.generate(start, end, 7).unwrap();
        let kinds: Vec<_> = all.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RouteKind::Direct, RouteKind::LeftFlank, RouteKind::RightFlank]
        );
        for route in &all {
            assert!(route.valid);
            assert_eq!(route.path.cells().first(), Some(&start));
            assert_eq!(route.path.cells().last(), Some(&end));
        }
        let anchor = all[1].anchor.unwrap();
        assert!(all[1].path.cells().contains(&anchor));
        // Junction cell appears once.
        let visits = all[1].path.cells().iter().filter(|&&c| c == anchor).count();
        assert_eq!(visits, 1);
    }
}
