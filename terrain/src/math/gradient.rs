use georaster::{Cell, Grid};

/// Finite-difference derivative of `samples` along rows and columns,
/// returned as `(d/drow, d/dcol)`.
///
/// Interior cells use central differences and edge cells one-sided
/// differences. Where a neighbor is NaN the available one-sided
/// difference is used instead, or 0 when there is none. An axis of
/// length 1 has a derivative of 0 everywhere.
pub fn gradient(samples: &Grid<f64>, row_spacing: f64, col_spacing: f64) -> (Grid<f64>, Grid<f64>) {
    let dims = samples.dimensions();
    let derivative = |cell: Cell, drow: isize, dcol: isize, spacing: f64| {
        let at = |offset: isize| {
            cell.offset(drow * offset, dcol * offset, dims)
                .map(|c| samples[c])
                .filter(|v| v.is_finite())
        };
        match (at(-1), at(0), at(1)) {
            (Some(prev), _, Some(next)) => (next - prev) / (2.0 * spacing),
            (_, Some(here), Some(next)) => (next - here) / spacing,
            (Some(prev), Some(here), _) => (here - prev) / spacing,
            _ => 0.0,
        }
    };
    (
        samples.map_cells(|cell, _| derivative(cell, 1, 0, row_spacing)),
        samples.map_cells(|cell, _| derivative(cell, 0, 1, col_spacing)),
    )
}

/// Slope magnitude (rise over run) of an elevation grid whose cells
/// are `row_spacing` x `col_spacing` meters.
pub fn slope(elevation: &Grid<f64>, row_spacing: f64, col_spacing: f64) -> Grid<f64> {
    let (d_row, d_col) = gradient(elevation, row_spacing, col_spacing);
    d_row.map_cells(|cell, dr| dr.hypot(d_col[cell]))
}
