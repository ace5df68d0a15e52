use crate::{constants::METERS_PER_DEGREE, Cell, RasterError};
use geo::{
    algorithm::HaversineDistance,
    geometry::{Coord, Point, Polygon},
    polygon,
};
use serde::{Deserialize, Serialize};

/// A geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, RasterError> {
        let bounds = Self {
            north,
            south,
            east,
            west,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Returns an error unless every edge is finite, `north > south`
    /// and `east > west`.
    pub fn validate(&self) -> Result<(), RasterError> {
        let Self {
            north,
            south,
            east,
            west,
        } = *self;
        let finite = [north, south, east, west].iter().all(|v| v.is_finite());
        if finite && north > south && east > west {
            Ok(())
        } else {
            Err(RasterError::Bounds {
                north,
                south,
                east,
                west,
            })
        }
    }

    /// Smallest box containing `a` and `b`, grown by `margin_deg` on
    /// every side.
    pub fn around(a: Coord, b: Coord, margin_deg: f64) -> Result<Self, RasterError> {
        Self::new(
            a.y.max(b.y) + margin_deg,
            a.y.min(b.y) - margin_deg,
            a.x.max(b.x) + margin_deg,
            a.x.min(b.x) - margin_deg,
        )
    }

    pub fn center(&self) -> Coord {
        Coord {
            x: (self.east + self.west) / 2.0,
            y: (self.north + self.south) / 2.0,
        }
    }

    /// North-south extent in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// East-west extent in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Returns `true` if `coord` lies inside or on the edge of this
    /// box.
    pub fn contains(&self, coord: Coord) -> bool {
        (self.south..=self.north).contains(&coord.y) && (self.west..=self.east).contains(&coord.x)
    }

    /// Shrinks any side longer than `max_span_deg` down to
    /// `max_span_deg`, keeping the same center.
    #[must_use]
    pub fn limit(self, max_span_deg: f64) -> Self {
        let center = self.center();
        let mut limited = self;
        if self.height() > max_span_deg {
            limited.north = center.y + max_span_deg / 2.0;
            limited.south = center.y - max_span_deg / 2.0;
        }
        if self.width() > max_span_deg {
            limited.east = center.x + max_span_deg / 2.0;
            limited.west = center.x - max_span_deg / 2.0;
        }
        limited
    }
}

/// A 2D affine transform in the usual GDAL/rasterio layout:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    /// North-up transform mapping a `rows` x `cols` raster onto
    /// `bounds`.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_bounds(bounds: &Bounds, rows: usize, cols: usize) -> Self {
        Self {
            a: bounds.width() / cols as f64,
            b: 0.0,
            c: bounds.west,
            d: 0.0,
            e: -bounds.height() / rows as f64,
            f: bounds.north,
        }
    }

    /// Applies the transform to (`u`, `v`).
    pub fn apply(&self, u: f64, v: f64) -> (f64, f64) {
        (
            self.a * u + self.b * v + self.c,
            self.d * u + self.e * v + self.f,
        )
    }

    /// Returns the matrix inverse of this transform.
    pub fn inverse(&self) -> Result<Self, RasterError> {
        let Self { a, b, c, d, e, f } = *self;
        let det = a * e - b * d;
        if det == 0.0 || !det.is_finite() {
            return Err(RasterError::Singular);
        }
        Ok(Self {
            a: e / det,
            b: -b / det,
            c: (b * f - e * c) / det,
            d: -d / det,
            e: a / det,
            f: (d * c - a * f) / det,
        })
    }
}

/// The space an [Affine] maps raster coordinates into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Projection {
    /// x = longitude, y = latitude, in degrees.
    #[default]
    Geographic,
    /// Equirectangular tangent plane in meters east/north of `origin`.
    LocalMeters { origin: Coord },
}

impl Projection {
    pub fn to_geographic(&self, xy: Coord) -> Coord {
        match *self {
            Self::Geographic => xy,
            Self::LocalMeters { origin } => Coord {
                x: origin.x + xy.x / (METERS_PER_DEGREE * origin.y.to_radians().cos()),
                y: origin.y + xy.y / METERS_PER_DEGREE,
            },
        }
    }

    pub fn from_geographic(&self, coord: Coord) -> Coord {
        match *self {
            Self::Geographic => coord,
            Self::LocalMeters { origin } => Coord {
                x: (coord.x - origin.x) * METERS_PER_DEGREE * origin.y.to_radians().cos(),
                y: (coord.y - origin.y) * METERS_PER_DEGREE,
            },
        }
    }
}

/// Maps between grid cells and geographic coordinates for one raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    forward: Affine,
    inverse: Affine,
    projection: Projection,
    rows: usize,
    cols: usize,
}

impl GeoTransform {
    /// Geographic transform covering `bounds` with `rows` x `cols`
    /// cells.
    pub fn from_bounds(bounds: &Bounds, rows: usize, cols: usize) -> Result<Self, RasterError> {
        bounds.validate()?;
        Self::from_affine(
            Affine::from_bounds(bounds, rows, cols),
            Projection::Geographic,
            rows,
            cols,
        )
    }

    pub fn from_affine(
        forward: Affine,
        projection: Projection,
        rows: usize,
        cols: usize,
    ) -> Result<Self, RasterError> {
        if rows == 0 || cols == 0 {
            return Err(RasterError::Empty { rows, cols });
        }
        let inverse = forward.inverse()?;
        Ok(Self {
            forward,
            inverse,
            projection,
            rows,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns (rows, cols).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn affine(&self) -> &Affine {
        &self.forward
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Fractional (row, col) raster position of `coord`.
    pub fn to_raster(&self, coord: Coord) -> (f64, f64) {
        let xy = self.projection.from_geographic(coord);
        let (col, row) = self.inverse.apply(xy.x, xy.y);
        (row, col)
    }

    /// Returns the cell containing `coord`, clamping positions outside
    /// the grid to the nearest edge cell.
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn to_grid(&self, coord: Coord) -> Cell {
        let (row, col) = self.to_raster(coord);
        let clamp = |v: f64, len: usize| v.floor().clamp(0.0, (len - 1) as f64) as usize;
        Cell::new(clamp(row, self.rows), clamp(col, self.cols))
    }

    /// Like [GeoTransform::to_grid], but `None` when `coord` is outside
    /// the grid.
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn try_to_grid(&self, coord: Coord) -> Option<Cell> {
        let (row, col) = self.to_raster(coord);
        let inside = |v: f64, len: usize| (0.0..len as f64).contains(&v);
        (inside(row, self.rows) && inside(col, self.cols))
            .then(|| Cell::new(row.floor() as usize, col.floor() as usize))
    }

    /// Geographic coordinate of `cell`'s center.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_geo(&self, cell: Cell) -> Coord {
        self.to_geo_continuous(cell.row as f64 + 0.5, cell.col as f64 + 0.5)
    }

    /// Geographic coordinate of a fractional raster position, where
    /// (0, 0) is the north-west corner of the grid.
    pub fn to_geo_continuous(&self, row: f64, col: f64) -> Coord {
        let (x, y) = self.forward.apply(col, row);
        self.projection.to_geographic(Coord { x, y })
    }

    /// Geographic footprint of `cell`.
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_polygon(&self, cell: Cell) -> Polygon {
        let (r, c) = (cell.row as f64, cell.col as f64);
        let nw = self.to_geo_continuous(r, c);
        let ne = self.to_geo_continuous(r, c + 1.0);
        let se = self.to_geo_continuous(r + 1.0, c + 1.0);
        let sw = self.to_geo_continuous(r + 1.0, c);
        polygon![nw, ne, se, sw, nw]
    }

    /// Approximate ground size of one cell, (north-south, east-west),
    /// in meters, measured at the center of the grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_size_m(&self) -> (f64, f64) {
        let (r, c) = (self.rows as f64 / 2.0, self.cols as f64 / 2.0);
        let origin = Point::from(self.to_geo_continuous(r, c));
        let down = Point::from(self.to_geo_continuous(r + 1.0, c));
        let right = Point::from(self.to_geo_continuous(r, c + 1.0));
        (
            origin.haversine_distance(&down),
            origin.haversine_distance(&right),
        )
    }

    /// The finer of the two ground resolutions, in meters.
    pub fn resolution_m(&self) -> f64 {
        let (ns, ew) = self.cell_size_m();
        ns.min(ew)
    }
}
