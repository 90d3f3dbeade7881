//! Neighborhood windows for focal operations

use crate::error::{Error, Result};

/// Shape of a focal window, sized in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// Square window of given radius: (2r+1) x (2r+1)
    Square(usize),
    /// Circular window of given radius (in cells)
    Circle(usize),
}

impl Neighborhood {
    /// Get the radius of the neighborhood
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Square(r) | Neighborhood::Circle(r) => *r,
        }
    }

    /// Get the size of the neighborhood (width and height)
    pub fn size(&self) -> usize {
        self.radius() * 2 + 1
    }

    /// Check if a relative position is within this neighborhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        match self {
            Neighborhood::Square(r) => {
                let r = *r as isize;
                dr.abs() <= r && dc.abs() <= r
            }
            Neighborhood::Circle(r) => {
                let r = *r as isize;
                dr * dr + dc * dc <= r * r
            }
        }
    }

    /// Materialize the neighborhood as a [`Window`]
    pub fn window(&self) -> Window {
        match self {
            Neighborhood::Square(r) => Window::square(*r),
            Neighborhood::Circle(r) => Window::disk(*r as f64),
        }
    }
}

/// A symmetric window expressed as horizontal spans, one per row offset.
///
/// Each span `(dr, half)` covers columns `-half..=half` at row offset `dr`.
/// Circles and squares both decompose this way, which lets focal sums use
/// per-row prefix sums instead of visiting every window cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    extent: usize,
    spans: Vec<(isize, usize)>,
}

impl Window {
    /// Square window of `radius` cells
    pub fn square(radius: usize) -> Self {
        let r = radius as isize;
        Self {
            extent: radius,
            spans: (-r..=r).map(|dr| (dr, radius)).collect(),
        }
    }

    /// Disk of all cells whose center lies within `radius_cells` of the center cell
    pub fn disk(radius_cells: f64) -> Self {
        let r2 = radius_cells * radius_cells;
        let extent = radius_cells.max(0.0).floor() as usize;
        let r = extent as isize;
        let spans = (-r..=r)
            .map(|dr| {
                let rest = r2 - (dr * dr) as f64;
                // Offsets are integers, so compare squared distances exactly
                let mut half = rest.max(0.0).sqrt().floor() as usize;
                while ((half + 1) * (half + 1)) as f64 <= rest {
                    half += 1;
                }
                while half > 0 && (half * half) as f64 > rest {
                    half -= 1;
                }
                (dr, half)
            })
            .collect();
        Self { extent, spans }
    }

    /// Disk of a ground-distance radius on a grid of `cell_size` ground units
    pub fn circle_ground(radius: f64, cell_size: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(Error::invalid_param("radius", radius, "must be positive"));
        }
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(Error::invalid_param("cell_size", cell_size, "must be positive"));
        }
        Ok(Self::disk(radius / cell_size))
    }

    /// Maximum row/column offset from the center
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Row spans `(row_offset, half_width)`
    pub fn spans(&self) -> &[(isize, usize)] {
        &self.spans
    }

    /// Number of cells in the window
    pub fn len(&self) -> usize {
        self.spans.iter().map(|&(_, h)| 2 * h + 1).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// All `(row_offset, col_offset)` pairs, row-major
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        self.spans
            .iter()
            .flat_map(|&(dr, h)| {
                let h = h as isize;
                (-h..=h).map(move |dc| (dr, dc))
            })
            .collect()
    }

    /// Whether the window centered at (row, col) lies entirely inside a rows x cols grid
    pub fn fits(&self, row: usize, col: usize, rows: usize, cols: usize) -> bool {
        row >= self.extent
            && col >= self.extent
            && row + self.extent < rows
            && col + self.extent < cols
    }
}
