//! Image slicer geometry
//!
//! The field of view is cut into an odd number of contiguous slices of identical width
//! along the image x axis (columns).
//! The center slice is centered on the optical axis.
//! Slice widths and offsets are given in resolution elements (`lambda/D`) at the reference
//! wavelength.

use std::ops::Range;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SlicerError {
    #[error("number of slices should be odd, found {0}")]
    EvenSlices(usize),
    #[error("slice width should be positive, found {0}")]
    Width(f64),
}
type Result<T> = std::result::Result<T, SlicerError>;

/// Slice identity and geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceDescriptor {
    number: usize,
    n_slices: usize,
    width: f64,
    offset: f64,
}
impl SliceDescriptor {
    /// Slice number, from 1 to the number of slices
    pub fn number(&self) -> usize {
        self.number
    }
    pub fn width(&self) -> f64 {
        self.width
    }
    /// Offset of the slice center from the field center
    pub fn offset(&self) -> f64 {
        self.offset
    }
    /// Returns the slice edges `[offset-width/2, offset+width/2]`
    pub fn band(&self) -> (f64, f64) {
        (
            self.offset - 0.5 * self.width,
            self.offset + 0.5 * self.width,
        )
    }
    // left edge of the k-th slice (0 based) in slice width units from the field center
    fn edge(&self, k: usize) -> f64 {
        k as f64 - 0.5 * self.n_slices as f64
    }
    /// Returns the range of columns covered by the slice in an image `size` pixels wide
    ///
    /// The image center is the column `size/2` and there is `pixels_per_unit` pixels per
    /// unit of slice width.
    /// Adjacent slices share their edges: their column ranges are contiguous and disjoint.
    pub fn columns(&self, size: usize, pixels_per_unit: f64) -> Range<usize> {
        let center = (size / 2) as f64;
        let column = |k: usize| {
            (center + self.edge(k) * self.width * pixels_per_unit)
                .round()
                .clamp(0f64, size as f64) as usize
        };
        column(self.number - 1)..column(self.number)
    }
}

/// Image slicer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slicer {
    n_slices: usize,
    width: f64,
}
impl Slicer {
    /// Creates a slicer with an odd number of slices of the given width
    pub fn new(n_slices: usize, width: f64) -> Result<Self> {
        if n_slices % 2 == 0 {
            return Err(SlicerError::EvenSlices(n_slices));
        }
        if !width.is_finite() || width <= 0f64 {
            return Err(SlicerError::Width(width));
        }
        Ok(Self { n_slices, width })
    }
    pub fn n_slices(&self) -> usize {
        self.n_slices
    }
    pub fn width(&self) -> f64 {
        self.width
    }
    /// Number of the slice centered on the optical axis
    pub fn center_slice(&self) -> usize {
        (self.n_slices + 1) / 2
    }
    /// Returns the slices ordered by increasing offset
    pub fn slices(&self) -> Vec<SliceDescriptor> {
        let half = ((self.n_slices - 1) / 2) as f64;
        (1..=self.n_slices)
            .map(|number| SliceDescriptor {
                number,
                n_slices: self.n_slices,
                width: self.width,
                offset: ((number - 1) as f64 - half) * self.width,
            })
            .collect()
    }
}
