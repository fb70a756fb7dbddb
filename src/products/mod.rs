//! Simulation products
//!
//! The [CompositeImage] reassembles the slices of one wavelength and
//! the [Cube] stacks the composite images of the wavelength sweep.

use std::{io, path::PathBuf};

use crate::{resample::ResampleError, wavelength::Wavelength};

pub mod composite;
pub mod cube;
pub use composite::CompositeImage;
pub use cube::Cube;

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("image shape {image:?} does not match {expected:?}")]
    Shape {
        image: (usize, usize),
        expected: (usize, usize),
    },
    #[error("only sliced images can be added to a composite image")]
    Untagged,
    #[error("slice #{0} was already added to the composite image")]
    DuplicateSlice(usize),
    #[error("slice #{slice} is not one of the {n_slices} slices")]
    SliceNumber { slice: usize, n_slices: usize },
    #[error("image at {image} cannot be added to the composite image at {expected}")]
    Wavelength {
        image: Wavelength,
        expected: Wavelength,
    },
    #[error("composite image at {wavelength} is incomplete: {added} of {n_slices} slices")]
    Incomplete {
        wavelength: Wavelength,
        added: usize,
        n_slices: usize,
    },
    #[error("the cube is full ({0} planes)")]
    CubeFull(usize),
    #[error("the cube is incomplete: {len} of {n_waves} planes")]
    CubeIncomplete { len: usize, n_waves: usize },
    #[error("resampling factor should be positive, found {0}")]
    Factor(f64),
    #[error("cropped field of view ({target}\") is larger than the cube field of view ({hfov}\")")]
    Crop { target: f64, hfov: f64 },
    #[error("failed to resample the cube")]
    Resample(#[from] ResampleError),
    #[error("failed to write {1:?}")]
    Write(#[source] io::Error, PathBuf),
    #[error("failed to write the cube wavelengths")]
    Json(#[from] serde_json::Error),
}
type Result<T> = std::result::Result<T, ProductError>;
