//! Wavefront error maps
//!
//! Measured or modeled wavefront error maps, one per wavelength and field point,
//! are read from Zemax "Wavefront Map" text listings ([zemax]).
//! The [catalog] collects the files of a simulation, checks that they form a complete set
//! and loads them into [WfeMaps].

use std::{collections::BTreeMap, io, ops::Deref, path::PathBuf};

use nalgebra::DMatrix;

use crate::wavelength::{Wavelength, WavelengthError};

pub mod catalog;
pub mod zemax;
pub use catalog::{WfeCatalog, WfeEntry};
pub use zemax::{WfeHeader, ZemaxWfe};

#[derive(Debug, thiserror::Error)]
pub enum WfeError {
    #[error("failed to read WFE file {1:?}")]
    Read(#[source] io::Error, PathBuf),
    #[error("WFE file {0:?} is neither UTF-8 nor UTF-16 encoded")]
    Encoding(PathBuf),
    #[error("invalid WFE header regex")]
    Regex(#[from] regex::Error),
    #[error("{0:?} is not a valid WFE file: missing {1}")]
    Header(PathBuf, &'static str),
    #[error("invalid wavelength in WFE file {1:?}")]
    Wavelength(#[source] WavelengthError, PathBuf),
    #[error("WFE data in {path:?} is not a {n_rows}x{n_cols} array")]
    Data {
        path: PathBuf,
        n_rows: usize,
        n_cols: usize,
    },
    #[error("Zemax WFE sampling is not the same as the pupil sampling! ({wfe} != {pupil}) in {path:?}")]
    Sampling {
        path: PathBuf,
        wfe: usize,
        pupil: usize,
    },
    #[error("invalid WFE search pattern")]
    Pattern(#[from] glob::PatternError),
    #[error("failed to search WFE files")]
    Glob(#[from] glob::GlobError),
    #[error("No WFE maps found in {0}!")]
    NoMaps(String),
    #[error("WFE maps are not present for all wavelengths! ({found} of {expected})")]
    MissingWavelengths { found: usize, expected: usize },
    #[error("WFE map at {0} does not match any wavelength of the sweep")]
    UnexpectedWavelength(Wavelength),
    #[error("The WFE maps parsed form an incomplete set!")]
    IncompleteSet,
    #[error("Insufficient fields for number of slices! ({found} < {required})")]
    InsufficientFields { found: usize, required: usize },
    #[error("no WFE map for slice #{slice} at {wavelength}")]
    Missing { wavelength: Wavelength, slice: usize },
}
type Result<T> = std::result::Result<T, WfeError>;

/// Wavefront error map [rad]
#[derive(Debug, Clone)]
pub struct WfeMap {
    wavelength: Wavelength,
    field: (f64, f64),
    data: DMatrix<f64>,
}
impl WfeMap {
    /// Creates a map from a square phase array [rad]
    pub fn new(wavelength: Wavelength, field: (f64, f64), data: DMatrix<f64>) -> Self {
        Self {
            wavelength,
            field,
            data,
        }
    }
    pub fn wavelength(&self) -> Wavelength {
        self.wavelength
    }
    /// Field point coordinates
    pub fn field(&self) -> (f64, f64) {
        self.field
    }
    /// Number of samples across the map
    pub fn sampling(&self) -> usize {
        self.data.nrows()
    }
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }
}

/// Wavefront error maps sorted by wavelength then by field point
#[derive(Debug, Default)]
pub struct WfeMaps(BTreeMap<Wavelength, Vec<WfeMap>>);
impl Deref for WfeMaps {
    type Target = BTreeMap<Wavelength, Vec<WfeMap>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl FromIterator<WfeMap> for WfeMaps {
    fn from_iter<T: IntoIterator<Item = WfeMap>>(iter: T) -> Self {
        let mut maps: BTreeMap<Wavelength, Vec<WfeMap>> = BTreeMap::new();
        iter.into_iter()
            .for_each(|map| maps.entry(map.wavelength).or_default().push(map));
        maps.values_mut().for_each(|maps| {
            maps.sort_by(|a, b| {
                a.field
                    .0
                    .total_cmp(&b.field.0)
                    .then(a.field.1.total_cmp(&b.field.1))
            })
        });
        Self(maps)
    }
}
impl WfeMaps {
    /// Returns the map of the given slice (1 based) at the given wavelength
    ///
    /// Slices are matched to the field points in increasing order of field coordinates,
    /// a single field point is shared by all the slices
    pub fn for_slice(&self, wavelength: Wavelength, slice: usize) -> Result<&WfeMap> {
        self.0
            .get(&wavelength)
            .zip(slice.checked_sub(1))
            .and_then(|(maps, i)| match maps.as_slice() {
                [map] => Some(map),
                maps => maps.get(i),
            })
            .ok_or(WfeError::Missing { wavelength, slice })
    }
}
