//! Pupil plane field
//!
//! The pupil field is stored in FFT order: the pupil center is the sample `[0,0]`.

use nalgebra::DMatrix;
use rustfft::num_complex::Complex64;

use crate::{
    fft::{self, Field},
    image::Image,
    slicer::SliceDescriptor,
    wavelength::Wavelength,
    wfe::WfeMap,
    RAD2ARCSEC,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PupilError {
    #[error("WFE map sampling is not the same as the pupil sampling! ({wfe} != {pupil})")]
    Sampling { wfe: usize, pupil: usize },
    #[error("phase map shape {phase:?} does not match the pupil shape {pupil:?}")]
    Shape {
        phase: (usize, usize),
        pupil: (usize, usize),
    },
}
type Result<T> = std::result::Result<T, PupilError>;

/// Complex field sampled in the pupil plane
#[derive(Debug, Clone)]
pub struct Pupil {
    field: Field,
    sampling: usize,
    gamma: usize,
    pitch: f64,
    slice: Option<SliceDescriptor>,
}
impl Pupil {
    /// Circular aperture of the given physical `radius` [m]
    ///
    /// The aperture diameter spans `sampling` samples and is zero padded by the
    /// oversampling factor `gamma`: the pupil array is `sampling x gamma` wide.
    pub fn circular(sampling: usize, gamma: usize, radius: f64) -> Self {
        let size = sampling * gamma;
        let center = (size / 2) as f64;
        let r = 0.5 * sampling as f64;
        let aperture = Field::from_fn(size, size, |i, j| {
            if (j as f64 - center).hypot(i as f64 - center) < r {
                Complex64::new(1., 0.)
            } else {
                Complex64::default()
            }
        });
        log::debug!(
            "circular pupil: {}x{} samples, radius {:.3e}m",
            size,
            size,
            radius
        );
        Self {
            field: fft::ifftshift(&aperture),
            sampling,
            gamma,
            pitch: 2. * radius / sampling as f64,
            slice: None,
        }
    }
    pub(crate) fn from_parts(
        field: Field,
        sampling: usize,
        gamma: usize,
        pitch: f64,
        slice: Option<SliceDescriptor>,
    ) -> Self {
        Self {
            field,
            sampling,
            gamma,
            pitch,
            slice,
        }
    }
    pub fn field(&self) -> &Field {
        &self.field
    }
    /// Size of the pupil array
    pub fn size(&self) -> usize {
        self.field.nrows()
    }
    /// Number of samples across the aperture
    pub fn sampling(&self) -> usize {
        self.sampling
    }
    /// Oversampling factor
    pub fn gamma(&self) -> usize {
        self.gamma
    }
    /// Physical size [m] of a pupil sample
    pub fn pitch(&self) -> f64 {
        self.pitch
    }
    /// Slice of the image plane field this pupil was propagated from, if any
    pub fn slice(&self) -> Option<&SliceDescriptor> {
        self.slice.as_ref()
    }
    /// Physical diameter [m] of the aperture
    pub fn diameter(&self) -> f64 {
        self.sampling as f64 * self.pitch
    }
    /// Physical extent [m] of the pupil array `[xmin, xmax, ymin, ymax]`
    pub fn extent(&self) -> [f64; 4] {
        let h = 0.5 * self.size() as f64 * self.pitch;
        [-h, h, -h, h]
    }
    /// Total energy of the field
    pub fn energy(&self) -> f64 {
        fft::energy(&self.field)
    }
    /// Field amplitude, centered if `shift` is set, scaled to a maximum of 1 if `normalise` is set
    pub fn amplitude(&self, shift: bool, normalise: bool) -> DMatrix<f64> {
        let amplitude = self.field.map(|x| x.norm());
        let amplitude = if shift {
            fft::fftshift(&amplitude)
        } else {
            amplitude
        };
        if normalise {
            let max = amplitude.max();
            if max > 0f64 {
                return amplitude / max;
            }
        }
        amplitude
    }
    /// Adds `phase` [rad] to the phase of the field, the amplitude is unchanged
    ///
    /// `phase` must be in FFT order, like the pupil
    pub fn add_to_phase(mut self, phase: &DMatrix<f64>) -> Result<Self> {
        if phase.shape() != self.field.shape() {
            return Err(PupilError::Shape {
                phase: phase.shape(),
                pupil: self.field.shape(),
            });
        }
        self.field
            .zip_apply(phase, |x, phi| *x *= Complex64::from_polar(1., phi));
        Ok(self)
    }
    /// Adds the wavefront error map to the phase of the field
    ///
    /// The map is padded to the pupil size and moved to FFT order
    pub fn add_wfe(self, wfe: &WfeMap) -> Result<Self> {
        if wfe.sampling() != self.sampling {
            return Err(PupilError::Sampling {
                wfe: wfe.sampling(),
                pupil: self.sampling,
            });
        }
        let phase = fft::ifftshift(&fft::pad_centered(wfe.data(), self.size()));
        self.add_to_phase(&phase)
    }
    /// Fraunhofer propagation to the image plane
    ///
    /// The image plate scale is `wavelength/(size x pitch)` and
    /// the image zero frequency is moved to the center of the array.
    pub fn to_conjugate_image(&self, wavelength: Wavelength) -> Image {
        let field = fft::fftshift(&fft::fft2(&self.field));
        let plate_scale = RAD2ARCSEC * wavelength.meters() / (self.size() as f64 * self.pitch);
        Image::new(field, wavelength, plate_scale, self.sampling, self.gamma)
            .with_slice(self.slice)
    }
}
