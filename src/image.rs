//! Image plane field
//!
//! The image field is stored with the zero frequency (on-axis field point) at the center
//! of the array, the sample `[size/2, size/2]`.

use nalgebra::DMatrix;
use rustfft::num_complex::Complex64;

use crate::{
    fft::{self, Field},
    pupil::Pupil,
    resample::{resample2d, Grid, ResampleError},
    slicer::SliceDescriptor,
    wavelength::Wavelength,
    RAD2ARCSEC,
};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to resample the image at {0}")]
    Resample(Wavelength, #[source] ResampleError),
}
type Result<T> = std::result::Result<T, ImageError>;

/// Complex field sampled in the image plane
#[derive(Debug, Clone)]
pub struct Image {
    field: Field,
    wavelength: Wavelength,
    plate_scale: f64,
    sampling: usize,
    gamma: usize,
    slice: Option<SliceDescriptor>,
}
impl Image {
    pub(crate) fn new(
        field: Field,
        wavelength: Wavelength,
        plate_scale: f64,
        sampling: usize,
        gamma: usize,
    ) -> Self {
        Self {
            field,
            wavelength,
            plate_scale,
            sampling,
            gamma,
            slice: None,
        }
    }
    pub(crate) fn with_slice(self, slice: Option<SliceDescriptor>) -> Self {
        Self { slice, ..self }
    }
    pub fn field(&self) -> &Field {
        &self.field
    }
    pub fn size(&self) -> usize {
        self.field.nrows()
    }
    pub fn wavelength(&self) -> Wavelength {
        self.wavelength
    }
    /// Angular size of a sample [arcsec]
    pub fn plate_scale(&self) -> f64 {
        self.plate_scale
    }
    /// Half field of view [arcsec]
    pub fn hfov(&self) -> f64 {
        0.5 * self.plate_scale * self.size() as f64
    }
    /// Angular extent `[xmin, xmax, ymin, ymax]` [arcsec]
    pub fn extent(&self) -> [f64; 4] {
        let h = self.hfov();
        [-h, h, -h, h]
    }
    /// Oversampling factor of the conjugated pupil
    pub fn gamma(&self) -> usize {
        self.gamma
    }
    /// Angular size of the `lambda/D` resolution element [arcsec]
    pub fn resolution_element(&self) -> f64 {
        self.plate_scale * self.gamma as f64
    }
    /// Slice this image was cut to, if any
    pub fn slice(&self) -> Option<&SliceDescriptor> {
        self.slice.as_ref()
    }
    pub fn energy(&self) -> f64 {
        fft::energy(&self.field)
    }
    pub fn intensity(&self) -> DMatrix<f64> {
        self.field.map(|x| x.norm_sqr())
    }
    /// Field amplitude, scaled to a maximum of 1 if `normalise` is set
    pub fn amplitude(&self, normalise: bool) -> DMatrix<f64> {
        let amplitude = self.field.map(|x| x.norm());
        match amplitude.max() {
            max if normalise && max > 0f64 => amplitude / max,
            _ => amplitude,
        }
    }
    /// Central part of the amplitude spanning `n` Airy disk diameters
    ///
    /// Returns the cropped amplitude and its half field of view [arcsec]
    pub fn amplitude_scaled_by_airy_diameters(
        &self,
        n: f64,
        normalise: bool,
    ) -> (DMatrix<f64>, f64) {
        let amplitude = self.amplitude(normalise);
        let size = self.size();
        let half_width = 0.5 * n * 2.44 * self.resolution_element();
        let h = ((half_width / self.plate_scale).ceil() as usize).clamp(1, size / 2);
        let c = size / 2;
        let crop = amplitude.view((c - h, c - h), (2 * h, 2 * h)).into_owned();
        (crop, h as f64 * self.plate_scale)
    }
    /// Inverse Fraunhofer propagation to the pupil plane
    ///
    /// The pupil sample size is set such as propagating the pupil back to the image plane
    /// at the same wavelength gives the plate scale of this image
    pub fn to_conjugate_pupil(&self) -> Pupil {
        let field = fft::ifft2(&fft::ifftshift(&self.field));
        let pitch =
            self.wavelength.meters() / (self.size() as f64 * self.plate_scale / RAD2ARCSEC);
        Pupil::from_parts(field, self.sampling, self.gamma, pitch, self.slice)
    }
    /// Resamples the image to the `plate_scale` and half field of view `hfov` [arcsec]
    ///
    /// The real and imaginary parts are interpolated independently with bicubic splines,
    /// samples outside the field of view of this image are set to 0.
    pub fn resample(&self, plate_scale: f64, hfov: f64) -> Result<Self> {
        let err = |e| ImageError::Resample(self.wavelength, e);
        let input = Grid::symmetric(self.hfov(), self.plate_scale).map_err(err)?;
        let output = Grid::symmetric(hfov, plate_scale).map_err(err)?;
        let re = resample2d(&self.field.map(|x| x.re), &input, &output).map_err(err)?;
        let im = resample2d(&self.field.map(|x| x.im), &input, &output).map_err(err)?;
        log::debug!(
            "resampled image at {}: {:.4e}\"/px -> {:.4e}\"/px, {}px -> {}px",
            self.wavelength,
            self.plate_scale,
            plate_scale,
            input.len(),
            output.len()
        );
        Ok(Self {
            field: re.zip_map(&im, Complex64::new),
            plate_scale,
            slice: self.slice,
            ..*self
        })
    }
    /// Cuts the image to the slice
    ///
    /// The columns outside the slice band are set to 0,
    /// the slice width spans `gamma` pixels per unit width.
    pub fn slice_up(&self, slice: &SliceDescriptor) -> Self {
        let columns = slice.columns(self.size(), self.gamma as f64);
        let mut field = self.field.clone();
        (0..self.size())
            .filter(|j| !columns.contains(j))
            .for_each(|j| field.column_mut(j).fill(Complex64::default()));
        log::debug!(
            "slice #{} at {}: offset {:+.3}, columns {:?}",
            slice.number(),
            self.wavelength,
            slice.offset(),
            columns
        );
        Self {
            field,
            slice: Some(*slice),
            ..*self
        }
    }
}
