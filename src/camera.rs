//! Spectrograph camera

use crate::RAD2ARCSEC;

/// Camera focal ratio and effective focal length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    f_number: f64,
    focal_length: f64,
}
impl Camera {
    /// Creates a camera from its working f-number and its effective focal length [m]
    pub fn new(f_number: f64, focal_length: f64) -> Self {
        Self {
            f_number,
            focal_length,
        }
    }
    pub fn f_number(&self) -> f64 {
        self.f_number
    }
    /// Effective focal length [m]
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }
    /// Physical radius [m] of the pupil that Nyquist samples the detector at the reference wavelength
    ///
    /// The focal ratio is set such as 2 detector pixels span one `lambda/D` resolution element
    pub fn pupil_radius(&self, pixel_pitch: f64, reference_wavelength: f64) -> f64 {
        let focal_ratio = 2. * pixel_pitch / reference_wavelength;
        0.5 * self.focal_length / focal_ratio
    }
    /// Length [m] on the detector of an angle given in arcsec
    pub fn detector_scale(&self, arcsec: f64) -> f64 {
        self.focal_length * arcsec / RAD2ARCSEC
    }
    /// Diameter [m] of the Airy disk first dark ring on the detector
    pub fn airy_diameter(&self, wavelength: f64) -> f64 {
        2.44 * wavelength * self.f_number
    }
}
