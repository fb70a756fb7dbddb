use nalgebra::DMatrix;

use super::{ProductError, Result};
use crate::{fft::Field, image::Image, wavelength::Wavelength};

/// Coherent sum of the slices of one wavelength
#[derive(Debug, Clone)]
pub struct CompositeImage {
    field: Field,
    wavelength: Wavelength,
    plate_scale: f64,
    n_slices: usize,
    slices: Vec<usize>,
}
impl CompositeImage {
    /// Creates an empty `size x size` composite image expecting `n_slices` slices
    pub fn new(size: usize, wavelength: Wavelength, plate_scale: f64, n_slices: usize) -> Self {
        Self {
            field: Field::zeros(size, size),
            wavelength,
            plate_scale,
            n_slices,
            slices: Vec::with_capacity(n_slices),
        }
    }
    /// Adds the field of a slice image to the composite field
    pub fn add_slice(&mut self, image: &Image) -> Result<&mut Self> {
        if image.field().shape() != self.field.shape() {
            return Err(ProductError::Shape {
                image: image.field().shape(),
                expected: self.field.shape(),
            });
        }
        if image.wavelength() != self.wavelength {
            return Err(ProductError::Wavelength {
                image: image.wavelength(),
                expected: self.wavelength,
            });
        }
        let number = image.slice().ok_or(ProductError::Untagged)?.number();
        if number == 0 || number > self.n_slices {
            return Err(ProductError::SliceNumber {
                slice: number,
                n_slices: self.n_slices,
            });
        }
        if self.slices.contains(&number) {
            return Err(ProductError::DuplicateSlice(number));
        }
        self.field += image.field();
        self.slices.push(number);
        log::debug!(
            "added slice #{} to composite image at {} ({}/{})",
            number,
            self.wavelength,
            self.slices.len(),
            self.n_slices
        );
        Ok(self)
    }
    /// Returns true once all the slices have been added
    pub fn is_complete(&self) -> bool {
        self.slices.len() == self.n_slices
    }
    pub fn field(&self) -> &Field {
        &self.field
    }
    pub fn intensity(&self) -> DMatrix<f64> {
        self.field.map(|x| x.norm_sqr())
    }
    pub fn wavelength(&self) -> Wavelength {
        self.wavelength
    }
    pub fn plate_scale(&self) -> f64 {
        self.plate_scale
    }
    pub fn n_slices(&self) -> usize {
        self.n_slices
    }
    /// Numbers of the slices added so far, in the order they were added
    pub fn slices(&self) -> &[usize] {
        &self.slices
    }
    pub(crate) fn check_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(ProductError::Incomplete {
                wavelength: self.wavelength,
                added: self.slices.len(),
                n_slices: self.n_slices,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pupil::Pupil, slicer::Slicer};

    fn sliced(nm: f64) -> (Image, Vec<Image>) {
        let image = Pupil::circular(16, 4, 0.01)
            .to_conjugate_image(Wavelength::from_meters(nm * 1e-9).unwrap());
        let slices = Slicer::new(5, 1.)
            .unwrap()
            .slices()
            .iter()
            .map(|s| image.slice_up(s))
            .collect();
        (image, slices)
    }

    #[test]
    fn commutativity() {
        let (image, slices) = sliced(1000.);
        let mut forward = CompositeImage::new(64, image.wavelength(), image.plate_scale(), 5);
        slices
            .iter()
            .try_for_each(|s| forward.add_slice(s).map(|_| ()))
            .unwrap();
        let mut backward = CompositeImage::new(64, image.wavelength(), image.plate_scale(), 5);
        for i in [3, 0, 4, 2, 1] {
            backward.add_slice(&slices[i]).unwrap();
        }
        assert!(forward.is_complete() && backward.is_complete());
        assert_eq!(forward.slices(), &[1, 2, 3, 4, 5]);
        assert_eq!(backward.slices(), &[4, 1, 5, 3, 2]);
        assert!((forward.field() - backward.field())
            .iter()
            .all(|x| x.norm() < 1e-15));
        // the slices are disjoint: the composite field is the image field over the slices
        let columns = 22..42;
        for j in 0..64 {
            let expected = if columns.contains(&j) {
                image.field().column(j).into_owned()
            } else {
                nalgebra::DVector::zeros(64)
            };
            assert!((forward.field().column(j) - expected)
                .iter()
                .all(|x| x.norm() < 1e-15));
        }
    }

    #[test]
    fn errors() {
        let (image, slices) = sliced(1000.);
        let mut composite = CompositeImage::new(64, image.wavelength(), image.plate_scale(), 3);
        assert!(matches!(
            composite.add_slice(&image),
            Err(ProductError::Untagged)
        ));
        composite.add_slice(&slices[0]).unwrap();
        assert!(matches!(
            composite.add_slice(&slices[0]),
            Err(ProductError::DuplicateSlice(1))
        ));
        assert!(matches!(
            composite.add_slice(&slices[4]),
            Err(ProductError::SliceNumber {
                slice: 5,
                n_slices: 3
            })
        ));
        let (_, other) = sliced(1100.);
        assert!(matches!(
            composite.add_slice(&other[1]),
            Err(ProductError::Wavelength { .. })
        ));
        let mut small = CompositeImage::new(32, image.wavelength(), image.plate_scale(), 5);
        assert!(matches!(
            small.add_slice(&slices[0]),
            Err(ProductError::Shape { .. })
        ));
        assert!(!composite.is_complete());
        assert!(matches!(
            composite.check_complete(),
            Err(ProductError::Incomplete { added: 1, .. })
        ));
    }
}
