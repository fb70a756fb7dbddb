use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use nalgebra::DMatrix;
use npyz::WriterBuilder;
use serde::Serialize;

use super::{CompositeImage, ProductError, Result};
use crate::{
    resample::{resample2d, Grid},
    wavelength::Wavelength,
};

/// Spectral cube of the composite images intensity
#[derive(Debug, Clone)]
pub struct Cube {
    planes: Vec<DMatrix<f64>>,
    wavelengths: Vec<Wavelength>,
    n_waves: usize,
    size: usize,
    plate_scale: f64,
}

#[derive(Serialize)]
struct Wavelengths<'a> {
    #[serde(rename = "WAVELENGTHS_NM")]
    nanometers: Vec<f64>,
    #[serde(rename = "PLATE_SCALE_ARCSEC")]
    plate_scale: f64,
    #[serde(rename = "CUBE")]
    cube: &'a str,
}

impl Cube {
    /// Creates an empty cube of `n_waves` planes of `size x size` samples
    pub fn new(n_waves: usize, size: usize, plate_scale: f64) -> Self {
        Self {
            planes: Vec::with_capacity(n_waves),
            wavelengths: Vec::with_capacity(n_waves),
            n_waves,
            size,
            plate_scale,
        }
    }
    /// Appends the intensity of a complete composite image as the next plane
    pub fn add_image(&mut self, image: CompositeImage) -> Result<&mut Self> {
        image.check_complete()?;
        if self.is_full() {
            return Err(ProductError::CubeFull(self.n_waves));
        }
        let intensity = image.intensity();
        if intensity.shape() != (self.size, self.size) {
            return Err(ProductError::Shape {
                image: intensity.shape(),
                expected: (self.size, self.size),
            });
        }
        log::debug!(
            "cube plane #{}: {}",
            self.planes.len() + 1,
            image.wavelength()
        );
        self.planes.push(intensity);
        self.wavelengths.push(image.wavelength());
        Ok(self)
    }
    /// Number of planes
    pub fn len(&self) -> usize {
        self.planes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.planes.len() == self.n_waves
    }
    pub fn n_waves(&self) -> usize {
        self.n_waves
    }
    /// Cube shape `[planes, rows, columns]`
    pub fn shape(&self) -> [usize; 3] {
        [self.planes.len(), self.size, self.size]
    }
    pub fn plane(&self, i: usize) -> Option<&DMatrix<f64>> {
        self.planes.get(i)
    }
    pub fn planes(&self) -> &[DMatrix<f64>] {
        &self.planes
    }
    pub fn wavelengths(&self) -> &[Wavelength] {
        &self.wavelengths
    }
    /// Angular size of a sample [arcsec]
    pub fn plate_scale(&self) -> f64 {
        self.plate_scale
    }
    /// Half field of view [arcsec]
    pub fn hfov(&self) -> f64 {
        0.5 * self.plate_scale * self.size as f64
    }
    /// Resamples every plane by `factor` and crops them to the half field of view `hfov` [arcsec]
    ///
    /// The new plate scale is `factor` times the current plate scale
    pub fn resample_and_crop(&mut self, factor: f64, hfov: f64) -> Result<&mut Self> {
        if !self.is_full() {
            return Err(ProductError::CubeIncomplete {
                len: self.planes.len(),
                n_waves: self.n_waves,
            });
        }
        if !factor.is_finite() || factor <= 0f64 {
            return Err(ProductError::Factor(factor));
        }
        if hfov > self.hfov() {
            return Err(ProductError::Crop {
                target: hfov,
                hfov: self.hfov(),
            });
        }
        let plate_scale = self.plate_scale * factor;
        let input = Grid::symmetric(self.hfov(), self.plate_scale)?;
        let output = Grid::symmetric(hfov, plate_scale)?;
        let planes = self
            .planes
            .iter()
            .map(|plane| resample2d(plane, &input, &output))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        log::info!(
            "cube resampled from {}x{} to {}x{} samples ({:.4e}\"/px)",
            self.size,
            self.size,
            output.len(),
            output.len(),
            plate_scale
        );
        self.planes = planes;
        self.size = output.len();
        self.plate_scale = plate_scale;
        Ok(self)
    }
    /// Writes the cube into a `.npy` file
    ///
    /// The array shape is `[planes, rows, columns]` in C order,
    /// the wavelengths are written next to it in a JSON file with the same stem.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref().with_extension("npy");
        let err = |e| ProductError::Write(e, path.clone());
        let [n, rows, cols] = self.shape();
        let mut file = BufWriter::new(File::create(&path).map_err(err)?);
        let mut writer = npyz::WriteOptions::<f64>::new()
            .default_dtype()
            .shape(&[n as u64, rows as u64, cols as u64])
            .writer(&mut file)
            .begin_nd()
            .map_err(err)?;
        // nalgebra is column major
        writer
            .extend(self.planes.iter().flat_map(|plane| {
                (0..rows).flat_map(move |i| (0..cols).map(move |j| plane[(i, j)]))
            }))
            .map_err(err)?;
        writer.finish().map_err(err)?;

        let json_path = path.with_extension("json");
        let json_file =
            File::create(&json_path).map_err(|e| ProductError::Write(e, json_path.clone()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        serde_json::to_writer_pretty(
            json_file,
            &Wavelengths {
                nanometers: self.wavelengths.iter().map(|w| w.nanometers()).collect(),
                plate_scale: self.plate_scale,
                cube: &name,
            },
        )?;
        log::info!("cube written to {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, error::Error, fs};

    use super::*;
    use crate::{pupil::Pupil, slicer::Slicer};

    fn composite(nm: f64) -> CompositeImage {
        let image = Pupil::circular(16, 4, 0.01)
            .to_conjugate_image(Wavelength::from_meters(nm * 1e-9).unwrap());
        let mut composite = CompositeImage::new(64, image.wavelength(), image.plate_scale(), 3);
        for slice in Slicer::new(3, 1.).unwrap().slices() {
            composite.add_slice(&image.slice_up(&slice)).unwrap();
        }
        composite
    }

    #[test]
    fn planes_follow_insertion_order() -> std::result::Result<(), Box<dyn Error>> {
        let first = composite(1000.);
        let mut cube = Cube::new(2, 64, first.plate_scale());
        cube.add_image(first)?.add_image(composite(1100.))?;
        assert_eq!(cube.shape(), [2, 64, 64]);
        assert_eq!(cube.len(), cube.n_waves());
        assert!(cube.wavelengths()[0] < cube.wavelengths()[1]);
        assert!(cube.plane(1).is_some() && cube.plane(2).is_none());
        assert!(matches!(
            cube.add_image(composite(1200.)),
            Err(ProductError::CubeFull(2))
        ));
        Ok(())
    }

    #[test]
    fn incomplete_composite_is_rejected() {
        let image = composite(1000.);
        let mut partial = CompositeImage::new(64, image.wavelength(), image.plate_scale(), 5);
        let slice = Pupil::circular(16, 4, 0.01)
            .to_conjugate_image(image.wavelength())
            .slice_up(&Slicer::new(5, 1.).unwrap().slices()[0]);
        partial.add_slice(&slice).unwrap();
        let mut cube = Cube::new(1, 64, image.plate_scale());
        assert!(matches!(
            cube.add_image(partial),
            Err(ProductError::Incomplete { .. })
        ));
        let mut small = Cube::new(1, 32, image.plate_scale());
        assert!(matches!(
            small.add_image(image),
            Err(ProductError::Shape { .. })
        ));
    }

    #[test]
    fn crop() -> std::result::Result<(), Box<dyn Error>> {
        let image = composite(1000.);
        let plate_scale = image.plate_scale();
        let mut cube = Cube::new(1, 64, plate_scale);
        assert!(matches!(
            cube.resample_and_crop(1., 1.),
            Err(ProductError::CubeIncomplete { len: 0, n_waves: 1 })
        ));
        cube.add_image(image)?;
        let hfov = cube.hfov();
        assert!(matches!(
            cube.resample_and_crop(0., hfov),
            Err(ProductError::Factor(_))
        ));
        assert!(matches!(
            cube.resample_and_crop(1., 2. * hfov),
            Err(ProductError::Crop { .. })
        ));
        let peak = cube.plane(0).unwrap()[(32, 32)];
        cube.resample_and_crop(2., 0.5 * hfov)?;
        assert_eq!(cube.shape(), [1, 16, 16]);
        assert!((cube.plate_scale() - 2. * plate_scale).abs() < 1e-15);
        assert!((cube.plane(0).unwrap()[(8, 8)] / peak - 1.).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn write() -> std::result::Result<(), Box<dyn Error>> {
        let image = composite(1000.);
        let mut cube = Cube::new(1, 64, image.plate_scale());
        cube.add_image(image)?;
        let dir = env::temp_dir().join("slicer-psf-cube");
        fs::create_dir_all(&dir)?;
        let path = cube.write(dir.join("cube"))?;
        assert_eq!(path.extension().and_then(|x| x.to_str()), Some("npy"));
        let bytes = fs::read(&path)?;
        let npy = npyz::NpyFile::new(&bytes[..])?;
        assert_eq!(npy.shape(), &[1, 64, 64]);
        let data: Vec<f64> = npy.into_vec()?;
        assert_eq!(data[32 * 64 + 31], cube.plane(0).unwrap()[(32, 31)]);
        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(path.with_extension("json"))?)?;
        assert!((json["WAVELENGTHS_NM"][0].as_f64().unwrap() - 1000.).abs() < 1e-9);
        Ok(())
    }
}
