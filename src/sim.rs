//! Image slicer PSF simulation
//!
//! For each wavelength of the sweep, the simulation:
//!  1. propagates the circular pupil to the image plane,
//!  2. resamples the image to the plate scale of the reference wavelength,
//!  3. propagates the resampled image back to the pupil and forward again to the image plane,
//!  4. for each slice: masks the image to the slice, propagates it back to the pupil,
//!     adds the WFE of the slice and propagates it forward to the image plane,
//!  5. sums the slice images into a [CompositeImage].
//!
//! The composite images of the sweep are stacked into a [Cube].

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::{
    config::{ConfigError, SimulationConfig, WfeSource},
    error::SimulationError,
    fft,
    image::Image,
    plot::{NoPlot, Plotter},
    products::{CompositeImage, Cube},
    pupil::Pupil,
    slicer::Slicer,
    wavelength::Wavelength,
    wfe::{WfeCatalog, WfeEntry, WfeMaps},
};

type Result<T> = std::result::Result<T, SimulationError>;

/// Number of Airy disk diameters in the PSF plots
const AIRY_DIAMETERS: f64 = 3.;

/// Slicer PSF simulation
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    pupil_radius: f64,
    reference: Image,
    slicer: Slicer,
    wfe: Option<WfeMaps>,
    progress: bool,
}
impl Simulation {
    /// Creates a new simulation
    ///
    /// The WFE maps are found, checked and loaded before any propagation takes place.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let slicer = Slicer::new(config.slicing.n_slices, config.slicing.width)?;
        let wfe = match &config.wfe {
            Some(source) => Some(Self::load_wfe(&config, source)?),
            None => None,
        };
        let pupil_radius = config.pupil_radius();
        log::info!(
            "pupil: {} samples x {}, radius {:.3e}m",
            config.pupil.sampling,
            config.pupil.gamma,
            pupil_radius
        );
        let reference = Pupil::circular(config.pupil.sampling, config.pupil.gamma, pupil_radius)
            .to_conjugate_image(config.pupil.resample_to);
        log::info!(
            "resampling to {}: {:.4e}\"/px, hfov {:.4}\", resolution element {:.4e}\"",
            config.pupil.resample_to,
            reference.plate_scale(),
            reference.hfov(),
            reference.resolution_element()
        );
        if config.output.hfov > reference.hfov() {
            return Err(ConfigError::CropTooLarge {
                hfov: config.output.hfov,
                max: reference.hfov(),
            }
            .into());
        }
        log::debug!(
            "detector: resolution element {:.3e}m, Airy disk diameter {:.3e}m",
            config.camera.detector_scale(reference.resolution_element()),
            config
                .camera
                .airy_diameter(config.pupil.resample_to.meters())
        );
        Ok(Self {
            config,
            pupil_radius,
            reference,
            slicer,
            wfe,
            progress: false,
        })
    }
    fn load_wfe(config: &SimulationConfig, source: &WfeSource) -> Result<WfeMaps> {
        let n_slices = config.slicing.n_slices;
        let (catalog, n_fields) = match source {
            WfeSource::Files(records) => {
                let entries = records
                    .iter()
                    .map(|record| {
                        WfeEntry::from_record(&record.path, record.wavelength, record.field)
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let catalog = WfeCatalog::new(entries);
                // a single field point is shared by all the slices
                let n_fields = if catalog.n_fields() > 1 { n_slices } else { 1 };
                (catalog, n_fields)
            }
            WfeSource::Search { directory, prefix } => (
                WfeCatalog::search(directory, prefix, &config.waves)?,
                n_slices,
            ),
        };
        catalog.validate(&config.waves, n_fields)?;
        let maps = catalog.load(config.pupil.sampling)?;
        log::info!(
            "loaded {} WFE maps for {} wavelengths",
            catalog.entries().len(),
            maps.len()
        );
        Ok(maps)
    }
    /// Shows a progress bar during the wavelength sweep
    pub fn show_progress(self) -> Self {
        Self {
            progress: true,
            ..self
        }
    }
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
    /// Physical pupil radius [m]
    pub fn pupil_radius(&self) -> f64 {
        self.pupil_radius
    }
    /// Image at the resampling wavelength
    pub fn reference(&self) -> &Image {
        &self.reference
    }
    pub fn slicer(&self) -> &Slicer {
        &self.slicer
    }
    /// Computes the composite image at the given wavelength
    pub fn run(&self, wavelength: Wavelength, plotter: &mut dyn Plotter) -> Result<CompositeImage> {
        let sampling = self.config.pupil.sampling;
        let gamma = self.config.pupil.gamma;

        let image =
            Pupil::circular(sampling, gamma, self.pupil_radius).to_conjugate_image(wavelength);
        let (data, hfov) = image.amplitude_scaled_by_airy_diameters(AIRY_DIAMETERS, true);
        plotter.add_image("-> fft to image space", &data, [-hfov, hfov, -hfov, hfov], "arcsec");

        let pupil = image
            .resample(self.reference.plate_scale(), self.reference.hfov())?
            .to_conjugate_pupil();
        let image = pupil.to_conjugate_image(wavelength);
        let (data, hfov) = image.amplitude_scaled_by_airy_diameters(AIRY_DIAMETERS, true);
        plotter.add_image("-> resampled", &data, [-hfov, hfov, -hfov, hfov], "arcsec");
        let edges: Vec<f64> = self
            .slicer
            .slices()
            .iter()
            .flat_map(|slice| {
                let (lo, hi) = slice.band();
                [lo, hi]
            })
            .map(|x| x * image.resolution_element())
            .collect();
        plotter.add_vertical_lines(&edges);

        let mut composite = CompositeImage::new(
            image.size(),
            wavelength,
            image.plate_scale(),
            self.slicer.n_slices(),
        );
        for slice in self.slicer.slices() {
            let number = slice.number();
            let pupil = image.slice_up(&slice).to_conjugate_pupil();
            plotter.add_image(
                &format!("-> take slice {} -> ifft to pupil space", number),
                &pupil.amplitude(true, true),
                pupil.extent(),
                "m",
            );
            let (pupil, prefix) = match &self.wfe {
                Some(maps) => {
                    let wfe = maps.for_slice(wavelength, number)?;
                    plotter.add_image(
                        "wfe (radians)",
                        &fft::pad_centered(wfe.data(), pupil.size()).abs(),
                        pupil.extent(),
                        "m",
                    );
                    let pupil = pupil.add_wfe(wfe)?;
                    log::debug!("added phase error for slice #{}", number);
                    (pupil, "added phase error ")
                }
                None => (pupil, ""),
            };
            let image = pupil.to_conjugate_image(wavelength);
            let (data, hfov) = image.amplitude_scaled_by_airy_diameters(AIRY_DIAMETERS, true);
            plotter.add_image(
                &format!("{}-> fft to image space", prefix),
                &data,
                [-hfov, hfov, -hfov, hfov],
                "arcsec",
            );
            composite.add_slice(&image)?;
        }
        plotter.draw()?;
        Ok(composite)
    }
    fn progress_bar(&self) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.config.waves.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{elapsed_precise}] {bar:40} {pos:>3}/{len:3}")
        {
            pb.set_style(style);
        }
        pb
    }
    fn new_cube(&self) -> Cube {
        Cube::new(
            self.config.waves.len(),
            self.config.pupil.size(),
            self.reference.plate_scale(),
        )
    }
    /// Computes the composite images of the wavelength sweep one after the other
    pub fn sweep(&self, plotter: &mut dyn Plotter) -> Result<Cube> {
        let mut cube = self.new_cube();
        let pb = self.progress_bar();
        for &wavelength in &self.config.waves {
            log::info!("processing for a wavelength of {} ...", wavelength);
            pb.set_message(wavelength.to_string());
            cube.add_image(self.run(wavelength, plotter)?)?;
            pb.inc(1);
        }
        pb.finish();
        Ok(cube)
    }
    /// Computes the composite images of the wavelength sweep in parallel
    ///
    /// The cube planes are in the same order as with [Simulation::sweep]
    pub fn par_sweep(&self) -> Result<Cube> {
        log::info!(
            "processing {} wavelengths on {} threads ...",
            self.config.waves.len(),
            rayon::current_num_threads()
        );
        let composites = self
            .config
            .waves
            .par_iter()
            .progress_with(self.progress_bar())
            .map(|&wavelength| self.run(wavelength, &mut NoPlot))
            .collect::<Result<Vec<_>>>()?;
        let mut cube = self.new_cube();
        for composite in composites {
            cube.add_image(composite)?;
        }
        Ok(cube)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, error::Error, path::PathBuf};

    use nalgebra::DMatrix;

    use super::*;
    use crate::{
        camera::Camera,
        config::{OutputConfig, PupilConfig, SlicingConfig, WfeRecord},
        plot::PlotError,
        wfe::{
            zemax::tests::{listing, write},
            WfeError,
        },
    };

    fn nm(value: f64) -> Wavelength {
        Wavelength::from_meters(value * 1e-9).unwrap()
    }

    fn config(sampling: usize, gamma: usize, n_slices: usize, waves: &[f64]) -> SimulationConfig {
        SimulationConfig {
            pupil: PupilConfig {
                sampling,
                gamma,
                reference_wavelength: 1e-6,
                resample_to: nm(waves[0]),
            },
            detector_pixel_pitch: 1.5e-5,
            slicing: SlicingConfig {
                n_slices,
                width: 1.,
            },
            camera: Camera::new(3., 0.3),
            waves: waves.iter().map(|&w| nm(w)).collect(),
            wfe: None,
            output: OutputConfig {
                resampling_factor: 2.,
                hfov: 1.,
            },
        }
    }

    #[derive(Default)]
    struct Counter {
        panels: Vec<String>,
        shapes: Vec<(usize, usize)>,
        extents: Vec<[f64; 4]>,
        lines: usize,
        draws: usize,
    }
    impl Plotter for Counter {
        fn add_image(&mut self, title: &str, data: &DMatrix<f64>, extent: [f64; 4], _unit: &str) {
            self.panels.push(title.to_string());
            self.shapes.push(data.shape());
            self.extents.push(extent);
        }
        fn add_vertical_lines(&mut self, x: &[f64]) {
            self.lines += x.len();
        }
        fn draw(&mut self) -> std::result::Result<(), PlotError> {
            self.draws += 1;
            Ok(())
        }
    }

    #[test]
    fn end_to_end() -> std::result::Result<(), Box<dyn Error>> {
        let sim = Simulation::new(config(64, 4, 5, &[1000.]))?;
        let wavelength = nm(1000.);
        let mut plotter = Counter::default();
        let composite = sim.run(wavelength, &mut plotter)?;
        assert_eq!(composite.slices().len(), 5);
        assert_eq!(composite.slices(), &[1, 2, 3, 4, 5]);
        assert!(composite.is_complete());
        assert_eq!(composite.field().shape(), (256, 256));
        assert_eq!(plotter.panels.len(), 2 + 2 * 5);
        assert_eq!(plotter.lines, 10);
        assert_eq!(plotter.draws, 1);
        let mut cube = Cube::new(1, 256, sim.reference().plate_scale());
        cube.add_image(composite)?;
        assert_eq!(cube.shape(), [1, 256, 256]);
        Ok(())
    }

    #[test]
    fn sweep() -> std::result::Result<(), Box<dyn Error>> {
        let sim = Simulation::new(config(16, 4, 3, &[1000., 1100., 1200.]))?;
        let cube = sim.sweep(&mut NoPlot)?;
        assert_eq!(cube.shape(), [3, 64, 64]);
        assert_eq!(cube.wavelengths(), &[nm(1000.), nm(1100.), nm(1200.)]);
        assert_eq!(cube.plate_scale(), sim.reference().plate_scale());
        let par_cube = sim.par_sweep()?;
        assert_eq!(par_cube.wavelengths(), cube.wavelengths());
        for (a, b) in cube.planes().iter().zip(par_cube.planes()) {
            assert!((a - b).abs().max() < 1e-12 * a.max());
        }
        Ok(())
    }

    #[test]
    fn composite_is_the_image_over_the_slices() -> std::result::Result<(), Box<dyn Error>> {
        let sim = Simulation::new(config(16, 4, 3, &[1000.]))?;
        let composite = sim.run(nm(1000.), &mut NoPlot)?;
        let intensity = composite.intensity();
        let peak = intensity.max();
        // 3 slices of 4 columns centered on column 32
        for j in 0..64 {
            let column = intensity.column(j).max();
            if (26..38).contains(&j) {
                assert!(column > 0.);
            } else {
                assert!(column < 1e-20 * peak);
            }
        }
        // the central slice covers the PSF core
        assert!((intensity[(32, 32)] - peak).abs() < 1e-9 * peak);
        Ok(())
    }

    #[test]
    fn with_wfe() -> std::result::Result<(), Box<dyn Error>> {
        let dir = env::temp_dir().join("slicer-psf-sim-wfe");
        let path = write(&dir, "wfe.txt", listing("1.0", (0., 0.), 16).as_bytes());
        let mut cfg = config(16, 4, 3, &[1000.]);
        cfg.wfe = Some(WfeSource::Files(vec![WfeRecord {
            wavelength: nm(1000.),
            path,
            field: None,
        }]));
        let sim = Simulation::new(cfg.clone())?;
        let mut plotter = Counter::default();
        let aberrated = sim.run(nm(1000.), &mut plotter)?;
        assert_eq!(plotter.panels.len(), 2 + 3 * 3);
        assert!(plotter.panels.iter().any(|title| title.starts_with("added phase error")));
        // the WFE panel is drawn on the same grid as the preceding pupil panel
        let i = plotter
            .panels
            .iter()
            .position(|title| title == "wfe (radians)")
            .unwrap();
        assert_eq!(plotter.shapes[i], (64, 64));
        assert_eq!(plotter.shapes[i], plotter.shapes[i - 1]);
        assert_eq!(plotter.extents[i], plotter.extents[i - 1]);
        cfg.wfe = None;
        let perfect = Simulation::new(cfg)?.run(nm(1000.), &mut NoPlot)?;
        let peak = perfect.intensity().max();
        assert!((aberrated.intensity() - perfect.intensity()).abs().max() > 1e-6 * peak);
        let energy = |c: &CompositeImage| c.intensity().sum();
        assert!((energy(&aberrated) / energy(&perfect) - 1.).abs() < 0.1);
        Ok(())
    }

    #[test]
    fn wfe_sampling_mismatch_is_fatal() {
        let dir = env::temp_dir().join("slicer-psf-sim-mismatch");
        let header_only = listing("1.0", (0., 0.), 0).replace("0 by 0", "512 by 512");
        let path = write(&dir, "wfe.txt", header_only.as_bytes());
        let mut cfg = config(256, 2, 5, &[1000.]);
        cfg.wfe = Some(WfeSource::Files(vec![WfeRecord {
            wavelength: nm(1000.),
            path,
            field: Some((0., 0.)),
        }]));
        let err = Simulation::new(cfg).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Wfe(WfeError::Sampling {
                wfe: 512,
                pupil: 256,
                ..
            })
        ));
    }

    #[test]
    fn output_crop_is_checked_before_the_sweep() {
        let mut cfg = config(16, 4, 3, &[1000.]);
        cfg.output.hfov = 1e6;
        assert!(matches!(
            Simulation::new(cfg),
            Err(SimulationError::Config(ConfigError::CropTooLarge { hfov, .. })) if hfov == 1e6
        ));
        let mut cfg = config(16, 4, 3, &[1000.]);
        cfg.output.hfov = 10.;
        assert!(Simulation::new(cfg).is_ok());
    }

    #[test]
    fn missing_wfe_maps() {
        let mut cfg = config(16, 4, 3, &[1000.]);
        cfg.wfe = Some(WfeSource::Search {
            directory: PathBuf::from("wfe-maps-that-do-not-exist"),
            prefix: "wfe_".into(),
        });
        assert!(matches!(
            Simulation::new(cfg),
            Err(SimulationError::Wfe(WfeError::NoMaps(..)))
        ));
    }
}
