//! Simulation configuration
//!
//! A simulation is set up from 2 JSON files:
//!  - the simulation configuration (`etc/default.json`)
//!  - the simulation parameters (`etc/parameters.json`)
//!
//! Both files are checked and merged into a [SimulationConfig] before anything is computed.

use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    camera::Camera,
    wavelength::{Wavelength, WavelengthError, WavelengthSweep},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to open {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to parse {1:?}")]
    Json(#[source] serde_json::Error, PathBuf),
    #[error("{name} should be an integer, found {value}")]
    NotAnInteger { name: &'static str, value: f64 },
    #[error("{name} should be positive, found {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("pupil sampling should be a power of two, found {0}")]
    NotPowerOfTwo(usize),
    #[error("number of slices should be odd, found {0}")]
    EvenSlices(usize),
    #[error("resampling wavelength ({resample_to}) should not be longer than the shortest wavelength ({shortest})")]
    ResampleTooLong {
        resample_to: Wavelength,
        shortest: Wavelength,
    },
    #[error("invalid wavelength")]
    Wavelength(#[from] WavelengthError),
    #[error("WFE is enabled but neither WFE_DATA nor WFE_SEARCH is given")]
    NoWfeSource,
    #[error("output half field of view ({hfov}\") should not be larger than the image half field of view ({max}\")")]
    CropTooLarge { hfov: f64, max: f64 },
}
type Result<T> = std::result::Result<T, ConfigError>;

/// Loads a JSON file
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ConfigError::Io(e, path.to_path_buf()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ConfigError::Json(e, path.to_path_buf()))
}

/// 0/1 or false/true
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}
impl From<Flag> for bool {
    fn from(flag: Flag) -> Self {
        match flag {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct General {
    detector_pixel_pitch: f64,
    do_wfe: Flag,
}
#[derive(Debug, Clone, Deserialize)]
struct Output {
    resampling_factor: f64,
    hfov: f64,
}
#[derive(Debug, Clone, Deserialize)]
struct PupilSection {
    pupil_sampling: f64,
    pupil_gamma: f64,
    pupil_reference_wavelength: f64,
    resample_to: f64,
}
#[derive(Debug, Clone, Deserialize)]
struct Slicing {
    width: f64,
}
/// Simulation configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    general: General,
    output: Output,
    pupil: PupilSection,
    slicing: Slicing,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct GeneralParameters {
    wavelength_start: f64,
    wavelength_end: f64,
    wavelength_interval: f64,
    nslices: usize,
    camera_wfno: f64,
    camera_effl: f64,
}
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct WfeData {
    wave: f64,
    path: PathBuf,
    field: Option<(f64, f64)>,
}
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct WfeSearch {
    directory: PathBuf,
    prefix: String,
}
/// Simulation parameters file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ParametersFile {
    general: GeneralParameters,
    wfe_data: Option<Vec<WfeData>>,
    wfe_search: Option<WfeSearch>,
}

/// Pupil sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupilConfig {
    /// number of samples across the pupil
    pub sampling: usize,
    /// oversampling factor
    pub gamma: usize,
    /// wavelength [m] at which the detector pixel pitch samples the PSF at Nyquist
    pub reference_wavelength: f64,
    /// wavelength all the images are resampled to
    pub resample_to: Wavelength,
}
impl PupilConfig {
    /// Size of the pupil and image arrays
    pub fn size(&self) -> usize {
        self.sampling * self.gamma
    }
}
/// Slicer geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicingConfig {
    pub n_slices: usize,
    /// slice width in resolution elements
    pub width: f64,
}
/// Cube resampling and cropping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputConfig {
    pub resampling_factor: f64,
    /// half field of view [arcsec]
    pub hfov: f64,
}
/// WFE map file
#[derive(Debug, Clone, PartialEq)]
pub struct WfeRecord {
    pub wavelength: Wavelength,
    pub path: PathBuf,
    pub field: Option<(f64, f64)>,
}
/// Where to find the WFE maps
#[derive(Debug, Clone, PartialEq)]
pub enum WfeSource {
    Files(Vec<WfeRecord>),
    Search { directory: PathBuf, prefix: String },
}

/// Validated simulation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub pupil: PupilConfig,
    /// detector pixel pitch [m]
    pub detector_pixel_pitch: f64,
    pub slicing: SlicingConfig,
    pub camera: Camera,
    /// wavelength sweep
    pub waves: Vec<Wavelength>,
    /// WFE maps, `None` if WFE is disabled
    pub wfe: Option<WfeSource>,
    pub output: OutputConfig,
}

fn integer(name: &'static str, value: f64) -> Result<usize> {
    if value.fract() != 0f64 || !value.is_finite() || value < 1f64 {
        return Err(ConfigError::NotAnInteger { name, value });
    }
    Ok(value as usize)
}
fn positive(name: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0f64 {
        return Err(ConfigError::NotPositive { name, value });
    }
    Ok(value)
}

impl TryFrom<(ConfigFile, ParametersFile)> for SimulationConfig {
    type Error = ConfigError;

    fn try_from((cfg, params): (ConfigFile, ParametersFile)) -> Result<Self> {
        let sampling = integer("pupil sampling", cfg.pupil.pupil_sampling)?;
        let gamma = integer("pupil gamma", cfg.pupil.pupil_gamma)?;
        if !sampling.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo(sampling));
        }
        if gamma % 2 != 0 {
            log::warn!("pupil gamma ({}) should be even, may produce unexpected results", gamma);
        }
        let n_slices = params.general.nslices;
        if n_slices % 2 == 0 {
            return Err(ConfigError::EvenSlices(n_slices));
        }

        let waves = WavelengthSweep::new(
            params.general.wavelength_start,
            params.general.wavelength_end,
            params.general.wavelength_interval,
        )?
        .wavelengths();
        let resample_to = Wavelength::from_meters(cfg.pupil.resample_to)?;
        if let Some(&shortest) = waves.first() {
            if resample_to > shortest {
                return Err(ConfigError::ResampleTooLong {
                    resample_to,
                    shortest,
                });
            }
        }

        let wfe = if bool::from(cfg.general.do_wfe) {
            match (params.wfe_data, params.wfe_search) {
                (Some(data), _) => Some(WfeSource::Files(
                    data.into_iter()
                        .map(|record| -> Result<WfeRecord> {
                            Ok(WfeRecord {
                                wavelength: Wavelength::from_meters(record.wave)?,
                                path: record.path,
                                field: record.field,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                )),
                (None, Some(search)) => Some(WfeSource::Search {
                    directory: search.directory,
                    prefix: search.prefix,
                }),
                (None, None) => return Err(ConfigError::NoWfeSource),
            }
        } else {
            None
        };

        Ok(Self {
            pupil: PupilConfig {
                sampling,
                gamma,
                reference_wavelength: positive(
                    "pupil reference wavelength",
                    cfg.pupil.pupil_reference_wavelength,
                )?,
                resample_to,
            },
            detector_pixel_pitch: positive(
                "detector pixel pitch",
                cfg.general.detector_pixel_pitch,
            )?,
            slicing: SlicingConfig {
                n_slices,
                width: positive("slice width", cfg.slicing.width)?,
            },
            camera: Camera::new(
                positive("camera f-number", params.general.camera_wfno)?,
                positive("camera focal length", params.general.camera_effl)?,
            ),
            waves,
            wfe,
            output: OutputConfig {
                resampling_factor: positive(
                    "output resampling factor",
                    cfg.output.resampling_factor,
                )?,
                hfov: positive("output half field of view", cfg.output.hfov)?,
            },
        })
    }
}

impl SimulationConfig {
    /// Loads and checks the simulation configuration and parameters files
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(config: P, parameters: Q) -> Result<Self> {
        let cfg: ConfigFile = load(&config)?;
        let params: ParametersFile = load(&parameters)?;
        log::info!(
            "configuration loaded from {:?} and {:?}",
            config.as_ref(),
            parameters.as_ref()
        );
        Self::try_from((cfg, params))
    }
    /// Physical radius [m] of the pupil that samples the PSF at Nyquist on the detector
    /// at the reference wavelength
    pub fn pupil_radius(&self) -> f64 {
        self.camera
            .pupil_radius(self.detector_pixel_pitch, self.pupil.reference_wavelength)
    }
}
