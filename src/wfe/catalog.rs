//! WFE file catalog
//!
//! The WFE files of a simulation are either listed explicitly or searched for in a directory.
//! The catalog checks that the files make a complete set before any map is loaded.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

use super::{Result, WfeError, WfeMap, WfeMaps, ZemaxWfe};
use crate::wavelength::Wavelength;

/// A WFE file with its wavelength and field point
#[derive(Debug, Clone, PartialEq)]
pub struct WfeEntry {
    pub path: PathBuf,
    pub wavelength: Wavelength,
    pub field: (f64, f64),
}
impl WfeEntry {
    /// Creates an entry, the field point is read from the file header if it is not given
    pub fn from_record<P: AsRef<Path>>(
        path: P,
        wavelength: Wavelength,
        field: Option<(f64, f64)>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let field = match field {
            Some(field) => field,
            None => ZemaxWfe::open(&path)?.header()?.field,
        };
        Ok(Self {
            path,
            wavelength,
            field,
        })
    }
    fn field_key(&self) -> (u64, u64) {
        // +0.0 merges -0.0 and 0.0
        ((self.field.0 + 0.).to_bits(), (self.field.1 + 0.).to_bits())
    }
}

/// Collection of WFE files
#[derive(Debug, Clone, Default)]
pub struct WfeCatalog {
    entries: Vec<WfeEntry>,
    origin: String,
}
impl WfeCatalog {
    pub fn new(entries: Vec<WfeEntry>) -> Self {
        Self {
            entries,
            origin: "the WFE file list".into(),
        }
    }
    /// Searches `directory` for the WFE files starting with `prefix`
    ///
    /// Backup files (ending with `~`), files that are not WFE files and files at wavelengths
    /// other than `waves` are ignored.
    pub fn search<P: AsRef<Path>>(directory: P, prefix: &str, waves: &[Wavelength]) -> Result<Self> {
        let directory = directory.as_ref();
        log::debug!("searching {:?} for WFE maps ...", directory);
        let pattern = directory.join(format!("{prefix}*"));
        let mut entries = vec![];
        for path in glob::glob(&pattern.to_string_lossy())? {
            let path = path?;
            if !path.is_file()
                || path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map_or(true, |name| name.ends_with('~'))
            {
                continue;
            }
            let header = match ZemaxWfe::open(&path).and_then(|wfe| wfe.header()) {
                Ok(header) => header,
                Err(e) => {
                    log::debug!("{:?} is not a valid WFE map, ignoring: {}", path, e);
                    continue;
                }
            };
            if !waves.contains(&header.wavelength) {
                log::debug!(
                    "{:?}: {} not found in requested list, ignoring",
                    path,
                    header.wavelength
                );
                continue;
            }
            log::debug!(
                "{:?}: {} at ({}, {})",
                path,
                header.wavelength,
                header.field.0,
                header.field.1
            );
            entries.push(WfeEntry {
                path,
                wavelength: header.wavelength,
                field: header.field,
            });
        }
        Ok(Self {
            entries,
            origin: directory.display().to_string(),
        })
    }
    pub fn entries(&self) -> &[WfeEntry] {
        &self.entries
    }
    /// Number of distinct field points
    pub fn n_fields(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.field_key())
            .collect::<HashSet<_>>()
            .len()
    }
    /// Checks that the catalog has maps for every wavelength of `waves`,
    /// the same number of maps per wavelength or per field,
    /// and at least `n_fields` field points
    pub fn validate(&self, waves: &[Wavelength], n_fields: usize) -> Result<()> {
        if self.entries.is_empty() {
            return Err(WfeError::NoMaps(self.origin.clone()));
        }
        let mut per_wave: BTreeMap<Wavelength, usize> = BTreeMap::new();
        let mut per_field: HashMap<(u64, u64), usize> = HashMap::new();
        for entry in &self.entries {
            *per_wave.entry(entry.wavelength).or_default() += 1;
            *per_field.entry(entry.field_key()).or_default() += 1;
        }
        let covered = waves.iter().filter(|w| per_wave.contains_key(w)).count();
        if covered != waves.len() {
            return Err(WfeError::MissingWavelengths {
                found: covered,
                expected: waves.len(),
            });
        }
        if let Some(&extra) = per_wave.keys().find(|w| !waves.contains(w)) {
            return Err(WfeError::UnexpectedWavelength(extra));
        }
        let uniform = |counts: Vec<usize>| counts.windows(2).all(|w| w[0] == w[1]);
        if !uniform(per_wave.into_values().collect())
            || !uniform(per_field.values().copied().collect())
        {
            return Err(WfeError::IncompleteSet);
        }
        if per_field.len() < n_fields {
            return Err(WfeError::InsufficientFields {
                found: per_field.len(),
                required: n_fields,
            });
        }
        Ok(())
    }
    /// Loads the maps [rad]
    ///
    /// The sampling of the maps must match the pupil sampling
    pub fn load(&self, pupil_sampling: usize) -> Result<WfeMaps> {
        self.entries
            .iter()
            .map(|entry| {
                let map = ZemaxWfe::load(&entry.path, pupil_sampling)?;
                if map.wavelength() != entry.wavelength {
                    log::warn!(
                        "{:?} is listed at {} but its header says {}",
                        entry.path,
                        entry.wavelength,
                        map.wavelength()
                    );
                }
                Ok(WfeMap {
                    wavelength: entry.wavelength,
                    field: entry.field,
                    ..map
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(|maps| maps.into_iter().collect())
    }
}
