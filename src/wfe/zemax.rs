//! Zemax wavefront map listings
//!
//! Text exports of the Zemax "Wavefront Map" analysis, UTF-8 or UTF-16 encoded:
//!
//! ```text
//! Listing of Wavefront Map Data
//!
//! File : C:\...\slicer.zmx
//! Title:
//! Date : 10/06/2016
//!
//! 0.6563 µm at 0.0000, 0.1000 (deg).
//! Peak to valley = 0.0652 waves, RMS = 0.0131 waves.
//! Surface: Image
//! Exit Pupil Diameter: 2.0000E+001 Millimeters
//! Pupil grid size: 64 by 64
//! Center point is: 33, 33
//!
//!  0.00000E+000	 0.00000E+000	...
//! ```
//!
//! The map values are given in waves.

use std::{
    f64::consts::PI,
    fs,
    path::{Path, PathBuf},
};

use nalgebra::DMatrix;
use regex::Regex;

use super::{Result, WfeError, WfeMap};
use crate::wavelength::Wavelength;

const NUMBER: &str = r"[-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?";

/// WFE file header
#[derive(Debug, Clone, PartialEq)]
pub struct WfeHeader {
    /// wavelength value in units of `wave_exp`
    pub wave: f64,
    /// wavelength unit [m]
    pub wave_exp: f64,
    pub wavelength: Wavelength,
    /// map size (columns, rows)
    pub sampling: (usize, usize),
    /// field point coordinates
    pub field: (f64, f64),
}

/// Zemax WFE file
#[derive(Debug)]
pub struct ZemaxWfe {
    path: PathBuf,
    contents: String,
}

fn utf16(bytes: &[u8], little_endian: bool) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| {
            if little_endian {
                u16::from_le_bytes([c[0], c[1]])
            } else {
                u16::from_be_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

fn decode(bytes: Vec<u8>) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        utf16(&bytes[2..], true)
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        utf16(&bytes[2..], false)
    } else if bytes.len() > 1 && bytes[1] == 0 {
        utf16(&bytes, true)
    } else {
        String::from_utf8(bytes)
            .ok()
            .map(|s| s.trim_start_matches('\u{feff}').to_string())
    }
}

impl ZemaxWfe {
    /// Reads and decodes a WFE file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path).map_err(|e| WfeError::Read(e, path.clone()))?;
        let contents = decode(bytes).ok_or_else(|| WfeError::Encoding(path.clone()))?;
        Ok(Self { path, contents })
    }
    /// Parses the wavelength, the field point and the map size
    pub fn header(&self) -> Result<WfeHeader> {
        let re_wave = Regex::new(&format!(
            r"(?m)^\s*({NUMBER})\s*(µm|μm|um|nm|mm|m)\s+at\s+({NUMBER})\s*,\s*({NUMBER})"
        ))?;
        let re_grid = Regex::new(r"(?m)^\s*Pupil grid size:\s*(\d+)\s+by\s+(\d+)")?;

        let missing = |what| WfeError::Header(self.path.clone(), what);
        let capts = re_wave
            .captures(&self.contents)
            .ok_or_else(|| missing("wavelength and field"))?;
        let exponent = match &capts[2] {
            "nm" => -9,
            "mm" => -3,
            "m" => 0,
            _ => -6,
        };
        let wavelength = Wavelength::from_decimal(&capts[1], exponent)
            .map_err(|e| WfeError::Wavelength(e, self.path.clone()))?;
        let number = |s: &str| s.parse::<f64>().map_err(|_| missing("numeric values"));
        let field = (number(&capts[3])?, number(&capts[4])?);
        let wave = number(&capts[1])?;

        let capts = re_grid
            .captures(&self.contents)
            .ok_or_else(|| missing("pupil grid size"))?;
        let size = |s: &str| s.parse::<usize>().map_err(|_| missing("pupil grid size"));
        let sampling = (size(&capts[1])?, size(&capts[2])?);

        Ok(WfeHeader {
            wave,
            wave_exp: 10f64.powi(exponent),
            wavelength,
            sampling,
            field,
        })
    }
    /// Parses the map [waves]
    ///
    /// The map is read from the numeric lines following the pupil grid size
    pub fn data(&self, header: &WfeHeader) -> Result<DMatrix<f64>> {
        let (n_cols, n_rows) = header.sampling;
        let err = || WfeError::Data {
            path: self.path.clone(),
            n_rows,
            n_cols,
        };
        let body = self
            .contents
            .find("Pupil grid size")
            .map(|i| &self.contents[i..])
            .ok_or_else(err)?;
        let rows: Vec<Vec<f64>> = body
            .lines()
            .skip(1)
            .filter_map(|line| {
                let values: std::result::Result<Vec<f64>, _> =
                    line.split_whitespace().map(|x| x.parse::<f64>()).collect();
                values.ok().filter(|values| !values.is_empty())
            })
            .collect();
        if rows.len() != n_rows || rows.iter().any(|row| row.len() != n_cols) {
            return Err(err());
        }
        Ok(DMatrix::from_fn(n_rows, n_cols, |i, j| rows[i][j]))
    }
    /// Loads the map of a WFE file converted to radians
    ///
    /// The map sampling must match the pupil sampling, it is checked before the map is parsed
    pub fn load<P: AsRef<Path>>(path: P, pupil_sampling: usize) -> Result<WfeMap> {
        let wfe = Self::open(path)?;
        let header = wfe.header()?;
        if header.sampling.0 != pupil_sampling || header.sampling.1 != pupil_sampling {
            return Err(WfeError::Sampling {
                path: wfe.path.clone(),
                wfe: header.sampling.0,
                pupil: pupil_sampling,
            });
        }
        let data = wfe.data(&header)? * (2. * PI);
        log::debug!(
            "loaded WFE map {:?}: {} at ({}, {})",
            wfe.path,
            header.wavelength,
            header.field.0,
            header.field.1
        );
        Ok(WfeMap::new(header.wavelength, header.field, data))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{env, io::Write};

    use super::*;

    /// Writes a WFE listing with a tilted map of `sampling x sampling` values
    pub(crate) fn listing(wave: &str, field: (f64, f64), sampling: usize) -> String {
        let mut text = format!(
            "Listing of Wavefront Map Data\n\nFile : slicer.zmx\nTitle: \nDate : 10/06/2016\n\n\n\
             {wave} µm at {:.4}, {:.4} (deg).\n\
             Peak to valley = 0.0652 waves, RMS = 0.0131 waves.\n\
             Surface: Image\nExit Pupil Diameter: 2.0000E+001 Millimeters\n\
             Pupil grid size: {sampling} by {sampling}\nCenter point is: {c}, {c}\n\n",
            field.0,
            field.1,
            c = sampling / 2 + 1
        );
        for i in 0..sampling {
            let row: Vec<_> = (0..sampling)
                .map(|j| format!("{:.8E}", 1e-3 * (i as f64 - j as f64)))
                .collect();
            text.push_str(&format!(" {}\n", row.join("\t ")));
        }
        text
    }

    pub(crate) fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::File::create(&path)
            .unwrap()
            .write_all(contents)
            .unwrap();
        path
    }

    #[test]
    fn parse_utf8() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = env::temp_dir().join("slicer-psf-zemax-utf8");
        let path = write(&dir, "wfe.txt", listing("0.6563", (0., 0.1), 8).as_bytes());
        let wfe = ZemaxWfe::open(&path)?;
        let header = wfe.header()?;
        assert_eq!(header.wavelength, Wavelength::from_meters(656.3e-9)?);
        assert_eq!(header.wave, 0.6563);
        assert_eq!(header.wave_exp, 1e-6);
        assert_eq!(header.sampling, (8, 8));
        assert_eq!(header.field, (0., 0.1));
        let data = wfe.data(&header)?;
        assert_eq!(data.shape(), (8, 8));
        assert!((data[(7, 0)] - 7e-3).abs() < 1e-12);
        let map = ZemaxWfe::load(&path, 8)?;
        assert!((map.data()[(7, 0)] - 7e-3 * 2. * PI).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn parse_utf16() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = env::temp_dir().join("slicer-psf-zemax-utf16");
        let mut bytes = vec![0xFF, 0xFE];
        listing("1.0000", (0., -0.1), 4)
            .encode_utf16()
            .for_each(|u| bytes.extend(u.to_le_bytes()));
        let path = write(&dir, "wfe.txt", &bytes);
        let header = ZemaxWfe::open(&path)?.header()?;
        assert_eq!(header.wavelength, Wavelength::from_meters(1e-6)?);
        assert_eq!(header.field, (0., -0.1));
        Ok(())
    }

    #[test]
    fn sampling_mismatch() {
        let dir = env::temp_dir().join("slicer-psf-zemax-sampling");
        // the map is never parsed: the header is enough
        let header_only = listing("1.0", (0., 0.), 0).replace("0 by 0", "512 by 512");
        let path = write(&dir, "wfe.txt", header_only.as_bytes());
        let err = ZemaxWfe::load(&path, 256).unwrap_err();
        assert!(matches!(
            err,
            WfeError::Sampling {
                wfe: 512,
                pupil: 256,
                ..
            }
        ));
        let message = err.to_string();
        assert!(message.contains("512 != 256"));
    }

    #[test]
    fn not_a_wfe_file() {
        let dir = env::temp_dir().join("slicer-psf-zemax-invalid");
        let path = write(&dir, "notes.txt", b"Listing of nothing\n");
        assert!(matches!(
            ZemaxWfe::open(&path).and_then(|wfe| wfe.header()),
            Err(WfeError::Header(..))
        ));
        let path = write(
            &dir,
            "truncated.txt",
            listing("1.0", (0., 0.), 4).lines().take(16).collect::<Vec<_>>().join("\n").as_bytes(),
        );
        let wfe = ZemaxWfe::open(&path).unwrap();
        let header = wfe.header().unwrap();
        assert!(matches!(wfe.data(&header), Err(WfeError::Data { .. })));
    }
}
