//! Fixed point wavelength
//!
//! Wavelengths are stored as an integer number of femtometres so that the
//! wavelengths of the sweep and the wavelengths read from the WFE files
//! compare exactly.
//! Conversion to floating point only happens when a wavelength enters the
//! propagation ([Wavelength::meters]).

use std::fmt;

/// Number of femtometres in a metre
const FM_PER_M: f64 = 1e15;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WavelengthError {
    #[error("wavelength {0}m is not a positive finite number")]
    Invalid(f64),
    #[error(r#"failed to parse "{0}" as a decimal number"#)]
    Decimal(String),
    #[error("wavelength interval must be positive, found {0}")]
    Interval(f64),
    #[error("wavelength sweep is empty: start {start} is after end {end}")]
    EmptySweep { start: Wavelength, end: Wavelength },
}
type Result<T> = std::result::Result<T, WavelengthError>;

/// Wavelength in femtometres
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Wavelength(u64);
impl Wavelength {
    /// Creates a wavelength from a value in metres, rounded to the nearest femtometre
    pub fn from_meters(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0f64 {
            return Err(WavelengthError::Invalid(value));
        }
        Ok(Self((value * FM_PER_M).round() as u64))
    }
    /// Creates a wavelength from a decimal string scaled by `10^exponent` metres
    ///
    /// The conversion is exact as long as the value resolves to a whole number of femtometres,
    /// e.g. `Wavelength::from_decimal("0.6563", -6)` is 656.3nm
    pub fn from_decimal(value: &str, exponent: i32) -> Result<Self> {
        let err = || WavelengthError::Decimal(value.to_string());
        let value = value.trim();
        let (mantissa, exponent) = match value.split_once(['e', 'E']) {
            Some((mantissa, e)) => (mantissa, exponent + e.parse::<i32>().map_err(|_| err())?),
            None => (value, exponent),
        };
        let mantissa = mantissa.strip_prefix('+').unwrap_or(mantissa);
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if integer.is_empty() && fraction.is_empty()
            || !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        let digits: u64 = format!("{integer}{fraction}")
            .parse()
            .map_err(|_| err())?;
        let scale = 15 + exponent - fraction.len() as i32;
        let fm = if scale >= 0 {
            10u64
                .checked_pow(scale as u32)
                .and_then(|p| digits.checked_mul(p))
                .ok_or_else(err)?
        } else {
            let p = 10u64.checked_pow((-scale) as u32).ok_or_else(err)?;
            (digits + p / 2) / p
        };
        if fm == 0 {
            return Err(err());
        }
        Ok(Self(fm))
    }
    /// Returns the wavelength in metres
    pub fn meters(&self) -> f64 {
        self.0 as f64 / FM_PER_M
    }
    /// Returns the wavelength in nanometres
    pub fn nanometers(&self) -> f64 {
        self.0 as f64 * 1e-6
    }
    /// Returns the wavelength in femtometres
    pub fn femtometers(&self) -> u64 {
        self.0
    }
}
impl fmt::Display for Wavelength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}nm", self.nanometers())
    }
}

/// Wavelength sweep from `start` to `end` inclusive, every `interval`
#[derive(Debug, Clone, Copy)]
pub struct WavelengthSweep {
    start: Wavelength,
    end: Wavelength,
    interval: Wavelength,
}
impl WavelengthSweep {
    /// Creates a sweep from values in metres
    pub fn new(start: f64, end: f64, interval: f64) -> Result<Self> {
        if !interval.is_finite() || interval <= 0f64 {
            return Err(WavelengthError::Interval(interval));
        }
        let (start, end) = (Wavelength::from_meters(start)?, Wavelength::from_meters(end)?);
        if start > end {
            return Err(WavelengthError::EmptySweep { start, end });
        }
        Ok(Self {
            start,
            end,
            interval: Wavelength::from_meters(interval)?,
        })
    }
    /// Returns the wavelengths of the sweep in ascending order
    pub fn wavelengths(&self) -> Vec<Wavelength> {
        (self.start.0..=self.end.0)
            .step_by(self.interval.0 as usize)
            .map(Wavelength)
            .collect()
    }
}
