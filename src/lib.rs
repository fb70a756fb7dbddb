/*!
# Image slicer PSF simulator

This library computes the point spread function (PSF) of an integral field spectrograph
image slicer.

For each wavelength of a sweep, a circular pupil is propagated to the image plane,
resampled to a common plate scale, cut into an odd number of slices, each slice
is propagated back to the pupil where a wavefront error (WFE) map may be added,
and the slices are recombined coherently into a composite image.
The composite images are stacked into a spectral cube.

## Key Components

- [`Pupil`] and [`Image`] - complex fields in conjugated planes
- [`Slicer`] - slicer geometry
- [`WfeMaps`] - wavefront error maps read from Zemax listings
- [`CompositeImage`] and [`Cube`] - simulation products
- [`Simulation`] - the wavelength sweep

## Usage

```rust,no_run
use slicer_psf::{plot::NoPlot, Simulation, SimulationConfig};

let config = SimulationConfig::load("etc/default.json", "etc/parameters.json")?;
let cube = Simulation::new(config)?.show_progress().sweep(&mut NoPlot)?;
cube.write("cube.npy")?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

/// Radians to arcseconds
pub const RAD2ARCSEC: f64 = 206264.80624709636;

pub mod camera;
pub mod config;
mod error;
pub mod fft;
pub mod image;
pub mod plot;
pub mod products;
pub mod pupil;
pub mod resample;
pub mod sim;
pub mod slicer;
pub mod wavelength;
pub mod wfe;

pub use camera::Camera;
pub use config::SimulationConfig;
pub use error::SimulationError;
pub use image::Image;
pub use products::{CompositeImage, Cube};
pub use pupil::Pupil;
pub use sim::Simulation;
pub use slicer::{SliceDescriptor, Slicer};
pub use wavelength::{Wavelength, WavelengthSweep};
pub use wfe::{WfeMap, WfeMaps};
