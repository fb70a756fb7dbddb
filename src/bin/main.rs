use std::{path::PathBuf, time::Instant};

use slicer_psf::{
    plot::{NoPlot, Plotter},
    Simulation, SimulationConfig,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "slicer-psf", about = "Image slicer PSF simulator")]
struct Opt {
    /// Simulation configuration file
    #[structopt(short = "c", long, default_value = "etc/default.json")]
    config: PathBuf,
    /// Simulation parameters file
    #[structopt(short = "s", long, default_value = "etc/parameters.json")]
    parameters: PathBuf,
    /// Plots the intermediate fields of each wavelength
    #[structopt(short = "p", long)]
    plot: bool,
    /// Writes the cube
    #[structopt(short = "f", long)]
    write: bool,
    /// Cube file name
    #[structopt(long = "fn", default_value = "cube.npy")]
    filename: PathBuf,
    /// Verbose
    #[structopt(short = "v", long)]
    verbose: bool,
    /// Processes the wavelengths in parallel
    #[structopt(long)]
    parallel: bool,
}

fn plotter(plot: bool) -> anyhow::Result<Box<dyn Plotter>> {
    #[cfg(feature = "plot")]
    {
        if plot {
            return Ok(Box::new(slicer_psf::plot::PngPlotter::new("plots", "psf")?));
        }
    }
    #[cfg(not(feature = "plot"))]
    {
        if plot {
            log::warn!("plots are disabled, rebuild with the `plot` feature");
        }
    }
    Ok(Box::new(NoPlot))
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    if opt.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let now = Instant::now();
    log::info!("beginning simulation");
    let config = SimulationConfig::load(&opt.config, &opt.parameters)?;
    let output = config.output;
    let sim = Simulation::new(config)?.show_progress();

    let mut cube = if opt.parallel {
        if opt.plot {
            log::warn!("plots are disabled with parallel processing");
        }
        sim.par_sweep()?
    } else {
        let mut plotter = plotter(opt.plot)?;
        sim.sweep(plotter.as_mut())?
    };

    if opt.write {
        cube.resample_and_crop(output.resampling_factor, output.hfov)?;
        cube.write(&opt.filename)?;
    }
    log::info!(
        "full simulation completed in {:.4}s",
        now.elapsed().as_secs_f64()
    );
    Ok(())
}
