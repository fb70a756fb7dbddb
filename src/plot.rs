//! Visualization sink
//!
//! The simulation reports the intermediate fields of each wavelength to a [Plotter].
//! [NoPlot] discards them, [PngPlotter] (feature `plot`) renders them as heat maps in a PNG file.

use std::{io, path::PathBuf};

use nalgebra::DMatrix;

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("failed to draw {1:?}: {0}")]
    Draw(String, PathBuf),
    #[error("failed to create the plot directory {1:?}")]
    Io(#[source] io::Error, PathBuf),
}

/// Visualization sink
pub trait Plotter {
    /// Adds a heat map panel of `data` spanning `extent` `[xmin, xmax, ymin, ymax]`
    fn add_image(&mut self, title: &str, data: &DMatrix<f64>, extent: [f64; 4], unit: &str);
    /// Overlays vertical lines at `x` on the last panel
    fn add_vertical_lines(&mut self, _x: &[f64]) {}
    /// Renders the panels added since the last call
    fn draw(&mut self) -> Result<(), PlotError>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlot;
impl Plotter for NoPlot {
    fn add_image(&mut self, _title: &str, _data: &DMatrix<f64>, _extent: [f64; 4], _unit: &str) {
    }
    fn draw(&mut self) -> Result<(), PlotError> {
        Ok(())
    }
}

#[cfg(feature = "plot")]
pub use png::PngPlotter;

#[cfg(feature = "plot")]
mod png {
    use std::{fs, path::PathBuf};

    use nalgebra::DMatrix;
    use plotters::prelude::*;

    use super::{PlotError, Plotter};

    #[derive(Debug)]
    struct Panel {
        title: String,
        data: DMatrix<f64>,
        extent: [f64; 4],
        unit: String,
        lines: Vec<f64>,
    }

    /// PNG heat maps
    ///
    /// Each call to [Plotter::draw] writes the panels into a new file `<stem>_<n>.png`
    #[derive(Debug)]
    pub struct PngPlotter {
        directory: PathBuf,
        stem: String,
        panel_size: u32,
        panels: Vec<Panel>,
        count: usize,
    }
    impl PngPlotter {
        pub fn new<P: Into<PathBuf>>(directory: P, stem: &str) -> Result<Self, PlotError> {
            let directory = directory.into();
            fs::create_dir_all(&directory).map_err(|e| PlotError::Io(e, directory.clone()))?;
            Ok(Self {
                directory,
                stem: stem.to_string(),
                panel_size: 320,
                panels: vec![],
                count: 0,
            })
        }
        /// Size of a panel in pixels
        pub fn panel_size(self, panel_size: u32) -> Self {
            Self { panel_size, ..self }
        }
    }
    impl Plotter for PngPlotter {
        fn add_image(&mut self, title: &str, data: &DMatrix<f64>, extent: [f64; 4], unit: &str) {
            self.panels.push(Panel {
                title: title.to_string(),
                data: data.clone(),
                extent,
                unit: unit.to_string(),
                lines: vec![],
            });
        }
        fn add_vertical_lines(&mut self, x: &[f64]) {
            if let Some(panel) = self.panels.last_mut() {
                panel.lines.extend_from_slice(x);
            }
        }
        fn draw(&mut self) -> Result<(), PlotError> {
            if self.panels.is_empty() {
                return Ok(());
            }
            self.count += 1;
            let path = self
                .directory
                .join(format!("{}_{:03}.png", self.stem, self.count));
            let err = |e: Box<dyn std::error::Error>| PlotError::Draw(e.to_string(), path.clone());

            let n = self.panels.len();
            let n_cols = (n as f64).sqrt().ceil() as usize;
            let n_rows = (n + n_cols - 1) / n_cols;
            let root = BitMapBackend::new(
                &path,
                (
                    self.panel_size * n_cols as u32,
                    self.panel_size * n_rows as u32,
                ),
            )
            .into_drawing_area();
            root.fill(&WHITE).map_err(|e| err(Box::new(e)))?;
            let areas = root.split_evenly((n_rows, n_cols));
            for (panel, area) in self.panels.iter().zip(areas.iter()) {
                let [xmin, xmax, ymin, ymax] = panel.extent;
                let mut chart = ChartBuilder::on(area)
                    .caption(&panel.title, ("sans-serif", 12))
                    .set_label_area_size(LabelAreaPosition::Left, 40)
                    .set_label_area_size(LabelAreaPosition::Bottom, 30)
                    .margin(5)
                    .build_cartesian_2d(xmin..xmax, ymin..ymax)
                    .map_err(|e| err(Box::new(e)))?;
                chart
                    .configure_mesh()
                    .disable_mesh()
                    .x_desc(&panel.unit)
                    .y_desc(&panel.unit)
                    .label_style(("sans-serif", 10))
                    .draw()
                    .map_err(|e| err(Box::new(e)))?;

                let (n_r, n_c) = panel.data.shape();
                let max = panel.data.max();
                let dx = (xmax - xmin) / n_c as f64;
                let dy = (ymax - ymin) / n_r as f64;
                chart
                    .draw_series((0..n_r).flat_map(move |i| {
                        (0..n_c).map(move |j| {
                            let value = if max > 0f64 {
                                panel.data[(i, j)] / max
                            } else {
                                0f64
                            };
                            let color = colorous::CUBEHELIX.eval_continuous(value.clamp(0., 1.));
                            let x = xmin + j as f64 * dx;
                            let y = ymin + i as f64 * dy;
                            Rectangle::new(
                                [(x, y), (x + dx, y + dy)],
                                RGBColor(color.r, color.g, color.b).filled(),
                            )
                        })
                    }))
                    .map_err(|e| err(Box::new(e)))?;
                for &x in &panel.lines {
                    chart
                        .draw_series(LineSeries::new(vec![(x, ymin), (x, ymax)], &WHITE))
                        .map_err(|e| err(Box::new(e)))?;
                }
            }
            root.present().map_err(|e| err(Box::new(e)))?;
            log::info!("plots written to {:?}", path);
            self.panels.clear();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_plot() {
        let mut plotter = NoPlot;
        plotter.add_image("psf", &DMatrix::zeros(4, 4), [-1., 1., -1., 1.], "arcsec");
        plotter.add_vertical_lines(&[0.]);
        assert!(plotter.draw().is_ok());
    }

    #[cfg(feature = "plot")]
    #[test]
    fn png() -> Result<(), Box<dyn std::error::Error>> {
        let dir = std::env::temp_dir().join("slicer-psf-plot");
        let mut plotter = PngPlotter::new(&dir, "psf")?.panel_size(120);
        let data = DMatrix::from_fn(8, 8, |i, j| (i * j) as f64);
        plotter.add_image("psf", &data, [-1., 1., -1., 1.], "arcsec");
        plotter.add_vertical_lines(&[-0.5, 0.5]);
        plotter.add_image("pupil", &data, [-0.1, 0.1, -0.1, 0.1], "m");
        plotter.draw()?;
        assert!(dir.join("psf_001.png").is_file());
        Ok(())
    }
}
