use crate::{
    config::ConfigError, image::ImageError, plot::PlotError, products::ProductError,
    pupil::PupilError, slicer::SlicerError, wfe::WfeError,
};

#[derive(thiserror::Error, Debug)]
pub enum SimulationError {
    #[error("Error in the `config` module")]
    Config(#[from] ConfigError),
    #[error("Error in the `slicer` module")]
    Slicer(#[from] SlicerError),
    #[error("Error in the `pupil` module")]
    Pupil(#[from] PupilError),
    #[error("Error in the `image` module")]
    Image(#[from] ImageError),
    #[error("Error in the `wfe` module")]
    Wfe(#[from] WfeError),
    #[error("Error in the `products` module")]
    Product(#[from] ProductError),
    #[error("Error in the `plot` module")]
    Plot(#[from] PlotError),
}
