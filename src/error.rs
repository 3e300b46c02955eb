use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read npy array: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),
    #[error("failed to write npy array: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),
    #[error("failed to read npz archive: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),
    #[error("failed to write npz archive: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column {name:?}")]
    MissingColumn { name: String },
    #[error("column {column:?} row {row}: not a number: {value:?}")]
    BadCell {
        column: String,
        row: usize,
        value: String,
    },
    #[error("array shape mismatch: expected {expected}, got {actual}")]
    BadShape { expected: String, actual: String },
    #[error("no trailing session number in file name {path:?}")]
    SessionNumber { path: PathBuf },
    #[error("odd transition count {count}; expected matched on/off pairs")]
    OddTransitionCount { count: usize },
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("board protocol violation: {0}")]
    Board(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PipelineError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PipelineError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(value: image::ImageError) -> Self {
        PipelineError::Plot(value.to_string())
    }
}
