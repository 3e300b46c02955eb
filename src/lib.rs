//! Analysis toolkit for an EEG deception-detection experiment.
//!
//! The pipeline runs as a chain of standalone binaries over shared file
//! formats: `prompt` (stimulus GUI) and `record` (board capture) produce a
//! session, `preprocess` and `epoch` turn it into per-channel trial arrays,
//! and `bandpower` / `slidewin` extract band-power features and plots.
pub mod board;
pub mod epoch;
pub mod error;
pub mod features;
pub mod filters;
pub mod io;
pub mod plot;
pub mod preprocess;
pub mod trial_log;
pub mod welch;

pub use error::PipelineError;
pub use filters::Band;

/// Sampling rate of the acquisition board.
pub const SAMPLE_RATE_HZ: f64 = 250.0;

/// Logger setup shared by the binaries: `-v` raises the level per occurrence.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}
