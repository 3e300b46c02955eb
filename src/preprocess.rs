//! Raw-session preprocessing: behavior binarization and channel differencing.

use ndarray::{s, Array1, Array2, ArrayView1};

use crate::error::PipelineError;
use crate::io::CHANNEL_COUNT;

/// Photo-sensor level at or above which the behavioral state reads 1.
pub const PHOTO_THRESHOLD: f64 = 275.0;
/// Row of the auxiliary array that carries the photo sensor.
pub const PHOTO_ROW: usize = 1;

/// One session after preprocessing: eight differenced channels plus the
/// binarized behavioral state, all aligned to sample index.
pub struct PreprocessedSession {
    pub channels: Vec<Array1<f64>>,
    pub behavior: Array1<f64>,
}

/// Maps the photo sensor into the binary behavioral state
/// (0 = speaking, 1 = thinking).
pub fn binarize_photo(photo: ArrayView1<f64>) -> Array1<f64> {
    photo.mapv(|v| if v >= PHOTO_THRESHOLD { 1.0 } else { 0.0 })
}

/// Drops the (invalid) first sample and first-differences the remainder,
/// so a channel of raw length L comes out at L - 2.
pub fn first_difference(channel: ArrayView1<f64>) -> Array1<f64> {
    let trimmed = channel.slice(s![1..]);
    let n = trimmed.len().saturating_sub(1);
    Array1::from_shape_fn(n, |i| trimmed[i + 1] - trimmed[i])
}

pub fn preprocess_session(
    raw_eeg: &Array2<f64>,
    aux: &Array2<f64>,
) -> Result<PreprocessedSession, PipelineError> {
    if raw_eeg.nrows() < CHANNEL_COUNT {
        return Err(PipelineError::BadShape {
            expected: format!("at least {CHANNEL_COUNT} EEG rows"),
            actual: format!("{} rows", raw_eeg.nrows()),
        });
    }
    if aux.nrows() <= PHOTO_ROW {
        return Err(PipelineError::BadShape {
            expected: format!("auxiliary array with a photo sensor in row {PHOTO_ROW}"),
            actual: format!("{} rows", aux.nrows()),
        });
    }

    let channels = (0..CHANNEL_COUNT)
        .map(|i| first_difference(raw_eeg.row(i)))
        .collect();
    let behavior = binarize_photo(aux.row(PHOTO_ROW));
    Ok(PreprocessedSession { channels, behavior })
}

/// Total recording time as whole minutes and leftover seconds.
pub fn recording_time(raw_eeg: &Array2<f64>, sample_rate_hz: f64) -> (u64, u64) {
    let seconds = raw_eeg.ncols() as f64 / sample_rate_hz;
    let minutes = (seconds / 60.0) as u64;
    (minutes, (seconds % 60.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn each_channel_loses_two_samples() {
        let len = 100;
        let raw = Array2::from_shape_fn((CHANNEL_COUNT, len), |(c, s)| (c * s) as f64);
        let aux = Array2::from_shape_fn((3, len), |_| 300.0);
        let session = preprocess_session(&raw, &aux).unwrap();
        assert_eq!(session.channels.len(), CHANNEL_COUNT);
        for chan in &session.channels {
            assert_eq!(chan.len(), len - 2);
        }
    }

    #[test]
    fn differencing_matches_by_hand() {
        let channel = array![99.0, 1.0, 4.0, 9.0, 16.0];
        let diffed = first_difference(channel.view());
        assert_eq!(diffed, array![3.0, 5.0, 7.0]);
    }

    #[test]
    fn binarization_threshold_is_inclusive() {
        let photo = array![0.0, 274.999, 275.0, 275.001, 1000.0];
        let state = binarize_photo(photo.view());
        assert_eq!(state, array![0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn short_eeg_array_is_rejected() {
        let raw = Array2::zeros((3, 10));
        let aux = Array2::zeros((3, 10));
        assert!(preprocess_session(&raw, &aux).is_err());
    }

    #[test]
    fn recording_time_splits_minutes_and_seconds() {
        let raw = Array2::zeros((CHANNEL_COUNT, 250 * 90));
        assert_eq!(recording_time(&raw, 250.0), (1, 30));
    }
}
