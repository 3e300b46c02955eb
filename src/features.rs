//! Band-power feature extraction for the truthful/deceptive comparison.
//!
//! Variant A splits a whole session by the binarized light sensor and
//! computes one feature row per channel per condition; variant B slides a
//! fixed window over a labeled recording and computes one row per window
//! per channel.

use std::path::Path;

use serde::Serialize;

use crate::error::PipelineError;
use crate::filters::{band_filter, Band};
use crate::io::LabeledRecording;
use crate::welch::{band_power, welch_psd};

/// Welch segment length: two seconds at the board rate.
pub const WELCH_SEGMENT: usize = 500;
/// Default sliding-window geometry (samples).
pub const DEFAULT_WINDOW: usize = 500;
pub const DEFAULT_STEP: usize = 250;
/// Keeps the power ratios finite when alpha power is tiny.
pub const RATIO_GUARD: f64 = 1e-6;

#[derive(Clone, Copy, Debug)]
struct BandPowers {
    theta: f64,
    alpha: f64,
    beta: f64,
}

/// Feature row for the light-sensor split (variant A).
#[derive(Debug, Clone, Serialize)]
pub struct ConditionFeature {
    #[serde(rename = "Channel")]
    pub channel: usize,
    #[serde(rename = "Theta_Power")]
    pub theta_power: f64,
    #[serde(rename = "Alpha_Power")]
    pub alpha_power: f64,
    #[serde(rename = "Beta_Power")]
    pub beta_power: f64,
    #[serde(rename = "Theta/Alpha")]
    pub theta_alpha: f64,
    #[serde(rename = "Beta/Alpha")]
    pub beta_alpha: f64,
    #[serde(rename = "Light_State")]
    pub light_state: u8,
}

/// Feature row for the sliding-window pass (variant B).
#[derive(Debug, Clone, Serialize)]
pub struct WindowFeature {
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "Theta_Power")]
    pub theta_power: f64,
    #[serde(rename = "Alpha_Power")]
    pub alpha_power: f64,
    #[serde(rename = "Beta_Power")]
    pub beta_power: f64,
    #[serde(rename = "Theta/Alpha")]
    pub theta_alpha: f64,
    #[serde(rename = "Beta/Alpha")]
    pub beta_alpha: f64,
    #[serde(rename = "Truth_Value")]
    pub truth_value: f64,
    #[serde(rename = "Start_Time")]
    pub start_time: f64,
}

impl ConditionFeature {
    pub fn power(&self, band: Band) -> f64 {
        match band {
            Band::Theta => self.theta_power,
            Band::Alpha => self.alpha_power,
            Band::Beta => self.beta_power,
        }
    }
}

impl WindowFeature {
    pub fn power(&self, band: Band) -> f64 {
        match band {
            Band::Theta => self.theta_power,
            Band::Alpha => self.alpha_power,
            Band::Beta => self.beta_power,
        }
    }
}

/// Binarizes the light sensor against its own median (strictly above -> 1).
pub fn median_split(photo: &[f64]) -> Vec<u8> {
    let med = median(photo);
    photo.iter().map(|&v| u8::from(v > med)).collect()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn window_powers(
    theta: &[f64],
    alpha: &[f64],
    beta: &[f64],
    sample_rate_hz: f64,
) -> BandPowers {
    let segment = WELCH_SEGMENT.min(theta.len());
    BandPowers {
        theta: band_power(&welch_psd(theta, sample_rate_hz, segment), Band::Theta),
        alpha: band_power(&welch_psd(alpha, sample_rate_hz, segment), Band::Alpha),
        beta: band_power(&welch_psd(beta, sample_rate_hz, segment), Band::Beta),
    }
}

/// Variant A: one feature row per channel per light state.
///
/// Channels and light states must be sample-aligned; a condition with no
/// samples at all produces no rows for that state, mirroring how an
/// all-on or all-off session degrades.
pub fn condition_features(
    channels: &[Vec<f64>],
    light: &[u8],
    sample_rate_hz: f64,
) -> Result<(Vec<ConditionFeature>, Vec<ConditionFeature>), PipelineError> {
    for (i, chan) in channels.iter().enumerate() {
        if chan.len() != light.len() {
            return Err(PipelineError::BadShape {
                expected: format!("{} light samples", chan.len()),
                actual: format!("{} for channel {}", light.len(), i),
            });
        }
    }

    let mut rows_on = Vec::new();
    let mut rows_off = Vec::new();
    for (channel, signal) in channels.iter().enumerate() {
        let filtered: Vec<Vec<f64>> = Band::ALL
            .iter()
            .map(|&band| band_filter(signal, band, sample_rate_hz))
            .collect();
        for (state, rows) in [(1u8, &mut rows_on), (0u8, &mut rows_off)] {
            let select = |filtered: &[f64]| -> Vec<f64> {
                filtered
                    .iter()
                    .zip(light)
                    .filter(|(_, &s)| s == state)
                    .map(|(&v, _)| v)
                    .collect()
            };
            let theta = select(&filtered[0]);
            if theta.is_empty() {
                continue;
            }
            let alpha = select(&filtered[1]);
            let beta = select(&filtered[2]);
            let powers = window_powers(&theta, &alpha, &beta, sample_rate_hz);
            rows.push(ConditionFeature {
                channel,
                theta_power: powers.theta,
                alpha_power: powers.alpha,
                beta_power: powers.beta,
                theta_alpha: powers.theta / (powers.alpha + RATIO_GUARD),
                beta_alpha: powers.beta / (powers.alpha + RATIO_GUARD),
                light_state: state,
            });
        }
    }
    Ok((rows_on, rows_off))
}

/// Variant B: sliding-window features over a labeled recording. The truth
/// label and start time of a window come from its first sample.
pub fn sliding_features(
    recording: &LabeledRecording,
    window: usize,
    step: usize,
    sample_rate_hz: f64,
) -> Vec<WindowFeature> {
    let n = recording.rel_time.len();
    if window == 0 || step == 0 || n <= window {
        return Vec::new();
    }

    let filtered: Vec<[Vec<f64>; 3]> = recording
        .channels
        .iter()
        .map(|signal| {
            [
                band_filter(signal, Band::Theta, sample_rate_hz),
                band_filter(signal, Band::Alpha, sample_rate_hz),
                band_filter(signal, Band::Beta, sample_rate_hz),
            ]
        })
        .collect();

    let mut rows = Vec::new();
    let mut start = 0usize;
    while start + window < n {
        let truth_value = recording.truth_value[start];
        let start_time = recording.rel_time[start];
        for (name, bands) in recording.channel_names.iter().zip(&filtered) {
            let powers = window_powers(
                &bands[0][start..start + window],
                &bands[1][start..start + window],
                &bands[2][start..start + window],
                sample_rate_hz,
            );
            rows.push(WindowFeature {
                channel: name.clone(),
                theta_power: powers.theta,
                alpha_power: powers.alpha,
                beta_power: powers.beta,
                theta_alpha: powers.theta / (powers.alpha + RATIO_GUARD),
                beta_alpha: powers.beta / (powers.alpha + RATIO_GUARD),
                truth_value,
                start_time,
            });
        }
        start += step;
    }
    rows
}

/// Mean of `value` per channel name, in the order given.
pub fn channel_means<F>(rows: &[WindowFeature], channels: &[String], value: F) -> Vec<f64>
where
    F: Fn(&WindowFeature) -> f64,
{
    channels
        .iter()
        .map(|name| {
            let values: Vec<f64> = rows
                .iter()
                .filter(|r| &r.channel == name)
                .map(&value)
                .collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        })
        .collect()
}

pub fn write_feature_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, sample_rate_hz: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate_hz).sin())
            .collect()
    }

    #[test]
    fn median_split_is_strictly_above() {
        let light = median_split(&[1.0, 1.0, 2.0, 3.0, 3.0]);
        assert_eq!(light, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn alpha_tone_dominates_its_feature_row() {
        let fs = 250.0;
        let signal = sine(10.0, fs, 4000);
        let light = vec![1u8; 4000];
        let (on, off) = condition_features(&[signal], &light, fs).unwrap();
        assert!(off.is_empty());
        assert_eq!(on.len(), 1);
        let row = &on[0];
        assert!(row.alpha_power > row.theta_power);
        assert!(row.alpha_power > row.beta_power);
    }

    #[test]
    fn each_light_state_gets_its_own_row() {
        let fs = 250.0;
        let signal = sine(10.0, fs, 3000);
        let light: Vec<u8> = (0..3000).map(|i| u8::from(i >= 1500)).collect();
        let (on, off) = condition_features(&[signal.clone(), signal], &light, fs).unwrap();
        assert_eq!(on.len(), 2);
        assert_eq!(off.len(), 2);
        assert_eq!(on[0].light_state, 1);
        assert_eq!(off[0].light_state, 0);
        assert_eq!(on[1].channel, 1);
    }

    #[test]
    fn misaligned_light_vector_is_rejected() {
        let err = condition_features(&[vec![0.0; 10]], &[1u8; 9], 250.0);
        assert!(err.is_err());
    }

    fn toy_recording(len: usize) -> LabeledRecording {
        LabeledRecording {
            channel_names: vec!["Ch1".into()],
            channels: vec![sine(10.0, 250.0, len)],
            rel_time: (0..len).map(|i| i as f64 / 250.0).collect(),
            truth_value: (0..len).map(|i| f64::from(u8::from(i < len / 2))).collect(),
        }
    }

    #[test]
    fn thousand_samples_make_exactly_two_windows() {
        let rows = sliding_features(&toy_recording(1000), 500, 250, 250.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].start_time, 0.0);
        assert_eq!(rows[1].start_time, 1.0);
    }

    #[test]
    fn window_label_comes_from_its_first_sample() {
        let rows = sliding_features(&toy_recording(1000), 500, 250, 250.0);
        assert_eq!(rows[0].truth_value, 1.0);
        assert_eq!(rows[1].truth_value, 1.0); // sample 250 is still truthful
    }

    #[test]
    fn exact_window_length_signal_yields_no_rows() {
        let rows = sliding_features(&toy_recording(500), 500, 250, 250.0);
        assert!(rows.is_empty());
    }

    #[test]
    fn feature_csv_carries_original_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        let rows = vec![ConditionFeature {
            channel: 0,
            theta_power: 1.0,
            alpha_power: 2.0,
            beta_power: 3.0,
            theta_alpha: 0.5,
            beta_alpha: 1.5,
            light_state: 1,
        }];
        write_feature_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "Channel,Theta_Power,Alpha_Power,Beta_Power,Theta/Alpha,Beta/Alpha,Light_State"
        ));
    }
}
