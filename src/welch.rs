//! Welch power spectral density and band-power summation.

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::filters::Band;

/// One-sided power spectral density estimate.
#[derive(Clone, Debug)]
pub struct PowerSpectrum {
    pub frequencies_hz: Vec<f64>,
    pub density: Vec<f64>,
}

/// Welch estimate: Hann-windowed segments with 50% overlap, per-segment mean
/// removal, averaged one-sided periodograms with density scaling.
///
/// `segment_len` is clamped to the signal length; an empty signal yields an
/// empty spectrum.
pub fn welch_psd(signal: &[f64], sample_rate_hz: f64, segment_len: usize) -> PowerSpectrum {
    if signal.is_empty() || segment_len == 0 {
        return PowerSpectrum {
            frequencies_hz: Vec::new(),
            density: Vec::new(),
        };
    }
    let nperseg = segment_len.min(signal.len());
    let step = (nperseg / 2).max(1);
    let window = hann(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);

    let n_bins = nperseg / 2 + 1;
    let mut accumulated = vec![0.0; n_bins];
    let mut n_segments = 0usize;
    let mut start = 0usize;
    while start + nperseg <= signal.len() {
        let segment = &signal[start..start + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        let mut buffer: Vec<Complex64> = segment
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex64::new((s - mean) * w, 0.0))
            .collect();
        fft.process(&mut buffer);
        for (bin, value) in buffer.iter().take(n_bins).enumerate() {
            accumulated[bin] += value.norm_sqr();
        }
        n_segments += 1;
        start += step;
    }

    let scale = 1.0 / (sample_rate_hz * window_power * n_segments.max(1) as f64);
    let density: Vec<f64> = accumulated
        .iter()
        .enumerate()
        .map(|(bin, &power)| {
            // One-sided: everything except DC and Nyquist carries both halves.
            let one_sided = if bin == 0 || (nperseg % 2 == 0 && bin == n_bins - 1) {
                1.0
            } else {
                2.0
            };
            power * scale * one_sided
        })
        .collect();
    let frequencies_hz = (0..n_bins)
        .map(|bin| bin as f64 * sample_rate_hz / nperseg as f64)
        .collect();

    PowerSpectrum {
        frequencies_hz,
        density,
    }
}

/// Summed spectral density inside the band's inclusive frequency range.
pub fn band_power(spectrum: &PowerSpectrum, band: Band) -> f64 {
    let (low, high) = band.range_hz();
    spectrum
        .frequencies_hz
        .iter()
        .zip(&spectrum.density)
        .filter(|(&f, _)| f >= low && f <= high)
        .map(|(_, &p)| p)
        .sum()
}

fn hann(len: usize) -> Vec<f64> {
    // Periodic window, as used for spectral estimation.
    (0..len)
        .map(|n| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * n as f64 / len as f64).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(freq_hz: f64, sample_rate_hz: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq_hz * i as f64 / sample_rate_hz).sin())
            .collect()
    }

    #[test]
    fn peak_lands_on_the_tone_frequency() {
        let fs = 250.0;
        let spectrum = welch_psd(&sine(10.0, fs, 2500), fs, 500);
        let (peak_bin, _) = spectrum
            .density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_relative_eq!(spectrum.frequencies_hz[peak_bin], 10.0, epsilon = 0.5);
    }

    #[test]
    fn alpha_tone_power_sits_in_the_alpha_band() {
        let fs = 250.0;
        let spectrum = welch_psd(&sine(10.0, fs, 5000), fs, 500);
        let alpha = band_power(&spectrum, Band::Alpha);
        let theta = band_power(&spectrum, Band::Theta);
        let beta = band_power(&spectrum, Band::Beta);
        assert!(alpha > 10.0 * theta);
        assert!(alpha > 10.0 * beta);
    }

    #[test]
    fn segment_longer_than_signal_is_clamped() {
        let fs = 250.0;
        let spectrum = welch_psd(&sine(10.0, fs, 300), fs, 500);
        assert_eq!(spectrum.frequencies_hz.len(), 300 / 2 + 1);
    }

    #[test]
    fn empty_signal_yields_empty_spectrum() {
        let spectrum = welch_psd(&[], 250.0, 500);
        assert!(spectrum.density.is_empty());
    }

    #[test]
    fn total_density_tracks_signal_variance() {
        // Parseval-style sanity: integrated density ~ variance for a sine.
        let fs = 250.0;
        let signal = sine(10.0, fs, 5000);
        let spectrum = welch_psd(&signal, fs, 500);
        let df = fs / 500.0;
        let integrated: f64 = spectrum.density.iter().sum::<f64>() * df;
        let variance = signal.iter().map(|v| v * v).sum::<f64>() / signal.len() as f64;
        assert_relative_eq!(integrated, variance, max_relative = 0.1);
    }
}
