//! Trial epoching around behavioral-state transitions.
//!
//! A session is expected to contain matched press-on/press-off pairs; each
//! pair becomes one trial, padded on both sides so the surrounding baseline
//! is kept. The very first pair only initiates the GUI and is discarded.

use ndarray::{s, Array1};

use crate::error::PipelineError;

/// Transitions closer than this to the previously kept one are treated as
/// sensor bounce and dropped.
pub const MIN_TRANSITION_GAP: usize = 50;
/// Seconds of context kept on each side of a press-on/press-off pair.
pub const PAD_SECONDS: f64 = 3.0;

/// Sample indices i where the behavioral state changes between i and i + 1.
pub fn transition_indices(state: &Array1<f64>) -> Vec<usize> {
    (0..state.len().saturating_sub(1))
        .filter(|&i| state[i + 1] != state[i])
        .collect()
}

/// De-noises a transition list: a transition survives only if it is at
/// least `min_gap` samples after the last survivor.
pub fn denoise_transitions(raw: &[usize], min_gap: usize) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(raw.len());
    for &idx in raw {
        match kept.last() {
            Some(&prev) if idx - prev < min_gap => {}
            _ => kept.push(idx),
        }
    }
    kept
}

/// Slices one channel into padded trials, one per on/off transition pair.
///
/// An odd transition count means an unmatched press somewhere in the
/// session; the channel is refused outright rather than guessing which
/// transition to drop.
pub fn epoch_channel(
    eeg: &Array1<f64>,
    transitions: &[usize],
    sample_rate_hz: f64,
) -> Result<Vec<Array1<f64>>, PipelineError> {
    if transitions.len() % 2 != 0 {
        return Err(PipelineError::OddTransitionCount {
            count: transitions.len(),
        });
    }

    let pad = (PAD_SECONDS * sample_rate_hz) as usize;
    let mut trials = Vec::with_capacity(transitions.len() / 2);
    for pair in transitions.chunks_exact(2) {
        let start = pair[0].saturating_sub(pad);
        let stop = (pair[1] + pad + 1).min(eeg.len());
        if start >= stop {
            continue;
        }
        trials.push(eeg.slice(s![start..stop]).to_owned());
    }

    // First press only wakes the GUI, not a spoken trial.
    if !trials.is_empty() {
        trials.remove(0);
    }
    Ok(trials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    /// Behavioral state with `n` clean transitions, `spacing` samples apart.
    fn synthetic_state(n: usize, spacing: usize) -> Array1<f64> {
        let len = (n + 2) * spacing;
        let mut state = Array1::zeros(len);
        let mut level = 0.0;
        let mut next = spacing;
        for i in 0..len {
            if i == next && next <= n * spacing {
                level = 1.0 - level;
                next += spacing;
            }
            state[i] = level;
        }
        state
    }

    #[test]
    fn detects_each_level_change() {
        let state = Array1::from(vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(transition_indices(&state), vec![1, 3]);
    }

    #[test]
    fn bounce_within_gap_is_dropped() {
        let raw = vec![100, 110, 130, 400, 420, 900];
        assert_eq!(denoise_transitions(&raw, 50), vec![100, 400, 900]);
    }

    #[test]
    fn well_spaced_transitions_all_survive() {
        let state = synthetic_state(16, 200);
        let raw = transition_indices(&state);
        assert_eq!(raw.len(), 16);
        assert_eq!(denoise_transitions(&raw, MIN_TRANSITION_GAP).len(), 16);
    }

    #[test]
    fn sixteen_transitions_make_seven_trials() {
        let spacing = 2000; // > 2 * pad so trials stay in bounds
        let state = synthetic_state(16, spacing);
        let eeg = Array1::from_shape_fn(state.len(), |i| i as f64);
        let transitions = denoise_transitions(&transition_indices(&state), MIN_TRANSITION_GAP);
        let trials = epoch_channel(&eeg, &transitions, 250.0).unwrap();
        assert_eq!(trials.len(), 7);
    }

    #[test]
    fn trial_extends_pad_on_both_sides() {
        let eeg = Array1::from_shape_fn(20_000, |i| i as f64);
        // Two pairs; the first is discarded.
        let transitions = vec![3000, 4000, 9000, 10_000];
        let trials = epoch_channel(&eeg, &transitions, 250.0).unwrap();
        assert_eq!(trials.len(), 1);
        let pad = (PAD_SECONDS * 250.0) as usize;
        assert_eq!(trials[0].len(), (10_000 + pad + 1) - (9000 - pad));
        assert_eq!(trials[0][0], (9000 - pad) as f64);
    }

    #[test]
    fn odd_transition_count_refuses_the_channel() {
        let eeg = Array1::zeros(10_000);
        let transitions = vec![1000, 2000, 3000];
        match epoch_channel(&eeg, &transitions, 250.0) {
            Err(PipelineError::OddTransitionCount { count }) => assert_eq!(count, 3),
            other => panic!("expected odd-count error, got {other:?}"),
        }
    }

    #[test]
    fn pairs_near_the_edges_are_clamped() {
        let eeg = Array1::zeros(3000);
        // Padding would reach past both ends; the slice clamps instead.
        let transitions = vec![100, 200, 500, 2900];
        let trials = epoch_channel(&eeg, &transitions, 250.0).unwrap();
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].len(), 3000); // clamped to the full signal
    }
}
