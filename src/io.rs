//! Array archives and tables shared between pipeline stages.
//!
//! Raw sessions are `.npy` matrices (channels x samples), preprocessed
//! sessions are `.npz` archives keyed `chan1..chan8`, and epoched trials are
//! `.npz` archives keyed `trial1..trialK` (one file per channel). Feature
//! tables and trial labels travel as CSV.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayD, Ix1, Ix2};
use ndarray_npy::{read_npy, write_npy, NpzReader, NpzWriter};

use crate::error::PipelineError;

/// Number of EEG channels carried through the whole pipeline.
pub const CHANNEL_COUNT: usize = 8;

pub fn load_matrix(path: &Path) -> Result<Array2<f64>, PipelineError> {
    let arr: ArrayD<f64> = read_npy(path)?;
    let shape = arr.shape().to_vec();
    arr.into_dimensionality::<Ix2>()
        .map_err(|_| PipelineError::BadShape {
            expected: "2-D array (channels x samples)".into(),
            actual: format!("shape {shape:?}"),
        })
}

pub fn save_matrix(path: &Path, array: &Array2<f64>) -> Result<(), PipelineError> {
    write_npy(path, array)?;
    Ok(())
}

pub fn load_vector(path: &Path) -> Result<Array1<f64>, PipelineError> {
    let arr: ArrayD<f64> = read_npy(path)?;
    let shape = arr.shape().to_vec();
    arr.into_dimensionality::<Ix1>()
        .map_err(|_| PipelineError::BadShape {
            expected: "1-D array".into(),
            actual: format!("shape {shape:?}"),
        })
}

pub fn save_vector(path: &Path, array: &Array1<f64>) -> Result<(), PipelineError> {
    write_npy(path, array)?;
    Ok(())
}

/// Session number from the trailing digits of a file stem
/// (`eeg_run-2.npy` -> 2, `eeg_3.npz` -> 3).
pub fn session_from_path(path: &Path) -> Result<u32, PipelineError> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let tail_len = stem.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    let digits = &stem[stem.len() - tail_len..];
    digits
        .parse()
        .map_err(|_| PipelineError::SessionNumber {
            path: path.to_path_buf(),
        })
}

pub fn write_channel_archive(
    path: &Path,
    channels: &[Array1<f64>],
) -> Result<(), PipelineError> {
    let mut npz = NpzWriter::new(File::create(path)?);
    for (i, chan) in channels.iter().enumerate() {
        npz.add_array(format!("chan{}", i + 1), chan)?;
    }
    npz.finish()?;
    Ok(())
}

pub fn read_channel_archive(path: &Path) -> Result<Vec<Array1<f64>>, PipelineError> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let mut channels = Vec::with_capacity(CHANNEL_COUNT);
    for i in 1..=CHANNEL_COUNT {
        channels.push(npz_vector(&mut npz, &format!("chan{i}"))?);
    }
    Ok(channels)
}

pub fn write_trials_archive(
    path: &Path,
    trials: &[Array1<f64>],
) -> Result<(), PipelineError> {
    let mut npz = NpzWriter::new(File::create(path)?);
    for (i, trial) in trials.iter().enumerate() {
        npz.add_array(format!("trial{}", i + 1), trial)?;
    }
    npz.finish()?;
    Ok(())
}

pub fn read_trials_archive(path: &Path) -> Result<Vec<Array1<f64>>, PipelineError> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let count = npz
        .names()?
        .iter()
        .filter(|n| n.trim_end_matches(".npy").starts_with("trial"))
        .count();
    let mut trials = Vec::with_capacity(count);
    for i in 1..=count {
        trials.push(npz_vector(&mut npz, &format!("trial{i}"))?);
    }
    Ok(trials)
}

// NumPy stores npz entries with a ".npy" suffix; accept either spelling.
fn npz_vector(
    npz: &mut NpzReader<File>,
    name: &str,
) -> Result<Array1<f64>, PipelineError> {
    match npz.by_name(name) {
        Ok(arr) => Ok(arr),
        Err(_) => Ok(npz.by_name(&format!("{name}.npy"))?),
    }
}

/// A recording CSV with per-sample truth labels, as produced by aligning a
/// session against its trial-label file. Every column that is not
/// bookkeeping is treated as an EEG channel.
#[derive(Debug, Clone)]
pub struct LabeledRecording {
    pub channel_names: Vec<String>,
    pub channels: Vec<Vec<f64>>,
    pub rel_time: Vec<f64>,
    pub truth_value: Vec<f64>,
}

const BOOKKEEPING_COLUMNS: [&str; 7] = [
    "",
    "Unnamed: 0",
    "key_0",
    "Light_sensor",
    "rel_time",
    "Change",
    "truth_value",
];

pub fn read_labeled_recording(path: &Path) -> Result<LabeledRecording, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    let headers = reader.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn { name: name.into() })
    };
    let rel_time_col = column("rel_time")?;
    let truth_col = column("truth_value")?;

    let channel_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !BOOKKEEPING_COLUMNS.contains(h))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut channels: Vec<Vec<f64>> = vec![Vec::new(); channel_cols.len()];
    let mut rel_time = Vec::new();
    let mut truth_value = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |col: usize, name: &str| {
            let value = record.get(col).unwrap_or("");
            value.parse::<f64>().map_err(|_| PipelineError::BadCell {
                column: name.into(),
                row,
                value: value.into(),
            })
        };
        for (slot, (col, name)) in channel_cols.iter().enumerate() {
            channels[slot].push(cell(*col, name)?);
        }
        rel_time.push(cell(rel_time_col, "rel_time")?);
        truth_value.push(cell(truth_col, "truth_value")?);
    }

    Ok(LabeledRecording {
        channel_names: channel_cols.into_iter().map(|(_, name)| name).collect(),
        channels,
        rel_time,
        truth_value,
    })
}

/// Output layout of the preprocessing stage under its `--out` root.
pub struct SessionLayout {
    root: PathBuf,
}

impl SessionLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn figs_dir(&self) -> PathBuf {
        self.root.join("figs")
    }

    pub fn behavior_path(&self, session: u32) -> PathBuf {
        self.root.join("behavior").join(format!("behavior_{session}.npy"))
    }

    pub fn channels_path(&self, session: u32) -> PathBuf {
        self.root.join("eeg").join(format!("eeg_{session}.npz"))
    }

    pub fn trace_path(&self, session: u32, channel: usize) -> PathBuf {
        self.figs_dir()
            .join(format!("eeg_session{session}_channel{channel}.png"))
    }

    pub fn ensure_dirs(&self) -> Result<(), PipelineError> {
        for dir in [
            self.figs_dir(),
            self.root.join("behavior"),
            self.root.join("eeg"),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    #[test]
    fn session_number_comes_from_trailing_digits() {
        assert_eq!(session_from_path(Path::new("data/eeg_run-1.npy")).unwrap(), 1);
        assert_eq!(session_from_path(Path::new("eeg_12.npz")).unwrap(), 12);
        assert!(session_from_path(Path::new("behavior.npy")).is_err());
    }

    #[test]
    fn channel_archive_round_trips_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eeg_1.npz");
        let channels: Vec<Array1<f64>> = (0..CHANNEL_COUNT)
            .map(|c| array![c as f64 + 0.125, -1.5, 3.0e-7, f64::MIN_POSITIVE])
            .collect();
        write_channel_archive(&path, &channels).unwrap();
        let loaded = read_channel_archive(&path).unwrap();
        assert_eq!(loaded.len(), CHANNEL_COUNT);
        for (a, b) in channels.iter().zip(&loaded) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn trials_archive_preserves_variable_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eeg_1_chan3.npz");
        let trials = vec![
            Array1::linspace(0.0, 1.0, 17),
            Array1::linspace(-1.0, 1.0, 5),
        ];
        write_trials_archive(&path, &trials).unwrap();
        let loaded = read_trials_archive(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], trials[0]);
        assert_eq!(loaded[1], trials[1]);
    }

    #[test]
    fn npy_vector_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("behavior_1.npy");
        let state = array![0.0, 0.0, 1.0, 1.0, 0.0];
        save_vector(&path, &state).unwrap();
        assert_eq!(load_vector(&path).unwrap(), state);
    }

    #[test]
    fn labeled_recording_filters_bookkeeping_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labelled.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Unnamed: 0,Ch1,Ch2,Light_sensor,rel_time,truth_value").unwrap();
        writeln!(file, "0,1.5,-2.0,1,0.0,1").unwrap();
        writeln!(file, "1,2.5,-3.0,0,0.004,0").unwrap();
        drop(file);

        let rec = read_labeled_recording(&path).unwrap();
        assert_eq!(rec.channel_names, vec!["Ch1", "Ch2"]);
        assert_eq!(rec.channels[0], vec![1.5, 2.5]);
        assert_eq!(rec.channels[1], vec![-2.0, -3.0]);
        assert_eq!(rec.rel_time, vec![0.0, 0.004]);
        assert_eq!(rec.truth_value, vec![1.0, 0.0]);
    }

    #[test]
    fn labeled_recording_requires_truth_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unlabelled.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Ch1,rel_time").unwrap();
        writeln!(file, "1.0,0.0").unwrap();
        drop(file);

        match read_labeled_recording(&path) {
            Err(PipelineError::MissingColumn { name }) => assert_eq!(name, "truth_value"),
            other => panic!("expected missing column error, got {other:?}"),
        }
    }
}
