//! Band-power features split by the light-sensor condition: filters each
//! channel into theta/alpha/beta, compares power between the two behavioral
//! conditions, and exports density plots plus per-condition CSVs.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use veritrace::features::{self, ConditionFeature};
use veritrace::plot::{self, PlotStyle};
use veritrace::preprocess::PHOTO_ROW;
use veritrace::{io, Band, PipelineError, SAMPLE_RATE_HZ};

#[derive(Parser)]
#[command(
    name = "bandpower",
    version,
    about = "Band-power features per light-sensor condition",
    long_about = "Splits a session's samples by the binarized light sensor, \
                  computes Welch band powers per channel per condition, and \
                  writes feature CSVs plus power-distribution density plots."
)]
struct Args {
    /// EEG signal: eeg_run-X.npy
    #[arg(long)]
    eeg: PathBuf,

    /// Photo sensor signal: aux_run-X.npy
    #[arg(long)]
    photo: PathBuf,

    /// Output directory
    #[arg(long)]
    out: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    veritrace::init_logging(args.verbose);

    let session = io::session_from_path(&args.eeg)?;
    let raw_eeg = io::load_matrix(&args.eeg)
        .with_context(|| format!("loading EEG array {}", args.eeg.display()))?;
    let aux = io::load_matrix(&args.photo)
        .with_context(|| format!("loading photo sensor array {}", args.photo.display()))?;
    if aux.nrows() <= PHOTO_ROW {
        return Err(PipelineError::BadShape {
            expected: format!("auxiliary array with a photo sensor in row {PHOTO_ROW}"),
            actual: format!("{} rows", aux.nrows()),
        }
        .into());
    }
    if raw_eeg.nrows() < io::CHANNEL_COUNT {
        return Err(PipelineError::BadShape {
            expected: format!("at least {} EEG rows", io::CHANNEL_COUNT),
            actual: format!("{} rows", raw_eeg.nrows()),
        }
        .into());
    }

    // First sample per channel is invalid; trim it from signal and sensor
    // alike so the mask stays aligned.
    let channels: Vec<Vec<f64>> = (0..io::CHANNEL_COUNT)
        .map(|c| raw_eeg.row(c).iter().skip(1).copied().collect())
        .collect();
    let photo: Vec<f64> = aux.row(PHOTO_ROW).iter().skip(1).copied().collect();
    let light = features::median_split(&photo);

    let (rows_on, rows_off) = features::condition_features(&channels, &light, SAMPLE_RATE_HZ)?;
    log::info!(
        "session {session}: {} light-on rows, {} light-off rows",
        rows_on.len(),
        rows_off.len()
    );

    std::fs::create_dir_all(&args.out)?;
    features::write_feature_csv(
        &args
            .out
            .join(format!("mental_load_light_on_session{session}.csv")),
        &rows_on,
    )?;
    features::write_feature_csv(
        &args
            .out
            .join(format!("mental_load_light_off_session{session}.csv")),
        &rows_off,
    )?;

    let style = PlotStyle::default();
    for band in Band::ALL {
        let pull = |rows: &[ConditionFeature]| -> Vec<f64> {
            rows.iter().map(|r| r.power(band)).collect()
        };
        let groups = vec![
            ("Thinking".to_string(), pull(&rows_on)),
            ("Speaking".to_string(), pull(&rows_off)),
        ];
        let label = band.label();
        match plot::render_density_plot(
            &groups,
            &format!("{label} Power"),
            &format!("{label} Power Distribution"),
            &style,
        ) {
            Ok(png) => {
                let path = args.out.join(format!(
                    "{}_power_distribution_session{session}.png",
                    label.to_lowercase()
                ));
                plot::save_png(&path, &png)?;
            }
            Err(err) => log::warn!("{label} density plot skipped: {err}"),
        }
    }
    Ok(())
}
