//! Sliding-window band-power features over a labeled recording, comparing
//! truthful against deceptive windows.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use veritrace::features::{self, WindowFeature, DEFAULT_STEP, DEFAULT_WINDOW};
use veritrace::plot::{self, PlotStyle};
use veritrace::{io, Band, SAMPLE_RATE_HZ};

#[derive(Parser)]
#[command(
    name = "slidewin",
    version,
    about = "Sliding-window truth/deception features",
    long_about = "Runs a fixed-size sliding window over a labeled recording \
                  CSV, computes Welch band powers per window per channel, and \
                  writes a feature table plus truthful-vs-deceptive plots."
)]
struct Args {
    /// Labeled recording CSV (per-sample truth_value and rel_time columns)
    #[arg(long)]
    recording: PathBuf,

    /// Output directory
    #[arg(long)]
    out: PathBuf,

    /// Window length in samples
    #[arg(long, default_value_t = DEFAULT_WINDOW)]
    window: usize,

    /// Window stride in samples
    #[arg(long, default_value_t = DEFAULT_STEP)]
    step: usize,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    veritrace::init_logging(args.verbose);

    let recording = io::read_labeled_recording(&args.recording)
        .with_context(|| format!("loading labeled recording {}", args.recording.display()))?;
    log::info!(
        "{} channels, {} samples",
        recording.channel_names.len(),
        recording.rel_time.len()
    );

    let rows = features::sliding_features(&recording, args.window, args.step, SAMPLE_RATE_HZ);
    let truthful: Vec<WindowFeature> = rows
        .iter()
        .filter(|r| r.truth_value == 1.0)
        .cloned()
        .collect();
    let deceptive: Vec<WindowFeature> = rows
        .iter()
        .filter(|r| r.truth_value == 0.0)
        .cloned()
        .collect();
    log::info!(
        "{} windows total: {} truthful, {} deceptive",
        rows.len() / recording.channel_names.len().max(1),
        truthful.len(),
        deceptive.len()
    );

    std::fs::create_dir_all(&args.out)?;
    features::write_feature_csv(&args.out.join("windowed_features.csv"), &rows)?;

    let style = PlotStyle::default();
    let channels = &recording.channel_names;

    let bar_groups = |value: fn(&WindowFeature) -> f64| {
        vec![
            (
                "Truthful".to_string(),
                features::channel_means(&truthful, channels, value),
            ),
            (
                "Deceptive".to_string(),
                features::channel_means(&deceptive, channels, value),
            ),
        ]
    };
    let bars: [(&str, &str, fn(&WindowFeature) -> f64); 3] = [
        ("alpha_power_by_truth", "Alpha Power", |r| r.alpha_power),
        ("beta_alpha_ratio_by_truth", "Beta/Alpha Ratio", |r| r.beta_alpha),
        ("theta_alpha_ratio_by_truth", "Theta/Alpha Ratio", |r| {
            r.theta_alpha
        }),
    ];
    for (stem, y_label, value) in bars {
        match plot::render_channel_bars(
            channels,
            &bar_groups(value),
            y_label,
            &format!("{y_label} Distribution by Truth Value"),
            &style,
        ) {
            Ok(png) => plot::save_png(&args.out.join(format!("{stem}.png")), &png)?,
            Err(err) => log::warn!("{stem} skipped: {err}"),
        }
    }

    for band in [Band::Beta, Band::Theta] {
        let label = band.label();
        let groups = vec![
            (
                "Truthful".to_string(),
                truthful.iter().map(|r| r.power(band)).collect::<Vec<_>>(),
            ),
            (
                "Deceptive".to_string(),
                deceptive.iter().map(|r| r.power(band)).collect::<Vec<_>>(),
            ),
        ];
        match plot::render_density_plot(
            &groups,
            &format!("{label} Power"),
            &format!("{label} Power Distribution by Truth Value"),
            &style,
        ) {
            Ok(png) => {
                let path = args
                    .out
                    .join(format!("{}_power_distribution.png", label.to_lowercase()));
                plot::save_png(&path, &png)?;
            }
            Err(err) => log::warn!("{label} density plot skipped: {err}"),
        }
    }
    Ok(())
}
