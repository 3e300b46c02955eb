//! Step 1: pre-process a raw session into differenced channels and
//! behavioral labels.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use veritrace::io::{self, SessionLayout};
use veritrace::plot::{self, PlotStyle};
use veritrace::{preprocess, SAMPLE_RATE_HZ};

#[derive(Parser)]
#[command(
    name = "preprocess",
    version,
    about = "Pre-process raw EEG data",
    long_about = "Differences each EEG channel, binarizes the photo sensor into \
                  behavioral labels, and writes the per-session channel archive \
                  plus labeled session traces."
)]
struct Args {
    /// EEG signal: eeg_run-X.npy
    #[arg(long)]
    eeg: PathBuf,

    /// Photo sensor signal: aux_run-X.npy
    #[arg(long)]
    photo: PathBuf,

    /// Output directory root
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

    let (minutes, seconds) = preprocess::recording_time(&raw_eeg, SAMPLE_RATE_HZ);
    log::info!("Recording time: {minutes} minutes and {seconds} seconds");

    let processed = preprocess::preprocess_session(&raw_eeg, &aux)?;

    let layout = SessionLayout::new(&args.out);
    layout.ensure_dirs()?;

    let style = PlotStyle::session_trace();
    let title = format!("Session {session} EEG Signal");
    for (i, channel) in processed.channels.iter().enumerate() {
        let png = plot::render_session_trace(
            channel,
            &processed.behavior,
            SAMPLE_RATE_HZ,
            &title,
            &style,
        )?;
        let path = layout.trace_path(session, i + 1);
        plot::save_png(&path, &png)?;
        log::debug!("channel {}: trace written to {}", i + 1, path.display());
    }

    io::save_vector(&layout.behavior_path(session), &processed.behavior)?;
    io::write_channel_archive(&layout.channels_path(session), &processed.channels)?;
    log::info!(
        "session {session}: {} channels archived to {}",
        processed.channels.len(),
        layout.channels_path(session).display()
    );
    Ok(())
}
