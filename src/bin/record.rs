//! Streams the acquisition board for a fixed duration and saves the raw
//! session arrays. Pressing Enter stops the capture early.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use veritrace::board::{BoardSession, CancelToken};
use veritrace::io;

#[derive(Parser)]
#[command(
    name = "record",
    version,
    about = "Record a raw EEG session from the acquisition board",
    long_about = "Opens a streaming session on the serial dongle, captures for \
                  the given duration, and writes eeg_run-N.npy and \
                  aux_run-N.npy for the later analysis passes."
)]
struct Args {
    /// Serial port of the acquisition dongle
    #[arg(long, default_value = "COM6")]
    port: String,

    /// Capture duration in seconds
    #[arg(long, default_value_t = 120)]
    duration_secs: u64,

    /// Run number used in the output file names
    #[arg(long, default_value_t = 1)]
    run: u32,

    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    veritrace::init_logging(args.verbose);

    let mut session = BoardSession::connect(&args.port)
        .with_context(|| format!("opening acquisition board on {}", args.port))?;
    session.start_stream()?;
    log::info!(
        "streaming from {} for {} s (press Enter to stop early)",
        session.port_name(),
        args.duration_secs
    );

    let cancel = CancelToken::new();
    let stdin_cancel = cancel.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            stdin_cancel.cancel();
        }
    });

    let recording = session.record_for(Duration::from_secs(args.duration_secs), &cancel)?;
    session.stop_stream()?;

    std::fs::create_dir_all(&args.out)?;
    let eeg_path = args.out.join(format!("eeg_run-{}.npy", args.run));
    let aux_path = args.out.join(format!("aux_run-{}.npy", args.run));
    io::save_matrix(&eeg_path, &recording.eeg)?;
    io::save_matrix(&aux_path, &recording.aux)?;
    log::info!(
        "captured {} samples ({:.1} s) to {} and {}",
        recording.sample_count(),
        recording.sample_count() as f64 / recording.sample_rate_hz,
        eeg_path.display(),
        aux_path.display()
    );
    Ok(())
}
