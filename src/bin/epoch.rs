//! Step 2: cut a preprocessed session into padded trials, one archive per
//! channel. Runs after `preprocess`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use veritrace::epoch::{self, MIN_TRANSITION_GAP};
use veritrace::{io, PipelineError, SAMPLE_RATE_HZ};

#[derive(Parser)]
#[command(
    name = "epoch",
    version,
    about = "Epoch a session into trials",
    long_about = "Detects behavioral-state transitions, pairs them into \
                  press-on/press-off trials with 3 s padding, and writes one \
                  trial archive per channel."
)]
struct Args {
    /// EEG session archive: eeg_X.npz
    #[arg(long)]
    sess: PathBuf,

    /// Behavioral labels: behavior_X.npy
    #[arg(long)]
    beh: PathBuf,

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

    let session = io::session_from_path(&args.sess)?;
    let channels = io::read_channel_archive(&args.sess)
        .with_context(|| format!("loading session archive {}", args.sess.display()))?;
    let behavior = io::load_vector(&args.beh)
        .with_context(|| format!("loading behavior labels {}", args.beh.display()))?;

    let raw = epoch::transition_indices(&behavior);
    let transitions = epoch::denoise_transitions(&raw, MIN_TRANSITION_GAP);
    log::debug!(
        "{} raw transitions, {} after de-noising",
        raw.len(),
        transitions.len()
    );

    std::fs::create_dir_all(&args.out)?;
    for (i, channel) in channels.iter().enumerate() {
        let chan = i + 1;
        let trials = match epoch::epoch_channel(channel, &transitions, SAMPLE_RATE_HZ) {
            Ok(trials) => trials,
            Err(PipelineError::OddTransitionCount { count }) => {
                log::warn!(
                    "session {session} chan{chan}: odd transition count {count}, \
                     skipping channel"
                );
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let path = args.out.join(format!("eeg_{session}_chan{chan}.npz"));
        io::write_trials_archive(&path, &trials)?;
        log::info!(
            "session {session} chan{chan}: {} trials written to {}",
            trials.len(),
            path.display()
        );
    }
    Ok(())
}
