//! Fullscreen stimulus-presentation window.
//!
//! Space (release) schedules the next prompt three seconds out; the prompt
//! asks the subject to tell a random fact or lie about a random topic and
//! logs the trial. Enter, the trial cap, or closing the window flushes the
//! log to a timestamped CSV and ends the session.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use eframe::egui;

use veritrace::trial_log::{TrialLog, TrialPrompt};

#[derive(Parser)]
#[command(
    name = "prompt",
    version,
    about = "Stimulus-presentation GUI for spoken trials",
    long_about = "Shows randomized truth/lie prompts fullscreen and logs one \
                  labeled row per trial. Press Space for the next prompt, \
                  Enter to save the session log and quit."
)]
struct Args {
    /// Directory for the trial-label CSV
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// End the session after this many prompts
    #[arg(long, default_value_t = 15)]
    max_trials: usize,

    /// Delay between the key press and the prompt, in seconds
    #[arg(long, default_value_t = 3.0)]
    delay_secs: f64,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct PromptApp {
    out_dir: PathBuf,
    max_trials: usize,
    delay: Duration,
    display: String,
    pending_since: Option<Instant>,
    trial_log: TrialLog,
    rng: rand::rngs::ThreadRng,
    closing: bool,
}

impl PromptApp {
    fn new(args: &Args) -> Self {
        Self {
            out_dir: args.out.clone(),
            max_trials: args.max_trials.max(1),
            delay: Duration::from_secs_f64(args.delay_secs.max(0.0)),
            display: "Press Space".to_owned(),
            pending_since: None,
            trial_log: TrialLog::new(),
            rng: rand::thread_rng(),
            closing: false,
        }
    }

    fn flush(&mut self) {
        match self.trial_log.flush_csv(&self.out_dir) {
            Ok(Some(path)) => log::info!("trial labels written to {}", path.display()),
            Ok(None) => {}
            Err(err) => log::error!("failed to write trial labels: {err}"),
        }
    }

    fn finish(&mut self, ctx: &egui::Context) {
        self.flush();
        self.closing = true;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for PromptApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let (space_released, enter_pressed) = ctx.input(|i| {
            (
                i.key_released(egui::Key::Space),
                i.key_pressed(egui::Key::Enter),
            )
        });

        if enter_pressed && !self.closing {
            self.finish(ctx);
        }
        if space_released && self.pending_since.is_none() && !self.closing {
            self.pending_since = Some(Instant::now());
        }

        if let Some(since) = self.pending_since {
            let elapsed = since.elapsed();
            if elapsed >= self.delay {
                self.pending_since = None;
                let prompt = TrialPrompt::random(&mut self.rng);
                self.display = prompt.instruction();
                self.trial_log.push(&prompt);
                log::debug!(
                    "trial {}/{}: {}",
                    self.trial_log.len(),
                    self.max_trials,
                    self.display
                );
                if self.trial_log.len() >= self.max_trials {
                    self.finish(ctx);
                }
            } else {
                // Keep repainting until the scheduled prompt is due.
                ctx.request_repaint_after(self.delay - elapsed);
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.label(egui::RichText::new(&self.display).size(42.0));
            });
        });
    }

    // Closing the window mid-session still saves the collected labels.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.flush();
    }
}

fn main() -> eframe::Result<()> {
    let args = Args::parse();
    veritrace::init_logging(args.verbose);

    let viewport = egui::ViewportBuilder::default()
        .with_fullscreen(true)
        .with_title("Spoken Trial Prompts");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "veritrace prompt",
        options,
        Box::new(move |_cc| Box::new(PromptApp::new(&args))),
    )
}
