use gorex::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 100;
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix:.bold} {msg}";
const MOVES_TEMPLATE: &str =
    "{prefix:.bold} [{bar:40.cyan/blue}] {human_pos}/{human_len} moves ({per_sec}, ETA {eta})";

/// Terminal view of one run: a spinner while a phase has no known length, and a bar
/// counting moves per replica during sampling.
struct RunDisplay {
    bar: ProgressBar,
    phase: &'static str,
}

impl RunDisplay {
    fn new(bar: ProgressBar) -> Self {
        bar.set_style(style(SPINNER_TEMPLATE));
        Self { bar, phase: "" }
    }

    fn apply(&mut self, event: Progress) {
        match event {
            Progress::PhaseStart { name } => {
                self.phase = name;
                self.bar.reset();
                self.bar.set_style(style(SPINNER_TEMPLATE));
                self.bar.set_prefix(name);
                self.bar.set_message("");
                self.bar
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.reset();
                self.bar.set_style(style(MOVES_TEMPLATE).progress_chars("=> "));
                self.bar.set_length(total_steps);
            }
            Progress::TaskIncrement { steps } => self.bar.inc(steps),
            Progress::TaskFinish => {
                if let Some(total) = self.bar.length() {
                    self.bar.set_position(total);
                }
                self.bar.disable_steady_tick();
            }
            Progress::PhaseFinish => {
                self.bar.disable_steady_tick();
                self.bar.set_style(style(SPINNER_TEMPLATE));
                self.bar.finish_with_message("done");
            }
            Progress::Message(msg) => self.bar.println(format!("  {} | {}", self.phase, msg)),
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Shares one [`RunDisplay`] with the engine's progress callback.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<RunDisplay>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(
            Some(0),
            ProgressDrawTarget::stderr(),
        ))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            display: Arc::new(Mutex::new(RunDisplay::new(bar))),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = Arc::clone(&self.display);
        Box::new(move |event: Progress| match display.lock() {
            Ok(mut display) => display.apply(event),
            Err(_) => warn!("Progress display lock was poisoned; dropping update."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
