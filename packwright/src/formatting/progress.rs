//! Spinner shown while a stage runs, shared with the log writer.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// At most one active spinner; anything printed through the slot is drawn
/// above it instead of tearing it.
#[derive(Clone, Default)]
pub struct SpinnerSlot(Arc<Mutex<Option<ProgressBar>>>);

impl SpinnerSlot {
    pub fn start(&self, message: String) {
        if let Ok(mut slot) = self.0.lock() {
            if let Some(previous) = slot.replace(create_spinner(message)) {
                previous.finish_and_clear();
            }
        }
    }

    pub fn set_message(&self, message: String) {
        if let Ok(slot) = self.0.lock() {
            if let Some(pb) = slot.as_ref() {
                pb.set_message(message);
            }
        }
    }

    pub fn finish(&self) {
        if let Ok(mut slot) = self.0.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }

    pub fn suspend<R>(&self, print: impl FnOnce() -> R) -> R {
        match self.0.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(pb) => pb.suspend(print),
                None => print(),
            },
            Err(_) => print(),
        }
    }

    /// Stderr writer for log lines.
    pub fn log_writer(&self) -> LogWriter {
        LogWriter { slot: self.clone() }
    }
}

pub struct LogWriter {
    slot: SpinnerSlot,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.slot.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
