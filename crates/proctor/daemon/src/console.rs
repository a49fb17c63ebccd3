//! Terminal presentation sink.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use proctor_detectors::Frame;
use proctor_supervisor::PresentationSink;
use tracing::{debug, trace};

/// Prints alerts to a writer (stdout by default) and counts rendered frames.
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
    frames: AtomicU64,
    alert_visible: AtomicBool,
    closed: AtomicBool,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            frames: AtomicU64::new(0),
            alert_visible: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn line(&self, text: &str) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }
}

impl<W: Write + Send> PresentationSink for ConsoleSink<W> {
    fn render(&self, frame: Option<&Frame>) {
        match frame {
            Some(frame) => {
                let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(frame = n, width = frame.width, height = frame.height, "Frame rendered");
            }
            None => trace!("Empty frame"),
        }
    }

    fn raise_alert(&self, message: &str, violation_count: u32, max_violations: u32) {
        self.alert_visible.store(true, Ordering::SeqCst);
        self.line(&format!(
            "[ALERT] {}  (warnings: {}/{})",
            message, violation_count, max_violations
        ));
    }

    fn hide_alerts(&self) {
        if self.alert_visible.swap(false, Ordering::SeqCst) {
            debug!("Alerts hidden");
        }
    }

    fn terminal_notice(&self, message: &str) {
        self.line(&format!("[SESSION ENDED] {}", message));
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(frames = self.frames_rendered(), "Console closed");
        }
    }
}
