use ratatui::crossterm::ExecutableCommand;
use ratatui::crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event};
use std::io::stdout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Deliver pastes as one `Event::Paste` instead of a burst of key presses.
pub fn enable_paste() {
    if let Err(e) = stdout().execute(EnableBracketedPaste) {
        warn!(error = %e, "failed to enable bracketed paste");
    }
}

pub fn disable_paste() {
    let _ = stdout().execute(DisableBracketedPaste);
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal events read on a blocking thread and forwarded to the event loop.
///
/// The thread polls with a short timeout so it notices shutdown; dropping the
/// reader stops it.
pub struct InputReader {
    rx: mpsc::Receiver<Event>,
    shutdown: Arc<AtomicBool>,
}

impl InputReader {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<Event>(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();

        std::thread::spawn(move || {
            loop {
                if shutdown_thread.load(Ordering::Relaxed) {
                    break;
                }
                match event::poll(POLL_INTERVAL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        debug!(error = %e, "terminal poll failed");
                        break;
                    }
                }
                match event::read() {
                    Ok(ev) => {
                        if tx.blocking_send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "terminal read failed");
                        break;
                    }
                }
            }
        });

        Self { rx, shutdown }
    }

    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
