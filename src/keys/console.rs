//! Console key source for host runs.
//!
//! Each line typed on stdin (`n`, `p`, `s`, `b` or the full key names) becomes
//! one key event. A reader task forwards parsed keys over a channel and
//! [`ConsoleKeys::poll`] drains it without waiting.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{KeyEvent, KeySource};

/// Key source fed from a channel
#[derive(Debug)]
pub struct ConsoleKeys {
    rx: mpsc::UnboundedReceiver<KeyEvent>,
}

impl ConsoleKeys {
    /// Wrap an existing receiver.
    pub fn new(rx: mpsc::UnboundedReceiver<KeyEvent>) -> Self {
        Self { rx }
    }

    /// Start reading keys from stdin.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match line.parse::<KeyEvent>() {
                        Ok(key) => {
                            if tx.send(key).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("{} (use n, p, s or b)", e),
                    },
                    Ok(None) => {
                        debug!("stdin closed, console keys stopped");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Self::new(rx)
    }
}

impl KeySource for ConsoleKeys {
    fn poll(&mut self) -> Option<KeyEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_drains_one_key_at_a_time() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut keys = ConsoleKeys::new(rx);

        assert_eq!(keys.poll(), None);

        tx.send(KeyEvent::Select).unwrap();
        tx.send(KeyEvent::Next).unwrap();

        assert_eq!(keys.poll(), Some(KeyEvent::Select));
        assert_eq!(keys.poll(), Some(KeyEvent::Next));
        assert_eq!(keys.poll(), None);
    }

    #[test]
    fn test_poll_after_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut keys = ConsoleKeys::new(rx);

        tx.send(KeyEvent::Back).unwrap();
        drop(tx);

        assert_eq!(keys.poll(), Some(KeyEvent::Back));
        assert_eq!(keys.poll(), None);
    }
}
