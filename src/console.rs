//! Console I/O: mode prompt, outbound lines, printing received payloads.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use crate::cli::Mode;
use crate::net::Received;

/// Line-oriented access to stdin, shared by the mode prompt and the
/// client's write loop so no buffered input is lost between them.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Ask for a role. `None` means the answer was not a known mode.
    pub async fn prompt_mode(&mut self) -> std::io::Result<Option<Mode>> {
        prompt("Enter Mode (server/client): ");
        let line = self.lines.next_line().await?.unwrap_or_default();
        Ok(line.parse().ok())
    }

    /// Feed trimmed stdin lines into a channel until EOF.
    pub fn into_line_feed(mut self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                prompt("Enter message: ");
                match self.lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line.trim().to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read from stdin");
                        break;
                    }
                }
            }
        });
        rx
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{}", text);
    let _ = stdout.flush();
}

/// Print every received payload as `<label>: <text>`.
pub fn spawn_printer(mut deliveries: mpsc::UnboundedReceiver<Received>, label: &'static str) {
    tokio::spawn(async move {
        while let Some(received) = deliveries.recv().await {
            println!("{}: {}", label, received.text);
        }
    });
}
