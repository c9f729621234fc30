use std::io::{BufRead, Write};
use tokio::sync::mpsc;

pub fn prompt() -> Result<(), String> {
    write!(std::io::stdout(), "> ").map_err(|e| e.to_string())?;
    std::io::stdout().flush().map_err(|e| e.to_string())
}

/// Read stdin lines on a plain thread so the REPL can also wait on the tracker.
///
/// The channel closes at end of input, which the REPL treats as `exit`. The
/// thread is detached, so a pending read never holds up runtime shutdown.
pub fn spawn_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
