//! Request lines read on a plain OS thread.
//!
//! A stdin read parked on tokio's blocking pool cannot be cancelled and
//! would hold up runtime shutdown after Ctrl-C until the next newline. A
//! detached thread does not: the process exits without waiting for it.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

const LINE_BUFFER: usize = 64;

/// Forward every line of `reader` into the returned channel. The channel
/// closes at EOF, after the first read error, or once the receiver is gone.
pub fn spawn_line_reader<R>(
    reader: R,
) -> io::Result<(mpsc::Receiver<io::Result<String>>, JoinHandle<()>)>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let handle = thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok((rx, handle))
}
