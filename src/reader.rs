//! Background stdin reader feeding a bounded channel (§4.5, §5).
//!
//! Blocking line reads happen on their own OS thread so the main loop can
//! poll a running flag on a timeout instead of blocking on stdin forever
//! — the same shape as a background thread streaming subprocess output
//! into an `mpsc` channel for a polling consumer.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How long the main loop waits on an empty queue before re-checking the
/// running flag.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound on in-flight unread lines; a host that floods requests faster
/// than the dispatcher can answer blocks the reader thread rather than
/// growing memory without limit.
const CHANNEL_CAPACITY: usize = 256;

pub enum Line {
    Text(String),
    Eof,
}

/// Spawn the background reader. Lines (newline stripped) are pushed onto
/// the returned channel; a single `Line::Eof` is sent once, then the
/// thread exits.
pub fn spawn<R>(reader: R) -> Receiver<Line>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
    thread::spawn(move || {
        let mut reader = reader;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    let _ = tx.send(Line::Eof);
                    return;
                }
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(Line::Text(trimmed)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    log::warn!("stdin read error: {e}");
                    let _ = tx.send(Line::Eof);
                    return;
                }
            }
        }
    });
    rx
}

/// Poll the queue with [`DEQUEUE_TIMEOUT`], distinguishing "nothing yet"
/// from a closed channel so the caller's running-flag poll loop can tell
/// the two apart.
pub enum Dequeued {
    Line(Line),
    TimedOut,
    Disconnected,
}

pub fn dequeue(rx: &Receiver<Line>) -> Dequeued {
    match rx.recv_timeout(DEQUEUE_TIMEOUT) {
        Ok(line) => Dequeued::Line(line),
        Err(RecvTimeoutError::Timeout) => Dequeued::TimedOut,
        Err(RecvTimeoutError::Disconnected) => Dequeued::Disconnected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lines_are_delivered_in_order_then_eof() {
        let rx = spawn(Cursor::new(b"one\ntwo\n".to_vec()));
        let mut collected = Vec::new();
        loop {
            match dequeue(&rx) {
                Dequeued::Line(Line::Text(s)) => collected.push(s),
                Dequeued::Line(Line::Eof) => break,
                Dequeued::TimedOut => continue,
                Dequeued::Disconnected => break,
            }
        }
        assert_eq!(collected, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn empty_input_yields_eof_immediately() {
        let rx = spawn(Cursor::new(Vec::new()));
        match dequeue(&rx) {
            Dequeued::Line(Line::Eof) => {}
            _ => panic!("expected immediate EOF"),
        }
    }
}
