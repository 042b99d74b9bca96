//! The single atomic-line-write sink shared by response emission
//! (Dispatcher) and event emission (Executor), so that two JSON lines
//! never interleave on stdout. The same `Arc<Mutex<dyn Write>>` shape
//! used elsewhere in this codebase for a shared append-only log target.

use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;

/// A line-oriented JSON sink. Each `emit` call writes exactly one
/// serialized value followed by a newline, under a single mutex, so
/// concurrent writers from different threads never interleave partial
/// lines.
pub struct Framing {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Framing {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Serialize `value` and write it as one newline-terminated line,
    /// flushing immediately so the host sees it without buffering delay.
    pub fn emit<T: Serialize>(&self, value: &T) -> io::Result<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut guard = self.sink.lock().unwrap();
        guard.write_all(line.as_bytes())?;
        guard.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn each_emit_is_a_single_complete_line() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let framing = Framing::new(Box::new(SharedBuf(Arc::clone(&buf))));
        framing.emit(&serde_json::json!({"a": 1})).unwrap();
        framing.emit(&serde_json::json!({"b": 2})).unwrap();
        let contents = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"a":1}"#);
        assert_eq!(lines[1], r#"{"b":2}"#);
    }

    #[test]
    fn concurrent_emits_never_interleave() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let framing = Arc::new(Framing::new(Box::new(SharedBuf(Arc::clone(&buf)))));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let framing = Arc::clone(&framing);
                thread::spawn(move || {
                    for _ in 0..50 {
                        framing.emit(&serde_json::json!({"writer": i})).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let contents = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        for line in contents.lines() {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok());
        }
        assert_eq!(contents.lines().count(), 400);
    }
}
