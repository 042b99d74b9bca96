//! Parent-liveness watchdog and signal handling (§4.5, §9 scenario 6).
//!
//! A persistent worker reparented to init (its Studio host died without
//! cleanup) or left running after a host crash must not linger. An
//! `AtomicBool` flipped from a `ctrlc::set_handler` closure and polled
//! elsewhere covers signals; a periodic parent-pid comparison is layered
//! on top since SIGTERM/SIGINT alone cannot detect reparenting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the watchdog compares the observed parent pid against the
/// one recorded at startup.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shared flag the main loop polls to know whether it should keep
/// reading requests. Flipped to `false` by the watchdog thread, or by a
/// `SIGTERM`/`SIGINT` handler, or by a successful `shutdown` RPC.
pub struct RunningFlag(AtomicBool);

impl RunningFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Install `SIGTERM`/`SIGINT` handlers that clear `flag`.
pub fn install_signal_handlers(flag: Arc<RunningFlag>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        log::info!("received interrupt signal, shutting down");
        flag.stop();
    })
}

/// Spawn the background watchdog thread. Returns immediately; the thread
/// runs until `flag` is cleared or it detects that the worker has been
/// reparented away from `expected_parent_pid`.
pub fn spawn(flag: Arc<RunningFlag>, expected_parent_pid: u32) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while flag.is_running() {
            thread::sleep(POLL_INTERVAL);
            let current_parent_pid = current_parent_pid();
            if current_parent_pid != expected_parent_pid {
                log::warn!(
                    "parent process changed ({expected_parent_pid} -> {current_parent_pid}), shutting down"
                );
                flag.stop();
                return;
            }
        }
    })
}

#[cfg(unix)]
pub fn current_parent_pid() -> u32 {
    nix::unistd::getppid().as_raw() as u32
}

#[cfg(not(unix))]
pub fn current_parent_pid() -> u32 {
    std::process::id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_flag_starts_true_and_latches_false() {
        let flag = RunningFlag::new();
        assert!(flag.is_running());
        flag.stop();
        assert!(!flag.is_running());
    }
}
