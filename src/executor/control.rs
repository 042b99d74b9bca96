//! The three control primitives (§9, Design Note "Cooperative control
//! primitives"): pause latch, step gate, abort flag. Kept as distinct
//! types on purpose — merging them loses the "paused then aborted must
//! release without transitioning through running" guarantee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Binary gate: open = proceed, closed = block. Backs pause/resume.
pub struct PauseLatch {
    open: Mutex<bool>,
    cv: Condvar,
}

impl PauseLatch {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(true),
            cv: Condvar::new(),
        }
    }

    pub fn close(&self) {
        *self.open.lock().unwrap() = false;
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap()
    }

    /// Block the caller until the latch is open.
    pub fn wait(&self) {
        let guard = self.open.lock().unwrap();
        let _ = self.cv.wait_while(guard, |open| !*open).unwrap();
    }
}

/// A one-shot permit consumed by a single record-loop iteration in
/// step-mode. Reset to unarmed the instant it is consumed.
pub struct StepGate {
    armed: Mutex<bool>,
    cv: Condvar,
}

impl StepGate {
    pub fn new() -> Self {
        Self {
            armed: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub fn permit_one(&self) {
        *self.armed.lock().unwrap() = true;
        self.cv.notify_all();
    }

    /// Block until a permit is available (or `abort` fires), consuming the
    /// permit if one was granted. A short poll interval covers the case
    /// where abort is signalled between the caller's abort check and this
    /// wait starting.
    fn wait_and_consume(&self, abort: &AbortFlag) {
        let mut guard = self.armed.lock().unwrap();
        loop {
            if *guard {
                *guard = false;
                return;
            }
            if abort.is_set() {
                return;
            }
            let (next, _) = self
                .cv
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = next;
        }
    }

    pub fn release_all(&self) {
        self.cv.notify_all();
    }
}

/// Monotone abort signal.
pub struct AbortFlag(AtomicBool);

impl AbortFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The three primitives composed for one execution, plus whether that
/// execution runs in step mode.
pub struct ExecutionControl {
    pub pause: PauseLatch,
    pub step: StepGate,
    pub abort: AbortFlag,
    pub step_mode: bool,
}

impl ExecutionControl {
    pub fn new(step_mode: bool) -> Self {
        Self {
            pause: PauseLatch::new(),
            step: StepGate::new(),
            abort: AbortFlag::new(),
            step_mode,
        }
    }

    /// Called at the top of every record-loop iteration (fetch, transform),
    /// before that iteration's work starts. Returns `false` if the caller
    /// should stop because abort was observed, `true` if it should proceed.
    /// Step mode is not checked here: the first record in a step-mode run
    /// must surface without waiting for a permit.
    pub fn gate(&self) -> bool {
        if self.abort.is_set() {
            return false;
        }
        self.pause.wait();
        !self.abort.is_set()
    }

    /// Called after a record-loop iteration's work is emitted, before the
    /// loop moves on to the next one. In step mode this blocks for a
    /// permit; outside step mode it is a no-op. Returns `false` if abort
    /// fired while waiting.
    pub fn step_wait(&self) -> bool {
        if self.step_mode {
            self.step.wait_and_consume(&self.abort);
        }
        !self.abort.is_set()
    }

    /// Set the abort flag and release both waiting primitives so any
    /// blocked iteration unblocks and observes the flag.
    pub fn request_abort(&self) {
        self.abort.set();
        self.pause.open();
        self.step.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pause_latch_blocks_until_opened() {
        let latch = Arc::new(PauseLatch::new());
        latch.close();
        let waiter = Arc::clone(&latch);
        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        latch.open();
        handle.join().unwrap();
    }

    #[test]
    fn step_gate_releases_on_abort_without_a_permit() {
        let gate = Arc::new(StepGate::new());
        let abort = Arc::new(AbortFlag::new());
        let (gate_clone, abort_clone) = (Arc::clone(&gate), Arc::clone(&abort));
        let handle = thread::spawn(move || gate_clone.wait_and_consume(&abort_clone));
        thread::sleep(Duration::from_millis(20));
        abort.set();
        gate.release_all();
        handle.join().unwrap();
    }

    #[test]
    fn gate_returns_false_immediately_once_aborted() {
        let control = ExecutionControl::new(false);
        control.request_abort();
        assert!(!control.gate());
    }

    #[test]
    fn step_mode_gate_does_not_wait_for_a_permit() {
        let control = ExecutionControl::new(true);
        assert!(control.gate());
    }

    #[test]
    fn step_mode_step_wait_requires_a_permit_per_iteration() {
        let control = Arc::new(ExecutionControl::new(true));
        let worker = Arc::clone(&control);
        let handle = thread::spawn(move || worker.step_wait());
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        control.step.permit_one();
        assert!(handle.join().unwrap());
    }
}
