//! The upload phase (§4.4): simulated, no real network call. A brief
//! fixed delay stands in for the host's actual upload; one heartbeat is
//! emitted if that delay runs long enough to be worth reassuring the
//! host that the worker is still alive.

use std::thread;
use std::time::Instant;

use worker_protocol::Notification;

use super::{ExecutionStats, RunContext};

pub fn run(ctx: &RunContext, stats: &ExecutionStats) {
    ctx.emit(Notification::phase_start("upload", stats.successful_records));

    let start = Instant::now();
    if ctx.upload_delay > ctx.heartbeat_threshold {
        thread::sleep(ctx.heartbeat_threshold);
        ctx.emit(Notification::heartbeat("upload", start.elapsed().as_secs_f64()));
        thread::sleep(ctx.upload_delay - ctx.heartbeat_threshold);
    } else {
        thread::sleep(ctx.upload_delay);
    }

    ctx.emit(Notification::phase_complete("upload", stats.successful_records, None));
}
