//! Process-level shutdown on signals.
//!
//! SIGINT, SIGTERM and SIGHUP end the process immediately with exit code 0.
//! Jobs already issued on the engines are not canceled: leaving the client
//! must not undo database operations the operator asked for.

use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Exit code used when a shutdown signal arrives
pub const INTERRUPTED_EXIT_CODE: i32 = 0;

/// Minutes elapsed, rounded to one decimal place
pub fn elapsed_minutes(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() / 60.0 * 10.0).round() / 10.0
}

/// Human-readable name of the signals we listen for
pub fn signal_name(sig: i32) -> &'static str {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};

    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "UNKNOWN",
    }
}

/// Install the signal handlers.
/// Call this once at program start; `started` is used for the elapsed-time
/// line printed on the way out.
pub fn init_signal_handlers(started: Instant) -> Result<(), io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Shutdown command received ({})", signal_name(sig));
                info!("Jobs already issued keep running on their engines");
                info!(
                    "vdbctl took {} minutes to get this far.",
                    elapsed_minutes(started.elapsed())
                );
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })?;

    Ok(())
}
