//! Logging setup for the test driver
//!
//! Progress logs at each phase transition go through `log`; the harness
//! verdicts are printed separately by the runner.

use std::io::Write;
use std::sync::Once;

use chrono::Local;

/// Timestamp format for log entries
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Global initialization guard
static INIT_LOGGER: Once = Once::new();

/// Initialize the process-wide logger. Safe to call more than once; only
/// the first call takes effect. Filtering follows `RUST_LOG`, defaulting
/// to info so the per-phase progress lines are visible.
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        env_logger::Builder::from_env(env)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {} [{}] {}",
                    Local::now().format(TIMESTAMP_FORMAT),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();
    });
}
