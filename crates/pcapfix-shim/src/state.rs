//! Process-wide shim state: runtime settings and the stderr logger.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use libc::c_void;
use pcapfix_config::{LogLevel, ShimSettings};

/// Current log threshold. Messages at or above this severity are written.
pub static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

static SETTINGS: OnceLock<ShimSettings> = OnceLock::new();

/// Settings of the host process, read from its environment on first use.
pub fn settings() -> &'static ShimSettings {
    SETTINGS.get_or_init(|| {
        let settings = ShimSettings::from_env();
        LOG_LEVEL.store(settings.log_level as u8, Ordering::Relaxed);
        settings
    })
}

#[inline]
pub fn log_enabled(level: LogLevel) -> bool {
    (level as u8) <= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Raw write to stderr; the host may have no usable `std::io::stderr`.
pub fn shim_log(msg: &str) {
    unsafe {
        libc::write(2, msg.as_ptr() as *const c_void, msg.len());
    }
}
