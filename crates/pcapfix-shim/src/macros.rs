/// Stack-formatted log line to stderr, gated on [`crate::state::LOG_LEVEL`].
#[macro_export]
macro_rules! shim_log_at_level {
    ($level:expr, $($arg:tt)*) => {
        {
            let level: pcapfix_config::LogLevel = $level;
            if $crate::state::log_enabled(level) {
                use std::fmt::Write;
                let mut buf = [0u8; 512];
                let mut wrapper = $crate::macros::StackWriter::new(&mut buf);
                let pid = unsafe { libc::getpid() };
                let _ = write!(wrapper, "[pcapfix][{}][{}] ", pid, level.tag());
                let _ = write!(wrapper, $($arg)*);
                let _ = writeln!(wrapper);
                $crate::state::shim_log(wrapper.as_str());
            }
        }
    };
}

#[macro_export]
macro_rules! shim_trace { ($($arg:tt)*) => { $crate::shim_log_at_level!(pcapfix_config::LogLevel::Trace, $($arg)*) }; }
#[macro_export]
macro_rules! shim_debug { ($($arg:tt)*) => { $crate::shim_log_at_level!(pcapfix_config::LogLevel::Debug, $($arg)*) }; }
#[macro_export]
macro_rules! shim_info { ($($arg:tt)*) => { $crate::shim_log_at_level!(pcapfix_config::LogLevel::Info, $($arg)*) }; }
#[macro_export]
macro_rules! shim_warn { ($($arg:tt)*) => { $crate::shim_log_at_level!(pcapfix_config::LogLevel::Warn, $($arg)*) }; }
#[macro_export]
macro_rules! shim_error { ($($arg:tt)*) => { $crate::shim_log_at_level!(pcapfix_config::LogLevel::Error, $($arg)*) }; }

/// Fixed-buffer `fmt::Write` sink. Output past the end is dropped.
pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn as_str(&self) -> &str {
        // Truncation can split a code point; keep the valid prefix.
        match std::str::from_utf8(&self.buf[..self.pos]) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&self.buf[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl std::fmt::Write for StackWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.pos;
        let to_copy = std::cmp::min(bytes.len(), remaining);
        self.buf[self.pos..self.pos + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.pos += to_copy;
        Ok(())
    }
}
