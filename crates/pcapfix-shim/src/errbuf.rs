//! Bounded writer over the caller's `errbuf`.
//!
//! Behaves like `snprintf(errbuf, PCAP_ERRBUF_SIZE, ...)`: output starts at
//! offset zero, is silently truncated, and is always NUL-terminated inside
//! the declared capacity. Never allocates.

use libc::c_char;
use std::ffi::CStr;

/// Capacity libpcap callers must provide for `errbuf`.
pub const PCAP_ERRBUF_SIZE: usize = 256;

pub struct ErrBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ErrBuf<'a> {
    /// Start a fresh message in `buf`. Returns `None` for a zero-capacity buffer.
    pub fn new(buf: &'a mut [u8]) -> Option<Self> {
        if buf.is_empty() {
            return None;
        }
        buf[0] = 0;
        Some(Self { buf, pos: 0 })
    }

    /// Wrap a raw C buffer of `cap` bytes. Returns `None` when `ptr` is null.
    ///
    /// # Safety
    /// `ptr` must be null or valid for writes of `cap` bytes for `'a`.
    pub unsafe fn from_raw(ptr: *mut c_char, cap: usize) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Self::new(std::slice::from_raw_parts_mut(ptr as *mut u8, cap))
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        // One byte is always reserved for the terminator.
        let room = self.buf.len() - 1 - self.pos;
        let n = bytes.len().min(room);
        self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        self.pos += n;
        self.buf[self.pos] = 0;
    }

    pub fn push_str(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    /// Append a C string, or `null_text` if `ptr` is null.
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string.
    pub unsafe fn push_cstr(&mut self, ptr: *const c_char, null_text: &str) {
        if ptr.is_null() {
            self.push_str(null_text);
        } else {
            self.push_bytes(CStr::from_ptr(ptr).to_bytes());
        }
    }

    /// Message written so far, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl std::fmt::Write for ErrBuf<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.push_str(s);
        Ok(())
    }
}
