//! `pcap_open_live` rebuilt from the create/activate API.
//!
//! The stock `pcap_open_live` never turns on immediate mode. With TPACKET_V3
//! the descriptor from `pcap_get_selectable_fd` then stays unreadable until a
//! ring block fills, and poll-driven callers never see packets.

use std::ptr;

use libc::{c_char, c_int};

use crate::errbuf::{ErrBuf, PCAP_ERRBUF_SIZE};
use crate::reals::{Pcap, Reals};

/// The libpcap operations [`open_live`] needs. Pointers come straight from
/// C callers and are passed through unchecked.
pub trait CaptureLib {
    unsafe fn create(&self, device: *const c_char, errbuf: *mut c_char) -> *mut Pcap;
    unsafe fn set_snaplen(&self, p: *mut Pcap, snaplen: c_int) -> c_int;
    unsafe fn set_promisc(&self, p: *mut Pcap, promisc: c_int) -> c_int;
    unsafe fn set_timeout(&self, p: *mut Pcap, to_ms: c_int) -> c_int;
    unsafe fn set_immediate_mode(&self, p: *mut Pcap, immediate: c_int) -> c_int;
    unsafe fn activate(&self, p: *mut Pcap) -> c_int;
    unsafe fn status_to_str(&self, status: c_int) -> *const c_char;
    unsafe fn geterr(&self, p: *mut Pcap) -> *const c_char;
    unsafe fn close(&self, p: *mut Pcap);
}

impl CaptureLib for Reals {
    unsafe fn create(&self, device: *const c_char, errbuf: *mut c_char) -> *mut Pcap {
        (self.create)(device, errbuf)
    }
    unsafe fn set_snaplen(&self, p: *mut Pcap, snaplen: c_int) -> c_int {
        (self.set_snaplen)(p, snaplen)
    }
    unsafe fn set_promisc(&self, p: *mut Pcap, promisc: c_int) -> c_int {
        (self.set_promisc)(p, promisc)
    }
    unsafe fn set_timeout(&self, p: *mut Pcap, to_ms: c_int) -> c_int {
        (self.set_timeout)(p, to_ms)
    }
    unsafe fn set_immediate_mode(&self, p: *mut Pcap, immediate: c_int) -> c_int {
        (self.set_immediate_mode)(p, immediate)
    }
    unsafe fn activate(&self, p: *mut Pcap) -> c_int {
        (self.activate)(p)
    }
    unsafe fn status_to_str(&self, status: c_int) -> *const c_char {
        (self.statustostr)(status)
    }
    unsafe fn geterr(&self, p: *mut Pcap) -> *const c_char {
        (self.geterr)(p)
    }
    unsafe fn close(&self, p: *mut Pcap) {
        (self.close)(p)
    }
}

/// Open `device` the way `pcap_open_live` does, plus immediate mode.
///
/// Returns the activated handle, or null after creation failure or a
/// negative activation status. A positive (warning) status still returns the
/// handle and leaves `"<device>: <status> (<detail>)"` in `errbuf`.
///
/// # Safety
/// `device` must be null or a C string; `errbuf` must be null or hold
/// [`PCAP_ERRBUF_SIZE`] writable bytes.
pub unsafe fn open_live<L: CaptureLib + ?Sized>(
    lib: &L,
    device: *const c_char,
    snaplen: c_int,
    promisc: c_int,
    to_ms: c_int,
    errbuf: *mut c_char,
) -> *mut Pcap {
    let p = lib.create(device, errbuf);
    if p.is_null() {
        shim_debug!("pcap_create failed");
        return ptr::null_mut();
    }

    // Setter results are not surfaced, matching pcap_open_live's contract.
    lib.set_snaplen(p, snaplen);
    lib.set_promisc(p, promisc);
    lib.set_timeout(p, to_ms);
    lib.set_immediate_mode(p, 1);

    let status = lib.activate(p);
    if status < 0 {
        if let Some(mut buf) = ErrBuf::from_raw(errbuf, PCAP_ERRBUF_SIZE) {
            buf.push_cstr(device, "(null)");
            buf.push_str(": ");
            buf.push_cstr(lib.status_to_str(status), "");
        }
        shim_debug!("pcap_activate failed with status {}", status);
        lib.close(p);
        return ptr::null_mut();
    }

    if status > 0 {
        if let Some(mut buf) = ErrBuf::from_raw(errbuf, PCAP_ERRBUF_SIZE) {
            buf.push_cstr(device, "(null)");
            buf.push_str(": ");
            buf.push_cstr(lib.status_to_str(status), "");
            buf.push_str(" (");
            buf.push_cstr(lib.geterr(p), "");
            buf.push_str(")");
        }
        shim_debug!("pcap_activate warning status {}", status);
    }

    shim_trace!("opened capture handle {:p} with immediate mode", p);
    p
}
