//! # pcapfix
//!
//! Preload library that replaces libpcap's `pcap_open_live` with the
//! equivalent `pcap_create` / `pcap_set_*` / `pcap_activate` sequence, with
//! `pcap_set_immediate_mode(p, 1)` added.
//!
//! Install by listing `libpcapfix.so` in `/etc/ld.so.preload` (see the
//! `pcapfix` tool). `LD_PRELOAD` is ignored by the loader for binaries that
//! carry file capabilities, which is the usual way capture tools are granted
//! `CAP_NET_RAW`.
//!
//! The only exported C symbol is `pcap_open_live`. Everything else resolves
//! lazily against the next libpcap in load order, so the host must already
//! link libpcap; the shim does not.
//!
//! Environment (read once per process):
//! - `PCAPFIX_DISABLE=1` forwards every call to the real `pcap_open_live`
//! - `PCAPFIX_LOG_LEVEL=error|warn|info|debug|trace`, `PCAPFIX_DEBUG=1`

// Allow unsafe FFI functions without safety docs - these are inherently unsafe C ABI
#![allow(clippy::missing_safety_doc)]

// Macros must be defined before modules that use them
#[macro_use]
pub mod macros;

pub mod errbuf;
pub mod open_live;
pub mod reals;
pub mod state;

use std::fmt::Write;

use libc::{c_char, c_int};
use pcapfix_config::ShimSettings;

use crate::errbuf::{ErrBuf, PCAP_ERRBUF_SIZE};
use crate::reals::{OpenLiveFn, Pcap, Reals, ShimError, NEXT_OPEN_LIVE};

#[no_mangle]
pub unsafe extern "C" fn pcap_open_live(
    device: *const c_char,
    snaplen: c_int,
    promisc: c_int,
    to_ms: c_int,
    errbuf: *mut c_char,
) -> *mut Pcap {
    let args = OpenLiveArgs {
        device,
        snaplen,
        promisc,
        to_ms,
        errbuf,
    };
    dispatch(
        state::settings(),
        reals::reals,
        || NEXT_OPEN_LIVE.get(),
        args,
    )
}

/// Arguments of one `pcap_open_live` call, as received from C.
#[derive(Debug, Clone, Copy)]
pub struct OpenLiveArgs {
    pub device: *const c_char,
    pub snaplen: c_int,
    pub promisc: c_int,
    pub to_ms: c_int,
    pub errbuf: *mut c_char,
}

/// Route a call: forward it when disabled, run the immediate-mode sequence
/// when libpcap resolves, otherwise fall back to the next `pcap_open_live`.
///
/// `resolve` is not called while disabled; `next` only when forwarding.
pub unsafe fn dispatch<'a, R, N>(
    settings: &ShimSettings,
    resolve: R,
    next: N,
    args: OpenLiveArgs,
) -> *mut Pcap
where
    R: FnOnce() -> Result<&'a Reals, ShimError>,
    N: FnOnce() -> Option<OpenLiveFn>,
{
    if settings.disabled {
        shim_debug!("disabled, forwarding pcap_open_live");
        return passthrough(next(), args, None);
    }

    match resolve() {
        Ok(lib) => open_live::open_live(
            lib,
            args.device,
            args.snaplen,
            args.promisc,
            args.to_ms,
            args.errbuf,
        ),
        Err(e) => passthrough(next(), args, Some(e)),
    }
}

/// Hand the call to `next`. If there is none, report `cause` (or the
/// missing forward target) through `errbuf`.
unsafe fn passthrough(
    next: Option<OpenLiveFn>,
    args: OpenLiveArgs,
    cause: Option<ShimError>,
) -> *mut Pcap {
    if let Some(real) = next {
        if cause.is_some() {
            shim_warn!("falling back to unmodified pcap_open_live");
        }
        return real(args.device, args.snaplen, args.promisc, args.to_ms, args.errbuf);
    }

    let err = cause.unwrap_or(ShimError::MissingSymbol("pcap_open_live"));
    shim_error!("cannot open capture device: {}", err);
    if let Some(mut buf) = ErrBuf::from_raw(args.errbuf, PCAP_ERRBUF_SIZE) {
        let _ = write!(buf, "pcap_open_live: {}", err);
    }
    std::ptr::null_mut()
}
