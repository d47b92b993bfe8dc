//! Real libpcap symbols, resolved with `dlsym(RTLD_NEXT)`.
//!
//! `RTLD_NEXT` returns the next definition of a name after the calling
//! object in the loader's search order. Since this library is preloaded, that
//! is whichever libpcap the host process actually uses, never our own
//! `pcap_open_live`. This only exists in the glibc/ELF loader and cannot be
//! expressed portably.

use std::ffi::CStr;
use std::marker::{PhantomData, PhantomPinned};
use std::sync::OnceLock;

use libc::{c_char, c_int, c_void};

/// Opaque libpcap handle (`pcap_t`).
#[repr(C)]
pub struct Pcap {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

pub type CreateFn = unsafe extern "C" fn(*const c_char, *mut c_char) -> *mut Pcap;
pub type SetIntFn = unsafe extern "C" fn(*mut Pcap, c_int) -> c_int;
pub type ActivateFn = unsafe extern "C" fn(*mut Pcap) -> c_int;
pub type StatusToStrFn = unsafe extern "C" fn(c_int) -> *const c_char;
pub type GetErrFn = unsafe extern "C" fn(*mut Pcap) -> *mut c_char;
pub type CloseFn = unsafe extern "C" fn(*mut Pcap);
pub type OpenLiveFn =
    unsafe extern "C" fn(*const c_char, c_int, c_int, c_int, *mut c_char) -> *mut Pcap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShimError {
    #[error("{0} not found in loaded libraries")]
    MissingSymbol(&'static str),
}

/// The nine libpcap entry points the shim drives.
#[derive(Clone, Copy)]
pub struct Reals {
    pub create: CreateFn,
    pub set_snaplen: SetIntFn,
    pub set_promisc: SetIntFn,
    pub set_timeout: SetIntFn,
    pub set_immediate_mode: SetIntFn,
    pub activate: ActivateFn,
    pub statustostr: StatusToStrFn,
    pub geterr: GetErrFn,
    pub close: CloseFn,
}

impl Reals {
    /// Resolve every entry point through `lookup`. Fails on the first
    /// missing name; a partial table is never produced.
    ///
    /// # Safety
    /// Each non-null address returned by `lookup` must be a function with
    /// the libpcap signature of the requested name.
    pub unsafe fn resolve_with<F>(mut lookup: F) -> Result<Self, ShimError>
    where
        F: FnMut(&'static CStr) -> *mut c_void,
    {
        macro_rules! resolve {
            ($name:expr, $t:ty) => {{
                let name: &'static CStr = $name;
                let p = lookup(name);
                if p.is_null() {
                    return Err(ShimError::MissingSymbol(name.to_str().unwrap_or("?")));
                }
                std::mem::transmute::<*mut c_void, $t>(p)
            }};
        }

        Ok(Self {
            create: resolve!(c"pcap_create", CreateFn),
            set_snaplen: resolve!(c"pcap_set_snaplen", SetIntFn),
            set_promisc: resolve!(c"pcap_set_promisc", SetIntFn),
            set_timeout: resolve!(c"pcap_set_timeout", SetIntFn),
            set_immediate_mode: resolve!(c"pcap_set_immediate_mode", SetIntFn),
            activate: resolve!(c"pcap_activate", ActivateFn),
            statustostr: resolve!(c"pcap_statustostr", StatusToStrFn),
            geterr: resolve!(c"pcap_geterr", GetErrFn),
            close: resolve!(c"pcap_close", CloseFn),
        })
    }
}

/// Resolve-once cache for a [`Reals`] table.
///
/// The outcome, failure included, is fixed by the first caller; concurrent
/// first callers block until it is available.
pub struct SymbolCache {
    slot: OnceLock<Result<Reals, ShimError>>,
}

impl Default for SymbolCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolCache {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// # Safety
    /// Same contract as [`Reals::resolve_with`].
    pub unsafe fn get_or_resolve<F>(&self, lookup: F) -> Result<&Reals, ShimError>
    where
        F: FnMut(&'static CStr) -> *mut c_void,
    {
        self.slot
            .get_or_init(|| Reals::resolve_with(lookup))
            .as_ref()
            .map_err(|e| *e)
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }
}

/// A single lazily-resolved next definition of a symbol.
pub struct RealSymbol<T> {
    slot: OnceLock<Option<T>>,
    name: &'static CStr,
}

impl<T: Copy> RealSymbol<T> {
    pub const fn new(name: &'static CStr) -> Self {
        Self {
            slot: OnceLock::new(),
            name,
        }
    }

    /// # Safety
    /// `T` must be the function-pointer type matching `name`.
    pub unsafe fn get(&self) -> Option<T> {
        *self.slot.get_or_init(|| {
            let p = dlsym_next(self.name);
            if p.is_null() {
                None
            } else {
                Some(std::mem::transmute_copy::<*mut c_void, T>(&p))
            }
        })
    }
}

pub(crate) fn dlsym_next(name: &CStr) -> *mut c_void {
    unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) }
}

static REALS: SymbolCache = SymbolCache::new();

/// Forwarding target when the shim is disabled or cannot drive libpcap.
pub static NEXT_OPEN_LIVE: RealSymbol<OpenLiveFn> = RealSymbol::new(c"pcap_open_live");

/// The process-wide table, resolved on first call.
pub fn reals() -> Result<&'static Reals, ShimError> {
    let first = !REALS.is_resolved();
    // SAFETY: RTLD_NEXT yields libpcap's own definitions of these names.
    let res = unsafe { REALS.get_or_resolve(dlsym_next) };
    if first {
        match &res {
            Ok(_) => shim_info!("resolved libpcap entry points"),
            Err(e) => shim_warn!("libpcap resolution failed: {}", e),
        }
    }
    res
}
