use std::{ffi::c_void, fmt, num::NonZeroU64};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
/// An opaque, non-null reference to an engine-allocated object.
///
/// # Remarks
/// A handle carries no structure the host can inspect. Two handles are equal iff
/// they name the same engine object; whether that object is still alive is only
/// known to the engine. For the native engine the token is the object's address.
/// For the reference engine it packs a slot index with a generation counter, so a
/// stale token is detected instead of resolving to a recycled slot.
pub struct RawHandle(NonZeroU64);

impl RawHandle {
    /// Wraps a raw token, returning `None` for the null token.
    pub fn new(token: u64) -> Option<Self> {
        NonZeroU64::new(token).map(Self)
    }

    /// The raw token.
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Interprets a native pointer as a handle. Null maps to `None`.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        Self::new(ptr as usize as u64)
    }

    /// The handle as a native pointer.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as usize as *mut c_void
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle(0x{:x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_token_is_not_a_handle() {
        assert!(RawHandle::new(0).is_none());
        assert!(RawHandle::from_ptr(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn pointer_round_trips() {
        let mut value = 7u32;
        let ptr = &mut value as *mut u32 as *mut c_void;
        let handle = RawHandle::from_ptr(ptr).unwrap();

        assert_eq!(handle.as_ptr(), ptr);
    }
}
