use std::{
    fmt,
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

use log::trace;
use ofhe_engine::RawHandle;

use crate::{Backend, Error, Result};

/// A kind of engine object and how to release it.
pub(crate) trait Resource {
    /// The name used in "closed or invalid" errors.
    const KIND: &'static str;

    fn release(backend: &Backend, handle: RawHandle);
}

/// Declares a resource kind released by a single engine destroy call.
macro_rules! resource {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, |$backend:ident, $handle:ident| $release:expr
    ) => {
        $(#[$meta])*
        pub(crate) enum $name {}

        impl $crate::handle::Resource for $name {
            const KIND: &'static str = $kind;

            fn release($backend: &$crate::Backend, $handle: ofhe_engine::RawHandle) {
                $release
            }
        }
    };
}

pub(crate) use resource;

/// Exclusive ownership of one engine object.
///
/// # Remarks
/// The raw handle lives in an atomic so [`Owned::close`] can take `&self`:
/// whichever caller swaps the handle out performs the single release, every
/// other caller (including a later `Drop`) sees zero and does nothing. Once
/// closed, [`Owned::handle`] reports [`Error::Closed`] instead of passing a dead
/// handle to the engine.
///
/// A `close` racing with an operation that already fetched the handle is a
/// caller error, as it is for the engine itself.
pub(crate) struct Owned<R: Resource> {
    raw: AtomicU64,
    backend: Backend,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Resource> Owned<R> {
    pub fn new(backend: &Backend, handle: RawHandle) -> Self {
        Self {
            raw: AtomicU64::new(handle.get()),
            backend: backend.clone(),
            _kind: PhantomData,
        }
    }

    /// The live handle, or a closed error.
    pub fn handle(&self) -> Result<RawHandle> {
        RawHandle::new(self.raw.load(Ordering::Acquire)).ok_or(Error::Closed { kind: R::KIND })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn is_closed(&self) -> bool {
        self.raw.load(Ordering::Acquire) == 0
    }

    /// Releases the object. Idempotent.
    pub fn close(&self) {
        if let Some(handle) = RawHandle::new(self.raw.swap(0, Ordering::AcqRel)) {
            trace!("releasing {} {handle:?}", R::KIND);
            R::release(&self.backend, handle);
        }
    }
}

impl<R: Resource> Drop for Owned<R> {
    fn drop(&mut self) {
        if !self.is_closed() {
            trace!("{} dropped while open", R::KIND);
        }

        self.close();
    }
}

impl<R: Resource> fmt::Debug for Owned<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle() {
            Ok(handle) => write!(f, "{}({handle:?})", R::KIND),
            Err(_) => write!(f, "{}(closed)", R::KIND),
        }
    }
}

/// A view of an engine object owned by something else. Never released.
#[derive(Clone, Copy)]
pub(crate) struct Borrowed<'a> {
    kind: &'static str,
    handle: RawHandle,
    backend: &'a Backend,
}

impl<'a> Borrowed<'a> {
    pub fn new(kind: &'static str, backend: &'a Backend, handle: RawHandle) -> Self {
        Self {
            kind,
            handle,
            backend,
        }
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn backend(&self) -> &'a Backend {
        self.backend
    }
}

impl fmt::Debug for Borrowed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(borrowed {:?})", self.kind, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    resource!(Counted, "Counted", |_backend, _handle| {
        RELEASED.fetch_add(1, Ordering::SeqCst);
    });

    fn handle(token: u64) -> RawHandle {
        RawHandle::new(token).unwrap()
    }

    // Serialized through one test since they share the counter.
    #[test]
    fn release_happens_exactly_once() {
        let backend = Backend::simulated();

        let owned = Owned::<Counted>::new(&backend, handle(7));
        assert_eq!(owned.handle().unwrap(), handle(7));

        owned.close();
        owned.close();
        assert!(owned.is_closed());
        assert!(matches!(
            owned.handle(),
            Err(Error::Closed { kind: "Counted" })
        ));
        drop(owned);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 1);

        drop(Owned::<Counted>::new(&backend, handle(8)));
        assert_eq!(RELEASED.load(Ordering::SeqCst), 2);

        let shared = Arc::new(Owned::<Counted>::new(&backend, handle(9)));
        let threads = (0..8)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.close())
            })
            .collect::<Vec<_>>();

        for t in threads {
            t.join().unwrap();
        }

        drop(shared);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn borrowed_views_report_their_handle() {
        let backend = Backend::simulated();
        let view = Borrowed::new("PublicKey", &backend, handle(3));

        assert_eq!(view.handle(), handle(3));
        assert_eq!(format!("{view:?}"), "PublicKey(borrowed RawHandle(0x3))");
    }
}
