use std::sync::Arc;

use log::debug;
use ofhe_engine::{Alloc, BinFheEngine, EngineResult, Fault, PkeEngine, RawHandle};

use crate::{Error, Result, Subsystem};

/// Message used when a subsystem reports failure without describing it.
pub(crate) const UNKNOWN_PKE_ERROR: &str = "unknown PKE C++ error";
pub(crate) const UNKNOWN_BINFHE_ERROR: &str = "unknown BinFHE C++ error";

/// A subsystem with its own last-error channel.
pub(crate) trait ErrorSource {
    const SUBSYSTEM: Subsystem;
    const UNKNOWN: &'static str;

    fn take_error(&self) -> Option<String>;
}

impl ErrorSource for dyn PkeEngine {
    const SUBSYSTEM: Subsystem = Subsystem::Pke;
    const UNKNOWN: &'static str = UNKNOWN_PKE_ERROR;

    fn take_error(&self) -> Option<String> {
        self.last_error()
    }
}

impl ErrorSource for dyn BinFheEngine {
    const SUBSYSTEM: Subsystem = Subsystem::BinFhe;
    const UNKNOWN: &'static str = UNKNOWN_BINFHE_ERROR;

    fn take_error(&self) -> Option<String> {
        self.last_error()
    }
}

/// Turns an engine status into a [`Result`], pairing every failure with the
/// message from the same subsystem's channel.
///
/// # Remarks
/// The message is read on the calling thread immediately after the failing
/// call returns, before any other call on this subsystem can be made from the
/// same thread. A lattice failure is never explained with a binary-gate message.
pub(crate) struct Bridge<E: ?Sized + ErrorSource> {
    engine: Arc<E>,
}

impl<E: ?Sized + ErrorSource> Clone for Bridge<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

pub(crate) type PkeBridge = Bridge<dyn PkeEngine>;
pub(crate) type BinFheBridge = Bridge<dyn BinFheEngine>;

impl<E: ?Sized + ErrorSource> Bridge<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// The engine, for calls that cannot fail (destroys, pure queries).
    pub fn engine(&self) -> &E {
        self.engine.as_ref()
    }

    /// Runs an engine call and maps a failed status onto [`Error::Native`].
    pub fn call<T>(&self, op: &'static str, f: impl FnOnce(&E) -> EngineResult<T>) -> Result<T> {
        f(self.engine.as_ref()).map_err(|fault| self.failure(op, fault))
    }

    /// Runs an allocating call. A null handle behind an OK status is reported as
    /// [`Error::NullHandle`].
    pub fn alloc(&self, op: &'static str, f: impl FnOnce(&E) -> Alloc) -> Result<RawHandle> {
        self.call(op, f)?.ok_or(Error::NullHandle { op })
    }

    fn failure(&self, op: &'static str, fault: Fault) -> Error {
        let message = self
            .engine
            .take_error()
            .unwrap_or_else(|| E::UNKNOWN.to_owned());

        debug!(
            "{} {op} failed with status {}: {message}",
            E::SUBSYSTEM,
            fault.code
        );

        Error::Native {
            subsystem: E::SUBSYSTEM,
            op,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::{ErrorChannel, SchemeId};

    use super::*;

    /// An engine stand-in that only speaks to its error channel.
    struct Silent {
        errors: ErrorChannel,
    }

    impl ErrorSource for Silent {
        const SUBSYSTEM: Subsystem = Subsystem::Pke;
        const UNKNOWN: &'static str = UNKNOWN_PKE_ERROR;

        fn take_error(&self) -> Option<String> {
            self.errors.take()
        }
    }

    fn bridge() -> Bridge<Silent> {
        Bridge::new(Arc::new(Silent {
            errors: ErrorChannel::new(),
        }))
    }

    #[test]
    fn failures_carry_the_channel_message() {
        let bridge = bridge();

        let err = bridge
            .call("EvalMult", |e| e.errors.fail::<()>("no relinearization key"))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Native {
                subsystem: Subsystem::Pke,
                op: "EvalMult",
                ..
            }
        ));
        assert_eq!(err.to_string(), "no relinearization key");
        assert_eq!(bridge.engine().errors.take(), None);
    }

    #[test]
    fn silent_failures_get_the_fallback_message() {
        let err = bridge()
            .call("Encrypt", |_| Err::<(), _>(Fault::ERR))
            .unwrap_err();

        assert_eq!(err.native_message(), Some(UNKNOWN_PKE_ERROR));
    }

    #[test]
    fn null_handles_are_contract_violations() {
        let err = bridge().alloc("KeyGen", |_| Ok(None)).unwrap_err();

        assert!(matches!(err, Error::NullHandle { op: "KeyGen" }));
    }

    #[test]
    fn successes_pass_through() {
        let scheme = bridge().call("GetScheme", |_| Ok(SchemeId::Ckks)).unwrap();

        assert_eq!(scheme, SchemeId::Ckks);
    }
}
