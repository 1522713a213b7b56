use std::marker::PhantomData;

use ofhe_engine::{
    KeySwitchTechnique, ParamSetting, RawHandle, ScalingTechnique, SchemeId, SecretKeyDist,
    SecurityLevel,
};

use crate::{
    Backend, Result,
    handle::{Owned, Resource},
};

mod sealed {
    pub trait Sealed {}
}

/// A lattice scheme a [`Params`] or [`CryptoContext`](crate::CryptoContext) is
/// built for.
pub trait Scheme: sealed::Sealed + Send + Sync + 'static {
    /// The engine's identifier for this scheme.
    const ID: SchemeId;
}

/// A scheme over integers modulo a plaintext modulus: [`Bfv`] and [`Bgv`].
pub trait IntegerScheme: Scheme {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Brakerski/Fan-Vercauteren: exact integer arithmetic, scale-invariant.
pub struct Bfv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Brakerski-Gentry-Vaikuntanathan: exact integer arithmetic with modulus
/// switching.
pub struct Bgv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Cheon-Kim-Kim-Song: approximate arithmetic over real and complex numbers.
pub struct Ckks;

macro_rules! scheme {
    ($name:ident, $id:expr) => {
        impl sealed::Sealed for $name {}

        impl Scheme for $name {
            const ID: SchemeId = $id;
        }
    };
}

scheme!(Bfv, SchemeId::Bfv);
scheme!(Bgv, SchemeId::Bgv);
scheme!(Ckks, SchemeId::Ckks);

impl IntegerScheme for Bfv {}
impl IntegerScheme for Bgv {}

pub(crate) struct ParamsRes<S>(PhantomData<S>);

impl<S: Scheme> Resource for ParamsRes<S> {
    const KIND: &'static str = "Params";

    fn release(backend: &Backend, handle: RawHandle) {
        backend.pke().engine().params_destroy(S::ID, handle);
    }
}

#[derive(Debug)]
/// A mutable parameter set from which [`CryptoContext`](crate::CryptoContext)s
/// are generated.
///
/// # Remarks
/// Settings are applied immediately; the engine validates each one as it is
/// set and the combination when a context is generated. Anything left unset
/// takes the engine default, e.g. a ring dimension chosen for the security
/// level and modulus chain.
///
/// A context copies its parameters, so the parameter set may be closed (or
/// reused for more contexts) once the context exists. Setters on a closed
/// parameter set fail with [`Error::Closed`](crate::Error::Closed).
///
/// # Example
/// ```rust
/// use ofhe::{Backend, Bfv, CryptoContext, Params};
///
/// let backend = Backend::simulated();
/// let params = Params::<Bfv>::new(&backend).unwrap();
/// params.set_plaintext_modulus(65537).unwrap();
/// params.set_multiplicative_depth(2).unwrap();
///
/// let cc = CryptoContext::new(&params).unwrap();
/// params.close();
///
/// assert!(cc.ring_dimension().unwrap() >= 1024);
/// ```
pub struct Params<S: Scheme> {
    inner: Owned<ParamsRes<S>>,
}

impl<S: Scheme> Params<S> {
    /// Allocates a parameter set with every setting at its engine default.
    pub fn new(backend: &Backend) -> Result<Self> {
        let handle = backend
            .pke()
            .alloc("NewParams", |engine| engine.params_new(S::ID))?;

        Ok(Self {
            inner: Owned::new(backend, handle),
        })
    }

    fn set(&self, setting: ParamSetting) -> Result<()> {
        let handle = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call(setting.name(), |engine| engine.params_set(S::ID, handle, setting))
    }

    /// The number of sequential multiplications the modulus chain supports.
    pub fn set_multiplicative_depth(&self, depth: u32) -> Result<()> {
        self.set(ParamSetting::MultiplicativeDepth(depth))
    }

    /// The security level the ring dimension is chosen (or checked) for.
    pub fn set_security_level(&self, level: SecurityLevel) -> Result<()> {
        self.set(ParamSetting::SecurityLevel(level))
    }

    /// Forces the ring dimension. The engine rejects dimensions too small for
    /// the security level unless it is [`SecurityLevel::HeStdNotSet`].
    pub fn set_ring_dim(&self, ring_dim: u64) -> Result<()> {
        self.set(ParamSetting::RingDim(ring_dim))
    }

    /// The backend this parameter set lives in.
    pub fn backend(&self) -> &Backend {
        self.inner.backend()
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the parameter set. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`Params::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<S: IntegerScheme> Params<S> {
    /// The plaintext modulus `t`. Packed encoding needs a prime `t` with
    /// `t = 1 mod 2N`. Required before a context can be generated.
    pub fn set_plaintext_modulus(&self, modulus: u64) -> Result<()> {
        self.set(ParamSetting::PlaintextModulus(modulus))
    }
}

impl Params<Ckks> {
    /// Bit size of the scaling factor (and of each rescaling prime).
    pub fn set_scaling_mod_size(&self, bits: u32) -> Result<()> {
        self.set(ParamSetting::ScalingModSize(bits))
    }

    /// Number of slots to use. Zero (the default) means half the ring
    /// dimension.
    pub fn set_batch_size(&self, slots: u32) -> Result<()> {
        self.set(ParamSetting::BatchSize(slots))
    }

    /// How scale is managed after multiplication.
    pub fn set_scaling_technique(&self, technique: ScalingTechnique) -> Result<()> {
        self.set(ParamSetting::ScalingTechnique(technique))
    }

    /// Bit size of the first prime in the modulus chain, which bounds the
    /// precision of decrypted values.
    pub fn set_first_mod_size(&self, bits: u32) -> Result<()> {
        self.set(ParamSetting::FirstModSize(bits))
    }

    /// Digit count for hybrid key switching.
    pub fn set_num_large_digits(&self, digits: u32) -> Result<()> {
        self.set(ParamSetting::NumLargeDigits(digits))
    }

    /// The secret key distribution. Bootstrapping depth depends on it.
    pub fn set_secret_key_dist(&self, dist: SecretKeyDist) -> Result<()> {
        self.set(ParamSetting::SecretKeyDist(dist))
    }

    /// The key switching method.
    pub fn set_key_switch_technique(&self, technique: KeySwitchTechnique) -> Result<()> {
        self.set(ParamSetting::KeySwitchTechnique(technique))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn settings_are_validated_as_they_are_applied() {
        let backend = Backend::simulated();
        let params = Params::<Bgv>::new(&backend).unwrap();

        params.set_plaintext_modulus(65537).unwrap();
        params.set_multiplicative_depth(3).unwrap();
        params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();

        assert!(matches!(
            params.set_ring_dim(1000),
            Err(Error::Native { op: "SetRingDim", .. })
        ));
    }

    #[test]
    fn closed_params_reject_setters() {
        let backend = Backend::simulated();
        let params = Params::<Ckks>::new(&backend).unwrap();

        params.close();
        params.close();

        assert!(params.is_closed());
        assert_eq!(
            params.set_scaling_mod_size(50).unwrap_err().to_string(),
            "Params is closed or invalid"
        );
    }
}
