//! CKKS bootstrapping.
use std::marker::PhantomData;

use log::debug;
use ofhe_engine::SecretKeyDist;

use crate::{
    Backend, Ciphertext, Ckks, CryptoContext, KeyPair, Result,
    schemeswitch::state::{Configured, Ready},
};

/// The level budget an empty budget stands for: levels spent on the
/// encoding and decoding linear transforms.
pub const DEFAULT_LEVEL_BUDGET: [u32; 2] = [5, 4];

/// The multiplicative depth bootstrapping consumes for `level_budget` (empty
/// means [`DEFAULT_LEVEL_BUDGET`]) and a secret key distribution. A context
/// must have at least this depth, plus whatever the caller wants to spend
/// between bootstraps.
pub fn bootstrap_depth(backend: &Backend, level_budget: &[u32], dist: SecretKeyDist) -> u32 {
    backend
        .pke()
        .engine()
        .bootstrap_depth(level_budget, dist)
}

impl CryptoContext<Ckks> {
    /// Precomputes the linear transforms for `level_budget` (empty for the
    /// default). Needs [`Feature::Fhe`](crate::Feature::Fhe).
    pub fn eval_bootstrap_setup(&self, level_budget: &[u32]) -> Result<()> {
        let cc = self.handle()?;

        self.pke()
            .call("EvalBootstrapSetup", |e| e.bootstrap_setup(cc, level_budget))
    }

    /// Generates bootstrapping keys for `keys` over `num_slots` slots (zero for
    /// all of them).
    pub fn eval_bootstrap_keygen(&self, keys: &KeyPair, num_slots: u32) -> Result<()> {
        let (cc, kp) = (self.handle()?, keys.handle()?);

        self.pke()
            .call("EvalBootstrapKeyGen", |e| e.bootstrap_keygen(cc, kp, num_slots))
    }

    /// Refreshes a ciphertext's levels.
    pub fn eval_bootstrap(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;

        self.ciphertext("EvalBootstrap", |e, cc| e.bootstrap(cc, ct))
    }
}

#[derive(Debug)]
/// Bootstrapping set up for one context.
///
/// # Example
/// ```rust
/// use ofhe::{Backend, Ckks, CryptoContext, Feature, Params, SecurityLevel, SecretKeyDist};
/// use ofhe::bootstrap::{Bootstrapper, bootstrap_depth};
///
/// let backend = Backend::simulated();
/// let budget = [4, 4];
///
/// let params = Params::<Ckks>::new(&backend).unwrap();
/// let depth = bootstrap_depth(&backend, &budget, SecretKeyDist::UniformTernary) + 2;
/// params.set_multiplicative_depth(depth).unwrap();
/// params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
/// params.set_ring_dim(4096).unwrap();
/// params.set_batch_size(8).unwrap();
///
/// let cc = CryptoContext::new(&params).unwrap();
/// cc.enable_all([
///     Feature::Pke,
///     Feature::KeySwitch,
///     Feature::LeveledShe,
///     Feature::AdvancedShe,
///     Feature::Fhe,
/// ])
///     .unwrap();
/// let keys = cc.keygen().unwrap();
/// cc.eval_mult_keygen(&keys).unwrap();
///
/// let bootstrapper = Bootstrapper::setup_simple(&cc, &budget).unwrap().keygen(&keys, 8).unwrap();
///
/// let ct = cc.encrypt(&keys, &cc.make_ckks_packed_plaintext(&[0.25, -0.5]).unwrap()).unwrap();
/// let refreshed = bootstrapper.bootstrap(&ct).unwrap();
/// assert_eq!(refreshed.level().unwrap(), depth - 2);
/// ```
pub struct Bootstrapper<'cc, St = Configured> {
    cc: &'cc CryptoContext<Ckks>,
    _state: PhantomData<St>,
}

impl<'cc> Bootstrapper<'cc, Configured> {
    /// Runs the setup with `level_budget` (empty for the default).
    pub fn setup_simple(cc: &'cc CryptoContext<Ckks>, level_budget: &[u32]) -> Result<Self> {
        cc.eval_bootstrap_setup(level_budget)?;
        debug!("bootstrap: setup done for level budget {level_budget:?}");

        Ok(Self {
            cc,
            _state: PhantomData,
        })
    }

    /// Generates bootstrapping keys for `keys` over `num_slots` slots.
    pub fn keygen(self, keys: &KeyPair, num_slots: u32) -> Result<Bootstrapper<'cc, Ready>> {
        self.cc.eval_bootstrap_keygen(keys, num_slots)?;
        debug!("bootstrap: keys generated for {num_slots} slots");

        Ok(Bootstrapper {
            cc: self.cc,
            _state: PhantomData,
        })
    }
}

impl Bootstrapper<'_, Ready> {
    /// Refreshes `ciphertext`. Repeatable.
    pub fn bootstrap(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        self.cc.eval_bootstrap(ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::{Feature, SecurityLevel};

    use super::*;
    use crate::{Params, test_utils::approx_eq};

    fn context(backend: &Backend, depth: u32) -> CryptoContext<Ckks> {
        let params = Params::<Ckks>::new(backend).unwrap();
        params.set_multiplicative_depth(depth).unwrap();
        params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
        params.set_ring_dim(1 << 12).unwrap();
        params.set_batch_size(8).unwrap();

        let cc = CryptoContext::new(&params).unwrap();
        cc.enable_all([
            Feature::Pke,
            Feature::KeySwitch,
            Feature::LeveledShe,
            Feature::AdvancedShe,
            Feature::Fhe,
        ])
        .unwrap();

        cc
    }

    #[test]
    fn depth_follows_budget_and_key_distribution() {
        let backend = Backend::simulated();

        assert_eq!(
            bootstrap_depth(&backend, &[4, 4], SecretKeyDist::UniformTernary),
            22
        );
        assert_eq!(
            bootstrap_depth(&backend, &[], SecretKeyDist::UniformTernary),
            bootstrap_depth(&backend, &DEFAULT_LEVEL_BUDGET, SecretKeyDist::UniformTernary)
        );
        assert!(
            bootstrap_depth(&backend, &[4, 4], SecretKeyDist::SparseTernary)
                < bootstrap_depth(&backend, &[4, 4], SecretKeyDist::UniformTernary)
        );
    }

    #[test]
    fn repeated_bootstraps_preserve_values() {
        let backend = Backend::simulated();
        let depth = bootstrap_depth(&backend, &[], SecretKeyDist::UniformTernary) + 3;
        let cc = context(&backend, depth);
        let keys = cc.keygen().unwrap();
        cc.eval_mult_keygen(&keys).unwrap();

        let bootstrapper = Bootstrapper::setup_simple(&cc, &[])
            .unwrap()
            .keygen(&keys, 8)
            .unwrap();

        let values = [0.5, -0.25, 0.125, 0.75];
        let mut ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
            .unwrap();

        for _ in 0..3 {
            ct = bootstrapper.bootstrap(&ct).unwrap();
            ct = cc.eval_add(&ct, &ct).unwrap();
            ct = cc
                .eval_mult_plain(&ct, &cc.make_ckks_packed_plaintext(&[0.5; 4]).unwrap())
                .unwrap();
        }

        let pt = cc.decrypt(&keys, &ct).unwrap();
        pt.set_length(values.len()).unwrap();

        assert!(approx_eq(&pt.real_packed_values().unwrap(), &values, 1e-2));
    }

    #[test]
    fn missing_steps_and_depth_are_reported() {
        let backend = Backend::simulated();
        let cc = context(&backend, 10);
        let keys = cc.keygen().unwrap();
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&[1.0]).unwrap())
            .unwrap();

        let err = cc.eval_bootstrap(&ct).unwrap_err();
        assert_eq!(
            err.native_message(),
            Some("EvalBootstrapSetup must be called before EvalBootstrap")
        );

        cc.eval_bootstrap_setup(&[]).unwrap();
        let err = cc.eval_bootstrap(&ct).unwrap_err();
        assert_eq!(
            err.native_message(),
            Some("EvalBootstrapKeyGen must be called before EvalBootstrap")
        );

        cc.eval_bootstrap_keygen(&keys, 8).unwrap();
        let err = cc.eval_bootstrap(&ct).unwrap_err();
        assert!(err.to_string().contains("multiplicative depth"), "{err}");

        assert!(Bootstrapper::setup_simple(&cc, &[3]).is_err());
        assert!(cc.eval_bootstrap_keygen(&keys, 6).is_err());
    }
}
