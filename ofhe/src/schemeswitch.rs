//! Switching between CKKS and FHEW ciphertexts.
//!
//! Three protocols move data across the two schemes, each a typed builder whose
//! steps have to run in order:
//! * [`CkksToFhew`]: setup, keygen, precompute, then any number of switches
//!   producing [`LweCiphertext`]s.
//! * [`FhewToCkks`]: setup against a binary-gate context, keygen, then any
//!   number of switches packing LWE ciphertexts back into CKKS slots.
//! * [`SchemeSwitching`]: both directions at once, which comparisons and
//!   min/max (see [`crate::minmax`]) are built on.
//!
//! A failed step consumes the builder; the engine state it leaves behind is
//! replaced by the next setup. The raw steps are also available on
//! [`CryptoContext<Ckks>`] for callers who manage the sequencing themselves.
use std::marker::PhantomData;

use log::debug;
use ofhe_engine::{
    Alloc, BinFheParamSet, PkeEngine, RawHandle, SchSwchSetting, SchSwchSummary, SecurityLevel,
};

use crate::{
    BinFheContextRef, BinFheSecretKey, Ciphertext, Ckks, CryptoContext, Error, KeyPair,
    LweCiphertext, Result,
    handle::{Owned, resource},
};

resource!(SchSwchParamsRes, "SchSwchParams", |backend, handle| backend
    .pke()
    .engine()
    .schswch_params_destroy(handle));

resource!(LwePrivateKeyRes, "LWEPrivateKey", |backend, handle| backend
    .pke()
    .engine()
    .lwe_private_key_destroy(handle));

/// The plaintext an LWE ciphertext switched from a CKKS slot holding `x`
/// decrypts to: `x` rounded half to even, reduced into `[0, p_lwe)`.
///
/// The value is expected to have been scaled by `1 / p_lwe` during the
/// precomputation so that integers survive the switch.
pub fn expected_lwe_plaintext(x: f64, p_lwe: u64) -> u64 {
    let rounded = x.round_ties_even() as i128;

    rounded.rem_euclid(p_lwe.max(1) as i128) as u64
}

#[derive(Debug)]
/// Scheme-switching parameters.
///
/// # Remarks
/// Unset fields take the engine defaults: 128-bit security on both sides, every
/// slot of the context, a 25-bit large-precision FHEW modulus and one-hot
/// argmin output.
pub struct SchSwchParams {
    inner: Owned<SchSwchParamsRes>,
}

impl SchSwchParams {
    /// Allocates a parameter block with the engine defaults.
    pub fn new(backend: &crate::Backend) -> Result<Self> {
        let handle = backend
            .pke()
            .alloc("SchSwchParams", |e| e.schswch_params_new())?;

        Ok(Self {
            inner: Owned::new(backend, handle),
        })
    }

    fn set(&self, op: &'static str, setting: SchSwchSetting) -> Result<()> {
        let params = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call(op, |e| e.schswch_params_set(params, setting))
    }

    fn summary(&self) -> Result<SchSwchSummary> {
        let params = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call("SchSwchParams", |e| e.schswch_params_summary(params))
    }

    /// Security level of the CKKS side.
    pub fn set_security_level_ckks(&self, level: SecurityLevel) -> Result<()> {
        self.set(
            "SetSecurityLevelCKKS",
            SchSwchSetting::SecurityLevelCkks(level),
        )
    }

    /// Parameter set of the FHEW side.
    pub fn set_security_level_fhew(&self, param_set: BinFheParamSet) -> Result<()> {
        self.set(
            "SetSecurityLevelFHEW",
            SchSwchSetting::SecurityLevelFhew(param_set),
        )
    }

    /// Number of CKKS slots taking part. Zero means all of them.
    pub fn set_num_slots_ckks(&self, slots: u32) -> Result<()> {
        self.set("SetNumSlotsCKKS", SchSwchSetting::NumSlotsCkks(slots))
    }

    /// Number of values to switch. Zero means one per slot.
    pub fn set_num_values(&self, values: u32) -> Result<()> {
        self.set("SetNumValues", SchSwchSetting::NumValues(values))
    }

    /// Bit size of the large-precision FHEW ciphertext modulus.
    pub fn set_ctxt_mod_size_fhew_large_prec(&self, bits: u32) -> Result<()> {
        self.set(
            "SetCtxtModSizeFHEWLargePrec",
            SchSwchSetting::CtxtModSizeFhewLargePrec(bits),
        )
    }

    /// Generate the keys argmin and argmax need.
    pub fn set_compute_argmin(&self, flag: bool) -> Result<()> {
        self.set("SetComputeArgmin", SchSwchSetting::ComputeArgmin(flag))
    }

    /// Use the slower, more precise argmin.
    pub fn set_use_alt_argmin(&self, flag: bool) -> Result<()> {
        self.set("SetUseAltArgmin", SchSwchSetting::UseAltArgmin(flag))
    }

    /// Generate the keys for arbitrary function evaluation.
    pub fn set_arbitrary_function_evaluation(&self, flag: bool) -> Result<()> {
        self.set(
            "SetArbitraryFunctionEvaluation",
            SchSwchSetting::ArbitraryFunctionEvaluation(flag),
        )
    }

    /// Return argmin/argmax as a one-hot vector instead of an index.
    pub fn set_one_hot_encoding(&self, flag: bool) -> Result<()> {
        self.set("SetOneHotEncoding", SchSwchSetting::OneHotEncoding(flag))
    }

    /// Security level of the CKKS side.
    pub fn security_level_ckks(&self) -> Result<SecurityLevel> {
        Ok(self.summary()?.security_level_ckks)
    }

    /// Parameter set of the FHEW side.
    pub fn security_level_fhew(&self) -> Result<BinFheParamSet> {
        Ok(self.summary()?.security_level_fhew)
    }

    /// Number of CKKS slots.
    pub fn num_slots_ckks(&self) -> Result<u32> {
        Ok(self.summary()?.num_slots_ckks)
    }

    /// Number of values.
    pub fn num_values(&self) -> Result<u32> {
        Ok(self.summary()?.num_values)
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the parameter block. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`SchSwchParams::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[derive(Debug)]
/// The LWE secret a CKKS to FHEW setup switches into. Decrypts the
/// [`LweCiphertext`]s a switch produces with
/// [`BinFheContextRef::decrypt_lwe`].
pub struct LwePrivateKey {
    inner: Owned<LwePrivateKeyRes>,
}

impl LwePrivateKey {
    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the key. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`LwePrivateKey::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl CryptoContext<Ckks> {
    fn lwe_private_key(
        &self,
        op: &'static str,
        params: &SchSwchParams,
        f: impl FnOnce(&dyn PkeEngine, RawHandle, RawHandle) -> Alloc,
    ) -> Result<LwePrivateKey> {
        let (cc, params) = (self.handle()?, params.handle()?);
        let handle = self.pke().alloc(op, |e| f(e, cc, params))?;

        Ok(LwePrivateKey {
            inner: Owned::new(self.backend(), handle),
        })
    }

    /// Prepares a CKKS to FHEW switch. Replaces any previous switching setup.
    pub fn eval_ckks_to_fhew_setup(&self, params: &SchSwchParams) -> Result<LwePrivateKey> {
        self.lwe_private_key("EvalCKKStoFHEWSetup", params, |e, cc, params| {
            e.ckks_to_fhew_setup(cc, params)
        })
    }

    /// Generates the CKKS to FHEW switching keys.
    pub fn eval_ckks_to_fhew_keygen(&self, keys: &KeyPair, lwe_key: &LwePrivateKey) -> Result<()> {
        let (cc, kp, lwe) = (self.handle()?, keys.handle()?, lwe_key.handle()?);

        self.pke()
            .call("EvalCKKStoFHEWKeyGen", |e| e.ckks_to_fhew_keygen(cc, kp, lwe))
    }

    /// Fixes the scale applied to slot values before they are switched.
    pub fn eval_ckks_to_fhew_precompute(&self, scale: f64) -> Result<()> {
        let cc = self.handle()?;

        self.pke().call("EvalCKKStoFHEWPrecompute", |e| {
            e.ckks_to_fhew_precompute(cc, scale)
        })
    }

    /// Switches the first `num_values` slots (zero: every switched slot) into
    /// LWE ciphertexts.
    pub fn eval_ckks_to_fhew(
        &self,
        ciphertext: &Ciphertext,
        num_values: u32,
    ) -> Result<Vec<LweCiphertext>> {
        let (cc, ct) = (self.handle()?, ciphertext.handle()?);

        let handles = self
            .pke()
            .call("EvalCKKStoFHEW", |e| e.ckks_to_fhew(cc, ct, num_values))?;

        Ok(handles
            .into_iter()
            .map(|h| LweCiphertext::from_handle(self.backend(), h))
            .collect())
    }

    /// Prepares an FHEW to CKKS switch from `bin_cc`. Zero `num_slots` means
    /// every slot; zero `log_q` takes the modulus of `bin_cc`.
    pub fn eval_fhew_to_ckks_setup(
        &self,
        bin_cc: BinFheContextRef<'_>,
        num_slots: u32,
        log_q: u32,
    ) -> Result<()> {
        let (cc, bin) = (self.handle()?, bin_cc.handle()?);

        self.pke().call("EvalFHEWtoCKKSSetup", |e| {
            e.fhew_to_ckks_setup(cc, bin, num_slots, log_q)
        })
    }

    /// Generates the FHEW to CKKS switching keys for an LWE secret of the
    /// binary-gate context passed to setup.
    pub fn eval_fhew_to_ckks_keygen(
        &self,
        keys: &KeyPair,
        lwe_key: &BinFheSecretKey,
    ) -> Result<()> {
        let (cc, kp, lwe) = (self.handle()?, keys.handle()?, lwe_key.handle()?);

        self.pke()
            .call("EvalFHEWtoCKKSKeyGen", |e| e.fhew_to_ckks_keygen(cc, kp, lwe))
    }

    fn fhew_to_ckks(
        &self,
        ciphertexts: &[LweCiphertext],
        num_slots: u32,
        p: u32,
        range: Option<(f64, f64)>,
    ) -> Result<Ciphertext> {
        let op = "EvalFHEWtoCKKS";

        if ciphertexts.is_empty() {
            return Err(Error::InvalidArgument {
                op,
                message: "LWE ciphertext array is empty".to_owned(),
            });
        }

        let handles = ciphertexts
            .iter()
            .map(LweCiphertext::handle)
            .collect::<Result<Vec<_>>>()?;

        self.ciphertext(op, |e, cc| e.fhew_to_ckks(cc, &handles, num_slots, p, range))
    }

    /// Packs LWE ciphertexts into the leading slots of a CKKS ciphertext. Each
    /// decodes modulo `p` into `[0, p)`.
    pub fn eval_fhew_to_ckks(
        &self,
        ciphertexts: &[LweCiphertext],
        num_slots: u32,
        p: u32,
    ) -> Result<Ciphertext> {
        self.fhew_to_ckks(ciphertexts, num_slots, p, None)
    }

    /// Like [`CryptoContext::eval_fhew_to_ckks`], with the output interval
    /// `[pmin, pmax)` instead of `[0, p)`.
    pub fn eval_fhew_to_ckks_ext(
        &self,
        ciphertexts: &[LweCiphertext],
        num_slots: u32,
        p: u32,
        pmin: f64,
        pmax: f64,
    ) -> Result<Ciphertext> {
        self.fhew_to_ckks(ciphertexts, num_slots, p, Some((pmin, pmax)))
    }

    /// Prepares switching in both directions. Replaces any previous setup.
    pub fn eval_scheme_switching_setup(&self, params: &SchSwchParams) -> Result<LwePrivateKey> {
        self.lwe_private_key("EvalSchemeSwitchingSetup", params, |e, cc, params| {
            e.scheme_switching_setup(cc, params)
        })
    }

    /// Generates the keys for both directions, including the bootstrapping keys
    /// of the borrowed binary-gate context.
    pub fn eval_scheme_switching_keygen(
        &self,
        keys: &KeyPair,
        lwe_key: &LwePrivateKey,
    ) -> Result<()> {
        let (cc, kp, lwe) = (self.handle()?, keys.handle()?, lwe_key.handle()?);

        self.pke().call("EvalSchemeSwitchingKeyGen", |e| {
            e.scheme_switching_keygen(cc, kp, lwe)
        })
    }

    /// The binary-gate context this context switches into. Borrowed: it lives
    /// as long as this context and the current switching setup.
    pub fn bin_cc_for_scheme_switch(&self) -> Result<BinFheContextRef<'_>> {
        let cc = self.handle()?;
        let bin = self
            .pke()
            .alloc("GetBinCCForSchemeSwitch", |e| e.bin_cc_for_scheme_switch(cc))?;

        Ok(BinFheContextRef::new(self.backend(), bin))
    }

    /// Prepares comparisons. `p_lwe = 0` selects the engine's plaintext
    /// modulus.
    pub fn eval_compare_switch_precompute(&self, p_lwe: u32, scale_sign: f64) -> Result<()> {
        let cc = self.handle()?;

        self.pke().call("EvalCompareSwitchPrecompute", |e| {
            e.compare_switch_precompute(cc, p_lwe, scale_sign)
        })
    }

    /// Slot-wise `a < b`: 1 where it holds, 0 elsewhere.
    pub fn eval_compare_scheme_switching(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<Ciphertext> {
        let (a, b) = (a.handle()?, b.handle()?);

        self.ciphertext("EvalCompareSchemeSwitching", |e, cc| {
            e.eval_compare_scheme_switching(cc, a, b, num_values, num_slots, p_lwe, scale_sign)
        })
    }
}

/// Builder states.
pub mod state {
    /// Setup has run; keys are next.
    #[derive(Debug)]
    pub struct Configured;

    /// Keys exist; a precomputation is next.
    #[derive(Debug)]
    pub struct Keyed;

    /// Ready to switch or compare.
    #[derive(Debug)]
    pub struct Ready;
}

use state::{Configured, Keyed, Ready};

#[derive(Debug)]
/// A CKKS to FHEW switch.
///
/// # Example
/// ```rust
/// use ofhe::{
///     Backend, Ckks, CryptoContext, Feature, Params, SecurityLevel,
///     schemeswitch::{CkksToFhew, SchSwchParams, expected_lwe_plaintext},
/// };
///
/// let backend = Backend::simulated();
/// let params = Params::<Ckks>::new(&backend).unwrap();
/// params.set_batch_size(8).unwrap();
/// params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
/// params.set_ring_dim(4096).unwrap();
///
/// let cc = CryptoContext::new(&params).unwrap();
/// cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe, Feature::SchemeSwitch])
///     .unwrap();
/// let keys = cc.keygen().unwrap();
///
/// let switch_params = SchSwchParams::new(&backend).unwrap();
/// let switch = CkksToFhew::setup(&cc, &switch_params).unwrap().keygen(&keys).unwrap();
///
/// let p = switch.bin_cc().unwrap().max_plaintext_space().unwrap() as u64;
/// let switch = switch.precompute(1.0 / p as f64).unwrap();
///
/// let ct = cc.encrypt(&keys, &cc.make_ckks_packed_plaintext(&[3.0, -2.0]).unwrap()).unwrap();
/// let lwe = switch.switch(&ct, 2).unwrap();
///
/// let bin_cc = switch.bin_cc().unwrap();
/// let m = bin_cc.decrypt_lwe(switch.lwe_private_key(), &lwe[1], p).unwrap();
/// assert_eq!(m, expected_lwe_plaintext(-2.0, p));
/// ```
pub struct CkksToFhew<'cc, St = Configured> {
    cc: &'cc CryptoContext<Ckks>,
    lwe_key: LwePrivateKey,
    _state: PhantomData<St>,
}

impl<'cc, St> CkksToFhew<'cc, St> {
    fn advance<Next>(self) -> CkksToFhew<'cc, Next> {
        CkksToFhew {
            cc: self.cc,
            lwe_key: self.lwe_key,
            _state: PhantomData,
        }
    }

    /// The LWE secret the switch targets.
    pub fn lwe_private_key(&self) -> &LwePrivateKey {
        &self.lwe_key
    }

    /// The binary-gate context the switched ciphertexts live in.
    pub fn bin_cc(&self) -> Result<BinFheContextRef<'cc>> {
        self.cc.bin_cc_for_scheme_switch()
    }
}

impl<'cc> CkksToFhew<'cc, Configured> {
    /// Runs the setup.
    pub fn setup(cc: &'cc CryptoContext<Ckks>, params: &SchSwchParams) -> Result<Self> {
        let lwe_key = cc.eval_ckks_to_fhew_setup(params)?;
        debug!("CKKS to FHEW: setup done");

        Ok(Self {
            cc,
            lwe_key,
            _state: PhantomData,
        })
    }

    /// Generates the switching keys for `keys`.
    pub fn keygen(self, keys: &KeyPair) -> Result<CkksToFhew<'cc, Keyed>> {
        self.cc.eval_ckks_to_fhew_keygen(keys, &self.lwe_key)?;
        debug!("CKKS to FHEW: keys generated");

        Ok(self.advance())
    }
}

impl<'cc> CkksToFhew<'cc, Keyed> {
    /// Fixes the scale applied to slot values before they are switched.
    pub fn precompute(self, scale: f64) -> Result<CkksToFhew<'cc, Ready>> {
        self.cc.eval_ckks_to_fhew_precompute(scale)?;
        debug!("CKKS to FHEW: precomputed for scale {scale}");

        Ok(self.advance())
    }
}

impl CkksToFhew<'_, Ready> {
    /// Switches the first `num_values` slots of `ciphertext`.
    pub fn switch(&self, ciphertext: &Ciphertext, num_values: u32) -> Result<Vec<LweCiphertext>> {
        self.cc.eval_ckks_to_fhew(ciphertext, num_values)
    }
}

#[derive(Debug)]
/// An FHEW to CKKS switch from a binary-gate context.
pub struct FhewToCkks<'cc, St = Configured> {
    cc: &'cc CryptoContext<Ckks>,
    _state: PhantomData<St>,
}

impl<'cc> FhewToCkks<'cc, Configured> {
    /// Runs the setup against `bin_cc`.
    pub fn setup(
        cc: &'cc CryptoContext<Ckks>,
        bin_cc: BinFheContextRef<'_>,
        num_slots: u32,
        log_q: u32,
    ) -> Result<Self> {
        cc.eval_fhew_to_ckks_setup(bin_cc, num_slots, log_q)?;
        debug!("FHEW to CKKS: setup done");

        Ok(Self {
            cc,
            _state: PhantomData,
        })
    }

    /// Generates the switching keys from the LWE secret `lwe_key` into `keys`.
    pub fn keygen(
        self,
        keys: &KeyPair,
        lwe_key: &BinFheSecretKey,
    ) -> Result<FhewToCkks<'cc, Ready>> {
        self.cc.eval_fhew_to_ckks_keygen(keys, lwe_key)?;
        debug!("FHEW to CKKS: keys generated");

        Ok(FhewToCkks {
            cc: self.cc,
            _state: PhantomData,
        })
    }
}

impl FhewToCkks<'_, Ready> {
    /// Packs `ciphertexts` into CKKS slots, decoded modulo `p`.
    pub fn switch(
        &self,
        ciphertexts: &[LweCiphertext],
        num_slots: u32,
        p: u32,
    ) -> Result<Ciphertext> {
        self.cc.eval_fhew_to_ckks(ciphertexts, num_slots, p)
    }

    /// Packs `ciphertexts` with the output interval `[pmin, pmax)`.
    pub fn switch_ext(
        &self,
        ciphertexts: &[LweCiphertext],
        num_slots: u32,
        p: u32,
        pmin: f64,
        pmax: f64,
    ) -> Result<Ciphertext> {
        self.cc
            .eval_fhew_to_ckks_ext(ciphertexts, num_slots, p, pmin, pmax)
    }
}

#[derive(Debug)]
/// Switching in both directions, for comparisons and min/max.
///
/// # Remarks
/// Comparisons need the precision settings fixed by
/// [`SchemeSwitching::compare_precompute`]; the min/max evaluations in
/// [`crate::minmax`] reuse them.
pub struct SchemeSwitching<'cc, St = Configured> {
    pub(crate) cc: &'cc CryptoContext<Ckks>,
    lwe_key: LwePrivateKey,
    pub(crate) p_lwe: u32,
    pub(crate) scale_sign: f64,
    _state: PhantomData<St>,
}

impl<'cc, St> SchemeSwitching<'cc, St> {
    fn advance<Next>(self) -> SchemeSwitching<'cc, Next> {
        SchemeSwitching {
            cc: self.cc,
            lwe_key: self.lwe_key,
            p_lwe: self.p_lwe,
            scale_sign: self.scale_sign,
            _state: PhantomData,
        }
    }

    /// The LWE secret of the FHEW side.
    pub fn lwe_private_key(&self) -> &LwePrivateKey {
        &self.lwe_key
    }

    /// The binary-gate context of the FHEW side.
    pub fn bin_cc(&self) -> Result<BinFheContextRef<'cc>> {
        self.cc.bin_cc_for_scheme_switch()
    }
}

impl<'cc> SchemeSwitching<'cc, Configured> {
    /// Runs the setup.
    pub fn setup(cc: &'cc CryptoContext<Ckks>, params: &SchSwchParams) -> Result<Self> {
        let lwe_key = cc.eval_scheme_switching_setup(params)?;
        debug!("scheme switching: setup done");

        Ok(Self {
            cc,
            lwe_key,
            p_lwe: 0,
            scale_sign: 1.0,
            _state: PhantomData,
        })
    }

    /// Generates the keys for both directions.
    pub fn keygen(self, keys: &KeyPair) -> Result<SchemeSwitching<'cc, Keyed>> {
        self.cc.eval_scheme_switching_keygen(keys, &self.lwe_key)?;
        debug!("scheme switching: keys generated");

        Ok(self.advance())
    }
}

impl<'cc> SchemeSwitching<'cc, Keyed> {
    /// Fixes the FHEW plaintext modulus (zero: engine default) and the scale
    /// applied before sign evaluation.
    pub fn compare_precompute(
        self,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<SchemeSwitching<'cc, Ready>> {
        self.cc.eval_compare_switch_precompute(p_lwe, scale_sign)?;
        debug!("scheme switching: comparison precomputed (pLWE {p_lwe}, scale {scale_sign})");

        let mut next = self.advance::<Ready>();
        next.p_lwe = p_lwe;
        next.scale_sign = scale_sign;

        Ok(next)
    }
}

impl SchemeSwitching<'_, Ready> {
    /// Slot-wise `a < b` over the first `num_values` of `num_slots` slots.
    pub fn compare(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        num_values: u32,
        num_slots: u32,
    ) -> Result<Ciphertext> {
        self.cc.eval_compare_scheme_switching(
            a,
            b,
            num_values,
            num_slots,
            self.p_lwe,
            self.scale_sign,
        )
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::{BinFheMethod, Feature, SecurityLevel};

    use super::*;
    use crate::{Backend, BinFheContext, Error, Params, test_utils::approx_eq};

    fn switch_context(backend: &Backend) -> CryptoContext<Ckks> {
        let params = Params::<Ckks>::new(backend).unwrap();
        params.set_multiplicative_depth(2).unwrap();
        params.set_batch_size(8).unwrap();
        params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
        params.set_ring_dim(1 << 12).unwrap();

        let cc = CryptoContext::new(&params).unwrap();
        cc.enable_all([
            Feature::Pke,
            Feature::KeySwitch,
            Feature::LeveledShe,
            Feature::SchemeSwitch,
        ])
        .unwrap();

        cc
    }

    #[test]
    fn lwe_plaintexts_round_half_to_even() {
        assert_eq!(expected_lwe_plaintext(2.5, 16), 2);
        assert_eq!(expected_lwe_plaintext(3.5, 16), 4);
        assert_eq!(expected_lwe_plaintext(-1.0, 16), 15);
        assert_eq!(expected_lwe_plaintext(17.2, 16), 1);
    }

    #[test]
    fn params_read_back() {
        let backend = Backend::simulated();
        let params = SchSwchParams::new(&backend).unwrap();
        params.set_num_slots_ckks(8).unwrap();
        params.set_num_values(4).unwrap();
        params.set_security_level_fhew(BinFheParamSet::Toy).unwrap();
        params
            .set_security_level_ckks(SecurityLevel::HeStdNotSet)
            .unwrap();

        assert_eq!(params.num_slots_ckks().unwrap(), 8);
        assert_eq!(params.num_values().unwrap(), 4);
        assert_eq!(params.security_level_fhew().unwrap(), BinFheParamSet::Toy);
        assert_eq!(
            params.security_level_ckks().unwrap(),
            SecurityLevel::HeStdNotSet
        );

        assert!(params.set_ctxt_mod_size_fhew_large_prec(2).is_err());
    }

    #[test]
    fn ckks_to_fhew_decodes_integers() {
        let backend = Backend::simulated();
        let cc = switch_context(&backend);
        let keys = cc.keygen().unwrap();

        let params = SchSwchParams::new(&backend).unwrap();
        params.set_ctxt_mod_size_fhew_large_prec(25).unwrap();

        let switch = CkksToFhew::setup(&cc, &params)
            .unwrap()
            .keygen(&keys)
            .unwrap();
        let p = switch.bin_cc().unwrap().max_plaintext_space().unwrap() as u64;
        let switch = switch.precompute(1.0 / p as f64).unwrap();

        let values = [0.0, 1.0, 7.0, -3.0, 1000.0];
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
            .unwrap();
        let lwe = switch.switch(&ct, values.len() as u32).unwrap();
        let bin_cc = switch.bin_cc().unwrap();

        assert_eq!(lwe.len(), values.len());
        for (ct, x) in lwe.iter().zip(values) {
            let m = bin_cc.decrypt_lwe(switch.lwe_private_key(), ct, p).unwrap();

            assert_eq!(m, expected_lwe_plaintext(x, p));
        }
    }

    #[test]
    fn raw_steps_report_missing_prerequisites() {
        let backend = Backend::simulated();
        let cc = switch_context(&backend);
        let keys = cc.keygen().unwrap();
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&[1.0]).unwrap())
            .unwrap();

        let err = cc.eval_ckks_to_fhew(&ct, 1).unwrap_err();
        assert_eq!(
            err.native_message(),
            Some("EvalCKKStoFHEWSetup must be called before EvalCKKStoFHEW")
        );

        let params = SchSwchParams::new(&backend).unwrap();
        let lwe_key = cc.eval_ckks_to_fhew_setup(&params).unwrap();
        cc.eval_ckks_to_fhew_keygen(&keys, &lwe_key).unwrap();

        let err = cc.eval_ckks_to_fhew(&ct, 1).unwrap_err();
        assert_eq!(
            err.native_message(),
            Some("EvalCKKStoFHEWPrecompute must be called before EvalCKKStoFHEW")
        );

        let err = cc.eval_compare_switch_precompute(0, 1.0).unwrap_err();
        assert!(
            err.to_string()
                .contains("EvalSchemeSwitchingKeyGen must be called before"),
            "{err}"
        );
    }

    #[test]
    fn closed_parameters_and_lwe_keys_reject_use() {
        let backend = Backend::simulated();
        let cc = switch_context(&backend);
        let keys = cc.keygen().unwrap();

        let params = SchSwchParams::new(&backend).unwrap();
        let lwe_key = cc.eval_ckks_to_fhew_setup(&params).unwrap();

        params.close();
        params.close();
        assert!(params.is_closed());
        assert!(matches!(
            params.num_values(),
            Err(Error::Closed {
                kind: "SchSwchParams"
            })
        ));
        assert!(matches!(
            cc.eval_ckks_to_fhew_setup(&params),
            Err(Error::Closed {
                kind: "SchSwchParams"
            })
        ));

        lwe_key.close();
        lwe_key.close();
        assert!(lwe_key.is_closed());
        assert!(matches!(
            cc.eval_ckks_to_fhew_keygen(&keys, &lwe_key),
            Err(Error::Closed {
                kind: "LWEPrivateKey"
            })
        ));
    }

    #[test]
    fn fhew_to_ckks_packs_bits() {
        let backend = Backend::simulated();
        let cc = switch_context(&backend);
        let keys = cc.keygen().unwrap();

        let bin_cc = BinFheContext::new(&backend).unwrap();
        bin_cc
            .generate(BinFheParamSet::Toy, BinFheMethod::Ginx)
            .unwrap();
        let lwe_sk = bin_cc.keygen().unwrap();

        let switch = FhewToCkks::setup(&cc, bin_cc.view().unwrap(), 8, 0)
            .unwrap()
            .keygen(&keys, &lwe_sk)
            .unwrap();

        let bits = [true, false, true, true];
        let lwe = bits
            .iter()
            .map(|b| bin_cc.encrypt(&lwe_sk, *b).unwrap())
            .collect::<Vec<_>>();

        let ct = switch.switch(&lwe, 8, 4).unwrap();
        let pt = cc.decrypt(&keys, &ct).unwrap();
        pt.set_length(4).unwrap();

        assert!(approx_eq(
            &pt.real_packed_values().unwrap(),
            &[1.0, 0.0, 1.0, 1.0],
            1e-3
        ));

        let err = switch.switch(&[], 8, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(
            err.to_string(),
            "EvalFHEWtoCKKS: LWE ciphertext array is empty"
        );
    }

    #[test]
    fn bidirectional_keys_bootstrap_the_borrowed_context() {
        let backend = Backend::simulated();
        let cc = switch_context(&backend);
        let keys = cc.keygen().unwrap();

        let params = SchSwchParams::new(&backend).unwrap();
        let switch = SchemeSwitching::setup(&cc, &params)
            .unwrap()
            .keygen(&keys)
            .unwrap();
        let bin_cc = switch.bin_cc().unwrap();
        let p = bin_cc.max_plaintext_space().unwrap() as u64;

        cc.eval_ckks_to_fhew_precompute(1.0 / p as f64).unwrap();
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&[3.0, -2.0]).unwrap())
            .unwrap();
        let lwe = cc.eval_ckks_to_fhew(&ct, 2).unwrap();

        let signs = lwe
            .iter()
            .map(|ct| {
                let sign = bin_cc.eval_sign(ct).unwrap();
                bin_cc
                    .decrypt_lwe(switch.lwe_private_key(), &sign, 4)
                    .unwrap()
            })
            .collect::<Vec<_>>();

        assert_eq!(signs, vec![0, 1]);
    }

    #[test]
    fn comparisons() {
        let backend = Backend::simulated();
        let cc = switch_context(&backend);
        let keys = cc.keygen().unwrap();

        let params = SchSwchParams::new(&backend).unwrap();
        params.set_num_slots_ckks(8).unwrap();
        let switch = SchemeSwitching::setup(&cc, &params)
            .unwrap()
            .keygen(&keys)
            .unwrap()
            .compare_precompute(0, 1.0)
            .unwrap();

        let encrypt = |v: &[f64]| {
            cc.encrypt(&keys, &cc.make_ckks_packed_plaintext(v).unwrap())
                .unwrap()
        };
        let a = encrypt(&[1.0, 5.0, -2.0, 3.0]);
        let b = encrypt(&[2.0, 4.0, -1.0, 3.0]);

        let lt = switch.compare(&a, &b, 4, 8).unwrap();
        let pt = cc.decrypt(&keys, &lt).unwrap();
        pt.set_length(4).unwrap();

        assert!(approx_eq(
            &pt.real_packed_values().unwrap(),
            &[1.0, 0.0, 1.0, 0.0],
            1e-3
        ));
    }
}
