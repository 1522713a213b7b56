//! Minimum and maximum of encrypted CKKS values through scheme switching.
use log::debug;
use ofhe_engine::{Extremum, MinMaxRequest, Precision};

use crate::{
    Ciphertext, Ckks, CryptoContext, Error, KeyPair, PublicKey, Result,
    schemeswitch::{SchemeSwitching, state::Ready},
};

#[derive(Debug)]
/// The extremum of a set of values and where it was found.
///
/// # Remarks
/// Every slot of `value` holds the extremum. `index` holds either the index
/// in every slot or, with one-hot encoding (the default), a 1 in the slot of the
/// extremum and 0 elsewhere; [`MinMaxResult::index_from_one_hot`] decodes the
/// latter. Ties resolve to the lowest index.
pub struct MinMaxResult {
    /// The extremum.
    pub value: Ciphertext,

    /// The position of the extremum.
    pub index: Ciphertext,
}

impl MinMaxResult {
    /// Releases both ciphertexts. Idempotent.
    pub fn close(&self) {
        self.value.close();
        self.index.close();
    }

    /// Whether both ciphertexts have been released.
    pub fn is_closed(&self) -> bool {
        self.value.is_closed() && self.index.is_closed()
    }

    /// Decrypts a one-hot `index` and returns the position of the first slot
    /// above one half.
    pub fn index_from_one_hot(
        &self,
        cc: &CryptoContext<Ckks>,
        keys: &KeyPair,
        num_values: usize,
    ) -> Result<usize> {
        let pt = cc.decrypt(keys, &self.index)?;
        pt.set_length(num_values)?;

        pt.real_packed_values()?
            .iter()
            .position(|v| *v > 0.5)
            .ok_or(Error::IndexNotFound)
    }
}

impl CryptoContext<Ckks> {
    #[allow(clippy::too_many_arguments)]
    fn eval_min_max(
        &self,
        extremum: Extremum,
        precision: Precision,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<MinMaxResult> {
        let cc = self.handle()?;
        let request = MinMaxRequest {
            ciphertext: ciphertext.handle()?,
            public_key: public_key.handle(),
            extremum,
            precision,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
        };
        let op = request.op_name();

        let (value, index) = self.pke().call(op, |e| e.eval_min_max(cc, request))?;

        // Wrap whatever came back first so a half-null result is still released.
        let value = value.map(|h| Ciphertext::from_handle(self.backend(), h));
        let index = index.map(|h| Ciphertext::from_handle(self.backend(), h));

        match (value, index) {
            (Some(value), Some(index)) => {
                debug!("{op} over {num_values} values done");

                Ok(MinMaxResult { value, index })
            }
            _ => Err(Error::NullHandle { op }),
        }
    }

    /// Minimum and argmin of the first `num_values` of `num_slots` slots.
    /// `num_values` must be a power of two.
    #[allow(clippy::too_many_arguments)]
    pub fn eval_min_scheme_switching(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<MinMaxResult> {
        self.eval_min_max(
            Extremum::Min,
            Precision::Standard,
            ciphertext,
            public_key,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
        )
    }

    /// Maximum and argmax; see [`CryptoContext::eval_min_scheme_switching`].
    pub fn eval_max_scheme_switching(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<MinMaxResult> {
        self.eval_min_max(
            Extremum::Max,
            Precision::Standard,
            ciphertext,
            public_key,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
        )
    }

    /// The more precise minimum.
    pub fn eval_min_scheme_switching_alt(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<MinMaxResult> {
        self.eval_min_max(
            Extremum::Min,
            Precision::Alt,
            ciphertext,
            public_key,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
        )
    }

    /// The more precise maximum.
    pub fn eval_max_scheme_switching_alt(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Result<MinMaxResult> {
        self.eval_min_max(
            Extremum::Max,
            Precision::Alt,
            ciphertext,
            public_key,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
        )
    }
}

impl SchemeSwitching<'_, Ready> {
    fn min_max(
        &self,
        extremum: Extremum,
        precision: Precision,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
    ) -> Result<MinMaxResult> {
        self.cc.eval_min_max(
            extremum,
            precision,
            ciphertext,
            public_key,
            num_values,
            num_slots,
            self.p_lwe,
            self.scale_sign,
        )
    }

    /// Minimum and argmin of the first `num_values` of `num_slots` slots.
    pub fn eval_min(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
    ) -> Result<MinMaxResult> {
        self.min_max(
            Extremum::Min,
            Precision::Standard,
            ciphertext,
            public_key,
            num_values,
            num_slots,
        )
    }

    /// Maximum and argmax.
    pub fn eval_max(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
    ) -> Result<MinMaxResult> {
        self.min_max(
            Extremum::Max,
            Precision::Standard,
            ciphertext,
            public_key,
            num_values,
            num_slots,
        )
    }

    /// The more precise minimum.
    pub fn eval_min_alt(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
    ) -> Result<MinMaxResult> {
        self.min_max(
            Extremum::Min,
            Precision::Alt,
            ciphertext,
            public_key,
            num_values,
            num_slots,
        )
    }

    /// The more precise maximum.
    pub fn eval_max_alt(
        &self,
        ciphertext: &Ciphertext,
        public_key: &PublicKey<'_>,
        num_values: u32,
        num_slots: u32,
    ) -> Result<MinMaxResult> {
        self.min_max(
            Extremum::Max,
            Precision::Alt,
            ciphertext,
            public_key,
            num_values,
            num_slots,
        )
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::{Feature, SecurityLevel};

    use super::*;
    use crate::{Backend, Params, schemeswitch::SchSwchParams, test_utils::approx_eq};

    const SLOTS: u32 = 8;

    fn context(backend: &Backend, depth: u32) -> CryptoContext<Ckks> {
        let params = Params::<Ckks>::new(backend).unwrap();
        params.set_multiplicative_depth(depth).unwrap();
        params.set_batch_size(SLOTS).unwrap();
        params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
        params.set_ring_dim(1 << 12).unwrap();

        let cc = CryptoContext::new(&params).unwrap();
        cc.enable_all([
            Feature::Pke,
            Feature::KeySwitch,
            Feature::LeveledShe,
            Feature::AdvancedShe,
            Feature::SchemeSwitch,
        ])
        .unwrap();

        cc
    }

    fn switch_params(backend: &Backend, one_hot: bool) -> SchSwchParams {
        let params = SchSwchParams::new(backend).unwrap();
        params.set_num_slots_ckks(SLOTS).unwrap();
        params.set_num_values(4).unwrap();
        params.set_compute_argmin(true).unwrap();
        params.set_one_hot_encoding(one_hot).unwrap();

        params
    }

    #[test]
    fn min_and_max_with_one_hot_index() {
        let backend = Backend::simulated();
        let cc = context(&backend, 16);
        let keys = cc.keygen().unwrap();
        let params = switch_params(&backend, true);

        let switch = SchemeSwitching::setup(&cc, &params)
            .unwrap()
            .keygen(&keys)
            .unwrap()
            .compare_precompute(0, 1.0)
            .unwrap();

        let values = [3.0, -1.0, 7.0, 2.0];
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
            .unwrap();
        let pk = keys.public_key().unwrap();

        let min = switch.eval_min(&ct, &pk, 4, SLOTS).unwrap();
        let max = switch.eval_max_alt(&ct, &pk, 4, SLOTS).unwrap();

        let pt = cc.decrypt(&keys, &min.value).unwrap();
        pt.set_length(1).unwrap();
        assert!(approx_eq(&pt.real_packed_values().unwrap(), &[-1.0], 1e-3));
        assert_eq!(min.index_from_one_hot(&cc, &keys, 4).unwrap(), 1);

        let pt = cc.decrypt(&keys, &max.value).unwrap();
        pt.set_length(1).unwrap();
        assert!(approx_eq(&pt.real_packed_values().unwrap(), &[7.0], 1e-3));
        assert_eq!(max.index_from_one_hot(&cc, &keys, 4).unwrap(), 2);

        min.close();
        min.close();
        assert!(min.is_closed());
        assert!(min.value.is_closed() && min.index.is_closed());
        assert!(matches!(
            min.index_from_one_hot(&cc, &keys, 4),
            Err(Error::Closed { kind: "Ciphertext" })
        ));
    }

    #[test]
    fn plain_index_and_ties() {
        let backend = Backend::simulated();
        let cc = context(&backend, 16);
        let keys = cc.keygen().unwrap();
        let params = switch_params(&backend, false);

        let lwe_key = cc.eval_scheme_switching_setup(&params).unwrap();
        cc.eval_scheme_switching_keygen(&keys, &lwe_key).unwrap();
        cc.eval_compare_switch_precompute(0, 1.0).unwrap();

        let ct = cc
            .encrypt(
                &keys,
                &cc.make_ckks_packed_plaintext(&[5.0, 9.0, 9.0, 1.0]).unwrap(),
            )
            .unwrap();
        let pk = keys.public_key().unwrap();

        let max = cc
            .eval_max_scheme_switching(&ct, &pk, 4, SLOTS, 0, 1.0)
            .unwrap();
        let pt = cc.decrypt(&keys, &max.index).unwrap();
        pt.set_length(1).unwrap();

        assert!(approx_eq(&pt.real_packed_values().unwrap(), &[1.0], 1e-3));

        // A plain index of 0 has no hot slot.
        let min = cc
            .eval_min_scheme_switching_alt(
                &cc.encrypt(
                    &keys,
                    &cc.make_ckks_packed_plaintext(&[0.0, 4.0, 4.0, 4.0]).unwrap(),
                )
                .unwrap(),
                &pk,
                4,
                SLOTS,
                0,
                1.0,
            )
            .unwrap();
        assert!(matches!(
            min.index_from_one_hot(&cc, &keys, 4),
            Err(Error::IndexNotFound)
        ));
    }

    #[test]
    fn depth_and_sequencing_are_checked() {
        let backend = Backend::simulated();
        let cc = context(&backend, 4);
        let keys = cc.keygen().unwrap();
        let pk = keys.public_key().unwrap();
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&[1.0, 2.0]).unwrap())
            .unwrap();

        let err = cc
            .eval_min_scheme_switching(&ct, &pk, 2, SLOTS, 0, 1.0)
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("EvalSchemeSwitchingKeyGen must be called before"),
            "{err}"
        );

        let switch = SchemeSwitching::setup(&cc, &switch_params(&backend, true))
            .unwrap()
            .keygen(&keys)
            .unwrap();

        let err = cc
            .eval_min_scheme_switching(&ct, &pk, 2, SLOTS, 0, 1.0)
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("EvalCompareSwitchPrecompute must be called before"),
            "{err}"
        );

        let switch = switch.compare_precompute(0, 1.0).unwrap();
        let err = switch.eval_min(&ct, &pk, 2, SLOTS).unwrap_err();
        assert!(err.to_string().contains("multiplicative depth"), "{err}");

        let err = switch.eval_min(&ct, &pk, 3, SLOTS).unwrap_err();
        assert!(err.to_string().contains("power of two"), "{err}");
    }
}
