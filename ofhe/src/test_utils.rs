use std::sync::{Arc, OnceLock};

use ofhe_engine::Feature;

use crate::{Backend, Bgv, Ckks, CryptoContext, KeyPair, Params, config::CKKS_TOY};

static BACKEND: OnceLock<Backend> = OnceLock::new();

static BGV_CONTEXT: OnceLock<Arc<CryptoContext<Bgv>>> = OnceLock::new();
static BGV_KEYS: OnceLock<Arc<KeyPair>> = OnceLock::new();

static CKKS_CONTEXT: OnceLock<Arc<CryptoContext<Ckks>>> = OnceLock::new();
static CKKS_KEYS: OnceLock<Arc<KeyPair>> = OnceLock::new();

/// Slots of the shared CKKS context.
pub const CKKS_SLOTS: u32 = 16;

pub fn get_backend() -> Backend {
    BACKEND.get_or_init(Backend::simulated).clone()
}

/// A depth-2 BGV context over `t = 65537` with PKE, key switching and leveled
/// arithmetic enabled.
pub fn bgv_context() -> (Backend, Arc<CryptoContext<Bgv>>) {
    let cc = BGV_CONTEXT
        .get_or_init(|| {
            let params = Params::<Bgv>::new(&get_backend()).unwrap();
            params.set_plaintext_modulus(65537).unwrap();
            params.set_multiplicative_depth(2).unwrap();

            let cc = CryptoContext::new(&params).unwrap();
            cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
                .unwrap();

            Arc::new(cc)
        })
        .clone();

    (get_backend(), cc)
}

/// Keys for [`bgv_context`] with relinearization keys.
pub fn bgv_keys() -> Arc<KeyPair> {
    BGV_KEYS
        .get_or_init(|| {
            let (_, cc) = bgv_context();
            let keys = cc.keygen().unwrap();
            cc.eval_mult_keygen(&keys).unwrap();

            Arc::new(keys)
        })
        .clone()
}

/// A depth-3 CKKS context with [`CKKS_SLOTS`] slots and the leveled and
/// advanced features enabled.
pub fn ckks_context() -> (Backend, Arc<CryptoContext<Ckks>>) {
    let cc = CKKS_CONTEXT
        .get_or_init(|| {
            let params = CKKS_TOY.build(&get_backend()).unwrap();

            let cc = CryptoContext::new(&params).unwrap();
            cc.enable_all([
                Feature::Pke,
                Feature::KeySwitch,
                Feature::LeveledShe,
                Feature::AdvancedShe,
            ])
            .unwrap();

            Arc::new(cc)
        })
        .clone();

    (get_backend(), cc)
}

/// Keys for [`ckks_context`] with relinearization and summation keys.
pub fn ckks_keys() -> Arc<KeyPair> {
    CKKS_KEYS
        .get_or_init(|| {
            let (_, cc) = ckks_context();
            let keys = cc.keygen().unwrap();
            cc.eval_mult_keygen(&keys).unwrap();
            cc.eval_sum_keygen(&keys).unwrap();

            Arc::new(keys)
        })
        .clone()
}

/// Whether `actual` matches `expected` slot for slot within `tolerance`.
pub fn approx_eq(actual: &[f64], expected: &[f64], tolerance: f64) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(a, e)| (a - e).abs() <= tolerance)
}
