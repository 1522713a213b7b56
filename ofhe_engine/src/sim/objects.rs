use std::collections::{BTreeSet, HashMap, HashSet};

use num::Complex;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    BinFheMethod, BinFheParamSet, FeatureSet, KeySwitchTechnique, ParamSetting, RawHandle,
    ScalingTechnique, SchSwchSetting, SchemeId, SecretKeyDist, SecurityLevel,
};

use super::{SimError, SimResult, store::Table};

pub(crate) type C64 = Complex<f64>;

/// Largest ring dimension the engine accepts.
pub(crate) const MAX_RING_DIM: u64 = 1 << 17;

/// Base seed of the per-context generator CKKS decryption noise is drawn from.
const NOISE_SEED: u64 = 0x6f66_6865_6e6f_6973;

/// Default CKKS level budget for bootstrapping.
pub(crate) const DEFAULT_LEVEL_BUDGET: [u32; 2] = [5, 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ParamsObj {
    pub scheme: SchemeId,
    pub plaintext_modulus: u64,
    pub multiplicative_depth: u32,
    pub security_level: SecurityLevel,
    pub ring_dim: u64,
    pub scaling_mod_size: u32,
    pub batch_size: u32,
    pub scaling_technique: ScalingTechnique,
    pub first_mod_size: u32,
    pub num_large_digits: u32,
    pub secret_key_dist: SecretKeyDist,
    pub key_switch_technique: KeySwitchTechnique,
}

impl ParamsObj {
    pub fn new(scheme: SchemeId) -> Self {
        Self {
            scheme,
            plaintext_modulus: 0,
            multiplicative_depth: 1,
            security_level: SecurityLevel::HeStd128Classic,
            ring_dim: 0,
            scaling_mod_size: 50,
            batch_size: 0,
            scaling_technique: ScalingTechnique::FlexibleAuto,
            first_mod_size: 60,
            num_large_digits: 0,
            secret_key_dist: SecretKeyDist::UniformTernary,
            key_switch_technique: KeySwitchTechnique::Hybrid,
        }
    }

    pub fn apply(&mut self, setting: ParamSetting) -> SimResult<()> {
        let ckks_only = |name: &str| {
            SimError::new(format!(
                "{name} is not a parameter of the {} scheme",
                self.scheme.name()
            ))
        };

        match setting {
            ParamSetting::PlaintextModulus(modulus) => {
                if self.scheme == SchemeId::Ckks {
                    return Err(ckks_only("PlaintextModulus"));
                }
                if modulus < 2 {
                    return Err(SimError::new(format!(
                        "plaintext modulus must be at least 2, got {modulus}"
                    )));
                }
                self.plaintext_modulus = modulus;
            }
            ParamSetting::MultiplicativeDepth(depth) => self.multiplicative_depth = depth,
            ParamSetting::SecurityLevel(level) => self.security_level = level,
            ParamSetting::RingDim(dim) => {
                if dim != 0 && (!dim.is_power_of_two() || !(8..=MAX_RING_DIM).contains(&dim)) {
                    return Err(SimError::new(format!(
                        "ring dimension {dim} must be a power of two between 8 and {MAX_RING_DIM}"
                    )));
                }
                self.ring_dim = dim;
            }
            ParamSetting::ScalingModSize(bits) => {
                self.ckks_setting("ScalingModSize")?;
                if !(14..=60).contains(&bits) {
                    return Err(SimError::new(format!(
                        "scaling modulus size {bits} is outside [14, 60]"
                    )));
                }
                self.scaling_mod_size = bits;
            }
            ParamSetting::BatchSize(batch) => {
                self.ckks_setting("BatchSize")?;
                if batch != 0 && !batch.is_power_of_two() {
                    return Err(SimError::new(format!(
                        "batch size {batch} must be a power of two"
                    )));
                }
                self.batch_size = batch;
            }
            ParamSetting::ScalingTechnique(technique) => {
                self.ckks_setting("ScalingTechnique")?;
                if technique == ScalingTechnique::Invalid {
                    return Err(SimError::new("INVALID_RS_TECHNIQUE is not a scaling technique"));
                }
                self.scaling_technique = technique;
            }
            ParamSetting::FirstModSize(bits) => {
                self.ckks_setting("FirstModSize")?;
                if !(14..=60).contains(&bits) {
                    return Err(SimError::new(format!(
                        "first modulus size {bits} is outside [14, 60]"
                    )));
                }
                self.first_mod_size = bits;
            }
            ParamSetting::NumLargeDigits(digits) => {
                self.ckks_setting("NumLargeDigits")?;
                self.num_large_digits = digits;
            }
            ParamSetting::SecretKeyDist(dist) => {
                self.ckks_setting("SecretKeyDist")?;
                self.secret_key_dist = dist;
            }
            ParamSetting::KeySwitchTechnique(technique) => {
                self.ckks_setting("KeySwitchTechnique")?;
                if technique == KeySwitchTechnique::Invalid {
                    return Err(SimError::new("INVALID_KS_TECH is not a key switching technique"));
                }
                self.key_switch_technique = technique;
            }
        }

        Ok(())
    }

    fn ckks_setting(&self, name: &str) -> SimResult<()> {
        if self.scheme == SchemeId::Ckks {
            Ok(())
        } else {
            Err(SimError::new(format!(
                "{name} is not a parameter of the {} scheme",
                self.scheme.name()
            )))
        }
    }

    /// Estimated bit size of the ciphertext modulus chain.
    pub fn modulus_bits(&self) -> u64 {
        let depth = self.multiplicative_depth as u64;

        match self.scheme {
            SchemeId::Ckks => self.first_mod_size as u64 + depth * self.scaling_mod_size as u64,
            SchemeId::Bfv | SchemeId::Bgv => {
                let t_bits = 64 - self.plaintext_modulus.leading_zeros() as u64;
                (depth + 1) * (t_bits + 20).max(30)
            }
        }
    }

    /// Picks (or validates) the ring dimension against the security table.
    pub fn resolve_ring_dim(&self) -> SimResult<u64> {
        if self.security_level == SecurityLevel::HeStdNotSet {
            return Ok(if self.ring_dim == 0 { 1 << 12 } else { self.ring_dim });
        }

        let bits = self.modulus_bits();

        let Some(minimum) = min_ring_dim(self.security_level, bits) else {
            return Err(SimError::new(format!(
                "no ring dimension up to {MAX_RING_DIM} supports a {bits}-bit modulus at {:?}",
                self.security_level
            )));
        };

        if self.ring_dim == 0 {
            return Ok(minimum);
        }

        if self.ring_dim < minimum {
            return Err(SimError::new(format!(
                "The specified ring dimension ({}) does not comply with HE standards \
                 recommendation ({minimum}).",
                self.ring_dim
            )));
        }

        Ok(self.ring_dim)
    }
}

/// The smallest ring dimension whose maximum modulus size covers `bits` at the
/// given security level.
pub(crate) fn min_ring_dim(level: SecurityLevel, bits: u64) -> Option<u64> {
    // Maximum log2(q) per ring dimension 2^10 ..= 2^17.
    const CLASSIC_128: [u64; 8] = [27, 54, 109, 218, 438, 881, 1761, 3524];
    const CLASSIC_192: [u64; 8] = [19, 37, 75, 152, 305, 611, 1228, 2454];
    const CLASSIC_256: [u64; 8] = [14, 29, 58, 118, 237, 476, 956, 1910];
    const QUANTUM_128: [u64; 8] = [25, 51, 101, 202, 411, 827, 1652, 3310];
    const QUANTUM_192: [u64; 8] = [17, 35, 70, 141, 284, 571, 1146, 2290];
    const QUANTUM_256: [u64; 8] = [13, 27, 54, 109, 220, 443, 889, 1780];

    let table = match level {
        SecurityLevel::HeStd128Classic => &CLASSIC_128,
        SecurityLevel::HeStd192Classic => &CLASSIC_192,
        SecurityLevel::HeStd256Classic => &CLASSIC_256,
        SecurityLevel::HeStd128Quantum => &QUANTUM_128,
        SecurityLevel::HeStd192Quantum => &QUANTUM_192,
        SecurityLevel::HeStd256Quantum => &QUANTUM_256,
        SecurityLevel::HeStdNotSet => return Some(1 << 12),
    };

    table
        .iter()
        .position(|max_bits| *max_bits >= bits)
        .map(|i| 1u64 << (10 + i))
}

/// Depth consumed by bootstrapping: the modular reduction approximation plus
/// the two linear transform budgets.
pub(crate) fn bootstrap_depth(level_budget: &[u32], dist: SecretKeyDist) -> u32 {
    let budget = if level_budget.is_empty() {
        &DEFAULT_LEVEL_BUDGET[..]
    } else {
        level_budget
    };

    let approx_mod_depth = match dist {
        SecretKeyDist::UniformTernary | SecretKeyDist::Gaussian => 14,
        SecretKeyDist::SparseTernary | SecretKeyDist::SparseEncapsulated => 10,
    };

    approx_mod_depth + budget.iter().take(2).sum::<u32>()
}

/// Reduces `value` into the centered range `(-t/2, t/2]`.
pub(crate) fn centered(value: i128, modulus: u64) -> i64 {
    let t = modulus as i128;
    let mut v = value.rem_euclid(t);
    if v > t / 2 {
        v -= t;
    }
    v as i64
}

/// Round half to even, then reduce into `[0, p)` with negative values wrapping.
pub(crate) fn round_into_modulus(value: f64, p: u64) -> u64 {
    let rounded = value.round_ties_even() as i128;
    rounded.rem_euclid(p.max(1) as i128) as u64
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BootstrapState {
    pub level_budget: Vec<u32>,
    pub keys: HashMap<u64, u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct SwitchState {
    pub params: SchSwchObj,
    pub bin_cc: RawHandle,
    pub lwe_key_id: u64,
    pub bidirectional: bool,
    pub keys_for: Option<u64>,
    pub scale: Option<f64>,
    pub compare: Option<(u32, f64)>,
    pub num_slots: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct FhewToCkksState {
    pub bin_context_id: u64,
    pub num_slots: u32,
    pub log_q: u32,
    pub keys_for: Option<(u64, u64)>,
}

#[derive(Debug, Clone)]
pub(crate) struct ContextObj {
    pub context_id: u64,
    pub params: ParamsObj,
    pub ring_dim: u64,
    pub features: FeatureSet,
    pub mult_keys: HashSet<u64>,
    pub sum_keys: HashSet<u64>,
    pub rotation_keys: HashMap<u64, BTreeSet<i32>>,
    pub bootstrap: Option<BootstrapState>,
    pub switch: Option<SwitchState>,
    pub fhew_to_ckks: Option<FhewToCkksState>,
    pub rng: StdRng,
}

impl ContextObj {
    pub fn new(context_id: u64, params: ParamsObj, ring_dim: u64) -> Self {
        Self {
            context_id,
            params,
            ring_dim,
            features: FeatureSet::EMPTY,
            mult_keys: HashSet::new(),
            sum_keys: HashSet::new(),
            rotation_keys: HashMap::new(),
            bootstrap: None,
            switch: None,
            fhew_to_ckks: None,
            rng: StdRng::seed_from_u64(NOISE_SEED ^ ring_dim),
        }
    }

    pub fn scheme(&self) -> SchemeId {
        self.params.scheme
    }

    pub fn depth(&self) -> u32 {
        self.params.multiplicative_depth
    }

    /// Number of slots a ciphertext of this context carries.
    pub fn slot_count(&self) -> usize {
        match self.scheme() {
            SchemeId::Bfv | SchemeId::Bgv => self.ring_dim as usize,
            SchemeId::Ckks => {
                if self.params.batch_size == 0 {
                    (self.ring_dim / 2) as usize
                } else {
                    self.params.batch_size as usize
                }
            }
        }
    }

    /// Length of the cycle slot rotations act on.
    pub fn rotation_cycle(&self) -> usize {
        match self.scheme() {
            SchemeId::Bfv | SchemeId::Bgv => (self.ring_dim / 2) as usize,
            SchemeId::Ckks => self.slot_count(),
        }
    }

    pub fn key_tag(key_id: u64) -> String {
        format!("{key_id:016x}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct KeyMaterial {
    pub key_id: u64,
    pub context_id: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct KeyPairObj {
    pub public: Option<RawHandle>,
    pub private: Option<RawHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Slots {
    Int(Vec<i64>),
    Complex(Vec<C64>),
}

impl Slots {
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Complex(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PlaintextObj {
    pub context_id: u64,
    pub slots: Slots,
    pub len: usize,
    pub modulus: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CiphertextObj {
    pub context_id: u64,
    pub scheme: SchemeId,
    pub key_id: u64,
    pub slots: Slots,
    pub level: u32,
    pub scale_degree: u32,
    pub modulus: u64,
    /// Standard deviation of the approximation error, applied on decryption.
    pub noise: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct PrecomputeObj {
    pub context_id: u64,
    pub source: RawHandle,
}

#[derive(Debug, Clone)]
pub(crate) struct ReKeyObj {
    pub context_id: u64,
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct SchSwchObj {
    pub security_level_ckks: SecurityLevel,
    pub security_level_fhew: BinFheParamSet,
    pub num_slots_ckks: u32,
    pub num_values: u32,
    pub ctxt_mod_size_fhew_large_prec: u32,
    pub compute_argmin: bool,
    pub use_alt_argmin: bool,
    pub arbitrary_function_evaluation: bool,
    pub one_hot_encoding: bool,
}

impl Default for SchSwchObj {
    fn default() -> Self {
        Self {
            security_level_ckks: SecurityLevel::HeStd128Classic,
            security_level_fhew: BinFheParamSet::Std128,
            num_slots_ckks: 0,
            num_values: 0,
            ctxt_mod_size_fhew_large_prec: 25,
            compute_argmin: false,
            use_alt_argmin: false,
            arbitrary_function_evaluation: false,
            one_hot_encoding: true,
        }
    }
}

impl SchSwchObj {
    pub fn apply(&mut self, setting: SchSwchSetting) -> SimResult<()> {
        match setting {
            SchSwchSetting::SecurityLevelCkks(level) => self.security_level_ckks = level,
            SchSwchSetting::SecurityLevelFhew(set) => self.security_level_fhew = set,
            SchSwchSetting::NumSlotsCkks(slots) => self.num_slots_ckks = slots,
            SchSwchSetting::NumValues(values) => self.num_values = values,
            SchSwchSetting::CtxtModSizeFhewLargePrec(bits) => {
                if !(8..=60).contains(&bits) {
                    return Err(SimError::new(format!(
                        "large-precision FHEW modulus size {bits} is outside [8, 60]"
                    )));
                }
                self.ctxt_mod_size_fhew_large_prec = bits;
            }
            SchSwchSetting::ComputeArgmin(flag) => self.compute_argmin = flag,
            SchSwchSetting::UseAltArgmin(flag) => self.use_alt_argmin = flag,
            SchSwchSetting::ArbitraryFunctionEvaluation(flag) => {
                self.arbitrary_function_evaluation = flag
            }
            SchSwchSetting::OneHotEncoding(flag) => self.one_hot_encoding = flag,
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LweKeyObj {
    pub key_id: u64,
    pub context_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LweParams {
    pub param_set: BinFheParamSet,
    pub method: BinFheMethod,
    pub n: u32,
    pub q: u64,
    pub beta: u32,
}

impl LweParams {
    /// Reference dimensions for each parameter set.
    pub fn standard(param_set: BinFheParamSet, method: BinFheMethod) -> Self {
        use BinFheParamSet::*;

        let (n, q) = match param_set {
            Toy => (32, 1024),
            Medium => (256, 1024),
            Std128Ap | Std128 | Std128Lmkcdey => (503, 1024),
            Std128_3 | Std128_3Lmkcdey | Std128_4 | Std128_4Lmkcdey => (595, 2048),
            Std128Q | Std128QLmkcdey => (585, 1024),
            Std128Q_3 | Std128Q_3Lmkcdey | Std128Q_4 | Std128Q_4Lmkcdey => (646, 2048),
            Std192 | Std192Lmkcdey => (805, 1024),
            Std192_3 | Std192_3Lmkcdey | Std192_4 | Std192_4Lmkcdey => (875, 2048),
            Std192Q | Std192QLmkcdey => (875, 1024),
            Std192Q_3 | Std192Q_3Lmkcdey | Std192Q_4 | Std192Q_4Lmkcdey => (1024, 2048),
            Std256 | Std256Lmkcdey => (990, 2048),
            Std256_3 | Std256_3Lmkcdey | Std256_4 | Std256_4Lmkcdey => (1100, 2048),
            Std256Q | Std256QLmkcdey => (1225, 2048),
            Std256Q_3 | Std256Q_3Lmkcdey | Std256Q_4 | Std256Q_4Lmkcdey => (1400, 4096),
            LpfStd128 | LpfStd128Lmkcdey => (556, 2048),
            LpfStd128Q | LpfStd128QLmkcdey => (645, 2048),
            SignedModTest => (512, 1024),
        };

        Self {
            param_set,
            method,
            n,
            q,
            beta: 128,
        }
    }

    /// Parameters of the large-precision context scheme switching creates.
    pub fn large_precision(param_set: BinFheParamSet, log_q: u32) -> Self {
        Self {
            q: 1u64 << log_q,
            ..Self::standard(param_set, BinFheMethod::Ginx)
        }
    }

    pub fn max_plaintext_space(&self) -> u32 {
        (self.q / (2 * self.beta as u64)).max(2) as u32
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BinContextObj {
    pub context_id: u64,
    pub params: Option<LweParams>,
    pub owner: Option<RawHandle>,
    pub bt_keys: HashSet<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LweCtObj {
    pub context_id: u64,
    pub key_id: u64,
    /// The message as a fraction of the torus, unreduced. Decoding modulo `p`
    /// rounds `phase * p`.
    pub phase: f64,
}

impl LweCtObj {
    pub fn decode(&self, p: u64) -> u64 {
        round_into_modulus(self.phase * p as f64, p)
    }
}

pub(crate) enum Object {
    Params(ParamsObj),
    Context(Box<ContextObj>),
    KeyPair(KeyPairObj),
    PublicKey(KeyMaterial),
    PrivateKey(KeyMaterial),
    Plaintext(PlaintextObj),
    Ciphertext(CiphertextObj),
    Precompute(PrecomputeObj),
    EvalKey(ReKeyObj),
    SchSwchParams(SchSwchObj),
    LwePrivateKey(LweKeyObj),
    BinContext(BinContextObj),
    BinSecretKey(LweKeyObj),
    LweCiphertext(LweCtObj),
}

macro_rules! accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty), $kind:literal;)+) => {
        impl Table {
            $(
                pub(crate) fn $get(&self, handle: RawHandle) -> SimResult<&$ty> {
                    match self.get(handle) {
                        Some(Object::$variant(o)) => Ok(o),
                        _ => Err(SimError::invalid_handle($kind)),
                    }
                }

                #[allow(dead_code)]
                pub(crate) fn $get_mut(&mut self, handle: RawHandle) -> SimResult<&mut $ty> {
                    match self.get_mut(handle) {
                        Some(Object::$variant(o)) => Ok(o),
                        _ => Err(SimError::invalid_handle($kind)),
                    }
                }
            )+
        }
    };
}

accessors! {
    params, params_mut => Params(ParamsObj), "parameter set";
    context, context_mut => Context(Box<ContextObj>), "CryptoContext";
    keypair, keypair_mut => KeyPair(KeyPairObj), "KeyPair";
    public_key, public_key_mut => PublicKey(KeyMaterial), "PublicKey";
    private_key, private_key_mut => PrivateKey(KeyMaterial), "PrivateKey";
    plaintext, plaintext_mut => Plaintext(PlaintextObj), "Plaintext";
    ciphertext, ciphertext_mut => Ciphertext(CiphertextObj), "Ciphertext";
    precompute, precompute_mut => Precompute(PrecomputeObj), "fast rotation precomputation";
    eval_key, eval_key_mut => EvalKey(ReKeyObj), "EvalKey";
    schswch, schswch_mut => SchSwchParams(SchSwchObj), "SchSwchParams";
    lwe_private_key, lwe_private_key_mut => LwePrivateKey(LweKeyObj), "LWEPrivateKey";
    bin_context, bin_context_mut => BinContext(BinContextObj), "BinFHEContext";
    bin_secret_key, bin_secret_key_mut => BinSecretKey(LweKeyObj), "LWESecretKey";
    lwe_ciphertext, lwe_ciphertext_mut => LweCiphertext(LweCtObj), "LWECiphertext";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_dimension_follows_security_table() {
        assert_eq!(min_ring_dim(SecurityLevel::HeStd128Classic, 100), Some(4096));
        assert_eq!(min_ring_dim(SecurityLevel::HeStd128Classic, 910), Some(65536));
        assert_eq!(min_ring_dim(SecurityLevel::HeStd256Classic, 5000), None);
        assert_eq!(min_ring_dim(SecurityLevel::HeStdNotSet, 5000), Some(4096));
    }

    #[test]
    fn undersized_ring_dimension_is_rejected() {
        let mut params = ParamsObj::new(SchemeId::Ckks);
        params.apply(ParamSetting::MultiplicativeDepth(10)).unwrap();
        params.apply(ParamSetting::RingDim(1024)).unwrap();

        assert!(params.resolve_ring_dim().is_err());

        params
            .apply(ParamSetting::SecurityLevel(SecurityLevel::HeStdNotSet))
            .unwrap();

        assert_eq!(params.resolve_ring_dim().unwrap(), 1024);
    }

    #[test]
    fn scheme_specific_setters_are_rejected() {
        let mut params = ParamsObj::new(SchemeId::Bfv);

        assert!(params.apply(ParamSetting::BatchSize(8)).is_err());

        let mut params = ParamsObj::new(SchemeId::Ckks);

        assert!(params.apply(ParamSetting::PlaintextModulus(65537)).is_err());
    }

    #[test]
    fn rounding_is_half_even_with_wraparound() {
        assert_eq!(round_into_modulus(0.5, 8), 0);
        assert_eq!(round_into_modulus(1.5, 8), 2);
        assert_eq!(round_into_modulus(2.5, 8), 2);
        assert_eq!(round_into_modulus(-1.0, 8), 7);
        assert_eq!(round_into_modulus(-2.5, 8), 6);
    }

    #[test]
    fn centering_maps_into_symmetric_range() {
        assert_eq!(centered(65536, 65537), -1);
        assert_eq!(centered(32768, 65537), 32768);
        assert_eq!(centered(-5, 65537), -5);
    }

    #[test]
    fn bootstrap_depth_adds_level_budget() {
        assert_eq!(bootstrap_depth(&[4, 4], SecretKeyDist::UniformTernary), 22);
        assert_eq!(bootstrap_depth(&[], SecretKeyDist::SparseTernary), 19);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn rounding_lands_in_range(value in -1e9f64..1e9, p in 1u64..(1 << 20)) {
                prop_assert!(round_into_modulus(value, p) < p);
            }

            #[test]
            fn centering_is_symmetric(value in any::<i64>(), t in 2u64..(1 << 40)) {
                let c = centered(value as i128, t) as i128;
                let t = t as i128;

                prop_assert!(-t / 2 <= c && c <= t / 2);
                prop_assert_eq!((c - value as i128).rem_euclid(t), 0);
            }

            #[test]
            fn security_table_is_monotonic(bits in 1u64..3000) {
                let a = min_ring_dim(SecurityLevel::HeStd128Classic, bits);
                let b = min_ring_dim(SecurityLevel::HeStd128Classic, bits + 1);

                if let (Some(a), Some(b)) = (a, b) {
                    prop_assert!(a <= b);
                }
            }
        }
    }
}
