use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Declares a `#[repr(u32)]` enum mirroring an engine enumeration, with a checked
/// conversion from the engine's numeric value.
macro_rules! engine_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Every variant, in discriminant order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// The engine's numeric value for this variant.
            pub fn to_u32(self) -> u32 {
                self as u32
            }

            /// Looks up the variant with the given engine value.
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The lattice schemes the engine builds crypto contexts for.
pub enum SchemeId {
    /// Exact integer arithmetic, scale invariant.
    Bfv,

    /// Exact integer arithmetic, leveled.
    Bgv,

    /// Approximate arithmetic over real and complex numbers.
    Ckks,
}

impl SchemeId {
    /// The scheme's conventional name, as used in engine messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bfv => "BFV",
            Self::Bgv => "BGV",
            Self::Ckks => "CKKS",
        }
    }

    /// Whether the scheme encodes exact integers.
    pub fn is_exact(self) -> bool {
        !matches!(self, Self::Ckks)
    }
}

engine_enum! {
    /// A capability that must be enabled on a crypto context before the
    /// corresponding operations are accepted.
    pub enum Feature {
        /// Key generation, encryption, decryption.
        Pke = 0x01,
        /// Key switching.
        KeySwitch = 0x02,
        /// Proxy re-encryption.
        Pre = 0x04,
        /// Leveled homomorphic arithmetic.
        LeveledShe = 0x08,
        /// Sums, inner products and polynomial evaluation.
        AdvancedShe = 0x10,
        /// Threshold protocols.
        Multiparty = 0x20,
        /// Bootstrapping.
        Fhe = 0x40,
        /// CKKS to FHEW scheme switching.
        SchemeSwitch = 0x80,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
/// A set of [`Feature`]s.
pub struct FeatureSet(u32);

impl FeatureSet {
    /// No features.
    pub const EMPTY: Self = Self(0);

    /// The raw bit mask.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether `feature` is in the set.
    pub fn contains(self, feature: Feature) -> bool {
        self.0 & feature.to_u32() != 0
    }

    /// Adds `feature` to the set.
    pub fn insert(&mut self, feature: Feature) {
        self.0 |= feature.to_u32();
    }

    /// The features in the set.
    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::ALL.iter().copied().filter(move |f| self.contains(*f))
    }
}

impl From<Feature> for FeatureSet {
    fn from(value: Feature) -> Self {
        Self(value.to_u32())
    }
}

impl BitOr<Feature> for FeatureSet {
    type Output = Self;

    fn bitor(mut self, rhs: Feature) -> Self::Output {
        self.insert(rhs);
        self
    }
}

impl BitOr for Feature {
    type Output = FeatureSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        FeatureSet::from(self) | rhs
    }
}

impl BitOrAssign<Feature> for FeatureSet {
    fn bitor_assign(&mut self, rhs: Feature) {
        self.insert(rhs);
    }
}

engine_enum! {
    /// Lattice security level per the homomorphic encryption standard.
    pub enum SecurityLevel {
        /// 128-bit classical security.
        HeStd128Classic = 0,
        /// 192-bit classical security.
        HeStd192Classic = 1,
        /// 256-bit classical security.
        HeStd256Classic = 2,
        /// 128-bit post-quantum security.
        HeStd128Quantum = 3,
        /// 192-bit post-quantum security.
        HeStd192Quantum = 4,
        /// 256-bit post-quantum security.
        HeStd256Quantum = 5,
        /// No security check. Only for tests and toy parameters.
        HeStdNotSet = 6,
    }
}

engine_enum! {
    /// How CKKS manages ciphertext scale.
    pub enum ScalingTechnique {
        /// Caller rescales explicitly.
        FixedManual = 0,
        /// Rescaling happens automatically with a fixed scaling factor.
        FixedAuto = 1,
        /// Automatic rescaling with per-level scaling factors.
        FlexibleAuto = 2,
        /// [`ScalingTechnique::FlexibleAuto`] with an extra level for precision.
        FlexibleAutoExt = 3,
        /// Composite scaling, automatic.
        CompositeScalingAuto = 4,
        /// Composite scaling, manual.
        CompositeScalingManual = 5,
        /// No rescaling; integer-like CKKS.
        NoRescale = 6,
        /// Not a valid technique.
        Invalid = 7,
    }
}

impl ScalingTechnique {
    /// Whether the caller must rescale after each multiplication.
    pub fn is_manual(self) -> bool {
        matches!(self, Self::FixedManual | Self::CompositeScalingManual)
    }
}

engine_enum! {
    /// The distribution secret keys are sampled from.
    pub enum SecretKeyDist {
        /// Discrete Gaussian.
        Gaussian = 0,
        /// Uniform over `{-1, 0, 1}`.
        UniformTernary = 1,
        /// Sparse ternary.
        SparseTernary = 2,
        /// Sparse ternary with an encapsulated dense key.
        SparseEncapsulated = 3,
    }
}

engine_enum! {
    /// The key switching method.
    pub enum KeySwitchTechnique {
        /// Not a valid technique.
        Invalid = 0,
        /// Brakerski-Vaikuntanathan digit decomposition.
        Bv = 1,
        /// Hybrid key switching.
        Hybrid = 2,
    }
}

engine_enum! {
    /// Parameter sets for the binary-gate (FHEW) scheme.
    pub enum BinFheParamSet {
        /// Toy parameters, no security.
        Toy = 0,
        /// Medium parameters, no security.
        Medium = 1,
        /// 128-bit security, AP bootstrapping.
        Std128Ap = 2,
        /// 128-bit security.
        Std128 = 3,
        /// 128-bit security, 3-input gates.
        Std128_3 = 4,
        /// 128-bit security, 4-input gates.
        Std128_4 = 5,
        /// 128-bit post-quantum security.
        Std128Q = 6,
        /// 128-bit post-quantum security, 3-input gates.
        Std128Q_3 = 7,
        /// 128-bit post-quantum security, 4-input gates.
        Std128Q_4 = 8,
        /// 192-bit security.
        Std192 = 9,
        /// 192-bit security, 3-input gates.
        Std192_3 = 10,
        /// 192-bit security, 4-input gates.
        Std192_4 = 11,
        /// 192-bit post-quantum security.
        Std192Q = 12,
        /// 192-bit post-quantum security, 3-input gates.
        Std192Q_3 = 13,
        /// 192-bit post-quantum security, 4-input gates.
        Std192Q_4 = 14,
        /// 256-bit security.
        Std256 = 15,
        /// 256-bit security, 3-input gates.
        Std256_3 = 16,
        /// 256-bit security, 4-input gates.
        Std256_4 = 17,
        /// 256-bit post-quantum security.
        Std256Q = 18,
        /// 256-bit post-quantum security, 3-input gates.
        Std256Q_3 = 19,
        /// 256-bit post-quantum security, 4-input gates.
        Std256Q_4 = 20,
        /// 128-bit security, LMKCDEY bootstrapping.
        Std128Lmkcdey = 21,
        /// 128-bit security, 3-input gates, LMKCDEY.
        Std128_3Lmkcdey = 22,
        /// 128-bit security, 4-input gates, LMKCDEY.
        Std128_4Lmkcdey = 23,
        /// 128-bit post-quantum security, LMKCDEY.
        Std128QLmkcdey = 24,
        /// 128-bit post-quantum security, 3-input gates, LMKCDEY.
        Std128Q_3Lmkcdey = 25,
        /// 128-bit post-quantum security, 4-input gates, LMKCDEY.
        Std128Q_4Lmkcdey = 26,
        /// 192-bit security, LMKCDEY.
        Std192Lmkcdey = 27,
        /// 192-bit security, 3-input gates, LMKCDEY.
        Std192_3Lmkcdey = 28,
        /// 192-bit security, 4-input gates, LMKCDEY.
        Std192_4Lmkcdey = 29,
        /// 192-bit post-quantum security, LMKCDEY.
        Std192QLmkcdey = 30,
        /// 192-bit post-quantum security, 3-input gates, LMKCDEY.
        Std192Q_3Lmkcdey = 31,
        /// 192-bit post-quantum security, 4-input gates, LMKCDEY.
        Std192Q_4Lmkcdey = 32,
        /// 256-bit security, LMKCDEY.
        Std256Lmkcdey = 33,
        /// 256-bit security, 3-input gates, LMKCDEY.
        Std256_3Lmkcdey = 34,
        /// 256-bit security, 4-input gates, LMKCDEY.
        Std256_4Lmkcdey = 35,
        /// 256-bit post-quantum security, LMKCDEY.
        Std256QLmkcdey = 36,
        /// 256-bit post-quantum security, 3-input gates, LMKCDEY.
        Std256Q_3Lmkcdey = 37,
        /// 256-bit post-quantum security, 4-input gates, LMKCDEY.
        Std256Q_4Lmkcdey = 38,
        /// 128-bit security, low failure probability.
        LpfStd128 = 39,
        /// 128-bit post-quantum security, low failure probability.
        LpfStd128Q = 40,
        /// 128-bit security, low failure probability, LMKCDEY.
        LpfStd128Lmkcdey = 41,
        /// 128-bit post-quantum security, low failure probability, LMKCDEY.
        LpfStd128QLmkcdey = 42,
        /// Signed modulus switching test parameters.
        SignedModTest = 43,
    }
}

engine_enum! {
    /// Bootstrapping method for the binary-gate scheme.
    pub enum BinFheMethod {
        /// Not a valid method.
        Invalid = 0,
        /// Alperin-Sheriff and Peikert.
        Ap = 1,
        /// Gama, Izabachene, Nguyen and Xie.
        Ginx = 2,
        /// Lee, Micciancio, Kim, Choi, Deryabin, Eom and Yoo.
        Lmkcdey = 3,
    }
}

engine_enum! {
    /// Boolean gates the binary-gate scheme evaluates.
    pub enum BinGate {
        /// `a | b`
        Or = 0,
        /// `a & b`
        And = 1,
        /// `!(a | b)`
        Nor = 2,
        /// `!(a & b)`
        Nand = 3,
        /// `a ^ b`
        Xor = 4,
        /// `!(a ^ b)`
        Xnor = 5,
        /// Majority of three inputs.
        Majority = 6,
        /// Three-input and.
        And3 = 7,
        /// Three-input or.
        Or3 = 8,
        /// Four-input and.
        And4 = 9,
        /// Four-input or.
        Or4 = 10,
        /// `a ^ b` with a single bootstrap.
        XorFast = 11,
        /// `!(a ^ b)` with a single bootstrap.
        XnorFast = 12,
        /// Controlled multiplexer.
        Cmux = 13,
    }
}

impl BinGate {
    /// Evaluates a two-input gate in the clear. Returns `None` for gates that
    /// need more than two inputs.
    pub fn eval(self, a: bool, b: bool) -> Option<bool> {
        Some(match self {
            Self::Or => a | b,
            Self::And => a & b,
            Self::Nor => !(a | b),
            Self::Nand => !(a & b),
            Self::Xor | Self::XorFast => a ^ b,
            Self::Xnor | Self::XnorFast => !(a ^ b),
            Self::Majority | Self::And3 | Self::Or3 | Self::And4 | Self::Or4 | Self::Cmux => {
                return None;
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The two blob encodings the serialization bridge supports.
pub enum SerialFormat {
    /// Text form, carried as a string.
    Json,

    /// Compact binary form.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A ciphertext-by-ciphertext (or ciphertext-by-plaintext) arithmetic operation.
pub enum BinaryOp {
    /// Slot-wise addition.
    Add,

    /// Slot-wise subtraction.
    Sub,

    /// Slot-wise multiplication.
    Mult,
}

impl BinaryOp {
    /// The engine's name for the operation.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "EvalAdd",
            Self::Sub => "EvalSub",
            Self::Mult => "EvalMult",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A single parameter assignment on a scheme parameter set.
pub enum ParamSetting {
    /// Plaintext modulus (BFV, BGV).
    PlaintextModulus(u64),
    /// Multiplicative depth.
    MultiplicativeDepth(u32),
    /// Security level.
    SecurityLevel(SecurityLevel),
    /// Ring dimension. Zero lets the engine choose.
    RingDim(u64),
    /// Bit size of the scaling primes (CKKS).
    ScalingModSize(u32),
    /// Number of packed slots (CKKS).
    BatchSize(u32),
    /// Scale management (CKKS).
    ScalingTechnique(ScalingTechnique),
    /// Bit size of the first prime (CKKS).
    FirstModSize(u32),
    /// Number of digits in hybrid key switching (CKKS).
    NumLargeDigits(u32),
    /// Secret key distribution (CKKS).
    SecretKeyDist(SecretKeyDist),
    /// Key switching technique (CKKS).
    KeySwitchTechnique(KeySwitchTechnique),
}

impl ParamSetting {
    /// The setter's name, as used in engine messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlaintextModulus(_) => "SetPlaintextModulus",
            Self::MultiplicativeDepth(_) => "SetMultiplicativeDepth",
            Self::SecurityLevel(_) => "SetSecurityLevel",
            Self::RingDim(_) => "SetRingDim",
            Self::ScalingModSize(_) => "SetScalingModSize",
            Self::BatchSize(_) => "SetBatchSize",
            Self::ScalingTechnique(_) => "SetScalingTechnique",
            Self::FirstModSize(_) => "SetFirstModSize",
            Self::NumLargeDigits(_) => "SetNumLargeDigits",
            Self::SecretKeyDist(_) => "SetSecretKeyDist",
            Self::KeySwitchTechnique(_) => "SetKeySwitchTechnique",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A single assignment on a scheme-switching parameter block.
pub enum SchSwchSetting {
    /// Security level of the CKKS side.
    SecurityLevelCkks(SecurityLevel),
    /// Parameter set of the FHEW side.
    SecurityLevelFhew(BinFheParamSet),
    /// Number of CKKS slots involved in the switch.
    NumSlotsCkks(u32),
    /// Number of values to switch.
    NumValues(u32),
    /// Bit size of the large-precision FHEW ciphertext modulus.
    CtxtModSizeFhewLargePrec(u32),
    /// Generate the keys needed for argmin / argmax.
    ComputeArgmin(bool),
    /// Use the alternative (more precise, slower) argmin.
    UseAltArgmin(bool),
    /// Generate keys for arbitrary function evaluation.
    ArbitraryFunctionEvaluation(bool),
    /// Return argmin / argmax as a one-hot vector.
    OneHotEncoding(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// The readable fields of a scheme-switching parameter block.
pub struct SchSwchSummary {
    /// Security level of the CKKS side.
    pub security_level_ckks: SecurityLevel,
    /// Parameter set of the FHEW side.
    pub security_level_fhew: BinFheParamSet,
    /// Number of CKKS slots.
    pub num_slots_ckks: u32,
    /// Number of values.
    pub num_values: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which extremum a min/max request computes.
pub enum Extremum {
    /// Minimum and argmin.
    Min,
    /// Maximum and argmax.
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The precision tier of a min/max request.
pub enum Precision {
    /// The standard algorithm.
    Standard,
    /// The alternative algorithm: more FHEW work, higher precision.
    Alt,
}

#[derive(Debug, Clone, Copy)]
/// All inputs to a scheme-switching min/max evaluation.
pub struct MinMaxRequest {
    /// The CKKS ciphertext holding the values.
    pub ciphertext: crate::RawHandle,
    /// A public key handle, borrowed from a key pair.
    pub public_key: crate::RawHandle,
    /// Minimum or maximum.
    pub extremum: Extremum,
    /// Standard or alt.
    pub precision: Precision,
    /// How many leading slots take part. Must be a power of two.
    pub num_values: u32,
    /// Total CKKS slots.
    pub num_slots: u32,
    /// FHEW plaintext modulus. Zero selects the engine default.
    pub p_lwe: u32,
    /// Scale applied before the sign evaluation.
    pub scale_sign: f64,
}

impl MinMaxRequest {
    /// The engine's name for the requested operation.
    pub fn op_name(&self) -> &'static str {
        match (self.extremum, self.precision) {
            (Extremum::Min, Precision::Standard) => "EvalMinSchemeSwitching",
            (Extremum::Min, Precision::Alt) => "EvalMinSchemeSwitchingAlt",
            (Extremum::Max, Precision::Standard) => "EvalMaxSchemeSwitching",
            (Extremum::Max, Precision::Alt) => "EvalMaxSchemeSwitchingAlt",
        }
    }
}

#[derive(Debug, Clone, Copy)]
/// An object the serialization bridge can encode.
pub enum SerialObject<'a> {
    /// A crypto context.
    Context(crate::RawHandle),
    /// The public half of a key pair.
    PublicKey(crate::RawHandle),
    /// The private half of a key pair.
    PrivateKey(crate::RawHandle),
    /// The relinearization keys a context holds for `key_tag`.
    EvalMultKey {
        /// The owning context.
        context: crate::RawHandle,
        /// The secret key's tag.
        key_tag: &'a str,
    },
    /// A ciphertext.
    Ciphertext(crate::RawHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The kind of object a blob decodes into.
pub enum SerialKind {
    /// A crypto context.
    Context,
    /// A key pair holding only the public half.
    PublicKey,
    /// A key pair holding only the private half.
    PrivateKey,
    /// A ciphertext.
    Ciphertext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_set_is_monotonic() {
        let mut set = Feature::Pke | Feature::KeySwitch;
        set |= Feature::Pke;

        assert_eq!(set.bits(), 0x03);
        assert!(set.contains(Feature::KeySwitch));
        assert!(!set.contains(Feature::Fhe));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Feature::Pke, Feature::KeySwitch]);
    }

    #[test]
    fn enums_match_engine_discriminants() {
        assert_eq!(Feature::SchemeSwitch.to_u32(), 0x80);
        assert_eq!(ScalingTechnique::NoRescale.to_u32(), 6);
        assert_eq!(SecretKeyDist::from_u32(3), Some(SecretKeyDist::SparseEncapsulated));
        assert_eq!(BinFheParamSet::ALL.len(), 44);
        assert_eq!(BinFheParamSet::from_u32(43), Some(BinFheParamSet::SignedModTest));
        assert_eq!(BinFheParamSet::from_u32(44), None);
        assert_eq!(BinGate::Cmux.to_u32(), 13);
    }

    #[test]
    fn two_input_gates_have_truth_tables() {
        for a in [false, true] {
            for b in [false, true] {
                assert_eq!(BinGate::Nand.eval(a, b), Some(!(a && b)));
                assert_eq!(BinGate::XnorFast.eval(a, b), Some(a == b));
            }
        }

        assert_eq!(BinGate::Majority.eval(true, true), None);
    }
}
