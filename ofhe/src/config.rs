//! Serializable parameter presets.
//!
//! A config records the settings a caller wants and leaves everything else
//! (`None`) to the engine. Configs are plain data: they load from JSON or
//! binary and are applied to a [`Params`] with `apply`, or turned into a fresh
//! one with `build`.
use bincode::Options;
use ofhe_engine::{KeySwitchTechnique, ScalingTechnique, SecretKeyDist, SecurityLevel};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Backend, Bfv, Bgv, Ckks, Params, Result};

/// Configs are small; anything larger than this is not a config.
const MAX_CONFIG_SIZE: u64 = 4096;

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_CONFIG_SIZE)
}

/// Loading and storing a config.
pub trait Config: Serialize + DeserializeOwned {
    /// Parses a config from JSON. Missing fields are `None`.
    fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The JSON form.
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a config from its binary form.
    fn from_bincode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode_options().deserialize(bytes)?)
    }

    /// The binary form.
    fn to_bincode(&self) -> Result<Vec<u8>> {
        Ok(bincode_options().serialize(self)?)
    }
}

macro_rules! integer_config {
    ($(#[$meta:meta])* $name:ident, $scheme:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            /// The plaintext modulus `t`. Slots hold integers in `±t/2`.
            pub plaintext_modulus: Option<u64>,

            /// How many multiplications deep a circuit may go.
            pub multiplicative_depth: Option<u32>,

            /// The security level the ring dimension is chosen for.
            pub security_level: Option<SecurityLevel>,

            /// A fixed ring dimension.
            pub ring_dim: Option<u64>,
        }

        impl $name {
            /// Applies every set field to `params`, stopping at the first
            /// rejected one.
            pub fn apply(&self, params: &Params<$scheme>) -> Result<()> {
                if let Some(t) = self.plaintext_modulus {
                    params.set_plaintext_modulus(t)?;
                }
                if let Some(depth) = self.multiplicative_depth {
                    params.set_multiplicative_depth(depth)?;
                }
                if let Some(level) = self.security_level {
                    params.set_security_level(level)?;
                }
                if let Some(n) = self.ring_dim {
                    params.set_ring_dim(n)?;
                }

                Ok(())
            }

            /// A new parameter set with this config applied.
            pub fn build(&self, backend: &Backend) -> Result<Params<$scheme>> {
                let params = Params::new(backend)?;
                self.apply(&params)?;

                Ok(params)
            }
        }

        impl Config for $name {}
    };
}

integer_config!(
    /// BFV settings.
    BfvConfig,
    Bfv
);

integer_config!(
    /// BGV settings.
    BgvConfig,
    Bgv
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// CKKS settings.
pub struct CkksConfig {
    /// How many multiplications deep a circuit may go.
    pub multiplicative_depth: Option<u32>,

    /// Bit size of the scaling primes; sets the precision.
    pub scaling_mod_size: Option<u32>,

    /// Bit size of the first prime; bounds the magnitude of decrypted values.
    pub first_mod_size: Option<u32>,

    /// Number of packed slots.
    pub batch_size: Option<u32>,

    /// The security level the ring dimension is chosen for.
    pub security_level: Option<SecurityLevel>,

    /// A fixed ring dimension.
    pub ring_dim: Option<u64>,

    /// Scale management.
    pub scaling_technique: Option<ScalingTechnique>,

    /// Number of digits in hybrid key switching.
    pub num_large_digits: Option<u32>,

    /// Secret key distribution.
    pub secret_key_dist: Option<SecretKeyDist>,

    /// Key switching method.
    pub key_switch_technique: Option<KeySwitchTechnique>,
}

impl CkksConfig {
    /// Applies every set field to `params`, stopping at the first rejected one.
    pub fn apply(&self, params: &Params<Ckks>) -> Result<()> {
        if let Some(depth) = self.multiplicative_depth {
            params.set_multiplicative_depth(depth)?;
        }
        if let Some(bits) = self.scaling_mod_size {
            params.set_scaling_mod_size(bits)?;
        }
        if let Some(bits) = self.first_mod_size {
            params.set_first_mod_size(bits)?;
        }
        if let Some(slots) = self.batch_size {
            params.set_batch_size(slots)?;
        }
        if let Some(level) = self.security_level {
            params.set_security_level(level)?;
        }
        if let Some(n) = self.ring_dim {
            params.set_ring_dim(n)?;
        }
        if let Some(technique) = self.scaling_technique {
            params.set_scaling_technique(technique)?;
        }
        if let Some(digits) = self.num_large_digits {
            params.set_num_large_digits(digits)?;
        }
        if let Some(dist) = self.secret_key_dist {
            params.set_secret_key_dist(dist)?;
        }
        if let Some(technique) = self.key_switch_technique {
            params.set_key_switch_technique(technique)?;
        }

        Ok(())
    }

    /// A new parameter set with this config applied.
    pub fn build(&self, backend: &Backend) -> Result<Params<Ckks>> {
        let params = Params::new(backend)?;
        self.apply(&params)?;

        Ok(params)
    }
}

impl Config for CkksConfig {}

/// Exact arithmetic two multiplications deep over `t = 65537`, a prime that
/// allows full packing.
pub const BFV_DEPTH_2: BfvConfig = BfvConfig {
    plaintext_modulus: Some(65537),
    multiplicative_depth: Some(2),
    security_level: Some(SecurityLevel::HeStd128Classic),
    ring_dim: None,
};

/// [`BFV_DEPTH_2`] for BGV.
pub const BGV_DEPTH_2: BgvConfig = BgvConfig {
    plaintext_modulus: Some(65537),
    multiplicative_depth: Some(2),
    security_level: Some(SecurityLevel::HeStd128Classic),
    ring_dim: None,
};

/// General-purpose CKKS at 128-bit security: depth 5, about 40 bits of
/// precision, automatic rescaling.
pub const CKKS_DEFAULT: CkksConfig = CkksConfig {
    multiplicative_depth: Some(5),
    scaling_mod_size: Some(50),
    first_mod_size: Some(60),
    batch_size: None,
    security_level: Some(SecurityLevel::HeStd128Classic),
    ring_dim: None,
    scaling_technique: Some(ScalingTechnique::FlexibleAuto),
    num_large_digits: None,
    secret_key_dist: Some(SecretKeyDist::UniformTernary),
    key_switch_technique: Some(KeySwitchTechnique::Hybrid),
};

/// A tiny, insecure CKKS configuration for tests: 16 slots, depth 3.
pub const CKKS_TOY: CkksConfig = CkksConfig {
    multiplicative_depth: Some(3),
    scaling_mod_size: Some(50),
    first_mod_size: Some(60),
    batch_size: Some(16),
    security_level: Some(SecurityLevel::HeStdNotSet),
    ring_dim: Some(1 << 12),
    scaling_technique: Some(ScalingTechnique::FlexibleAuto),
    num_large_digits: None,
    secret_key_dist: None,
    key_switch_technique: None,
};
