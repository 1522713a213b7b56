#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Safe bindings to the OpenFHE engine.
//!
//! Every engine object (parameters, contexts, key pairs, plaintexts,
//! ciphertexts, FHEW contexts and keys) is wrapped in a type that releases it
//! exactly once, either through an explicit `close()` or on drop. Objects the
//! engine owns on your behalf, such as the FHEW context behind a scheme
//! switching setup, are handed out as borrows that never release anything.
//!
//! Failures surface as [`Error`]s. Native failures carry the message the
//! engine left in the error channel of the subsystem that failed, PKE or
//! BinFHE.
//!
//! On top of the lattice schemes ([`Bfv`], [`Bgv`], [`Ckks`]) and binary gates
//! ([`BinFheContext`]), the crate offers the multi-step workflows as builders:
//! [`schemeswitch`], [`bootstrap`], [`pre`] and [`hoisting`].
//!
//! # Example
//!
//! ```rust
//! use ofhe::{Backend, Bfv, CryptoContext, Feature, Params, SecurityLevel};
//!
//! let backend = Backend::simulated();
//!
//! let params = Params::<Bfv>::new(&backend).unwrap();
//! params.set_plaintext_modulus(65537).unwrap();
//! params.set_multiplicative_depth(2).unwrap();
//! params.set_security_level(SecurityLevel::HeStd128Classic).unwrap();
//!
//! let cc = CryptoContext::new(&params).unwrap();
//! cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
//!     .unwrap();
//!
//! let keys = cc.keygen().unwrap();
//! cc.eval_mult_keygen(&keys).unwrap();
//!
//! let a = cc.encrypt(&keys, &cc.make_packed_plaintext(&[1, 2, 3]).unwrap()).unwrap();
//! let b = cc.encrypt(&keys, &cc.make_packed_plaintext(&[4, 5, 6]).unwrap()).unwrap();
//!
//! let sum = cc.eval_add(&a, &b).unwrap();
//! let product = cc.eval_mult(&a, &b).unwrap();
//!
//! let pt = cc.decrypt(&keys, &sum).unwrap();
//! pt.set_length(3).unwrap();
//! assert_eq!(pt.packed_values().unwrap(), vec![5, 7, 9]);
//!
//! let pt = cc.decrypt(&keys, &product).unwrap();
//! pt.set_length(3).unwrap();
//! assert_eq!(pt.packed_values().unwrap(), vec![4, 10, 18]);
//! ```
mod backend;
mod binfhe;
mod bridge;
mod ciphertext;
mod context;
mod error;
mod handle;
mod keys;
mod params;
mod plaintext;

pub mod bootstrap;
pub mod config;
pub mod hoisting;
pub mod minmax;
pub mod pre;
pub mod schemeswitch;
pub mod serial;

#[cfg(feature = "sim")]
#[doc(hidden)]
pub mod test_utils;

pub use backend::Backend;
pub use binfhe::{BinFheContext, BinFheContextRef, BinFheSecretKey, LweCiphertext};
pub use ciphertext::Ciphertext;
pub use context::CryptoContext;
pub use error::*;
pub use keys::{KeyPair, PrivateKey, PublicKey};
pub use params::{Bfv, Bgv, Ckks, IntegerScheme, Params, Scheme};
pub use plaintext::Plaintext;
pub use schemeswitch::LwePrivateKey;

pub use ofhe_engine::{
    BinFheMethod, BinFheParamSet, BinGate, Complex, Feature, FeatureSet, KeySwitchTechnique,
    ScalingTechnique, SchemeId, SecretKeyDist, SecurityLevel, SerialFormat,
};
