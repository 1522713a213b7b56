use num::Complex;

use crate::{
    BinFheMethod, BinFheParamSet, BinGate, BinaryOp, EngineResult, Feature, MinMaxRequest,
    ParamSetting, RawHandle, SchSwchSetting, SchSwchSummary, SchemeId, SecretKeyDist,
    SerialFormat, SerialKind, SerialObject,
};

/// The result of an allocating call. `Ok(None)` means the engine reported
/// success without producing a handle, which callers treat as a contract violation.
pub type Alloc = EngineResult<Option<RawHandle>>;

/// The lattice-scheme (BFV, BGV, CKKS) subsystem of the engine.
///
/// # Remarks
/// Every method mirrors one entry point of the engine's C-style API: inputs are
/// raw handles, the output is a status plus (optionally) a new handle. On a
/// failed status the description is available, once, from
/// [`PkeEngine::last_error`] on the calling thread.
///
/// Handles returned from allocating calls are owned by the caller and must be
/// released through the matching `*_destroy` method exactly once. Handles
/// returned from [`PkeEngine::keypair_public`], [`PkeEngine::keypair_private`]
/// and [`PkeEngine::bin_cc_for_scheme_switch`] are borrowed from their source
/// object and must never be destroyed.
///
/// Destroy methods are infallible; destroying an already destroyed handle is a
/// contract violation the native engine cannot detect.
pub trait PkeEngine: Send + Sync {
    /// Takes the calling thread's last error message for this subsystem.
    fn last_error(&self) -> Option<String>;

    /// Allocates an empty parameter set for `scheme`.
    fn params_new(&self, scheme: SchemeId) -> Alloc;

    /// Applies one setting to a parameter set.
    fn params_set(&self, scheme: SchemeId, params: RawHandle, setting: ParamSetting)
    -> EngineResult<()>;

    /// Releases a parameter set.
    fn params_destroy(&self, scheme: SchemeId, params: RawHandle);

    /// Builds a crypto context from a parameter set. The parameter set is
    /// copied; it may be released independently afterwards.
    fn context_new(&self, scheme: SchemeId, params: RawHandle) -> Alloc;

    /// Releases a crypto context.
    fn context_destroy(&self, cc: RawHandle);

    /// The scheme a context was built for.
    fn context_scheme(&self, cc: RawHandle) -> EngineResult<SchemeId>;

    /// Enables a feature. Enabling twice is harmless.
    fn enable(&self, cc: RawHandle, feature: Feature) -> EngineResult<()>;

    /// The ring dimension `N`.
    fn ring_dimension(&self, cc: RawHandle) -> EngineResult<u64>;

    /// The cyclotomic order `M = 2N`.
    fn cyclotomic_order(&self, cc: RawHandle) -> EngineResult<u32>;

    /// A human-readable description of the element parameters.
    fn parameter_element_string(&self, cc: RawHandle) -> EngineResult<String>;

    /// The native integer width the engine was compiled with (64 or 128).
    fn native_int_width(&self) -> u32;

    /// Generates a fresh key pair.
    fn keygen(&self, cc: RawHandle) -> Alloc;

    /// Allocates a key pair with neither half present.
    fn keypair_new(&self) -> Alloc;

    /// Borrows the public half. `Ok(None)` when the half is absent.
    fn keypair_public(&self, kp: RawHandle) -> Alloc;

    /// Borrows the private half. `Ok(None)` when the half is absent.
    fn keypair_private(&self, kp: RawHandle) -> Alloc;

    /// Copies a public key (from any key pair) into `kp`.
    fn keypair_set_public(&self, kp: RawHandle, public_key: RawHandle) -> EngineResult<()>;

    /// Copies a private key (from any key pair) into `kp`.
    fn keypair_set_private(&self, kp: RawHandle, private_key: RawHandle) -> EngineResult<()>;

    /// Releases a key pair and both halves it holds.
    fn keypair_destroy(&self, kp: RawHandle);

    /// The tag evaluation keys for this key pair's secret are filed under.
    fn key_tag(&self, kp: RawHandle) -> EngineResult<String>;

    /// Generates relinearization keys.
    fn eval_mult_keygen(&self, cc: RawHandle, kp: RawHandle) -> EngineResult<()>;

    /// Generates rotation keys for exactly `indices`.
    fn eval_rotate_keygen(&self, cc: RawHandle, kp: RawHandle, indices: &[i32])
    -> EngineResult<()>;

    /// Generates the rotation keys slot summation needs.
    fn eval_sum_keygen(&self, cc: RawHandle, kp: RawHandle) -> EngineResult<()>;

    /// Encodes integers with packed encoding (BFV, BGV).
    fn make_packed_plaintext(&self, cc: RawHandle, values: &[i64]) -> Alloc;

    /// Encodes reals with CKKS packed encoding.
    fn make_ckks_packed_plaintext(&self, cc: RawHandle, values: &[f64]) -> Alloc;

    /// Encodes complex numbers with CKKS packed encoding.
    fn make_ckks_complex_packed_plaintext(&self, cc: RawHandle, values: &[Complex<f64>])
    -> Alloc;

    /// The logical length of a plaintext.
    fn plaintext_len(&self, pt: RawHandle) -> EngineResult<usize>;

    /// Decoded integer slots, up to the logical length.
    fn plaintext_packed_values(&self, pt: RawHandle) -> EngineResult<Vec<i64>>;

    /// Decoded real slots, up to the logical length.
    fn plaintext_real_values(&self, pt: RawHandle) -> EngineResult<Vec<f64>>;

    /// Decoded complex slots, up to the logical length.
    fn plaintext_complex_values(&self, pt: RawHandle) -> EngineResult<Vec<Complex<f64>>>;

    /// Sets the logical length without touching slot data.
    fn plaintext_set_length(&self, pt: RawHandle, len: usize) -> EngineResult<()>;

    /// Releases a plaintext.
    fn plaintext_destroy(&self, pt: RawHandle);

    /// Encrypts under the key pair's public half.
    fn encrypt(&self, cc: RawHandle, kp: RawHandle, pt: RawHandle) -> Alloc;

    /// Decrypts with the key pair's private half.
    fn decrypt(&self, cc: RawHandle, kp: RawHandle, ct: RawHandle) -> Alloc;

    /// Ciphertext-ciphertext arithmetic.
    fn eval_binary(&self, cc: RawHandle, op: BinaryOp, a: RawHandle, b: RawHandle) -> Alloc;

    /// Ciphertext-plaintext arithmetic.
    fn eval_binary_plain(&self, cc: RawHandle, op: BinaryOp, ct: RawHandle, pt: RawHandle)
    -> Alloc;

    /// Rotates slots left by `index` (right for negative indices).
    fn eval_rotate(&self, cc: RawHandle, ct: RawHandle, index: i32) -> Alloc;

    /// Drops one modulus level, dividing out the scale (CKKS).
    fn rescale(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// Drops one modulus level.
    fn mod_reduce(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// Evaluates `sum(coefficients[i] * x^i)` slot-wise (CKKS).
    fn eval_poly(&self, cc: RawHandle, ct: RawHandle, coefficients: &[f64]) -> Alloc;

    /// Sums each window of `batch_size` slots.
    fn eval_sum(&self, cc: RawHandle, ct: RawHandle, batch_size: u32) -> Alloc;

    /// Inner product over the first `batch_size` slots.
    fn eval_inner_product(&self, cc: RawHandle, a: RawHandle, b: RawHandle, batch_size: u32)
    -> Alloc;

    /// Computes the hoisted decomposition of `ct` for fast rotations.
    fn fast_rotation_precompute(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// Rotates `ct` using a precomputed decomposition of the same ciphertext.
    fn fast_rotation(
        &self,
        cc: RawHandle,
        ct: RawHandle,
        index: i32,
        cyclotomic_order: u32,
        precompute: RawHandle,
    ) -> Alloc;

    /// Releases a fast rotation precomputation.
    fn fast_rotation_precompute_destroy(&self, precompute: RawHandle);

    /// Number of modulus primes the ciphertext has consumed.
    fn ciphertext_level(&self, ct: RawHandle) -> EngineResult<u32>;

    /// Releases a ciphertext.
    fn ciphertext_destroy(&self, ct: RawHandle);

    /// Prepares bootstrapping for the given level budget (empty selects the
    /// engine default).
    fn bootstrap_setup(&self, cc: RawHandle, level_budget: &[u32]) -> EngineResult<()>;

    /// Generates bootstrapping keys for `slots` slots.
    fn bootstrap_keygen(&self, cc: RawHandle, kp: RawHandle, slots: u32) -> EngineResult<()>;

    /// Refreshes a ciphertext's level budget.
    fn bootstrap(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// The depth bootstrapping consumes for a level budget and key distribution.
    fn bootstrap_depth(&self, level_budget: &[u32], dist: SecretKeyDist) -> u32;

    /// Derives a re-encryption key from `old_private_key` to `new_public_key`.
    fn rekey_gen(&self, cc: RawHandle, old_private_key: RawHandle, new_public_key: RawHandle)
    -> Alloc;

    /// Re-encrypts a ciphertext with a re-encryption key.
    fn re_encrypt(&self, cc: RawHandle, ct: RawHandle, eval_key: RawHandle) -> Alloc;

    /// Releases a re-encryption key.
    fn eval_key_destroy(&self, eval_key: RawHandle);

    /// Allocates a scheme-switching parameter block with engine defaults.
    fn schswch_params_new(&self) -> Alloc;

    /// Applies one setting to a scheme-switching parameter block.
    fn schswch_params_set(&self, params: RawHandle, setting: SchSwchSetting)
    -> EngineResult<()>;

    /// Reads back a scheme-switching parameter block.
    fn schswch_params_summary(&self, params: RawHandle) -> EngineResult<SchSwchSummary>;

    /// Releases a scheme-switching parameter block.
    fn schswch_params_destroy(&self, params: RawHandle);

    /// Releases an LWE private key.
    fn lwe_private_key_destroy(&self, key: RawHandle);

    /// CKKS to FHEW setup. Returns the LWE private key the switch targets.
    fn ckks_to_fhew_setup(&self, cc: RawHandle, params: RawHandle) -> Alloc;

    /// CKKS to FHEW key generation.
    fn ckks_to_fhew_keygen(&self, cc: RawHandle, kp: RawHandle, lwe_key: RawHandle)
    -> EngineResult<()>;

    /// CKKS to FHEW precomputation for the given scale.
    fn ckks_to_fhew_precompute(&self, cc: RawHandle, scale: f64) -> EngineResult<()>;

    /// Switches the first `num_values` slots into LWE ciphertexts, each owned
    /// by the caller and released through the binary-gate subsystem.
    fn ckks_to_fhew(&self, cc: RawHandle, ct: RawHandle, num_values: u32)
    -> EngineResult<Vec<RawHandle>>;

    /// FHEW to CKKS setup against a binary-gate context.
    fn fhew_to_ckks_setup(&self, cc: RawHandle, bin_cc: RawHandle, num_slots: u32, log_q: u32)
    -> EngineResult<()>;

    /// FHEW to CKKS key generation.
    fn fhew_to_ckks_keygen(&self, cc: RawHandle, kp: RawHandle, lwe_key: RawHandle)
    -> EngineResult<()>;

    /// Packs LWE ciphertexts into a CKKS ciphertext. `range` overrides the
    /// default output interval `[0, p)`.
    fn fhew_to_ckks(
        &self,
        cc: RawHandle,
        lwe_cts: &[RawHandle],
        num_slots: u32,
        p: u32,
        range: Option<(f64, f64)>,
    ) -> Alloc;

    /// Bidirectional scheme-switching setup. Returns the LWE private key.
    fn scheme_switching_setup(&self, cc: RawHandle, params: RawHandle) -> Alloc;

    /// Bidirectional scheme-switching key generation.
    fn scheme_switching_keygen(&self, cc: RawHandle, kp: RawHandle, lwe_key: RawHandle)
    -> EngineResult<()>;

    /// Borrows the binary-gate context the CKKS context switches into. Never destroy it.
    fn bin_cc_for_scheme_switch(&self, cc: RawHandle) -> Alloc;

    /// Precomputation for comparisons through scheme switching.
    fn compare_switch_precompute(&self, cc: RawHandle, p_lwe: u32, scale_sign: f64)
    -> EngineResult<()>;

    /// Slot-wise comparison: 1 where `a < b`, 0 elsewhere.
    #[allow(clippy::too_many_arguments)]
    fn eval_compare_scheme_switching(
        &self,
        cc: RawHandle,
        a: RawHandle,
        b: RawHandle,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Alloc;

    /// Min or max with its index. Returns `(value, index)` ciphertexts.
    fn eval_min_max(
        &self,
        cc: RawHandle,
        request: MinMaxRequest,
    ) -> EngineResult<(Option<RawHandle>, Option<RawHandle>)>;

    /// Encodes an object into a blob.
    fn serialize(&self, object: SerialObject<'_>, format: SerialFormat)
    -> EngineResult<Vec<u8>>;

    /// Decodes a blob into a new object.
    fn deserialize(&self, kind: SerialKind, blob: &[u8], format: SerialFormat) -> Alloc;

    /// Loads relinearization keys from a blob into a context.
    fn deserialize_eval_mult_key(&self, cc: RawHandle, blob: &[u8], format: SerialFormat)
    -> EngineResult<()>;
}

/// The binary-gate (FHEW) subsystem of the engine, with its own error channel.
///
/// # Remarks
/// Contexts allocated with [`BinFheEngine::context_new`] are owned. A context
/// obtained through [`PkeEngine::bin_cc_for_scheme_switch`] is owned by its CKKS
/// context and accepted by every method here except
/// [`BinFheEngine::context_destroy`].
pub trait BinFheEngine: Send + Sync {
    /// Takes the calling thread's last error message for this subsystem.
    fn last_error(&self) -> Option<String>;

    /// Allocates an empty context.
    fn context_new(&self) -> Alloc;

    /// Releases an owned context.
    fn context_destroy(&self, cc: RawHandle);

    /// Instantiates a parameter set and bootstrapping method.
    fn generate(&self, cc: RawHandle, param_set: BinFheParamSet, method: BinFheMethod)
    -> EngineResult<()>;

    /// Generates a secret key.
    fn keygen(&self, cc: RawHandle) -> Alloc;

    /// Releases a secret key.
    fn secret_key_destroy(&self, sk: RawHandle);

    /// Generates bootstrapping keys for `sk`.
    fn bt_keygen(&self, cc: RawHandle, sk: RawHandle) -> EngineResult<()>;

    /// Encrypts one bit.
    fn encrypt(&self, cc: RawHandle, sk: RawHandle, bit: bool) -> Alloc;

    /// Releases a ciphertext.
    fn ciphertext_destroy(&self, ct: RawHandle);

    /// Evaluates a two-input gate.
    fn eval_bin_gate(&self, cc: RawHandle, gate: BinGate, a: RawHandle, b: RawHandle) -> Alloc;

    /// Negation; needs no bootstrapping key.
    fn eval_not(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// Refreshes a ciphertext.
    fn bootstrap(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// Decrypts a bit.
    fn decrypt(&self, cc: RawHandle, sk: RawHandle, ct: RawHandle) -> EngineResult<bool>;

    /// Decrypts modulo `p`.
    fn decrypt_modulus(&self, cc: RawHandle, sk: RawHandle, ct: RawHandle, p: u64)
    -> EngineResult<u64>;

    /// Decrypts modulo `p` with an LWE private key from scheme switching.
    fn decrypt_modulus_lwe_key(
        &self,
        cc: RawHandle,
        lwe_key: RawHandle,
        ct: RawHandle,
        p: u64,
    ) -> EngineResult<u64>;

    /// The largest plaintext modulus the parameters support.
    fn max_plaintext_space(&self, cc: RawHandle) -> EngineResult<u32>;

    /// The LWE dimension `n`.
    fn lwe_dimension(&self, cc: RawHandle) -> EngineResult<u32>;

    /// The LWE ciphertext modulus `q`.
    fn lwe_modulus(&self, cc: RawHandle) -> EngineResult<u64>;

    /// The bootstrapping error bound `beta`.
    fn beta(&self, cc: RawHandle) -> EngineResult<u32>;

    /// Encrypted sign bit of a large-precision ciphertext.
    fn eval_sign(&self, cc: RawHandle, ct: RawHandle) -> Alloc;

    /// Clears the low `bits` bits of the message.
    fn eval_floor(&self, cc: RawHandle, ct: RawHandle, bits: u32) -> Alloc;
}
