use ofhe::{
    Backend, Bfv, Ciphertext, Ckks, CryptoContext, Feature, Params, SecretKeyDist, SecurityLevel,
    SerialFormat,
    bootstrap::{Bootstrapper, bootstrap_depth},
    pre::ReEncryptionChain,
    schemeswitch::{SchSwchParams, SchemeSwitching},
    test_utils::approx_eq,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ckks_context(backend: &Backend, depth: u32, features: &[Feature]) -> CryptoContext<Ckks> {
    let params = Params::<Ckks>::new(backend).unwrap();
    params.set_multiplicative_depth(depth).unwrap();
    params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
    params.set_ring_dim(1 << 12).unwrap();
    params.set_batch_size(8).unwrap();

    let cc = CryptoContext::new(&params).unwrap();
    cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
        .unwrap();
    cc.enable_all(features.iter().copied()).unwrap();

    cc
}

#[test]
fn signs_travel_through_fhew_and_back() {
    init_logger();
    let backend = Backend::simulated();
    let cc = ckks_context(&backend, 2, &[Feature::SchemeSwitch]);
    let keys = cc.keygen().unwrap();

    let params = SchSwchParams::new(&backend).unwrap();
    params.set_num_slots_ckks(8).unwrap();
    let switch = SchemeSwitching::setup(&cc, &params)
        .unwrap()
        .keygen(&keys)
        .unwrap();

    let bin_cc = switch.bin_cc().unwrap();
    let p = bin_cc.max_plaintext_space().unwrap();
    cc.eval_ckks_to_fhew_precompute(1.0 / f64::from(p)).unwrap();

    let values = [3.0, -2.0, 5.0, -7.0];
    let ct = cc
        .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
        .unwrap();

    let signs = cc
        .eval_ckks_to_fhew(&ct, values.len() as u32)
        .unwrap()
        .iter()
        .map(|lwe| bin_cc.eval_sign(lwe).unwrap())
        .collect::<Vec<_>>();

    let packed = cc.eval_fhew_to_ckks(&signs, 8, 4).unwrap();
    let pt = cc.decrypt(&keys, &packed).unwrap();
    pt.set_length(values.len()).unwrap();

    assert!(approx_eq(
        &pt.real_packed_values().unwrap(),
        &[0.0, 1.0, 0.0, 1.0],
        1e-3
    ));
}

#[test]
fn minimum_and_its_position() {
    init_logger();
    let backend = Backend::simulated();
    let cc = ckks_context(&backend, 16, &[Feature::AdvancedShe, Feature::SchemeSwitch]);
    let keys = cc.keygen().unwrap();

    let params = SchSwchParams::new(&backend).unwrap();
    params.set_num_slots_ckks(8).unwrap();
    params.set_num_values(8).unwrap();
    params.set_compute_argmin(true).unwrap();

    let switch = SchemeSwitching::setup(&cc, &params)
        .unwrap()
        .keygen(&keys)
        .unwrap()
        .compare_precompute(0, 1.0)
        .unwrap();

    let values = [5.2, 3.1, 7.8, 2.9, 6.0, 1.5, 4.3, 8.1];
    let ct = cc
        .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
        .unwrap();

    let min = switch.eval_min(&ct, &keys.public_key().unwrap(), 8, 8).unwrap();

    let pt = cc.decrypt(&keys, &min.value).unwrap();
    pt.set_length(1).unwrap();
    assert!(approx_eq(&pt.real_packed_values().unwrap(), &[1.5], 0.1));
    assert_eq!(min.index_from_one_hot(&cc, &keys, 8).unwrap(), 5);
}

#[test]
fn bootstrapping_keeps_a_long_computation_going() {
    init_logger();
    let backend = Backend::simulated();
    let budget = [3, 3];
    let depth = bootstrap_depth(&backend, &budget, SecretKeyDist::UniformTernary) + 2;
    let cc = ckks_context(&backend, depth, &[Feature::AdvancedShe, Feature::Fhe]);
    let keys = cc.keygen().unwrap();
    cc.eval_mult_keygen(&keys).unwrap();

    let bootstrapper = Bootstrapper::setup_simple(&cc, &budget)
        .unwrap()
        .keygen(&keys, 8)
        .unwrap();

    let mut ct = cc
        .encrypt(&keys, &cc.make_ckks_packed_plaintext(&[1.0, -1.0, 0.99]).unwrap())
        .unwrap();

    // Without the bootstrap the second round would exhaust the context.
    for _ in 0..4 {
        ct = cc.eval_mult(&ct, &ct).unwrap();
        ct = cc.eval_mult(&ct, &ct).unwrap();
        ct = bootstrapper.bootstrap(&ct).unwrap();
    }

    let expected = [1.0, 1.0, 0.99f64.powi(256)];
    let pt = cc.decrypt(&keys, &ct).unwrap();
    pt.set_length(expected.len()).unwrap();

    assert!(approx_eq(&pt.real_packed_values().unwrap(), &expected, 1e-2));
}

#[test]
fn shared_ciphertext_is_re_encrypted_after_transport() {
    init_logger();
    let backend = Backend::simulated();
    let params = Params::<Bfv>::new(&backend).unwrap();
    params.set_plaintext_modulus(65537).unwrap();

    let cc = CryptoContext::new(&params).unwrap();
    cc.enable_all([
        Feature::Pke,
        Feature::KeySwitch,
        Feature::LeveledShe,
        Feature::Pre,
    ])
    .unwrap();

    let [alice, bob, carol] = [(); 3].map(|_| cc.keygen().unwrap());
    let mut chain = ReEncryptionChain::new();
    chain.push(
        cc.rekey_gen(&alice.private_key().unwrap(), &bob.public_key().unwrap())
            .unwrap(),
    );
    chain.push(
        cc.rekey_gen(&bob.private_key().unwrap(), &carol.public_key().unwrap())
            .unwrap(),
    );

    let values = [11, -12, 13];
    let ct = cc
        .encrypt(&alice, &cc.make_packed_plaintext(&values).unwrap())
        .unwrap();

    for format in [SerialFormat::Json, SerialFormat::Binary] {
        let received = Ciphertext::deserialize(&backend, &ct.serialize(format).unwrap()).unwrap();
        let out = chain.apply(&cc, &received).unwrap();

        let pt = cc.decrypt(&carol, &out).unwrap();
        pt.set_length(values.len()).unwrap();
        assert_eq!(pt.packed_values().unwrap(), values);
    }
}

#[test]
fn hoisted_rotations_sum_a_window() {
    init_logger();
    let backend = Backend::simulated();
    let cc = ckks_context(&backend, 2, &[]);
    let keys = cc.keygen().unwrap();
    cc.eval_rotate_keygen(&keys, &[1, 2, 3]).unwrap();

    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let ct = cc
        .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
        .unwrap();
    let m = cc.cyclotomic_order().unwrap();
    let pre = cc.fast_rotation_precompute(&ct).unwrap();

    let mut sum = cc.eval_add(&ct, &cc.fast_rotation(&ct, 1, m, &pre).unwrap()).unwrap();
    for index in [2, 3] {
        sum = cc
            .eval_add(&sum, &cc.fast_rotation(&ct, index, m, &pre).unwrap())
            .unwrap();
    }

    let pt = cc.decrypt(&keys, &sum).unwrap();
    pt.set_length(5).unwrap();

    assert!(approx_eq(
        &pt.real_packed_values().unwrap(),
        &[10.0, 14.0, 18.0, 22.0, 26.0],
        1e-6
    ));
}
