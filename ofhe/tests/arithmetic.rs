use std::sync::OnceLock;

use ofhe::{
    Bfv, Bgv, Ckks, CryptoContext, Error, Feature, IntegerScheme, KeyPair, Params, SecurityLevel,
    config::{BFV_DEPTH_2, BGV_DEPTH_2},
    test_utils::get_backend,
};
use proptest::prelude::*;

const T: i64 = 65537;

fn setup<S: IntegerScheme>(params: Params<S>) -> (CryptoContext<S>, KeyPair) {
    let _ = env_logger::builder().is_test(true).try_init();

    let cc = CryptoContext::new(&params).unwrap();
    cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
        .unwrap();
    let keys = cc.keygen().unwrap();
    cc.eval_mult_keygen(&keys).unwrap();

    (cc, keys)
}

fn bfv() -> &'static (CryptoContext<Bfv>, KeyPair) {
    static BFV: OnceLock<(CryptoContext<Bfv>, KeyPair)> = OnceLock::new();

    BFV.get_or_init(|| setup(BFV_DEPTH_2.build(&get_backend()).unwrap()))
}

fn bgv() -> &'static (CryptoContext<Bgv>, KeyPair) {
    static BGV: OnceLock<(CryptoContext<Bgv>, KeyPair)> = OnceLock::new();

    BGV.get_or_init(|| setup(BGV_DEPTH_2.build(&get_backend()).unwrap()))
}

fn centered(x: i64) -> i64 {
    let r = x.rem_euclid(T);
    if r > T / 2 { r - T } else { r }
}

fn add_and_mult<S: IntegerScheme>(
    cc: &CryptoContext<S>,
    keys: &KeyPair,
    a: &[i64],
    b: &[i64],
) -> (Vec<i64>, Vec<i64>) {
    let ct_a = cc
        .encrypt(keys, &cc.make_packed_plaintext(a).unwrap())
        .unwrap();
    let ct_b = cc
        .encrypt(keys, &cc.make_packed_plaintext(b).unwrap())
        .unwrap();

    let decrypt = |ct| {
        let pt = cc.decrypt(keys, &ct).unwrap();
        pt.set_length(a.len()).unwrap();
        pt.packed_values().unwrap()
    };

    (
        decrypt(cc.eval_add(&ct_a, &ct_b).unwrap()),
        decrypt(cc.eval_mult(&ct_a, &ct_b).unwrap()),
    )
}

fn operands() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    (1usize..16).prop_flat_map(|len| {
        (
            prop::collection::vec(-1000i64..1000, len),
            prop::collection::vec(-1000i64..1000, len),
        )
    })
}

#[test]
fn packed_example() {
    let a = [1, 2, 3, 4];
    let b = [5, 6, 7, 8];

    let (cc, keys) = bfv();
    assert_eq!(
        add_and_mult(cc, keys, &a, &b),
        (vec![6, 8, 10, 12], vec![5, 12, 21, 32])
    );

    let (cc, keys) = bgv();
    assert_eq!(
        add_and_mult(cc, keys, &a, &b),
        (vec![6, 8, 10, 12], vec![5, 12, 21, 32])
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bfv_is_exact_modulo_t((a, b) in operands()) {
        let (cc, keys) = bfv();
        let (sum, product) = add_and_mult(cc, keys, &a, &b);

        let expected_sum = a.iter().zip(&b).map(|(x, y)| centered(x + y)).collect::<Vec<_>>();
        let expected_product = a.iter().zip(&b).map(|(x, y)| centered(x * y)).collect::<Vec<_>>();

        prop_assert_eq!(sum, expected_sum);
        prop_assert_eq!(product, expected_product);
    }

    #[test]
    fn bgv_is_exact_modulo_t((a, b) in operands()) {
        let (cc, keys) = bgv();
        let (sum, product) = add_and_mult(cc, keys, &a, &b);

        let expected_sum = a.iter().zip(&b).map(|(x, y)| centered(x + y)).collect::<Vec<_>>();
        let expected_product = a.iter().zip(&b).map(|(x, y)| centered(x * y)).collect::<Vec<_>>();

        prop_assert_eq!(sum, expected_sum);
        prop_assert_eq!(product, expected_product);
    }
}

#[test]
fn ckks_runs_out_of_depth() {
    let params = Params::<Ckks>::new(&get_backend()).unwrap();
    params.set_multiplicative_depth(2).unwrap();
    params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
    params.set_ring_dim(1 << 12).unwrap();
    params.set_batch_size(8).unwrap();

    let cc = CryptoContext::new(&params).unwrap();
    cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
        .unwrap();
    let keys = cc.keygen().unwrap();
    cc.eval_mult_keygen(&keys).unwrap();

    let ct = cc
        .encrypt(&keys, &cc.make_ckks_packed_plaintext(&[1.5, 2.0]).unwrap())
        .unwrap();
    let squared = cc.eval_mult(&ct, &ct).unwrap();
    let fourth = cc.eval_mult(&squared, &squared).unwrap();

    let err = cc.eval_mult(&fourth, &fourth).unwrap_err();
    assert!(matches!(err, Error::Native { .. }), "{err}");
    assert!(err.to_string().contains("multiplicative depth"), "{err}");
}
