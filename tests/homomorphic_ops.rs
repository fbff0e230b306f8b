use approx::assert_abs_diff_eq;
use credit_ckks::crypto::ReciprocalDomain;
use credit_ckks::{
    CkksContext, CkksEngine, CkksError, EvaluationKeySet, KeyGenerator, KeyPair, SchemeParameters,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

const N: usize = 256;

struct Fixture {
    engine: CkksEngine<N>,
    keys: KeyPair<N>,
    evaluation: EvaluationKeySet<N>,
    rng: ChaCha20Rng,
}

fn fixture(depth: usize, seed: u64) -> Fixture {
    fixture_with(SchemeParameters::for_depth(depth).unwrap(), seed)
}

fn fixture_with(params: SchemeParameters<N>, seed: u64) -> Fixture {
    let context = Arc::new(CkksContext::new(params).unwrap());
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let generator = KeyGenerator::new(Arc::clone(&context));
    let keys = generator.generate_key_pair(&mut rng).unwrap();
    let evaluation = generator
        .generate_evaluation_keys(&keys.secret, &mut rng)
        .unwrap();
    Fixture {
        engine: CkksEngine::new(context),
        keys,
        evaluation,
        rng,
    }
}

#[test]
fn public_and_secret_key_ciphertexts_decrypt_alike() {
    let mut f = fixture(2, 1);
    for value in [0.0, 1.0, -3.25, 850.0, 100_000_001.0] {
        let by_public = f.engine.encrypt(value, &f.keys.public, &mut f.rng).unwrap();
        let by_secret = f.engine.encrypt(value, &f.keys.secret, &mut f.rng).unwrap();
        assert_eq!(by_public.level(), f.engine.max_level());
        assert_eq!(by_secret.level(), f.engine.max_level());
        let tolerance = 1e-6 * value.abs().max(1.0);
        assert_abs_diff_eq!(
            f.engine.decrypt(&by_public, &f.keys.secret).unwrap(),
            value,
            epsilon = tolerance
        );
        assert_abs_diff_eq!(
            f.engine.decrypt(&by_secret, &f.keys.secret).unwrap(),
            value,
            epsilon = tolerance
        );
    }
}

#[test]
fn vectors_round_trip_slotwise() {
    let mut f = fixture(1, 2);
    let values: Vec<f64> = (0..N / 2).map(|i| (i as f64 - 40.0) / 7.0).collect();
    let ct = f
        .engine
        .encrypt_vector(&values, &f.keys.public, &mut f.rng)
        .unwrap();
    let decrypted = f.engine.decrypt_vector(&ct, &f.keys.secret).unwrap();
    assert_eq!(decrypted.len(), values.len());
    for (got, want) in decrypted.iter().zip(&values) {
        assert_abs_diff_eq!(got, want, epsilon = 1e-6);
    }
}

#[test]
fn chained_multiplications_drop_one_level_each() {
    let mut f = fixture(4, 3);
    let x = f.engine.encrypt(1.1, &f.keys.public, &mut f.rng).unwrap();
    let mut acc = x.clone();
    let mut expected = 1.1;
    for step in 1..=4 {
        acc = f.engine.multiply(&acc, &x, &f.evaluation).unwrap();
        expected *= 1.1;
        assert_eq!(acc.level(), 4 - step);
        assert_abs_diff_eq!(
            acc.scale,
            f.engine.context().default_scale(),
            epsilon = 1e-3 * acc.scale
        );
        assert_abs_diff_eq!(
            f.engine.decrypt(&acc, &f.keys.secret).unwrap(),
            expected,
            epsilon = 1e-5
        );
    }
    let exhausted = f.engine.multiply(&acc, &x, &f.evaluation).unwrap_err();
    assert_eq!(
        exhausted,
        CkksError::DepthExhausted {
            required: 1,
            available: 0
        }
    );
}

#[test]
fn mismatched_levels_are_rejected_by_add() {
    let mut f = fixture(2, 4);
    let a = f.engine.encrypt(2.0, &f.keys.public, &mut f.rng).unwrap();
    let b = f.engine.multiply_plain(&a, 1.0).unwrap();
    assert!(matches!(
        f.engine.add(&a, &b),
        Err(CkksError::LevelMismatch { left: 2, right: 1 })
    ));
    let aligned = f.engine.drop_to_level(&a, 1).unwrap();
    assert_abs_diff_eq!(
        f.engine
            .decrypt(&f.engine.add(&aligned, &b).unwrap(), &f.keys.secret)
            .unwrap(),
        4.0,
        epsilon = 1e-6
    );
}

#[test]
fn reciprocal_covers_low_dti_range() {
    let domain = ReciprocalDomain::new(0.01, 1.0).unwrap();
    let iterations = domain.iterations_for(1e-3);
    assert_eq!(iterations, 9);
    let mut f = fixture(2 * iterations, 5);
    for d in [0.01, 0.05, 0.2, 0.5, 1.0] {
        let ct = f.engine.encrypt(d, &f.keys.public, &mut f.rng).unwrap();
        let inverse = f
            .engine
            .reciprocal_over(&ct, &domain, 1e-3, &f.evaluation)
            .unwrap();
        assert_eq!(inverse.level(), 0);
        let got = f.engine.decrypt(&inverse, &f.keys.secret).unwrap();
        let relative = (got * d - 1.0).abs();
        assert!(relative < 2e-3, "1/{d}: got {got}, relative error {relative}");
    }
}

#[test]
fn reciprocal_checks_depth_before_work() {
    let mut f = fixture(4, 6);
    let ct = f.engine.encrypt(0.5, &f.keys.public, &mut f.rng).unwrap();
    assert_eq!(
        f.engine.reciprocal(&ct, 3, 1.0, &f.evaluation).unwrap_err(),
        CkksError::DepthExhausted {
            required: 6,
            available: 4
        }
    );
}

#[test]
fn ciphertext_from_other_chain_is_invalid() {
    let mut small = fixture(2, 7);
    let large = fixture_with(
        SchemeParameters::builder()
            .levels(2)
            .scale_bits(36)
            .build()
            .unwrap(),
        8,
    );
    let ct = small
        .engine
        .encrypt(1.0, &small.keys.public, &mut small.rng)
        .unwrap();
    assert!(matches!(
        large.engine.decrypt(&ct, &large.keys.secret),
        Err(CkksError::InvalidCiphertext { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn encrypt_decrypt_round_trip(value in -1e5f64..1e5, seed in any::<u64>()) {
        let mut f = fixture(1, seed);
        let ct = f.engine.encrypt(value, &f.keys.public, &mut f.rng).unwrap();
        let decrypted = f.engine.decrypt(&ct, &f.keys.secret).unwrap();
        prop_assert!((decrypted - value).abs() < 1e-4, "{} vs {}", decrypted, value);
    }

    #[test]
    fn add_and_multiply_are_homomorphic(a in -100f64..100.0, b in -100f64..100.0) {
        let mut f = fixture(1, 9);
        let ca = f.engine.encrypt(a, &f.keys.public, &mut f.rng).unwrap();
        let cb = f.engine.encrypt(b, &f.keys.public, &mut f.rng).unwrap();

        let sum = f.engine.add(&ca, &cb).unwrap();
        let product = f.engine.multiply(&ca, &cb, &f.evaluation).unwrap();
        let sum = f.engine.decrypt(&sum, &f.keys.secret).unwrap();
        let product = f.engine.decrypt(&product, &f.keys.secret).unwrap();
        prop_assert!((sum - (a + b)).abs() < 1e-4);
        prop_assert!((product - a * b).abs() < 1e-3, "{} vs {}", product, a * b);
    }
}
