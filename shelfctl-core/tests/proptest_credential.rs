use proptest::prelude::*;
use shelfctl_core::{CredentialRecord, MAX_SECRET_LEN, MIN_WORK_FACTOR};

fn arb_secret() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a record always verifies the secret it was made from
    #[test]
    fn prop_verify_accepts_original(secret in arb_secret(), extra in 0u32..500) {
        let record = CredentialRecord::hash(&secret, MIN_WORK_FACTOR + extra).unwrap();
        prop_assert!(record.verify(&secret));
    }

    /// Property: a different secret never verifies
    #[test]
    fn prop_verify_rejects_other(a in arb_secret(), b in arb_secret()) {
        prop_assume!(a != b);
        let record = CredentialRecord::hash(&a, MIN_WORK_FACTOR).unwrap();
        prop_assert!(!record.verify(&b));
    }

    /// Property: the stored form never contains the secret verbatim
    #[test]
    fn prop_record_hides_secret(secret in "[a-zA-Z0-9]{8,32}") {
        let record = CredentialRecord::hash(secret.as_bytes(), MIN_WORK_FACTOR).unwrap();
        prop_assert!(!record.as_str().contains(&secret));
    }

    /// Property: arbitrary stored strings never panic and never verify
    #[test]
    fn prop_garbage_records_reject(stored in ".*", secret in arb_secret()) {
        prop_assert!(!CredentialRecord::from_stored(stored).verify(&secret));
    }
}

#[test]
fn same_secret_same_factor_distinct_records() {
    let records: Vec<_> = (0..4)
        .map(|_| CredentialRecord::hash(b"secret1", MIN_WORK_FACTOR).unwrap())
        .collect();
    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            assert_ne!(a.as_str(), b.as_str());
        }
    }
}

#[test]
fn secret_of_max_len_round_trips() {
    let secret = vec![0x5a; MAX_SECRET_LEN];
    let record = CredentialRecord::hash(&secret, MIN_WORK_FACTOR).unwrap();
    assert!(record.verify(&secret));
    assert!(!record.verify(&secret[..MAX_SECRET_LEN - 1]));
}
