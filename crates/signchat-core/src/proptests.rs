//! Property-based tests for signing and trust decisions.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::authenticator::MessageAuthenticator;
    use crate::keys::{self, Identity, KeyManager};
    use crate::prefs::{MemoryPrefs, PRIVATE_KEY};
    use crate::trust::{TrustDecision, TrustEntry, TrustStore};

    fn identity_from_seed(seed: [u8; 32]) -> Identity {
        let prefs = MemoryPrefs::with_values([(PRIVATE_KEY, hex::encode(seed))]);
        KeyManager::load_or_create_identity(&prefs).unwrap()
    }

    fn empty_store() -> TrustStore {
        TrustStore::load(Arc::new(MemoryPrefs::new())).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Signing then verifying under the matching key always succeeds
        #[test]
        fn property_sign_verify_round_trip(
            seed in prop::array::uniform32(any::<u8>()),
            text in ".*",
        ) {
            let identity = identity_from_seed(seed);
            let signature = identity.sign(text.as_bytes());
            prop_assert!(keys::verify(text.as_bytes(), &signature, identity.public_key()).unwrap());
        }

        // A persisted seed always yields the same public key
        #[test]
        fn property_identity_reload_is_stable(seed in prop::array::uniform32(any::<u8>())) {
            let first = identity_from_seed(seed);
            let second = identity_from_seed(seed);
            prop_assert_eq!(first.public_key(), second.public_key());
        }

        // Authors with no entries are never trusted, whatever the signature
        #[test]
        fn property_unknown_author_rejected(
            seed in prop::array::uniform32(any::<u8>()),
            author in "[a-z]{1,12}",
            text in ".{0,64}",
        ) {
            let identity = identity_from_seed(seed);
            let mut store = empty_store();
            store.add_verified_user(TrustEntry::new(format!("{author}-other"), identity.public_key())).unwrap();

            let msg = MessageAuthenticator::prepare_outgoing(&text, &identity, &author);
            prop_assert_eq!(store.evaluate(&msg), TrustDecision::UnknownAuthor);
        }

        // A key that verifies on its own is still rejected if it is not the
        // one trusted for the author
        #[test]
        fn property_key_mismatch_rejected(
            trusted_seed in prop::array::uniform32(any::<u8>()),
            other_seed in prop::array::uniform32(any::<u8>()),
            text in ".{0,64}",
        ) {
            prop_assume!(trusted_seed != other_seed);
            let trusted = identity_from_seed(trusted_seed);
            let other = identity_from_seed(other_seed);

            let mut store = empty_store();
            store.add_verified_user(TrustEntry::new("alice", trusted.public_key())).unwrap();

            let msg = MessageAuthenticator::prepare_outgoing(&text, &other, "alice");
            prop_assert!(MessageAuthenticator::is_self_consistent(&msg));
            prop_assert!(!store.check_user(&msg));
        }

        // Any trusted key of the author is enough
        #[test]
        fn property_multi_key_trust(
            seeds in prop::collection::vec(prop::array::uniform32(any::<u8>()), 1..5),
            pick in any::<prop::sample::Index>(),
            text in ".{0,64}",
        ) {
            let identities: Vec<Identity> = seeds.into_iter().map(identity_from_seed).collect();
            let mut store = empty_store();
            for identity in &identities {
                store.add_verified_user(TrustEntry::new("alice", identity.public_key())).unwrap();
            }

            let signer = pick.get(&identities);
            let msg = MessageAuthenticator::prepare_outgoing(&text, signer, "alice");
            prop_assert!(store.check_user(&msg));
        }

        // Changing the text after signing breaks trust
        #[test]
        fn property_tamper_detected(
            seed in prop::array::uniform32(any::<u8>()),
            text in ".{0,64}",
            suffix in ".{1,8}",
        ) {
            let identity = identity_from_seed(seed);
            let mut store = empty_store();
            store.add_verified_user(TrustEntry::new("alice", identity.public_key())).unwrap();

            let mut msg = MessageAuthenticator::prepare_outgoing(&text, &identity, "alice");
            msg.text.push_str(&suffix);
            prop_assert_eq!(store.evaluate(&msg), TrustDecision::BadSignature);
        }

        // Garbage keys and signatures produce a false result, never a panic
        #[test]
        fn property_garbage_never_trusted(
            key in ".{0,80}",
            signature in ".{0,120}",
            text in ".{0,64}",
        ) {
            let mut store = empty_store();
            store.add_verified_user(TrustEntry::new("mallory", key.clone())).unwrap();

            let msg = crate::message::Message {
                creator_name: "mallory".to_string(),
                text,
                signature,
                public_key: key,
                ..Default::default()
            };
            prop_assert!(!store.check_user(&msg));
        }

        // Adding the same entry twice never changes a decision
        #[test]
        fn property_duplicate_addition_idempotent(
            seed in prop::array::uniform32(any::<u8>()),
            text in ".{0,64}",
            tamper in any::<bool>(),
        ) {
            let identity = identity_from_seed(seed);
            let entry = TrustEntry::new("alice", identity.public_key());

            let mut once = empty_store();
            once.add_verified_user(entry.clone()).unwrap();
            let mut twice = empty_store();
            twice.add_verified_user(entry.clone()).unwrap();
            twice.add_verified_user(entry).unwrap();

            let mut msg = MessageAuthenticator::prepare_outgoing(&text, &identity, "alice");
            if tamper {
                msg.text.push('!');
            }
            prop_assert_eq!(once.check_user(&msg), twice.check_user(&msg));
        }
    }
}
