//! Property tests for transaction building and payload hashing

use proptest::prelude::*;

use crate::signer::SignatureBounds;
use crate::test_utils::{custom_account_entry, empty_transaction_data, sample_call, TEST_ACCOUNT};
use crate::tx_builder::{AuthorizationAssembler, BuiltTransaction, TransactionBuilder};
use crate::types::{AccountSnapshot, InvokeOperation, NetworkId};

proptest! {
    #[test]
    fn prop_envelope_preserves_sequence_and_fee(
        sequence in 0i64..i64::MAX,
        fee in 1u32..=u32::MAX,
        max_time in 1u64..=u64::MAX,
    ) {
        let tx = TransactionBuilder::build_until(
            AccountSnapshot::new(TEST_ACCOUNT, sequence),
            &InvokeOperation::unauthorized(sample_call()),
            fee,
            max_time,
            None,
        )
        .unwrap();

        let decoded = BuiltTransaction::from_envelope_base64(&tx.to_envelope_base64().unwrap())
            .unwrap();
        prop_assert_eq!(decoded.sequence(), sequence + 1);
        prop_assert_eq!(decoded.fee(), fee);
        prop_assert_eq!(decoded.operation().unwrap().call, sample_call());
        prop_assert_eq!(
            decoded.hash(&NetworkId::testnet()).unwrap(),
            tx.hash(&NetworkId::testnet()).unwrap()
        );
    }

    #[test]
    fn prop_rebuild_never_moves_sequence(
        sequence in 0i64..i64::MAX,
        fee in 1u32..=u32::MAX,
        resource_fee in 0i64..1_000_000,
    ) {
        let tx = TransactionBuilder::build_until(
            AccountSnapshot::new(TEST_ACCOUNT, sequence),
            &InvokeOperation::unauthorized(sample_call()),
            100,
            1_000,
            None,
        )
        .unwrap();
        let rebuilt = tx
            .rebuild(
                &InvokeOperation::unauthorized(sample_call()),
                fee,
                empty_transaction_data(resource_fee),
            )
            .unwrap();

        prop_assert_eq!(rebuilt.sequence(), tx.sequence());
        prop_assert_eq!(rebuilt.fee(), fee);
        prop_assert_eq!(tx.fee(), 100);
        prop_assert!(tx.soroban_data().is_none());
    }

    #[test]
    fn prop_payload_hash_is_deterministic(
        nonce in any::<i64>(),
        other_nonce in any::<i64>(),
        expiration in any::<u32>(),
    ) {
        let assembler = AuthorizationAssembler::new(NetworkId::testnet(), SignatureBounds::default());
        let entry = custom_account_entry(nonce, 0);
        let first = assembler.payload_hash(nonce, expiration, &entry.root_invocation).unwrap();
        let second = assembler.payload_hash(nonce, expiration, &entry.root_invocation).unwrap();
        prop_assert_eq!(first, second);

        let other = assembler.payload_hash(other_nonce, expiration, &entry.root_invocation).unwrap();
        prop_assert_eq!(first == other, nonce == other_nonce);
    }
}
