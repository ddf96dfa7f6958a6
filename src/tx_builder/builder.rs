//! Core transaction building
//!
//! Turns a consumed [`AccountSnapshot`] plus one contract-call operation into
//! an immutable [`BuiltTransaction`]. Changing the fee, footprint or
//! authorization always yields a new value via [`BuiltTransaction::rebuild`];
//! the sequence number and validity window carry over unchanged.

use chrono::Utc;
use std::time::Duration;
use stellar_xdr::curr::{
    DecoratedSignature, Memo, Preconditions, SequenceNumber, Signature, SignatureHint,
    SorobanTransactionData, TimeBounds, TimePoint, Transaction, TransactionEnvelope, TransactionExt,
    TransactionV1Envelope, VecM,
};
use tracing::debug;

use super::encoding::{from_base64, muxed_account, parse_account_key, to_base64, transaction_hash};
use super::errors::TransactionBuilderError;
use super::operation::{from_xdr_operation, to_xdr_operation};
use crate::types::{AccountSnapshot, InvokeOperation, NetworkId, TxHash};
use crate::wallet::EnvelopeSigner;

/// Stateless builder for single-operation contract-call transactions
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionBuilder;

impl TransactionBuilder {
    /// Build an unsigned transaction valid for `timeout` from now
    ///
    /// The snapshot is consumed: the transaction takes `snapshot.sequence + 1`
    /// and the snapshot cannot feed a second build.
    pub fn build(
        snapshot: AccountSnapshot,
        operation: &InvokeOperation,
        fee: u32,
        timeout: Duration,
        soroban_data: Option<SorobanTransactionData>,
    ) -> Result<BuiltTransaction, TransactionBuilderError> {
        let max_time = (Utc::now().timestamp().max(0) as u64).saturating_add(timeout.as_secs());
        Self::build_until(snapshot, operation, fee, max_time, soroban_data)
    }

    /// Build with an explicit upper time bound (unix seconds)
    pub fn build_until(
        snapshot: AccountSnapshot,
        operation: &InvokeOperation,
        fee: u32,
        max_time: u64,
        soroban_data: Option<SorobanTransactionData>,
    ) -> Result<BuiltTransaction, TransactionBuilderError> {
        if fee == 0 {
            return Err(TransactionBuilderError::Configuration(
                "fee must be positive".to_string(),
            ));
        }

        let source_key = parse_account_key(&snapshot.address)?;
        let sequence = snapshot.next_sequence().ok_or_else(|| {
            TransactionBuilderError::internal(format!(
                "sequence overflow for {}",
                snapshot.address
            ))
        })?;

        let tx = Transaction {
            source_account: muxed_account(source_key),
            fee,
            seq_num: SequenceNumber(sequence),
            cond: Preconditions::Time(TimeBounds {
                min_time: TimePoint(0),
                max_time: TimePoint(max_time),
            }),
            memo: Memo::None,
            operations: vec![to_xdr_operation(operation)?]
                .try_into()
                .map_err(|_| TransactionBuilderError::xdr("operation list"))?,
            ext: match soroban_data {
                Some(data) => TransactionExt::V1(data),
                None => TransactionExt::V0,
            },
        };

        debug!(
            source = %snapshot.address,
            sequence,
            fee,
            function = operation.call.function(),
            "Built transaction"
        );

        Ok(BuiltTransaction { tx })
    }
}

/// An unsigned, immutable transaction
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTransaction {
    tx: Transaction,
}

impl BuiltTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn fee(&self) -> u32 {
        self.tx.fee
    }

    pub fn sequence(&self) -> i64 {
        self.tx.seq_num.0
    }

    pub fn soroban_data(&self) -> Option<&SorobanTransactionData> {
        match &self.tx.ext {
            TransactionExt::V1(data) => Some(data),
            TransactionExt::V0 => None,
        }
    }

    /// The single contract-call operation
    pub fn operation(&self) -> Result<InvokeOperation, TransactionBuilderError> {
        let op = self
            .tx
            .operations
            .first()
            .ok_or_else(|| TransactionBuilderError::internal("transaction has no operation"))?;
        from_xdr_operation(op)
    }

    /// New transaction with the same source, sequence and validity window
    pub fn rebuild(
        &self,
        operation: &InvokeOperation,
        fee: u32,
        soroban_data: SorobanTransactionData,
    ) -> Result<BuiltTransaction, TransactionBuilderError> {
        if fee == 0 {
            return Err(TransactionBuilderError::Configuration(
                "fee must be positive".to_string(),
            ));
        }
        let tx = Transaction {
            fee,
            operations: vec![to_xdr_operation(operation)?]
                .try_into()
                .map_err(|_| TransactionBuilderError::xdr("operation list"))?,
            ext: TransactionExt::V1(soroban_data),
            ..self.tx.clone()
        };
        Ok(BuiltTransaction { tx })
    }

    /// Unsigned envelope as sent to simulation
    pub fn to_envelope_base64(&self) -> Result<String, TransactionBuilderError> {
        to_base64(&TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: self.tx.clone(),
            signatures: VecM::default(),
        }))
    }

    /// Decode an envelope produced by [`Self::to_envelope_base64`] or [`SignedEnvelope::to_base64`]
    pub fn from_envelope_base64(encoded: &str) -> Result<Self, TransactionBuilderError> {
        match from_base64::<TransactionEnvelope>(encoded)? {
            TransactionEnvelope::Tx(env) => Ok(Self { tx: env.tx }),
            _ => Err(TransactionBuilderError::xdr("expected a v1 transaction envelope")),
        }
    }

    pub fn hash(&self, network_id: &NetworkId) -> Result<TxHash, TransactionBuilderError> {
        Ok(TxHash::from_bytes(transaction_hash(&self.tx, network_id)?))
    }

    /// Sign the envelope with the fee-payer key
    pub fn sign(
        self,
        signer: &dyn EnvelopeSigner,
        network_id: &NetworkId,
    ) -> Result<SignedEnvelope, TransactionBuilderError> {
        let hash_bytes = transaction_hash(&self.tx, network_id)?;
        let public_key = signer.public_key();

        let mut hint = [0u8; 4];
        hint.copy_from_slice(&public_key[28..]);

        let signature = DecoratedSignature {
            hint: SignatureHint(hint),
            signature: Signature(
                signer
                    .sign(&hash_bytes)
                    .to_vec()
                    .try_into()
                    .map_err(|_| TransactionBuilderError::xdr("signature length"))?,
            ),
        };

        Ok(SignedEnvelope {
            envelope: TransactionEnvelope::Tx(TransactionV1Envelope {
                tx: self.tx,
                signatures: vec![signature]
                    .try_into()
                    .map_err(|_| TransactionBuilderError::xdr("signature list"))?,
            }),
            hash: TxHash::from_bytes(hash_bytes),
        })
    }
}

/// Signed envelope ready for submission
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub envelope: TransactionEnvelope,
    pub hash: TxHash,
}

impl SignedEnvelope {
    pub fn to_base64(&self) -> Result<String, TransactionBuilderError> {
        to_base64(&self.envelope)
    }
}
