//! XDR, StrKey and ScVal helpers shared by the pipeline stages
//!
//! Everything that touches the ledger's canonical binary encoding goes
//! through here so that the base64 engine and decode limits are the same
//! for every caller.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use stellar_strkey::{ed25519::PublicKey as StrkeyPublicKey, Contract as StrkeyContract};
use stellar_xdr::curr::{
    AccountId, Hash, Int128Parts, Limits, MuxedAccount, PublicKey, ReadXdr, ScAddress, ScBytes,
    ScVal, Transaction, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, Uint256, WriteXdr,
};

use super::errors::TransactionBuilderError;
use crate::types::NetworkId;

/// Encode any XDR value as base64
pub fn to_base64<T: WriteXdr>(value: &T) -> Result<String, TransactionBuilderError> {
    let bytes = value
        .to_xdr(Limits::none())
        .map_err(|e| TransactionBuilderError::xdr(format!("encode failed: {}", e)))?;
    Ok(BASE64.encode(bytes))
}

/// Decode a base64 XDR value
pub fn from_base64<T: ReadXdr>(encoded: &str) -> Result<T, TransactionBuilderError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| TransactionBuilderError::xdr(format!("base64 decode failed: {}", e)))?;
    T::from_xdr(bytes, Limits::none())
        .map_err(|e| TransactionBuilderError::xdr(format!("XDR decode failed: {}", e)))
}

/// Single SHA-256 over the XDR encoding of a value
pub fn xdr_sha256<T: WriteXdr>(value: &T) -> Result<[u8; 32], TransactionBuilderError> {
    let bytes = value
        .to_xdr(Limits::none())
        .map_err(|e| TransactionBuilderError::xdr(format!("encode failed: {}", e)))?;
    Ok(Sha256::digest(&bytes).into())
}

/// Hash the fee-payer signs: SHA-256 of the network-tagged transaction
pub fn transaction_hash(
    tx: &Transaction,
    network_id: &NetworkId,
) -> Result<[u8; 32], TransactionBuilderError> {
    let payload = TransactionSignaturePayload {
        network_id: network_id.as_xdr_hash(),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    xdr_sha256(&payload)
}

/// Parse a `G...` account or `C...` contract address
pub fn parse_address(address: &str) -> Result<ScAddress, TransactionBuilderError> {
    if let Ok(pk) = StrkeyPublicKey::from_string(address) {
        return Ok(account_address(pk.0));
    }
    if let Ok(contract) = StrkeyContract::from_string(address) {
        return Ok(ScAddress::Contract(Hash(contract.0)));
    }
    Err(TransactionBuilderError::Configuration(format!(
        "invalid Stellar address: {}",
        address
    )))
}

/// Parse a `G...` account address into its raw ed25519 key
pub fn parse_account_key(address: &str) -> Result<[u8; 32], TransactionBuilderError> {
    StrkeyPublicKey::from_string(address)
        .map(|pk| pk.0)
        .map_err(|_| {
            TransactionBuilderError::Configuration(format!("invalid account address: {}", address))
        })
}

pub fn account_address(key: [u8; 32]) -> ScAddress {
    ScAddress::Account(account_id(key))
}

pub fn account_id(key: [u8; 32]) -> AccountId {
    AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))
}

pub fn muxed_account(key: [u8; 32]) -> MuxedAccount {
    MuxedAccount::Ed25519(Uint256(key))
}

/// Render an address back to StrKey form, for logs and reports
pub fn address_to_string(address: &ScAddress) -> String {
    match address {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))) => {
            StrkeyPublicKey(*key).to_string()
        }
        ScAddress::Contract(Hash(id)) => StrkeyContract(*id).to_string(),
    }
}

pub fn bytes_val(bytes: &[u8]) -> Result<ScVal, TransactionBuilderError> {
    let inner = bytes
        .to_vec()
        .try_into()
        .map_err(|_| TransactionBuilderError::xdr("byte argument too large"))?;
    Ok(ScVal::Bytes(ScBytes(inner)))
}

pub fn i128_val(value: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

pub fn address_val(address: ScAddress) -> ScVal {
    ScVal::Address(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_xdr::curr::ScSymbol;

    const ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";
    const CONTRACT: &str = "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABSC4";

    #[test]
    fn test_parse_address_kinds() {
        assert!(matches!(parse_address(ACCOUNT).unwrap(), ScAddress::Account(_)));
        assert!(matches!(parse_address(CONTRACT).unwrap(), ScAddress::Contract(_)));
        assert!(parse_address("not-an-address").is_err());
        assert!(parse_account_key(CONTRACT).is_err());
    }

    #[test]
    fn test_address_string_round_trip() {
        let parsed = parse_address(CONTRACT).unwrap();
        assert_eq!(address_to_string(&parsed), CONTRACT);
        let parsed = parse_address(ACCOUNT).unwrap();
        assert_eq!(address_to_string(&parsed), ACCOUNT);
    }

    #[test]
    fn test_i128_split() {
        match i128_val(10) {
            ScVal::I128(parts) => {
                assert_eq!(parts.hi, 0);
                assert_eq!(parts.lo, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
        match i128_val(-1) {
            ScVal::I128(parts) => {
                assert_eq!(parts.hi, -1);
                assert_eq!(parts.lo, u64::MAX);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_base64_round_trip_and_garbage() {
        let val = ScVal::Symbol(ScSymbol("verify".try_into().unwrap()));
        let encoded = to_base64(&val).unwrap();
        let decoded: ScVal = from_base64(&encoded).unwrap();
        assert_eq!(decoded, val);

        assert!(from_base64::<ScVal>("%%%").is_err());
        assert!(from_base64::<ScVal>("AAAA/w==").is_err());
    }
}
