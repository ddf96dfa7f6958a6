//! Contract-call operation planning
//!
//! Converts between the pipeline's [`InvokeOperation`] and the ledger's
//! `InvokeHostFunction` operation. A transaction carries exactly one such
//! operation.

use stellar_xdr::curr::{
    HostFunction, InvokeContractArgs, InvokeHostFunctionOp, Operation, OperationBody, ScSymbol,
};

use super::errors::TransactionBuilderError;
use crate::types::{ContractCall, InvokeOperation};

/// Build the ledger operation for a contract call and its authorization
pub fn to_xdr_operation(op: &InvokeOperation) -> Result<Operation, TransactionBuilderError> {
    let function_name = ScSymbol(op.call.function().try_into().map_err(|_| {
        TransactionBuilderError::xdr(format!(
            "function name too long: {}",
            op.call.function()
        ))
    })?);

    let args = op
        .call
        .args()
        .to_vec()
        .try_into()
        .map_err(|_| TransactionBuilderError::xdr("too many call arguments"))?;

    let auth = op
        .auth
        .clone()
        .try_into()
        .map_err(|_| TransactionBuilderError::xdr("too many authorization entries"))?;

    Ok(Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(InvokeContractArgs {
                contract_address: op.call.contract().clone(),
                function_name,
                args,
            }),
            auth,
        }),
    })
}

/// Recover the contract call from a ledger operation
pub fn from_xdr_operation(operation: &Operation) -> Result<InvokeOperation, TransactionBuilderError> {
    let OperationBody::InvokeHostFunction(invoke) = &operation.body else {
        return Err(TransactionBuilderError::xdr(
            "operation is not a host function invocation",
        ));
    };
    let HostFunction::InvokeContract(args) = &invoke.host_function else {
        return Err(TransactionBuilderError::xdr(
            "host function is not a contract call",
        ));
    };

    let name: Vec<u8> = args.function_name.0.clone().into();
    let function = String::from_utf8(name)
        .map_err(|_| TransactionBuilderError::xdr("function name is not UTF-8"))?;

    Ok(InvokeOperation {
        call: ContractCall::new(args.contract_address.clone(), function, args.args.to_vec()),
        auth: invoke.auth.to_vec(),
    })
}
