//! Built-in transaction processors.

pub mod pos;
pub mod token;

use serde::de::DeserializeOwned;

use stakeindex_connector::Transaction;
use stakeindex_storage::StoreTransaction;

use crate::entities::{from_row, tables, Account};
use crate::error::IndexError;

/// Deserialize a transaction's params into the processor's schema.
pub(crate) fn parse_params<T: DeserializeOwned>(tx: &Transaction) -> Result<T, IndexError> {
    serde_json::from_value(tx.params.clone()).map_err(|e| IndexError::InvalidParams {
        module: tx.module.clone(),
        command: tx.command.clone(),
        reason: e.to_string(),
    })
}

/// Load an account, creating a fresh one on first reference.
pub(crate) async fn load_or_new_account(
    store_tx: &mut dyn StoreTransaction,
    address: &str,
) -> Result<Account, IndexError> {
    match store_tx.get(tables::ACCOUNTS, address).await? {
        Some(row) => Ok(from_row(row)?),
        None => Ok(Account::new(address)),
    }
}

/// Load the sender's account and consume the transaction's nonce.
///
/// The nonce must equal the account's next expected nonce; anything else
/// means the block's transactions are being applied out of order and the
/// whole block must abort.
pub(crate) async fn consume_nonce(
    store_tx: &mut dyn StoreTransaction,
    address: &str,
    nonce: u64,
) -> Result<Account, IndexError> {
    let mut account = load_or_new_account(store_tx, address).await?;
    if account.nonce != nonce {
        return Err(IndexError::NonceMismatch {
            address: address.to_string(),
            expected: account.nonce,
            got: nonce,
        });
    }
    account.nonce += 1;
    Ok(account)
}
