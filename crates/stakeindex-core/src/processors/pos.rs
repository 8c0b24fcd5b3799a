//! `pos` module processors: validator registration and staking.

use async_trait::async_trait;
use serde::Deserialize;

use stakeindex_connector::{BlockHeader, Transaction};
use stakeindex_storage::StoreTransaction;

use crate::entities::{from_row, tables, to_row, vote_key, Validator, VoteEdge};
use crate::error::IndexError;
use crate::processor::TransactionProcessor;
use crate::processors::{consume_nonce, parse_params};

async fn load_or_new_validator(
    store_tx: &mut dyn StoreTransaction,
    address: &str,
) -> Result<Validator, IndexError> {
    match store_tx.get(tables::VALIDATORS, address).await? {
        Some(row) => Ok(from_row(row)?),
        None => Ok(Validator::new(address, "")),
    }
}

// ─── pos:registerValidator ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterValidatorParams {
    name: String,
}

/// `pos:registerValidator` marks the sender as a validator and creates its
/// validator row. Re-registration only updates the name; aggregates survive.
pub struct RegisterValidatorProcessor;

#[async_trait]
impl TransactionProcessor for RegisterValidatorProcessor {
    fn module(&self) -> &str {
        "pos"
    }

    fn command(&self) -> &str {
        "registerValidator"
    }

    async fn apply(
        &self,
        _header: &BlockHeader,
        tx: &Transaction,
        store_tx: &mut dyn StoreTransaction,
    ) -> Result<(), IndexError> {
        let params: RegisterValidatorParams = parse_params(tx)?;

        let mut account = consume_nonce(store_tx, &tx.sender, tx.nonce).await?;
        account.is_validator = true;
        store_tx.upsert(tables::ACCOUNTS, &tx.sender, to_row(&account)?);

        let mut validator = load_or_new_validator(store_tx, &tx.sender).await?;
        validator.name = params.name;
        store_tx.upsert(tables::VALIDATORS, &tx.sender, to_row(&validator)?);

        Ok(())
    }
}

// ─── pos:stake ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakeParams {
    validator: String,
    /// Positive to stake, negative to unstake.
    amount: i64,
}

/// `pos:stake` adjusts the `(voter, validator)` vote edge and the
/// validator's aggregate vote weight in the same store transaction.
pub struct StakeProcessor;

#[async_trait]
impl TransactionProcessor for StakeProcessor {
    fn module(&self) -> &str {
        "pos"
    }

    fn command(&self) -> &str {
        "stake"
    }

    async fn apply(
        &self,
        header: &BlockHeader,
        tx: &Transaction,
        store_tx: &mut dyn StoreTransaction,
    ) -> Result<(), IndexError> {
        let params: StakeParams = parse_params(tx)?;

        let mut sender = consume_nonce(store_tx, &tx.sender, tx.nonce).await?;
        if params.amount >= 0 {
            sender.balance = sender.balance.saturating_sub(params.amount as u64);
        } else {
            sender.balance = sender.balance.saturating_add(params.amount.unsigned_abs());
        }
        store_tx.upsert(tables::ACCOUNTS, &tx.sender, to_row(&sender)?);

        let key = vote_key(&tx.sender, &params.validator);
        let previous = match store_tx.get(tables::VOTES, &key).await? {
            Some(row) => from_row::<VoteEdge>(row)?.amount,
            None => 0,
        };
        let next = (previous as i128 + params.amount as i128).max(0);

        if next == 0 {
            store_tx.delete(tables::VOTES, &key);
        } else {
            let edge = VoteEdge {
                voter: tx.sender.clone(),
                validator: params.validator.clone(),
                amount: next as u64,
                updated_at: header.timestamp,
            };
            store_tx.upsert(tables::VOTES, &key, to_row(&edge)?);
        }

        let mut validator = load_or_new_validator(store_tx, &params.validator).await?;
        let delta = next - previous as i128;
        validator.total_votes_received =
            (validator.total_votes_received as i128 + delta).max(0) as u64;
        store_tx.upsert(tables::VALIDATORS, &params.validator, to_row(&validator)?);

        Ok(())
    }
}
