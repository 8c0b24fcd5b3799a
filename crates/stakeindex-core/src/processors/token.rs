//! `token` module processors.

use async_trait::async_trait;
use serde::Deserialize;

use stakeindex_connector::{BlockHeader, Transaction};
use stakeindex_storage::StoreTransaction;

use crate::entities::{tables, to_row};
use crate::error::IndexError;
use crate::processor::TransactionProcessor;
use crate::processors::{consume_nonce, load_or_new_account, parse_params};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferParams {
    recipient: String,
    amount: u64,
}

/// `token:transfer` moves balance from the sender to a recipient.
pub struct TokenTransferProcessor;

#[async_trait]
impl TransactionProcessor for TokenTransferProcessor {
    fn module(&self) -> &str {
        "token"
    }

    fn command(&self) -> &str {
        "transfer"
    }

    async fn apply(
        &self,
        _header: &BlockHeader,
        tx: &Transaction,
        store_tx: &mut dyn StoreTransaction,
    ) -> Result<(), IndexError> {
        let params: TransferParams = parse_params(tx)?;
        let mut sender = consume_nonce(store_tx, &tx.sender, tx.nonce).await?;

        if params.recipient == tx.sender {
            // Self-transfer: debit and credit cancel out, only the nonce moves.
            store_tx.upsert(tables::ACCOUNTS, &tx.sender, to_row(&sender)?);
            return Ok(());
        }

        sender.balance = sender.balance.saturating_sub(params.amount);
        store_tx.upsert(tables::ACCOUNTS, &tx.sender, to_row(&sender)?);

        let mut recipient = load_or_new_account(store_tx, &params.recipient).await?;
        recipient.balance = recipient.balance.saturating_add(params.amount);
        store_tx.upsert(tables::ACCOUNTS, &params.recipient, to_row(&recipient)?);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stakeindex_storage::{MemoryStore, Store};

    use crate::entities::from_row;
    use crate::entities::Account;

    fn header() -> BlockHeader {
        BlockHeader {
            height: 1,
            id: "blk-1".into(),
            previous_id: "blk-0".into(),
            generator: "val-1".into(),
            timestamp: 1000,
            is_final: false,
        }
    }

    fn transfer(sender: &str, recipient: &str, amount: u64, nonce: u64) -> Transaction {
        Transaction {
            id: format!("tx-{sender}-{nonce}"),
            module: "token".into(),
            command: "transfer".into(),
            nonce,
            sender: sender.into(),
            params: json!({ "recipient": recipient, "amount": amount }),
        }
    }

    #[tokio::test]
    async fn transfer_moves_balance_and_nonce() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let mut funded = Account::new("alice");
        funded.balance = 1000;
        setup.upsert(tables::ACCOUNTS, "alice", to_row(&funded).unwrap());
        setup.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        TokenTransferProcessor
            .apply(&header(), &transfer("alice", "bob", 300, 0), tx.as_mut())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let alice: Account =
            from_row(store.get(tables::ACCOUNTS, "alice").await.unwrap().unwrap()).unwrap();
        let bob: Account =
            from_row(store.get(tables::ACCOUNTS, "bob").await.unwrap().unwrap()).unwrap();
        assert_eq!(alice.balance, 700);
        assert_eq!(alice.nonce, 1);
        assert_eq!(bob.balance, 300);
        assert_eq!(bob.nonce, 0);
    }

    #[tokio::test]
    async fn out_of_order_nonce_fails() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = TokenTransferProcessor
            .apply(&header(), &transfer("alice", "bob", 10, 5), tx.as_mut())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::NonceMismatch { expected: 0, got: 5, .. }
        ));
    }

    #[tokio::test]
    async fn self_transfer_only_bumps_nonce() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let mut funded = Account::new("alice");
        funded.balance = 1000;
        setup.upsert(tables::ACCOUNTS, "alice", to_row(&funded).unwrap());
        setup.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        TokenTransferProcessor
            .apply(&header(), &transfer("alice", "alice", 400, 0), tx.as_mut())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let alice: Account =
            from_row(store.get(tables::ACCOUNTS, "alice").await.unwrap().unwrap()).unwrap();
        assert_eq!(alice.balance, 1000);
        assert_eq!(alice.nonce, 1);
    }

    #[tokio::test]
    async fn malformed_params_are_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let bad = Transaction {
            params: json!({ "recipient": "bob" }), // amount missing
            ..transfer("alice", "bob", 0, 0)
        };
        let err = TokenTransferProcessor
            .apply(&header(), &bad, tx.as_mut())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidParams { .. }));
    }
}
