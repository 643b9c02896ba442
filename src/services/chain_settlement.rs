//! Chain rail settlement orchestrator
//!
//! Binds a wallet address, converts the payment amount to the chain's
//! smallest unit, and derives settlement state from a transaction receipt and
//! the current block height. Verification and the read-only status poll share
//! one decision table so they cannot drift apart.

use bigdecimal::BigDecimal;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::chains::evm::EvmNode;
use crate::domain::{ChainTransfer, ChainTxStatus, DomainError, Payment, SettlementOutcome};
use crate::error::AppResult;

static WALLET_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());
static TRANSACTION_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").unwrap());

/// 1 unit of the asset = 10^18 smallest units.
const SMALLEST_UNIT_FACTOR: u64 = 1_000_000_000_000_000_000;

pub fn is_valid_wallet_address(address: &str) -> bool {
    WALLET_ADDRESS.is_match(address)
}

/// 66 characters: `0x` followed by 64 hex digits.
pub fn is_valid_transaction_hash(hash: &str) -> bool {
    TRANSACTION_HASH.is_match(hash)
}

/// Convert a decimal amount to the chain's smallest integer unit, truncating
/// sub-unit precision. Arbitrary-precision decimal arithmetic throughout;
/// floating point would drift on large amounts.
pub fn to_smallest_unit(amount: &BigDecimal) -> String {
    let scaled = (amount * BigDecimal::from(SMALLEST_UNIT_FACTOR)).with_scale(0);
    let (int_value, _) = scaled.into_bigint_and_exponent();
    int_value.to_string()
}

/// What the node currently knows about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReceiptCheck {
    /// No receipt, or a receipt without a block: the transaction has not been
    /// observed in a block yet.
    NotObserved,
    /// Included but execution reverted. Permanent.
    ExecutionFailed,
    /// Included and successful, with this many blocks mined on top.
    Confirmations(u64),
}

pub struct ChainSettlementService {
    node: Arc<dyn EvmNode>,
    contract_address: String,
    /// Reorg-resistance bound: a transaction is final only once this many
    /// blocks exist above the one containing it.
    min_confirmations: u64,
}

impl ChainSettlementService {
    pub fn new(node: Arc<dyn EvmNode>, contract_address: impl Into<String>, min_confirmations: u64) -> Self {
        Self {
            node,
            contract_address: contract_address.into(),
            min_confirmations,
        }
    }

    pub fn min_confirmations(&self) -> u64 {
        self.min_confirmations
    }

    /// Bind a wallet to the payment and compute the transfer parameters the
    /// client wallet needs. No chain I/O happens here; the transaction hash
    /// stays empty until the client submits and confirms.
    pub fn initiate(&self, payment: &Payment, wallet_address: &str) -> AppResult<ChainTransfer> {
        if !is_valid_wallet_address(wallet_address) {
            return Err(DomainError::invalid_wallet_address(wallet_address).into());
        }

        let amount_wei = to_smallest_unit(payment.amount());
        info!(
            payment_id = %payment.id(),
            wallet = %wallet_address,
            amount_wei = %amount_wei,
            "chain transfer initiated"
        );

        Ok(ChainTransfer {
            wallet_address: wallet_address.to_string(),
            contract_address: self.contract_address.clone(),
            transaction_hash: None,
            amount_wei,
        })
    }

    /// Verify a submitted transaction against the confirmation threshold.
    ///
    /// "Not observed yet" and "under the threshold" are both Pending — a
    /// legitimate intermediate state, not an error. Node transport failures
    /// propagate as typed retryable errors and leave the payment untouched.
    pub async fn verify(
        &self,
        payment: &Payment,
        transaction_hash: &str,
    ) -> AppResult<SettlementOutcome> {
        if !is_valid_transaction_hash(transaction_hash) {
            return Err(DomainError::invalid_transaction_hash(transaction_hash).into());
        }

        let outcome = match self.check_receipt(transaction_hash).await? {
            ReceiptCheck::NotObserved => {
                debug!(
                    payment_id = %payment.id(),
                    tx_hash = %transaction_hash,
                    "transaction not yet observed"
                );
                SettlementOutcome::pending(transaction_hash)
            }
            ReceiptCheck::ExecutionFailed => {
                warn!(
                    payment_id = %payment.id(),
                    tx_hash = %transaction_hash,
                    "transaction execution failed on chain"
                );
                SettlementOutcome::failed("transaction execution failed", false)
            }
            ReceiptCheck::Confirmations(depth) if depth < self.min_confirmations => {
                debug!(
                    payment_id = %payment.id(),
                    tx_hash = %transaction_hash,
                    confirmations = depth,
                    required = self.min_confirmations,
                    "transaction below confirmation threshold"
                );
                SettlementOutcome::pending(transaction_hash)
            }
            ReceiptCheck::Confirmations(depth) => {
                info!(
                    payment_id = %payment.id(),
                    tx_hash = %transaction_hash,
                    confirmations = depth,
                    "transaction confirmed"
                );
                SettlementOutcome::succeeded(transaction_hash)
            }
        };

        Ok(outcome)
    }

    /// Read-only status derivation mirroring [`Self::verify`]'s decision
    /// table.
    pub async fn poll_status(&self, transaction_hash: &str) -> AppResult<ChainTxStatus> {
        if !is_valid_transaction_hash(transaction_hash) {
            return Err(DomainError::invalid_transaction_hash(transaction_hash).into());
        }

        let status = match self.check_receipt(transaction_hash).await? {
            ReceiptCheck::NotObserved => ChainTxStatus::Pending,
            ReceiptCheck::ExecutionFailed => ChainTxStatus::Failed,
            ReceiptCheck::Confirmations(depth) if depth < self.min_confirmations => {
                ChainTxStatus::Confirming
            }
            ReceiptCheck::Confirmations(_) => ChainTxStatus::Confirmed,
        };

        Ok(status)
    }

    async fn check_receipt(&self, transaction_hash: &str) -> AppResult<ReceiptCheck> {
        let Some(receipt) = self.node.transaction_receipt(transaction_hash).await? else {
            return Ok(ReceiptCheck::NotObserved);
        };

        if !receipt.succeeded {
            return Ok(ReceiptCheck::ExecutionFailed);
        }

        let current_block = self.node.block_number().await?;
        let confirmations = current_block.saturating_sub(receipt.block_number);
        Ok(ReceiptCheck::Confirmations(confirmations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::evm::errors::EvmResult;
    use crate::chains::evm::TxReceipt;
    use crate::domain::PaymentMethod;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU64, Ordering};

    const HASH: &str = "0x4e3a3754410177e6937ef1f84bba68ea139e8d1a2258c5f85db9f1cd715a1bdd";
    const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    fn payment(amount: &str) -> Payment {
        Payment::new(
            "order-1",
            "user-1",
            BigDecimal::from_str(amount).unwrap(),
            "ETH",
            PaymentMethod::Chain,
        )
        .unwrap()
        .with_id("pay_1")
    }

    struct StubNode {
        receipt: Option<TxReceipt>,
        height: AtomicU64,
    }

    impl StubNode {
        fn with_receipt(block: u64, succeeded: bool, height: u64) -> Self {
            Self {
                receipt: Some(TxReceipt {
                    transaction_hash: HASH.to_string(),
                    block_number: block,
                    succeeded,
                }),
                height: AtomicU64::new(height),
            }
        }

        fn empty() -> Self {
            Self {
                receipt: None,
                height: AtomicU64::new(100),
            }
        }
    }

    #[async_trait]
    impl EvmNode for StubNode {
        async fn transaction_receipt(&self, _tx_hash: &str) -> EvmResult<Option<TxReceipt>> {
            Ok(self.receipt.clone())
        }

        async fn block_number(&self) -> EvmResult<u64> {
            Ok(self.height.load(Ordering::SeqCst))
        }
    }

    fn service(node: StubNode) -> ChainSettlementService {
        ChainSettlementService::new(Arc::new(node), "0x000000000000000000000000000000000000dEaD", 6)
    }

    #[test]
    fn smallest_unit_conversion_is_exact() {
        assert_eq!(
            to_smallest_unit(&BigDecimal::from_str("1.5").unwrap()),
            "1500000000000000000"
        );
        assert_eq!(
            to_smallest_unit(&BigDecimal::from_str("0.000000000000000001").unwrap()),
            "1"
        );
        assert_eq!(
            to_smallest_unit(&BigDecimal::from_str("2").unwrap()),
            "2000000000000000000"
        );
        // Sub-smallest-unit precision truncates, it does not round.
        assert_eq!(
            to_smallest_unit(&BigDecimal::from_str("0.0000000000000000019").unwrap()),
            "1"
        );
        // Large amounts stay exact; floats would drift here.
        assert_eq!(
            to_smallest_unit(&BigDecimal::from_str("123456789.123456789123456789").unwrap()),
            "123456789123456789123456789"
        );
    }

    #[test]
    fn wallet_address_validation() {
        assert!(is_valid_wallet_address(WALLET));
        assert!(!is_valid_wallet_address("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_valid_wallet_address("0x123"));
        assert!(!is_valid_wallet_address(
            "0x52908400098527886E0F7030069857D2E4169EG7"
        ));
    }

    #[test]
    fn transaction_hash_validation() {
        assert!(is_valid_transaction_hash(HASH));
        assert!(!is_valid_transaction_hash(&HASH[..65]));
        assert!(!is_valid_transaction_hash(&HASH[2..]));
    }

    #[test]
    fn initiate_rejects_malformed_address() {
        let svc = service(StubNode::empty());
        let result = svc.initiate(&payment("1.5"), "not-an-address");
        assert!(result.is_err());
    }

    #[test]
    fn initiate_returns_transfer_without_hash() {
        let svc = service(StubNode::empty());
        let transfer = svc.initiate(&payment("1.5"), WALLET).unwrap();
        assert_eq!(transfer.amount_wei, "1500000000000000000");
        assert_eq!(transfer.wallet_address, WALLET);
        assert!(transfer.transaction_hash.is_none());
    }

    #[tokio::test]
    async fn verify_rejects_malformed_hash() {
        let svc = service(StubNode::empty());
        let result = svc.verify(&payment("1.5"), "0x123").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unobserved_transaction_is_pending() {
        let svc = service(StubNode::empty());
        let outcome = svc.verify(&payment("1.5"), HASH).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::pending(HASH));
        assert_eq!(svc.poll_status(HASH).await.unwrap(), ChainTxStatus::Pending);
    }

    #[tokio::test]
    async fn reverted_execution_is_a_permanent_failure() {
        let svc = service(StubNode::with_receipt(90, false, 100));
        let outcome = svc.verify(&payment("1.5"), HASH).await.unwrap();
        assert!(matches!(
            outcome,
            SettlementOutcome::Failed {
                retryable: false,
                ..
            }
        ));

        let svc = service(StubNode::with_receipt(90, false, 100));
        assert_eq!(svc.poll_status(HASH).await.unwrap(), ChainTxStatus::Failed);
    }

    #[tokio::test]
    async fn confirmation_boundary_at_threshold() {
        // 5 confirmations with a threshold of 6: still pending/confirming.
        let svc = service(StubNode::with_receipt(95, true, 100));
        let outcome = svc.verify(&payment("1.5"), HASH).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::pending(HASH));
        assert_eq!(
            svc.poll_status(HASH).await.unwrap(),
            ChainTxStatus::Confirming
        );

        // Exactly 6: confirmed.
        let svc = service(StubNode::with_receipt(94, true, 100));
        let outcome = svc.verify(&payment("1.5"), HASH).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::succeeded(HASH));
        assert_eq!(
            svc.poll_status(HASH).await.unwrap(),
            ChainTxStatus::Confirmed
        );
    }
}
