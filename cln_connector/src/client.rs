use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_types::{DecodedInvoice, NodeInfo};
use xerror::node::NodeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub bolt11: String,
    pub payment_hash: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayOutcome {
    Paid {
        msat: i64,
        msat_sent: i64,
        preimage: String,
    },
    /// The node exhausted every route; terminal.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayResult {
    pub outcome: PayOutcome,
    /// Raw per-attempt diagnostics, newest last.
    pub attempts: Vec<serde_json::Value>,
}

/// Status of an outbound payment as the node remembers it; consulted by
/// the boot reconciler for rows whose resolution was lost to a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayStatus {
    Complete {
        preimage: String,
        msat: i64,
        msat_sent: i64,
    },
    Pending,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInvoice {
    pub label: String,
    pub payment_hash: String,
    pub status: String,
    pub msat: Option<i64>,
    pub description: String,
    pub preimage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvoiceWait {
    Paid { msat_received: i64 },
    Expired,
    /// The invoice was deleted out from under the waiter, which the wallet
    /// does exactly when an invoice settles through the internal shortcut.
    Deleted,
}

/// The Lightning node as the wallet sees it.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_info(&self) -> Result<NodeInfo, NodeError>;

    /// `msat == None` creates an any-amount invoice.
    async fn invoice(
        &self,
        msat: Option<i64>,
        label: &str,
        description: &str,
        expiry_secs: i64,
        preimage: &str,
    ) -> Result<CreatedInvoice, NodeError>;

    async fn decodepay(&self, bolt11: &str) -> Result<DecodedInvoice, NodeError>;

    /// Pays and blocks until the node reports a terminal outcome. No
    /// wallet-side timeout; routing can take tens of seconds.
    async fn pay_wait(
        &self,
        bolt11: &str,
        msat_override: Option<i64>,
        label: &str,
    ) -> Result<PayResult, NodeError>;

    async fn pay_status(&self, payment_hash: &str) -> Result<PayStatus, NodeError>;

    async fn find_invoice(&self, payment_hash: &str) -> Result<Option<NodeInvoice>, NodeError>;

    async fn wait_invoice(&self, label: &str, timeout: Duration) -> Result<InvoiceWait, NodeError>;

    /// Removes an invoice in whatever state it is in; succeeds when the
    /// invoice is already gone.
    async fn delete_invoice(&self, label: &str) -> Result<(), NodeError>;
}
