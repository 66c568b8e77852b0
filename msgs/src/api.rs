use serde::{Deserialize, Serialize};

use core_types::{AccountId, DecodedInvoice, RequestId};
use xerror::wallet::WalletError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub req_id: RequestId,
    pub uid: AccountId,
    /// `None` asks for an any-amount invoice.
    pub msat: Option<i64>,
    pub memo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub req_id: RequestId,
    pub uid: AccountId,
    pub bolt11: Option<String>,
    pub payment_hash: Option<String>,
    pub error: Option<WalletError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub req_id: RequestId,
    pub uid: AccountId,
    pub bolt11: String,
    /// Only consulted when the invoice itself carries no amount.
    pub msat_override: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub req_id: RequestId,
    pub uid: AccountId,
    pub payment_hash: Option<String>,
    /// Set on the internal shortcut, where settlement is immediate.
    pub preimage: Option<String>,
    pub error: Option<WalletError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupConfigAction {
    /// Also records the issuing admin as the chat owner; ticket invoices
    /// are issued on the owner's account. Zero makes the group free.
    SetTicketPrice { price_sat: i64 },
    ToggleVerbose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfigRequest {
    pub req_id: RequestId,
    /// Admin account issuing the change.
    pub uid: AccountId,
    pub chat_id: i64,
    pub action: GroupConfigAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfigResponse {
    pub req_id: RequestId,
    pub chat_id: i64,
    pub ticket_price: Option<i64>,
    /// New value after a toggle.
    pub verbose: Option<bool>,
    pub error: Option<WalletError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub req_id: RequestId,
    pub uid: AccountId,
    pub hash_prefix: String,
}

/// One ledger entry as shown to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub created_at: i64,
    pub amount_msat: i64,
    pub fees_msat: i64,
    pub payment_hash: Option<String>,
    pub preimage: Option<String>,
    pub description: Option<String>,
    pub pending: bool,
    pub incoming: bool,
    pub trigger_message: i64,
    pub remote_node: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub req_id: RequestId,
    pub uid: AccountId,
    pub transaction: Option<TransactionView>,
    pub error: Option<WalletError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeRequest {
    pub req_id: RequestId,
    pub bolt11: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeResponse {
    pub req_id: RequestId,
    pub decoded: Option<DecodedInvoice>,
    pub error: Option<WalletError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Api {
    InvoiceRequest(InvoiceRequest),
    InvoiceResponse(InvoiceResponse),
    PaymentRequest(PaymentRequest),
    PaymentResponse(PaymentResponse),
    DecodeRequest(DecodeRequest),
    DecodeResponse(DecodeResponse),
    GroupConfigRequest(GroupConfigRequest),
    GroupConfigResponse(GroupConfigResponse),
    TransactionRequest(TransactionRequest),
    TransactionResponse(TransactionResponse),
}
