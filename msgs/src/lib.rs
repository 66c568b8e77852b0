use serde::{Deserialize, Serialize};

pub mod api;

use core_types::{ChatUser, MessageRef};

pub use api::Api;

/// One settled invoice pulled off the node's paid stream, in emit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaidInvoice {
    pub label: String,
    pub payment_hash: String,
    pub preimage: String,
    pub msat: i64,
    pub description: String,
    pub pay_index: i64,
}

/// Terminal outcome of an asynchronous outbound payment, looped back into
/// the engine by the task that waited on the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentResolution {
    Succeeded {
        uid: i64,
        trigger_message: i64,
        payment_hash: String,
        preimage: String,
        msat: i64,
        msat_sent: i64,
    },
    Failed {
        uid: i64,
        trigger_message: i64,
        payment_hash: String,
    },
}

/// A member entering a group chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinEvent {
    pub chat_id: i64,
    pub chat_title: String,
    pub join_message: MessageRef,
    pub member: ChatUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Api(Api),
    PaidStream(PaidInvoice),
    PaymentResolved(PaymentResolution),
    Join(JoinEvent),
}
