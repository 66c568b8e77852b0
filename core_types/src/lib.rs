use diesel::{r2d2::ConnectionManager, PgConnection};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod chat;
pub mod label;

pub use chat::*;
pub use label::*;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub type AccountId = i64;
pub type ChatId = i64;
pub type RequestId = Uuid;

pub const MSATS_IN_SAT: i64 = 1000;

pub fn msat_to_sat(msat: i64) -> i64 {
    msat / MSATS_IN_SAT
}

pub fn sat_to_msat(sat: i64) -> i64 {
    sat * MSATS_IN_SAT
}

/// A bolt11 payment request as decoded by the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodedInvoice {
    pub payee: String,
    pub msat: Option<i64>,
    pub payment_hash: String,
    pub description: String,
    pub created_at: i64,
    pub expiry: i64,
    pub min_final_cltv_expiry: i64,
    pub description_hash: Option<String>,
    pub fallback_addr: Option<String>,
    pub route_hints: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub alias: String,
}
