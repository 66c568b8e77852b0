use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slog::Logger;
use tokio::sync::mpsc;

use core_types::{DecodedInvoice, NodeInfo};
use msgs::{Message, PaidInvoice};
use xerror::node::NodeError;

use crate::client::*;
use crate::rpc::{msat_value, ClnRpc};

const RPC_TIMEOUT: Duration = Duration::from_secs(40);

/// `delinvoice` wants the current state; trying all of them in turn makes
/// deletion unconditional.
const DELETABLE_STATES: [&str; 3] = ["unpaid", "paid", "expired"];

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClnConnectorSettings {
    pub socket_path: String,
}

#[derive(Clone)]
pub struct ClnConnector {
    rpc: ClnRpc,
}

impl ClnConnector {
    pub fn new(settings: ClnConnectorSettings) -> Self {
        Self {
            rpc: ClnRpc::new(settings.socket_path),
        }
    }

    /// Long-lived pull of the paid-invoice stream, resuming after
    /// `start_index`. Each settled invoice is forwarded in emit order; the
    /// consumer checkpoints the index after committing the event's effects.
    pub async fn sub_paid_invoices(
        &self,
        start_index: i64,
        listener: mpsc::Sender<Message>,
        logger: Logger,
    ) {
        let mut last_index = start_index;
        loop {
            let result = self
                .rpc
                .call("waitanyinvoice", json!({ "lastpay_index": last_index }), None)
                .await;

            let invoice = match result {
                Ok(v) => v,
                Err(err) => {
                    slog::warn!(logger, "paid-stream pull failed: {}", err);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            let pay_index = invoice
                .get("pay_index")
                .and_then(Value::as_i64)
                .unwrap_or(last_index + 1);
            let event = PaidInvoice {
                label: str_field(&invoice, "label"),
                payment_hash: str_field(&invoice, "payment_hash"),
                preimage: str_field(&invoice, "payment_preimage"),
                msat: invoice
                    .get("amount_received_msat")
                    .or_else(|| invoice.get("msatoshi_received"))
                    .and_then(msat_value)
                    .unwrap_or(0),
                description: str_field(&invoice, "description"),
                pay_index,
            };
            last_index = pay_index;

            if listener.send(Message::PaidStream(event)).await.is_err() {
                return;
            }
        }
    }

    /// Largest pay_index the node knows; fallback for a missing checkpoint.
    pub async fn max_pay_index(&self) -> Result<i64, NodeError> {
        let result = self
            .rpc
            .call("listinvoices", json!({}), Some(RPC_TIMEOUT))
            .await?;
        Ok(result
            .get("invoices")
            .and_then(Value::as_array)
            .map(|invs| {
                invs.iter()
                    .filter_map(|i| i.get("pay_index").and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0))
    }
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn opt_str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(String::from)
}

#[async_trait]
impl NodeClient for ClnConnector {
    async fn get_info(&self) -> Result<NodeInfo, NodeError> {
        let result = self.rpc.call("getinfo", json!({}), Some(RPC_TIMEOUT)).await?;
        Ok(NodeInfo {
            id: str_field(&result, "id"),
            alias: str_field(&result, "alias"),
        })
    }

    async fn invoice(
        &self,
        msat: Option<i64>,
        label: &str,
        description: &str,
        expiry_secs: i64,
        preimage: &str,
    ) -> Result<CreatedInvoice, NodeError> {
        let msatoshi = match msat {
            Some(v) => json!(v),
            None => json!("any"),
        };
        let result = self
            .rpc
            .call(
                "invoice",
                json!({
                    "msatoshi": msatoshi,
                    "label": label,
                    "description": description,
                    "expiry": expiry_secs,
                    "preimage": preimage,
                }),
                Some(RPC_TIMEOUT),
            )
            .await?;

        let bolt11 = opt_str_field(&result, "bolt11")
            .ok_or_else(|| NodeError::BadResponse("invoice without bolt11".into()))?;
        Ok(CreatedInvoice {
            bolt11,
            payment_hash: str_field(&result, "payment_hash"),
            expires_at: result.get("expires_at").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    async fn decodepay(&self, bolt11: &str) -> Result<DecodedInvoice, NodeError> {
        let result = self
            .rpc
            .call("decodepay", json!({ "bolt11": bolt11 }), Some(RPC_TIMEOUT))
            .await?;
        Ok(DecodedInvoice {
            payee: str_field(&result, "payee"),
            msat: result
                .get("amount_msat")
                .or_else(|| result.get("msatoshi"))
                .and_then(msat_value),
            payment_hash: str_field(&result, "payment_hash"),
            description: str_field(&result, "description"),
            created_at: result.get("created_at").and_then(Value::as_i64).unwrap_or(0),
            expiry: result.get("expiry").and_then(Value::as_i64).unwrap_or(3600),
            min_final_cltv_expiry: result
                .get("min_final_cltv_expiry")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            description_hash: opt_str_field(&result, "description_hash"),
            fallback_addr: result
                .get("fallbacks")
                .and_then(|f| f.get(0))
                .and_then(|f| f.get("addr"))
                .and_then(Value::as_str)
                .map(String::from),
            route_hints: result.get("routes").cloned().unwrap_or(Value::Null),
        })
    }

    async fn pay_wait(
        &self,
        bolt11: &str,
        msat_override: Option<i64>,
        label: &str,
    ) -> Result<PayResult, NodeError> {
        let mut params = json!({
            "bolt11": bolt11,
            "riskfactor": 3,
            "maxfeepercent": 1,
            "exemptfee": 3,
            "label": label,
        });
        if let Some(msat) = msat_override {
            params["msatoshi"] = json!(msat);
        }

        let outcome = match self.rpc.call("pay", params, None).await {
            Ok(result) => PayOutcome::Paid {
                msat: result
                    .get("amount_msat")
                    .or_else(|| result.get("msatoshi"))
                    .and_then(msat_value)
                    .unwrap_or(0),
                msat_sent: result
                    .get("amount_sent_msat")
                    .or_else(|| result.get("msatoshi_sent"))
                    .and_then(msat_value)
                    .unwrap_or(0),
                preimage: str_field(&result, "payment_preimage"),
            },
            Err(NodeError::Rpc { .. }) => PayOutcome::Failed,
            Err(other) => return Err(other),
        };

        // Per-attempt diagnostics, best effort.
        let attempts = match self
            .rpc
            .call("paystatus", json!({ "bolt11": bolt11 }), Some(RPC_TIMEOUT))
            .await
        {
            Ok(status) => status
                .get("pay")
                .and_then(|p| p.get(0))
                .and_then(|p| p.get("attempts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        Ok(PayResult { outcome, attempts })
    }

    async fn pay_status(&self, payment_hash: &str) -> Result<PayStatus, NodeError> {
        let result = self
            .rpc
            .call("listpays", json!({ "payment_hash": payment_hash }), Some(RPC_TIMEOUT))
            .await?;
        let pay = match result.get("pays").and_then(|p| p.get(0)) {
            Some(p) => p,
            None => return Ok(PayStatus::Unknown),
        };
        match pay.get("status").and_then(Value::as_str) {
            Some("complete") => Ok(PayStatus::Complete {
                preimage: str_field(pay, "preimage"),
                msat: pay
                    .get("amount_msat")
                    .and_then(msat_value)
                    .unwrap_or(0),
                msat_sent: pay
                    .get("amount_sent_msat")
                    .and_then(msat_value)
                    .unwrap_or(0),
            }),
            Some("failed") => Ok(PayStatus::Failed),
            Some(_) => Ok(PayStatus::Pending),
            None => Ok(PayStatus::Unknown),
        }
    }

    async fn find_invoice(&self, payment_hash: &str) -> Result<Option<NodeInvoice>, NodeError> {
        let result = self
            .rpc
            .call("listinvoices", json!({}), Some(RPC_TIMEOUT))
            .await?;
        let invoices = match result.get("invoices").and_then(Value::as_array) {
            Some(invs) => invs.clone(),
            None => return Ok(None),
        };
        Ok(invoices
            .iter()
            .find(|i| i.get("payment_hash").and_then(Value::as_str) == Some(payment_hash))
            .map(|i| NodeInvoice {
                label: str_field(i, "label"),
                payment_hash: str_field(i, "payment_hash"),
                status: str_field(i, "status"),
                msat: i
                    .get("amount_msat")
                    .or_else(|| i.get("msatoshi"))
                    .and_then(msat_value),
                description: str_field(i, "description"),
                preimage: opt_str_field(i, "payment_preimage"),
            }))
    }

    async fn wait_invoice(&self, label: &str, timeout: Duration) -> Result<InvoiceWait, NodeError> {
        match self
            .rpc
            .call("waitinvoice", json!({ "label": label }), Some(timeout))
            .await
        {
            Ok(result) => {
                if result.get("status").and_then(Value::as_str) == Some("paid") {
                    Ok(InvoiceWait::Paid {
                        msat_received: result
                            .get("amount_received_msat")
                            .or_else(|| result.get("msatoshi_received"))
                            .and_then(msat_value)
                            .unwrap_or(0),
                    })
                } else {
                    Err(NodeError::BadResponse(format!(
                        "waitinvoice answered for an unpaid invoice: {}",
                        result
                    )))
                }
            }
            Err(NodeError::Rpc { code: -1, .. }) => Ok(InvoiceWait::Deleted),
            Err(NodeError::Rpc { code: -2, .. }) => Ok(InvoiceWait::Expired),
            Err(other) => Err(other),
        }
    }

    async fn delete_invoice(&self, label: &str) -> Result<(), NodeError> {
        for state in DELETABLE_STATES {
            let _ = self
                .rpc
                .call(
                    "delinvoice",
                    json!({ "label": label, "status": state }),
                    Some(RPC_TIMEOUT),
                )
                .await;
        }
        Ok(())
    }
}
