use std::time::Duration;

use serde_json::Value;

use cln_connector::{NodeClient, PayOutcome, PayStatus};
use core_types::{msat_to_sat, outbound_label, InvoiceLabel};
use ephemeral::{keys, KvStore};
use msgs::{Message, PaymentResolution};
use xerror::wallet::WalletError;

use crate::engine::{short_hash, WalletEngine};
use crate::store::WalletStore;

const TRIES_KEPT: usize = 10;
const TRIES_TTL: Duration = Duration::from_secs(24 * 3600);

/// What the caller learns synchronously. Internal payments settle before
/// this returns; external ones return as soon as the pending debit is
/// committed, with the outcome delivered asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentReceipt {
    Internal {
        payment_hash: String,
        preimage: Option<String>,
        msat: i64,
    },
    ExternalPending {
        payment_hash: String,
        msat: i64,
    },
}

impl WalletEngine {
    /// The outbound state machine. Decode, classify against our node id,
    /// then either settle internally (never touching the wire) or insert
    /// the balance-gated pending debit and hand the wire work to a task.
    pub async fn pay_invoice(
        &self,
        uid: i64,
        bolt11: &str,
        msat_override: Option<i64>,
        trigger_message: i64,
    ) -> Result<PaymentReceipt, WalletError> {
        let decoded = self
            .node
            .decodepay(bolt11)
            .await
            .map_err(|e| e.into_decode_failure())?;

        let invoice_msat = decoded.msat.filter(|m| *m > 0);
        let msat = match invoice_msat.or(msat_override.filter(|m| *m > 0)) {
            Some(msat) => msat,
            None => return Err(WalletError::AmountMissing),
        };

        if decoded.payee == self.node_id {
            self.pay_internal(uid, msat, &decoded.payment_hash, &decoded.description, trigger_message)
                .await
        } else {
            self.pay_external(
                uid,
                bolt11,
                msat,
                invoice_msat.is_none(),
                &decoded.payment_hash,
                &decoded.description,
                &decoded.payee,
                trigger_message,
            )
            .await
        }
    }

    async fn pay_internal(
        &self,
        uid: i64,
        msat: i64,
        payment_hash: &str,
        description: &str,
        trigger_message: i64,
    ) -> Result<PaymentReceipt, WalletError> {
        // a pending admission takes precedence: its payee is the chat owner
        let ticket = self.tickets.find_by_hash(payment_hash);

        let (payee, label, preimage, payee_trigger) = match &ticket {
            Some((label, kick)) => (kick.owner_id, label.clone(), None, 0),
            None => {
                let invoice = self
                    .node
                    .find_invoice(payment_hash)
                    .await
                    .map_err(WalletError::from)?
                    .ok_or_else(|| {
                        WalletError::InvoiceDecodeFailed(
                            "couldn't find internal invoice".to_string(),
                        )
                    })?;

                match InvoiceLabel::parse(&invoice.label) {
                    Some(InvoiceLabel::Wallet {
                        account,
                        trigger_message,
                        ..
                    }) => (account, invoice.label.clone(), invoice.preimage, trigger_message),
                    Some(InvoiceLabel::Ticket { chat, .. }) => {
                        // admission record already gone; the group owner is
                        // still the payee of record
                        let owner = self
                            .store
                            .group_owner(chat)?
                            .ok_or(WalletError::InternalConsistency)?;
                        (owner, invoice.label.clone(), invoice.preimage, 0)
                    }
                    None => {
                        slog::debug!(
                            self.logger,
                            "internal payment unrecognized";
                            "label" => &invoice.label
                        );
                        return Err(WalletError::InvoiceDecodeFailed(
                            "unrecognized internal invoice".to_string(),
                        ));
                    }
                }
            }
        };

        self.store.transfer_internal(
            uid,
            payee,
            msat,
            description,
            payment_hash,
            preimage.as_deref(),
            &label,
            trigger_message,
        )?;

        // stop the paid stream from also firing for this invoice; a lost
        // race is absorbed by the hash-keyed credit upsert
        let _ = self.node.delete_invoice(&label).await;

        if ticket.is_some() {
            self.tickets.ticket_paid(&label).await;
        }

        self.notify(
            uid,
            &format!(
                "Paid with {} sat. Hash: {}",
                msat_to_sat(msat),
                payment_hash
            ),
            Some(trigger_message).filter(|t| *t != 0),
        )
        .await;
        self.notify_payment_received(
            payee,
            msat,
            payment_hash,
            Some(payee_trigger).filter(|t| *t != 0),
        )
        .await;

        Ok(PaymentReceipt::Internal {
            payment_hash: payment_hash.to_string(),
            preimage,
            msat,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn pay_external(
        &self,
        uid: i64,
        bolt11: &str,
        msat: i64,
        needs_override: bool,
        payment_hash: &str,
        description: &str,
        payee_node: &str,
        trigger_message: i64,
    ) -> Result<PaymentReceipt, WalletError> {
        let label = outbound_label(&self.settings.service_id, payment_hash);

        // once this commits the debit is visible and the payer cannot
        // double-spend; a second attempt on the same hash collides here
        self.store.debit_pending_external(
            uid,
            msat,
            description,
            payment_hash,
            &label,
            trigger_message,
            payee_node,
        )?;

        let node = self.node.clone();
        let kv = self.kv.clone();
        let loopback = self.loopback.clone();
        let logger = self.logger.clone();
        let bolt11 = bolt11.to_string();
        let hash = payment_hash.to_string();
        let msat_override = if needs_override { Some(msat) } else { None };

        tokio::spawn(async move {
            let result = node.pay_wait(&bolt11, msat_override, &label).await;
            match result {
                Ok(pay) => {
                    save_tries(kv.as_ref(), &hash, &pay.attempts).await;
                    let resolution = match pay.outcome {
                        PayOutcome::Paid {
                            msat: paid_msat,
                            msat_sent,
                            preimage,
                        } => PaymentResolution::Succeeded {
                            uid,
                            trigger_message,
                            payment_hash: hash,
                            preimage,
                            msat: if paid_msat > 0 { paid_msat } else { msat },
                            msat_sent,
                        },
                        PayOutcome::Failed => PaymentResolution::Failed {
                            uid,
                            trigger_message,
                            payment_hash: hash,
                        },
                    };
                    let _ = loopback.send(Message::PaymentResolved(resolution)).await;
                }
                Err(err) => {
                    // outcome unknown; the row stays pending and the boot
                    // reconciler repairs it
                    slog::warn!(logger, "unexpected error paying invoice: {}", err; "hash" => hash);
                }
            }
        });

        Ok(PaymentReceipt::ExternalPending {
            payment_hash: payment_hash.to_string(),
            msat,
        })
    }

    /// Plain peer transfer by chat identity; no invoice involved. The
    /// receiver is created on first reference.
    pub async fn send_to_peer(
        &self,
        payer: i64,
        target_chat_id: Option<i64>,
        target_username: Option<&str>,
        sats: i64,
        anonymous: bool,
        trigger_message: i64,
    ) -> Result<models::accounts::Account, WalletError> {
        if sats <= 0 {
            return Err(WalletError::AmountMissing);
        }
        let target = self.store.ensure_account(target_chat_id, target_username)?;
        if target.id == payer {
            return Err(WalletError::SelfPayment);
        }

        self.store.send_internal(
            payer,
            target.id,
            core_types::sat_to_msat(sats),
            None,
            anonymous,
            trigger_message,
        )?;

        let sender_name = self
            .store
            .account_by_id(payer)?
            .map(|acc| acc.at_name())
            .unwrap_or_else(|| format!("user:{}", payer));
        let body = if anonymous {
            format!("Someone has sent you {} sat.", sats)
        } else {
            format!("{} has sent you {} sat.", sender_name, sats)
        };
        self.notify(target.id, &body, None).await;
        self.notify(
            payer,
            &format!("{} sat sent to {}.", sats, target.at_name()),
            Some(trigger_message).filter(|t| *t != 0),
        )
        .await;

        Ok(target)
    }

    /// The only place `pending` clears for external payments.
    pub async fn resolve_payment(&self, resolution: PaymentResolution) {
        match resolution {
            PaymentResolution::Succeeded {
                uid,
                trigger_message,
                payment_hash,
                preimage,
                msat,
                msat_sent,
            } => {
                let fees = msat_sent - msat;
                if let Err(err) = self.store.mark_paid(&payment_hash, &preimage, fees) {
                    slog::error!(
                        self.logger, "failed to settle transaction: {}", err;
                        "hash" => &payment_hash, "fees" => fees
                    );
                    self.notify(uid, &WalletError::Database.to_string(), None).await;
                    return;
                }
                self.notify(
                    uid,
                    &format!(
                        "Paid with {} sat (fee: {} msat). Hash: {}. Preimage: {}",
                        msat_to_sat(msat),
                        fees,
                        payment_hash,
                        preimage
                    ),
                    Some(trigger_message).filter(|t| *t != 0),
                )
                .await;
            }
            PaymentResolution::Failed {
                uid,
                trigger_message,
                payment_hash,
            } => {
                if let Err(err) = self.store.cancel(&payment_hash) {
                    slog::error!(
                        self.logger,
                        "failed to cancel transaction after routing failure: {}", err;
                        "hash" => &payment_hash
                    );
                }
                self.notify(
                    uid,
                    &WalletError::RoutingFailure(short_hash(&payment_hash).to_string()).to_string(),
                    Some(trigger_message).filter(|t| *t != 0),
                )
                .await;
            }
        }
    }

    /// Boot repair for outbound rows whose resolution a crash swallowed:
    /// ask the node, settle what completed, cancel what it never saw once
    /// the invoice window has passed.
    pub async fn reconcile_pending(&self) {
        let orphans = match self.store.pending_external() {
            Ok(rows) => rows,
            Err(err) => {
                slog::error!(self.logger, "failed to scan pending payments: {}", err);
                return;
            }
        };

        for row in orphans {
            let hash = match &row.payment_hash {
                Some(hash) => hash.clone(),
                None => continue,
            };
            match self.node.pay_status(&hash).await {
                Ok(PayStatus::Complete {
                    preimage,
                    msat,
                    msat_sent,
                }) => {
                    let base = if msat > 0 { msat } else { row.amount_msat };
                    let fees = (msat_sent - base).max(0);
                    if let Err(err) = self.store.mark_paid(&hash, &preimage, fees) {
                        slog::error!(self.logger, "reconciler failed to settle: {}", err; "hash" => &hash);
                    } else {
                        slog::info!(self.logger, "reconciled pending payment as paid"; "hash" => &hash);
                    }
                }
                Ok(PayStatus::Failed) => {
                    if let Err(err) = self.store.cancel(&hash) {
                        slog::error!(self.logger, "reconciler failed to cancel: {}", err; "hash" => &hash);
                    } else {
                        slog::info!(self.logger, "reconciled pending payment as failed"; "hash" => &hash);
                    }
                }
                Ok(PayStatus::Unknown) => {
                    let age_ms = utils::time::time_now() as i64 - row.created_at;
                    if age_ms / 1000 > self.settings.invoice_timeout_secs {
                        if let Err(err) = self.store.cancel(&hash) {
                            slog::error!(self.logger, "reconciler failed to cancel: {}", err; "hash" => &hash);
                        } else {
                            slog::info!(self.logger, "cancelled stale unknown payment"; "hash" => &hash);
                        }
                    }
                }
                Ok(PayStatus::Pending) => {}
                Err(err) => {
                    slog::warn!(self.logger, "reconciler could not query the node: {}", err; "hash" => &hash);
                }
            }
        }
    }
}

/// Latest attempts of an outbound payment, for `/log<prefix>`.
async fn save_tries(kv: &dyn ephemeral::KvStore, hash: &str, attempts: &[Value]) {
    let from = attempts.len().saturating_sub(TRIES_KEPT);
    if let Ok(json) = serde_json::to_string(&attempts[from..]) {
        let _ = kv
            .set(&keys::tries(short_hash(hash)), &json, Some(TRIES_TTL))
            .await;
    }
}
