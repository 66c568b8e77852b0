use std::sync::Arc;
use std::time::Duration;

use slog::Logger;
use tokio::sync::mpsc;

use cln_connector::NodeClient;
use core_types::{msat_to_sat, ChatAdapter};
use ephemeral::{keys, KvStore};
use msgs::api::*;
use msgs::{Api, Message};
use xerror::wallet::WalletError;

use crate::invoices::{create_invoice, NewInvoice};
use crate::payments::PaymentReceipt;
use crate::settings::WalletSettings;
use crate::store::WalletStore;
use crate::tickets::TicketSupervisor;

pub struct WalletEngine {
    pub store: Arc<dyn WalletStore>,
    pub node: Arc<dyn NodeClient>,
    pub chat: Arc<dyn ChatAdapter>,
    pub kv: Arc<dyn KvStore>,
    pub tickets: TicketSupervisor,
    /// Our node's public key; payments to it never touch the wire.
    pub node_id: String,
    pub settings: Arc<WalletSettings>,
    /// Feeds asynchronous completions back into the engine loop.
    pub loopback: mpsc::Sender<Message>,
    pub logger: Logger,
}

impl WalletEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WalletStore>,
        node: Arc<dyn NodeClient>,
        chat: Arc<dyn ChatAdapter>,
        kv: Arc<dyn KvStore>,
        tickets: TicketSupervisor,
        node_id: String,
        settings: Arc<WalletSettings>,
        loopback: mpsc::Sender<Message>,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            node,
            chat,
            kv,
            tickets,
            node_id,
            settings,
            loopback,
            logger,
        }
    }

    pub async fn process_msg<F: FnMut(Message)>(&self, msg: Message, listener: &mut F) {
        match msg {
            Message::Api(Api::InvoiceRequest(req)) => {
                let response = match self.issue_invoice(&req).await {
                    Ok((bolt11, hash)) => InvoiceResponse {
                        req_id: req.req_id,
                        uid: req.uid,
                        bolt11: Some(bolt11),
                        payment_hash: Some(hash),
                        error: None,
                    },
                    Err(err) => InvoiceResponse {
                        req_id: req.req_id,
                        uid: req.uid,
                        bolt11: None,
                        payment_hash: None,
                        error: Some(err),
                    },
                };
                listener(Message::Api(Api::InvoiceResponse(response)));
            }
            Message::Api(Api::PaymentRequest(req)) => {
                let response = match self
                    .pay_invoice(req.uid, &req.bolt11, req.msat_override, 0)
                    .await
                {
                    Ok(receipt) => {
                        let (hash, preimage) = match receipt {
                            PaymentReceipt::Internal {
                                payment_hash,
                                preimage,
                                ..
                            } => (payment_hash, preimage),
                            PaymentReceipt::ExternalPending { payment_hash, .. } => {
                                (payment_hash, None)
                            }
                        };
                        PaymentResponse {
                            req_id: req.req_id,
                            uid: req.uid,
                            payment_hash: Some(hash),
                            preimage,
                            error: None,
                        }
                    }
                    Err(err) => PaymentResponse {
                        req_id: req.req_id,
                        uid: req.uid,
                        payment_hash: None,
                        preimage: None,
                        error: Some(err),
                    },
                };
                listener(Message::Api(Api::PaymentResponse(response)));
            }
            Message::Api(Api::GroupConfigRequest(req)) => {
                let result = match req.action {
                    GroupConfigAction::SetTicketPrice { price_sat } => self
                        .store
                        .set_ticket_price(req.chat_id, price_sat, req.uid)
                        .map(|_| (Some(price_sat), None)),
                    GroupConfigAction::ToggleVerbose => self
                        .store
                        .toggle_verbose(req.chat_id)
                        .map(|verbose| (None, Some(verbose))),
                };
                let response = match result {
                    Ok((ticket_price, verbose)) => GroupConfigResponse {
                        req_id: req.req_id,
                        chat_id: req.chat_id,
                        ticket_price,
                        verbose,
                        error: None,
                    },
                    Err(err) => GroupConfigResponse {
                        req_id: req.req_id,
                        chat_id: req.chat_id,
                        ticket_price: None,
                        verbose: None,
                        error: Some(err),
                    },
                };
                listener(Message::Api(Api::GroupConfigResponse(response)));
            }
            Message::Api(Api::TransactionRequest(req)) => {
                let response = match self.store.find_by_hash_prefix(req.uid, &req.hash_prefix) {
                    Ok(found) => TransactionResponse {
                        req_id: req.req_id,
                        uid: req.uid,
                        transaction: found.map(|tx| transaction_view(req.uid, &tx)),
                        error: None,
                    },
                    Err(err) => TransactionResponse {
                        req_id: req.req_id,
                        uid: req.uid,
                        transaction: None,
                        error: Some(err),
                    },
                };
                listener(Message::Api(Api::TransactionResponse(response)));
            }
            Message::Api(Api::DecodeRequest(req)) => {
                let response = match self.node.decodepay(&req.bolt11).await {
                    Ok(decoded) => DecodeResponse {
                        req_id: req.req_id,
                        decoded: Some(decoded),
                        error: None,
                    },
                    Err(err) => DecodeResponse {
                        req_id: req.req_id,
                        decoded: None,
                        error: Some(err.into_decode_failure()),
                    },
                };
                listener(Message::Api(Api::DecodeResponse(response)));
            }
            // response variants flow the other way
            Message::Api(_) => {}
            Message::PaidStream(event) => {
                if let Err(err) = self.handle_paid_invoice(event).await {
                    slog::error!(self.logger, "failed to process settlement event: {}", err);
                }
            }
            Message::PaymentResolved(resolution) => self.resolve_payment(resolution).await,
            Message::Join(join) => {
                if let Err(err) = self.tickets.handle_join(join).await {
                    slog::error!(self.logger, "failed to supervise join: {}", err);
                }
            }
        }
    }

    async fn issue_invoice(&self, req: &InvoiceRequest) -> Result<(String, String), WalletError> {
        let issued = create_invoice(
            self.node.as_ref(),
            &self.settings,
            &self.logger,
            NewInvoice {
                account: req.uid,
                msat: req.msat,
                description: &req.memo,
                label: None,
                expiry_secs: None,
                preimage: None,
                trigger_message: 0,
            },
        )
        .await?;
        Ok((issued.bolt11, issued.payment_hash))
    }

    /// One chat notification per event, delivered to the account's private
    /// chat; accounts that never opened one simply cannot be pushed to.
    pub(crate) async fn notify(&self, account: i64, html: &str, reply_to: Option<i64>) {
        let target = match self.store.account_by_id(account) {
            Ok(Some(acc)) => acc,
            _ => {
                slog::warn!(self.logger, "cannot notify unknown account"; "account" => account);
                return;
            }
        };
        let chat_id = match target.notify_chat_id {
            Some(chat_id) => chat_id,
            None => {
                slog::info!(
                    self.logger,
                    "can't notify user as it hasn't started a chat with the bot";
                    "account" => account
                );
                return;
            }
        };
        slog::debug!(self.logger, "notifying user"; "account" => account, "msg" => html);
        if let Err(err) = self.chat.send_message(chat_id, html, reply_to).await {
            slog::warn!(self.logger, "failed to notify user: {}", err; "account" => account);
        }
    }

    pub(crate) async fn notify_payment_received(
        &self,
        account: i64,
        msat: i64,
        payment_hash: &str,
        reply_to: Option<i64>,
    ) {
        self.notify(
            account,
            &format!(
                "Payment received: {} sat. /tx{}",
                msat_to_sat(msat),
                short_hash(payment_hash)
            ),
            reply_to,
        )
        .await;
    }

}

/// Account operations the chat command layer drives directly.
impl WalletEngine {
    /// Every private-chat contact refreshes the notification channel; not
    /// everyone remembers to call /start.
    pub fn register_private_chat(
        &self,
        chat_id: i64,
        username: Option<&str>,
    ) -> Result<models::accounts::Account, WalletError> {
        let account = self.store.ensure_account(Some(chat_id), username)?;
        self.store.set_notify_chat(account.id, chat_id)?;
        Ok(account)
    }

    pub fn stop_notifications(&self, account: i64) -> Result<(), WalletError> {
        self.store.unset_notify_chat(account)
    }

    /// Connection string for the compatibility façade. `refresh` rotates
    /// the account salt, so every previously handed-out credential stops
    /// verifying.
    pub fn facade_credentials(&self, account: i64, refresh: bool) -> Result<String, WalletError> {
        let acc = self
            .store
            .account_by_id(account)?
            .ok_or(WalletError::InternalConsistency)?;
        let credential = if refresh {
            self.store
                .rotate_credential(account, &self.settings.service_secret)?
        } else {
            acc.credential(&self.settings.service_secret)
        };
        Ok(format!(
            "lndhub://{}:{}@{}",
            account, credential, self.settings.service_url
        ))
    }

    pub fn set_app_data(
        &self,
        account: i64,
        app: &str,
        value: serde_json::Value,
    ) -> Result<(), WalletError> {
        self.store.set_app_data(account, app, value)
    }

    pub fn get_app_data(
        &self,
        account: i64,
        app: &str,
    ) -> Result<Option<serde_json::Value>, WalletError> {
        self.store.get_app_data(account, app)
    }

    /// Verbose groups get replies in-channel instead of privately.
    pub fn group_verbose(&self, chat_id: i64) -> Result<bool, WalletError> {
        self.store.is_verbose(chat_id)
    }
}

/// Chat-command support: short-lived state the command layer parks in the
/// ephemeral store between a prompt and its confirmation.
impl WalletEngine {
    /// Parks a decoded invoice behind a confirmation prompt.
    pub async fn stash_pay_confirm(&self, payment_hash: &str, bolt11: &str, msat_override: Option<i64>) {
        let ttl = Duration::from_secs(self.settings.pay_confirm_timeout_secs as u64);
        let prefix = short_hash(payment_hash);
        let _ = self.kv.set(&keys::pay_confirm(prefix), bolt11, Some(ttl)).await;
        if let Some(msat) = msat_override {
            let _ = self
                .kv
                .set(&keys::pay_confirm_msats(prefix), &msat.to_string(), Some(ttl))
                .await;
        }
    }

    /// Consumes a parked invoice when the user confirms. `None` once the
    /// slot expired or was already taken.
    pub async fn take_pay_confirm(&self, hash_prefix: &str) -> Option<(String, Option<i64>)> {
        let bolt11 = self.kv.get(&keys::pay_confirm(hash_prefix)).await.ok()??;
        let msat = self
            .kv
            .get(&keys::pay_confirm_msats(hash_prefix))
            .await
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<i64>().ok());
        let _ = self.kv.del(&keys::pay_confirm(hash_prefix)).await;
        let _ = self.kv.del(&keys::pay_confirm_msats(hash_prefix)).await;
        Some((bolt11, msat))
    }

    pub async fn stash_hidden_message(&self, account: i64, id: &str, sats: i64, content: &str) {
        let ttl = Duration::from_secs(self.settings.hidden_message_timeout_secs as u64);
        let _ = self
            .kv
            .set(&keys::hidden_message(account, id, sats), content, Some(ttl))
            .await;
    }

    /// Adds an entrant to a coinflip round and returns the members so far.
    pub async fn join_coinflip(&self, id: &str, account: i64) -> Vec<i64> {
        self.join_set(&keys::coinflip(id), account).await
    }

    pub async fn join_fundraise(&self, id: &str, account: i64) -> Vec<i64> {
        self.join_set(&keys::fundraise(id), account).await
    }

    async fn join_set(&self, key: &str, account: i64) -> Vec<i64> {
        let ttl = Duration::from_secs(self.settings.give_away_timeout_secs as u64);
        let _ = self.kv.sadd(key, &account.to_string(), Some(ttl)).await;
        self.kv
            .smembers(key)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|member| member.parse().ok())
            .collect()
    }

    /// Settles a finished coinflip or fundraise: every entrant pays the
    /// receiver, all or nothing, then everyone hears about it.
    pub async fn collect_from_many(
        &self,
        payee: i64,
        payers: &[i64],
        sats: i64,
        description: Option<&str>,
    ) -> Result<(), WalletError> {
        self.store
            .fan_in(payee, payers, core_types::sat_to_msat(sats), description)?;

        let receiver = self
            .store
            .account_by_id(payee)?
            .ok_or(WalletError::InternalConsistency)?;

        let mut giver_names = Vec::new();
        for &payer in payers.iter().filter(|p| **p != payee) {
            if let Ok(Some(giver)) = self.store.account_by_id(payer) {
                giver_names.push(giver.at_name());
            }
            self.notify(
                payer,
                &format!("{} sat sent to {}.", sats, receiver.at_name()),
                None,
            )
            .await;
        }
        self.notify(
            payee,
            &format!(
                "{} sat received from {}.",
                sats * giver_names.len() as i64,
                giver_names.join(" ")
            ),
            None,
        )
        .await;
        Ok(())
    }
}

/// First five hex chars; enough to address a payment in chat commands.
pub fn short_hash(hash: &str) -> &str {
    if hash.len() >= 5 {
        &hash[..5]
    } else {
        hash
    }
}

fn transaction_view(uid: i64, tx: &models::transactions::Transaction) -> TransactionView {
    TransactionView {
        created_at: tx.created_at,
        amount_msat: tx.amount_msat,
        fees_msat: tx.fees_msat,
        payment_hash: tx.payment_hash.clone(),
        preimage: tx.preimage.clone(),
        description: tx.description.clone(),
        pending: tx.pending,
        incoming: tx.payee_id == Some(uid),
        trigger_message: tx.trigger_message,
        remote_node: tx.remote_node.clone(),
    }
}
