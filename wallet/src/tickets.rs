use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slog::Logger;

use cln_connector::{InvoiceWait, NodeClient};
use core_types::{sat_to_msat, ChatAdapter, ChatUser, InvoiceLabel, MessageRef};
use ephemeral::{keys, KvStore};
use msgs::JoinEvent;
use xerror::wallet::WalletError;

use crate::invoices::{create_invoice, NewInvoice};
use crate::settings::WalletSettings;
use crate::store::WalletStore;

/// The joiner gets this long to pay before eviction.
const TICKET_EXPIRY: Duration = Duration::from_secs(15 * 60);
/// The watcher outlives the invoice expiry with generous slack.
const WATCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const BAN_SECONDS: i64 = 24 * 3600;

/// Everything needed to settle one pending admission: the messages to
/// retract, the member to evict and the invoice hash to match payments by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickData {
    pub invoice_message: MessageRef,
    pub notice_message: MessageRef,
    pub join_message: MessageRef,
    pub member: ChatUser,
    pub chat_id: i64,
    pub payment_hash: String,
    pub owner_id: i64,
}

/// Per-join supervisor: posts the ticket invoice, watches it, and ends the
/// admission in exactly one of admit or evict. The in-memory map answers
/// the per-message "is this user muted?" check; the ephemeral store mirror
/// makes watchers crash-recoverable.
#[derive(Clone)]
pub struct TicketSupervisor {
    store: Arc<dyn WalletStore>,
    node: Arc<dyn NodeClient>,
    chat: Arc<dyn ChatAdapter>,
    kv: Arc<dyn KvStore>,
    pending: Arc<Mutex<HashMap<String, KickData>>>,
    settings: Arc<WalletSettings>,
    logger: Logger,
}

impl TicketSupervisor {
    pub fn new(
        store: Arc<dyn WalletStore>,
        node: Arc<dyn NodeClient>,
        chat: Arc<dyn ChatAdapter>,
        kv: Arc<dyn KvStore>,
        settings: Arc<WalletSettings>,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            node,
            chat,
            kv,
            pending: Arc::new(Mutex::new(HashMap::new())),
            settings,
            logger,
        }
    }

    /// Messages from a user with a pending admission are filtered out by
    /// the chat adapter.
    pub fn is_pending(&self, user: i64, chat: i64) -> bool {
        let label = InvoiceLabel::ticket(user, chat).to_string();
        self.pending.lock().unwrap().contains_key(&label)
    }

    /// The payment coordinator's lookup for internal ticket payments.
    pub fn find_by_hash(&self, payment_hash: &str) -> Option<(String, KickData)> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .find(|(_, kick)| kick.payment_hash == payment_hash)
            .map(|(label, kick)| (label.clone(), kick.clone()))
    }

    pub fn find_by_label(&self, label: &str) -> Option<KickData> {
        self.pending.lock().unwrap().get(label).cloned()
    }

    pub async fn handle_join(&self, join: JoinEvent) -> Result<(), WalletError> {
        let price_sat = self.store.ticket_price(join.chat_id)?;
        if price_sat == 0 {
            return Ok(());
        }

        let label = InvoiceLabel::ticket(join.member.id, join.chat_id).to_string();
        if self.pending.lock().unwrap().contains_key(&label) {
            // joined, left and joined again; the old timer still owns them
            return Ok(());
        }

        let owner = match self.store.group_owner(join.chat_id)? {
            Some(owner) => owner,
            None => {
                slog::warn!(
                    self.logger,
                    "chat has no owner, cannot create a ticket invoice. allowing user";
                    "chat" => join.chat_id
                );
                return Ok(());
            }
        };

        let name = join.member.display_name();
        let notice_message = match self
            .chat
            .send_message(
                join.chat_id,
                &format!(
                    "Hello, {}. You have 15min to pay the following invoice \
                     for {} sat if you want to stay in this group:",
                    name, price_sat
                ),
                None,
            )
            .await
        {
            Ok(msg) => msg,
            Err(err) => {
                slog::warn!(self.logger, "failed to post ticket notice: {}", err);
                return Ok(());
            }
        };

        // a previous admission may have left an invoice under this label
        let _ = self.node.delete_invoice(&label).await;

        let issued = create_invoice(
            self.node.as_ref(),
            &self.settings,
            &self.logger,
            NewInvoice {
                account: owner,
                msat: Some(sat_to_msat(price_sat)),
                description: &format!(
                    "ticket for {} to join {} ({}).",
                    name, join.chat_title, join.chat_id
                ),
                label: Some(label.clone()),
                expiry_secs: Some(TICKET_EXPIRY.as_secs() as i64),
                preimage: None,
                trigger_message: join.join_message.message_id,
            },
        )
        .await?;

        let invoice_message = match issued.qr_path.as_deref() {
            Some(path) => {
                self.chat
                    .send_photo(join.chat_id, &path.to_string_lossy(), &issued.bolt11)
                    .await
            }
            None => self.chat.send_message(join.chat_id, &issued.bolt11, None).await,
        }
        .map_err(|err| {
            slog::error!(self.logger, "failed to post ticket invoice: {}", err);
            WalletError::ExternalServiceError("chat".to_string(), err.to_string())
        })?;

        let kick = KickData {
            invoice_message,
            notice_message,
            join_message: join.join_message,
            member: join.member,
            chat_id: join.chat_id,
            payment_hash: issued.payment_hash,
            owner_id: owner,
        };

        if let Ok(json) = serde_json::to_string(&kick) {
            if let Err(err) = self.kv.hset(keys::TICKET_PENDING, &label, &json).await {
                slog::warn!(self.logger, "error saving admission record: {}", err);
            }
        }
        self.pending.lock().unwrap().insert(label.clone(), kick);

        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.watch(label).await });
        Ok(())
    }

    /// Waits for the invoice to resolve and ends the admission. The
    /// in-memory map is the liveness gate: whichever of the watcher and the
    /// internal shortcut removes the record first owns the outcome.
    async fn watch(&self, label: String) {
        slog::debug!(self.logger, "waiting to admit or evict"; "label" => &label);
        match self.node.wait_invoice(&label, WATCH_TIMEOUT).await {
            Ok(InvoiceWait::Paid { .. }) => self.ticket_paid(&label).await,
            Ok(InvoiceWait::Deleted) => {
                // deleted under the waiter means it settled internally
                slog::info!(self.logger, "ticket invoice deleted, assume paid internally"; "label" => &label);
                self.ticket_paid(&label).await;
            }
            Ok(InvoiceWait::Expired) => {
                let still_pending = self.pending.lock().unwrap().remove(&label);
                let kick = match still_pending {
                    Some(k) => k,
                    // settled internally while we were waiting
                    None => return,
                };

                slog::info!(self.logger, "ticket invoice expired, evicting"; "label" => &label);
                if let Err(err) = self.kv.hdel(keys::TICKET_PENDING, &label).await {
                    slog::warn!(self.logger, "error dropping admission record: {}", err);
                }

                let ban_until = utils::time::unix_now() + BAN_SECONDS;
                if let Err(err) = self
                    .chat
                    .kick_member_until(kick.chat_id, kick.member.id, ban_until)
                    .await
                {
                    slog::error!(self.logger, "failed to evict member: {}", err; "label" => &label);
                }

                for msg in [&kick.join_message, &kick.notice_message, &kick.invoice_message] {
                    let _ = self.chat.delete_message(msg).await;
                }
            }
            Err(err) => {
                // leave the record; a supervisor restart retries the watch
                slog::warn!(self.logger, "unexpected error while watching ticket: {}", err; "label" => &label);
            }
        }
    }

    /// Post-commit hook for a settled ticket, reachable from the watcher
    /// and from the payment coordinator. Idempotent: only the caller that
    /// removes the admission record performs the side effects.
    pub async fn ticket_paid(&self, label: &str) {
        let kick = match self.pending.lock().unwrap().remove(label) {
            Some(kick) => kick,
            None => return,
        };
        slog::debug!(self.logger, "ticket paid"; "label" => label);

        if let Err(err) = self.kv.hdel(keys::TICKET_PENDING, label).await {
            slog::warn!(self.logger, "error dropping admission record: {}", err);
        }

        let _ = self.chat.delete_message(&kick.invoice_message).await;

        let name = match self
            .store
            .ensure_account(Some(kick.member.id), kick.member.username.as_deref())
        {
            Ok(account) => account.at_name(),
            Err(_) => kick.member.display_name(),
        };

        if let Err(err) = self
            .chat
            .edit_message(
                &kick.notice_message,
                &format!("Invoice paid. {} allowed.", name),
            )
            .await
        {
            slog::warn!(self.logger, "failed to replace notice with 'paid': {}", err);
        }
    }

    /// Reloads admission records after a restart and resumes a watcher per
    /// entry. Safe to rerun: watchers test the map before acting.
    pub async fn restore(&self) {
        let entries = match self.kv.hgetall(keys::TICKET_PENDING).await {
            Ok(entries) => entries,
            Err(err) => {
                slog::warn!(self.logger, "error loading pending admissions: {}", err);
                return;
            }
        };

        for (label, json) in entries {
            let kick: KickData = match serde_json::from_str(&json) {
                Ok(kick) => kick,
                Err(err) => {
                    slog::warn!(self.logger, "bad admission record, skipping: {}", err; "label" => &label);
                    continue;
                }
            };
            slog::debug!(self.logger, "restarted ticket watcher"; "label" => &label);
            self.pending.lock().unwrap().insert(label.clone(), kick);
            let supervisor = self.clone();
            tokio::spawn(async move { supervisor.watch(label).await });
        }
    }
}
