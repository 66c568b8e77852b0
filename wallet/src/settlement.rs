use core_types::InvoiceLabel;
use ephemeral::{keys, KvStore};
use msgs::PaidInvoice;
use xerror::wallet::WalletError;

use crate::engine::WalletEngine;
use crate::store::WalletStore;

impl WalletEngine {
    /// Consumes one paid-stream event. Ordering is the node's emit order;
    /// the checkpoint advances only after the event's effects are
    /// committed, so a crash replays at-least-once and the hash-keyed
    /// upsert absorbs the duplicate.
    pub async fn handle_paid_invoice(&self, event: PaidInvoice) -> Result<(), WalletError> {
        self.apply_settlement(&event).await?;
        if let Err(err) = self
            .kv
            .set(keys::LAST_INVOICE_INDEX, &event.pay_index.to_string(), None)
            .await
        {
            slog::warn!(self.logger, "failed to persist paid-stream checkpoint: {}", err);
        }
        Ok(())
    }

    async fn apply_settlement(&self, event: &PaidInvoice) -> Result<(), WalletError> {
        if let Some(existing) = self.store.find_by_hash(&event.payment_hash)? {
            if !existing.pending {
                // settled already, e.g. through the internal shortcut
                return Ok(());
            }
            if let (Some(payer), Some(payee)) = (existing.payer_id, existing.payee_id) {
                self.store.mark_paid(&event.payment_hash, &event.preimage, 0)?;
                self.notify(
                    payer,
                    &format!("Payment confirmed. Hash: {}", event.payment_hash),
                    None,
                )
                .await;
                self.notify_payment_received(payee, event.msat, &event.payment_hash, None)
                    .await;
            }
            return Ok(());
        }

        match InvoiceLabel::parse(&event.label) {
            Some(InvoiceLabel::Wallet {
                account,
                trigger_message,
                ..
            }) => {
                self.store.credit_settled(
                    account,
                    event.msat,
                    &event.description,
                    &event.payment_hash,
                    &event.preimage,
                    &event.label,
                )?;
                self.notify_payment_received(
                    account,
                    event.msat,
                    &event.payment_hash,
                    Some(trigger_message).filter(|t| *t != 0),
                )
                .await;
            }
            Some(InvoiceLabel::Ticket { .. }) => {
                // the watcher handles admit/evict; here only the money moves
                let payee = match self.tickets.find_by_label(&event.label) {
                    Some(kick) => kick.owner_id,
                    None => {
                        slog::warn!(
                            self.logger,
                            "ticket settled but admission record is gone";
                            "label" => &event.label
                        );
                        return Ok(());
                    }
                };
                self.store.credit_settled(
                    payee,
                    event.msat,
                    &event.description,
                    &event.payment_hash,
                    &event.preimage,
                    &event.label,
                )?;
                self.notify_payment_received(payee, event.msat, &event.payment_hash, None)
                    .await;
            }
            None => {
                // a non-wallet invoice was fulfilled on the node; nothing
                // to credit
                slog::info!(
                    self.logger,
                    "settlement for a label the wallet does not know";
                    "label" => &event.label
                );
            }
        }
        Ok(())
    }
}
